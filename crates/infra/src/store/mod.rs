//! Directory persistence boundary.
//!
//! Users, companies, memberships and tags behind one synchronous trait, with
//! an in-memory backend for tests/dev and a Postgres backend for production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryDirectoryStore;
pub use postgres::PostgresDirectoryStore;
pub use r#trait::{CompanyScope, DirectoryStore, StoreError};
