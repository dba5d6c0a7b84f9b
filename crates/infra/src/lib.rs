//! Infrastructure layer: storage, config, bootstrap and command handlers.

pub mod bootstrap;
pub mod company_service;
pub mod config;
pub mod error;
pub mod store;


pub use bootstrap::{Directory, build_directory, connect};
pub use company_service::CompanyService;
pub use config::{AtelierConfig, ConfigError};
pub use error::{ErrorKind, ServiceError};
pub use store::{
    CompanyScope, DirectoryStore, InMemoryDirectoryStore, PostgresDirectoryStore, StoreError,
};
