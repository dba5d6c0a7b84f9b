//! `atelier-core`: directory foundation types.
//!
//! This crate contains **pure domain** records (no storage or access-control concerns).

pub mod company;
pub mod error;
pub mod id;
pub mod page;
pub mod tag;
pub mod user;

pub use company::{Company, CompanyPatch, CompanyQuery, CompanyStatus, NewCompany};
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, TagId, UserId};
pub use page::{Listing, Page};
pub use tag::{NewTag, Tag, TagPatch};
pub use user::UserAccount;
