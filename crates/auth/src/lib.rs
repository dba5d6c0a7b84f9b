//! `atelier-auth`: company access control (zero-trust).
//!
//! Decides whether a principal may act on a company, its employees and its
//! tags. This crate is intentionally decoupled from HTTP and storage: lookups
//! go through the [`AccessSource`] and [`UserDirectory`] traits.

pub mod access;
pub mod claims;
pub mod error;
pub mod identity;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod token;

pub use access::{AccessGrant, EffectiveAccess};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use error::AuthzError;
pub use identity::{UserDirectory, authenticate, load_active_user};
pub use policy::{Action, DenialReason, Verdict, can_manage_employees, decide};
pub use principal::{Employee, EmployeeGrant, Membership, Principal};
pub use resolver::{AccessRow, AccessSource, CompanyVisibility, resolve_access};
pub use roles::CompanyRole;
pub use token::{Hs256TokenVerifier, TokenVerifier, bearer_token};
