//! # adldap-core
//!
//! Core types for managing connections to Active Directory style LDAP servers.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy shared by every connection stage
//! - [`credentials`] - Bind credential pairs with redacted secrets
//! - [`directory`] - Active Directory account type and RDN constants
//! - [`options`] - Connection options (server pool, port, security mode, derived values)

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod directory;
pub mod error;
pub mod options;

// Re-export commonly used types
pub use credentials::BindCredentials;
pub use error::{Error, Result};
pub use options::{ConnectionOptions, SecurityMode};
