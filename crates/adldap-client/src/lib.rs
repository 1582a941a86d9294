//! Active Directory / LDAP connection management.
//!
//! This crate selects a reachable directory server from a pool, opens a plain, SSL or
//! STARTTLS session to it, binds, and reads the directory root entry to derive the base DN
//! and account suffix.
//!
//! The protocol itself sits behind the [`DirectoryTransport`] and [`DirectorySession`]
//! traits; [`Ldap3Transport`] is the production implementation.

#![deny(missing_docs)]

mod connection;
mod dn;
mod prober;
mod root_dse;
mod transport;

pub use connection::{Connection, ConnectionState};
pub use dn::{account_suffix_from_base_dn, domain_components, DomainComponentError};
pub use prober::find_available_server;
pub use root_dse::{RootDse, RootEntry, DEFAULT_NAMING_CONTEXT, ROOT_DSE_ALL_ATTRIBUTES};
pub use transport::{
    DirectorySession, DirectoryTransport, Ldap3Transport, LdapEntry, SessionSettings,
};

pub use adldap_core::{directory, BindCredentials, ConnectionOptions, Error, SecurityMode};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = adldap_core::Result<T>;
