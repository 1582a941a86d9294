//! Directory root entry (RootDSE) reads and the values derived from it.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{connection::Connection, dn::account_suffix_from_base_dn, Result};

/// Attribute selection that returns every user and operational attribute.
pub const ROOT_DSE_ALL_ATTRIBUTES: [&str; 2] = ["*", "+"];

/// Root entry attribute naming the domain's base DN.
pub const DEFAULT_NAMING_CONTEXT: &str = "defaultnamingcontext";

const ROOT_DSE_FILTER: &str = "objectClass=*";

/// Root entry attributes keyed by lowercased attribute name.
pub type RootEntry = HashMap<String, Vec<String>>;

/// Typed view over the commonly used root entry attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootDse {
    /// Default naming context (base DN).
    pub default_naming_context: Option<String>,
    /// Forest root naming context.
    pub root_domain_naming_context: Option<String>,
    /// Configuration naming context.
    pub configuration_naming_context: Option<String>,
    /// Schema naming context.
    pub schema_naming_context: Option<String>,
    /// DNS host name of the answering server.
    pub dns_host_name: Option<String>,
    /// All naming contexts held by the server.
    pub naming_contexts: Vec<String>,
    /// Supported LDAP protocol versions.
    pub supported_ldap_versions: Vec<String>,
}

impl From<&RootEntry> for RootDse {
    fn from(entry: &RootEntry) -> Self {
        let first = |attribute: &str| {
            entry
                .get(attribute)
                .and_then(|values| values.first().cloned())
        };
        let all = |attribute: &str| entry.get(attribute).cloned().unwrap_or_default();

        Self {
            default_naming_context: first(DEFAULT_NAMING_CONTEXT),
            root_domain_naming_context: first("rootdomainnamingcontext"),
            configuration_naming_context: first("configurationnamingcontext"),
            schema_naming_context: first("schemanamingcontext"),
            dns_host_name: first("dnshostname"),
            naming_contexts: all("namingcontexts"),
            supported_ldap_versions: all("supportedldapversion"),
        }
    }
}

impl Connection {
    /// Reads the directory root entry.
    ///
    /// Issues a base-scope read of the empty DN with filter `objectClass=*`. Attribute
    /// names in the result are lowercased. A read that returns no entry yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBound`](crate::Error::NotBound) without touching the network when
    /// the session is not bound, and [`Error::ReadError`](crate::Error::ReadError) when the
    /// server rejects the read.
    pub async fn read_root_entry(&mut self, attributes: &[&str]) -> Result<RootEntry> {
        let session = self.bound_session()?;
        let attributes = attributes
            .iter()
            .map(|attribute| (*attribute).to_string())
            .collect::<Vec<_>>();

        debug!(attributes = ?attributes, "reading directory root entry");
        let entries = session
            .read_entry("", ROOT_DSE_FILTER, &attributes)
            .await?;

        let Some(entry) = entries.into_iter().next() else {
            debug!("directory root entry read returned no entries");
            return Ok(RootEntry::new());
        };

        Ok(entry
            .attributes
            .into_iter()
            .map(|(name, values)| (name.to_ascii_lowercase(), values))
            .collect())
    }

    /// Reads the whole root entry into a [`RootDse`].
    ///
    /// # Errors
    ///
    /// Same as [`read_root_entry`](Self::read_root_entry).
    pub async fn root_dse(&mut self) -> Result<RootDse> {
        let entry = self.read_root_entry(&ROOT_DSE_ALL_ATTRIBUTES).await?;
        Ok(RootDse::from(&entry))
    }

    /// Finds the domain's base DN from the root entry's default naming context.
    ///
    /// An empty string means the base DN could not be determined; it is not an error, and
    /// callers must check for it rather than assume success. Nothing is cached.
    ///
    /// # Errors
    ///
    /// Same as [`read_root_entry`](Self::read_root_entry).
    pub async fn find_base_dn(&mut self) -> Result<String> {
        let entry = self.read_root_entry(&[DEFAULT_NAMING_CONTEXT]).await?;
        Ok(entry
            .get(DEFAULT_NAMING_CONTEXT)
            .and_then(|values| values.first().cloned())
            .unwrap_or_default())
    }

    /// Returns the account suffix, deriving and caching it (and the base DN) when unset.
    ///
    /// The suffix is the base DN's `DC=` components, lowercased and dot-joined, behind an
    /// `@`. The network is only used when the base DN itself has to be discovered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SuffixDerivation`](crate::Error::SuffixDerivation) when the base DN
    /// has no domain components, or any error from [`find_base_dn`](Self::find_base_dn).
    pub async fn resolve_account_suffix(&mut self) -> Result<String> {
        let options = Arc::clone(self.options_arc());
        if let Some(suffix) = options.account_suffix() {
            return Ok(suffix.to_string());
        }

        let base_dn = match options.base_dn() {
            Some(base_dn) => base_dn.to_string(),
            None => {
                let found = self.find_base_dn().await?;
                if found.is_empty() {
                    found
                } else {
                    options.cache_base_dn(found).to_string()
                }
            }
        };

        let suffix = account_suffix_from_base_dn(&base_dn)?;
        Ok(options.cache_account_suffix(suffix).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LdapEntry, MockDirectorySession, MockDirectoryTransport};
    use crate::Error;
    use adldap_core::ConnectionOptions;
    use mockall::predicate::eq;

    fn root_entry(attributes: &[(&str, &[&str])]) -> LdapEntry {
        LdapEntry {
            dn: String::new(),
            attributes: attributes
                .iter()
                .map(|(name, values)| {
                    (
                        (*name).to_string(),
                        values.iter().map(|value| (*value).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    async fn bound_connection(
        options: ConnectionOptions,
        session: MockDirectorySession,
    ) -> Connection {
        let mut session = session;
        session.expect_simple_bind().returning(|_, _| Ok(true));
        let mut transport = MockDirectoryTransport::new();
        transport.expect_probe().returning(|_, _, _| Ok(()));
        transport
            .expect_open()
            .return_once(move |_, _| Ok(Box::new(session)));
        let mut connection = Connection::with_transport(Arc::new(options), Arc::new(transport));
        connection.bind().await.unwrap();
        connection
    }

    #[tokio::test]
    async fn read_requires_bound_session() {
        let mut session = MockDirectorySession::new();
        session.expect_read_entry().never();
        let mut transport = MockDirectoryTransport::new();
        transport.expect_probe().returning(|_, _, _| Ok(()));
        transport
            .expect_open()
            .return_once(move |_, _| Ok(Box::new(session)));
        let mut connection = Connection::with_transport(
            Arc::new(ConnectionOptions::new(["dc1"])),
            Arc::new(transport),
        );

        assert_eq!(
            connection.read_root_entry(&ROOT_DSE_ALL_ATTRIBUTES).await,
            Err(Error::NotBound)
        );
        connection.connect().await.unwrap();
        assert_eq!(connection.find_base_dn().await, Err(Error::NotBound));
    }

    #[tokio::test]
    async fn find_base_dn_reads_default_naming_context() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .withf(|base, filter, attributes| {
                base.is_empty()
                    && filter == "objectClass=*"
                    && attributes == ["defaultnamingcontext".to_string()]
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![root_entry(&[("defaultNamingContext", &["DC=a,DC=b"])])])
            });
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        assert_eq!(connection.find_base_dn().await.unwrap(), "DC=a,DC=b");
        // find_base_dn does not cache.
        assert!(connection.base_dn().is_none());
    }

    #[tokio::test]
    async fn find_base_dn_is_empty_when_absent() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .returning(|_, _, _| Ok(Vec::new()));
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        assert!(connection.read_root_entry(&["*"]).await.unwrap().is_empty());
        assert_eq!(connection.find_base_dn().await.unwrap(), "");
    }

    #[tokio::test]
    async fn read_failure_is_surfaced() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .returning(|_, _, _| Err(Error::ReadError("Insufficient access".to_string())));
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        assert_eq!(
            connection.find_base_dn().await,
            Err(Error::ReadError("Insufficient access".to_string()))
        );
    }

    #[tokio::test]
    async fn root_dse_maps_known_attributes() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .withf(|_, _, attributes| attributes == ["*".to_string(), "+".to_string()])
            .returning(|_, _, _| {
                Ok(vec![root_entry(&[
                    ("defaultNamingContext", &["DC=corp,DC=example,DC=com"]),
                    ("dnsHostName", &["dc1.corp.example.com"]),
                    (
                        "namingContexts",
                        &["DC=corp,DC=example,DC=com", "CN=Configuration,DC=corp,DC=example,DC=com"],
                    ),
                    ("supportedLDAPVersion", &["3", "2"]),
                ])])
            });
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        let root = connection.root_dse().await.unwrap();
        assert_eq!(
            root.default_naming_context.as_deref(),
            Some("DC=corp,DC=example,DC=com")
        );
        assert_eq!(root.dns_host_name.as_deref(), Some("dc1.corp.example.com"));
        assert_eq!(root.naming_contexts.len(), 2);
        assert_eq!(root.supported_ldap_versions, vec!["3", "2"]);
        assert!(root.schema_naming_context.is_none());
    }

    #[tokio::test]
    async fn suffix_from_explicit_base_dn_needs_no_session() {
        let options = Arc::new(
            ConnectionOptions::new(["dc1"]).with_base_dn("DC=corp,DC=example,DC=com"),
        );
        let mut transport = MockDirectoryTransport::new();
        transport.expect_probe().never();
        let mut connection = Connection::with_transport(Arc::clone(&options), Arc::new(transport));

        assert_eq!(
            connection.resolve_account_suffix().await.unwrap(),
            "@corp.example.com"
        );
        assert_eq!(connection.account_suffix(), Some("@corp.example.com"));
        assert_eq!(options.account_suffix(), Some("@corp.example.com"));
    }

    #[tokio::test]
    async fn suffix_derivation_fails_without_domain_components() {
        let options = ConnectionOptions::new(["dc1"]).with_base_dn("CN=Users,OU=Staff");
        let mut connection =
            Connection::with_transport(Arc::new(options), Arc::new(MockDirectoryTransport::new()));

        assert_eq!(
            connection.resolve_account_suffix().await,
            Err(Error::SuffixDerivation("CN=Users,OU=Staff".to_string()))
        );
        assert!(connection.account_suffix().is_none());
    }

    #[tokio::test]
    async fn suffix_discovers_and_caches_base_dn() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![root_entry(&[(
                    "defaultnamingcontext",
                    &["DC=Corp,DC=Example,DC=com"],
                )])])
            });
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        assert_eq!(
            connection.resolve_account_suffix().await.unwrap(),
            "@corp.example.com"
        );
        assert_eq!(connection.base_dn(), Some("DC=Corp,DC=Example,DC=com"));
        // Second call is served from the cache.
        assert_eq!(
            connection.resolve_account_suffix().await.unwrap(),
            "@corp.example.com"
        );
    }

    #[tokio::test]
    async fn suffix_with_undeterminable_base_dn_fails() {
        let mut session = MockDirectorySession::new();
        session
            .expect_read_entry()
            .with(eq(""), eq("objectClass=*"), mockall::predicate::always())
            .returning(|_, _, _| Ok(vec![root_entry(&[])]));
        let mut connection =
            bound_connection(ConnectionOptions::new(["dc1"]), session).await;

        assert_eq!(
            connection.resolve_account_suffix().await,
            Err(Error::SuffixDerivation(String::new()))
        );
        assert!(connection.base_dn().is_none());
    }
}
