//! Connection options.
//!
//! [`ConnectionOptions`] holds the server pool, port, transport security mode, bind
//! credentials and the base DN / account suffix pair. Options are built once (builders or
//! JSON) and then shared read-only between connections, typically behind an `Arc`.
//!
//! The base DN and account suffix may be left unset; a connection derives them from the
//! directory root entry on first need and caches them here. The cache is write-once, so
//! concurrent readers never observe a value changing underneath them.

use crate::{credentials::BindCredentials, Error, Result};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use validator::Validate;

/// The non-SSL LDAP scheme.
pub const PROTOCOL: &str = "ldap://";

/// The SSL LDAP scheme.
pub const PROTOCOL_SSL: &str = "ldaps://";

/// The non-SSL LDAP port.
pub const DEFAULT_PORT: u16 = 389;

/// The LDAPS port.
pub const DEFAULT_SSL_PORT: u16 = 636;

/// Default per-server reachability probe timeout (seconds).
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default session establishment timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Default bind/read timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Transport security mode for a directory session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Plaintext LDAP.
    Plain,
    /// LDAP over SSL, negotiated at connect time on the SSL port.
    Ssl,
    /// Plaintext connect followed by a STARTTLS upgrade.
    StartTls,
}

impl SecurityMode {
    /// URL scheme used to address a server in this mode.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Ssl => PROTOCOL_SSL,
            Self::Plain | Self::StartTls => PROTOCOL,
        }
    }

    /// Port used when none is configured explicitly.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Ssl => DEFAULT_SSL_PORT,
            Self::Plain | Self::StartTls => DEFAULT_PORT,
        }
    }
}

/// Values discovered from the directory and cached for the lifetime of the options.
#[derive(Debug, Default)]
struct DerivedValues {
    base_dn: OnceLock<String>,
    account_suffix: OnceLock<String>,
}

/// Configuration for connecting to a pool of directory servers.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConnectionOptions {
    /// Candidate servers in probe priority order
    #[serde(default, alias = "domain_controllers")]
    servers: Vec<String>,

    /// Explicit port; the security mode's default applies when unset
    #[serde(default)]
    port: Option<u16>,

    /// Use LDAPS
    #[serde(default)]
    use_ssl: bool,

    /// Use STARTTLS
    #[serde(default)]
    use_tls: bool,

    /// Explicit base DN
    #[serde(default)]
    base_dn: Option<String>,

    /// Service account used by `bind` when no explicit credentials are given
    #[serde(default)]
    bind_credentials: Option<BindCredentials>,

    /// Optional account with higher privileges
    #[serde(default)]
    admin_credentials: Option<BindCredentials>,

    /// Explicit account suffix (e.g. `@corp.example.com`)
    #[serde(default)]
    account_suffix: Option<String>,

    /// Reuse a password supplied by the browser through NTLM or Kerberos
    #[serde(default)]
    use_sso: bool,

    /// Resolve group memberships recursively
    #[serde(default = "default_recursive_groups")]
    recursive_groups: bool,

    /// Per-server probe timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_probe_timeout_secs")]
    probe_timeout_secs: u64,

    /// Session establishment timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    connection_timeout_secs: u64,

    /// Bind and read timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    operation_timeout_secs: u64,

    #[serde(skip)]
    derived: DerivedValues,
}

const fn default_recursive_groups() -> bool {
    true
}

const fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            port: None,
            use_ssl: false,
            use_tls: false,
            base_dn: None,
            bind_credentials: None,
            admin_credentials: None,
            account_suffix: None,
            use_sso: false,
            recursive_groups: default_recursive_groups(),
            probe_timeout_secs: default_probe_timeout_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            derived: DerivedValues::default(),
        }
    }
}

impl ConnectionOptions {
    /// Create options for the given server pool with default settings.
    ///
    /// Pool order is probe priority: the first reachable server wins.
    #[must_use]
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse options from a JSON document and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for malformed JSON, unknown keys or values that
    /// fail validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate_options()?;
        Ok(options)
    }

    /// Validate field ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] describing the first problem found.
    pub fn validate_options(&self) -> Result<()> {
        self.validate()?;

        if self.use_ssl && self.use_tls {
            return Err(Error::InvalidOption(
                "use_ssl and use_tls are mutually exclusive".to_string(),
            ));
        }
        if self.port == Some(0) {
            return Err(Error::InvalidOption("port must be non-zero".to_string()));
        }
        if self.servers.iter().any(|server| server.trim().is_empty()) {
            return Err(Error::InvalidOption(
                "server pool contains an empty host".to_string(),
            ));
        }

        Ok(())
    }

    /// Candidate servers in priority order.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Effective port: the explicit port, else 636 for SSL, else 389.
    ///
    /// SSL never runs on the plain LDAP port: an explicit 389 becomes 636 when SSL is
    /// requested. Other explicit ports (e.g. 3269 for the global catalog) are kept.
    #[must_use]
    pub fn port(&self) -> u16 {
        match (self.security_mode(), self.port) {
            (SecurityMode::Ssl, None | Some(DEFAULT_PORT)) => DEFAULT_SSL_PORT,
            (mode, port) => port.unwrap_or_else(|| mode.default_port()),
        }
    }

    /// Transport security mode. SSL wins if both flags are somehow set.
    #[must_use]
    pub const fn security_mode(&self) -> SecurityMode {
        if self.use_ssl {
            SecurityMode::Ssl
        } else if self.use_tls {
            SecurityMode::StartTls
        } else {
            SecurityMode::Plain
        }
    }

    /// Whether LDAPS is requested.
    #[must_use]
    pub const fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    /// Whether STARTTLS is requested.
    #[must_use]
    pub const fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// Base DN, explicit or previously derived.
    #[must_use]
    pub fn base_dn(&self) -> Option<&str> {
        self.base_dn
            .as_deref()
            .or_else(|| self.derived.base_dn.get().map(String::as_str))
    }

    /// Account suffix, explicit or previously derived.
    #[must_use]
    pub fn account_suffix(&self) -> Option<&str> {
        self.account_suffix
            .as_deref()
            .or_else(|| self.derived.account_suffix.get().map(String::as_str))
    }

    /// Stored bind credentials; `None` means anonymous.
    #[must_use]
    pub const fn bind_credentials(&self) -> Option<&BindCredentials> {
        self.bind_credentials.as_ref()
    }

    /// Stored admin credentials.
    #[must_use]
    pub const fn admin_credentials(&self) -> Option<&BindCredentials> {
        self.admin_credentials.as_ref()
    }

    /// Whether single sign-on is enabled.
    #[must_use]
    pub const fn use_sso(&self) -> bool {
        self.use_sso
    }

    /// Whether group memberships are resolved recursively.
    #[must_use]
    pub const fn recursive_groups(&self) -> bool {
        self.recursive_groups
    }

    /// Per-server reachability probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Session establishment timeout.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Bind and read timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Cache a base DN discovered from the directory and return the effective base DN.
    ///
    /// An explicit base DN always wins, and the first cached value is kept.
    pub fn cache_base_dn(&self, base_dn: String) -> &str {
        if let Some(explicit) = self.base_dn.as_deref() {
            return explicit;
        }
        self.derived.base_dn.get_or_init(|| {
            debug!(base_dn = %base_dn, "caching derived base DN");
            base_dn
        })
    }

    /// Cache a derived account suffix and return the effective account suffix.
    pub fn cache_account_suffix(&self, suffix: String) -> &str {
        if let Some(explicit) = self.account_suffix.as_deref() {
            return explicit;
        }
        self.derived.account_suffix.get_or_init(|| {
            debug!(account_suffix = %suffix, "caching derived account suffix");
            suffix
        })
    }

    /// Replaces the server pool.
    #[must_use]
    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enables or disables LDAPS. The SSL port applies unless a non-default port was set.
    #[must_use]
    pub const fn with_ssl(mut self, enabled: bool) -> Self {
        self.use_ssl = enabled;
        self
    }

    /// Enables or disables STARTTLS.
    ///
    /// Certificate validation is disabled in this mode so self-signed directory
    /// certificates are accepted.
    #[must_use]
    pub const fn with_tls(mut self, enabled: bool) -> Self {
        self.use_tls = enabled;
        self
    }

    /// Sets the base DN explicitly.
    #[must_use]
    pub fn with_base_dn(mut self, base_dn: impl Into<String>) -> Self {
        self.base_dn = Some(base_dn.into());
        self
    }

    /// Sets the stored bind credentials.
    #[must_use]
    pub fn with_bind_credentials(mut self, credentials: BindCredentials) -> Self {
        self.bind_credentials = Some(credentials);
        self
    }

    /// Sets the admin credentials.
    #[must_use]
    pub fn with_admin_credentials(mut self, credentials: BindCredentials) -> Self {
        self.admin_credentials = Some(credentials);
        self
    }

    /// Sets the account suffix explicitly.
    #[must_use]
    pub fn with_account_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.account_suffix = Some(suffix.into());
        self
    }

    /// Enables or disables single sign-on.
    #[must_use]
    pub const fn with_sso(mut self, enabled: bool) -> Self {
        self.use_sso = enabled;
        self
    }

    /// Enables or disables recursive group resolution.
    #[must_use]
    pub const fn with_recursive_groups(mut self, enabled: bool) -> Self {
        self.recursive_groups = enabled;
        self
    }

    /// Overrides the probe timeout in seconds.
    #[must_use]
    pub const fn with_probe_timeout_secs(mut self, seconds: u64) -> Self {
        self.probe_timeout_secs = seconds;
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
