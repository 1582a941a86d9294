//! Directory transport abstraction and its `ldap3` implementation.

use adldap_core::{ConnectionOptions, Error, SecurityMode};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use native_tls::TlsConnector;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::Result;

/// The only LDAP protocol version sessions are opened with.
pub const PROTOCOL_VERSION: u8 = 3;

/// Session-level options applied when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Transport security mode.
    pub security: SecurityMode,
    /// LDAP protocol version.
    pub protocol_version: u8,
    /// Whether referrals are chased.
    pub follow_referrals: bool,
    /// Whether the server certificate is validated.
    pub verify_certificates: bool,
    /// Session establishment timeout.
    pub connection_timeout: Duration,
    /// Bind and read timeout.
    pub operation_timeout: Duration,
}

impl SessionSettings {
    /// Derives session settings from connection options.
    ///
    /// Sessions always speak protocol version 3 with referral chasing off. STARTTLS
    /// sessions skip certificate validation so self-signed directory certificates are
    /// accepted; this trades man-in-the-middle protection for compatibility.
    #[must_use]
    pub fn for_options(options: &ConnectionOptions) -> Self {
        let security = options.security_mode();
        Self {
            security,
            protocol_version: PROTOCOL_VERSION,
            follow_referrals: false,
            verify_certificates: security != SecurityMode::StartTls,
            connection_timeout: options.connection_timeout(),
            operation_timeout: options.operation_timeout(),
        }
    }
}

/// LDAP entry representation used by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserve server order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }
}

/// An open directory session.
///
/// Sessions are exclusively owned by one connection and are never shared.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectorySession: Send {
    /// Performs a simple bind.
    ///
    /// Returns `Ok(false)` when the server rejects the bind; the reason is then
    /// available from [`last_error_message`](Self::last_error_message) and
    /// [`diagnostic_message`](Self::diagnostic_message).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the operation timeout elapses.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<bool>;

    /// Reads entries at `base_dn` with base scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadError`] when the server rejects the read.
    async fn read_entry(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<LdapEntry>>;

    /// Generic text for the last operation's outcome.
    fn last_error_message(&self) -> String;

    /// Server-supplied diagnostic message from the last operation (may be empty).
    fn diagnostic_message(&self) -> String;

    /// Unbinds and releases the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind could not be sent.
    async fn close(&mut self) -> Result<()>;
}

/// Capability to reach directory servers and open sessions to them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Attempts a raw connection to `host:port` within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that made the host unreachable.
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> io::Result<()>;

    /// Opens a session to `url` (scheme, host and port). STARTTLS is negotiated here when
    /// requested by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectError`] when the session cannot be established.
    async fn open(&self, url: &str, settings: &SessionSettings)
        -> Result<Box<dyn DirectorySession>>;
}

/// Builds the `scheme://host:port` address for a server.
///
/// # Errors
///
/// Returns [`Error::InvalidOption`] when the host does not form a valid URL.
pub(crate) fn server_url(security: SecurityMode, host: &str, port: u16) -> Result<String> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    let raw = format!("{}{host}:{port}", security.scheme());
    Url::parse(&raw)
        .map_err(|err| Error::InvalidOption(format!("invalid server address `{host}`: {err}")))?;
    Ok(raw)
}

/// Production transport backed by `ldap3` and tokio sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ldap3Transport;

impl Ldap3Transport {
    /// Creates a new transport instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryTransport for Ldap3Transport {
    async fn probe(&self, host: &str, port: u16, probe_timeout: Duration) -> io::Result<()> {
        let stream = timeout(probe_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {}s", probe_timeout.as_secs()),
                )
            })??;
        drop(stream);
        Ok(())
    }

    async fn open(
        &self,
        url: &str,
        settings: &SessionSettings,
    ) -> Result<Box<dyn DirectorySession>> {
        let connect_error = |message: String| Error::ConnectError {
            server: url.to_string(),
            message,
        };

        if settings.protocol_version != PROTOCOL_VERSION {
            return Err(connect_error(format!(
                "unsupported LDAP protocol version {}",
                settings.protocol_version
            )));
        }
        if settings.follow_referrals {
            return Err(connect_error(
                "referral chasing is not supported".to_string(),
            ));
        }

        let ldap_settings = build_ldap_settings(settings).map_err(connect_error)?;
        debug!(url = %url, security = ?settings.security, "opening LDAP session");

        let (conn, ldap) = LdapConnAsync::with_settings(ldap_settings, url)
            .await
            .map_err(|err| connect_error(err.to_string()))?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "LDAP connection driver error");
            }
        });

        Ok(Box::new(Ldap3Session {
            inner: ldap,
            operation_timeout: settings.operation_timeout,
            last_error: String::new(),
            diagnostic: String::new(),
        }))
    }
}

struct Ldap3Session {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
    last_error: String,
    diagnostic: String,
}

impl Ldap3Session {
    fn record(&mut self, rc: u32, text: String) {
        self.last_error = result_code_text(rc).to_string();
        self.diagnostic = text;
    }

    fn record_failure(&mut self, err: &ldap3::LdapError) {
        self.last_error = err.to_string();
        self.diagnostic.clear();
    }
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<bool> {
        let outcome = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("LDAP bind timed out".to_string()))?;

        match outcome {
            Ok(result) => {
                let accepted = result.rc == 0;
                self.record(result.rc, result.text);
                Ok(accepted)
            }
            Err(err) => {
                self.record_failure(&err);
                Ok(false)
            }
        }
    }

    async fn read_entry(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<LdapEntry>> {
        let outcome = timeout(
            self.operation_timeout,
            self.inner
                .search(base_dn, Scope::Base, filter, attributes.to_vec()),
        )
        .await
        .map_err(|_| Error::Timeout("LDAP read timed out".to_string()))?;

        let entries = match outcome.and_then(ldap3::SearchResult::success) {
            Ok((entries, result)) => {
                self.record(result.rc, result.text);
                entries
            }
            Err(err) => {
                self.record_failure(&err);
                return Err(Error::ReadError(self.last_error.clone()));
            }
        };

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    fn last_error_message(&self) -> String {
        self.last_error.clone()
    }

    fn diagnostic_message(&self) -> String {
        self.diagnostic.clone()
    }

    async fn close(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("LDAP unbind timed out".to_string()))?
            .map_err(|err| unbind_error(&err))
    }
}

fn unbind_error(err: &LdapError) -> Error {
    Error::UnbindError(err.to_string())
}

fn build_ldap_settings(settings: &SessionSettings) -> std::result::Result<LdapConnSettings, String> {
    let mut ldap_settings = LdapConnSettings::new()
        .set_conn_timeout(settings.connection_timeout)
        .set_starttls(settings.security == SecurityMode::StartTls);

    if !settings.verify_certificates {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|err| format!("failed to construct TLS connector: {err}"))?;
        ldap_settings = ldap_settings
            .set_connector(connector)
            .set_no_tls_verify(true);
    }

    Ok(ldap_settings)
}

/// Text for an LDAP result code, as `ldap_error` would report it.
fn result_code_text(rc: u32) -> &'static str {
    match rc {
        0 => "Success",
        1 => "Operations error",
        2 => "Protocol error",
        3 => "Time limit exceeded",
        7 => "Auth method not supported",
        8 => "Strong(er) authentication required",
        10 => "Referral",
        13 => "Confidentiality required",
        32 => "No such object",
        34 => "Invalid DN syntax",
        48 => "Inappropriate authentication",
        49 => "Invalid credentials",
        50 => "Insufficient access",
        51 => "Server is busy",
        52 => "Server is unavailable",
        53 => "Server is unwilling to perform",
        80 => "Other (e.g., implementation specific) error",
        _ => "Unknown error",
    }
}
