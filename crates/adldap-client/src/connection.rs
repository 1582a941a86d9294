//! Connection facade: server selection, session lifecycle and bind state.

use adldap_core::{BindCredentials, ConnectionOptions, Error};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    prober::find_available_server,
    transport::{server_url, DirectorySession, DirectoryTransport, Ldap3Transport, SessionSettings},
    Result,
};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session exists.
    Disconnected,
    /// A session is open but not authenticated.
    Connected,
    /// The session is authenticated.
    Bound,
}

/// A connection to one server from the configured pool.
///
/// The connection exclusively owns at most one session. `connect`, `bind` and root entry
/// reads take `&mut self`, so operations on one connection are strictly sequential. The
/// session is released by [`close`](Self::close) or, failing that, when the connection is
/// dropped.
///
/// Options are shared: several connections may hold the same `Arc<ConnectionOptions>`,
/// and a base DN or account suffix derived through one of them is cached for all.
pub struct Connection {
    options: Arc<ConnectionOptions>,
    transport: Arc<dyn DirectoryTransport>,
    session: Option<Box<dyn DirectorySession>>,
    server: Option<String>,
    bound: bool,
}

impl Connection {
    /// Creates a connection that uses the `ldap3` transport.
    #[must_use]
    pub fn new(options: Arc<ConnectionOptions>) -> Self {
        Self::with_transport(options, Arc::new(Ldap3Transport::new()))
    }

    /// Creates a connection over a custom transport.
    #[must_use]
    pub fn with_transport(
        options: Arc<ConnectionOptions>,
        transport: Arc<dyn DirectoryTransport>,
    ) -> Self {
        Self {
            options,
            transport,
            session: None,
            server: None,
            bound: false,
        }
    }

    /// Returns the shared options.
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub(crate) const fn options_arc(&self) -> &Arc<ConnectionOptions> {
        &self.options
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match (&self.session, self.bound) {
            (None, _) => ConnectionState::Disconnected,
            (Some(_), false) => ConnectionState::Connected,
            (Some(_), true) => ConnectionState::Bound,
        }
    }

    /// Whether the session is authenticated.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Server selected by the last successful connect.
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Base DN from the options, explicit or cached. Never touches the network.
    #[must_use]
    pub fn base_dn(&self) -> Option<&str> {
        self.options.base_dn()
    }

    /// Account suffix from the options, explicit or cached. Never touches the network.
    #[must_use]
    pub fn account_suffix(&self) -> Option<&str> {
        self.options.account_suffix()
    }

    /// Last message reported by the session.
    #[must_use]
    pub fn last_error(&self) -> String {
        self.session.as_ref().map_or_else(
            || Error::NotBound.to_string(),
            |session| session.last_error_message(),
        )
    }

    /// Borrows the live session, if any.
    pub fn session_mut(&mut self) -> Option<&mut (dyn DirectorySession + 'static)> {
        self.session.as_deref_mut()
    }

    /// Selects a reachable server and opens an unauthenticated session to it.
    ///
    /// Does nothing when a session already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for inconsistent options,
    /// [`Error::TransportUnreachable`] when no server in the pool answers, and
    /// [`Error::ConnectError`] when the session cannot be opened.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        self.options.validate_options()?;
        let port = self.options.port();
        let servers = self.options.servers();

        let server = find_available_server(
            self.transport.as_ref(),
            servers,
            port,
            self.options.probe_timeout(),
        )
        .await
        .ok_or_else(|| {
            Error::TransportUnreachable(format!(
                "none of [{}] answered on port {port}",
                servers.join(", ")
            ))
        })?;

        let settings = SessionSettings::for_options(&self.options);
        let url = server_url(settings.security, &server, port)?;
        let session = self.transport.open(&url, &settings).await?;

        info!(server = %server, url = %url, "connected to directory server");
        self.session = Some(session);
        self.server = Some(server);
        self.bound = false;
        Ok(())
    }

    /// Binds with the credentials stored in the options (anonymous when there are none).
    ///
    /// Connects first when no session exists.
    ///
    /// # Errors
    ///
    /// Surfaces any connect failure unchanged, [`Error::BindError`] when the server rejects
    /// the credentials and [`Error::Timeout`] when the bind times out.
    pub async fn bind(&mut self) -> Result<()> {
        let options = Arc::clone(&self.options);
        self.authenticate(options.bind_credentials()).await
    }

    /// Binds with explicit credentials, which take precedence over the stored ones.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub async fn bind_as(&mut self, credentials: &BindCredentials) -> Result<()> {
        self.authenticate(Some(credentials)).await
    }

    /// Binds with the admin credentials stored in the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] when no admin credentials are configured, otherwise
    /// the same as [`bind`](Self::bind).
    pub async fn bind_admin(&mut self) -> Result<()> {
        let options = Arc::clone(&self.options);
        let credentials = options.admin_credentials().ok_or_else(|| {
            Error::InvalidOption("admin credentials are not configured".to_string())
        })?;
        self.authenticate(Some(credentials)).await
    }

    async fn authenticate(&mut self, credentials: Option<&BindCredentials>) -> Result<()> {
        if self.session.is_none() {
            self.connect().await?;
        }
        let Some(session) = self.session.as_mut() else {
            return Err(Error::NotBound);
        };

        let (dn, password) = credentials.map_or(("", ""), |creds| {
            (creds.bind_dn(), creds.bind_password())
        });
        debug!(bind_dn = %dn, anonymous = dn.is_empty(), "binding directory session");

        self.bound = false;
        if !session.simple_bind(dn, password).await? {
            return Err(Error::BindError {
                message: session.last_error_message(),
                diagnostic: session.diagnostic_message(),
            });
        }

        self.bound = true;
        info!(bind_dn = %dn, "directory session bound");
        Ok(())
    }

    /// Releases the session and returns to [`ConnectionState::Disconnected`].
    ///
    /// Safe to call repeatedly and on a connection that never connected. Unbind failures
    /// are logged, not returned.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.close().await {
                warn!(error = %err, "failed to close directory session cleanly");
            }
            debug!(server = ?self.server, "directory session closed");
        }
        self.server = None;
        self.bound = false;
    }

    /// Borrows the session when it is bound.
    pub(crate) fn bound_session(&mut self) -> Result<&mut (dyn DirectorySession + 'static)> {
        if !self.bound {
            return Err(Error::NotBound);
        }
        self.session.as_deref_mut().ok_or(Error::NotBound)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            debug!(server = ?self.server, "dropping open directory session");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.server)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
