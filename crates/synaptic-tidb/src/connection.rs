use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::{Connection, MySqlConnection};
use synaptic_core::SynapticError;

use crate::schema::register_vector_type;

/// Connection parameters for a TiDB instance.
///
/// Fields left unset fall back to a local development server:
/// `root:root@localhost:4000/test`.
#[derive(Clone, PartialEq, Eq)]
pub struct TiDbConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// PEM file with the CA that signed the server certificate. The system
    /// roots are used when unset.
    pub ssl_ca: Option<PathBuf>,
}

impl Default for TiDbConnectParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4000,
            user: "root".to_string(),
            password: "root".to_string(),
            database: "test".to_string(),
            ssl_ca: None,
        }
    }
}

impl fmt::Debug for TiDbConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiDbConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("ssl_ca", &self.ssl_ca)
            .finish()
    }
}

impl TiDbConnectParams {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Read `TIDB_HOST`, `TIDB_PORT`, `TIDB_USER`, `TIDB_PASSWORD`,
    /// `TIDB_DATABASE` and `TIDB_SSL_CA`, using the defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self, SynapticError> {
        let mut params = Self::default();
        if let Ok(host) = std::env::var("TIDB_HOST") {
            params.host = host;
        }
        if let Ok(port) = std::env::var("TIDB_PORT") {
            params.port = port
                .parse()
                .map_err(|e| SynapticError::Config(format!("invalid TIDB_PORT '{port}': {e}")))?;
        }
        if let Ok(user) = std::env::var("TIDB_USER") {
            params.user = user;
        }
        if let Ok(password) = std::env::var("TIDB_PASSWORD") {
            params.password = password;
        }
        if let Ok(database) = std::env::var("TIDB_DATABASE") {
            params.database = database;
        }
        if let Ok(ca) = std::env::var("TIDB_SSL_CA") {
            params.ssl_ca = Some(PathBuf::from(ca));
        }
        Ok(params)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_ssl_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca = Some(path.into());
        self
    }

    /// Driver options: TLS is mandatory and the server certificate and host
    /// name are always verified. rustls does not negotiate below TLS 1.2.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(MySqlSslMode::VerifyIdentity);
        if let Some(ca) = &self.ssl_ca {
            options = options.ssl_ca(ca);
        }
        options
    }
}

// ---------------------------------------------------------------------------
// ClientParams
// ---------------------------------------------------------------------------

type ParamsResolver =
    dyn Fn() -> BoxFuture<'static, Result<TiDbConnectParams, SynapticError>> + Send + Sync;

/// Connection parameters given up front or produced on demand.
///
/// A resolver runs before every indexer or retriever call, so it can hand out
/// short-lived credentials.
#[derive(Clone)]
pub enum ClientParams {
    Static(TiDbConnectParams),
    Resolver(Arc<ParamsResolver>),
}

impl ClientParams {
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<TiDbConnectParams, SynapticError>>
            + Send
            + Sync
            + 'static,
    {
        ClientParams::Resolver(Arc::new(f))
    }

    pub async fn resolve(&self) -> Result<TiDbConnectParams, SynapticError> {
        match self {
            ClientParams::Static(params) => Ok(params.clone()),
            ClientParams::Resolver(f) => f().await,
        }
    }
}

impl fmt::Debug for ClientParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientParams::Static(params) => f.debug_tuple("Static").field(params).finish(),
            ClientParams::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<TiDbConnectParams> for ClientParams {
    fn from(params: TiDbConnectParams) -> Self {
        ClientParams::Static(params)
    }
}

/// Resolve optional client params, falling back to [`TiDbConnectParams::default`].
pub async fn resolve_params(
    params: Option<&ClientParams>,
) -> Result<TiDbConnectParams, SynapticError> {
    match params {
        Some(params) => params.resolve().await,
        None => Ok(TiDbConnectParams::default()),
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

/// Open and authenticate one connection, then register the vector column
/// type with the schema layer.
///
/// A single attempt is made; the driver's error is kept in the message.
pub async fn connect(params: &TiDbConnectParams) -> Result<MySqlConnection, SynapticError> {
    let conn = MySqlConnection::connect_with(&params.connect_options())
        .await
        .map_err(|e| {
            SynapticError::Connection(format!(
                "failed to connect to TiDB at {}:{}: {e}",
                params.host, params.port
            ))
        })?;

    register_vector_type();
    tracing::debug!(host = %params.host, port = params.port, database = %params.database, "tidb: connected");
    Ok(conn)
}
