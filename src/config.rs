//! Configuration for backend selection.
//!
//! One optional connection group per backend. Values come from an optional
//! file and `POLYSTORE_*` environment variables, e.g. `POLYSTORE_COUCHDB_HOST`
//! or `POLYSTORE_COLLECTIONS=Warnings,Users`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapter::BackendKind;
use crate::error::Result;
use crate::model::Model;

/// Main store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// CouchDB connection group
    #[serde(default)]
    pub couchdb: Option<ConnectionConfig>,

    /// MongoDB connection group
    #[serde(default)]
    pub mongodb: Option<ConnectionConfig>,

    /// RavenDB connection group
    #[serde(default)]
    pub ravendb: Option<ConnectionConfig>,

    /// PostgreSQL connection group
    #[serde(default)]
    pub postgres: Option<ConnectionConfig>,

    /// Collections table-based backends create at setup
    #[serde(default)]
    pub collections: Vec<String>,
}

/// Connection parameters for one backend. Every value is optional here;
/// adapters decide which ones they require.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM file: CA certificate, or client identity for RavenDB
    pub certificate: Option<PathBuf>,
}

/// A validated connection group.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Option<Credentials>,
    pub certificate: Option<PathBuf>,
}

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DatabaseConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        // Environment variables with POLYSTORE_ prefix
        builder = builder.add_source(
            ::config::Environment::with_prefix("POLYSTORE")
                .separator("_")
                .list_separator(",")
                .with_list_parse_key("collections")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Register a model's collection for table bootstrapping.
    pub fn with_model<M: Model>(mut self) -> Self {
        if !self.collections.iter().any(|c| c == M::COLLECTION) {
            self.collections.push(M::COLLECTION.to_string());
        }
        self
    }

    pub fn group(&self, kind: BackendKind) -> Option<&ConnectionConfig> {
        match kind {
            BackendKind::CouchDb => self.couchdb.as_ref(),
            BackendKind::MongoDb => self.mongodb.as_ref(),
            BackendKind::RavenDb => self.ravendb.as_ref(),
            BackendKind::Postgres => self.postgres.as_ref(),
            BackendKind::Memory => None,
        }
    }

    /// Validate the group for `kind`, warning about anything missing.
    pub fn connection(&self, kind: BackendKind, needs_credentials: bool) -> Option<Connection> {
        match self.group(kind) {
            Some(group) => group.resolve(kind, needs_credentials),
            None => {
                warn!(backend = kind.as_str(), "backend is not configured");
                None
            }
        }
    }
}

impl ConnectionConfig {
    fn resolve(&self, kind: BackendKind, needs_credentials: bool) -> Option<Connection> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("host");
        }
        if self.port.is_none() {
            missing.push("port");
        }
        if self.database.is_none() {
            missing.push("database");
        }
        if needs_credentials {
            if self.username.is_none() {
                missing.push("username");
            }
            if self.password.is_none() {
                missing.push("password");
            }
        }

        if !missing.is_empty() {
            warn!(
                backend = kind.as_str(),
                missing = ?missing,
                "backend configuration incomplete, skipping"
            );
            return None;
        }

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Some(Connection {
            host: self.host.clone()?,
            port: self.port?,
            database: self.database.clone()?,
            credentials,
            certificate: self.certificate.clone(),
        })
    }
}

impl Connection {
    /// `http://host:port` or `https://host:port` when a certificate is set.
    pub fn http_base(&self) -> String {
        let scheme = if self.certificate.is_some() {
            "https"
        } else {
            "http"
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}
