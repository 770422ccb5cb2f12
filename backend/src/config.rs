//! Service configuration loaded via OrthoConfig.
//!
//! Values layer CLI flags over `WALKIN_*` environment variables over an
//! optional configuration file. Optional fields fall back to defaults in the
//! accessors below.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use ortho_config::OrthoConfig;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::inbound::http::state::DEFAULT_MAX_ATTACHMENT_BYTES;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Errors raised while resolving configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value was not supplied.
    #[error("missing required setting {name}")]
    Missing {
        /// Setting name as written in the environment.
        name: &'static str,
    },
    /// The bind address does not parse.
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    /// The secret file could not be read.
    #[error("failed to read JWT secret from {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for the walk-in record service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WALKIN")]
pub struct WalkinSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// HMAC secret used to verify bearer tokens.
    pub jwt_secret: Option<String>,
    /// File holding the HMAC secret; used when `jwt_secret` is unset.
    pub jwt_secret_file: Option<PathBuf>,
    /// Directory attachments are written to.
    pub media_root: Option<PathBuf>,
    /// Append an audit entry on every update.
    #[ortho_config(default = true)]
    pub audit_log: bool,
    /// Largest accepted attachment in bytes.
    pub max_attachment_bytes: Option<usize>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
}

impl Default for WalkinSettings {
    fn default() -> Self {
        Self {
            bind_addr: None,
            database_url: None,
            jwt_secret: None,
            jwt_secret_file: None,
            media_root: None,
            audit_log: true,
            max_attachment_bytes: None,
            db_max_connections: None,
        }
    }
}

impl WalkinSettings {
    /// Return the bind address, falling back to `0.0.0.0:8080`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: value.to_owned(),
                source,
            })
    }

    /// Return the database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no URL is configured.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing {
                name: "WALKIN_DATABASE_URL",
            })
    }

    /// Resolve the token secret from the inline value or the secret file.
    ///
    /// Trailing newlines in the file are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecretFile`] when the file cannot be read and
    /// [`ConfigError::Missing`] when neither source yields a secret.
    pub fn jwt_secret(&self) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        if let Some(secret) = self.jwt_secret.as_deref().filter(|value| !value.is_empty()) {
            return Ok(Zeroizing::new(secret.as_bytes().to_vec()));
        }
        if let Some(path) = &self.jwt_secret_file {
            let secret = read_secret_file(path)?;
            if !secret.is_empty() {
                return Ok(secret);
            }
        }
        Err(ConfigError::Missing {
            name: "WALKIN_JWT_SECRET",
        })
    }

    /// Return the media root, falling back to `media`.
    pub fn media_root(&self) -> PathBuf {
        self.media_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT))
    }

    /// Whether updates append audit entries; on unless disabled.
    pub const fn audit_log(&self) -> bool {
        self.audit_log
    }

    /// Return the attachment size limit, falling back to 10 MiB.
    pub fn max_attachment_bytes(&self) -> usize {
        self.max_attachment_bytes
            .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES)
    }

    /// Return the pool size, falling back to 10.
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }
}

fn read_secret_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    let mut bytes = Zeroizing::new(std::fs::read(path).map_err(|source| {
        ConfigError::SecretFile {
            path: path.to_path_buf(),
            source,
        }
    })?);
    while bytes.last().is_some_and(|byte| matches!(byte, b'\n' | b'\r')) {
        bytes.pop();
    }
    Ok(bytes)
}
