//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use walkin::domain::{TokenVerifier, UpdatePolicy};
use walkin::inbound::http::state::DEFAULT_MAX_ATTACHMENT_BYTES;
use walkin::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: DbPool,
    pub(crate) verifier: Arc<TokenVerifier>,
    pub(crate) media_root: PathBuf,
    pub(crate) policy: UpdatePolicy,
    pub(crate) max_attachment_bytes: usize,
}

impl ServerConfig {
    /// Construct a server configuration around the record store pool and
    /// the token verifier.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, db_pool: DbPool, verifier: Arc<TokenVerifier>) -> Self {
        Self {
            bind_addr,
            db_pool,
            verifier,
            media_root: PathBuf::from("media"),
            policy: UpdatePolicy::default(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    /// Directory attachments are written to.
    #[must_use]
    pub fn with_media_root(mut self, media_root: PathBuf) -> Self {
        self.media_root = media_root;
        self
    }

    /// Update behaviour switches for the record service.
    #[must_use]
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Largest accepted attachment in bytes.
    #[must_use]
    pub fn with_max_attachment_bytes(mut self, limit: usize) -> Self {
        self.max_attachment_bytes = limit;
        self
    }
}
