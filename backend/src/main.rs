//! Walk-in record server entry-point: loads configuration, prepares the
//! database and serves the REST API.

mod server;

use std::io;
use std::sync::Arc;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use walkin::config::WalkinSettings;
use walkin::domain::{TokenVerifier, UpdatePolicy};
use walkin::inbound::http::health::HealthState;
use walkin::outbound::persistence::{DbPool, PoolConfig, run_migrations};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = WalkinSettings::load_from_iter(std::env::args_os())
        .map_err(|err| io::Error::other(format!("failed to load configuration: {err}")))?;
    let bind_addr = settings.bind_addr().map_err(io::Error::other)?;
    let database_url = settings.database_url().map_err(io::Error::other)?.to_owned();

    let secret = settings.jwt_secret().map_err(io::Error::other)?;
    let verifier = TokenVerifier::new(secret.to_vec()).map_err(io::Error::other)?;
    info!(fingerprint = %verifier.fingerprint(), "bearer token verifier ready");

    let migration_url = database_url.clone();
    let applied = tokio::task::spawn_blocking(move || run_migrations(&migration_url))
        .await
        .map_err(io::Error::other)?
        .map_err(io::Error::other)?;
    info!(applied, "database migrations complete");

    let pool = DbPool::new(
        PoolConfig::new(database_url).with_max_size(settings.db_max_connections()),
    )
    .await
    .map_err(io::Error::other)?;

    let config = ServerConfig::new(bind_addr, pool, Arc::new(verifier))
        .with_media_root(settings.media_root())
        .with_update_policy(UpdatePolicy {
            audit_log: settings.audit_log(),
        })
        .with_max_attachment_bytes(settings.max_attachment_bytes());

    let health_state = web::Data::new(HealthState::new());
    create_server(health_state, config)?.await
}
