//! Builder for the HTTP state backed by the record service.

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;

use walkin::domain::RecordService;
use walkin::domain::ports::{RecordCommand, RecordQuery};
use walkin::inbound::http::state::HttpState;
use walkin::outbound::media::CapStdAttachmentStore;
use walkin::outbound::persistence::DieselRecordRepository;

use super::ServerConfig;

/// Wire the Diesel record store and the media directory into one
/// [`RecordService`] serving both record ports.
///
/// # Errors
/// Propagates [`std::io::Error`] when the media root cannot be created or
/// opened.
pub(super) fn build_http_state(config: &ServerConfig) -> std::io::Result<web::Data<HttpState>> {
    let attachments = CapStdAttachmentStore::open(&config.media_root)?;
    let service = Arc::new(
        RecordService::new(
            Arc::new(DieselRecordRepository::new(config.db_pool.clone())),
            Arc::new(attachments),
            Arc::clone(&config.verifier),
            Arc::new(DefaultClock),
        )
        .with_policy(config.policy),
    );

    let records: Arc<dyn RecordCommand> = service.clone();
    let records_query: Arc<dyn RecordQuery> = service;
    Ok(web::Data::new(
        HttpState::new(records, records_query)
            .with_max_attachment_bytes(config.max_attachment_bytes),
    ))
}
