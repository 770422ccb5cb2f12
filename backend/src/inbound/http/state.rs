//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only see the record driving
//! ports, so they can be tested with mocks and no I/O.

use std::sync::Arc;

use crate::domain::ports::{RecordCommand, RecordQuery};

/// Attachment size used when none is configured: 10 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub records: Arc<dyn RecordCommand>,
    pub records_query: Arc<dyn RecordQuery>,
    pub max_attachment_bytes: usize,
}

impl HttpState {
    /// Bundle the record ports with the default upload limit.
    pub fn new(records: Arc<dyn RecordCommand>, records_query: Arc<dyn RecordQuery>) -> Self {
        Self {
            records,
            records_query,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    /// Override the maximum accepted attachment size.
    #[must_use]
    pub fn with_max_attachment_bytes(mut self, limit: usize) -> Self {
        self.max_attachment_bytes = limit;
        self
    }
}
