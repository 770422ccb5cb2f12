//! Driving port for record reads.

use async_trait::async_trait;
use pagination::Paginated;

use crate::domain::{BearerToken, Error, Record};

/// Request to list the caller's own records.
#[derive(Debug, Clone)]
pub struct ListRecordsRequest {
    /// Caller credentials.
    pub token: BearerToken,
    /// Raw `page` value; defaults to 1.
    pub page: Option<String>,
    /// Raw `limit` value; defaults to 10.
    pub limit: Option<String>,
    /// Only records containing this student number.
    pub number: Option<String>,
}

/// One page of the caller's records.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRecordsResponse {
    /// Records with page metadata and the total match count.
    pub records: Paginated<Record>,
}

/// Driving port for record read operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordQuery: Send + Sync {
    /// List records created by the authenticated caller.
    async fn list_records(&self, request: ListRecordsRequest)
    -> Result<ListRecordsResponse, Error>;
}
