//! Driving port for record mutations.

use async_trait::async_trait;

use crate::domain::{
    BearerToken, Error, NumberVerification, Record, RecordLocator, StudentPayload,
};

use super::AttachmentUpload;

/// Request to create a record for the token's author.
#[derive(Debug, Clone)]
pub struct CreateRecordRequest {
    /// Caller credentials.
    pub token: BearerToken,
    /// Unvalidated student document.
    pub student: StudentPayload,
}

/// Response from creating a record.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRecordResponse {
    /// Stored record including its assigned id.
    pub record: Record,
}

/// Request to update an existing record.
#[derive(Debug, Clone)]
pub struct UpdateRecordRequest {
    /// Caller credentials.
    pub token: BearerToken,
    /// Explicit target; when absent the verified entries are tried in order.
    pub locator: Option<RecordLocator>,
    /// Verification states to merge into the student numbers.
    pub verified: Vec<NumberVerification>,
    /// Comment for the record details and audit entry.
    pub comment: Option<String>,
    /// Optional file to attach.
    pub attachment: Option<AttachmentUpload>,
}

/// Response from updating a record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecordResponse {
    /// Record as saved.
    pub record: Record,
}

/// Driving port for record write operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordCommand: Send + Sync {
    /// Create a record owned by the authenticated caller.
    async fn create_record(
        &self,
        request: CreateRecordRequest,
    ) -> Result<CreateRecordResponse, Error>;

    /// Locate a record, check ownership and apply the update.
    async fn update_record(
        &self,
        request: UpdateRecordRequest,
    ) -> Result<UpdateRecordResponse, Error>;
}
