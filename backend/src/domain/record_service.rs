//! Walk-in record service.
//!
//! Implements the record driving ports on top of the record repository and
//! attachment store. Every operation authenticates the bearer token through
//! [`TokenVerifier`]; updates additionally enforce that only the record's
//! author may change it and save with a revision check.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use pagination::{PageRequest, PageRequestError, Paginated};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    AttachmentStore, AttachmentStoreError, AttachmentUpload, CreateRecordRequest,
    CreateRecordResponse, ListRecordsRequest, ListRecordsResponse, RecordCommand,
    RecordListFilter, RecordQuery, RecordRepository, RecordRepositoryError, UpdateRecordRequest,
    UpdateRecordResponse,
};
use crate::domain::{
    AttachmentRef, AuditEntry, Author, BearerToken, Error, NewRecord, NumberVerification, Record,
    RecordDetails, RecordLocator, RecordValidationError, Student, TokenVerifier,
};

/// Behaviour switches for record updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Append an audit entry on every update.
    pub audit_log: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self { audit_log: true }
    }
}

fn map_repository_error(error: RecordRepositoryError) -> Error {
    match error {
        RecordRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("record store unavailable: {message}"))
        }
        RecordRepositoryError::Query { message } => {
            Error::service_unavailable(format!("record store error: {message}"))
        }
        RecordRepositoryError::RevisionMismatch { expected, actual } => {
            Error::conflict("record was modified concurrently; retry the update").with_details(
                json!({
                    "code": "revision_mismatch",
                    "expected_revision": expected,
                    "actual_revision": actual,
                }),
            )
        }
    }
}

fn map_attachment_error(error: AttachmentStoreError) -> Error {
    match error {
        AttachmentStoreError::InvalidName { name } => {
            Error::invalid_request("attachment file name is not usable").with_details(json!({
                "field": "record",
                "value": name,
                "code": "invalid_file_name",
            }))
        }
        AttachmentStoreError::Write { message } => {
            error!(%message, "attachment write failed");
            Error::internal(format!("attachment write failed: {message}"))
                .with_details(json!({ "code": "attachment_write_failed" }))
        }
    }
}

fn map_validation_error(error: &RecordValidationError) -> Error {
    Error::invalid_request(error.to_string()).with_details(json!({
        "field": error.field(),
        "code": "invalid_field",
    }))
}

fn map_page_error(error: &PageRequestError) -> Error {
    Error::invalid_request(error.to_string()).with_details(json!({
        "field": error.field(),
        "code": "invalid_page",
    }))
}

fn record_not_found(message: impl Into<String>) -> Error {
    Error::not_found(message).with_details(json!({ "code": "record_not_found" }))
}

/// Record service implementing the record driving ports.
#[derive(Clone)]
pub struct RecordService<R, A> {
    records: Arc<R>,
    attachments: Arc<A>,
    verifier: Arc<TokenVerifier>,
    clock: Arc<dyn Clock>,
    policy: UpdatePolicy,
}

impl<R, A> RecordService<R, A> {
    /// Create a service over the given store, attachment store and verifier.
    pub fn new(
        records: Arc<R>,
        attachments: Arc<A>,
        verifier: Arc<TokenVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            attachments,
            verifier,
            clock,
            policy: UpdatePolicy::default(),
        }
    }

    /// Replace the update policy.
    #[must_use]
    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn authenticate(&self, token: &BearerToken) -> Result<Author, Error> {
        let claims = self
            .verifier
            .authenticate(token, self.clock.utc())
            .into_result()
            .map_err(|reason| {
                debug!(%reason, "bearer token rejected");
                Error::unauthorized(reason.to_string()).with_details(json!({ "code": reason.code() }))
            })?;
        Author::from_claims(claims).map_err(|err| {
            debug!("bearer token carries no uid");
            Error::unauthorized(err.to_string()).with_details(json!({ "code": "missing_uid" }))
        })
    }
}

impl<R, A> RecordService<R, A>
where
    R: RecordRepository,
    A: AttachmentStore,
{
    async fn resolve(
        &self,
        locator: Option<&RecordLocator>,
        verified: &[NumberVerification],
    ) -> Result<Record, Error> {
        match locator {
            Some(RecordLocator::Id(id)) => self
                .records
                .find_by_id(*id)
                .await
                .map_err(map_repository_error)?
                .ok_or_else(|| record_not_found(format!("record {id} not found"))),
            Some(RecordLocator::Number(number)) => self
                .records
                .find_latest_by_number(number)
                .await
                .map_err(map_repository_error)?
                .ok_or_else(|| record_not_found(format!("no record contains number {number}"))),
            None => self.resolve_from_verified(verified).await,
        }
    }

    /// Try each verified entry in order; the first number with a record wins.
    async fn resolve_from_verified(
        &self,
        verified: &[NumberVerification],
    ) -> Result<Record, Error> {
        if verified.is_empty() {
            return Err(Error::invalid_request(
                "an id, a number, or verified entries must identify the record",
            )
            .with_details(json!({ "code": "missing_locator" })));
        }
        for entry in verified {
            let found = self
                .records
                .find_latest_by_number(&entry.number)
                .await
                .map_err(map_repository_error)?;
            if let Some(record) = found {
                return Ok(record);
            }
            debug!(number = %entry.number, "no record for verified number");
        }
        Err(record_not_found("no record contains any of the verified numbers"))
    }

    async fn store_attachment(&self, upload: AttachmentUpload) -> Result<AttachmentRef, Error> {
        self.attachments
            .store(&upload.file_name, &upload.contents)
            .await
            .map_err(map_attachment_error)
    }
}

#[async_trait]
impl<R, A> RecordCommand for RecordService<R, A>
where
    R: RecordRepository,
    A: AttachmentStore,
{
    async fn create_record(
        &self,
        request: CreateRecordRequest,
    ) -> Result<CreateRecordResponse, Error> {
        let author = self.authenticate(&request.token)?;
        let student = Student::try_from(request.student).map_err(|err| map_validation_error(&err))?;

        let record = self
            .records
            .create(&NewRecord {
                student,
                author,
                created_at: self.clock.utc(),
            })
            .await
            .map_err(map_repository_error)?;

        info!(record_id = %record.id, author = %record.author.uid(), "record created");
        Ok(CreateRecordResponse { record })
    }

    async fn update_record(
        &self,
        request: UpdateRecordRequest,
    ) -> Result<UpdateRecordResponse, Error> {
        let UpdateRecordRequest {
            token,
            locator,
            verified,
            comment,
            attachment,
        } = request;
        let verified =
            NumberVerification::validate_all(verified).map_err(|err| map_validation_error(&err))?;

        let mut record = self.resolve(locator.as_ref(), &verified).await?;
        let author = self.authenticate(&token)?;
        if !record.is_owned_by(author.uid()) {
            warn!(
                record_id = %record.id,
                caller = %author.uid(),
                "update rejected: caller does not own the record"
            );
            return Err(
                Error::forbidden("you are not allowed to update this record")
                    .with_details(json!({ "record_id": record.id.get() })),
            );
        }

        let applied = record.student.apply_verifications(&verified);
        let attachment_ref = match attachment {
            Some(upload) => Some(self.store_attachment(upload).await?),
            None => None,
        };
        if let Some(stored) = &attachment_ref {
            record.attachment = Some(stored.clone());
        }
        if let Some(text) = &comment {
            record.details = Some(RecordDetails::walkin(text.clone()));
        }

        let now = self.clock.utc();
        if self.policy.audit_log {
            record.audit_log.push(AuditEntry {
                verified,
                comment,
                attachment_ref,
                created_at: now,
                author: author.uid().clone(),
            });
        }

        let expected_revision = record.revision;
        record.revision = expected_revision.saturating_add(1);
        record.updated_at = now;
        self.records
            .save(&record, expected_revision)
            .await
            .map_err(map_repository_error)?;

        info!(
            record_id = %record.id,
            revision = record.revision,
            verified_applied = applied,
            "record updated"
        );
        Ok(UpdateRecordResponse { record })
    }
}

#[async_trait]
impl<R, A> RecordQuery for RecordService<R, A>
where
    R: RecordRepository,
    A: AttachmentStore,
{
    async fn list_records(
        &self,
        request: ListRecordsRequest,
    ) -> Result<ListRecordsResponse, Error> {
        let author = self.authenticate(&request.token)?;
        let page = PageRequest::parse(request.page.as_deref(), request.limit.as_deref())
            .map_err(|err| map_page_error(&err))?;
        let filter = RecordListFilter {
            author: author.uid().clone(),
            number: request.number.filter(|number| !number.trim().is_empty()),
        };

        let records = self
            .records
            .list_by_author(&filter, page)
            .await
            .map_err(map_repository_error)?;
        let total = self
            .records
            .count_by_author(&filter)
            .await
            .map_err(map_repository_error)?;

        debug!(
            author = %filter.author,
            page = page.page(),
            returned = records.len(),
            total,
            "records listed"
        );
        Ok(ListRecordsResponse {
            records: Paginated::new(records, page, total),
        })
    }
}

#[cfg(test)]
#[path = "record_service_tests.rs"]
mod tests;
