//! Port for walk-in record persistence.
//!
//! The store owns identifier assignment and ordering. Updates go through
//! [`RecordRepository::save`], which is a compare-and-swap on the record
//! revision so concurrent read-modify-write cycles cannot silently
//! overwrite each other.

use async_trait::async_trait;
use pagination::PageRequest;

use crate::domain::{AuthorUid, NewRecord, Record, RecordId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by record repository adapters.
    pub enum RecordRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "record repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "record repository query failed: {message}",
        /// Another writer saved the record first.
        RevisionMismatch { expected: u32, actual: u32 } =>
            "record revision mismatch: expected {expected}, found {actual}",
    }
}

/// Scope of a listing: always one author, optionally one contained number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListFilter {
    /// Only records created by this author are returned.
    pub author: AuthorUid,
    /// Only records whose student numbers contain this value.
    pub number: Option<String>,
}

/// Port for record storage and retrieval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Insert a record, assigning its id and revision 1.
    async fn create(&self, record: &NewRecord) -> Result<Record, RecordRepositoryError>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, RecordRepositoryError>;

    /// Fetch the most recently created record containing `number`.
    ///
    /// Ties on `created_at` resolve to the highest id.
    async fn find_latest_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Record>, RecordRepositoryError>;

    /// List one page of records, newest first.
    async fn list_by_author(
        &self,
        filter: &RecordListFilter,
        page: PageRequest,
    ) -> Result<Vec<Record>, RecordRepositoryError>;

    /// Count every record matching the filter.
    async fn count_by_author(&self, filter: &RecordListFilter)
    -> Result<u64, RecordRepositoryError>;

    /// Persist a mutated record if its stored revision is still
    /// `expected_revision`.
    ///
    /// The caller bumps `record.revision` and `record.updated_at` before
    /// saving. Fails with [`RecordRepositoryError::RevisionMismatch`] when
    /// another writer got there first.
    async fn save(
        &self,
        record: &Record,
        expected_revision: u32,
    ) -> Result<(), RecordRepositoryError>;
}
