//! PostgreSQL-backed `RecordRepository` implementation using Diesel ORM.
//!
//! Embedded documents are stored as JSONB and decoded into domain types on
//! read. Saves are revision-checked so concurrent updates surface as
//! `RevisionMismatch` instead of overwriting each other.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::domain::ports::{RecordListFilter, RecordRepository, RecordRepositoryError};
use crate::domain::{AttachmentRef, NewRecord, Record, RecordId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewRecordRow, RecordRow, RecordUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::records;

/// Diesel-backed implementation of the record repository port.
#[derive(Clone)]
pub struct DieselRecordRepository {
    pool: DbPool,
}

impl DieselRecordRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> RecordRepositoryError {
    map_basic_pool_error(error, RecordRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> RecordRepositoryError {
    map_basic_diesel_error(
        error,
        RecordRepositoryError::query,
        RecordRepositoryError::connection,
    )
}

fn encode<T: Serialize>(value: &T, field: &str) -> Result<serde_json::Value, RecordRepositoryError> {
    serde_json::to_value(value)
        .map_err(|err| RecordRepositoryError::query(format!("serialise {field}: {err}")))
}

fn decode<T: DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, RecordRepositoryError> {
    serde_json::from_value(value)
        .map_err(|err| RecordRepositoryError::query(format!("decode {field}: {err}")))
}

/// Cast domain revision (u32) to database revision (i32).
fn revision_to_db(revision: u32) -> Result<i32, RecordRepositoryError> {
    i32::try_from(revision)
        .map_err(|_| RecordRepositoryError::query(format!("revision {revision} exceeds i32")))
}

#[expect(
    clippy::cast_sign_loss,
    reason = "a check constraint keeps revision >= 1"
)]
fn revision_from_db(revision: i32) -> u32 {
    revision as u32
}

fn page_bounds(page: PageRequest) -> Result<(i64, i64), RecordRepositoryError> {
    let limit = i64::from(page.limit());
    let offset = i64::try_from(page.offset())
        .map_err(|_| RecordRepositoryError::query("requested page exceeds i64 range"))?;
    Ok((limit, offset))
}

/// Containment probe matching any student whose numbers include `number`.
fn number_probe(number: &str) -> serde_json::Value {
    json!({ "numbers": [{ "number": number }] })
}

/// Convert a database row into a domain record.
fn row_to_record(row: RecordRow) -> Result<Record, RecordRepositoryError> {
    let RecordRow {
        id,
        author_uid: _,
        student,
        author,
        attachment,
        details,
        audit_log,
        revision,
        created_at,
        updated_at,
    } = row;

    Ok(Record {
        id: RecordId::new(id),
        student: decode(student, "student")?,
        author: decode(author, "author")?,
        attachment: attachment.map(AttachmentRef::new),
        details: details.map(|value| decode(value, "details")).transpose()?,
        audit_log: decode(audit_log, "audit_log")?,
        revision: revision_from_db(revision),
        created_at,
        updated_at,
    })
}

fn filtered(filter: &RecordListFilter) -> records::BoxedQuery<'static, Pg> {
    let mut query = records::table
        .filter(records::author_uid.eq(filter.author.as_str().to_owned()))
        .into_boxed();
    if let Some(number) = &filter.number {
        query = query.filter(records::student.contains(number_probe(number)));
    }
    query
}

/// Explain why a revision-checked update touched no rows.
async fn handle_update_failure<C>(
    conn: &mut C,
    id: i64,
    expected_revision: u32,
) -> RecordRepositoryError
where
    C: diesel_async::AsyncConnection<Backend = Pg> + Send,
{
    let current = records::table
        .filter(records::id.eq(id))
        .select(records::revision)
        .first::<i32>(conn)
        .await
        .optional()
        .map_err(map_diesel_error);

    match current {
        Ok(Some(actual)) => {
            RecordRepositoryError::revision_mismatch(expected_revision, revision_from_db(actual))
        }
        Ok(None) => RecordRepositoryError::query(format!("record {id} not found for update")),
        Err(err) => err,
    }
}

#[async_trait]
impl RecordRepository for DieselRecordRepository {
    async fn create(&self, record: &NewRecord) -> Result<Record, RecordRepositoryError> {
        let row = NewRecordRow {
            author_uid: record.author.uid().as_str(),
            student: encode(&record.student, "student")?,
            author: encode(&record.author, "author")?,
            audit_log: json!([]),
            revision: 1,
            created_at: record.created_at,
            updated_at: record.created_at,
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let stored = diesel::insert_into(records::table)
            .values(&row)
            .returning(RecordRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_record(stored)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        records::table
            .filter(records::id.eq(id.get()))
            .select(RecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_record)
            .transpose()
    }

    async fn find_latest_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Record>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        records::table
            .filter(records::student.contains(number_probe(number)))
            .order((records::created_at.desc(), records::id.desc()))
            .select(RecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_record)
            .transpose()
    }

    async fn list_by_author(
        &self,
        filter: &RecordListFilter,
        page: PageRequest,
    ) -> Result<Vec<Record>, RecordRepositoryError> {
        let (limit, offset) = page_bounds(page)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = filtered(filter)
            .order((records::created_at.desc(), records::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(RecordRow::as_select())
            .load::<RecordRow>(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn count_by_author(
        &self,
        filter: &RecordListFilter,
    ) -> Result<u64, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = filtered(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        u64::try_from(total).map_err(|_| RecordRepositoryError::query("negative record count"))
    }

    async fn save(
        &self,
        record: &Record,
        expected_revision: u32,
    ) -> Result<(), RecordRepositoryError> {
        let update = RecordUpdate {
            student: encode(&record.student, "student")?,
            attachment: record.attachment.as_ref().map(AttachmentRef::as_str),
            details: record
                .details
                .as_ref()
                .map(|details| encode(details, "details"))
                .transpose()?,
            audit_log: encode(&record.audit_log, "audit_log")?,
            revision: revision_to_db(record.revision)?,
            updated_at: record.updated_at,
        };
        let expected = revision_to_db(expected_revision)?;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated_rows = diesel::update(records::table)
            .filter(
                records::id
                    .eq(record.id.get())
                    .and(records::revision.eq(expected)),
            )
            .set(&update)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if updated_rows == 0 {
            return Err(handle_update_failure(&mut conn, record.id.get(), expected_revision).await);
        }
        Ok(())
    }
}
