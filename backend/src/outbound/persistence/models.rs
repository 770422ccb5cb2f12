//! Internal Diesel row structs for the `records` table.
//!
//! These types never leave the persistence layer; the repository converts
//! them to and from domain records.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::records;

/// Row struct for reading from the records table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RecordRow {
    pub id: i64,
    #[expect(dead_code, reason = "author_uid is derived from the author document")]
    pub author_uid: String,
    pub student: serde_json::Value,
    pub author: serde_json::Value,
    pub attachment: Option<String>,
    pub details: Option<serde_json::Value>,
    pub audit_log: serde_json::Value,
    pub revision: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = records)]
pub(crate) struct NewRecordRow<'a> {
    pub author_uid: &'a str,
    pub student: serde_json::Value,
    pub author: serde_json::Value,
    pub audit_log: serde_json::Value,
    pub revision: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied by a revision-checked save.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = records)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct RecordUpdate<'a> {
    pub student: serde_json::Value,
    pub attachment: Option<&'a str>,
    pub details: Option<serde_json::Value>,
    pub audit_log: serde_json::Value,
    pub revision: i32,
    pub updated_at: DateTime<Utc>,
}
