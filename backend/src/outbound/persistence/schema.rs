//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Walk-in visit records.
    ///
    /// Embedded documents are stored as JSONB. `author_uid` duplicates the
    /// `uid` claim from `author` so ownership filters can use a btree index.
    records (id) {
        /// Store-assigned identifier.
        id -> Int8,
        /// Ownership key copied from the author claims.
        author_uid -> Text,
        /// Student document: name, emails and numbers.
        student -> Jsonb,
        /// Full claim set of the creating user.
        author -> Jsonb,
        /// Latest attachment path.
        attachment -> Nullable<Text>,
        /// Latest `{comment, type}` details.
        details -> Nullable<Jsonb>,
        /// Append-only update history.
        audit_log -> Jsonb,
        /// Optimistic concurrency token.
        revision -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
    }
}
