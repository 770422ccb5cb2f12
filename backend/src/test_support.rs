//! In-memory adapters for integration tests.
//!
//! Compiled with the `test-support` feature. The adapters honour the same
//! contracts as the production ones: ids are assigned in insertion order,
//! listings are newest first and saves are revision-checked.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pagination::PageRequest;

use crate::domain::ports::{
    AttachmentStore, AttachmentStoreError, RecordListFilter, RecordRepository,
    RecordRepositoryError, attachment_file_name,
};
use crate::domain::{AttachmentRef, NewRecord, Record, RecordId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct RecordTable {
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

/// Record repository backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    table: Mutex<RecordTable>,
}

impl InMemoryRecordRepository {
    /// Snapshot of every stored record, in id order.
    pub fn records(&self) -> Vec<Record> {
        lock(&self.table).rows.values().cloned().collect()
    }

    /// Overwrite a stored record without a revision check.
    ///
    /// Lets tests simulate a concurrent writer.
    pub fn force_put(&self, record: Record) {
        lock(&self.table).rows.insert(record.id.get(), record);
    }

    fn newest_first(rows: &BTreeMap<i64, Record>) -> Vec<&Record> {
        let mut ordered: Vec<&Record> = rows.values().collect();
        ordered.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.get().cmp(&a.id.get()))
        });
        ordered
    }

    fn matching<'a>(
        rows: &'a BTreeMap<i64, Record>,
        filter: &RecordListFilter,
    ) -> Vec<&'a Record> {
        Self::newest_first(rows)
            .into_iter()
            .filter(|record| record.is_owned_by(&filter.author))
            .filter(|record| {
                filter
                    .number
                    .as_deref()
                    .is_none_or(|number| record.student.has_number(number))
            })
            .collect()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn create(&self, record: &NewRecord) -> Result<Record, RecordRepositoryError> {
        let mut table = lock(&self.table);
        table.next_id += 1;
        let stored = Record {
            id: RecordId::new(table.next_id),
            student: record.student.clone(),
            author: record.author.clone(),
            attachment: None,
            details: None,
            audit_log: Vec::new(),
            revision: 1,
            created_at: record.created_at,
            updated_at: record.created_at,
        };
        table.rows.insert(stored.id.get(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, RecordRepositoryError> {
        Ok(lock(&self.table).rows.get(&id.get()).cloned())
    }

    async fn find_latest_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Record>, RecordRepositoryError> {
        let table = lock(&self.table);
        Ok(Self::newest_first(&table.rows)
            .into_iter()
            .find(|record| record.student.has_number(number))
            .cloned())
    }

    async fn list_by_author(
        &self,
        filter: &RecordListFilter,
        page: PageRequest,
    ) -> Result<Vec<Record>, RecordRepositoryError> {
        let skip = usize::try_from(page.offset())
            .map_err(|_| RecordRepositoryError::query("requested page exceeds usize range"))?;
        let take = usize::try_from(page.limit())
            .map_err(|_| RecordRepositoryError::query("page size exceeds usize range"))?;
        let table = lock(&self.table);
        Ok(Self::matching(&table.rows, filter)
            .into_iter()
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn count_by_author(
        &self,
        filter: &RecordListFilter,
    ) -> Result<u64, RecordRepositoryError> {
        let table = lock(&self.table);
        u64::try_from(Self::matching(&table.rows, filter).len())
            .map_err(|_| RecordRepositoryError::query("record count exceeds u64 range"))
    }

    async fn save(
        &self,
        record: &Record,
        expected_revision: u32,
    ) -> Result<(), RecordRepositoryError> {
        let mut table = lock(&self.table);
        let stored = table.rows.get_mut(&record.id.get()).ok_or_else(|| {
            RecordRepositoryError::query(format!("record {} not found for update", record.id))
        })?;
        if stored.revision != expected_revision {
            return Err(RecordRepositoryError::revision_mismatch(
                expected_revision,
                stored.revision,
            ));
        }
        *stored = record.clone();
        Ok(())
    }
}

/// Attachment store that keeps uploads in memory, keyed by file name.
#[derive(Debug, Default)]
pub struct InMemoryAttachmentStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryAttachmentStore {
    /// Contents stored under `file_name`, if any.
    pub fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(file_name).cloned()
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn store(
        &self,
        file_name: &str,
        contents: &[u8],
    ) -> Result<AttachmentRef, AttachmentStoreError> {
        let name = attachment_file_name(file_name)
            .ok_or_else(|| AttachmentStoreError::invalid_name(file_name))?
            .to_owned();
        lock(&self.files).insert(name.clone(), contents.to_vec());
        Ok(AttachmentRef::new(format!("media/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn attachment_names_follow_the_filesystem_store() {
        let store = InMemoryAttachmentStore::default();

        let reference = store
            .store("uploads/ consent.pdf ", b"PDF")
            .await
            .expect("name is usable");
        assert_eq!(reference.as_str(), "media/consent.pdf");
        assert_eq!(store.get("consent.pdf"), Some(b"PDF".to_vec()));

        let error = store
            .store("bad\0name.pdf", b"x")
            .await
            .expect_err("NUL is rejected");
        assert!(matches!(error, AttachmentStoreError::InvalidName { .. }));
    }
}
