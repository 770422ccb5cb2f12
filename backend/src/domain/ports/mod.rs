//! Domain ports for the hexagonal boundary.
//!
//! Driven ports (`RecordRepository`, `AttachmentStore`) are implemented by
//! outbound adapters; driving ports (`RecordCommand`, `RecordQuery`) are
//! implemented by the record service and called by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod attachment_store;
mod record_command;
mod record_query;
mod record_repository;

#[cfg(test)]
pub use attachment_store::MockAttachmentStore;
pub use attachment_store::{
    AttachmentStore, AttachmentStoreError, AttachmentUpload, attachment_file_name,
};
#[cfg(test)]
pub use record_command::MockRecordCommand;
pub use record_command::{
    CreateRecordRequest, CreateRecordResponse, RecordCommand, UpdateRecordRequest,
    UpdateRecordResponse,
};
#[cfg(test)]
pub use record_query::MockRecordQuery;
pub use record_query::{ListRecordsRequest, ListRecordsResponse, RecordQuery};
#[cfg(test)]
pub use record_repository::MockRecordRepository;
pub use record_repository::{RecordListFilter, RecordRepository, RecordRepositoryError};
