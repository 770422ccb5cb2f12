//! Domain primitives, services and ports.
//!
//! Purpose: Define the strongly typed walk-in record model, bearer token
//! verification and the record service that ties them to the ports.
//! Adapters live under `inbound` and `outbound`; nothing in here knows
//! about HTTP or SQL.
//!
//! Public surface:
//! - Error / ErrorCode — API error payload and stable identifier.
//! - TokenVerifier / Authentication — bearer token verification.
//! - Record and its embedded documents.
//! - RecordService — implementation of the record driving ports.

pub mod error;
pub mod identity;
pub mod ports;
pub mod record;
pub mod record_service;
pub mod trace_id;

pub use self::error::{Error, ErrorCode, TRACE_ID_HEADER};
pub use self::identity::{
    Authentication, BearerToken, Claims, RejectionReason, TokenVerifier, TokenVerifierError,
};
pub use self::record::{
    AttachmentRef, AuditEntry, Author, AuthorUid, EmailEntry, EmailPayload, MissingUid,
    NewRecord, NumberVerification, PhoneNumber, PhoneNumberPayload, Record, RecordDetails,
    RecordId, RecordLocator, RecordValidationError, Student, StudentPayload, WALKIN_DETAILS_TYPE,
};
pub use self::record_service::{RecordService, UpdatePolicy};
pub use self::trace_id::TraceId;
