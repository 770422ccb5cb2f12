//! Walk-in visit record service.
//!
//! Staff authenticate with HS256 bearer tokens, create records for
//! visiting students, list their own records and later update contact
//! verification, comments and attachments.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(feature = "test-support")]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
