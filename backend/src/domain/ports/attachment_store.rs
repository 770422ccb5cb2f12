//! Port for storing uploaded attachments.

use std::fmt;

use async_trait::async_trait;

use crate::domain::AttachmentRef;

use super::define_port_error;

define_port_error! {
    /// Errors raised by attachment store adapters.
    pub enum AttachmentStoreError {
        /// The supplied file name cannot be stored.
        InvalidName { name: String } => "invalid attachment name: {name:?}",
        /// Writing the file failed.
        Write { message: String } => "attachment write failed: {message}",
    }
}

/// File uploaded alongside an update.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    /// Name supplied by the client.
    pub file_name: String,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

impl fmt::Debug for AttachmentUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.contents.len())
            .finish()
    }
}

/// Reduce a client-supplied name to the single path component adapters
/// store it under.
///
/// Returns `None` for names that are empty after trimming, `.` or `..`, or
/// that contain NUL.
pub fn attachment_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return None;
    }
    Some(name)
}

/// Port for writing attachments under the media root.
///
/// Files are keyed by name; storing a second file with the same name
/// replaces the first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Write `contents` and return a reference to the stored file.
    async fn store(
        &self,
        file_name: &str,
        contents: &[u8],
    ) -> Result<AttachmentRef, AttachmentStoreError>;
}
