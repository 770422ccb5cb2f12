//! Filesystem attachment store.
//!
//! Uploads are written beneath a single media root opened with `cap-std`,
//! so a client-supplied name can never escape it. Only the final path
//! component of the supplied name is used.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use tracing::debug;

use crate::domain::AttachmentRef;
use crate::domain::ports::{AttachmentStore, AttachmentStoreError, attachment_file_name};

/// Attachment store rooted at a directory on local disk.
#[derive(Clone)]
pub struct CapStdAttachmentStore {
    root: Arc<Dir>,
    label: String,
}

impl CapStdAttachmentStore {
    /// Open `media_root`, creating it when missing.
    ///
    /// Stored references are `"<media_root>/<file name>"`.
    pub fn open(media_root: &Path) -> std::io::Result<Self> {
        Dir::create_ambient_dir_all(media_root, ambient_authority())?;
        let root = Dir::open_ambient_dir(media_root, ambient_authority())?;
        Ok(Self {
            root: Arc::new(root),
            label: media_root
                .to_string_lossy()
                .trim_end_matches('/')
                .to_owned(),
        })
    }
}

#[async_trait]
impl AttachmentStore for CapStdAttachmentStore {
    async fn store(
        &self,
        file_name: &str,
        contents: &[u8],
    ) -> Result<AttachmentRef, AttachmentStoreError> {
        let name = attachment_file_name(file_name)
            .ok_or_else(|| AttachmentStoreError::invalid_name(file_name))?
            .to_owned();

        let root = Arc::clone(&self.root);
        let target = name.clone();
        let bytes = contents.to_vec();
        tokio::task::spawn_blocking(move || root.write(&target, bytes))
            .await
            .map_err(|err| AttachmentStoreError::write(err.to_string()))?
            .map_err(|err| AttachmentStoreError::write(format!("{name}: {err}")))?;

        debug!(file = %name, bytes = contents.len(), "attachment stored");
        Ok(AttachmentRef::new(format!("{}/{name}", self.label)))
    }
}
