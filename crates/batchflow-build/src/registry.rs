//! Registry-side image storage

use crate::error::CleanupResult;
use async_trait::async_trait;

/// Largest id list one delete request accepts
pub const DELETE_BATCH_SIZE: usize = 100;

/// One stored image, by digest and/or tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ImageId {
    pub digest: Option<String>,
    pub tag: Option<String>,
}

impl ImageId {
    pub fn digest(digest: impl Into<String>) -> Self {
        Self {
            digest: Some(digest.into()),
            tag: None,
        }
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => f.write_str(tag),
            (None, Some(digest)) => f.write_str(digest),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

/// Result of one delete request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: usize,
    /// `<image>: <reason>` per image the registry refused to delete
    pub failures: Vec<String>,
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Every image stored in `repository`, or `None` when the repository does not exist.
    async fn list_image_ids(&self, repository: &str) -> CleanupResult<Option<Vec<ImageId>>>;

    /// Delete at most [`DELETE_BATCH_SIZE`] images.
    async fn batch_delete(&self, repository: &str, ids: &[ImageId]) -> CleanupResult<DeleteOutcome>;
}
