//! Image lifecycle: reference, build, push and teardown cleanup
//!
//! [`ImageLifecycle`] only sequences the capabilities it is given; every
//! side effect goes through [`ContainerEngine`], [`CredentialProvider`] or
//! [`RegistryClient`]. Nothing here retries.

use crate::auth::CredentialProvider;
use crate::context::ContextBuilder;
use crate::dockerfile::DockerfileSource;
use crate::engine::ContainerEngine;
use crate::error::{BuildError, BuildResult, CleanupResult, PushError, PushResult, RegistryCleanupError};
use crate::reference::{ImageReference, content_tag};
use crate::registry::{DELETE_BATCH_SIZE, RegistryClient};
use batchflow_core::Naming;
use std::path::Path;

/// Summary of a teardown cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    /// The repository was already gone
    pub repository_missing: bool,
}

/// `<stage>-<digest>` over the build context and the resolved Dockerfile.
///
/// Needs no registry access, so job definitions can be compiled offline.
pub fn derive_tag(naming: &Naming, context: &Path, runtime: &str) -> BuildResult<String> {
    let dockerfile = DockerfileSource::resolve(context, runtime).contents()?;
    let digest = ContextBuilder::digest(context, &dockerfile)?;
    content_tag(naming.stage(), &digest)
}

pub struct ImageLifecycle<'a> {
    engine: &'a dyn ContainerEngine,
    credentials: &'a dyn CredentialProvider,
    registry: &'a dyn RegistryClient,
}

impl<'a> ImageLifecycle<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        credentials: &'a dyn CredentialProvider,
        registry: &'a dyn RegistryClient,
    ) -> Self {
        Self {
            engine,
            credentials,
            registry,
        }
    }

    /// The image reference for this deployment.
    ///
    /// The tag comes from [`derive_tag`], so unchanged content yields the
    /// same reference.
    pub async fn provision_reference(
        &self,
        naming: &Naming,
        context: &Path,
        runtime: &str,
    ) -> BuildResult<ImageReference> {
        let tag = derive_tag(naming, context, runtime)?;
        self.reference_for_tag(naming, &tag).await
    }

    /// The image reference for an already derived tag
    pub async fn reference_for_tag(&self, naming: &Naming, tag: &str) -> BuildResult<ImageReference> {
        let host = self.credentials.registry_host().await?;
        let reference = ImageReference::new(naming.ecr_repository_uri(&host), tag)?;

        tracing::debug!(image = %reference, "Provisioned image reference");
        Ok(reference)
    }

    pub async fn build(
        &self,
        context: &Path,
        runtime: &str,
        reference: &ImageReference,
    ) -> BuildResult<()> {
        if !context.is_dir() {
            return Err(BuildError::ContextNotFound(context.to_path_buf()));
        }
        let dockerfile = DockerfileSource::resolve(context, runtime);
        let archive = ContextBuilder::create_context(context, &dockerfile.contents()?)?;
        self.engine.build(archive, reference).await
    }

    /// Push a previously built image. A single failure aborts.
    pub async fn push(&self, reference: &ImageReference) -> PushResult<()> {
        if !self.engine.image_exists(reference).await? {
            return Err(PushError::ImageNotBuilt {
                image: reference.full_name(),
            });
        }
        let credentials = self.credentials.credentials().await?;
        self.engine.push(reference, &credentials).await
    }

    /// Remove every image stored in `repository`.
    ///
    /// A missing repository counts as already clean.
    pub async fn delete_all(&self, repository: &str) -> CleanupResult<CleanupReport> {
        let Some(ids) = self.registry.list_image_ids(repository).await? else {
            tracing::info!(repository, "Repository does not exist, nothing to delete");
            return Ok(CleanupReport {
                deleted: 0,
                repository_missing: true,
            });
        };

        let mut deleted = 0;
        let mut failures = Vec::new();
        for chunk in ids.chunks(DELETE_BATCH_SIZE) {
            let outcome = self.registry.batch_delete(repository, chunk).await?;
            deleted += outcome.deleted;
            failures.extend(outcome.failures);
        }

        if !failures.is_empty() {
            return Err(RegistryCleanupError::PartialFailure {
                repository: repository.to_string(),
                deleted,
                failures,
            });
        }

        tracing::info!(repository, deleted, "Deleted registry images");
        Ok(CleanupReport {
            deleted,
            repository_missing: false,
        })
    }
}
