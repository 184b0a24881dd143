//! Amazon ECR as registry credential provider and image store

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::types::ImageIdentifier;
use batchflow_build::{
    AuthError, CleanupResult, CredentialProvider, DeleteOutcome, ImageId, RegistryClient,
    RegistryCleanupError, RegistryCredentials,
};
use std::collections::HashSet;
use tokio::sync::OnceCell;

/// Token and endpoint from `GetAuthorizationToken`
#[derive(Debug, Clone)]
struct EcrAuthorization {
    token: String,
    proxy_endpoint: String,
}

/// ECR client for one account and region
pub struct AwsEcr {
    client: aws_sdk_ecr::Client,
    authorization: OnceCell<EcrAuthorization>,
}

impl AwsEcr {
    /// Load credentials from the standard AWS chain. `region` overrides
    /// whatever the environment configures.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self::from_client(aws_sdk_ecr::Client::new(&config))
    }

    pub fn from_client(client: aws_sdk_ecr::Client) -> Self {
        Self {
            client,
            authorization: OnceCell::new(),
        }
    }

    async fn authorization(&self) -> Result<&EcrAuthorization> {
        self.authorization
            .get_or_try_init(|| async {
                tracing::debug!("Requesting ECR authorization token");
                let output = self
                    .client
                    .get_authorization_token()
                    .send()
                    .await
                    .map_err(|e| AwsError::Api(DisplayErrorContext(&e).to_string()))?;

                let data = output
                    .authorization_data()
                    .first()
                    .ok_or(AwsError::MissingAuthorizationData)?;
                match (data.authorization_token(), data.proxy_endpoint()) {
                    (Some(token), Some(endpoint)) => Ok(EcrAuthorization {
                        token: token.to_string(),
                        proxy_endpoint: endpoint.to_string(),
                    }),
                    _ => Err(AwsError::MissingAuthorizationData),
                }
            })
            .await
    }

    /// All image ids of `repository`, following pagination.
    pub async fn list_images(&self, repository: &str) -> Result<Option<Vec<ImageId>>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let result = self
                .client
                .list_images()
                .repository_name(repository)
                .set_next_token(next_token.take())
                .send()
                .await;

            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    let service_error = e.into_service_error();
                    if service_error.is_repository_not_found_exception() {
                        return Ok(None);
                    }
                    return Err(AwsError::Api(
                        DisplayErrorContext(&service_error).to_string(),
                    ));
                }
            };

            for id in output.image_ids().iter().map(to_image_id) {
                // one entry per tag; a digest covers all of them
                if id.digest.as_ref().is_none_or(|d| seen.insert(d.clone())) {
                    ids.push(id);
                }
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        tracing::debug!(repository, count = ids.len(), "Listed ECR images");
        Ok(Some(ids))
    }

    pub async fn delete_images(&self, repository: &str, ids: &[ImageId]) -> Result<DeleteOutcome> {
        if ids.is_empty() {
            return Ok(DeleteOutcome::default());
        }

        let identifiers: Vec<ImageIdentifier> = ids
            .iter()
            .map(|id| match &id.digest {
                Some(digest) => ImageIdentifier::builder().image_digest(digest).build(),
                None => ImageIdentifier::builder().set_image_tag(id.tag.clone()).build(),
            })
            .collect();

        let output = self
            .client
            .batch_delete_image()
            .repository_name(repository)
            .set_image_ids(Some(identifiers))
            .send()
            .await
            .map_err(|e| AwsError::Api(DisplayErrorContext(&e).to_string()))?;

        let failures = output
            .failures()
            .iter()
            .map(|f| {
                let image = f
                    .image_id()
                    .map(|i| to_image_id(i).to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let code = f
                    .failure_code()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default();
                let reason = f.failure_reason().unwrap_or_default();
                format!("{}: {} {}", image, code, reason).trim_end().to_string()
            })
            .collect();

        Ok(DeleteOutcome {
            deleted: output.image_ids().len(),
            failures,
        })
    }
}

fn to_image_id(identifier: &ImageIdentifier) -> ImageId {
    ImageId {
        digest: identifier.image_digest().map(str::to_string),
        tag: identifier.image_tag().map(str::to_string),
    }
}

/// `https://123456789012.dkr.ecr.us-east-1.amazonaws.com` -> `123456789012.dkr.ecr.us-east-1.amazonaws.com`
pub fn registry_host_from_endpoint(endpoint: &str) -> String {
    endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

#[async_trait]
impl CredentialProvider for AwsEcr {
    async fn registry_host(&self) -> std::result::Result<String, AuthError> {
        let authorization = self
            .authorization()
            .await
            .map_err(|e| AuthError::new("ecr", e.to_string()))?;
        Ok(registry_host_from_endpoint(&authorization.proxy_endpoint))
    }

    async fn credentials(&self) -> std::result::Result<RegistryCredentials, AuthError> {
        let authorization = self
            .authorization()
            .await
            .map_err(|e| AuthError::new("ecr", e.to_string()))?;
        RegistryCredentials::from_basic_token(&authorization.token, &authorization.proxy_endpoint)
    }
}

#[async_trait]
impl RegistryClient for AwsEcr {
    async fn list_image_ids(&self, repository: &str) -> CleanupResult<Option<Vec<ImageId>>> {
        self.list_images(repository)
            .await
            .map_err(|e| RegistryCleanupError::Api {
                repository: repository.to_string(),
                message: e.to_string(),
            })
    }

    async fn batch_delete(&self, repository: &str, ids: &[ImageId]) -> CleanupResult<DeleteOutcome> {
        self.delete_images(repository, ids)
            .await
            .map_err(|e| RegistryCleanupError::Api {
                repository: repository.to_string(),
                message: e.to_string(),
            })
    }
}
