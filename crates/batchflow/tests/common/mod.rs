use async_trait::async_trait;
use batchflow::{BatchPlugin, Capabilities};
use batchflow_build::{
    AuthError, BuildResult, CleanupResult, ContainerEngine, CredentialProvider, DeleteOutcome,
    ImageId, ImageReference, PushResult, RegistryClient, RegistryCleanupError,
    RegistryCredentials,
};
use batchflow_config::ServiceDescription;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const REGISTRY_HOST: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

pub const SERVICE_YML: &str = r#"
service: image-service
provider:
  name: aws
  stage: dev
  runtime: python3.8
  iamRoleStatements:
    - Effect: Allow
      Action: ["s3:GetObject"]
      Resource: "arn:aws:s3:::images/*"
  batch:
    Type: EC2
    MaxvCpus: 16
    Subnets: ["subnet-1"]
    SecurityGroupIds: ["sg-1"]
functions:
  resize:
    handler: handler.resize
    batch:
      ContainerProperties:
        Memory: 4096
        Vcpus: 2
        Environment:
          BUCKET: images
      RetryStrategy:
        Attempts: 2
  ping:
    handler: handler.ping
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("handler.py"), "def resize(event, context):\n    pass\n")
            .unwrap();
        Self { root }
    }

    pub fn write_service_file(&self, content: &str) {
        fs::write(self.root.path().join("serverless.yml"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn description(&self) -> ServiceDescription {
        batchflow_config::load_service_description(&self.root.path().join("serverless.yml"))
            .unwrap()
    }

    /// A project with [`SERVICE_YML`] and fresh fakes
    #[allow(dead_code)]
    pub fn plugin(&self) -> (BatchPlugin, Fakes) {
        self.write_service_file(SERVICE_YML);
        let fakes = Fakes::default();
        let plugin = BatchPlugin::new(self.description(), self.path())
            .unwrap()
            .with_capabilities(fakes.capabilities());
        (plugin, fakes)
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub built: Mutex<HashSet<String>>,
    pub pushed: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build(&self, context: Vec<u8>, reference: &ImageReference) -> BuildResult<()> {
        assert!(!context.is_empty());
        self.built.lock().unwrap().insert(reference.full_name());
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageReference) -> PushResult<bool> {
        Ok(self.built.lock().unwrap().contains(&reference.full_name()))
    }

    async fn push(
        &self,
        reference: &ImageReference,
        _credentials: &RegistryCredentials,
    ) -> PushResult<()> {
        self.pushed.lock().unwrap().push(reference.full_name());
        Ok(())
    }
}

pub struct FakeCredentials;

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn registry_host(&self) -> Result<String, AuthError> {
        Ok(REGISTRY_HOST.to_string())
    }

    async fn credentials(&self) -> Result<RegistryCredentials, AuthError> {
        Ok(RegistryCredentials {
            username: "AWS".to_string(),
            password: "token".to_string(),
            server_address: format!("https://{}", REGISTRY_HOST),
        })
    }
}

/// Credentials for an account whose registry token was revoked
pub struct DenyingCredentials;

#[async_trait]
impl CredentialProvider for DenyingCredentials {
    async fn registry_host(&self) -> Result<String, AuthError> {
        Err(AuthError::new("ecr", "ExpiredTokenException: token has expired"))
    }

    async fn credentials(&self) -> Result<RegistryCredentials, AuthError> {
        Err(AuthError::new("ecr", "ExpiredTokenException: token has expired"))
    }
}

/// In-memory registry. `None` images means the repository does not exist.
#[derive(Default)]
pub struct FakeRegistry {
    pub images: Mutex<Option<Vec<ImageId>>>,
    pub unavailable: bool,
    pub delete_calls: Mutex<Vec<usize>>,
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn list_image_ids(&self, repository: &str) -> CleanupResult<Option<Vec<ImageId>>> {
        if self.unavailable {
            return Err(RegistryCleanupError::Api {
                repository: repository.to_string(),
                message: "service unavailable".to_string(),
            });
        }
        Ok(self.images.lock().unwrap().clone())
    }

    async fn batch_delete(&self, _repository: &str, ids: &[ImageId]) -> CleanupResult<DeleteOutcome> {
        self.delete_calls.lock().unwrap().push(ids.len());
        let mut images = self.images.lock().unwrap();
        if let Some(images) = images.as_mut() {
            images.retain(|image| !ids.contains(image));
        }
        Ok(DeleteOutcome {
            deleted: ids.len(),
            failures: Vec::new(),
        })
    }
}

#[derive(Clone, Default)]
pub struct Fakes {
    pub engine: Arc<FakeEngine>,
    pub registry: Arc<FakeRegistry>,
    pub credentials_denied: bool,
}

impl Fakes {
    #[allow(dead_code)]
    pub fn with_registry(registry: FakeRegistry) -> Self {
        Self {
            engine: Arc::default(),
            registry: Arc::new(registry),
            credentials_denied: false,
        }
    }

    #[allow(dead_code)]
    pub fn denying_credentials() -> Self {
        Self {
            credentials_denied: true,
            ..Self::default()
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let credentials: Arc<dyn CredentialProvider> = if self.credentials_denied {
            Arc::new(DenyingCredentials)
        } else {
            Arc::new(FakeCredentials)
        };
        Capabilities {
            engine: self.engine.clone(),
            credentials,
            registry: self.registry.clone(),
        }
    }
}
