use std::path::PathBuf;
use thiserror::Error;

/// Registry authentication failed or the registry endpoint is unknown
#[derive(Debug, Error)]
#[error("Authentication failed for {registry}: {message}")]
pub struct AuthError {
    pub registry: String,
    pub message: String,
}

impl AuthError {
    pub fn new(registry: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Invalid build context: {0}")]
    InvalidContext(String),

    #[error("Invalid image tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("Build failed for {image}{}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Failed {
        image: String,
        status: Option<i64>,
        /// Last lines of the build output
        output_tail: Vec<String>,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Failed {
                image, output_tail, ..
            } => {
                let mut message = format!("{}\n", self);
                if !output_tail.is_empty() {
                    message.push_str("\nビルド出力 (末尾):\n");
                    for line in output_tail {
                        message.push_str("  ");
                        message.push_str(line);
                        message.push('\n');
                    }
                }
                message.push_str(&format!(
                    "\n{} の Dockerfile とビルドコンテキストを確認してください。",
                    image
                ));
                message
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     --context でディレクトリを指定してください。",
                    path.display()
                )
            }
            _ => format!("{}", self),
        }
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Image {image} has not been built; run the build step before pushing")]
    ImageNotBuilt { image: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Push failed for {image}: {message}")]
    TransferFailed { image: String, message: String },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),
}

#[derive(Debug, Error)]
pub enum RegistryCleanupError {
    #[error(
        "Deleted {deleted} image(s) from {repository}, {} could not be deleted: {}",
        failures.len(),
        failures.join(", ")
    )]
    PartialFailure {
        repository: String,
        deleted: usize,
        failures: Vec<String>,
    },

    #[error("Registry request for {repository} failed: {message}")]
    Api { repository: String, message: String },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type PushResult<T> = std::result::Result<T, PushError>;
pub type CleanupResult<T> = std::result::Result<T, RegistryCleanupError>;
