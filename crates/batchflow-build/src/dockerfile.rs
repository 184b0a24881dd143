//! Dockerfile の解決
//!
//! ビルドコンテキスト直下の `Dockerfile` があればそれを使い、
//! なければ関数ランタイムのベースイメージから生成する。

use crate::error::BuildResult;
use std::path::{Path, PathBuf};

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// 生成 Dockerfile のベースイメージ
pub const BASE_IMAGE: &str = "lambci/lambda";

/// 関数コードの配置先
pub const TASK_ROOT: &str = "/var/task";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerfileSource {
    /// コンテキスト内の既存ファイル
    Existing(PathBuf),

    /// ランタイムから生成した内容
    Generated(String),
}

impl DockerfileSource {
    /// コンテキストとランタイムから Dockerfile を決定
    pub fn resolve(context: &Path, runtime: &str) -> Self {
        let candidate = context.join(DOCKERFILE_NAME);
        if candidate.is_file() {
            tracing::debug!("Using Dockerfile: {}", candidate.display());
            DockerfileSource::Existing(candidate)
        } else {
            tracing::debug!("No Dockerfile in context, generating one for {}", runtime);
            DockerfileSource::Generated(generate(runtime))
        }
    }

    pub fn contents(&self) -> BuildResult<Vec<u8>> {
        match self {
            DockerfileSource::Existing(path) => Ok(std::fs::read(path)?),
            DockerfileSource::Generated(content) => Ok(content.clone().into_bytes()),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, DockerfileSource::Generated(_))
    }
}

/// ランタイム用の Dockerfile を生成
pub fn generate(runtime: &str) -> String {
    format!(
        "FROM {BASE_IMAGE}:{runtime}\n\
         COPY . {TASK_ROOT}\n\
         WORKDIR {TASK_ROOT}\n"
    )
}
