//! コンテナエンジン抽象

use crate::auth::RegistryCredentials;
use crate::error::{BuildResult, PushResult};
use crate::reference::ImageReference;
use async_trait::async_trait;

/// イメージのビルドとプッシュを行うエンジン
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// tar.gz のビルドコンテキストから `reference` をビルド
    async fn build(&self, context: Vec<u8>, reference: &ImageReference) -> BuildResult<()>;

    /// ローカルにイメージが存在するか
    async fn image_exists(&self, reference: &ImageReference) -> PushResult<bool>;

    async fn push(
        &self,
        reference: &ImageReference,
        credentials: &RegistryCredentials,
    ) -> PushResult<()>;
}
