//! レジストリ認証
//!
//! 認証情報の取得はクラウドごとの実装 ([`CredentialProvider`]) に委譲し、
//! ここでは Bollard の DockerCredentials への変換を受け持つ。

use crate::error::AuthError;
use async_trait::async_trait;
use base64::Engine;
use bollard::auth::DockerCredentials;

/// レジストリへのログイン情報
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// 例: `https://123456789012.dkr.ecr.us-east-1.amazonaws.com`
    pub server_address: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("server_address", &self.server_address)
            .finish()
    }
}

impl RegistryCredentials {
    /// Base64エンコードされた "username:password" をデコード
    pub fn from_basic_token(token: &str, server_address: &str) -> Result<Self, AuthError> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token.trim())
            .map_err(|e| AuthError::new(server_address, format!("Failed to decode token: {}", e)))?;

        let auth_str = String::from_utf8(decoded).map_err(|e| {
            AuthError::new(server_address, format!("Invalid UTF-8 in token: {}", e))
        })?;

        let (username, password) = auth_str.split_once(':').ok_or_else(|| {
            AuthError::new(server_address, "Token is not in user:password form")
        })?;

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            server_address: server_address.to_string(),
        })
    }

    pub fn to_docker_credentials(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            serveraddress: Some(self.server_address.clone()),
            ..Default::default()
        }
    }
}

/// レジストリのエンドポイントと認証情報を提供する
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// レジストリホスト (スキームなし)
    async fn registry_host(&self) -> Result<String, AuthError>;

    /// プッシュ用の一時的な認証情報
    async fn credentials(&self) -> Result<RegistryCredentials, AuthError>;
}
