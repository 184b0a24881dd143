pub mod error;
pub mod model;

pub use error::*;
pub use model::{FunctionDescription, ProviderDescription, ServiceDescription};

use std::path::{Path, PathBuf};

/// サービス定義ファイル名の候補 (優先順)
pub const SERVICE_FILE_CANDIDATES: &[&str] =
    &["serverless.yml", "serverless.yaml", "serverless.json"];

/// プロジェクトのサービス定義ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 BATCHFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: serverless.yml, serverless.yaml, serverless.json
pub fn find_service_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("BATCHFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "BATCHFLOW_CONFIG_PATH does not exist, searching the current directory");
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    find_service_file_in(&current_dir)
}

/// 指定ディレクトリ内でサービス定義ファイルを探す
pub fn find_service_file_in(dir: &Path) -> Result<PathBuf> {
    SERVICE_FILE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
        .ok_or(ConfigError::ServiceFileNotFound)
}

/// サービス定義ファイルを読み込む
///
/// JSON は YAML のサブセットなので、どちらも同じパーサーで読む。
pub fn load_service_description(path: &Path) -> Result<ServiceDescription> {
    let content = std::fs::read_to_string(path)?;
    let description: ServiceDescription =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if description.service.trim().is_empty() {
        return Err(ConfigError::InvalidService(
            "`service` が空です".to_string(),
        ));
    }
    if description.provider.stage.trim().is_empty() {
        return Err(ConfigError::InvalidService(
            "`provider.stage` が空です".to_string(),
        ));
    }

    tracing::debug!(
        path = %path.display(),
        service = %description.service,
        functions = description.functions.len(),
        "Loaded service description"
    );
    Ok(description)
}
