use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "サービス定義ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: serverless.yml, serverless.yaml, serverless.json\n\
        または BATCHFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ServiceFileNotFound,

    #[error("サービス定義の解析に失敗しました ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("サービス定義が不正です: {0}")]
    InvalidService(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
