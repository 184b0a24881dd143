//! サービス定義ファイルのモデル
//!
//! batchflow が参照するキーだけを読み込み、それ以外は無視する。
//! `batch` ブロックは生の値のまま保持し、検証は batchflow-core で行う。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_RUNTIME: &str = "python3.8";

/// サービス定義全体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    /// サービス名
    pub service: String,

    #[serde(default)]
    pub provider: ProviderDescription,

    /// 関数名 → 関数定義
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDescription>,
}

/// `provider` ブロック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescription {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_stage")]
    pub stage: String,

    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// ジョブ実行ロールに付与する IAM ステートメント
    #[serde(default)]
    pub iam_role_statements: Vec<Value>,

    /// プロバイダーレベルの `batch` ブロック (未検証)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Value>,
}

impl Default for ProviderDescription {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            region: default_region(),
            stage: default_stage(),
            runtime: default_runtime(),
            iam_role_statements: Vec::new(),
            batch: None,
        }
    }
}

/// `functions.<name>` ブロック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub handler: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// 関数レベルの `batch` ブロック。存在する関数だけがバッチタスクになる
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Value>,
}

fn default_provider_name() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

impl ServiceDescription {
    /// `batch` ブロックを持つ関数を名前順で返す
    pub fn batch_functions(&self) -> impl Iterator<Item = (&str, &FunctionDescription, &Value)> {
        self.functions
            .iter()
            .filter_map(|(name, f)| f.batch.as_ref().map(|b| (name.as_str(), f, b)))
    }

    /// コンテナのベースイメージに使うランタイム
    ///
    /// 関数ごとの指定があればそれを、なければプロバイダーの指定を使う。
    /// 複数の関数が別々のランタイムを指定している場合は最初のものを採用する。
    pub fn batch_runtime(&self) -> &str {
        self.batch_functions()
            .find_map(|(_, f, _)| f.runtime.as_deref())
            .unwrap_or(&self.provider.runtime)
    }

    /// ステージを上書きする (CLI の `--stage` 用)
    pub fn with_stage(mut self, stage: Option<&str>) -> Self {
        if let Some(stage) = stage.filter(|s| !s.is_empty()) {
            self.provider.stage = stage.to_string();
        }
        self
    }

    /// リージョンを上書きする
    pub fn with_region(mut self, region: Option<&str>) -> Self {
        if let Some(region) = region.filter(|r| !r.is_empty()) {
            self.provider.region = region.to_string();
        }
        self
    }
}
