//! イメージ参照 (リポジトリ + タグ)

use crate::error::{BuildError, BuildResult};
use std::fmt;

/// 内容ダイジェストのうちタグに使う桁数
pub const DIGEST_TAG_LENGTH: usize = 12;

/// Docker タグの最大長
const MAX_TAG_LENGTH: usize = 128;

/// デプロイ 1 回分のイメージ参照
///
/// ビルド・プッシュ・ジョブ定義のすべてが同じ値を使う。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// タグを検証して作成
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> BuildResult<Self> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(Self {
            repository: repository.into(),
            tag,
        })
    }

    /// レジストリ込みのリポジトリ (タグなし)
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `<repository>:<tag>`
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// リポジトリ先頭のレジストリホスト
    ///
    /// # Examples
    /// - `123456.dkr.ecr.us-east-1.amazonaws.com/svc-dev` -> `123456.dkr.ecr.us-east-1.amazonaws.com`
    /// - `svc-dev` -> `docker.io`
    pub fn registry(&self) -> &str {
        match self.repository.split_once('/') {
            Some((first, _)) if first.contains('.') || first.contains(':') => first,
            _ => "docker.io",
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// ステージと内容ダイジェストからタグを作る: `<stage>-<digest 先頭 12 桁>`
pub fn content_tag(stage: &str, digest_hex: &str) -> BuildResult<String> {
    let short = digest_hex.get(..DIGEST_TAG_LENGTH).unwrap_or(digest_hex);
    let tag = format!("{}-{}", sanitize_stage(stage), short);
    validate_tag(&tag)?;
    Ok(tag)
}

/// タグに使えない文字を `_` に置き換える
fn sanitize_stage(stage: &str) -> String {
    stage
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// タグのバリデーション
///
/// Docker タグの制約:
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    let invalid = |reason: String| BuildError::InvalidTag {
        tag: tag.to_string(),
        reason,
    };

    if tag.is_empty() {
        return Err(invalid("tag is empty".to_string()));
    }

    if tag.len() > MAX_TAG_LENGTH {
        return Err(invalid(format!(
            "too long ({} characters, max {})",
            tag.len(),
            MAX_TAG_LENGTH
        )));
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(invalid("must not start with '.' or '-'".to_string()));
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(invalid(format!("invalid character '{}'", c)));
    }

    Ok(())
}
