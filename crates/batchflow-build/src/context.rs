use crate::dockerfile::DOCKERFILE_NAME;
use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tar::Builder;

/// コンテキストから除外するディレクトリ
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".serverless", ".batchflow", "node_modules"];

pub struct ContextBuilder;

impl ContextBuilder {
    /// コンテキスト内のファイルをパス順で列挙 (コンテキストからの相対パス)
    pub fn collect_files(context_path: &Path) -> BuildResult<Vec<PathBuf>> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }

        let root = context_path
            .to_str()
            .ok_or_else(|| BuildError::InvalidContext(context_path.display().to_string()))?;
        let pattern = format!("{}/**/*", glob::Pattern::escape(root));
        let entries =
            glob::glob(&pattern).map_err(|e| BuildError::InvalidContext(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| BuildError::Io(e.into_error()))?;
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(context_path) else {
                continue;
            };
            if is_excluded(relative) {
                continue;
            }
            files.push(relative.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// コンテキストと Dockerfile の内容から SHA-256 ダイジェストを計算 (16進)
    ///
    /// 内容が同じなら同じ値になり、同じタグが再利用される。
    pub fn digest(context_path: &Path, dockerfile: &[u8]) -> BuildResult<String> {
        let mut hasher = Sha256::new();
        for relative in Self::collect_files(context_path)? {
            let contents = std::fs::read(context_path.join(&relative))?;
            let name = relative.to_string_lossy();
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update((contents.len() as u64).to_le_bytes());
            hasher.update(&contents);
        }
        hasher.update(DOCKERFILE_NAME.as_bytes());
        hasher.update(dockerfile);

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// コンテキスト直下の Dockerfile は `dockerfile` の内容で置き換えられる。
    pub fn create_context(context_path: &Path, dockerfile: &[u8]) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let files = Self::collect_files(context_path)?;

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            for relative in files
                .iter()
                .filter(|p| p.as_path() != Path::new(DOCKERFILE_NAME))
            {
                tar.append_path_with_name(context_path.join(relative), relative)?;
            }

            // Dockerfileを "Dockerfile" として追加
            let mut header = tar::Header::new_gnu();
            header.set_path(DOCKERFILE_NAME).map_err(|e| {
                BuildError::InvalidContext(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, dockerfile)?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!(
            "Build context created: {} files, {} bytes",
            files.len(),
            archive_data.len()
        );
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）",
                size / 1024 / 1024
            );
        }
    }
}

fn is_excluded(relative: &Path) -> bool {
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
    })
}
