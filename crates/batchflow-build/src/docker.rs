//! Bollard による [`ContainerEngine`] 実装

use crate::auth::RegistryCredentials;
use crate::engine::ContainerEngine;
use crate::error::{BuildError, BuildResult, PushError, PushResult};
use crate::progress::ImageProgress;
use crate::reference::ImageReference;
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{BuildInfo, PushImageInfo};
use bytes::Bytes;
use colored::Colorize;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use std::collections::VecDeque;

/// エラー時に保持するビルド出力の行数
pub const OUTPUT_TAIL_LINES: usize = 20;

pub struct DockerEngine {
    docker: Docker,
    show_progress: bool,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            show_progress: true,
        }
    }

    /// 進捗表示の有無を指定
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress(&self, start: impl FnOnce() -> ImageProgress) -> ImageProgress {
        if self.show_progress {
            start()
        } else {
            ImageProgress::hidden()
        }
    }
}

/// ビルド出力の末尾を保持する
#[derive(Debug, Default)]
struct OutputTail {
    lines: VecDeque<String>,
}

impl OutputTail {
    fn push(&mut self, chunk: &str) {
        for line in chunk.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            if self.lines.len() == OUTPUT_TAIL_LINES {
                self.lines.pop_front();
            }
            self.lines.push_back(line.to_string());
        }
    }

    fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

/// ビルド出力の処理
///
/// エラーを含む出力ならそのステータスを返す。
fn handle_build_output(output: BuildInfo, tail: &mut OutputTail) -> Option<Option<i64>> {
    if let Some(stream) = output.stream {
        tail.push(&stream);
    }

    if let Some(status) = output.status {
        tail.push(&status);
    }

    if let Some(error_detail) = output.error_detail {
        let message = error_detail
            .message
            .or(output.error)
            .unwrap_or_else(|| "Unknown build error".to_string());
        tail.push(&message);
        return Some(error_detail.code);
    }

    if let Some(error) = output.error {
        tail.push(&error);
        return Some(None);
    }

    None
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build(&self, context: Vec<u8>, reference: &ImageReference) -> BuildResult<()> {
        let image = reference.full_name();
        tracing::info!("Building image: {}", image);

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: image.as_str(),
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };

        let body = Full::new(Bytes::from(context));
        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        let progress = self.progress(|| ImageProgress::building(&image));
        let mut tail = OutputTail::default();

        while let Some(msg) = stream.next().await {
            let output = match msg {
                Ok(output) => output,
                Err(e) => {
                    progress.finish_error(&e.to_string());
                    return Err(BuildError::DockerConnection(e));
                }
            };

            if let Some(status) = handle_build_output(output, &mut tail) {
                progress.finish_error(tail.last().unwrap_or("build error"));
                return Err(BuildError::Failed {
                    image,
                    status,
                    output_tail: tail.into_vec(),
                });
            }
            if let Some(line) = tail.last() {
                progress.set_message(line);
            }
        }

        progress.finish_success();
        tracing::info!("Successfully built: {}", image);
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageReference) -> PushResult<bool> {
        match self.docker.inspect_image(&reference.full_name()).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(PushError::DockerConnection(e)),
        }
    }

    async fn push(
        &self,
        reference: &ImageReference,
        credentials: &RegistryCredentials,
    ) -> PushResult<()> {
        let image = reference.full_name();

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: reference.tag().to_string(),
        };

        if self.show_progress {
            println!("  → {}", image.cyan());
        }
        let progress = self.progress(|| ImageProgress::pushing(&image));

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(
            reference.repository(),
            Some(options),
            Some(credentials.to_docker_credentials()),
        );

        let mut error_message: Option<String> = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        handle_push_progress(&info, &progress);
                    }
                }
                Err(e) => {
                    progress.finish_error(&e.to_string());
                    return Err(PushError::TransferFailed {
                        image,
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(message) = error_message {
            progress.finish_error(&message);
            return Err(PushError::TransferFailed { image, message });
        }

        progress.finish_success();
        tracing::info!("Successfully pushed: {}", image);
        Ok(())
    }
}

/// プッシュ進捗を表示
fn handle_push_progress(info: &PushImageInfo, progress: &ImageProgress) {
    let Some(status) = &info.status else {
        return;
    };
    match status.as_str() {
        // 準備中は表示をスキップ（ノイズ軽減）
        "Preparing" | "Waiting" => {}
        "Pushing" => {
            let detail = info.progress.as_deref().unwrap_or("");
            progress.set_message(&format!("Pushing {}", detail));
        }
        other => {
            tracing::debug!("push: {}", other);
            progress.set_message(other);
        }
    }
}
