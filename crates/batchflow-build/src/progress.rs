use indicatif::{ProgressBar, ProgressStyle};

/// ビルド・プッシュ中のスピナー表示
pub struct ImageProgress {
    progress_bar: ProgressBar,
    action: &'static str,
}

impl ImageProgress {
    pub fn building(image: &str) -> Self {
        Self::new("Build", format!("Building {}...", image))
    }

    pub fn pushing(image: &str) -> Self {
        Self::new("Push", format!("Pushing {}...", image))
    }

    /// 非表示 (テストや非対話環境用)
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
            action: "Operation",
        }
    }

    fn new(action: &'static str, message: String) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(std::time::Duration::from_millis(120));

        Self {
            progress_bar: pb,
            action,
        }
    }

    pub fn set_message(&self, msg: &str) {
        self.progress_bar.set_message(msg.to_string());
    }

    pub fn finish_success(&self) {
        self.progress_bar
            .finish_with_message(format!("{} completed ✓", self.action));
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("{} failed: {}", self.action, error));
    }
}
