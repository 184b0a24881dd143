use colored::Colorize;

fn print_connection_error(cause: &dyn std::fmt::Display) {
    eprintln!();
    eprintln!("{}", "✗ Docker接続エラー".red().bold());
    eprintln!();
    eprintln!("{}", "原因:".yellow());
    eprintln!("  {}", cause);
    eprintln!();
    eprintln!("{}", "解決方法:".yellow());
    eprintln!("  • Dockerが起動しているか確認してください");
    eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
    eprintln!("  • ビルドが不要なら --skip-build を指定してください");
}

/// Docker に接続し、ping で疎通を確認する
pub async fn init_docker_with_error_handling() -> anyhow::Result<bollard::Docker> {
    let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
        print_connection_error(&e);
        anyhow::anyhow!("Docker接続に失敗しました")
    })?;

    if let Err(e) = docker.ping().await {
        print_connection_error(&e);
        return Err(anyhow::anyhow!("Docker接続に失敗しました"));
    }
    Ok(docker)
}
