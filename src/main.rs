use anyhow::ensure;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_name = std::env::var("LOADTEST_CONFIG")
        .unwrap_or_else(|_| "Config.toml".to_string());

    let summary = loadtest::serve(&config_name).await?;

    info!(
        task = "summary",
        iterations = summary.iterations,
        passed = summary.passed,
        failed = summary.failed,
    );
    println!("{}", summary);

    ensure!(
        summary.is_success(),
        "{} of {} iterations failed",
        summary.failed,
        summary.iterations
    );

    Ok(())
}
