use anyhow::Result;

use agentlink::run_cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentlink=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run_cli().await
}
