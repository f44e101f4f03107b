use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ws_probe::config::Args;
use ws_probe::probe::Probe;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    // stdout only carries the pong heartbeat dots
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Args::parse().into_config()?;
    let probe = Probe::new(config);
    probe.run(interrupt()).await?;
    Ok(())
}

async fn interrupt() {
    match signal::ctrl_c().await {
        Ok(()) => info!("interrupt"),
        Err(err) => {
            error!(?err, "failed to listen for interrupt");
            std::future::pending::<()>().await
        }
    }
}
