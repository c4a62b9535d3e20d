//! KMP Profiler - replay message timings into latency histograms.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kmp_profiler_cli::{run, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kmp_profiler=info,kmp_profiler_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.profiler.root.display(),
        input = ?config.input,
        flush_interval_ms = config.profiler.flush_interval.as_millis() as u64,
        "starting replay"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    if let Err(e) = run(config, shutdown).await {
        tracing::error!(error = %e, "replay failed");
        return Err(e.into());
    }
    Ok(())
}
