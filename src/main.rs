use tokio::sync::watch;

use newswire::config::Config;
use newswire::context::AppContext;
use newswire::error::Result;
use newswire::ingest::{self, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    let ctx = AppContext::new(config).await?;

    // Check for --fetch flag (run one ingestion cycle and exit)
    if args.len() >= 2 && args[1] == "--fetch" {
        let summary = ingest::run_cycle(&ctx).await?;
        println!("{} new articles added", summary.new_articles);
        return Ok(());
    }

    let scheduler = Scheduler::new(ctx.config.ingest_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(&ctx, shutdown_rx).await;

    Ok(())
}
