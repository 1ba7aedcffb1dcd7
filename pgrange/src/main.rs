//! pgrange, sharded PostgreSQL proxy and query router.

use clap::Parser;
use pgrange::backend::SessionPool;
use pgrange::cli::Cli;
use pgrange::config::Config;
use pgrange::frontend::Listener;
use tokio::runtime::Builder;
use tracing::info;

use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    pgrange::logger();

    let config = Config::load(&args.config)?;

    let runtime = match config.general.workers {
        0 => {
            let mut builder = Builder::new_current_thread();
            builder.enable_all();
            builder
        }
        workers => {
            info!("spawning {} workers", workers);
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(workers).enable_all();
            builder
        }
    }
    .build()?;

    runtime.block_on(async move { run(config).await })?;

    Ok(())
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("🐘 pgrange v{}", env!("CARGO_PKG_VERSION"));

    let router = pgrange::build_router(&config)?;
    let pool = Arc::new(SessionPool::new(router.catalog().clone()));

    let listener = Listener::new(
        format!("{}:{}", config.general.host, config.general.port),
        router,
        pool,
        config.general.world_shard_fallback,
    );

    listener.listen().await?;

    info!("🐘 pgrange is shutting down");
    Ok(())
}
