use std::net::SocketAddr;

use clap::Parser;
use tracing::{info, warn};
use watchparty::prelude::*;

/// Watch party room relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Socket address to accept WebSocket connections on.
    #[arg(long, env = "WATCHPARTY_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Redis server holding rooms and memberships.
    #[arg(long, env = "WATCHPARTY_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Prefix for every key this relay writes.
    #[arg(long, env = "WATCHPARTY_NAMESPACE", default_value = "watch-party")]
    namespace: String,

    /// Keep rooms in process memory instead of Redis (local development).
    #[arg(long)]
    memory: bool,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

async fn serve<S: Store>(cli: &Cli, store: S) -> Result<(), WatchPartyError> {
    let server = RelayServerBuilder::new()
        .bind(&cli.listen.to_string())
        .store_config(StoreConfig::builder().namespace(&cli.namespace).build())
        .build(store)
        .await?;
    if let Ok(addr) = server.local_addr() {
        info!("relay listening on {addr}");
    }

    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), WatchPartyError> {
    init_tracing();

    let cli = Cli::parse();
    let result = if cli.memory {
        info!("using in-memory store; rooms are lost on exit");
        serve(&cli, MemoryStore::new()).await
    } else {
        let store = RedisStore::connect(&cli.redis_url).await?;
        info!(redis_url = %cli.redis_url, "connected to store");
        serve(&cli, store).await
    };

    if let Err(err) = &result {
        warn!("relay exited with error: {err}");
    }
    result
}
