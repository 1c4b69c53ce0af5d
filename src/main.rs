use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use docfs::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::from_env_and_args();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "docfs starting: RUST_LOG='{}', addr={}, root='{}', data_dir={:?}, unique_paths={}, rename_mode={:?}, chunk_size={}",
        rust_log,
        cfg.socket_addr(),
        cfg.namespace.root_path,
        cfg.data_dir,
        cfg.enforce_unique_paths,
        cfg.namespace.rename_mode,
        cfg.namespace.read_chunk_size
    );

    docfs::server::run(cfg).await
}
