use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gardengate_core::{GardenConfig, ResourceManifest};
use tracing::{error, info};

mod app;
mod backends;
mod http;

#[derive(Debug, Parser)]
#[command(name = "gardengate-gateway", version, about = "Telegram Mini App access gate")]
struct Args {
    /// Path to gardengate.toml.
    #[arg(long, env = "GARDENGATE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gardengate_gateway=info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    // config is loaded and checked exactly once; a broken setup never serves
    let config = GardenConfig::load(args.config.as_deref())?;
    if let Err(e) = config.validate() {
        error!(code = e.code(), error = %e, "invalid configuration");
        return Err(e.into());
    }

    let manifest = match config.access.manifest_path.as_deref() {
        Some(path) => {
            let manifest = ResourceManifest::load(path)?;
            info!(path, entries = manifest.len(), "resource manifest loaded");
            manifest
        }
        None => ResourceManifest::empty(),
    };

    let built = backends::build(&config)?;
    info!(
        kind = config.access.backend.as_str(),
        backend = built.backend.name(),
        "authorization backend ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(
        &config,
        built.backend,
        built.membership,
        manifest,
    )?);
    let router = app::build_router(state);

    info!("garden-gate listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
