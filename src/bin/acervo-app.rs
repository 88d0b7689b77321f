use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use acervo::app::{AppState, site};
use acervo::cli::ContentArgs;
use acervo::kv_store::LocalFsKvStore;
use acervo::source::{FallbackChain, http_client};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Static site directory (served if it exists).
    #[arg(long, default_value = "web")]
    web_dir: PathBuf,

    #[command(flatten)]
    content: ContentArgs,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    acervo::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting acervo-app");

    let config = args.content.resolve().context("load config")?;
    let client = http_client()?;
    let works = FallbackChain::from_config(&client, &config)?
        .load_works(&config.normalize_options())
        .await;
    tracing::info!(works = works.len(), "catalog loaded");

    let store = Arc::new(LocalFsKvStore::new(&config.reviews_dir));
    let state = AppState::new(works, config, client, store)?;

    let app = site(state, &args.web_dir);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
