use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use stowage_http::Stowage;

mod config;
use crate::config::{Config, UploadBackend};

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    // initialize the backend: redis job store + part ledger, object store client,
    // kafka producer and the preloaded activity schema
    let service = match config.backend {
        UploadBackend::Redis(cfg) => cfg.new_service().await?,
    };

    let stowage = Stowage::new(service, config.app_name.clone(), env!("CARGO_PKG_VERSION"));
    let router = stowage.router();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("{} listening on {addr}", config.app_name);

    // run HTTP server
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
