mod config;
mod envelope;
mod http;
mod results;

use crate::{
    config::ServerConfig,
    http::{build_router, AppState},
    results::ResultLog,
};
use chrono::Local;
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    path::PathBuf,
    process::exit,
    sync::Arc,
};
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sigsearch-server",
    about = "Serves the GSE57383 expression table and collects worker results"
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

/// best-effort routable address for the startup banner
/// the socket is connected but never sends anything
fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match ServerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {e}");
            exit(1);
        }
    };

    if let Some(port) = cli.port {
        config.listen.port = port;
    }

    if let Err(e) = config.preflight_checks() {
        error!("Startup aborted: {e}");
        exit(1);
    }

    let results = ResultLog::new(
        &config.results.dir,
        &config.results.prefix,
        Local::now().naive_local(),
    );

    let bind = SocketAddr::new(config.listen.host, config.listen.port);
    let banner_ip = local_ip();
    let port = config.listen.port;
    println!(" * Serving data on: http://{banner_ip}:{port}{}", config.dataset.route);
    println!(" * DCP results endpoint: http://{banner_ip}:{port}/dcp-results");

    let state = AppState {
        config: Arc::new(config),
        results: Arc::new(results),
    };
    let router = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = match TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {bind}: {e}");
            exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server stopped unexpectedly: {e}");
        exit(1);
    }
}
