use clap::Parser;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;

// Error tracing
use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use portal::{AppState, app};
use shared::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "portal", version, about = "Serves the learning portal behind the session guard")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "PORTAL_CONFIG", default_value = "portal.toml")]
    config: String,

    /// Override `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = config.server.addr();
    let state = AppState::new(config)?;
    if state.guard.codec().verifies_signatures() {
        info!("Session tokens are verified with HS256");
    }
    let service = app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        debug!("Accepted connection from {}", peer);
        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(service.clone());

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }

    info!("Server closed");
    Ok(())
}
