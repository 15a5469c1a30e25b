use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wayline_api::routes_router;
use wayline_routing::{FileDataClient, MatchingOptions, Options, Routing};

/// Wayline - live-updatable routing core with a route table endpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML route definition file
    #[arg(short, long, default_value = "config/routes.yaml")]
    routes: PathBuf,

    /// Bind address of the introspection endpoint
    #[arg(short, long, default_value = "127.0.0.1:9911")]
    bind: SocketAddr,

    /// Poll interval for route updates, in seconds; 0 disables polling
    #[arg(short, long, default_value_t = 3, env = "WAYLINE_POLL_SECONDS")]
    poll: u64,

    /// Ignore trailing slashes when matching paths
    #[arg(long)]
    ignore_trailing_slash: bool,

    /// Log only summary counts of route changes
    #[arg(long)]
    suppress_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let matching_options = if args.ignore_trailing_slash {
        MatchingOptions::IGNORE_TRAILING_SLASH
    } else {
        MatchingOptions::NONE
    };

    info!("starting wayline");
    info!("route file: {:?}", args.routes);
    info!("bind address: {}", args.bind);
    info!("poll interval: {}s", args.poll);

    let routing = Arc::new(Routing::new(Options {
        data_clients: vec![Arc::new(FileDataClient::new(&args.routes))],
        poll_timeout: Duration::from_secs(args.poll),
        matching_options,
        suppress_logs: args.suppress_logs,
        ..Options::default()
    }));

    let app = routes_router(Arc::clone(&routing));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;

    info!("route table served on http://{}/routes", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("introspection server failed")?;

    routing.close();
    Ok(())
}
