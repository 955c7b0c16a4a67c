use anyhow::{Context, Result};
use clap::Parser;
use firestore_console::config::ConsoleArgs;
use firestore_console::server::{self, AppState};
use firestore_console::ConsoleApp;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ConsoleArgs::parse();

    init_logging(args.verbose, args.json_logs);

    let credentials = args
        .credentials()
        .context("Error initializing Firebase Admin")?;
    let app = ConsoleApp::new(&credentials, args.max_retries)?;
    info!(
        project = %credentials.project_id(),
        client_email = %credentials.client_email(),
        "Firebase Admin initialized successfully"
    );

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "console listening");

    server::serve(listener, AppState::new(app.manager(), args.default_limit)).await?;
    Ok(())
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
