//! chatbridge — HTTP relay between a host app and an embedded chat session.

use std::path::PathBuf;
use std::sync::Arc;

use chatbridge_core::BridgeConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod relay;
mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CHATBRIDGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Config from `--config <path>` when given, otherwise the data directory.
fn load_config(args: &[String]) -> anyhow::Result<BridgeConfig> {
    match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
            Ok(BridgeConfig::load_file(&PathBuf::from(path)))
        }
        None => {
            let data_dir = resolve_data_dir();
            info!("Data directory: {}", data_dir.display());
            Ok(BridgeConfig::load(&data_dir))
        }
    }
}

fn print_help() {
    println!("chatbridge — relay a browser-hosted chat session over HTTP");
    println!();
    println!("Usage: chatbridge [command] [--config <path>]");
    println!();
    println!("Commands:");
    println!("  serve        Start the relay server (default)");
    println!("  script       Print the bootstrap script for the browser shell");
    println!("  help         Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args
        .first()
        .filter(|a| a.as_str() != "--config")
        .map(String::as_str)
        .unwrap_or("serve");

    match command {
        "serve" => {}
        "script" => {
            let config = load_config(&args)?;
            print!(
                "{}",
                chatbridge_protocol::script::bootstrap_script(&config.endpoints(), &config.model)
            );
            return Ok(());
        }
        "--help" | "-h" | "help" => {
            print_help();
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {}. Use 'chatbridge help' for usage.", other);
            std::process::exit(1);
        }
    }

    let config = load_config(&args)?;
    let state = Arc::new(AppState::new(config).await);
    info!(
        "Chat service {} ({}), session {}",
        state.config.host_url,
        state.config.model,
        state.chat.status()
    );

    let app = routes::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chatbridge relay listening on {}", addr);

    axum::serve(listener, app).await?;

    state.chat.shutdown();
    Ok(())
}
