//! MedAssist: grounded Q&A over uploaded medical documents.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use medassist_core::MedAssistConfig;
use medassist_server::{build_router, AppState};

fn print_usage() {
    println!("MedAssist: question answering over medical documents");
    println!();
    println!("Usage: medassist [command]");
    println!();
    println!("Commands:");
    println!("  (none)    Start the server (configuration from environment / .env)");
    println!("  help      Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'medassist help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    // A missing .env file is fine; the variables may come from the environment.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let config = MedAssistConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let port = config.port;
    info!(
        "Search service {}, default index {}, chunking {}/{}",
        config.search.endpoint(),
        config.index_name,
        config.chunk_size,
        config.chunk_overlap
    );

    let state = Arc::new(
        AppState::from_config(config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize services: {}", e))?,
    );
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MedAssist server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
