//! `TeachMate` development server: the task resource, served from memory.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:8000 with sample tasks
//! cargo run --bin teachmate-server
//!
//! # Empty collection on a custom address
//! cargo run --bin teachmate-server -- --bind 127.0.0.1:9000 --seed-sample-tasks false
//!
//! # Point the client at it
//! cargo run --bin teachmate -- --api-url http://127.0.0.1:8000 tasks
//! ```

use std::sync::Arc;

use clap::Parser;
use teachmate_server::config::{ServerCliArgs, ServerConfig};
use teachmate_server::registry::TaskRegistry;
use teachmate_server::routes::{self, ServerState};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = if config.seed_sample_tasks {
        TaskRegistry::sample()
    } else {
        TaskRegistry::new()
    };
    tracing::info!(
        addr = %config.bind_addr,
        path = %config.tasks_path,
        seeded = config.seed_sample_tasks,
        "starting teachmate task server"
    );

    let state = Arc::new(ServerState::new(registry));
    match routes::start_server_with_state(&config.bind_addr, &config.tasks_path, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task server failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task server");
            std::process::exit(1);
        }
    }
}
