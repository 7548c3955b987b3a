//! robin - PLC to pub/sub bridge
//!
//! Registers the configured bridges on node `robin` and spins until
//! Ctrl+C or SIGTERM.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use robin::node::shutdown;
use robin::{config, Registrar, ShutdownToken};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    print_banner();

    info!("Starting robin v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::load_config()?;
    info!(
        "Configuration loaded: {} bridges configured",
        config.bridges.len()
    );

    let shutdown = ShutdownToken::new();
    let _signals = shutdown::cancel_on_signal(shutdown.clone());

    Registrar::new(config, std::env::args()).run(shutdown).await
}

fn print_banner() {
    println!(
        r#"
    ╔═══════════════════════════════════════════╗
    ║                                           ║
    ║   robin                                   ║
    ║   PLC <-> pub/sub bridge                  ║
    ║                                           ║
    ╚═══════════════════════════════════════════╝
    "#
    );
}
