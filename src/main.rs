//! netmap-core command-line entry point
//!
//! Runs one live or export pass against a JSON fixture of collaborator data.

use netmap_core::app::run;

#[tokio::main]
async fn main() {
    if let Err(e) = netmap_core::logging::init_logging(None) {
        eprintln!("[WARN] Failed to initialize structured logging: {:#}", e);
    }

    if let Err(e) = run(std::env::args()).await {
        netmap_core::log_error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
