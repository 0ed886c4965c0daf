//! Cadence CLI
//!
//! Runs, parses and checks DSL programs from the command line.

use cadence_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
