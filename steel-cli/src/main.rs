//! Draw Steel tracker host.
//!
//! Reads commands from stdin and runs them against a directory-backed
//! tracker, one encounter per channel.
//!
//! ```bash
//! STEEL_STORAGE_DIR=./tracker_data cargo run -p steel-cli -- --channel table-1
//! ```

mod headless;

use std::sync::Arc;
use steel_core::{ContentLibrary, FileMedium, Tracker, TrackerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let channel = args
        .iter()
        .position(|a| a == "--channel")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "default".to_string());

    let config = TrackerConfig::from_env();
    let medium = FileMedium::new(&config.storage_dir).await?;
    let content = ContentLibrary::load(&config.abilities_dir, &config.kits_dir).await;
    tracing::info!("Storing encounters in {}", config.storage_dir.display());

    let tracker = Tracker::new(Arc::new(medium), content, config);
    headless::run_headless(tracker, channel).await;
    Ok(())
}

fn print_help() {
    println!("steel-tracker - Draw Steel initiative tracker");
    println!();
    println!("USAGE:");
    println!("    steel-tracker [--channel <key>]");
    println!();
    println!("ENVIRONMENT:");
    println!("    STEEL_ABILITIES_DIR   Ability definitions (default: abilities)");
    println!("    STEEL_KITS_DIR        Kit definitions (default: kits)");
    println!("    STEEL_STORAGE_DIR     Tracker documents (default: tracker_data)");
    println!("    STEEL_MAX_DICE        Most dice in one roll expression (default: 200)");
    println!("    STEEL_MAX_SIDES       Most sides on one die (default: 1000)");
    println!("    RUST_LOG              Log filter (default: info)");
}
