//! Signal Bridge - Entry Point
//!
//! Subcommands:
//! - run (default): start the bridge poll loop
//! - setup: interactive first-time configuration
//! - register <phone> / verify <phone> <code>: SMS registration
//! - link: device-link an existing Signal account

use signal_bridge::{Bridge, Config};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn print_usage() {
    println!("Signal Bridge v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: signal-bridge [COMMAND]");
    println!();
    println!("Commands:");
    println!("  run                     Start the bridge (default)");
    println!("  setup                   Interactive first-time setup");
    println!("  register <phone>        Register a number via SMS");
    println!("  verify <phone> <code>   Complete SMS registration");
    println!("  link                    Link as secondary device");
    println!();
    println!("Environment variables:");
    println!("  SIGNAL_PHONE            Bot phone number (E.164)");
    println!("  SIGNAL_CLI_PATH         Path to signal-cli binary");
    println!("  WEBAPP_URL              Chat backend base URL");
    println!("  SIGNAL_MODEL            LLM model identifier");
    println!("  SIGNAL_POLL_INTERVAL    Poll interval in ms");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--help") | Some("-h") | Some("help") => {
            print_usage();
            Ok(())
        }
        Some("setup") => signal_bridge::setup::run_setup().await,
        Some("register") => match args.get(2) {
            Some(phone) => signal_bridge::setup::register_account(phone).await,
            None => {
                eprintln!("Usage: signal-bridge register <phone>");
                std::process::exit(1);
            }
        },
        Some("verify") => match (args.get(2), args.get(3)) {
            (Some(phone), Some(code)) => signal_bridge::setup::verify_account(phone, code).await,
            _ => {
                eprintln!("Usage: signal-bridge verify <phone> <code>");
                std::process::exit(1);
            }
        },
        Some("link") => signal_bridge::setup::link_device().await,
        Some("run") | None => {
            let config = Config::load();
            let bridge = Bridge::new(config)?;
            bridge.run().await
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}
