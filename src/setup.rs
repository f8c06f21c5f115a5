//! Operator one-shot flows
//!
//! Interactive first-time setup plus the register/verify/link subcommands.
//! These talk to the operator on stdin/stdout, populate the persisted
//! configuration, and exit - the steady-state bridge never runs them.

use anyhow::{bail, Context, Result};
use std::io::Write;

use crate::config::Config;
use crate::signal_cli::SignalCli;

const LINK_DEVICE_NAME: &str = "signal-bridge";

/// Prompt the operator and read one trimmed line
fn ask(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading stdin")?;
    Ok(line.trim().to_string())
}

/// Interactive setup wizard
pub async fn run_setup() -> Result<()> {
    println!();
    println!("🔧 Signal Bridge Setup");
    println!();

    let mut config = Config::load();

    // signal-cli availability
    let mut cli = SignalCli::new(&config.signal_cli_path, "");
    match cli.check_available().await {
        Some(version) => println!("✅ signal-cli found: {}", version),
        None => {
            println!("❌ signal-cli not found on PATH.");
            println!();
            println!("Installation steps:");
            println!("  1. Install Java 21+: https://adoptium.net/");
            println!("  2. Download signal-cli: https://github.com/AsamK/signal-cli/releases");
            println!("  3. Extract and add to PATH (or set SIGNAL_CLI_PATH)");
            println!();
            let cli_path = ask("Enter signal-cli path (or press Enter to skip): ")?;
            if cli_path.is_empty() {
                println!("⏭️  Skipping - install signal-cli first, then re-run setup.");
                return Ok(());
            }
            config.signal_cli_path = cli_path;
            cli = SignalCli::new(&config.signal_cli_path, "");
            match cli.check_available().await {
                Some(version) => println!("✅ Found: {}", version),
                None => bail!("still can't find signal-cli at '{}'", config.signal_cli_path),
            }
        }
    }

    // Phone number
    println!();
    let phone = ask("Enter the bot Signal phone number (E.164 format, e.g. +15551234567): ")?;
    if !phone.starts_with('+') {
        bail!("phone number must start with + (E.164 format)");
    }
    config.signal_phone = phone;

    // Registration method
    println!();
    println!("How is this number set up with Signal?");
    println!("  1. Already registered with signal-cli (ready to use)");
    println!("  2. Need to register via SMS verification");
    println!("  3. Need to link as secondary device to existing Signal app");
    let method = ask("Choice (1/2/3): ")?;

    let account_cli = SignalCli::new(&config.signal_cli_path, &config.signal_phone);
    match method.as_str() {
        "2" => {
            println!();
            println!("Registering {} via SMS...", config.signal_phone);
            match account_cli.register().await {
                Ok(()) => {
                    println!("📱 SMS verification code sent!");
                    let code = ask("Enter the verification code: ")?;
                    account_cli.verify(&code).await?;
                    println!("✅ Registration complete!");
                }
                Err(e) => {
                    println!("❌ Registration failed: {}", e);
                    println!("You may need a captcha. See: https://github.com/AsamK/signal-cli/wiki/Registration-with-captcha");
                }
            }
        }
        "3" => {
            println!();
            println!("Generating link URI...");
            match account_cli.link(LINK_DEVICE_NAME).await {
                Ok(uri) => {
                    println!();
                    println!("Link URI:\n{}", uri);
                    println!();
                    println!("Scan this as a QR code in Signal → Settings → Linked Devices → Link New Device");
                }
                Err(e) => println!("❌ Link failed: {}", e),
            }
        }
        _ => {}
    }

    // Model
    println!();
    let model = ask(&format!("LLM model (Enter for {}): ", config.model_id))?;
    if !model.is_empty() {
        config.model_id = model;
    }

    // Webapp URL
    let webapp = ask(&format!("Webapp URL (Enter for {}): ", config.webapp_url))?;
    if !webapp.is_empty() {
        config.webapp_url = webapp;
    }

    // Allowlist
    println!();
    let allowlist = ask("Allowed phone numbers (comma-separated, or Enter for all): ")?;
    if !allowlist.is_empty() {
        config.allowed_numbers = allowlist
            .split(',')
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
    }

    config.save()?;
    println!();
    println!("✅ Config saved to: {}", Config::default_path().display());
    println!();
    println!("Start the bridge with: signal-bridge run");

    Ok(())
}

/// `register <phone>` - request SMS registration for a new number
pub async fn register_account(phone: &str) -> Result<()> {
    let config = Config::load();
    let cli = SignalCli::new(&config.signal_cli_path, phone);

    println!("Registering {}...", phone);
    cli.register().await?;
    println!("✅ SMS sent! Run: signal-bridge verify {} <code>", phone);
    Ok(())
}

/// `verify <phone> <code>` - finish registration and persist the account
pub async fn verify_account(phone: &str, code: &str) -> Result<()> {
    let mut config = Config::load();
    let cli = SignalCli::new(&config.signal_cli_path, phone);

    cli.verify(code).await?;
    println!("✅ Verification complete!");

    config.signal_phone = phone.to_string();
    config.save()?;
    println!("Config updated. Run: signal-bridge run");
    Ok(())
}

/// `link` - print a device-link URI for an existing Signal account
pub async fn link_device() -> Result<()> {
    let config = Config::load();
    let cli = SignalCli::new(&config.signal_cli_path, "");

    println!("Generating device link...");
    let uri = cli.link(LINK_DEVICE_NAME).await?;
    println!();
    println!("Link URI:\n{}", uri);
    println!();
    println!("Scan from Signal → Settings → Linked Devices");
    Ok(())
}
