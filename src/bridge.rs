//! Bridge orchestrator
//!
//! Owns the main poll loop: pull envelopes from signal-cli, filter them
//! through the allowlist, short-circuit in-band commands, forward everything
//! else to the chat backend, and send replies back over Signal.
//!
//! One logical worker processes one message at a time - per-sender reply
//! ordering and the shared history map matter more than throughput for a
//! single-account relay. Per-message failures are isolated: the transport
//! adapter and backend client absorb their own errors, so nothing short of
//! a fatal misconfiguration at startup ever stops the loop.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::commands::{BridgeCommand, HELP_TEXT};
use crate::config::Config;
use crate::history::{ConversationStore, Role};
use crate::signal_cli::{Envelope, SignalCli};
use crate::webapp::WebappClient;

/// Hard cap on one outbound Signal message
const MAX_SEND_CHARS: usize = 4000;
/// Where over-long replies are cut so the marker still fits under the cap
const TRUNCATE_AT_CHARS: usize = 3950;
const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

/// Where an inbound message goes after filtering
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Sender not on the non-empty allowlist - drop silently
    Blocked,
    /// Recognized in-band command - handled locally, never hits the backend
    Command(BridgeCommand),
    /// Ordinary message - forward to the chat backend
    Chat,
}

/// Decide how to handle a message. Pure - side effects live in the handlers.
pub fn route_message(allowed_numbers: &[String], sender: &str, text: &str) -> Route {
    if !allowed_numbers.is_empty() && !allowed_numbers.iter().any(|n| n == sender) {
        return Route::Blocked;
    }
    match BridgeCommand::parse(text) {
        Some(command) => Route::Command(command),
        None => Route::Chat,
    }
}

/// Cap a backend reply for Signal delivery, marking the cut
pub fn truncate_reply(text: &str) -> String {
    if text.chars().count() <= MAX_SEND_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(TRUNCATE_AT_CHARS).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// The relay process: config + collaborators + runtime counters.
///
/// Constructed once at startup; all state is owned here rather than in
/// module-level globals so tests can build fresh instances.
pub struct Bridge {
    config: Config,
    config_path: PathBuf,
    cli: SignalCli,
    chat: WebappClient,
    history: ConversationStore,
    message_count: u64,
    started_at: DateTime<Utc>,
}

impl Bridge {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_config_path(config, Config::default_path())
    }

    pub fn with_config_path(config: Config, config_path: PathBuf) -> Result<Self> {
        let cli = SignalCli::new(&config.signal_cli_path, &config.signal_phone);
        let chat = WebappClient::new(&config.webapp_url)?;
        let history = ConversationStore::new(config.max_history_per_user);

        Ok(Self {
            config,
            config_path,
            cli,
            chat,
            history,
            message_count: 0,
            started_at: Utc::now(),
        })
    }

    /// Startup preflight, then the poll loop until SIGINT/SIGTERM.
    ///
    /// A missing CLI binary or unconfigured phone number is a fatal
    /// misconfiguration and exits non-zero; an unreachable backend is only
    /// a warning since the next poll retries anyway.
    pub async fn run(mut self) -> Result<()> {
        info!("============================================");
        info!("  Signal Bridge v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================");

        let version = match self.cli.check_available().await {
            Some(version) => version,
            None => {
                error!("signal-cli not found at '{}'", self.config.signal_cli_path);
                error!("Install it from: https://github.com/AsamK/signal-cli/releases");
                error!("Or set SIGNAL_CLI_PATH to the full path.");
                bail!("signal-cli not available");
            }
        };
        info!("signal-cli: {}", version);

        if self.config.signal_phone.is_empty() {
            error!("No Signal phone number configured!");
            error!("Set SIGNAL_PHONE or edit {}", self.config_path.display());
            bail!("no Signal account configured");
        }
        info!("Bot number: {}", self.config.signal_phone);

        if !self.cli.check_registered().await {
            warn!(
                "{} does not appear to be registered with signal-cli",
                self.config.signal_phone
            );
        }

        if self.chat.check_health().await {
            info!("Webapp: connected ({})", self.config.webapp_url);
        } else {
            warn!("Webapp: offline ({}), will retry", self.config.webapp_url);
        }

        info!("Model: {}", self.config.model_id);
        info!("Poll interval: {}ms", self.config.poll_interval_ms);
        if self.config.allowed_numbers.is_empty() {
            info!("Allowlist: disabled (accepting all senders)");
        } else {
            info!("Allowlist: {}", self.config.allowed_numbers.join(", "));
        }

        // Persist a freshly generated config so the operator has a file to edit
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!("Could not save config: {:#}", e);
        }

        info!("Listening for incoming Signal messages...");

        self.started_at = Utc::now();
        let mut shutdown = std::pin::pin!(shutdown_signal());

        loop {
            let envelopes = self.cli.receive().await;

            for envelope in envelopes {
                if envelope.is_group || envelope.text.is_empty() {
                    continue;
                }
                self.process_message(&envelope).await;
            }

            // Signals are observed between poll iterations, so an in-flight
            // batch always finishes before the process exits.
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down...");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
            }
        }

        info!(
            "Stopped after processing {} message(s)",
            self.message_count
        );
        Ok(())
    }

    /// Conversation state owned by this bridge instance
    pub fn history(&self) -> &ConversationStore {
        &self.history
    }

    /// Messages successfully relayed since startup
    pub fn processed_count(&self) -> u64 {
        self.message_count
    }

    /// Handle one inbound envelope. Never returns an error - every failure
    /// path logs and, when a sender is waiting, sends one reply about it.
    pub async fn process_message(&mut self, envelope: &Envelope) {
        let sender = &envelope.sender;

        match route_message(&self.config.allowed_numbers, sender, &envelope.text) {
            Route::Blocked => {
                info!("Blocked message from {} (not in allowlist)", sender);
            }
            Route::Command(command) => {
                info!("Command from {}: {:?}", sender, command);
                self.handle_command(sender, command).await;
            }
            Route::Chat => {
                info!("From {}: \"{}\"", sender, preview(&envelope.text));
                self.handle_chat(sender, &envelope.text).await;
            }
        }
    }

    async fn handle_command(&mut self, sender: &str, command: BridgeCommand) {
        match command {
            BridgeCommand::Clear => {
                self.history.clear(sender);
                self.cli
                    .send(sender, "🧹 Conversation history cleared.")
                    .await;
            }
            BridgeCommand::Status => {
                let uptime = (Utc::now() - self.started_at).num_seconds().max(0);
                let webapp_ok = self.chat.check_health().await;
                let status = format!(
                    "📊 Signal Bridge Status\n\
                     • Uptime: {}h {}m\n\
                     • Messages processed: {}\n\
                     • Model: {}\n\
                     • Webapp: {}\n\
                     • History: {} messages",
                    uptime / 3600,
                    (uptime % 3600) / 60,
                    self.message_count,
                    self.config.model_id,
                    if webapp_ok { "✅ connected" } else { "❌ offline" },
                    self.history.len(sender),
                );
                self.cli.send(sender, &status).await;
            }
            BridgeCommand::Help => {
                self.cli.send(sender, HELP_TEXT).await;
            }
            BridgeCommand::SetModel(name) => {
                self.config.model_id = name.clone();
                if let Err(e) = self.config.save_to(&self.config_path) {
                    warn!("Could not persist model change: {:#}", e);
                }
                self.cli
                    .send(sender, &format!("🔄 Model switched to: {}", name))
                    .await;
            }
        }
    }

    async fn handle_chat(&mut self, sender: &str, text: &str) {
        let history = self.history.get(sender);

        let result = self
            .chat
            .chat(
                text,
                &self.config.model_id,
                &self.config.system_prompt,
                &history,
                self.config.max_response_length,
            )
            .await;

        match result {
            Ok(reply) => {
                let response = reply
                    .response
                    .or(reply.error)
                    .unwrap_or_else(|| "No response from AI.".to_string());

                self.history.push(sender, Role::User, text);
                self.history.push(sender, Role::Assistant, &response);

                let outgoing = truncate_reply(&response);
                if self.cli.send(sender, &outgoing).await {
                    self.message_count += 1;
                    info!(
                        "Replied to {} ({})",
                        sender,
                        reply.generation_time.as_deref().unwrap_or("?")
                    );
                } else {
                    error!("Failed to send reply to {}", sender);
                }
            }
            Err(e) => {
                error!("Chat error: {:#}", e);
                self.cli
                    .send(
                        sender,
                        &format!("⚠️ Error: {}\n\nMake sure the webapp server is running.", e),
                    )
                    .await;
            }
        }
    }
}

/// Resolve when the process receives SIGINT or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// First 80 chars of a message for log lines
fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        out.push_str("...");
    }
    out
}
