//! In-band bridge commands
//!
//! A handful of slash commands senders can type instead of chatting. Parsing
//! is pure; execution lives in the orchestrator, which owns the state the
//! commands touch. Anything that does not match is forwarded to the backend
//! as a normal chat message.

/// A recognized in-band command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// `/clear` or `/reset` - wipe the sender's conversation history
    Clear,
    /// `/status` - uptime, counters, model, backend health
    Status,
    /// `/help` - static usage text
    Help,
    /// `/model <name>` - switch and persist the model identifier
    SetModel(String),
}

impl BridgeCommand {
    /// Parse a message as a command. Matching is case-insensitive and
    /// whitespace-tolerant; the model name keeps its original casing.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/clear" | "/reset" => Some(Self::Clear),
            "/status" => Some(Self::Status),
            "/help" => Some(Self::Help),
            _ => {
                if lower.strip_prefix("/model ").is_some() {
                    // Take the name from the original text to preserve case;
                    // the matched prefix is 7 ASCII chars, but slice
                    // defensively rather than byte-indexing
                    let name = trimmed.get(7..).map(str::trim).unwrap_or_default();
                    if name.is_empty() {
                        return None;
                    }
                    Some(Self::SetModel(name.to_string()))
                } else {
                    None
                }
            }
        }
    }
}

/// Static `/help` reply
pub const HELP_TEXT: &str = "🤖 Signal Bridge Bot\n\
    \n\
    Just send any message to chat with the AI.\n\
    \n\
    Commands:\n\
    • /clear — Reset conversation history\n\
    • /status — Show bridge status\n\
    • /model <name> — Switch LLM model\n\
    • /help — Show this help";
