//! Signal Bridge
//!
//! Relay bridge between the Signal messaging transport and an HTTP chat
//! backend. One Signal account acts as the bot - messages it receives are
//! forwarded to the backend's `/api/chat` endpoint with per-sender
//! conversation history, and replies are sent back via signal-cli.
//!
//! # Architecture
//!
//! ```text
//! Signal ──► signal-cli ──► Bridge ──► webapp /api/chat
//!            (subprocess)      │
//!                              ├── allowlist filter
//!                              ├── in-band commands (/clear /status /help /model)
//!                              └── bounded per-sender history
//! ```
//!
//! The bridge is a single-worker poll loop: subprocess and HTTP calls are
//! awaited inline, replies go out in arrival order, and every external call
//! carries an explicit timeout so nothing can block the loop forever.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod history;
pub mod setup;
pub mod signal_cli;
pub mod webapp;

pub use bridge::{route_message, truncate_reply, Bridge, Route};
pub use commands::BridgeCommand;
pub use config::Config;
pub use history::{ConversationStore, ConversationTurn, Role};
pub use signal_cli::{parse_envelopes, Envelope, SignalCli, SignalCliError};
pub use webapp::{ChatResponse, WebappClient};
