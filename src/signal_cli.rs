//! signal-cli wrapper
//!
//! Hides subprocess invocation and envelope decoding behind a small API:
//! receive (newline-delimited JSON), send, and the two startup probes.
//!
//! All runtime operations absorb their own failures - `receive` returns an
//! empty batch and `send` returns false on any error, so the poll loop never
//! needs to recover from this layer. Every call carries an explicit timeout.

use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Outer ceiling on one `receive` invocation (the CLI itself waits 5s)
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const REGISTER_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Failure classification for signal-cli invocations
#[derive(Debug, Error)]
pub enum SignalCliError {
    #[error("failed to spawn signal-cli: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("signal-cli exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    #[error("signal-cli timed out after {0}s")]
    Timeout(u64),
}

/// One decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Transport-native sender address (conversation key + allowlist entry)
    pub sender: String,
    pub text: String,
    pub timestamp: i64,
    pub is_group: bool,
}

/// Raw signal-cli JSON envelope (one per output line)
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    envelope: Option<EnvelopeBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeBody {
    source: Option<String>,
    source_number: Option<String>,
    data_message: Option<DataMessage>,
    /// Present on messages the bot account sent itself (multi-device echo)
    sync_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataMessage {
    message: Option<String>,
    timestamp: Option<i64>,
    group_info: Option<serde_json::Value>,
}

/// Wrapper around the external signal-cli binary
#[derive(Debug, Clone)]
pub struct SignalCli {
    cli_path: String,
    phone: String,
    /// .bat/.cmd scripts cannot be exec'd directly and must go through a shell
    needs_shell: bool,
}

impl SignalCli {
    pub fn new(cli_path: &str, phone: &str) -> Self {
        let lower = cli_path.to_lowercase();
        Self {
            cli_path: cli_path.to_string(),
            phone: phone.to_string(),
            needs_shell: lower.ends_with(".bat") || lower.ends_with(".cmd"),
        }
    }

    /// Build the subprocess command for a full argument list.
    ///
    /// Every path keeps a parameterized argv - sender-controlled text is
    /// never spliced into shell source. Script wrappers on unix are routed
    /// through `sh`, which receives the script path and arguments as
    /// positional parameters (`"$0" "$@"`), so paths with spaces and
    /// messages containing shell metacharacters both survive literally. On
    /// Windows the standard library already routes `.bat`/`.cmd` through
    /// `cmd.exe` with safe escaping and refuses arguments it cannot escape,
    /// so a direct spawn is correct there.
    fn command(&self, args: &[&str]) -> Command {
        if self.needs_shell && !cfg!(windows) {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg("exec \"$0\" \"$@\"")
                .arg(&self.cli_path)
                .args(args);
            cmd
        } else {
            let mut cmd = Command::new(&self.cli_path);
            cmd.args(args);
            cmd
        }
    }

    /// Run signal-cli with a complete argument list and capture stdout
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, SignalCliError> {
        debug!("signal-cli {:?}", args);

        let mut cmd = self.command(args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| SignalCliError::Timeout(timeout.as_secs()))??;

        if !output.status.success() {
            return Err(SignalCliError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run an account-scoped subcommand: `<cli> -a <phone> <args...>`
    async fn exec(&self, args: &[&str], timeout: Duration) -> Result<String, SignalCliError> {
        let mut full: Vec<&str> = vec!["-a", &self.phone];
        full.extend_from_slice(args);
        self.run(&full, timeout).await
    }

    /// Run with global flags before `-a`: `<cli> <global...> -a <phone> <args...>`
    async fn exec_global(
        &self,
        global_args: &[&str],
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, SignalCliError> {
        let mut full: Vec<&str> = global_args.to_vec();
        full.push("-a");
        full.push(&self.phone);
        full.extend_from_slice(args);
        self.run(&full, timeout).await
    }

    /// Poll for new messages, marking them as read.
    ///
    /// Any failure (timeout, non-zero exit, spawn error) is logged and
    /// collapsed into an empty batch - the next poll cycle retries anyway.
    pub async fn receive(&self) -> Vec<Envelope> {
        let output = match self
            .exec_global(
                &["-o", "json"],
                &["receive", "-t", "5", "--send-read-receipts"],
                RECEIVE_TIMEOUT,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!("Receive error: {}", e);
                return Vec::new();
            }
        };

        parse_envelopes(&output)
    }

    /// Send a message; false on any failure so the caller can log and move on
    pub async fn send(&self, recipient: &str, message: &str) -> bool {
        match self
            .exec(&["send", "-m", message, recipient], SEND_TIMEOUT)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("Send to {} failed: {}", recipient, e);
                false
            }
        }
    }

    /// Startup probe: is the binary runnable? Returns its version string.
    pub async fn check_available(&self) -> Option<String> {
        match self.run(&["--version"], PROBE_TIMEOUT).await {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("signal-cli not available: {}", e);
                None
            }
        }
    }

    /// Request SMS registration for the configured phone number
    pub async fn register(&self) -> Result<(), SignalCliError> {
        self.exec(&["register"], SEND_TIMEOUT).await.map(|_| ())
    }

    /// Complete registration with the SMS verification code
    pub async fn verify(&self, code: &str) -> Result<(), SignalCliError> {
        self.exec(&["verify", code], SEND_TIMEOUT).await.map(|_| ())
    }

    /// Generate a device-link URI (account-agnostic, so no `-a` flag)
    pub async fn link(&self, device_name: &str) -> Result<String, SignalCliError> {
        self.run(&["link", "-n", device_name], RECEIVE_TIMEOUT).await
    }

    /// Startup probe: is the configured account registered with this install?
    pub async fn check_registered(&self) -> bool {
        match self.exec(&["listAccounts"], PROBE_TIMEOUT).await {
            Ok(accounts) => accounts.contains(&self.phone),
            Err(e) => {
                // listAccounts is missing on older releases; fall back to a
                // short receive, which fails for unregistered accounts.
                warn!("listAccounts failed ({}), probing with receive", e);
                self.exec(&["receive", "-t", "1"], REGISTER_PROBE_TIMEOUT)
                    .await
                    .is_ok()
            }
        }
    }
}

/// Decode newline-delimited JSON envelopes.
///
/// Lines that fail to parse are dropped individually rather than aborting
/// the batch. Sync messages (sent by the bot account itself) and envelopes
/// without a text body decode to nothing.
pub fn parse_envelopes(output: &str) -> Vec<Envelope> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<RawEnvelope>(line) {
            Ok(raw) => extract_envelope(raw),
            Err(e) => {
                debug!("Dropping unparseable envelope line: {}", e);
                None
            }
        })
        .collect()
}

fn extract_envelope(raw: RawEnvelope) -> Option<Envelope> {
    let body = raw.envelope?;

    // Never reply to the bot's own messages, whatever device they came from
    if body.sync_message.is_some() {
        return None;
    }

    let data = body.data_message?;
    let text = data.message?;
    let sender = body.source.or(body.source_number)?;

    Some(Envelope {
        sender,
        text,
        timestamp: data.timestamp.unwrap_or(0),
        is_group: data.group_info.is_some(),
    })
}
