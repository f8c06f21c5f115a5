//! Bridge behavior tests
//!
//! End-to-end checks of the library surface without a real signal-cli or
//! backend: routing, history bounds, truncation, envelope filtering, and
//! config persistence.

use signal_bridge::{
    parse_envelopes, route_message, truncate_reply, Bridge, BridgeCommand, Config,
    ConversationStore, Envelope, Role, Route,
};
use tempfile::TempDir;

const SENDER: &str = "+15550001111";

#[test]
fn test_history_retains_most_recent_in_order() {
    let bound = 6;
    let mut store = ConversationStore::new(bound);

    for i in 0..20 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        store.push(SENDER, role, &format!("turn {}", i));
    }

    let history = store.get(SENDER);
    assert_eq!(history.len(), bound);
    for (offset, turn) in history.iter().enumerate() {
        assert_eq!(turn.content, format!("turn {}", 14 + offset));
    }
}

#[test]
fn test_normal_chat_turn_history_shape() {
    // After one exchange the history is exactly [user, assistant]
    let mut store = ConversationStore::new(20);
    store.push(SENDER, Role::User, "hello");
    store.push(SENDER, Role::Assistant, "hi there");

    let history = store.get(SENDER);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "hi there");
}

#[test]
fn test_allowlist_blocks_before_commands_and_chat() {
    let allowed = vec!["+15557777777".to_string()];

    assert_eq!(route_message(&allowed, SENDER, "hello"), Route::Blocked);
    assert_eq!(route_message(&allowed, SENDER, "/clear"), Route::Blocked);
    assert_eq!(route_message(&allowed, "+15557777777", "hello"), Route::Chat);
}

#[test]
fn test_command_short_circuit_routing() {
    // A /clear in any casing never routes to the backend
    for text in ["/clear", "/CLEAR", "  /Clear  ", "/reset"] {
        assert_eq!(
            route_message(&[], SENDER, text),
            Route::Command(BridgeCommand::Clear),
            "{:?} should be a command",
            text
        );
    }
    assert_eq!(
        route_message(&[], SENDER, "/status"),
        Route::Command(BridgeCommand::Status)
    );
    assert_eq!(
        route_message(&[], SENDER, "/model gpt-4o"),
        Route::Command(BridgeCommand::SetModel("gpt-4o".to_string()))
    );
    assert_eq!(route_message(&[], SENDER, "please /clear my mind"), Route::Chat);
}

#[test]
fn test_reply_truncation_bounds() {
    let short = "b".repeat(4000);
    assert_eq!(truncate_reply(&short), short);

    let long = "b".repeat(4001);
    let truncated = truncate_reply(&long);
    assert!(truncated.chars().count() <= 4000);
    assert!(truncated.ends_with("... (truncated)"));
    assert!(truncated.starts_with("bbbb"));
}

#[test]
fn test_group_and_sync_envelopes_filtered() {
    let output = concat!(
        "{\"envelope\":{\"source\":\"+15550001111\",\"dataMessage\":{\"message\":\"direct\",\"timestamp\":1}}}\n",
        "{\"envelope\":{\"source\":\"+15550001111\",\"dataMessage\":{\"message\":\"group chat\",\"timestamp\":2,\"groupInfo\":{\"groupId\":\"g==\"}}}}\n",
        "{\"envelope\":{\"source\":\"+15551234567\",\"syncMessage\":{\"sentMessage\":{\"message\":\"self echo\"}}}}\n",
    );

    let envelopes = parse_envelopes(output);
    // Sync messages are discarded at decode time; group messages survive
    // decoding but carry the flag the poll loop skips on.
    assert_eq!(envelopes.len(), 2);
    assert!(!envelopes[0].is_group);
    assert!(envelopes[1].is_group);

    let processed: Vec<_> = envelopes
        .iter()
        .filter(|e| !e.is_group && !e.text.is_empty())
        .collect();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].text, "direct");
}

#[test]
fn test_config_round_trip_never_persists_history() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");

    let mut config = Config::default();
    config.signal_phone = "+15551234567".to_string();
    config.allowed_numbers = vec![SENDER.to_string()];
    config.model_id = "gpt-4o-mini".to_string();
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path);
    assert_eq!(loaded.signal_phone, config.signal_phone);
    assert_eq!(loaded.allowed_numbers, config.allowed_numbers);
    assert_eq!(loaded.model_id, config.model_id);
    assert_eq!(loaded.poll_interval_ms, config.poll_interval_ms);

    // History is process state, never config state
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("conversationHistory"));
}

#[tokio::test]
async fn test_backend_failure_leaves_history_unchanged() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.signal_phone = "+15551234567".to_string();
    config.signal_cli_path = "/definitely/not/a/real/signal-cli".to_string();
    // Nothing listens on the discard port, so every chat call fails
    config.webapp_url = "http://127.0.0.1:9".to_string();

    let mut bridge = Bridge::with_config_path(config, temp.path().join("config.json")).unwrap();

    let envelope = Envelope {
        sender: SENDER.to_string(),
        text: "hello".to_string(),
        timestamp: 1,
        is_group: false,
    };
    bridge.process_message(&envelope).await;

    // No half-written exchange: the sender's history stays empty and the
    // relay counter does not move
    assert_eq!(bridge.history().len(SENDER), 0);
    assert!(bridge.history().is_empty(SENDER));
    assert_eq!(bridge.processed_count(), 0);
}

#[test]
fn test_clear_then_status_sees_empty_history() {
    let mut store = ConversationStore::new(20);
    store.push(SENDER, Role::User, "hello");
    store.push(SENDER, Role::Assistant, "hi");
    assert_eq!(store.len(SENDER), 2);

    store.clear(SENDER);
    assert_eq!(store.len(SENDER), 0);

    // A cleared sender behaves like a brand new one
    store.push(SENDER, Role::User, "fresh start");
    assert_eq!(store.get(SENDER)[0].content, "fresh start");
}
