// tests/misc.rs

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::mpsc;

use taskrelay::cli::LogLevel;
use taskrelay::display::ConsoleSurface;
use taskrelay::engine::stdin::{CONSOLE_CHAT, parse_line, pump};
use taskrelay::engine::{InboundEvent, UserInfo};
use taskrelay::logging::{build_filter, parse_level_str, resolve_level};
use taskrelay::subscription::interpret_response;
use taskrelay::types::DisplayRef;

fn operator() -> UserInfo {
    UserInfo {
        id: 1,
        first_name: "operator".to_string(),
    }
}

#[test]
fn subscription_replies_follow_the_response() {
    let ok = interpret_response(200, r#"{"message":"added 3 nodes"}"#);
    assert!(ok.accepted);
    assert_eq!(ok.text, "✅ added 3 nodes");

    let ok = interpret_response(200, "");
    assert!(ok.accepted);
    assert_eq!(ok.text, "✅ subscription added");

    let dup = interpret_response(409, r#"{"error":"subscription already exists"}"#);
    assert!(!dup.accepted);
    assert_eq!(dup.text, "⚠️ subscription already exists");

    let bad = interpret_response(400, r#"{"message":"bad url"}"#);
    assert_eq!(bad.text, "❌ bad url");

    let opaque = interpret_response(500, "oops");
    assert_eq!(opaque.text, "❌ subscription failed (status 500)");
}

#[test]
fn log_level_prefers_cli_then_env() {
    assert_eq!(
        resolve_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(resolve_level(None, Some(" WARNING ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
    assert_eq!(parse_level_str("trace"), Some(tracing::Level::TRACE));
}

#[test]
fn env_directives_scope_levels_per_module() {
    let filter = build_filter(None, Some("info,taskrelay::exec=trace")).to_string();
    assert!(filter.contains("taskrelay::exec=trace"), "{filter}");

    let filter = build_filter(Some(LogLevel::Warn), Some("taskrelay=trace")).to_string();
    assert!(!filter.contains("taskrelay"), "{filter}");
    assert!(filter.contains("warn"), "{filter}");

    let filter = build_filter(None, Some("debug")).to_string();
    assert!(filter.contains("debug"), "{filter}");
}

#[test]
fn console_lines_become_messages_and_presses() {
    let surface = ConsoleSurface::new();
    let mut seq = 0;

    assert!(parse_line("   ", &operator(), &surface, &mut seq).is_none());

    match parse_line("t.me/a/1", &operator(), &surface, &mut seq) {
        Some(InboundEvent::Message(msg)) => {
            assert_eq!(msg.chat, CONSOLE_CHAT);
            assert_eq!(msg.text, "t.me/a/1");
            assert_eq!(msg.from, operator());
        }
        other => panic!("unexpected {other:?}"),
    }

    match parse_line("press 4 cancel_1_2", &operator(), &surface, &mut seq) {
        Some(InboundEvent::Button(press)) => {
            assert_eq!(press.display, DisplayRef::new(CONSOLE_CHAT, 4));
            assert_eq!(press.payload, "cancel_1_2");
            assert_eq!(press.id, "press-1");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Not a valid press: forwarded as text.
    match parse_line("press x", &operator(), &surface, &mut seq) {
        Some(InboundEvent::Message(msg)) => assert_eq!(msg.text, "press x"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(seq, 1);
}

#[tokio::test]
async fn end_of_input_requests_shutdown() {
    let (tx, mut rx) = mpsc::channel(8);
    let input = BufReader::new(&b"/help\n\npress 2 cancel_summary_1\n"[..]);
    pump(input, operator(), Arc::new(ConsoleSurface::new()), tx).await;

    assert!(matches!(rx.recv().await, Some(InboundEvent::Message(_))));
    assert!(matches!(rx.recv().await, Some(InboundEvent::Button(_))));
    assert!(matches!(rx.recv().await, Some(InboundEvent::ShutdownRequested)));
    assert!(rx.recv().await.is_none());
}
