// tests/inbound_parsing.rs

use regex::Regex;

use taskrelay::config::{AccessSection, DEFAULT_LINK_PATTERN, DEFAULT_TARGET_PATTERN};
use taskrelay::engine::commands::{Command, extract_targets, find_subscription_link, parse_command};
use taskrelay::engine::{CallbackPayload, MessageAction, PressAction, Router};

fn pattern() -> Regex {
    Regex::new(DEFAULT_TARGET_PATTERN).unwrap()
}

fn links() -> Regex {
    Regex::new(DEFAULT_LINK_PATTERN).unwrap()
}

fn router(allowed: &[i64]) -> Router {
    Router::new(
        AccessSection {
            allowed_users: allowed.to_vec(),
        },
        pattern(),
        links(),
    )
}

#[test]
fn payloads_parse_and_encode() {
    assert_eq!(
        "cancel_summary_77".parse::<CallbackPayload>().unwrap(),
        CallbackPayload::CancelBatch { user: 77 }
    );
    assert_eq!(
        "cancel_77_12".parse::<CallbackPayload>().unwrap(),
        CallbackPayload::CancelItem { user: 77, id: 12 }
    );
    assert_eq!(CallbackPayload::CancelItem { user: 5, id: 9 }.encode(), "cancel_5_9");
    assert_eq!(CallbackPayload::CancelBatch { user: 5 }.to_string(), "cancel_summary_5");
}

#[test]
fn malformed_payloads_are_rejected() {
    for bad in [
        "",
        "cancel_",
        "cancel_77",
        "cancel_x_1",
        "cancel_1_x",
        "cancel_1_-2",
        "cancel_summary_",
        "cancel_summary_abc",
        "stop_1_2",
    ] {
        assert!(bad.parse::<CallbackPayload>().is_err(), "{bad:?} should not parse");
    }
}

#[test]
fn commands_are_recognised() {
    assert_eq!(parse_command("/start"), Some(Command::Start));
    assert_eq!(parse_command("  /help extra"), Some(Command::Help));
    assert_eq!(parse_command("/STATUS@relay_bot"), Some(Command::Status));
    assert_eq!(parse_command("/nope"), Some(Command::Unknown("nope".into())));
    assert_eq!(parse_command("https://t.me/a/1"), None);
    assert_eq!(parse_command(""), None);
}

#[test]
fn targets_are_normalised_and_deduplicated_in_order() {
    let text = "t.me/a https://t.me/b/2 https://t.me/a/ HTTPS://T.ME/a and t.me/b/2";
    assert_eq!(
        extract_targets(text, &pattern()),
        vec!["https://t.me/a".to_string(), "https://t.me/b/2".to_string()]
    );
    assert!(extract_targets("nothing here", &pattern()).is_empty());
}

#[test]
fn subscription_links_exclude_targets() {
    assert_eq!(
        find_subscription_link("add https://sub.example.com/x?token=1 please", &links()),
        Some("https://sub.example.com/x?token=1".to_string())
    );
    assert_eq!(find_subscription_link("https://t.me/a/1", &links()), None);
    assert_eq!(find_subscription_link("no link", &links()), None);
}

#[test]
fn messages_route_by_content_and_access() {
    let open = router(&[]);
    assert_eq!(
        open.route_message(1, "https://t.me/a/1"),
        MessageAction::Submit(vec!["https://t.me/a/1".into()])
    );
    assert_eq!(
        open.route_message(1, "http://sub.example.com/feed"),
        MessageAction::Subscribe("http://sub.example.com/feed".into())
    );
    assert_eq!(open.route_message(1, "hello"), MessageAction::Invalid);

    let closed = router(&[7]);
    assert_eq!(closed.route_message(8, "https://t.me/a/1"), MessageAction::Unauthorized);
    // Commands are answered for everyone.
    assert_eq!(closed.route_message(8, "/help"), MessageAction::Command(Command::Help));
    assert!(matches!(closed.route_message(7, "t.me/a/1"), MessageAction::Submit(_)));
}

#[test]
fn presses_are_checked_against_the_presser() {
    let r = router(&[1, 2]);
    assert_eq!(
        r.route_press(1, "cancel_1_3"),
        PressAction::Cancel(CallbackPayload::CancelItem { user: 1, id: 3 })
    );
    assert_eq!(
        r.route_press(2, "cancel_summary_1"),
        PressAction::Foreign(CallbackPayload::CancelBatch { user: 1 })
    );
    assert_eq!(r.route_press(1, "cancel_1"), PressAction::Invalid);
    assert_eq!(r.route_press(3, "cancel_3_1"), PressAction::Unauthorized);
}
