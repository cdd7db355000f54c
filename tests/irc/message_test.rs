//! Coverage for IRC line parsing and serialization.

use confann::irc::message::MAX_LINE_LEN;
use confann::irc::Message;

#[test]
fn parses_prefixed_privmsg() {
    let parsed = Message::parse(":alice!a@host PRIVMSG #alrs :!botlist\r\n");
    let msg = match parsed {
        Some(msg) => msg,
        None => panic!("line should parse"),
    };
    assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
    assert_eq!(msg.command, "PRIVMSG");
    assert_eq!(msg.params, vec!["#alrs".to_owned(), "!botlist".to_owned()]);
    assert_eq!(msg.source_nick(), Some("alice"));
}

#[test]
fn skips_tags_and_uppercases_command() {
    let parsed = Message::parse("@time=2020-01-01T00:00:00Z :srv ping :token");
    let msg = match parsed {
        Some(msg) => msg,
        None => panic!("line should parse"),
    };
    assert_eq!(msg.command, "PING");
    assert_eq!(msg.params, vec!["token".to_owned()]);
}

#[test]
fn numeric_with_middle_params() {
    let parsed = Message::parse(":irc.example 001 confann :Welcome to the network");
    let msg = match parsed {
        Some(msg) => msg,
        None => panic!("line should parse"),
    };
    assert_eq!(msg.command, "001");
    assert_eq!(msg.params.len(), 2);
    assert_eq!(msg.params[0], "confann");
}

#[test]
fn blank_lines_do_not_parse() {
    assert!(Message::parse("").is_none());
    assert!(Message::parse("\r\n").is_none());
    assert!(Message::parse(":prefixonly").is_none());
}

#[test]
fn serializes_handshake_lines() {
    assert_eq!(Message::nick("confann").to_line(), "NICK :confann");
    assert_eq!(
        Message::user("confann", "conference announcer").to_line(),
        "USER confann 0 * :conference announcer"
    );
    assert_eq!(
        Message::notice("#alrs", "+15551234567 joined the conference.").to_line(),
        "NOTICE #alrs :+15551234567 joined the conference."
    );
}

#[test]
fn caller_text_cannot_inject_commands() {
    let msg = Message::notice("#alrs", "x\r\nQUIT :bye\0 joined the conference.");
    let line = msg.to_line();
    assert!(!line.contains('\r'));
    assert!(!line.contains('\n'));
    assert!(!line.contains('\0'));
    assert!(line.starts_with("NOTICE #alrs :x  QUIT"));
}

#[test]
fn overlong_lines_are_truncated_on_char_boundary() {
    let text = "é".repeat(400);
    let line = Message::notice("#alrs", &text).to_line();
    assert!(line.len() <= MAX_LINE_LEN);
    assert!(line.starts_with("NOTICE #alrs :é"));
}
