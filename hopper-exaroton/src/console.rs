//! Console line parsing.
//!
//! Raw console output is ANSI-colored free text. [`parse_line`] extracts the
//! few line shapes the bridge cares about (chat, join, leave) and returns
//! `None` for everything else; it never fails on malformed input.

/// Structured event extracted from one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Chat {
        player: String,
        message: String,
        /// The vanilla server prefixes unsigned chat with `[Not Secure]`.
        /// Informational only; the line is still relayed.
        insecure: bool,
    },
    Join { player: String },
    Leave { player: String },
}

/// Parse one raw console line into a [`ConsoleEvent`].
///
/// Only `INFO` lines are considered; warnings and errors are never
/// protocol-relevant for the relay.
pub fn parse_line(raw: &str) -> Option<ConsoleEvent> {
    let cleaned = strip_ansi(raw);
    let line = cleaned.trim_end_matches('\r').trim();
    if !line.contains("INFO") {
        return None;
    }
    if let Some(player) = match_suffix(line, " joined the game") {
        return Some(ConsoleEvent::Join { player });
    }
    if let Some(player) = match_suffix(line, " left the game") {
        return Some(ConsoleEvent::Leave { player });
    }
    if let Some(player) = match_lost_connection(line) {
        return Some(ConsoleEvent::Leave { player });
    }
    match_chat(line)
}

/// Remove ANSI CSI escape sequences (`ESC [ ... <letter>`).
pub fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for param in chars.by_ref() {
                if param.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Match `"...: <name><suffix>"` at the end of the line.
fn match_suffix(line: &str, suffix: &str) -> Option<String> {
    let head = line.strip_suffix(suffix)?;
    let sep = head.find(": ")?;
    let player = head[sep + 2..].trim();
    (!player.is_empty()).then(|| player.to_string())
}

/// Match `"...: <name> lost connection..."` anywhere on the line.
fn match_lost_connection(line: &str) -> Option<String> {
    let at = line.rfind(" lost connection")?;
    let head = &line[..at];
    let sep = head.find(": ")?;
    let player = head[sep + 2..].trim();
    (!player.is_empty()).then(|| player.to_string())
}

/// Chat lines carry the speaker in the last `<...>` bracket pair; the rest of
/// the line after `>` is the message body.
fn match_chat(line: &str) -> Option<ConsoleEvent> {
    let open = line.rfind('<')?;
    let close = line[open..].find('>')? + open;
    let player = line[open + 1..close].trim();
    let message = line[close + 1..].trim();
    if player.is_empty() || message.is_empty() {
        return None;
    }
    Some(ConsoleEvent::Chat {
        player: player.to_string(),
        message: message.to_string(),
        insecure: line.contains("[Not Secure]"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_line_round_trip() {
        let event = parse_line("[12:00:00] [Server thread/INFO]: <Steve> hello world");
        assert_eq!(
            event,
            Some(ConsoleEvent::Chat {
                player: "Steve".to_string(),
                message: "hello world".to_string(),
                insecure: false,
            })
        );
    }

    #[test]
    fn test_insecure_chat_still_isolates_name() {
        let event = parse_line("[12:00:00] [Server thread/INFO]: [Not Secure] <Steve> hi");
        assert_eq!(
            event,
            Some(ConsoleEvent::Chat {
                player: "Steve".to_string(),
                message: "hi".to_string(),
                insecure: true,
            })
        );
    }

    #[test]
    fn test_join_suffix_trims_player() {
        let event = parse_line("[12:00:00] [Server thread/INFO]:  Steve  joined the game");
        assert_eq!(
            event,
            Some(ConsoleEvent::Join {
                player: "Steve".to_string()
            })
        );
    }

    #[test]
    fn test_leave_suffix() {
        let event = parse_line("[12:00:00] [Server thread/INFO]: Alex left the game");
        assert_eq!(
            event,
            Some(ConsoleEvent::Leave {
                player: "Alex".to_string()
            })
        );
    }

    #[test]
    fn test_lost_connection_with_reason() {
        let event =
            parse_line("[12:00:00] [Server thread/INFO]: Alex lost connection: Disconnected");
        assert_eq!(
            event,
            Some(ConsoleEvent::Leave {
                player: "Alex".to_string()
            })
        );
    }

    #[test]
    fn test_non_info_lines_yield_none() {
        assert_eq!(parse_line("[12:00:00] [Server thread/WARN]: <Steve> hello"), None);
        assert_eq!(parse_line("Steve joined the game"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_ansi_codes_and_carriage_returns_are_stripped() {
        let event = parse_line(
            "\u{1b}[32m[12:00:00] [Server thread/INFO]: <Steve> hi\u{1b}[0m\r",
        );
        assert_eq!(
            event,
            Some(ConsoleEvent::Chat {
                player: "Steve".to_string(),
                message: "hi".to_string(),
                insecure: false,
            })
        );
    }

    #[test]
    fn test_chat_requires_name_and_body() {
        assert_eq!(parse_line("[12:00:00] [Server thread/INFO]: <> hello"), None);
        assert_eq!(parse_line("[12:00:00] [Server thread/INFO]: <Steve>   "), None);
        assert_eq!(parse_line("[12:00:00] [Server thread/INFO]: Server started"), None);
    }

    #[test]
    fn test_last_bracket_pair_wins() {
        let event = parse_line("[12:00:00] [Server thread/INFO]: <fake> text <Steve> real");
        assert_eq!(
            event,
            Some(ConsoleEvent::Chat {
                player: "Steve".to_string(),
                message: "real".to_string(),
                insecure: false,
            })
        );
    }
}
