//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component H: parse the structured log lines the shim and runtime
//! binary emit on fd4, forward them to the supervisor logger, and track
//! the last `msg=` seen so a launch failure can be enriched with it.
//!
//! The original implementation uses `logfmt` for this; nothing in this
//! crate's dependency stack brings that parser along, so a small scanner
//! for the one field this crate cares about (`msg=`, quoted or not)
//! stands in for it (noted in DESIGN.md).

use crate::capabilities::Logger;

/// Forwards every parsed `msg=` field to `logger` at debug level under
/// the `runc` tag, in line order. Returns the last one seen, used to
/// enrich a launch-failure error.
pub fn forward_logs(raw: &[u8], logger: &dyn Logger) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut last_msg = None;
    for line in text.split('\n') {
        if let Some(msg) = parse_msg(line) {
            logger.debug("runc", &[("message", msg.as_str())]);
            last_msg = Some(msg);
        }
    }
    last_msg
}

/// Finds the `msg=` field and returns its value. A quoted value
/// (`msg="failed to start"`) runs to the next `"`; an unquoted value runs
/// to the next recognized `key=` token or end of line, so a multi-word
/// message like `msg=failed to start` is captured whole instead of being
/// truncated at the first space.
fn parse_msg(line: &str) -> Option<String> {
    let after_key = line.find("msg=")? + "msg=".len();
    let rest = &line[after_key..];

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some(quoted[..end].to_string());
    }

    let mut end = rest.len();
    for (offset, _) in rest.match_indices(' ') {
        let tail = &rest[offset + 1..];
        if looks_like_key_value(tail) {
            end = offset;
            break;
        }
    }
    Some(rest[..end].trim_end().to_string())
}

/// True if `field` starts with `<ident>=`, the shape of the next logfmt
/// field rather than a continuation of the current value.
fn looks_like_key_value(field: &str) -> bool {
    match field.find('=') {
        Some(eq) if eq > 0 => field[..eq]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingLogger {
        debugged: Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn info(&self, _msg: &str) {}
        fn debug(&self, _tag: &str, fields: &[(&str, &str)]) {
            for (_, v) in fields {
                self.debugged.lock().unwrap().push(v.to_string());
            }
        }
        fn error(&self, _tag: &str, _err: &(dyn std::error::Error + 'static)) {}
        fn session(&self, _name: &str) -> Arc<dyn Logger> {
            Arc::new(RecordingLogger::default())
        }
    }

    #[test]
    fn forwards_each_msg_field_and_returns_the_last() {
        let logger = RecordingLogger::default();
        let raw = b"level=info msg=starting\nlevel=error msg=\"failed to start\"\n";

        let last = forward_logs(raw, &logger);
        assert_eq!(last.as_deref(), Some("failed to start"));
        assert_eq!(*logger.debugged.lock().unwrap(), vec!["starting", "failed to start"]);
    }

    #[test]
    fn unquoted_multi_word_message_is_not_truncated_at_first_space() {
        let logger = RecordingLogger::default();
        let raw = b"msg=failed to start\n";

        let last = forward_logs(raw, &logger);
        assert_eq!(last.as_deref(), Some("failed to start"));
    }

    #[test]
    fn lines_without_msg_are_skipped() {
        let logger = RecordingLogger::default();
        let raw = b"level=info\nno-msg-here\n";
        assert_eq!(forward_logs(raw, &logger), None);
        assert!(logger.debugged.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_log_yields_no_message() {
        let logger = RecordingLogger::default();
        assert_eq!(forward_logs(b"", &logger), None);
    }
}
