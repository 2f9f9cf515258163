// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property-based tests for message text assembly and level mapping
//!
//! - **Truncation:** whatever goes into a message buffer, the text stays
//!   valid UTF-8, fits in `USER_MSG_MAX - 1` bytes and is NUL terminated.
//! - **Prefix:** a short enough name and body come out as `"<name> <body>"`
//!   with at most one trailing newline removed.
//! - **Levels:** requested levels always land in `0..=63`, and the
//!   severity to trace level table is a pure function.

#[cfg(test)]
mod tests {
    use daq_logging::severity::{clamp_trace_level, TLVL_DEBUG, TLVL_MAX};
    use daq_logging::text::{build_message, MessageBody, USER_MSG_MAX};
    use daq_logging::trace::{TraceEntry, TRACE_MSG_MAX};
    use daq_logging::{DebugLevel, Severity};
    use proptest::prelude::*;

    proptest! {
        /// Any text, of any length, produces a bounded NUL-terminated message
        #[test]
        fn test_message_is_bounded(name in proptest::option::of(".{0,40}"), body in ".{0,2000}") {
            let buf = build_message(name.as_deref(), MessageBody::Text(&body));
            prop_assert!(buf.len() <= USER_MSG_MAX - 1);
            prop_assert!(std::str::from_utf8(buf.as_str().as_bytes()).is_ok());
            let raw = buf.as_bytes_with_nul();
            prop_assert_eq!(raw.len(), buf.len() + 1);
            prop_assert_eq!(raw[buf.len()], 0);
        }

        /// Formatted and pre-formatted bodies agree
        #[test]
        fn test_format_matches_text(body in "[a-z%{} ]{0,1500}") {
            let text = build_message(None, MessageBody::Text(&body));
            let formatted = build_message(None, MessageBody::Format(format_args!("{}", body)));
            prop_assert_eq!(text.as_str(), formatted.as_str());
            prop_assert_eq!(text.is_truncated(), formatted.is_truncated());
        }

        /// Short messages are kept whole, with the name in front
        #[test]
        fn test_short_message_is_exact(name in "[A-Z]{1,12}", body in "[ -~]{0,200}", newline in any::<bool>()) {
            let input = if newline { format!("{}\n", body) } else { body.clone() };
            let buf = build_message(Some(&name), MessageBody::Text(&input));
            prop_assert_eq!(buf.as_str(), format!("{} {}", name, body));
            prop_assert!(!buf.is_truncated());
        }

        /// Trace entries keep a character-aligned prefix of the message
        #[test]
        fn test_trace_entry_prefix(message in ".{0,400}") {
            let entry = TraceEntry::new(0, TLVL_DEBUG, &message);
            let stored = entry.get_message();
            prop_assert!(stored.len() <= TRACE_MSG_MAX);
            prop_assert!(message.starts_with(stored));
            if message.len() <= TRACE_MSG_MAX {
                prop_assert_eq!(stored, message.as_str());
            }
        }

        /// Every requested level maps into the buffer's range
        #[test]
        fn test_levels_are_clamped(level in any::<i64>()) {
            let clamped = clamp_trace_level(level);
            prop_assert!(clamped <= TLVL_MAX);
            if (0..=TLVL_MAX as i64).contains(&level) {
                prop_assert_eq!(clamped as i64, level);
            }

            let debug = Severity::debug(level).trace_level();
            prop_assert!((TLVL_DEBUG..=TLVL_MAX).contains(&debug));
            prop_assert_eq!(debug, clamp_trace_level(level.saturating_add(TLVL_DEBUG as i64)).max(TLVL_DEBUG));
        }

        /// The mapping has no hidden state and inverts cleanly
        #[test]
        fn test_trace_level_is_pure(level in 0u8..=TLVL_MAX) {
            let severity = Severity::from_trace_level(level);
            prop_assert_eq!(severity.trace_level(), level);
            prop_assert_eq!(Severity::from_trace_level(level), severity);
            prop_assert_eq!(DebugLevel::new(level as i64).get(), level.min(TLVL_MAX - TLVL_DEBUG));
        }
    }
}
