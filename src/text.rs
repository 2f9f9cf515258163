// SPDX-License-Identifier: Apache-2.0 OR MIT
// Fixed-capacity message text assembly for the trace slow path

use std::fmt::{self, Write};

/// Capacity of a [`MessageBuffer`] in bytes, including the terminating NUL
pub const USER_MSG_MAX: usize = 1024;

/// Fixed-capacity, NUL-terminated text buffer
///
/// Holds at most `USER_MSG_MAX - 1` bytes of text. Writes past that are
/// truncated on a UTF-8 character boundary and never fail.
#[derive(Clone)]
pub struct MessageBuffer {
    bytes: [u8; USER_MSG_MAX],
    len: usize,
    truncated: bool,
}

impl MessageBuffer {
    pub const CAPACITY: usize = USER_MSG_MAX;

    pub const fn new() -> Self {
        Self {
            bytes: [0; USER_MSG_MAX],
            len: 0,
            truncated: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether any write was cut short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        // Only whole UTF-8 sequences are ever copied in
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    /// Text followed by its terminating NUL
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes[..=self.len]
    }

    /// Append as much of `text` as fits
    pub fn push_str(&mut self, text: &str) {
        let room = USER_MSG_MAX - 1 - self.len;
        let take = if text.len() <= room {
            text.len()
        } else {
            self.truncated = true;
            floor_char_boundary(text, room)
        };
        self.bytes[self.len..self.len + take].copy_from_slice(&text.as_bytes()[..take]);
        self.len += take;
        self.bytes[self.len] = 0;
    }

    /// Remove one trailing newline, if present
    pub fn trim_trailing_newline(&mut self) {
        if self.len > 0 && self.bytes[self.len - 1] == b'\n' {
            self.len -= 1;
            self.bytes[self.len] = 0;
        }
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MessageBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("text", &self.as_str())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl fmt::Display for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message payload handed to [`build_message`]
#[derive(Clone, Copy)]
pub enum MessageBody<'a> {
    /// Deferred format string with its arguments
    Format(fmt::Arguments<'a>),
    /// Already formatted text; never scanned for format specifiers
    Text(&'a str),
}

/// Assemble `"<name> <body>"` into a fixed buffer, minus one trailing newline
pub fn build_message(name: Option<&str>, body: MessageBody<'_>) -> MessageBuffer {
    let mut buf = MessageBuffer::new();
    push_name(&mut buf, name);
    match body {
        MessageBody::Format(args) => {
            let _ = buf.write_fmt(args);
        }
        MessageBody::Text(text) => buf.push_str(text),
    }
    buf.trim_trailing_newline();
    buf
}

/// Put `name` in front of text already built by [`build_message`]
///
/// The text keeps whatever trailing newline it still has.
pub fn prefix_name(name: Option<&str>, text: &str) -> MessageBuffer {
    let mut buf = MessageBuffer::new();
    push_name(&mut buf, name);
    buf.push_str(text);
    buf
}

fn push_name(buf: &mut MessageBuffer, name: Option<&str>) {
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        buf.push_str(name);
        buf.push_str(" ");
    }
}

/// Strip exactly one trailing newline
pub fn trim_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefix() {
        let buf = build_message(Some("MYNAME"), MessageBody::Text("controllable via name"));
        assert_eq!(buf.as_str(), "MYNAME controllable via name");

        let buf = build_message(Some(""), MessageBody::Text("no name"));
        assert_eq!(buf.as_str(), "no name");
    }

    #[test]
    fn test_format_body() {
        let value = 3;
        let buf = build_message(None, MessageBody::Format(format_args!("arg={}\n", value)));
        assert_eq!(buf.as_str(), "arg=3");
    }

    #[test]
    fn test_text_body_is_not_a_format() {
        let buf = build_message(None, MessageBody::Text("100% {done}"));
        assert_eq!(buf.as_str(), "100% {done}");
    }

    #[test]
    fn test_trailing_newlines() {
        assert_eq!(build_message(None, MessageBody::Text("one\n")).as_str(), "one");
        assert_eq!(build_message(None, MessageBody::Text("none")).as_str(), "none");
        assert_eq!(build_message(None, MessageBody::Text("two\n\n")).as_str(), "two\n");
        assert_eq!(build_message(None, MessageBody::Text("\n")).as_str(), "");
        assert_eq!(trim_trailing_newline("a\n\n"), "a\n");
    }

    #[test]
    fn test_prefix_name_does_not_trim_again() {
        let built = build_message(None, MessageBody::Text("two\n\n"));
        assert_eq!(prefix_name(Some("MYNAME"), built.as_str()).as_str(), "MYNAME two\n");
        assert_eq!(prefix_name(None, built.as_str()).as_str(), "two\n");
    }

    #[test]
    fn test_truncation_lengths() {
        for len in [USER_MSG_MAX, USER_MSG_MAX + 1, USER_MSG_MAX + 1000] {
            let text = "x".repeat(len);
            let buf = build_message(None, MessageBody::Text(&text));
            assert_eq!(buf.len(), USER_MSG_MAX - 1);
            assert!(buf.is_truncated());
            let raw = buf.as_bytes_with_nul();
            assert_eq!(raw.len(), USER_MSG_MAX);
            assert_eq!(raw[USER_MSG_MAX - 1], 0);
        }

        let text = "y".repeat(USER_MSG_MAX - 1);
        let buf = build_message(None, MessageBody::Text(&text));
        assert_eq!(buf.len(), USER_MSG_MAX - 1);
        assert!(!buf.is_truncated());
    }

    #[test]
    fn test_truncation_keeps_utf8() {
        let text = format!("{}é", "a".repeat(USER_MSG_MAX - 2));
        let buf = build_message(None, MessageBody::Text(&text));
        assert_eq!(buf.len(), USER_MSG_MAX - 2);
        assert!(buf.as_str().chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_truncated_name_and_format() {
        let name = "n".repeat(USER_MSG_MAX * 2);
        let buf = build_message(Some(&name), MessageBody::Format(format_args!("{}", 42)));
        assert_eq!(buf.len(), USER_MSG_MAX - 1);
        assert!(buf.as_str().starts_with("nnn"));
    }
}
