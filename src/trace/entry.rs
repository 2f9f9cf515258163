// SPDX-License-Identifier: Apache-2.0 OR MIT
// Trace entry: one fixed-size, cache-line aligned ring buffer slot

use std::sync::atomic::{AtomicU8, Ordering};

/// Entry states for the slot state machine
pub(crate) const EMPTY: u8 = 0;
pub(crate) const WRITING: u8 = 1;
pub(crate) const READY: u8 = 2;

/// Message bytes stored per entry; longer messages are truncated
pub const TRACE_MSG_MAX: usize = 192;

/// One trace buffer slot
///
/// Layout (4 cache lines):
/// - Line 0: state and metadata
/// - Lines 1-3: message bytes
#[repr(C, align(64))]
pub struct TraceEntry {
    /// State for lock-free synchronization
    pub(crate) state: AtomicU8,
    pub level: u8,
    /// Caller asked for immediate formatting
    pub fmt_now: bool,
    _pad1: u8,
    pub trace_id: u16,
    pub message_len: u16,
    pub line: u32,
    pub thread_id: u32,
    /// Wall clock, microseconds since the Unix epoch
    pub timestamp_us: i64,
    pub sequence: u64,
    pub function: &'static str,
    pub process_id: u32,

    pub(crate) message: [u8; TRACE_MSG_MAX],
}

impl TraceEntry {
    pub fn new(trace_id: u16, level: u8, message: &str) -> Self {
        let mut entry = Self {
            trace_id,
            level,
            timestamp_us: chrono::Utc::now().timestamp_micros(),
            process_id: std::process::id(),
            thread_id: crate::context::current_thread_id(),
            state: AtomicU8::new(READY),
            ..Default::default()
        };
        entry.set_message(message);
        entry
    }

    /// Store the message, truncating on a character boundary
    pub(crate) fn set_message(&mut self, message: &str) {
        let mut len = message.len().min(TRACE_MSG_MAX);
        while !message.is_char_boundary(len) {
            len -= 1;
        }
        self.message[..len].copy_from_slice(&message.as_bytes()[..len]);
        self.message_len = len as u16;
    }

    pub fn get_message(&self) -> &str {
        std::str::from_utf8(&self.message[..self.message_len as usize]).unwrap_or("")
    }

    /// Timestamp as a local date-time
    pub fn time(&self) -> chrono::DateTime<chrono::Local> {
        chrono::DateTime::from_timestamp_micros(self.timestamp_us)
            .unwrap_or_default()
            .with_timezone(&chrono::Local)
    }
}

impl Default for TraceEntry {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            level: 0,
            fmt_now: false,
            _pad1: 0,
            trace_id: 0,
            message_len: 0,
            line: 0,
            thread_id: 0,
            timestamp_us: 0,
            sequence: 0,
            function: "",
            process_id: 0,
            message: [0; TRACE_MSG_MAX],
        }
    }
}

impl Clone for TraceEntry {
    fn clone(&self) -> Self {
        Self {
            state: AtomicU8::new(self.state.load(Ordering::Relaxed)),
            level: self.level,
            fmt_now: self.fmt_now,
            _pad1: 0,
            trace_id: self.trace_id,
            message_len: self.message_len,
            line: self.line,
            thread_id: self.thread_id,
            timestamp_us: self.timestamp_us,
            sequence: self.sequence,
            function: self.function,
            process_id: self.process_id,
            message: self.message,
        }
    }
}

impl std::fmt::Debug for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceEntry")
            .field("trace_id", &self.trace_id)
            .field("level", &self.level)
            .field("line", &self.line)
            .field("message", &self.get_message())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_alignment() {
        assert_eq!(std::mem::align_of::<TraceEntry>(), 64);
        assert_eq!(std::mem::size_of::<TraceEntry>() % 64, 0);
    }

    #[test]
    fn test_entry_creation() {
        let entry = TraceEntry::new(3, 4, "Test message");
        assert_eq!(entry.trace_id, 3);
        assert_eq!(entry.level, 4);
        assert_eq!(entry.get_message(), "Test message");
        assert!(entry.timestamp_us > 0);
    }

    #[test]
    fn test_message_truncation() {
        let very_long = "a".repeat(500);
        let entry = TraceEntry::new(0, 0, &very_long);
        assert_eq!(entry.message_len as usize, TRACE_MSG_MAX);
        assert_eq!(entry.get_message().len(), TRACE_MSG_MAX);
    }

    #[test]
    fn test_truncation_on_char_boundary() {
        let text = format!("{}ü", "a".repeat(TRACE_MSG_MAX - 1));
        let entry = TraceEntry::new(0, 0, &text);
        assert_eq!(entry.get_message().len(), TRACE_MSG_MAX - 1);
    }

    #[test]
    fn test_clone_keeps_fields() {
        let mut entry = TraceEntry::new(1, 2, "clone me");
        entry.line = 42;
        entry.function = "app::run";
        let copy = entry.clone();
        assert_eq!(copy.line, 42);
        assert_eq!(copy.function, "app::run");
        assert_eq!(copy.get_message(), "clone me");
    }
}
