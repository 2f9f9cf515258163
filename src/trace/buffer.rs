// SPDX-License-Identifier: Apache-2.0 OR MIT
// Trace backend contract and the in-process memory trace

use super::entry::TraceEntry;
use super::ringbuffer::TraceRing;
use crate::config::Settings;
use crate::severity::{trace_level_name, TLVL_MAX};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// Name slots available; registrations past this share id 0
pub const MAX_NAMES: usize = 256;

/// Ring capacity used by [`MemoryTrace::new`]
pub const DEFAULT_CAPACITY: usize = 4096;

/// Name owning id 0
pub const DEFAULT_NAME: &str = "TRACE";

/// Handle for a registered trace name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub u16);

/// One message headed for the trace buffer
#[derive(Debug, Clone, Copy)]
pub struct TraceRecord<'a> {
    pub time: DateTime<Local>,
    pub id: TraceId,
    pub level: u8,
    pub line: u32,
    pub function: &'static str,
    pub message: &'a str,
    /// Caller asked for the message to be formatted immediately
    pub fmt_now: bool,
}

/// High-speed buffer backend
///
/// Names are registered once and looked up by id afterwards. Both mask
/// checks run on every logging call and must not block.
pub trait TraceBackend: Send + Sync {
    /// Id for `name`, registering it on first use
    fn register(&self, name: &str) -> TraceId;

    fn name_of(&self, id: TraceId) -> Option<String>;

    /// Whether `level` of `id` is written to memory
    fn memory_enabled(&self, id: TraceId, level: u8) -> bool;

    /// Whether `level` of `id` takes the formatted slow path
    fn slow_enabled(&self, id: TraceId, level: u8) -> bool;

    fn write(&self, record: &TraceRecord<'_>);
}

struct NameSlot {
    memory: AtomicU64,
    slow: AtomicU64,
}

#[inline]
fn level_bit(level: u8) -> u64 {
    if level > TLVL_MAX {
        0
    } else {
        1u64 << level
    }
}

/// In-process trace buffer: name registry, per-name masks and one ring
pub struct MemoryTrace {
    ids: RwLock<HashMap<String, TraceId>>,
    names: RwLock<Vec<String>>,
    slots: Box<[NameSlot]>,
    default_memory: u64,
    default_slow: u64,
    /// Global memory switch
    mode: AtomicBool,
    ring: TraceRing,
    /// The ring has a single consumer
    reader: Mutex<()>,
}

impl MemoryTrace {
    pub fn new(settings: &Settings) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, settings.memory_mask, settings.slow_mask)
    }

    /// # Panics
    /// Panics if capacity is not a power of 2
    pub fn with_capacity(capacity: usize, memory_mask: u64, slow_mask: u64) -> Self {
        let slots: Vec<NameSlot> = (0..MAX_NAMES)
            .map(|_| NameSlot {
                memory: AtomicU64::new(memory_mask),
                slow: AtomicU64::new(slow_mask),
            })
            .collect();

        let mut ids = HashMap::new();
        ids.insert(DEFAULT_NAME.to_string(), TraceId(0));

        Self {
            ids: RwLock::new(ids),
            names: RwLock::new(vec![DEFAULT_NAME.to_string()]),
            slots: slots.into_boxed_slice(),
            default_memory: memory_mask,
            default_slow: slow_mask,
            mode: AtomicBool::new(true),
            ring: TraceRing::new(capacity),
            reader: Mutex::new(()),
        }
    }

    fn slot(&self, id: TraceId) -> &NameSlot {
        self.slots.get(id.0 as usize).unwrap_or(&self.slots[0])
    }

    pub fn set_memory_mask(&self, id: TraceId, mask: u64) {
        self.slot(id).memory.store(mask, Ordering::Relaxed);
    }

    pub fn set_slow_mask(&self, id: TraceId, mask: u64) {
        self.slot(id).slow.store(mask, Ordering::Relaxed);
    }

    pub fn memory_mask(&self, id: TraceId) -> u64 {
        self.slot(id).memory.load(Ordering::Relaxed)
    }

    pub fn slow_mask(&self, id: TraceId) -> u64 {
        self.slot(id).slow.load(Ordering::Relaxed)
    }

    /// Apply a memory mask to every registered name
    pub fn set_all_memory_masks(&self, mask: u64) {
        let count = self.name_count();
        for slot in &self.slots[..count] {
            slot.memory.store(mask, Ordering::Relaxed);
        }
    }

    /// Turn memory recording on or off for all names
    pub fn set_mode(&self, enabled: bool) {
        self.mode.store(enabled, Ordering::Relaxed);
    }

    pub fn mode(&self) -> bool {
        self.mode.load(Ordering::Relaxed)
    }

    /// Oldest unread entry
    pub fn read(&self) -> Option<TraceEntry> {
        let _reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        self.ring.read()
    }

    /// All unread entries, oldest first
    pub fn drain(&self) -> Vec<TraceEntry> {
        let _reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        std::iter::from_fn(|| self.ring.read()).collect()
    }

    /// Entries lost to wrap-around
    pub fn overruns(&self) -> u64 {
        self.ring.overruns()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Registered names, indexed by id
    pub fn names(&self) -> Vec<String> {
        self.names
            .read()
            .map(|names| names.clone())
            .unwrap_or_default()
    }

    fn name_count(&self) -> usize {
        self.names.read().map(|names| names.len()).unwrap_or(1)
    }
}

impl Default for MemoryTrace {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl TraceBackend for MemoryTrace {
    fn register(&self, name: &str) -> TraceId {
        if let Ok(ids) = self.ids.read() {
            if let Some(&id) = ids.get(name) {
                return id;
            }
        }

        let (Ok(mut ids), Ok(mut names)) = (self.ids.write(), self.names.write()) else {
            return TraceId(0);
        };
        // Another thread may have won the race
        if let Some(&id) = ids.get(name) {
            return id;
        }
        if names.len() >= MAX_NAMES {
            return TraceId(0);
        }

        let id = TraceId(names.len() as u16);
        let slot = &self.slots[id.0 as usize];
        slot.memory.store(self.default_memory, Ordering::Relaxed);
        slot.slow.store(self.default_slow, Ordering::Relaxed);
        names.push(name.to_string());
        ids.insert(name.to_string(), id);
        id
    }

    fn name_of(&self, id: TraceId) -> Option<String> {
        self.names.read().ok()?.get(id.0 as usize).cloned()
    }

    #[inline]
    fn memory_enabled(&self, id: TraceId, level: u8) -> bool {
        self.mode.load(Ordering::Relaxed) && self.memory_mask(id) & level_bit(level) != 0
    }

    #[inline]
    fn slow_enabled(&self, id: TraceId, level: u8) -> bool {
        self.slow_mask(id) & level_bit(level) != 0
    }

    fn write(&self, record: &TraceRecord<'_>) {
        if !self.memory_enabled(record.id, record.level) {
            return;
        }

        let mut entry = TraceEntry::new(record.id.0, record.level, record.message);
        entry.timestamp_us = record.time.timestamp_micros();
        entry.line = record.line;
        entry.function = record.function;
        entry.fmt_now = record.fmt_now;
        self.ring.write(entry);
    }
}

/// Render entries one per line, oldest first, with a header
pub fn show(entries: &[TraceEntry], names: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:<21} {:>7} {:>7} {:<16} {:<7} msg",
        "idx", "time", "pid", "tid", "name", "lvl"
    );
    for entry in entries {
        let name = names
            .get(entry.trace_id as usize)
            .map(String::as_str)
            .unwrap_or(DEFAULT_NAME);
        let _ = writeln!(
            out,
            "{:>6} {:<21} {:>7} {:>7} {:<16} {:<7} {}",
            entry.sequence,
            entry.time().format("%m-%d %H:%M:%S%.6f"),
            entry.process_id,
            entry.thread_id,
            name,
            trace_level_name(entry.level),
            entry.get_message()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::{TLVL_DEBUG, TLVL_INFO, TLVL_LOG};
    use std::sync::Arc;
    use std::thread;

    fn record<'a>(id: TraceId, level: u8, message: &'a str) -> TraceRecord<'a> {
        TraceRecord {
            time: Local::now(),
            id,
            level,
            line: 7,
            function: "tests::record",
            message,
            fmt_now: false,
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let trace = MemoryTrace::default();
        let a = trace.register("alpha");
        let b = trace.register("beta");
        assert_ne!(a, b);
        assert_eq!(trace.register("alpha"), a);
        assert_eq!(trace.name_of(b).as_deref(), Some("beta"));
        assert_eq!(trace.register(DEFAULT_NAME), TraceId(0));
    }

    #[test]
    fn test_name_table_overflow_shares_id_zero() {
        let trace = MemoryTrace::default();
        for i in 1..MAX_NAMES {
            assert_eq!(trace.register(&format!("name{}", i)), TraceId(i as u16));
        }
        assert_eq!(trace.register("one-too-many"), TraceId(0));
    }

    #[test]
    fn test_default_masks() {
        let trace = MemoryTrace::default();
        let id = trace.register("masks");
        assert!(trace.memory_enabled(id, TLVL_INFO));
        assert!(trace.memory_enabled(id, TLVL_DEBUG));
        assert!(!trace.memory_enabled(id, TLVL_DEBUG + 1));
        assert!(trace.slow_enabled(id, TLVL_LOG));
        assert!(!trace.slow_enabled(id, TLVL_DEBUG));
        assert!(!trace.memory_enabled(id, 64));
    }

    #[test]
    fn test_disabled_levels_are_dropped() {
        let trace = MemoryTrace::with_capacity(16, 0b1000, 0);
        let id = trace.register("drop");
        trace.write(&record(id, TLVL_INFO, "kept"));
        trace.write(&record(id, TLVL_LOG, "dropped"));

        let entries = trace.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get_message(), "kept");
        assert_eq!(entries[0].line, 7);
    }

    #[test]
    fn test_mode_switch() {
        let trace = MemoryTrace::with_capacity(16, u64::MAX, 0);
        let id = trace.register("mode");
        trace.set_mode(false);
        trace.write(&record(id, 10, "off"));
        assert!(trace.is_empty());
        trace.set_mode(true);
        trace.write(&record(id, 10, "on"));
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_per_name_masks() {
        let trace = MemoryTrace::with_capacity(16, 0, 0);
        let quiet = trace.register("quiet");
        let loud = trace.register("loud");
        trace.set_memory_mask(loud, u64::MAX);
        trace.set_slow_mask(loud, 1 << 20);
        assert!(!trace.memory_enabled(quiet, 20));
        assert!(trace.memory_enabled(loud, 63));
        assert!(trace.slow_enabled(loud, 20));

        trace.set_all_memory_masks(1);
        assert!(trace.memory_enabled(quiet, 0));
        assert!(!trace.memory_enabled(loud, 63));
    }

    #[test]
    fn test_show_lists_names_and_levels() {
        let trace = MemoryTrace::with_capacity(16, u64::MAX, 0);
        let id = trace.register("shower");
        trace.write(&record(id, TLVL_LOG, "first"));
        trace.write(&record(id, 12, "second"));

        let text = show(&trace.drain(), &trace.names());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("shower"));
        assert!(lines[1].contains("log"));
        assert!(lines[1].ends_with("first"));
        assert!(lines[2].contains("dbg12"));
    }

    #[test]
    fn test_concurrent_registration() {
        let trace = Arc::new(MemoryTrace::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let trace = Arc::clone(&trace);
                thread::spawn(move || {
                    (0..20)
                        .map(|i| trace.register(&format!("shared{}", i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<TraceId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(trace.names().len(), 21);
    }
}
