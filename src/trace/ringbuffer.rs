// SPDX-License-Identifier: Apache-2.0 OR MIT
// Lock-free circular buffer backing the in-memory trace

use super::entry::{TraceEntry, EMPTY, READY, WRITING};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-aligned wrapper to prevent false sharing
#[repr(align(64))]
struct CacheAligned<T>(T);

/// Lock-free multiple-producer single-consumer circular buffer
///
/// Any thread may write; writers reserve a slot through CAS on the write
/// sequence and never block. When writers lap the reader the oldest
/// entries are overwritten and counted as overruns.
pub struct TraceRing {
    entries: Box<[UnsafeCell<TraceEntry>]>,
    capacity: usize,
    write_seq: CacheAligned<AtomicU64>,
    read_seq: CacheAligned<AtomicU64>,
    overruns: AtomicU64,
}

// SAFETY: writers coordinate via CAS on write_seq, there is one reader,
// and the per-slot state machine keeps a reader off a slot being written.
unsafe impl Sync for TraceRing {}

impl TraceRing {
    /// # Panics
    /// Panics if capacity is not a power of 2
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "Capacity must be power of 2");

        let entries: Vec<UnsafeCell<TraceEntry>> = (0..capacity)
            .map(|_| UnsafeCell::new(TraceEntry::default()))
            .collect();

        Self {
            entries: entries.into_boxed_slice(),
            capacity,
            write_seq: CacheAligned(AtomicU64::new(0)),
            read_seq: CacheAligned(AtomicU64::new(0)),
            overruns: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write an entry; never blocks
    pub fn write(&self, mut entry: TraceEntry) {
        let seq = loop {
            let current = self.write_seq.0.load(Ordering::Relaxed);
            match self.write_seq.0.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break current,
                Err(_) => std::hint::spin_loop(),
            }
        };

        let pos = (seq as usize) & (self.capacity - 1);

        let read_seq = self.read_seq.0.load(Ordering::Acquire);
        if seq >= read_seq + self.capacity as u64 {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }

        unsafe {
            (*self.entries[pos].get())
                .state
                .store(WRITING, Ordering::Release);
        }

        entry.sequence = seq;

        // We own this slot until it is marked READY
        unsafe {
            let slot = &mut *self.entries[pos].get();
            slot.level = entry.level;
            slot.fmt_now = entry.fmt_now;
            slot.trace_id = entry.trace_id;
            slot.message_len = entry.message_len;
            slot.line = entry.line;
            slot.thread_id = entry.thread_id;
            slot.timestamp_us = entry.timestamp_us;
            slot.sequence = entry.sequence;
            slot.function = entry.function;
            slot.process_id = entry.process_id;
            slot.message = entry.message;
        }

        unsafe {
            (*self.entries[pos].get())
                .state
                .store(READY, Ordering::Release);
        }
    }

    /// Read the oldest unread entry (single consumer)
    pub fn read(&self) -> Option<TraceEntry> {
        let mut read_seq = self.read_seq.0.load(Ordering::Relaxed);
        let write_seq = self.write_seq.0.load(Ordering::Acquire);

        if read_seq >= write_seq {
            return None;
        }

        // Skip what writers have already overwritten
        if write_seq - read_seq > self.capacity as u64 {
            read_seq = write_seq - self.capacity as u64;
            self.read_seq.0.store(read_seq, Ordering::Release);
        }

        let pos = (read_seq as usize) & (self.capacity - 1);

        let mut spins = 0;
        loop {
            let state = unsafe { (*self.entries[pos].get()).state.load(Ordering::Acquire) };
            if state == READY {
                break;
            }
            if spins > 1000 {
                return None;
            }
            spins += 1;
            std::hint::spin_loop();
        }

        let entry = unsafe { (*self.entries[pos].get()).clone() };

        unsafe {
            (*self.entries[pos].get())
                .state
                .store(EMPTY, Ordering::Release);
        }
        self.read_seq.0.fetch_add(1, Ordering::Release);

        Some(entry)
    }

    /// Number of entries lost to wrap-around
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let write_seq = self.write_seq.0.load(Ordering::Relaxed);
        let read_seq = self.read_seq.0.load(Ordering::Relaxed);
        (write_seq.saturating_sub(read_seq) as usize).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
