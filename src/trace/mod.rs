// SPDX-License-Identifier: Apache-2.0 OR MIT
// High-speed trace buffer: backend contract and in-process implementation
//
// Every name gets a memory mask (levels recorded in the ring) and a slow
// mask (levels that are formatted and reported through the issue backend).
// Mask checks are single atomic loads so disabled calls stay cheap.

mod buffer;
mod entry;
mod ringbuffer;

pub use buffer::{
    show, MemoryTrace, TraceBackend, TraceId, TraceRecord, DEFAULT_CAPACITY, DEFAULT_NAME,
    MAX_NAMES,
};
pub use entry::{TraceEntry, TRACE_MSG_MAX};
pub use ringbuffer::TraceRing;
