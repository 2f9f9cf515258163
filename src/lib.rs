// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Unified DAQ logging
//!
//! Six streams behind one set of macros: fatal, error, warning and info
//! are structured issues routed per severity through configurable output
//! streams; log and debug go first to a fast in-memory trace buffer and
//! only then, when enabled, through the issue streams.
//!
//! ```ignore
//! daq_logging::setup();
//! ers_warning!("disk {} is {}% full", disk, pct);
//! tlog!("Hello log stream");
//! tlog_debug!(1, name = "MYNAME", "Hello debug stream arg={}", 3);
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod forward;
pub mod issue;
#[macro_use]
mod macros;
pub mod reporter;
pub mod setup;
pub mod severity;
pub mod stream;
pub mod text;
pub mod trace;

pub use config::{
    apply_defaults, ConfigError, Environment, MemoryEnv, ProcessEnv, RoutingConfig, Settings,
    StreamDirective,
};
pub use context::Context;
pub use dispatch::{Adapter, CallShape, CallSite, LogCall, Payload};
pub use forward::{TraceForwardStream, TRACE_STREAM};
pub use issue::{Issue, IssueDefinition, IssueError, IssueRegistry};
pub use reporter::{IssueBackend, IssueReporter};
pub use setup::{logging, setup, setup_with, Logging};
pub use severity::{DebugLevel, Severity, SeverityKind};
pub use stream::{OutputStream, StreamAction, StreamRegistry};
pub use trace::{MemoryTrace, TraceBackend, TraceId, TraceRecord};
