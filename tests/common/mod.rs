// SPDX-License-Identifier: Apache-2.0 OR MIT
// Shared helpers for the integration tests

#![allow(dead_code)]

use daq_logging::config::StreamDirective;
use daq_logging::{
    Adapter, Issue, IssueBackend, MemoryTrace, OutputStream, RoutingConfig, Severity,
    SeverityKind, StreamAction,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// One call the recording backend received
#[derive(Debug, Clone, PartialEq)]
pub struct Reported {
    pub severity: Severity,
    pub text: String,
    pub line: u32,
}

/// Issue backend that remembers every report
#[derive(Default)]
pub struct RecordingIssues {
    reports: Mutex<Vec<Reported>>,
    level: AtomicU8,
}

impl RecordingIssues {
    pub fn reports(&self) -> Vec<Reported> {
        self.reports.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<Reported> {
        std::mem::take(&mut *self.reports.lock().unwrap())
    }

    fn push(&self, severity: Severity, issue: &Issue) {
        self.reports.lock().unwrap().push(Reported {
            severity,
            text: issue.text().to_string(),
            line: issue.context().line,
        });
    }
}

impl IssueBackend for RecordingIssues {
    fn fatal(&self, issue: &Issue) {
        self.push(Severity::Fatal, issue);
    }

    fn error(&self, issue: &Issue) {
        self.push(Severity::Error, issue);
    }

    fn warning(&self, issue: &Issue) {
        self.push(Severity::Warning, issue);
    }

    fn info(&self, issue: &Issue) {
        self.push(Severity::Info, issue);
    }

    fn log(&self, issue: &Issue) {
        self.push(Severity::Log, issue);
    }

    fn debug(&self, issue: &Issue, level: u8) {
        if level <= self.debug_level() {
            self.push(Severity::debug(level as i64), issue);
        }
    }

    fn debug_level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    fn set_debug_level(&self, level: u8) {
        self.level.store(level, Ordering::Relaxed);
    }
}

/// Adapter over a recording issue backend and a memory trace
pub fn recording_adapter(memory_mask: u64, slow_mask: u64) -> Adapter<RecordingIssues, MemoryTrace> {
    Adapter::new(
        Arc::new(RecordingIssues::default()),
        Arc::new(MemoryTrace::with_capacity(256, memory_mask, slow_mask)),
    )
}

/// Output stream that keeps the issues it sees
#[derive(Clone, Default)]
pub struct Collected(pub Arc<Mutex<Vec<Issue>>>);

impl Collected {
    pub fn issues(&self) -> Vec<Issue> {
        self.0.lock().unwrap().clone()
    }
}

impl OutputStream for Collected {
    fn name(&self) -> &str {
        "collect"
    }

    fn write(&self, issue: &Issue) -> StreamAction {
        self.0.lock().unwrap().push(issue.clone());
        StreamAction::Continue
    }
}

/// Routing with the same directive list on every stream
pub fn uniform_routing(directives: &str) -> RoutingConfig {
    let list = StreamDirective::parse_list(directives).unwrap();
    let mut routing = RoutingConfig::defaults();
    for kind in SeverityKind::ALL {
        routing.streams.insert(kind, list.clone());
    }
    routing
}
