// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Severity dispatch
//!
//! Six entry points, one routing decision each:
//!
//! | stream      | goes to                                                   |
//! |-------------|-----------------------------------------------------------|
//! | fatal       | issue backend, always                                     |
//! | error       | issue backend, always                                     |
//! | warning     | issue backend, always                                     |
//! | info        | issue backend, always (`erstrace` mirrors it to memory)   |
//! | log         | trace buffer at `TLVL_LOG`, then the issue backend's log  |
//! | debug(n)    | trace buffer at `TLVL_DEBUG + n`, then issue debug(n)     |
//!
//! For log and debug the memory record and the formatted slow path are
//! independent. A debug call with neither enabled returns before any
//! formatting.

use crate::context::Context;
use crate::issue::Issue;
use crate::reporter::IssueBackend;
use crate::severity::Severity;
use crate::text::{build_message, prefix_name, MessageBody, MessageBuffer};
use crate::trace::{TraceBackend, TraceId, TraceRecord};
use chrono::Local;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Routes logging calls to an issue backend and a trace backend
pub struct Adapter<I: ?Sized, T: ?Sized> {
    issues: Arc<I>,
    trace: Arc<T>,
}

impl<I: ?Sized, T: ?Sized> Clone for Adapter<I, T> {
    fn clone(&self) -> Self {
        Self {
            issues: Arc::clone(&self.issues),
            trace: Arc::clone(&self.trace),
        }
    }
}

impl<I, T> Adapter<I, T>
where
    I: IssueBackend + ?Sized,
    T: TraceBackend + ?Sized,
{
    pub fn new(issues: Arc<I>, trace: Arc<T>) -> Self {
        Self { issues, trace }
    }

    pub fn issues(&self) -> &I {
        &self.issues
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    pub fn call(&self, severity: Severity, context: Context) -> LogCall<'_, I, T> {
        LogCall {
            adapter: self,
            severity,
            context,
            name: None,
            fmt_now: false,
            site: None,
        }
    }

    pub fn fatal(&self, context: Context) -> LogCall<'_, I, T> {
        self.call(Severity::Fatal, context)
    }

    pub fn error(&self, context: Context) -> LogCall<'_, I, T> {
        self.call(Severity::Error, context)
    }

    pub fn warning(&self, context: Context) -> LogCall<'_, I, T> {
        self.call(Severity::Warning, context)
    }

    pub fn info(&self, context: Context) -> LogCall<'_, I, T> {
        self.call(Severity::Info, context)
    }

    pub fn log(&self, context: Context) -> LogCall<'_, I, T> {
        self.call(Severity::Log, context)
    }

    /// Debug at sub-level `level`, saturated into range
    pub fn debug(&self, context: Context, level: i64) -> LogCall<'_, I, T> {
        self.call(Severity::debug(level), context)
    }
}

/// Per-call-site trace id, resolved on first use
pub struct CallSite {
    id: OnceLock<TraceId>,
}

impl CallSite {
    pub const fn new() -> Self {
        Self {
            id: OnceLock::new(),
        }
    }
}

impl Default for CallSite {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of payload a call carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Format,
    Text,
    Issue,
    /// Nothing produced: the call was disabled
    Skipped,
}

/// The downstream call a logging call turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallShape {
    pub severity: Severity,
    pub name: Option<String>,
    pub fmt_now: bool,
    pub payload: Payload,
    /// Written to the trace buffer
    pub memory: bool,
    /// Reported through the issue backend
    pub reported: bool,
}

enum Body<'a> {
    Message(MessageBody<'a>),
    Issue(&'a Issue),
}

/// One logging call being assembled
///
/// `name` selects the trace name (and prefixes formatted text); `fmt_now`
/// marks the memory record as formatted at the call. Both are optional and
/// independent.
pub struct LogCall<'a, I: ?Sized, T: ?Sized> {
    adapter: &'a Adapter<I, T>,
    severity: Severity,
    context: Context,
    name: Option<&'a str>,
    fmt_now: bool,
    site: Option<&'static CallSite>,
}

impl<'a, I, T> LogCall<'a, I, T>
where
    I: IssueBackend + ?Sized,
    T: TraceBackend + ?Sized,
{
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn fmt_now(mut self, fmt_now: bool) -> Self {
        self.fmt_now = fmt_now;
        self
    }

    /// Cache the default trace id at this call site
    pub fn site(mut self, site: &'static CallSite) -> Self {
        self.site = Some(site);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn uses_trace(&self) -> bool {
        matches!(self.severity, Severity::Log | Severity::Debug(_))
    }

    /// Trace name the call resolves to
    pub fn trace_id(&self) -> TraceId {
        let trace = &self.adapter.trace;
        match (self.name.filter(|name| !name.is_empty()), self.site) {
            (Some(name), _) => trace.register(name),
            (None, Some(site)) => *site.id.get_or_init(|| trace.register(self.context.package)),
            (None, None) => trace.register(self.context.package),
        }
    }

    /// (memory, slow) paths for a trace-routed call
    fn paths(&self, id: TraceId) -> (bool, bool) {
        let level = self.severity.trace_level();
        let memory = self.adapter.trace.memory_enabled(id, level);
        let slow = match self.severity {
            // The log stream always reaches the issue backend
            Severity::Log => true,
            Severity::Debug(sub) => {
                self.adapter.trace.slow_enabled(id, level)
                    && sub.get() <= self.adapter.issues.debug_level()
            }
            _ => true,
        };
        (memory, slow)
    }

    /// Whether the call would produce anything
    pub fn enabled(&self) -> bool {
        if !self.uses_trace() {
            return true;
        }
        let (memory, slow) = self.paths(self.trace_id());
        memory || slow
    }

    /// Shape of the call without emitting anything
    pub fn shape(&self, payload: Payload) -> CallShape {
        CallShape {
            severity: self.severity,
            name: self.name.map(str::to_string),
            fmt_now: self.fmt_now,
            payload,
            memory: false,
            reported: false,
        }
    }

    /// Record that the call was disabled
    pub fn suppressed(self) -> CallShape {
        self.shape(Payload::Skipped)
    }

    pub fn format(self, args: fmt::Arguments<'_>) -> CallShape {
        self.emit(Body::Message(MessageBody::Format(args)), Payload::Format)
    }

    /// Pre-formatted text; never scanned for format specifiers
    pub fn text(self, text: &str) -> CallShape {
        self.emit(Body::Message(MessageBody::Text(text)), Payload::Text)
    }

    pub fn issue(self, issue: &Issue) -> CallShape {
        self.emit(Body::Issue(issue), Payload::Issue)
    }

    fn emit(self, body: Body<'_>, payload: Payload) -> CallShape {
        let mut shape = self.shape(payload);
        if self.uses_trace() {
            self.emit_trace(body, &mut shape);
        } else {
            self.emit_issue(body, &mut shape);
        }
        shape
    }

    fn emit_issue(&self, body: Body<'_>, shape: &mut CallShape) {
        let issues = &self.adapter.issues;
        match body {
            Body::Message(message) => {
                let text = build_message(self.name, message);
                let issue = Issue::message(self.context, text.as_str());
                issues.report(self.severity, &issue);
            }
            Body::Issue(issue) => issues.report(self.severity, issue),
        }
        shape.reported = true;
    }

    fn emit_trace(&self, body: Body<'_>, shape: &mut CallShape) {
        let id = self.trace_id();
        let (memory, slow) = self.paths(id);
        if !memory && !slow {
            return;
        }
        let level = self.severity.trace_level();

        match body {
            Body::Message(message) => {
                // Formatted once; the slow path only adds the name
                let text: MessageBuffer = build_message(None, message);
                if memory {
                    self.write_record(id, level, self.context, text.as_str());
                }
                if slow {
                    let full = prefix_name(self.name, text.as_str());
                    self.report_slow(&Issue::message(self.context, full.as_str()));
                }
            }
            Body::Issue(issue) => {
                if memory {
                    self.write_record(id, level, *issue.context(), issue.text());
                }
                if slow {
                    self.report_slow(issue);
                }
            }
        }
        shape.memory = memory;
        shape.reported = slow;
    }

    fn write_record(&self, id: TraceId, level: u8, context: Context, message: &str) {
        self.adapter.trace.write(&TraceRecord {
            time: Local::now(),
            id,
            level,
            line: context.line,
            function: context.function,
            message,
            fmt_now: self.fmt_now,
        });
    }

    fn report_slow(&self, issue: &Issue) {
        let issues = &self.adapter.issues;
        match self.severity {
            Severity::Debug(sub) => issues.debug(issue, sub.get()),
            _ => issues.log(issue),
        }
    }
}
