// SPDX-License-Identifier: Apache-2.0 OR MIT
// The `erstrace` stream: copies issues into the trace buffer

use crate::context::file_stem;
use crate::issue::Issue;
use crate::stream::{format_time, OutputStream, StreamAction};
use crate::trace::{TraceBackend, TraceRecord};
use std::sync::Arc;

/// Label the forwarding stream is registered under
pub const TRACE_STREAM: &str = "erstrace";

/// Writes every issue it sees into the trace buffer, then lets the chain go on
///
/// The trace name is the package of the issue's context, or the source
/// file's stem when the package is empty. Levels whose memory bit is off
/// are dropped without rendering.
pub struct TraceForwardStream {
    trace: Arc<dyn TraceBackend>,
}

impl TraceForwardStream {
    pub fn new(trace: Arc<dyn TraceBackend>) -> Self {
        Self { trace }
    }

    pub fn trace_name(issue: &Issue) -> &'static str {
        let ctx = issue.context();
        if ctx.package.is_empty() {
            file_stem(ctx.file)
        } else {
            ctx.package
        }
    }

    /// Message followed by one `caused by` segment per cause, newest first
    pub fn render(issue: &Issue) -> String {
        let mut text = issue.text().to_string();
        for cause in issue.causes() {
            text.push_str("\n\tcaused by: ");
            text.push_str(&Self::cause_line(cause));
        }
        text
    }

    /// `<time> <SEVERITY> [<short function> at <file name>:<line>] <message>`
    pub fn cause_line(cause: &Issue) -> String {
        let ctx = cause.context();
        format!(
            "{} {} [{} at {}:{}] {}",
            format_time(cause.time()),
            cause.severity(),
            ctx.short_function(),
            ctx.file_basename(),
            ctx.line,
            cause.text()
        )
    }
}

impl OutputStream for TraceForwardStream {
    fn name(&self) -> &str {
        TRACE_STREAM
    }

    fn write(&self, issue: &Issue) -> StreamAction {
        let level = issue.severity().trace_level();
        let id = self.trace.register(Self::trace_name(issue));
        if !self.trace.memory_enabled(id, level) {
            return StreamAction::Continue;
        }

        let ctx = issue.context();
        let message = Self::render(issue);
        self.trace.write(&TraceRecord {
            time: issue.time(),
            id,
            level,
            line: ctx.line,
            function: ctx.function,
            message: &message,
            fmt_now: false,
        });
        StreamAction::Continue
    }
}
