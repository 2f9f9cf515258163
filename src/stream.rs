// SPDX-License-Identifier: Apache-2.0 OR MIT
// Output streams of the issue backend
//
// A routing variable such as `erstrace,throttle(30,100),lstderr` becomes a
// chain of streams. Every stream sees the issue in order; a filtering
// stream can stop the chain or replace the issue for the streams after it.

use crate::config::{Settings, StreamDirective};
use crate::issue::Issue;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// What the chain does after a stream has seen an issue
#[derive(Debug, Clone, PartialEq)]
pub enum StreamAction {
    Continue,
    Stop,
    /// Continue with this issue instead
    Replace(Box<Issue>),
}

/// One destination of an issue chain
pub trait OutputStream: Send + Sync {
    fn name(&self) -> &str;

    fn write(&self, issue: &Issue) -> StreamAction;
}

/// `%Y-%b-%d %H:%M:%S,<ms>`
pub fn format_time(time: DateTime<Local>) -> String {
    format!(
        "{},{:03}",
        time.format("%Y-%b-%d %H:%M:%S"),
        time.timestamp_subsec_millis().min(999)
    )
}

/// `<time> <SEVERITY> [<function> at <file>:<line>] <message>`
pub fn format_issue_line(issue: &Issue) -> String {
    let ctx = issue.context();
    format!(
        "{} {} [{} at {}:{}] {}",
        format_time(issue.time()),
        issue.severity(),
        ctx.function,
        ctx.file,
        ctx.line,
        issue.text()
    )
}

// ============================================================================
// Standard streams
// ============================================================================

/// Line-oriented text stream over any writer (stdout and stderr in practice)
pub struct StandardStream<W: Write + Send> {
    label: &'static str,
    sink: Mutex<W>,
    verbosity: u8,
}

impl StandardStream<io::Stdout> {
    pub fn stdout(verbosity: u8) -> Self {
        Self::new("lstdout", io::stdout(), verbosity)
    }
}

impl StandardStream<io::Stderr> {
    pub fn stderr(verbosity: u8) -> Self {
        Self::new("lstderr", io::stderr(), verbosity)
    }
}

impl<W: Write + Send> StandardStream<W> {
    pub fn new(label: &'static str, sink: W, verbosity: u8) -> Self {
        Self {
            label,
            sink: Mutex::new(sink),
            verbosity,
        }
    }

    /// Full text written for `issue`, without the final newline
    pub fn render(&self, issue: &Issue) -> String {
        let mut text = format_issue_line(issue);
        if self.verbosity >= 1 {
            if !issue.qualifiers().is_empty() {
                text.push_str("\n\tQualifiers: ");
                text.push_str(&issue.qualifiers().join(" "));
            }
            if !issue.attributes().is_empty() {
                text.push_str("\n\tParameters =");
                for (name, value) in issue.attributes() {
                    text.push_str(&format!(" '{}={}'", name, value));
                }
            }
        }
        if self.verbosity >= 2 {
            let ctx = issue.context();
            text.push_str(&format!(
                "\n\tProcess ID: {} Thread ID: {} Package: {}",
                ctx.process_id, ctx.thread_id, ctx.package
            ));
        }
        for cause in issue.causes() {
            text.push_str("\n\twas caused by: ");
            text.push_str(&format_issue_line(cause));
        }
        text
    }
}

impl<W: Write + Send> OutputStream for StandardStream<W> {
    fn name(&self) -> &str {
        self.label
    }

    fn write(&self, issue: &Issue) -> StreamAction {
        let text = self.render(issue);
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(sink, "{}", text);
        let _ = sink.flush();
        StreamAction::Continue
    }
}

// ============================================================================
// JSON stream
// ============================================================================

/// One JSON object per issue
pub struct JsonStream<W: Write + Send> {
    sink: Mutex<W>,
}

impl JsonStream<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> JsonStream<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

/// JSON form of an issue, causes nested newest first
pub fn issue_json(issue: &Issue) -> serde_json::Value {
    let ctx = issue.context();
    let attributes: serde_json::Map<String, serde_json::Value> = issue
        .attributes()
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::from(value.as_str())))
        .collect();
    serde_json::json!({
        "timestamp": issue.time().to_rfc3339(),
        "severity": issue.severity().to_string(),
        "type": issue.kind(),
        "package": ctx.package,
        "file": ctx.file,
        "line": ctx.line,
        "function": ctx.function,
        "pid": ctx.process_id,
        "tid": ctx.thread_id,
        "message": issue.text(),
        "qualifiers": issue.qualifiers(),
        "attributes": attributes,
        "causes": issue.causes().map(issue_json_flat).collect::<Vec<_>>(),
    })
}

fn issue_json_flat(issue: &Issue) -> serde_json::Value {
    let ctx = issue.context();
    serde_json::json!({
        "timestamp": issue.time().to_rfc3339(),
        "severity": issue.severity().to_string(),
        "type": issue.kind(),
        "file": ctx.file,
        "line": ctx.line,
        "function": ctx.function,
        "message": issue.text(),
    })
}

impl<W: Write + Send> OutputStream for JsonStream<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&self, issue: &Issue) -> StreamAction {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(sink, "{}", issue_json(issue));
        StreamAction::Continue
    }
}

// ============================================================================
// Throttle and null
// ============================================================================

#[derive(Debug)]
struct Site {
    passed: u64,
    suppressed: u64,
    last_pass: Instant,
}

/// Rate limit per reporting site (file and line)
///
/// The first `initial` reports from a site pass. After that one report
/// passes per `interval`, annotated with how many were suppressed since
/// the previous one. Suppressed reports stop the chain.
pub struct ThrottleStream {
    initial: u64,
    interval: Duration,
    sites: Mutex<HashMap<(&'static str, u32), Site>>,
}

impl ThrottleStream {
    pub fn new(initial: u32, interval: Duration) -> Self {
        Self {
            initial: initial as u64,
            interval,
            sites: Mutex::new(HashMap::new()),
        }
    }

    pub fn write_at(&self, issue: &Issue, now: Instant) -> StreamAction {
        let ctx = issue.context();
        let mut sites = self.sites.lock().unwrap_or_else(PoisonError::into_inner);
        let site = sites.entry((ctx.file, ctx.line)).or_insert(Site {
            passed: 0,
            suppressed: 0,
            last_pass: now,
        });

        if site.passed < self.initial {
            site.passed += 1;
            site.last_pass = now;
            return StreamAction::Continue;
        }

        if now.saturating_duration_since(site.last_pass) >= self.interval {
            let suppressed = std::mem::take(&mut site.suppressed);
            site.passed += 1;
            site.last_pass = now;
            if suppressed == 0 {
                return StreamAction::Continue;
            }
            let mut annotated = issue.clone();
            annotated.append_text(&format!(" ({} similar reports suppressed)", suppressed));
            return StreamAction::Replace(Box::new(annotated));
        }

        site.suppressed += 1;
        StreamAction::Stop
    }
}

impl OutputStream for ThrottleStream {
    fn name(&self) -> &str {
        "throttle"
    }

    fn write(&self, issue: &Issue) -> StreamAction {
        self.write_at(issue, Instant::now())
    }
}

/// Discards everything
pub struct NullStream;

impl OutputStream for NullStream {
    fn name(&self) -> &str {
        "null"
    }

    fn write(&self, _issue: &Issue) -> StreamAction {
        StreamAction::Stop
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Builds a stream for a directive
pub type StreamFactory =
    Arc<dyn Fn(&StreamDirective, &Settings) -> Box<dyn OutputStream> + Send + Sync>;

/// Stream label to factory
///
/// The built-in streams are present from creation; anything else (the
/// trace forwarding stream included) is registered as a plugin.
pub struct StreamRegistry {
    factories: RwLock<HashMap<String, StreamFactory>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        let registry = Self {
            factories: RwLock::new(HashMap::new()),
        };
        registry.register("lstdout", |_, settings| {
            Box::new(StandardStream::stdout(settings.verbosity))
        });
        registry.register("lstderr", |_, settings| {
            Box::new(StandardStream::stderr(settings.verbosity))
        });
        registry.register("json", |_, _| Box::new(JsonStream::stderr()));
        registry.register("null", |_, _| Box::new(NullStream));
        registry.register("throttle", |directive, _| {
            let (initial, interval_secs) = match directive {
                StreamDirective::Throttle {
                    initial,
                    interval_secs,
                } => (*initial, *interval_secs),
                _ => (
                    crate::config::DEFAULT_THROTTLE_INITIAL,
                    crate::config::DEFAULT_THROTTLE_INTERVAL_SECS,
                ),
            };
            Box::new(ThrottleStream::new(
                initial,
                Duration::from_secs(interval_secs),
            ))
        });
        registry
    }

    /// Add or replace the factory for `label`
    pub fn register<F>(&self, label: &str, factory: F)
    where
        F: Fn(&StreamDirective, &Settings) -> Box<dyn OutputStream> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, label: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(label)
    }

    /// Build the stream for `directive`; `None` if nothing provides it
    pub fn create(
        &self,
        directive: &StreamDirective,
        settings: &Settings,
    ) -> Option<Box<dyn OutputStream>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(directive.label())
            .cloned()?;
        Some(factory(directive, settings))
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
