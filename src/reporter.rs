// SPDX-License-Identifier: Apache-2.0 OR MIT
// Issue backend contract and the default per-severity stream router

use crate::config::{RoutingConfig, Settings};
use crate::context::Context;
use crate::issue::Issue;
use crate::severity::{Severity, SeverityKind};
use crate::stream::{OutputStream, StreamAction, StreamRegistry};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

/// Structured-issue backend: one entry point per stream
///
/// Reporting never fails from the caller's point of view.
pub trait IssueBackend: Send + Sync {
    fn fatal(&self, issue: &Issue);
    fn error(&self, issue: &Issue);
    fn warning(&self, issue: &Issue);
    fn info(&self, issue: &Issue);
    fn log(&self, issue: &Issue);
    /// Dropped when `level` is above [`IssueBackend::debug_level`]
    fn debug(&self, issue: &Issue, level: u8);

    fn debug_level(&self) -> u8;
    fn set_debug_level(&self, level: u8);

    /// Send `issue` to the entry point for `severity`
    fn report(&self, severity: Severity, issue: &Issue) {
        match severity {
            Severity::Fatal => self.fatal(issue),
            Severity::Error => self.error(issue),
            Severity::Warning => self.warning(issue),
            Severity::Info => self.info(issue),
            Severity::Log => self.log(issue),
            Severity::Debug(level) => self.debug(issue, level.get()),
        }
    }
}

type Chain = Vec<Box<dyn OutputStream>>;

/// Routes each report through the chain configured for its stream
///
/// Chains are built on the first report of each stream, so plugins
/// registered before then are picked up. Labels nothing provides are
/// skipped and noticed on the internal debug channel at level 1.
pub struct IssueReporter {
    routing: RoutingConfig,
    settings: Settings,
    streams: StreamRegistry,
    chains: [OnceLock<Chain>; 6],
    debug_level: AtomicU8,
}

/// Debug level of notices about the reporter itself
pub const INTERNAL_NOTICE_LEVEL: u8 = 1;

impl IssueReporter {
    pub fn new(routing: RoutingConfig, settings: Settings) -> Self {
        Self {
            routing,
            settings,
            streams: StreamRegistry::new(),
            chains: Default::default(),
            debug_level: AtomicU8::new(0),
        }
    }

    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registry consulted when chains are built
    pub fn streams(&self) -> &StreamRegistry {
        &self.streams
    }

    /// Names of the streams in a built chain; `None` before first use
    pub fn chain_names(&self, kind: SeverityKind) -> Option<Vec<String>> {
        self.chains[kind as usize]
            .get()
            .map(|chain| chain.iter().map(|s| s.name().to_string()).collect())
    }

    /// Build every chain now rather than on first report
    pub fn prepare(&self) {
        for kind in SeverityKind::ALL {
            self.chain(kind);
        }
    }

    fn chain(&self, kind: SeverityKind) -> &Chain {
        let mut missing = Vec::new();
        let chain = self.chains[kind as usize].get_or_init(|| {
            let mut chain = Chain::new();
            for directive in self.routing.directives(kind) {
                match self.streams.create(directive, &self.settings) {
                    Some(stream) => chain.push(stream),
                    None => missing.push(directive.to_string()),
                }
            }
            chain
        });

        // Reported after the chain is in place; the debug chain may be
        // the one that was just built
        for label in missing {
            let notice = Issue::message(
                Context::internal(line!()),
                format!(
                    "Stream '{}' for {} is not available and was skipped",
                    label, kind
                ),
            );
            self.debug(&notice, INTERNAL_NOTICE_LEVEL);
        }
        chain
    }

    fn dispatch(&self, kind: SeverityKind, severity: Severity, issue: &Issue) {
        let mut current = Cow::Borrowed(issue);
        current.to_mut().set_severity(severity);
        for stream in self.chain(kind) {
            match stream.write(&current) {
                StreamAction::Continue => {}
                StreamAction::Stop => break,
                StreamAction::Replace(next) => current = Cow::Owned(*next),
            }
        }
    }
}

impl Default for IssueReporter {
    fn default() -> Self {
        Self::new(RoutingConfig::defaults(), Settings::default())
    }
}

impl IssueBackend for IssueReporter {
    fn fatal(&self, issue: &Issue) {
        self.dispatch(SeverityKind::Fatal, Severity::Fatal, issue);
    }

    fn error(&self, issue: &Issue) {
        self.dispatch(SeverityKind::Error, Severity::Error, issue);
    }

    fn warning(&self, issue: &Issue) {
        self.dispatch(SeverityKind::Warning, Severity::Warning, issue);
    }

    fn info(&self, issue: &Issue) {
        self.dispatch(SeverityKind::Info, Severity::Info, issue);
    }

    fn log(&self, issue: &Issue) {
        self.dispatch(SeverityKind::Log, Severity::Log, issue);
    }

    fn debug(&self, issue: &Issue, level: u8) {
        if level > self.debug_level() {
            return;
        }
        self.dispatch(SeverityKind::Debug, Severity::debug(level as i64), issue);
    }

    #[inline]
    fn debug_level(&self) -> u8 {
        self.debug_level.load(Ordering::Relaxed)
    }

    fn set_debug_level(&self, level: u8) {
        self.debug_level.store(level, Ordering::Relaxed);
    }
}
