// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-wide logging state and its one-time setup

use crate::config::{apply_defaults, ConfigError, Environment, ProcessEnv, RoutingConfig, Settings};
use crate::context::Context;
use crate::dispatch::Adapter;
use crate::forward::{TraceForwardStream, TRACE_STREAM};
use crate::issue::Issue;
use crate::reporter::{IssueBackend, IssueReporter};
use crate::severity::SeverityKind;
use crate::trace::{MemoryTrace, TraceBackend};
use std::sync::{Arc, Once, OnceLock};

/// Issue backend, trace buffer and the adapter joining them
pub struct Logging {
    issues: Arc<IssueReporter>,
    trace: Arc<MemoryTrace>,
    adapter: Adapter<IssueReporter, MemoryTrace>,
    problems: Vec<(SeverityKind, ConfigError)>,
    primed: Once,
}

impl Logging {
    /// Build from explicit routing and settings
    ///
    /// The `erstrace` stream is registered against this instance's trace
    /// buffer.
    pub fn with_config(mut routing: RoutingConfig, settings: Settings) -> Self {
        if settings.force_trace_forwarding {
            routing.force_trace_forwarding();
        }
        let trace = Arc::new(MemoryTrace::new(&settings));
        let issues = Arc::new(IssueReporter::new(routing, settings));

        let target: Arc<dyn TraceBackend> = trace.clone();
        issues.streams().register(TRACE_STREAM, move |_, _| {
            Box::new(TraceForwardStream::new(Arc::clone(&target)))
        });

        Self {
            adapter: Adapter::new(Arc::clone(&issues), Arc::clone(&trace)),
            issues,
            trace,
            problems: Vec::new(),
            primed: Once::new(),
        }
    }

    /// Build from the variables in `env`; malformed ones fall back to defaults
    pub fn from_env(env: &dyn Environment) -> Self {
        let settings = Settings::from_env(env);
        let (routing, problems) = RoutingConfig::from_env(env);
        let mut logging = Self::with_config(routing, settings);
        logging.problems = problems;
        logging
    }

    pub fn adapter(&self) -> &Adapter<IssueReporter, MemoryTrace> {
        &self.adapter
    }

    pub fn issues(&self) -> &IssueReporter {
        &self.issues
    }

    pub fn trace(&self) -> &MemoryTrace {
        &self.trace
    }

    /// Routing variables that could not be parsed
    pub fn problems(&self) -> &[(SeverityKind, ConfigError)] {
        &self.problems
    }

    /// Build the stream chains while the debug level is still 0, send the
    /// first debug message, then raise the level. Runs once.
    ///
    /// Absent plugins are noticed at debug level 1 during the chain build,
    /// which the initial level of 0 keeps quiet.
    pub fn prime(&self) {
        self.primed.call_once(|| {
            self.issues.prepare();

            let level = self.issues.settings().debug_level();
            let first = Issue::message(
                Context::internal(line!()),
                format!("Logging setup; debug level is now {}", level),
            );
            self.issues.debug(&first, 0);
            self.issues.set_debug_level(level);

            for (kind, err) in &self.problems {
                let issue = Issue::message(
                    Context::internal(line!()),
                    format!("Invalid routing for {}, using the default: {}", kind, err),
                );
                self.issues.warning(&issue);
            }
        });
    }

    pub fn is_primed(&self) -> bool {
        self.primed.is_completed()
    }
}

static LOGGING: OnceLock<Logging> = OnceLock::new();

/// The process-wide instance, built from the process environment on first use
pub fn logging() -> &'static Logging {
    LOGGING.get_or_init(|| Logging::from_env(&ProcessEnv))
}

/// Configure logging from the process environment; safe to call repeatedly
pub fn setup() -> &'static Logging {
    setup_with(&ProcessEnv)
}

/// Configure logging from `env`
///
/// Routing variables the user did not set receive their defaults; values
/// already present are left alone. The process-wide instance is created
/// from `env` if it does not exist yet.
pub fn setup_with(env: &dyn Environment) -> &'static Logging {
    apply_defaults(env);
    let logging = LOGGING.get_or_init(|| Logging::from_env(env));
    logging.prime();
    logging
}
