// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Cost of the logging macros on the paths that matter
//!
//! 1. **Disabled debug**: level masked out everywhere; should cost a mask
//!    check and nothing else
//! 2. **Memory-only debug**: formatted straight into the trace buffer
//! 3. **Issue payload**: a prebuilt issue through a discarding chain
//!
//! ```bash
//! cargo bench --bench debug_speed
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use daq_logging::config::{StreamDirective, DEFAULT_SLOW_MASK};
use daq_logging::{ers_warning, here, tlog_debug, Issue, Logging, RoutingConfig, Settings, SeverityKind};

fn discarding(memory_mask: u64) -> Logging {
    let mut routing = RoutingConfig::defaults();
    for kind in SeverityKind::ALL {
        routing.streams.insert(kind, vec![StreamDirective::Null]);
    }
    let settings = Settings {
        memory_mask,
        slow_mask: DEFAULT_SLOW_MASK,
        force_trace_forwarding: false,
        ..Settings::default()
    };
    let logging = Logging::with_config(routing, settings);
    logging.prime();
    logging
}

fn benchmark_disabled_debug(c: &mut Criterion) {
    let logging = discarding(0);
    let adapter = logging.adapter();

    c.bench_function("debug_disabled", |b| {
        b.iter(|| {
            tlog_debug!(in adapter; black_box(20), "value {} of {}", black_box(7), "nothing")
        });
    });
}

fn benchmark_memory_debug(c: &mut Criterion) {
    let logging = discarding(u64::MAX);
    let adapter = logging.adapter();

    let mut group = c.benchmark_group("debug_memory");
    group.throughput(Throughput::Elements(1));
    group.bench_function("format_args", |b| {
        b.iter(|| tlog_debug!(in adapter; 1, "fragment {} complete", black_box(42u64)));
    });
    group.bench_function("named", |b| {
        b.iter(|| tlog_debug!(in adapter; 1, name = "FRAGS", "fragment {} complete", black_box(42u64)));
    });
    group.finish();
    // Keep the buffer from filling with one benchmark's output
    logging.trace().drain();
}

fn benchmark_issue_payload(c: &mut Criterion) {
    let logging = discarding(0);
    let adapter = logging.adapter();
    let issue = Issue::message(here!(), "disk 3 is 97% full");

    c.bench_function("warning_issue", |b| {
        b.iter(|| ers_warning!(in adapter; black_box(&issue).clone()));
    });
}

criterion_group!(
    benches,
    benchmark_disabled_debug,
    benchmark_memory_debug,
    benchmark_issue_payload
);
criterion_main!(benches);
