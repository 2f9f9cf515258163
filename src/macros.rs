// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for the six streams
//
// Every macro takes, in order:
//   - optionally `in <adapter>;` to log through a specific adapter
//     instead of the process-wide one
//   - zero, one or both of `name = <expr>,` and `fmt_now = <expr>,`,
//     in either order
//   - a format string with its arguments (positional, named or captured),
//     or an issue expression
//
// Each expands to a `CallShape` describing the call that was made.

/// Accumulates builder options, then emits the call
#[doc(hidden)]
#[macro_export]
macro_rules! __log_call {
    ([$($call:tt)*] name = $name:expr, $($rest:tt)+) => {
        $crate::__log_call!([$($call)* .name($name)] $($rest)+)
    };
    ([$($call:tt)*] fmt_now = $flag:expr, $($rest:tt)+) => {
        $crate::__log_call!([$($call)* .fmt_now($flag)] $($rest)+)
    };
    // Arguments pass through untouched so named ones (`x = 1`) keep working
    ([$($call:tt)*] $fmt:literal $($args:tt)*) => {{
        let call = $($call)*;
        if call.enabled() {
            call.format(::std::format_args!($fmt $($args)*))
        } else {
            call.suppressed()
        }
    }};
    ([$($call:tt)*] $issue:expr $(,)?) => {{
        let call = $($call)*;
        if call.enabled() {
            call.issue(&$issue)
        } else {
            call.suppressed()
        }
    }};
}

/// Report on the fatal stream
///
/// # Examples
/// ```ignore
/// ers_fatal!("Cannot continue: {}", reason);
/// ers_fatal!(name = "RUNCTL", issue);
/// ```
#[macro_export]
macro_rules! ers_fatal {
    (in $adapter:expr; $($rest:tt)+) => {
        $crate::__log_call!([($adapter).fatal($crate::here!())] $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::__log_call!([$crate::logging().adapter().fatal($crate::here!())] $($rest)+)
    };
}

/// Report on the error stream
///
/// # Examples
/// ```ignore
/// ers_error!("Failed to open {}", path);
/// ```
#[macro_export]
macro_rules! ers_error {
    (in $adapter:expr; $($rest:tt)+) => {
        $crate::__log_call!([($adapter).error($crate::here!())] $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::__log_call!([$crate::logging().adapter().error($crate::here!())] $($rest)+)
    };
}

/// Report on the warning stream
#[macro_export]
macro_rules! ers_warning {
    (in $adapter:expr; $($rest:tt)+) => {
        $crate::__log_call!([($adapter).warning($crate::here!())] $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::__log_call!([$crate::logging().adapter().warning($crate::here!())] $($rest)+)
    };
}

/// Report on the info stream
#[macro_export]
macro_rules! ers_info {
    (in $adapter:expr; $($rest:tt)+) => {
        $crate::__log_call!([($adapter).info($crate::here!())] $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::__log_call!([$crate::logging().adapter().info($crate::here!())] $($rest)+)
    };
}

/// Log through the trace buffer at the log level
///
/// # Examples
/// ```ignore
/// tlog!("Hello log stream");
/// tlog!(name = "MYNAME", fmt_now = true, "value={}", v);
/// ```
#[macro_export]
macro_rules! tlog {
    (in $adapter:expr; $($rest:tt)+) => {
        $crate::__log_call!([($adapter).log($crate::here!())] $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::__log_call!([$crate::logging()
            .adapter()
            .log($crate::here!())
            .site({
                static SITE: $crate::CallSite = $crate::CallSite::new();
                &SITE
            })] $($rest)+)
    };
}

/// Log through the trace buffer at a debug sub-level
///
/// # Examples
/// ```ignore
/// tlog_debug!(1, "Hello debug stream arg={}", 3);
/// tlog_debug!(12, name = "FRAGS", "fragment {} complete", id);
/// ```
#[macro_export]
macro_rules! tlog_debug {
    (in $adapter:expr; $level:expr, $($rest:tt)+) => {
        $crate::__log_call!([($adapter).debug($crate::here!(), ($level) as i64)] $($rest)+)
    };
    ($level:expr, $($rest:tt)+) => {
        $crate::__log_call!([$crate::logging()
            .adapter()
            .debug($crate::here!(), ($level) as i64)
            .site({
                static SITE: $crate::CallSite = $crate::CallSite::new();
                &SITE
            })] $($rest)+)
    };
}
