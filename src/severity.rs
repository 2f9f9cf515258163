// SPDX-License-Identifier: Apache-2.0 OR MIT
// Severity streams and their fixed mapping onto trace buffer levels

use serde::{Deserialize, Serialize};

/// Trace buffer level of the fatal stream
pub const TLVL_FATAL: u8 = 0;
/// Trace buffer level of the error stream
pub const TLVL_ERROR: u8 = 1;
/// Trace buffer level of the warning stream
pub const TLVL_WARNING: u8 = 2;
/// Trace buffer level of the info stream
pub const TLVL_INFO: u8 = 3;
/// Trace buffer level of the log stream
pub const TLVL_LOG: u8 = 4;
/// Trace buffer level of debug(0); debug(n) lives at `TLVL_DEBUG + n`
pub const TLVL_DEBUG: u8 = 5;
/// Highest trace buffer level (the masks are 64 bits wide)
pub const TLVL_MAX: u8 = 63;

/// Highest debug sub-level that still maps inside the buffer level range
pub const MAX_DEBUG_LEVEL: u8 = TLVL_MAX - TLVL_DEBUG;

const LEVEL_NAMES: [&str; 64] = [
    "fatal", "error", "warning", "info", "log", "debug", "dbg06", "dbg07", "dbg08", "dbg09",
    "dbg10", "dbg11", "dbg12", "dbg13", "dbg14", "dbg15", "dbg16", "dbg17", "dbg18", "dbg19",
    "dbg20", "dbg21", "dbg22", "dbg23", "dbg24", "dbg25", "dbg26", "dbg27", "dbg28", "dbg29",
    "dbg30", "dbg31", "dbg32", "dbg33", "dbg34", "dbg35", "dbg36", "dbg37", "dbg38", "dbg39",
    "dbg40", "dbg41", "dbg42", "dbg43", "dbg44", "dbg45", "dbg46", "dbg47", "dbg48", "dbg49",
    "dbg50", "dbg51", "dbg52", "dbg53", "dbg54", "dbg55", "dbg56", "dbg57", "dbg58", "dbg59",
    "dbg60", "dbg61", "dbg62", "dbg63",
];

/// Debug sub-level, always inside `0..=MAX_DEBUG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugLevel(u8);

impl DebugLevel {
    /// Saturating constructor: negatives become 0, large values become the maximum
    pub const fn new(level: i64) -> Self {
        if level < 0 {
            DebugLevel(0)
        } else if level > MAX_DEBUG_LEVEL as i64 {
            DebugLevel(MAX_DEBUG_LEVEL)
        } else {
            DebugLevel(level as u8)
        }
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for DebugLevel {
    fn from(level: u8) -> Self {
        DebugLevel::new(level as i64)
    }
}

impl From<i32> for DebugLevel {
    fn from(level: i32) -> Self {
        DebugLevel::new(level as i64)
    }
}

/// The six logging streams (lower is more severe)
///
/// The derived ordering compares the stream first and the debug
/// sub-level second, so `Fatal < Error < ... < Log < Debug(0) < Debug(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Unrecoverable condition, reported through the issue backend
    Fatal,
    /// Error condition, reported through the issue backend
    Error,
    /// Warning condition, reported through the issue backend
    Warning,
    /// Significant normal condition, reported through the issue backend
    Info,
    /// Routine message, routed through the trace buffer first
    Log,
    /// Verbose message at a sub-level, routed through the trace buffer first
    Debug(DebugLevel),
}

impl Severity {
    /// Shorthand for `Severity::Debug(DebugLevel::new(level))`
    pub const fn debug(level: i64) -> Self {
        Severity::Debug(DebugLevel::new(level))
    }

    /// Fixed severity to trace buffer level table
    #[inline]
    pub const fn trace_level(self) -> u8 {
        match self {
            Severity::Fatal => TLVL_FATAL,
            Severity::Error => TLVL_ERROR,
            Severity::Warning => TLVL_WARNING,
            Severity::Info => TLVL_INFO,
            Severity::Log => TLVL_LOG,
            Severity::Debug(level) => TLVL_DEBUG + level.get(),
        }
    }

    /// Inverse of [`Severity::trace_level`]; levels above 63 saturate
    pub const fn from_trace_level(level: u8) -> Self {
        match level {
            TLVL_FATAL => Severity::Fatal,
            TLVL_ERROR => Severity::Error,
            TLVL_WARNING => Severity::Warning,
            TLVL_INFO => Severity::Info,
            TLVL_LOG => Severity::Log,
            _ => Severity::debug((level - TLVL_DEBUG) as i64),
        }
    }

    pub const fn kind(self) -> SeverityKind {
        match self {
            Severity::Fatal => SeverityKind::Fatal,
            Severity::Error => SeverityKind::Error,
            Severity::Warning => SeverityKind::Warning,
            Severity::Info => SeverityKind::Info,
            Severity::Log => SeverityKind::Log,
            Severity::Debug(_) => SeverityKind::Debug,
        }
    }

    /// Upper-case stream name, `DEBUG_<n>` for debug
    pub fn name(self) -> String {
        match self {
            Severity::Debug(level) => format!("DEBUG_{}", level.get()),
            other => other.kind().as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug(level) => write!(f, "DEBUG_{}", level.get()),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// A stream without its debug sub-level; keys the routing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityKind {
    Fatal,
    Error,
    Warning,
    Info,
    Log,
    Debug,
}

impl SeverityKind {
    pub const ALL: [SeverityKind; 6] = [
        SeverityKind::Fatal,
        SeverityKind::Error,
        SeverityKind::Warning,
        SeverityKind::Info,
        SeverityKind::Log,
        SeverityKind::Debug,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SeverityKind::Fatal => "FATAL",
            SeverityKind::Error => "ERROR",
            SeverityKind::Warning => "WARNING",
            SeverityKind::Info => "INFO",
            SeverityKind::Log => "LOG",
            SeverityKind::Debug => "DEBUG",
        }
    }
}

impl std::fmt::Display for SeverityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a requested trace buffer level into `0..=TLVL_MAX`
#[inline]
pub const fn clamp_trace_level(level: i64) -> u8 {
    if level < 0 {
        0
    } else if level > TLVL_MAX as i64 {
        TLVL_MAX
    } else {
        level as u8
    }
}

/// Label of a trace buffer level as shown in buffer dumps
pub fn trace_level_name(level: u8) -> &'static str {
    LEVEL_NAMES[clamp_trace_level(level as i64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Fatal < Severity::Error);
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
        assert!(Severity::Info < Severity::Log);
        assert!(Severity::Log < Severity::debug(0));
        assert!(Severity::debug(0) < Severity::debug(1));
    }

    #[test]
    fn test_trace_levels() {
        assert_eq!(Severity::Fatal.trace_level(), 0);
        assert_eq!(Severity::Error.trace_level(), 1);
        assert_eq!(Severity::Warning.trace_level(), 2);
        assert_eq!(Severity::Info.trace_level(), 3);
        assert_eq!(Severity::Log.trace_level(), 4);
        assert_eq!(Severity::debug(0).trace_level(), 5);
        assert_eq!(Severity::debug(8).trace_level(), 13);
    }

    #[test]
    fn test_debug_level_saturates() {
        assert_eq!(DebugLevel::new(-3).get(), 0);
        assert_eq!(DebugLevel::new(0).get(), 0);
        assert_eq!(DebugLevel::new(58).get(), 58);
        assert_eq!(DebugLevel::new(59).get(), 58);
        assert_eq!(DebugLevel::new(1000).get(), 58);
        assert_eq!(Severity::debug(64).trace_level(), TLVL_MAX);
    }

    #[test]
    fn test_from_trace_level() {
        for level in 0..=TLVL_MAX {
            assert_eq!(Severity::from_trace_level(level).trace_level(), level);
        }
        assert_eq!(Severity::from_trace_level(200), Severity::debug(58));
    }

    #[test]
    fn test_clamp_trace_level() {
        assert_eq!(clamp_trace_level(-1), 0);
        assert_eq!(clamp_trace_level(63), 63);
        assert_eq!(clamp_trace_level(64), 63);
        assert_eq!(clamp_trace_level(1064), 63);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Fatal), "FATAL");
        assert_eq!(format!("{}", Severity::Log), "LOG");
        assert_eq!(format!("{}", Severity::debug(7)), "DEBUG_7");
        assert_eq!(Severity::Warning.name(), "WARNING");
    }

    #[test]
    fn test_level_names() {
        assert_eq!(trace_level_name(0), "fatal");
        assert_eq!(trace_level_name(4), "log");
        assert_eq!(trace_level_name(5), "debug");
        assert_eq!(trace_level_name(6), "dbg06");
        assert_eq!(trace_level_name(63), "dbg63");
        assert_eq!(trace_level_name(99), "dbg63");
    }
}
