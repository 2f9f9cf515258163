// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Environment-derived routing configuration.
//!
//! Each of the six streams is routed by an environment variable holding a
//! comma-separated list of output stream directives, e.g.
//! `DUNEDAQ_ERS_ERROR="erstrace,throttle(30,100),lstderr"`. Defaults are
//! written with set-if-absent semantics; a value the user already exported
//! is never touched.

use crate::severity::{clamp_trace_level, SeverityKind, TLVL_DEBUG, TLVL_LOG};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub const ENV_FATAL: &str = "DUNEDAQ_ERS_FATAL";
pub const ENV_ERROR: &str = "DUNEDAQ_ERS_ERROR";
pub const ENV_WARNING: &str = "DUNEDAQ_ERS_WARNING";
pub const ENV_INFO: &str = "DUNEDAQ_ERS_INFO";
pub const ENV_LOG: &str = "DUNEDAQ_ERS_LOG";
pub const ENV_DEBUG: &str = "DUNEDAQ_ERS_DEBUG";
/// Raises the highest enabled debug sub-level
pub const ENV_DEBUG_LEVEL: &str = "DUNEDAQ_ERS_DEBUG_LEVEL";
/// Context detail of the standard streams (0-3)
pub const ENV_VERBOSITY: &str = "DUNEDAQ_ERS_VERBOSITY_LEVEL";
/// Decimal mask of trace levels whose slow path is enabled
pub const ENV_TRACE_LVLS: &str = "TRACE_LVLS";
/// Decimal mask of trace levels written to the memory buffer
pub const ENV_TRACE_LVLM: &str = "TRACE_LVLM";

/// Debug level the issue backend is raised to after setup
pub const DEFAULT_DEBUG_LEVEL: u8 = 63;

/// Slow path default: fatal through log
pub const DEFAULT_SLOW_MASK: u64 = (1 << (TLVL_LOG + 1)) - 1;
/// Memory default: fatal through debug(0)
pub const DEFAULT_MEMORY_MASK: u64 = (1 << (TLVL_DEBUG + 1)) - 1;

/// Routing variable of each stream
pub const fn routing_var(kind: SeverityKind) -> &'static str {
    match kind {
        SeverityKind::Fatal => ENV_FATAL,
        SeverityKind::Error => ENV_ERROR,
        SeverityKind::Warning => ENV_WARNING,
        SeverityKind::Info => ENV_INFO,
        SeverityKind::Log => ENV_LOG,
        SeverityKind::Debug => ENV_DEBUG,
    }
}

/// Built-in routing of each stream
pub const fn default_routing(kind: SeverityKind) -> &'static str {
    match kind {
        SeverityKind::Fatal => "erstrace,lstderr",
        SeverityKind::Error | SeverityKind::Warning => "erstrace,throttle(30,100),lstderr",
        SeverityKind::Info => "erstrace,lstdout",
        SeverityKind::Log | SeverityKind::Debug => "lstdout",
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unbalanced parentheses in directive list '{0}'")]
    UnbalancedParens(String),

    #[error("empty directive in list '{0}'")]
    EmptyDirective(String),

    #[error("throttle expects two numeric parameters, got '{0}'")]
    BadThrottle(String),

    #[error("'{0}' is not a number")]
    BadNumber(String),
}

// ============================================================================
// Environment access
// ============================================================================

/// Read/write access to a process-style environment
pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Set `key` unless it already exists; returns whether it was written
    fn set_if_absent(&self, key: &str, value: &str) -> bool;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_if_absent(&self, key: &str, value: &str) -> bool {
        if std::env::var_os(key).is_some() {
            return false;
        }
        std::env::set_var(key, value);
        true
    }
}

/// In-memory environment; clones share the same variables
#[derive(Debug, Clone, Default)]
pub struct MemoryEnv {
    vars: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let env = Self::new();
        for (key, value) in pairs {
            env.set(key, value);
        }
        env
    }

    /// Unconditional write (what a user's `export` does)
    pub fn set(&self, key: &str, value: &str) {
        self.vars
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    /// Sorted copy of every variable
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Environment for MemoryEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set_if_absent(&self, key: &str, value: &str) -> bool {
        let mut vars = self
            .vars
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if vars.contains_key(key) {
            return false;
        }
        vars.insert(key.to_string(), value.to_string());
        true
    }
}

// ============================================================================
// Defaults
// ============================================================================

/// Write the default routing and the debug override mask, never overriding
///
/// Returns the names of the variables that were written.
pub fn apply_defaults(env: &dyn Environment) -> Vec<&'static str> {
    let mut written = Vec::new();
    for kind in SeverityKind::ALL {
        if env.set_if_absent(routing_var(kind), default_routing(kind)) {
            written.push(routing_var(kind));
        }
    }

    if let Some(mask) = debug_override(env).map(slow_mask_for_debug_level) {
        if env.set_if_absent(ENV_TRACE_LVLS, &mask.to_string()) {
            written.push(ENV_TRACE_LVLS);
        }
    }
    written
}

/// The `DUNEDAQ_ERS_DEBUG_LEVEL` value, if set to a number
pub fn debug_override(env: &dyn Environment) -> Option<u64> {
    env.get(ENV_DEBUG_LEVEL)
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| parse_c_number(&value).ok())
}

/// Slow path mask enabling every trace level up to debug(`level`)
pub fn slow_mask_for_debug_level(level: u64) -> u64 {
    let lvl = clamp_trace_level((level.min(i64::MAX as u64) as i64).saturating_add(TLVL_DEBUG as i64));
    let below = if lvl >= 63 { u64::MAX >> 1 } else { (1u64 << lvl) - 1 };
    below | (1u64 << lvl)
}

/// Parse an unsigned number with C base-prefix rules
///
/// `0x`/`0X` prefix is hex, a leading `0` is octal, otherwise decimal.
/// A leading `-` wraps like C does. Unlike `strtoul` the whole string must
/// be a number: input such as `0x`, `08` or `2abc` is rejected, and the
/// caller falls back to its default.
pub fn parse_c_number(text: &str) -> Result<u64, ConfigError> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    };
    let value = parsed.map_err(|_| ConfigError::BadNumber(text.to_string()))?;
    Ok(if negative { value.wrapping_neg() } else { value })
}

// ============================================================================
// Stream directives
// ============================================================================

/// One entry of a routing variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum StreamDirective {
    /// `lstderr` / `stderr`
    Stderr,
    /// `lstdout` / `stdout`
    Stdout,
    /// `throttle(initial,interval_secs)`
    Throttle { initial: u32, interval_secs: u64 },
    /// `erstrace`: forward into the trace buffer
    Trace,
    /// `json`: one JSON object per issue on stderr
    Json,
    /// `null`: discard
    Null,
    /// Any other label, resolved against the stream registry
    Plugin { name: String, param: String },
}

pub const DEFAULT_THROTTLE_INITIAL: u32 = 30;
pub const DEFAULT_THROTTLE_INTERVAL_SECS: u64 = 100;

impl StreamDirective {
    /// Label used in routing variables
    pub fn label(&self) -> &str {
        match self {
            StreamDirective::Stderr => "lstderr",
            StreamDirective::Stdout => "lstdout",
            StreamDirective::Throttle { .. } => "throttle",
            StreamDirective::Trace => "erstrace",
            StreamDirective::Json => "json",
            StreamDirective::Null => "null",
            StreamDirective::Plugin { name, .. } => name,
        }
    }

    /// Parse a single directive such as `throttle(30,100)`
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConfigError::EmptyDirective(text.to_string()));
        }
        let (name, param) = match text.find('(') {
            Some(open) => {
                let close = text
                    .rfind(')')
                    .filter(|close| *close > open && *close == text.len() - 1)
                    .ok_or_else(|| ConfigError::UnbalancedParens(text.to_string()))?;
                (text[..open].trim(), text[open + 1..close].trim())
            }
            None => (text, ""),
        };
        Ok(match name {
            "lstderr" | "stderr" => StreamDirective::Stderr,
            "lstdout" | "stdout" => StreamDirective::Stdout,
            "erstrace" => StreamDirective::Trace,
            "json" => StreamDirective::Json,
            "null" => StreamDirective::Null,
            "throttle" => parse_throttle(param)?,
            _ => StreamDirective::Plugin {
                name: name.to_string(),
                param: param.to_string(),
            },
        })
    }

    /// Parse a comma-separated list; commas inside parentheses don't split
    pub fn parse_list(text: &str) -> Result<Vec<Self>, ConfigError> {
        let mut directives = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (idx, ch) in text.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ConfigError::UnbalancedParens(text.to_string()))?;
                }
                ',' if depth == 0 => {
                    directives.push(Self::parse_item(&text[start..idx], text)?);
                    start = idx + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(ConfigError::UnbalancedParens(text.to_string()));
        }
        directives.push(Self::parse_item(&text[start..], text)?);
        Ok(directives)
    }

    fn parse_item(item: &str, list: &str) -> Result<Self, ConfigError> {
        if item.trim().is_empty() {
            return Err(ConfigError::EmptyDirective(list.to_string()));
        }
        Self::parse(item)
    }
}

fn parse_throttle(param: &str) -> Result<StreamDirective, ConfigError> {
    if param.is_empty() {
        return Ok(StreamDirective::Throttle {
            initial: DEFAULT_THROTTLE_INITIAL,
            interval_secs: DEFAULT_THROTTLE_INTERVAL_SECS,
        });
    }
    let mut parts = param.split(',').map(str::trim);
    let bad = || ConfigError::BadThrottle(param.to_string());
    let initial = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(bad)?;
    let interval_secs = parts
        .next()
        .and_then(|p| p.parse::<u64>().ok())
        .ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(StreamDirective::Throttle {
        initial,
        interval_secs,
    })
}

impl std::fmt::Display for StreamDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamDirective::Throttle {
                initial,
                interval_secs,
            } => write!(f, "throttle({},{})", initial, interval_secs),
            StreamDirective::Plugin { name, param } if !param.is_empty() => {
                write!(f, "{}({})", name, param)
            }
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// Routing and settings
// ============================================================================

/// Ordered output directives for every stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub streams: BTreeMap<SeverityKind, Vec<StreamDirective>>,
}

impl RoutingConfig {
    /// The built-in routing
    pub fn defaults() -> Self {
        let streams = SeverityKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin_directives(kind)))
            .collect();
        Self { streams }
    }

    /// Read every routing variable, falling back per stream
    ///
    /// Missing or malformed values use that stream's built-in routing.
    /// Returns the routing and the problems encountered.
    pub fn from_env(env: &dyn Environment) -> (Self, Vec<(SeverityKind, ConfigError)>) {
        let mut streams = BTreeMap::new();
        let mut problems = Vec::new();
        for kind in SeverityKind::ALL {
            let directives = match env.get(routing_var(kind)) {
                Some(value) => match StreamDirective::parse_list(&value) {
                    Ok(directives) => directives,
                    Err(err) => {
                        problems.push((kind, err));
                        builtin_directives(kind)
                    }
                },
                None => builtin_directives(kind),
            };
            streams.insert(kind, directives);
        }
        (Self { streams }, problems)
    }

    pub fn directives(&self, kind: SeverityKind) -> &[StreamDirective] {
        self.streams.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Put `erstrace` first on fatal, error, warning and info when missing
    pub fn force_trace_forwarding(&mut self) {
        for kind in [
            SeverityKind::Fatal,
            SeverityKind::Error,
            SeverityKind::Warning,
            SeverityKind::Info,
        ] {
            let directives = self.streams.entry(kind).or_default();
            if directives.first() != Some(&StreamDirective::Trace) {
                directives.retain(|d| *d != StreamDirective::Trace);
                directives.insert(0, StreamDirective::Trace);
            }
        }
    }

    /// Render one stream back to its variable syntax
    pub fn render(&self, kind: SeverityKind) -> String {
        self.directives(kind)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

fn builtin_directives(kind: SeverityKind) -> Vec<StreamDirective> {
    // The built-in strings are known to parse
    StreamDirective::parse_list(default_routing(kind)).unwrap_or_default()
}

/// Numeric settings read alongside the routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `DUNEDAQ_ERS_DEBUG_LEVEL`, if set
    pub debug_level_override: Option<u64>,
    /// Trace levels whose slow path is enabled
    pub slow_mask: u64,
    /// Trace levels written to memory
    pub memory_mask: u64,
    /// Context detail of the standard streams
    pub verbosity: u8,
    /// Put `erstrace` in front of the four issue streams
    pub force_trace_forwarding: bool,
}

impl Settings {
    pub fn from_env(env: &dyn Environment) -> Self {
        let mask = |key: &str, default: u64| {
            env.get(key)
                .and_then(|value| parse_c_number(&value).ok())
                .unwrap_or(default)
        };
        Self {
            debug_level_override: debug_override(env),
            slow_mask: mask(ENV_TRACE_LVLS, DEFAULT_SLOW_MASK),
            memory_mask: mask(ENV_TRACE_LVLM, DEFAULT_MEMORY_MASK),
            verbosity: env
                .get(ENV_VERBOSITY)
                .and_then(|value| value.trim().parse::<u8>().ok())
                .unwrap_or(0)
                .min(3),
            force_trace_forwarding: true,
        }
    }

    /// Debug level the issue backend runs at once set up
    pub fn debug_level(&self) -> u8 {
        self.debug_level_override
            .map(|level| level.min(u8::MAX as u64) as u8)
            .unwrap_or(0)
            .max(DEFAULT_DEBUG_LEVEL)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_level_override: None,
            slow_mask: DEFAULT_SLOW_MASK,
            memory_mask: DEFAULT_MEMORY_MASK,
            verbosity: 0,
            force_trace_forwarding: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive_list() {
        let list = StreamDirective::parse_list("erstrace,throttle(30,100),lstderr").unwrap();
        assert_eq!(
            list,
            vec![
                StreamDirective::Trace,
                StreamDirective::Throttle {
                    initial: 30,
                    interval_secs: 100
                },
                StreamDirective::Stderr,
            ]
        );
    }

    #[test]
    fn test_parse_plugin_directive() {
        let list = StreamDirective::parse_list("lstdout, mts(partition=x)").unwrap();
        assert_eq!(
            list[1],
            StreamDirective::Plugin {
                name: "mts".to_string(),
                param: "partition=x".to_string()
            }
        );
        assert_eq!(list[1].to_string(), "mts(partition=x)");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            StreamDirective::parse_list("lstdout,throttle(30,100"),
            Err(ConfigError::UnbalancedParens(_))
        ));
        assert!(matches!(
            StreamDirective::parse_list("lstdout,,lstderr"),
            Err(ConfigError::EmptyDirective(_))
        ));
        assert!(matches!(
            StreamDirective::parse("throttle(a,b)"),
            Err(ConfigError::BadThrottle(_))
        ));
        assert!(matches!(
            StreamDirective::parse_list("lstdout)"),
            Err(ConfigError::UnbalancedParens(_))
        ));
    }

    #[test]
    fn test_parse_c_number() {
        assert_eq!(parse_c_number("63").unwrap(), 63);
        assert_eq!(parse_c_number("0x1f").unwrap(), 31);
        assert_eq!(parse_c_number("017").unwrap(), 15);
        assert_eq!(parse_c_number("0").unwrap(), 0);
        assert_eq!(parse_c_number("-1").unwrap(), u64::MAX);
        for bad in ["0x", "08", "2abc", "", "-"] {
            assert!(parse_c_number(bad).is_err(), "{:?}", bad);
        }
        assert!(parse_c_number("lots").is_err());
    }

    #[test]
    fn test_slow_mask_for_debug_level() {
        // debug(2) is trace level 7: bits 0..=7
        assert_eq!(slow_mask_for_debug_level(2), 0xff);
        assert_eq!(slow_mask_for_debug_level(0), 0x3f);
        assert_eq!(slow_mask_for_debug_level(58), u64::MAX);
        assert_eq!(slow_mask_for_debug_level(1000), u64::MAX);
    }

    #[test]
    fn test_apply_defaults_sets_absent_only() {
        let env = MemoryEnv::from_pairs(&[(ENV_ERROR, "lstderr")]);
        let written = apply_defaults(&env);

        assert!(!written.contains(&ENV_ERROR));
        assert_eq!(env.get(ENV_ERROR).as_deref(), Some("lstderr"));
        assert_eq!(env.get(ENV_FATAL).as_deref(), Some("erstrace,lstderr"));
        assert_eq!(env.get(ENV_INFO).as_deref(), Some("erstrace,lstdout"));
        assert_eq!(env.get(ENV_DEBUG).as_deref(), Some("lstdout"));
        assert_eq!(env.get(ENV_TRACE_LVLS), None);
    }

    #[test]
    fn test_apply_defaults_debug_override() {
        let env = MemoryEnv::from_pairs(&[(ENV_DEBUG_LEVEL, "2")]);
        apply_defaults(&env);
        assert_eq!(env.get(ENV_TRACE_LVLS).as_deref(), Some("255"));

        let env = MemoryEnv::from_pairs(&[(ENV_DEBUG_LEVEL, "2"), (ENV_TRACE_LVLS, "7")]);
        apply_defaults(&env);
        assert_eq!(env.get(ENV_TRACE_LVLS).as_deref(), Some("7"));

        let env = MemoryEnv::from_pairs(&[(ENV_DEBUG_LEVEL, "")]);
        apply_defaults(&env);
        assert_eq!(env.get(ENV_TRACE_LVLS), None);
    }

    #[test]
    fn test_routing_from_env_falls_back() {
        let env = MemoryEnv::from_pairs(&[(ENV_WARNING, "lstderr,throttle(1"), (ENV_LOG, "null")]);
        let (routing, problems) = RoutingConfig::from_env(&env);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, SeverityKind::Warning);
        assert_eq!(
            routing.render(SeverityKind::Warning),
            "erstrace,throttle(30,100),lstderr"
        );
        assert_eq!(routing.directives(SeverityKind::Log), &[StreamDirective::Null]);
        assert_eq!(routing.render(SeverityKind::Fatal), "erstrace,lstderr");
    }

    #[test]
    fn test_force_trace_forwarding() {
        let env = MemoryEnv::from_pairs(&[(ENV_ERROR, "lstderr,erstrace"), (ENV_INFO, "lstdout")]);
        let (mut routing, _) = RoutingConfig::from_env(&env);
        routing.force_trace_forwarding();

        assert_eq!(routing.render(SeverityKind::Error), "erstrace,lstderr");
        assert_eq!(routing.render(SeverityKind::Info), "erstrace,lstdout");
        assert_eq!(routing.render(SeverityKind::Log), "lstdout");
        // The environment itself is untouched
        assert_eq!(env.get(ENV_INFO).as_deref(), Some("lstdout"));
    }

    #[test]
    fn test_settings_from_env() {
        let env = MemoryEnv::from_pairs(&[
            (ENV_TRACE_LVLS, "255"),
            (ENV_TRACE_LVLM, "0xffff"),
            (ENV_VERBOSITY, "9"),
        ]);
        let settings = Settings::from_env(&env);
        assert_eq!(settings.slow_mask, 255);
        assert_eq!(settings.memory_mask, 0xffff);
        assert_eq!(settings.verbosity, 3);
        assert_eq!(settings.debug_level(), DEFAULT_DEBUG_LEVEL);

        let settings = Settings::from_env(&MemoryEnv::new());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_routing_serializes() {
        let json = serde_json::to_string(&RoutingConfig::defaults()).unwrap();
        assert!(json.contains("\"fatal\""));
        assert!(json.contains("\"throttle\""));
        let back: RoutingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RoutingConfig::defaults());
    }
}
