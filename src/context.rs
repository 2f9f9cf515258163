// SPDX-License-Identifier: Apache-2.0 OR MIT
// Source-location context carried by issues and trace records

/// Where a message was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Package (trace name) the call site belongs to
    pub package: &'static str,
    pub file: &'static str,
    pub line: u32,
    /// Module path of the call site
    pub function: &'static str,
    pub process_id: u32,
    pub thread_id: u32,
}

impl Context {
    pub fn new(package: &'static str, file: &'static str, line: u32, function: &'static str) -> Self {
        Self {
            package,
            file,
            line,
            function,
            process_id: std::process::id(),
            thread_id: current_thread_id(),
        }
    }

    /// Context for messages this crate produces about itself
    pub fn internal(line: u32) -> Self {
        Self::new(env!("CARGO_PKG_NAME"), file!(), line, module_path!())
    }

    /// Last `::` segment of the function path
    pub fn short_function(&self) -> &'static str {
        short_function(self.function)
    }

    /// Last path component of the file
    pub fn file_basename(&self) -> &'static str {
        file_basename(self.file)
    }
}

/// Capture the current source location as a [`Context`]
///
/// # Examples
/// ```ignore
/// let issue = Issue::message(here!(), "Using TRACE_FILE");
/// ```
#[macro_export]
macro_rules! here {
    () => {
        $crate::Context::new(
            env!("CARGO_PKG_NAME"),
            file!(),
            line!(),
            module_path!(),
        )
    };
    ($package:expr) => {
        $crate::Context::new($package, file!(), line!(), module_path!())
    };
}

pub(crate) fn short_function(function: &'static str) -> &'static str {
    function.rsplit("::").next().unwrap_or(function)
}

pub(crate) fn file_basename(file: &'static str) -> &'static str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

/// File name without directory and extension
pub(crate) fn file_stem(file: &'static str) -> &'static str {
    let base = file_basename(file);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    }
}

/// Get current thread ID (truncated to u32)
pub(crate) fn current_thread_id() -> u32 {
    #[cfg(target_os = "linux")]
    {
        unsafe { libc::gettid() as u32 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        unsafe { libc::getpid() as u32 }
    }
}
