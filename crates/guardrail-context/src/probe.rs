//! Ambient process information
//!
//! Signals never touch `std::env` or `/proc` directly; they read through a
//! [`ProcessProbe`] so tests and embedders can inject a fixed view of the
//! process.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Read-only view of the host process
///
/// Every method is infallible: data the host cannot provide is reported as
/// `None` or an empty list.
pub trait ProcessProbe: Debug + Send + Sync {
    /// Value of an environment variable
    fn env_var(&self, name: &str) -> Option<String>;

    /// Name of the running process
    fn process_name(&self) -> Option<String>;

    /// Name of the entry module (executable file stem)
    fn entry_module(&self) -> Option<String>;

    /// Full path of the running executable
    fn executable_path(&self) -> Option<PathBuf>;

    /// Names of shared libraries / modules mapped into the process
    fn loaded_modules(&self) -> Vec<String>;

    /// Command-line arguments, excluding the program name
    fn args(&self) -> Vec<String>;
}

/// Probe backed by the real process
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl HostProbe {
    /// Create host probe
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProbe for HostProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn process_name(&self) -> Option<String> {
        proc_comm().or_else(|| self.entry_module())
    }

    fn entry_module(&self) -> Option<String> {
        self.executable_path()
            .as_deref()
            .and_then(file_stem)
    }

    fn executable_path(&self) -> Option<PathBuf> {
        std::env::current_exe().ok()
    }

    fn loaded_modules(&self) -> Vec<String> {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string("/proc/self/maps") {
                Ok(maps) => parse_proc_maps(&maps),
                Err(e) => {
                    tracing::debug!("cannot read /proc/self/maps: {}", e);
                    Vec::new()
                }
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Vec::new()
        }
    }

    fn args(&self) -> Vec<String> {
        std::env::args_os()
            .skip(1)
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[cfg(target_os = "linux")]
fn proc_comm() -> Option<String> {
    let comm = std::fs::read_to_string("/proc/self/comm").ok()?;
    let comm = comm.trim();
    (!comm.is_empty()).then(|| comm.to_string())
}

#[cfg(not(target_os = "linux"))]
fn proc_comm() -> Option<String> {
    None
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Extract unique file names of mapped files from `/proc/<pid>/maps` text
///
/// Anonymous and pseudo mappings (`[heap]`, `[vdso]`, ...) are skipped.
#[must_use]
pub fn parse_proc_maps(maps: &str) -> Vec<String> {
    let mut modules = BTreeSet::new();
    for line in maps.lines() {
        // address perms offset dev inode pathname
        let Some(pathname) = line.split_whitespace().nth(5) else {
            continue;
        };
        if !pathname.starts_with('/') {
            continue;
        }
        if let Some(name) = Path::new(pathname).file_name() {
            modules.insert(name.to_string_lossy().into_owned());
        }
    }
    modules.into_iter().collect()
}

/// Probe with a fixed, injected view of a process
///
/// ```
/// use guardrail_context::probe::{ProcessProbe, StaticProbe};
///
/// let probe = StaticProbe::new()
///     .with_env("ENVIRONMENT", "Production")
///     .with_process_name("orders-api");
/// assert_eq!(probe.env_var("ENVIRONMENT").as_deref(), Some("Production"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    env: BTreeMap<String, String>,
    process_name: Option<String>,
    entry_module: Option<String>,
    executable_path: Option<PathBuf>,
    modules: Vec<String>,
    args: Vec<String>,
}

impl StaticProbe {
    /// Create empty probe: no variables, no names, no modules
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With environment variable
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// With process name
    #[must_use]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    /// With entry module name
    #[must_use]
    pub fn with_entry_module(mut self, name: impl Into<String>) -> Self {
        self.entry_module = Some(name.into());
        self
    }

    /// With executable path
    #[must_use]
    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// With loaded module
    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.modules.push(name.into());
        self
    }

    /// With command-line argument
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl ProcessProbe for StaticProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn process_name(&self) -> Option<String> {
        self.process_name.clone()
    }

    fn entry_module(&self) -> Option<String> {
        self.entry_module
            .clone()
            .or_else(|| self.executable_path.as_deref().and_then(file_stem))
    }

    fn executable_path(&self) -> Option<PathBuf> {
        self.executable_path.clone()
    }

    fn loaded_modules(&self) -> Vec<String> {
        self.modules.clone()
    }

    fn args(&self) -> Vec<String> {
        self.args.clone()
    }
}
