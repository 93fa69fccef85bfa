//! Classification signals
//!
//! A signal is a named boolean check over the host process. Signals come in
//! two groups: allowed-context signals (migration, test, development) and
//! production signals. The classifier evaluates the allowed group first, so
//! allowed-context signals dominate production signals.
//!
//! All name comparisons are ASCII case-insensitive.

use crate::config::ClassifierConfig;
use crate::probe::ProcessProbe;
use crate::stack::{StackFrame, StackProbe};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Group a signal belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Firing means mutation may be permitted (migration, test, development)
    AllowedContext,
    /// Firing means the process is production
    Production,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowedContext => write!(f, "allowed-context"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Everything a signal may inspect during one classification pass
#[derive(Debug, Clone, Copy)]
pub struct HostView<'a> {
    /// Process information
    pub probe: &'a dyn ProcessProbe,
    /// Call-stack source
    pub stack: &'a dyn StackProbe,
    /// Indicator lists
    pub config: &'a ClassifierConfig,
}

/// Named boolean check over the host process
pub trait Signal: fmt::Debug + Send + Sync {
    /// Stable signal name, used in logs and in the classification result
    fn name(&self) -> &str;

    /// Group this signal belongs to
    fn kind(&self) -> SignalKind;

    /// Evaluate the signal; must not panic on missing data
    fn fires(&self, view: &HostView<'_>) -> bool;
}

/// Signal backed by a closure
///
/// ```
/// use guardrail_context::signal::{FnSignal, SignalKind};
///
/// let seeding = FnSignal::new("seed-flag", SignalKind::AllowedContext, |view| {
///     view.probe.env_var("APP_SEEDING").is_some()
/// });
/// ```
#[derive(Clone)]
pub struct FnSignal {
    name: String,
    kind: SignalKind,
    check: Arc<dyn Fn(&HostView<'_>) -> bool + Send + Sync>,
}

impl FnSignal {
    /// Create closure-backed signal
    pub fn new<F>(name: impl Into<String>, kind: SignalKind, check: F) -> Self
    where
        F: Fn(&HostView<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for FnSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSignal")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Signal for FnSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SignalKind {
        self.kind
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        (self.check)(view)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| contains_ci(haystack, n))
}

fn equals_any(value: &str, candidates: &[String]) -> bool {
    let value = value.trim();
    candidates.iter().any(|c| value.eq_ignore_ascii_case(c.trim()))
}

/// Values of the configured environment-name variables
fn environment_values(view: &HostView<'_>) -> Vec<String> {
    view.config
        .environment_variables
        .iter()
        .filter_map(|name| view.probe.env_var(name))
        .collect()
}

/// Entry module and process name, whichever are known
fn process_names(view: &HostView<'_>) -> Vec<String> {
    let mut names = Vec::with_capacity(2);
    names.extend(view.probe.entry_module());
    names.extend(view.probe.process_name());
    names.dedup();
    names
}

/// Cargo puts test harness binaries at `target/<profile>/deps/<name>-<16 hex>`
#[must_use]
pub fn is_cargo_test_binary(path: &Path) -> bool {
    let in_deps = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "deps");
    let hashed = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit_once('-'))
        .is_some_and(|(_, hash)| hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()));
    in_deps && hashed
}

/// Entry module or process named like a migration project
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationProcessName;

impl Signal for MigrationProcessName {
    fn name(&self) -> &str {
        "migration-process-name"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        process_names(view)
            .iter()
            .any(|n| contains_any(n, &view.config.migration_patterns))
    }
}

/// Process is a known migration tool
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationProcess;

impl Signal for MigrationProcess {
    fn name(&self) -> &str {
        "migration-process"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        view.probe
            .process_name()
            .is_some_and(|p| equals_any(&p, &view.config.migration_tools))
    }
}

/// Command line asks for a migration
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationArguments;

impl Signal for MigrationArguments {
    fn name(&self) -> &str {
        "migration-arguments"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        let args = view.probe.args();
        if args
            .iter()
            .any(|a| contains_any(a, &view.config.migration_patterns))
        {
            return true;
        }
        let command_line = args.join(" ");
        contains_any(&command_line, &view.config.migration_commands)
    }
}

/// Migration-shaped frame on the current call stack
///
/// The short indicators (`up`, `down`) must equal the whole function name,
/// which is stricter than a substring check: `setup`, `startup` and
/// `download` frames do not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationCallStack;

impl MigrationCallStack {
    fn is_migration_frame(frame: &StackFrame, config: &ClassifierConfig) -> bool {
        let patterns = &config.migration_frame_patterns;
        contains_any(&frame.function, patterns)
            || frame
                .declaring_type
                .as_deref()
                .is_some_and(|t| contains_any(t, patterns))
            || equals_any(&frame.function, &config.migration_frame_names)
    }
}

impl Signal for MigrationCallStack {
    fn name(&self) -> &str {
        "migration-call-stack"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        // An uncapturable stack is "no signal", never an error.
        view.stack.capture().is_some_and(|frames| {
            frames
                .iter()
                .any(|f| Self::is_migration_frame(f, view.config))
        })
    }
}

/// Test framework library mapped into the process
#[derive(Debug, Clone, Copy, Default)]
pub struct TestFrameworkLoaded;

impl Signal for TestFrameworkLoaded {
    fn name(&self) -> &str {
        "test-framework-loaded"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        view.probe
            .loaded_modules()
            .iter()
            .any(|m| contains_any(m, &view.config.test_framework_indicators))
    }
}

/// Process is a test runner
#[derive(Debug, Clone, Copy, Default)]
pub struct TestRunnerProcess;

impl Signal for TestRunnerProcess {
    fn name(&self) -> &str {
        "test-runner-process"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        if process_names(view)
            .iter()
            .any(|n| contains_any(n, &view.config.test_runner_patterns))
        {
            return true;
        }
        view.config.detect_cargo_test_binaries
            && view
                .probe
                .executable_path()
                .is_some_and(|p| is_cargo_test_binary(&p))
    }
}

/// Variables exported by a test harness
#[derive(Debug, Clone, Copy, Default)]
pub struct TestHarnessEnvironment;

impl Signal for TestHarnessEnvironment {
    fn name(&self) -> &str {
        "test-harness-environment"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        view.config
            .test_harness_variables
            .iter()
            .any(|v| view.probe.env_var(v).is_some())
    }
}

/// Environment variable names a development environment
#[derive(Debug, Clone, Copy, Default)]
pub struct DevelopmentEnvironment;

impl Signal for DevelopmentEnvironment {
    fn name(&self) -> &str {
        "development-environment"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::AllowedContext
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        environment_values(view)
            .iter()
            .any(|v| equals_any(v, &view.config.development_values))
    }
}

/// Environment variable names production
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionEnvironment;

impl Signal for ProductionEnvironment {
    fn name(&self) -> &str {
        "production-environment"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Production
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        environment_values(view)
            .iter()
            .any(|v| equals_any(v, &view.config.production_values))
    }
}

/// Cloud / container platform marker present
#[derive(Debug, Clone, Copy, Default)]
pub struct HostingPlatform;

impl Signal for HostingPlatform {
    fn name(&self) -> &str {
        "hosting-platform"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Production
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        view.config.hosting_markers.iter().any(|marker| {
            view.probe
                .env_var(marker)
                .is_some_and(|v| !v.trim().is_empty())
        })
    }
}

/// Process or entry module named like a production service
///
/// A name that also carries a development pattern (`OrdersApi.Tests`) does
/// not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionProcessName;

impl Signal for ProductionProcessName {
    fn name(&self) -> &str {
        "production-process-name"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Production
    }

    fn fires(&self, view: &HostView<'_>) -> bool {
        let config = view.config;
        process_names(view).iter().any(|name| {
            contains_any(name, &config.production_name_patterns)
                && !contains_any(name, &config.development_name_patterns)
        })
    }
}

/// Built-in signals in evaluation order
#[must_use]
pub fn default_signals() -> Vec<Box<dyn Signal>> {
    vec![
        Box::new(MigrationProcessName),
        Box::new(MigrationProcess),
        Box::new(MigrationArguments),
        Box::new(MigrationCallStack),
        Box::new(TestFrameworkLoaded),
        Box::new(TestRunnerProcess),
        Box::new(TestHarnessEnvironment),
        Box::new(DevelopmentEnvironment),
        Box::new(ProductionEnvironment),
        Box::new(HostingPlatform),
        Box::new(ProductionProcessName),
    ]
}
