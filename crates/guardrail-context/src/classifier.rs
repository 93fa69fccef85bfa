//! Context classifier
//!
//! Decides once per instance whether the process is production. The
//! decision runs in a fixed order and the first match wins:
//!
//! 1. non-release build profile → allowed
//! 2. any allowed-context signal (migration, test, development) → allowed
//! 3. any production signal → production
//! 4. nothing matched → production
//!
//! Allowed-context signals dominate production signals: a migration tool
//! named like a production service is classified as allowed. The verdict is
//! cached for the lifetime of the classifier and never recomputed, even if
//! the environment changes afterwards.
//!
//! These are heuristics, not a security boundary. A production deployment
//! that happens to map a library matching a test-framework indicator is
//! classified as allowed.

use crate::config::ClassifierConfig;
use crate::probe::{HostProbe, ProcessProbe};
use crate::signal::{default_signals, HostView, Signal, SignalKind};
use crate::stack::{HostStack, NoStack, StackProbe};
use once_cell::sync::OnceCell;
use std::fmt;

/// Outcome of classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Tests, migrations, development: bypass capabilities may be exposed
    Allowed,
    /// Writes to read-only collections must be blocked
    Production,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// What produced the verdict
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Non-release build profile
    BuildProfile,
    /// First signal that fired
    Signal {
        /// Signal name
        name: String,
        /// Signal group
        kind: SignalKind,
    },
    /// No signal fired; unknown context is treated as production
    Default,
    /// Verdict supplied by the caller
    Preset,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildProfile => write!(f, "build-profile"),
            Self::Signal { name, .. } => write!(f, "signal:{name}"),
            Self::Default => write!(f, "default"),
            Self::Preset => write!(f, "preset"),
        }
    }
}

/// Cached classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    verdict: Verdict,
    decided_by: Decision,
}

impl Classification {
    /// Create classification
    #[inline]
    #[must_use]
    pub fn new(verdict: Verdict, decided_by: Decision) -> Self {
        Self {
            verdict,
            decided_by,
        }
    }

    /// Verdict
    #[inline]
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// What produced the verdict
    #[inline]
    #[must_use]
    pub fn decided_by(&self) -> &Decision {
        &self.decided_by
    }

    /// Check if writes must be blocked unconditionally
    #[inline]
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.verdict == Verdict::Production
    }

    /// Check if the build profile or an allowed-context signal matched
    #[inline]
    #[must_use]
    pub fn is_allowed_context(&self) -> bool {
        self.verdict == Verdict::Allowed
    }
}

/// Execution-context classifier
///
/// Construct one per process (or per test) and share it by reference or
/// `Arc`. Concurrent first reads run the classification exactly once.
///
/// ```
/// use guardrail_context::{BuildProfile, ClassifierConfig, ContextClassifier, StaticProbe};
///
/// let classifier = ContextClassifier::builder()
///     .config(ClassifierConfig::new().with_build_profile(BuildProfile::Release))
///     .probe(StaticProbe::new().with_env("ENVIRONMENT", "Production"))
///     .without_stack_inspection()
///     .build();
///
/// assert!(classifier.is_production_environment());
/// assert!(!classifier.is_allowed_context());
/// ```
#[derive(Debug)]
pub struct ContextClassifier {
    config: ClassifierConfig,
    probe: Box<dyn ProcessProbe>,
    stack: Box<dyn StackProbe>,
    allowed: Vec<Box<dyn Signal>>,
    production: Vec<Box<dyn Signal>>,
    cached: OnceCell<Classification>,
}

impl ContextClassifier {
    /// Classifier over the real process with default config and signals
    #[must_use]
    pub fn host() -> Self {
        Self::builder().build()
    }

    /// Start building a classifier
    #[inline]
    #[must_use]
    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::new()
    }

    /// Classifier with a verdict fixed up front; no signal is ever evaluated
    #[must_use]
    pub fn preset(verdict: Verdict) -> Self {
        let classifier = Self::builder()
            .probe(crate::probe::StaticProbe::new())
            .without_stack_inspection()
            .without_default_signals()
            .build();
        // Fresh cell, cannot already be set.
        let _ = classifier
            .cached
            .set(Classification::new(verdict, Decision::Preset));
        classifier
    }

    /// Cached classification, computed on first call
    pub fn classification(&self) -> &Classification {
        self.cached.get_or_init(|| {
            let classification = self.classify();
            tracing::info!(
                verdict = %classification.verdict(),
                decided_by = %classification.decided_by(),
                "execution context classified"
            );
            classification
        })
    }

    /// Check if the process is production
    #[inline]
    pub fn is_production_environment(&self) -> bool {
        self.classification().is_production()
    }

    /// Check if the process is a test, migration or development context
    #[inline]
    pub fn is_allowed_context(&self) -> bool {
        self.classification().is_allowed_context()
    }

    /// Check whether the classification has already run
    #[inline]
    #[must_use]
    pub fn is_classified(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Names of registered signals in evaluation order
    #[must_use]
    pub fn signal_names(&self) -> Vec<&str> {
        self.allowed
            .iter()
            .chain(self.production.iter())
            .map(|s| s.name())
            .collect()
    }

    fn classify(&self) -> Classification {
        if self.config.build_profile.is_debug() {
            return Classification::new(Verdict::Allowed, Decision::BuildProfile);
        }

        let view = HostView {
            probe: self.probe.as_ref(),
            stack: self.stack.as_ref(),
            config: &self.config,
        };

        let groups = [
            (&self.allowed, Verdict::Allowed),
            (&self.production, Verdict::Production),
        ];
        for (signals, verdict) in groups {
            if let Some(signal) = signals.iter().find(|s| s.fires(&view)) {
                tracing::debug!(signal = signal.name(), kind = %signal.kind(), "signal fired");
                return Classification::new(
                    verdict,
                    Decision::Signal {
                        name: signal.name().to_string(),
                        kind: signal.kind(),
                    },
                );
            }
        }

        Classification::new(Verdict::Production, Decision::Default)
    }
}

/// Builder for [`ContextClassifier`]
#[derive(Debug)]
pub struct ClassifierBuilder {
    config: ClassifierConfig,
    probe: Option<Box<dyn ProcessProbe>>,
    stack: Option<Box<dyn StackProbe>>,
    extra: Vec<Box<dyn Signal>>,
    use_defaults: bool,
}

impl ClassifierBuilder {
    /// Create builder: host probes, default config, default signals
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ClassifierConfig::default(),
            probe: None,
            stack: None,
            extra: Vec::new(),
            use_defaults: true,
        }
    }

    /// With configuration
    #[must_use]
    pub fn config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// With process probe
    #[must_use]
    pub fn probe(mut self, probe: impl ProcessProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// With stack probe
    #[must_use]
    pub fn stack(mut self, stack: impl StackProbe + 'static) -> Self {
        self.stack = Some(Box::new(stack));
        self
    }

    /// Never capture the call stack
    #[must_use]
    pub fn without_stack_inspection(self) -> Self {
        self.stack(NoStack)
    }

    /// Drop the built-in signals; only signals added with [`Self::signal`] run
    #[must_use]
    pub fn without_default_signals(mut self) -> Self {
        self.use_defaults = false;
        self
    }

    /// Append a signal after the built-in signals of its group
    #[must_use]
    pub fn signal(mut self, signal: impl Signal + 'static) -> Self {
        self.extra.push(Box::new(signal));
        self
    }

    /// Build classifier; nothing is evaluated until first read
    #[must_use]
    pub fn build(self) -> ContextClassifier {
        let mut signals = if self.use_defaults {
            default_signals()
        } else {
            Vec::new()
        };
        signals.extend(self.extra);

        let (allowed, production): (Vec<_>, Vec<_>) = signals
            .into_iter()
            .partition(|s| s.kind() == SignalKind::AllowedContext);

        ContextClassifier {
            config: self.config,
            probe: self.probe.unwrap_or_else(|| Box::new(HostProbe::new())),
            stack: self.stack.unwrap_or_else(|| Box::new(HostStack)),
            allowed,
            production,
            cached: OnceCell::new(),
        }
    }
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildProfile;
    use crate::probe::StaticProbe;
    use crate::signal::FnSignal;
    use crate::stack::StaticStack;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn release() -> ClassifierConfig {
        ClassifierConfig::new().with_build_profile(BuildProfile::Release)
    }

    fn classify(probe: StaticProbe) -> Classification {
        ContextClassifier::builder()
            .config(release())
            .probe(probe)
            .without_stack_inspection()
            .build()
            .classification()
            .clone()
    }

    #[test]
    fn debug_profile_short_circuits() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let classifier = ContextClassifier::builder()
            .config(ClassifierConfig::new().with_build_profile(BuildProfile::Debug))
            .probe(StaticProbe::new().with_env("ENVIRONMENT", "Production"))
            .signal(FnSignal::new("count", SignalKind::AllowedContext, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            }))
            .build();

        assert_eq!(
            classifier.classification(),
            &Classification::new(Verdict::Allowed, Decision::BuildProfile)
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_production_environment() {
        let c = classify(StaticProbe::new().with_env("ENVIRONMENT", "Production"));
        assert!(c.is_production());
        assert_eq!(
            c.decided_by(),
            &Decision::Signal {
                name: "production-environment".to_string(),
                kind: SignalKind::Production,
            }
        );
    }

    #[test]
    fn test_framework_dominates_production_environment() {
        let c = classify(
            StaticProbe::new()
                .with_env("ENVIRONMENT", "Production")
                .with_module("xunit.execution.dotnet.dll"),
        );
        assert!(c.is_allowed_context());
        assert!(!c.is_production());
    }

    #[test]
    fn migration_tool_named_like_service_is_allowed() {
        let c = classify(
            StaticProbe::new()
                .with_entry_module("Orders.Api.Migrations")
                .with_env("KUBERNETES_SERVICE_HOST", "10.0.0.1"),
        );
        assert!(c.is_allowed_context());
    }

    #[test]
    fn unknown_context_defaults_to_production() {
        let c = classify(StaticProbe::new().with_process_name("worker"));
        assert_eq!(c, Classification::new(Verdict::Production, Decision::Default));
    }

    #[test]
    fn development_environment_is_allowed() {
        let c = classify(StaticProbe::new().with_env("DOTNET_ENVIRONMENT", "Development"));
        assert!(c.is_allowed_context());
    }

    #[test]
    fn migration_frame_on_stack_is_allowed() {
        let classifier = ContextClassifier::builder()
            .config(release())
            .probe(StaticProbe::new().with_process_name("orders-api"))
            .stack(StaticStack::from_symbols(&[
                "orders::schema::AddIndexes::up",
                "orders::cli::run",
            ]))
            .build();
        assert!(classifier.is_allowed_context());
    }

    #[test]
    fn classification_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let classifier = ContextClassifier::builder()
            .config(release())
            .probe(StaticProbe::new())
            .without_stack_inspection()
            .without_default_signals()
            .signal(FnSignal::new("count", SignalKind::Production, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }))
            .build();

        assert!(!classifier.is_classified());
        for _ in 0..5 {
            assert!(classifier.is_production_environment());
            assert!(!classifier.is_allowed_context());
        }
        assert!(classifier.is_classified());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_signals_run_after_builtins_of_their_group() {
        let classifier = ContextClassifier::builder()
            .config(release())
            .probe(StaticProbe::new())
            .without_stack_inspection()
            .signal(FnSignal::new("custom", SignalKind::AllowedContext, |_| true))
            .build();

        let names = classifier.signal_names();
        let custom = names.iter().position(|n| *n == "custom").unwrap();
        let first_production = names
            .iter()
            .position(|n| *n == "production-environment")
            .unwrap();
        assert!(custom < first_production);
        assert!(classifier.is_allowed_context());
    }

    #[test]
    fn preset_verdict() {
        let classifier = ContextClassifier::preset(Verdict::Production);
        assert!(classifier.is_classified());
        assert!(classifier.is_production_environment());
        assert_eq!(classifier.classification().decided_by(), &Decision::Preset);
    }
}
