//! Guardrail Context Classifier
//!
//! Heuristically decides, once per process, whether the current execution
//! context is production (writes to read-only collections must be blocked)
//! or an allowed context such as automated tests, schema migrations or a
//! development machine.
//!
//! # Decision order
//!
//! ```text
//! build profile ── debug ──────────────────────────────▶ Allowed
//!      │ release
//!      ▼
//! allowed-context signals ── any fires ───────────────▶ Allowed
//!      │ none
//!      ▼
//! production signals ── any fires ────────────────────▶ Production
//!      │ none
//!      ▼
//! default ────────────────────────────────────────────▶ Production
//! ```
//!
//! Allowed-context signals dominate production signals. The result is
//! cached per [`ContextClassifier`] instance and never recomputed.
//!
//! # Limitations
//!
//! Every signal is a best-effort heuristic. The classifier is a guard
//! against accidents, not a security boundary: a production process that
//! loads a module whose name matches a test-framework indicator, or runs
//! with a development environment variable set, is classified as allowed.
//!
//! # Example
//!
//! ```rust,ignore
//! use guardrail_context::ContextClassifier;
//!
//! let classifier = ContextClassifier::host();
//! if classifier.is_production_environment() {
//!     // refuse to seed
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod probe;
pub mod signal;
pub mod stack;

// Re-exports for convenience
pub use classifier::{ClassifierBuilder, Classification, ContextClassifier, Decision, Verdict};
pub use config::{BuildProfile, ClassifierConfig};
pub use error::{ConfigError, ConfigResult};
pub use probe::{HostProbe, ProcessProbe, StaticProbe};
pub use signal::{FnSignal, HostView, Signal, SignalKind};
pub use stack::{HostStack, NoStack, StackFrame, StackProbe, StaticStack};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
