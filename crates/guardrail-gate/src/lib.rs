//! Guardrail Access Gate
//!
//! Keeps read-only collections read-only. Production code reads through a
//! [`ReadOnlySet`]; every mutation passes [`AccessGate::guard_mutation`],
//! which rejects it unless a [`SuppressionScope`] is open and the
//! [`ContextClassifier`](guardrail_context::ContextClassifier) has not
//! classified the process as production.
//!
//! # Example
//!
//! ```rust,ignore
//! use guardrail_context::ContextClassifier;
//! use guardrail_gate::{AccessGate, ReadOnlySet};
//! use std::sync::Arc;
//!
//! let gate = AccessGate::new(Arc::new(ContextClassifier::host()));
//! let companies = ReadOnlySet::new(store, gate.clone());
//!
//! let _scope = gate.allow_test_seeding();
//! companies.create(|| Company::new("acme"))?;
//! companies.inner().save()?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod collection;
pub mod config;
pub mod error;
pub mod gate;

// Re-exports for convenience
pub use collection::{
    AsyncCollection, Collection, EntityOf, KeyOf, ReadOnlyEntity, ReadOnlyFacade, ReadOnlySet,
};
pub use config::{GateConfig, ScopePolicy};
pub use error::{ConfigError, GateError, GateResult, ViolationReason};
pub use gate::{AccessGate, GateStats, SuppressionScope};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
