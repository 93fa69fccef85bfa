//! Access gate: scoped mutation suppression plus the production check
//!
//! Two gates must both pass before a read-only collection is mutated:
//!
//! 1. the classifier gate: the process must not be classified as production;
//! 2. the scope gate: a [`SuppressionScope`] must be open on this gate's
//!    counter (relaxed by [`ScopePolicy::ImplicitInAllowedContext`]).
//!
//! Scopes nest. The counter is reference-counted, so releasing an inner scope
//! never re-enables enforcement while an outer scope is still open.

use crate::collection::{backing_of, short_type_name, AsyncCollection, Collection, EntityOf, ReadOnlyFacade};
use crate::config::{GateConfig, ScopePolicy};
use crate::error::{GateError, GateResult, ViolationReason};
use guardrail_context::ContextClassifier;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct GateCounters {
    open_scopes: AtomicUsize,
    scopes_entered: AtomicU64,
    guarded_mutations: AtomicU64,
    violations: AtomicU64,
}

/// Snapshot of gate activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Mutations that passed the guard
    pub guarded_mutations: u64,
    /// Mutations rejected with `ReadOnlyViolation`
    pub violations: u64,
    /// Scopes entered since the context was created
    pub scopes_entered: u64,
    /// Scopes currently open
    pub open_scopes: usize,
}

/// Guard in front of read-only collections
///
/// Clones share the scope counter, the statistics and the classifier. Use
/// [`AccessGate::new_context`] for an independent counter, e.g. one per
/// request or test case in a concurrent host.
#[derive(Debug, Clone)]
pub struct AccessGate {
    classifier: Arc<ContextClassifier>,
    config: GateConfig,
    counters: Arc<GateCounters>,
}

impl AccessGate {
    /// Create gate with default configuration
    pub fn new(classifier: Arc<ContextClassifier>) -> Self {
        Self::with_config(classifier, GateConfig::default())
    }

    /// Create gate with explicit configuration
    pub fn with_config(classifier: Arc<ContextClassifier>, config: GateConfig) -> Self {
        Self {
            classifier,
            config,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Gate with the same classifier and config but a fresh scope counter
    #[must_use]
    pub fn new_context(&self) -> Self {
        Self::with_config(Arc::clone(&self.classifier), self.config.clone())
    }

    /// Open a suppression scope; released when the handle drops
    ///
    /// Never fails. Opening a scope in production is logged, and mutations
    /// stay blocked by the classifier gate.
    #[must_use = "dropping the scope immediately re-enables enforcement"]
    pub fn enter_suppression_scope(&self) -> SuppressionScope {
        let depth = self.counters.open_scopes.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.scopes_entered.fetch_add(1, Ordering::Relaxed);

        if self.classifier.is_production_environment() {
            tracing::warn!(depth, "suppression scope opened in production context");
        } else {
            tracing::trace!(depth, "suppression scope entered");
        }

        SuppressionScope {
            counters: Arc::clone(&self.counters),
            depth,
        }
    }

    /// Open a scope for seeding test fixtures
    #[must_use = "dropping the scope immediately re-enables enforcement"]
    pub fn allow_test_seeding(&self) -> SuppressionScope {
        self.enter_suppression_scope()
    }

    /// Number of scopes currently open on this context
    #[inline]
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.counters.open_scopes.load(Ordering::Acquire)
    }

    /// Check if at least one scope is open
    #[inline]
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.open_scopes() > 0
    }

    /// Fail unless the classifier verdict permits developer-only capabilities
    ///
    /// Ignores scope state.
    ///
    /// # Errors
    /// `ReadOnlyViolation` with `ProductionContext` in production.
    pub fn validate_context(&self, description: &str) -> GateResult<()> {
        if self.classifier.is_production_environment() {
            return Err(self.reject(description, ViolationReason::ProductionContext));
        }
        Ok(())
    }

    /// Fail unless a mutation of a read-only collection is permitted
    ///
    /// Every mutating entry point calls this before touching the store.
    ///
    /// # Errors
    /// `ReadOnlyViolation` with `ProductionContext` in production, even with
    /// an open scope; with `NoSuppressionScope` when no scope is open and the
    /// policy requires one.
    pub fn guard_mutation(&self, description: &str) -> GateResult<()> {
        self.validate_context(description)?;

        let open = self.open_scopes();
        if open == 0 && self.config.scope_policy == ScopePolicy::Required {
            return Err(self.reject(description, ViolationReason::NoSuppressionScope));
        }

        self.counters
            .guarded_mutations
            .fetch_add(1, Ordering::Relaxed);
        if self.config.warn_on_bypass {
            tracing::warn!(operation = description, open_scopes = open, "read-only guard bypassed");
        } else {
            tracing::debug!(operation = description, open_scopes = open, "read-only guard bypassed");
        }
        Ok(())
    }

    /// Build one entity and stage it in the facade's backing collection
    ///
    /// Order: factory presence, guard, backing lookup, factory call, add.
    /// The entity is returned as built; key assignment belongs to the store.
    ///
    /// # Errors
    /// - `InvalidArgument` if `factory` is `None`, before any side effect
    /// - `ReadOnlyViolation` from [`AccessGate::guard_mutation`]
    /// - `CollaboratorAccessFailure` if the facade has no backing collection
    /// - `Collaborator` if the store rejects the add
    pub fn create_guarded<R, F>(&self, facade: &R, factory: Option<F>) -> GateResult<EntityOf<R>>
    where
        R: ReadOnlyFacade,
        F: FnOnce() -> EntityOf<R>,
    {
        let factory = require_factory(factory)?;
        self.guard_mutation(&format!("create {}", short_type_name::<EntityOf<R>>()))?;
        let backing = backing_of(facade)?;

        let entity = factory();
        backing
            .add(entity.clone())
            .map_err(GateError::collaborator)?;
        Ok(entity)
    }

    /// Build several entities and stage each one
    ///
    /// An empty batch performs no store calls. A failing add stops the batch;
    /// earlier adds stay staged in the store.
    ///
    /// # Errors
    /// As [`AccessGate::create_guarded`].
    pub fn create_many_guarded<R, F, I>(
        &self,
        facade: &R,
        factory: Option<F>,
    ) -> GateResult<Vec<EntityOf<R>>>
    where
        R: ReadOnlyFacade,
        F: FnOnce() -> I,
        I: IntoIterator<Item = EntityOf<R>>,
    {
        let factory = require_factory(factory)?;
        self.guard_mutation(&format!("create many {}", short_type_name::<EntityOf<R>>()))?;
        let backing = backing_of(facade)?;

        let entities: Vec<_> = factory().into_iter().collect();
        for entity in &entities {
            backing
                .add(entity.clone())
                .map_err(GateError::collaborator)?;
        }
        Ok(entities)
    }

    /// [`AccessGate::create_guarded`] through the async add path
    ///
    /// # Errors
    /// As [`AccessGate::create_guarded`].
    pub async fn create_guarded_async<R, F>(
        &self,
        facade: &R,
        factory: Option<F>,
    ) -> GateResult<EntityOf<R>>
    where
        R: ReadOnlyFacade + Sync,
        R::Backing: AsyncCollection,
        F: FnOnce() -> EntityOf<R> + Send,
    {
        let factory = require_factory(factory)?;
        self.guard_mutation(&format!("create {}", short_type_name::<EntityOf<R>>()))?;
        let backing = backing_of(facade)?;

        let entity = factory();
        backing
            .add_async(entity.clone())
            .await
            .map_err(GateError::collaborator)?;
        Ok(entity)
    }

    /// [`AccessGate::create_many_guarded`] through the async add path
    ///
    /// # Errors
    /// As [`AccessGate::create_guarded`].
    pub async fn create_many_guarded_async<R, F, I>(
        &self,
        facade: &R,
        factory: Option<F>,
    ) -> GateResult<Vec<EntityOf<R>>>
    where
        R: ReadOnlyFacade + Sync,
        R::Backing: AsyncCollection,
        F: FnOnce() -> I + Send,
        I: IntoIterator<Item = EntityOf<R>>,
    {
        let factory = require_factory(factory)?;
        self.guard_mutation(&format!("create many {}", short_type_name::<EntityOf<R>>()))?;
        let backing = backing_of(facade)?;

        let entities: Vec<_> = factory().into_iter().collect();
        for entity in &entities {
            backing
                .add_async(entity.clone())
                .await
                .map_err(GateError::collaborator)?;
        }
        Ok(entities)
    }

    /// Activity snapshot for this context
    #[must_use]
    pub fn stats(&self) -> GateStats {
        GateStats {
            guarded_mutations: self.counters.guarded_mutations.load(Ordering::Relaxed),
            violations: self.counters.violations.load(Ordering::Relaxed),
            scopes_entered: self.counters.scopes_entered.load(Ordering::Relaxed),
            open_scopes: self.open_scopes(),
        }
    }

    /// Classifier consulted by this gate
    #[inline]
    #[must_use]
    pub fn classifier(&self) -> &Arc<ContextClassifier> {
        &self.classifier
    }

    /// Gate configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn reject(&self, description: &str, reason: ViolationReason) -> GateError {
        self.counters.violations.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(operation = description, %reason, "read-only violation");
        GateError::violation(description, reason)
    }
}

fn require_factory<F>(factory: Option<F>) -> GateResult<F> {
    factory.ok_or_else(|| GateError::invalid_argument("factory must be provided"))
}

/// Open suppression scope
///
/// Dropping the handle (or calling [`SuppressionScope::release`]) closes it.
#[derive(Debug)]
pub struct SuppressionScope {
    counters: Arc<GateCounters>,
    depth: usize,
}

impl SuppressionScope {
    /// Nesting depth at the time this scope was opened (outermost is 1)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Close the scope now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SuppressionScope {
    fn drop(&mut self) {
        let remaining = self.counters.open_scopes.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!(remaining, "suppression scope released");
    }
}
