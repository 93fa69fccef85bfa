//! Guarded mutation through the read-only facade

use guardrail_gate::{
    AccessGate, Collection, GateConfig, GateError, ReadOnlyFacade, ReadOnlySet, ScopePolicy,
    ViolationReason,
};
use guardrail_test_utils::{
    allowed_gate, companies, company, company_set, development_classifier, gate_with,
    init_tracing, production_gate, CompanyStore, InMemoryCollection, TestCompany,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn zero_scopes_is_violation_even_when_allowed() {
    init_tracing();
    let gate = allowed_gate();
    let (store, set) = company_set(&gate);

    let err = set.add(company(1, "acme")).unwrap_err();
    assert_eq!(
        err.violation_reason(),
        Some(ViolationReason::NoSuppressionScope)
    );
    assert_eq!(store.add_calls(), 0);
}

#[test]
fn every_mutator_is_guarded() {
    let gate = allowed_gate();
    let store = Arc::new(InMemoryCollection::with_records(companies(3)));
    let set = ReadOnlySet::new(Arc::clone(&store), gate.clone());

    assert!(set.add(company(9, "x")).is_err());
    assert!(set.add_many(vec![company(9, "x")]).is_err());
    assert!(set.update(company(1, "renamed")).is_err());
    assert!(set.remove(&1).is_err());
    assert!(set.remove_many(&[1, 2]).is_err());
    assert!(set.create(|| company(9, "x")).is_err());
    assert!(set.create_many(|| vec![company(9, "x")]).is_err());

    assert_eq!(gate.stats().violations, 7);
    assert_eq!(set.len(), 3);
    assert_eq!(store.staged(), 0);
}

#[test]
fn reads_never_need_a_scope() {
    let gate = production_gate();
    let store = Arc::new(InMemoryCollection::with_records(companies(3)));
    let set = ReadOnlySet::new(store, gate);

    assert_eq!(set.get(&2), Some(company(2, "company-2")));
    assert_eq!(set.all().len(), 3);
    assert_eq!(set.find(|c| c.id > 1).len(), 2);
    assert!(!set.is_empty());
}

#[test]
fn seeding_inside_scope() {
    let gate = allowed_gate();
    let (store, set) = company_set(&gate);

    let _scope = gate.allow_test_seeding();
    let created = set.create(|| company(7, "acme")).unwrap();
    assert_eq!(created, company(7, "acme"));

    set.update(company(7, "acme corp")).unwrap();
    assert_eq!(set.add_many(companies(3)).unwrap(), 3);
    assert_eq!(set.remove_many(&[1, 2, 42]).unwrap(), 2);

    assert_eq!(store.add_calls(), 4);
    assert_eq!(set.get(&7).map(|c| c.name), Some("acme corp".to_string()));
    // The gate stages writes; committing is the caller's job.
    assert_eq!(store.saved(), 0);
    assert_eq!(set.inner().save().unwrap(), 7);
}

#[test]
fn production_blocks_even_with_scope() {
    let gate = production_gate();
    let (store, set) = company_set(&gate);
    let _scope = gate.enter_suppression_scope();

    let err = set.create(|| company(1, "acme")).unwrap_err();
    assert_eq!(
        err.violation_reason(),
        Some(ViolationReason::ProductionContext)
    );
    assert!(!err.is_retryable());
    assert_eq!(store.add_calls(), 0);
}

#[test]
fn create_many_with_empty_batch_adds_nothing() {
    let gate = allowed_gate();
    let (store, set) = company_set(&gate);
    let _scope = gate.enter_suppression_scope();

    let created = set.create_many(Vec::new).unwrap();
    assert!(created.is_empty());
    assert_eq!(store.add_calls(), 0);
}

#[test]
fn create_many_returns_batch_in_order() {
    let gate = allowed_gate();
    let (store, set) = company_set(&gate);
    let _scope = gate.enter_suppression_scope();

    let created = set.create_many(|| companies(4)).unwrap();
    assert_eq!(created, companies(4));
    assert_eq!(store.add_calls(), 4);
}

#[test]
fn absent_factory_fails_before_any_side_effect() {
    // No scope and production: the argument check still comes first.
    let gate = production_gate();
    let (store, set) = company_set(&gate);

    let err = gate
        .create_guarded(&set, None::<fn() -> TestCompany>)
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidArgument(_)));

    let err = gate
        .create_many_guarded(&set, None::<fn() -> Vec<TestCompany>>)
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidArgument(_)));

    assert_eq!(store.add_calls(), 0);
    assert_eq!(gate.stats().violations, 0);
}

#[derive(Debug)]
struct DetachedFacade {
    gate: AccessGate,
}

impl ReadOnlyFacade for DetachedFacade {
    type Backing = CompanyStore;

    fn backing(&self) -> Option<&CompanyStore> {
        None
    }

    fn gate(&self) -> &AccessGate {
        &self.gate
    }
}

#[test]
fn facade_without_backing_is_fatal() {
    let facade = DetachedFacade {
        gate: allowed_gate(),
    };
    let _scope = facade.gate().enter_suppression_scope();

    let mut called = false;
    let err = facade
        .gate()
        .create_guarded(&facade, Some(|| {
            called = true;
            company(1, "acme")
        }))
        .unwrap_err();

    assert!(matches!(err, GateError::CollaboratorAccessFailure(_)));
    assert!(err.is_fatal());
    assert!(!called);
}

#[test]
fn store_errors_pass_through() {
    let gate = allowed_gate();
    let store = Arc::new(CompanyStore::new().reject_adds_after(2));
    let set = ReadOnlySet::new(Arc::clone(&store), gate.clone());
    let _scope = gate.enter_suppression_scope();

    let err = set.create_many(|| companies(5)).unwrap_err();
    assert!(matches!(err, GateError::Collaborator(_)));
    assert_eq!(err.to_string(), "collection error: store rejected the write");
    assert_eq!(store.add_calls(), 3);
    assert_eq!(store.staged(), 2);
}

#[test]
fn duplicate_key_from_store() {
    let gate = allowed_gate();
    let (_store, set) = company_set(&gate);
    let _scope = gate.enter_suppression_scope();

    set.create(|| company(1, "acme")).unwrap();
    let err = set.create(|| company(1, "acme again")).unwrap_err();
    assert!(matches!(err, GateError::Collaborator(_)));
}

mod scope_policy {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn required_policy_needs_scope_in_development() {
        let gate = gate_with(development_classifier(), GateConfig::default());
        assert!(gate.classifier().is_allowed_context());

        let err = gate.guard_mutation("seed TestCompany").unwrap_err();
        assert_eq!(
            err.violation_reason(),
            Some(ViolationReason::NoSuppressionScope)
        );

        let _scope = gate.enter_suppression_scope();
        assert!(gate.guard_mutation("seed TestCompany").is_ok());
    }

    #[test]
    fn implicit_policy_allows_development_without_scope() {
        let config = GateConfig::new().with_scope_policy(ScopePolicy::ImplicitInAllowedContext);
        let gate = gate_with(development_classifier(), config);
        let (store, set) = company_set(&gate);

        assert!(gate.guard_mutation("seed TestCompany").is_ok());
        set.create(|| company(1, "acme")).unwrap();
        assert_eq!(store.add_calls(), 1);
    }

    #[test]
    fn implicit_policy_still_blocks_production() {
        let config = GateConfig::new().with_scope_policy(ScopePolicy::ImplicitInAllowedContext);
        let gate = gate_with(production_gate().classifier().clone(), config);

        let err = gate.guard_mutation("seed TestCompany").unwrap_err();
        assert_eq!(
            err.violation_reason(),
            Some(ViolationReason::ProductionContext)
        );
    }

    #[test]
    fn warn_on_bypass_does_not_change_outcome() {
        init_tracing();
        let config = GateConfig::new().with_warn_on_bypass(true);
        let gate = gate_with(development_classifier(), config);
        let _scope = gate.enter_suppression_scope();

        assert!(gate.guard_mutation("seed TestCompany").is_ok());
        assert_eq!(gate.stats().guarded_mutations, 1);
    }
}

#[test]
fn scope_moves_across_threads() {
    let gate = allowed_gate();
    let scope = gate.enter_suppression_scope();

    std::thread::spawn(move || scope.release()).join().unwrap();
    assert!(!gate.is_suppressed());
}

#[test]
fn concurrent_scopes_balance_out() {
    let gate = allowed_gate();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = gate.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let _scope = gate.enter_suppression_scope();
                    assert!(gate.guard_mutation("add TestCompany").is_ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = gate.stats();
    assert_eq!(stats.open_scopes, 0);
    assert_eq!(stats.scopes_entered, 800);
    assert_eq!(stats.guarded_mutations, 800);
}

#[derive(Debug, Clone)]
enum Step {
    Enter,
    Release,
    Probe,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![Just(Step::Enter), Just(Step::Release), Just(Step::Probe)],
        0..64,
    )
}

proptest! {
    #[test]
    fn prop_mutation_permitted_iff_scope_open(steps in steps()) {
        let gate = allowed_gate();
        let mut open = Vec::new();

        for step in steps {
            match step {
                Step::Enter => open.push(gate.enter_suppression_scope()),
                // Releases innermost first, matching lexical nesting.
                Step::Release => drop(open.pop()),
                Step::Probe => {}
            }
            prop_assert_eq!(gate.open_scopes(), open.len());
            prop_assert_eq!(gate.guard_mutation("probe").is_ok(), !open.is_empty());
        }
    }

    #[test]
    fn prop_release_order_does_not_matter(count in 1usize..16, order in any::<prop::sample::Index>()) {
        let gate = allowed_gate();
        let mut open: Vec<_> = (0..count).map(|_| gate.enter_suppression_scope()).collect();

        while !open.is_empty() {
            let scope = open.remove(order.index(open.len()));
            scope.release();
            prop_assert_eq!(gate.is_suppressed(), !open.is_empty());
        }
    }
}
