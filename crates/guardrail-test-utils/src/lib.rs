//! Testing utilities for the guardrail workspace
//!
//! In-memory collaborator, a sample read-only entity and classifier fixtures.

#![allow(missing_docs)]

use guardrail_context::{
    BuildProfile, ClassifierConfig, ContextClassifier, StaticProbe, Verdict,
};
use guardrail_gate::{
    AccessGate, AsyncCollection, Collection, GateConfig, ReadOnlyEntity, ReadOnlySet,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCompany {
    pub id: u32,
    pub name: String,
}

impl ReadOnlyEntity for TestCompany {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

pub fn company(id: u32, name: &str) -> TestCompany {
    TestCompany {
        id,
        name: name.to_string(),
    }
}

pub fn companies(count: u32) -> Vec<TestCompany> {
    (1..=count).map(|id| company(id, &format!("company-{id}"))).collect()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InMemoryError {
    #[error("duplicate key {0}")]
    DuplicateKey(String),
    #[error("no record with key {0}")]
    NotFound(String),
    #[error("store rejected the write")]
    Rejected,
}

#[derive(Debug)]
struct State<E: ReadOnlyEntity> {
    records: BTreeMap<E::Key, E>,
    staged: usize,
    saved: usize,
    add_calls: usize,
    async_add_calls: usize,
    reject_adds_after: Option<usize>,
}

/// Collection that stages writes in memory and counts calls
#[derive(Debug)]
pub struct InMemoryCollection<E: ReadOnlyEntity> {
    state: Mutex<State<E>>,
}

impl<E: ReadOnlyEntity> Default for InMemoryCollection<E> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                records: BTreeMap::new(),
                staged: 0,
                saved: 0,
                add_calls: 0,
                async_add_calls: 0,
                reject_adds_after: None,
            }),
        }
    }
}

impl<E: ReadOnlyEntity> InMemoryCollection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store; the records count as already saved
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock();
            for record in records {
                state.records.insert(record.key(), record);
                state.saved += 1;
            }
        }
        store
    }

    /// Accept `count` more adds, then fail with `Rejected`
    pub fn reject_adds_after(self, count: usize) -> Self {
        self.state.lock().reject_adds_after = Some(count);
        self
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().add_calls
    }

    pub fn async_add_calls(&self) -> usize {
        self.state.lock().async_add_calls
    }

    /// Writes staged since the last save
    pub fn staged(&self) -> usize {
        self.state.lock().staged
    }

    pub fn saved(&self) -> usize {
        self.state.lock().saved
    }
}

impl<E: ReadOnlyEntity> Collection for InMemoryCollection<E> {
    type Entity = E;
    type Error = InMemoryError;

    fn add(&self, entity: E) -> Result<(), InMemoryError> {
        let mut state = self.state.lock();
        state.add_calls += 1;
        if let Some(remaining) = state.reject_adds_after {
            if remaining == 0 {
                return Err(InMemoryError::Rejected);
            }
            state.reject_adds_after = Some(remaining - 1);
        }
        let key = entity.key();
        if state.records.contains_key(&key) {
            return Err(InMemoryError::DuplicateKey(format!("{key:?}")));
        }
        state.records.insert(key, entity);
        state.staged += 1;
        Ok(())
    }

    fn update(&self, entity: E) -> Result<(), InMemoryError> {
        let mut state = self.state.lock();
        let key = entity.key();
        match state.records.get_mut(&key) {
            Some(slot) => *slot = entity,
            None => return Err(InMemoryError::NotFound(format!("{key:?}"))),
        }
        state.staged += 1;
        Ok(())
    }

    fn remove(&self, key: &E::Key) -> Result<Option<E>, InMemoryError> {
        let mut state = self.state.lock();
        let removed = state.records.remove(key);
        if removed.is_some() {
            state.staged += 1;
        }
        Ok(removed)
    }

    fn get(&self, key: &E::Key) -> Option<E> {
        self.state.lock().records.get(key).cloned()
    }

    fn all(&self) -> Vec<E> {
        self.state.lock().records.values().cloned().collect()
    }

    fn save(&self) -> Result<usize, InMemoryError> {
        let mut state = self.state.lock();
        let written = std::mem::take(&mut state.staged);
        state.saved += written;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl<E: ReadOnlyEntity> AsyncCollection for InMemoryCollection<E> {
    async fn add_async(&self, entity: E) -> Result<(), InMemoryError> {
        tokio::task::yield_now().await;
        self.state.lock().async_add_calls += 1;
        self.add(entity)
    }
}

pub fn allowed_classifier() -> Arc<ContextClassifier> {
    Arc::new(ContextClassifier::preset(Verdict::Allowed))
}

pub fn production_classifier() -> Arc<ContextClassifier> {
    Arc::new(ContextClassifier::preset(Verdict::Production))
}

/// Release build with `DOTNET_ENVIRONMENT=Development` and nothing else
pub fn development_classifier() -> Arc<ContextClassifier> {
    Arc::new(
        ContextClassifier::builder()
            .config(ClassifierConfig::new().with_build_profile(BuildProfile::Release))
            .probe(StaticProbe::new().with_env("DOTNET_ENVIRONMENT", "Development"))
            .without_stack_inspection()
            .build(),
    )
}

pub fn allowed_gate() -> AccessGate {
    AccessGate::new(allowed_classifier())
}

pub fn production_gate() -> AccessGate {
    AccessGate::new(production_classifier())
}

pub type CompanyStore = InMemoryCollection<TestCompany>;

/// Empty company store behind a read-only facade
pub fn company_set(gate: &AccessGate) -> (Arc<CompanyStore>, ReadOnlySet<CompanyStore>) {
    let store = Arc::new(CompanyStore::new());
    let set = ReadOnlySet::new(Arc::clone(&store), gate.clone());
    (store, set)
}

/// Gate for `classifier` using `config`
pub fn gate_with(classifier: Arc<ContextClassifier>, config: GateConfig) -> AccessGate {
    AccessGate::with_config(classifier, config)
}

/// Install a test-writer subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
