//! Collaborator contract and the read-only facade
//!
//! The gate never owns storage. It talks to a [`Collection`] supplied by the
//! data-access layer, reached through a [`ReadOnlyFacade`] that holds an
//! explicit reference to its backing collection.

use crate::error::{GateError, GateResult};
use crate::gate::AccessGate;
use std::fmt::Debug;
use std::sync::Arc;

/// Record exposed through a read-only collection
pub trait ReadOnlyEntity: Clone + Send + Sync + 'static {
    /// Identity key
    type Key: Ord + Clone + Debug + Send + Sync + 'static;

    /// Identity of this record
    fn key(&self) -> Self::Key;
}

/// Key type of a collection's entities
pub type KeyOf<C> = <<C as Collection>::Entity as ReadOnlyEntity>::Key;

/// Mutable collection owned by the data-access layer
///
/// Mutations are staged until [`Collection::save`]; the gate never calls
/// `save` on the caller's behalf.
pub trait Collection: Send + Sync {
    /// Stored record type
    type Entity: ReadOnlyEntity;
    /// Store error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stage a new record
    fn add(&self, entity: Self::Entity) -> Result<(), Self::Error>;

    /// Stage a replacement for an existing record
    fn update(&self, entity: Self::Entity) -> Result<(), Self::Error>;

    /// Stage removal, returning the removed record if it existed
    fn remove(
        &self,
        key: &<Self::Entity as ReadOnlyEntity>::Key,
    ) -> Result<Option<Self::Entity>, Self::Error>;

    /// Look up a record by key
    fn get(&self, key: &<Self::Entity as ReadOnlyEntity>::Key) -> Option<Self::Entity>;

    /// Snapshot of every record
    fn all(&self) -> Vec<Self::Entity>;

    /// Commit staged changes, returning how many were written
    fn save(&self) -> Result<usize, Self::Error>;
}

/// Collection with an asynchronous add path
#[async_trait::async_trait]
pub trait AsyncCollection: Collection {
    /// Stage a new record asynchronously
    async fn add_async(&self, entity: Self::Entity) -> Result<(), Self::Error> {
        self.add(entity)
    }
}

/// Read-only view over a mutable collection
pub trait ReadOnlyFacade {
    /// Backing collection type
    type Backing: Collection;

    /// Backing collection; `None` is a wiring defect
    fn backing(&self) -> Option<&Self::Backing>;

    /// Gate enforcing this facade's mutations
    fn gate(&self) -> &AccessGate;
}

/// Entity type behind a facade
pub type EntityOf<R> = <<R as ReadOnlyFacade>::Backing as Collection>::Entity;

/// Backing collection of `facade`, or `CollaboratorAccessFailure`
pub(crate) fn backing_of<R: ReadOnlyFacade>(facade: &R) -> GateResult<&R::Backing> {
    facade.backing().ok_or_else(|| {
        GateError::collaborator_access(format!(
            "{} exposes no backing collection",
            std::any::type_name::<R>()
        ))
    })
}

/// Read-only facade over an injected backing collection
///
/// Reads go straight to the backing collection. Every mutator passes
/// [`AccessGate::guard_mutation`] first.
#[derive(Debug)]
pub struct ReadOnlySet<C> {
    backing: Arc<C>,
    gate: AccessGate,
}

impl<C> Clone for ReadOnlySet<C> {
    fn clone(&self) -> Self {
        Self {
            backing: Arc::clone(&self.backing),
            gate: self.gate.clone(),
        }
    }
}

impl<C: Collection> ReadOnlySet<C> {
    /// Wrap `backing`, enforcing mutations through `gate`
    pub fn new(backing: Arc<C>, gate: AccessGate) -> Self {
        Self { backing, gate }
    }

    /// Look up a record by key
    pub fn get(&self, key: &KeyOf<C>) -> Option<C::Entity> {
        self.backing.get(key)
    }

    /// Snapshot of every record
    pub fn all(&self) -> Vec<C::Entity> {
        self.backing.all()
    }

    /// Records matching `predicate`
    pub fn find<P>(&self, mut predicate: P) -> Vec<C::Entity>
    where
        P: FnMut(&C::Entity) -> bool,
    {
        self.backing
            .all()
            .into_iter()
            .filter(|e| predicate(e))
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.backing.all().len()
    }

    /// Check if there are no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a record
    ///
    /// # Errors
    /// `ReadOnlyViolation` unless the gate permits mutation; store errors
    /// come back as `Collaborator`.
    pub fn add(&self, entity: C::Entity) -> GateResult<()> {
        self.gate.guard_mutation(&describe::<C>("add"))?;
        self.backing.add(entity).map_err(GateError::collaborator)
    }

    /// Add several records under one guard check, returning how many were staged
    ///
    /// # Errors
    /// As [`ReadOnlySet::add`]; records before a failing one stay staged.
    pub fn add_many<I>(&self, entities: I) -> GateResult<usize>
    where
        I: IntoIterator<Item = C::Entity>,
    {
        self.gate.guard_mutation(&describe::<C>("add_many"))?;
        let mut staged = 0;
        for entity in entities {
            self.backing.add(entity).map_err(GateError::collaborator)?;
            staged += 1;
        }
        Ok(staged)
    }

    /// Replace a record
    ///
    /// # Errors
    /// As [`ReadOnlySet::add`].
    pub fn update(&self, entity: C::Entity) -> GateResult<()> {
        self.gate.guard_mutation(&describe::<C>("update"))?;
        self.backing.update(entity).map_err(GateError::collaborator)
    }

    /// Remove a record
    ///
    /// # Errors
    /// As [`ReadOnlySet::add`].
    pub fn remove(&self, key: &KeyOf<C>) -> GateResult<Option<C::Entity>> {
        self.gate.guard_mutation(&describe::<C>("remove"))?;
        self.backing.remove(key).map_err(GateError::collaborator)
    }

    /// Remove several records, returning how many existed
    ///
    /// # Errors
    /// As [`ReadOnlySet::add`].
    pub fn remove_many<'k, I>(&self, keys: I) -> GateResult<usize>
    where
        I: IntoIterator<Item = &'k KeyOf<C>>,
    {
        self.gate.guard_mutation(&describe::<C>("remove_many"))?;
        let mut removed = 0;
        for key in keys {
            if self
                .backing
                .remove(key)
                .map_err(GateError::collaborator)?
                .is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Seed one record built by `factory`
    ///
    /// # Errors
    /// See [`AccessGate::create_guarded`].
    pub fn create<F>(&self, factory: F) -> GateResult<C::Entity>
    where
        F: FnOnce() -> C::Entity,
    {
        self.gate().create_guarded(self, Some(factory))
    }

    /// Seed every record built by `factory`
    ///
    /// # Errors
    /// See [`AccessGate::create_many_guarded`].
    pub fn create_many<F, I>(&self, factory: F) -> GateResult<Vec<C::Entity>>
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = C::Entity>,
    {
        self.gate().create_many_guarded(self, Some(factory))
    }

    /// The backing collection, for commits
    pub fn inner(&self) -> &Arc<C> {
        &self.backing
    }
}

impl<C: AsyncCollection> ReadOnlySet<C> {
    /// Seed one record, staging it through the async add path
    ///
    /// # Errors
    /// See [`AccessGate::create_guarded_async`].
    pub async fn create_async<F>(&self, factory: F) -> GateResult<C::Entity>
    where
        F: FnOnce() -> C::Entity + Send,
    {
        self.gate().create_guarded_async(self, Some(factory)).await
    }

    /// Seed every record built by `factory` through the async add path
    ///
    /// # Errors
    /// See [`AccessGate::create_many_guarded_async`].
    pub async fn create_many_async<F, I>(&self, factory: F) -> GateResult<Vec<C::Entity>>
    where
        F: FnOnce() -> I + Send,
        I: IntoIterator<Item = C::Entity>,
    {
        self.gate().create_many_guarded_async(self, Some(factory)).await
    }
}

impl<C: Collection> ReadOnlyFacade for ReadOnlySet<C> {
    type Backing = C;

    fn backing(&self) -> Option<&C> {
        Some(self.backing.as_ref())
    }

    fn gate(&self) -> &AccessGate {
        &self.gate
    }
}

fn describe<C: Collection>(operation: &str) -> String {
    format!("{operation} {}", short_type_name::<C::Entity>())
}

/// `app::model::Company` → `Company`
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
        assert_eq!(short_type_name::<u32>(), "u32");
    }
}
