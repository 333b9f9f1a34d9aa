use std::collections::HashMap;
use std::sync::RwLock;

use depot_core::{DomainError, Entity};

/// Keyed record table for one entity type.
///
/// Reads clone records out; writers replace whole records. Lock poisoning is
/// surfaced as `DomainError::Internal`.
#[derive(Debug)]
pub struct EntityTable<E: Entity> {
    inner: RwLock<HashMap<E::Id, E>>,
}

impl<E: Entity> Default for EntityTable<E> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> EntityTable<E>
where
    E: Entity + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: E::Id) -> Result<Option<E>, DomainError> {
        let map = self.inner.read().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        Ok(map.get(&id).cloned())
    }

    /// Like [`get`](Self::get), but a missing record is `NotFound`.
    pub fn require(&self, id: E::Id) -> Result<E, DomainError> {
        self.get(id)?.ok_or(DomainError::NotFound(E::MODEL_NAME))
    }

    pub fn contains(&self, id: E::Id) -> Result<bool, DomainError> {
        let map = self.inner.read().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        Ok(map.contains_key(&id))
    }

    /// Insert `record` if `check` accepts it.
    ///
    /// `check` runs under the write lock and sees every existing record; it is
    /// where uniqueness is enforced and the audit entry is written. Nothing is
    /// stored when it fails.
    pub fn insert_with<F>(&self, record: E, check: F) -> Result<E, DomainError>
    where
        F: FnOnce(&E, &HashMap<E::Id, E>) -> Result<(), DomainError>,
    {
        let mut map = self.inner.write().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        check(&record, &*map)?;
        map.insert(record.id(), record.clone());
        Ok(record)
    }

    /// Run `f` against a copy of the stored record and keep the result only
    /// if `f` succeeds.
    pub fn update<F>(&self, id: E::Id, f: F) -> Result<E, DomainError>
    where
        F: FnOnce(&mut E, &HashMap<E::Id, E>) -> Result<(), DomainError>,
    {
        let mut map = self.inner.write().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        let mut draft = map.get(&id).cloned().ok_or(DomainError::NotFound(E::MODEL_NAME))?;
        f(&mut draft, &*map)?;
        map.insert(id, draft.clone());
        Ok(draft)
    }

    /// Remove the record if `check` accepts it.
    pub fn remove_with<F>(&self, id: E::Id, check: F) -> Result<E, DomainError>
    where
        F: FnOnce(&E, &HashMap<E::Id, E>) -> Result<(), DomainError>,
    {
        let mut map = self.inner.write().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        let record = map.get(&id).ok_or(DomainError::NotFound(E::MODEL_NAME))?;
        check(record, &*map)?;
        map.remove(&id).ok_or(DomainError::NotFound(E::MODEL_NAME))
    }

    /// Remove every record matching `pred`, returning what was removed.
    pub fn remove_where<F>(&self, pred: F) -> Result<Vec<E>, DomainError>
    where
        F: Fn(&E) -> bool,
    {
        let mut map = self.inner.write().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        let doomed: Vec<E::Id> = map.values().filter(|e| pred(e)).map(|e| e.id()).collect();
        Ok(doomed.into_iter().filter_map(|id| map.remove(&id)).collect())
    }

    /// Apply `f` to every record matching `pred`; returns how many were touched.
    pub fn update_where<P, F>(&self, pred: P, mut f: F) -> Result<usize, DomainError>
    where
        P: Fn(&E) -> bool,
        F: FnMut(&mut E),
    {
        let mut map = self.inner.write().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        let mut touched = 0;
        for record in map.values_mut().filter(|e| pred(e)) {
            f(record);
            touched += 1;
        }
        Ok(touched)
    }

    pub fn list(&self) -> Result<Vec<E>, DomainError> {
        self.filter(|_| true)
    }

    pub fn filter<F>(&self, pred: F) -> Result<Vec<E>, DomainError>
    where
        F: Fn(&E) -> bool,
    {
        let map = self.inner.read().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        Ok(map.values().filter(|e| pred(e)).cloned().collect())
    }

    pub fn count(&self) -> Result<usize, DomainError> {
        let map = self.inner.read().map_err(|_| DomainError::poisoned(E::MODEL_NAME))?;
        Ok(map.len())
    }
}
