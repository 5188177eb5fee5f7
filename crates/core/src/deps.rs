//! Typed dependency registry shared with tools.
//!
//! The caller builds a [`DependencyRegistry`] before a run. Tools name what
//! they need with a [`DependencyKey<T>`]; lookups check the stored value's
//! runtime type against `T`.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::DependencyError;

/// A named, typed slot in the registry.
pub struct DependencyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DependencyKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Send + Sync + 'static> DependencyKey<T> {
    /// The requirement a tool declares for this key.
    pub fn requirement(&self) -> DependencyRequirement {
        DependencyRequirement {
            key: self.name,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

impl<T> Clone for DependencyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DependencyKey<T> {}

impl<T> fmt::Debug for DependencyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyKey")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// A `(key, expected type)` pair, checked before any tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyRequirement {
    key: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl DependencyRequirement {
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

/// Read-only bag of caller-supplied values, keyed by name.
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    entries: HashMap<&'static str, Arc<Entry>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, replacing any previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &DependencyKey<T>, value: T) {
        self.entries.insert(
            key.name,
            Arc::new(Entry {
                value: Arc::new(value),
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
            }),
        );
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Send + Sync + 'static>(mut self, key: &DependencyKey<T>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value, failing with `NotFound` or `BadType`.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        key: &DependencyKey<T>,
    ) -> Result<&T, DependencyError> {
        let entry = self.entry(key.name)?;
        entry
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| DependencyError::BadType {
                key: key.name.to_string(),
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// Check a requirement without borrowing the value.
    pub fn verify(&self, requirement: &DependencyRequirement) -> Result<(), DependencyError> {
        let entry = self.entry(requirement.key)?;
        if entry.type_id != requirement.type_id {
            return Err(DependencyError::BadType {
                key: requirement.key.to_string(),
                expected: requirement.type_name,
                found: entry.type_name,
            });
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&Entry, DependencyError> {
        self.entries
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| DependencyError::NotFound {
                key: name.to_string(),
            })
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .map(|(name, entry)| (*name, entry.type_name))
            .collect();
        keys.sort_unstable();
        f.debug_struct("DependencyRegistry")
            .field("entries", &keys)
            .finish()
    }
}
