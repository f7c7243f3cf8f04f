//! In-memory implementation of [`PreferenceDriver`].
//!
//! [`InMemoryDriver`] is a backend for tests, ephemeral sessions, and
//! anywhere persistence isn't needed. It keeps one ordered map per owner
//! identity with the same presence semantics as the SQL backends, but it
//! does not implement the presence-aware read, so callers go through the
//! plain `get` / `has` pair.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::driver::{PreferenceDriver, Preferences};
use crate::error::PreferenceError;
use crate::owner::OwnerScope;

/// Owner identity: (type discriminator, primary key).
type OwnerIdentity = (String, i64);

/// Mutex-guarded in-memory preference storage.
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    owners: Mutex<HashMap<OwnerIdentity, Preferences>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        InMemoryDriver::default()
    }

    /// Number of owners with at least one stored preference.
    pub fn owner_count(&self) -> usize {
        self.lock().values().filter(|p| !p.is_empty()).count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerIdentity, Preferences>> {
        self.owners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn identity(scope: &OwnerScope<'_>) -> OwnerIdentity {
        (scope.owner_type().to_string(), scope.owner_key())
    }
}

impl PreferenceDriver for InMemoryDriver {
    fn all(&self, scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError> {
        Ok(self
            .lock()
            .get(&Self::identity(scope))
            .cloned()
            .unwrap_or_default())
    }

    fn clear(&self, scope: &mut OwnerScope<'_>) -> Result<(), PreferenceError> {
        self.lock().remove(&Self::identity(scope));
        Ok(())
    }

    fn delete(&self, scope: &mut OwnerScope<'_>, key: &str) -> Result<(), PreferenceError> {
        if let Some(prefs) = self.lock().get_mut(&Self::identity(scope)) {
            prefs.shift_remove(key);
        }
        Ok(())
    }

    fn delete_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        keys: &[String],
    ) -> Result<(), PreferenceError> {
        if let Some(prefs) = self.lock().get_mut(&Self::identity(scope)) {
            for key in keys {
                prefs.shift_remove(key);
            }
        }
        Ok(())
    }

    fn get(&self, scope: &OwnerScope<'_>, key: &str) -> Result<Value, PreferenceError> {
        Ok(self
            .lock()
            .get(&Self::identity(scope))
            .and_then(|prefs| prefs.get(key))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn get_multiple(
        &self,
        scope: &OwnerScope<'_>,
        keys: &[String],
    ) -> Result<Preferences, PreferenceError> {
        let owners = self.lock();
        let Some(prefs) = owners.get(&Self::identity(scope)) else {
            return Ok(Preferences::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| prefs.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    fn has(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError> {
        Ok(self
            .lock()
            .get(&Self::identity(scope))
            .is_some_and(|prefs| prefs.contains_key(key)))
    }

    fn set(
        &self,
        scope: &mut OwnerScope<'_>,
        key: &str,
        value: Value,
    ) -> Result<(), PreferenceError> {
        self.lock()
            .entry(Self::identity(scope))
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        values: Preferences,
    ) -> Result<(), PreferenceError> {
        self.lock()
            .entry(Self::identity(scope))
            .or_default()
            .extend(values);
        Ok(())
    }
}
