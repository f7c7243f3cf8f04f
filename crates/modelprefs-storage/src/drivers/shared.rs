//! One polymorphic preference table for every owner type.
//!
//! Rows are keyed by `(preferable_type, preferable_id, key)`. The table and
//! connection come from `model-preferences.stores.shared.*`, read on every
//! call so runtime overrides apply immediately.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use modelprefs_core::{
    OwnerScope, PreferenceDriver, PreferenceError, PreferenceRead, Preferences,
    PresenceAwarePreferenceDriver, Settings,
};

use crate::database::Database;
use crate::drivers::rows::RowTarget;

/// Stores each preference as a row of the shared table.
pub struct SharedTableDriver {
    db: Arc<Database>,
    settings: Settings,
}

impl SharedTableDriver {
    pub fn new(db: Arc<Database>, settings: Settings) -> Self {
        SharedTableDriver { db, settings }
    }

    fn target(&self, scope: &OwnerScope<'_>) -> Result<RowTarget, PreferenceError> {
        Ok(RowTarget::new(
            self.settings.shared_connection()?,
            &self.settings.shared_table()?,
            vec![
                ("preferable_type", SqlValue::Text(scope.owner_type().to_string())),
                ("preferable_id", SqlValue::Integer(scope.owner_key())),
            ],
        ))
    }
}

impl PreferenceDriver for SharedTableDriver {
    fn all(&self, scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError> {
        self.target(scope)?.all(&self.db)
    }

    fn clear(&self, scope: &mut OwnerScope<'_>) -> Result<(), PreferenceError> {
        self.target(scope)?.clear(&self.db)
    }

    fn delete(&self, scope: &mut OwnerScope<'_>, key: &str) -> Result<(), PreferenceError> {
        self.target(scope)?.delete(&self.db, &[key.to_string()])
    }

    fn delete_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        keys: &[String],
    ) -> Result<(), PreferenceError> {
        self.target(scope)?.delete(&self.db, keys)
    }

    fn get(&self, scope: &OwnerScope<'_>, key: &str) -> Result<Value, PreferenceError> {
        Ok(self.get_with_presence(scope, key)?.into_value())
    }

    fn get_multiple(
        &self,
        scope: &OwnerScope<'_>,
        keys: &[String],
    ) -> Result<Preferences, PreferenceError> {
        self.target(scope)?.get_multiple(&self.db, keys)
    }

    fn has(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError> {
        self.target(scope)?.has(&self.db, key)
    }

    fn set(
        &self,
        scope: &mut OwnerScope<'_>,
        key: &str,
        value: Value,
    ) -> Result<(), PreferenceError> {
        let mut values = Preferences::with_capacity(1);
        values.insert(key.to_string(), value);
        self.target(scope)?.upsert(&self.db, &values)
    }

    fn set_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        values: Preferences,
    ) -> Result<(), PreferenceError> {
        self.target(scope)?.upsert(&self.db, &values)
    }

    fn as_presence_aware(&self) -> Option<&dyn PresenceAwarePreferenceDriver> {
        Some(self)
    }
}

impl PresenceAwarePreferenceDriver for SharedTableDriver {
    fn get_with_presence(
        &self,
        scope: &OwnerScope<'_>,
        key: &str,
    ) -> Result<PreferenceRead, PreferenceError> {
        self.target(scope)?.get_with_presence(&self.db, key)
    }
}
