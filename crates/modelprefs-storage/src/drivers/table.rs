//! One preference table per owner type.
//!
//! The owner declares the table through `PreferencesConfig::with_table`.
//! Rows are keyed by `(model_id, key)`; the connection comes from
//! `model-preferences.stores.table.connection`, read on every call.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use modelprefs_core::{
    OwnerScope, PreferenceDriver, PreferenceError, PreferenceRead, Preferences,
    PresenceAwarePreferenceDriver, Settings,
};

use crate::database::Database;
use crate::drivers::rows::RowTarget;

/// Stores each preference as a row of the owner type's own table.
pub struct TableDriver {
    db: Arc<Database>,
    settings: Settings,
}

impl TableDriver {
    pub fn new(db: Arc<Database>, settings: Settings) -> Self {
        TableDriver { db, settings }
    }

    fn target(&self, scope: &OwnerScope<'_>) -> Result<RowTarget, PreferenceError> {
        let table = scope
            .config()
            .table()
            .filter(|table| !table.is_empty())
            .ok_or_else(|| PreferenceError::TableNotConfigured {
                table: scope.owner().owner_table().to_string(),
            })?;

        Ok(RowTarget::new(
            self.settings.table_connection()?,
            table,
            vec![("model_id", SqlValue::Integer(scope.owner_key()))],
        ))
    }
}

impl PreferenceDriver for TableDriver {
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

impl PresenceAwarePreferenceDriver for TableDriver {
    fn get_with_presence(
        &self,
        scope: &OwnerScope<'_>,
        key: &str,
    ) -> Result<PreferenceRead, PreferenceError> {
        self.target(scope)?.get_with_presence(&self.db, key)
    }
}
