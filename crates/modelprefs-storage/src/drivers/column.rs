//! Preferences inline in a JSON column of the owner's own row.
//!
//! Reads come from the owner's loaded attributes and never hit the
//! database. Every write rewrites the whole column with one `UPDATE` on the
//! owner's connection, then replaces the loaded attribute so later reads
//! see the new map without reloading the row.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use modelprefs_core::{OwnerScope, PreferenceDriver, PreferenceError, Preferences};

use crate::codec;
use crate::database::Database;
use crate::schema::quote_identifier;

/// Stores all preferences of an owner in one column of its row.
pub struct ColumnDriver {
    db: Arc<Database>,
}

impl ColumnDriver {
    pub fn new(db: Arc<Database>) -> Self {
        ColumnDriver { db }
    }

    fn column<'s>(scope: &'s OwnerScope<'_>) -> Result<&'s str, PreferenceError> {
        scope
            .config()
            .column()
            .filter(|column| !column.is_empty())
            .ok_or_else(|| PreferenceError::ColumnNotConfigured {
                table: scope.owner().owner_table().to_string(),
            })
    }

    fn load(scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError> {
        let column = Self::column(scope)?;
        Ok(codec::decode_column(scope.owner().attribute(column)))
    }

    fn save(&self, scope: &mut OwnerScope<'_>, preferences: Preferences) -> Result<(), PreferenceError> {
        let column = Self::column(scope)?.to_string();
        let owner = scope.owner();
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            quote_identifier(owner.owner_table()),
            quote_identifier(&column),
            quote_identifier(owner.key_name())
        );
        let bindings = [
            SqlValue::Text(codec::encode_column(&preferences)?),
            SqlValue::Integer(owner.owner_key()),
        ];
        self.db.execute(owner.connection_name(), &sql, &bindings)?;

        scope
            .owner_mut()
            .set_attribute(&column, Value::Object(preferences.into_iter().collect()));
        Ok(())
    }
}

impl PreferenceDriver for ColumnDriver {
    fn all(&self, scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError> {
        Self::load(scope)
    }

    fn clear(&self, scope: &mut OwnerScope<'_>) -> Result<(), PreferenceError> {
        self.save(scope, Preferences::new())
    }

    fn delete(&self, scope: &mut OwnerScope<'_>, key: &str) -> Result<(), PreferenceError> {
        let mut preferences = Self::load(scope)?;
        preferences.shift_remove(key);
        self.save(scope, preferences)
    }

    fn delete_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        keys: &[String],
    ) -> Result<(), PreferenceError> {
        let mut preferences = Self::load(scope)?;
        for key in keys {
            preferences.shift_remove(key);
        }
        self.save(scope, preferences)
    }

    fn get(&self, scope: &OwnerScope<'_>, key: &str) -> Result<Value, PreferenceError> {
        Ok(Self::load(scope)?.shift_remove(key).unwrap_or(Value::Null))
    }

    fn get_multiple(
        &self,
        scope: &OwnerScope<'_>,
        keys: &[String],
    ) -> Result<Preferences, PreferenceError> {
        let preferences = Self::load(scope)?;
        Ok(keys
            .iter()
            .filter_map(|key| preferences.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    fn has(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError> {
        Ok(Self::load(scope)?.contains_key(key))
    }

    fn set(
        &self,
        scope: &mut OwnerScope<'_>,
        key: &str,
        value: Value,
    ) -> Result<(), PreferenceError> {
        let mut preferences = Self::load(scope)?;
        preferences.insert(key.to_string(), value);
        self.save(scope, preferences)
    }

    fn set_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        values: Preferences,
    ) -> Result<(), PreferenceError> {
        let mut preferences = Self::load(scope)?;
        preferences.extend(values);
        self.save(scope, preferences)
    }
}
