//! Configuration lookup for the preference layer.
//!
//! The core never owns configuration: it reads dotted keys through the
//! [`ConfigRepository`] capability. [`MapConfig`] is the in-process
//! implementation (a JSON tree with runtime overrides), and [`Settings`]
//! wraps any repository with typed accessors for the keys the drivers use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{json, Map, Value};

use crate::error::PreferenceError;

/// Key of the default store name.
pub const DEFAULT_DRIVER_KEY: &str = "model-preferences.default";
/// Key of the column driver's column name.
pub const COLUMN_NAME_KEY: &str = "model-preferences.stores.column.name";
/// Key of the shared driver's connection name.
pub const SHARED_CONNECTION_KEY: &str = "model-preferences.stores.shared.connection";
/// Key of the shared driver's table name.
pub const SHARED_TABLE_KEY: &str = "model-preferences.stores.shared.table";
/// Key of the table driver's connection name.
pub const TABLE_CONNECTION_KEY: &str = "model-preferences.stores.table.connection";

/// Generic key-value configuration lookup.
pub trait ConfigRepository: Send + Sync {
    /// Returns the value at a dotted key, or `None` when unset.
    fn get(&self, key: &str) -> Option<Value>;
}

/// A JSON-tree configuration source addressed by dotted keys.
#[derive(Debug, Default)]
pub struct MapConfig {
    root: RwLock<Value>,
}

impl MapConfig {
    /// Creates a repository over an existing JSON tree.
    pub fn new(root: Value) -> Self {
        MapConfig {
            root: RwLock::new(root),
        }
    }

    /// The package defaults: shared store, `preferences` column and table,
    /// default connections.
    pub fn defaults() -> Self {
        MapConfig::new(json!({
            "model-preferences": {
                "default": "shared",
                "stores": {
                    "column": {
                        "driver": "column",
                        "name": "preferences",
                    },
                    "table": {
                        "connection": null,
                        "driver": "table",
                    },
                    "shared": {
                        "connection": null,
                        "driver": "shared",
                        "table": "preferences",
                    },
                },
            },
        }))
    }

    /// The package defaults overridden by the process environment.
    pub fn from_env() -> Self {
        MapConfig::from_vars(std::env::vars())
    }

    /// The package defaults overridden by the given environment variables.
    ///
    /// Recognized: `MODEL_PREFERENCES_DRIVER`, `MODEL_PREFERENCES_COLUMN_NAME`,
    /// `MODEL_PREFERENCES_DB_CONNECTION` (falling back to `DB_CONNECTION`) and
    /// `MODEL_PREFERENCES_TABLE`.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let config = MapConfig::defaults();

        if let Some(driver) = vars.get("MODEL_PREFERENCES_DRIVER") {
            config.set(DEFAULT_DRIVER_KEY, driver.as_str());
        }
        if let Some(column) = vars.get("MODEL_PREFERENCES_COLUMN_NAME") {
            config.set(COLUMN_NAME_KEY, column.as_str());
        }
        let connection = vars
            .get("MODEL_PREFERENCES_DB_CONNECTION")
            .or_else(|| vars.get("DB_CONNECTION"));
        if let Some(connection) = connection {
            config.set(TABLE_CONNECTION_KEY, connection.as_str());
            config.set(SHARED_CONNECTION_KEY, connection.as_str());
        }
        if let Some(table) = vars.get("MODEL_PREFERENCES_TABLE") {
            config.set(SHARED_TABLE_KEY, table.as_str());
        }

        config
    }

    /// Sets the value at a dotted key, creating intermediate objects.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let mut node = &mut *root;
        for segment in key.split('.') {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return;
            };
            node = map.entry(segment.to_string()).or_insert(Value::Null);
        }
        *node = value.into();
    }
}

impl ConfigRepository for MapConfig {
    fn get(&self, key: &str) -> Option<Value> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let mut node = &*root;
        for segment in key.split('.') {
            node = node.as_object()?.get(segment)?;
        }
        Some(node.clone())
    }
}

/// Typed access to the preference configuration keys.
#[derive(Clone)]
pub struct Settings {
    repository: Arc<dyn ConfigRepository>,
}

impl Settings {
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Settings { repository }
    }

    /// Settings backed by [`MapConfig::defaults`].
    pub fn defaults() -> Self {
        Settings::new(Arc::new(MapConfig::defaults()))
    }

    /// The raw value at a dotted key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.repository.get(key)
    }

    /// The default store name.
    pub fn default_driver(&self) -> Result<String, PreferenceError> {
        self.string(DEFAULT_DRIVER_KEY)
    }

    /// The column name used by the column driver.
    pub fn column_name(&self) -> Result<String, PreferenceError> {
        self.string(COLUMN_NAME_KEY)
    }

    /// The connection used by the shared driver (`None` = default).
    pub fn shared_connection(&self) -> Result<Option<String>, PreferenceError> {
        self.nullable_string(SHARED_CONNECTION_KEY)
    }

    /// The table used by the shared driver.
    pub fn shared_table(&self) -> Result<String, PreferenceError> {
        self.string(SHARED_TABLE_KEY)
    }

    /// The connection used by the table driver (`None` = default).
    pub fn table_connection(&self) -> Result<Option<String>, PreferenceError> {
        self.nullable_string(TABLE_CONNECTION_KEY)
    }

    fn string(&self, key: &str) -> Result<String, PreferenceError> {
        match self.get(key) {
            Some(Value::String(value)) => Ok(value),
            other => Err(PreferenceError::InvalidConfigValue {
                key: key.to_string(),
                expected: "a string",
                given: type_name(other.as_ref()),
            }),
        }
    }

    fn nullable_string(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(PreferenceError::InvalidConfigValue {
                key: key.to_string(),
                expected: "a string or null",
                given: type_name(Some(&other)),
            }),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

/// Type name used in configuration error messages.
fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None | Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(n)) if n.is_f64() => "double",
        Some(Value::Number(_)) => "integer",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) | Some(Value::Object(_)) => "array",
    }
}
