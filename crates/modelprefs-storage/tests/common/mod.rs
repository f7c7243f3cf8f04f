//! Shared owners and database harness for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde_json::{json, Value};

use modelprefs_core::settings::DEFAULT_DRIVER_KEY;
use modelprefs_core::{
    HasPreferenceConfig, MapConfig, Preferable, PreferenceError, PreferencesConfig,
    PreferencesManager, Rule, Settings, StoreDriver,
};
use modelprefs_storage::{preferences_manager, schema, Database};

/// The owner kinds the tests exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Defaults + rules, follows the configured default driver.
    User,
    /// Always the table driver, `teams_preferences`.
    Team,
    /// Always the shared driver, no defaults.
    Shared,
    /// Column driver with an empty column name.
    InvalidColumn,
    /// Table driver without a table name.
    InvalidTable,
    /// No preference capability at all.
    Plain,
}

/// A loaded database row that can own preferences.
#[derive(Debug, Clone)]
pub struct Model {
    pub profile: Profile,
    pub id: i64,
    attributes: HashMap<String, Value>,
}

impl Model {
    pub fn new(profile: Profile, id: i64) -> Self {
        Model {
            profile,
            id,
            attributes: HashMap::new(),
        }
    }

    pub fn user(id: i64) -> Self {
        Model::new(Profile::User, id)
    }

    pub fn team(id: i64) -> Self {
        Model::new(Profile::Team, id)
    }

    pub fn shared(id: i64) -> Self {
        Model::new(Profile::Shared, id)
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

impl Preferable for Model {
    fn owner_type(&self) -> &str {
        match self.profile {
            Profile::User | Profile::InvalidColumn | Profile::InvalidTable | Profile::Plain => "user",
            Profile::Team => "team",
            Profile::Shared => "shared_preferences_model",
        }
    }

    fn owner_key(&self) -> i64 {
        self.id
    }

    fn owner_table(&self) -> &str {
        match self.profile {
            Profile::Team => "teams",
            Profile::Shared => "shared_preferences_models",
            _ => "users",
        }
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn preference_config(&self) -> Option<&dyn HasPreferenceConfig> {
        match self.profile {
            Profile::Plain => None,
            _ => Some(self),
        }
    }
}

impl HasPreferenceConfig for Model {
    fn preferences_config(&self, settings: &Settings) -> Result<PreferencesConfig, PreferenceError> {
        let config = PreferencesConfig::configure(settings)?;
        Ok(match self.profile {
            Profile::User => {
                let config = config
                    .with_defaults([("notifications", json!(true)), ("theme", json!("system"))])
                    .with_rules([
                        ("notifications", Rule::Boolean),
                        ("theme", Rule::in_values(["dark", "light", "system"])),
                    ]);
                if config.store_driver() == Some(StoreDriver::Table) {
                    config.with_table("users_preferences")
                } else {
                    config
                }
            }
            Profile::Team => config
                .with_driver(StoreDriver::Table)
                .with_table("teams_preferences"),
            Profile::Shared => config.with_driver(StoreDriver::Shared),
            Profile::InvalidColumn => config.with_driver(StoreDriver::Column).with_column(""),
            Profile::InvalidTable => config.with_driver(StoreDriver::Table),
            Profile::Plain => config,
        })
    }
}

/// An in-memory database with every test table, a config and a manager.
pub struct Harness {
    pub db: Arc<Database>,
    pub config: Arc<MapConfig>,
    pub manager: PreferencesManager,
}

impl Harness {
    pub fn new() -> Self {
        Harness::with_driver(StoreDriver::Shared.as_str())
    }

    pub fn with_driver(default: &str) -> Self {
        let db = Database::open_in_memory().unwrap();
        create_tables(&db, None);
        Harness::over(Arc::new(db), default)
    }

    /// Wraps an existing database; tables must already exist.
    pub fn over(db: Arc<Database>, default: &str) -> Self {
        let config = Arc::new(MapConfig::defaults());
        config.set(DEFAULT_DRIVER_KEY, default);
        let manager = preferences_manager(Settings::new(config.clone()), db.clone());
        Harness {
            db,
            config,
            manager,
        }
    }

    /// Inserts an owner row and returns the freshly loaded model.
    pub fn create(&self, profile: Profile, id: i64) -> Model {
        let model = Model::new(profile, id);
        let sql = format!(
            "INSERT INTO {} (id) VALUES (?)",
            schema::quote_identifier(model.owner_table())
        );
        self.db.execute(None, &sql, &[SqlValue::Integer(id)]).unwrap();
        self.load(profile, id)
    }

    /// Loads an owner row the way a model query would, with the stored
    /// preferences column as raw JSON text.
    pub fn load(&self, profile: Profile, id: i64) -> Model {
        let model = Model::new(profile, id);
        let sql = format!(
            "SELECT preferences FROM {} WHERE id = ?",
            schema::quote_identifier(model.owner_table())
        );
        let raw = self
            .db
            .query_optional(None, &sql, &[SqlValue::Integer(id)], |row| {
                row.get::<_, Option<String>>(0)
            })
            .unwrap()
            .flatten();
        model.with_attribute("preferences", raw.map(Value::String).unwrap_or(Value::Null))
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", schema::quote_identifier(table));
        self.db
            .query_optional(None, &sql, &[], |row| row.get(0))
            .unwrap()
            .unwrap_or(0)
    }
}

/// Creates the owner tables and every preference table on a connection.
pub fn create_tables(db: &Database, connection: Option<&str>) {
    db.with_connection(connection, |conn| {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT, preferences TEXT);
             CREATE TABLE IF NOT EXISTS teams (id INTEGER PRIMARY KEY, preferences TEXT);
             CREATE TABLE IF NOT EXISTS shared_preferences_models (id INTEGER PRIMARY KEY, preferences TEXT);",
        )
        .map_err(PreferenceError::storage)?;
        schema::create_shared_table(conn, "preferences")?;
        schema::create_owner_table(conn, "users_preferences")?;
        schema::create_owner_table(conn, "teams_preferences")
    })
    .unwrap();
}
