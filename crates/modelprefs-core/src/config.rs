//! Per-owner preference configuration.
//!
//! [`PreferencesConfig`] is built fresh for each interaction: seeded from
//! [`Settings`] by [`PreferencesConfig::configure`], then customized by the
//! owner with the fluent `with_*` setters. No configuration object is shared
//! between owners.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::Preferences;
use crate::error::PreferenceError;
use crate::key::PreferenceKey;
use crate::rules::RuleSet;
use crate::settings::Settings;

/// The built-in storage strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Inline JSON column on the owner's own row.
    Column,
    /// One table shared by every owner type.
    Shared,
    /// One dedicated table per owner type.
    Table,
}

impl StoreDriver {
    pub const ALL: [StoreDriver; 3] = [StoreDriver::Column, StoreDriver::Shared, StoreDriver::Table];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreDriver::Column => "column",
            StoreDriver::Shared => "shared",
            StoreDriver::Table => "table",
        }
    }

    /// Whether preferences live outside the owner's row and need cleanup
    /// when the owner is deleted.
    pub fn stores_rows(&self) -> bool {
        matches!(self, StoreDriver::Shared | StoreDriver::Table)
    }
}

impl fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for StoreDriver {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for StoreDriver {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "column" => Ok(StoreDriver::Column),
            "shared" => Ok(StoreDriver::Shared),
            "table" => Ok(StoreDriver::Table),
            other => Err(PreferenceError::UnsupportedDriver(other.to_string())),
        }
    }
}

/// The preference configuration declared by one owner.
#[derive(Debug, Clone, Default)]
pub struct PreferencesConfig {
    column: Option<String>,
    defaults: Preferences,
    driver: Option<String>,
    rules: IndexMap<String, RuleSet>,
    table: Option<String>,
}

impl PreferencesConfig {
    /// Starts a configuration from the configured default driver and column.
    pub fn configure(settings: &Settings) -> Result<Self, PreferenceError> {
        Ok(PreferencesConfig {
            column: Some(settings.column_name()?),
            driver: Some(settings.default_driver()?),
            ..PreferencesConfig::default()
        })
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn defaults(&self) -> &Preferences {
        &self.defaults
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn rules(&self) -> &IndexMap<String, RuleSet> {
        &self.rules
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Looks up the default declared for a key. `Some(Null)` is a declared
    /// null default, distinct from `None`.
    pub fn default_for(&self, key: &str) -> Option<&Value> {
        self.defaults.get(key)
    }

    /// The declared driver parsed as a built-in, if it is one.
    pub fn store_driver(&self) -> Option<StoreDriver> {
        self.driver.as_deref().and_then(|d| d.parse().ok())
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Replaces the declared defaults.
    pub fn with_defaults<I, K, V>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: PreferenceKey,
        V: Into<Value>,
    {
        self.defaults = defaults
            .into_iter()
            .map(|(k, v)| (k.preference_key().to_string(), v.into()))
            .collect();
        self
    }

    /// Adds or replaces one default.
    pub fn with_default(mut self, key: impl PreferenceKey, value: impl Into<Value>) -> Self {
        self.defaults
            .insert(key.preference_key().to_string(), value.into());
        self
    }

    /// Accepts a [`StoreDriver`] or any custom driver name.
    pub fn with_driver(mut self, driver: impl AsRef<str>) -> Self {
        self.driver = Some(driver.as_ref().to_string());
        self
    }

    /// Replaces the declared rules.
    pub fn with_rules<I, K, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: PreferenceKey,
        R: Into<RuleSet>,
    {
        self.rules = rules
            .into_iter()
            .map(|(k, r)| (k.preference_key().to_string(), r.into()))
            .collect();
        self
    }

    /// Adds or replaces the rules for one key.
    pub fn with_rule(mut self, key: impl PreferenceKey, rules: impl Into<RuleSet>) -> Self {
        self.rules
            .insert(key.preference_key().to_string(), rules.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}
