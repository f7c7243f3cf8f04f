//! SQLite storage for model preferences.
//!
//! Provides the three built-in [`PreferenceDriver`](modelprefs_core::PreferenceDriver)
//! backends over `rusqlite`, plus the [`Database`] connection registry they
//! run against.
//!
//! # Modules
//!
//! - [`database`]: named connections, statement helpers and the query log
//! - [`schema`]: connection pragmas and preference table DDL
//! - [`codec`]: JSON TEXT encoding of stored values
//! - [`drivers`]: ColumnDriver, TableDriver, SharedTableDriver

pub mod codec;
pub mod database;
pub mod drivers;
pub mod schema;

use std::sync::Arc;

use modelprefs_core::{PreferencesManager, Settings};

pub use database::{Database, LoggedQuery, DEFAULT_CONNECTION};
pub use drivers::{register_builtin_drivers, ColumnDriver, SharedTableDriver, TableDriver};

/// A manager with the built-in drivers registered over `db`.
pub fn preferences_manager(settings: Settings, db: Arc<Database>) -> PreferencesManager {
    let manager = PreferencesManager::new(settings);
    register_builtin_drivers(&manager, db);
    manager
}
