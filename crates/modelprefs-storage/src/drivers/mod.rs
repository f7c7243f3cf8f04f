//! The built-in SQLite drivers and their registration.

pub mod column;
pub mod shared;
pub mod table;

mod rows;

use std::sync::Arc;

use modelprefs_core::{PreferenceDriver, PreferencesManager, StoreDriver};

use crate::database::Database;

pub use column::ColumnDriver;
pub use shared::SharedTableDriver;
pub use table::TableDriver;

/// Registers the `column`, `shared` and `table` drivers on `manager`.
///
/// Each is built lazily on first use, over the same `db`.
pub fn register_builtin_drivers(manager: &PreferencesManager, db: Arc<Database>) {
    let column_db = db.clone();
    manager.extend(StoreDriver::Column.as_str(), move |_| {
        Ok(Arc::new(ColumnDriver::new(column_db.clone())) as Arc<dyn PreferenceDriver>)
    });

    let shared_db = db.clone();
    manager.extend(StoreDriver::Shared.as_str(), move |settings| {
        Ok(Arc::new(SharedTableDriver::new(shared_db.clone(), settings.clone()))
            as Arc<dyn PreferenceDriver>)
    });

    manager.extend(StoreDriver::Table.as_str(), move |settings| {
        Ok(Arc::new(TableDriver::new(db.clone(), settings.clone())) as Arc<dyn PreferenceDriver>)
    });
}
