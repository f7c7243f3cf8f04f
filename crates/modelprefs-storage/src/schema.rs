//! Connection setup and preference table layouts for SQLite.
//!
//! Connections are opened with WAL journaling, `synchronous = NORMAL` and
//! foreign keys enabled. The DDL helpers create the table and shared
//! layouts with `CREATE TABLE IF NOT EXISTS`; they are setup conveniences,
//! not a migration runner.
//!
//! `value` columns are declared `TEXT` so SQLite keeps encoded JSON
//! verbatim. A `JSON` declared type would get numeric affinity and turn
//! `"1"` into an integer.

use rusqlite::Connection;

use modelprefs_core::PreferenceError;

use crate::database::db_err;

/// Opens (or creates) a SQLite database at `path` with the preference
/// pragmas applied.
pub fn open_database(path: &str) -> Result<Connection, PreferenceError> {
    let conn = Connection::open(path).map_err(db_err)?;
    configure(&conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database (WAL is a no-op in memory).
pub fn open_in_memory() -> Result<Connection, PreferenceError> {
    let conn = Connection::open_in_memory().map_err(db_err)?;
    configure(&conn)?;
    Ok(conn)
}

/// Applies the connection pragmas.
pub fn configure(conn: &Connection) -> Result<(), PreferenceError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err)?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(db_err)?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(db_err)?;
    Ok(())
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// DDL for a per-owner-type preference table.
pub fn owner_table_ddl(table: &str) -> String {
    let quoted = quote_identifier(table);
    format!(
        "CREATE TABLE IF NOT EXISTS {quoted} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_id INTEGER NOT NULL,
            \"key\" TEXT NOT NULL,
            value TEXT NULL,
            created_at TEXT,
            updated_at TEXT,
            UNIQUE (model_id, \"key\")
        );"
    )
}

/// DDL for the polymorphic preference table shared by every owner type.
pub fn shared_table_ddl(table: &str) -> String {
    let quoted = quote_identifier(table);
    let key_index = quote_identifier(&format!("{table}_key_index"));
    let owner_index = quote_identifier(&format!("{table}_preferable_index"));
    format!(
        "CREATE TABLE IF NOT EXISTS {quoted} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            preferable_type TEXT NOT NULL,
            preferable_id INTEGER NOT NULL,
            \"key\" TEXT NOT NULL,
            value TEXT NULL,
            created_at TEXT,
            updated_at TEXT,
            UNIQUE (preferable_type, preferable_id, \"key\")
        );
        CREATE INDEX IF NOT EXISTS {key_index} ON {quoted} (\"key\");
        CREATE INDEX IF NOT EXISTS {owner_index} ON {quoted} (preferable_type, preferable_id);"
    )
}

/// Creates a per-owner-type preference table if it does not exist.
pub fn create_owner_table(conn: &Connection, table: &str) -> Result<(), PreferenceError> {
    conn.execute_batch(&owner_table_ddl(table)).map_err(db_err)
}

/// Creates the shared preference table and its indexes if they do not exist.
pub fn create_shared_table(conn: &Connection, table: &str) -> Result<(), PreferenceError> {
    conn.execute_batch(&shared_table_ddl(table)).map_err(db_err)
}
