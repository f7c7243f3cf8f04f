//! Named SQLite connections.
//!
//! [`Database`] is the relational query capability the built-in drivers run
//! against. Each connection sits behind its own `Mutex`; statements are
//! prepared through the connection's statement cache and logged at `debug`
//! level. An opt-in query log records every statement with its bindings.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use modelprefs_core::PreferenceError;

use crate::schema;

/// Name of the connection used when none is given.
pub const DEFAULT_CONNECTION: &str = "default";

/// One statement recorded by the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub connection: String,
    pub sql: String,
    pub bindings: Vec<SqlValue>,
}

/// A set of named SQLite connections.
pub struct Database {
    default: String,
    connections: DashMap<String, Arc<Mutex<Connection>>>,
    query_log: Mutex<Option<Vec<LoggedQuery>>>,
}

impl Database {
    /// Creates a database with no connections.
    pub fn new() -> Self {
        Database {
            default: DEFAULT_CONNECTION.to_string(),
            connections: DashMap::new(),
            query_log: Mutex::new(None),
        }
    }

    /// Opens (or creates) a file-backed default connection at `path`.
    pub fn open(path: &str) -> Result<Self, PreferenceError> {
        let db = Database::new();
        db.add_connection(DEFAULT_CONNECTION, schema::open_database(path)?);
        Ok(db)
    }

    /// Opens an in-memory default connection (for testing).
    pub fn open_in_memory() -> Result<Self, PreferenceError> {
        let db = Database::new();
        db.add_connection(DEFAULT_CONNECTION, schema::open_in_memory()?);
        Ok(db)
    }

    /// Uses `name` when no connection is requested.
    pub fn with_default_connection(mut self, name: impl Into<String>) -> Self {
        self.default = name.into();
        self
    }

    pub fn default_connection(&self) -> &str {
        &self.default
    }

    /// Registers (or replaces) a named connection.
    pub fn add_connection(&self, name: impl Into<String>, conn: Connection) {
        self.connections
            .insert(name.into(), Arc::new(Mutex::new(conn)));
    }

    pub fn has_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Runs `f` with exclusive access to a connection.
    pub fn with_connection<T, F>(&self, connection: Option<&str>, f: F) -> Result<T, PreferenceError>
    where
        F: FnOnce(&Connection) -> Result<T, PreferenceError>,
    {
        let handle = self.connection(connection)?;
        let conn = lock(&handle);
        f(&conn)
    }

    /// Executes a statement, returning the number of changed rows.
    pub fn execute(
        &self,
        connection: Option<&str>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<usize, PreferenceError> {
        self.run(connection, sql, params, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            stmt.execute(params_from_iter(params.iter()))
        })
    }

    /// Runs a query and maps every row.
    pub fn query<T, F>(
        &self,
        connection: Option<&str>,
        sql: &str,
        params: &[SqlValue],
        mut map: F,
    ) -> Result<Vec<T>, PreferenceError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(connection, sql, params, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| map(row))?;
            rows.collect()
        })
    }

    /// Runs a query and maps the first row, if any.
    pub fn query_optional<T, F>(
        &self,
        connection: Option<&str>,
        sql: &str,
        params: &[SqlValue],
        map: F,
    ) -> Result<Option<T>, PreferenceError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(connection, sql, params, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            stmt.query_row(params_from_iter(params.iter()), map)
                .optional()
        })
    }

    /// Whether `sql` (a SELECT) returns at least one row.
    pub fn exists(
        &self,
        connection: Option<&str>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<bool, PreferenceError> {
        let wrapped = format!("SELECT EXISTS({sql})");
        self.run(connection, &wrapped, params, |conn| {
            let mut stmt = conn.prepare_cached(&wrapped)?;
            stmt.query_row(params_from_iter(params.iter()), |row| row.get(0))
        })
    }

    /// Starts recording statements.
    pub fn enable_query_log(&self) {
        let mut log = self.log();
        if log.is_none() {
            *log = Some(Vec::new());
        }
    }

    /// Stops recording and drops the recorded statements.
    pub fn disable_query_log(&self) {
        *self.log() = None;
    }

    /// The statements recorded since the log was enabled or flushed.
    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.log().clone().unwrap_or_default()
    }

    /// Clears the recorded statements, keeping the log enabled.
    pub fn flush_query_log(&self) {
        if let Some(log) = self.log().as_mut() {
            log.clear();
        }
    }

    fn connection(&self, name: Option<&str>) -> Result<Arc<Mutex<Connection>>, PreferenceError> {
        let name = name.unwrap_or(&self.default);
        self.connections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PreferenceError::ConnectionNotConfigured(name.to_string()))
    }

    fn run<T, F>(
        &self,
        connection: Option<&str>,
        sql: &str,
        params: &[SqlValue],
        f: F,
    ) -> Result<T, PreferenceError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let name = connection.unwrap_or(&self.default);
        let handle = self.connection(Some(name))?;

        debug!(connection = name, sql, bindings = params.len(), "running statement");
        if let Some(log) = self.log().as_mut() {
            log.push(LoggedQuery {
                connection: name.to_string(),
                sql: sql.to_string(),
                bindings: params.to_vec(),
            });
        }

        let conn = lock(&handle);
        f(&conn).map_err(db_err)
    }

    fn log(&self) -> MutexGuard<'_, Option<Vec<LoggedQuery>>> {
        self.query_log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("Database")
            .field("default", &self.default)
            .field("connections", &names)
            .finish_non_exhaustive()
    }
}

fn lock(handle: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Maps a rusqlite error into the preference error type.
pub(crate) fn db_err(err: rusqlite::Error) -> PreferenceError {
    PreferenceError::storage(err)
}
