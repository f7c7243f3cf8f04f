//! Statements shared by the row-per-preference layouts.
//!
//! A [`RowTarget`] names the table, the connection and the owner columns
//! (`model_id`, or `preferable_type` + `preferable_id`). Every batch
//! operation is one statement; empty batches issue none.
//!
//! Batches bind their keys or pairs as a single JSON array expanded with
//! `json_each`, so statement size and bound variable count do not grow
//! with the batch.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use modelprefs_core::{PreferenceError, PreferenceRead, Preferences};

use crate::codec;
use crate::database::Database;
use crate::schema::quote_identifier;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Membership test against a bound JSON array of keys.
const KEYS: &str = "(SELECT value FROM json_each(?))";

/// The rows of one owner in one preference table.
pub(crate) struct RowTarget {
    connection: Option<String>,
    table: String,
    owner: Vec<(&'static str, SqlValue)>,
}

impl RowTarget {
    pub(crate) fn new(
        connection: Option<String>,
        table: &str,
        owner: Vec<(&'static str, SqlValue)>,
    ) -> Self {
        RowTarget {
            connection,
            table: quote_identifier(table),
            owner,
        }
    }

    pub(crate) fn all(&self, db: &Database) -> Result<Preferences, PreferenceError> {
        let sql = format!(
            "SELECT \"key\", value FROM {} WHERE {} ORDER BY id",
            self.table,
            self.owner_filter()
        );
        let rows = db.query(self.connection(), &sql, &self.owner_bindings(), key_value)?;
        decode_rows(rows)
    }

    pub(crate) fn clear(&self, db: &Database) -> Result<(), PreferenceError> {
        let sql = format!("DELETE FROM {} WHERE {}", self.table, self.owner_filter());
        db.execute(self.connection(), &sql, &self.owner_bindings())?;
        Ok(())
    }

    pub(crate) fn delete(&self, db: &Database, keys: &[String]) -> Result<(), PreferenceError> {
        if keys.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE {} AND \"key\" IN {KEYS}",
            self.table,
            self.owner_filter()
        );
        db.execute(self.connection(), &sql, &self.bindings([key_payload(keys)?]))?;
        Ok(())
    }

    pub(crate) fn get_with_presence(
        &self,
        db: &Database,
        key: &str,
    ) -> Result<PreferenceRead, PreferenceError> {
        let sql = format!(
            "SELECT value FROM {} WHERE {} AND \"key\" = ?",
            self.table,
            self.owner_filter()
        );
        let row = db.query_optional(
            self.connection(),
            &sql,
            &self.bindings([SqlValue::Text(key.to_string())]),
            |row| row.get::<_, Option<String>>(0),
        )?;
        match row {
            Some(raw) => Ok(PreferenceRead::present(codec::decode(raw)?)),
            None => Ok(PreferenceRead::missing()),
        }
    }

    pub(crate) fn get_multiple(
        &self,
        db: &Database,
        keys: &[String],
    ) -> Result<Preferences, PreferenceError> {
        if keys.is_empty() {
            return Ok(Preferences::new());
        }
        let sql = format!(
            "SELECT \"key\", value FROM {} WHERE {} AND \"key\" IN {KEYS} ORDER BY id",
            self.table,
            self.owner_filter()
        );
        let rows = db.query(
            self.connection(),
            &sql,
            &self.bindings([key_payload(keys)?]),
            key_value,
        )?;
        decode_rows(rows)
    }

    pub(crate) fn has(&self, db: &Database, key: &str) -> Result<bool, PreferenceError> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} AND \"key\" = ?",
            self.table,
            self.owner_filter()
        );
        db.exists(
            self.connection(),
            &sql,
            &self.bindings([SqlValue::Text(key.to_string())]),
        )
    }

    /// Upserts every pair in one `INSERT ... SELECT ... ON CONFLICT`
    /// statement over a `[[key, encoded value], ...]` payload.
    pub(crate) fn upsert(&self, db: &Database, values: &Preferences) -> Result<(), PreferenceError> {
        if values.is_empty() {
            return Ok(());
        }

        let owner_columns = self
            .owner
            .iter()
            .map(|(column, _)| *column)
            .collect::<Vec<_>>()
            .join(", ");
        // WHERE true keeps SQLite from reading ON CONFLICT as a join constraint.
        let sql = format!(
            "INSERT INTO {table} ({owner_columns}, \"key\", value, created_at, updated_at) \
             SELECT {owner}, json_extract(entry.value, '$[0]'), \
             json_extract(entry.value, '$[1]'), {NOW}, {NOW} \
             FROM json_each(?) AS entry WHERE true \
             ON CONFLICT({owner_columns}, \"key\") DO UPDATE SET \
             value = excluded.value, updated_at = excluded.updated_at",
            table = self.table,
            owner = placeholders(self.owner.len()),
        );

        let pairs = values
            .iter()
            .map(|(key, value)| {
                let encoded = codec::encode(value)?;
                Ok(Value::Array(vec![Value::String(key.clone()), Value::String(encoded)]))
            })
            .collect::<Result<Vec<Value>, PreferenceError>>()?;
        let payload = SqlValue::Text(serde_json::to_string(&pairs)?);

        db.execute(self.connection(), &sql, &self.bindings([payload]))?;
        Ok(())
    }

    fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    fn owner_filter(&self) -> String {
        self.owner
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn owner_bindings(&self) -> Vec<SqlValue> {
        self.owner.iter().map(|(_, value)| value.clone()).collect()
    }

    fn bindings(&self, extra: impl IntoIterator<Item = SqlValue>) -> Vec<SqlValue> {
        self.owner
            .iter()
            .map(|(_, value)| value.clone())
            .chain(extra)
            .collect()
    }
}

fn key_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn decode_rows(rows: Vec<(String, Option<String>)>) -> Result<Preferences, PreferenceError> {
    let mut preferences = Preferences::with_capacity(rows.len());
    for (key, raw) in rows {
        let value: Value = codec::decode(raw)?;
        preferences.insert(key, value);
    }
    Ok(preferences)
}

fn key_payload(keys: &[String]) -> Result<SqlValue, PreferenceError> {
    Ok(SqlValue::Text(serde_json::to_string(keys)?))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
