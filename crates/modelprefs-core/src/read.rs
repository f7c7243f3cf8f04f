//! Presence-aware read results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of reading one preference from a presence-aware driver.
///
/// Distinguishes "key absent" from "key present with a null value". A missing
/// read always carries `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRead {
    exists: bool,
    value: Value,
}

impl PreferenceRead {
    /// A read for a key that is not stored.
    pub fn missing() -> Self {
        PreferenceRead {
            exists: false,
            value: Value::Null,
        }
    }

    /// A read for a stored key. `value` may be `Null`.
    pub fn present(value: Value) -> Self {
        PreferenceRead {
            exists: true,
            value,
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// `Some(value)` for a stored key, `None` when absent.
    pub fn into_option(self) -> Option<Value> {
        self.exists.then_some(self.value)
    }
}

impl From<Option<Value>> for PreferenceRead {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => PreferenceRead::present(value),
            None => PreferenceRead::missing(),
        }
    }
}
