//! The storage contract every preference backend implements.
//!
//! [`PreferenceDriver`] is the uniform surface over the physical layouts.
//! Backends that can tell "absent" from "stored null" in one query also
//! implement [`PresenceAwarePreferenceDriver`] and advertise it through
//! [`PreferenceDriver::as_presence_aware`].

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::PreferenceError;
use crate::owner::OwnerScope;
use crate::read::PreferenceRead;

/// Ordered key → value preference map.
pub type Preferences = IndexMap<String, Value>;

/// The storage contract for one physical layout.
///
/// The trait is synchronous; every call may block on the storage client.
/// Drivers are shared across threads behind an `Arc`.
pub trait PreferenceDriver: Send + Sync {
    /// Every stored preference of the owner.
    fn all(&self, scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError>;

    /// Deletes every preference of the owner.
    fn clear(&self, scope: &mut OwnerScope<'_>) -> Result<(), PreferenceError>;

    /// Deletes one preference. Absent keys are ignored.
    fn delete(&self, scope: &mut OwnerScope<'_>, key: &str) -> Result<(), PreferenceError>;

    /// Deletes several preferences at once.
    fn delete_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        keys: &[String],
    ) -> Result<(), PreferenceError>;

    /// The stored value, `Null` when absent or stored as null.
    fn get(&self, scope: &OwnerScope<'_>, key: &str) -> Result<Value, PreferenceError>;

    /// The stored values for `keys`. Absent keys are left out.
    fn get_multiple(
        &self,
        scope: &OwnerScope<'_>,
        keys: &[String],
    ) -> Result<Preferences, PreferenceError>;

    /// Whether a value (possibly null) is stored under `key`.
    fn has(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError>;

    fn missing(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError> {
        Ok(!self.has(scope, key)?)
    }

    /// Inserts or replaces one preference.
    fn set(
        &self,
        scope: &mut OwnerScope<'_>,
        key: &str,
        value: Value,
    ) -> Result<(), PreferenceError>;

    /// Inserts or replaces several preferences at once.
    fn set_multiple(
        &self,
        scope: &mut OwnerScope<'_>,
        values: Preferences,
    ) -> Result<(), PreferenceError>;

    /// Capability test for presence-aware reads.
    fn as_presence_aware(&self) -> Option<&dyn PresenceAwarePreferenceDriver> {
        None
    }
}

/// A driver that reports presence alongside the value in a single read.
pub trait PresenceAwarePreferenceDriver: PreferenceDriver {
    fn get_with_presence(
        &self,
        scope: &OwnerScope<'_>,
        key: &str,
    ) -> Result<PreferenceRead, PreferenceError>;
}
