//! The owner contract.
//!
//! Any record can own preferences by implementing [`Preferable`] (identity
//! and row access). It opts into the preference capability by also
//! implementing [`HasPreferenceConfig`] and returning itself from
//! [`Preferable::preference_config`]. Drivers see an owner through an
//! [`OwnerScope`]: the owner paired with its resolved configuration.

use serde_json::Value;

use crate::config::PreferencesConfig;
use crate::error::PreferenceError;
use crate::settings::Settings;

/// A record that preferences can be attached to.
pub trait Preferable {
    /// Stable type discriminator, stored as `preferable_type` by the shared
    /// driver.
    fn owner_type(&self) -> &str;

    /// Primary key value.
    fn owner_key(&self) -> i64;

    /// Table holding the owner's own rows.
    fn owner_table(&self) -> &str;

    /// Primary key column of [`owner_table`](Preferable::owner_table).
    fn key_name(&self) -> &str {
        "id"
    }

    /// Database connection holding the owner's rows (`None` = default).
    fn connection_name(&self) -> Option<&str> {
        None
    }

    /// A loaded attribute of the owner's row, `None` when not loaded.
    fn attribute(&self, name: &str) -> Option<&Value>;

    /// Replaces a loaded attribute in memory.
    fn set_attribute(&mut self, name: &str, value: Value);

    /// The preference capability. Owners implementing
    /// [`HasPreferenceConfig`] return `Some(self)`.
    fn preference_config(&self) -> Option<&dyn HasPreferenceConfig> {
        None
    }
}

/// The preference capability: an owner that declares how its preferences
/// are stored, defaulted and validated.
pub trait HasPreferenceConfig {
    /// Builds this owner's configuration. Called once per interaction.
    fn preferences_config(&self, settings: &Settings) -> Result<PreferencesConfig, PreferenceError> {
        PreferencesConfig::configure(settings)
    }
}

/// Resolves an owner's configuration, failing when it lacks the capability.
pub fn resolve_config(
    owner: &dyn Preferable,
    settings: &Settings,
) -> Result<PreferencesConfig, PreferenceError> {
    match owner.preference_config() {
        Some(capability) => capability.preferences_config(settings),
        None => Err(PreferenceError::CapabilityMissing {
            owner_type: owner.owner_type().to_string(),
        }),
    }
}

/// An owner bound to its resolved preference configuration.
pub struct OwnerScope<'a> {
    owner: &'a mut dyn Preferable,
    config: PreferencesConfig,
}

impl<'a> OwnerScope<'a> {
    pub fn new(owner: &'a mut dyn Preferable, config: PreferencesConfig) -> Self {
        OwnerScope { owner, config }
    }

    /// Resolves the owner's configuration and binds it.
    pub fn resolve(
        owner: &'a mut dyn Preferable,
        settings: &Settings,
    ) -> Result<Self, PreferenceError> {
        let config = resolve_config(owner, settings)?;
        Ok(OwnerScope { owner, config })
    }

    pub fn owner(&self) -> &(dyn Preferable + 'a) {
        &*self.owner
    }

    pub fn owner_mut(&mut self) -> &mut (dyn Preferable + 'a) {
        &mut *self.owner
    }

    pub fn config(&self) -> &PreferencesConfig {
        &self.config
    }

    pub fn owner_type(&self) -> &str {
        self.owner.owner_type()
    }

    pub fn owner_key(&self) -> i64 {
        self.owner.owner_key()
    }
}
