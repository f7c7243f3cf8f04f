//! A driver bound to its registered name.

use std::fmt;
use std::sync::Arc;

use crate::driver::PreferenceDriver;
use crate::error::PreferenceError;
use crate::interaction::PendingInteraction;
use crate::owner::{resolve_config, OwnerScope, Preferable};
use crate::settings::Settings;

/// A named driver that hands out owner-scoped interactions.
///
/// Cheap to clone: the driver is shared behind an `Arc`.
#[derive(Clone)]
pub struct PreferencesStore {
    name: String,
    driver: Arc<dyn PreferenceDriver>,
    settings: Settings,
}

impl PreferencesStore {
    pub fn new(name: impl Into<String>, driver: Arc<dyn PreferenceDriver>, settings: Settings) -> Self {
        PreferencesStore {
            name: name.into(),
            driver,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &Arc<dyn PreferenceDriver> {
        &self.driver
    }

    /// Scopes an interaction to `owner`.
    ///
    /// Fails when the owner lacks the preference capability, or when the
    /// driver it declares is not this store.
    pub fn for_owner<'a>(
        &self,
        owner: &'a mut dyn Preferable,
    ) -> Result<PendingInteraction<'a>, PreferenceError> {
        let config = resolve_config(owner, &self.settings)?;

        if config.driver() != Some(self.name.as_str()) {
            return Err(PreferenceError::DriverMismatch {
                declared: config.driver().unwrap_or_default().to_string(),
                selected: self.name.clone(),
            });
        }

        Ok(PendingInteraction::new(
            self.driver.clone(),
            OwnerScope::new(owner, config),
        ))
    }
}

impl fmt::Debug for PreferencesStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferencesStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
