//! The driver registry.
//!
//! [`PreferencesManager`] resolves driver names to [`PreferencesStore`]s.
//! Drivers are registered as factories with [`PreferencesManager::extend`]
//! and constructed lazily, exactly once per name. The manager is a plain
//! object owned by the application's composition root; there is no global
//! instance.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::driver::PreferenceDriver;
use crate::error::PreferenceError;
use crate::interaction::PendingInteraction;
use crate::owner::{resolve_config, Preferable};
use crate::settings::Settings;
use crate::store::PreferencesStore;

/// Builds a driver from the current settings.
pub type DriverFactory =
    Arc<dyn Fn(&Settings) -> Result<Arc<dyn PreferenceDriver>, PreferenceError> + Send + Sync>;

/// Memoized store for one name, filled on first use.
type StoreSlot = Arc<Mutex<Option<PreferencesStore>>>;

/// Registry of preference drivers keyed by name.
///
/// Backed by `DashMap`. Each name owns a slot whose mutex is held while its
/// driver is built, so concurrent first use of a name never constructs two
/// drivers. No map shard is locked during construction, so a factory may
/// resolve other drivers through the same manager.
pub struct PreferencesManager {
    settings: Settings,
    factories: DashMap<String, DriverFactory>,
    stores: DashMap<String, StoreSlot>,
}

impl PreferencesManager {
    /// Creates a manager with no registered drivers.
    pub fn new(settings: Settings) -> Self {
        PreferencesManager {
            settings,
            factories: DashMap::new(),
            stores: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registers a driver factory under `name`.
    ///
    /// A store already built for `name` keeps being served until
    /// [`forget_drivers`](Self::forget_drivers) is called.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        F: Fn(&Settings) -> Result<Arc<dyn PreferenceDriver>, PreferenceError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Whether a factory is registered under `name`.
    pub fn supports(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The store registered under `name`, or the default store for `None`.
    pub fn driver(&self, name: Option<&str>) -> Result<PreferencesStore, PreferenceError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.get_default_driver()?,
        };

        let factory = self
            .factories
            .get(&name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PreferenceError::UnsupportedDriver(name.clone()))?;

        // Clone the slot out so the shard guard is dropped before building.
        let cell = self.stores.entry(name.clone()).or_default().value().clone();
        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }

        debug!(driver = %name, "creating preference driver");
        let driver = factory(&self.settings)?;
        let store = PreferencesStore::new(name, driver, self.settings.clone());
        *slot = Some(store.clone());
        Ok(store)
    }

    /// The configured default store name.
    pub fn get_default_driver(&self) -> Result<String, PreferenceError> {
        self.settings.default_driver()
    }

    /// Scopes an interaction through the default store.
    pub fn for_owner<'a>(
        &self,
        owner: &'a mut dyn Preferable,
    ) -> Result<PendingInteraction<'a>, PreferenceError> {
        self.driver(None)?.for_owner(owner)
    }

    /// Scopes an interaction through the store the owner itself declares.
    pub fn preferences<'a>(
        &self,
        owner: &'a mut dyn Preferable,
    ) -> Result<PendingInteraction<'a>, PreferenceError> {
        let config = resolve_config(owner, &self.settings)?;
        self.driver(config.driver())?.for_owner(owner)
    }

    /// Deletion hook: removes the stored preferences of an owner that keeps
    /// them in separate rows (shared or table driver).
    ///
    /// Column-driver owners and owners without the preference capability are
    /// left alone.
    pub fn owner_deleted(&self, owner: &mut dyn Preferable) -> Result<(), PreferenceError> {
        let config = match resolve_config(owner, &self.settings) {
            Ok(config) => config,
            Err(PreferenceError::CapabilityMissing { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };

        if !config.store_driver().is_some_and(|d| d.stores_rows()) {
            return Ok(());
        }

        let owner_type = owner.owner_type().to_string();
        let owner_key = owner.owner_key();
        self.preferences(owner)?.clear()?;
        info!(%owner_type, owner_key, "cleared preferences of deleted owner");
        Ok(())
    }

    /// Drops every memoized store; the next lookup rebuilds from factories.
    pub fn forget_drivers(&self) {
        self.stores.clear();
    }
}

impl fmt::Debug for PreferencesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("PreferencesManager")
            .field("drivers", &names)
            .finish_non_exhaustive()
    }
}
