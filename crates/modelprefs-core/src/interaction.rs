//! The owner-scoped preference API.
//!
//! A [`PendingInteraction`] pairs one driver with one owner scope. It
//! normalizes keys, applies default fallback to reads, and validates values
//! before any write reaches the driver.

use std::sync::Arc;

use serde_json::Value;

use crate::config::PreferencesConfig;
use crate::driver::{PreferenceDriver, Preferences};
use crate::error::PreferenceError;
use crate::key::{normalize_keys, PreferenceKey};
use crate::owner::{OwnerScope, Preferable};
use crate::rules::validate;

/// Preference operations scoped to a single owner.
pub struct PendingInteraction<'a> {
    driver: Arc<dyn PreferenceDriver>,
    scope: OwnerScope<'a>,
}

impl<'a> PendingInteraction<'a> {
    pub fn new(driver: Arc<dyn PreferenceDriver>, scope: OwnerScope<'a>) -> Self {
        PendingInteraction { driver, scope }
    }

    /// The owner this interaction is scoped to.
    pub fn owner(&self) -> &(dyn Preferable + 'a) {
        self.scope.owner()
    }

    /// The owner's resolved configuration.
    pub fn config(&self) -> &PreferencesConfig {
        self.scope.config()
    }

    /// Every stored preference.
    pub fn all(&self) -> Result<Preferences, PreferenceError> {
        self.driver.all(&self.scope)
    }

    /// The owner's defaults overlaid with every stored preference.
    pub fn all_with_defaults(&self) -> Result<Preferences, PreferenceError> {
        let mut merged = self.scope.config().defaults().clone();
        merged.extend(self.all()?);
        Ok(merged)
    }

    /// Deletes every stored preference.
    pub fn clear(&mut self) -> Result<(), PreferenceError> {
        self.driver.clear(&mut self.scope)
    }

    pub fn delete(&mut self, key: impl PreferenceKey) -> Result<(), PreferenceError> {
        self.driver.delete(&mut self.scope, key.preference_key())
    }

    pub fn delete_multiple<I, K>(&mut self, keys: I) -> Result<(), PreferenceError>
    where
        I: IntoIterator<Item = K>,
        K: PreferenceKey,
    {
        let keys = normalize_keys(keys);
        self.driver.delete_multiple(&mut self.scope, &keys)
    }

    /// The stored value, or the owner default, or `Null`.
    ///
    /// A value explicitly stored as null is returned as `Null`; defaults only
    /// apply to absent keys.
    pub fn get(&self, key: impl PreferenceKey) -> Result<Value, PreferenceError> {
        self.read(key.preference_key(), None::<fn() -> Value>)
    }

    /// Like [`get`](Self::get), falling back to `default` after owner defaults.
    pub fn get_or(&self, key: impl PreferenceKey, default: Value) -> Result<Value, PreferenceError> {
        self.read(key.preference_key(), Some(move || default))
    }

    /// Like [`get_or`](Self::get_or) with a lazily computed fallback. The
    /// closure only runs when the key is absent and has no owner default.
    pub fn get_or_else<F>(&self, key: impl PreferenceKey, default: F) -> Result<Value, PreferenceError>
    where
        F: FnOnce() -> Value,
    {
        self.read(key.preference_key(), Some(default))
    }

    /// Values for every requested key, in request order, with owner defaults
    /// (or `Null`) for absent keys. One driver batch read.
    pub fn get_multiple<I, K>(&self, keys: I) -> Result<Preferences, PreferenceError>
    where
        I: IntoIterator<Item = K>,
        K: PreferenceKey,
    {
        let keys = normalize_keys(keys);
        let stored = self.driver.get_multiple(&self.scope, &keys)?;

        let mut results = Preferences::with_capacity(keys.len());
        for key in keys {
            let value = match stored.get(&key) {
                Some(value) => value.clone(),
                None => self.resolve_missing_default(&key, None::<fn() -> Value>),
            };
            results.insert(key, value);
        }
        Ok(results)
    }

    pub fn has(&self, key: impl PreferenceKey) -> Result<bool, PreferenceError> {
        self.driver.has(&self.scope, key.preference_key())
    }

    pub fn missing(&self, key: impl PreferenceKey) -> Result<bool, PreferenceError> {
        Ok(!self.has(key)?)
    }

    /// Validates then stores one preference.
    ///
    /// Fails with [`PreferenceError::Validation`] without writing when the
    /// key's rules reject the value.
    pub fn set(&mut self, key: impl PreferenceKey, value: Value) -> Result<(), PreferenceError> {
        let key = key.preference_key();
        validate([(key, &value)], self.scope.config().rules())
            .map_err(PreferenceError::Validation)?;
        self.driver.set(&mut self.scope, key, value)
    }

    /// Validates every pair as one batch, then stores them all.
    ///
    /// Validation errors are aggregated across keys; nothing is written when
    /// any key fails.
    pub fn set_multiple<I, K>(&mut self, values: I) -> Result<(), PreferenceError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: PreferenceKey,
    {
        let values: Preferences = values
            .into_iter()
            .map(|(key, value)| (key.preference_key().to_string(), value))
            .collect();

        validate(
            values.iter().map(|(key, value)| (key.as_str(), value)),
            self.scope.config().rules(),
        )
        .map_err(PreferenceError::Validation)?;

        self.driver.set_multiple(&mut self.scope, values)
    }

    fn read<F>(&self, key: &str, fallback: Option<F>) -> Result<Value, PreferenceError>
    where
        F: FnOnce() -> Value,
    {
        if let Some(driver) = self.driver.as_presence_aware() {
            let read = driver.get_with_presence(&self.scope, key)?;
            if read.exists() {
                return Ok(read.into_value());
            }
            return Ok(self.resolve_missing_default(key, fallback));
        }

        let value = self.driver.get(&self.scope, key)?;
        if !value.is_null() {
            return Ok(value);
        }
        if self.driver.has(&self.scope, key)? {
            return Ok(Value::Null);
        }
        Ok(self.resolve_missing_default(key, fallback))
    }

    fn resolve_missing_default<F>(&self, key: &str, fallback: Option<F>) -> Value
    where
        F: FnOnce() -> Value,
    {
        if let Some(value) = self.scope.config().default_for(key) {
            return value.clone();
        }
        fallback.map(|f| f()).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PresenceAwarePreferenceDriver;
    use crate::memory::InMemoryDriver;
    use crate::read::PreferenceRead;
    use crate::rules::Rule;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Member {
        id: i64,
    }

    impl Preferable for Member {
        fn owner_type(&self) -> &str {
            "member"
        }

        fn owner_key(&self) -> i64 {
            self.id
        }

        fn owner_table(&self) -> &str {
            "members"
        }

        fn attribute(&self, _name: &str) -> Option<&Value> {
            None
        }

        fn set_attribute(&mut self, _name: &str, _value: Value) {}
    }

    fn member_config() -> PreferencesConfig {
        PreferencesConfig::default()
            .with_driver("memory")
            .with_defaults([("notifications", json!(true)), ("theme", json!("system"))])
            .with_rules([
                ("notifications", Rule::Boolean),
                ("theme", Rule::in_values(["dark", "light", "system"])),
            ])
    }

    fn interaction<'a>(
        driver: &Arc<InMemoryDriver>,
        member: &'a mut Member,
    ) -> PendingInteraction<'a> {
        PendingInteraction::new(driver.clone(), OwnerScope::new(member, member_config()))
    }

    #[test]
    fn owner_defaults_fill_absent_keys() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        assert_eq!(prefs.get("theme").unwrap(), json!("system"));
        assert_eq!(prefs.get("notifications").unwrap(), json!(true));

        prefs.set("theme", json!("dark")).unwrap();
        assert_eq!(prefs.get("theme").unwrap(), json!("dark"));
    }

    #[test]
    fn stored_null_beats_every_default() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        prefs.set("timezone", Value::Null).unwrap();
        assert_eq!(prefs.get_or("timezone", json!("UTC")).unwrap(), Value::Null);
    }

    #[test]
    fn owner_default_wins_over_caller_default() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let prefs = interaction(&driver, &mut member);

        assert_eq!(prefs.get_or("theme", json!("light")).unwrap(), json!("system"));
        assert_eq!(prefs.get_or("nonexistent", json!("default")).unwrap(), json!("default"));
        assert_eq!(prefs.get("nonexistent").unwrap(), Value::Null);
    }

    #[test]
    fn lazy_default_runs_only_when_needed() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);
        let calls = Cell::new(0);

        prefs.set("locale", json!("fr")).unwrap();
        let value = prefs
            .get_or_else("locale", || {
                calls.set(calls.get() + 1);
                json!("en")
            })
            .unwrap();
        assert_eq!(value, json!("fr"));
        assert_eq!(calls.get(), 0);

        let value = prefs
            .get_or_else("language", || {
                calls.set(calls.get() + 1);
                json!("en")
            })
            .unwrap();
        assert_eq!(value, json!("en"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn get_multiple_returns_every_requested_key() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        prefs.set_multiple([("notifications", json!(false))]).unwrap();
        let values = prefs.get_multiple(["theme", "notifications", "other"]).unwrap();

        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            json!({"theme": "system", "notifications": false, "other": null})
        );
        assert_eq!(
            values.keys().collect::<Vec<_>>(),
            vec!["theme", "notifications", "other"]
        );
    }

    #[test]
    fn invalid_value_is_not_written() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        let err = prefs.set("theme", json!("invalid")).unwrap_err();
        assert_eq!(err.to_string(), "The given preference data was invalid.");
        assert!(!prefs.has("theme").unwrap());
    }

    #[test]
    fn batch_validation_writes_nothing_and_reports_all_keys() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        let err = prefs
            .set_multiple([
                ("locale", json!("fr")),
                ("theme", json!("neon")),
                ("notifications", json!("sometimes")),
            ])
            .unwrap_err();

        let errors = err.errors().unwrap();
        assert!(errors.has("theme"));
        assert!(errors.has("notifications"));
        assert!(prefs.all().unwrap().is_empty());
    }

    #[test]
    fn all_with_defaults_overlays_stored_values() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        prefs.set("theme", json!("light")).unwrap();
        prefs.set("locale", json!("de")).unwrap();

        assert_eq!(
            serde_json::to_value(prefs.all_with_defaults().unwrap()).unwrap(),
            json!({"notifications": true, "theme": "light", "locale": "de"})
        );
    }

    #[test]
    fn deletes_pass_through() {
        let driver = Arc::new(InMemoryDriver::new());
        let mut member = Member { id: 1 };
        let mut prefs = interaction(&driver, &mut member);

        prefs
            .set_multiple([("notifications", json!(false)), ("theme", json!("dark"))])
            .unwrap();
        prefs.delete("theme").unwrap();
        assert!(prefs.missing("theme").unwrap());

        prefs.delete_multiple(["notifications"]).unwrap();
        assert!(prefs.all().unwrap().is_empty());

        prefs.set("theme", json!("light")).unwrap();
        prefs.clear().unwrap();
        assert!(prefs.all().unwrap().is_empty());
    }

    /// Counts plain reads to prove the presence-aware path is taken.
    #[derive(Default)]
    struct CountingDriver {
        inner: InMemoryDriver,
        plain_reads: AtomicUsize,
    }

    impl PreferenceDriver for CountingDriver {
        fn all(&self, scope: &OwnerScope<'_>) -> Result<Preferences, PreferenceError> {
            self.inner.all(scope)
        }

        fn clear(&self, scope: &mut OwnerScope<'_>) -> Result<(), PreferenceError> {
            self.inner.clear(scope)
        }

        fn delete(&self, scope: &mut OwnerScope<'_>, key: &str) -> Result<(), PreferenceError> {
            self.inner.delete(scope, key)
        }

        fn delete_multiple(
            &self,
            scope: &mut OwnerScope<'_>,
            keys: &[String],
        ) -> Result<(), PreferenceError> {
            self.inner.delete_multiple(scope, keys)
        }

        fn get(&self, scope: &OwnerScope<'_>, key: &str) -> Result<Value, PreferenceError> {
            self.plain_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(scope, key)
        }

        fn get_multiple(
            &self,
            scope: &OwnerScope<'_>,
            keys: &[String],
        ) -> Result<Preferences, PreferenceError> {
            self.inner.get_multiple(scope, keys)
        }

        fn has(&self, scope: &OwnerScope<'_>, key: &str) -> Result<bool, PreferenceError> {
            self.plain_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.has(scope, key)
        }

        fn set(
            &self,
            scope: &mut OwnerScope<'_>,
            key: &str,
            value: Value,
        ) -> Result<(), PreferenceError> {
            self.inner.set(scope, key, value)
        }

        fn set_multiple(
            &self,
            scope: &mut OwnerScope<'_>,
            values: Preferences,
        ) -> Result<(), PreferenceError> {
            self.inner.set_multiple(scope, values)
        }

        fn as_presence_aware(&self) -> Option<&dyn PresenceAwarePreferenceDriver> {
            Some(self)
        }
    }

    impl PresenceAwarePreferenceDriver for CountingDriver {
        fn get_with_presence(
            &self,
            scope: &OwnerScope<'_>,
            key: &str,
        ) -> Result<PreferenceRead, PreferenceError> {
            let all = self.inner.all(scope)?;
            Ok(all.get(key).cloned().into())
        }
    }

    #[test]
    fn presence_aware_driver_reads_once() {
        let driver = Arc::new(CountingDriver::default());
        let mut member = Member { id: 1 };
        let mut prefs =
            PendingInteraction::new(driver.clone(), OwnerScope::new(&mut member, member_config()));

        prefs.set("timezone", Value::Null).unwrap();
        assert_eq!(prefs.get_or("timezone", json!("UTC")).unwrap(), Value::Null);
        assert_eq!(prefs.get("theme").unwrap(), json!("system"));
        assert_eq!(driver.plain_reads.load(Ordering::SeqCst), 0);
    }
}
