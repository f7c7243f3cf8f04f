//! Per-record preferences for database-backed models.
//!
//! Any record implementing [`Preferable`] and [`HasPreferenceConfig`] can
//! read and write a key → JSON-value preference map through a
//! [`PendingInteraction`], with owner-declared defaults and validation rules.
//! Storage is pluggable behind the [`PreferenceDriver`] trait; the SQL
//! backends live in `modelprefs-storage`.
//!
//! # Architecture
//!
//! - A [`PreferencesManager`] maps driver names to lazily built
//!   [`PreferencesStore`]s.
//! - A store binds an owner to its resolved [`PreferencesConfig`] and hands
//!   out a [`PendingInteraction`].
//! - The interaction normalizes keys, applies defaults on reads and validates
//!   values before writes reach the driver.
//!
//! # Modules
//!
//! - [`error`]: PreferenceError enum with all failure modes
//! - [`settings`]: ConfigRepository, MapConfig and typed Settings
//! - [`config`]: per-owner PreferencesConfig and the built-in StoreDriver names
//! - [`rules`]: declarative validation rules and ValidationErrors
//! - [`owner`]: Preferable / HasPreferenceConfig owner contracts
//! - [`driver`]: the PreferenceDriver storage contract
//! - [`memory`]: InMemoryDriver implementation
//! - [`interaction`]: PendingInteraction, the owner-scoped API
//! - [`store`]: PreferencesStore, a named driver
//! - [`manager`]: PreferencesManager driver registry

pub mod config;
pub mod driver;
pub mod error;
pub mod interaction;
pub mod key;
pub mod manager;
pub mod memory;
pub mod owner;
pub mod read;
pub mod rules;
pub mod settings;
pub mod store;

// Re-export key types for ergonomic use.
pub use config::{PreferencesConfig, StoreDriver};
pub use driver::{PreferenceDriver, Preferences, PresenceAwarePreferenceDriver};
pub use error::PreferenceError;
pub use interaction::PendingInteraction;
pub use key::PreferenceKey;
pub use manager::{DriverFactory, PreferencesManager};
pub use memory::InMemoryDriver;
pub use owner::{HasPreferenceConfig, OwnerScope, Preferable};
pub use read::PreferenceRead;
pub use rules::{Rule, RuleSet, ValidationErrors};
pub use settings::{ConfigRepository, MapConfig, Settings};
pub use store::PreferencesStore;
