//! Preference key normalization.
//!
//! Callers may address a preference by a plain string or by an application
//! enum. Both reduce to the canonical `&str` before reaching a driver.

/// A value that names a preference.
///
/// Implemented for `str`, `String` and references to any key. Application
/// enums implement it by returning their canonical name:
///
/// ```
/// use modelprefs_core::PreferenceKey;
///
/// enum UserPreference {
///     Theme,
/// }
///
/// impl PreferenceKey for UserPreference {
///     fn preference_key(&self) -> &str {
///         match self {
///             UserPreference::Theme => "theme",
///         }
///     }
/// }
///
/// assert_eq!(UserPreference::Theme.preference_key(), "theme");
/// ```
pub trait PreferenceKey {
    /// The canonical string form of this key.
    fn preference_key(&self) -> &str;
}

impl PreferenceKey for str {
    fn preference_key(&self) -> &str {
        self
    }
}

impl PreferenceKey for String {
    fn preference_key(&self) -> &str {
        self.as_str()
    }
}

impl<K: PreferenceKey + ?Sized> PreferenceKey for &K {
    fn preference_key(&self) -> &str {
        (**self).preference_key()
    }
}

/// Normalizes a batch of keys into owned strings, preserving order.
pub fn normalize_keys<I, K>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: PreferenceKey,
{
    keys.into_iter()
        .map(|key| key.preference_key().to_string())
        .collect()
}
