//! Environment variables injected into the executed command.

use crate::options::{DATADIR_KEY, SrunOptions};

/// Name of the GPU selection variable that is mirrored into the command line.
pub const CUDA_VISIBLE_DEVICES_KEY: &str = "CUDA_VISIBLE_DEVICES";

/// Ordered mapping of variable name to value.
///
/// Insertion order is preserved; inserting an existing key replaces its value
/// in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EnvironmentOverrides {
    entries: Vec<(String, String)>,
}

impl EnvironmentOverrides {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let name = key.into();
        let assigned = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = assigned;
        } else {
            self.entries.push((name, assigned));
        }
    }

    /// Returns the value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of variables held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no variables are held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the environment handed to the executed command: the explicit
    /// overrides, with `DATADIR` defaulted from the loaded options.
    #[must_use]
    pub fn with_defaults(&self, options: &SrunOptions) -> Self {
        let mut resolved = self.clone();
        if !resolved.contains_key(DATADIR_KEY) {
            resolved.insert(DATADIR_KEY, options.datadir());
        }
        resolved
    }

    /// GPU selection in effect for this run: the override when supplied,
    /// otherwise the options value.
    #[must_use]
    pub fn cuda_visible_devices<'a>(&'a self, options: &'a SrunOptions) -> Option<&'a str> {
        self.get(CUDA_VISIBLE_DEVICES_KEY)
            .or_else(|| options.get(CUDA_VISIBLE_DEVICES_KEY))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = Self::new();
        for (key, value) in iter {
            overrides.insert(key, value);
        }
        overrides
    }
}
