//! Loader for the per-user `key=value` options file (`~/.srun.conf`).
//!
//! The file is read from the target that runs the command: the local home
//! directory in local mode, or the remote account's home directory (copied
//! to a local scratch file first) in remote mode.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::connection::{Connection, Target};
use crate::exec::ExecError;
use crate::shell::{expand_home, home_dir};

/// Key naming the data directory exported to the command.
pub const DATADIR_KEY: &str = "DATADIR";

/// Key naming the virtual environment used for dependency installation.
pub const VIRTUALENV_KEY: &str = "VIRTUALENV";

/// Errors raised while locating or parsing the options file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OptionsError {
    /// Raised when the options file does not exist on the target.
    #[error("options file not found at {location}")]
    Missing {
        /// Human-readable location that was searched.
        location: String,
    },
    /// Raised when a required key is absent from the file.
    #[error("options file is missing required key {key}")]
    Incomplete {
        /// The first required key that was not found.
        key: String,
    },
    /// Raised when the target cannot be queried or the file cannot be read.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Settings loaded from the options file.
///
/// `DATADIR` and `VIRTUALENV` are guaranteed to be present.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SrunOptions {
    values: BTreeMap<String, String>,
    datadir: String,
    virtualenv: String,
}

impl SrunOptions {
    /// Parses options text.
    ///
    /// Lines without `=` are ignored and each line is split on its first `=`.
    /// When `home` is provided every `~` in a value is replaced with it.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Incomplete`] when `DATADIR` or `VIRTUALENV`
    /// is missing.
    pub fn parse(text: &str, home: Option<&str>) -> Result<Self, OptionsError> {
        let mut values = BTreeMap::new();
        for raw_line in text.lines() {
            let line = raw_line.trim_end_matches('\r');
            let Some((key, raw_value)) = line.split_once('=') else {
                continue;
            };
            let value = home.map_or_else(
                || raw_value.to_owned(),
                |home_path| expand_home(raw_value, home_path),
            );
            values.insert(key.to_owned(), value);
        }

        let required = |key: &str| {
            values
                .get(key)
                .cloned()
                .ok_or_else(|| OptionsError::Incomplete {
                    key: key.to_owned(),
                })
        };
        let datadir = required(DATADIR_KEY)?;
        let virtualenv = required(VIRTUALENV_KEY)?;

        Ok(Self {
            values,
            datadir,
            virtualenv,
        })
    }

    /// Data directory exported to the command by default.
    #[must_use]
    pub fn datadir(&self) -> &str {
        &self.datadir
    }

    /// Path of the virtual environment on the target.
    #[must_use]
    pub fn virtualenv(&self) -> &str {
        &self.virtualenv
    }

    /// Returns any value from the file.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterates over every `(key, value)` pair in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Loads the options file named `file_name` from the home directory of the
/// connection's target.
///
/// # Errors
///
/// Returns [`OptionsError::Missing`] when the file does not exist,
/// [`OptionsError::Incomplete`] when required keys are absent, and
/// propagates transport failures.
pub fn load<C: Connection>(connection: &C, file_name: &str) -> Result<SrunOptions, OptionsError> {
    let location = describe_location(connection.target(), file_name);
    debug!(%location, "loading srun options");

    let Some(text) = connection.read_home_file(file_name)? else {
        return Err(OptionsError::Missing { location });
    };

    let home = match connection.target() {
        Target::Local => home_dir(),
        Target::Remote(_) => None,
    };
    SrunOptions::parse(&text, home.as_deref())
}

fn describe_location(target: &Target, file_name: &str) -> String {
    match target {
        Target::Local => home_dir().map_or_else(
            || format!("~/{file_name}"),
            |home| format!("{home}/{file_name}"),
        ),
        Target::Remote(address) => format!("{address}:~/{file_name}"),
    }
}
