//! Tool settings: which binaries to call and where to place workspaces.
//!
//! Settings are loaded via `ortho-config`, which merges defaults,
//! `srun.toml` configuration files, and `SRUN_*` environment variables. They
//! are distinct from the per-user options file handled by
//! [`crate::options`], which describes the project environment rather than
//! the tool itself.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default parent directory for per-run workspaces on the remote host.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp";

/// Default name of the options file in the target's home directory.
pub const DEFAULT_OPTIONS_FILE: &str = ".srun.conf";

/// Binaries and paths used by `srun`, loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SRUN",
    discovery(
        app_name = "srun",
        env_var = "SRUN_CONFIG_PATH",
        config_file_name = "srun.toml",
        dotfile_name = ".srun.toml",
        project_file_name = "srun.toml"
    )
)]
pub struct SrunSettings {
    /// Path to the `rsync` executable.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable used to fetch the remote options file.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Shell used to run commands in local mode. Must understand `source`.
    #[ortho_config(default = "bash".to_owned())]
    pub shell_bin: String,
    /// Python interpreter used to create virtual environments.
    #[ortho_config(default = "python3".to_owned())]
    pub python_bin: String,
    /// Terminal multiplexer used for background runs.
    #[ortho_config(default = "tmux".to_owned())]
    pub tmux_bin: String,
    /// Parent directory of the per-run remote workspace.
    #[ortho_config(default = DEFAULT_WORKSPACE_ROOT.to_owned())]
    pub workspace_root: String,
    /// Name of the options file in the target's home directory.
    #[ortho_config(default = DEFAULT_OPTIONS_FILE.to_owned())]
    pub options_file: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Private key handed to `ssh -i`. Supports tilde expansion. When unset,
    /// SSH falls back to its default key locations.
    pub ssh_identity_file: Option<String>,
}

/// Errors raised when loading or validating settings.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("settings parsing failed: {0}")]
    Parse(String),
    /// Raised when a value is empty after trimming whitespace.
    #[error("missing {field}: set SRUN_{env_suffix} or add {field} to srun.toml", env_suffix = field.to_uppercase())]
    InvalidValue {
        /// Settings field that failed validation.
        field: String,
    },
}

impl SrunSettings {
    /// Loads settings from defaults, configuration files, and environment
    /// variables without interpreting the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when merging sources fails, or
    /// [`SettingsError::InvalidValue`] when validation fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        let settings = Self::load_from_iter([std::ffi::OsString::from("srun")])
            .map_err(|err| SettingsError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Ensures every value is present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] naming the first empty field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::require_value(&self.rsync_bin, "rsync_bin")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.scp_bin, "scp_bin")?;
        Self::require_value(&self.shell_bin, "shell_bin")?;
        Self::require_value(&self.python_bin, "python_bin")?;
        Self::require_value(&self.tmux_bin, "tmux_bin")?;
        Self::require_value(&self.workspace_root, "workspace_root")?;
        Self::require_value(&self.options_file, "options_file")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Ok(())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SettingsError> {
        match value {
            None => Ok(()), // Not configured; SSH uses defaults
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SettingsError::InvalidValue {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SettingsError> {
        Self::require_optional_value(Some(value), field)
    }
}
