//! Shell quoting and home-directory helpers.

use std::borrow::Cow;

use shell_escape::unix::escape;

/// Returns the invoking user's home directory from `HOME`.
#[must_use]
pub fn home_dir() -> Option<String> {
    std::env::var_os("HOME").map(|home| home.to_string_lossy().into_owned())
}

/// Replaces every `~` in `value` with `home`.
///
/// # Examples
///
/// ```
/// # use srun::shell::expand_home;
/// assert_eq!(expand_home("~/envs/x", "/home/ada"), "/home/ada/envs/x");
/// assert_eq!(expand_home("/data", "/home/ada"), "/data");
/// ```
#[must_use]
pub fn expand_home(value: &str, home: &str) -> String {
    value.replace('~', home)
}

/// Expands only a leading `~/` (or a bare `~`) to `home`.
///
/// # Examples
///
/// ```
/// # use srun::shell::expand_leading_home;
/// assert_eq!(expand_leading_home("~/.ssh/id_ed25519", "/home/ada"), "/home/ada/.ssh/id_ed25519");
/// assert_eq!(expand_leading_home("/keys/~backup", "/home/ada"), "/keys/~backup");
/// ```
#[must_use]
pub fn expand_leading_home(path: &str, home: &str) -> String {
    if path == "~" {
        return home.to_owned();
    }
    path.strip_prefix("~/")
        .map_or_else(|| path.to_owned(), |rest| format!("{home}/{rest}"))
}

/// Quotes `value` for a POSIX shell, leaving safe strings untouched.
#[must_use]
pub fn quote(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}

/// Quotes a path, or a path-like variable value, while keeping a leading `~`
/// unquoted so the target shell still expands it.
///
/// # Examples
///
/// ```
/// # use srun::shell::quote_path;
/// assert_eq!(quote_path("~/my envs/x"), "~/'my envs/x'");
/// assert_eq!(quote_path("/envs/x"), "/envs/x");
/// ```
#[must_use]
pub fn quote_path(path: &str) -> String {
    if path == "~" {
        return String::from("~");
    }
    match path.strip_prefix("~/") {
        Some("") => String::from("~/"),
        Some(rest) => format!("~/{}", quote(rest)),
        None => quote(path),
    }
}
