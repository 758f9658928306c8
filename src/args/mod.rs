//! Pure parsing of the `srun` invocation vector.
//!
//! The vector has the shape `<target> [KEY=VALUE ...] <command ...>`. Leading
//! tokens containing `=` become environment overrides; the first token
//! without `=` starts the command. A command that itself starts with an
//! `X=Y` token (for example `FOO=1 python main.py`) is therefore read as an
//! override followed by `python main.py`.

use thiserror::Error;

use crate::connection::Target;
use crate::environment::EnvironmentOverrides;

/// Errors raised while parsing the invocation vector.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ArgsError {
    /// Raised when no target was supplied.
    #[error("missing target: expected `local` or `user@host`")]
    MissingTarget,
    /// Raised when the target token is empty or looks like a flag.
    #[error("invalid target `{0}`: expected `local` or `user@host`")]
    InvalidTarget(String),
    /// Raised when an override has no variable name.
    #[error("environment override `{0}` has an empty name")]
    EmptyKey(String),
    /// Raised when nothing remains to execute after the overrides.
    #[error("missing command to run")]
    MissingCommand,
}

/// A fully parsed invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// Where to run.
    pub target: Target,
    /// Environment assignments given before the command.
    pub overrides: EnvironmentOverrides,
    /// The command tokens, verbatim.
    pub command: Vec<String>,
}

impl Invocation {
    /// The command line, tokens joined with single spaces and not re-quoted.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Splits off the target address.
///
/// Returns the address token and the remaining tokens.
///
/// # Errors
///
/// Returns [`ArgsError::MissingTarget`] for an empty vector.
pub fn split_target(args: &[String]) -> Result<(&str, &[String]), ArgsError> {
    let (first, rest) = args.split_first().ok_or(ArgsError::MissingTarget)?;
    if first.trim().is_empty() || first.starts_with('-') {
        return Err(ArgsError::InvalidTarget(first.clone()));
    }
    Ok((first.as_str(), rest))
}

/// Consumes leading `KEY=VALUE` tokens, splitting each on its first `=`.
///
/// Returns the overrides and the tokens starting at the first token without
/// `=`.
///
/// # Errors
///
/// Returns [`ArgsError::EmptyKey`] for tokens such as `=value`.
pub fn split_overrides(args: &[String]) -> Result<(EnvironmentOverrides, &[String]), ArgsError> {
    let mut overrides = EnvironmentOverrides::new();
    let mut rest = args;
    while let Some((token, tail)) = rest.split_first() {
        let Some((key, value)) = token.split_once('=') else {
            break;
        };
        if key.is_empty() {
            return Err(ArgsError::EmptyKey(token.clone()));
        }
        overrides.insert(key, value);
        rest = tail;
    }
    Ok((overrides, rest))
}

/// Parses `[target, overrides..., command...]`.
///
/// # Errors
///
/// Returns [`ArgsError`] when the target or command is missing, or an
/// override is malformed.
pub fn parse_invocation(args: &[String]) -> Result<Invocation, ArgsError> {
    let (address, rest) = split_target(args)?;
    let (overrides, command) = split_overrides(rest)?;
    if command.is_empty() {
        return Err(ArgsError::MissingCommand);
    }

    Ok(Invocation {
        target: Target::parse(address),
        overrides,
        command: command.to_vec(),
    })
}
