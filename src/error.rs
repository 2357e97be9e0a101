//! Structured errors
//!
//! Every failure surfaced by this crate is one of three categories:
//! a caller supplied a bad argument ([`InputError`]), a native call
//! reported failure ([`WindowsApiError`]), or the environment around the
//! validated call path is broken ([`Error::Runtime`], [`Error::Config`]).

use std::fmt;

use thiserror::Error;

use crate::checks::Expected;
use crate::config::ConfigError;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument violated a documented constraint.
    #[error(transparent)]
    Input(#[from] InputError),

    /// A native call reported failure.
    #[error(transparent)]
    WindowsApi(#[from] WindowsApiError),

    /// Environment failure outside the validated call path
    /// (library load, missing constant, unresolved symbol).
    #[error("{0}")]
    Runtime(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Native error code, if this is a [`WindowsApiError`].
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::WindowsApi(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Error::Input(_))
    }

    pub fn is_windows_api(&self) -> bool {
        matches!(self, Error::WindowsApi(_))
    }
}

/// A caller-supplied argument failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {name}: expected {expected}, got {actual}")]
pub struct InputError {
    /// Parameter name as documented by the native API (`hFile`, `lpBuffer`).
    pub name: String,
    /// Human readable description of the constraint.
    pub expected: String,
    /// Repr of the value that was received.
    pub actual: String,
}

impl InputError {
    pub fn new(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl fmt::Display,
    ) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }
}

/// A native function reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct WindowsApiError {
    /// Name of the native function that failed.
    pub function: String,
    /// Last-error code read immediately after the call.
    pub code: u32,
    /// System message for `code`.
    pub message: String,
    /// Raw return value, when a return code comparison caused the failure.
    pub return_code: Option<i64>,
    /// Policy the return code was checked against.
    pub expected: Option<Expected>,
}

impl fmt::Display for WindowsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed with error {}: {}",
            self.function, self.code, self.message
        )?;
        if let (Some(code), Some(expected)) = (self.return_code, self.expected) {
            write!(f, " (returned {}, expected {})", code, expected)?;
        }
        Ok(())
    }
}
