//! Argument Checks and Result Translation
//!
//! Two halves of the boundary between callers and native calls:
//!
//! - [`validate`] rejects arguments before they reach the native layer.
//! - [`check_result`] and [`check_last_error`] turn a native return code
//!   plus the thread's last-error state into a structured error.
//!
//! The translator must run immediately after the native call it checks.
//! Last-error state is per thread and any intervening native call may
//! overwrite it.

use std::fmt;

use tracing::debug;

use crate::error::{InputError, Result, WindowsApiError};
use crate::native::NativeApi;
use crate::value::{StructKind, Value, ValueKind};

/// Validation strategy for a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check<'a> {
    /// The value's kind must be one of these.
    Kinds(&'a [ValueKind]),
    /// An open native handle (`void *`). Never nullable.
    Handle,
    /// Text, or bytes that decode as UTF-8.
    Utf8,
    /// `NULL` or an `OVERLAPPED *`.
    Overlapped,
    /// `NULL` or a `SECURITY_ATTRIBUTES *`.
    SecurityAttributes,
    /// An integer from a fixed set of allowed values.
    OneOf(&'a [i64]),
}

pub const INTEGER: Check<'static> = Check::Kinds(&[ValueKind::Integer]);
pub const BOOL: Check<'static> = Check::Kinds(&[ValueKind::Bool, ValueKind::Integer]);
pub const TEXT: Check<'static> = Check::Kinds(&[ValueKind::String]);

impl fmt::Display for Check<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Kinds(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, "{}", names.join(" or "))
            }
            Check::Handle => write!(f, "an open handle (void *)"),
            Check::Utf8 => write!(f, "UTF-8 text"),
            Check::Overlapped => write!(f, "NULL or OVERLAPPED *"),
            Check::SecurityAttributes => write!(f, "NULL or SECURITY_ATTRIBUTES *"),
            Check::OneOf(values) => write!(f, "one of {:?}", values),
        }
    }
}

/// Validate `value` for the parameter `name`.
///
/// Returns `Ok(())` without touching the value when it satisfies `check`,
/// otherwise an [`InputError`] naming the parameter.
pub fn validate(name: &str, value: &Value, check: Check<'_>) -> Result<()> {
    let ok = match check {
        Check::Kinds(kinds) => kinds.contains(&value.kind()),
        Check::Handle => {
            value.kind() == ValueKind::Pointer
                && value.cname() == "void *"
                && value.as_handle().map_or(false, |h| !h.is_closed())
        }
        Check::Utf8 => match value {
            Value::String(_) => true,
            Value::Bytes(bytes) => std::str::from_utf8(bytes).is_ok(),
            _ => false,
        },
        Check::Overlapped => is_struct_or_null(value, StructKind::Overlapped),
        Check::SecurityAttributes => is_struct_or_null(value, StructKind::SecurityAttributes),
        Check::OneOf(allowed) => value.as_integer().map_or(false, |v| allowed.contains(&v)),
    };

    if ok {
        Ok(())
    } else {
        Err(InputError::new(name, check.to_string(), describe(value)).into())
    }
}

fn is_struct_or_null(value: &Value, kind: StructKind) -> bool {
    match value {
        Value::Null => true,
        Value::Struct(ptr) => ptr.cname() == kind.cname(),
        _ => false,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Handle(h) if h.is_closed() => format!("{} (closed)", h),
        other => format!("{} ({})", other, other.cname()),
    }
}

/// Convert an integer argument to a `DWORD`.
///
/// Anything outside `0..=u32::MAX` is rejected rather than wrapped.
pub fn dword(name: &str, value: &Value) -> Result<u32> {
    validate(name, value, INTEGER)?;
    let v = value.as_integer().unwrap_or_default();
    u32::try_from(v).map_err(|_| InputError::new(name, "an unsigned 32-bit integer", v).into())
}

/// Success policy for a native return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The call must return exactly this value.
    Exactly(i64),
    /// Any non-zero value is success (`BOOL` returning functions).
    NonZero,
    /// Anything but this value is success (`INVALID_HANDLE_VALUE` sentinels).
    NotEqual(i64),
}

impl Expected {
    pub fn accepts(&self, code: i64) -> bool {
        match *self {
            Expected::Exactly(v) => code == v,
            Expected::NonZero => code != 0,
            Expected::NotEqual(v) => code != v,
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Exactly(v) => write!(f, "{}", v),
            Expected::NonZero => write!(f, "non-zero"),
            Expected::NotEqual(v) => write!(f, "not {}", v),
        }
    }
}

/// Check the return code of `function` against `expected`.
///
/// The last-error state is only read when the comparison fails.
pub fn check_result(
    api: &dyn NativeApi,
    function: &str,
    code: i64,
    expected: Expected,
) -> Result<()> {
    if expected.accepts(code) {
        return Ok(());
    }

    let last = api.last_error();
    debug!(
        function,
        code,
        %expected,
        error = last.code,
        detail = %last.message,
        "native call failed"
    );
    Err(WindowsApiError {
        function: function.to_string(),
        code: last.code,
        message: last.message,
        return_code: Some(code),
        expected: Some(expected),
    }
    .into())
}

/// Fail if the last-error state of the calling thread is non-zero.
///
/// For calls whose success path also reports through last-error
/// (`CreateFile` sets `ERROR_ALREADY_EXISTS` on success).
pub fn check_last_error(api: &dyn NativeApi, function: &str) -> Result<()> {
    let last = api.last_error();
    if last.code == 0 {
        return Ok(());
    }

    debug!(function, error = last.code, detail = %last.message, "last error set");
    Err(WindowsApiError {
        function: function.to_string(),
        code: last.code,
        message: last.message,
        return_code: None,
        expected: None,
    }
    .into())
}
