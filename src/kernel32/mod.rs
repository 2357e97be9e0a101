//! kernel32 Wrappers
//!
//! Thin functions over the bound primitives. Every wrapper follows the
//! same shape:
//!
//! ```text
//! apply defaults for omitted arguments (from the constant catalog)
//!       │
//!       ▼
//! checks::validate every argument, first failure wins
//!       │
//!       ▼
//! marshal (UTF-16 names, raw handles, structure pointers)
//!       │
//!       ▼
//! native call
//!       │
//!       ▼
//! checks::check_result, immediately
//!       │
//!       ▼
//! wrap returned handles
//! ```
//!
//! Parameter names in errors follow the Win32 documentation (`hFile`,
//! `dwCreationDisposition`). Optional parameters are `Option<Value>`;
//! `None` selects the documented default.

mod file;
mod handle;
mod process;
mod synchronization;

pub use file::{create_file, move_file_ex, read_file, write_file, CreateFileOptions};
pub use handle::{
    close_handle, duplicate_handle, get_handle_information, get_std_handle,
    set_handle_information,
};
pub use process::get_current_process;
pub use synchronization::create_event;

use std::cell::{Ref, RefMut};

use crate::checks::{self, validate, Check};
use crate::error::{InputError, Result};
use crate::handle::Handle;
use crate::native::{Library, Overlapped, RawHandle, SecurityAttributes};
use crate::value::{StructPtr, Value};

/// `INVALID_HANDLE_VALUE` from the catalog.
fn invalid_handle_value(lib: &Library) -> Result<RawHandle> {
    Ok(lib.constant("INVALID_HANDLE_VALUE")? as RawHandle)
}

/// The argument, or the named catalog constant when omitted.
fn or_constant(lib: &Library, value: Option<Value>, constant: &str) -> Result<Value> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Value::Integer(lib.constant(constant)?)),
    }
}

/// Values of the named constants, for allowed-value checks.
fn constants(lib: &Library, names: &[&str]) -> Result<Vec<i64>> {
    names.iter().map(|name| lib.constant(name)).collect()
}

/// Validate a required handle argument and borrow it.
fn handle_arg<'v>(name: &str, value: &'v Value) -> Result<&'v Handle> {
    validate(name, value, Check::Handle)?;
    value
        .as_handle()
        .ok_or_else(|| InputError::new(name, Check::Handle.to_string(), value).into())
}

fn bool_arg(name: &str, value: &Value) -> Result<bool> {
    validate(name, value, checks::BOOL)?;
    Ok(value.as_bool().unwrap_or_default())
}

/// Optional text argument: `Null` means no string.
fn optional_text(name: &str, value: &Value) -> Result<Option<Vec<u16>>> {
    if value.is_null() {
        return Ok(None);
    }
    validate(name, value, checks::TEXT)?;
    Ok(value.as_str().map(crate::native::wide))
}

/// Borrow the structure behind a validated `SECURITY_ATTRIBUTES` argument.
fn attributes_arg(value: &Value) -> Option<Ref<'_, SecurityAttributes>> {
    value
        .as_struct()
        .and_then(StructPtr::security_attributes_cell)
        .map(|cell| cell.borrow())
}

/// Borrow the structure behind a validated `OVERLAPPED` argument for the
/// system to update.
fn overlapped_arg(value: &Value) -> Option<RefMut<'_, Overlapped>> {
    value
        .as_struct()
        .and_then(StructPtr::overlapped_cell)
        .map(|cell| cell.borrow_mut())
}

#[cfg(test)]
mod tests;
