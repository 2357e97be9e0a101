//! Handle functions

use tracing::{debug, trace};

use super::{bool_arg, constants, handle_arg, invalid_handle_value};
use crate::checks::{check_result, dword, validate, Check, Expected};
use crate::error::Result;
use crate::handle::Handle;
use crate::native::Library;
use crate::value::Value;

/// One of the process's standard handles (`GetStdHandle`).
///
/// `std_handle` is `STD_INPUT_HANDLE`, `STD_OUTPUT_HANDLE` or
/// `STD_ERROR_HANDLE`. The returned handle is borrowed from the process
/// and is not meant to be closed by the caller.
pub fn get_std_handle(lib: &Library, std_handle: impl Into<Value>) -> Result<Handle> {
    let std_handle = std_handle.into();
    let allowed = constants(
        lib,
        &["STD_INPUT_HANDLE", "STD_OUTPUT_HANDLE", "STD_ERROR_HANDLE"],
    )?;
    let invalid = invalid_handle_value(lib)?;

    validate("nStdHandle", &std_handle, Check::OneOf(&allowed))?;
    // The STD_* values are small negative DWORDs.
    let which = std_handle.as_integer().unwrap_or_default() as i32 as u32;

    let native = lib.native();
    let raw = native.get_std_handle(which);
    check_result(native, "GetStdHandle", raw as i64, Expected::NotEqual(invalid as i64))?;
    Ok(Handle::borrowed(raw))
}

/// Close `object` (`CloseHandle`). See [`Handle::close`].
pub fn close_handle(lib: &Library, object: impl Into<Value>) -> Result<()> {
    let object = object.into();
    handle_arg("hObject", &object)?.close(lib)
}

/// Flags of `object` (`GetHandleInformation`).
///
/// Refreshes the wrapper's inheritability from `HANDLE_FLAG_INHERIT`.
pub fn get_handle_information(lib: &Library, object: impl Into<Value>) -> Result<u32> {
    let object = object.into();
    let inherit = lib.constant("HANDLE_FLAG_INHERIT")? as u32;
    let handle = handle_arg("hObject", &object)?;

    let mut flags = 0u32;
    let native = lib.native();
    let code = native.get_handle_information(handle.raw(), &mut flags);
    check_result(native, "GetHandleInformation", code as i64, Expected::NonZero)?;

    handle.set_inheritable(flags & inherit != 0);
    Ok(flags)
}

/// Set the flags selected by `mask` to `flags` (`SetHandleInformation`).
pub fn set_handle_information(
    lib: &Library,
    object: impl Into<Value>,
    mask: impl Into<Value>,
    flags: impl Into<Value>,
) -> Result<()> {
    let object = object.into();
    let mask = mask.into();
    let flags = flags.into();
    let inherit = lib.constant("HANDLE_FLAG_INHERIT")? as u32;

    let handle = handle_arg("hObject", &object)?;
    let mask = dword("dwMask", &mask)?;
    let flags = dword("dwFlags", &flags)?;

    let native = lib.native();
    trace!(handle = handle.raw(), mask, flags, "SetHandleInformation");
    let code = native.set_handle_information(handle.raw(), mask, flags);
    check_result(native, "SetHandleInformation", code as i64, Expected::NonZero)?;

    if mask & inherit != 0 {
        handle.set_inheritable(flags & inherit != 0);
    }
    Ok(())
}

/// Duplicate `source` from one process into another (`DuplicateHandle`).
///
/// Defaults: no desired access, not inheritable, `DUPLICATE_SAME_ACCESS`.
/// The duplicate is a new owning handle. With `DUPLICATE_CLOSE_SOURCE` the
/// system closes the source even if duplication fails, and the source
/// wrapper is marked closed.
pub fn duplicate_handle(
    lib: &Library,
    source_process: impl Into<Value>,
    source: impl Into<Value>,
    target_process: impl Into<Value>,
    desired_access: Option<Value>,
    inherit_handle: Option<Value>,
    options: Option<Value>,
) -> Result<Handle> {
    let source_process = source_process.into();
    let source = source.into();
    let target_process = target_process.into();
    let desired_access = desired_access.unwrap_or(Value::Integer(0));
    let inherit_handle = inherit_handle.unwrap_or(Value::Bool(false));
    let options = match options {
        Some(v) => v,
        None => Value::Integer(lib.constant("DUPLICATE_SAME_ACCESS")?),
    };
    let close_source = lib.constant("DUPLICATE_CLOSE_SOURCE")? as u32;

    let source_process = handle_arg("hSourceProcessHandle", &source_process)?;
    let source = handle_arg("hSourceHandle", &source)?;
    let target_process = handle_arg("hTargetProcessHandle", &target_process)?;
    let desired_access = dword("dwDesiredAccess", &desired_access)?;
    let inherit = bool_arg("bInheritHandle", &inherit_handle)?;
    let options = dword("dwOptions", &options)?;

    let mut target = 0;
    let native = lib.native();
    trace!(
        source = source.raw(),
        desired_access,
        inherit,
        options,
        "DuplicateHandle"
    );
    let code = native.duplicate_handle(
        source_process.raw(),
        source.raw(),
        target_process.raw(),
        &mut target,
        desired_access,
        inherit,
        options,
    );
    let result = check_result(native, "DuplicateHandle", code as i64, Expected::NonZero);

    if options & close_source != 0 {
        debug!(source = source.raw(), "source closed by DuplicateHandle");
        source.mark_closed();
    }
    result?;

    Ok(Handle::new(target).with_inheritable(inherit))
}
