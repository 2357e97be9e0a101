//! File functions

use tracing::{debug, trace};

use super::{
    attributes_arg, constants, handle_arg, invalid_handle_value, optional_text, or_constant,
    overlapped_arg,
};
use crate::checks::{self, check_last_error, check_result, dword, validate, Check, Expected};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::native::{wide, Library};
use crate::value::Value;

/// Optional arguments of [`create_file`].
///
/// Omitted fields take defaults close to opening a file for writing:
/// `FILE_SHARE_READ`, no security attributes, `CREATE_ALWAYS`,
/// `FILE_ATTRIBUTE_NORMAL` and no template.
#[derive(Debug, Clone, Default)]
pub struct CreateFileOptions {
    pub share_mode: Option<Value>,
    pub security_attributes: Option<Value>,
    pub creation_disposition: Option<Value>,
    pub flags_and_attributes: Option<Value>,
    pub template_file: Option<Value>,
}

impl CreateFileOptions {
    pub fn share_mode(mut self, v: impl Into<Value>) -> Self {
        self.share_mode = Some(v.into());
        self
    }

    pub fn security_attributes(mut self, v: impl Into<Value>) -> Self {
        self.security_attributes = Some(v.into());
        self
    }

    pub fn creation_disposition(mut self, v: impl Into<Value>) -> Self {
        self.creation_disposition = Some(v.into());
        self
    }

    pub fn flags_and_attributes(mut self, v: impl Into<Value>) -> Self {
        self.flags_and_attributes = Some(v.into());
        self
    }

    pub fn template_file(mut self, v: impl Into<Value>) -> Self {
        self.template_file = Some(v.into());
        self
    }
}

/// Create or open a file (`CreateFileW`).
///
/// Under `CREATE_ALWAYS` or `OPEN_ALWAYS` the system reports
/// `ERROR_ALREADY_EXISTS` when the file was already there. The handle is
/// valid in that case and is returned as a success.
pub fn create_file(
    lib: &Library,
    file_name: impl Into<Value>,
    desired_access: impl Into<Value>,
    options: CreateFileOptions,
) -> Result<Handle> {
    let file_name = file_name.into();
    let desired_access = desired_access.into();
    let share_mode = or_constant(lib, options.share_mode, "FILE_SHARE_READ")?;
    let security_attributes = options.security_attributes.unwrap_or(Value::Null);
    let disposition = or_constant(lib, options.creation_disposition, "CREATE_ALWAYS")?;
    let flags = or_constant(lib, options.flags_and_attributes, "FILE_ATTRIBUTE_NORMAL")?;
    let template_file = options.template_file.unwrap_or(Value::Null);

    let allowed = constants(
        lib,
        &[
            "CREATE_ALWAYS",
            "CREATE_NEW",
            "OPEN_ALWAYS",
            "OPEN_EXISTING",
            "TRUNCATE_EXISTING",
        ],
    )?;
    let always = constants(lib, &["CREATE_ALWAYS", "OPEN_ALWAYS"])?;
    let already_exists = lib.constant("ERROR_ALREADY_EXISTS")? as u32;
    let invalid = invalid_handle_value(lib)?;

    validate("lpFileName", &file_name, checks::TEXT)?;
    let desired_access = dword("dwDesiredAccess", &desired_access)?;
    let share_mode = dword("dwShareMode", &share_mode)?;
    validate(
        "lpSecurityAttributes",
        &security_attributes,
        Check::SecurityAttributes,
    )?;
    validate(
        "dwCreationDisposition",
        &disposition,
        Check::OneOf(&allowed),
    )?;
    let disposition = dword("dwCreationDisposition", &disposition)?;
    let flags = dword("dwFlagsAndAttributes", &flags)?;
    let template = if template_file.is_null() {
        0
    } else {
        handle_arg("hTemplateFile", &template_file)?.raw()
    };

    let name = wide(file_name.as_str().unwrap_or_default());
    let attributes = attributes_arg(&security_attributes);
    let native = lib.native();
    trace!(
        file = file_name.as_str().unwrap_or_default(),
        desired_access,
        share_mode,
        disposition,
        flags,
        "CreateFile"
    );
    let raw = native.create_file(
        &name,
        desired_access,
        share_mode,
        attributes.as_deref(),
        disposition,
        flags,
        template,
    );
    drop(attributes);

    let is_always = always.contains(&(disposition as i64));
    let checked = check_result(native, "CreateFile", raw as i64, Expected::NotEqual(invalid as i64))
        .and_then(|()| {
            // Success under an "always" disposition still reports through
            // the last-error state.
            if is_always {
                check_last_error(native, "CreateFile")
            } else {
                Ok(())
            }
        });

    match checked {
        Ok(()) => Ok(Handle::new(raw)),
        Err(err) if is_always && raw != invalid && err.code() == Some(already_exists) => {
            debug!(
                file = file_name.as_str().unwrap_or_default(),
                disposition, "file already existed"
            );
            Ok(Handle::new(raw))
        }
        Err(err) => Err(err),
    }
}

/// Read up to `bytes_to_read` bytes from `file` (`ReadFile`).
///
/// Returns the bytes actually read, which is fewer at end of file. With an
/// `OVERLAPPED` pointer the read starts at its offset; a request the system
/// leaves pending fails with `ERROR_IO_PENDING` and its completion is the
/// caller's business.
pub fn read_file(
    lib: &Library,
    file: impl Into<Value>,
    bytes_to_read: impl Into<Value>,
    overlapped: Option<Value>,
) -> Result<Vec<u8>> {
    let file = file.into();
    let bytes_to_read = bytes_to_read.into();
    let overlapped = overlapped.unwrap_or(Value::Null);
    let io_pending = lib.constant("ERROR_IO_PENDING")? as u32;

    let handle = handle_arg("hFile", &file)?;
    let len = dword("nNumberOfBytesToRead", &bytes_to_read)?;
    validate("lpOverlapped", &overlapped, Check::Overlapped)?;

    let mut buffer = vec![0u8; len as usize];
    let mut bytes_read = 0u32;
    let mut request = overlapped_arg(&overlapped);
    let native = lib.native();
    trace!(handle = handle.raw(), len, overlapped = request.is_some(), "ReadFile");
    let code = native.read_file(
        handle.raw(),
        &mut buffer,
        &mut bytes_read,
        request.as_deref_mut(),
    );
    drop(request);

    if let Err(err) = check_result(native, "ReadFile", code as i64, Expected::NonZero) {
        keep_alive_if_pending(&err, io_pending, buffer, &overlapped);
        return Err(err);
    }

    buffer.truncate(bytes_read as usize);
    Ok(buffer)
}

/// Write `buffer` to `file` (`WriteFile`), returning the bytes written.
///
/// Text is written as its UTF-8 encoding; bytes must themselves be valid
/// UTF-8.
pub fn write_file(
    lib: &Library,
    file: impl Into<Value>,
    buffer: impl Into<Value>,
    overlapped: Option<Value>,
) -> Result<u32> {
    let file = file.into();
    let buffer = buffer.into();
    let overlapped = overlapped.unwrap_or(Value::Null);
    let io_pending = lib.constant("ERROR_IO_PENDING")? as u32;

    let handle = handle_arg("hFile", &file)?;
    validate("lpBuffer", &buffer, Check::Utf8)?;
    validate("lpOverlapped", &overlapped, Check::Overlapped)?;

    let data = buffer.as_bytes().unwrap_or_default().to_vec();
    let mut bytes_written = 0u32;
    let mut request = overlapped_arg(&overlapped);
    let native = lib.native();
    trace!(handle = handle.raw(), len = data.len(), "WriteFile");
    let code = native.write_file(
        handle.raw(),
        &data,
        &mut bytes_written,
        request.as_deref_mut(),
    );
    drop(request);

    if let Err(err) = check_result(native, "WriteFile", code as i64, Expected::NonZero) {
        keep_alive_if_pending(&err, io_pending, data, &overlapped);
        return Err(err);
    }
    Ok(bytes_written)
}

/// A pending overlapped request still owns its buffer and its `OVERLAPPED`;
/// leak both rather than free memory the system will write to or read from.
fn keep_alive_if_pending(err: &Error, io_pending: u32, buffer: Vec<u8>, overlapped: &Value) {
    if err.code() == Some(io_pending) {
        debug!(len = buffer.len(), "I/O pending, buffer handed to the system");
        std::mem::forget(buffer);
        if let Some(request) = overlapped.as_struct() {
            std::mem::forget(request.clone());
        }
    }
}

/// Move or rename a file (`MoveFileExW`).
///
/// `new_file_name` of `None` (or `Null`) passes `NULL`, which together with
/// `MOVEFILE_DELAY_UNTIL_REBOOT` schedules a delete. Flags default to
/// `MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH`.
pub fn move_file_ex(
    lib: &Library,
    existing_file_name: impl Into<Value>,
    new_file_name: Option<Value>,
    flags: Option<Value>,
) -> Result<()> {
    let existing = existing_file_name.into();
    let new_file_name = new_file_name.unwrap_or(Value::Null);
    let flags = match flags {
        Some(v) => v,
        None => Value::Integer(
            lib.constant("MOVEFILE_REPLACE_EXISTING")? | lib.constant("MOVEFILE_WRITE_THROUGH")?,
        ),
    };

    validate("lpExistingFileName", &existing, checks::TEXT)?;
    let new_name = optional_text("lpNewFileName", &new_file_name)?;
    let flags = dword("dwFlags", &flags)?;

    let existing_name = wide(existing.as_str().unwrap_or_default());
    let native = lib.native();
    trace!(
        from = existing.as_str().unwrap_or_default(),
        to = new_file_name.as_str(),
        flags,
        "MoveFileEx"
    );
    let code = native.move_file_ex(&existing_name, new_name.as_deref(), flags);
    check_result(native, "MoveFileEx", code as i64, Expected::NonZero)
}
