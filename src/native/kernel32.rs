//! kernel32 Loader
//!
//! Loads `kernel32.dll` with libloading and binds the wide-character entry
//! points behind [`NativeApi`].

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library as DynamicLibrary;
use tracing::{debug, trace};

use super::{LastError, NativeApi, Overlapped, RawHandle, SecurityAttributes};
use crate::config::LibraryConfig;
use crate::error::{Error, Result};

type CreateFileW = unsafe extern "system" fn(
    *const u16,
    u32,
    u32,
    *const SecurityAttributes,
    u32,
    u32,
    RawHandle,
) -> RawHandle;
type ReadFile =
    unsafe extern "system" fn(RawHandle, *mut c_void, u32, *mut u32, *mut Overlapped) -> i32;
type WriteFile =
    unsafe extern "system" fn(RawHandle, *const c_void, u32, *mut u32, *mut Overlapped) -> i32;
type MoveFileExW = unsafe extern "system" fn(*const u16, *const u16, u32) -> i32;
type CloseHandle = unsafe extern "system" fn(RawHandle) -> i32;
type DuplicateHandle = unsafe extern "system" fn(
    RawHandle,
    RawHandle,
    RawHandle,
    *mut RawHandle,
    u32,
    i32,
    u32,
) -> i32;
type GetHandleInformation = unsafe extern "system" fn(RawHandle, *mut u32) -> i32;
type SetHandleInformation = unsafe extern "system" fn(RawHandle, u32, u32) -> i32;
type GetStdHandle = unsafe extern "system" fn(u32) -> RawHandle;
type GetCurrentProcess = unsafe extern "system" fn() -> RawHandle;
type CreateEventW =
    unsafe extern "system" fn(*const SecurityAttributes, i32, i32, *const u16) -> RawHandle;
type GetLastError = unsafe extern "system" fn() -> u32;
type FormatMessageW =
    unsafe extern "system" fn(u32, *const c_void, u32, u32, *mut u16, u32, *mut c_void) -> u32;

const FORMAT_MESSAGE_IGNORE_INSERTS: u32 = 0x0000_0200;
const FORMAT_MESSAGE_FROM_SYSTEM: u32 = 0x0000_1000;

/// kernel32 bound through dynamic loading
pub struct Kernel32 {
    path: PathBuf,
    create_file: CreateFileW,
    read_file: ReadFile,
    write_file: WriteFile,
    move_file_ex: MoveFileExW,
    close_handle: CloseHandle,
    duplicate_handle: DuplicateHandle,
    get_handle_information: GetHandleInformation,
    set_handle_information: SetHandleInformation,
    get_std_handle: GetStdHandle,
    get_current_process: GetCurrentProcess,
    create_event: CreateEventW,
    get_last_error: GetLastError,
    format_message: FormatMessageW,
    // Keeps every function pointer above valid.
    _library: DynamicLibrary,
}

impl Kernel32 {
    /// Find and load the library named by `config`, resolving every symbol.
    pub fn load(config: &LibraryConfig) -> Result<Self> {
        let path = find_library(&config.name, &config.search_paths);

        // Safety: loading kernel32 runs no user-supplied initialisation code.
        let library = unsafe {
            DynamicLibrary::new(&path).map_err(|e| {
                Error::Runtime(format!(
                    "Failed to load library '{}': {}",
                    path.display(),
                    e
                ))
            })?
        };
        debug!(path = %path.display(), "loaded native library");

        // Safety: the declared signatures match the documented Win32
        // prototypes of the wide-character entry points.
        unsafe {
            Ok(Self {
                create_file: symbol(&library, &path, "CreateFileW")?,
                read_file: symbol(&library, &path, "ReadFile")?,
                write_file: symbol(&library, &path, "WriteFile")?,
                move_file_ex: symbol(&library, &path, "MoveFileExW")?,
                close_handle: symbol(&library, &path, "CloseHandle")?,
                duplicate_handle: symbol(&library, &path, "DuplicateHandle")?,
                get_handle_information: symbol(&library, &path, "GetHandleInformation")?,
                set_handle_information: symbol(&library, &path, "SetHandleInformation")?,
                get_std_handle: symbol(&library, &path, "GetStdHandle")?,
                get_current_process: symbol(&library, &path, "GetCurrentProcess")?,
                create_event: symbol(&library, &path, "CreateEventW")?,
                get_last_error: symbol(&library, &path, "GetLastError")?,
                format_message: symbol(&library, &path, "FormatMessageW")?,
                path,
                _library: library,
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn message_for(&self, code: u32) -> String {
        let mut buffer = [0u16; 512];
        // Safety: the buffer length passed matches the buffer.
        let len = unsafe {
            (self.format_message)(
                FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
                ptr::null(),
                code,
                0,
                buffer.as_mut_ptr(),
                buffer.len() as u32,
                ptr::null_mut(),
            )
        };
        String::from_utf16_lossy(&buffer[..len as usize])
            .trim_end()
            .to_string()
    }
}

unsafe fn symbol<T: Copy>(library: &DynamicLibrary, path: &Path, name: &str) -> Result<T> {
    let mut c_name = name.as_bytes().to_vec();
    c_name.push(0);
    let sym = library.get::<T>(&c_name).map_err(|e| {
        Error::Runtime(format!(
            "Symbol '{}' not found in '{}': {}",
            name,
            path.display(),
            e
        ))
    })?;
    Ok(*sym)
}

/// Resolve `name` against the search paths, falling back to the bare name
/// so the system loader can search its own directories.
fn find_library(name: &str, search_paths: &[PathBuf]) -> PathBuf {
    let path = Path::new(name);
    if path.exists() {
        return path.to_path_buf();
    }

    let file_name = if name.to_lowercase().ends_with(".dll") {
        name.to_string()
    } else {
        format!("{}.dll", name)
    };

    search_paths
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(file_name))
}

fn opt_ptr<T>(p: Option<&T>) -> *const T {
    p.map_or(ptr::null(), |r| r as *const T)
}

fn opt_mut_ptr<T>(p: Option<&mut T>) -> *mut T {
    p.map_or(ptr::null_mut(), |r| r as *mut T)
}

impl NativeApi for Kernel32 {
    fn last_error(&self) -> LastError {
        // Safety: no arguments.
        let code = unsafe { (self.get_last_error)() };
        LastError::new(code, self.message_for(code))
    }

    fn create_file(
        &self,
        file_name: &[u16],
        desired_access: u32,
        share_mode: u32,
        security_attributes: Option<&SecurityAttributes>,
        creation_disposition: u32,
        flags_and_attributes: u32,
        template_file: RawHandle,
    ) -> RawHandle {
        trace!(desired_access, share_mode, creation_disposition, "CreateFileW");
        // Safety: file_name is NUL-terminated; attributes are borrowed for the call.
        unsafe {
            (self.create_file)(
                file_name.as_ptr(),
                desired_access,
                share_mode,
                opt_ptr(security_attributes),
                creation_disposition,
                flags_and_attributes,
                template_file,
            )
        }
    }

    fn read_file(
        &self,
        file: RawHandle,
        buffer: &mut [u8],
        bytes_read: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32 {
        trace!(handle = file, len = buffer.len(), "ReadFile");
        // Safety: buffer and bytes_read are live for the call.
        unsafe {
            (self.read_file)(
                file,
                buffer.as_mut_ptr().cast(),
                buffer.len() as u32,
                bytes_read,
                opt_mut_ptr(overlapped),
            )
        }
    }

    fn write_file(
        &self,
        file: RawHandle,
        buffer: &[u8],
        bytes_written: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32 {
        trace!(handle = file, len = buffer.len(), "WriteFile");
        // Safety: buffer and bytes_written are live for the call.
        unsafe {
            (self.write_file)(
                file,
                buffer.as_ptr().cast(),
                buffer.len() as u32,
                bytes_written,
                opt_mut_ptr(overlapped),
            )
        }
    }

    fn move_file_ex(&self, existing: &[u16], new: Option<&[u16]>, flags: u32) -> i32 {
        trace!(flags, "MoveFileExW");
        // Safety: both names are NUL-terminated.
        unsafe {
            (self.move_file_ex)(
                existing.as_ptr(),
                new.map_or(ptr::null(), |n| n.as_ptr()),
                flags,
            )
        }
    }

    fn close_handle(&self, handle: RawHandle) -> i32 {
        // Safety: CloseHandle tolerates invalid values and reports failure.
        unsafe { (self.close_handle)(handle) }
    }

    fn duplicate_handle(
        &self,
        source_process: RawHandle,
        source: RawHandle,
        target_process: RawHandle,
        target: &mut RawHandle,
        desired_access: u32,
        inherit: bool,
        options: u32,
    ) -> i32 {
        trace!(source, desired_access, inherit, options, "DuplicateHandle");
        // Safety: target is live for the call.
        unsafe {
            (self.duplicate_handle)(
                source_process,
                source,
                target_process,
                target,
                desired_access,
                inherit as i32,
                options,
            )
        }
    }

    fn get_handle_information(&self, handle: RawHandle, flags: &mut u32) -> i32 {
        // Safety: flags is live for the call.
        unsafe { (self.get_handle_information)(handle, flags) }
    }

    fn set_handle_information(&self, handle: RawHandle, mask: u32, flags: u32) -> i32 {
        trace!(handle, mask, flags, "SetHandleInformation");
        // Safety: plain values.
        unsafe { (self.set_handle_information)(handle, mask, flags) }
    }

    fn get_std_handle(&self, std_handle: u32) -> RawHandle {
        // Safety: plain value.
        unsafe { (self.get_std_handle)(std_handle) }
    }

    fn get_current_process(&self) -> RawHandle {
        // Safety: no arguments.
        unsafe { (self.get_current_process)() }
    }

    fn create_event(
        &self,
        event_attributes: Option<&SecurityAttributes>,
        manual_reset: bool,
        initial_state: bool,
        name: Option<&[u16]>,
    ) -> RawHandle {
        trace!(manual_reset, initial_state, named = name.is_some(), "CreateEventW");
        // Safety: name is NUL-terminated; attributes are borrowed for the call.
        unsafe {
            (self.create_event)(
                opt_ptr(event_attributes),
                manual_reset as i32,
                initial_state as i32,
                name.map_or(ptr::null(), |n| n.as_ptr()),
            )
        }
    }
}
