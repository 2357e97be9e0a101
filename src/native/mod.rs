//! Native Layer
//!
//! The binding layer talks to the operating system through [`NativeApi`],
//! one method per bound primitive plus the calling thread's last-error
//! state. [`Library`] is the loaded library: constructed once, passed by
//! reference to every operation, and carrying the constant catalog the
//! wrappers take defaults and allowed-value sets from.
//!
//! # Architecture
//!
//! ```text
//! kernel32::CreateFile(lib, ...)
//!       │
//!       ▼
//! checks::validate (every argument)
//!       │
//!       ▼
//! lib.native().create_file(...)     Kernel32 (libloading) or FakeKernel
//!       │
//!       ▼
//! checks::check_result / check_last_error
//!       │
//!       ▼
//! Handle
//! ```

mod catalog;
#[cfg(windows)]
mod kernel32;
mod types;

pub use catalog::{Catalog, CONSTANTS_HEADER};
#[cfg(windows)]
pub use kernel32::Kernel32;
pub use types::{Overlapped, SecurityAttributes};

use std::fmt;

use crate::config::WinffiConfig;
use crate::error::Result;

/// Raw `HANDLE` value (pointer sized).
pub type RawHandle = isize;

/// Last-error state of the calling thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: u32,
    pub message: String,
}

impl LastError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Native primitives bound by this crate.
///
/// Arguments are already validated and marshalled: strings are
/// NUL-terminated UTF-16, optional structures are `Option` references,
/// handles are raw.
/// Return values are the untranslated native results; callers must run
/// the error translator before making any other native call, since
/// [`NativeApi::last_error`] reports thread-local state that the next call
/// may overwrite.
pub trait NativeApi {
    /// `GetLastError` plus its system message.
    fn last_error(&self) -> LastError;

    #[allow(clippy::too_many_arguments)]
    fn create_file(
        &self,
        file_name: &[u16],
        desired_access: u32,
        share_mode: u32,
        security_attributes: Option<&SecurityAttributes>,
        creation_disposition: u32,
        flags_and_attributes: u32,
        template_file: RawHandle,
    ) -> RawHandle;

    fn read_file(
        &self,
        file: RawHandle,
        buffer: &mut [u8],
        bytes_read: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32;

    fn write_file(
        &self,
        file: RawHandle,
        buffer: &[u8],
        bytes_written: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32;

    fn move_file_ex(&self, existing: &[u16], new: Option<&[u16]>, flags: u32) -> i32;

    fn close_handle(&self, handle: RawHandle) -> i32;

    #[allow(clippy::too_many_arguments)]
    fn duplicate_handle(
        &self,
        source_process: RawHandle,
        source: RawHandle,
        target_process: RawHandle,
        target: &mut RawHandle,
        desired_access: u32,
        inherit: bool,
        options: u32,
    ) -> i32;

    fn get_handle_information(&self, handle: RawHandle, flags: &mut u32) -> i32;

    fn set_handle_information(&self, handle: RawHandle, mask: u32, flags: u32) -> i32;

    fn get_std_handle(&self, std_handle: u32) -> RawHandle;

    fn get_current_process(&self) -> RawHandle;

    fn create_event(
        &self,
        event_attributes: Option<&SecurityAttributes>,
        manual_reset: bool,
        initial_state: bool,
        name: Option<&[u16]>,
    ) -> RawHandle;
}

/// The loaded native library and its constant catalog.
pub struct Library {
    native: Box<dyn NativeApi>,
    catalog: Catalog,
}

impl Library {
    /// Wrap a native implementation using the bundled constant catalog.
    pub fn new(native: Box<dyn NativeApi>) -> Self {
        Self::with_catalog(native, Catalog::bundled())
    }

    pub fn with_catalog(native: Box<dyn NativeApi>, catalog: Catalog) -> Self {
        Self { native, catalog }
    }

    /// Load kernel32 with the default configuration.
    #[cfg(windows)]
    pub fn load() -> Result<Self> {
        Self::load_with_config(&WinffiConfig::default())
    }

    /// Load kernel32 as described by `config`.
    #[cfg(windows)]
    pub fn load_with_config(config: &WinffiConfig) -> Result<Self> {
        let catalog = Catalog::from_config(config)?;
        let kernel = Kernel32::load(&config.library)?;
        Ok(Self::with_catalog(Box::new(kernel), catalog))
    }

    #[cfg(not(windows))]
    pub fn load() -> Result<Self> {
        Self::load_with_config(&WinffiConfig::default())
    }

    #[cfg(not(windows))]
    pub fn load_with_config(config: &WinffiConfig) -> Result<Self> {
        Err(crate::error::Error::Runtime(format!(
            "cannot load '{}': kernel32 is only available on Windows",
            config.library.name
        )))
    }

    pub fn native(&self) -> &dyn NativeApi {
        self.native.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Look up a named constant.
    pub fn constant(&self, name: &str) -> Result<i64> {
        self.catalog.get(name)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("constants", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Encode `s` as NUL-terminated UTF-16.
pub fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode NUL-terminated (or unterminated) UTF-16.
pub fn from_wide(w: &[u16]) -> String {
    let end = w.iter().position(|&c| c == 0).unwrap_or(w.len());
    String::from_utf16_lossy(&w[..end])
}
