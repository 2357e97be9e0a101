//! Native structure layouts passed by pointer.

use std::ffi::c_void;

use super::RawHandle;

/// `OVERLAPPED`
///
/// Owned by the caller for the whole lifetime of an asynchronous request.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Overlapped {
    pub internal: usize,
    pub internal_high: usize,
    pub offset: u32,
    pub offset_high: u32,
    pub event: RawHandle,
}

impl Overlapped {
    /// Request starting at `offset`, signalling `event` on completion.
    pub fn at(offset: u64, event: RawHandle) -> Self {
        Self {
            offset: offset as u32,
            offset_high: (offset >> 32) as u32,
            event,
            ..Self::default()
        }
    }
}

/// `SECURITY_ATTRIBUTES`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SecurityAttributes {
    pub length: u32,
    pub security_descriptor: *mut c_void,
    pub inherit_handle: i32,
}

impl SecurityAttributes {
    /// Default descriptor, with or without handle inheritance.
    pub fn inheritable(inherit: bool) -> Self {
        Self {
            length: std::mem::size_of::<Self>() as u32,
            security_descriptor: std::ptr::null_mut(),
            inherit_handle: inherit as i32,
        }
    }
}

impl Default for SecurityAttributes {
    fn default() -> Self {
        Self::inheritable(false)
    }
}
