//! Native Handle Wrapper
//!
//! [`Handle`] wraps a raw `HANDLE` value. It is never closed on drop: the
//! caller decides when a handle is released, because some handles are
//! borrowed from the system and must not be closed at all.
//!
//! # Pseudo-handles
//!
//! `GetCurrentProcess` returns a pseudo-handle that refers to the calling
//! process. It is represented as an ordinary, non-owning [`Handle`]
//! ([`Handle::borrowed`]). Callers must not close it; the wrapper does not
//! stop them, just as the platform does not distinguish pseudo-handles at
//! the type level.
//!
//! # Closed state
//!
//! Clones of a handle share their closed state. Once [`Handle::close`]
//! succeeds, a second close on any clone fails fast with an input error
//! instead of issuing another native close, which could hit an unrelated
//! object after the system recycled the handle value. The shared state is
//! reference counted without atomics, so `Handle` is not `Send`; a handle
//! shared across threads needs a single close owner.

use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::trace;

use crate::checks::{check_result, Expected};
use crate::error::{InputError, Result};
use crate::native::{Library, RawHandle};

#[derive(Debug, Default)]
struct HandleState {
    closed: Cell<bool>,
    inheritable: Cell<Option<bool>>,
}

/// A native handle
#[derive(Clone)]
pub struct Handle {
    raw: RawHandle,
    owned: bool,
    state: Rc<HandleState>,
}

impl Handle {
    /// Wrap a handle the caller owns and must eventually close.
    pub fn new(raw: RawHandle) -> Self {
        Self {
            raw,
            owned: true,
            state: Rc::default(),
        }
    }

    /// Wrap a handle owned by someone else (standard handles,
    /// pseudo-handles).
    pub fn borrowed(raw: RawHandle) -> Self {
        Self {
            owned: false,
            ..Self::new(raw)
        }
    }

    pub fn with_inheritable(self, inheritable: bool) -> Self {
        self.state.inheritable.set(Some(inheritable));
        self
    }

    /// Raw value to pass back into native calls
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    /// Last known inheritability, if it was ever observed or set.
    pub fn inheritable(&self) -> Option<bool> {
        self.state.inheritable.get()
    }

    pub(crate) fn set_inheritable(&self, inheritable: bool) {
        self.state.inheritable.set(Some(inheritable));
    }

    pub(crate) fn mark_closed(&self) {
        self.state.closed.set(true);
    }

    /// Close the handle with `CloseHandle`.
    ///
    /// Fails with an input error, without calling into the native layer,
    /// if this handle (or a clone of it) was already closed.
    pub fn close(&self, lib: &Library) -> Result<()> {
        if self.is_closed() {
            let actual = format!("{} (closed)", self);
            return Err(InputError::new("hObject", "an open handle", actual).into());
        }

        trace!(handle = self.raw, owned = self.owned, "CloseHandle");
        let code = lib.native().close_handle(self.raw);
        check_result(lib.native(), "CloseHandle", code as i64, Expected::NonZero)?;

        self.mark_closed();
        Ok(())
    }

    /// Duplicate within the current process with the same access rights.
    ///
    /// The duplicate is independently owned and must be closed on its own.
    pub fn duplicate(&self, lib: &Library, inheritable: bool) -> Result<Handle> {
        let process = crate::kernel32::get_current_process(lib);
        crate::kernel32::duplicate_handle(
            lib,
            &process,
            self,
            &process,
            None,
            Some(inheritable.into()),
            None,
        )
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("raw", &format_args!("{:#x}", self.raw))
            .field("owned", &self.owned)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<HANDLE {:#x}>", self.raw)
    }
}

/// Borrow the handle of a file opened through `std`.
///
/// The `File` keeps ownership and closes the handle when dropped.
#[cfg(windows)]
impl From<&std::fs::File> for Handle {
    fn from(file: &std::fs::File) -> Self {
        use std::os::windows::io::AsRawHandle;
        Handle::borrowed(file.as_raw_handle() as RawHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testutil::FakeKernel;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_ownership() {
        let a = Handle::new(0x10);
        let b = Handle::borrowed(0x10);
        let c = Handle::new(0x14).with_inheritable(true);

        assert_eq!(a, a);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_by_raw_value() {
        let mut set = HashSet::new();
        set.insert(Handle::new(0x10));
        set.insert(Handle::borrowed(0x10));
        set.insert(Handle::new(0x18));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_close_twice_fails_fast() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        let handle = crate::kernel32::create_event(&lib, true, false, None, None).unwrap();

        handle.close(&lib).unwrap();
        assert!(handle.is_closed());

        let err = handle.close(&lib).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert_eq!(kernel.calls("CloseHandle"), 1);
    }

    #[test]
    fn test_clones_share_closed_state() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        let handle = crate::kernel32::create_event(&lib, false, false, None, None).unwrap();
        let clone = handle.clone();

        handle.close(&lib).unwrap();
        assert!(clone.is_closed());
        assert!(clone.close(&lib).is_err());
        assert_eq!(kernel.calls("CloseHandle"), 1);
    }

    #[test]
    fn test_close_failure_is_translated() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        // Never issued by the kernel.
        let bogus = Handle::new(0x7ff0);

        let err = bogus.close(&lib).unwrap_err();
        assert_eq!(err.code(), Some(6));
        assert!(!bogus.is_closed());
    }

    #[test]
    fn test_duplicate_is_independent() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        let source = crate::kernel32::create_event(&lib, false, false, None, None).unwrap();
        let dup = source.duplicate(&lib, false).unwrap();

        assert_ne!(source.raw(), dup.raw());
        assert!(dup.is_owned());

        dup.close(&lib).unwrap();
        assert!(!source.is_closed());
        crate::kernel32::get_handle_information(&lib, &source).unwrap();
        source.close(&lib).unwrap();
    }

    #[test]
    fn test_debug_and_display() {
        let h = Handle::borrowed(0x2c);
        assert_eq!(h.to_string(), "<HANDLE 0x2c>");
        let dbg = format!("{:?}", h);
        assert!(dbg.contains("owned: false"));
    }
}
