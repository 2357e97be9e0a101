//! Process functions

use tracing::trace;

use crate::handle::Handle;
use crate::native::Library;

/// Pseudo-handle for the calling process (`GetCurrentProcess`).
///
/// The value is only meaningful inside this process and must not be
/// closed; it is returned as a borrowed [`Handle`].
pub fn get_current_process(lib: &Library) -> Handle {
    let raw = lib.native().get_current_process();
    trace!(raw, "GetCurrentProcess");
    Handle::borrowed(raw)
}
