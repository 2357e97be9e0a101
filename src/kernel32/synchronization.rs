//! Synchronization objects

use tracing::trace;

use super::{attributes_arg, bool_arg, optional_text};
use crate::checks::{check_result, validate, Check, Expected};
use crate::error::Result;
use crate::handle::Handle;
use crate::native::Library;
use crate::value::Value;

/// Create or open an event object (`CreateEventW`).
///
/// Opening an existing named event succeeds; the system sets
/// `ERROR_ALREADY_EXISTS` but returns a valid handle.
pub fn create_event(
    lib: &Library,
    manual_reset: impl Into<Value>,
    initial_state: impl Into<Value>,
    event_attributes: Option<Value>,
    name: Option<Value>,
) -> Result<Handle> {
    let manual_reset = manual_reset.into();
    let initial_state = initial_state.into();
    let event_attributes = event_attributes.unwrap_or(Value::Null);
    let name = name.unwrap_or(Value::Null);

    let manual_reset = bool_arg("bManualReset", &manual_reset)?;
    let initial_state = bool_arg("bInitialState", &initial_state)?;
    validate("lpEventAttributes", &event_attributes, Check::SecurityAttributes)?;
    let wide_name = optional_text("lpName", &name)?;

    let attributes = attributes_arg(&event_attributes);
    let native = lib.native();
    trace!(manual_reset, initial_state, name = name.as_str(), "CreateEvent");
    let raw = native.create_event(
        attributes.as_deref(),
        manual_reset,
        initial_state,
        wide_name.as_deref(),
    );
    drop(attributes);
    check_result(native, "CreateEvent", raw as i64, Expected::NonZero)?;
    Ok(Handle::new(raw))
}
