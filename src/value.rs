//! Foreign Value Model
//!
//! Values crossing the binding boundary are tagged rather than dynamically
//! introspected. Each value reports a coarse [`ValueKind`] plus the C type
//! name the native layer would see, which is what the argument checks in
//! [`crate::checks`] validate against.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::handle::Handle;
use crate::native::{Overlapped, SecurityAttributes};

/// Coarse native kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The null sentinel
    Null,
    /// Boolean (`BOOL`)
    Bool,
    /// Integer (`DWORD`, `LONG`, ...)
    Integer,
    /// Text
    String,
    /// Raw bytes
    Bytes,
    /// Pointer-shaped value (handles and structure pointers)
    Pointer,
}

impl ValueKind {
    /// Parse from a string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "null" | "none" => Some(ValueKind::Null),
            "bool" | "boolean" => Some(ValueKind::Bool),
            "int" | "integer" | "dword" => Some(ValueKind::Integer),
            "str" | "string" | "text" => Some(ValueKind::String),
            "bytes" | "buffer" => Some(ValueKind::Bytes),
            "ptr" | "pointer" => Some(ValueKind::Pointer),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Bytes => write!(f, "bytes"),
            ValueKind::Pointer => write!(f, "pointer"),
        }
    }
}

/// Structures that may be passed by pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Overlapped,
    SecurityAttributes,
}

impl StructKind {
    /// C type name of a pointer to this structure.
    pub fn cname(&self) -> &'static str {
        match self {
            StructKind::Overlapped => "OVERLAPPED *",
            StructKind::SecurityAttributes => "SECURITY_ATTRIBUTES *",
        }
    }
}

/// A structure passed to native code by address.
///
/// The structure lives in shared storage owned by the value, so the address
/// stays valid for as long as any clone is alive. Clones share the same
/// structure: after a call, read what the system wrote back through any of
/// them.
#[derive(Debug, Clone)]
pub struct StructPtr {
    shared: Shared,
}

#[derive(Debug, Clone)]
enum Shared {
    Overlapped(Rc<RefCell<Overlapped>>),
    SecurityAttributes(Rc<RefCell<SecurityAttributes>>),
}

impl StructPtr {
    pub fn overlapped(value: Overlapped) -> Self {
        Self {
            shared: Shared::Overlapped(Rc::new(RefCell::new(value))),
        }
    }

    pub fn security_attributes(value: SecurityAttributes) -> Self {
        Self {
            shared: Shared::SecurityAttributes(Rc::new(RefCell::new(value))),
        }
    }

    pub fn kind(&self) -> StructKind {
        match self.shared {
            Shared::Overlapped(_) => StructKind::Overlapped,
            Shared::SecurityAttributes(_) => StructKind::SecurityAttributes,
        }
    }

    /// Address the native layer sees.
    pub fn addr(&self) -> usize {
        match &self.shared {
            Shared::Overlapped(cell) => cell.as_ptr() as usize,
            Shared::SecurityAttributes(cell) => cell.as_ptr() as usize,
        }
    }

    pub fn cname(&self) -> &'static str {
        self.kind().cname()
    }

    /// Current contents, if this is an `OVERLAPPED`.
    pub fn get_overlapped(&self) -> Option<Overlapped> {
        self.overlapped_cell().map(|cell| *cell.borrow())
    }

    /// Current contents, if this is a `SECURITY_ATTRIBUTES`.
    pub fn get_security_attributes(&self) -> Option<SecurityAttributes> {
        self.security_attributes_cell().map(|cell| *cell.borrow())
    }

    pub(crate) fn overlapped_cell(&self) -> Option<&Rc<RefCell<Overlapped>>> {
        match &self.shared {
            Shared::Overlapped(cell) => Some(cell),
            _ => None,
        }
    }

    pub(crate) fn security_attributes_cell(&self) -> Option<&Rc<RefCell<SecurityAttributes>>> {
        match &self.shared {
            Shared::SecurityAttributes(cell) => Some(cell),
            _ => None,
        }
    }
}

impl PartialEq for StructPtr {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for StructPtr {}

impl Hash for StructPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

/// A value passed to or returned from a bound function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The null sentinel (`NULL`, or "argument omitted")
    Null,
    Bool(bool),
    Integer(i64),
    String(String),
    Bytes(Vec<u8>),
    Handle(Handle),
    Struct(StructPtr),
}

impl Value {
    /// Coarse kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Handle(_) | Value::Struct(_) => ValueKind::Pointer,
        }
    }

    /// C type name the native layer would see for this value
    pub fn cname(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Integer(_) => "DWORD",
            Value::String(_) => "wchar_t *",
            Value::Bytes(_) => "char *",
            Value::Handle(_) => "void *",
            Value::Struct(ptr) => ptr.cname(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Truthiness as a native `BOOL`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructPtr> {
        match self {
            Value::Struct(ptr) => Some(ptr),
            _ => None,
        }
    }

    /// Bytes of a text or byte value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Parse a command-line literal.
    ///
    /// `null`/`none`, `true`/`false`, decimal or `0x` hex integers (with an
    /// optional leading `-`); everything else is a string.
    pub fn parse(literal: &str) -> Self {
        let trimmed = literal.trim();
        match trimmed.to_lowercase().as_str() {
            "null" | "none" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let magnitude = if digits.starts_with(|c: char| c == '+' || c == '-') {
            None
        } else {
            match digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
            {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u64>().ok(),
            }
        };
        let parsed = magnitude.and_then(|m| {
            if negative {
                0i64.checked_sub_unsigned(m)
            } else {
                i64::try_from(m).ok()
            }
        });

        match parsed {
            Some(v) => Value::Integer(v),
            None => Value::String(literal.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Handle(h) => write!(f, "{}", h),
            Value::Struct(ptr) => write!(f, "<{} {:#x}>", ptr.cname(), ptr.addr()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Handle> for Value {
    fn from(v: Handle) -> Self {
        Value::Handle(v)
    }
}

impl From<&Handle> for Value {
    fn from(v: &Handle) -> Self {
        Value::Handle(v.clone())
    }
}

impl From<StructPtr> for Value {
    fn from(v: StructPtr) -> Self {
        Value::Struct(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
