//! Function Registry
//!
//! Dispatch table from native function names to the typed wrappers in
//! [`crate::kernel32`], for hosts that hold arguments as dynamic
//! [`Value`]s (a scripting layer, the `winffi call` command).
//!
//! ```
//! use winffi::registry::FunctionRegistry;
//! use winffi::testutil::FakeKernel;
//! use winffi::Value;
//!
//! let lib = FakeKernel::new().library();
//! let registry = FunctionRegistry::with_kernel32();
//!
//! let process = registry.call(&lib, "GetCurrentProcess", &[]).unwrap();
//! assert!(matches!(process, Value::Handle(_)));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::error::{Error, InputError, Result};
use crate::kernel32::{self, CreateFileOptions};
use crate::native::Library;
use crate::value::Value;

/// Wrapper entry point taking positional arguments.
pub type Callable = fn(&Library, &[Value]) -> Result<Value>;

/// A documented parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    /// Omitted trailing arguments take the wrapper's default.
    pub optional: bool,
}

// Struct literals, so parameter lists promote to `&'static`.
macro_rules! required {
    ($name:literal) => {
        Param {
            name: $name,
            optional: false,
        }
    };
}

macro_rules! optional {
    ($name:literal) => {
        Param {
            name: $name,
            optional: true,
        }
    };
}

/// Information about a registered function
#[derive(Clone)]
pub struct FunctionInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
    /// Keywords for [`FunctionRegistry::search`]
    pub keywords: &'static [&'static str],
    call: Callable,
}

impl FunctionInfo {
    pub fn new(
        name: &'static str,
        description: &'static str,
        params: &'static [Param],
        call: Callable,
    ) -> Self {
        Self {
            name,
            description,
            params,
            keywords: &[],
            call,
        }
    }

    pub fn with_keywords(mut self, keywords: &'static [&'static str]) -> Self {
        self.keywords = keywords;
        self
    }

    /// Number of arguments that must be supplied
    pub fn required_args(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// C-style signature, optional parameters in brackets
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.optional {
                    format!("[{}]", p.name)
                } else {
                    p.name.to_string()
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Registered functions by name
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, FunctionInfo>,
    keywords_index: HashMap<String, Vec<&'static str>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every wrapper in [`crate::kernel32`].
    pub fn with_kernel32() -> Self {
        let mut registry = Self::new();
        for info in kernel32_functions() {
            registry.register(info);
        }
        registry
    }

    /// Register a function, replacing one with the same name.
    pub fn register(&mut self, info: FunctionInfo) {
        for keyword in info.keywords {
            self.keywords_index
                .entry(keyword.to_lowercase())
                .or_default()
                .push(info.name);
        }
        self.functions.insert(info.name, info);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    /// All functions in name order
    pub fn list(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Functions whose keywords or description mention a query word,
    /// best matches first.
    pub fn search(&self, query: &str) -> Vec<&FunctionInfo> {
        let query = query.to_lowercase();
        let mut scores: HashMap<&'static str, u32> = HashMap::new();

        for word in query.split_whitespace() {
            if let Some(names) = self.keywords_index.get(word) {
                for name in names {
                    *scores.entry(name).or_default() += 2;
                }
            }
            for info in self.functions.values() {
                if info.description.to_lowercase().contains(word) {
                    *scores.entry(info.name).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<_> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
            .into_iter()
            .filter_map(|(name, _)| self.functions.get(name))
            .collect()
    }

    /// Call `name` with positional arguments.
    ///
    /// Missing trailing optional arguments take the wrapper defaults.
    pub fn call(&self, lib: &Library, name: &str, args: &[Value]) -> Result<Value> {
        let info = self
            .functions
            .get(name)
            .ok_or_else(|| Error::Runtime(format!("unknown function: {}", name)))?;

        let required = info.required_args();
        let total = info.params.len();
        if args.len() < required || args.len() > total {
            let expected = if required == total {
                format!("{} arguments", total)
            } else {
                format!("{} to {} arguments", required, total)
            };
            let actual = format!("{} arguments", args.len());
            return Err(InputError::new(info.signature(), expected, actual).into());
        }

        debug!(function = name, args = args.len(), "dispatch");
        (info.call)(lib, args)
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn opt(args: &[Value], i: usize) -> Option<Value> {
    args.get(i).cloned()
}

fn kernel32_functions() -> Vec<FunctionInfo> {
    vec![
        FunctionInfo::new(
            "CreateFile",
            "Create or open a file or I/O device",
            &[
                required!("lpFileName"),
                required!("dwDesiredAccess"),
                optional!("dwShareMode"),
                optional!("lpSecurityAttributes"),
                optional!("dwCreationDisposition"),
                optional!("dwFlagsAndAttributes"),
                optional!("hTemplateFile"),
            ],
            |lib, args| {
                let options = CreateFileOptions {
                    share_mode: opt(args, 2),
                    security_attributes: opt(args, 3),
                    creation_disposition: opt(args, 4),
                    flags_and_attributes: opt(args, 5),
                    template_file: opt(args, 6),
                };
                kernel32::create_file(lib, arg(args, 0), arg(args, 1), options).map(Value::Handle)
            },
        )
        .with_keywords(&["file", "open", "create"]),
        FunctionInfo::new(
            "ReadFile",
            "Read bytes from a file or I/O device",
            &[
                required!("hFile"),
                required!("nNumberOfBytesToRead"),
                optional!("lpOverlapped"),
            ],
            |lib, args| {
                kernel32::read_file(lib, arg(args, 0), arg(args, 1), opt(args, 2))
                    .map(Value::Bytes)
            },
        )
        .with_keywords(&["file", "read", "io"]),
        FunctionInfo::new(
            "WriteFile",
            "Write text or bytes to a file or I/O device",
            &[
                required!("hFile"),
                required!("lpBuffer"),
                optional!("lpOverlapped"),
            ],
            |lib, args| {
                kernel32::write_file(lib, arg(args, 0), arg(args, 1), opt(args, 2))
                    .map(Value::from)
            },
        )
        .with_keywords(&["file", "write", "io"]),
        FunctionInfo::new(
            "MoveFileEx",
            "Move, rename or schedule deletion of a file",
            &[
                required!("lpExistingFileName"),
                optional!("lpNewFileName"),
                optional!("dwFlags"),
            ],
            |lib, args| {
                kernel32::move_file_ex(lib, arg(args, 0), opt(args, 1), opt(args, 2))
                    .map(|()| Value::Null)
            },
        )
        .with_keywords(&["file", "move", "rename", "delete"]),
        FunctionInfo::new(
            "GetStdHandle",
            "Standard input, output or error handle of this process",
            &[required!("nStdHandle")],
            |lib, args| kernel32::get_std_handle(lib, arg(args, 0)).map(Value::Handle),
        )
        .with_keywords(&["handle", "console", "stdout"]),
        FunctionInfo::new(
            "CloseHandle",
            "Close an open object handle",
            &[required!("hObject")],
            |lib, args| kernel32::close_handle(lib, arg(args, 0)).map(|()| Value::Null),
        )
        .with_keywords(&["handle", "close"]),
        FunctionInfo::new(
            "GetHandleInformation",
            "Flags of an object handle",
            &[required!("hObject")],
            |lib, args| kernel32::get_handle_information(lib, arg(args, 0)).map(Value::from),
        )
        .with_keywords(&["handle", "inherit", "flags"]),
        FunctionInfo::new(
            "SetHandleInformation",
            "Change the flags of an object handle",
            &[required!("hObject"), required!("dwMask"), required!("dwFlags")],
            |lib, args| {
                kernel32::set_handle_information(lib, arg(args, 0), arg(args, 1), arg(args, 2))
                    .map(|()| Value::Null)
            },
        )
        .with_keywords(&["handle", "inherit", "flags"]),
        FunctionInfo::new(
            "DuplicateHandle",
            "Duplicate an object handle",
            &[
                required!("hSourceProcessHandle"),
                required!("hSourceHandle"),
                required!("hTargetProcessHandle"),
                optional!("dwDesiredAccess"),
                optional!("bInheritHandle"),
                optional!("dwOptions"),
            ],
            |lib, args| {
                kernel32::duplicate_handle(
                    lib,
                    arg(args, 0),
                    arg(args, 1),
                    arg(args, 2),
                    opt(args, 3),
                    opt(args, 4),
                    opt(args, 5),
                )
                .map(Value::Handle)
            },
        )
        .with_keywords(&["handle", "duplicate", "inherit"]),
        FunctionInfo::new(
            "GetCurrentProcess",
            "Pseudo-handle for the current process",
            &[],
            |lib, _| Ok(Value::Handle(kernel32::get_current_process(lib))),
        )
        .with_keywords(&["process", "handle"]),
        FunctionInfo::new(
            "CreateEvent",
            "Create or open an event object",
            &[
                required!("bManualReset"),
                required!("bInitialState"),
                optional!("lpEventAttributes"),
                optional!("lpName"),
            ],
            |lib, args| {
                kernel32::create_event(lib, arg(args, 0), arg(args, 1), opt(args, 2), opt(args, 3))
                    .map(Value::Handle)
            },
        )
        .with_keywords(&["event", "synchronization"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeKernel;

    #[test]
    fn test_registry_lists_kernel32() {
        let registry = FunctionRegistry::with_kernel32();
        let names: Vec<&str> = registry.list().map(|f| f.name).collect();
        assert_eq!(registry.len(), 11);
        assert!(names.contains(&"CreateFile"));
        assert!(names.contains(&"DuplicateHandle"));
        // Name order
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_signature() {
        let registry = FunctionRegistry::with_kernel32();
        let info = registry.get("ReadFile").unwrap();
        assert_eq!(info.required_args(), 2);
        assert_eq!(
            info.signature(),
            "ReadFile(hFile, nNumberOfBytesToRead, [lpOverlapped])"
        );
    }

    #[test]
    fn test_unknown_function() {
        let lib = FakeKernel::new().library();
        let err = FunctionRegistry::with_kernel32()
            .call(&lib, "Foobar", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[test]
    fn test_arity_is_checked_before_any_native_call() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        let registry = FunctionRegistry::with_kernel32();

        let err = registry.call(&lib, "CreateFile", &[Value::from("a.txt")]).unwrap_err();
        assert!(err.is_input());
        assert!(err.to_string().contains("2 to 7 arguments"));

        let err = registry
            .call(&lib, "CloseHandle", &[Value::Null, Value::Null])
            .unwrap_err();
        assert!(err.is_input());
        assert_eq!(kernel.calls("CreateFile") + kernel.calls("CloseHandle"), 0);
    }

    #[test]
    fn test_dispatch_round_trip() {
        let kernel = FakeKernel::new();
        let lib = kernel.library();
        let registry = FunctionRegistry::with_kernel32();
        let write = lib.constant("GENERIC_WRITE").unwrap();

        let handle = registry
            .call(&lib, "CreateFile", &[Value::from("r.txt"), Value::from(write)])
            .unwrap();
        let written = registry
            .call(&lib, "WriteFile", &[handle.clone(), Value::from("abc")])
            .unwrap();
        assert_eq!(written, Value::Integer(3));

        let closed = registry.call(&lib, "CloseHandle", &[handle]).unwrap();
        assert_eq!(closed, Value::Null);
        assert_eq!(kernel.file_contents("r.txt").unwrap(), b"abc");
    }

    #[test]
    fn test_null_handle_argument_names_parameter() {
        let lib = FakeKernel::new().library();
        let err = FunctionRegistry::with_kernel32()
            .call(&lib, "ReadFile", &[Value::Null, Value::Integer(4)])
            .unwrap_err();
        match err {
            Error::Input(e) => assert_eq!(e.name, "hFile"),
            other => panic!("expected InputError, got {:?}", other),
        }
    }

    #[test]
    fn test_search() {
        let registry = FunctionRegistry::with_kernel32();
        let results: Vec<&str> = registry.search("inherit").iter().map(|f| f.name).collect();
        assert_eq!(
            results,
            vec!["DuplicateHandle", "GetHandleInformation", "SetHandleInformation"]
        );
        assert!(registry.search("zzz unknown").is_empty());
    }
}
