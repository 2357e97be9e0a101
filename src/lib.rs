//! winffi - checked bindings to kernel32 file, handle and process functions
//!
//! Every exposed function validates its arguments before they cross the
//! foreign boundary, translates native failures into structured errors
//! carrying the system error code and message, and wraps returned handles
//! so their lifetime is explicit.
//!
//! # Features
//!
//! - **Argument checks**: tagged [`Value`]s validated against a [`checks::Check`]
//!   (kind sets, open handles, UTF-8, structure pointers, allowed values)
//! - **Error translation**: return code policies ([`checks::Expected`]) plus
//!   the thread's last-error state become a [`WindowsApiError`]
//! - **Handles**: equality by raw value, explicit close, closed-state
//!   tracking, duplication and inheritance control
//! - **Constant catalog**: named constants parsed from a C header, with
//!   overrides from `winffi.toml`
//! - **Simulated kernel**: [`testutil::FakeKernel`] runs everything on any
//!   platform
//!
//! # Example
//!
//! ```rust
//! use winffi::kernel32::{self, CreateFileOptions};
//! use winffi::testutil::FakeKernel;
//!
//! let kernel = FakeKernel::new();
//! let lib = kernel.library();
//!
//! let access = lib.constant("GENERIC_READ").unwrap() | lib.constant("GENERIC_WRITE").unwrap();
//! let file = kernel32::create_file(&lib, "notes.txt", access, CreateFileOptions::default()).unwrap();
//! kernel32::write_file(&lib, &file, "hello", None).unwrap();
//! file.close(&lib).unwrap();
//!
//! // A second close never reaches the kernel.
//! assert!(file.close(&lib).is_err());
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ caller / CLI    │  Values, or typed Rust arguments
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ kernel32::*     │  defaults from the catalog
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ checks          │  validate → native call → check_result
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ native::Library │  NativeApi: Kernel32 (libloading) | FakeKernel
//! └─────────────────┘
//! ```

pub mod checks;
pub mod config;
pub mod error;
pub mod handle;
pub mod kernel32;
pub mod logging;
pub mod native;
pub mod registry;
pub mod testutil;
pub mod value;

pub use checks::{check_last_error, check_result, validate, Check, Expected};
pub use config::WinffiConfig;
pub use error::{Error, InputError, Result, WindowsApiError};
pub use handle::Handle;
pub use native::{Catalog, LastError, Library, NativeApi};
pub use registry::FunctionRegistry;
pub use value::{StructPtr, Value, ValueKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
