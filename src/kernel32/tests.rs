//! kernel32 Wrapper Tests

use super::*;
use crate::error::Error;
use crate::native::{Overlapped, SecurityAttributes};
use crate::testutil::FakeKernel;
use crate::value::StructPtr;

fn setup() -> (FakeKernel, Library) {
    let kernel = FakeKernel::new();
    let lib = kernel.library();
    (kernel, lib)
}

fn c(lib: &Library, name: &str) -> i64 {
    lib.constant(name).unwrap()
}

fn read_write(lib: &Library) -> i64 {
    c(lib, "GENERIC_READ") | c(lib, "GENERIC_WRITE")
}

fn input_name(err: Error) -> String {
    match err {
        Error::Input(e) => e.name,
        other => panic!("expected InputError, got {:?}", other),
    }
}

#[test]
fn test_create_file_defaults_create_always() {
    let (kernel, lib) = setup();
    let handle = create_file(&lib, "new.txt", c(&lib, "GENERIC_WRITE"), Default::default()).unwrap();

    assert!(handle.is_owned());
    assert!(kernel.file_exists("new.txt"));
    assert!(kernel.is_open(handle.raw()));
}

#[test]
fn test_create_always_over_existing_file_returns_handle() {
    let (kernel, lib) = setup();
    kernel.put_file("exists.txt", b"old contents");

    let options = CreateFileOptions::default().creation_disposition(c(&lib, "CREATE_ALWAYS"));
    let handle = create_file(&lib, "exists.txt", c(&lib, "GENERIC_WRITE"), options).unwrap();

    assert!(kernel.is_open(handle.raw()));
    // CREATE_ALWAYS truncates.
    assert_eq!(kernel.file_contents("exists.txt").unwrap(), b"");
}

#[test]
fn test_open_always_over_existing_file_returns_handle() {
    let (kernel, lib) = setup();
    kernel.put_file("exists.txt", b"keep");

    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_ALWAYS"));
    let handle = create_file(&lib, "exists.txt", read_write(&lib), options).unwrap();

    assert_eq!(read_file(&lib, &handle, 16, None).unwrap(), b"keep");
}

#[test]
fn test_create_new_over_existing_file_fails() {
    let (kernel, lib) = setup();
    kernel.put_file("exists.txt", b"");

    let options = CreateFileOptions::default().creation_disposition(c(&lib, "CREATE_NEW"));
    let err = create_file(&lib, "exists.txt", c(&lib, "GENERIC_WRITE"), options).unwrap_err();

    match err {
        Error::WindowsApi(e) => {
            assert_eq!(e.function, "CreateFile");
            assert_eq!(e.code, 80);
            assert_eq!(e.message, "The file exists.");
        }
        other => panic!("expected WindowsApiError, got {:?}", other),
    }
}

#[test]
fn test_open_existing_missing_file_fails() {
    let (_kernel, lib) = setup();
    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_EXISTING"));
    let err = create_file(&lib, "missing.txt", c(&lib, "GENERIC_READ"), options).unwrap_err();
    assert_eq!(err.code(), Some(2));
}

#[test]
fn test_create_file_rejects_unknown_disposition() {
    let (kernel, lib) = setup();
    let options = CreateFileOptions::default().creation_disposition(999);
    let err = create_file(&lib, "a.txt", c(&lib, "GENERIC_READ"), options).unwrap_err();

    assert_eq!(input_name(err), "dwCreationDisposition");
    assert_eq!(kernel.calls("CreateFile"), 0);
}

#[test]
fn test_create_file_argument_checks() {
    let (kernel, lib) = setup();

    let err = create_file(&lib, 42, 0, Default::default()).unwrap_err();
    assert_eq!(input_name(err), "lpFileName");

    let err = create_file(&lib, "a.txt", "rw", Default::default()).unwrap_err();
    assert_eq!(input_name(err), "dwDesiredAccess");

    let options = CreateFileOptions::default().share_mode(Value::Null);
    let err = create_file(&lib, "a.txt", 0, options).unwrap_err();
    assert_eq!(input_name(err), "dwShareMode");

    let options = CreateFileOptions::default()
        .security_attributes(StructPtr::overlapped(Overlapped::default()));
    let err = create_file(&lib, "a.txt", 0, options).unwrap_err();
    assert_eq!(input_name(err), "lpSecurityAttributes");

    let options = CreateFileOptions::default().template_file(7);
    let err = create_file(&lib, "a.txt", 0, options).unwrap_err();
    assert_eq!(input_name(err), "hTemplateFile");

    assert_eq!(kernel.calls("CreateFile"), 0);
}

#[test]
fn test_create_file_with_inheritable_attributes() {
    let (_kernel, lib) = setup();
    let attributes = StructPtr::security_attributes(SecurityAttributes::inheritable(true));
    let options = CreateFileOptions::default().security_attributes(attributes);

    let handle = create_file(&lib, "inherit.txt", c(&lib, "GENERIC_WRITE"), options).unwrap();
    let flags = get_handle_information(&lib, &handle).unwrap();

    assert_eq!(flags as i64 & c(&lib, "HANDLE_FLAG_INHERIT"), c(&lib, "HANDLE_FLAG_INHERIT"));
    assert_eq!(handle.inheritable(), Some(true));
}

#[test]
fn test_write_then_read() {
    let (kernel, lib) = setup();
    let handle = create_file(&lib, "data.txt", read_write(&lib), Default::default()).unwrap();

    assert_eq!(write_file(&lib, &handle, "hello world", None).unwrap(), 11);
    assert_eq!(kernel.file_contents("data.txt").unwrap(), b"hello world");
    handle.close(&lib).unwrap();

    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_EXISTING"));
    let handle = create_file(&lib, "data.txt", c(&lib, "GENERIC_READ"), options).unwrap();
    assert_eq!(read_file(&lib, &handle, 5, None).unwrap(), b"hello");
    assert_eq!(read_file(&lib, &handle, 64, None).unwrap(), b" world");
    assert_eq!(read_file(&lib, &handle, 64, None).unwrap(), b"");
}

#[test]
fn test_read_with_overlapped_offset() {
    let (kernel, lib) = setup();
    kernel.put_file("data.bin", b"0123456789");
    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_EXISTING"));
    let handle = create_file(&lib, "data.bin", c(&lib, "GENERIC_READ"), options).unwrap();

    let ptr = StructPtr::overlapped(Overlapped::at(6, 0));
    assert_eq!(read_file(&lib, &handle, 3, Some(ptr.clone().into())).unwrap(), b"678");
    assert_eq!(ptr.get_overlapped().map(|o| o.internal_high), Some(3));
}

fn request_at(offset: u64) -> Value {
    let overlapped = Overlapped::at(offset, 0);
    StructPtr::overlapped(overlapped).into()
}

#[test]
fn test_overlapped_outlives_the_local_it_was_built_from() {
    let (kernel, lib) = setup();
    kernel.put_file("data.bin", b"0123456789");
    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_EXISTING"));
    let handle = create_file(&lib, "data.bin", read_write(&lib), options).unwrap();

    let request = request_at(2);
    assert_eq!(read_file(&lib, &handle, 3, Some(request.clone())).unwrap(), b"234");
    let written = request.as_struct().and_then(|p| p.get_overlapped());
    assert_eq!(written.map(|o| o.internal_high), Some(3));

    assert_eq!(write_file(&lib, &handle, "ab", Some(request_at(8))).unwrap(), 2);
    assert_eq!(kernel.file_contents("data.bin").unwrap(), b"01234567ab");
}

#[test]
fn test_write_bytes_and_rejects_invalid_utf8() {
    let (kernel, lib) = setup();
    let handle = create_file(&lib, "out.bin", c(&lib, "GENERIC_WRITE"), Default::default()).unwrap();

    assert_eq!(write_file(&lib, &handle, b"abc".to_vec(), None).unwrap(), 3);

    let err = write_file(&lib, &handle, vec![0xffu8, 0xfe], None).unwrap_err();
    assert_eq!(input_name(err), "lpBuffer");
    assert_eq!(kernel.calls("WriteFile"), 1);
}

#[test]
fn test_read_without_access_is_translated() {
    let (_kernel, lib) = setup();
    let handle = create_file(&lib, "w.txt", c(&lib, "GENERIC_WRITE"), Default::default()).unwrap();

    let err = read_file(&lib, &handle, 4, None).unwrap_err();
    assert_eq!(err.code(), Some(5));
}

#[test]
fn test_read_file_argument_checks() {
    let (kernel, lib) = setup();
    let handle = create_file(&lib, "r.txt", read_write(&lib), Default::default()).unwrap();

    let err = read_file(&lib, Value::Null, 4, None).unwrap_err();
    assert_eq!(input_name(err), "hFile");

    let err = read_file(&lib, &handle, "four", None).unwrap_err();
    assert_eq!(input_name(err), "nNumberOfBytesToRead");

    let err = read_file(&lib, &handle, -1i64, None).unwrap_err();
    assert_eq!(input_name(err), "nNumberOfBytesToRead");

    let err = read_file(&lib, &handle, 4, Some(Value::Integer(0))).unwrap_err();
    assert_eq!(input_name(err), "lpOverlapped");

    assert_eq!(kernel.calls("ReadFile"), 0);
}

#[test]
fn test_io_on_closed_handle_is_rejected() {
    let (kernel, lib) = setup();
    let handle = create_file(&lib, "c.txt", read_write(&lib), Default::default()).unwrap();
    handle.close(&lib).unwrap();

    let err = write_file(&lib, &handle, "late", None).unwrap_err();
    assert_eq!(input_name(err), "hFile");
    assert_eq!(kernel.calls("WriteFile"), 0);
}

#[test]
fn test_move_file_ex() {
    let (kernel, lib) = setup();
    kernel.put_file("from.txt", b"payload");

    move_file_ex(&lib, "from.txt", Some("to.txt".into()), None).unwrap();
    assert!(!kernel.file_exists("from.txt"));
    assert_eq!(kernel.file_contents("to.txt").unwrap(), b"payload");
}

#[test]
fn test_move_file_ex_replace_existing() {
    let (kernel, lib) = setup();
    kernel.put_file("a.txt", b"a");
    kernel.put_file("b.txt", b"b");

    // Without MOVEFILE_REPLACE_EXISTING the destination must not exist.
    let err = move_file_ex(&lib, "a.txt", Some("b.txt".into()), Some(0.into())).unwrap_err();
    assert_eq!(err.code(), Some(183));

    // The default flags replace it.
    move_file_ex(&lib, "a.txt", Some("b.txt".into()), None).unwrap();
    assert_eq!(kernel.file_contents("b.txt").unwrap(), b"a");
}

#[test]
fn test_move_file_ex_errors() {
    let (kernel, lib) = setup();

    let err = move_file_ex(&lib, "nope.txt", Some("x.txt".into()), None).unwrap_err();
    assert_eq!(err.code(), Some(2));

    let err = move_file_ex(&lib, 12, None, None).unwrap_err();
    assert_eq!(input_name(err), "lpExistingFileName");

    let err = move_file_ex(&lib, "a.txt", Some(Value::Integer(3)), None).unwrap_err();
    assert_eq!(input_name(err), "lpNewFileName");

    let err = move_file_ex(&lib, "a.txt", None, Some(Value::Bool(true))).unwrap_err();
    assert_eq!(input_name(err), "dwFlags");

    assert_eq!(kernel.calls("MoveFileEx"), 1);
}

#[test]
fn test_move_file_ex_null_destination_schedules_delete() {
    let (kernel, lib) = setup();
    kernel.put_file("tmp.txt", b"");

    let flags = c(&lib, "MOVEFILE_DELAY_UNTIL_REBOOT");
    move_file_ex(&lib, "tmp.txt", None, Some(flags.into())).unwrap();

    let err = move_file_ex(&lib, "tmp.txt", None, None).unwrap_err();
    assert_eq!(err.code(), Some(87));
}

#[test]
fn test_get_std_handle() {
    let (_kernel, lib) = setup();
    let stdout = get_std_handle(&lib, c(&lib, "STD_OUTPUT_HANDLE")).unwrap();
    assert!(!stdout.is_owned());

    let again = get_std_handle(&lib, c(&lib, "STD_OUTPUT_HANDLE")).unwrap();
    assert_eq!(stdout, again);

    let err = get_std_handle(&lib, 0).unwrap_err();
    assert_eq!(input_name(err), "nStdHandle");
}

#[test]
fn test_close_handle_wrapper() {
    let (kernel, lib) = setup();
    let event = create_event(&lib, false, false, None, None).unwrap();

    close_handle(&lib, &event).unwrap();
    assert!(event.is_closed());
    assert!(!kernel.is_open(event.raw()));

    let err = close_handle(&lib, &event).unwrap_err();
    assert_eq!(input_name(err), "hObject");
    assert_eq!(kernel.calls("CloseHandle"), 1);
}

#[test]
fn test_set_handle_information_updates_inheritable() {
    let (_kernel, lib) = setup();
    let event = create_event(&lib, false, false, None, None).unwrap();
    let inherit = c(&lib, "HANDLE_FLAG_INHERIT");

    assert_eq!(get_handle_information(&lib, &event).unwrap(), 0);
    assert_eq!(event.inheritable(), Some(false));

    set_handle_information(&lib, &event, inherit, inherit).unwrap();
    assert_eq!(event.inheritable(), Some(true));
    assert_eq!(get_handle_information(&lib, &event).unwrap() as i64, inherit);

    // A mask without the inherit bit leaves it alone.
    let protect = c(&lib, "HANDLE_FLAG_PROTECT_FROM_CLOSE");
    set_handle_information(&lib, &event, protect, 0).unwrap();
    assert_eq!(event.inheritable(), Some(true));
}

#[test]
fn test_set_handle_information_argument_checks() {
    let (kernel, lib) = setup();
    let event = create_event(&lib, false, false, None, None).unwrap();

    let err = set_handle_information(&lib, Value::Null, 1, 1).unwrap_err();
    assert_eq!(input_name(err), "hObject");
    let err = set_handle_information(&lib, &event, "1", 1).unwrap_err();
    assert_eq!(input_name(err), "dwMask");
    let err = set_handle_information(&lib, &event, 1, Value::Null).unwrap_err();
    assert_eq!(input_name(err), "dwFlags");

    assert_eq!(kernel.calls("SetHandleInformation"), 0);
}

#[test]
fn test_duplicate_handle_inheritable() {
    let (_kernel, lib) = setup();
    let process = get_current_process(&lib);
    let event = create_event(&lib, false, false, None, None).unwrap();

    let dup =
        duplicate_handle(&lib, &process, &event, &process, None, Some(true.into()), None).unwrap();
    assert_ne!(dup, event);
    assert_eq!(dup.inheritable(), Some(true));

    let flags = get_handle_information(&lib, &dup).unwrap() as i64;
    assert_eq!(flags & c(&lib, "HANDLE_FLAG_INHERIT"), c(&lib, "HANDLE_FLAG_INHERIT"));
}

#[test]
fn test_duplicate_handle_close_source() {
    let (kernel, lib) = setup();
    let process = get_current_process(&lib);
    let event = create_event(&lib, false, false, None, None).unwrap();
    let options = c(&lib, "DUPLICATE_CLOSE_SOURCE") | c(&lib, "DUPLICATE_SAME_ACCESS");

    let dup =
        duplicate_handle(&lib, &process, &event, &process, None, None, Some(options.into()))
            .unwrap();

    assert!(event.is_closed());
    assert!(!kernel.is_open(event.raw()));
    assert!(kernel.is_open(dup.raw()));
    // The source is gone; closing it again must not reach the kernel.
    assert!(event.close(&lib).is_err());
    assert_eq!(kernel.calls("CloseHandle"), 0);
}

#[test]
fn test_duplicated_file_shares_position() {
    let (kernel, lib) = setup();
    kernel.put_file("shared.txt", b"abcdef");
    let options = CreateFileOptions::default().creation_disposition(c(&lib, "OPEN_EXISTING"));
    let file = create_file(&lib, "shared.txt", c(&lib, "GENERIC_READ"), options).unwrap();
    let dup = file.duplicate(&lib, false).unwrap();

    assert_eq!(read_file(&lib, &file, 3, None).unwrap(), b"abc");
    assert_eq!(read_file(&lib, &dup, 3, None).unwrap(), b"def");
}

#[test]
fn test_duplicate_handle_argument_checks() {
    let (kernel, lib) = setup();
    let process = get_current_process(&lib);
    let event = create_event(&lib, false, false, None, None).unwrap();

    let err = duplicate_handle(&lib, Value::Null, &event, &process, None, None, None).unwrap_err();
    assert_eq!(input_name(err), "hSourceProcessHandle");

    let err = duplicate_handle(&lib, &process, &event, &process, None, Some("yes".into()), None)
        .unwrap_err();
    assert_eq!(input_name(err), "bInheritHandle");

    assert_eq!(kernel.calls("DuplicateHandle"), 0);
}

#[test]
fn test_current_process_is_borrowed() {
    let (_kernel, lib) = setup();
    let process = get_current_process(&lib);
    assert!(!process.is_owned());
    assert_eq!(process, get_current_process(&lib));
}

#[test]
fn test_create_named_event_twice() {
    let (kernel, lib) = setup();
    let first = create_event(&lib, true, false, None, Some("winffi-test".into())).unwrap();
    let second = create_event(&lib, true, false, None, Some("winffi-test".into())).unwrap();

    assert_ne!(first, second);
    assert_eq!(kernel.calls("GetLastError"), 0);
}

#[test]
fn test_create_event_failure_is_translated() {
    let (kernel, lib) = setup();
    kernel.fail_next("CreateEvent", 5);

    let err = create_event(&lib, false, false, None, None).unwrap_err();
    assert_eq!(err.code(), Some(5));
    assert_eq!(kernel.calls("GetLastError"), 1);
}

#[test]
fn test_create_event_argument_checks() {
    let (_kernel, lib) = setup();
    let err = create_event(&lib, "no", false, None, None).unwrap_err();
    assert_eq!(input_name(err), "bManualReset");

    let err = create_event(&lib, false, false, None, Some(Value::Integer(1))).unwrap_err();
    assert_eq!(input_name(err), "lpName");
}
