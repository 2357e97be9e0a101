//! Simulated kernel for tests
//!
//! [`FakeKernel`] implements [`NativeApi`] in memory: files live in a map,
//! handles in a table, and failures set the same last-error codes kernel32
//! would. It lets the validation, translation and handle lifecycle logic
//! run on any platform.
//!
//! ```
//! use winffi::kernel32;
//! use winffi::testutil::FakeKernel;
//!
//! let kernel = FakeKernel::new();
//! let lib = kernel.library();
//! let access = lib.constant("GENERIC_WRITE").unwrap();
//!
//! let file = kernel32::create_file(&lib, "out.txt", access, Default::default()).unwrap();
//! kernel32::write_file(&lib, &file, "hello", None).unwrap();
//! file.close(&lib).unwrap();
//!
//! assert_eq!(kernel.file_contents("out.txt").unwrap(), b"hello");
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::native::{
    from_wide, Catalog, LastError, Library, NativeApi, Overlapped, RawHandle, SecurityAttributes,
};

const FIRST_HANDLE: RawHandle = 0x100;
const STDIN: RawHandle = 0x10;
const STDOUT: RawHandle = 0x14;
const STDERR: RawHandle = 0x18;
const CURRENT_PROCESS: RawHandle = -1;
const INVALID_HANDLE_VALUE: RawHandle = -1;

/// System message for the error codes the simulation produces.
pub fn system_message(code: u32) -> String {
    match code {
        0 => "The operation completed successfully.",
        2 => "The system cannot find the file specified.",
        3 => "The system cannot find the path specified.",
        5 => "Access is denied.",
        6 => "The handle is invalid.",
        80 => "The file exists.",
        87 => "The parameter is incorrect.",
        183 => "Cannot create a file when that file already exists.",
        997 => "Overlapped I/O operation is in progress.",
        _ => return format!("Unknown error {}", code),
    }
    .to_string()
}

/// Constant values the simulation interprets, read from the catalog.
#[derive(Debug, Clone, Copy)]
struct Consts {
    generic_read: u32,
    generic_write: u32,
    create_new: u32,
    create_always: u32,
    open_existing: u32,
    open_always: u32,
    truncate_existing: u32,
    movefile_replace_existing: u32,
    movefile_delay_until_reboot: u32,
    handle_flag_inherit: u32,
    duplicate_close_source: u32,
    duplicate_same_access: u32,
    std_input: u32,
    std_output: u32,
    std_error: u32,
    error_file_not_found: u32,
    error_access_denied: u32,
    error_invalid_handle: u32,
    error_file_exists: u32,
    error_invalid_parameter: u32,
    error_already_exists: u32,
}

impl Consts {
    fn from_catalog(catalog: &Catalog) -> Self {
        let c = |name: &str| catalog.get(name).unwrap_or_default() as u32;
        Self {
            generic_read: c("GENERIC_READ"),
            generic_write: c("GENERIC_WRITE"),
            create_new: c("CREATE_NEW"),
            create_always: c("CREATE_ALWAYS"),
            open_existing: c("OPEN_EXISTING"),
            open_always: c("OPEN_ALWAYS"),
            truncate_existing: c("TRUNCATE_EXISTING"),
            movefile_replace_existing: c("MOVEFILE_REPLACE_EXISTING"),
            movefile_delay_until_reboot: c("MOVEFILE_DELAY_UNTIL_REBOOT"),
            handle_flag_inherit: c("HANDLE_FLAG_INHERIT"),
            duplicate_close_source: c("DUPLICATE_CLOSE_SOURCE"),
            duplicate_same_access: c("DUPLICATE_SAME_ACCESS"),
            std_input: c("STD_INPUT_HANDLE"),
            std_output: c("STD_OUTPUT_HANDLE"),
            std_error: c("STD_ERROR_HANDLE"),
            error_file_not_found: c("ERROR_FILE_NOT_FOUND"),
            error_access_denied: c("ERROR_ACCESS_DENIED"),
            error_invalid_handle: c("ERROR_INVALID_HANDLE"),
            error_file_exists: c("ERROR_FILE_EXISTS"),
            error_invalid_parameter: c("ERROR_INVALID_PARAMETER"),
            error_already_exists: c("ERROR_ALREADY_EXISTS"),
        }
    }
}

#[derive(Debug, Clone)]
enum Object {
    /// Index into `State::open_files`; duplicates share the file object.
    File(usize),
    Event,
    Process,
    Std,
}

#[derive(Debug, Clone)]
struct Entry {
    object: Object,
    flags: u32,
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    position: usize,
    access: u32,
}

#[derive(Debug)]
struct State {
    consts: Consts,
    next_handle: RawHandle,
    handles: HashMap<RawHandle, Entry>,
    open_files: Vec<OpenFile>,
    files: BTreeMap<String, Vec<u8>>,
    event_names: HashSet<String>,
    last_error: LastError,
    calls: HashMap<String, usize>,
    fail_next: HashMap<String, u32>,
}

impl State {
    fn new() -> Self {
        let consts = Consts::from_catalog(&Catalog::bundled());
        let mut handles = HashMap::new();
        for raw in [STDIN, STDOUT, STDERR] {
            handles.insert(
                raw,
                Entry {
                    object: Object::Std,
                    flags: 0,
                },
            );
        }
        Self {
            consts,
            next_handle: FIRST_HANDLE,
            handles,
            open_files: Vec::new(),
            files: BTreeMap::new(),
            event_names: HashSet::new(),
            last_error: LastError::new(0, system_message(0)),
            calls: HashMap::new(),
            fail_next: HashMap::new(),
        }
    }

    fn set_error(&mut self, code: u32) {
        self.last_error = LastError::new(code, system_message(code));
    }

    /// Record a call; returns an injected failure code if one is pending.
    fn enter(&mut self, function: &str) -> Option<u32> {
        *self.calls.entry(function.to_string()).or_default() += 1;
        let injected = self.fail_next.remove(function);
        if let Some(code) = injected {
            self.set_error(code);
        }
        injected
    }

    fn issue(&mut self, object: Object, flags: u32) -> RawHandle {
        let raw = self.next_handle;
        self.next_handle += 4;
        self.handles.insert(raw, Entry { object, flags });
        raw
    }

    fn open_file(&mut self, handle: RawHandle) -> Option<&mut OpenFile> {
        match self.handles.get(&handle)?.object {
            Object::File(id) => self.open_files.get_mut(id),
            _ => None,
        }
    }
}

/// In-memory implementation of the native layer.
///
/// Clones share state, so a test can keep one clone for inspection while
/// the [`Library`] built by [`FakeKernel::library`] owns another.
#[derive(Clone)]
pub struct FakeKernel {
    state: Rc<RefCell<State>>,
}

impl Default for FakeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeKernel {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::new())),
        }
    }

    /// A [`Library`] backed by this kernel and the bundled catalog.
    pub fn library(&self) -> Library {
        Library::new(Box::new(self.clone()))
    }

    /// Overwrite the last-error state.
    pub fn set_last_error(&self, code: u32, message: impl Into<String>) {
        self.state.borrow_mut().last_error = LastError::new(code, message);
    }

    /// Make the next call to `function` fail with `code`.
    pub fn fail_next(&self, function: &str, code: u32) {
        self.state
            .borrow_mut()
            .fail_next
            .insert(function.to_string(), code);
    }

    /// Number of times `function` was invoked (`GetLastError` included).
    pub fn calls(&self, function: &str) -> usize {
        self.state
            .borrow()
            .calls
            .get(function)
            .copied()
            .unwrap_or(0)
    }

    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_string(), contents.to_vec());
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path).cloned()
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    /// Handles currently open, standard handles included.
    pub fn open_handles(&self) -> usize {
        self.state.borrow().handles.len()
    }

    pub fn is_open(&self, handle: RawHandle) -> bool {
        self.state.borrow().handles.contains_key(&handle)
    }
}

fn inherit_flag(consts: &Consts, attributes: Option<&SecurityAttributes>) -> u32 {
    match attributes {
        Some(sa) if sa.inherit_handle != 0 => consts.handle_flag_inherit,
        _ => 0,
    }
}

fn overlapped_offset(overlapped: Option<&Overlapped>) -> Option<usize> {
    overlapped.map(|o| ((o.offset_high as u64) << 32 | o.offset as u64) as usize)
}

impl NativeApi for FakeKernel {
    fn last_error(&self) -> LastError {
        let mut st = self.state.borrow_mut();
        *st.calls.entry("GetLastError".to_string()).or_default() += 1;
        st.last_error.clone()
    }

    fn create_file(
        &self,
        file_name: &[u16],
        desired_access: u32,
        _share_mode: u32,
        security_attributes: Option<&SecurityAttributes>,
        creation_disposition: u32,
        _flags_and_attributes: u32,
        template_file: RawHandle,
    ) -> RawHandle {
        let mut st = self.state.borrow_mut();
        if st.enter("CreateFile").is_some() {
            return INVALID_HANDLE_VALUE;
        }
        let k = st.consts;

        if template_file != 0 && !st.handles.contains_key(&template_file) {
            st.set_error(k.error_invalid_handle);
            return INVALID_HANDLE_VALUE;
        }

        let path = from_wide(file_name);
        let exists = st.files.contains_key(&path);
        let d = creation_disposition;

        let last_error = if d == k.create_new {
            if exists {
                st.set_error(k.error_file_exists);
                return INVALID_HANDLE_VALUE;
            }
            st.files.insert(path.clone(), Vec::new());
            0
        } else if d == k.create_always || d == k.open_always {
            if !exists {
                st.files.insert(path.clone(), Vec::new());
                0
            } else {
                if d == k.create_always {
                    st.files.insert(path.clone(), Vec::new());
                }
                k.error_already_exists
            }
        } else if d == k.open_existing || d == k.truncate_existing {
            if !exists {
                st.set_error(k.error_file_not_found);
                return INVALID_HANDLE_VALUE;
            }
            if d == k.truncate_existing {
                st.files.insert(path.clone(), Vec::new());
            }
            0
        } else {
            st.set_error(k.error_invalid_parameter);
            return INVALID_HANDLE_VALUE;
        };

        st.open_files.push(OpenFile {
            path,
            position: 0,
            access: desired_access,
        });
        let id = st.open_files.len() - 1;
        let flags = inherit_flag(&k, security_attributes);
        let raw = st.issue(Object::File(id), flags);
        st.set_error(last_error);
        raw
    }

    fn read_file(
        &self,
        file: RawHandle,
        buffer: &mut [u8],
        bytes_read: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("ReadFile").is_some() {
            return 0;
        }
        let k = st.consts;

        let Some(open) = st.open_file(file) else {
            st.set_error(k.error_invalid_handle);
            return 0;
        };
        if open.access & k.generic_read == 0 {
            st.set_error(k.error_access_denied);
            return 0;
        }

        let offset = overlapped_offset(overlapped.as_deref()).unwrap_or(open.position);
        let path = open.path.clone();
        let data = st.files.get(&path).cloned().unwrap_or_default();
        let start = offset.min(data.len());
        let n = buffer.len().min(data.len() - start);
        buffer[..n].copy_from_slice(&data[start..start + n]);
        *bytes_read = n as u32;

        match overlapped {
            // Completes synchronously; the transfer count lands in the structure.
            Some(o) => o.internal_high = n,
            None => {
                if let Some(open) = st.open_file(file) {
                    open.position = start + n;
                }
            }
        }
        1
    }

    fn write_file(
        &self,
        file: RawHandle,
        buffer: &[u8],
        bytes_written: &mut u32,
        overlapped: Option<&mut Overlapped>,
    ) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("WriteFile").is_some() {
            return 0;
        }
        let k = st.consts;

        let Some(open) = st.open_file(file) else {
            st.set_error(k.error_invalid_handle);
            return 0;
        };
        if open.access & k.generic_write == 0 {
            st.set_error(k.error_access_denied);
            return 0;
        }

        let offset = overlapped_offset(overlapped.as_deref()).unwrap_or(open.position);
        let path = open.path.clone();
        let data = st.files.entry(path).or_default();
        if data.len() < offset + buffer.len() {
            data.resize(offset + buffer.len(), 0);
        }
        data[offset..offset + buffer.len()].copy_from_slice(buffer);
        *bytes_written = buffer.len() as u32;

        match overlapped {
            Some(o) => o.internal_high = buffer.len(),
            None => {
                if let Some(open) = st.open_file(file) {
                    open.position = offset + buffer.len();
                }
            }
        }
        1
    }

    fn move_file_ex(&self, existing: &[u16], new: Option<&[u16]>, flags: u32) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("MoveFileEx").is_some() {
            return 0;
        }
        let k = st.consts;

        let from = from_wide(existing);
        if !st.files.contains_key(&from) {
            st.set_error(k.error_file_not_found);
            return 0;
        }

        let Some(new) = new else {
            // A NULL destination only means "delete on reboot".
            if flags & k.movefile_delay_until_reboot == 0 {
                st.set_error(k.error_invalid_parameter);
                return 0;
            }
            return 1;
        };

        let to = from_wide(new);
        if st.files.contains_key(&to) && flags & k.movefile_replace_existing == 0 {
            st.set_error(k.error_already_exists);
            return 0;
        }

        if let Some(data) = st.files.remove(&from) {
            st.files.insert(to.clone(), data);
        }
        for open in st.open_files.iter_mut().filter(|f| f.path == from) {
            open.path = to.clone();
        }
        1
    }

    fn close_handle(&self, handle: RawHandle) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("CloseHandle").is_some() {
            return 0;
        }
        if handle == CURRENT_PROCESS {
            return 1;
        }
        if st.handles.remove(&handle).is_none() {
            let code = st.consts.error_invalid_handle;
            st.set_error(code);
            return 0;
        }
        1
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
        let mut st = self.state.borrow_mut();
        if st.enter("DuplicateHandle").is_some() {
            return 0;
        }
        let k = st.consts;

        if source_process != CURRENT_PROCESS || target_process != CURRENT_PROCESS {
            st.set_error(k.error_invalid_handle);
            return 0;
        }

        let object = if source == CURRENT_PROCESS {
            Object::Process
        } else {
            match st.handles.get(&source) {
                Some(entry) => entry.object.clone(),
                None => {
                    st.set_error(k.error_invalid_handle);
                    return 0;
                }
            }
        };

        let object = match object {
            Object::File(id) if options & k.duplicate_same_access == 0 => {
                let path = st.open_files[id].path.clone();
                let position = st.open_files[id].position;
                st.open_files.push(OpenFile {
                    path,
                    position,
                    access: desired_access,
                });
                Object::File(st.open_files.len() - 1)
            }
            other => other,
        };

        let flags = if inherit { k.handle_flag_inherit } else { 0 };
        *target = st.issue(object, flags);

        if options & k.duplicate_close_source != 0 {
            st.handles.remove(&source);
        }
        1
    }

    fn get_handle_information(&self, handle: RawHandle, flags: &mut u32) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("GetHandleInformation").is_some() {
            return 0;
        }
        match st.handles.get(&handle) {
            Some(entry) => {
                *flags = entry.flags;
                1
            }
            None => {
                let code = st.consts.error_invalid_handle;
                st.set_error(code);
                0
            }
        }
    }

    fn set_handle_information(&self, handle: RawHandle, mask: u32, flags: u32) -> i32 {
        let mut st = self.state.borrow_mut();
        if st.enter("SetHandleInformation").is_some() {
            return 0;
        }
        match st.handles.get_mut(&handle) {
            Some(entry) => {
                entry.flags = (entry.flags & !mask) | (flags & mask);
                1
            }
            None => {
                let code = st.consts.error_invalid_handle;
                st.set_error(code);
                0
            }
        }
    }

    fn get_std_handle(&self, std_handle: u32) -> RawHandle {
        let mut st = self.state.borrow_mut();
        if st.enter("GetStdHandle").is_some() {
            return INVALID_HANDLE_VALUE;
        }
        let k = st.consts;
        if std_handle == k.std_input {
            STDIN
        } else if std_handle == k.std_output {
            STDOUT
        } else if std_handle == k.std_error {
            STDERR
        } else {
            st.set_error(k.error_invalid_handle);
            INVALID_HANDLE_VALUE
        }
    }

    fn get_current_process(&self) -> RawHandle {
        self.state.borrow_mut().enter("GetCurrentProcess");
        CURRENT_PROCESS
    }

    fn create_event(
        &self,
        event_attributes: Option<&SecurityAttributes>,
        _manual_reset: bool,
        _initial_state: bool,
        name: Option<&[u16]>,
    ) -> RawHandle {
        let mut st = self.state.borrow_mut();
        if st.enter("CreateEvent").is_some() {
            return 0;
        }
        let k = st.consts;

        let existed = match name.map(from_wide) {
            Some(name) => !st.event_names.insert(name),
            None => false,
        };
        let flags = inherit_flag(&k, event_attributes);
        let raw = st.issue(Object::Event, flags);
        st.set_error(if existed { k.error_already_exists } else { 0 });
        raw
    }
}
