//! Win32 / PE implementation of the hook kit.
//!
//! Pointer arithmetic over loaded PE images plus the handful of Win32
//! calls needed to spawn, inject and patch a host. Every operation that
//! cannot find its target reports which name was missing; memory
//! protection changes are paired with restoration through a guard even on
//! early exit.

use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use windows::core::{PCSTR, PSTR};
use windows::Win32::Foundation::{CloseHandle, FILETIME, HANDLE, HMODULE, HWND, LPARAM, MAX_PATH};
use windows::Win32::System::Diagnostics::Debug::WriteProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows::Win32::System::LibraryLoader::{
    GetModuleFileNameA, GetModuleHandleA, GetModuleHandleExA, GetProcAddress,
    GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
};
use windows::Win32::System::Memory::{
    VirtualAlloc, VirtualAllocEx, VirtualFreeEx, VirtualProtect, VirtualQuery, MEMORY_BASIC_INFORMATION,
    MEM_COMMIT, MEM_FREE, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS,
};
use windows::Win32::System::ProcessStatus::{
    K32EnumProcessModules, K32EnumProcesses, K32GetModuleBaseNameA, K32GetModuleFileNameExA,
};
use windows::Win32::System::SystemServices::{
    IMAGE_DOS_HEADER, IMAGE_DOS_SIGNATURE, IMAGE_IMPORT_BY_NAME, IMAGE_IMPORT_DESCRIPTOR,
};
use windows::Win32::System::Threading::{
    CreateProcessA, CreateRemoteThread, GetCurrentProcess, GetCurrentProcessId, GetCurrentThreadId,
    GetThreadTimes, OpenProcess, OpenThread, ResumeThread, WaitForSingleObject, CREATE_SUSPENDED,
    INFINITE, NORMAL_PRIORITY_CLASS, PROCESS_ALL_ACCESS, PROCESS_INFORMATION, STARTUPINFOA,
    THREAD_QUERY_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetWindowThreadProcessId,
};

use super::HookError;

#[cfg(target_arch = "x86_64")]
use windows::Win32::System::Diagnostics::Debug::IMAGE_NT_HEADERS64 as ImageNtHeaders;
#[cfg(target_arch = "x86")]
use windows::Win32::System::Diagnostics::Debug::IMAGE_NT_HEADERS32 as ImageNtHeaders;

#[cfg(target_arch = "x86_64")]
use windows::Win32::System::SystemServices::IMAGE_THUNK_DATA64 as ImageThunkData;
#[cfg(target_arch = "x86")]
use windows::Win32::System::SystemServices::IMAGE_THUNK_DATA32 as ImageThunkData;

#[cfg(target_arch = "x86_64")]
const IMAGE_ORDINAL_FLAG: usize = 0x8000_0000_0000_0000;
#[cfg(target_arch = "x86")]
const IMAGE_ORDINAL_FLAG: usize = 0x8000_0000;

const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;
const IMAGE_DIRECTORY_ENTRY_IMPORT: usize = 1;

/// Restores the previous page protection when dropped.
struct ProtectGuard {
    addr: *const c_void,
    size: usize,
    old: PAGE_PROTECTION_FLAGS,
}

impl ProtectGuard {
    unsafe fn unprotect(addr: *const c_void, size: usize) -> Result<Self, HookError> {
        let mut old = PAGE_PROTECTION_FLAGS(0);
        VirtualProtect(addr, size, PAGE_EXECUTE_READWRITE, &mut old)
            .map_err(|e| HookError::PatchFailed(e.to_string()))?;
        Ok(Self { addr, size, old })
    }
}

impl Drop for ProtectGuard {
    fn drop(&mut self) {
        let mut scratch = PAGE_PROTECTION_FLAGS(0);
        // SAFETY: restoring the protection recorded by unprotect.
        let _ = unsafe { VirtualProtect(self.addr, self.size, self.old, &mut scratch) };
    }
}

pub fn is_valid_memory(p: *const c_void) -> bool {
    if p.is_null() {
        return false;
    }
    let mut info = MEMORY_BASIC_INFORMATION::default();
    let got = unsafe { VirtualQuery(Some(p), &mut info, std::mem::size_of::<MEMORY_BASIC_INFORMATION>()) };
    got != 0 && info.State != MEM_FREE
}

pub fn is_valid_module(module: HMODULE) -> bool {
    if module.is_invalid() {
        return false;
    }
    // SAFETY: a loaded module starts with its DOS header.
    let dos = unsafe { &*(module.0 as *const IMAGE_DOS_HEADER) };
    dos.e_magic == IMAGE_DOS_SIGNATURE
}

/// Reserve a writable+executable region near `near`.
///
/// Steps forward in 64 KiB increments until the OS accepts the
/// reservation, anchoring the trampoline pool within short-jump range of
/// the patched site.
pub unsafe fn alloc_executable(size: usize, near: *const c_void) -> Result<*mut u8, HookError> {
    const STEP: usize = 0x10000;
    // Bounded walk; 2 GiB of candidates is far beyond any real layout.
    for i in 0..0x8000usize {
        let candidate = (near as usize).wrapping_add(STEP * i) as *const c_void;
        let region = VirtualAlloc(
            Some(candidate),
            size,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        );
        if !region.is_null() {
            return Ok(region as *mut u8);
        }
    }
    Err(HookError::AllocationFailed)
}

/// Write an unconditional jump at `from` targeting `to`.
///
/// Emits a 5-byte near relative jump when the displacement fits, otherwise
/// a `FF 25` indirect jump through an inline absolute target. Returns the
/// write cursor immediately after the emitted code.
pub unsafe fn emit_jump(from: *mut u8, to: *const c_void) -> *mut u8 {
    let rel_base = from.add(5) as i64;
    let displacement = to as i64 - rel_base;

    if displacement.unsigned_abs() <= 0x7FFF_0000 {
        // E9 rel32
        from.write(0xE9);
        (from.add(1) as *mut i32).write_unaligned(displacement as i32);
        from.add(5)
    } else {
        // FF 25 disp32, absolute target inline after the instruction
        from.write(0xFF);
        from.add(1).write(0x25);
        #[cfg(target_arch = "x86_64")]
        (from.add(2) as *mut u32).write_unaligned(0);
        #[cfg(target_arch = "x86")]
        (from.add(2) as *mut u32).write_unaligned(from.add(6) as u32);
        (from.add(6) as *mut usize).write_unaligned(to as usize);
        from.add(6 + std::mem::size_of::<usize>())
    }
}

fn directory_entry(module: HMODULE, index: usize) -> Option<(usize, u32)> {
    if !is_valid_module(module) {
        return None;
    }
    let base = module.0 as usize;
    // SAFETY: headers validated by is_valid_module.
    unsafe {
        let dos = &*(base as *const IMAGE_DOS_HEADER);
        let nt = &*((base + dos.e_lfanew as usize) as *const ImageNtHeaders);
        let dir = nt.OptionalHeader.DataDirectory[index];
        if dir.VirtualAddress == 0 {
            return None;
        }
        Some((base, dir.VirtualAddress))
    }
}

#[repr(C)]
struct ExportDirectory {
    characteristics: u32,
    time_date_stamp: u32,
    major_version: u16,
    minor_version: u16,
    name: u32,
    base: u32,
    number_of_functions: u32,
    number_of_names: u32,
    address_of_functions: u32,
    address_of_names: u32,
    address_of_name_ordinals: u32,
}

/// Route `export_name` of `module` through a jump emitted at the
/// trampoline cursor; returns the original function pointer.
pub unsafe fn override_eat(
    module: HMODULE,
    export_name: &str,
    replacement: *const c_void,
    trampoline: &mut *mut u8,
) -> Result<*const c_void, HookError> {
    let (base, rva) = directory_entry(module, IMAGE_DIRECTORY_ENTRY_EXPORT)
        .ok_or_else(|| HookError::ModuleNotFound(format!("{module:?}")))?;

    let exports = &*((base + rva as usize) as *const ExportDirectory);
    let names = (base + exports.address_of_names as usize) as *const u32;
    let ordinals = (base + exports.address_of_name_ordinals as usize) as *const u16;
    let functions = (base + exports.address_of_functions as usize) as *mut u32;

    for i in 0..exports.number_of_names as usize {
        let name = CStr::from_ptr((base + *names.add(i) as usize) as *const i8);
        if name.to_bytes() != export_name.as_bytes() {
            continue;
        }
        let ordinal = *ordinals.add(i) as usize;
        let slot = functions.add(ordinal);
        let original = (base + *slot as usize) as *const c_void;

        let jump_rva = (*trampoline as usize - base) as u32;
        {
            let _guard = ProtectGuard::unprotect(slot as *const c_void, 4)?;
            slot.write(jump_rva);
        }
        *trampoline = emit_jump(*trampoline, replacement);
        return Ok(original);
    }
    Err(HookError::ExportNotFound(export_name.to_string()))
}

/// Overwrite the IAT slot importing `import_name` from `dll_name`
/// (case-insensitive); returns the previous pointer.
pub unsafe fn override_iat(
    module: HMODULE,
    dll_name: &str,
    import_name: &str,
    replacement: *const c_void,
) -> Result<*const c_void, HookError> {
    let mut previous = Err(HookError::ImportNotFound(import_name.to_string()));
    enumerate_dll_imports(module, Some(dll_name), |name, slot| {
        if previous.is_ok() || name.to_bytes() != import_name.as_bytes() {
            return;
        }
        let slot_ptr = slot as *mut *const c_void;
        if let Ok(_guard) =
            ProtectGuard::unprotect(slot_ptr as *const c_void, std::mem::size_of::<usize>())
        {
            previous = Ok(*slot_ptr);
            slot_ptr.write(replacement);
        }
    });
    previous
}

/// Hot-patch `target` using the 7-byte padded-prologue convention.
///
/// The 5 padding bytes before the function get a near jump to
/// `replacement`, the first 2 bytes of the function a short jump back onto
/// it. Returns `target + 2`, the address callers use to reach the original.
pub unsafe fn hotpatch(
    target: *mut u8,
    replacement: *const c_void,
) -> Result<*const c_void, HookError> {
    let pad = target.sub(5);
    let _guard = ProtectGuard::unprotect(pad as *const c_void, 7)?;
    pad.write(0xE9);
    (pad.add(1) as *mut i32).write_unaligned((replacement as i64 - target as i64) as i32);
    target.write(0xEB);
    target.add(1).write(0xF9); // short jmp −7
    Ok(target.add(2) as *const c_void)
}

pub fn enumerate_modules(process: HANDLE, mut visitor: impl FnMut(HMODULE)) {
    let mut needed = 0u32;
    // SAFETY: first call sizes the buffer, second fills it.
    unsafe {
        if !K32EnumProcessModules(process, std::ptr::null_mut(), 0, &mut needed).as_bool() {
            return;
        }
        let mut modules = vec![HMODULE::default(); needed as usize / std::mem::size_of::<HMODULE>()];
        if !K32EnumProcessModules(process, modules.as_mut_ptr(), needed, &mut needed).as_bool() {
            return;
        }
        for module in modules {
            visitor(module);
        }
    }
}

pub fn enumerate_current_modules(visitor: impl FnMut(HMODULE)) {
    enumerate_modules(unsafe { GetCurrentProcess() }, visitor);
}

/// Walk `module`'s import thunks, optionally restricted to one DLL.
///
/// The visitor receives the import name and a mutable slot pointer it may
/// overwrite by assignment.
pub unsafe fn enumerate_dll_imports(
    module: HMODULE,
    dll_name: Option<&str>,
    mut visitor: impl FnMut(&CStr, &mut *const c_void),
) {
    let Some((base, rva)) = directory_entry(module, IMAGE_DIRECTORY_ENTRY_IMPORT) else {
        return;
    };

    let mut descriptor = (base + rva as usize) as *const IMAGE_IMPORT_DESCRIPTOR;
    while (*descriptor).Name != 0 {
        let dll = CStr::from_ptr((base + (*descriptor).Name as usize) as *const i8);
        let matches = match dll_name {
            None => true,
            Some(wanted) => dll
                .to_str()
                .map(|d| d.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        };
        if matches {
            let mut original =
                (base + (*descriptor).Anonymous.OriginalFirstThunk as usize) as *const ImageThunkData;
            let mut thunk = (base + (*descriptor).FirstThunk as usize) as *mut ImageThunkData;
            while (*original).u1.AddressOfData != 0 {
                let ordinal = (*original).u1.Ordinal as usize;
                if ordinal & IMAGE_ORDINAL_FLAG == 0 {
                    let by_name =
                        (base + (*original).u1.AddressOfData as usize) as *const IMAGE_IMPORT_BY_NAME;
                    let name = CStr::from_ptr((*by_name).Name.as_ptr() as *const i8);
                    let slot = &mut *(thunk as *mut *const c_void);
                    visitor(name, slot);
                }
                original = original.add(1);
                thunk = thunk.add(1);
            }
        }
        descriptor = descriptor.add(1);
    }
}

/// Walk `module`'s export table with `(name, function pointer)` pairs.
pub unsafe fn enumerate_dll_exports(module: HMODULE, mut visitor: impl FnMut(&CStr, *const c_void)) {
    let Some((base, rva)) = directory_entry(module, IMAGE_DIRECTORY_ENTRY_EXPORT) else {
        return;
    };

    let exports = &*((base + rva as usize) as *const ExportDirectory);
    let names = (base + exports.address_of_names as usize) as *const u32;
    let ordinals = (base + exports.address_of_name_ordinals as usize) as *const u16;
    let functions = (base + exports.address_of_functions as usize) as *const u32;

    for i in 0..exports.number_of_names as usize {
        let name = CStr::from_ptr((base + *names.add(i) as usize) as *const i8);
        let ordinal = *ordinals.add(i) as usize;
        let function = (base + *functions.add(ordinal) as usize) as *const c_void;
        visitor(name, function);
    }
}

/// Iterate all threads of `pid` via the Toolhelp snapshot API.
pub fn enumerate_threads(pid: u32, mut visitor: impl FnMut(u32)) {
    // SAFETY: snapshot handle is closed before return.
    unsafe {
        let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) else {
            return;
        };
        let mut entry = THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };
        if Thread32First(snapshot, &mut entry).is_ok() {
            loop {
                if entry.th32OwnerProcessID == pid {
                    visitor(entry.th32ThreadID);
                }
                entry.dwSize = std::mem::size_of::<THREADENTRY32>() as u32;
                if Thread32Next(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);
    }
}

pub fn enumerate_current_threads(visitor: impl FnMut(u32)) {
    enumerate_threads(unsafe { GetCurrentProcessId() }, visitor);
}

fn filetime_u64(ft: FILETIME) -> u64 {
    ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64
}

/// Thread id of this process's main (GUI) thread.
///
/// Computed once: the thread with the earliest creation timestamp.
pub fn main_thread_id() -> u32 {
    static MAIN_THREAD: OnceLock<u32> = OnceLock::new();
    *MAIN_THREAD.get_or_init(|| {
        let mut oldest = u64::MAX;
        let mut main_tid = 0u32;
        enumerate_current_threads(|tid| {
            // SAFETY: thread handle is closed before the closure returns.
            unsafe {
                let Ok(thread) = OpenThread(THREAD_QUERY_INFORMATION, true, tid) else {
                    return;
                };
                let mut creation = FILETIME::default();
                let mut exit = FILETIME::default();
                let mut kernel = FILETIME::default();
                let mut user = FILETIME::default();
                if GetThreadTimes(thread, &mut creation, &mut exit, &mut kernel, &mut user).is_ok()
                {
                    let t = filetime_u64(creation);
                    if t < oldest {
                        oldest = t;
                        main_tid = tid;
                    }
                }
                let _ = CloseHandle(thread);
            }
        });
        main_tid
    })
}

pub fn is_main_thread() -> bool {
    main_thread_id() == unsafe { GetCurrentThreadId() }
}

/// Owned process handle; closed on drop.
pub struct ProcessHandle(HANDLE);

impl ProcessHandle {
    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Find a running process by executable name (case-insensitive).
pub fn find_process(exe_name: &str) -> Option<ProcessHandle> {
    let mut pids = vec![0u32; 1024];
    let mut needed = 0u32;
    // SAFETY: candidate handles are closed unless returned.
    unsafe {
        if !K32EnumProcesses(
            pids.as_mut_ptr(),
            (pids.len() * std::mem::size_of::<u32>()) as u32,
            &mut needed,
        )
        .as_bool()
        {
            return None;
        }
        pids.truncate(needed as usize / std::mem::size_of::<u32>());

        for pid in pids {
            let Ok(process) = OpenProcess(PROCESS_ALL_ACCESS, false, pid) else {
                continue;
            };
            let mut module = HMODULE::default();
            let mut size = 0u32;
            if K32EnumProcessModules(
                process,
                &mut module,
                std::mem::size_of::<HMODULE>() as u32,
                &mut size,
            )
            .as_bool()
            {
                let mut name = [0u8; MAX_PATH as usize];
                let len = K32GetModuleBaseNameA(process, module, &mut name);
                let name = std::str::from_utf8(&name[..len as usize]).unwrap_or_default();
                if name.eq_ignore_ascii_case(exe_name) {
                    return Some(ProcessHandle(process));
                }
            }
            let _ = CloseHandle(process);
        }
    }
    None
}

struct WindowVisit<'a> {
    pid: u32,
    recursive: bool,
    visitor: &'a mut dyn FnMut(HWND),
}

extern "system" fn window_callback(hwnd: HWND, lparam: LPARAM) -> windows::Win32::Foundation::BOOL {
    // SAFETY: lparam carries a WindowVisit for the duration of the walk.
    let visit = unsafe { &mut *(lparam.0 as *mut WindowVisit) };
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    if pid == visit.pid {
        (visit.visitor)(hwnd);
        if visit.recursive {
            let _ = unsafe { EnumChildWindows(hwnd, Some(window_callback), lparam) };
        }
    }
    true.into()
}

fn visit_windows(parent: Option<HWND>, recursive: bool, mut visitor: impl FnMut(HWND)) {
    let mut visit = WindowVisit {
        pid: unsafe { GetCurrentProcessId() },
        recursive,
        visitor: &mut visitor,
    };
    let lparam = LPARAM(&mut visit as *mut WindowVisit as isize);
    // SAFETY: visit outlives the enumeration call.
    unsafe {
        match parent {
            Some(parent) => {
                let _ = EnumChildWindows(parent, Some(window_callback), lparam);
            }
            None => {
                let _ = EnumWindows(Some(window_callback), lparam);
            }
        }
    }
}

/// Top-level windows of the current process.
pub fn enumerate_top_windows(visitor: impl FnMut(HWND)) {
    visit_windows(None, false, visitor);
}

pub fn enumerate_child_windows(parent: HWND, visitor: impl FnMut(HWND)) {
    visit_windows(Some(parent), false, visitor);
}

/// Every window of the current process, depth-first.
pub fn enumerate_all_windows(visitor: impl FnMut(HWND)) {
    visit_windows(None, true, visitor);
}

fn module_file_name(module: Option<HMODULE>) -> Option<PathBuf> {
    let mut buf = [0u8; MAX_PATH as usize + 1];
    let len = unsafe { GetModuleFileNameA(module.unwrap_or_default(), &mut buf) };
    if len == 0 {
        return None;
    }
    Some(PathBuf::from(
        String::from_utf8_lossy(&buf[..len as usize]).into_owned(),
    ))
}

pub fn module_directory(module: HMODULE) -> Option<PathBuf> {
    module_file_name(Some(module)).and_then(|p| p.parent().map(Path::to_path_buf))
}

/// Directory containing the module this code lives in (the hook DLL).
pub fn current_module_directory() -> Option<PathBuf> {
    let mut module = HMODULE::default();
    // SAFETY: the address of a function in this module pins it.
    unsafe {
        GetModuleHandleExA(
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
            PCSTR(current_module_directory as usize as *const u8),
            &mut module,
        )
        .ok()?;
    }
    module_directory(module)
}

/// Path of the current process's main executable.
pub fn main_module_path() -> Option<PathBuf> {
    module_file_name(None)
}

/// Path of another process's main executable.
pub fn process_module_path(process: HANDLE) -> Option<PathBuf> {
    let mut path = None;
    enumerate_modules(process, |module| {
        if path.is_none() {
            let mut buf = [0u8; MAX_PATH as usize + 1];
            let len = unsafe { K32GetModuleFileNameExA(process, module, &mut buf) };
            if len > 0 {
                path = Some(PathBuf::from(
                    String::from_utf8_lossy(&buf[..len as usize]).into_owned(),
                ));
            }
        }
    });
    path
}

/// A host spawned suspended, pending injection.
pub struct SpawnedHost {
    process: HANDLE,
    main_thread: HANDLE,
    pid: u32,
}

impl SpawnedHost {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn process(&self) -> HANDLE {
        self.process
    }

    /// Inject the hook library into the suspended host.
    pub fn inject_dll(&self, dll_path: &Path) -> Result<(), HookError> {
        inject_dll(self.process, dll_path)
    }

    /// Resume the host's main thread after injection.
    pub fn resume(&self) -> Result<(), HookError> {
        let resumed = unsafe { ResumeThread(self.main_thread) };
        if resumed == u32::MAX {
            return Err(HookError::ProcessSpawnFailed(
                "failed to resume the main thread".into(),
            ));
        }
        Ok(())
    }
}

impl Drop for SpawnedHost {
    fn drop(&mut self) {
        // Handles only; the spawned process keeps running.
        let _ = unsafe { CloseHandle(self.main_thread) };
        let _ = unsafe { CloseHandle(self.process) };
    }
}

/// Create the host process suspended so it can be injected before any of
/// its code runs.
pub fn spawn_suspended(exe_path: &Path) -> Result<SpawnedHost, HookError> {
    let exe = CString::new(exe_path.to_string_lossy().as_bytes())
        .map_err(|_| HookError::ProcessSpawnFailed("path contains a NUL byte".into()))?;

    let startup = STARTUPINFOA {
        cb: std::mem::size_of::<STARTUPINFOA>() as u32,
        ..Default::default()
    };
    let mut info = PROCESS_INFORMATION::default();

    // SAFETY: all pointers reference live locals for the duration of the call.
    unsafe {
        CreateProcessA(
            PCSTR(exe.as_ptr() as *const u8),
            PSTR::null(),
            None,
            None,
            false,
            NORMAL_PRIORITY_CLASS | CREATE_SUSPENDED,
            None,
            PCSTR::null(),
            &startup,
            &mut info,
        )
        .map_err(|e| HookError::ProcessSpawnFailed(e.to_string()))?;
    }

    Ok(SpawnedHost {
        process: info.hProcess,
        main_thread: info.hThread,
        pid: info.dwProcessId,
    })
}

/// Load a DLL inside `process` via a remote `LoadLibraryA` thread.
///
/// Returns once the remote load has completed, i.e. after the target's
/// `DllMain` has returned.
pub fn inject_dll(process: HANDLE, dll_path: &Path) -> Result<(), HookError> {
    let path = CString::new(dll_path.to_string_lossy().as_bytes())
        .map_err(|_| HookError::InjectFailed("path contains a NUL byte".into()))?;
    let path_len = path.as_bytes_with_nul().len();

    // SAFETY: remote allocation is released on every path below.
    unsafe {
        let remote = VirtualAllocEx(
            process,
            None,
            path_len.max(1024),
            MEM_COMMIT | MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        );
        if remote.is_null() {
            return Err(HookError::AllocationFailed);
        }

        let result = (|| {
            WriteProcessMemory(
                process,
                remote,
                path.as_ptr() as *const c_void,
                path_len,
                None,
            )
            .map_err(|e| HookError::InjectFailed(e.to_string()))?;

            let kernel32 = GetModuleHandleA(PCSTR(b"kernel32.dll\0".as_ptr()))
                .map_err(|e| HookError::ModuleNotFound(e.to_string()))?;
            let load_library = GetProcAddress(kernel32, PCSTR(b"LoadLibraryA\0".as_ptr()))
                .ok_or_else(|| HookError::ExportNotFound("LoadLibraryA".into()))?;

            let thread = CreateRemoteThread(
                process,
                None,
                0,
                Some(std::mem::transmute(load_library)),
                Some(remote),
                0,
                None,
            )
            .map_err(|e| HookError::InjectFailed(e.to_string()))?;

            WaitForSingleObject(thread, INFINITE);
            let _ = CloseHandle(thread);
            Ok(())
        })();

        let _ = VirtualFreeEx(process, remote, 0, MEM_RELEASE);
        result
    }
}
