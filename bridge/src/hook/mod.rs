//! Process & module hook kit.
//!
//! Everything the bridge needs to get inside a host process: spawning it
//! suspended, injecting the hook library, overriding export/import tables,
//! hot-patching prologues, and identifying the engine (GUI) thread.
//!
//! The operations are intrinsically tied to the PE binary format and the
//! Win32 process model; there is no meaningful cross-platform abstraction
//! of an EAT or IAT. Off Windows the kit is a stub whose operations all
//! answer [`HookError::Unsupported`], and the bridge refuses to attach.

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("export not found: {0}")]
    ExportNotFound(String),

    #[error("import not found: {0}")]
    ImportNotFound(String),

    #[error("executable memory allocation failed")]
    AllocationFailed,

    #[error("patch failed: {0}")]
    PatchFailed(String),

    #[error("process spawn failed: {0}")]
    ProcessSpawnFailed(String),

    #[error("DLL injection failed: {0}")]
    InjectFailed(String),

    #[error("process hooking is not supported on this platform")]
    Unsupported,
}

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::*;

#[cfg(not(windows))]
mod stub;
#[cfg(not(windows))]
pub use self::stub::*;
