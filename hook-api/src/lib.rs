//! # TalkBridge Hook API
//!
//! This crate defines the FFI-safe interface between the TalkBridge server
//! and per-host hook libraries. A hook library is injected into a running
//! TTS host process; it implements the talk interface for that host's engine
//! and exports a single C-linkage factory symbol that the bridge resolves
//! after injection.
//!
//! # Architecture
//!
//! The hook exports [`ENTRY_POINT`] (`rtGetTalkInterface`), a function
//! returning the host's singleton [`TalkInterface`]. The interface is a
//! `#[repr(C)]` handle + vtable pair: the handle is a type-erased pointer to
//! the hook's engine state, the vtable carries `extern "C"` functions for
//! every operation. Audio flows back through [`TalkSampleCallback`]: one
//! `talk` produces zero or more samples followed by exactly one terminal
//! invocation with a null sample.
//!
//! # Safety
//!
//! All callbacks use raw pointers so the layout stays a plain C ABI; the
//! host side of the interface may be implemented in any language. Callers
//! must ensure pointers are valid for the duration of each call.

use std::ffi::{c_char, c_void};

/// Name of the C-linkage symbol a hook library must export.
///
/// The exported function has the signature of [`GetTalkInterfaceFn`] and
/// returns the singleton interface for the host it was injected into.
pub const ENTRY_POINT: &str = "rtGetTalkInterface";

/// Signature of the [`ENTRY_POINT`] factory symbol.
pub type GetTalkInterfaceFn = unsafe extern "C" fn() -> *mut TalkInterface;

/// Upper bound of the dense numeric parameter array.
pub const MAX_PARAMS: usize = 12;

// =============================================================================
// Data types crossing the FFI boundary
// =============================================================================

/// One chunk of synthesized PCM handed out by the engine.
///
/// `data` is borrowed; it is only valid for the duration of the callback
/// invocation. A null `data` marks the end of the current talk.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct TalkSample {
    /// Sample bytes, or null for the terminal invocation.
    pub data: *const u8,
    /// Byte count of `data`.
    pub size: i32,
    /// Bits per sample (8, 16, 24 or 32).
    pub bits: i32,
    /// Channel count.
    pub channels: i32,
    /// Sample rate in Hz.
    pub frequency: i32,
}

impl TalkSample {
    /// The terminal sample: null data, everything else zero.
    pub fn terminal() -> Self {
        Self {
            data: std::ptr::null(),
            size: 0,
            bits: 0,
            channels: 0,
            frequency: 0,
        }
    }

    /// Whether this is the terminal invocation of a talk.
    pub fn is_terminal(&self) -> bool {
        self.data.is_null()
    }
}

/// Callback invoked by the engine for each produced sample.
///
/// One `talk` call triggers zero or more invocations with non-null data
/// followed by exactly one invocation where `sample.data` is null.
pub type TalkSampleCallback = extern "C" fn(sample: *const TalkSample, userdata: *mut c_void);

/// FFI mirror of the bridge's parameter bundle.
///
/// `flags` records which sub-fields the caller explicitly set (see the
/// bridge's `TalkParams` for bit assignments); the receiver must not apply
/// an unflagged field. `values[k]` is applied for `k < num_params`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawTalkParams {
    pub mute: i32,
    pub force_mono: i32,
    pub cast: i32,
    pub flags: u32,
    pub num_params: i32,
    pub values: [f32; MAX_PARAMS],
}

impl Default for RawTalkParams {
    fn default() -> Self {
        Self {
            mute: 0,
            force_mono: 0,
            cast: 0,
            flags: 0,
            num_params: 0,
            values: [0.0; MAX_PARAMS],
        }
    }
}

/// FFI mirror of a selectable voice.
///
/// `name` and `param_names` borrow storage owned by the hook; they stay
/// valid for the lifetime of the interface.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawCastInfo {
    pub id: i32,
    pub num_params: i32,
    pub name: *const c_char,
    pub param_names: *const *const c_char,
}

impl Default for RawCastInfo {
    fn default() -> Self {
        Self {
            id: 0,
            num_params: 0,
            name: std::ptr::null(),
            param_names: std::ptr::null(),
        }
    }
}

// =============================================================================
// Opaque engine handle
// =============================================================================

/// Opaque handle to the hook's engine state.
///
/// Type-erased pointer managed by the hook; `drop_fn` frees it with the
/// correct concrete type when the interface is released.
#[repr(C)]
pub struct EngineHandle {
    pub ptr: *mut c_void,
    pub drop_fn: Option<extern "C" fn(*mut c_void)>,
}

impl EngineHandle {
    /// Create a handle from a boxed value.
    pub fn new<T>(value: T) -> Self {
        let ptr = Box::into_raw(Box::new(value)) as *mut c_void;

        extern "C" fn drop_impl<T>(ptr: *mut c_void) {
            // SAFETY: ptr originates from Box::into_raw in EngineHandle::new::<T>.
            unsafe {
                drop(Box::from_raw(ptr as *mut T));
            }
        }

        Self {
            ptr,
            drop_fn: Some(drop_impl::<T>),
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// # Safety
    /// `T` must be the type the handle was created with and `ptr` must be valid.
    pub unsafe fn as_ref<T>(&self) -> &T {
        &*(self.ptr as *const T)
    }

    /// # Safety
    /// `T` must be the type the handle was created with and `ptr` must be valid.
    pub unsafe fn as_mut<T>(&mut self) -> &mut T {
        &mut *(self.ptr as *mut T)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            if !self.ptr.is_null() {
                drop_fn(self.ptr);
            }
        }
    }
}

// SAFETY: the hook is responsible for making its engine state usable from
// the single engine thread; the bridge serializes every vtable call onto
// that thread.
unsafe impl Send for EngineHandle {}

// =============================================================================
// VTable & interface
// =============================================================================

/// VTable of talk interface operations.
///
/// Every function takes the interface's [`EngineHandle`]; booleans report
/// whether the operation was accepted.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TalkVTable {
    /// Host identification, e.g. `"VOICEROID2"`. Valid for the interface lifetime.
    pub client_name: extern "C" fn(handle: *const EngineHandle) -> *const c_char,
    pub plugin_version: extern "C" fn(handle: *const EngineHandle) -> i32,
    pub protocol_version: extern "C" fn(handle: *const EngineHandle) -> i32,

    /// Read the engine's current parameters into `params`.
    pub get_params: extern "C" fn(handle: *const EngineHandle, params: *mut RawTalkParams) -> bool,
    /// Apply the flagged sub-fields of `params`; unflagged fields stay untouched.
    pub set_params: extern "C" fn(handle: *mut EngineHandle, params: *const RawTalkParams) -> bool,

    pub num_casts: extern "C" fn(handle: *const EngineHandle) -> i32,
    pub get_cast_info:
        extern "C" fn(handle: *const EngineHandle, index: i32, info: *mut RawCastInfo) -> bool,

    /// Stage the next utterance. `text` is NUL-terminated, host-ANSI encoded.
    pub set_text: extern "C" fn(handle: *mut EngineHandle, text: *const c_char) -> bool,

    /// True iff the engine is initialized and idle.
    pub ready: extern "C" fn(handle: *const EngineHandle) -> bool,
    /// Begin synthesis of the staged text; samples arrive through `callback`.
    pub talk: extern "C" fn(
        handle: *mut EngineHandle,
        callback: TalkSampleCallback,
        userdata: *mut c_void,
    ) -> bool,
    /// Request an in-flight talk to abort; the terminal sample still arrives.
    pub stop: extern "C" fn(handle: *mut EngineHandle) -> bool,
}

/// A host talk interface: engine state plus method table.
///
/// Returned by the hook's [`ENTRY_POINT`] factory; the bridge drives it
/// exclusively from the host's engine thread.
#[repr(C)]
pub struct TalkInterface {
    pub handle: EngineHandle,
    pub vtable: TalkVTable,
}

impl TalkInterface {
    pub fn client_name(&self) -> *const c_char {
        (self.vtable.client_name)(&self.handle)
    }

    pub fn plugin_version(&self) -> i32 {
        (self.vtable.plugin_version)(&self.handle)
    }

    pub fn protocol_version(&self) -> i32 {
        (self.vtable.protocol_version)(&self.handle)
    }

    pub fn get_params(&self, params: &mut RawTalkParams) -> bool {
        (self.vtable.get_params)(&self.handle, params)
    }

    pub fn set_params(&mut self, params: &RawTalkParams) -> bool {
        (self.vtable.set_params)(&mut self.handle, params)
    }

    pub fn num_casts(&self) -> i32 {
        (self.vtable.num_casts)(&self.handle)
    }

    pub fn get_cast_info(&self, index: i32, info: &mut RawCastInfo) -> bool {
        (self.vtable.get_cast_info)(&self.handle, index, info)
    }

    pub fn set_text(&mut self, text: *const c_char) -> bool {
        (self.vtable.set_text)(&mut self.handle, text)
    }

    pub fn ready(&self) -> bool {
        (self.vtable.ready)(&self.handle)
    }

    pub fn talk(&mut self, callback: TalkSampleCallback, userdata: *mut c_void) -> bool {
        (self.vtable.talk)(&mut self.handle, callback, userdata)
    }

    pub fn stop(&mut self) -> bool {
        (self.vtable.stop)(&mut self.handle)
    }
}
