//! Talk engine contract and FFI adapters.
//!
//! [`TalkEngine`] is the Rust-side contract over a host's TTS engine. The
//! bridge drives it exclusively from the host's engine thread; the only
//! part that may run elsewhere is the sample sink, which the engine invokes
//! on whatever thread produces audio.
//!
//! Two adapters cross the C ABI defined by `talkbridge-hook-api`:
//! [`ForeignTalkEngine`] wraps a loaded [`TalkInterface`] (the interface a
//! hook library exports through `rtGetTalkInterface`) as a `TalkEngine`,
//! and [`into_interface`] exports any `TalkEngine` as a `TalkInterface`
//! for hook libraries written in Rust.

use std::ffi::{c_char, c_void, CStr, CString};

use talkbridge_hook_api::{
    EngineHandle, RawCastInfo, RawTalkParams, TalkInterface, TalkSample, TalkSampleCallback,
    TalkVTable,
};

use super::params::{CastInfo, TalkParams};
use crate::audio::{AudioData, SampleFormat};

/// One borrowed chunk of synthesized PCM.
#[derive(Debug, Clone, Copy)]
pub struct TalkSampleRef<'a> {
    pub data: &'a [u8],
    pub bits: u32,
    pub channels: u32,
    pub frequency: u32,
}

impl TalkSampleRef<'_> {
    /// Copy this chunk into an owned [`AudioData`].
    ///
    /// Returns `None` when `bits` names no known sample layout.
    pub fn to_audio_data(&self) -> Option<AudioData> {
        let format = SampleFormat::from_bits(self.bits)?;
        Some(AudioData {
            format,
            frequency: self.frequency,
            channels: self.channels,
            data: self.data.to_vec(),
        })
    }
}

/// Receiver of the samples produced by one talk.
///
/// Invoked zero or more times with `Some(sample)`, then exactly once with
/// `None` to mark the end of the utterance (also after a stop).
pub type SampleSink = Box<dyn FnMut(Option<TalkSampleRef<'_>>) + Send>;

/// Contract over a host TTS engine.
///
/// Callable only from the host's engine thread; implementations may assume
/// serialized access.
pub trait TalkEngine: Send {
    fn client_name(&self) -> String;
    fn plugin_version(&self) -> i32;
    fn protocol_version(&self) -> i32;

    /// The engine's current parameter state, or `None` when unavailable.
    fn params(&self) -> Option<TalkParams>;
    /// Apply the flagged sub-fields of `params`; the rest stay untouched.
    fn set_params(&mut self, params: &TalkParams) -> bool;

    /// Selectable voices, in an order stable for the session.
    fn casts(&self) -> Vec<CastInfo>;

    /// Stage the next utterance. `text` is encoded in the host's ANSI codepage.
    fn set_text(&mut self, text: &[u8]) -> bool;

    /// True iff the engine is initialized and idle.
    fn ready(&self) -> bool;

    /// Begin synthesis of the staged text; returns whether it started.
    fn talk(&mut self, sink: SampleSink) -> bool;

    /// Request an in-flight talk to abort. The sink still receives its
    /// terminal `None`.
    fn stop(&mut self) -> bool;
}

// =============================================================================
// Raw parameter conversions
// =============================================================================

pub fn params_to_raw(p: &TalkParams) -> RawTalkParams {
    RawTalkParams {
        mute: p.mute() as i32,
        force_mono: p.force_mono() as i32,
        cast: p.cast(),
        flags: p.flags(),
        num_params: p.num_params() as i32,
        values: *p.values(),
    }
}

pub fn params_from_raw(raw: &RawTalkParams) -> TalkParams {
    TalkParams::from_parts(
        raw.mute != 0,
        raw.force_mono != 0,
        raw.cast,
        raw.num_params.max(0) as usize,
        raw.values,
        raw.flags,
    )
}

// =============================================================================
// Foreign interface -> TalkEngine
// =============================================================================

/// Adapter driving a hook-exported [`TalkInterface`] through [`TalkEngine`].
///
/// The interface is the hook's singleton; the adapter borrows it for the
/// process lifetime and never frees it.
pub struct ForeignTalkEngine {
    interface: *mut TalkInterface,
}

// SAFETY: the bridge serializes all calls onto the engine thread; the raw
// pointer is only ever dereferenced there.
unsafe impl Send for ForeignTalkEngine {}

impl ForeignTalkEngine {
    /// Wrap a raw interface pointer obtained from a hook's entry point.
    ///
    /// # Safety
    ///
    /// `interface` must be non-null, valid for the lifetime of the adapter,
    /// and not driven through any other path concurrently.
    pub unsafe fn from_raw(interface: *mut TalkInterface) -> Option<Self> {
        if interface.is_null() {
            return None;
        }
        Some(Self { interface })
    }

    fn iface(&self) -> &TalkInterface {
        // SAFETY: non-null by construction, valid per from_raw contract.
        unsafe { &*self.interface }
    }

    fn iface_mut(&mut self) -> &mut TalkInterface {
        // SAFETY: as above; &mut self gives exclusive access.
        unsafe { &mut *self.interface }
    }
}

extern "C" fn sample_trampoline(sample: *const TalkSample, userdata: *mut c_void) {
    let sink_ptr = userdata as *mut SampleSink;
    if sink_ptr.is_null() {
        return;
    }

    let terminal = sample.is_null() || unsafe { (*sample).is_terminal() };
    if terminal {
        // Exactly one terminal invocation per talk; it consumes the sink.
        // SAFETY: sink_ptr came from Box::into_raw in ForeignTalkEngine::talk.
        let mut sink = unsafe { Box::from_raw(sink_ptr) };
        sink(None);
    } else {
        // SAFETY: non-terminal samples carry valid data for the call duration.
        let s = unsafe { &*sample };
        let data = unsafe { std::slice::from_raw_parts(s.data, s.size.max(0) as usize) };
        let view = TalkSampleRef {
            data,
            bits: s.bits.max(0) as u32,
            channels: s.channels.max(0) as u32,
            frequency: s.frequency.max(0) as u32,
        };
        unsafe { (*sink_ptr)(Some(view)) };
    }
}

impl TalkEngine for ForeignTalkEngine {
    fn client_name(&self) -> String {
        let ptr = self.iface().client_name();
        if ptr.is_null() {
            return String::new();
        }
        // SAFETY: the hook keeps the name alive for the interface lifetime.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn plugin_version(&self) -> i32 {
        self.iface().plugin_version()
    }

    fn protocol_version(&self) -> i32 {
        self.iface().protocol_version()
    }

    fn params(&self) -> Option<TalkParams> {
        let mut raw = RawTalkParams::default();
        if self.iface().get_params(&mut raw) {
            Some(params_from_raw(&raw))
        } else {
            None
        }
    }

    fn set_params(&mut self, params: &TalkParams) -> bool {
        let raw = params_to_raw(params);
        self.iface_mut().set_params(&raw)
    }

    fn casts(&self) -> Vec<CastInfo> {
        let n = self.iface().num_casts().max(0);
        let mut casts = Vec::with_capacity(n as usize);
        for i in 0..n {
            let mut raw = RawCastInfo::default();
            if !self.iface().get_cast_info(i, &mut raw) {
                continue;
            }
            let name = if raw.name.is_null() {
                String::new()
            } else {
                // SAFETY: cast names live as long as the interface.
                unsafe { CStr::from_ptr(raw.name) }
                    .to_string_lossy()
                    .into_owned()
            };
            let mut param_names = Vec::new();
            if !raw.param_names.is_null() {
                for k in 0..raw.num_params.max(0) as usize {
                    // SAFETY: the array holds num_params valid pointers.
                    let p = unsafe { *raw.param_names.add(k) };
                    if !p.is_null() {
                        param_names
                            .push(unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned());
                    }
                }
            }
            casts.push(CastInfo {
                id: raw.id,
                name,
                param_names,
            });
        }
        casts
    }

    fn set_text(&mut self, text: &[u8]) -> bool {
        let Ok(text) = CString::new(text) else {
            return false;
        };
        self.iface_mut().set_text(text.as_ptr())
    }

    fn ready(&self) -> bool {
        self.iface().ready()
    }

    fn talk(&mut self, sink: SampleSink) -> bool {
        let sink_ptr = Box::into_raw(Box::new(sink));
        let ok = self
            .iface_mut()
            .talk(sample_trampoline, sink_ptr as *mut c_void);
        if !ok {
            // The engine never started, so the terminal invocation that
            // would normally consume the sink is not coming.
            // SAFETY: sink_ptr was created above and not consumed.
            unsafe { drop(Box::from_raw(sink_ptr)) };
        }
        ok
    }

    fn stop(&mut self) -> bool {
        self.iface_mut().stop()
    }
}

// =============================================================================
// TalkEngine -> exported interface
// =============================================================================

struct ExportedCast {
    id: i32,
    name: CString,
    // The pointer table borrows the CString storage; CString heap buffers
    // do not move when the containing struct moves.
    #[allow(dead_code)]
    param_names: Vec<CString>,
    param_name_ptrs: Vec<*const c_char>,
}

struct ExportedEngine {
    engine: Box<dyn TalkEngine>,
    client_name: CString,
    casts: Vec<ExportedCast>,
}

struct CallbackTarget {
    cb: TalkSampleCallback,
    userdata: *mut c_void,
}

// SAFETY: userdata is an opaque token the engine passes back unchanged; the
// receiving callback is responsible for any cross-thread use.
unsafe impl Send for CallbackTarget {}

/// Export a [`TalkEngine`] as the C-ABI [`TalkInterface`].
///
/// This is what a hook library written in Rust returns from its
/// `rtGetTalkInterface` entry point.
pub fn into_interface(engine: Box<dyn TalkEngine>) -> TalkInterface {
    let client_name = CString::new(engine.client_name()).unwrap_or_default();
    let casts = engine
        .casts()
        .into_iter()
        .map(|c| {
            let param_names: Vec<CString> = c
                .param_names
                .iter()
                .map(|n| CString::new(n.as_str()).unwrap_or_default())
                .collect();
            let param_name_ptrs = param_names.iter().map(|n| n.as_ptr()).collect();
            ExportedCast {
                id: c.id,
                name: CString::new(c.name).unwrap_or_default(),
                param_names,
                param_name_ptrs,
            }
        })
        .collect();

    let state = ExportedEngine {
        engine,
        client_name,
        casts,
    };

    TalkInterface {
        handle: EngineHandle::new(state),
        vtable: EXPORT_VTABLE,
    }
}

const EXPORT_VTABLE: TalkVTable = TalkVTable {
    client_name: exported_client_name,
    plugin_version: exported_plugin_version,
    protocol_version: exported_protocol_version,
    get_params: exported_get_params,
    set_params: exported_set_params,
    num_casts: exported_num_casts,
    get_cast_info: exported_get_cast_info,
    set_text: exported_set_text,
    ready: exported_ready,
    talk: exported_talk,
    stop: exported_stop,
};

// SAFETY in all vtable functions: the handle was created with an
// ExportedEngine in into_interface and the bridge guarantees the pointers
// are valid for the call.

extern "C" fn exported_client_name(handle: *const EngineHandle) -> *const c_char {
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    state.client_name.as_ptr()
}

extern "C" fn exported_plugin_version(handle: *const EngineHandle) -> i32 {
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    state.engine.plugin_version()
}

extern "C" fn exported_protocol_version(handle: *const EngineHandle) -> i32 {
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    state.engine.protocol_version()
}

extern "C" fn exported_get_params(handle: *const EngineHandle, out: *mut RawTalkParams) -> bool {
    if out.is_null() {
        return false;
    }
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    match state.engine.params() {
        Some(p) => {
            unsafe { *out = params_to_raw(&p) };
            true
        }
        None => false,
    }
}

extern "C" fn exported_set_params(handle: *mut EngineHandle, raw: *const RawTalkParams) -> bool {
    if raw.is_null() {
        return false;
    }
    let state = unsafe { (*handle).as_mut::<ExportedEngine>() };
    let params = params_from_raw(unsafe { &*raw });
    state.engine.set_params(&params)
}

extern "C" fn exported_num_casts(handle: *const EngineHandle) -> i32 {
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    state.casts.len() as i32
}

extern "C" fn exported_get_cast_info(
    handle: *const EngineHandle,
    index: i32,
    out: *mut RawCastInfo,
) -> bool {
    if out.is_null() || index < 0 {
        return false;
    }
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    let Some(cast) = state.casts.get(index as usize) else {
        return false;
    };
    unsafe {
        *out = RawCastInfo {
            id: cast.id,
            num_params: cast.param_names.len() as i32,
            name: cast.name.as_ptr(),
            param_names: if cast.param_name_ptrs.is_empty() {
                std::ptr::null()
            } else {
                cast.param_name_ptrs.as_ptr()
            },
        };
    }
    true
}

extern "C" fn exported_set_text(handle: *mut EngineHandle, text: *const c_char) -> bool {
    if text.is_null() {
        return false;
    }
    let state = unsafe { (*handle).as_mut::<ExportedEngine>() };
    let bytes = unsafe { CStr::from_ptr(text) }.to_bytes();
    state.engine.set_text(bytes)
}

extern "C" fn exported_ready(handle: *const EngineHandle) -> bool {
    let state = unsafe { (*handle).as_ref::<ExportedEngine>() };
    state.engine.ready()
}

extern "C" fn exported_talk(
    handle: *mut EngineHandle,
    callback: TalkSampleCallback,
    userdata: *mut c_void,
) -> bool {
    let state = unsafe { (*handle).as_mut::<ExportedEngine>() };
    let target = CallbackTarget {
        cb: callback,
        userdata,
    };
    let sink: SampleSink = Box::new(move |sample| {
        let target = &target;
        match sample {
        Some(s) => {
            let raw = TalkSample {
                data: s.data.as_ptr(),
                size: s.data.len() as i32,
                bits: s.bits as i32,
                channels: s.channels as i32,
                frequency: s.frequency as i32,
            };
            (target.cb)(&raw, target.userdata);
        }
        None => (target.cb)(std::ptr::null(), target.userdata),
        }
    });
    state.engine.talk(sink)
}

extern "C" fn exported_stop(handle: *mut EngineHandle) -> bool {
    let state = unsafe { (*handle).as_mut::<ExportedEngine>() };
    state.engine.stop()
}
