//! Demo hook library.
//!
//! Demonstrates the host side of the bridge contract: a [`TalkEngine`]
//! backed by a tone generator instead of a proprietary TTS engine,
//! exported through the C-linkage `rtGetTalkInterface` entry point that
//! every hook library must provide. A real hook additionally patches the
//! host's engine entry points with `talkbridge::hook` so synthesis events
//! flow into the engine; the generator stands in for that here.
//!
//! # Building
//!
//! ```bash
//! cargo build --release -p talkbridge-demo-hook
//! ```
//!
//! The resulting shared library can be injected with the launcher to get
//! a fully working bridge against a process that has no TTS engine at all.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use talkbridge::talk::{into_interface, CastInfo, SampleSink, TalkEngine, TalkParams, TalkSampleRef};
use talkbridge_hook_api::TalkInterface;

const FREQUENCY: u32 = 48_000;
const CHUNK_SAMPLES: usize = 4_800; // 100 ms per streamed chunk

/// Engine producing a 440 Hz tone, one chunk per staged character.
pub struct DemoEngine {
    params: TalkParams,
    text: Arc<Mutex<Vec<u8>>>,
    busy: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl DemoEngine {
    pub fn new() -> Self {
        let mut params = TalkParams::new();
        params.set_volume(0.5);
        params.set_speed(1.0);
        params.set_pitch(1.0);
        Self {
            params,
            text: Arc::new(Mutex::new(Vec::new())),
            busy: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn tone_chunk(volume: f32, pitch: f32) -> Vec<u8> {
        let angular = 2.0 * PI * 440.0 * pitch / FREQUENCY as f32;
        (0..CHUNK_SAMPLES)
            .map(|i| ((angular * i as f32).sin() * volume * i16::MAX as f32) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TalkEngine for DemoEngine {
    fn client_name(&self) -> String {
        "DemoHost".into()
    }

    fn plugin_version(&self) -> i32 {
        1
    }

    fn protocol_version(&self) -> i32 {
        1
    }

    fn params(&self) -> Option<TalkParams> {
        Some(self.params)
    }

    fn set_params(&mut self, params: &TalkParams) -> bool {
        self.params.apply(params);
        true
    }

    fn casts(&self) -> Vec<CastInfo> {
        vec![CastInfo {
            id: 0,
            name: "Sine".into(),
            param_names: Vec::new(),
        }]
    }

    fn set_text(&mut self, text: &[u8]) -> bool {
        *self.text.lock().unwrap() = text.to_vec();
        true
    }

    fn ready(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    fn talk(&mut self, mut sink: SampleSink) -> bool {
        if self.busy.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stop.store(false, Ordering::SeqCst);

        let chunks = self.text.lock().unwrap().len().max(1);
        let chunk = Self::tone_chunk(self.params.volume(), self.params.pitch());
        let busy = self.busy.clone();
        let stop = self.stop.clone();

        std::thread::spawn(move || {
            for _ in 0..chunks {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                sink(Some(TalkSampleRef {
                    data: &chunk,
                    bits: 16,
                    channels: 1,
                    frequency: FREQUENCY,
                }));
            }
            sink(None);
            busy.store(false, Ordering::SeqCst);
        });
        true
    }

    fn stop(&mut self) -> bool {
        self.stop.store(true, Ordering::SeqCst);
        self.busy.load(Ordering::SeqCst)
    }
}

struct InterfaceSingleton(*mut TalkInterface);

// SAFETY: the interface is created once and only ever driven from the
// bridge's engine thread.
unsafe impl Send for InterfaceSingleton {}
unsafe impl Sync for InterfaceSingleton {}

/// The entry point the bridge resolves after injecting this library.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn rtGetTalkInterface() -> *mut TalkInterface {
    static INSTANCE: OnceLock<InterfaceSingleton> = OnceLock::new();
    INSTANCE
        .get_or_init(|| {
            tracing::debug!("creating demo talk interface");
            InterfaceSingleton(Box::into_raw(Box::new(into_interface(Box::new(
                DemoEngine::new(),
            )))))
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkbridge::talk::ForeignTalkEngine;

    #[test]
    fn entry_point_returns_a_singleton() {
        let first = rtGetTalkInterface();
        let second = rtGetTalkInterface();
        assert!(!first.is_null());
        assert_eq!(first, second);
    }

    #[test]
    fn demo_engine_speaks_through_the_interface() {
        let mut engine =
            unsafe { ForeignTalkEngine::from_raw(rtGetTalkInterface()) }.expect("entry point");
        assert_eq!(engine.client_name(), "DemoHost");
        assert!(engine.set_text(b"abc"));

        let frames = Arc::new(Mutex::new(0usize));
        let ended = Arc::new(AtomicBool::new(false));
        let sink_frames = frames.clone();
        let sink_ended = ended.clone();
        assert!(engine.talk(Box::new(move |sample| match sample {
            Some(_) => *sink_frames.lock().unwrap() += 1,
            None => sink_ended.store(true, Ordering::SeqCst),
        })));

        // The generator streams from its own thread; give it a moment.
        for _ in 0..100 {
            if ended.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(ended.load(Ordering::SeqCst));
        assert_eq!(*frames.lock().unwrap(), 3);
    }
}
