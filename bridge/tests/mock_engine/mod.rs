//! Mock talk engine.
//!
//! Stands in for a hooked host: it accepts parameters and text, streams
//! configurable PCM frames from a background thread (the way a host audio
//! worker would), and honors stop requests mid-stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use talkbridge::audio::AudioData;
use talkbridge::talk::{CastInfo, SampleSink, TalkEngine, TalkParams, TalkSampleRef};

#[derive(Clone)]
pub struct MockEngineConfig {
    /// Frame template streamed on every tick.
    pub frame: AudioData,
    /// Frames per talk; `None` streams until stopped.
    pub frame_count: Option<usize>,
    /// Delay between frames.
    pub frame_interval: Duration,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            frame: AudioData::default(),
            frame_count: Some(1),
            frame_interval: Duration::ZERO,
        }
    }
}

pub struct MockEngine {
    config: MockEngineConfig,
    params: TalkParams,
    text: Arc<Mutex<Vec<u8>>>,
    busy: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl MockEngine {
    pub fn new(config: MockEngineConfig) -> Self {
        let mut params = TalkParams::new();
        params.set_volume(1.0);
        params.set_cast(0);
        Self {
            config,
            params,
            text: Arc::new(Mutex::new(Vec::new())),
            busy: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observe the most recently staged utterance.
    pub fn staged_text(&self) -> Arc<Mutex<Vec<u8>>> {
        self.text.clone()
    }
}

impl TalkEngine for MockEngine {
    fn client_name(&self) -> String {
        "MockHost".into()
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
            name: "Mock".into(),
            param_names: vec!["happy".into(), "angry".into()],
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

        let frame = self.config.frame.clone();
        let frame_count = self.config.frame_count;
        let interval = self.config.frame_interval;
        let busy = self.busy.clone();
        let stop = self.stop.clone();

        std::thread::spawn(move || {
            let mut sent = 0usize;
            loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(count) = frame_count {
                    if sent >= count {
                        break;
                    }
                }
                sink(Some(TalkSampleRef {
                    data: &frame.data,
                    bits: frame.format.bits_per_sample() as u32,
                    channels: frame.channels,
                    frequency: frame.frequency,
                }));
                sent += 1;
                if !interval.is_zero() {
                    std::thread::sleep(interval);
                }
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
