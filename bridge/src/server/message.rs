//! Cross-thread message pump.
//!
//! HTTP workers post typed messages onto a mutex-guarded queue; the host's
//! engine thread drains it by calling [`TalkServer::process_messages`]
//! repeatedly. Messages are served strictly in FIFO order with one
//! exception: a stop may overtake a message the engine cannot accept yet,
//! because stopping the in-flight talk is the only way to unblock it.
//!
//! A talk message owns the response sink for its audio: the engine-side
//! sample sink encodes each produced chunk as a wire `AudioData` frame into
//! an unbounded channel, finishing with an empty terminal frame. The
//! channel absorbs audio faster than the client reads it (the engine is
//! never back-pressured) and sends to a disconnected client are dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{ServerError, TalkServerSettings};
use crate::audio::AudioData;
use crate::talk::{CastInfo, TalkEngine, TalkParams};
use crate::wire::encode_to_vec;

/// Interval between completion-flag polls in [`Message::wait`].
pub const WAIT_POLL: Duration = Duration::from_millis(30);

/// Poll count cap; together with [`WAIT_POLL`] this bounds a wait to ~5 min.
pub const WAIT_POLLS_MAX: usize = 10_000;

/// Snapshot of the engine's parameter state and cast list.
#[derive(Debug, Clone)]
pub struct GetParamsReply {
    pub params: TalkParams,
    pub casts: Vec<CastInfo>,
}

/// A pending talk: what to say, how, and where the audio goes.
pub struct TalkRequest {
    pub params: TalkParams,
    /// Utterance text in the host's ANSI codepage.
    pub text: Vec<u8>,
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    done: Arc<AtomicBool>,
}

impl TalkRequest {
    /// Terminate the stream: emit the empty terminal frame and mark done.
    fn finish(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Bytes::from(encode_to_vec(&AudioData::new())));
        }
        self.done.store(true, Ordering::SeqCst);
    }
}

enum MessageBody {
    Talk(TalkRequest),
    Stop,
    GetParams(Mutex<Option<GetParamsReply>>),
    #[cfg(debug_assertions)]
    Debug,
}

/// One queued request, shared between the HTTP worker that posted it and
/// the engine thread that services it.
pub struct Message {
    body: MessageBody,
    ready: AtomicBool,
}

pub type MessagePtr = Arc<Message>;

impl Message {
    /// Build a talk message; the receiver side carries the audio frames.
    pub fn talk(params: TalkParams, text: Vec<u8>) -> (MessagePtr, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let message = Arc::new(Self {
            body: MessageBody::Talk(TalkRequest {
                params,
                text,
                tx: Mutex::new(Some(tx)),
                done: Arc::new(AtomicBool::new(false)),
            }),
            ready: AtomicBool::new(false),
        });
        (message, rx)
    }

    pub fn stop() -> MessagePtr {
        Arc::new(Self {
            body: MessageBody::Stop,
            ready: AtomicBool::new(false),
        })
    }

    pub fn get_params() -> MessagePtr {
        Arc::new(Self {
            body: MessageBody::GetParams(Mutex::new(None)),
            ready: AtomicBool::new(false),
        })
    }

    #[cfg(debug_assertions)]
    pub fn debug() -> MessagePtr {
        Arc::new(Self {
            body: MessageBody::Debug,
            ready: AtomicBool::new(false),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    fn is_stop(&self) -> bool {
        matches!(self.body, MessageBody::Stop)
    }

    /// Ready but with its audio stream still in flight.
    pub fn is_processing(&self) -> bool {
        match &self.body {
            MessageBody::Talk(talk) => self.is_ready() && !talk.done.load(Ordering::SeqCst),
            _ => false,
        }
    }

    /// Poll the completion flag with a bounded sleep, ~5 minutes at most.
    pub async fn wait(&self) -> bool {
        for _ in 0..WAIT_POLLS_MAX {
            if self.is_ready() {
                return true;
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
        self.is_ready()
    }

    /// Take the `/params` reply filled in by the engine thread.
    pub fn take_params_reply(&self) -> Option<GetParamsReply> {
        match &self.body {
            MessageBody::GetParams(slot) => slot.lock().take(),
            _ => None,
        }
    }
}

/// The bridge server: a talk engine plus the queue feeding it.
///
/// The engine is only ever touched from `process_messages`, which the
/// host's engine thread calls; everything else is queue bookkeeping safe
/// from any thread.
pub struct TalkServer {
    engine: Mutex<Box<dyn TalkEngine>>,
    settings: TalkServerSettings,
    queue: Mutex<VecDeque<MessagePtr>>,
    engine_ready: AtomicBool,
}

impl TalkServer {
    pub fn new(engine: Box<dyn TalkEngine>, settings: TalkServerSettings) -> Self {
        Self {
            engine: Mutex::new(engine),
            settings,
            queue: Mutex::new(VecDeque::new()),
            engine_ready: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &TalkServerSettings {
        &self.settings
    }

    /// Engine readiness as of the last pump tick.
    pub fn engine_ready(&self) -> bool {
        self.engine_ready.load(Ordering::SeqCst)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn add_message(&self, message: MessagePtr) -> Result<(), ServerError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.settings.max_queue {
            return Err(ServerError::QueueFull);
        }
        queue.push_back(message);
        Ok(())
    }

    /// Drain the queue. Must be called from the engine thread.
    pub fn process_messages(&self) {
        let mut engine = self.engine.lock();
        self.engine_ready.store(engine.ready(), Ordering::SeqCst);

        let mut queue = self.queue.lock();
        let mut kept = VecDeque::with_capacity(queue.len());
        let mut stalled = false;

        while let Some(message) = queue.pop_front() {
            if stalled {
                // Only a stop may run ahead of a stalled message.
                if message.is_stop() && !message.is_ready() {
                    Self::on_stop(engine.as_mut());
                    message.mark_ready();
                    continue;
                }
                kept.push_back(message);
                continue;
            }

            if !message.is_ready() {
                if !Self::dispatch(engine.as_mut(), &message) {
                    stalled = true;
                    kept.push_back(message);
                    continue;
                }
                message.mark_ready();
            }

            if message.is_processing() {
                kept.push_back(message);
            }
        }

        *queue = kept;
        self.engine_ready.store(engine.ready(), Ordering::SeqCst);
    }

    fn dispatch(engine: &mut dyn TalkEngine, message: &Message) -> bool {
        match &message.body {
            MessageBody::Talk(talk) => Self::on_talk(engine, talk),
            MessageBody::Stop => Self::on_stop(engine),
            MessageBody::GetParams(slot) => Self::on_get_params(engine, slot),
            #[cfg(debug_assertions)]
            MessageBody::Debug => {
                tracing::debug!("debug message");
                true
            }
        }
    }

    fn on_talk(engine: &mut dyn TalkEngine, talk: &TalkRequest) -> bool {
        if !engine.ready() {
            return false;
        }

        if !engine.set_params(&talk.params) {
            tracing::warn!("engine rejected talk parameters");
        }
        if !engine.set_text(&talk.text) {
            tracing::warn!("engine rejected utterance text");
            talk.finish();
            return true;
        }

        let Some(tx) = talk.tx.lock().take() else {
            // Already started once; nothing left to stream into.
            return true;
        };

        let done = talk.done.clone();
        let mut tx_slot = Some(tx);
        let started = engine.talk(Box::new(move |sample| match sample {
            Some(sample) => {
                let Some(tx) = &tx_slot else { return };
                match sample.to_audio_data() {
                    Some(frame) => {
                        // Client gone is fine; remaining frames are dropped.
                        let _ = tx.send(Bytes::from(encode_to_vec(&frame)));
                    }
                    None => tracing::warn!(bits = sample.bits, "unrepresentable sample layout"),
                }
            }
            None => {
                if let Some(tx) = tx_slot.take() {
                    let _ = tx.send(Bytes::from(encode_to_vec(&AudioData::new())));
                    done.store(true, Ordering::SeqCst);
                }
            }
        }));

        if !started {
            tracing::warn!("engine refused to start talking");
            // The sink died with the refused talk; close out the stream so
            // the waiting worker is not left hanging.
            talk.done.store(true, Ordering::SeqCst);
        }
        true
    }

    fn on_stop(engine: &mut dyn TalkEngine) -> bool {
        if !engine.stop() {
            tracing::debug!("stop requested with no talk in flight");
        }
        true
    }

    fn on_get_params(engine: &mut dyn TalkEngine, slot: &Mutex<Option<GetParamsReply>>) -> bool {
        let Some(params) = engine.params() else {
            return false;
        };
        let casts = engine.casts();
        *slot.lock() = Some(GetParamsReply { params, casts });
        true
    }
}
