pub mod http;
pub mod message;

pub use http::{router, serve, start, HttpServerHandle};
pub use message::{GetParamsReply, Message, MessagePtr, TalkServer};

/// HTTP bridge server tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct TalkServerSettings {
    /// Maximum number of queued messages before requests are rejected.
    pub max_queue: usize,
    /// Maximum number of concurrently served HTTP requests.
    pub max_threads: usize,
    pub port: u16,
}

impl Default for TalkServerSettings {
    fn default() -> Self {
        Self {
            max_queue: 256,
            max_threads: 8,
            port: 8081,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("engine is not ready")]
    EngineNotReady,

    #[error("engine is busy")]
    EngineBusy,

    #[error("timed out waiting for the engine")]
    Timeout,

    #[error("message queue is full")]
    QueueFull,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
