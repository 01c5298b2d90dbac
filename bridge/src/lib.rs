//! TalkBridge, an in-process bridge server for desktop TTS hosts.
//!
//! The bridge glues proprietary text-to-speech applications ("hosts") to
//! network clients: a hook library injected into the host process drives
//! the host's engine from a small embedded HTTP API, streaming synthesized
//! PCM back to the caller as it is produced.
//!
//! The crate is organized around three tightly coupled subsystems:
//!
//! - [`hook`]: spawning a host suspended, injecting the hook library, and
//!   patching PE export/import tables and code bytes so engine entry points
//!   route through the bridge (Windows-only; stubbed elsewhere).
//! - [`server`]: the cross-thread message pump between HTTP workers and
//!   the host's single engine thread, plus the HTTP routes themselves.
//! - [`audio`] / [`wire`]: the PCM container with its sample-format
//!   lattice and the length-prefixed codec that frames it on the wire.
//!
//! [`talk`] holds the engine contract ([`talk::TalkEngine`]) and its FFI
//! adapters over the C ABI defined by `talkbridge-hook-api`; [`launcher`]
//! is the process that sets everything in motion.

pub mod audio;
pub mod hook;
pub mod launcher;
pub mod server;
pub mod talk;
pub mod utils;
pub mod wire;

// Re-export commonly used items for convenience
pub use audio::{AudioData, AudioError, SampleFormat};
pub use hook::HookError;
pub use server::{Message, ServerError, TalkServer, TalkServerSettings};
pub use talk::{CastInfo, TalkEngine, TalkParams};
