//! Audio test fixtures.
//!
//! Programmatically generated PCM and helpers for picking apart the wire
//! stream the bridge produces. Generated audio keeps the tests free of
//! external files and fully reproducible.

use talkbridge::audio::{AudioData, SampleFormat};
use talkbridge::wire::Decode;

/// Generate silence (zeros) as 16-bit samples.
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Convert i16 samples to little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// One mono S16 frame of silence.
pub fn silence_frame(frequency: u32, duration_samples: usize) -> AudioData {
    AudioData {
        format: SampleFormat::S16,
        frequency,
        channels: 1,
        data: samples_to_bytes(&generate_silence(duration_samples)),
    }
}

/// Split a `/talk` response body back into its audio frames.
///
/// The stream is a sequence of serialized records terminated by an empty
/// one; a trailing partial record fails the test.
pub fn decode_frames(mut body: &[u8]) -> Vec<AudioData> {
    let mut frames = Vec::new();
    while !body.is_empty() {
        frames.push(AudioData::decode(&mut body).expect("malformed frame in stream"));
    }
    frames
}

/// True for the terminal record closing a talk stream.
pub fn is_terminal_frame(frame: &AudioData) -> bool {
    frame.format == SampleFormat::Unknown && frame.is_empty()
}
