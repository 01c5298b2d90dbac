pub mod data;
pub mod norm;

pub use data::{AudioData, AudioError, SampleFormat};
