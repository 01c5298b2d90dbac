//! Sample-format-tagged PCM container.
//!
//! [`AudioData`] is the unit of audio exchanged between the hooked engine
//! callback, the message pump and the HTTP stream: a format tag, the sample
//! rate, the channel count and a raw byte buffer. It serializes through the
//! wire codec, exports as a canonical 16/24/32-bit PCM RIFF WAVE, and
//! concatenates across formats by converting through `f32`.

use std::io::{self, Read, Write};
use std::ops::AddAssign;
use std::path::Path;

use xxhash_rust::xxh3::xxh3_64;

use super::norm;
use crate::wire::{Decode, Encode};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("operation not supported for {0:?} samples")]
    UnsupportedFormat(SampleFormat),

    #[error("buffer does not match the sample layout")]
    FormatMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Audio sample encoding.
///
/// `RawFile` denotes an opaque container (e.g. a complete WAV file) that
/// the bridge forwards without interpreting. `Unknown` is the empty state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum SampleFormat {
    #[default]
    Unknown = 0,
    U8 = 1,
    S16 = 2,
    S24 = 3,
    S32 = 4,
    F32 = 5,
    RawFile = 100,
}

impl SampleFormat {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Unknown),
            1 => Some(Self::U8),
            2 => Some(Self::S16),
            3 => Some(Self::S24),
            4 => Some(Self::S32),
            5 => Some(Self::F32),
            100 => Some(Self::RawFile),
            _ => None,
        }
    }

    /// S24 occupies exactly 3 bytes; `Unknown`/`RawFile` have no sample size.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::F32 => 4,
            Self::Unknown | Self::RawFile => 0,
        }
    }

    pub fn bits_per_sample(self) -> usize {
        self.bytes_per_sample() * 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16),
            24 => Some(Self::S24),
            32 => Some(Self::S32),
            _ => None,
        }
    }

    fn is_pcm(self) -> bool {
        !matches!(self, Self::Unknown | Self::RawFile)
    }
}

/// PCM buffer tagged with its sample layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioData {
    pub format: SampleFormat,
    pub frequency: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl AudioData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set the byte length exactly; contents are overwritten by the producer.
    pub fn allocate_bytes(&mut self, len: usize) -> &mut [u8] {
        self.data.resize(len, 0);
        &mut self.data
    }

    /// Set the length to `num_samples` per-channel samples.
    pub fn allocate_samples(&mut self, num_samples: usize) -> &mut [u8] {
        let len = self.channels as usize * self.format.bytes_per_sample() * num_samples;
        self.allocate_bytes(len)
    }

    /// Total scalar sample count (all channels interleaved).
    pub fn sample_len(&self) -> usize {
        match self.format.bytes_per_sample() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        let per_second = self.frequency as u64 * self.channels as u64;
        if per_second == 0 {
            return 0.0;
        }
        self.sample_len() as f64 / per_second as f64
    }

    /// Deterministic 64-bit fingerprint over the sample bytes.
    pub fn hash(&self) -> u64 {
        xxh3_64(&self.data)
    }

    /// Convert every sample to `f32` using the normalization for `format`.
    ///
    /// `dst` must hold at least [`sample_len`](Self::sample_len) floats.
    pub fn samples_to_f32(&self, dst: &mut [f32]) -> Result<(), AudioError> {
        if !self.format.is_pcm() {
            return Err(AudioError::UnsupportedFormat(self.format));
        }
        let n = self.sample_len();
        if dst.len() < n {
            return Err(AudioError::FormatMismatch);
        }
        for (i, slot) in dst.iter_mut().take(n).enumerate() {
            *slot = read_sample_f32(self.format, &self.data, i);
        }
        Ok(())
    }

    /// Write a canonical RIFF/WAVE image of this buffer.
    ///
    /// Fails for `RawFile` (opaque), `F32` (no integer PCM layout) and
    /// `Unknown`.
    pub fn write_wave<W: Write>(&self, w: &mut W) -> Result<(), AudioError> {
        if matches!(
            self.format,
            SampleFormat::RawFile | SampleFormat::F32 | SampleFormat::Unknown
        ) {
            return Err(AudioError::UnsupportedFormat(self.format));
        }

        let bits = self.format.bits_per_sample() as u32;
        let total = self.data.len() as u32 + 44;
        let byte_rate = self.frequency * bits * self.channels / 8;
        let block_align = (bits * self.channels / 8) as u16;

        w.write_all(b"RIFF")?;
        w.write_all(&(total - 8).to_le_bytes())?;
        w.write_all(b"WAVE")?;
        w.write_all(b"fmt ")?;
        w.write_all(&16u32.to_le_bytes())?;
        w.write_all(&1u16.to_le_bytes())?; // PCM
        w.write_all(&(self.channels as u16).to_le_bytes())?;
        w.write_all(&self.frequency.to_le_bytes())?;
        w.write_all(&byte_rate.to_le_bytes())?;
        w.write_all(&block_align.to_le_bytes())?;
        w.write_all(&(bits as u16).to_le_bytes())?;
        w.write_all(b"data")?;
        w.write_all(&(total - 44).to_le_bytes())?;
        w.write_all(&self.data)?;
        Ok(())
    }

    pub fn export_wave<P: AsRef<Path>>(&self, path: P) -> Result<(), AudioError> {
        let mut file = std::fs::File::create(path)?;
        self.write_wave(&mut file)?;
        Ok(())
    }
}

impl Encode for AudioData {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        (self.format as u32).encode(w)?;
        self.frequency.encode(w)?;
        self.channels.encode(w)?;
        self.data.encode(w)
    }
}

impl Decode for AudioData {
    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let format = SampleFormat::from_u32(u32::decode(r)?)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown sample format"))?;
        let frequency = u32::decode(r)?;
        let channels = u32::decode(r)?;
        let data = Vec::<u8>::decode(r)?;

        if format.is_pcm() && !data.is_empty() {
            let frame = format.bytes_per_sample() * channels as usize;
            if frame == 0 || data.len() % frame != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "sample data does not align with the frame size",
                ));
            }
        }

        Ok(Self {
            format,
            frequency,
            channels,
            data,
        })
    }
}

/// Append with on-the-fly format conversion.
///
/// Streams with mismatched `channels` or `frequency` are silently dropped;
/// existing clients rely on this best-effort concatenation.
impl AddAssign<&AudioData> for AudioData {
    fn add_assign(&mut self, v: &AudioData) {
        if self.format == SampleFormat::RawFile
            || v.data.is_empty()
            || !v.format.is_pcm()
        {
            return;
        }

        if self.format == SampleFormat::Unknown {
            *self = v.clone();
            return;
        }

        if self.channels != v.channels || self.frequency != v.frequency {
            return;
        }

        if self.format == v.format {
            self.data.extend_from_slice(&v.data);
            return;
        }

        let bps = self.format.bytes_per_sample();
        let pos = self.data.len();
        let added = v.sample_len();
        self.data.resize(pos + added * bps, 0);
        for i in 0..added {
            let s = read_sample_f32(v.format, &v.data, i);
            write_sample_f32(self.format, &mut self.data[pos..], i, s);
        }
    }
}

fn read_sample_f32(format: SampleFormat, data: &[u8], i: usize) -> f32 {
    match format {
        SampleFormat::U8 => norm::unorm8n_to_f32(data[i]),
        SampleFormat::S16 => {
            norm::snorm16_to_f32(i16::from_le_bytes([data[i * 2], data[i * 2 + 1]]))
        }
        SampleFormat::S24 => {
            norm::snorm24_to_f32([data[i * 3], data[i * 3 + 1], data[i * 3 + 2]])
        }
        SampleFormat::S32 => norm::snorm32_to_f32(i32::from_le_bytes([
            data[i * 4],
            data[i * 4 + 1],
            data[i * 4 + 2],
            data[i * 4 + 3],
        ])),
        SampleFormat::F32 => f32::from_le_bytes([
            data[i * 4],
            data[i * 4 + 1],
            data[i * 4 + 2],
            data[i * 4 + 3],
        ]),
        SampleFormat::Unknown | SampleFormat::RawFile => 0.0,
    }
}

fn write_sample_f32(format: SampleFormat, data: &mut [u8], i: usize, v: f32) {
    match format {
        SampleFormat::U8 => data[i] = norm::f32_to_unorm8n(v),
        SampleFormat::S16 => {
            data[i * 2..i * 2 + 2].copy_from_slice(&norm::f32_to_snorm16(v).to_le_bytes())
        }
        SampleFormat::S24 => data[i * 3..i * 3 + 3].copy_from_slice(&norm::f32_to_snorm24(v)),
        SampleFormat::S32 => {
            data[i * 4..i * 4 + 4].copy_from_slice(&norm::f32_to_snorm32(v).to_le_bytes())
        }
        SampleFormat::F32 => data[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes()),
        SampleFormat::Unknown | SampleFormat::RawFile => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_to_vec;

    fn s16(frequency: u32, channels: u32, samples: &[i16]) -> AudioData {
        AudioData {
            format: SampleFormat::S16,
            frequency,
            channels,
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }

    #[test]
    fn sample_len_and_duration() {
        let a = s16(48_000, 2, &[0; 96_000]);
        assert_eq!(a.sample_len(), 96_000);
        assert_eq!(a.duration(), 1.0);
        assert_eq!(a.data.len(), a.sample_len() * a.format.bytes_per_sample());
    }

    #[test]
    fn allocate_sets_exact_lengths() {
        let mut a = AudioData {
            format: SampleFormat::S16,
            frequency: 44_100,
            channels: 2,
            data: Vec::new(),
        };
        a.allocate_bytes(10);
        assert_eq!(a.data.len(), 10);
        a.allocate_samples(100);
        assert_eq!(a.data.len(), 100 * 2 * 2);
    }

    #[test]
    fn wire_roundtrip() {
        let a = s16(22_050, 1, &[1, -2, 3, -4]);
        let buf = encode_to_vec(&a);
        // u32 format | u32 frequency | u32 channels | u32 len | bytes
        assert_eq!(buf.len(), 16 + a.data.len());
        assert_eq!(&buf[0..4], &2u32.to_le_bytes());
        let b = AudioData::decode(&mut &buf[..]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decode_rejects_unknown_format() {
        let mut buf = encode_to_vec(&s16(22_050, 1, &[0]));
        buf[0] = 42;
        assert!(AudioData::decode(&mut &buf[..]).is_err());
    }

    #[test]
    fn decode_rejects_misaligned_data() {
        let a = AudioData {
            format: SampleFormat::S16,
            frequency: 22_050,
            channels: 2,
            data: vec![0u8; 6], // not a multiple of 2 bytes * 2 channels
        };
        let buf = encode_to_vec(&a);
        assert!(AudioData::decode(&mut &buf[..]).is_err());
    }

    #[test]
    fn wave_export_layout() {
        let a = AudioData {
            format: SampleFormat::S16,
            frequency: 48_000,
            channels: 2,
            data: vec![0x00, 0x00, 0x00, 0x80, 0xFF, 0x7F, 0xFF, 0xFF],
        };
        let mut buf = Vec::new();
        a.write_wave(&mut buf).unwrap();

        assert_eq!(buf.len(), 52);
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), 44);
        assert_eq!(&buf[8..12], b"WAVE");
        assert_eq!(&buf[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes(buf[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(buf[24..28].try_into().unwrap()), 48_000);
        assert_eq!(u16::from_le_bytes(buf[34..36].try_into().unwrap()), 16);
        assert_eq!(&buf[36..40], b"data");
        assert_eq!(u32::from_le_bytes(buf[40..44].try_into().unwrap()), 8);
        assert_eq!(&buf[44..52], &a.data[..]);
    }

    #[test]
    fn wave_export_rejects_f32_and_raw() {
        let mut a = s16(48_000, 1, &[0]);
        a.format = SampleFormat::F32;
        assert!(matches!(
            a.write_wave(&mut Vec::new()),
            Err(AudioError::UnsupportedFormat(SampleFormat::F32))
        ));
        a.format = SampleFormat::RawFile;
        assert!(a.write_wave(&mut Vec::new()).is_err());
    }

    #[test]
    fn u8_samples_convert_centered() {
        let a = AudioData {
            format: SampleFormat::U8,
            frequency: 8_000,
            channels: 1,
            data: vec![0x00, 0x80, 0xFF],
        };
        let mut dst = [0.0f32; 3];
        a.samples_to_f32(&mut dst).unwrap();
        assert_eq!(dst[0], -1.0);
        assert!(dst[1].abs() <= 1.0 / 255.0);
        assert_eq!(dst[2], 1.0);
    }

    #[test]
    fn convert_rejects_raw_and_short_buffers() {
        let mut a = s16(8_000, 1, &[0, 1]);
        let mut dst = [0.0f32; 1];
        assert!(matches!(
            a.samples_to_f32(&mut dst),
            Err(AudioError::FormatMismatch)
        ));
        a.format = SampleFormat::RawFile;
        assert!(matches!(
            a.samples_to_f32(&mut [0.0; 8]),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn append_same_format_concatenates() {
        let mut a = s16(22_050, 1, &[1, 2]);
        let b = s16(22_050, 1, &[3, 4]);
        a += &b;
        assert_eq!(a, s16(22_050, 1, &[1, 2, 3, 4]));
    }

    #[test]
    fn append_identities() {
        // this += empty leaves this unchanged
        let mut a = s16(22_050, 1, &[5, 6]);
        let before = a.clone();
        a += &AudioData::new();
        assert_eq!(a, before);

        // empty += a yields a clone of a
        let mut empty = AudioData::new();
        empty += &before;
        assert_eq!(empty, before);
    }

    #[test]
    fn append_drops_mismatched_streams() {
        let mut a = s16(22_050, 1, &[1]);
        let before = a.clone();
        a += &s16(44_100, 1, &[2]);
        assert_eq!(a, before);
        a += &s16(22_050, 2, &[2, 3]);
        assert_eq!(a, before);
    }

    #[test]
    fn append_raw_self_is_noop() {
        let mut a = AudioData {
            format: SampleFormat::RawFile,
            frequency: 0,
            channels: 0,
            data: vec![1, 2, 3],
        };
        let before = a.clone();
        a += &s16(22_050, 1, &[9]);
        assert_eq!(a, before);
    }

    #[test]
    fn append_converts_formats() {
        let mut a = s16(22_050, 1, &[0]);
        let b = AudioData {
            format: SampleFormat::U8,
            frequency: 22_050,
            channels: 1,
            data: vec![0x00, 0xFF],
        };
        a += &b;
        assert_eq!(a.format, SampleFormat::S16);
        assert_eq!(a.sample_len(), 3);
        let mut dst = [0.0f32; 3];
        a.samples_to_f32(&mut dst).unwrap();
        assert_eq!(dst[0], 0.0);
        assert!((dst[1] + 1.0).abs() < 1e-3);
        assert!((dst[2] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn append_associativity_same_format() {
        let b = s16(22_050, 1, &[10, 20]);
        let c = s16(22_050, 1, &[30, 40]);

        let mut left = s16(22_050, 1, &[1, 2]);
        left += &b;
        left += &c;

        let mut bc = b.clone();
        bc += &c;
        let mut right = s16(22_050, 1, &[1, 2]);
        right += &bc;

        assert_eq!(left.data, right.data);
    }

    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        let a = s16(22_050, 1, &[1, 2, 3]);
        let b = s16(22_050, 1, &[1, 2, 3]);
        let c = s16(22_050, 1, &[1, 2, 4]);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }
}
