//! PCM frames exchanged between the decode pipeline and the sinks

use crate::error::CodecError;

/// Interleaved 16-bit PCM for one packet slot
///
/// An empty frame tells the sinks there is no audio for this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    /// Interleaved samples
    pub samples: Vec<i16>,
    /// Number of channels
    pub channels: u16,
}

impl PcmFrame {
    pub fn new(samples: Vec<i16>, channels: u16) -> Self {
        Self { samples, channels }
    }

    /// Empty filler frame
    pub fn silence(channels: u16) -> Self {
        Self::new(Vec::new(), channels)
    }

    pub fn is_silence(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Interpret little-endian 16-bit sample bytes
    pub fn from_le_bytes(bytes: &[u8], channels: u16) -> Result<Self, CodecError> {
        if bytes.len() % 2 != 0 {
            return Err(CodecError::InvalidFrameSize(bytes.len()));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(samples, channels))
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Average channel pairs of a stereo frame
    pub fn to_mono(&self) -> Self {
        if self.channels != 2 {
            return self.clone();
        }
        let samples = self
            .samples
            .chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect();
        Self::new(samples, 1)
    }

    /// Get frame duration in microseconds
    pub fn duration_us(&self, sample_rate: u32) -> u64 {
        (self.samples_per_channel() as u64 * 1_000_000) / sample_rate as u64
    }
}
