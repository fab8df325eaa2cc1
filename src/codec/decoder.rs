//! Built-in Opus decoding for voice sources

use opus::{Channels, Decoder};

use crate::audio::PcmFrame;
use crate::codec::AudioDecoder;
use crate::error::CodecError;

/// Opus stream of one source, concealment included
pub struct OpusDecoder {
    decoder: Decoder,
    sample_rate: u32,
    channels: u16,
    frame_size: usize,
    /// Sized for the longest Opus frame
    decode_buffer: Vec<i16>,
    frames_decoded: u64,
    frames_concealed: u64,
}

impl OpusDecoder {
    /// Create a decoder for one source layout
    pub fn new(sample_rate: u32, channels: u16, frame_size: usize) -> Result<Self, CodecError> {
        let opus_channels = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(CodecError::DecoderInit(format!(
                    "voice sources are mono or stereo, got {} channels",
                    channels
                )))
            }
        };

        let decoder = Decoder::new(sample_rate, opus_channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let max_samples = sample_rate as usize * channels as usize * 120 / 1000;
        let decode_buffer = vec![0i16; max_samples.max(frame_size * channels as usize)];

        Ok(Self {
            decoder,
            sample_rate,
            channels,
            frame_size,
            decode_buffer,
            frames_decoded: 0,
            frames_concealed: 0,
        })
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get frame size in samples per channel
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Get decode and concealment counters
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
        }
    }
}

impl AudioDecoder for OpusDecoder {
    /// Decode one Opus packet into interleaved samples
    fn decode(&mut self, data: &[u8]) -> Result<PcmFrame, CodecError> {
        let samples = self
            .decoder
            .decode(data, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.channels as usize;
        self.frames_decoded += 1;

        Ok(PcmFrame::new(
            self.decode_buffer[..total_samples].to_vec(),
            self.channels,
        ))
    }

    fn supports_concealment(&self) -> bool {
        true
    }

    /// One frame of packet loss concealment
    fn decode_concealed(&mut self) -> Result<PcmFrame, CodecError> {
        // PLC length follows the output length, so limit it to one frame
        let frame_len = self.frame_size * self.channels as usize;
        let samples = self
            .decoder
            .decode(&[], &mut self.decode_buffer[..frame_len], false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.channels as usize;
        self.frames_concealed += 1;

        Ok(PcmFrame::new(
            self.decode_buffer[..total_samples].to_vec(),
            self.channels,
        ))
    }

    /// Clear inter-frame state between talk spurts
    fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    fn close(&mut self) {
        tracing::debug!(
            "Closing Opus decoder after {} frames ({} concealed)",
            self.frames_decoded,
            self.frames_concealed
        );
    }
}

/// Decoder statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opus::{Application, Encoder};

    #[test]
    fn test_decoder_creation() {
        assert!(OpusDecoder::new(48000, 2, 960).is_ok());
        assert!(OpusDecoder::new(48000, 3, 960).is_err());
    }

    #[test]
    fn test_decodes_encoded_sine() {
        let mut encoder = Encoder::new(48000, Channels::Mono, Application::Voip).unwrap();
        let mut decoder = OpusDecoder::new(48000, 1, 960).unwrap();

        let samples: Vec<i16> = (0..960)
            .map(|i| {
                let t = i as f32 / 48000.0;
                ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16
            })
            .collect();
        let encoded = encoder.encode_vec(&samples, 4000).unwrap();

        let decoded = decoder.decode(&encoded).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 960);
    }

    #[test]
    fn test_plc_produces_one_frame() {
        let mut decoder = OpusDecoder::new(48000, 1, 960).unwrap();
        let concealed = decoder.decode_concealed().unwrap();
        assert_eq!(concealed.samples.len(), 960);
        assert_eq!(decoder.stats().frames_concealed, 1);
    }

    #[test]
    fn test_garbage_fails() {
        let mut decoder = OpusDecoder::new(48000, 1, 960).unwrap();
        // TOC byte for a code 3 packet with an invalid frame count
        assert!(decoder.decode(&[0xff, 0x00]).is_err());
        assert!(decoder.reset().is_ok());
    }
}
