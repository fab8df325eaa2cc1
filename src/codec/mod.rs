//! Decoder contracts and the built-in Opus decoder
//!
//! Sessions only talk to [`AudioDecoder`]; new codecs plug in through a
//! [`DecoderFactory`].

#[cfg(feature = "opus-codec")]
pub mod decoder;

#[cfg(feature = "opus-codec")]
pub use decoder::OpusDecoder;

use crate::audio::PcmFrame;
use crate::config::SharedConfig;
use crate::error::CodecError;
use crate::protocol::CodecInfo;

/// Decodes packet payloads of one source
pub trait AudioDecoder: Send {
    fn decode(&mut self, data: &[u8]) -> Result<PcmFrame, CodecError>;

    /// Whether [`AudioDecoder::decode_concealed`] is available
    fn supports_concealment(&self) -> bool {
        false
    }

    /// Synthesize a replacement for a lost frame
    fn decode_concealed(&mut self) -> Result<PcmFrame, CodecError> {
        Err(CodecError::ConcealmentUnsupported)
    }

    /// Drop inter-frame state, e.g. between talk spurts
    fn reset(&mut self) -> Result<(), CodecError>;

    /// Release the decoder; it is not used afterwards
    fn close(&mut self) {}
}

/// Creates decoders for announced codecs
pub trait DecoderFactory: Send + Sync {
    fn create(&self, codec: &CodecInfo, stereo: bool)
        -> Result<Box<dyn AudioDecoder>, CodecError>;
}

/// Factory for the codecs compiled into this crate
pub struct BuiltinDecoders {
    config: SharedConfig,
}

impl BuiltinDecoders {
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}

impl DecoderFactory for BuiltinDecoders {
    fn create(
        &self,
        codec: &CodecInfo,
        stereo: bool,
    ) -> Result<Box<dyn AudioDecoder>, CodecError> {
        let channels = if stereo { 2 } else { 1 };
        let settings = self.config.codec();

        match codec.name.as_str() {
            #[cfg(feature = "opus-codec")]
            "opus" => Ok(Box::new(OpusDecoder::new(
                settings.sample_rate,
                channels,
                settings.frame_size,
            )?)),
            other => {
                tracing::debug!(
                    "No decoder for {} ({} Hz, {} ch)",
                    other,
                    settings.sample_rate,
                    channels
                );
                Err(CodecError::UnsupportedCodec(other.to_string()))
            }
        }
    }
}
