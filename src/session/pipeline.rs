//! Decrypt, decode and downmix one payload

use std::borrow::Cow;

use crate::audio::PcmFrame;
use crate::codec::AudioDecoder;
use crate::crypto::Cipher;
use crate::error::SessionError;

/// Turns packet payloads into frames for the sinks
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodePipeline;

impl DecodePipeline {
    /// Without a cipher the payload is used as is; without a decoder it is
    /// read as little-endian PCM.
    pub fn run(
        &self,
        cipher: Option<&dyn Cipher>,
        decoder: Option<&mut dyn AudioDecoder>,
        payload: &[u8],
        stereo: bool,
        downmix: bool,
    ) -> Result<PcmFrame, SessionError> {
        let decrypted: Cow<'_, [u8]> = match cipher {
            Some(cipher) => Cow::Owned(cipher.decrypt(payload)?),
            None => Cow::Borrowed(payload),
        };

        let decoded = match decoder {
            Some(decoder) => decoder.decode(&decrypted)?,
            None => PcmFrame::from_le_bytes(&decrypted, if stereo { 2 } else { 1 })?,
        };

        if stereo && downmix {
            Ok(decoded.to_mono())
        } else {
            Ok(decoded)
        }
    }
}
