//! Filling short gaps left by lost packets

use crate::audio::PcmFrame;
use crate::codec::AudioDecoder;
use crate::constants::MAX_COMPENSATED_FRAMES;
use crate::error::CodecError;

/// Decides how many synthetic frames cover a gap and builds them
#[derive(Debug, Clone, Copy)]
pub struct LossCompensator {
    max_frames: u64,
}

impl Default for LossCompensator {
    fn default() -> Self {
        Self {
            max_frames: MAX_COMPENSATED_FRAMES,
        }
    }
}

impl LossCompensator {
    /// Frames to synthesize between `previous` and `current`
    ///
    /// Gaps longer than the limit are left audible.
    pub fn frames_to_insert(&self, previous: Option<u64>, current: u64) -> u64 {
        let Some(previous) = previous else {
            return 0;
        };
        let gap = current.saturating_sub(previous.saturating_add(1));
        if gap > self.max_frames {
            0
        } else {
            gap
        }
    }

    /// One filler frame: decoder concealment for mono streams when
    /// available, silence otherwise
    pub fn synthesize(
        &self,
        decoder: Option<&mut dyn AudioDecoder>,
        stereo: bool,
        channels: u16,
    ) -> Result<PcmFrame, CodecError> {
        match decoder {
            Some(decoder) if !stereo && decoder.supports_concealment() => {
                decoder.decode_concealed()
            }
            _ => Ok(PcmFrame::silence(channels)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Concealing {
        concealed: usize,
    }

    impl AudioDecoder for Concealing {
        fn decode(&mut self, data: &[u8]) -> Result<PcmFrame, CodecError> {
            PcmFrame::from_le_bytes(data, 1)
        }

        fn supports_concealment(&self) -> bool {
            true
        }

        fn decode_concealed(&mut self) -> Result<PcmFrame, CodecError> {
            self.concealed += 1;
            Ok(PcmFrame::new(vec![7; 4], 1))
        }

        fn reset(&mut self) -> Result<(), CodecError> {
            Ok(())
        }
    }

    #[test]
    fn test_gap_sizes() {
        let compensator = LossCompensator::default();
        assert_eq!(compensator.frames_to_insert(None, 10), 0);
        assert_eq!(compensator.frames_to_insert(Some(3), 4), 0);
        assert_eq!(compensator.frames_to_insert(Some(3), 5), 1);
        assert_eq!(compensator.frames_to_insert(Some(3), 8), 4);
        assert_eq!(compensator.frames_to_insert(Some(3), 9), 0);
        assert_eq!(compensator.frames_to_insert(Some(9), 3), 0);
    }

    #[test]
    fn test_concealment_only_for_mono() {
        let compensator = LossCompensator::default();
        let mut decoder = Concealing { concealed: 0 };

        let frame = compensator
            .synthesize(Some(&mut decoder), false, 1)
            .unwrap();
        assert_eq!(frame.samples, vec![7; 4]);

        let frame = compensator.synthesize(Some(&mut decoder), true, 2).unwrap();
        assert!(frame.is_silence());
        assert_eq!(decoder.concealed, 1);

        assert!(compensator.synthesize(None, false, 1).unwrap().is_silence());
    }

    proptest! {
        #[test]
        fn prop_bounded_compensation(previous in 0u64..1_000_000, gap in 0u64..64) {
            let compensator = LossCompensator::default();
            let inserted = compensator.frames_to_insert(Some(previous), previous + 1 + gap);
            if gap <= MAX_COMPENSATED_FRAMES {
                prop_assert_eq!(inserted, gap);
            } else {
                prop_assert_eq!(inserted, 0);
            }
        }
    }
}
