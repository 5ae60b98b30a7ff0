//! Peak audio level metering, an opaque external AAC decoder consumer.
//!
//! Grounded on `AACDecoder::decode_frame`/`get_peaks` in the original
//! source: the level meter decodes a Reed-Solomon-stripped copy of the
//! superframe purely to measure left/right peaks, and is not otherwise
//! part of the reception pipeline.

pub trait LevelMeter {
    fn measure(&mut self, reed_solomon_stripped: &[u8]) -> (i16, i16);
}

/// Default meter used whenever peak metering is not requested or the
/// `level-meter` feature (and its `fdk-aac` system library) isn't built in.
pub struct NullLevelMeter;

impl LevelMeter for NullLevelMeter {
    fn measure(&mut self, _reed_solomon_stripped: &[u8]) -> (i16, i16) {
        (0, 0)
    }
}

/// Strips the original's `numOutBytes / 120 * 110` Reed-Solomon parity
/// fraction from a raw superframe before handing it to a decoder,
/// ported from the per-superframe slicing in `odr-sourcecompanion.cpp`.
pub fn strip_reed_solomon_parity(superframe: &[u8]) -> &[u8] {
    let usable = superframe.len() / 120 * 110;
    &superframe[..usable.min(superframe.len())]
}

#[cfg(feature = "level-meter")]
mod fdk {
    use super::LevelMeter;
    use fdk_aac::dec::{Decoder, DecoderError, Transport};
    use log::warn;

    pub struct FdkAacLevelMeter {
        decoder: Decoder,
        pcm_buf: Vec<i16>,
    }

    impl FdkAacLevelMeter {
        pub fn new() -> Self {
            FdkAacLevelMeter {
                decoder: Decoder::new(Transport::Raw),
                pcm_buf: vec![0i16; 2 * 2048],
            }
        }

        fn peaks_from_pcm(pcm: &[i16], channels: usize) -> (i16, i16) {
            if channels < 2 {
                let peak = pcm.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0) as i16;
                return (peak, peak);
            }
            let mut left = 0i16;
            let mut right = 0i16;
            for frame in pcm.chunks_exact(2) {
                left = left.max(frame[0].unsigned_abs() as i16);
                right = right.max(frame[1].unsigned_abs() as i16);
            }
            (left, right)
        }
    }

    impl LevelMeter for FdkAacLevelMeter {
        fn measure(&mut self, reed_solomon_stripped: &[u8]) -> (i16, i16) {
            match self.decoder.fill(reed_solomon_stripped) {
                Ok(_) => match self.decoder.decode_frame(&mut self.pcm_buf) {
                    Ok(()) => {
                        let info = self.decoder.stream_info();
                        Self::peaks_from_pcm(&self.pcm_buf, info.num_channels as usize)
                    }
                    Err(DecoderError::NOT_ENOUGH_BITS) => (0, 0),
                    Err(e) => {
                        warn!("AAC decode failed while measuring peaks: {e:?}");
                        (0, 0)
                    }
                },
                Err(e) => {
                    warn!("AAC decoder fill failed: {e:?}");
                    (0, 0)
                }
            }
        }
    }
}

#[cfg(feature = "level-meter")]
pub use fdk::FdkAacLevelMeter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_meter_always_reports_silence() {
        let mut meter = NullLevelMeter;
        assert_eq!(meter.measure(&[1, 2, 3]), (0, 0));
    }

    #[test]
    fn strips_correct_parity_fraction() {
        let superframe = vec![0u8; 960];
        let stripped = strip_reed_solomon_parity(&superframe);
        assert_eq!(stripped.len(), 880); // 960/120*110
    }
}
