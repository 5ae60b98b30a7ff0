//! Encoder parameter validation.

use crate::error::ConfigError;
use crate::pad::EncoderParams as WireParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Mono,
    MonoSbr,
    Stereo,
    StereoSbr,
    StereoSbrPs,
}

impl AudioMode {
    fn code(self) -> u8 {
        match self {
            AudioMode::Mono => 0,
            AudioMode::MonoSbr => 1,
            AudioMode::Stereo => 2,
            AudioMode::StereoSbr => 3,
            AudioMode::StereoSbrPs => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonoMode {
    LeftRightAverage,
    Left,
    Right,
}

impl MonoMode {
    fn code(self) -> u8 {
        match self {
            MonoMode::LeftRightAverage => 0,
            MonoMode::Left => 1,
            MonoMode::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz32000,
    Hz48000,
}

impl SampleRate {
    fn dac_flag(self) -> u8 {
        match self {
            SampleRate::Hz32000 => 0,
            SampleRate::Hz48000 => 1,
        }
    }
}

/// Raw, user-supplied encoder parameters, e.g. straight from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    pub bitrate_kbps: u32,
    pub channels: u32,
    pub sample_rate_hz: u32,
    pub sbr: bool,
    pub ps: bool,
    pub mono_mode: MonoMode,
}

/// Parameters that have passed validation and carry their derived
/// wire-level fields.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedParameters {
    pub subchannel_index: u8,
    pub frame_len_bytes: usize,
    pub audio_mode: AudioMode,
    pub sample_rate: SampleRate,
    pub mono_mode: MonoMode,
}

impl ValidatedParameters {
    pub fn to_wire(self) -> WireParams {
        WireParams {
            subchannel_index: self.subchannel_index,
            audio_mode: self.audio_mode.code(),
            dac_flag: self.sample_rate.dac_flag(),
            mono_mode: self.mono_mode.code(),
        }
    }

    pub fn superframe_len_bytes(&self) -> usize {
        self.frame_len_bytes * crate::assembler::FRAMES_PER_SUPERFRAME
    }
}

impl Parameters {
    pub fn validate(self) -> Result<ValidatedParameters, ConfigError> {
        if self.bitrate_kbps < 8 || self.bitrate_kbps > 192 || self.bitrate_kbps % 8 != 0 {
            return Err(ConfigError::BadBitrate(self.bitrate_kbps));
        }
        let sample_rate = match self.sample_rate_hz {
            32000 => SampleRate::Hz32000,
            48000 => SampleRate::Hz48000,
            other => return Err(ConfigError::BadSampleRate(other)),
        };
        if self.channels != 1 && self.channels != 2 {
            return Err(ConfigError::BadChannels(self.channels));
        }

        let audio_mode = match (self.channels, self.sbr, self.ps) {
            (1, false, _) => AudioMode::Mono,
            (1, true, _) => AudioMode::MonoSbr,
            (2, false, _) => AudioMode::Stereo,
            (2, true, false) => AudioMode::StereoSbr,
            (2, true, true) => AudioMode::StereoSbrPs,
            _ => unreachable!("channels already validated to 1 or 2"),
        };

        let subchannel_index = (self.bitrate_kbps / 8) as u8;
        Ok(ValidatedParameters {
            subchannel_index,
            frame_len_bytes: subchannel_index as usize * 24,
            audio_mode,
            sample_rate,
            mono_mode: self.mono_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Parameters {
        Parameters {
            bitrate_kbps: 64,
            channels: 2,
            sample_rate_hz: 48000,
            sbr: false,
            ps: false,
            mono_mode: MonoMode::LeftRightAverage,
        }
    }

    #[test]
    fn accepts_literal_scenario_bitrate() {
        let p = Parameters { bitrate_kbps: 64, ..base() };
        let v = p.validate().unwrap();
        assert_eq!(v.subchannel_index, 8);
        assert_eq!(v.frame_len_bytes, 192);
        assert_eq!(v.superframe_len_bytes(), 960);
    }

    #[test]
    fn rejects_out_of_range_bitrate() {
        assert!(matches!(Parameters { bitrate_kbps: 4, ..base() }.validate(), Err(ConfigError::BadBitrate(4))));
        assert!(matches!(Parameters { bitrate_kbps: 200, ..base() }.validate(), Err(ConfigError::BadBitrate(200))));
        assert!(matches!(Parameters { bitrate_kbps: 65, ..base() }.validate(), Err(ConfigError::BadBitrate(65))));
    }

    #[test]
    fn rejects_bad_sample_rate() {
        assert!(matches!(
            Parameters { sample_rate_hz: 44100, ..base() }.validate(),
            Err(ConfigError::BadSampleRate(44100))
        ));
    }

    #[test]
    fn rejects_bad_channel_count() {
        assert!(matches!(Parameters { channels: 3, ..base() }.validate(), Err(ConfigError::BadChannels(3))));
    }

    #[test]
    fn audio_mode_covers_all_combinations() {
        let mono = Parameters { channels: 1, sbr: false, ..base() }.validate().unwrap();
        assert_eq!(mono.audio_mode, AudioMode::Mono);
        let mono_sbr = Parameters { channels: 1, sbr: true, ..base() }.validate().unwrap();
        assert_eq!(mono_sbr.audio_mode, AudioMode::MonoSbr);
        let stereo = Parameters { channels: 2, sbr: false, ps: false, ..base() }.validate().unwrap();
        assert_eq!(stereo.audio_mode, AudioMode::Stereo);
        let stereo_sbr = Parameters { channels: 2, sbr: true, ps: false, ..base() }.validate().unwrap();
        assert_eq!(stereo_sbr.audio_mode, AudioMode::StereoSbr);
        let stereo_sbr_ps = Parameters { channels: 2, sbr: true, ps: true, ..base() }.validate().unwrap();
        assert_eq!(stereo_sbr_ps.audio_mode, AudioMode::StereoSbrPs);
    }
}
