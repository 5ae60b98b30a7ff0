//! Rate-limited transport-kind reporting.
//!
//! Ported from `AVTInput::_info` in the original source: logs once when
//! the observed transport kind changes, and periodically afterwards so
//! a healthy link doesn't spam the log. The geometric progression
//! (100, 1k, 10k, 100k frames) is this crate's own cadence; the
//! original only re-announces at frame 100 and every 100,000 frames
//! after that.

use log::{error, info};

use crate::sti::TransportKind;

const MILESTONES: [u64; 4] = [100, 1_000, 10_000, 100_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastObserved {
    Sti,
    StiRtp,
    CannotExtract,
}

impl From<TransportKind> for LastObserved {
    fn from(t: TransportKind) -> Self {
        match t {
            TransportKind::StiRaw => LastObserved::Sti,
            TransportKind::StiOverRtp { .. } => LastObserved::StiRtp,
        }
    }
}

pub struct TransportInfo {
    last: Option<(LastObserved, usize)>,
    frame_count: u64,
}

impl TransportInfo {
    pub fn new() -> Self {
        TransportInfo { last: None, frame_count: 0 }
    }

    /// Reports a successfully extracted frame of the given transport kind.
    pub fn report_extracted(&mut self, transport: TransportKind, payload_len: usize) {
        let observed = (LastObserved::from(transport), payload_len);
        if self.last != Some(observed) {
            match transport {
                TransportKind::StiRaw => info!("extracting from UDP/STI frames of size {payload_len}"),
                TransportKind::StiOverRtp { .. } => {
                    info!("extracting from UDP/RTP/STI frames of size {payload_len}")
                }
            }
            self.last = Some(observed);
        }

        self.frame_count += 1;
        if self.is_milestone(self.frame_count) {
            info!("startup ok, {} 24ms-frames received", self.frame_count);
        }
    }

    /// Reports a datagram that could not be parsed at all.
    pub fn report_cannot_extract(&mut self) {
        if self.last.map(|(k, _)| k) != Some(LastObserved::CannotExtract) {
            error!("can't extract data from encoder frame");
            self.last = Some((LastObserved::CannotExtract, 0));
        }
    }

    fn is_milestone(&self, count: u64) -> bool {
        MILESTONES.contains(&count) || (count > *MILESTONES.last().unwrap() && count % MILESTONES[3] == 0)
    }
}

impl Default for TransportInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestones_match_geometric_progression() {
        let info = TransportInfo::new();
        assert!(info.is_milestone(100));
        assert!(info.is_milestone(1_000));
        assert!(info.is_milestone(10_000));
        assert!(info.is_milestone(100_000));
        assert!(info.is_milestone(200_000));
        assert!(!info.is_milestone(99));
        assert!(!info.is_milestone(150_000));
    }

    #[test]
    fn cannot_extract_only_logs_once_until_recovery() {
        let mut info = TransportInfo::new();
        info.report_cannot_extract();
        assert_eq!(info.last.map(|(k, _)| k), Some(LastObserved::CannotExtract));
        // A second call with the same state shouldn't panic or change state.
        info.report_cannot_extract();
        assert_eq!(info.last.map(|(k, _)| k), Some(LastObserved::CannotExtract));
    }

    #[test]
    fn transport_change_resets_milestone_announcement_state() {
        let mut info = TransportInfo::new();
        info.report_extracted(TransportKind::StiRaw, 192);
        assert_eq!(info.last, Some((LastObserved::Sti, 192)));
        info.report_extracted(TransportKind::StiOverRtp { sequence: 1 }, 192);
        assert_eq!(info.last, Some((LastObserved::StiRtp, 192)));
    }

    #[test]
    fn repeated_rtp_datagrams_with_different_sequence_numbers_dont_spam() {
        let mut info = TransportInfo::new();
        info.report_extracted(TransportKind::StiOverRtp { sequence: 1 }, 192);
        let after_first = info.last;
        info.report_extracted(TransportKind::StiOverRtp { sequence: 2 }, 192);
        assert_eq!(info.last, after_first);
    }
}
