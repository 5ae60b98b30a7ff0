//! Groups five consecutive 24 ms frames into one 120 ms DAB+ superframe.
//!
//! State machine ported from the alignment loop inside
//! `AVTInput::getNextFrame` in the original source: waits for an
//! index congruent to 0 mod 5 to anchor a superframe, then requires
//! each subsequent frame's index to advance mod 5 in lockstep,
//! logging (not failing on) an out-of-cadence `expected_index`.

use std::time::{Duration, SystemTime};

use log::warn;

use crate::queue::{OrderedQueue, FRAME_INDEX_MODULUS};

pub const FRAME_PERIOD: Duration = Duration::from_millis(24);
pub const FRAMES_PER_SUPERFRAME: usize = 5;

#[derive(Debug, Clone)]
pub struct Superframe {
    pub bytes: Vec<u8>,
    pub captured_at: SystemTime,
}

pub struct Assembler {
    frame_len: usize,
    aligned: bool,
    nb_frames: usize,
    expected_index: u32,
    buffer: Vec<u8>,
    zero_timestamp: SystemTime,
    /// Deterministic 120ms tick carried across a resync-free run of
    /// superframes. `None` forces the next anchor to take the real
    /// capture timestamp of its first frame instead of ticking forward.
    clock: Option<SystemTime>,
}

impl Assembler {
    pub fn new(frame_len: usize) -> Self {
        Assembler {
            frame_len,
            aligned: false,
            nb_frames: 0,
            expected_index: 0,
            buffer: Vec::with_capacity(frame_len * FRAMES_PER_SUPERFRAME),
            zero_timestamp: SystemTime::UNIX_EPOCH,
            clock: None,
        }
    }

    pub fn reset(&mut self) {
        self.aligned = false;
        self.nb_frames = 0;
        self.buffer.clear();
        self.clock = None;
    }

    /// Drains as many frames as available from `queue`, returning a
    /// completed superframe as soon as one is ready. Returns `None`
    /// without blocking when the queue runs dry first.
    pub fn poll(&mut self, queue: &mut OrderedQueue) -> Option<Superframe> {
        while self.nb_frames < FRAMES_PER_SUPERFRAME {
            let (index, entry) = queue.pop()?;

            if entry.bytes.len() != self.frame_len {
                warn!(
                    "discarding frame {index}: length {} does not match configured frame length {}",
                    entry.bytes.len(),
                    self.frame_len
                );
                continue;
            }

            if !self.aligned {
                if index % 5 == 0 {
                    self.aligned = true;
                    self.buffer.clear();
                    self.zero_timestamp = self.clock.unwrap_or(entry.captured_at);
                    self.expected_index = (index + 1) % FRAME_INDEX_MODULUS;
                    self.buffer.extend_from_slice(&entry.bytes);
                    self.nb_frames = 1;
                } // else: cannot start a superframe here, discard silently.
                continue;
            }

            if index % 5 == self.nb_frames as u32 {
                if index != self.expected_index {
                    warn!("sequence error: expected frame {}, got {index}", self.expected_index);
                }
                self.buffer.extend_from_slice(&entry.bytes);
                self.nb_frames += 1;
                self.expected_index = (index + 1) % FRAME_INDEX_MODULUS;
            } else {
                warn!("superframe alignment lost at frame {index}, discarding partial superframe");
                self.aligned = false;
                self.nb_frames = 0;
                self.buffer.clear();
                self.clock = None;
                // This frame itself might be a fresh index%5==0 anchor; loop
                // re-evaluates it only on the *next* pop, matching the
                // original's behaviour of discarding the frame that broke
                // alignment rather than re-examining it immediately.
            }
        }

        let superframe = Superframe {
            bytes: std::mem::take(&mut self.buffer),
            captured_at: self.zero_timestamp,
        };
        self.clock = Some(self.zero_timestamp + FRAME_PERIOD * FRAMES_PER_SUPERFRAME as u32);
        self.nb_frames = 0;
        self.aligned = false;
        Some(superframe)
    }
}
