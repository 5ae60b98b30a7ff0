//! The reactor loop: single-threaded, cooperative, owns every piece of
//! mutable state in the process.
//!
//! Grounded on the `do { ... } while (read_bytes > 0)` main loop in
//! `odr-sourcecompanion.cpp::main`: drain the PAD/control back-channel,
//! top up the PAD FIFO, poll the assembler, sleep 1ms while waiting,
//! and bail out on a per-superframe timeout or 10 consecutive sink
//! send failures.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::assembler::Assembler;
use crate::config::ValidatedParameters;
use crate::error::{CompanionError, PadError, UdpError};
use crate::info::TransportInfo;
use crate::level::LevelMeter;
use crate::output::Sink;
use crate::pad::{self, ControlMessage, PadFifo, PadSource};
use crate::queue::OrderedQueue;
use crate::sti::{self, TransportKind};
use crate::stats::{StatsPublisher, SuperframeStats};
use crate::udp::UdpEndpoint;

const MAX_CONSECUTIVE_SEND_FAILURES: u32 = 10;
const POLL_SLEEP: Duration = Duration::from_millis(1);

pub struct ControlChannel {
    pub socket: UdpEndpoint,
    pub control_peer: Option<SocketAddr>,
}

pub struct Companion {
    audio: UdpEndpoint,
    control: Option<ControlChannel>,
    params: ValidatedParameters,
    queue: OrderedQueue,
    assembler: Assembler,
    pad_fifo: PadFifo,
    pad_source: Option<Box<dyn PadSource>>,
    pad_request_len: usize,
    sinks: Vec<Box<dyn Sink>>,
    level_meter: Box<dyn LevelMeter>,
    stats: Option<StatsPublisher>,
    transport_info: TransportInfo,
    timeout: Duration,
    send_failures: u32,
    last_rtp_sequence: Option<u16>,
    frames_emitted: u64,
}

impl Companion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        audio: UdpEndpoint,
        control: Option<ControlChannel>,
        params: ValidatedParameters,
        jitter_size: usize,
        pad_source: Option<Box<dyn PadSource>>,
        pad_request_len: usize,
        sinks: Vec<Box<dyn Sink>>,
        level_meter: Box<dyn LevelMeter>,
        stats: Option<StatsPublisher>,
        timeout_ms: u64,
    ) -> Self {
        Companion {
            audio,
            control,
            params,
            queue: OrderedQueue::new(jitter_size),
            assembler: Assembler::new(params.frame_len_bytes),
            pad_fifo: PadFifo::new(),
            pad_source,
            pad_request_len,
            sinks,
            level_meter,
            stats,
            transport_info: TransportInfo::new(),
            timeout: Duration::from_millis(timeout_ms),
            send_failures: 0,
            last_rtp_sequence: None,
            frames_emitted: 0,
        }
    }

    /// Sends the `0xFD 0x07` set-parameters control message exactly
    /// once, after validation has already run.
    pub fn send_encoder_configuration(&mut self) -> Result<(), CompanionError> {
        let Some(ControlChannel { socket, control_peer }) = &self.control else {
            return Ok(());
        };
        let Some(peer) = control_peer else {
            return Ok(());
        };
        let msg = pad::encode_set_parameters(self.params.to_wire());
        socket.send_to(&msg, *peer).map_err(CompanionError::Udp)?;
        Ok(())
    }

    /// Drains the control/PAD-request socket, replying to every pending
    /// `0xFD 0x17` with the next queued PAD frame. Control has priority
    /// over audio to minimise PAD latency.
    fn drain_control(&mut self) -> Result<(), CompanionError> {
        let Some(ControlChannel { socket, .. }) = &mut self.control else {
            return Ok(());
        };
        loop {
            match socket.recv().map_err(CompanionError::Udp)? {
                None => return Ok(()),
                Some((bytes, from)) => {
                    if pad::decode_control(&bytes) == ControlMessage::RequestPad {
                        if let Some(reversed) = self.pad_fifo.pop() {
                            let reply = pad::encode_pad_reply(&reversed);
                            if socket.send_to(&reply, from).is_err() {
                                warn!("failed to send PAD reply to {from}");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Drains one burst of audio datagrams, pushing each successfully
    /// parsed frame into the ordered queue.
    fn drain_audio(&mut self) -> Result<(), UdpError> {
        loop {
            match self.audio.recv()? {
                None => return Ok(()),
                Some((bytes, _from)) => self.ingest_datagram(&bytes),
            }
        }
    }

    fn ingest_datagram(&mut self, bytes: &[u8]) {
        let captured_at = std::time::SystemTime::now();
        match sti::parse(bytes) {
            Ok(parsed) => {
                if let TransportKind::StiOverRtp { sequence } = parsed.transport {
                    if let Some(prev) = self.last_rtp_sequence {
                        let expected = prev.wrapping_add(1);
                        if expected != sequence {
                            warn!("RTP sequence gap: expected {expected}, got {sequence}");
                        }
                    }
                    self.last_rtp_sequence = Some(sequence);
                }

                self.transport_info.report_extracted(parsed.transport, parsed.payload_len);

                if parsed.payload_len != self.params.frame_len_bytes {
                    error!(
                        "discarding frame {}: payload length {} does not match configured frame length {}",
                        parsed.frame_index, parsed.payload_len, self.params.frame_len_bytes
                    );
                    return;
                }

                let payload = bytes[parsed.payload_start..parsed.payload_start + parsed.payload_len].to_vec();
                self.queue.push(parsed.frame_index, payload, captured_at);
            }
            Err(e) => {
                debug!("parse failure: {e}");
                self.transport_info.report_cannot_extract();
            }
        }
    }

    /// Tops up the PAD FIFO from the configured PAD source, bounded by
    /// `pad_queue_full()`.
    fn top_up_pad_fifo(&mut self) {
        if self.pad_request_len == 0 {
            return;
        }
        let Some(source) = self.pad_source.as_deref_mut() else {
            return;
        };
        while !self.pad_fifo.is_full() {
            match source.request(self.pad_request_len) {
                Ok(Some(bytes)) => self.pad_fifo.push(&bytes),
                Ok(None) => break,
                Err(e) => {
                    warn!("PAD source io error: {}", PadError::Io(e));
                    break;
                }
            }
        }
    }

    /// Runs until timeout or sustained sink failure. Returns normally on
    /// either; cancellation is cooperative, never a panic.
    pub fn run(&mut self) -> Result<(), CompanionError> {
        loop {
            let iteration_start = Instant::now();
            let mut superframe_emitted = false;

            while !superframe_emitted {
                self.drain_control()?;
                self.drain_audio().map_err(CompanionError::Udp)?;
                self.top_up_pad_fifo();

                if let Some(superframe) = self.assembler.poll(&mut self.queue) {
                    self.emit(superframe)?;
                    superframe_emitted = true;
                } else if iteration_start.elapsed() > self.timeout {
                    info!("timeout reached");
                    return Ok(());
                } else {
                    thread::sleep(POLL_SLEEP);
                }
            }
        }
    }

    fn emit(&mut self, superframe: crate::assembler::Superframe) -> Result<(), CompanionError> {
        let stripped = crate::level::strip_reed_solomon_parity(&superframe.bytes);
        let (peak_left, peak_right) = self.level_meter.measure(stripped);

        let mut any_failure = false;
        for sink in &mut self.sinks {
            sink.update_audio_levels(peak_left, peak_right);
            if !sink.write_frame(&superframe.bytes, superframe.captured_at) {
                any_failure = true;
            }
        }

        if any_failure {
            self.send_failures += 1;
            if self.send_failures >= MAX_CONSECUTIVE_SEND_FAILURES {
                return Err(CompanionError::TooManySendFailures(self.send_failures));
            }
        } else {
            self.send_failures = 0;
        }

        self.frames_emitted += 1;
        if let Some(stats) = &self.stats {
            stats.publish(&SuperframeStats {
                frames: self.frames_emitted,
                queue: self.queue.stats(),
                peak_left,
                peak_right,
                pad_queue_len: self.pad_fifo.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioMode, MonoMode, SampleRate};
    use crate::output::Sink;
    use std::time::SystemTime;

    fn test_params() -> ValidatedParameters {
        ValidatedParameters {
            subchannel_index: 1,
            frame_len_bytes: 24,
            audio_mode: AudioMode::Stereo,
            sample_rate: SampleRate::Hz48000,
            mono_mode: MonoMode::LeftRightAverage,
        }
    }

    struct CountingSink {
        frames: Vec<Vec<u8>>,
        fail_next: bool,
    }

    impl Sink for CountingSink {
        fn update_audio_levels(&mut self, _left: i16, _right: i16) {}
        fn write_frame(&mut self, frame: &[u8], _captured_at: SystemTime) -> bool {
            if self.fail_next {
                return false;
            }
            self.frames.push(frame.to_vec());
            true
        }
    }

    #[test]
    fn ingest_discards_wrong_length_frame() {
        let audio = UdpEndpoint::bind(&crate::udp::UdpUri::parse("udp://0").unwrap()).unwrap();
        let mut companion = Companion::new(
            audio,
            None,
            test_params(),
            40,
            None,
            0,
            Vec::new(),
            Box::new(crate::level::NullLevelMeter),
            None,
            2000,
        );
        // A datagram that happens to have valid STI framing but wrong payload length.
        let mut dgram = vec![0u8; 13];
        dgram[1..4].copy_from_slice(&[0x1F, 0x90, 0xCA]);
        dgram.push(0); // DFCTL
        let field16: u16 = (0u16 << 11) | 1; // DFCTH=0, NST=1
        dgram.extend_from_slice(&field16.to_be_bytes());
        let stl: u16 = 8; // payload smaller than frame_len_bytes=24
        dgram.extend_from_slice(&(stl & 0x1FFF).to_be_bytes());
        dgram.push(0);
        dgram.push(0);
        dgram.extend_from_slice(&[0u8; 4]); // one sub-channel descriptor (NST=1)
        dgram.extend_from_slice(&[0u8; 8]); // payload, 8 bytes as declared by STL

        companion.ingest_datagram(&dgram);
        assert!(companion.queue.is_empty());
    }

    #[test]
    fn emit_counts_consecutive_send_failures() {
        let audio = UdpEndpoint::bind(&crate::udp::UdpUri::parse("udp://0").unwrap()).unwrap();
        let sink = Box::new(CountingSink { frames: Vec::new(), fail_next: true });
        let mut companion = Companion::new(
            audio,
            None,
            test_params(),
            40,
            None,
            0,
            vec![sink],
            Box::new(crate::level::NullLevelMeter),
            None,
            2000,
        );
        let superframe = crate::assembler::Superframe { bytes: vec![0u8; 120], captured_at: SystemTime::now() };
        for _ in 0..MAX_CONSECUTIVE_SEND_FAILURES - 1 {
            companion.emit(superframe.clone()).unwrap();
        }
        assert!(companion.emit(superframe).is_err());
    }
}
