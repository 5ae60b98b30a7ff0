//! PAD FIFO and control/PAD back-channel wire codec.
//!
//! Opcode table and byte-reversal invariant ported from
//! `AVTInput::pushPADFrame`/`_sendPADFrame`/`_sendCtrlMessage` in the
//! original source.

use std::collections::VecDeque;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::Path;

use log::warn;

use crate::error::PadError;

pub const PAD_FIFO_CAPACITY: usize = 6;

const OPCODE_PREFIX: u8 = 0xFD;
const OP_SET_PARAMETERS: u8 = 0x07;
const OP_REQUEST_PAD: u8 = 0x17;
const OP_PROVIDE_PAD: u8 = 0x18;
const PAD_MARKER: u8 = 0xAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderParams {
    pub subchannel_index: u8,
    pub audio_mode: u8,
    pub dac_flag: u8,
    pub mono_mode: u8,
}

/// Builds the `0xFD 0x07` set-parameters control message.
pub fn encode_set_parameters(p: EncoderParams) -> Vec<u8> {
    vec![OPCODE_PREFIX, OP_SET_PARAMETERS, p.subchannel_index, p.audio_mode, p.dac_flag, p.mono_mode]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    RequestPad,
    Unknown,
}

/// Dispatches an inbound control/back-channel datagram.
pub fn decode_control(buf: &[u8]) -> ControlMessage {
    if buf.len() >= 2 && buf[0] == OPCODE_PREFIX && buf[1] == OP_REQUEST_PAD {
        ControlMessage::RequestPad
    } else {
        ControlMessage::Unknown
    }
}

/// A bounded FIFO of PAD frames awaiting delivery to the encoder.
///
/// Frames are stored pre-reversed: `push` reverses the caller-supplied
/// bytes once, so `pop`+wire-encode never needs to reverse again.
pub struct PadFifo {
    queue: VecDeque<Vec<u8>>,
}

impl PadFifo {
    pub fn new() -> Self {
        PadFifo { queue: VecDeque::with_capacity(PAD_FIFO_CAPACITY) }
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= PAD_FIFO_CAPACITY
    }

    /// Drops the frame silently if the FIFO is full, per the back-pressure
    /// policy: PAD delivery is best-effort.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.is_full() {
            return;
        }
        let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
        self.queue.push_back(reversed);
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for PadFifo {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the `0xFD 0x18` PAD-provision reply from an already-reversed
/// FIFO entry.
pub fn encode_pad_reply(reversed_frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + reversed_frame.len());
    out.push(OPCODE_PREFIX);
    out.push(OP_PROVIDE_PAD);
    out.push((reversed_frame.len() + 2) as u8);
    out.push(PAD_MARKER);
    out.push(reversed_frame.len() as u8);
    out.extend_from_slice(reversed_frame);
    out
}

/// A byte source the reactor polls once per iteration to top up the PAD
/// FIFO, grounded on `PadInterface::request` in the original source: a
/// sibling process (conventionally ODR-PadEnc) that answers a one-byte
/// length request with up to `padlen` data bytes followed by a trailing
/// length byte giving the *actual* PAD size, so short PAD frames survive
/// the fixed-size transfer.
pub trait PadSource {
    /// Requests one PAD frame of at most `padlen` bytes. Returns `Ok(None)`
    /// when the source has nothing to offer right now (not an error).
    fn request(&mut self, padlen: usize) -> io::Result<Option<Vec<u8>>>;
}

/// `PadSource` backed by a connected `UnixDatagram`, matching the
/// `--pad-socket` identifier used to reach ODR-PadEnc.
pub struct UnixSocketPadSource {
    socket: UnixDatagram,
}

impl UnixSocketPadSource {
    pub fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        socket.set_nonblocking(true)?;
        Ok(UnixSocketPadSource { socket })
    }
}

impl PadSource for UnixSocketPadSource {
    fn request(&mut self, padlen: usize) -> io::Result<Option<Vec<u8>>> {
        self.socket.send(&[padlen as u8])?;

        let mut buf = vec![0u8; padlen + 1];
        match self.socket.recv(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                if n != padlen + 1 {
                    warn!("incorrect PAD length received: {n} expected {}", padlen + 1);
                    return Ok(None);
                }
                let reported_len = buf[padlen] as usize;
                if reported_len > padlen {
                    let err = PadError::LengthMismatch { sent: padlen, reported: reported_len };
                    warn!("{err}");
                    return Ok(None);
                }
                Ok(Some(buf[padlen - reported_len..padlen].to_vec()))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_parameters_message_layout() {
        let p = EncoderParams { subchannel_index: 8, audio_mode: 2, dac_flag: 1, mono_mode: 0 };
        assert_eq!(encode_set_parameters(p), vec![0xFD, 0x07, 8, 2, 1, 0]);
    }

    #[test]
    fn decodes_pad_request_opcode() {
        assert_eq!(decode_control(&[0xFD, 0x17]), ControlMessage::RequestPad);
        assert_eq!(decode_control(&[0xFD, 0x07, 8]), ControlMessage::Unknown);
        assert_eq!(decode_control(&[0x00]), ControlMessage::Unknown);
    }

    #[test]
    fn pad_round_trip_matches_literal_scenario() {
        let mut fifo = PadFifo::new();
        fifo.push(&[0x11, 0x22, 0x33]);
        let reversed = fifo.pop().unwrap();
        assert_eq!(reversed, vec![0x33, 0x22, 0x11]);
        let wire = encode_pad_reply(&reversed);
        assert_eq!(wire, vec![0xFD, 0x18, 0x05, 0xAD, 0x03, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn double_reversal_restores_original_order() {
        let original = vec![9u8, 8, 7, 6];
        let once: Vec<u8> = original.iter().rev().copied().collect();
        let twice: Vec<u8> = once.iter().rev().copied().collect();
        assert_eq!(twice, original);
    }

    #[test]
    fn fifo_drops_silently_once_full() {
        let mut fifo = PadFifo::new();
        for i in 0..PAD_FIFO_CAPACITY {
            fifo.push(&[i as u8]);
        }
        assert!(fifo.is_full());
        fifo.push(&[0xFF]);
        assert_eq!(fifo.len(), PAD_FIFO_CAPACITY);
    }

    #[test]
    fn unix_socket_pad_source_round_trips_short_pad_frame() {
        let dir = std::env::temp_dir();
        let source_path = dir.join(format!("pad-source-test-{}.sock", std::process::id()));
        let client_path = dir.join(format!("pad-client-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&source_path);
        let _ = std::fs::remove_file(&client_path);

        let responder = UnixDatagram::bind(&source_path).unwrap();
        // Bind the client end too, so the responder has an address to
        // reply to (a connect()-only unbound socket is unnamed).
        let client_socket = UnixDatagram::bind(&client_path).unwrap();
        client_socket.connect(&source_path).unwrap();
        client_socket.set_nonblocking(true).unwrap();
        let mut source = UnixSocketPadSource { socket: client_socket };

        // Simulate ODR-PadEnc on its own thread: wait for the length
        // request, then reply with a short 3-byte PAD frame right-aligned
        // in a 6-byte transfer. Runs concurrently since `request` only
        // ever does a non-blocking recv and would never see a reply that
        // hadn't been sent yet.
        let responder_thread = std::thread::spawn(move || {
            let mut req = [0u8; 1];
            let (_, from) = responder.recv_from(&mut req).unwrap();
            assert_eq!(req[0], 6);

            let mut reply = vec![0u8; 7];
            reply[3..6].copy_from_slice(&[0x11, 0x22, 0x33]);
            reply[6] = 3; // actual length
            responder.send_to(&reply, from).unwrap();
        });

        let mut frame = None;
        for _ in 0..50 {
            if let Some(f) = source.request(6).unwrap() {
                frame = Some(f);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        responder_thread.join().unwrap();
        assert_eq!(frame.expect("pad frame expected"), vec![0x11, 0x22, 0x33]);

        let _ = std::fs::remove_file(&source_path);
        let _ = std::fs::remove_file(&client_path);
    }
}
