//! ZeroMQ PUB sink with a fixed binary header and optional CURVE
//! encryption, grounded on `Output::ZMQ::connect`/`write_frame` in the
//! original source.

use std::fs;

use log::warn;

use crate::error::ZmqSinkError;
use crate::output::Sink;

/// AAC+ codepoint carried in the header's `encoder` field. The original
/// emits a single fixed value for this companion's codec.
const ENCODER_AAC_PLUS: u16 = 0x02;

pub struct ZmqSink {
    socket: zmq::Socket,
    audiolevel_left: i16,
    audiolevel_right: i16,
}

impl ZmqSink {
    pub fn connect(uri: &str, secret_key_path: Option<&str>) -> Result<Self, ZmqSinkError> {
        let ctx = zmq::Context::new();
        let socket = ctx.socket(zmq::PUB)?;
        socket.set_linger(0)?;

        if let Some(path) = secret_key_path {
            let z85 = fs::read_to_string(path)?;
            let key = zmq::z85_decode(z85.trim())
                .map_err(|e| ZmqSinkError::BadKey(path.to_string(), e.to_string()))?;
            socket.set_curve_server(true)?;
            socket.set_curve_secretkey(&key)?;
        }

        socket.bind(uri)?;
        Ok(ZmqSink { socket, audiolevel_left: 0, audiolevel_right: 0 })
    }

    fn build_message(&self, frame: &[u8]) -> Vec<u8> {
        encode_header(frame, self.audiolevel_left, self.audiolevel_right)
    }
}

/// Fixed little-endian header (version/encoder/datasize/audiolevel_left/
/// audiolevel_right) followed by the raw frame bytes.
fn encode_header(frame: &[u8], audiolevel_left: i16, audiolevel_right: i16) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + frame.len());
    out.extend_from_slice(&1u16.to_le_bytes()); // version
    out.extend_from_slice(&ENCODER_AAC_PLUS.to_le_bytes());
    out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
    out.extend_from_slice(&audiolevel_left.to_le_bytes());
    out.extend_from_slice(&audiolevel_right.to_le_bytes());
    out.extend_from_slice(frame);
    out
}

impl Sink for ZmqSink {
    fn update_audio_levels(&mut self, left: i16, right: i16) {
        self.audiolevel_left = left;
        self.audiolevel_right = right;
    }

    fn write_frame(&mut self, frame: &[u8], _captured_at: std::time::SystemTime) -> bool {
        let msg = self.build_message(frame);
        match self.socket.send(&msg, zmq::DONTWAIT) {
            Ok(()) => true,
            Err(e) => {
                warn!("zmq send failed: {e}");
                false
            }
        }
    }
}
