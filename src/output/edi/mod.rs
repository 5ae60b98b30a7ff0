//! EDI (Encoded Data Interface) sink: TAG-Packet assembly with optional
//! PFT fragmentation, grounded on `Output::EDI::write_frame`/`set_tist`
//! in the original source. The fragment/CRC/addressing layer is fully
//! implemented; the FEC parity bytes are a structural placeholder (see
//! `pft::ReedSolomonFec`) rather than a bit-exact GF(256) implementation.

mod pft;
mod tags;

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::warn;

use crate::assembler::FRAME_PERIOD;
use crate::error::EdiError;
use crate::output::Sink;

const VERSION_TAG_INTERVAL: Duration = Duration::from_secs(10);

pub enum Destination {
    Udp { socket: UdpSocket, peer: SocketAddr, pft_mtu: usize },
    Tcp { stream: std::net::TcpStream },
}

pub struct EdiSink {
    destinations: Vec<Destination>,
    identifier: String,
    tist_enabled: bool,
    tist_delay_ms: i64,
    audiolevel_left: i16,
    audiolevel_right: i16,
    last_version_tag: Option<Instant>,
    fec: bool,
}

impl EdiSink {
    pub fn new(identifier: String, tist_enabled: bool, tist_delay_ms: i64, fec: bool) -> Self {
        EdiSink {
            destinations: Vec::new(),
            identifier,
            tist_enabled,
            tist_delay_ms,
            audiolevel_left: 0,
            audiolevel_right: 0,
            last_version_tag: None,
            fec,
        }
    }

    /// UDP cannot carry a raw AF packet larger than the network MTU, so
    /// PFT fragmentation is always enabled for UDP destinations.
    pub fn add_udp_destination(&mut self, bind_port: u16, peer: SocketAddr, pft_mtu: usize) -> Result<(), EdiError> {
        let socket = UdpSocket::bind(("0.0.0.0", bind_port))?;
        socket.set_nonblocking(true)?;
        self.destinations.push(Destination::Udp { socket, peer, pft_mtu });
        Ok(())
    }

    pub fn add_tcp_destination(&mut self, peer: SocketAddr) -> Result<(), EdiError> {
        let stream = std::net::TcpStream::connect(peer)?;
        stream.set_nonblocking(true)?;
        self.destinations.push(Destination::Tcp { stream });
        Ok(())
    }

    /// Splits sub-second offsets into (seconds, timestamp-level-2),
    /// ported from `Outputs.cpp`'s `set_tist`.
    fn compute_tist(&self, captured_at: SystemTime) -> Result<(u32, u32), EdiError> {
        let ts_with_delay = if self.tist_delay_ms >= 0 {
            captured_at + Duration::from_millis(self.tist_delay_ms as u64)
        } else {
            captured_at
                .checked_sub(Duration::from_millis((-self.tist_delay_ms) as u64))
                .ok_or(EdiError::NegativeRemainder)?
        };

        let since_epoch = ts_with_delay
            .duration_since(UNIX_EPOCH)
            .map_err(|_| EdiError::NegativeRemainder)?;

        let seconds = since_epoch.as_secs() as u32;
        let millis_remainder = since_epoch.subsec_millis();
        let timestamp_level2 = millis_remainder << 14;
        Ok((seconds, timestamp_level2))
    }

    fn build_af_packet(&mut self, frame: &[u8], captured_at: SystemTime) -> Result<Vec<u8>, EdiError> {
        let mut tags = Vec::new();
        tags.extend_from_slice(&tags::tag_star_ptr());

        let (seconds, tist) = if self.tist_enabled {
            let (s, t) = self.compute_tist(captured_at)?;
            (Some(s), Some(t))
        } else {
            (None, None)
        };
        tags.extend_from_slice(&tags::tag_dsti(seconds, tist));
        tags.extend_from_slice(&tags::tag_ssm(frame));
        tags.extend_from_slice(&tags::tag_audio_levels(self.audiolevel_left, self.audiolevel_right));

        let emit_version = match self.last_version_tag {
            None => true,
            Some(t) => t.elapsed() >= VERSION_TAG_INTERVAL,
        };
        if emit_version {
            tags.extend_from_slice(&tags::tag_odr_version(&self.identifier));
            self.last_version_tag = Some(Instant::now());
        }

        Ok(tags::assemble_tag_packet(&tags))
    }

    fn send_af(&mut self, af: &[u8]) -> bool {
        let mut all_ok = true;
        for dest in &self.destinations {
            let ok = match dest {
                Destination::Udp { socket, peer, pft_mtu } => {
                    let fec_policy = if self.fec { pft::Fec::Enabled } else { pft::Fec::Disabled };
                    let fragments = pft::fragment(af, *pft_mtu, fec_policy);
                    fragments.iter().all(|f| socket.send_to(f, peer).is_ok())
                }
                Destination::Tcp { stream } => {
                    use std::io::Write;
                    (&*stream).write_all(af).is_ok()
                }
            };
            if !ok {
                warn!("EDI destination send failed");
            }
            all_ok &= ok;
        }
        all_ok
    }
}

impl Sink for EdiSink {
    fn update_audio_levels(&mut self, left: i16, right: i16) {
        self.audiolevel_left = left;
        self.audiolevel_right = right;
    }

    fn write_frame(&mut self, superframe: &[u8], captured_at: SystemTime) -> bool {
        // A 120ms superframe is split into 5 x 24ms AF packets: EDI
        // carries audio in frame-period-sized chunks, not superframes.
        let chunk_len = superframe.len() / 5;
        if chunk_len == 0 {
            return false;
        }

        let mut ok = true;
        for (i, chunk) in superframe.chunks(chunk_len).enumerate() {
            let chunk_ts = captured_at + FRAME_PERIOD * i as u32;
            match self.build_af_packet(chunk, chunk_ts) {
                Ok(af) => ok &= self.send_af(&af),
                Err(e) => {
                    warn!("failed to build EDI AF packet: {e}");
                    ok = false;
                }
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tist_rejects_underflow_before_epoch() {
        let sink = EdiSink::new("test".into(), true, -10_000, false);
        let near_epoch = UNIX_EPOCH + Duration::from_millis(5_000);
        assert!(matches!(sink.compute_tist(near_epoch), Err(EdiError::NegativeRemainder)));
    }

    #[test]
    fn tist_accepts_positive_delay() {
        let sink = EdiSink::new("test".into(), true, 100, false);
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_500);
        let (seconds, level2) = sink.compute_tist(t).unwrap();
        assert_eq!(seconds, 1_700_000); // 1_700_000.5s + 0.1s -> 1_700_000.6s
        assert!(level2 > 0);
    }
}
