//! Operational statistics publisher.
//!
//! Grounded on the `StatsPublisher` collaborator named (but not defined)
//! in `odr-sourcecompanion.cpp`'s main loop: `stats_publisher->update_audio_levels(...)`
//! is called once per emitted superframe. Its wire format isn't present
//! in the retrieved source, so a self-describing `key=value` text record
//! is used rather than inventing a binary layout to match byte-for-byte.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::Path;

use log::warn;

use crate::queue::QueueStats;

pub struct StatsPublisher {
    socket: UnixDatagram,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuperframeStats {
    pub frames: u64,
    pub queue: QueueStats,
    pub peak_left: i16,
    pub peak_right: i16,
    pub pad_queue_len: usize,
}

impl StatsPublisher {
    pub fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        socket.set_nonblocking(true)?;
        Ok(StatsPublisher { socket })
    }

    fn format_record(stats: &SuperframeStats) -> String {
        format!(
            "frames={} overruns={} duplicates={} peak_left={} peak_right={} pad_queue_len={}\n",
            stats.frames, stats.queue.overruns, stats.queue.duplicates, stats.peak_left, stats.peak_right, stats.pad_queue_len
        )
    }

    /// Sends one record; failures are logged, never propagated, since
    /// stats publishing is an observability aid, not load-bearing.
    pub fn publish(&self, stats: &SuperframeStats) {
        let record = Self::format_record(stats);
        if let Err(e) = self.socket.send(record.as_bytes()) {
            warn!("failed to send stats record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_self_describing_key_value_text() {
        let stats = SuperframeStats {
            frames: 42,
            queue: QueueStats { overruns: 1, duplicates: 2 },
            peak_left: -100,
            peak_right: 200,
            pad_queue_len: 3,
        };
        let record = StatsPublisher::format_record(&stats);
        assert_eq!(record, "frames=42 overruns=1 duplicates=2 peak_left=-100 peak_right=200 pad_queue_len=3\n");
    }

    #[test]
    fn publish_over_unix_datagram_round_trips() {
        let dir = std::env::temp_dir();
        let server_path = dir.join(format!("stats-server-test-{}.sock", std::process::id()));
        let client_path = dir.join(format!("stats-client-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&server_path);
        let _ = std::fs::remove_file(&client_path);

        let server = UnixDatagram::bind(&server_path).unwrap();
        let client_socket = UnixDatagram::bind(&client_path).unwrap();
        client_socket.connect(&server_path).unwrap();
        client_socket.set_nonblocking(true).unwrap();
        let publisher = StatsPublisher { socket: client_socket };

        publisher.publish(&SuperframeStats { frames: 1, ..Default::default() });

        let mut buf = [0u8; 256];
        let n = server.recv(&mut buf).unwrap();
        let received = String::from_utf8_lossy(&buf[..n]);
        assert!(received.starts_with("frames=1 "));

        let _ = std::fs::remove_file(&server_path);
        let _ = std::fs::remove_file(&client_path);
    }
}
