//! Command-line surface.
//!
//! One `clap::Parser` derive struct maps directly onto the legacy
//! `getopt_long` table in `odr-sourcecompanion.cpp`'s `usage()`: same
//! long names, same short flags where the original had one.

use clap::Parser;

use crate::config::{MonoMode, Parameters};

#[derive(Parser, Debug)]
#[command(name = "dab-companion", about = "Companion process linking a DAB+ hardware encoder to ZMQ/EDI multiplexer inputs")]
pub struct Cli {
    /// Input URI, e.g. 'udp://12000' or 'udp://239.1.2.3:12000' for multicast.
    #[arg(short = 'I', long = "input-uri")]
    pub input_uri: String,

    /// Output control URI sent DAB+ encoder parameters, e.g. 'udp://192.168.1.1:9001'.
    #[arg(long = "control-uri")]
    pub control_uri: Option<String>,

    /// Port opened for PAD frame requests from the encoder (0 = not opened).
    #[arg(long = "pad-port", default_value_t = 0)]
    pub pad_port: u16,

    /// PAD size in bytes requested from the PAD source per frame.
    #[arg(short = 'p', long = "pad", default_value_t = 0)]
    pub pad: usize,

    /// Unix datagram socket path used to reach the PAD source (e.g. ODR-PadEnc).
    #[arg(short = 'P', long = "pad-socket")]
    pub pad_socket: Option<String>,

    /// Jitter buffer size, in 24ms frames.
    #[arg(long = "jitter-size", default_value_t = 40)]
    pub jitter_size: usize,

    /// Maximum frame waiting time, in milliseconds.
    #[arg(long = "timeout", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Output bitrate in kbps. Must be a multiple of 8.
    #[arg(short = 'b', long = "bitrate", default_value_t = 64)]
    pub bitrate: u32,

    /// Number of input channels.
    #[arg(short = 'c', long = "channels", default_value_t = 2)]
    pub channels: u32,

    /// Input sample rate in Hz.
    #[arg(short = 'r', long = "rate", default_value_t = 48000)]
    pub rate: u32,

    /// Force the usage of AAC-LC (no SBR, no PS).
    #[arg(long = "aaclc")]
    pub aaclc: bool,

    /// Force the usage of SBR.
    #[arg(long = "sbr")]
    pub sbr: bool,

    /// Force the usage of PS.
    #[arg(long = "ps")]
    pub ps: bool,

    /// An identifier string sent in the ODRv EDI TAG. Max 32 characters.
    #[arg(long = "identifier", default_value = "")]
    pub identifier: String,

    /// Output ZMQ URI. May be given more than once to fan out to several endpoints.
    #[arg(short = 'o', long = "output")]
    pub output: Vec<String>,

    /// EDI output URI, e.g. 'udp://239.1.2.3:12000' or 'tcp://localhost:7000'.
    #[arg(short = 'e', long = "edi")]
    pub edi: Vec<String>,

    /// Enable FEC parity fragments on EDI PFT output.
    #[arg(long = "fec")]
    pub fec: bool,

    /// Enable timestamps in EDI and add a delay (in milliseconds) to them.
    #[arg(short = 'T', long = "timestamp-delay")]
    pub timestamp_delay: Option<i64>,

    /// Run the given script before starting; only start if it exits 0.
    #[arg(long = "startup-check")]
    pub startup_check: Option<String>,

    /// Enable ZMQ CURVE encryption with the given secret key file.
    #[arg(short = 'k', long = "secret-key")]
    pub secret_key: Option<String>,

    /// Show peak audio level indication (forces the level-meter feature path).
    #[arg(short = 'l', long = "level")]
    pub level: bool,

    /// Connect to the specified UNIX datagram socket and send statistics.
    #[arg(short = 'S', long = "stats")]
    pub stats: Option<String>,
}

impl Cli {
    /// Derives raw encoder `Parameters` from the bitrate/channel/rate/SBR/PS flags.
    pub fn encoder_parameters(&self) -> Parameters {
        let (sbr, ps) = if self.aaclc { (false, false) } else { (self.sbr, self.ps) };
        Parameters {
            bitrate_kbps: self.bitrate,
            channels: self.channels,
            sample_rate_hz: self.rate,
            sbr,
            ps,
            mono_mode: MonoMode::LeftRightAverage,
        }
    }

    pub fn tist_enabled(&self) -> bool {
        self.timestamp_delay.is_some()
    }

    pub fn tist_delay_ms(&self) -> i64 {
        self.timestamp_delay.unwrap_or(0)
    }
}
