//! Typed error enums for every fallible component.
//!
//! Mirrors the `thiserror`-based error style used elsewhere in the
//! retrieved pack (e.g. `ubv::error::UbvError`): one enum per concern,
//! `#[error("...")]` messages, `#[from]` where a conversion is lossless.

use std::net::AddrParseError;

#[derive(Debug, thiserror::Error)]
pub enum UdpError {
    #[error("socket io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid udp uri '{0}': {1}")]
    BadUri(String, String),
}

#[derive(Debug, thiserror::Error)]
pub enum StiError {
    #[error("no STI F-Sync pattern found in datagram of {0} bytes")]
    NoSync(usize),
    #[error("datagram too short to contain an STI frame characterization ({0} bytes)")]
    Truncated(usize),
    #[error("NST field is zero, no sub-channel descriptor present")]
    NoSubchannel,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bitrate {0} kbps out of range [8,192] or not a multiple of 8")]
    BadBitrate(u32),
    #[error("sample rate {0} Hz must be 32000 or 48000")]
    BadSampleRate(u32),
    #[error("channel count {0} must be 1 or 2")]
    BadChannels(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum PadError {
    #[error("PAD reply length mismatch: sent {sent} bytes, source reported {reported}")]
    LengthMismatch { sent: usize, reported: usize },
    #[error("pad source io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EdiError {
    #[error("negative sub-second remainder after applying timestamp delay")]
    NegativeRemainder,
    #[error("edi io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ZmqSinkError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),
    #[error("secret key file '{0}' is not valid z85: {1}")]
    BadKey(String, String),
    #[error("io error reading secret key file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error(transparent)]
    Udp(#[from] UdpError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pad(#[from] PadError),
    #[error(transparent)]
    Edi(#[from] EdiError),
    #[error(transparent)]
    ZmqSink(#[from] ZmqSinkError),
    #[error("invalid address: {0}")]
    Addr(#[from] AddrParseError),
    #[error("startup check failed")]
    StartupCheckFailed,
    #[error("{0} consecutive send failures, aborting")]
    TooManySendFailures(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CompanionError> = std::result::Result<T, E>;
