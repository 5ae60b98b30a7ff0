//! `dab-companion`: a companion process linking a DAB+ hardware AAC
//! encoder to ZMQ/EDI multiplexer inputs over a real-time STI/RTP
//! reception pipeline.

mod assembler;
mod cli;
mod config;
mod error;
mod info;
mod level;
mod output;
mod pad;
mod queue;
mod reactor;
mod startup_check;
mod stats;
mod sti;
mod udp;

use std::net::{SocketAddr, ToSocketAddrs};

use clap::Parser;
use log::error;

use cli::Cli;
use error::CompanionError;
use level::LevelMeter;
use output::edi::EdiSink;
use output::zmq_sink::ZmqSink;
use output::Sink;
use pad::UnixSocketPadSource;
use reactor::{Companion, ControlChannel};
use stats::StatsPublisher;
use udp::{UdpEndpoint, UdpUri};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CompanionError> {
    if let Some(script) = &cli.startup_check {
        let ok = startup_check::run_startup_check(script).map_err(|e| {
            error!("startup check failed to run: {e}");
            CompanionError::StartupCheckFailed
        })?;
        if !ok {
            return Err(CompanionError::StartupCheckFailed);
        }
    }

    let params = cli.encoder_parameters().validate()?;

    let audio_uri = UdpUri::parse(&cli.input_uri).map_err(CompanionError::Udp)?;
    let audio = UdpEndpoint::bind(&audio_uri).map_err(CompanionError::Udp)?;

    let control = build_control_channel(&cli)?;

    let pad_source: Option<Box<dyn pad::PadSource>> = match &cli.pad_socket {
        Some(path) => {
            let source = UnixSocketPadSource::connect(path)?;
            Some(Box::new(source))
        }
        None => None,
    };

    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    for uri in &cli.output {
        let sink = ZmqSink::connect(uri, cli.secret_key.as_deref()).map_err(CompanionError::ZmqSink)?;
        sinks.push(Box::new(sink));
    }
    if !cli.edi.is_empty() {
        let mut edi = EdiSink::new(cli.identifier.clone(), cli.tist_enabled(), cli.tist_delay_ms(), cli.fec);
        for uri in &cli.edi {
            add_edi_destination(&mut edi, uri)?;
        }
        sinks.push(Box::new(edi));
    }

    let level_meter: Box<dyn LevelMeter> = make_level_meter(&cli);

    let stats = match &cli.stats {
        Some(path) => Some(StatsPublisher::connect(path)?),
        None => None,
    };

    let mut companion = Companion::new(
        audio,
        control,
        params,
        cli.jitter_size,
        pad_source,
        cli.pad,
        sinks,
        level_meter,
        stats,
        cli.timeout_ms,
    );

    companion.send_encoder_configuration()?;
    companion.run()
}

/// Builds the back-channel socket: bound to
/// `--pad-port` so it can receive `0xFD 0x17` PAD requests, and aware of
/// `--control-uri` as the destination for the `0xFD 0x07` set-parameters
/// message. Either flag alone is enough to justify opening the channel.
fn build_control_channel(cli: &Cli) -> Result<Option<ControlChannel>, CompanionError> {
    if cli.pad_port == 0 && cli.control_uri.is_none() {
        return Ok(None);
    }

    let control_peer = cli.control_uri.as_deref().map(resolve_socket_addr).transpose()?;
    let bind_uri = UdpUri { host: None, port: cli.pad_port };
    let socket = UdpEndpoint::bind(&bind_uri).map_err(CompanionError::Udp)?;
    Ok(Some(ControlChannel { socket, control_peer }))
}

fn resolve_socket_addr(uri: &str) -> Result<SocketAddr, CompanionError> {
    let rest = uri.strip_prefix("udp://").unwrap_or(uri);
    rest.to_socket_addrs()
        .map_err(|e| CompanionError::Udp(error::UdpError::BadUri(uri.to_string(), e.to_string())))?
        .next()
        .ok_or_else(|| CompanionError::Udp(error::UdpError::BadUri(uri.to_string(), "no address resolved".into())))
}

fn add_edi_destination(edi: &mut EdiSink, uri: &str) -> Result<(), CompanionError> {
    const PFT_MTU: usize = 1400;
    if let Some(rest) = uri.strip_prefix("udp://") {
        let peer = resolve_socket_addr(rest)?;
        edi.add_udp_destination(0, peer, PFT_MTU).map_err(CompanionError::Edi)?;
    } else if let Some(rest) = uri.strip_prefix("tcp://") {
        let peer = resolve_socket_addr(rest)?;
        edi.add_tcp_destination(peer).map_err(CompanionError::Edi)?;
    } else {
        return Err(CompanionError::Udp(error::UdpError::BadUri(uri.to_string(), "unsupported EDI scheme".into())));
    }
    Ok(())
}

#[cfg(feature = "level-meter")]
fn make_level_meter(cli: &Cli) -> Box<dyn LevelMeter> {
    if cli.level || cli.stats.is_some() {
        Box::new(level::FdkAacLevelMeter::new())
    } else {
        Box::new(level::NullLevelMeter)
    }
}

#[cfg(not(feature = "level-meter"))]
fn make_level_meter(_cli: &Cli) -> Box<dyn LevelMeter> {
    Box::new(level::NullLevelMeter)
}
