use std::path::PathBuf;

use addoncomm_dispatch::Priority;
use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod parse;
pub mod simulate;
pub mod split;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a payload into wire frames.
    Split(SplitArgs),
    /// Decode one hex-encoded wire frame.
    Parse(ParseArgs),
    /// Send messages between two in-memory dispatchers and report the schedule.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Split(args) => split::run(args, format),
        Command::Parse(args) => parse::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Payload text.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Largest encoded frame, header included.
    #[arg(long, default_value_t = addoncomm_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Message id for a multi-part split.
    #[arg(long, default_value_t = 1)]
    pub message_id: u16,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Frame bytes as hex (whitespace ignored).
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of messages to send.
    #[arg(long, default_value_t = 5)]
    pub messages: usize,
    /// Payload size of each message in bytes.
    #[arg(long, default_value_t = 600)]
    pub size: usize,
    /// Send priority (alert, normal, bulk).
    #[arg(long, default_value = "normal")]
    pub priority: Priority,
    /// Prefix to send on.
    #[arg(long, default_value = "SIM")]
    pub prefix: String,
    /// Distribution name.
    #[arg(long, default_value = "PARTY")]
    pub distribution: String,
    /// Target for WHISPER or CHANNEL.
    #[arg(long)]
    pub target: Option<String>,
    /// Simulated time between ticks, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,
    /// Give up after this many ticks.
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u64,
    /// Drop every Nth transmitted frame before it reaches the receiver.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub drop_every: Option<u64>,
    /// Transport configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Override the throttle rate (bytes per second).
    #[arg(long)]
    pub rate: Option<f64>,
    /// Override the throttle capacity (bytes).
    #[arg(long)]
    pub burst: Option<f64>,
    /// Override the maximum frame size.
    #[arg(long)]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
