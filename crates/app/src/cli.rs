use std::ffi::OsString;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::overlay::{self, OverlayCliArgs, OverlayConfig, PingArgs};

/// Draw AprilTag outlines and overlay images on captured frames.
#[derive(Debug, Parser)]
#[command(name = "tag-overlay", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture, detect and render in a loop.
    Run(OverlayCliArgs),
    /// Check that the detection service is up.
    Ping(PingArgs),
}

pub fn handle_commands<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::parse_from(args).command {
        Command::Run(args) => overlay::run(OverlayConfig::from_cli(args)?),
        Command::Ping(args) => overlay::run_ping(args),
    }
}
