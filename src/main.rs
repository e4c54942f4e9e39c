mod app;
mod canvas;
mod config;
mod error;
mod input;
mod logging;
mod model;
mod noise;
mod render;
mod scheduler;
mod sim;
mod surface;
mod term;
mod timers;

use anyhow::Result;
use clap::Parser;
use config::Birthday;
use model::Mode;

/// A plush hedgehog that lives in your terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Args {
    /// Panel to open on
    #[arg(long, value_enum, default_value_t = Mode::Daily)]
    pub(crate) mode: Mode,

    /// Frame callback rate (10..=240)
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// Monochrome braille
    #[arg(long)]
    pub(crate) no_color: bool,

    /// Birthday as MM-DD
    #[arg(long)]
    pub(crate) birthday: Option<Birthday>,

    /// Treat it as night regardless of the clock
    #[arg(long, conflicts_with = "day")]
    pub(crate) night: bool,

    /// Treat it as day regardless of the clock
    #[arg(long)]
    pub(crate) day: bool,

    /// Log filter when RUST_LOG is unset, e.g. "debug"
    #[arg(long)]
    pub(crate) log_level: Option<String>,

    /// Write the effective settings to settings.json and exit
    #[arg(long)]
    pub(crate) write_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    app::run(args)
}
