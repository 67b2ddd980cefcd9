mod app;
mod input;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "tankflow")]
#[command(about = "Four-tank liquid cascade in the terminal", long_about = None)]
pub(crate) struct Args {
    /// FPS cap (render rate). The simulation always steps every 20 ms.
    #[arg(long)]
    fps: Option<u32>,

    /// Start with the simulation running
    #[arg(long, default_value_t = false)]
    running: bool,

    /// Force monochrome
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Settings file (default: per-user data directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Run this many ticks without a terminal and print the level report
    #[arg(long)]
    ticks: Option<u64>,

    /// With --ticks, print a JSON snapshot instead of the report
    #[arg(long, default_value_t = false, requires = "ticks")]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(ticks) = args.ticks {
        logging::init_stderr();
        return app::run_headless(ticks, args.json);
    }
    app::run(args)
}
