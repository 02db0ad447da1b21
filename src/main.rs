// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "pano-capture")]
#[command(about = "Sweep panorama capture with live seam blending")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep a scene through the capture pipeline using the software engine
    Simulate {
        /// Camera frame width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Camera frame height
        #[arg(long, default_value = "480")]
        height: u32,

        /// Maximum number of camera frames to feed
        #[arg(short, long, default_value = "120")]
        frames: usize,

        /// Sweep axis
        #[arg(short, long, value_enum, default_value = "horizontal")]
        axis: Axis,

        /// Movement per frame in preview pixels (negative sweeps left/up)
        #[arg(short, long, default_value = "8", allow_hyphen_values = true)]
        step: i32,

        /// Image to pan across instead of the synthetic scene
        #[arg(long)]
        source: Option<PathBuf>,

        /// Output directory (default: ~/Pictures/Panorama)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (default: ~/.config/pano-capture/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cancel the session after this many frames
        #[arg(long)]
        cancel_after: Option<usize>,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Config file (default: ~/.config/pano-capture/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the effective configuration back to the file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=pano_capture=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            width,
            height,
            frames,
            axis,
            step,
            source,
            output,
            config,
            cancel_after,
        } => cli::simulate(cli::SimulateOptions {
            width,
            height,
            frames,
            vertical: matches!(axis, Axis::Vertical),
            step,
            source,
            output,
            config,
            cancel_after,
        }),
        Commands::Config { config, init } => cli::show_config(config, init),
    }
}
