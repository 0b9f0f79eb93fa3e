//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use vidgrab_core::endpoint::DEFAULT_CONTROL_URL;
use vidgrab_core::{Mode, PipelineConfig};

/// Download videos and cover images from rendered item pages.
///
/// Resolves the DevTools endpoint of a running Chrome, reads each item's
/// title and asset URLs, and stores them as `<first word>/<title>.mp4|.jpg`.
#[derive(Parser, Debug)]
#[command(name = "vidgrab")]
#[command(author, version, about)]
pub struct Args {
    /// Item or collection identifier
    #[arg(value_parser = parse_identifier)]
    pub identifier: String,

    /// Whether the identifier names a single item or a playlist
    #[arg(short, long, value_enum, default_value_t = ModeArg::List)]
    pub mode: ModeArg,

    /// URL of the DevTools version document
    #[arg(long, alias = "chrome-remote-url", default_value = DEFAULT_CONTROL_URL)]
    pub control_url: String,

    /// Root directory for downloaded items
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Attempts per operation, including the first (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts (0-600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600))]
    pub retry_delay: Option<u64>,

    /// Directory for playlist screenshots
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,

    /// Give up on an item as soon as its page lacks a title or video URL
    #[arg(long)]
    pub stop_on_incomplete: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/vidgrab/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Command-line spelling of [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// A single item
    Single,
    /// A playlist of items
    List,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => Mode::Single,
            ModeArg::List => Mode::List,
        }
    }
}

impl Args {
    /// Applies flags given on the command line over file and default values.
    pub fn apply_to(&self, config: &mut PipelineConfig, control_url_from_cli: bool) {
        if control_url_from_cli {
            config.endpoint.url.clone_from(&self.control_url);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir.clone_from(output_dir);
        }
        if let Some(screenshot_dir) = &self.screenshot_dir {
            config.collection.screenshot_dir = Some(screenshot_dir.clone());
        }
        if self.stop_on_incomplete {
            config.item.retry_incomplete = false;
        }
        config.set_retry(
            self.max_attempts,
            self.retry_delay.map(Duration::from_secs),
        );
    }
}

fn parse_identifier(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err("identifier must not be empty".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}
