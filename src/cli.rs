use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use duplex_stats_engine::{DuplexOptions, SampleFormat};
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Full-duplex pacing tester: moves captured frames back to playback and
/// records buffer statistics for every cycle that transferred frames.
#[derive(Parser, Debug)]
#[command(name = "duplex-stats", version)]
#[command(about = "Full-duplex ALSA pacing tester", long_about = None)]
pub struct Args {
    /// TOML file with default options; command-line values take precedence
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Period size in frames
    #[arg(short = 'p', long = "period-size")]
    pub period_size: Option<usize>,

    /// Number of periods in the device buffer
    #[arg(short = 'n', long = "number-of-periods")]
    pub nperiods: Option<usize>,

    /// Sampling rate in Hz
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// PCM device name
    #[arg(short = 'd', long = "pcm-device-name")]
    pub device: Option<String>,

    /// Capture channels
    #[arg(short = 'i', long = "input-channels")]
    pub input_channels: Option<usize>,

    /// Playback channels
    #[arg(short = 'o', long = "output-channels")]
    pub output_channels: Option<usize>,

    /// S16LE or S32LE
    #[arg(short = 'f', long = "sample-format")]
    pub format: Option<String>,

    /// Number of observations to collect
    #[arg(short = 's', long = "sample-size")]
    pub sample_size: Option<usize>,

    /// Simulated processing load in percent of one chunk's duration
    #[arg(short = 'l', long = "load")]
    pub load_percent: Option<u32>,

    /// Sleep after an idle cycle, in microseconds
    #[arg(short = 'b', long = "busy")]
    pub busy_sleep_us: Option<u64>,

    /// Processing chunk in frames (defaults to the period size)
    #[arg(short = 'c', long = "processing-buffer-size")]
    pub processing_frames: Option<usize>,

    /// Only read on POLLIN and only write on POLLOUT
    #[arg(short = 'w', long = "wait-for-poll-in-out")]
    pub gate_on_readiness: bool,

    /// Readiness poll timeout in milliseconds
    #[arg(long)]
    pub poll_timeout_ms: Option<u32>,

    /// Minimum available frames before a direction is serviced
    #[arg(long)]
    pub availability_threshold: Option<usize>,

    /// Move frames without routing samples through the ring buffer
    #[arg(long)]
    pub no_ring_buffer: bool,

    /// Skip the readiness poll
    #[arg(long)]
    pub no_poll: bool,

    /// SCHED_FIFO priority for the pacing thread
    #[arg(short = 'P', long, default_value_t = 70)]
    pub priority: i32,

    /// Heap to prefault before the run, in MiB
    #[arg(short = 'a', long = "prefault-heap-size", default_value_t = 100)]
    pub prefault_heap_mb: usize,

    /// Treat failed real-time preparation as fatal
    #[arg(long)]
    pub strict_rt: bool,

    /// Omit the table header
    #[arg(long)]
    pub no_header: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    /// Defaults, then the config file, then command-line overrides.
    pub fn resolve(&self) -> Result<DuplexOptions> {
        let mut options = match &self.config {
            Some(path) => load_config(path)?,
            None => DuplexOptions::default(),
        };
        self.apply(&mut options)?;
        Ok(options)
    }

    fn apply(&self, options: &mut DuplexOptions) -> Result<()> {
        if let Some(value) = self.period_size {
            options.period_frames = value;
        }
        if let Some(value) = self.nperiods {
            options.nperiods = value;
        }
        if let Some(value) = self.rate {
            options.rate = value;
        }
        if let Some(value) = &self.device {
            options.device = value.clone();
        }
        if let Some(value) = self.input_channels {
            options.input_channels = value;
        }
        if let Some(value) = self.output_channels {
            options.output_channels = value;
        }
        if let Some(value) = &self.format {
            options.format = value.parse::<SampleFormat>()?;
        }
        if let Some(value) = self.sample_size {
            options.sample_size = value;
        }
        if let Some(value) = self.load_percent {
            options.load_percent = value;
        }
        if let Some(value) = self.busy_sleep_us {
            options.busy_sleep_us = value;
        }
        if let Some(value) = self.processing_frames {
            options.processing_frames = Some(value);
        }
        if let Some(value) = self.poll_timeout_ms {
            options.poll_timeout_ms = value;
        }
        if let Some(value) = self.availability_threshold {
            options.availability_threshold = value;
        }
        if self.gate_on_readiness {
            options.gate_on_readiness = true;
        }
        if self.no_ring_buffer {
            options.use_ring_buffer = false;
        }
        if self.no_poll {
            options.wait_for_readiness = false;
        }
        Ok(())
    }
}

pub fn load_config(path: &std::path::Path) -> Result<DuplexOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config file {}", path.display()))
}
