mod cli;
mod logging;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, OutputFormat};
use duplex_stats_engine::{DuplexOptions, RunReport, rt};
use std::process::ExitCode;
use tracing::{error, info, warn};

const EXIT_STARTUP_FAILURE: u8 = 1;
const EXIT_TERMINATED_EARLY: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = logging::init(args.log_level()) {
        eprintln!("Failed to install log subscriber: {err}");
    }
    match run(&args) {
        Ok(report) if report.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_TERMINATED_EARLY),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn run(args: &Args) -> Result<RunReport> {
    let options = args.resolve()?;
    options.validate().context("Invalid options")?;
    prepare_realtime(args)?;

    let report = run_duplex(options)?;
    info!(
        "Collected {} of {} observations ({})",
        report.observations.len(),
        report.requested,
        match report.error() {
            None => "complete".to_string(),
            Some(err) => format!("terminated: {err}"),
        }
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Table => report::write_table(&mut out, &report, !args.no_header),
        OutputFormat::Json => report::write_json(&mut out, &report),
    }
    .context("Failed to write report")?;
    Ok(report)
}

fn prepare_realtime(args: &Args) -> Result<()> {
    let steps = [
        ("allocator tuning", rt::tune_allocator()),
        ("memory locking", rt::lock_memory_pages()),
        ("heap prefault", rt::prefault_heap(args.prefault_heap_mb)),
        ("realtime scheduling", rt::configure_rt_thread(args.priority)),
    ];
    for (step, result) in steps {
        if let Err(message) = result {
            if args.strict_rt {
                anyhow::bail!("{step} failed: {message}");
            }
            warn!("{} failed, continuing: {}", step, message);
        }
    }
    rt::prefault_stack();
    Ok(())
}

#[cfg(target_os = "linux")]
fn run_duplex(options: DuplexOptions) -> Result<RunReport> {
    use duplex_stats_engine::hw::alsa::open_duplex;
    use duplex_stats_engine::{AlwaysReady, PacingLoop};

    let duplex = open_duplex(&options)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to open PCM device '{}'", options.device))?;
    if options.wait_for_readiness {
        let mut pacing = PacingLoop::new(options, duplex.capture, duplex.playback, duplex.readiness)?;
        pacing.prefill()?;
        Ok(pacing.run())
    } else {
        let mut pacing = PacingLoop::new(options, duplex.capture, duplex.playback, AlwaysReady)?;
        pacing.prefill()?;
        Ok(pacing.run())
    }
}

#[cfg(not(target_os = "linux"))]
fn run_duplex(options: DuplexOptions) -> Result<RunReport> {
    anyhow::bail!(
        "PCM device '{}' unavailable: ALSA duplex streams require Linux",
        options.device
    )
}
