//! rangeroo binary: argument handling, signal ladder, monitor thread.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use rangeroo::config::Config;
use rangeroo::kangaroo::manager::{KangarooSolver, SolverHandle};
use rangeroo::utils::logging::setup_logging;

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    process::exit(code);
}

fn run() -> Result<i32> {
    setup_logging();
    let config = Config::parse();
    config.validate().context("invalid arguments")?;

    info!("target: {}", config.target);
    info!("range: [{}, {}]", config.start_range, config.end_range);
    if config.gpu {
        info!("mode: batched accelerator");
    } else {
        info!("mode: {} CPU walkers", config.num_threads());
    }

    let mut solver = KangarooSolver::new(&config)?;

    if let Some(resume) = &config.resume {
        info!("resuming from {}", resume.display());
        if let Err(err) = solver.load_checkpoint(resume) {
            warn!("resume failed ({err}); starting fresh");
        }
    }

    let handle = solver.handle();
    install_signal_handler(handle.clone(), config.checkpoint.clone())?;

    {
        let handle = handle.clone();
        let checkpoint = config.checkpoint.clone();
        thread::spawn(move || monitor(handle, checkpoint));
    }

    solver.run()?;

    if let Some(key) = solver.private_key() {
        println!("\n\nSUCCESS! Private key found!");
        println!("Private key: {key:x}");
        Ok(0)
    } else {
        println!("\n\nSearch stopped without finding the key.");
        if let Err(err) = solver.save_checkpoint(&config.checkpoint) {
            warn!("final checkpoint failed: {err}");
        }
        Ok(0)
    }
}

/// First interrupt requests a graceful stop plus a final checkpoint, the
/// third forces the process down.
fn install_signal_handler(handle: SolverHandle, checkpoint: PathBuf) -> Result<()> {
    let interrupts = Arc::new(AtomicUsize::new(0));
    ctrlc::set_handler(move || {
        let count = interrupts.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= 3 {
            eprintln!("\nforcing exit");
            process::exit(1);
        }
        eprintln!("\ninterrupt received; stopping gracefully (Ctrl-C {} more to force)", 3 - count);
        handle.request_checkpoint(checkpoint.clone());
        handle.stop();
    })
    .context("failed to install the interrupt handler")
}

/// Once-a-second status line plus a 5-minute auto-checkpoint.
fn monitor(handle: SolverHandle, checkpoint: PathBuf) {
    let mut last_save = Instant::now();
    while !handle.is_found() && !handle.is_stopped() {
        thread::sleep(Duration::from_secs(1));

        let eta = match handle.estimated_seconds_remaining() {
            None => "calculating...".to_string(),
            Some(seconds) => format_eta(seconds),
        };
        print!(
            "\rtime: {}s | rate: {:.2} Mjumps/s | est: {}      ",
            handle.duration() as u64,
            handle.ops_per_second() / 1_000_000.0,
            eta
        );
        let _ = std::io::stdout().flush();

        if last_save.elapsed() >= Duration::from_secs(300) {
            handle.request_checkpoint(checkpoint.clone());
            last_save = Instant::now();
        }
    }
}

fn format_eta(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3_600.0;
    const DAY: f64 = 86_400.0;
    const YEAR: f64 = 31_536_000.0;

    if seconds > 1000.0 * YEAR {
        "> 1000 years".to_string()
    } else if seconds > YEAR {
        format!("{} years", (seconds / YEAR) as u64)
    } else if seconds > DAY {
        format!("{} days", (seconds / DAY) as u64)
    } else if seconds > HOUR {
        format!("{} hours", (seconds / HOUR) as u64)
    } else if seconds > MINUTE {
        format!("{} minutes", (seconds / MINUTE) as u64)
    } else {
        format!("{} seconds", seconds as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_formatting_scales_through_the_units() {
        assert_eq!(format_eta(30.0), "30 seconds");
        assert_eq!(format_eta(90.0), "1 minutes");
        assert_eq!(format_eta(7_200.5), "2 hours");
        assert_eq!(format_eta(200_000.0), "2 days");
        assert_eq!(format_eta(40_000_000.0), "1 years");
        assert_eq!(format_eta(4.0e13), "> 1000 years");
    }
}
