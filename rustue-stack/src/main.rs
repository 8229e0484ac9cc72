//! rustue - LTE UE stack demonstrator
//!
//! Runs the stack against the simulated PHY/RF and gateway collaborators:
//! loads a YAML configuration, switches the service on, drives radio ticks
//! at the configured cadence, and prints a metrics summary on exit.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rustue_common::logging::init_logging_with_filter;
use rustue_common::{StackConfig, Tti};
use rustue_stack::{LoopbackGw, RrcState, SimPhy, UeStack};

/// rustue - LTE UE protocol stack demonstrator
#[derive(Parser, Debug)]
#[command(name = "rustue")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the stack configuration file (YAML); defaults apply if omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Number of radio ticks to drive before shutting down
    #[arg(short = 't', long = "ttis", value_name = "N", default_value_t = 5000)]
    ttis: u32,

    /// Tick interval in microseconds (1000 = the reference 1 ms TTI)
    #[arg(long = "tick-interval-us", value_name = "US", default_value_t = 1000)]
    tick_interval_us: u64,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rustue: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config_file {
        Some(path) => StackConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => StackConfig::default(),
    };

    init_logging_with_filter(&config.log.filter_string());

    let phy = Arc::new(SimPhy::default());
    let gw = Arc::new(LoopbackGw::new());
    let mut stack =
        UeStack::init(config, phy, gw).context("stack initialization failed")?;

    stack.switch_on();

    // Drive the radio timing source: one tick per interval, plus the sync
    // notification once the stack has camped on the simulated cell.
    let mut sync_sent = false;
    for tti in 0..args.ttis {
        stack.run_tti(Tti::new(tti));

        if !sync_sent && stack.metrics().rrc.state == RrcState::Camped {
            stack.in_sync();
            sync_sent = true;
        }
        std::thread::sleep(Duration::from_micros(args.tick_interval_us));
    }

    let metrics = stack.metrics();
    info!(
        registered = metrics.is_registered(),
        emm = %metrics.nas.emm_state,
        rrc = %metrics.rrc.state,
        ttis = metrics.mac.ttis,
        tx_pdus = metrics.mac.tx_pdus,
        summaries = metrics.sched.tti_summaries,
        "run finished"
    );

    if metrics.is_registered() {
        // keep the radio ticking so the detach can drain out of SRB1
        let stop_ticks = AtomicBool::new(false);
        let detach_sent = std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut tti = args.ttis;
                while !stop_ticks.load(Ordering::SeqCst) {
                    stack.run_tti(Tti::new(tti));
                    tti = tti.wrapping_add(1);
                    std::thread::sleep(Duration::from_micros(args.tick_interval_us));
                }
            });
            let sent = stack.switch_off();
            stop_ticks.store(true, Ordering::SeqCst);
            sent
        });
        info!(detach_sent, "switched off");
    }
    stack.stop();
    Ok(())
}
