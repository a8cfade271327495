//! # Hand Control Unit
//!
//! Runs the fixed-period torque control loop for one robotic hand.
//!
//! The only bus built into this binary is the simulated hand, so
//! `--simulate` is required. Joint state is published to an in-process
//! snapshot (logged once per second) and, with `--telemetry`, as JSON lines
//! on stdout. Logs go to stderr.
//!
//! Exit codes: 0 on graceful stop, 2 on emergency stop, 1 on any other
//! fatal error.

use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use hand_common::config::{HandConfig, Handedness};
use hand_common::consts::PUBLISH_QUEUE_DEPTH;
use hand_common::publish::Publisher;
use hand_control_unit::bus::{SimulatedHand, TimeoutBus};
use hand_control_unit::control::torque::ZeroTorque;
use hand_control_unit::cycle::ControlLoop;
use hand_control_unit::error::ControlError;
use hand_control_unit::publish::{SharedSnapshot, TelemetryWriter, channel};
use hand_control_unit::rt::rt_setup;
use hand_control_unit::scheduler::Scheduler;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Robot name used when no configuration file is given.
const DEFAULT_ROBOT_NAME: &str = "allegro_hand_right";

/// Interval of the joint-state status log.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Hand Control Unit: fixed-period torque control loop
#[derive(Parser, Debug)]
#[command(name = "hand_control_unit")]
#[command(version)]
#[command(about = "Fixed-period torque control loop for a multi-joint robotic hand")]
struct Args {
    /// Path to the hand configuration TOML. Built-in defaults if omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Drive the simulated hand (the only bus built in).
    #[arg(long)]
    simulate: bool,

    /// Assert the simulated fault line after this many cycles.
    #[arg(long, value_name = "CYCLES")]
    fault_after: Option<u64>,

    /// Stop gracefully after this many cycles.
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Write joint-state snapshots as JSON lines to stdout.
    #[arg(long)]
    telemetry: bool,

    /// Write only every N-th snapshot to the telemetry stream.
    #[arg(long, value_name = "N", default_value_t = 1)]
    telemetry_every: u64,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Hand Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(exit_code(e.as_ref()));
    }

    info!("Hand Control Unit shutdown complete");
}

fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<ControlError>() {
        Some(e) if e.is_emergency_stop() => 2,
        _ => 1,
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match args.config {
        Some(ref path) => {
            info!("Loading hand config from {}", path.display());
            HandConfig::load(path).map_err(ControlError::from)?
        }
        None => {
            warn!("No --config given, using built-in defaults for '{DEFAULT_ROBOT_NAME}'");
            HandConfig::with_identity(DEFAULT_ROBOT_NAME, Handedness::Right)
        }
    };

    if !args.simulate {
        return Err(Box::new(ControlError::Initialization(
            "no hardware bus driver is built in; run with --simulate".to_string(),
        )));
    }

    info!(
        "Config OK: robot={}, hand={:?}, joints={}, cycle_time={}µs, overrun_policy={:?}",
        config.hand.robot_name,
        config.hand.which_hand,
        config.control.joint_count(),
        config.control.cycle_time_us,
        config.control.overrun_policy,
    );

    // RT setup (mlockall, affinity, scheduler).
    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    // Bus: simulated hand behind the deadline wrapper.
    let mut hand = SimulatedHand::new(config.control.joint_count(), config.control.cycle_period())?;
    if let Some(cycles) = args.fault_after {
        info!("Simulated fault line will assert after {cycles} cycles");
        hand = hand.with_trip_after(cycles);
    }
    let bus = TimeoutBus::spawn(hand, config.control.bus_timeout())?;

    // Publishers.
    let shared = SharedSnapshot::new();
    let (publisher, telemetry): (Box<dyn Publisher>, Option<TelemetryWriter>) = if args.telemetry
    {
        let (tx, rx) = channel(PUBLISH_QUEUE_DEPTH);
        let writer = TelemetryWriter::spawn(rx, std::io::stdout(), args.telemetry_every)?;
        (Box::new((tx, shared.clone())), Some(writer))
    } else {
        (Box::new(shared.clone()), None)
    };

    let mut cl = ControlLoop::new(&config, bus, ZeroTorque, publisher)?;

    let mut scheduler = Scheduler::from_config(&config.control);
    if let Some(cycles) = args.cycles {
        scheduler = scheduler.with_max_cycles(cycles);
    }

    // Setup signal handler for graceful shutdown.
    let running = scheduler.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let (status_done, status) = spawn_status_logger(shared)?;

    info!("Control loop initialized, entering cycle loop");
    let result = scheduler.run(&mut cl);

    let stats = scheduler.stats();
    info!(
        "Cycle stats: count={}, avg={}ns, min={}ns, max={}ns, stddev={:.0}ns, max_latency={}ns, overruns={}, skipped={}",
        stats.cycle_count,
        stats.avg_cycle_ns(),
        if stats.cycle_count == 0 { 0 } else { stats.min_cycle_ns },
        stats.max_cycle_ns,
        stats.stddev_cycle_ns(),
        stats.max_latency_ns,
        stats.overruns,
        stats.skipped_ticks,
    );
    let counters = cl.counters();
    info!(
        "Loop counters: ticks={}, bus_error_cycles={}, publish_errors={}, velocity_holds={}, sanitized_torques={}",
        counters.ticks,
        counters.bus_error_cycles,
        counters.publish_errors,
        counters.velocity_holds,
        counters.sanitized_torques,
    );

    // Dropping the loop closes the bus worker and the telemetry channel.
    drop(cl);
    drop(status_done);
    if status.join().is_err() {
        warn!("Status logger panicked");
    }
    if let Some(writer) = telemetry {
        debug!("Telemetry lines written: {}", writer.join());
    }

    if let Err(e) = result {
        error!("Control loop error: {e}");
        return Err(Box::new(e));
    }
    Ok(())
}

/// Log the latest published joint state once per [`STATUS_INTERVAL`].
///
/// Stops when the returned sender is dropped.
fn spawn_status_logger(
    shared: SharedSnapshot,
) -> Result<(Sender<()>, JoinHandle<()>), ControlError> {
    let (done_tx, done_rx) = bounded::<()>(0);
    let handle = thread::Builder::new()
        .name("hand-status".into())
        .spawn(move || loop {
            match done_rx.recv_timeout(STATUS_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(snap) = shared.latest() {
                        let max_abs_vel = snap
                            .velocity
                            .iter()
                            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
                        info!(
                            frame = snap.frame,
                            stamp_us = snap.stamp_us,
                            joints = snap.joint_count(),
                            max_abs_velocity = max_abs_vel,
                            "joint state"
                        );
                    }
                }
                _ => break,
            }
        })
        .map_err(|e| ControlError::Initialization(format!("failed to spawn status logger: {e}")))?;
    Ok((done_tx, handle))
}

/// Setup tracing subscriber based on CLI arguments.
///
/// Logs go to stderr so that stdout stays clean for telemetry.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
