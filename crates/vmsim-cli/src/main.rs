//! `vmsim` — command-line front end for the virtual-memory simulator core.
//!
//! ```text
//! vmsim run --config <path> [--dump] [--log-level <level>]
//! vmsim check --config <path>
//! ```
//!
//! Argument parsing follows the teacher's `crates/testing/src/bin/main.rs`
//! shape (`env::args()` scanned for flags, no argument-parsing crate in
//! the dependency stack to lean on); subscriber setup follows
//! `crates/daemon/src/main.rs` (`tracing_subscriber::registry()` +
//! `fmt::layer()` + `EnvFilter`).

mod config;
mod program_loader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmsim_core::clock::RealTimeClock;
use vmsim_core::kernel::{Kernel, ProcessSpec};
use vmsim_core::program::ReferenceCpu;

use config::SimConfig;

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true).with_thread_names(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

struct Args {
    config: Option<PathBuf>,
    dump: bool,
    log_level: String,
}

fn parse_args(raw: &[String]) -> Args {
    let mut config = None;
    let mut dump = false;
    let mut log_level = "info".to_string();
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = iter.next().map(PathBuf::from),
            "--dump" => dump = true,
            "--log-level" => {
                if let Some(level) = iter.next() {
                    log_level = level.clone();
                }
            }
            _ => {}
        }
    }
    Args { config, dump, log_level }
}

fn load_config(path: &PathBuf) -> Result<SimConfig> {
    SimConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

fn build_specs(config: &SimConfig) -> Vec<ProcessSpec> {
    config
        .processes
        .iter()
        .map(|proc| {
            let program = match program_loader::load(&proc.program_path) {
                Ok(program) => program,
                Err(err) => {
                    eprintln!("vmsim: {err}");
                    Vec::new()
                }
            };
            ProcessSpec { start_time: proc.start_time, priority: proc.priority, program }
        })
        .collect()
}

fn run(config_path: PathBuf, dump: bool, log_level: &str) -> Result<()> {
    init_tracing(log_level);
    let config = load_config(&config_path)?;

    info!(ram_size = config.ram_size, num_cpus = config.num_cpus, "starting simulation");

    let kernel = Arc::new(Kernel::new(config.to_kernel_config()));
    let cpu = ReferenceCpu::new();
    let specs = build_specs(&config);

    let clock = RealTimeClock::new(config.time_slot as u64);
    kernel.run(specs, &cpu, &clock);

    // Every admitted process has retired by the time `run` returns (its
    // `Mm` is gone with it), so the only state left worth dumping is the
    // physical devices themselves.
    if dump {
        let ram_dump = kernel.dump_ram();
        println!("{}", serde_json::to_string_pretty(&ram_dump).context("serializing RAM dump")?);
        for swp_id in 0..kernel.num_swap_devices() {
            let swap_dump = kernel.dump_swap(swp_id);
            println!("{}", serde_json::to_string_pretty(&swap_dump).context("serializing swap dump")?);
        }
    }

    info!("simulation complete");
    Ok(())
}

fn check(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let mut ok = true;
    for proc in &config.processes {
        if let Err(err) = program_loader::load(&proc.program_path) {
            eprintln!("vmsim: {err}");
            ok = false;
        }
    }
    if !ok {
        anyhow::bail!("one or more process programs failed to load");
    }
    println!("vmsim: config is valid ({} process(es))", config.processes.len());
    Ok(())
}

fn main() {
    let raw: Vec<String> = std::env::args().collect();
    let Some(subcommand) = raw.get(1) else {
        eprintln!("usage: vmsim <run|check> --config <path> [--dump] [--log-level <level>]");
        std::process::exit(1);
    };

    let args = parse_args(&raw[2..]);
    let Some(config_path) = args.config else {
        eprintln!("vmsim: missing --config <path>");
        std::process::exit(1);
    };

    let result = match subcommand.as_str() {
        "run" => run(config_path, args.dump, &args.log_level),
        "check" => check(config_path),
        other => Err(anyhow::anyhow!("unknown subcommand {other:?}")),
    };

    if let Err(err) = result {
        eprintln!("vmsim: {err:#}");
        std::process::exit(1);
    }
}
