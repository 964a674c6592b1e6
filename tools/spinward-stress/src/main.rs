//! Stress harness for the spinward synchronization primitives.
//!
//! Each subcommand hammers one primitive from many threads and checks its
//! concurrency property with counters kept outside the primitive; `bench`
//! compares lock throughput instead.
//!
//! ```text
//! spinward-stress semaphore --capacity 3 --threads 10
//! spinward-stress mutex --lock spin-tas --backoff exponential
//! spinward-stress --no-abort all
//! spinward-stress bench -k spin -k monitor --duration 2 --json out.json
//! ```

mod bench;
mod cli;
mod config;
mod report;
mod scenario;

use anyhow::{Result, bail};
use clap::Parser;
use spinward::log;

use cli::{
    BarrierArgs, BenchArgs, Cli, Command, MonitorArgs, MutexArgs, ReentrantArgs, RwlockArgs,
    SemaphoreArgs,
};
use config::Config;
use scenario::{ScenarioReport, Watch};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    log::set_log_fn(log::stderr_sink);
    log::set_max_level(config.log_level(&cli));
    let abort = config.abort_on_violation(&cli);

    match cli.command {
        Command::Mutex(ref args) => {
            single(scenario::mutex::run(&config.mutex(args)?, Watch::new(abort)))
        }
        Command::Semaphore(ref args) => single(scenario::semaphore::run(
            &config.semaphore(args)?,
            Watch::new(abort),
        )),
        Command::Barrier(ref args) => {
            single(scenario::barrier::run(&config.barrier(args)?, Watch::new(abort)))
        }
        Command::Rwlock(ref args) => {
            single(scenario::rwlock::run(&config.rwlock(args)?, Watch::new(abort)))
        }
        Command::Reentrant(ref args) => single(scenario::reentrant::run(
            &config.reentrant(args)?,
            Watch::new(abort),
        )),
        Command::Monitor(ref args) => {
            single(scenario::monitor::run(&config.monitor(args)?, Watch::new(abort)))
        }
        Command::All => cmd_all(&config, abort),
        Command::Bench(ref args) => cmd_bench(&config, args),
    }
}

fn single(result: Result<ScenarioReport>) -> Result<()> {
    report::print_scenario(&result?);
    Ok(())
}

fn cmd_all(config: &Config, abort: bool) -> Result<()> {
    let results = [
        (
            "mutex",
            config
                .mutex(&MutexArgs::default())
                .and_then(|p| scenario::mutex::run(&p, Watch::new(abort))),
        ),
        (
            "semaphore",
            config
                .semaphore(&SemaphoreArgs::default())
                .and_then(|p| scenario::semaphore::run(&p, Watch::new(abort))),
        ),
        (
            "barrier",
            config
                .barrier(&BarrierArgs::default())
                .and_then(|p| scenario::barrier::run(&p, Watch::new(abort))),
        ),
        (
            "rwlock",
            config
                .rwlock(&RwlockArgs::default())
                .and_then(|p| scenario::rwlock::run(&p, Watch::new(abort))),
        ),
        (
            "reentrant",
            config
                .reentrant(&ReentrantArgs::default())
                .and_then(|p| scenario::reentrant::run(&p, Watch::new(abort))),
        ),
        (
            "monitor",
            config
                .monitor(&MonitorArgs::default())
                .and_then(|p| scenario::monitor::run(&p, Watch::new(abort))),
        ),
    ];

    report::print_summary(&results);
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        bail!("{failed} of {} scenarios failed", results.len());
    }
    Ok(())
}

fn cmd_bench(config: &Config, args: &BenchArgs) -> Result<()> {
    let params = config.bench(args)?;
    let results = bench::run(&params)?;
    report::print_bench_table(&results);
    if let Some(ref path) = args.json {
        report::write_json(path, &results)?;
        spinward::sw_info!("bench: results written to {}", path.display());
    }
    Ok(())
}
