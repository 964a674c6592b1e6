//! Command-line interface definitions for spinward-stress.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use spinward::log::LogLevel;
use spinward::{Backoff, LockKind};

/// Stress scenarios and lock-throughput comparison for spinward.
#[derive(Parser)]
#[command(name = "spinward-stress", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: `spinward.toml` if it exists).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log level (fatal, error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Only print errors and the final summary.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print per-scenario progress and parameters.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Report property violations instead of aborting on the first one.
    #[arg(long, global = true)]
    pub no_abort: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Mutual exclusion of an exclusive lock.
    Mutex(MutexArgs),
    /// Bounded admission of a counting semaphore.
    Semaphore(SemaphoreArgs),
    /// Barrier correctness across reused rounds.
    Barrier(BarrierArgs),
    /// Reader/writer exclusivity.
    Rwlock(RwlockArgs),
    /// Nested acquisition of a reentrant lock.
    Reentrant(ReentrantArgs),
    /// Producer/consumer handoff through a monitor.
    Monitor(MonitorArgs),
    /// Run every scenario with configured defaults.
    All,
    /// Compare lock throughput.
    Bench(BenchArgs),
}

/// Arguments for the `mutex` subcommand.
#[derive(Args, Default)]
pub struct MutexArgs {
    /// Lock flavor (spin, spin-tas, ticket, rw-write, reentrant, monitor).
    #[arg(long)]
    pub lock: Option<LockKind>,
    /// Number of competing threads.
    #[arg(long, short = 't')]
    pub threads: Option<usize>,
    /// Critical sections per thread.
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,
    /// Backoff between failed polls (none, exponential, yield).
    #[arg(long)]
    pub backoff: Option<Backoff>,
}

/// Arguments for the `semaphore` subcommand.
#[derive(Args, Default)]
pub struct SemaphoreArgs {
    /// Maximum simultaneous holders.
    #[arg(long)]
    pub capacity: Option<usize>,
    /// Number of competing threads.
    #[arg(long, short = 't')]
    pub threads: Option<usize>,
    /// Acquire/release cycles per thread.
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,
    /// Use the monitor-based semaphore.
    #[arg(long)]
    pub blocking: bool,
    /// Backoff between failed polls.
    #[arg(long)]
    pub backoff: Option<Backoff>,
}

/// Arguments for the `barrier` subcommand.
#[derive(Args, Default)]
pub struct BarrierArgs {
    /// Participants per round.
    #[arg(long, short = 'p')]
    pub participants: Option<usize>,
    /// Number of rounds.
    #[arg(long, short = 'r')]
    pub rounds: Option<usize>,
    /// Use the monitor-based barrier.
    #[arg(long)]
    pub blocking: bool,
    /// Backoff between failed polls.
    #[arg(long)]
    pub backoff: Option<Backoff>,
}

/// Arguments for the `rwlock` subcommand.
#[derive(Args, Default)]
pub struct RwlockArgs {
    /// Reader threads.
    #[arg(long)]
    pub readers: Option<usize>,
    /// Writer threads.
    #[arg(long)]
    pub writers: Option<usize>,
    /// Critical sections per thread.
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,
    /// Backoff between failed polls.
    #[arg(long)]
    pub backoff: Option<Backoff>,
}

/// Arguments for the `reentrant` subcommand.
#[derive(Args, Default)]
pub struct ReentrantArgs {
    /// Nested acquisitions per critical section.
    #[arg(long, short = 'd')]
    pub depth: Option<usize>,
    /// Number of competing threads.
    #[arg(long, short = 't')]
    pub threads: Option<usize>,
    /// Critical sections per thread.
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,
}

/// Arguments for the `monitor` subcommand.
#[derive(Args, Default)]
pub struct MonitorArgs {
    /// Consumer threads waiting for the buffer.
    #[arg(long)]
    pub consumers: Option<usize>,
    /// Artificial `notify_all` calls before the real update.
    #[arg(long)]
    pub spurious: Option<usize>,
}

/// Arguments for the `bench` subcommand.
#[derive(Args, Default)]
pub struct BenchArgs {
    /// Lock flavor to measure; repeat for several (default: all).
    #[arg(long = "kind", short = 'k')]
    pub kinds: Vec<LockKind>,
    /// Worker threads per lock.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,
    /// Busy iterations inside each critical section.
    #[arg(long)]
    pub hold: Option<u64>,
    /// Measurement time per lock, in seconds.
    #[arg(long)]
    pub duration: Option<u64>,
    /// Backoff between failed polls.
    #[arg(long)]
    pub backoff: Option<Backoff>,
    /// Write results as JSON to this path.
    #[arg(long)]
    pub json: Option<PathBuf>,
}
