//! Configuration loading from `spinward.toml`.
//!
//! Every value resolves in the same order: command-line flag, then the
//! scenario's own section, then `[defaults]`, then the built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use spinward::log::LogLevel;
use spinward::{Backoff, BarrierKind, LockKind};

use crate::bench;
use crate::cli::{
    BarrierArgs, BenchArgs, Cli, MonitorArgs, MutexArgs, ReentrantArgs, RwlockArgs,
    SemaphoreArgs,
};
use crate::scenario::{barrier, monitor, mutex, reentrant, rwlock, semaphore};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_PATH: &str = "spinward.toml";

const THREADS: usize = 10;
const ITERATIONS: usize = 10_000;
const CAPACITY: usize = 3;
const DEPTH: usize = 10;
const PARTICIPANTS: usize = 4;
const ROUNDS: usize = 1_000;
const READERS: usize = 4;
const WRITERS: usize = 2;
const CONSUMERS: usize = 4;
const SPURIOUS: usize = 10;
const WORKERS: usize = 4;
const HOLD: u64 = 100;
const DURATION_SECS: u64 = 5;

/// Parsed configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub defaults: Defaults,
    pub mutex: MutexSection,
    pub semaphore: SemaphoreSection,
    pub barrier: BarrierSection,
    pub rwlock: RwlockSection,
    pub reentrant: ReentrantSection,
    pub monitor: MonitorSection,
    pub bench: BenchSection,
}

/// `[defaults]`: fallbacks shared by every scenario.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Defaults {
    pub threads: Option<usize>,
    pub iterations: Option<usize>,
    pub log_level: Option<LogLevel>,
    pub abort_on_violation: Option<bool>,
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MutexSection {
    pub lock: Option<LockKind>,
    pub threads: Option<usize>,
    pub iterations: Option<usize>,
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SemaphoreSection {
    pub capacity: Option<usize>,
    pub threads: Option<usize>,
    pub iterations: Option<usize>,
    pub blocking: Option<bool>,
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BarrierSection {
    pub participants: Option<usize>,
    pub rounds: Option<usize>,
    pub blocking: Option<bool>,
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RwlockSection {
    pub readers: Option<usize>,
    pub writers: Option<usize>,
    pub iterations: Option<usize>,
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReentrantSection {
    pub depth: Option<usize>,
    pub threads: Option<usize>,
    pub iterations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MonitorSection {
    pub consumers: Option<usize>,
    pub spurious: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BenchSection {
    pub workers: Option<usize>,
    pub hold: Option<u64>,
    pub duration_secs: Option<u64>,
    pub kinds: Option<Vec<LockKind>>,
    pub backoff: Option<Backoff>,
}

impl Config {
    /// Loads `path`, or [`DEFAULT_PATH`] if it exists, or an empty config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_PATH);
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parses TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Log level: `--log-level`, then `-q`/`-v`, then `[defaults]`.
    pub fn log_level(&self, cli: &Cli) -> LogLevel {
        if let Some(level) = cli.log_level {
            return level;
        }
        if cli.quiet {
            LogLevel::Error
        } else if cli.verbose {
            LogLevel::Debug
        } else {
            self.defaults.log_level.unwrap_or(LogLevel::Info)
        }
    }

    /// Whether the first violation aborts the process.
    pub fn abort_on_violation(&self, cli: &Cli) -> bool {
        !cli.no_abort && self.defaults.abort_on_violation.unwrap_or(true)
    }

    fn threads(&self, key: &str, cli: Option<usize>, section: Option<usize>) -> Result<usize> {
        at_least_one(key, cli.or(section).or(self.defaults.threads).unwrap_or(THREADS))
    }

    fn iterations(&self, key: &str, cli: Option<usize>, section: Option<usize>) -> Result<usize> {
        at_least_one(
            key,
            cli.or(section).or(self.defaults.iterations).unwrap_or(ITERATIONS),
        )
    }

    fn backoff(&self, cli: Option<Backoff>, section: Option<Backoff>) -> Backoff {
        cli.or(section).or(self.defaults.backoff).unwrap_or_default()
    }

    pub fn mutex(&self, args: &MutexArgs) -> Result<mutex::Params> {
        let s = &self.mutex;
        let kind = args.lock.or(s.lock).unwrap_or(LockKind::Spin);
        if kind.is_shared() {
            bail!("`mutex.lock`: {kind} admits several holders at once");
        }
        Ok(mutex::Params {
            kind,
            threads: self.threads("mutex.threads", args.threads, s.threads)?,
            iterations: self.iterations("mutex.iterations", args.iterations, s.iterations)?,
            backoff: self.backoff(args.backoff, s.backoff),
        })
    }

    pub fn semaphore(&self, args: &SemaphoreArgs) -> Result<semaphore::Params> {
        let s = &self.semaphore;
        Ok(semaphore::Params {
            capacity: at_least_one(
                "semaphore.capacity",
                args.capacity.or(s.capacity).unwrap_or(CAPACITY),
            )?,
            threads: self.threads("semaphore.threads", args.threads, s.threads)?,
            iterations: self.iterations("semaphore.iterations", args.iterations, s.iterations)?,
            blocking: args.blocking || s.blocking.unwrap_or(false),
            backoff: self.backoff(args.backoff, s.backoff),
        })
    }

    pub fn barrier(&self, args: &BarrierArgs) -> Result<barrier::Params> {
        let s = &self.barrier;
        let kind = if args.blocking || s.blocking.unwrap_or(false) {
            BarrierKind::Blocking
        } else {
            BarrierKind::Spin
        };
        Ok(barrier::Params {
            participants: at_least_one(
                "barrier.participants",
                args.participants.or(s.participants).unwrap_or(PARTICIPANTS),
            )?,
            rounds: at_least_one("barrier.rounds", args.rounds.or(s.rounds).unwrap_or(ROUNDS))?,
            kind,
            backoff: self.backoff(args.backoff, s.backoff),
        })
    }

    pub fn rwlock(&self, args: &RwlockArgs) -> Result<rwlock::Params> {
        let s = &self.rwlock;
        let readers = args.readers.or(s.readers).unwrap_or(READERS);
        let writers = args.writers.or(s.writers).unwrap_or(WRITERS);
        if readers + writers == 0 {
            bail!("`rwlock.readers` and `rwlock.writers` are both 0");
        }
        Ok(rwlock::Params {
            readers,
            writers,
            iterations: self.iterations("rwlock.iterations", args.iterations, s.iterations)?,
            backoff: self.backoff(args.backoff, s.backoff),
        })
    }

    pub fn reentrant(&self, args: &ReentrantArgs) -> Result<reentrant::Params> {
        let s = &self.reentrant;
        Ok(reentrant::Params {
            depth: at_least_one("reentrant.depth", args.depth.or(s.depth).unwrap_or(DEPTH))?,
            threads: self.threads("reentrant.threads", args.threads, s.threads)?,
            iterations: self.iterations("reentrant.iterations", args.iterations, s.iterations)?,
        })
    }

    pub fn monitor(&self, args: &MonitorArgs) -> Result<monitor::Params> {
        let s = &self.monitor;
        Ok(monitor::Params {
            consumers: at_least_one(
                "monitor.consumers",
                args.consumers.or(s.consumers).unwrap_or(CONSUMERS),
            )?,
            spurious: args.spurious.or(s.spurious).unwrap_or(SPURIOUS),
        })
    }

    pub fn bench(&self, args: &BenchArgs) -> Result<bench::Params> {
        let s = &self.bench;
        let kinds = if !args.kinds.is_empty() {
            args.kinds.clone()
        } else {
            s.kinds.clone().unwrap_or_else(|| LockKind::ALL.to_vec())
        };
        if kinds.is_empty() {
            bail!("`bench.kinds` is empty");
        }
        let secs = args.duration.or(s.duration_secs).unwrap_or(DURATION_SECS);
        if secs == 0 {
            bail!("`bench.duration-secs` must be at least 1");
        }
        Ok(bench::Params {
            kinds,
            workers: at_least_one("bench.workers", args.workers.or(s.workers).unwrap_or(WORKERS))?,
            hold: args.hold.or(s.hold).unwrap_or(HOLD),
            duration: Duration::from_secs(secs),
            backoff: self.backoff(args.backoff, s.backoff),
        })
    }
}

fn at_least_one(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        bail!("`{key}` must be at least 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    const SAMPLE: &str = r#"
[defaults]
threads = 6
iterations = 500
log-level = "debug"
abort-on-violation = false
backoff = "yield"

[semaphore]
capacity = 2
threads = 8

[bench]
workers = 3
duration-secs = 2
kinds = ["spin", "rw-write", "monitor"]
backoff = "exponential"
"#;

    #[test]
    fn empty_config_uses_built_ins() {
        let config = Config::parse("").unwrap();
        let p = config.semaphore(&SemaphoreArgs::default()).unwrap();
        assert_eq!(p.capacity, 3);
        assert_eq!(p.threads, 10);
        assert_eq!(p.iterations, 10_000);
        assert!(!p.blocking);
        assert_eq!(p.backoff, Backoff::None);
    }

    #[test]
    fn section_beats_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        let p = config.semaphore(&SemaphoreArgs::default()).unwrap();
        assert_eq!(p.capacity, 2);
        assert_eq!(p.threads, 8);
        assert_eq!(p.iterations, 500);
        assert_eq!(p.backoff, Backoff::Yield);
    }

    #[test]
    fn cli_beats_section() {
        let config = Config::parse(SAMPLE).unwrap();
        let args = SemaphoreArgs {
            capacity: Some(5),
            threads: Some(2),
            ..SemaphoreArgs::default()
        };
        let p = config.semaphore(&args).unwrap();
        assert_eq!(p.capacity, 5);
        assert_eq!(p.threads, 2);
    }

    #[test]
    fn bench_section_resolves() {
        let config = Config::parse(SAMPLE).unwrap();
        let p = config.bench(&BenchArgs::default()).unwrap();
        assert_eq!(p.kinds, [LockKind::Spin, LockKind::RwWrite, LockKind::Monitor]);
        assert_eq!(p.workers, 3);
        assert_eq!(p.hold, 100);
        assert_eq!(p.duration, Duration::from_secs(2));
        assert_eq!(p.backoff, Backoff::Exponential);
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(Config::parse("[semaphore]\ncapacty = 3\n").is_err());
        assert!(Config::parse("[nonsense]\n").is_err());
    }

    #[test]
    fn zero_values_name_the_key() {
        let config = Config::parse("[defaults]\nthreads = 0\n").unwrap();
        let err = config.mutex(&MutexArgs::default()).unwrap_err().to_string();
        assert!(err.contains("mutex.threads"), "{err}");

        let config = Config::parse("[semaphore]\ncapacity = 0\n").unwrap();
        let err = config.semaphore(&SemaphoreArgs::default()).unwrap_err().to_string();
        assert!(err.contains("semaphore.capacity"), "{err}");

        let config = Config::parse("[bench]\nduration-secs = 0\n").unwrap();
        let err = config.bench(&BenchArgs::default()).unwrap_err().to_string();
        assert!(err.contains("bench.duration-secs"), "{err}");
    }

    #[test]
    fn mutex_refuses_shared_kinds() {
        let config = Config::parse("[mutex]\nlock = \"semaphore\"\n").unwrap();
        assert!(config.mutex(&MutexArgs::default()).is_err());
        let args = MutexArgs {
            lock: Some(LockKind::RwRead),
            ..MutexArgs::default()
        };
        assert!(Config::default().mutex(&args).is_err());
    }

    #[test]
    fn log_level_and_abort_follow_flags() {
        let config = Config::parse(SAMPLE).unwrap();
        let cli = Cli::parse_from(["spinward-stress", "all"]);
        assert_eq!(config.log_level(&cli), LogLevel::Debug);
        assert!(!config.abort_on_violation(&cli));

        let cli = Cli::parse_from(["spinward-stress", "-q", "all"]);
        assert_eq!(config.log_level(&cli), LogLevel::Error);

        let cli = Cli::parse_from(["spinward-stress", "-q", "--log-level", "trace", "all"]);
        assert_eq!(config.log_level(&cli), LogLevel::Trace);

        let cli = Cli::parse_from(["spinward-stress", "--no-abort", "all"]);
        assert!(!Config::default().abort_on_violation(&cli));
        let cli = Cli::parse_from(["spinward-stress", "all"]);
        assert!(Config::default().abort_on_violation(&cli));
    }
}
