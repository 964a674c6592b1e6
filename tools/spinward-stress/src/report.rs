//! Human-readable tables and JSON output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::bench::BenchResult;
use crate::scenario::ScenarioReport;

fn metrics_line(report: &ScenarioReport) -> String {
    report
        .metrics
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line for a single passing scenario.
pub fn print_scenario(report: &ScenarioReport) {
    println!(
        "{} ({}): passed in {} ms  {}",
        report.name,
        report.subject,
        report.elapsed.as_millis(),
        metrics_line(report)
    );
}

/// Summary of an `all` run; failed scenarios show their error.
pub fn print_summary(results: &[(&str, Result<ScenarioReport>)]) {
    let width = results.iter().map(|(n, _)| n.len()).max().unwrap_or(8).max(8);

    println!();
    println!(
        "  {:<width$}  {:<20}  {:>10}  {:<6}  Details",
        "Scenario", "Subject", "Time (ms)", "Status"
    );
    println!("  {:-<width$}  {:-<20}  {:->10}  {:-<6}  {:-<7}", "", "", "", "", "");

    for (name, result) in results {
        match result {
            Ok(r) => println!(
                "  {:<width$}  {:<20}  {:>10}  {:<6}  {}",
                name,
                r.subject,
                r.elapsed.as_millis(),
                "ok",
                metrics_line(r)
            ),
            Err(e) => println!(
                "  {:<width$}  {:<20}  {:>10}  {:<6}  {:#}",
                name, "-", "-", "FAILED", e
            ),
        }
    }
    println!();
}

/// Throughput table for `bench`.
pub fn print_bench_table(results: &[BenchResult]) {
    if results.is_empty() {
        println!("  No benchmark results to display.");
        return;
    }

    println!();
    println!(
        "  {:<20}  {:>7}  {:>12}  {:>14}  {:>8}",
        "Kind", "Workers", "Total", "Ops/s", "Fairness"
    );
    println!("  {:-<20}  {:->7}  {:->12}  {:->14}  {:->8}", "", "", "", "", "");

    for r in results {
        println!(
            "  {:<20}  {:>7}  {:>12}  {:>14.0}  {:>8.2}",
            r.kind.name(),
            r.workers,
            r.total,
            r.ops_per_sec(),
            r.fairness()
        );
    }
    println!();
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    out.flush()
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use spinward::{Backoff, LockKind};

    use super::*;

    #[test]
    fn json_names_kinds_in_kebab_case() {
        let results = [BenchResult {
            kind: LockKind::SpinTas,
            backoff: Backoff::Exponential,
            workers: 2,
            hold: 100,
            elapsed_ms: Duration::from_secs(1).as_millis(),
            per_worker: vec![10, 12],
            total: 22,
        }];
        let path = std::env::temp_dir().join(format!("spinward-bench-{}.json", std::process::id()));
        write_json(&path, &results[..]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["kind"], "spin-tas");
        assert_eq!(value[0]["backoff"], "exponential");
        assert_eq!(value[0]["total"], 22);
    }
}
