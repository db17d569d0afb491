//! status-coverage: status breakdown over log-analyzer JSON-lines output
//!
//! Usage:
//!   log-analyzer --job-dir runs/a --job-dir runs/b | status-coverage
//!   status-coverage out1.jsonl out2.jsonl          # read files instead of stdin
//!   status-coverage out.jsonl --json               # machine-readable report
//!
//! Identical records are counted once (blake3 of the line). Error records
//! (`"error": true`) and lines that are not runs are skipped.

use clap::Parser;
use log_analyzer::Status;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "status-coverage", version, about = "Status breakdown of analyzed runs")]
struct Cli {
    /// JSON-lines files written by log-analyzer. Reads stdin when empty.
    files: Vec<PathBuf>,

    /// Print the report as one JSON object.
    #[arg(long)]
    json: bool,
}

/// The slice of a run record this tool needs.
#[derive(Debug, Deserialize)]
struct RunRecord {
    status: Status,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct Report {
    records: usize,
    unique: usize,
    skipped: usize,
    total: usize,
    unknown: usize,
    unknown_pct: f64,
    breakdown: BTreeMap<String, usize>,
}

fn tally<'a, I: IntoIterator<Item = &'a str>>(lines: I) -> Report {
    let mut seen = HashSet::new();
    let mut report = Report::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        report.records += 1;
        if !seen.insert(blake3::hash(line.as_bytes())) {
            continue;
        }
        report.unique += 1;

        match serde_json::from_str::<RunRecord>(line) {
            Ok(rec) => {
                *report.breakdown.entry(rec.status.as_str().to_string()).or_insert(0) += 1;
                report.total += 1;
            }
            Err(_) => report.skipped += 1,
        }
    }

    report.unknown = report.breakdown.get(Status::Unknown.as_str()).copied().unwrap_or(0);
    report.unknown_pct = if report.total == 0 {
        0.0
    } else {
        report.unknown as f64 / report.total as f64 * 100.0
    };
    report
}

fn read_input(cli: &Cli) -> String {
    if cli.files.is_empty() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
            eprintln!("status-coverage: cannot read stdin: {}", e);
            process::exit(2);
        });
        return buf;
    }

    let mut all = String::new();
    for path in &cli.files {
        let contents = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("status-coverage: cannot read {}: {}", path.display(), e);
            process::exit(2);
        });
        all.push_str(&contents);
        all.push('\n');
    }
    all
}

fn main() {
    let cli = Cli::parse();
    let input = read_input(&cli);
    let report = tally(input.lines());

    if cli.json {
        match serde_json::to_string(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("status-coverage: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Read {} records ({} unique by content)", report.records, report.unique);
    if report.skipped > 0 {
        println!("Skipped {} error or non-run records", report.skipped);
    }
    println!("Total runs counted: {}", report.total);
    println!("Unknown runs: {}", report.unknown);
    println!("Unknown percentage: {:.2}%", report.unknown_pct);
    let breakdown: Vec<String> = report
        .breakdown
        .iter()
        .map(|(status, n)| format!("{}={}", status, n))
        .collect();
    println!("Breakdown: {}", breakdown.join(", "));
}
