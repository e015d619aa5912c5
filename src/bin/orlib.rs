//! Checks OR-Library assignment instances against their published optima.
//!
//! ```text
//! orlib [-q] <problem file> <answer file>
//! ```
//!
//! Prints `PASS` when the solved cost matches the recorded answer and exits
//! nonzero on `FAIL` or on any read error. `-q` suppresses everything but
//! the verdict.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use assignment::orlib;

struct Options {
    quiet: bool,
    problem: PathBuf,
    answers: PathBuf,
}

fn parse_args() -> Result<Options> {
    let mut quiet = false;
    let mut paths = Vec::new();
    for arg in env::args().skip(1) {
        if !quiet && paths.is_empty() && arg == "-q" {
            quiet = true;
        } else {
            paths.push(PathBuf::from(arg));
        }
    }

    let mut paths = paths.into_iter();
    match (paths.next(), paths.next(), paths.next()) {
        (Some(problem), Some(answers), None) => Ok(Options {
            quiet,
            problem,
            answers,
        }),
        _ => bail!("usage: orlib [-q] <problem file> <answer file>"),
    }
}

fn run() -> Result<bool> {
    let options = parse_args()?;

    let costs = orlib::read_problem(&options.problem)
        .with_context(|| format!("reading {}", options.problem.display()))?;
    let reference = orlib::lookup_answer(&options.answers, &options.problem)
        .with_context(|| format!("reading {}", options.answers.display()))?;

    let n = costs.nrows();
    if !options.quiet {
        println!("Read {n} x {n} cost matrix");
        println!("Solving");
    }

    let mut pairs = Vec::with_capacity(n);
    let total = assignment::solve(&costs, &mut pairs)?;

    if !options.quiet {
        println!("Minimum cost: {total}");
        println!("Assignment:");
        for (row, col) in &pairs {
            println!("  {row} -> {col}");
        }
    }

    Ok((total - reference).abs() < orlib::ANSWER_TOLERANCE)
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(true) => {
            println!("PASS");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("FAIL");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
