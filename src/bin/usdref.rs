//! Inspect reference composition of usda layers.
//!
//! `show` prints the composed prim hierarchy of one layer with resolved
//! attribute values. `check` opens every usda file under a directory and
//! reports the layers whose references fail to compose.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use usdref::sdf::{self, LayerStore};
use usdref::Stage;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Extra directories to resolve relative asset paths against.
    #[arg(long = "search-path", short = 'I', env = "USDREF_SEARCH_PATH", value_delimiter = ':', global = true)]
    search_paths: Vec<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the composed prims of a layer.
    Show {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Only print this prim and its descendants.
        #[arg(long, short = 'p')]
        prim: Option<String>,

        /// Evaluate attributes at this time instead of the default.
        #[arg(long, short = 't')]
        time: Option<f64>,

        /// Also print the arcs contributing to each prim.
        #[arg(long)]
        arcs: bool,
    },
    /// Compose every usda file under a path and report composition errors.
    Check {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Stop on first failing file.
        #[arg(long, short = 'f')]
        fail_fast: bool,

        /// Only show summary statistics.
        #[arg(long, short = 's')]
        summary: bool,

        /// Skip files matching these patterns (can be specified multiple times).
        #[arg(long = "skip", short = 'x')]
        skip_patterns: Vec<String>,
    },
}

/// Result of composing one file.
#[derive(Debug)]
enum CheckResult {
    Success { prims: usize, layers: usize },
    Failed { errors: Vec<String> },
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    let outcome = match &args.command {
        Command::Show { file, prim, time, arcs } => {
            show(&args.search_paths, file, prim.as_deref(), *time, *arcs).map(|_| true)
        }
        Command::Check {
            path,
            fail_fast,
            summary,
            skip_patterns,
        } => check(&args.search_paths, path, *fail_fast, *summary, skip_patterns),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn open_stage(search_paths: &[PathBuf], file: &Path) -> Result<Stage> {
    let store = LayerStore::with_search_paths(search_paths.iter().cloned());
    let root = file
        .to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", file.display()))?;
    Stage::open(store, root)
}

fn show(search_paths: &[PathBuf], file: &Path, prim: Option<&str>, time: Option<f64>, arcs: bool) -> Result<()> {
    let mut stage = open_stage(search_paths, file)?;
    let root = prim
        .map(sdf::Path::new)
        .transpose()
        .context("Invalid prim path")?;

    let paths = stage.traverse();
    anyhow::ensure!(
        root.as_ref().map_or(true, |root| paths.contains(root)),
        "No prim at <{}>",
        prim.unwrap_or_default()
    );

    for path in paths {
        if root.as_ref().is_some_and(|root| !path.has_prefix(root)) {
            continue;
        }
        let indent = "  ".repeat(path.depth().saturating_sub(1));
        let Some(prim) = stage.prim(&path) else {
            continue;
        };

        let type_name = prim.type_name().map(|t| format!(" {t}")).unwrap_or_default();
        println!("{indent}{}{type_name} {path}", prim.specifier().as_str());

        if arcs {
            for node in prim.nodes().iter().filter(|node| !node.local) {
                let layer = node.stack.last().map(String::as_str).unwrap_or_default();
                println!("{indent}  <- @{layer}@<{}>", node.path);
            }
        }

        let mut names: Vec<&str> = prim.properties().names().collect();
        names.sort_unstable();
        for name in names {
            let Some(attr) = prim.attribute(name) else {
                continue;
            };
            let value = match time {
                Some(time) => attr.value_at(time),
                None => attr.value(),
            };
            match value {
                Some(value) => println!("{indent}  {} {name} = {value}", attr.type_name()),
                None => println!("{indent}  {} {name}", attr.type_name()),
            }
        }

        for error in prim.errors() {
            println!("{indent}  ! {error}");
        }
    }

    Ok(())
}

fn should_skip(path: &Path, patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|p| path_str.contains(p))
}

fn collect_usda_files(path: &Path, skip_patterns: &[String]) -> Vec<PathBuf> {
    if path.is_file() {
        if should_skip(path, skip_patterns) {
            vec![]
        } else {
            vec![path.to_path_buf()]
        }
    } else {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| {
                let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
                ext.eq_ignore_ascii_case("usda")
            })
            .filter(|p| !should_skip(p, skip_patterns))
            .collect()
    }
}

fn check_file(search_paths: &[PathBuf], file: &Path) -> CheckResult {
    let mut stage = match open_stage(search_paths, file) {
        Ok(stage) => stage,
        Err(err) => {
            return CheckResult::Failed {
                errors: vec![format!("{err:#}")],
            }
        }
    };

    let prims = stage.traverse().len();
    let errors: Vec<String> = stage
        .all_composition_errors()
        .iter()
        .map(ToString::to_string)
        .collect();

    if errors.is_empty() {
        CheckResult::Success {
            prims,
            layers: stage.store().len(),
        }
    } else {
        CheckResult::Failed { errors }
    }
}

fn check(search_paths: &[PathBuf], root: &Path, fail_fast: bool, summary: bool, skip_patterns: &[String]) -> Result<bool> {
    let start = Instant::now();
    let files = collect_usda_files(root, skip_patterns);
    anyhow::ensure!(!files.is_empty(), "No usda files found in: {}", root.display());

    println!("Checking {} usda files...\n", files.len());

    let progress = if !summary {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let passed = AtomicUsize::new(0);
    let failures: Mutex<Vec<(PathBuf, Vec<String>)>> = Mutex::new(Vec::new());
    let fail_fast_triggered = AtomicBool::new(false);

    files.par_iter().for_each(|file| {
        if fail_fast && fail_fast_triggered.load(Ordering::Relaxed) {
            return;
        }

        let result = check_file(search_paths, file);

        if let Some(ref pb) = progress {
            pb.inc(1);
        }

        let rel_path = file.strip_prefix(root).unwrap_or(file).to_path_buf();
        match result {
            CheckResult::Success { prims, layers } => {
                passed.fetch_add(1, Ordering::Relaxed);
                log::debug!("[PASS] {} ({prims} prims, {layers} layers)", rel_path.display());
            }
            CheckResult::Failed { errors } => {
                if let Ok(mut failures) = failures.lock() {
                    failures.push((rel_path, errors));
                }
                if fail_fast {
                    fail_fast_triggered.store(true, Ordering::Relaxed);
                }
            }
        }
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut failures = failures.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    failures.sort();

    if !summary {
        for (path, errors) in &failures {
            println!("[FAIL] {}", path.display());
            for error in errors {
                println!("       {error}");
            }
        }
    }

    let total = files.len();
    let pass_count = passed.load(Ordering::Relaxed);
    println!();
    println!("================================================================================");
    println!("Composition Summary");
    println!("================================================================================");
    println!("Total files:  {total}");
    println!("Passed:       {pass_count} ({:.1}%)", pass_count as f64 / total as f64 * 100.0);
    println!("Failed:       {}", failures.len());
    println!("\nTime elapsed: {:.2}s", start.elapsed().as_secs_f64());

    Ok(failures.is_empty())
}
