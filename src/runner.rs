//! Corpus driver.
//!
//! Discovers the files to convert, fans the per-file conversions out across
//! a worker pool, persists results atomically, copies override files
//! verbatim, and reports per-file outcomes. One failing file never aborts
//! the rest of the run, and nothing is ever written for a failed file.

use std::collections::HashSet;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use glob::Pattern;
use rayon::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{CasedNamePolicy, ConvertConfig};
use crate::rewrite::templates::TemplateSet;
use crate::rewrite::{FileKind, convert_source};

/// Options for one run, resolved from config file and CLI flags.
pub struct RunOptions {
    /// Directory containing the legacy sources.
    pub source_root: PathBuf,
    /// Destination tree for converted files; `None` means dry run.
    pub dest_root: Option<PathBuf>,
    /// Directory of files copied verbatim into the destination afterwards.
    pub overrides: Option<PathBuf>,
    pub config: ConvertConfig,
    /// Worker threads; `None` uses the rayon default (CPU count).
    pub threads: Option<usize>,
}

/// Outcome counters for a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub converted: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let templates = TemplateSet::compile()?;
    let policy = options.config.name_policy();

    let include = options
        .config
        .include
        .as_deref()
        .map(Pattern::new)
        .transpose()
        .context("invalid include pattern")?;
    let example_patterns = compile_patterns(&options.config.example_patterns)
        .context("invalid example pattern")?;
    let skip: HashSet<PathBuf> = options.config.skip_files.iter().map(PathBuf::from).collect();

    let (files, skipped) = discover_files(&options.source_root, include.as_ref(), &skip)?;
    info!(files = files.len(), skipped, "discovered source files");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.unwrap_or(0))
        .build()
        .context("failed to build worker pool")?;

    let results: Vec<(PathBuf, Result<()>)> = pool.install(|| {
        files
            .par_iter()
            .map(|relative| {
                let outcome =
                    convert_one(options, &templates, &policy, &example_patterns, relative);
                (relative.clone(), outcome)
            })
            .collect()
    });

    let mut summary = RunSummary {
        skipped,
        ..RunSummary::default()
    };
    for (relative, outcome) in results {
        match outcome {
            Ok(()) => {
                summary.converted += 1;
                println!("✔ {}", relative.display());
            }
            Err(err) => {
                summary.failed += 1;
                println!("✖ {} ({err:#})", relative.display());
            }
        }
    }

    if let (Some(overrides), Some(dest_root)) = (&options.overrides, &options.dest_root) {
        copy_overrides(overrides, dest_root)?;
    }

    info!(
        converted = summary.converted,
        failed = summary.failed,
        skipped = summary.skipped,
        "run complete"
    );
    Ok(summary)
}

fn convert_one(
    options: &RunOptions,
    templates: &TemplateSet,
    policy: &CasedNamePolicy,
    example_patterns: &[Pattern],
    relative: &Path,
) -> Result<()> {
    let source_path = options.source_root.join(relative);
    let source = fs::read_to_string(&source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;

    let kind = classify(example_patterns, relative);
    debug!(file = %relative.display(), ?kind, "converting");

    // A conversion bug must fail this file, not the whole run.
    let converted = catch_unwind(AssertUnwindSafe(|| {
        convert_source(&source, templates, policy, kind)
    }))
    .map_err(|_| anyhow!("conversion panicked"))??;

    if let Some(dest_root) = &options.dest_root {
        let dest_path = dest_root.join(relative);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        write_atomic(&dest_path, &converted)?;
    }
    Ok(())
}

/// Walk the source root for `.js` files, minus the deny-list and anything
/// the include filter rejects. Paths come back relative to the root, in a
/// deterministic order.
fn discover_files(
    root: &Path,
    include: Option<&Pattern>,
    skip: &HashSet<PathBuf>,
) -> Result<(Vec<PathBuf>, usize)> {
    let mut files = Vec::new();
    let mut skipped = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("js") {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?.to_path_buf();
        if skip.contains(&relative) {
            debug!(file = %relative.display(), "deny-listed, skipping");
            skipped += 1;
            continue;
        }
        if let Some(pattern) = include {
            if !pattern.matches_path(&relative) {
                skipped += 1;
                continue;
            }
        }
        files.push(relative);
    }
    Ok((files, skipped))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, glob::PatternError> {
    patterns.iter().map(|p| Pattern::new(p)).collect()
}

fn classify(example_patterns: &[Pattern], relative: &Path) -> FileKind {
    if example_patterns.iter().any(|p| p.matches_path(relative)) {
        FileKind::Example
    } else {
        FileKind::Source
    }
}

/// Write via a temp file in the destination directory followed by a rename,
/// so an interrupted run never leaves a half-written file behind.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("reclass");
    let temp = path.with_file_name(format!("{}.tmp.{}", base, Uuid::new_v4().simple()));
    fs::write(&temp, content).with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("failed to move {} into place", temp.display()))?;
    debug!(path = %path.display(), "wrote converted file");
    Ok(())
}

/// Copy auxiliary override files verbatim into the destination tree.
fn copy_overrides(overrides: &Path, dest_root: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(overrides).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(overrides)?;
        let dest = dest_root.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(entry.path(), &dest)
            .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        copied += 1;
    }
    info!(copied, "copied override files");
    Ok(copied)
}
