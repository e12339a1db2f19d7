//! Directory-tree conversion: discover source files, convert, write `.py` siblings.
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use log::{debug, info};
use rayon::prelude::*;
use thiserror::Error;

use super::{BatchReport, UnitOutcome, convert_unit};
use crate::diagnostics::{Warning, WarningKind};
use crate::tables::MappingTables;

pub const DEFAULT_INCLUDE: &str = "**/*.rb";
pub const TARGET_EXTENSION: &str = "py";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub source: PathBuf,
    /// Defaults to `source`.
    pub dest: Option<PathBuf>,
    /// Glob relative to `source`.
    pub include: String,
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("source directory `{}` does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("invalid include pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("failed to write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct TreeReport {
    pub report: BatchReport,
    /// Files written (or that would be, on a dry run), in outcome order.
    pub written: Vec<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TreeOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: None,
            include: DEFAULT_INCLUDE.to_string(),
            dry_run: false,
        }
    }

    pub fn dest_root(&self) -> &Path {
        self.dest.as_deref().unwrap_or(&self.source)
    }

    /// Output path for a discovered source file.
    pub fn target_path(&self, relative: &Path) -> PathBuf {
        self.dest_root().join(relative).with_extension(TARGET_EXTENSION)
    }

    /// A discovered path relative to `source`. Glob drops a leading `./`,
    /// so both sides are compared without `.` components.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let path = without_cur_dir(path);
        let root = without_cur_dir(&self.source);
        path.strip_prefix(&root).map(Path::to_path_buf).unwrap_or_else(|_| path.clone())
    }
}

/// Matching files under `source`, sorted.
pub fn discover(options: &TreeOptions) -> Result<Vec<PathBuf>, BatchError> {
    if !options.source.is_dir() {
        return Err(BatchError::MissingSource(options.source.clone()));
    }
    let root = glob::Pattern::escape(&options.source.to_string_lossy());
    let pattern = format!("{}/{}", root.trim_end_matches('/'), options.include);
    let entries = glob::glob(&pattern).map_err(|source| BatchError::Pattern {
        pattern: options.include.clone(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                debug!("skipping unreadable path {}: {err}", err.path().display());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Convert every matching file. Unreadable files become skipped outcomes;
/// only a missing source, a bad pattern or a failed write is an error.
pub fn convert_tree(options: &TreeOptions, tables: &MappingTables) -> Result<TreeReport, BatchError> {
    let started_at = Utc::now();
    let paths = discover(options)?;
    info!("converting {} files under {}", paths.len(), options.source.display());

    let outcomes: Vec<(PathBuf, UnitOutcome)> = paths
        .par_iter()
        .map(|path| {
            let relative = options.relative_path(path);
            let label = relative.to_string_lossy().replace('\\', "/");
            let outcome = match std::fs::read_to_string(path) {
                Ok(text) => convert_unit(&label, &text, tables),
                Err(err) => UnitOutcome::skipped(
                    label,
                    Warning::new(WarningKind::NoDeclarationFound, format!("unreadable source: {err}")),
                ),
            };
            (options.target_path(&relative), outcome)
        })
        .collect();

    let mut written = Vec::new();
    for (target, outcome) in &outcomes {
        let Some(rendered) = outcome.rendered() else {
            continue;
        };
        if !options.dry_run {
            write_file(target, &rendered.text)?;
        }
        debug!("{} → {}", outcome.source(), target.display());
        written.push(target.clone());
    }

    let report = BatchReport::new(started_at, outcomes.into_iter().map(|(_, o)| o).collect());
    Ok(TreeReport { report, written })
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

fn write_file(path: &Path, contents: &str) -> Result<(), BatchError> {
    let wrap = |source| BatchError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, contents).map_err(wrap)
}
