//! Batch orchestration: Parser → Generator over many units.
//!
//! Every unit ends as a `UnitOutcome`; nothing a single unit does can abort
//! the batch. Aggregate counts are folded from the outcomes afterwards.
pub mod report;
pub mod tree;

use std::path::Path;

use chrono::Utc;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::codegen::{self, Rendered};
use crate::diagnostics::Warning;
use crate::ir::DeclarationSet;
use crate::parse::{self, Parser, SurfaceSyntax};
use crate::tables::MappingTables;

pub use report::{BatchReport, BatchStats};
pub use tree::{BatchError, TreeOptions, TreeReport, convert_tree};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One named piece of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Label used in reports. Its file stem seeds the fallback unit name.
    pub name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Converted {
        source: String,
        unit_name: String,
        syntax: Option<SurfaceSyntax>,
        #[serde(flatten)]
        rendered: Rendered,
    },
    Skipped {
        source: String,
        reason: Warning,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl UnitOutcome {
    pub fn skipped(source: impl Into<String>, reason: Warning) -> Self {
        Self::Skipped { source: source.into(), reason }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Converted { source, .. } | Self::Skipped { source, .. } => source,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted { .. })
    }

    pub fn rendered(&self) -> Option<&Rendered> {
        match self {
            Self::Converted { rendered, .. } => Some(rendered),
            Self::Skipped { .. } => None,
        }
    }

    /// Warnings attached to this unit, including a skip reason.
    pub fn warnings(&self) -> Vec<&Warning> {
        match self {
            Self::Converted { rendered, .. } => rendered.warnings.iter().collect(),
            Self::Skipped { reason, .. } => vec![reason],
        }
    }
}

/// Parse and render one unit. Never fails; an unconvertible unit is skipped.
pub fn convert_unit(source: &str, text: &str, tables: &MappingTables) -> UnitOutcome {
    let parser = Parser::new().with_fallback_name(fallback_name(source));
    match parser.parse_detailed(text) {
        Ok((set, syntax)) => converted(source, &set, syntax, tables),
        Err(err) => {
            warn!("{source}: skipped, {err}");
            UnitOutcome::skipped(source, err.as_warning())
        }
    }
}

/// Render an already parsed set as a converted outcome.
pub fn converted(
    source: &str,
    set: &DeclarationSet,
    syntax: Option<SurfaceSyntax>,
    tables: &MappingTables,
) -> UnitOutcome {
    let rendered = codegen::generate(set, tables);
    debug!(
        "{source}: converted `{}` ({} fields, {} warnings)",
        set.qualified_name(),
        rendered.fields.len(),
        rendered.warnings.len()
    );
    UnitOutcome::Converted {
        source: source.to_string(),
        unit_name: set.unit_name.clone(),
        syntax,
        rendered,
    }
}

/// Convert every unit in parallel. Outcomes keep the input order.
pub fn run_batch(units: &[SourceUnit], tables: &MappingTables) -> BatchReport {
    let started_at = Utc::now();
    let outcomes: Vec<UnitOutcome> = units
        .par_iter()
        .map(|unit| convert_unit(&unit.name, &unit.text, tables))
        .collect();
    BatchReport::new(started_at, outcomes)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn fallback_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match parse::camel_case(&stem) {
        name if name.is_empty() => parse::DEFAULT_UNIT_NAME.to_string(),
        name => name,
    }
}
