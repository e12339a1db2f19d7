//! Aggregate counts and the printable batch report.
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use colored::Colorize;
use log::info;
use serde::Serialize;

use super::UnitOutcome;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub fields: usize,
    pub validations: usize,
    pub dropped: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: BatchStats,
    pub outcomes: Vec<UnitOutcome>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl BatchStats {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a UnitOutcome>) -> Self {
        outcomes.into_iter().fold(Self::default(), |mut stats, outcome| {
            stats.processed += 1;
            stats.warnings += outcome.warnings().len();
            match outcome.rendered() {
                Some(rendered) => {
                    stats.succeeded += 1;
                    stats.fields += rendered.fields.len();
                    stats.validations += rendered.validations;
                    stats.dropped += rendered.dropped.len();
                }
                None => stats.skipped += 1,
            }
            stats
        })
    }
}

impl BatchReport {
    /// Stamp `finished_at` and fold the stats.
    pub fn new(started_at: DateTime<Utc>, outcomes: Vec<UnitOutcome>) -> Self {
        let stats = BatchStats::from_outcomes(&outcomes);
        info!(
            "batch finished: {} processed, {} converted, {} skipped",
            stats.processed, stats.succeeded, stats.skipped
        );
        Self { started_at, finished_at: Utc::now(), stats, outcomes }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable table, one row per unit plus its warnings, then totals.
    pub fn render_table(&self) -> String {
        let width = self
            .outcomes
            .iter()
            .map(|o| o.source().len())
            .max()
            .unwrap_or(0)
            .max("source".len());
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}",
            format!("{:<6}  {:<width$}  {:<24}  {:>6}  {:>11}", "status", "source", "unit", "fields", "validations")
                .bold()
        );
        for outcome in &self.outcomes {
            match outcome {
                UnitOutcome::Converted { source, unit_name, rendered, .. } => {
                    let status = if rendered.warnings.is_empty() { "ok".green() } else { "warn".yellow() };
                    let _ = writeln!(
                        out,
                        "{:<6}  {:<width$}  {:<24}  {:>6}  {:>11}",
                        status,
                        source,
                        unit_name,
                        rendered.fields.len(),
                        rendered.validations
                    );
                }
                UnitOutcome::Skipped { source, .. } => {
                    let _ = writeln!(out, "{:<6}  {:<width$}", "skip".red(), source);
                }
            }
            for warning in outcome.warnings() {
                let _ = writeln!(out, "        {}", warning.to_string().dimmed());
            }
        }
        let s = &self.stats;
        let elapsed = self.finished_at - self.started_at;
        let _ = writeln!(
            out,
            "{} processed, {} converted, {} skipped; {} fields, {} validations, {} dropped, {} warnings ({} ms)",
            s.processed.to_string().bold(),
            s.succeeded.to_string().green(),
            s.skipped.to_string().red(),
            s.fields,
            s.validations,
            s.dropped,
            s.warnings,
            elapsed.num_milliseconds()
        );
        out
    }
}
