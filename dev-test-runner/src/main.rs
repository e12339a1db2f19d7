//! Golden-file runner: converts `fixtures/*.rb` and diffs against `fixtures/*.py`.
//!
//! `--bless` rewrites the golden files from the current output.
//! `--json` prints the per-fixture results as JSON instead of text.
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use decl_port::{MappingTables, UnitOutcome, convert_unit};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct FixtureResult {
    fixture: String,
    status: Status,
    warnings: Vec<String>,
    /// First differing line (1-based) when the output does not match.
    #[serde(skip_serializing_if = "Option::is_none")]
    first_diff: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Fail,
    Blessed,
    Missing,
    Skipped,
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn sources(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "rb"))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn first_diff(actual: &str, expected: &str) -> Option<usize> {
    let mut a = actual.lines();
    let mut e = expected.lines();
    let mut line = 1;
    loop {
        match (a.next(), e.next()) {
            (None, None) => return (actual != expected).then_some(line),
            (x, y) if x != y => return Some(line),
            _ => line += 1,
        }
    }
}

fn run_fixture(source: &Path, tables: &MappingTables, bless: bool) -> anyhow::Result<FixtureResult> {
    let name = source.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let text = std::fs::read_to_string(source).with_context(|| format!("failed to read {}", source.display()))?;
    let golden = source.with_extension("py");

    let rendered = match convert_unit(&name, &text, tables) {
        UnitOutcome::Converted { rendered, .. } => rendered,
        UnitOutcome::Skipped { reason, .. } => {
            return Ok(FixtureResult {
                fixture: name,
                status: Status::Skipped,
                warnings: vec![reason.to_string()],
                first_diff: None,
            });
        }
    };
    let warnings = rendered.warnings.iter().map(ToString::to_string).collect();

    if bless {
        std::fs::write(&golden, &rendered.text).with_context(|| format!("failed to write {}", golden.display()))?;
        return Ok(FixtureResult { fixture: name, status: Status::Blessed, warnings, first_diff: None });
    }
    let Ok(expected) = std::fs::read_to_string(&golden) else {
        return Ok(FixtureResult { fixture: name, status: Status::Missing, warnings, first_diff: None });
    };
    let diff = first_diff(&rendered.text, &expected);
    let status = if diff.is_none() { Status::Pass } else { Status::Fail };
    Ok(FixtureResult { fixture: name, status, warnings, first_diff: diff })
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let bless = args.iter().any(|a| a == "--bless");
    let json = args.iter().any(|a| a == "--json");

    let tables = MappingTables::default();
    let results = sources(&fixtures_dir())?
        .iter()
        .map(|source| run_fixture(source, &tables, bless))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            match result.first_diff {
                Some(line) => println!("{:?}\t{} (first difference at line {line})", result.status, result.fixture),
                None => println!("{:?}\t{}", result.status, result.fixture),
            }
            for warning in &result.warnings {
                println!("\t  {warning}");
            }
        }
    }

    let failed = results.iter().filter(|r| matches!(r.status, Status::Fail | Status::Missing)).count();
    if failed > 0 {
        bail!("{failed} of {} fixtures failed", results.len());
    }
    Ok(())
}
