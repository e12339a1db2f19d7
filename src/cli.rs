//! CLI: convert one file, convert a tree, or list the mapping tables.
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::batch::{self, BatchReport, TreeOptions, tree::DEFAULT_INCLUDE};
use crate::parse::{self, camel_case};
use crate::tables::MappingTables;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// convert Ruby command input declarations into Python/Pydantic declarations
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// more log output (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// convert a single source file (or '-' for stdin)
    Convert(ConvertOut),
    /// convert every matching file under a directory
    Batch(BatchOut),
    /// print the effective kind and constraint tables
    Kinds(TablesSettings),
}

#[derive(Args, Debug, Clone)]
struct TablesSettings {
    /// JSON file extending the built-in kind/constraint tables
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ConvertOut {
    /// source file, or '-' for stdin
    input: String,

    /// output .py file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// unit name when the source declares no class (defaults to the file stem)
    #[arg(long)]
    unit_name: Option<String>,

    #[command(flatten)]
    tables: TablesSettings,

    /// print fields, dropped constraints and warnings to stderr
    #[arg(long)]
    report: bool,
}

#[derive(clap::Parser, Debug)]
struct BatchOut {
    /// source directory
    source: PathBuf,

    /// destination directory (defaults to the source directory)
    #[arg(long)]
    dest: Option<PathBuf>,

    /// glob, relative to the source directory
    #[arg(long, default_value = DEFAULT_INCLUDE)]
    include: String,

    #[command(flatten)]
    tables: TablesSettings,

    /// summary format
    #[arg(long, value_enum, default_value_t = StatsFormat::Table)]
    stats: StatsFormat,

    /// write the summary here instead of stdout
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// convert and report without writing any files
    #[arg(long)]
    dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StatsFormat {
    Table,
    Json,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TablesSettings {
    fn load(&self) -> anyhow::Result<MappingTables> {
        match self.config.as_ref() {
            None => Ok(MappingTables::default()),
            Some(path) => Ok(MappingTables::from_config_file(path)?),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Default `env_logger` filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Convert(target) => target.run(),
            Command::Batch(target) => target.run(),
            Command::Kinds(settings) => {
                print!("{}", render_tables(&settings.load()?));
                Ok(())
            }
        }
    }
}

impl ConvertOut {
    fn run(&self) -> anyhow::Result<()> {
        let started_at = Utc::now();
        let tables = self.tables.load()?;
        let (label, text) = read_input(&self.input)?;

        let fallback = match self.unit_name.as_ref() {
            Some(name) => name.clone(),
            None => camel_case(&file_stem(&label)),
        };
        let parser = parse::Parser::new().with_fallback_name(fallback);
        let (set, syntax) = parser
            .parse_detailed(&text)
            .with_context(|| format!("nothing to convert in {label}"))?;
        let outcome = batch::converted(&label, &set, syntax, &tables);
        let Some(rendered) = outcome.rendered() else {
            bail!("conversion of {label} was skipped");
        };

        match self.out.as_ref() {
            Some(out) => write_output(out, &rendered.text)?,
            None => print!("{}", rendered.text),
        }
        if self.report {
            eprint!("{}", BatchReport::new(started_at, vec![outcome]).render_table());
        }
        Ok(())
    }
}

impl BatchOut {
    fn run(&self) -> anyhow::Result<()> {
        let tables = self.tables.load()?;
        let options = TreeOptions {
            source: self.source.clone(),
            dest: self.dest.clone(),
            include: self.include.clone(),
            dry_run: self.dry_run,
        };
        let tree = batch::convert_tree(&options, &tables)
            .with_context(|| format!("batch conversion of {} failed", self.source.display()))?;

        let summary = match self.stats {
            StatsFormat::Table => tree.report.render_table(),
            StatsFormat::Json => tree.report.to_json_pretty().context("failed to serialize batch report")? + "\n",
        };
        match self.stats_out.as_ref() {
            Some(path) => write_output(path, &summary)?,
            None => print!("{summary}"),
        }
        if self.dry_run {
            for path in &tree.written {
                eprintln!("{} {}", "would write".yellow(), path.display());
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_input(input: &str) -> anyhow::Result<(String, String)> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
        return Ok(("<stdin>".to_string(), text));
    }
    let text = std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?;
    Ok((input.to_string(), text))
}

fn file_stem(label: &str) -> String {
    Path::new(label)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn render_tables(tables: &MappingTables) -> String {
    let mut out = format!("{}\n", "kinds".bold());
    for (key, mapping) in tables.kinds.iter() {
        let imports: Vec<String> = mapping.imports.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "  {:<12} {:<24} {:<10} {}\n",
            key,
            mapping.type_expr,
            format!("{:?}", mapping.family).to_lowercase(),
            imports.join(", ")
        ));
    }
    out.push_str(&format!("{}\n", "constraints".bold()));
    for (shape, template) in tables.constraints.iter() {
        let imports: Vec<String> = template.imports.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "  {:<12} {:<24} {:<10} {}\n",
            shape,
            template.template,
            format!("{:?}", template.placement).to_lowercase(),
            imports.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CommandLineInterface::command().debug_assert();
    }

    #[test]
    fn verbosity_maps_to_filter() {
        let cli = CommandLineInterface::parse_from(["decl-port", "-vv", "kinds"]);
        assert_eq!(cli.log_filter(), "debug");
        let cli = CommandLineInterface::parse_from(["decl-port", "kinds"]);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn batch_defaults() {
        let cli = CommandLineInterface::parse_from(["decl-port", "batch", "app/commands", "--stats", "json"]);
        match cli.cmd {
            Command::Batch(batch) => {
                assert_eq!(batch.include, DEFAULT_INCLUDE);
                assert_eq!(batch.stats, StatsFormat::Json);
                assert!(batch.dest.is_none());
                assert!(!batch.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tables_listing_ends_with_fallback() {
        colored::control::set_override(false);
        let listing = render_tables(&MappingTables::default());
        assert!(listing.contains("  email        EmailStr"));
        assert!(listing.contains("pydantic.EmailStr"));
        let kinds_section = listing.split("constraints").next().unwrap();
        assert!(kinds_section.trim_end().lines().last().unwrap().contains("duck"));
    }
}
