//! Ruby command-DSL input declarations → Python/Pydantic declaration modules.
//!
//! `parse` reads one command unit into a `DeclarationSet`, `codegen` renders it
//! against a `MappingTables`, and `batch` runs both over many units.
pub mod batch;
pub mod cli;
pub mod codegen;
pub mod diagnostics;
pub mod ir;
pub mod parse;
pub mod path_de;
pub mod tables;

pub use batch::{BatchReport, BatchStats, SourceUnit, UnitOutcome, convert_unit, run_batch};
pub use codegen::{Rendered, generate};
pub use diagnostics::{NoDeclarationFound, Warning, WarningKind};
pub use ir::{DeclarationSet, DeclaredKind, FieldDeclaration, Literal};
pub use parse::{Parser, parse};
pub use tables::MappingTables;
