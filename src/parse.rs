//! Declaration parser: Ruby command source text → `DeclarationSet`.
//!
//! Best-effort and total. Unrecognized text is skipped, unknown kinds are kept
//! as `Custom`, and the only non-success outcome is `NoDeclarationFound`.
pub mod context;
pub mod entry;
pub mod literal;
pub mod syntax;

use std::collections::HashSet;

use log::debug;

use crate::diagnostics::{NoDeclarationFound, Warning, WarningKind};
use crate::ir::{DeclarationSet, DeclaredKind};

pub use context::camel_case;
pub use syntax::SurfaceSyntax;

pub const DEFAULT_UNIT_NAME: &str = "AnonymousCommand";

#[derive(Debug, Clone)]
pub struct Parser {
    fallback_name: String,
}

impl Default for Parser {
    fn default() -> Self {
        Self { fallback_name: DEFAULT_UNIT_NAME.to_string() }
    }
}

/// Parse with the default fallback unit name.
pub fn parse(text: &str) -> Result<DeclarationSet, NoDeclarationFound> {
    Parser::default().parse(text)
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit name used when fields are found but no class declaration is.
    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if entry::is_identifier(&name) {
            self.fallback_name = name;
        }
        self
    }

    pub fn parse(&self, text: &str) -> Result<DeclarationSet, NoDeclarationFound> {
        self.parse_detailed(text).map(|(set, _)| set)
    }

    /// Like `parse`, also reporting which surface syntax matched.
    pub fn parse_detailed(
        &self,
        text: &str,
    ) -> Result<(DeclarationSet, Option<SurfaceSyntax>), NoDeclarationFound> {
        if text.trim().is_empty() {
            return Err(NoDeclarationFound::new("input is empty"));
        }
        let lines: Vec<&str> = text.lines().collect();

        let detection = SurfaceSyntax::PRIORITY.iter().find_map(|syntax| syntax.detect(&lines));
        let unit = context::find_unit(&lines, detection.as_ref().map(|d| d.anchor));

        let has_entries = detection.as_ref().is_some_and(|d| !d.entries.is_empty());
        if unit.is_none() && !has_entries {
            return Err(NoDeclarationFound::new(
                "no command class and no inputs declaration",
            ));
        }

        let mut warnings = Vec::new();
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        let syntax = detection.as_ref().map(|d| d.syntax);
        let span = detection.as_ref().map(|d| (d.anchor, d.end));

        if let Some(detection) = detection {
            debug!("inputs declared with {:?} syntax at line {}", detection.syntax, detection.anchor + 1);
            for rejected in detection.rejected {
                warnings.push(Warning::new(
                    WarningKind::MalformedSyntax,
                    format!("unreadable input declaration `{rejected}` skipped"),
                ));
            }
            for raw in detection.entries {
                if !seen.insert(raw.name.clone()) {
                    warnings.push(Warning::on_field(
                        WarningKind::MalformedSyntax,
                        raw.name.clone(),
                        "duplicate field name; later declaration ignored",
                    ));
                    continue;
                }
                fields.push(entry::normalize_entry(raw, &mut warnings));
            }
        }

        let (unit_name, module_path, from) = match unit {
            Some(ctx) => (ctx.unit_name, ctx.module_path, ctx.line),
            None => (self.fallback_name.clone(), Vec::new(), 0),
        };

        let (result_kind, result_element_kind) = match syntax::result_tokens(&lines, from, span) {
            Some(tokens) => entry::kind_of_tokens(&tokens),
            None => (DeclaredKind::Untyped, None),
        };

        Ok((
            DeclarationSet {
                unit_name,
                module_path,
                fields,
                result_kind,
                result_element_kind,
                warnings,
            },
            syntax,
        ))
    }
}
