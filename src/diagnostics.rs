//! Per-unit warnings and the one parse outcome that is not a declaration set.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NoDeclarationFound,
    UnrecognizedKind,
    InvalidConstraintCombination,
    MalformedSyntax,
    /// An extra `key: value` modifier with no registered template.
    UnsupportedModifier,
}

impl WarningKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoDeclarationFound => "no-declaration-found",
            Self::UnrecognizedKind => "unrecognized-kind",
            Self::InvalidConstraintCombination => "invalid-constraint-combination",
            Self::MalformedSyntax => "malformed-syntax",
            Self::UnsupportedModifier => "unsupported-modifier",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A recorded, non-fatal problem attached to one unit's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub field: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self { kind, field: None, message: message.into() }
    }

    pub fn on_field(kind: WarningKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind, field: Some(field.into()), message: message.into() }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "[{}] `{}`: {}", self.kind, field, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Input held nothing convertible. Batch callers skip the unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no declaration found: {reason}")]
pub struct NoDeclarationFound {
    pub reason: String,
}

impl NoDeclarationFound {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn as_warning(&self) -> Warning {
        Warning::new(WarningKind::NoDeclarationFound, self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_display_names_field() {
        let w = Warning::on_field(WarningKind::UnrecognizedKind, "amount", "no mapping for `money`");
        assert_eq!(w.to_string(), "[unrecognized-kind] `amount`: no mapping for `money`");
    }

    #[test]
    fn no_declaration_found_converts_to_warning() {
        let err = NoDeclarationFound::new("input is empty");
        let w = err.as_warning();
        assert_eq!(w.kind, WarningKind::NoDeclarationFound);
        assert!(w.field.is_none());
        assert_eq!(err.to_string(), "no declaration found: input is empty");
    }
}
