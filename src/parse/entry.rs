//! One normalization path from a raw field entry to a `FieldDeclaration`.
//!
//! Every surface syntax reduces its entries to `RawEntry` (a name plus the
//! comma-separated tokens after it) so kind and modifier handling lives here
//! and nowhere else.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::literal::{parse_literal, parse_pattern, split_pair};
use crate::diagnostics::{Warning, WarningKind};
use crate::ir::{Bounds, DeclaredKind, FieldDeclaration, Literal};

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("ident regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub tokens: Vec<String>,
    /// Keyed-map syntax only: whether the name appears in the `required` list.
    pub listed_required: Option<bool>,
}

impl RawEntry {
    pub fn new(name: impl Into<String>, tokens: Vec<String>) -> Self {
        Self { name: name.into(), tokens, listed_required: None }
    }
}

pub fn is_identifier(name: &str) -> bool {
    IDENT.is_match(name)
}

/// Kind named by a token: `:string`, `"string"` or a bare `string`.
fn kind_token(token: &str) -> Option<DeclaredKind> {
    match parse_literal(token) {
        Some(Literal::Symbol(s)) | Some(Literal::Str(s)) => Some(DeclaredKind::from_token(&s)),
        _ if is_identifier(token.trim()) => Some(DeclaredKind::from_token(token)),
        _ => None,
    }
}

fn is_flag(token: &str, flag: &str) -> bool {
    matches!(parse_literal(token), Some(Literal::Symbol(s)) if s == flag)
}

/// Kind and element kind only, for `result` declarations.
pub fn kind_of_tokens(tokens: &[String]) -> (DeclaredKind, Option<DeclaredKind>) {
    let mut kind = None;
    let mut element = None;
    for (i, token) in tokens.iter().enumerate() {
        if let Some((key, value)) = split_pair(token) {
            match key.as_str() {
                "type" => kind = kind_token(&value),
                "element_type" => element = kind_token(&value),
                _ => {}
            }
        } else if i == 0 {
            kind = match parse_literal(token) {
                Some(Literal::Symbol(s)) => Some(DeclaredKind::from_token(&s)),
                _ => None,
            };
        }
    }
    (kind.unwrap_or(DeclaredKind::Untyped), element)
}

/// Build a field from a raw entry. Problems are pushed to `warnings` and the
/// affected attribute is left unset.
pub fn normalize_entry(entry: RawEntry, warnings: &mut Vec<Warning>) -> FieldDeclaration {
    let RawEntry { name, tokens, listed_required } = entry;
    let mut field = FieldDeclaration::new(name.clone(), DeclaredKind::Untyped);
    let mut explicit_required: Option<bool> = None;
    let mut kind: Option<DeclaredKind> = None;
    let mut declared_default = false;
    let (mut min, mut max) = (None, None);
    let (mut min_length, mut max_length) = (None, None);

    let malformed = |warnings: &mut Vec<Warning>, message: String| {
        warnings.push(Warning::on_field(WarningKind::MalformedSyntax, name.clone(), message));
    };

    for (i, token) in tokens.iter().enumerate() {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if is_flag(token, "required") {
            explicit_required = Some(true);
            continue;
        }
        if let Some((key, value)) = split_pair(token) {
            match key.as_str() {
                "type" => kind = kind_token(&value),
                "required" => match parse_literal(&value).and_then(|l| l.as_bool()) {
                    Some(b) => explicit_required = Some(b),
                    None => malformed(warnings, format!("`required:` expects true or false, got `{value}`")),
                },
                "min" | "max" => match parse_literal(&value) {
                    Some(Literal::Number(n)) => {
                        if key == "min" { min = Some(n) } else { max = Some(n) }
                    }
                    _ => malformed(warnings, format!("`{key}:` expects a number, got `{value}`")),
                },
                "min_length" | "max_length" => match parse_literal(&value).and_then(|l| l.as_length()) {
                    Some(n) => {
                        if key == "min_length" { min_length = Some(n) } else { max_length = Some(n) }
                    }
                    None => malformed(warnings, format!("`{key}:` expects a non-negative integer, got `{value}`")),
                },
                "one_of" | "in" => match parse_literal(&value) {
                    Some(Literal::List(values)) => field.allowed_values = Some(values),
                    _ => malformed(warnings, format!("`{key}:` expects a literal list, got `{value}`")),
                },
                "default" => {
                    declared_default = true;
                    match parse_literal(&value) {
                        Some(lit) => field.default_value = Some(lit),
                        None => malformed(
                            warnings,
                            format!("default `{value}` is not a plain literal; rendered without a default"),
                        ),
                    }
                }
                "element_type" | "element_type_declarations" => match kind_token(&value) {
                    Some(k) => field.element_kind = Some(k),
                    None => malformed(warnings, format!("`{key}:` expects a kind, got `{value}`")),
                },
                "pattern" | "matches" => match parse_pattern(&value) {
                    Some(p) => field.pattern = Some(p),
                    None => malformed(warnings, format!("`{key}:` expects a regex or string, got `{value}`")),
                },
                "description" => match parse_literal(&value) {
                    Some(Literal::Str(s)) => field.description = Some(s),
                    _ => malformed(warnings, format!("`description:` expects a string, got `{value}`")),
                },
                _ => match parse_literal(&value) {
                    Some(lit) => field.extra.push((key, lit)),
                    None => debug!("`{name}`: ignoring modifier `{key}: {value}`"),
                },
            }
            continue;
        }
        match parse_literal(token) {
            Some(Literal::Symbol(s)) if i == 0 && kind.is_none() => kind = Some(DeclaredKind::from_token(&s)),
            Some(Literal::Str(s)) if field.description.is_none() => field.description = Some(s),
            _ => debug!("`{name}`: ignoring token `{token}`"),
        }
    }

    field.declared_kind = kind.unwrap_or(DeclaredKind::Untyped);
    field.numeric_bounds = Bounds::from_parts(min, max);
    field.length_bounds = Bounds::from_parts(min_length, max_length);

    let required = explicit_required.or(listed_required).unwrap_or(false);
    field.required = if declared_default {
        if required {
            malformed(warnings, "declared required with a default; treated as optional".to_string());
        }
        false
    } else {
        required
    };
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, tokens: &[&str]) -> RawEntry {
        RawEntry::new(name, tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn block_entry_with_all_modifiers() {
        let mut warnings = Vec::new();
        let field = normalize_entry(
            entry("role", &[":string", r#"one_of: ["admin", "user"]"#, r#"default: "user""#, r#""Account role""#]),
            &mut warnings,
        );
        assert!(warnings.is_empty());
        assert_eq!(field.declared_kind, DeclaredKind::String);
        assert!(!field.required);
        assert_eq!(field.default_value, Some(Literal::Str("user".into())));
        assert_eq!(field.allowed_values.as_ref().map(Vec::len), Some(2));
        assert_eq!(field.description.as_deref(), Some("Account role"));
    }

    #[test]
    fn missing_kind_is_untyped() {
        let mut warnings = Vec::new();
        let field = normalize_entry(entry("payload", &[":required"]), &mut warnings);
        assert_eq!(field.declared_kind, DeclaredKind::Untyped);
        assert!(field.required);
    }

    #[test]
    fn default_wins_over_required_flag() {
        let mut warnings = Vec::new();
        let field = normalize_entry(entry("n", &[":integer", ":required", "default: 3"]), &mut warnings);
        assert!(!field.required);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MalformedSyntax);
    }

    #[test]
    fn untranslatable_default_still_makes_field_optional() {
        let mut warnings = Vec::new();
        let field = normalize_entry(
            entry("at", &[":datetime", "default: -> { Time.now }"]),
            &mut warnings,
        );
        assert!(!field.required);
        assert!(field.default_value.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn listed_required_yields_to_explicit_flag() {
        let mut warnings = Vec::new();
        let mut raw = entry("a", &[":string", "required: false"]);
        raw.listed_required = Some(true);
        assert!(!normalize_entry(raw, &mut warnings).required);

        let mut raw = entry("b", &[":string"]);
        raw.listed_required = Some(true);
        assert!(normalize_entry(raw, &mut warnings).required);
    }

    #[test]
    fn unknown_modifiers_are_kept_or_ignored() {
        let mut warnings = Vec::new();
        let field = normalize_entry(
            entry("price", &[":integer", "multiple_of: 5", "sensitive: some_call()", ":strip"]),
            &mut warnings,
        );
        assert!(warnings.is_empty());
        assert_eq!(field.extra, vec![("multiple_of".to_string(), Literal::Number("5".into()))]);
    }

    #[test]
    fn hash_style_type_key() {
        let mut warnings = Vec::new();
        let field = normalize_entry(entry("age", &["type: :integer", "min: 0"]), &mut warnings);
        assert_eq!(field.declared_kind, DeclaredKind::Integer);
        assert_eq!(field.numeric_bounds.unwrap().min.as_deref(), Some("0"));
    }

    #[test]
    fn result_tokens() {
        let tokens = vec![":array".to_string(), "element_type: :integer".to_string()];
        assert_eq!(kind_of_tokens(&tokens), (DeclaredKind::Array, Some(DeclaredKind::Integer)));
        assert_eq!(kind_of_tokens(&[]), (DeclaredKind::Untyped, None));
    }
}
