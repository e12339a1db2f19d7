//! The three surface syntaxes for declaring inputs.
//!
//! Each detector scans the whole text independently and either claims it or
//! passes. `SurfaceSyntax::PRIORITY` fixes the order; the first claim wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::entry::{RawEntry, is_identifier};
use super::literal::{bracket_balance, parse_literal, split_pair, split_top_level, strip_comment};
use crate::ir::Literal;

static BLOCK_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)(?:add_)?inputs\s*(?:do|\{)\s*(?:\|[^|]*\|)?\s*$").expect("block regex")
});

static STATEMENT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:add_)?inputs(?:\s+|\s*\()(.*)$").expect("statement regex"));

static BLOCK_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_]\w*[?!]?)(?:\s+|\s*\(|$)(.*)$").expect("entry regex"));

static END_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)(?:end\b|\})").expect("end regex"));

static NESTED_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdo\s*(?:\|[^|]*\|)?\s*$").expect("nested regex"));

static RESULT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*result(?:\s+|\s*\()(.*)$").expect("result regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceSyntax {
    /// `inputs do … end`, one declaration per line.
    Block,
    /// `inputs type: :attributes, element_type_declarations: {…}, required: […]`.
    KeyedMap,
    /// `inputs name: :string, age: :integer`.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub syntax: SurfaceSyntax,
    /// Line index of the `inputs` declaration.
    pub anchor: usize,
    /// Last line index belonging to the declaration.
    pub end: usize,
    pub entries: Vec<RawEntry>,
    /// Entries that could not be read at all.
    pub rejected: Vec<String>,
}

impl SurfaceSyntax {
    pub const PRIORITY: [SurfaceSyntax; 3] = [Self::Block, Self::KeyedMap, Self::Inline];

    pub fn detect(self, lines: &[&str]) -> Option<Detection> {
        match self {
            Self::Block => detect_block(lines),
            Self::KeyedMap => detect_keyed_map(lines),
            Self::Inline => detect_inline(lines),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn indent_of(s: &str) -> usize {
    s.chars().take_while(|c| c.is_whitespace()).count()
}

/// Join `lines[start]` with following lines while brackets are open or the
/// text ends in a comma. Returns the joined text and the last line used.
fn gather(lines: &[&str], start: usize, first: &str) -> (String, usize) {
    let mut text = strip_comment(first).trim().to_string();
    let mut balance = bracket_balance(&text);
    let mut idx = start;
    while (balance > 0 || text.ends_with(',') || text.ends_with('\\')) && idx + 1 < lines.len() {
        idx += 1;
        let next = strip_comment(lines[idx]).trim();
        if text.ends_with('\\') {
            text.pop();
        }
        text.push(' ');
        text.push_str(next);
        balance += bracket_balance(next);
    }
    (text, idx)
}

/// Drop one layer of wrapping parentheses from an argument list.
fn unwrap_parens(args: &str) -> &str {
    let args = args.trim();
    match args.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) if bracket_balance(inner) == 0 => inner.trim(),
        _ => args,
    }
}

/// Tokens for a value that declares a kind: `:string`, or `{ type: :string, … }`.
fn value_tokens(value: &str) -> Vec<String> {
    let value = value.trim();
    match value.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(body) => split_top_level(body, ','),
        None => match value.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(body) => split_top_level(body, ','),
            None => vec![value.to_string()],
        },
    }
}

fn statement(lines: &[&str]) -> Option<(usize, usize, String)> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        if BLOCK_OPEN.is_match(line) {
            return None;
        }
        let caps = STATEMENT_OPEN.captures(line)?;
        let first = format!("{}{}", if line.contains("inputs(") { "(" } else { "" }, &caps[1]);
        let (text, end) = gather(lines, idx, &first);
        Some((idx, end, text))
    })
}

// ————————————————————————————————————————————————————————————————————————————
// DETECTORS
// ————————————————————————————————————————————————————————————————————————————

fn detect_block(lines: &[&str]) -> Option<Detection> {
    let (anchor, base_indent) = lines.iter().enumerate().find_map(|(idx, line)| {
        BLOCK_OPEN.captures(line).map(|caps| (idx, caps[1].len()))
    })?;

    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    let mut idx = anchor + 1;
    while idx < lines.len() {
        let line = lines[idx];
        if let Some(caps) = END_LINE.captures(line) {
            if caps[1].len() <= base_indent {
                break;
            }
        }
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            idx += 1;
            continue;
        }
        let (text, last) = gather(lines, idx, stripped);
        idx = last + 1;

        let Some(caps) = BLOCK_ENTRY.captures(&text) else {
            rejected.push(text.clone());
            continue;
        };
        let name = caps[1].to_string();
        let mut rest = caps[2].trim().to_string();

        // `name :attributes do … end` or `name do … end`: collapse to a hash.
        if NESTED_OPEN.is_match(&rest) {
            let nested_indent = indent_of(line);
            while idx < lines.len() {
                let inner = lines[idx];
                idx += 1;
                if let Some(end) = END_LINE.captures(inner) {
                    if end[1].len() <= nested_indent {
                        break;
                    }
                }
            }
            let head = NESTED_OPEN.replace(&rest, "").trim().trim_end_matches(',').to_string();
            rest = head;
            if rest.is_empty() {
                rest = ":attributes".to_string();
            }
        }

        if text.contains('(') && caps[0].contains(&format!("{name}(")) {
            rest = rest.trim_end_matches(')').to_string();
        }
        if !is_identifier(&name) {
            rejected.push(text.clone());
            continue;
        }
        entries.push(RawEntry::new(name, split_top_level(&rest, ',')));
    }

    let end = idx.min(lines.len().saturating_sub(1));
    Some(Detection { syntax: SurfaceSyntax::Block, anchor, end, entries, rejected })
}

fn detect_keyed_map(lines: &[&str]) -> Option<Detection> {
    let (anchor, end, text) = statement(lines)?;
    if !text.contains("element_type_declarations") {
        return None;
    }

    let mut declarations: Vec<(String, String)> = Vec::new();
    let mut required: Option<Vec<String>> = None;
    let mut defaults: Vec<(String, String)> = Vec::new();
    let mut rejected = Vec::new();

    for part in split_top_level(unwrap_parens(&text), ',') {
        let Some((key, value)) = split_pair(&part) else {
            continue;
        };
        let body = value.trim().strip_prefix('{').and_then(|s| s.strip_suffix('}'));
        match (key.as_str(), body) {
            ("element_type_declarations", Some(body)) => {
                for item in split_top_level(body, ',') {
                    match split_pair(&item) {
                        Some(pair) => declarations.push(pair),
                        None => rejected.push(item),
                    }
                }
            }
            ("defaults", Some(body)) => {
                defaults.extend(split_top_level(body, ',').iter().filter_map(|item| split_pair(item)));
            }
            ("required", _) => {
                required = match parse_literal(&value) {
                    Some(Literal::List(names)) => {
                        Some(names.iter().filter_map(|n| n.as_name().map(str::to_string)).collect())
                    }
                    _ => {
                        rejected.push(part.clone());
                        None
                    }
                };
            }
            _ => {}
        }
    }

    let required = required.unwrap_or_default();
    let entries = declarations
        .into_iter()
        .map(|(name, value)| {
            let mut tokens = value_tokens(&value);
            if let Some((_, default)) = defaults.iter().find(|(n, _)| *n == name) {
                tokens.push(format!("default: {default}"));
            }
            RawEntry {
                listed_required: Some(required.contains(&name)),
                name,
                tokens,
            }
        })
        .collect();

    Some(Detection { syntax: SurfaceSyntax::KeyedMap, anchor, end, entries, rejected })
}

fn detect_inline(lines: &[&str]) -> Option<Detection> {
    let (anchor, end, text) = statement(lines)?;
    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    for part in split_top_level(unwrap_parens(&text), ',') {
        match split_pair(&part) {
            Some((name, value)) if is_identifier(&name) => {
                entries.push(RawEntry::new(name, value_tokens(&value)));
            }
            _ => rejected.push(part),
        }
    }
    if entries.is_empty() {
        return None;
    }
    Some(Detection { syntax: SurfaceSyntax::Inline, anchor, end, entries, rejected })
}

// ————————————————————————————————————————————————————————————————————————————
// RESULT
// ————————————————————————————————————————————————————————————————————————————

/// Tokens of the first `result` declaration at or after `from`, skipping the
/// lines of the inputs declaration. A `do` block result comes back as
/// `[":attributes"]`.
pub fn result_tokens(lines: &[&str], from: usize, skip: Option<(usize, usize)>) -> Option<Vec<String>> {
    lines.iter().enumerate().skip(from).find_map(|(idx, line)| {
        if skip.is_some_and(|(start, end)| (start..=end).contains(&idx)) {
            return None;
        }
        let caps = RESULT_OPEN.captures(line)?;
        let rest = caps[1].trim();
        if rest.starts_with('=') {
            return None;
        }
        if rest == "do" || rest.starts_with("do ") || rest.starts_with("do|") || (rest.starts_with('{') && !rest.contains(':')) {
            return Some(vec![":attributes".to_string()]);
        }
        let first = if line.contains("result(") { format!("({rest}") } else { rest.to_string() };
        let (text, _) = gather(lines, idx, &first);
        Some(split_top_level(unwrap_parens(&text), ','))
    })
}
