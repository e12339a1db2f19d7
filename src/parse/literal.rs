//! Ruby literal scanning: top-level comma splitting and literal decoding.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::Literal;

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d[\d_]*(\.\d[\d_]*)?([eE][+-]?\d+)?$").expect("number regex")
});

static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:([A-Za-z_]\w*[?!]?)$").expect("symbol regex"));

/// Character-level lexer state shared by the scanners below. String and
/// regex bodies are opaque; brackets outside them are counted.
#[derive(Debug, Default)]
struct Scanner {
    depth: i32,
    quote: Option<char>,
    escaped: bool,
    prev_significant: Option<char>,
}

impl Scanner {
    /// Advance over `c`; `true` when it is code rather than literal content
    /// or an opening delimiter.
    fn step(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
                self.prev_significant = Some(c);
            }
            return false;
        }
        match c {
            '"' | '\'' => {
                self.quote = Some(c);
                return false;
            }
            // `/` opens a regex only where a value can start.
            '/' if matches!(self.prev_significant, None | Some(',' | ':' | '(' | '[' | '{' | '>' | '=')) => {
                self.quote = Some('/');
                return false;
            }
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => self.depth -= 1,
            _ => {}
        }
        if !c.is_whitespace() {
            self.prev_significant = Some(c);
        }
        true
    }
}

/// Split on `sep` at bracket depth zero, outside string and regex literals.
pub fn split_top_level(src: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();

    for c in src.chars() {
        if scanner.step(c) && c == sep && scanner.depth == 0 {
            parts.push(current.trim().to_string());
            current.clear();
            continue;
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Net bracket depth of a line, ignoring string and regex contents.
pub fn bracket_balance(src: &str) -> i32 {
    let mut scanner = Scanner::default();
    for c in src.chars() {
        if scanner.step(c) && c == '#' {
            break;
        }
    }
    scanner.depth
}

/// Drop a trailing `# comment`, leaving `#` inside strings and regexes alone.
pub fn strip_comment(line: &str) -> &str {
    let mut scanner = Scanner::default();
    for (i, c) in line.char_indices() {
        if scanner.step(c) && c == '#' {
            return &line[..i];
        }
    }
    line
}

/// Split a `key: value`, `:key => value` or `"key" => value` pair.
pub fn split_pair(src: &str) -> Option<(String, String)> {
    let src = src.trim();
    if let Some(idx) = find_top_level(src, "=>") {
        let key = src[..idx].trim();
        let value = src[idx + 2..].trim();
        let key = match parse_literal(key)? {
            Literal::Symbol(s) | Literal::Str(s) => s,
            _ => return None,
        };
        return Some((key, value.to_string()));
    }
    // `key: value` where key is a bare identifier or a quoted string.
    let (key, rest) = if src.starts_with('"') || src.starts_with('\'') {
        let end = closing_quote(src)?;
        let rest = src[end + 1..].strip_prefix(':')?;
        (unquote(&src[..=end])?, rest)
    } else {
        let end = src.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '?' || c == '!'))?;
        if end == 0 {
            return None;
        }
        let rest = src[end..].strip_prefix(':')?;
        // `a::B` is a constant path, not a pair.
        if rest.starts_with(':') && !rest.starts_with(": ") {
            let after = &rest[1..];
            if after.chars().next().is_some_and(|c| c.is_alphabetic()) {
                return None;
            }
        }
        (src[..end].to_string(), rest)
    };
    Some((key, rest.trim().to_string()))
}

fn find_top_level(src: &str, needle: &str) -> Option<usize> {
    let mut scanner = Scanner::default();
    for (i, c) in src.char_indices() {
        let depth = scanner.depth;
        if scanner.step(c) && depth == 0 && src[i..].starts_with(needle) {
            return Some(i);
        }
    }
    None
}

fn closing_quote(src: &str) -> Option<usize> {
    let q = src.chars().next()?;
    let mut escaped = false;
    for (i, c) in src.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == q {
            return Some(i);
        }
    }
    None
}

fn unquote(src: &str) -> Option<String> {
    let q = src.chars().next()?;
    if !(q == '"' || q == '\'') || src.len() < 2 || !src.ends_with(q) {
        return None;
    }
    let body = &src[1..src.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match (q, chars.next()) {
            (_, None) => out.push('\\'),
            ('\'', Some(n @ ('\'' | '\\'))) => out.push(n),
            ('\'', Some(n)) => {
                out.push('\\');
                out.push(n);
            }
            (_, Some('n')) => out.push('\n'),
            (_, Some('t')) => out.push('\t'),
            (_, Some('r')) => out.push('\r'),
            (_, Some('0')) => out.push('\0'),
            (_, Some(n)) => out.push(n),
        }
    }
    Some(out)
}

/// Decode a Ruby literal. `None` for anything that would need evaluation.
pub fn parse_literal(src: &str) -> Option<Literal> {
    let src = src.trim();
    match src {
        "" => return None,
        "nil" => return Some(Literal::Nil),
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        _ => {}
    }
    if NUMBER.is_match(src) {
        let text = src.trim_start_matches('+').replace('_', "");
        return Some(Literal::Number(text));
    }
    if let Some(caps) = SYMBOL.captures(src) {
        return Some(Literal::Symbol(caps[1].to_string()));
    }
    // :"quoted symbol"
    if let Some(rest) = src.strip_prefix(':') {
        if rest.starts_with('"') || rest.starts_with('\'') {
            return unquote(rest).map(Literal::Symbol);
        }
    }
    if src.starts_with('"') || src.starts_with('\'') {
        return match closing_quote(src) {
            Some(end) if end == src.len() - 1 => unquote(src).map(Literal::Str),
            _ => None,
        };
    }
    if let Some(words) = src.strip_prefix("%w[").or_else(|| src.strip_prefix("%w(")) {
        let body = words.strip_suffix(']').or_else(|| words.strip_suffix(')'))?;
        return Some(Literal::List(
            body.split_whitespace().map(|w| Literal::Str(w.to_string())).collect(),
        ));
    }
    if let Some(words) = src.strip_prefix("%i[").or_else(|| src.strip_prefix("%i(")) {
        let body = words.strip_suffix(']').or_else(|| words.strip_suffix(')'))?;
        return Some(Literal::List(
            body.split_whitespace().map(|w| Literal::Symbol(w.to_string())).collect(),
        ));
    }
    if let Some(body) = src.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let items = split_top_level(body, ',')
            .iter()
            .map(|item| parse_literal(item))
            .collect::<Option<Vec<_>>>()?;
        return Some(Literal::List(items));
    }
    if let Some(body) = src.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let mut entries = Vec::new();
        for item in split_top_level(body, ',') {
            let (key, value) = split_pair(&item)?;
            entries.push((key, parse_literal(&value)?));
        }
        return Some(Literal::Map(entries));
    }
    None
}

/// Body of a `/regex/flags` literal, or of a plain string pattern.
pub fn parse_pattern(src: &str) -> Option<String> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix('/') {
        let end = rest.rfind('/')?;
        let flags = &rest[end + 1..];
        if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        return Some(rest[..end].to_string());
    }
    if let Some(rest) = src.strip_prefix("%r{") {
        let end = rest.rfind('}')?;
        return Some(rest[..end].to_string());
    }
    match parse_literal(src)? {
        Literal::Str(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_brackets_and_strings() {
        let parts = split_top_level(r#"name :string, one_of: ["a", "b,c"], default: "x, y""#, ',');
        assert_eq!(parts, vec![
            "name :string".to_string(),
            r#"one_of: ["a", "b,c"]"#.to_string(),
            r#"default: "x, y""#.to_string(),
        ]);
    }

    #[test]
    fn split_skips_regex_bodies() {
        let parts = split_top_level(r"code :string, matches: /^[a-z]{2,3}$/", ',');
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], r"matches: /^[a-z]{2,3}$/");
    }

    #[test]
    fn numbers_drop_separators() {
        assert_eq!(parse_literal("1_000"), Some(Literal::Number("1000".into())));
        assert_eq!(parse_literal("-2.5"), Some(Literal::Number("-2.5".into())));
    }

    #[test]
    fn strings_decode_escapes() {
        assert_eq!(parse_literal(r#""a\"b""#), Some(Literal::Str("a\"b".into())));
        assert_eq!(parse_literal(r"'it\'s'"), Some(Literal::Str("it's".into())));
        assert_eq!(parse_literal(r"'a\nb'"), Some(Literal::Str("a\\nb".into())));
    }

    #[test]
    fn collections_decode_recursively() {
        let lit = parse_literal(r#"{ name: "x", :tags => [:a, 1], "k" => nil }"#).unwrap();
        assert_eq!(
            lit,
            Literal::Map(vec![
                ("name".into(), Literal::Str("x".into())),
                ("tags".into(), Literal::List(vec![Literal::Symbol("a".into()), Literal::Number("1".into())])),
                ("k".into(), Literal::Nil),
            ])
        );
        assert_eq!(
            parse_literal("%w[admin user]"),
            Some(Literal::List(vec![Literal::Str("admin".into()), Literal::Str("user".into())]))
        );
    }

    #[test]
    fn expressions_are_untranslatable() {
        assert_eq!(parse_literal("-> { Time.now }"), None);
        assert_eq!(parse_literal("SOME_CONSTANT"), None);
        assert_eq!(parse_literal(r#""a" + "b""#), None);
    }

    #[test]
    fn pairs_accept_both_hash_styles() {
        assert_eq!(split_pair("min: 0"), Some(("min".into(), "0".into())));
        assert_eq!(split_pair(":max => 10"), Some(("max".into(), "10".into())));
        assert_eq!(split_pair(r#""label": "x""#), Some(("label".into(), r#""x""#.into())));
        assert_eq!(split_pair(":string"), None);
        assert_eq!(split_pair("Foo::Bar"), None);
    }

    #[test]
    fn patterns_pass_through() {
        assert_eq!(parse_pattern(r"/^\d+$/i"), Some(r"^\d+$".to_string()));
        assert_eq!(parse_pattern(r#""^[a-z]+$""#), Some("^[a-z]+$".to_string()));
    }

    #[test]
    fn comments_stripped_outside_strings() {
        assert_eq!(strip_comment(r#"name :string # the name"#), "name :string ");
        assert_eq!(strip_comment(r##"tag :string, default: "#1""##), r##"tag :string, default: "#1""##);
    }

    #[test]
    fn hash_inside_regex_is_not_a_comment() {
        let line = r"color :string, pattern: /\A#[0-9a-f]{6}\z/ # hex";
        assert_eq!(strip_comment(line), r"color :string, pattern: /\A#[0-9a-f]{6}\z/ ");
    }

    #[test]
    fn brackets_inside_regex_do_not_count() {
        assert_eq!(bracket_balance(r"area :string, matches: /\A[(]\d+/"), 0);
        assert_eq!(bracket_balance(r"tags :array, one_of: [/x(/,"), 1);
        assert_eq!(bracket_balance("total = a / (b"), 1);
    }

    #[test]
    fn pair_arrow_inside_regex_is_ignored() {
        assert_eq!(
            split_pair(r"matches: /a=>b/"),
            Some(("matches".to_string(), r"/a=>b/".to_string()))
        );
    }
}
