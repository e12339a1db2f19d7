//! Enclosing unit name and module path for a field block.

use once_cell::sync::Lazy;
use regex::Regex;

static MODULE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)module\s+([A-Z][\w:]*)").expect("module regex"));

static CLASS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)class\s+([A-Z][\w:]*)(?:\s*<\s*([A-Z][\w:]*))?").expect("class regex")
});

static END_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)end\b").expect("end regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    pub unit_name: String,
    pub module_path: Vec<String>,
    /// Line index of the class declaration.
    pub line: usize,
}

#[derive(Debug)]
struct Frame {
    indent: usize,
    segments: Vec<String>,
}

fn indent_of(s: &str) -> usize {
    s.chars().take_while(|c| c.is_whitespace()).count()
}

/// Nearest class declared at or before `anchor`; the first class anywhere
/// when `anchor` is `None`.
pub fn find_unit(lines: &[&str], anchor: Option<usize>) -> Option<UnitContext> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut found: Option<UnitContext> = None;
    let limit = anchor.unwrap_or(lines.len().saturating_sub(1));

    for (idx, line) in lines.iter().enumerate() {
        if idx > limit {
            break;
        }
        if let Some(caps) = END_LINE.captures(line) {
            let indent = caps[1].len();
            while stack.last().is_some_and(|f| f.indent >= indent) {
                stack.pop();
            }
            continue;
        }
        if let Some(caps) = MODULE_LINE.captures(line) {
            stack.push(Frame {
                indent: indent_of(line),
                segments: caps[2].split("::").map(str::to_string).collect(),
            });
            continue;
        }
        if let Some(caps) = CLASS_LINE.captures(line) {
            let mut segments: Vec<String> = caps[2].split("::").map(str::to_string).collect();
            let unit_name = segments.pop().unwrap_or_default();
            let mut module_path: Vec<String> =
                stack.iter().flat_map(|f| f.segments.iter().cloned()).collect();
            module_path.extend(segments.iter().cloned());
            let ctx = UnitContext { unit_name, module_path, line: idx };
            // Single-line `class X < Y; end` has no body to nest into.
            if !line.contains("; end") {
                let mut frame_segments = segments;
                frame_segments.push(ctx.unit_name.clone());
                stack.push(Frame { indent: indent_of(line), segments: frame_segments });
            }
            if anchor.is_none() {
                return Some(ctx);
            }
            found = Some(ctx);
        }
    }
    found
}

/// `create_user` / `create-user` → `CreateUser`.
pub fn camel_case(stem: &str) -> String {
    stem.split(|c: char| c == '_' || c == '-' || c == ' ' || c == '.')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
module Billing
  module Users
    class CreateUser < Foobara::Command
      inputs do
        name :string
      end
    end
  end

  class Refund < Foobara::Command
    inputs amount: :integer
  end
end
";

    #[test]
    fn nested_modules_form_path() {
        let lines: Vec<&str> = SOURCE.lines().collect();
        let ctx = find_unit(&lines, Some(3)).unwrap();
        assert_eq!(ctx.unit_name, "CreateUser");
        assert_eq!(ctx.module_path, vec!["Billing", "Users"]);
    }

    #[test]
    fn closed_modules_leave_the_path() {
        let lines: Vec<&str> = SOURCE.lines().collect();
        let ctx = find_unit(&lines, Some(10)).unwrap();
        assert_eq!(ctx.unit_name, "Refund");
        assert_eq!(ctx.module_path, vec!["Billing"]);
    }

    #[test]
    fn namespaced_class_name_splits() {
        let lines = vec!["class Admin::Users::Ban < Command", "end"];
        let ctx = find_unit(&lines, None).unwrap();
        assert_eq!(ctx.unit_name, "Ban");
        assert_eq!(ctx.module_path, vec!["Admin", "Users"]);
    }

    #[test]
    fn camel_case_from_file_stem() {
        assert_eq!(camel_case("create_user"), "CreateUser");
        assert_eq!(camel_case("send-email"), "SendEmail");
    }
}
