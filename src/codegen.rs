//! Declaration generator: `DeclarationSet` → Python/Pydantic module text.
//!
//! Pure and total. Problems become warnings on the output; invalid
//! constraints are dropped, unknown kinds fall back to the untyped mapping.
//! Output is byte-identical for identical input and tables.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::Serialize;

use crate::diagnostics::{Warning, WarningKind};
use crate::ir::{DeclarationSet, DeclaredKind, FieldDeclaration, Literal};
use crate::tables::{Import, KindFamily, KindMapping, MappingTables, Placement, shape};

const INDENT: &str = "    ";
const REQUIRED_MARKER: &str = "...";

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// `BaseModel` attributes a field of the same name would shadow.
const BASE_MODEL_MEMBERS: &[&str] = &[
    "construct", "copy", "dict", "from_orm", "json", "parse_file", "parse_obj", "parse_raw", "schema",
    "schema_json", "update_forward_refs", "validate",
];

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A constraint left out of the rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedConstraint {
    pub field: String,
    pub constraint: String,
    pub reason: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    #[serde(skip)]
    pub text: String,
    /// Field names in rendered order.
    pub fields: Vec<String>,
    pub dropped: Vec<DroppedConstraint>,
    pub warnings: Vec<Warning>,
    /// Constraint annotations actually rendered.
    pub validations: usize,
}

pub struct Codegen<'t> {
    tables: &'t MappingTables,
    unit: String,
    imports: BTreeMap<String, BTreeSet<String>>,
    warnings: Vec<Warning>,
    dropped: Vec<DroppedConstraint>,
    fields: Vec<String>,
    validations: usize,
    out: String,
}

/// Render one declaration set.
pub fn generate(set: &DeclarationSet, tables: &MappingTables) -> Rendered {
    let mut cg = Codegen::new(tables);
    cg.emit(set);
    cg.into_rendered()
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'t> Codegen<'t> {
    pub fn new(tables: &'t MappingTables) -> Self {
        Self {
            tables,
            unit: String::new(),
            imports: BTreeMap::new(),
            warnings: Vec::new(),
            dropped: Vec::new(),
            fields: Vec::new(),
            validations: 0,
            out: String::new(),
        }
    }

    pub fn emit(&mut self, set: &DeclarationSet) {
        let tables = self.tables;
        let target = &tables.target;
        self.unit = set.qualified_name();
        debug!("rendering `{}` with {} fields", self.unit, set.fields.len());

        let lines: Vec<String> = set.fields.iter().map(|f| self.field_line(f)).collect();
        let result = self.type_expr(&set.result_kind, set.result_element_kind.as_ref(), None);

        self.use_imports(&target.container_base.imports);
        self.use_imports(&target.unit_base.imports);

        let inputs = format!("{}{}", set.unit_name, target.container_suffix);
        let unit_base = target.unit_base.expr.replace("{inputs}", &inputs).replace("{result}", &result);

        let mut out = String::new();
        out.push_str(&format!("# Converted from {}\n\n", set.qualified_name()));
        for (module, names) in &self.imports {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            out.push_str(&format!("from {module} import {}\n", names.join(", ")));
        }
        out.push_str("\n\n");
        out.push_str(&format!("class {inputs}({}):\n", target.container_base.expr));
        if lines.is_empty() {
            out.push_str(&format!("{INDENT}pass\n"));
        }
        for line in &lines {
            out.push_str(&format!("{INDENT}{line}\n"));
        }
        out.push_str("\n\n");
        out.push_str(&format!("class {}({unit_base}):\n", set.unit_name));
        out.push_str(&format!("{INDENT}def {}(self) -> {result}:\n", target.placeholder_method));
        out.push_str(&format!(
            "{INDENT}{INDENT}raise NotImplementedError({})\n",
            python_str(&target.placeholder_message)
        ));

        for warning in &set.warnings {
            warn!("{}: {warning}", self.unit);
        }
        let mut warnings = set.warnings.clone();
        warnings.append(&mut self.warnings);
        self.warnings = warnings;
        self.out.push_str(&out);
    }

    pub fn into_rendered(self) -> Rendered {
        Rendered {
            text: self.out,
            fields: self.fields,
            dropped: self.dropped,
            warnings: self.warnings,
            validations: self.validations,
        }
    }

    fn use_imports(&mut self, imports: &[Import]) {
        for import in imports {
            self.imports.entry(import.module.clone()).or_default().insert(import.name.clone());
        }
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}: {warning}", self.unit);
        self.warnings.push(warning);
    }

    fn drop_constraint(&mut self, field: &str, constraint: &str, reason: WarningKind, message: String) {
        self.dropped.push(DroppedConstraint {
            field: field.to_string(),
            constraint: constraint.to_string(),
            reason,
        });
        self.warn(Warning::on_field(reason, field, message));
    }

    /// Mapping for a kind, falling back (with a warning) when unregistered.
    fn resolve(&mut self, kind: &DeclaredKind, field: Option<&str>) -> KindMapping {
        let tables = self.tables;
        let kinds = &tables.kinds;
        let mapping = match kinds.lookup(kind) {
            Some(mapping) => mapping.clone(),
            None => {
                let fallback = kinds.fallback().clone();
                let message = format!(
                    "kind `{}` has no mapping; rendered as `{}`",
                    kind.key(),
                    fallback.type_expr
                );
                match field {
                    Some(field) => self.warn(Warning::on_field(WarningKind::UnrecognizedKind, field, message)),
                    None => self.warn(Warning::new(WarningKind::UnrecognizedKind, format!("result {message}"))),
                }
                fallback
            }
        };
        self.use_imports(&mapping.imports);
        mapping
    }

    /// Full type expression with `{element}` filled in.
    fn type_expr(&mut self, kind: &DeclaredKind, element: Option<&DeclaredKind>, field: Option<&str>) -> String {
        let mapping = self.resolve(kind, field);
        if !mapping.type_expr.contains("{element}") {
            return mapping.type_expr;
        }
        let element_expr = match element {
            Some(element) => self.resolve(element, field).type_expr,
            None => self.resolve(&DeclaredKind::Untyped, field).type_expr,
        };
        // nested collections without their own element kind
        let element_expr = if element_expr.contains("{element}") {
            let any = self.resolve(&DeclaredKind::Untyped, field).type_expr;
            element_expr.replace("{element}", &any)
        } else {
            element_expr
        };
        mapping.type_expr.replace("{element}", &element_expr)
    }

    /// Apply one constraint template. `false` when the shape has no template.
    fn apply(&mut self, key: &str, value: &str, values: &str, ty: &mut String, args: &mut Vec<String>) -> bool {
        let Some(template) = self.tables.constraints.get(key).cloned() else {
            return false;
        };
        self.use_imports(&template.imports);
        let filled = template.fill(ty, value, values);
        match template.placement {
            Placement::Argument => args.push(filled),
            Placement::Type => *ty = filled,
        }
        true
    }

    fn field_line(&mut self, f: &FieldDeclaration) -> String {
        let family = self.tables.kinds.lookup(&f.declared_kind).unwrap_or(self.tables.kinds.fallback()).family;

        let element = match (&f.element_kind, family) {
            (Some(element), KindFamily::Collection) => Some(element),
            (Some(element), _) => {
                self.drop_constraint(
                    &f.name,
                    "element_type",
                    WarningKind::InvalidConstraintCombination,
                    format!("element type `{}` on non-collection kind `{}` dropped", element.key(), f.declared_kind.key()),
                );
                None
            }
            (None, _) => None,
        };
        let mut ty = self.type_expr(&f.declared_kind, element, Some(&f.name));
        let mut args: Vec<String> = Vec::new();
        let mut validations = 0;

        if let Some(bounds) = &f.numeric_bounds {
            if family == KindFamily::Numeric {
                for (key, value) in [(shape::MIN, &bounds.min), (shape::MAX, &bounds.max)] {
                    if let Some(value) = value {
                        if self.apply(key, value, value, &mut ty, &mut args) {
                            validations += 1;
                        }
                    }
                }
            } else {
                self.drop_constraint(
                    &f.name,
                    "numeric_bounds",
                    WarningKind::InvalidConstraintCombination,
                    format!("min/max on non-numeric kind `{}` dropped", f.declared_kind.key()),
                );
            }
        }

        if let Some(bounds) = &f.length_bounds {
            if family == KindFamily::Text {
                for (key, value) in [(shape::MIN_LENGTH, bounds.min), (shape::MAX_LENGTH, bounds.max)] {
                    if let Some(value) = value {
                        let value = value.to_string();
                        if self.apply(key, &value, &value, &mut ty, &mut args) {
                            validations += 1;
                        }
                    }
                }
            } else {
                self.drop_constraint(
                    &f.name,
                    "length_bounds",
                    WarningKind::InvalidConstraintCombination,
                    format!("min_length/max_length on non-string kind `{}` dropped", f.declared_kind.key()),
                );
            }
        }

        if let Some(pattern) = &f.pattern {
            if family == KindFamily::Text {
                let value = python_pattern(pattern);
                if self.apply(shape::PATTERN, &value, &value, &mut ty, &mut args) {
                    validations += 1;
                }
            } else {
                self.drop_constraint(
                    &f.name,
                    "pattern",
                    WarningKind::InvalidConstraintCombination,
                    format!("pattern on non-string kind `{}` dropped", f.declared_kind.key()),
                );
            }
        }

        if let Some(values) = &f.allowed_values {
            let items: Vec<String> = values.iter().map(python_literal).collect();
            let list = format!("[{}]", items.join(", "));
            if self.apply(shape::ONE_OF, &list, &items.join(", "), &mut ty, &mut args) {
                validations += 1;
            }
        }

        if let Some(description) = &f.description {
            let value = python_str(description);
            self.apply(shape::DESCRIPTION, &value, &value, &mut ty, &mut args);
        }

        for (key, literal) in &f.extra {
            let value = python_literal(literal);
            let values = match literal {
                Literal::List(items) => items.iter().map(python_literal).collect::<Vec<_>>().join(", "),
                _ => value.clone(),
            };
            if self.apply(key, &value, &values, &mut ty, &mut args) {
                validations += 1;
            } else {
                self.drop_constraint(
                    &f.name,
                    key,
                    WarningKind::UnsupportedModifier,
                    format!("modifier `{key}` has no registered template; dropped"),
                );
            }
        }

        let name = if needs_alias(&f.name) {
            args.push(format!("alias={}", python_str(&f.name)));
            format!("{}_", f.name)
        } else {
            f.name.clone()
        };

        if !f.required {
            let optional = self.tables.target.optional.clone();
            self.use_imports(&optional.imports);
            ty = optional.expr.replace("{type}", &ty);
        }

        let value = match (&f.default_value, f.required) {
            (Some(default), _) => self.value_with(&format!("default={}", python_literal(default)), python_literal(default), &args),
            (None, true) => self.value_with(REQUIRED_MARKER, String::new(), &args),
            (None, false) => self.value_with("default=None", "None".to_string(), &args),
        };

        self.validations += validations;
        self.fields.push(f.name.clone());
        format!("{name}: {ty} = {value}")
    }

    /// `Field(first, args…)`, or `bare` when there is nothing to annotate.
    fn value_with(&mut self, first: &str, bare: String, args: &[String]) -> String {
        if args.is_empty() && !bare.is_empty() {
            return bare;
        }
        let call = self.tables.target.field_call.clone();
        self.use_imports(&call.imports);
        let mut parts = vec![first.to_string()];
        parts.extend(args.iter().cloned());
        format!("{}({})", call.expr, parts.join(", "))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PYTHON LITERALS
// ————————————————————————————————————————————————————————————————————————————

pub fn python_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Raw string when the body allows it, so regex escapes read unchanged.
/// Names rendered as `name_` with an `alias` back to the original.
fn needs_alias(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name) || BASE_MODEL_MEMBERS.contains(&name) || name.starts_with("model_")
}

pub fn python_pattern(pattern: &str) -> String {
    let raw_ok = !pattern.contains('"')
        && !pattern.ends_with('\\')
        && !pattern.chars().any(|c| c.is_control());
    if raw_ok { format!("r\"{pattern}\"") } else { python_str(pattern) }
}

pub fn python_literal(lit: &Literal) -> String {
    match lit {
        Literal::Nil => "None".to_string(),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::Number(n) => n.clone(),
        Literal::Str(s) | Literal::Symbol(s) => python_str(s),
        Literal::List(items) => {
            format!("[{}]", items.iter().map(python_literal).collect::<Vec<_>>().join(", "))
        }
        Literal::Map(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{}: {}", python_str(k), python_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Bounds;
    use crate::tables::{ConstraintTemplate, KindMapping};

    fn set(name: &str, fields: Vec<FieldDeclaration>, result: DeclaredKind) -> DeclarationSet {
        DeclarationSet {
            unit_name: name.to_string(),
            module_path: Vec::new(),
            fields,
            result_kind: result,
            result_element_kind: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn greet_renders_container_and_placeholder() {
        let mut who = FieldDeclaration::new("who", DeclaredKind::String);
        who.default_value = Some(Literal::Str("World".into()));
        let out = generate(&set("Greet", vec![who], DeclaredKind::String), &MappingTables::default());
        let expected = "\
# Converted from Greet

from foobara_py import Command
from pydantic import BaseModel
from typing import Optional


class GreetInputs(BaseModel):
    who: Optional[str] = \"World\"


class Greet(Command[GreetInputs, str]):
    def execute(self) -> str:
        raise NotImplementedError(\"execute() must be ported by hand\")
";
        assert_eq!(out.text, expected);
        assert!(out.warnings.is_empty());
        assert_eq!(out.fields, vec!["who"]);
    }

    #[test]
    fn constraints_compose_into_one_field_call() {
        let mut age = FieldDeclaration::new("age", DeclaredKind::Integer);
        age.numeric_bounds = Bounds::from_parts(Some("0".to_string()), Some("150".to_string()));
        age.description = Some("Age in years".into());
        let out = generate(&set("A", vec![age], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains(
            "    age: Optional[int] = Field(default=None, ge=0, le=150, description=\"Age in years\")\n"
        ));
        assert_eq!(out.validations, 2);
        assert!(out.text.contains("from pydantic import BaseModel, Field\n"));
        assert!(out.text.contains("def execute(self) -> Any:"));
    }

    #[test]
    fn enumeration_and_default_share_a_field() {
        let mut role = FieldDeclaration::new("role", DeclaredKind::String);
        role.allowed_values = Some(vec![Literal::Str("admin".into()), Literal::Str("user".into())]);
        role.default_value = Some(Literal::Str("user".into()));
        let out = generate(&set("A", vec![role], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    role: Optional[Literal[\"admin\", \"user\"]] = \"user\"\n"));
        assert!(out.text.contains("from typing import Any, Literal, Optional\n"));
    }

    #[test]
    fn unknown_kind_falls_back_with_one_warning() {
        let amount = FieldDeclaration::new("amount", DeclaredKind::Custom("money".into()));
        let out = generate(&set("A", vec![amount], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    amount: Optional[Any] = None\n"));
        let unrecognized: Vec<_> =
            out.warnings.iter().filter(|w| w.kind == WarningKind::UnrecognizedKind).collect();
        assert_eq!(unrecognized.len(), 1);
        assert_eq!(unrecognized[0].field.as_deref(), Some("amount"));
    }

    #[test]
    fn registered_custom_kind_resolves() {
        let tables = MappingTables::default().with_kind(
            "money",
            KindMapping::new("Decimal", KindFamily::Numeric).import("decimal", "Decimal"),
        );
        let mut amount = FieldDeclaration::new("amount", DeclaredKind::Custom("money".into()));
        amount.required = true;
        amount.numeric_bounds = Bounds::from_parts(Some("0".to_string()), None);
        let out = generate(&set("A", vec![amount], DeclaredKind::Untyped), &tables);
        assert!(out.text.contains("    amount: Decimal = Field(..., ge=0)\n"));
        assert!(out.text.contains("from decimal import Decimal\n"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn length_bounds_on_integer_are_dropped() {
        let mut count = FieldDeclaration::new("count", DeclaredKind::Integer);
        count.required = true;
        count.length_bounds = Bounds::from_parts(Some(1), Some(5));
        let out = generate(&set("A", vec![count], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    count: int = Field(...)\n"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, WarningKind::InvalidConstraintCombination);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].constraint, "length_bounds");
    }

    #[test]
    fn collection_element_type() {
        let mut tags = FieldDeclaration::new("tags", DeclaredKind::Array);
        tags.element_kind = Some(DeclaredKind::String);
        let bare = FieldDeclaration::new("bag", DeclaredKind::Hash);
        let out = generate(&set("A", vec![tags, bare], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    tags: Optional[List[str]] = None\n"));
        assert!(out.text.contains("    bag: Optional[Dict[str, Any]] = None\n"));
    }

    #[test]
    fn extras_need_a_registered_template() {
        let mut price = FieldDeclaration::new("price", DeclaredKind::Integer);
        price.required = true;
        price.extra.push(("multiple_of".into(), Literal::Number("5".into())));

        let plain = generate(&set("A", vec![price.clone()], DeclaredKind::Untyped), &MappingTables::default());
        assert!(plain.text.contains("    price: int = Field(...)\n"));
        assert_eq!(plain.warnings[0].kind, WarningKind::UnsupportedModifier);

        let tables = MappingTables::default()
            .with_constraint("multiple_of", ConstraintTemplate::argument("multiple_of={value}"));
        let extended = generate(&set("A", vec![price], DeclaredKind::Untyped), &tables);
        assert!(extended.text.contains("    price: int = Field(..., multiple_of=5)\n"));
        assert!(extended.warnings.is_empty());
    }

    #[test]
    fn keywords_get_an_alias() {
        let mut from = FieldDeclaration::new("from", DeclaredKind::Date);
        from.required = true;
        let out = generate(&set("A", vec![from], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    from_: date = Field(..., alias=\"from\")\n"));
        assert!(out.text.contains("from datetime import date\n"));
    }

    #[test]
    fn base_model_members_get_an_alias() {
        let schema = FieldDeclaration::new("schema", DeclaredKind::String);
        let mut model_id = FieldDeclaration::new("model_id", DeclaredKind::Integer);
        model_id.required = true;
        let plain = FieldDeclaration::new("schemas", DeclaredKind::String);
        let out = generate(&set("A", vec![schema, model_id, plain], DeclaredKind::Untyped), &MappingTables::default());
        assert!(out.text.contains("    schema_: Optional[str] = Field(default=None, alias=\"schema\")\n"), "{}", out.text);
        assert!(out.text.contains("    model_id_: int = Field(..., alias=\"model_id\")\n"), "{}", out.text);
        assert!(out.text.contains("    schemas: Optional[str] = None\n"), "{}", out.text);
        assert_eq!(out.fields, vec!["schema", "model_id", "schemas"]);
    }

    #[test]
    fn empty_container_passes() {
        let out = generate(&set("Ping", Vec::new(), DeclaredKind::Boolean), &MappingTables::default());
        assert!(out.text.contains("class PingInputs(BaseModel):\n    pass\n"));
        assert!(out.text.contains("class Ping(Command[PingInputs, bool]):\n"));
    }

    #[test]
    fn literals_render_as_python() {
        let lit = Literal::Map(vec![
            ("on".into(), Literal::Bool(true)),
            ("tags".into(), Literal::List(vec![Literal::Symbol("a".into()), Literal::Nil])),
        ]);
        assert_eq!(python_literal(&lit), r#"{"on": True, "tags": ["a", None]}"#);
        assert_eq!(python_pattern(r"^\d+$"), r#"r"^\d+$""#);
        assert_eq!(python_pattern(r#"^"x"$"#), r#""^\"x\"$""#);
    }
}
