//! Strongly-typed IR between the parser and codegen. No source text here.

use serde::Serialize;

use crate::diagnostics::Warning;

// ————————————————————————————————————————————————————————————————————————————
// KINDS
// ————————————————————————————————————————————————————————————————————————————

/// Source-grammar type tag of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum DeclaredKind {
    String,
    Symbol,
    Email,
    Url,
    Integer,
    Float,
    Number,
    Boolean,
    Date,
    DateTime,
    Array,
    Hash,
    /// `:duck` escape hatch, also used when no kind was declared.
    Untyped,
    /// Unknown token, kept verbatim so callers can register a mapping for it.
    Custom(String),
}

impl DeclaredKind {
    /// Resolve a source token (without the leading `:`).
    pub fn from_token(token: &str) -> Self {
        match token.trim().trim_start_matches(':') {
            "string" | "str" => Self::String,
            "symbol" => Self::Symbol,
            "email" => Self::Email,
            "url" | "uri" => Self::Url,
            "integer" | "int" => Self::Integer,
            "float" => Self::Float,
            "number" | "decimal" | "big_decimal" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" | "time" => Self::DateTime,
            "array" | "list" => Self::Array,
            "hash" | "associative_array" | "attributes" | "model" => Self::Hash,
            "duck" | "any" | "" => Self::Untyped,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Key used by the kind mapping table.
    pub fn key(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Email => "email",
            Self::Url => "url",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Array => "array",
            Self::Hash => "hash",
            Self::Untyped => UNTYPED_KEY,
            Self::Custom(name) => name,
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Self::Untyped)
    }
}

pub const UNTYPED_KEY: &str = "duck";

// ————————————————————————————————————————————————————————————————————————————
// LITERALS
// ————————————————————————————————————————————————————————————————————————————

/// A source literal that survived translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Nil,
    Bool(bool),
    /// Normalized numeric text (`1_000` → `1000`).
    Number(String),
    Str(String),
    Symbol(String),
    List(Vec<Literal>),
    Map(Vec<(String, Literal)>),
}

impl Literal {
    pub fn as_number(&self) -> Option<&str> {
        match self {
            Literal::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Non-negative integer value, for length bounds.
    pub fn as_length(&self) -> Option<u64> {
        self.as_number().and_then(|n| n.parse::<u64>().ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Symbol or string text, e.g. a kind named by value.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Literal::Symbol(s) | Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

/// Inclusive `(min, max)` pair, either side optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Bounds<T> {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// `None` when neither side was declared.
    pub fn from_parts(min: Option<T>, max: Option<T>) -> Option<Self> {
        let b = Self { min, max };
        if b.is_empty() { None } else { Some(b) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDeclaration {
    pub name: String,
    pub declared_kind: DeclaredKind,
    pub required: bool,
    pub default_value: Option<Literal>,
    pub numeric_bounds: Option<Bounds<String>>,
    pub length_bounds: Option<Bounds<u64>>,
    pub allowed_values: Option<Vec<Literal>>,
    pub element_kind: Option<DeclaredKind>,
    /// Raw regex body, passed through without dialect rewriting.
    pub pattern: Option<String>,
    pub description: Option<String>,
    /// `key: literal` modifiers with no built-in meaning, in source order.
    pub extra: Vec<(String, Literal)>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, declared_kind: DeclaredKind) -> Self {
        Self {
            name: name.into(),
            declared_kind,
            required: false,
            default_value: None,
            numeric_bounds: None,
            length_bounds: None,
            allowed_values: None,
            element_kind: None,
            pattern: None,
            description: None,
            extra: Vec::new(),
        }
    }
}

/// One convertible unit. Built once by the parser, read once by codegen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationSet {
    pub unit_name: String,
    pub module_path: Vec<String>,
    pub fields: Vec<FieldDeclaration>,
    pub result_kind: DeclaredKind,
    pub result_element_kind: Option<DeclaredKind>,
    /// Problems the parser worked around.
    pub warnings: Vec<Warning>,
}

impl DeclarationSet {
    /// `Billing::CreateUser`-style name, for headers and logs.
    pub fn qualified_name(&self) -> String {
        let mut segments = self.module_path.clone();
        segments.push(self.unit_name.clone());
        segments.join("::")
    }

    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.name == name)
    }
}
