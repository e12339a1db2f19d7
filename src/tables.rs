//! Kind and constraint mapping tables.
//!
//! Built once from `MappingTables::default()`, optionally extended (in code or
//! from a JSON overlay), then passed by reference to every conversion. Nothing
//! here is global; a batch borrows the tables immutably for its whole run.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::{DeclaredKind, UNTYPED_KEY};
use crate::path_de::{PathError, from_str_with_path};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// `from <module> import <name>`. Written as `"module.Name"` in config files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Import {
    pub module: String,
    pub name: String,
}

impl Import {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self { module: module.into(), name: name.into() }
    }
}

impl TryFrom<String> for Import {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.rsplit_once('.') {
            Some((module, name)) if !module.is_empty() && !name.is_empty() => Ok(Self::new(module, name)),
            _ => Err(format!("import `{value}` must look like `module.Name`")),
        }
    }
}

impl From<Import> for String {
    fn from(value: Import) -> Self {
        format!("{}.{}", value.module, value.name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Which constraints a kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFamily {
    /// `min` / `max`.
    Numeric,
    /// `min_length` / `max_length` / `pattern`.
    Text,
    /// `element_type`.
    Collection,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMapping {
    /// Target type expression; `{element}` is replaced by the element type.
    #[serde(rename = "type")]
    pub type_expr: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub family: KindFamily,
}

impl KindMapping {
    pub fn new(type_expr: impl Into<String>, family: KindFamily) -> Self {
        Self { type_expr: type_expr.into(), imports: Vec::new(), family }
    }

    pub fn import(mut self, module: &str, name: &str) -> Self {
        self.imports.push(Import::new(module, name));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Keyword argument inside the field's single `Field(...)` call.
    #[default]
    Argument,
    /// Rewrites the field type; `{type}` is the type so far.
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    /// `{value}` is the rendered value; `{values}` the comma-joined items of a list.
    pub template: String,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub imports: Vec<Import>,
}

impl ConstraintTemplate {
    pub fn argument(template: impl Into<String>) -> Self {
        Self { template: template.into(), placement: Placement::Argument, imports: Vec::new() }
    }

    pub fn wrapping(template: impl Into<String>) -> Self {
        Self { template: template.into(), placement: Placement::Type, imports: Vec::new() }
    }

    pub fn import(mut self, module: &str, name: &str) -> Self {
        self.imports.push(Import::new(module, name));
        self
    }

    pub fn fill(&self, ty: &str, value: &str, values: &str) -> String {
        self.template
            .replace("{type}", ty)
            .replace("{values}", values)
            .replace("{value}", value)
    }
}

/// Built-in constraint shape keys.
pub mod shape {
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const PATTERN: &str = "pattern";
    pub const ONE_OF: &str = "one_of";
    pub const DESCRIPTION: &str = "description";
}

/// A named expression plus the imports it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub expr: String,
    #[serde(default)]
    pub imports: Vec<Import>,
}

impl Symbol {
    fn new(expr: &str, module: &str, name: &str) -> Self {
        Self { expr: expr.to_string(), imports: vec![Import::new(module, name)] }
    }
}

/// Fixed pieces of the rendered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConventions {
    /// `{type}` → optional wrapper.
    pub optional: Symbol,
    pub field_call: Symbol,
    pub container_base: Symbol,
    /// `{inputs}` and `{result}` are replaced.
    pub unit_base: Symbol,
    pub container_suffix: String,
    pub placeholder_method: String,
    pub placeholder_message: String,
}

impl Default for TargetConventions {
    fn default() -> Self {
        Self {
            optional: Symbol::new("Optional[{type}]", "typing", "Optional"),
            field_call: Symbol::new("Field", "pydantic", "Field"),
            container_base: Symbol::new("BaseModel", "pydantic", "BaseModel"),
            unit_base: Symbol::new("Command[{inputs}, {result}]", "foobara_py", "Command"),
            container_suffix: "Inputs".to_string(),
            placeholder_method: "execute".to_string(),
            placeholder_message: "execute() must be ported by hand".to_string(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TABLES
// ————————————————————————————————————————————————————————————————————————————

/// `declared_kind` key → target type. The untyped entry always exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindMappingTable {
    entries: IndexMap<String, KindMapping>,
    fallback: KindMapping,
}

impl Default for KindMappingTable {
    fn default() -> Self {
        use KindFamily::*;
        let entries = [
            ("string", KindMapping::new("str", Text)),
            ("symbol", KindMapping::new("str", Text)),
            ("email", KindMapping::new("EmailStr", Text).import("pydantic", "EmailStr")),
            ("url", KindMapping::new("HttpUrl", Text).import("pydantic", "HttpUrl")),
            ("integer", KindMapping::new("int", Numeric)),
            ("float", KindMapping::new("float", Numeric)),
            ("number", KindMapping::new("float", Numeric)),
            ("boolean", KindMapping::new("bool", Other)),
            ("date", KindMapping::new("date", Other).import("datetime", "date")),
            ("datetime", KindMapping::new("datetime", Other).import("datetime", "datetime")),
            ("array", KindMapping::new("List[{element}]", Collection).import("typing", "List")),
            ("hash", KindMapping::new("Dict[str, {element}]", Collection).import("typing", "Dict")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            entries,
            fallback: KindMapping::new("Any", Other).import("typing", "Any"),
        }
    }
}

impl KindMappingTable {
    pub fn get(&self, key: &str) -> Option<&KindMapping> {
        if key == UNTYPED_KEY {
            return Some(&self.fallback);
        }
        self.entries.get(key)
    }

    pub fn lookup(&self, kind: &DeclaredKind) -> Option<&KindMapping> {
        self.get(kind.key())
    }

    /// Mapping for `Untyped` and for every kind without an entry.
    pub fn fallback(&self) -> &KindMapping {
        &self.fallback
    }

    /// Add or replace an entry. Registering the untyped key replaces the fallback.
    pub fn register(&mut self, key: impl Into<String>, mapping: KindMapping) {
        let key = key.into();
        if key == UNTYPED_KEY {
            self.fallback = mapping;
        } else {
            self.entries.insert(key, mapping);
        }
    }

    /// Entries in registration order, fallback last.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KindMapping)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .chain(std::iter::once((UNTYPED_KEY, &self.fallback)))
    }
}

/// Constraint shape → annotation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMappingTable {
    entries: IndexMap<String, ConstraintTemplate>,
}

impl Default for ConstraintMappingTable {
    fn default() -> Self {
        let entries = [
            (shape::MIN, ConstraintTemplate::argument("ge={value}")),
            (shape::MAX, ConstraintTemplate::argument("le={value}")),
            (shape::MIN_LENGTH, ConstraintTemplate::argument("min_length={value}")),
            (shape::MAX_LENGTH, ConstraintTemplate::argument("max_length={value}")),
            (shape::PATTERN, ConstraintTemplate::argument("pattern={value}")),
            (shape::ONE_OF, ConstraintTemplate::wrapping("Literal[{values}]").import("typing", "Literal")),
            (shape::DESCRIPTION, ConstraintTemplate::argument("description={value}")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { entries }
    }
}

impl ConstraintMappingTable {
    pub fn get(&self, shape: &str) -> Option<&ConstraintTemplate> {
        self.entries.get(shape)
    }

    pub fn register(&mut self, shape: impl Into<String>, template: ConstraintTemplate) {
        self.entries.insert(shape.into(), template);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstraintTemplate)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Everything codegen reads. Clone and extend rather than share mutably.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTables {
    pub kinds: KindMappingTable,
    pub constraints: ConstraintMappingTable,
    pub target: TargetConventions,
}

impl MappingTables {
    pub fn register_kind(&mut self, key: impl Into<String>, mapping: KindMapping) -> &mut Self {
        self.kinds.register(key, mapping);
        self
    }

    pub fn register_constraint(&mut self, shape: impl Into<String>, template: ConstraintTemplate) -> &mut Self {
        self.constraints.register(shape, template);
        self
    }

    pub fn with_kind(mut self, key: impl Into<String>, mapping: KindMapping) -> Self {
        self.register_kind(key, mapping);
        self
    }

    pub fn with_constraint(mut self, shape: impl Into<String>, template: ConstraintTemplate) -> Self {
        self.register_constraint(shape, template);
        self
    }

    pub fn apply(&mut self, overlay: TablesOverlay) {
        for (key, mapping) in overlay.kinds {
            self.kinds.register(key, mapping);
        }
        for (shape, template) in overlay.constraints {
            self.constraints.register(shape, template);
        }
        if let Some(target) = overlay.target {
            self.target = target;
        }
    }

    /// Built-in tables extended by the overlay at `path`.
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let mut tables = Self::default();
        tables.apply(TablesOverlay::load(path)?);
        Ok(tables)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONFIG OVERLAY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config `{}`: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: PathError,
    },
}

/// JSON shape of a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablesOverlay {
    #[serde(default)]
    pub kinds: IndexMap<String, KindMapping>,
    #[serde(default)]
    pub constraints: IndexMap<String, ConstraintTemplate>,
    #[serde(default)]
    pub target: Option<TargetConventions>,
}

impl TablesOverlay {
    pub fn parse(src: &str) -> Result<Self, PathError> {
        from_str_with_path(src)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&src).map_err(|source| ConfigError::Invalid { path: path.to_path_buf(), source })
    }
}
