//! Schema configuration AST + loaders.
//!
//! The canonical on-disk form is YAML (JSON is accepted too):
//!
//! ```yaml
//! protein:
//!   represented_as: node
//!   preferred_id: [uniprot]
//!   input_label: protein
//!   properties:
//!     length: int
//!     secondary_ids: str[]
//! gene to protein relationship:
//!   represented_as: edge
//!   source: gene
//!   target: protein
//!   input_label: Encodes
//! ```
//!
//! Notes:
//! - Every multi-valued key (`is_a`, `preferred_id`, `input_label`, `scope`,
//!   `source`, `target`, `key_properties`) also accepts a single scalar. The
//!   AST always stores an ordered `Vec`, so downstream code never special-cases
//!   the singular form.
//! - Unknown keys are rejected here; everything else is checked by the
//!   registry.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::digest::fnv1a64_digest_bytes;

pub type Name = String;

// ============================================================================
// AST
// ============================================================================

/// A full schema: type name → declaration, in name order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SchemaConfig {
    pub types: BTreeMap<Name, TypeDecl>,
}

impl SchemaConfig {
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    /// Stable fingerprint of the schema (FNV-1a over the canonical JSON form).
    ///
    /// Two schemas that differ only in YAML formatting, key order or the
    /// singular/list spelling of a field share a fingerprint.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        fnv1a64_digest_bytes(&canonical)
    }

    pub fn association_count(&self) -> usize {
        self.types.values().filter(|t| t.is_association()).count()
    }
}

/// How a type is materialized in the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Node,
    Edge,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Node => write!(f, "node"),
            Representation::Edge => write!(f, "edge"),
        }
    }
}

/// One entity or association declaration.
///
/// A declaration is an association when it names a `source` or a `target`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub represented_as: Option<Representation>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub is_a: Vec<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonym_for: Option<Name>,
    /// Identifier authorities, highest priority first.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub preferred_id: Vec<Name>,
    #[serde(
        default,
        alias = "input_labels",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_label: Vec<String>,
    /// Source tags the labels are restricted to. Empty = global.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<Name, PropertyDecl>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub source: Vec<Name>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target: Vec<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_as_edge: Option<String>,
    /// Properties that disambiguate otherwise identical associations when a
    /// composite key has to be derived.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub key_properties: Vec<Name>,
}

impl TypeDecl {
    pub fn is_association(&self) -> bool {
        !self.source.is_empty() || !self.target.is_empty()
    }
}

/// Scalar element kinds for properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarKind::String => "str",
            ScalarKind::Integer => "int",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "bool",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ScalarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(ScalarKind::String),
            "int" | "integer" | "long" => Ok(ScalarKind::Integer),
            "float" | "double" => Ok(ScalarKind::Float),
            "bool" | "boolean" => Ok(ScalarKind::Boolean),
            other => Err(format!("unknown property type `{other}`")),
        }
    }
}

/// Declared type of a property: a scalar, or an array of scalars (`int[]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    Scalar(ScalarKind),
    Array(ScalarKind),
}

impl PropertyType {
    pub fn element(&self) -> ScalarKind {
        match self {
            PropertyType::Scalar(k) | PropertyType::Array(k) => *k,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, PropertyType::Array(_))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Scalar(k) => write!(f, "{k}"),
            PropertyType::Array(k) => write!(f, "{k}[]"),
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_suffix("[]") {
            Some(elem) => Ok(PropertyType::Array(elem.parse()?)),
            None => Ok(PropertyType::Scalar(s.parse()?)),
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        value.to_string()
    }
}

/// A declared property: its type and whether records must supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PropertyDeclRepr")]
pub struct PropertyDecl {
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
}

impl PropertyDecl {
    pub fn optional(ty: PropertyType) -> Self {
        Self {
            ty,
            required: false,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyDeclFull {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    required: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyDeclRepr {
    Short(String),
    Full(PropertyDeclFull),
}

impl TryFrom<PropertyDeclRepr> for PropertyDecl {
    type Error = String;

    fn try_from(value: PropertyDeclRepr) -> Result<Self, Self::Error> {
        match value {
            PropertyDeclRepr::Short(ty) => Ok(PropertyDecl::optional(ty.parse()?)),
            PropertyDeclRepr::Full(full) => Ok(PropertyDecl {
                ty: full.ty.parse()?,
                required: full.required,
            }),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

// ============================================================================
// Loaders
// ============================================================================

#[derive(Debug, Error)]
pub enum SchemaConfigError {
    #[error("failed to read schema `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema format `{0}` (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Yaml,
    Json,
}

impl SchemaFormat {
    pub fn from_path(path: &Path) -> Result<Self, SchemaConfigError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Ok(SchemaFormat::Yaml),
            "json" => Ok(SchemaFormat::Json),
            _ => Err(SchemaConfigError::UnsupportedFormat(ext)),
        }
    }
}

/// Raw top-level shape: a type may be declared with an empty body (`name:`),
/// which the registry later reports as missing a representation kind.
type RawSchema = BTreeMap<Name, Option<TypeDecl>>;

fn from_raw(raw: RawSchema) -> SchemaConfig {
    SchemaConfig {
        types: raw
            .into_iter()
            .map(|(name, decl)| (name, decl.unwrap_or_default()))
            .collect(),
    }
}

pub fn parse_schema_yaml(text: &str) -> Result<SchemaConfig, SchemaConfigError> {
    if text.trim().is_empty() {
        return Ok(SchemaConfig::default());
    }
    let raw: RawSchema = serde_yaml::from_str(text)?;
    Ok(from_raw(raw))
}

pub fn parse_schema_json(text: &str) -> Result<SchemaConfig, SchemaConfigError> {
    let raw: RawSchema = serde_json::from_str(text)?;
    Ok(from_raw(raw))
}

pub fn parse_schema(text: &str, format: SchemaFormat) -> Result<SchemaConfig, SchemaConfigError> {
    match format {
        SchemaFormat::Yaml => parse_schema_yaml(text),
        SchemaFormat::Json => parse_schema_json(text),
    }
}

/// Load a schema file, picking the format from its extension.
pub fn load_schema_file(path: &Path) -> Result<SchemaConfig, SchemaConfigError> {
    let format = SchemaFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| SchemaConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_schema(&text, format)
}

// ============================================================================
// Tests
// ============================================================================
