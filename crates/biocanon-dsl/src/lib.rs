//! Biocanon schema configuration
//!
//! This crate defines the declarative schema surface used by Biocanon: a
//! mapping of type name → declaration (entities and associations) that tells
//! the resolver how to turn raw, source-tagged records into canonical graph
//! nodes and edges.
//!
//! It is intentionally *syntax only*: structural validation (label overlaps,
//! hierarchy cycles, endpoint references) happens when `biocanon-resolve`
//! builds its registry. Keeping the two apart lets tooling load and inspect a
//! broken schema and still get a precise diagnostic from the registry.

pub mod digest;
pub mod schema_config;

pub use schema_config::{
    load_schema_file, parse_schema, parse_schema_json, parse_schema_yaml, PropertyDecl, PropertyType,
    Representation, ScalarKind, SchemaConfig, SchemaConfigError, SchemaFormat, TypeDecl,
};
