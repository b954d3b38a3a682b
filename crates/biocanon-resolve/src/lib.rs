//! Biocanon: canonical resolution of heterogeneous biomedical records.
//!
//! Adapters emit loosely typed [`SourceRecord`]s (a source label, a field
//! bag, optional endpoint references). This crate maps each one onto a
//! schema-defined type and produces canonical graph elements:
//!
//! 1. **Registry** ([`Registry`]): the schema, validated once at load time,
//!    with synonyms folded, label bindings checked for overlap and the
//!    `is_a` hierarchy (optionally merged with an external ontology) checked
//!    for cycles.
//! 2. **Resolution** ([`Resolver`]): label match → authority-ranked CURIE →
//!    property coercion → endpoint validation via `is_a` → reification.
//! 3. **Pipeline** ([`run_pipeline`]): streams records (in parallel by
//!    default) into a [`GraphSink`], reporting every outcome to a
//!    [`DiagnosticsSink`] and returning a [`RunReport`].
//!
//! ```no_run
//! use std::path::Path;
//!
//! use biocanon_resolve::{
//!     run_pipeline, MemorySink, Registry, ResolverConfig, SourceRecord, TracingDiagnostics,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::from_file(Path::new("schema.yaml"), None)?;
//! let sink = MemorySink::new();
//! let records = Vec::<SourceRecord>::new().into_iter();
//! let report = run_pipeline(&registry, &ResolverConfig::default(), records, &sink, &TracingDiagnostics)?;
//! println!("{} nodes", report.nodes_emitted);
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hierarchy;
pub mod identifier;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod reify;
pub mod sink;

pub use config::{ConfigError, ResolverConfig};
pub use diagnostics::{
    CollectingDiagnostics, DiagnosticsSink, NoopDiagnostics, Outcome, OutcomeCounters,
    RecordOutcome, RunReport, TracingDiagnostics,
};
pub use error::{EndpointRole, RecordError, SchemaError, SkipReason};
pub use hierarchy::{Hierarchy, NodeId};
pub use labels::{LabelEntry, LabelMatcher};
pub use model::{
    CanonicalEdge, CanonicalNode, EndpointRef, EndpointRefs, FieldMap, PropertyMap,
    PropertyValue, ScalarValue, SourceRecord,
};
pub use pipeline::{run_pipeline, Resolution, Resolver};
pub use registry::{Registry, TypeDef, TypeId, TypeKind};
pub use reify::{ROLE_SOURCE, ROLE_TARGET};
pub use sink::{GraphSink, MemorySink, SinkError};

pub use biocanon_ontology::OntologyHierarchy;
