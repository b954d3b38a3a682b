//! Record resolution and the streaming pipeline.
//!
//! [`Resolver::resolve`] takes one record through
//! label match → identifier → coercion → endpoints → reification and either
//! returns the canonical elements or a [`RecordError`]. It touches no shared
//! mutable state, so [`run_pipeline`] can fan records out over rayon.

use dashmap::DashSet;
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::info;

use crate::coerce::{coerce_properties, FieldView};
use crate::config::ResolverConfig;
use crate::diagnostics::{DiagnosticsSink, Outcome, OutcomeCounters, RecordOutcome, RunReport};
use crate::error::{EndpointRole, RecordError};
use crate::identifier::{composite_key, select_identifier};
use crate::model::{CanonicalEdge, CanonicalNode, SourceRecord};
use crate::registry::{AssociationDef, Registry, TypeDef, TypeKind};
use crate::reify::{check_endpoint, reify, resolve_endpoint};
use crate::sink::{GraphSink, SinkError};

/// Canonical elements produced from one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub type_name: String,
    pub nodes: Vec<CanonicalNode>,
    pub edges: Vec<CanonicalEdge>,
    pub dropped_properties: Vec<String>,
    pub unknown_fields: usize,
}

impl Resolution {
    pub fn outcome(&self) -> Outcome {
        if self.dropped_properties.is_empty() {
            Outcome::Accepted
        } else {
            Outcome::PartialPropertyLoss
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r Registry,
    config: &'r ResolverConfig,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry, config: &'r ResolverConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn resolve(&self, record: &SourceRecord) -> Result<Resolution, RecordError> {
        let source_tag = record.source.as_deref();
        let def = self
            .registry
            .by_label(&record.label, source_tag)
            .ok_or_else(|| RecordError::Unmapped {
                label: record.label.clone(),
                source_tag: record.source.clone(),
            })?;
        let fields = FieldView::new(&record.fields, self.config);

        match &def.kind {
            TypeKind::Entity => self.resolve_entity(def, &fields),
            TypeKind::Association(assoc) => self.resolve_association(def, assoc, record, &fields),
        }
    }

    fn resolve_entity(&self, def: &TypeDef, fields: &FieldView<'_>) -> Result<Resolution, RecordError> {
        let id = select_identifier(def, fields, self.config)?.ok_or_else(|| {
            RecordError::Unidentifiable {
                type_name: def.name.clone(),
                authorities: def.authorities.clone(),
            }
        })?;
        let coerced = coerce_properties(def, fields, self.config)?;

        Ok(Resolution {
            type_name: def.name.clone(),
            nodes: vec![CanonicalNode {
                id,
                type_name: def.name.clone(),
                properties: coerced.properties,
            }],
            edges: Vec::new(),
            dropped_properties: coerced.failed,
            unknown_fields: coerced.unknown_fields,
        })
    }

    fn resolve_association(
        &self,
        def: &TypeDef,
        assoc: &AssociationDef,
        record: &SourceRecord,
        fields: &FieldView<'_>,
    ) -> Result<Resolution, RecordError> {
        let endpoints = record
            .endpoints
            .as_ref()
            .ok_or_else(|| RecordError::MissingEndpoints {
                type_name: def.name.clone(),
            })?;
        let source_tag = record.source.as_deref();

        let source = resolve_endpoint(
            self.registry,
            def,
            assoc,
            EndpointRole::Source,
            &endpoints.source,
            source_tag,
        )?;
        check_endpoint(self.registry, def, assoc, EndpointRole::Source, &source)?;
        let target = resolve_endpoint(
            self.registry,
            def,
            assoc,
            EndpointRole::Target,
            &endpoints.target,
            source_tag,
        )?;
        check_endpoint(self.registry, def, assoc, EndpointRole::Target, &target)?;

        let coerced = coerce_properties(def, fields, self.config)?;
        let id = match select_identifier(def, fields, self.config)? {
            Some(natural) => natural,
            None => composite_key(
                def,
                &source.id,
                &target.id,
                &coerced.properties,
                &coerced.failed,
            ),
        };

        let (nodes, edges) =
            reify(def, assoc, id, source.id, target.id, coerced.properties).into_parts();
        Ok(Resolution {
            type_name: def.name.clone(),
            nodes,
            edges,
            dropped_properties: coerced.failed,
            unknown_fields: coerced.unknown_fields,
        })
    }
}

struct RunContext<'a, S: ?Sized, D: ?Sized> {
    resolver: Resolver<'a>,
    sink: &'a S,
    diagnostics: &'a D,
    counters: &'a OutcomeCounters,
    seen: Option<&'a DashSet<String>>,
}

impl<S, D> RunContext<'_, S, D>
where
    S: GraphSink + ?Sized,
    D: DiagnosticsSink + ?Sized,
{
    fn process(&self, index: usize, record: &SourceRecord) -> Result<(), SinkError> {
        match self.resolver.resolve(record) {
            Ok(resolution) => {
                let outcome = resolution.outcome();
                self.counters.record_outcome(outcome);
                self.counters.add_unknown_fields(resolution.unknown_fields);
                self.counters
                    .add_dropped_properties(resolution.dropped_properties.len());
                self.diagnostics.report(&RecordOutcome {
                    index,
                    record,
                    outcome,
                    type_name: Some(&resolution.type_name),
                    error: None,
                    dropped_properties: &resolution.dropped_properties,
                });
                self.emit(resolution)
            }
            Err(err) => {
                let outcome = Outcome::Skipped(err.skip_reason());
                self.counters.record_outcome(outcome);
                self.diagnostics.report(&RecordOutcome {
                    index,
                    record,
                    outcome,
                    type_name: None,
                    error: Some(&err),
                    dropped_properties: &[],
                });
                Ok(())
            }
        }
    }

    fn emit(&self, resolution: Resolution) -> Result<(), SinkError> {
        for node in resolution.nodes {
            if self.first_seen(format!("node\t{}", node.id)) {
                self.sink.put_node(node)?;
                self.counters.add_node();
            } else {
                self.counters.add_duplicate();
            }
        }
        for edge in resolution.edges {
            let key = match &edge.id {
                Some(id) => format!("edge\t{id}"),
                None => format!("role\t{}\t{}\t{}", edge.label, edge.source, edge.target),
            };
            if self.first_seen(key) {
                self.sink.put_edge(edge)?;
                self.counters.add_edge();
            } else {
                self.counters.add_duplicate();
            }
        }
        Ok(())
    }

    fn first_seen(&self, key: String) -> bool {
        match self.seen {
            Some(seen) => seen.insert(key),
            None => true,
        }
    }
}

/// Resolve every record of `records` and hand the results to `sink`.
///
/// Records are processed in parallel (rayon bridge) unless
/// `config.parallel` is false, in which case emission follows input order.
/// Record errors are counted and reported, never returned; only a sink
/// failure stops the run.
pub fn run_pipeline<I, S, D>(
    registry: &Registry,
    config: &ResolverConfig,
    records: I,
    sink: &S,
    diagnostics: &D,
) -> Result<RunReport, SinkError>
where
    I: Iterator<Item = SourceRecord> + Send,
    S: GraphSink + ?Sized,
    D: DiagnosticsSink + ?Sized,
{
    let counters = OutcomeCounters::new();
    let seen: Option<DashSet<String>> = config.dedup.then(DashSet::new);
    let ctx = RunContext {
        resolver: Resolver::new(registry, config),
        sink,
        diagnostics,
        counters: &counters,
        seen: seen.as_ref(),
    };

    info!(
        parallel = config.parallel,
        dedup = config.dedup,
        fingerprint = registry.fingerprint(),
        "resolution run started"
    );

    if config.parallel {
        records
            .enumerate()
            .par_bridge()
            .try_for_each(|(index, record)| ctx.process(index, &record))?;
    } else {
        for (index, record) in records.enumerate() {
            ctx.process(index, &record)?;
        }
    }
    sink.flush()?;

    let report = counters.snapshot();
    info!(
        records = report.records,
        accepted = report.accepted,
        partial = report.partial_property_loss,
        skipped = report.total_skipped(),
        nodes = report.nodes_emitted,
        edges = report.edges_emitted,
        duplicates = report.duplicates_suppressed,
        "resolution run finished"
    );
    Ok(report)
}
