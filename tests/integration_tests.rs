//! Integration tests for the complete Biocanon pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - schema file (DSL) + OWL ontology → Registry
//! - resolver config file → ResolverConfig
//! - source records → run_pipeline → MemorySink + RunReport
//!
//! Run with: cargo test --test integration_tests

use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

use biocanon_dsl::load_schema_file;
use biocanon_ontology::load_ontology_file;
use biocanon_resolve::{
    run_pipeline, CollectingDiagnostics, EndpointRef, MemorySink, NoopDiagnostics, Outcome,
    Registry, ResolverConfig, SkipReason, SourceRecord, ROLE_SOURCE, ROLE_TARGET,
};

const SCHEMA: &str = r#"
biological entity:
  represented_as: node
protein:
  represented_as: node
  preferred_id: [uniprot, ensembl]
  input_label: [protein, uniprot_protein]
  properties:
    length: int
    synonyms: str[]
gene:
  represented_as: node
  is_a: biological entity
  preferred_id: ncbigene
  input_label: gene
disease:
  represented_as: node
  preferred_id: mondo
  input_label: disease
gene product affects disease:
  represented_as: node
  source: gene product
  target: disease
  input_label: affects
  preferred_id: ctd
  properties:
    evidence: str
  key_properties: evidence
gene to gene product:
  represented_as: edge
  source: gene
  target: GeneProduct
  input_label: expresses
"#;

const ONTOLOGY_NT: &str = r#"
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://w3id.org/biolink/vocab/GeneProduct> .
<http://w3id.org/biolink/vocab/GeneProduct> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://w3id.org/biolink/vocab/GeneProduct> <http://www.w3.org/2000/01/rdf-schema#label> "gene product"@en .
<http://w3id.org/biolink/vocab/GeneProduct> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://w3id.org/biolink/vocab/BiologicalEntity> .
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:has_part_restriction .
"#;

const CONFIG: &str = "array_delimiter: ';'\ndedup: true\nparallel: false\n";

fn records() -> Vec<SourceRecord> {
    vec![
        SourceRecord::new("protein")
            .with_field("uniprot", "P69905")
            .with_field("length", "141")
            .with_field("synonyms", "HBA1;HBA2"),
        SourceRecord::new("uniprot_protein").with_field("ensembl", "ENSP00000251595"),
        SourceRecord::new("gene").with_field("ncbigene", 3039),
        SourceRecord::new("expresses").with_endpoints(
            EndpointRef::new("3039").typed("gene"),
            EndpointRef::new("P69905").typed("protein"),
        ),
        SourceRecord::new("affects")
            .with_field("evidence", "curated")
            .with_endpoints(
                EndpointRef::new("uniprot:P69905").typed("protein"),
                EndpointRef::new("MONDO:0011382").labeled("disease"),
            ),
        // gene is a biological entity but not a gene product
        SourceRecord::new("affects").with_endpoints(
            EndpointRef::new("3039").typed("gene"),
            EndpointRef::new("MONDO:0011382").typed("disease"),
        ),
        SourceRecord::new("protein")
            .with_field("uniprot", "P69905")
            .with_field("length", "141")
            .with_field("synonyms", "HBA1;HBA2"),
        SourceRecord::new("transcript").with_field("ensembl", "ENST1"),
    ]
}

fn load_fixture(dir: &std::path::Path) -> (Registry, ResolverConfig) {
    let schema_path = dir.join("schema.yaml");
    let ontology_path = dir.join("biolink.nt");
    let config_path = dir.join("resolver.yaml");
    fs::write(&schema_path, SCHEMA).expect("write schema");
    fs::write(&ontology_path, ONTOLOGY_NT).expect("write ontology");
    fs::write(&config_path, CONFIG).expect("write config");

    let ontology = load_ontology_file(&ontology_path).expect("load ontology");
    let registry = Registry::from_file(&schema_path, Some(&ontology)).expect("load registry");
    let config = ResolverConfig::from_file(&config_path).expect("load config");
    (registry, config)
}

// ============================================================================
// Schema + ontology + records
// ============================================================================

#[test]
fn test_full_pipeline_with_ontology() {
    let dir = tempdir().expect("tempdir");
    let (registry, config) = load_fixture(dir.path());

    assert_eq!(
        registry.ancestors("protein").unwrap(),
        vec!["gene product", "biological entity"]
    );
    assert!(!config.parallel);
    assert!(config.dedup);

    let sink = MemorySink::new();
    let diagnostics = CollectingDiagnostics::new();
    let report = run_pipeline(
        &registry,
        &config,
        records().into_iter(),
        &sink,
        &diagnostics,
    )
    .expect("pipeline run");

    assert_eq!(report.records, 8);
    assert_eq!(report.accepted, 6);
    assert_eq!(report.rejected_endpoint_mismatch, 1);
    assert_eq!(report.dropped_unmapped, 1);
    assert_eq!(report.duplicates_suppressed, 1);

    let (nodes, edges) = sink.into_parts();
    assert_eq!(nodes.len(), 4);
    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids[..3],
        ["uniprot:P69905", "ensembl:ENSP00000251595", "ncbigene:3039"]
    );
    assert_eq!(nodes[0].properties["synonyms"].to_string(), "HBA1|HBA2");

    // Reified association: composite key, since no `ctd` id was given.
    let reified = &nodes[3];
    assert_eq!(reified.type_name, "gene product affects disease");
    assert!(reified.id.starts_with("gene_product_affects_disease:"));

    assert_eq!(edges.len(), 3);
    assert_eq!(edges[0].label, "GeneToGeneProduct");
    assert_eq!(edges[0].source, "ncbigene:3039");
    assert_eq!(edges[0].target, "uniprot:P69905");
    assert_eq!(edges[1].label, ROLE_SOURCE);
    assert_eq!(edges[1].source, "uniprot:P69905");
    assert_eq!(edges[1].target, reified.id);
    assert_eq!(edges[2].label, ROLE_TARGET);
    assert_eq!(edges[2].source, "MONDO:0011382");

    let outcomes = diagnostics.outcomes();
    assert_eq!(outcomes.len(), 8);
    assert_eq!(
        outcomes[5],
        (5, Outcome::Skipped(SkipReason::EndpointMismatch))
    );
    assert_eq!(outcomes[7], (7, Outcome::Skipped(SkipReason::Unmapped)));
}

#[test]
fn test_schema_fingerprint_matches_dsl_digest() {
    let dir = tempdir().expect("tempdir");
    let (registry, _) = load_fixture(dir.path());
    let config = load_schema_file(&dir.path().join("schema.yaml")).expect("parse schema");
    assert_eq!(registry.fingerprint(), config.digest());
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn test_registry_shared_across_threads() {
    let dir = tempdir().expect("tempdir");
    let (registry, _) = load_fixture(dir.path());
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let sink = MemorySink::new();
                let report = run_pipeline(
                    &registry,
                    &ResolverConfig::default(),
                    records().into_iter(),
                    &sink,
                    &NoopDiagnostics,
                )
                .expect("pipeline run");
                (report, sink.node_count())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("worker"))
        .collect();
    for (report, nodes) in &results {
        assert_eq!(report, &results[0].0);
        assert_eq!(*nodes, 5);
    }
}

#[test]
fn test_independent_registries_coexist() {
    let a = Registry::from_yaml_str(
        "protein:\n  represented_as: node\n  preferred_id: uniprot\n  input_label: entry\n",
        None,
    )
    .unwrap();
    let b = Registry::from_yaml_str(
        "gene:\n  represented_as: node\n  preferred_id: ncbigene\n  input_label: entry\n",
        None,
    )
    .unwrap();

    let record = SourceRecord::new("entry")
        .with_field("uniprot", "P69905")
        .with_field("ncbigene", "3039");

    for (registry, expected) in [(&a, "uniprot:P69905"), (&b, "ncbigene:3039")] {
        let sink = MemorySink::new();
        run_pipeline(
            registry,
            &ResolverConfig::sequential(),
            std::iter::once(record.clone()),
            &sink,
            &NoopDiagnostics,
        )
        .unwrap();
        assert_eq!(sink.nodes()[0].id, expected);
    }
    assert_ne!(a.fingerprint(), b.fingerprint());
}
