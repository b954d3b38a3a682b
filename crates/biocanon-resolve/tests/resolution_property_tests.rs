use biocanon_resolve::{EndpointRef, Registry, Resolver, ResolverConfig, SourceRecord};
use proptest::prelude::*;

const SCHEMA: &str = r#"
gene:
  represented_as: node
  preferred_id: [ncbigene, ensembl, hgnc]
  input_label: gene
drug:
  represented_as: node
  preferred_id: chembl
  input_label: drug
drug affects gene:
  represented_as: edge
  source: drug
  target: gene
  input_label: affects
  properties:
    evidence: str
    note: str
  key_properties: evidence
"#;

fn registry() -> Registry {
    Registry::from_yaml_str(SCHEMA, None).expect("load schema")
}

fn local_id() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9]{1,8}"
}

fn label_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every label a schema declares resolves back to its type.
    #[test]
    fn declared_labels_round_trip(labels in prop::collection::btree_set(label_name(), 1..12)) {
        let labels: Vec<String> = labels.into_iter().collect();
        let mut yaml = String::new();
        for (i, label) in labels.iter().enumerate() {
            yaml.push_str(&format!("t{i}:\n  represented_as: node\n  input_label: '{label}'\n"));
        }
        let registry = Registry::from_yaml_str(&yaml, None).expect("distinct labels load");
        for (i, label) in labels.iter().enumerate() {
            let def = registry.by_label(label, None).expect("label resolves");
            prop_assert_eq!(&def.name, &format!("t{i}"));
        }
    }

    /// The chosen identifier depends on which authorities are present, never
    /// on the order fields arrive in.
    #[test]
    fn authority_precedence_ignores_field_order(
        ids in prop::collection::vec(proptest::option::of(local_id()), 3),
        shuffle in any::<prop::sample::Index>(),
    ) {
        let registry = registry();
        let config = ResolverConfig::default();
        let resolver = Resolver::new(&registry, &config);

        let authorities = ["ncbigene", "ensembl", "hgnc"];
        let mut present: Vec<(&str, String)> = authorities
            .iter()
            .zip(&ids)
            .filter_map(|(a, id)| id.clone().map(|id| (*a, id)))
            .collect();
        if !present.is_empty() {
            let k = shuffle.index(present.len());
            present.rotate_left(k);
        }

        let mut record = SourceRecord::new("gene");
        for (authority, id) in &present {
            record = record.with_field(*authority, id.as_str());
        }

        let expected = authorities
            .iter()
            .zip(&ids)
            .find_map(|(a, id)| id.as_ref().map(|id| format!("{a}:{id}")));

        match (resolver.resolve(&record), expected) {
            (Ok(resolution), Some(expected)) => {
                prop_assert_eq!(&resolution.nodes[0].id, &expected);
            }
            (Err(_), None) => {}
            (got, expected) => {
                prop_assert!(false, "got {:?}, expected {:?}", got, expected);
            }
        }
    }

    /// Composite keys are a function of the type, the ordered endpoints and
    /// the declared key properties only.
    #[test]
    fn composite_keys_are_deterministic(
        drug in local_id(),
        gene in local_id(),
        evidence in "[a-z]{1,12}",
        note_a in "[a-z ]{0,12}",
        note_b in "[a-z ]{0,12}",
    ) {
        let registry = registry();
        let config = ResolverConfig::default();
        let resolver = Resolver::new(&registry, &config);

        let record = |note: &str| {
            SourceRecord::new("affects")
                .with_field("evidence", evidence.as_str())
                .with_field("note", note)
                .with_endpoints(
                    EndpointRef::new(drug.as_str()).typed("drug"),
                    EndpointRef::new(gene.as_str()).typed("gene"),
                )
        };

        let a = resolver.resolve(&record(&note_a)).expect("resolves");
        let b = resolver.resolve(&record(&note_b)).expect("resolves");
        prop_assert_eq!(&a.edges[0].id, &b.edges[0].id);

        let key = a.edges[0].id.clone().expect("composite key");
        prop_assert!(key.starts_with("drug_affects_gene:"));
    }
}
