//! External ontology hierarchies for Biocanon.
//!
//! This crate sits at the **input boundary** of the resolver:
//!
//! - It parses ontology-shaped inputs (untrusted): RDF class hierarchies
//!   (`.nt`, `.ttl`, `.owl`/`.rdf`) and plain parent maps (`.yaml`, `.yml`,
//!   `.json`).
//! - It emits one thing: an [`OntologyHierarchy`], a map of class name → direct
//!   parent names.
//! - It does *not* validate the hierarchy (cycles, dangling parents). That is
//!   the resolver's job once the ontology is merged with the schema.
//!
//! Class names are normalized the same way on every input path: lowercase,
//! with CamelCase local names split into words (`SequenceVariant` →
//! `sequence variant`), so they line up with schema type names.

pub mod owl;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use owl::{Ontology, OwlClass, OwlError, OwlParser, RdfSyntax};

#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("failed to read ontology `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {syntax} ontology: {message}")]
    Rdf { syntax: RdfSyntax, message: String },
    #[error("invalid YAML parent map: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON parent map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported ontology format `{0}` (expected .nt, .ttl, .owl, .rdf, .yaml, .yml or .json)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OntologyFormat {
    Rdf(RdfSyntax),
    Yaml,
    Json,
}

impl OntologyFormat {
    pub fn from_path(path: &Path) -> Result<Self, OntologyError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "nt" => Ok(Self::Rdf(RdfSyntax::NTriples)),
            "ttl" | "turtle" => Ok(Self::Rdf(RdfSyntax::Turtle)),
            "owl" | "rdf" | "xml" => Ok(Self::Rdf(RdfSyntax::RdfXml)),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(OntologyError::UnsupportedFormat(ext)),
        }
    }
}

/// Class name → direct parents (declared order, no duplicates).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OntologyHierarchy {
    pub parents: BTreeMap<String, Vec<String>>,
}

impl OntologyHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(child, parent)` pairs; names are normalized.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut out = Self::new();
        for (child, parent) in pairs {
            out.add_parent(child.as_ref(), parent.as_ref());
        }
        out
    }

    /// Register a class with no parents (a root), if it isn't known yet.
    pub fn add_class(&mut self, name: &str) {
        self.parents.entry(normalize_class_name(name)).or_default();
    }

    pub fn add_parent(&mut self, child: &str, parent: &str) {
        let parent = normalize_class_name(parent);
        self.parents.entry(parent.clone()).or_default();
        let entry = self.parents.entry(normalize_class_name(child)).or_default();
        if !entry.contains(&parent) {
            entry.push(parent);
        }
    }

    pub fn parents_of(&self, name: &str) -> &[String] {
        self.parents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Flatten a parsed OWL ontology. A class is named by its `rdfs:label`
    /// when it has one, otherwise by its IRI's local name.
    pub fn from_owl(ontology: &Ontology) -> Self {
        let names: BTreeMap<&str, String> = ontology
            .classes
            .iter()
            .map(|c| (c.iri.as_str(), owl_class_name(c)))
            .collect();

        let mut out = Self::new();
        for class in &ontology.classes {
            let child = &names[class.iri.as_str()];
            out.add_class(child);
            for parent_iri in &class.subclass_of {
                let parent = names
                    .get(parent_iri.as_str())
                    .cloned()
                    .unwrap_or_else(|| owl::local_name(parent_iri));
                out.add_parent(child, &parent);
            }
        }
        out
    }
}

fn owl_class_name(class: &OwlClass) -> String {
    match &class.label {
        Some(label) if !label.trim().is_empty() => label.clone(),
        _ => owl::local_name(&class.iri),
    }
}

/// `SequenceVariant` → `sequence variant`; `named_thing` → `named thing`;
/// already-spaced names are just lowercased and trimmed.
pub fn normalize_class_name(raw: &str) -> String {
    let raw = raw.trim();
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;
    for ch in raw.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_uppercase() {
            if matches!(prev, Some(p) if p.is_lowercase() || p.is_ascii_digit()) {
                out.push(' ');
            }
            out.extend(ch.to_lowercase());
        } else if ch == ' ' {
            if !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    out.trim().to_string()
}

// ============================================================================
// Parent maps (YAML / JSON)
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Parents {
    One(String),
    Many(Vec<String>),
}

type RawParentMap = BTreeMap<String, Option<Parents>>;

fn into_hierarchy(raw: RawParentMap) -> OntologyHierarchy {
    let mut out = OntologyHierarchy::new();
    for (child, parents) in raw {
        out.add_class(&child);
        let parents = match parents {
            None => Vec::new(),
            Some(Parents::One(p)) => vec![p],
            Some(Parents::Many(ps)) => ps,
        };
        for parent in parents {
            out.add_parent(&child, &parent);
        }
    }
    out
}

pub fn parse_parent_map_yaml(text: &str) -> Result<OntologyHierarchy, OntologyError> {
    if text.trim().is_empty() {
        return Ok(OntologyHierarchy::new());
    }
    let raw: Option<RawParentMap> = serde_yaml::from_str(text)?;
    Ok(into_hierarchy(raw.unwrap_or_default()))
}

pub fn parse_parent_map_json(text: &str) -> Result<OntologyHierarchy, OntologyError> {
    let raw: RawParentMap = serde_json::from_str(text)?;
    Ok(into_hierarchy(raw))
}

pub fn parse_rdf<R: BufRead>(reader: R, syntax: RdfSyntax) -> Result<OntologyHierarchy, OntologyError> {
    let ontology = OwlParser::new().parse_bufread(reader, syntax)?;
    Ok(OntologyHierarchy::from_owl(&ontology))
}

pub fn parse_ntriples(text: &str) -> Result<OntologyHierarchy, OntologyError> {
    parse_rdf(text.as_bytes(), RdfSyntax::NTriples)
}

pub fn parse_turtle(text: &str) -> Result<OntologyHierarchy, OntologyError> {
    parse_rdf(text.as_bytes(), RdfSyntax::Turtle)
}

pub fn parse_ontology(text: &str, format: OntologyFormat) -> Result<OntologyHierarchy, OntologyError> {
    match format {
        OntologyFormat::Rdf(syntax) => parse_rdf(text.as_bytes(), syntax),
        OntologyFormat::Yaml => parse_parent_map_yaml(text),
        OntologyFormat::Json => parse_parent_map_json(text),
    }
}

/// Load an ontology file, picking the parser from the file extension.
/// RDF inputs are streamed; parent maps are read whole.
pub fn load_ontology_file(path: &Path) -> Result<OntologyHierarchy, OntologyError> {
    let format = OntologyFormat::from_path(path)?;
    let io_error = |source| OntologyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let hierarchy = match format {
        OntologyFormat::Rdf(syntax) => {
            let file = File::open(path).map_err(io_error)?;
            parse_rdf(BufReader::new(file), syntax)?
        }
        _ => {
            let text = std::fs::read_to_string(path).map_err(io_error)?;
            parse_ontology(&text, format)?
        }
    };
    debug!(
        path = %path.display(),
        classes = hierarchy.len(),
        "loaded ontology hierarchy"
    );
    Ok(hierarchy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn class_names_are_normalized() {
        assert_eq!(normalize_class_name("SequenceVariant"), "sequence variant");
        assert_eq!(normalize_class_name("named_thing"), "named thing");
        assert_eq!(normalize_class_name("  Gene  "), "gene");
        assert_eq!(normalize_class_name("gene product"), "gene product");
        assert_eq!(normalize_class_name("RNAProduct"), "rnaproduct");
    }

    #[test]
    fn yaml_parent_map_accepts_single_and_list_parents() {
        let h = parse_parent_map_yaml(
            "protein: polypeptide\npolypeptide: [biological entity, chemical entity]\nnamed thing:\n",
        )
        .unwrap();
        assert_eq!(h.parents_of("protein"), ["polypeptide".to_string()]);
        assert_eq!(
            h.parents_of("polypeptide"),
            ["biological entity".to_string(), "chemical entity".to_string()]
        );
        assert!(h.contains("named thing"));
        assert!(h.parents_of("named thing").is_empty());
        // Parents referenced but never declared still become classes.
        assert!(h.contains("chemical entity"));
    }

    #[test]
    fn json_parent_map_matches_yaml() {
        let yaml = parse_parent_map_yaml("Protein: Polypeptide\n").unwrap();
        let json = parse_parent_map_json(r#"{"Protein": ["Polypeptide"]}"#).unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn owl_hierarchy_uses_labels_then_local_names() {
        let h = parse_turtle(
            "@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
             @prefix biolink: <http://w3id.org/biolink/vocab/> .\n\
             biolink:Protein rdfs:subClassOf biolink:GeneProduct .\n\
             biolink:GeneProduct rdfs:label \"gene product\" ;\n\
                 rdfs:subClassOf biolink:NamedThing .\n",
        )
        .unwrap();
        assert_eq!(h.parents_of("protein"), ["gene product".to_string()]);
        assert_eq!(h.parents_of("gene product"), ["named thing".to_string()]);
    }

    #[test]
    fn blank_node_superclasses_are_not_classes() {
        let h = parse_ntriples(
            "<http://x.org/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://x.org/Polypeptide> .\n\
             <http://x.org/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:b0 .\n",
        )
        .unwrap();
        assert_eq!(h.parents_of("protein"), ["polypeptide".to_string()]);
        assert!(!h.contains("b0"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn rdf_xml_file_loads_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".owl").tempfile().unwrap();
        write!(
            file,
            r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <owl:Class rdf:about="http://w3id.org/biolink/vocab/Gene">
    <rdfs:subClassOf rdf:resource="http://w3id.org/biolink/vocab/BiologicalEntity"/>
  </owl:Class>
</rdf:RDF>
"#
        )
        .unwrap();
        let h = load_ontology_file(file.path()).unwrap();
        assert_eq!(h.parents_of("gene"), ["biological entity".to_string()]);
    }

    #[test]
    fn from_pairs_deduplicates_parents() {
        let h = OntologyHierarchy::from_pairs([("gene", "named thing"), ("Gene", "NamedThing")]);
        assert_eq!(h.parents_of("gene"), ["named thing".to_string()]);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn loader_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "disease: disease or phenotypic feature").unwrap();
        let h = load_ontology_file(file.path()).unwrap();
        assert_eq!(
            h.parents_of("disease"),
            ["disease or phenotypic feature".to_string()]
        );

        let err = load_ontology_file(Path::new("hierarchy.csv")).unwrap_err();
        assert!(matches!(err, OntologyError::UnsupportedFormat(ext) if ext == "csv"));
    }
}
