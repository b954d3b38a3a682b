//! OWL/RDF parsing (class hierarchy subset).
//!
//! Triples are read with sophia (N-Triples, Turtle, RDF/XML). Only what the
//! resolver needs is kept: named classes, their `rdfs:label`, and
//! `rdfs:subClassOf` links between named classes. Blank-node superclasses
//! (OWL restrictions, unions) and everything else in the input (properties,
//! individuals, annotations) are skipped.
//!
//! ```text
//! <http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://w3id.org/biolink/vocab/Polypeptide> .
//! <http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#label> "protein"@en .
//! ```

use serde::{Deserialize, Serialize};
use sophia::api::prelude::*;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::io::BufRead;

use crate::OntologyError;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";

// ============================================================================
// OWL Ontology Types
// ============================================================================

/// Parsed OWL class hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ontology {
    pub classes: Vec<OwlClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwlClass {
    pub iri: String,
    pub label: Option<String>,
    pub subclass_of: Vec<String>,
}

impl OwlClass {
    fn new(iri: &str) -> Self {
        Self {
            iri: iri.to_string(),
            label: None,
            subclass_of: Vec::new(),
        }
    }
}

impl Ontology {
    pub fn class(&self, iri: &str) -> Option<&OwlClass> {
        self.classes.iter().find(|c| c.iri == iri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfSyntax {
    NTriples,
    Turtle,
    RdfXml,
}

impl fmt::Display for RdfSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RdfSyntax::NTriples => "N-Triples",
            RdfSyntax::Turtle => "Turtle",
            RdfSyntax::RdfXml => "RDF/XML",
        })
    }
}

// ============================================================================
// Terms
// ============================================================================

/// Just enough of an RDF term to build the class table.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RdfTerm {
    Iri(String),
    Blank,
    Literal(String),
}

/// Read a term from its N-Triples display form (`<iri>`, `_:b0`,
/// `"text"@en`, `"text"^^<dt>`).
fn parse_term_display(term: &str) -> Option<RdfTerm> {
    let s = term.trim();
    if let Some(iri) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Some(RdfTerm::Iri(iri.to_string()));
    }
    if s.starts_with("_:") {
        return Some(RdfTerm::Blank);
    }
    let body = s.strip_prefix('"')?;
    let mut lexical = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Some(RdfTerm::Literal(lexical)),
            '\\' => match chars.next()? {
                'n' => lexical.push('\n'),
                't' => lexical.push('\t'),
                'r' => lexical.push('\r'),
                other => lexical.push(other),
            },
            other => lexical.push(other),
        }
    }
    None
}

#[derive(Debug, Default)]
struct ClassTable {
    classes: BTreeMap<String, OwlClass>,
}

impl ClassTable {
    fn entry(&mut self, iri: &str) -> &mut OwlClass {
        self.classes
            .entry(iri.to_string())
            .or_insert_with(|| OwlClass::new(iri))
    }

    fn add(&mut self, subject: &str, predicate: &str, object: &str) {
        let Some(RdfTerm::Iri(subject)) = parse_term_display(subject) else {
            return;
        };
        let Some(RdfTerm::Iri(predicate)) = parse_term_display(predicate) else {
            return;
        };
        let object = parse_term_display(object);

        match (predicate.as_str(), object) {
            (RDF_TYPE, Some(RdfTerm::Iri(class))) if class == OWL_CLASS || class == RDFS_CLASS => {
                self.entry(&subject);
            }
            (RDFS_SUBCLASS_OF, Some(RdfTerm::Iri(parent))) => {
                self.entry(&parent);
                let class = self.entry(&subject);
                if !class.subclass_of.contains(&parent) {
                    class.subclass_of.push(parent);
                }
            }
            // Anonymous superclass (restriction); the subject is still a class.
            (RDFS_SUBCLASS_OF, Some(RdfTerm::Blank)) => {
                self.entry(&subject);
            }
            (RDFS_LABEL, Some(RdfTerm::Literal(label))) => {
                let class = self.entry(&subject);
                if class.label.is_none() && !label.trim().is_empty() {
                    class.label = Some(label);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Ontology {
        Ontology {
            classes: self.classes.into_values().collect(),
        }
    }
}

// ============================================================================
// OWL Parser
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct OwlParser;

impl OwlParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_bufread<R: BufRead>(&self, reader: R, syntax: RdfSyntax) -> Result<Ontology, OwlError> {
        let mut table = ClassTable::default();
        let syntax_error = |e: &dyn fmt::Display| OwlError::Syntax {
            syntax,
            message: e.to_string(),
        };

        match syntax {
            RdfSyntax::NTriples => {
                let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
                parser
                    .try_for_each_triple(|t| -> Result<(), Infallible> {
                        table.add(&t.s().to_string(), &t.p().to_string(), &t.o().to_string());
                        Ok(())
                    })
                    .map_err(|e| syntax_error(&e))?;
            }
            RdfSyntax::Turtle => {
                let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
                parser
                    .try_for_each_triple(|t| -> Result<(), Infallible> {
                        table.add(&t.s().to_string(), &t.p().to_string(), &t.o().to_string());
                        Ok(())
                    })
                    .map_err(|e| syntax_error(&e))?;
            }
            RdfSyntax::RdfXml => {
                let mut parser = sophia::xml::parser::parse_bufread(reader);
                parser
                    .try_for_each_triple(|t| -> Result<(), Infallible> {
                        table.add(&t.s().to_string(), &t.p().to_string(), &t.o().to_string());
                        Ok(())
                    })
                    .map_err(|e| syntax_error(&e))?;
            }
        }

        Ok(table.finish())
    }

    pub fn parse_str(&self, content: &str, syntax: RdfSyntax) -> Result<Ontology, OwlError> {
        self.parse_bufread(content.as_bytes(), syntax)
    }

    pub fn parse_ntriples(&self, content: &str) -> Result<Ontology, OwlError> {
        self.parse_str(content, RdfSyntax::NTriples)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OwlError {
    #[error("invalid {syntax}: {message}")]
    Syntax { syntax: RdfSyntax, message: String },
}

impl From<OwlError> for OntologyError {
    fn from(value: OwlError) -> Self {
        match value {
            OwlError::Syntax { syntax, message } => OntologyError::Rdf { syntax, message },
        }
    }
}

/// Last path/fragment segment of an IRI (or the local part of a CURIE).
pub fn local_name(iri: &str) -> String {
    iri.rsplit(&['/', '#', ':'][..])
        .next()
        .unwrap_or(iri)
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_NTRIPLES: &str = r#"
# biolink excerpt
<http://w3id.org/biolink/vocab/NamedThing> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://w3id.org/biolink/vocab/Polypeptide> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://w3id.org/biolink/vocab/NamedThing> .
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://w3id.org/biolink/vocab/Polypeptide> .
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:b0 .
_:b0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Restriction> .
<http://w3id.org/biolink/vocab/Protein> <http://www.w3.org/2000/01/rdf-schema#label> "protein"@en .
<http://w3id.org/biolink/vocab/Protein> <http://w3id.org/biolink/vocab/description> "A gene product" .
"#;

    const SAMPLE_TURTLE: &str = r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix biolink: <http://w3id.org/biolink/vocab/> .

biolink:GeneProduct a owl:Class ;
    rdfs:label "gene product"@en ;
    rdfs:subClassOf biolink:BiologicalEntity .

biolink:Protein a owl:Class ;
    rdfs:subClassOf biolink:GeneProduct ,
        [ a owl:Restriction ;
          owl:onProperty biolink:has_part ;
          owl:someValuesFrom biolink:Polypeptide ] .
"#;

    const SAMPLE_RDF_XML: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <owl:Class rdf:about="http://w3id.org/biolink/vocab/Protein">
    <rdfs:label xml:lang="en">protein</rdfs:label>
    <rdfs:subClassOf rdf:resource="http://w3id.org/biolink/vocab/GeneProduct"/>
    <rdfs:subClassOf>
      <owl:Restriction>
        <owl:onProperty rdf:resource="http://w3id.org/biolink/vocab/has_part"/>
        <owl:someValuesFrom rdf:resource="http://w3id.org/biolink/vocab/Polypeptide"/>
      </owl:Restriction>
    </rdfs:subClassOf>
  </owl:Class>
</rdf:RDF>
"#;

    const PROTEIN: &str = "http://w3id.org/biolink/vocab/Protein";

    #[test]
    fn parses_subclass_links_and_labels() {
        let ontology = OwlParser::new().parse_ntriples(SAMPLE_NTRIPLES).unwrap();

        assert_eq!(ontology.classes.len(), 3);
        let protein = ontology.class(PROTEIN).expect("protein");
        assert_eq!(protein.label.as_deref(), Some("protein"));
        assert_eq!(
            protein.subclass_of,
            vec!["http://w3id.org/biolink/vocab/Polypeptide".to_string()]
        );
    }

    #[test]
    fn turtle_skips_restriction_superclasses() {
        let ontology = OwlParser::new()
            .parse_str(SAMPLE_TURTLE, RdfSyntax::Turtle)
            .unwrap();

        let protein = ontology.class(PROTEIN).expect("protein");
        assert_eq!(
            protein.subclass_of,
            vec!["http://w3id.org/biolink/vocab/GeneProduct".to_string()]
        );
        let gene_product = ontology
            .class("http://w3id.org/biolink/vocab/GeneProduct")
            .expect("gene product");
        assert_eq!(gene_product.label.as_deref(), Some("gene product"));
        assert!(ontology
            .class("http://w3id.org/biolink/vocab/Polypeptide")
            .is_none());
    }

    #[test]
    fn rdf_xml_classes() {
        let ontology = OwlParser::new()
            .parse_str(SAMPLE_RDF_XML, RdfSyntax::RdfXml)
            .unwrap();

        assert_eq!(ontology.classes.len(), 2);
        let protein = ontology.class(PROTEIN).expect("protein");
        assert_eq!(protein.label.as_deref(), Some("protein"));
        assert_eq!(
            protein.subclass_of,
            vec!["http://w3id.org/biolink/vocab/GeneProduct".to_string()]
        );
    }

    #[test]
    fn rejects_truncated_triples() {
        let err = OwlParser::new()
            .parse_ntriples("<http://x.org/a> <http://x.org/b> .\n")
            .unwrap_err();
        assert!(err.to_string().contains("invalid N-Triples"), "{err}");
    }

    #[test]
    fn term_display_forms() {
        assert_eq!(
            parse_term_display("<http://x.org/a>"),
            Some(RdfTerm::Iri("http://x.org/a".into()))
        );
        assert_eq!(parse_term_display("_:b0"), Some(RdfTerm::Blank));
        assert_eq!(
            parse_term_display(r#""gene \"product\""@en"#),
            Some(RdfTerm::Literal("gene \"product\"".into()))
        );
        assert_eq!(
            parse_term_display(r#""42"^^<http://www.w3.org/2001/XMLSchema#integer>"#),
            Some(RdfTerm::Literal("42".into()))
        );
        assert_eq!(parse_term_display("\"unterminated"), None);
    }

    #[test]
    fn local_name_handles_iris_and_curies() {
        assert_eq!(local_name("http://w3id.org/biolink/vocab/Protein"), "Protein");
        assert_eq!(local_name("http://example.org/onto#Gene"), "Gene");
        assert_eq!(local_name("biolink:Disease"), "Disease");
    }
}
