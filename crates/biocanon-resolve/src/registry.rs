//! Schema registry: validated, immutable type definitions.
//!
//! [`Registry::load`] is a single synchronous pass over a parsed
//! [`SchemaConfig`] (plus an optional ontology) that either fails with the
//! first [`SchemaError`] or yields a registry safe to share read-only across
//! any number of resolution workers.
//!
//! Load order:
//!
//! 1. resolve `synonym_for` chains and fold every alias into its target,
//! 2. validate each canonical declaration on its own,
//! 3. build the hierarchy (schema types, aliases, ontology classes, `is_a`),
//! 4. resolve association endpoint constraints against the hierarchy,
//! 5. build the label matcher (rejects overlapping label sets).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use biocanon_dsl::{load_schema_file, parse_schema_yaml, PropertyDecl, Representation, SchemaConfig, TypeDecl};
use biocanon_ontology::OntologyHierarchy;
use serde::Serialize;
use tracing::info;

use crate::error::{EndpointRole, SchemaError};
use crate::hierarchy::{Hierarchy, HierarchyBuilder, NodeId, NodeOrigin};
use crate::labels::{LabelEntry, LabelMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct AssociationDef {
    /// Allowed source endpoint types (any one, ancestry-aware).
    pub source: Vec<NodeId>,
    pub target: Vec<NodeId>,
    pub edge_label: String,
    pub key_properties: Vec<String>,
}

impl AssociationDef {
    pub fn allowed(&self, role: EndpointRole) -> &[NodeId] {
        match role {
            EndpointRole::Source => &self.source,
            EndpointRole::Target => &self.target,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Entity,
    Association(AssociationDef),
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeId,
    pub name: String,
    pub node: NodeId,
    pub representation: Representation,
    pub kind: TypeKind,
    /// Identifier authorities, highest priority first.
    pub authorities: Vec<String>,
    pub labels: Vec<String>,
    pub scope: Vec<String>,
    pub properties: BTreeMap<String, PropertyDecl>,
    pub aliases: Vec<String>,
}

impl TypeDef {
    pub fn association(&self) -> Option<&AssociationDef> {
        match &self.kind {
            TypeKind::Association(assoc) => Some(assoc),
            TypeKind::Entity => None,
        }
    }

    pub fn is_association(&self) -> bool {
        matches!(self.kind, TypeKind::Association(_))
    }

    /// Associations represented as nodes are reified.
    pub fn is_reified(&self) -> bool {
        self.is_association() && self.representation == Representation::Node
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    types: Vec<TypeDef>,
    by_name: HashMap<String, TypeId>,
    by_node: HashMap<NodeId, TypeId>,
    hierarchy: Hierarchy,
    labels: LabelMatcher,
    fingerprint: String,
}

impl Registry {
    pub fn load(
        config: &SchemaConfig,
        ontology: Option<&OntologyHierarchy>,
    ) -> Result<Self, SchemaError> {
        // --- synonyms ------------------------------------------------------
        let mut canonical_of: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, decl) in &config.types {
            if decl.synonym_for.is_some() {
                canonical_of.insert(name.as_str(), resolve_synonym(config, name)?);
            }
        }

        let mut merged: BTreeMap<&str, TypeDecl> = config
            .types
            .iter()
            .filter(|(_, decl)| decl.synonym_for.is_none())
            .map(|(name, decl)| (name.as_str(), decl.clone()))
            .collect();
        let mut aliases_of: HashMap<&str, Vec<String>> = HashMap::new();
        for (&alias, &target) in &canonical_of {
            let Some(target_decl) = merged.get_mut(target) else {
                continue;
            };
            merge_alias(&config.types[alias], target_decl).map_err(|field| {
                SchemaError::SynonymConflict {
                    type_name: alias.to_string(),
                    target: target.to_string(),
                    field,
                }
            })?;
            aliases_of.entry(target).or_default().push(alias.to_string());
        }

        // --- per-declaration checks ----------------------------------------
        let mut representations: BTreeMap<&str, Representation> = BTreeMap::new();
        for (&name, decl) in &merged {
            representations.insert(name, validate_decl(name, decl)?);
        }

        // --- hierarchy -----------------------------------------------------
        let mut builder = HierarchyBuilder::new();
        let mut node_of: HashMap<&str, NodeId> = HashMap::new();
        for &name in merged.keys() {
            node_of.insert(name, builder.intern(name, NodeOrigin::Schema));
        }
        for (&alias, &target) in &canonical_of {
            let alias_node = builder.intern(alias, NodeOrigin::Schema);
            builder.set_alias(alias_node, node_of[target]);
        }
        let ontology_links = ontology
            .map(|o| builder.intern_ontology(o))
            .unwrap_or_default();
        for (&name, decl) in &merged {
            for parent in &decl.is_a {
                let parent_node = builder.find(parent).ok_or_else(|| SchemaError::UndefinedParent {
                    type_name: name.to_string(),
                    parent: parent.clone(),
                })?;
                builder.add_parent(node_of[name], parent_node);
            }
        }
        for (child, parent) in ontology_links {
            builder.add_parent(child, parent);
        }
        let hierarchy = builder.build()?;

        // --- type definitions ----------------------------------------------
        let mut types = Vec::with_capacity(merged.len());
        for (idx, (&name, decl)) in merged.iter().enumerate() {
            let kind = if decl.is_association() {
                let endpoints = |role: EndpointRole, names: &[String]| {
                    names
                        .iter()
                        .map(|n| {
                            hierarchy
                                .lookup(n)
                                .ok_or_else(|| SchemaError::UndefinedEndpointType {
                                    type_name: name.to_string(),
                                    role,
                                    endpoint: n.clone(),
                                })
                        })
                        .collect::<Result<Vec<_>, _>>()
                };
                TypeKind::Association(AssociationDef {
                    source: endpoints(EndpointRole::Source, decl.source.as_slice())?,
                    target: endpoints(EndpointRole::Target, decl.target.as_slice())?,
                    edge_label: decl
                        .label_as_edge
                        .clone()
                        .unwrap_or_else(|| pascal_case(name)),
                    key_properties: decl.key_properties.clone(),
                })
            } else {
                TypeKind::Entity
            };

            types.push(TypeDef {
                id: TypeId(idx as u32),
                name: name.to_string(),
                node: node_of[name],
                representation: representations[name],
                kind,
                authorities: decl.preferred_id.clone(),
                labels: decl.input_label.clone(),
                scope: decl.scope.clone(),
                properties: decl.properties.clone(),
                aliases: aliases_of.remove(name).unwrap_or_default(),
            });
        }

        let mut by_name = HashMap::new();
        let mut by_node = HashMap::new();
        for def in &types {
            by_name.insert(def.name.clone(), def.id);
            by_node.insert(def.node, def.id);
            for alias in &def.aliases {
                by_name.insert(alias.clone(), def.id);
            }
        }

        let labels = LabelMatcher::build(&types)?;
        let fingerprint = config.digest();

        info!(
            types = types.len(),
            associations = types.iter().filter(|t| t.is_association()).count(),
            aliases = canonical_of.len(),
            labels = labels.len(),
            ontology_classes = ontology.map_or(0, OntologyHierarchy::len),
            fingerprint = %fingerprint,
            "schema registry loaded"
        );

        Ok(Self {
            types,
            by_name,
            by_node,
            hierarchy,
            labels,
            fingerprint,
        })
    }

    pub fn from_yaml_str(
        text: &str,
        ontology: Option<&OntologyHierarchy>,
    ) -> Result<Self, SchemaError> {
        let config = parse_schema_yaml(text)?;
        Self::load(&config, ontology)
    }

    pub fn from_file(path: &Path, ontology: Option<&OntologyHierarchy>) -> Result<Self, SchemaError> {
        let config = load_schema_file(path)?;
        Self::load(&config, ontology)
    }

    /// Lookup by canonical name or alias (normalized names also match).
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.by_name
            .get(name)
            .or_else(|| self.by_node.get(&self.hierarchy.lookup(name)?))
            .map(|&id| &self.types[id.index()])
    }

    pub fn by_label(&self, label: &str, source: Option<&str>) -> Option<&TypeDef> {
        self.labels
            .resolve(label, source)
            .map(|id| &self.types[id.index()])
    }

    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn type_for_node(&self, node: NodeId) -> Option<&TypeDef> {
        self.by_node
            .get(&self.hierarchy.canonical(node))
            .map(|&id| &self.types[id.index()])
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn label_matcher(&self) -> &LabelMatcher {
        &self.labels
    }

    pub fn label_entries(&self) -> Vec<LabelEntry> {
        self.labels.entries(&self.types)
    }

    /// `fnv1a64:` digest of the schema configuration.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Ancestor chain of a type, alias, or ontology class, nearest first.
    pub fn ancestors(&self, name: &str) -> Option<Vec<&str>> {
        let node = self.hierarchy.lookup(name)?;
        Some(self.hierarchy.ancestor_names(node))
    }

    pub fn is_a(&self, sub: &str, sup: &str) -> bool {
        match (self.hierarchy.lookup(sub), self.hierarchy.lookup(sup)) {
            (Some(a), Some(b)) => self.hierarchy.is_a(a, b),
            _ => false,
        }
    }
}

fn resolve_synonym<'a>(config: &'a SchemaConfig, name: &'a str) -> Result<&'a str, SchemaError> {
    let mut path: Vec<&str> = vec![name];
    let mut current = name;
    while let Some(target) = config
        .types
        .get(current)
        .and_then(|decl| decl.synonym_for.as_deref())
    {
        if !config.types.contains_key(target) {
            return Err(SchemaError::UndefinedSynonymTarget {
                type_name: current.to_string(),
                target: target.to_string(),
            });
        }
        if let Some(pos) = path.iter().position(|&p| p == target) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|p| p.to_string()).collect();
            cycle.push(target.to_string());
            return Err(SchemaError::HierarchyCycle { cycle });
        }
        path.push(target);
        current = target;
    }
    Ok(current)
}

/// Fold an alias declaration into its target. Fields only the alias declares
/// are taken over; labels are unioned; anything both declare must agree.
fn merge_alias(alias: &TypeDecl, target: &mut TypeDecl) -> Result<(), &'static str> {
    fn merge_option<T: Clone + PartialEq>(
        field: &'static str,
        alias: &Option<T>,
        target: &mut Option<T>,
    ) -> Result<(), &'static str> {
        match (alias, target.as_ref()) {
            (None, _) => Ok(()),
            (Some(a), None) => {
                *target = Some(a.clone());
                Ok(())
            }
            (Some(a), Some(t)) if a == t => Ok(()),
            _ => Err(field),
        }
    }

    fn merge_vec(
        field: &'static str,
        alias: &[String],
        target: &mut Vec<String>,
    ) -> Result<(), &'static str> {
        if alias.is_empty() || alias == target.as_slice() {
            Ok(())
        } else if target.is_empty() {
            *target = alias.to_vec();
            Ok(())
        } else {
            Err(field)
        }
    }

    merge_option("represented_as", &alias.represented_as, &mut target.represented_as)?;
    merge_vec("is_a", &alias.is_a, &mut target.is_a)?;
    merge_vec("preferred_id", &alias.preferred_id, &mut target.preferred_id)?;
    merge_vec("scope", &alias.scope, &mut target.scope)?;
    merge_vec("source", &alias.source, &mut target.source)?;
    merge_vec("target", &alias.target, &mut target.target)?;
    merge_option("label_as_edge", &alias.label_as_edge, &mut target.label_as_edge)?;
    merge_vec("key_properties", &alias.key_properties, &mut target.key_properties)?;

    for (name, decl) in &alias.properties {
        match target.properties.get(name) {
            None => {
                target.properties.insert(name.clone(), decl.clone());
            }
            Some(existing) if existing == decl => {}
            Some(_) => return Err("properties"),
        }
    }

    for label in &alias.input_label {
        if !target.input_label.contains(label) {
            target.input_label.push(label.clone());
        }
    }
    Ok(())
}

fn validate_decl(name: &str, decl: &TypeDecl) -> Result<Representation, SchemaError> {
    let Some(representation) = decl.represented_as else {
        return Err(SchemaError::MissingRepresentation {
            type_name: name.to_string(),
        });
    };

    match (decl.source.is_empty(), decl.target.is_empty()) {
        (false, true) => {
            return Err(SchemaError::IncompleteAssociation {
                type_name: name.to_string(),
                declared: EndpointRole::Source,
                missing: EndpointRole::Target,
            })
        }
        (true, false) => {
            return Err(SchemaError::IncompleteAssociation {
                type_name: name.to_string(),
                declared: EndpointRole::Target,
                missing: EndpointRole::Source,
            })
        }
        (true, true) if representation == Representation::Edge => {
            return Err(SchemaError::EntityAsEdge {
                type_name: name.to_string(),
            })
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for authority in &decl.preferred_id {
        if authority.trim().is_empty() {
            return Err(SchemaError::EmptyAuthority {
                type_name: name.to_string(),
            });
        }
        if !seen.insert(authority.to_ascii_lowercase()) {
            return Err(SchemaError::DuplicateAuthority {
                type_name: name.to_string(),
                authority: authority.clone(),
            });
        }
    }

    if let Some(missing) = decl
        .key_properties
        .iter()
        .find(|k| !decl.properties.contains_key(*k))
    {
        return Err(SchemaError::UnknownKeyProperty {
            type_name: name.to_string(),
            property: missing.clone(),
        });
    }

    Ok(representation)
}

/// Default edge label: `"gene to protein relationship"` → `"GeneToProteinRelationship"`.
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn registry_is_shareable_across_workers() {
        assert_send_sync::<Registry>();
    }

    #[test]
    fn pascal_case_edge_labels() {
        assert_eq!(pascal_case("gene to protein relationship"), "GeneToProteinRelationship");
        assert_eq!(pascal_case("protein-protein_interaction"), "ProteinProteinInteraction");
        assert_eq!(pascal_case("Encodes"), "Encodes");
    }

    #[test]
    fn alias_merge_takes_missing_fields_and_unions_labels() {
        let alias = TypeDecl {
            input_label: vec!["gene_alias".into(), "gene".into()],
            preferred_id: vec!["ncbigene".into()],
            ..TypeDecl::default()
        };
        let mut target = TypeDecl {
            represented_as: Some(Representation::Node),
            input_label: vec!["gene".into()],
            ..TypeDecl::default()
        };
        merge_alias(&alias, &mut target).unwrap();
        assert_eq!(target.input_label, vec!["gene", "gene_alias"]);
        assert_eq!(target.preferred_id, vec!["ncbigene"]);
    }

    #[test]
    fn alias_merge_rejects_disagreeing_fields() {
        let alias = TypeDecl {
            represented_as: Some(Representation::Edge),
            ..TypeDecl::default()
        };
        let mut target = TypeDecl {
            represented_as: Some(Representation::Node),
            ..TypeDecl::default()
        };
        assert_eq!(merge_alias(&alias, &mut target), Err("represented_as"));
    }
}
