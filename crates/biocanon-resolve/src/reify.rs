//! Association endpoints and reification.
//!
//! An association with resolved endpoints becomes either
//!
//! - one edge (`represented_as: edge`), or
//! - a node keyed by the association id, plus two role edges pointing from
//!   the endpoints at it (`represented_as: node`).
//!
//! Endpoint types are checked against the declared alternatives with the
//! hierarchy's `is_a`, so a subtype of an allowed type is accepted.

use crate::error::{EndpointRole, RecordError};
use crate::identifier::normalize_endpoint_id;
use crate::model::{CanonicalEdge, CanonicalNode, EndpointRef, PropertyMap};
use crate::registry::{AssociationDef, Registry, TypeDef};

pub const ROLE_SOURCE: &str = "IS_SOURCE_OF";
pub const ROLE_TARGET: &str = "IS_TARGET_OF";

#[derive(Debug, Clone, PartialEq)]
pub enum Reified {
    Edge(CanonicalEdge),
    Node {
        node: CanonicalNode,
        source_edge: CanonicalEdge,
        target_edge: CanonicalEdge,
    },
}

impl Reified {
    pub fn into_parts(self) -> (Vec<CanonicalNode>, Vec<CanonicalEdge>) {
        match self {
            Reified::Edge(edge) => (Vec::new(), vec![edge]),
            Reified::Node {
                node,
                source_edge,
                target_edge,
            } => (vec![node], vec![source_edge, target_edge]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedEndpoint<'r> {
    pub id: String,
    pub type_def: &'r TypeDef,
}

/// Determine an endpoint's type and canonical id.
///
/// Type, in order of preference: the explicit `type`, the `label` matched
/// with the record's source tag, or (untyped references) the type whose
/// authorities include the id's CURIE prefix. Direct alternatives are tried
/// first, then their schema subtypes, where the prefix must pick exactly one
/// type. An unprefixed untyped id is accepted only when exactly one
/// alternative is a schema type.
pub fn resolve_endpoint<'r>(
    registry: &'r Registry,
    def: &TypeDef,
    assoc: &AssociationDef,
    role: EndpointRole,
    reference: &EndpointRef,
    source_tag: Option<&str>,
) -> Result<ResolvedEndpoint<'r>, RecordError> {
    let unresolved = |reason: String| RecordError::UnresolvedEndpoint {
        type_name: def.name.clone(),
        role,
        id: reference.id.clone(),
        reason,
    };

    if reference.id.trim().is_empty() {
        return Err(unresolved("empty id".to_string()));
    }

    let type_def = if let Some(name) = &reference.type_name {
        registry
            .get(name)
            .ok_or_else(|| unresolved(format!("unknown type `{name}`")))?
    } else if let Some(label) = &reference.label {
        registry
            .by_label(label, source_tag)
            .ok_or_else(|| unresolved(format!("label `{label}` matches no type")))?
    } else {
        let candidates: Vec<&TypeDef> = assoc
            .allowed(role)
            .iter()
            .filter_map(|&node| registry.type_for_node(node))
            .collect();
        match reference.id.split_once(':') {
            Some((prefix, _)) => {
                let uses_prefix =
                    |t: &&TypeDef| t.authorities.iter().any(|a| a.eq_ignore_ascii_case(prefix));
                match candidates.iter().copied().find(uses_prefix) {
                    Some(direct) => direct,
                    None => {
                        let hierarchy = registry.hierarchy();
                        let allowed = assoc.allowed(role);
                        let mut subtypes = registry
                            .types()
                            .filter(|t| allowed.iter().any(|&a| hierarchy.is_a(t.node, a)))
                            .filter(uses_prefix);
                        match (subtypes.next(), subtypes.next()) {
                            (Some(only), None) => only,
                            (Some(_), Some(_)) => {
                                return Err(unresolved(format!(
                                    "authority `{prefix}` is used by several allowed types"
                                )))
                            }
                            (None, _) => {
                                return Err(unresolved(format!(
                                    "no allowed type uses authority `{prefix}`"
                                )))
                            }
                        }
                    }
                }
            }
            None if candidates.len() == 1 => candidates[0],
            None => return Err(unresolved("untyped id without a prefix".to_string())),
        }
    };

    Ok(ResolvedEndpoint {
        id: normalize_endpoint_id(&reference.id, type_def),
        type_def,
    })
}

pub fn check_endpoint(
    registry: &Registry,
    def: &TypeDef,
    assoc: &AssociationDef,
    role: EndpointRole,
    endpoint: &ResolvedEndpoint<'_>,
) -> Result<(), RecordError> {
    let hierarchy = registry.hierarchy();
    let allowed = assoc.allowed(role);
    if allowed
        .iter()
        .any(|&a| hierarchy.is_a(endpoint.type_def.node, a))
    {
        return Ok(());
    }
    Err(RecordError::EndpointMismatch {
        type_name: def.name.clone(),
        role,
        endpoint_type: endpoint.type_def.name.clone(),
        expected: allowed
            .iter()
            .map(|&a| hierarchy.name(a).to_string())
            .collect(),
    })
}

pub fn reify(
    def: &TypeDef,
    assoc: &AssociationDef,
    id: String,
    source: String,
    target: String,
    properties: PropertyMap,
) -> Reified {
    if def.is_reified() {
        let role_edge = |label: &str, from: String| CanonicalEdge {
            id: None,
            type_name: def.name.clone(),
            label: label.to_string(),
            source: from,
            target: id.clone(),
            properties: PropertyMap::new(),
        };
        let source_edge = role_edge(ROLE_SOURCE, source);
        let target_edge = role_edge(ROLE_TARGET, target);
        Reified::Node {
            node: CanonicalNode {
                id,
                type_name: def.name.clone(),
                properties,
            },
            source_edge,
            target_edge,
        }
    } else {
        Reified::Edge(CanonicalEdge {
            id: Some(id),
            type_name: def.name.clone(),
            label: assoc.edge_label.clone(),
            source,
            target,
            properties,
        })
    }
}
