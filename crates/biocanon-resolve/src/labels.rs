//! Raw source label → canonical type.
//!
//! Matching is exact-string. Several types may accept the same label only
//! when every one of them is scoped to source tags and the scopes are
//! pairwise disjoint; anything else is rejected when the matcher is built.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::SchemaError;
use crate::registry::{TypeDef, TypeId};

#[derive(Debug, Clone)]
struct LabelBinding {
    type_id: TypeId,
    /// Source tags; empty = global.
    scope: Vec<String>,
}

impl LabelBinding {
    fn accepts(&self, source: Option<&str>) -> bool {
        if self.scope.is_empty() {
            return true;
        }
        source.is_some_and(|tag| self.scope.iter().any(|s| s == tag))
    }

    fn overlaps(&self, other: &LabelBinding) -> bool {
        if self.scope.is_empty() || other.scope.is_empty() {
            return true;
        }
        self.scope.iter().any(|s| other.scope.contains(s))
    }
}

/// One row of the reverse label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub label: String,
    pub scope: Vec<String>,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LabelMatcher {
    by_label: HashMap<String, Vec<LabelBinding>>,
}

impl LabelMatcher {
    pub fn build(types: &[TypeDef]) -> Result<Self, SchemaError> {
        let mut by_label: HashMap<String, Vec<LabelBinding>> = HashMap::new();

        for def in types {
            for label in &def.labels {
                let binding = LabelBinding {
                    type_id: def.id,
                    scope: def.scope.clone(),
                };
                let bindings = by_label.entry(label.clone()).or_default();
                if bindings.iter().any(|b| b.type_id == def.id) {
                    // Same label listed twice on one type.
                    continue;
                }
                if let Some(clash) = bindings.iter().find(|b| b.overlaps(&binding)) {
                    return Err(SchemaError::AmbiguousLabel {
                        label: label.clone(),
                        first: types[clash.type_id.index()].name.clone(),
                        second: def.name.clone(),
                    });
                }
                bindings.push(binding);
            }
        }

        Ok(Self { by_label })
    }

    /// At most one binding can accept a `(label, source)` pair.
    pub fn resolve(&self, label: &str, source: Option<&str>) -> Option<TypeId> {
        self.by_label
            .get(label)?
            .iter()
            .find(|b| b.accepts(source))
            .map(|b| b.type_id)
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Reverse label table, sorted by label then type.
    pub fn entries(&self, types: &[TypeDef]) -> Vec<LabelEntry> {
        let mut out: Vec<LabelEntry> = self
            .by_label
            .iter()
            .flat_map(|(label, bindings)| {
                bindings.iter().map(move |b| LabelEntry {
                    label: label.clone(),
                    scope: b.scope.clone(),
                    type_name: types[b.type_id.index()].name.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| (&a.label, &a.type_name).cmp(&(&b.label, &b.type_name)));
        out
    }
}
