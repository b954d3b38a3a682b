//! Type hierarchy: an arena of nodes linked by parent and alias indices.
//!
//! Nodes come from two places:
//!
//! - schema types (and their aliases), interned first, and
//! - external ontology classes, merged afterwards. An ontology class whose
//!   normalized name matches a schema type is the same node.
//!
//! [`HierarchyBuilder::build`] folds alias nodes into their targets, rejects
//! cycles (iterative DFS, so deep hierarchies cannot overflow the stack), and
//! precomputes every node's ancestor chain, nearest first.

use std::collections::{HashMap, HashSet, VecDeque};

use biocanon_ontology::{normalize_class_name, OntologyHierarchy};

use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    Schema,
    Ontology,
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub name: String,
    pub origin: NodeOrigin,
    /// Direct parents, declared order. Always canonical after `build`.
    pub parents: Vec<NodeId>,
    pub alias_of: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    nodes: Vec<HierarchyNode>,
    by_name: HashMap<String, NodeId>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&normalize_class_name(name)))
            .copied()
    }

    /// Intern `name`, returning the existing node when it is already known.
    /// Ontology classes also match schema types by normalized name.
    pub fn intern(&mut self, name: &str, origin: NodeOrigin) -> NodeId {
        let existing = match origin {
            NodeOrigin::Schema => self.by_name.get(name).copied(),
            NodeOrigin::Ontology => self.find(name),
        };
        if let Some(id) = existing {
            if origin == NodeOrigin::Schema {
                self.nodes[id.index()].origin = NodeOrigin::Schema;
            }
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(HierarchyNode {
            name: name.to_string(),
            origin,
            parents: Vec::new(),
            alias_of: None,
        });
        self.by_name.insert(name.to_string(), id);
        self.by_name.entry(normalize_class_name(name)).or_insert(id);
        id
    }

    pub fn add_parent(&mut self, child: NodeId, parent: NodeId) {
        let parents = &mut self.nodes[child.index()].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    pub fn set_alias(&mut self, alias: NodeId, target: NodeId) {
        self.nodes[alias.index()].alias_of = Some(target);
    }

    /// Intern every ontology class and return the `(child, parent)` links
    /// still to be added. Callers add schema `is_a` links first so declared
    /// parents come ahead of ontology parents.
    pub fn intern_ontology(&mut self, ontology: &OntologyHierarchy) -> Vec<(NodeId, NodeId)> {
        let mut links = Vec::new();
        for (class, parents) in &ontology.parents {
            let child = self.intern(class, NodeOrigin::Ontology);
            for parent in parents {
                let parent = self.intern(parent, NodeOrigin::Ontology);
                links.push((child, parent));
            }
        }
        links
    }

    pub fn build(mut self) -> Result<Hierarchy, SchemaError> {
        let canonical = self.resolve_aliases()?;

        // Aliases carry no links of their own: move them onto the target and
        // point every parent reference at canonical nodes.
        for idx in 0..self.nodes.len() {
            let parents = std::mem::take(&mut self.nodes[idx].parents);
            let owner = canonical[idx];
            for parent in parents {
                let parent = canonical[parent.index()];
                let list = &mut self.nodes[owner.index()].parents;
                if !list.contains(&parent) {
                    list.push(parent);
                }
            }
        }
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if canonical[idx].index() != idx {
                node.alias_of = Some(canonical[idx]);
            }
        }

        if let Some(cycle) = find_cycle(&self.nodes) {
            return Err(SchemaError::HierarchyCycle {
                cycle: cycle
                    .into_iter()
                    .map(|id| self.nodes[id.index()].name.clone())
                    .collect(),
            });
        }

        let ancestors = (0..self.nodes.len())
            .map(|idx| ancestors_nearest_first(&self.nodes, NodeId(idx as u32)))
            .collect();

        Ok(Hierarchy {
            nodes: self.nodes,
            by_name: self.by_name,
            ancestors,
        })
    }

    /// Canonical node for every node, following alias chains.
    fn resolve_aliases(&self) -> Result<Vec<NodeId>, SchemaError> {
        let mut canonical = Vec::with_capacity(self.nodes.len());
        for idx in 0..self.nodes.len() {
            let mut path = vec![NodeId(idx as u32)];
            let mut current = NodeId(idx as u32);
            while let Some(next) = self.nodes[current.index()].alias_of {
                if let Some(pos) = path.iter().position(|&id| id == next) {
                    let mut cycle: Vec<String> = path[pos..]
                        .iter()
                        .map(|id| self.nodes[id.index()].name.clone())
                        .collect();
                    cycle.push(self.nodes[next.index()].name.clone());
                    return Err(SchemaError::HierarchyCycle { cycle });
                }
                path.push(next);
                current = next;
            }
            canonical.push(current);
        }
        Ok(canonical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// First cycle found by a depth-first walk over parent links, as a node path
/// ending where it started.
fn find_cycle(nodes: &[HierarchyNode]) -> Option<Vec<NodeId>> {
    let mut color = vec![Color::White; nodes.len()];

    for start in 0..nodes.len() {
        if color[start] != Color::White {
            continue;
        }
        color[start] = Color::Gray;
        // (node, index of the next parent to visit)
        let mut stack: Vec<(NodeId, usize)> = vec![(NodeId(start as u32), 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(&parent) = nodes[node.index()].parents.get(next) else {
                color[node.index()] = Color::Black;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match color[parent.index()] {
                Color::White => {
                    color[parent.index()] = Color::Gray;
                    stack.push((parent, 0));
                }
                Color::Gray => {
                    let pos = stack.iter().position(|(id, _)| *id == parent).unwrap_or(0);
                    let mut cycle: Vec<NodeId> = stack[pos..].iter().map(|(id, _)| *id).collect();
                    cycle.push(parent);
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
    }
    None
}

fn ancestors_nearest_first(nodes: &[HierarchyNode], start: NodeId) -> Vec<NodeId> {
    let mut seen: HashSet<NodeId> = HashSet::from([start]);
    let mut queue: VecDeque<NodeId> = nodes[start.index()].parents.iter().copied().collect();
    let mut out = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        queue.extend(nodes[id.index()].parents.iter().copied());
    }
    out
}

/// Immutable, validated hierarchy.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
    by_name: HashMap<String, NodeId>,
    ancestors: Vec<Vec<NodeId>>,
}

impl Hierarchy {
    /// Canonical node for a name (exact, then normalized), following aliases.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&normalize_class_name(name)))
            .map(|&id| self.canonical(id))
    }

    pub fn canonical(&self, id: NodeId) -> NodeId {
        self.nodes[id.index()].alias_of.unwrap_or(id)
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[self.canonical(id).index()].parents
    }

    /// Every ancestor, nearest first, excluding the node itself.
    pub fn ancestors(&self, id: NodeId) -> &[NodeId] {
        &self.ancestors[self.canonical(id).index()]
    }

    pub fn ancestor_names(&self, id: NodeId) -> Vec<&str> {
        self.ancestors(id).iter().map(|&a| self.name(a)).collect()
    }

    /// Reflexive, alias-aware subtype test.
    pub fn is_a(&self, sub: NodeId, sup: NodeId) -> bool {
        let sub = self.canonical(sub);
        let sup = self.canonical(sup);
        sub == sup || self.ancestors[sub.index()].contains(&sup)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|idx| NodeId(idx as u32))
    }
}
