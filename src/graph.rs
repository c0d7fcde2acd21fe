//! Entity Graph
//!
//! petgraph view of a registry: nodes are entities, edges are `extends`
//! links (child -> parent) and relation references (owner -> target).
//! Used for cycle detection, parents-first resolution order and DOT export.

use std::collections::HashMap;

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{Result, SchemaError};
use crate::registry::SchemaRegistry;
use crate::schema::Cardinality;

/// Kind of edge between two entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    Extends,
    Reference { name: String, cardinality: Cardinality },
}

/// Graph of entity inheritance and references
pub struct InheritanceGraph {
    graph: DiGraph<String, EdgeKind>,
    indices: HashMap<String, NodeIndex>,
}

impl InheritanceGraph {
    /// Build from a registry. Edges to unregistered entities are skipped;
    /// [`SchemaRegistry::verify`] reports those.
    pub fn build(registry: &SchemaRegistry) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for name in registry.names() {
            let idx = graph.add_node(name.to_string());
            indices.insert(name.to_string(), idx);
        }

        for def in registry.definitions() {
            let from = indices[&def.name];
            if let Some(to) = def.extends.as_ref().and_then(|p| indices.get(p)) {
                graph.add_edge(from, *to, EdgeKind::Extends);
            }
            for relation in &def.relations {
                if let Some(to) = indices.get(&relation.target) {
                    graph.add_edge(
                        from,
                        *to,
                        EdgeKind::Reference {
                            name: relation.name.clone(),
                            cardinality: relation.cardinality,
                        },
                    );
                }
            }
        }

        Self { graph, indices }
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The graph restricted to `extends` edges
    fn extends_graph(&self) -> DiGraph<String, ()> {
        self.graph.filter_map(
            |_, name| Some(name.clone()),
            |_, kind| matches!(kind, EdgeKind::Extends).then_some(()),
        )
    }

    /// Groups of entities whose extends chains form a cycle
    pub fn extends_cycles(&self) -> Vec<Vec<String>> {
        let extends = self.extends_graph();
        kosaraju_scc(&extends)
            .into_iter()
            .filter(|scc| scc.len() > 1 || extends.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> = scc.into_iter().map(|idx| extends[idx].clone()).collect();
                members.sort();
                members
            })
            .collect()
    }

    /// Entity names with every parent ahead of its subtypes
    pub fn resolution_order(&self) -> Result<Vec<String>> {
        let extends = self.extends_graph();
        match toposort(&extends, None) {
            Ok(order) => Ok(order.into_iter().rev().map(|idx| extends[idx].clone()).collect()),
            Err(cycle) => {
                let entity = extends[cycle.node_id()].clone();
                let mut chain = self
                    .extends_cycles()
                    .into_iter()
                    .find(|group| group.contains(&entity))
                    .unwrap_or_else(|| vec![entity.clone()]);
                chain.push(chain[0].clone());
                Err(SchemaError::CyclicInheritance { entity, chain })
            }
        }
    }

    /// Entities holding a relation to `name`, with the relation name
    pub fn referenced_by(&self, name: &str) -> Vec<(String, String)> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut refs: Vec<(String, String)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|edge| match edge.weight() {
                EdgeKind::Reference { name, .. } => Some((self.graph[edge.source()].clone(), name.clone())),
                EdgeKind::Extends => None,
            })
            .collect();
        refs.sort();
        refs
    }

    /// Export to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph EntityGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10, fillcolor=\"#E3F2FD\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n");
        output.push('\n');

        for idx in self.graph.node_indices() {
            output.push_str(&format!("  \"{}\";\n", self.graph[idx]));
        }
        output.push('\n');

        for edge in self.graph.edge_references() {
            let source = &self.graph[edge.source()];
            let target = &self.graph[edge.target()];
            match edge.weight() {
                EdgeKind::Extends => {
                    output.push_str(&format!(
                        "  \"{}\" -> \"{}\" [arrowhead=empty, style=dashed, label=\"extends\"];\n",
                        source, target
                    ));
                }
                EdgeKind::Reference { name, cardinality } => {
                    let arrow = match cardinality {
                        Cardinality::One => "normal",
                        Cardinality::Many => "crow",
                    };
                    output.push_str(&format!(
                        "  \"{}\" -> \"{}\" [arrowhead={}, label=\"{}\"];\n",
                        source, target, arrow, name
                    ));
                }
            }
        }

        output.push_str("}\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDef, FieldDef, FieldType, RelationDef};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_all([
                EntityDef::extending("ConcussionProtocol", "Motivation")
                    .field(FieldDef::new("playerId", FieldType::String).required())
                    .relation(RelationDef::one("game", "Game")),
                EntityDef::new("Motivation").field(FieldDef::new("description", FieldType::String).required()),
                EntityDef::new("Game"),
                EntityDef::new("FollowUp").relation(RelationDef::one("motivation", "Motivation").optional()),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn test_counts() {
        let graph = InheritanceGraph::build(&registry());
        assert_eq!(graph.entity_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.extends_cycles().is_empty());
    }

    #[test]
    fn test_resolution_order_puts_parent_first() {
        let order = InheritanceGraph::build(&registry()).resolution_order().unwrap();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("Motivation") < pos("ConcussionProtocol"));
    }

    #[test]
    fn test_cycles() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_all([
                EntityDef::extending("A", "B"),
                EntityDef::extending("B", "A"),
                EntityDef::extending("C", "C"),
            ])
            .unwrap();
        let graph = InheritanceGraph::build(&registry);

        let mut cycles = graph.extends_cycles();
        cycles.sort();
        assert_eq!(cycles, vec![vec!["A".to_string(), "B".to_string()], vec!["C".to_string()]]);
        assert!(matches!(graph.resolution_order(), Err(SchemaError::CyclicInheritance { .. })));
    }

    #[test]
    fn test_referenced_by() {
        let graph = InheritanceGraph::build(&registry());
        assert_eq!(
            graph.referenced_by("Motivation"),
            vec![("FollowUp".to_string(), "motivation".to_string())]
        );
        assert!(graph.referenced_by("FollowUp").is_empty());
        assert!(graph.referenced_by("Nobody").is_empty());
    }

    #[test]
    fn test_dot_export() {
        let dot = InheritanceGraph::build(&registry()).to_dot();
        assert!(dot.starts_with("digraph EntityGraph {"));
        assert!(dot.contains("\"ConcussionProtocol\" -> \"Motivation\" [arrowhead=empty"));
        assert!(dot.contains("\"ConcussionProtocol\" -> \"Game\" [arrowhead=normal, label=\"game\"]"));
    }
}
