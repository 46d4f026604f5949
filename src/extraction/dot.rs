//! DOT export of execution graphs.
//!
//! DOT files can be rendered with Graphviz tools. Loop-closing edges are
//! drawn dashed.

use super::graph::{EdgeKind, ExecutionGraph};
use petgraph::visit::EdgeRef;
use std::fmt::{self, Display, Formatter};

/// Wrapper for exporting an [`ExecutionGraph`] in DOT format.
///
/// # Example
///
/// ```rust
/// use chorex::ast::Behavior;
/// use chorex::extraction::{extract, Dot, ExtractionConfig};
/// use chorex::network::{Network, ProcessTerm};
/// use std::collections::BTreeSet;
///
/// let network = Network::new()
///     .with_process("a", ProcessTerm::main_only(Behavior::send("b", "m", Behavior::Termination)))
///     .with_process("b", ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)));
/// let result = extract(&network, &BTreeSet::new(), &ExtractionConfig::default()).unwrap();
/// println!("{}", Dot::new(&result.graphs[0]));
/// ```
pub struct Dot<'a>(&'a ExecutionGraph);

impl<'a> Dot<'a> {
    /// Creates a new DOT exporter for the given graph.
    pub fn new(graph: &'a ExecutionGraph) -> Self {
        Self(graph)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Display for Dot<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = &self.0.graph;
        write!(f, "digraph \"seg\" {{")?;

        if graph.node_count() > 0 {
            writeln!(f)?;
        }

        let mut nodes: Vec<_> = graph.node_indices().collect();
        nodes.sort_by_key(|node| graph[*node].order);
        for node in &nodes {
            let state = &graph[*node];
            let shape = if *node == self.0.root { ", shape=box" } else { "" };
            writeln!(
                f,
                "    {} [label=\"{}\"{}];",
                state.order,
                escape(&state.network.to_string()),
                shape
            )?;
        }

        if graph.edge_count() > 0 {
            writeln!(f)?;
        }

        for node in &nodes {
            let mut edges: Vec<_> = graph.edges(*node).collect();
            edges.reverse();
            for edge in edges {
                let style = match edge.weight().kind {
                    EdgeKind::Step => "",
                    EdgeKind::Loop => ", style=dashed",
                };
                writeln!(
                    f,
                    "    {} -> {} [label=\"{}\"{}];",
                    graph[edge.source()].order,
                    graph[edge.target()].order,
                    escape(&edge.weight().label.to_string()),
                    style
                )?;
            }
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::graph::{Label, Seg, SegEdge, SegNode};
    use crate::ast::Interaction;
    use crate::network::Network;

    #[test]
    fn test_loop_edges_are_dashed() {
        let mut graph = Seg::default();
        let root = graph.add_node(SegNode {
            network: Network::new(),
            parent: None,
            order: 0,
        });
        graph.add_edge(
            root,
            root,
            SegEdge {
                label: Label::Interaction(Interaction::communication("p", "q", "e")),
                kind: EdgeKind::Loop,
            },
        );
        let execution = ExecutionGraph::new(graph, root, 0, 1);

        assert_eq!(
            Dot::new(&execution).to_string(),
            "digraph \"seg\" {\n    0 [label=\"\", shape=box];\n\n    0 -> 0 [label=\"p.e->q\", style=dashed];\n}"
        );
    }
}
