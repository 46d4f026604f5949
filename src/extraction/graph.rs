// Symbolic execution graphs

use crate::ast::Interaction;
use crate::network::Network;
use petgraph::graph::DiGraph;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// The action an edge of the execution graph stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// A single interaction
    Interaction(Interaction),
    /// Several interactions fired as a single step
    Multicom(Vec<Interaction>),
    /// `process` found `expression` to hold
    Then {
        /// The branching process
        process: String,
        /// The tested expression
        expression: String,
    },
    /// `process` found `expression` not to hold
    Else {
        /// The branching process
        process: String,
        /// The tested expression
        expression: String,
    },
}

impl Label {
    /// Processes that act when this edge is taken.
    pub fn actors(&self) -> BTreeSet<&str> {
        match self {
            Label::Interaction(interaction) => {
                BTreeSet::from([interaction.sender(), interaction.receiver()])
            }
            Label::Multicom(interactions) => interactions
                .iter()
                .flat_map(|interaction| [interaction.sender(), interaction.receiver()])
                .collect(),
            Label::Then { process, .. } | Label::Else { process, .. } => {
                BTreeSet::from([process.as_str()])
            }
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Label::Interaction(interaction) => write!(f, "{interaction}"),
            Label::Multicom(interactions) => {
                write!(f, "(")?;
                for (i, interaction) in interactions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{interaction}")?;
                }
                write!(f, ")")
            }
            Label::Then {
                process,
                expression,
            } => write!(f, "if {process}.{expression}: then"),
            Label::Else {
                process,
                expression,
            } => write!(f, "if {process}.{expression}: else"),
        }
    }
}

/// A state of the execution graph
#[derive(Debug, Clone)]
pub struct SegNode {
    /// The state of every process
    pub network: Network,
    /// The node this state was first reached from
    pub parent: Option<NodeIndex>,
    /// Creation order, stable across node removals
    pub order: usize,
}

/// Whether an edge leads to a new state or back to a state on its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// To a state explored from here
    Step,
    /// Back to a state on the path
    Loop,
}

/// An edge of the execution graph
#[derive(Debug, Clone)]
pub struct SegEdge {
    /// The action taken
    pub label: Label,
    /// Whether the edge closes a loop
    pub kind: EdgeKind,
}

/// Execution graph with loop-closing edges.
pub type Seg = StableDiGraph<SegNode, SegEdge>;

/// Execution graph with every loop unrolled up to a depth limit.
pub type UnrolledGraph = DiGraph<Network, Label>;

/// Counters gathered while exploring one choreography
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    /// States kept in the graph
    pub nodes: usize,
    /// Edges of every kind
    pub edges: usize,
    /// Loop-closing edges
    pub loops: usize,
    /// Loops rejected because they starved a process
    pub bad_loops: usize,
}

/// The graphs explored while extracting one choreography
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// Graph with loops closed
    pub graph: Seg,
    /// The initial state
    pub root: NodeIndex,
    /// Tree of every path up to the configured depth
    pub unrolled: UnrolledGraph,
    /// The initial state in `unrolled`
    pub unrolled_root: petgraph::graph::NodeIndex,
    /// Counters for this graph
    pub statistics: GraphStatistics,
}

impl ExecutionGraph {
    pub(crate) fn new(graph: Seg, root: NodeIndex, bad_loops: usize, unroll_depth: usize) -> Self {
        let (unrolled, unrolled_root) = unroll(&graph, root, unroll_depth);
        let statistics = GraphStatistics {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            loops: graph
                .edge_weights()
                .filter(|edge| edge.kind == EdgeKind::Loop)
                .count(),
            bad_loops,
        };
        Self {
            graph,
            root,
            unrolled,
            unrolled_root,
            statistics,
        }
    }

    /// Outgoing edges of `node`, in the order they were created.
    pub fn successors(&self, node: NodeIndex) -> Vec<(&SegEdge, NodeIndex)> {
        successors(&self.graph, node)
    }
}

pub(crate) fn successors(graph: &Seg, node: NodeIndex) -> Vec<(&SegEdge, NodeIndex)> {
    // petgraph lists the newest edge first
    let mut edges: Vec<_> = graph
        .edges(node)
        .map(|edge| (edge.weight(), edge.target()))
        .collect();
    edges.reverse();
    edges
}

/// Follow every edge of `graph`, loops included, up to `depth` steps from `root`.
pub fn unroll(
    graph: &Seg,
    root: NodeIndex,
    depth: usize,
) -> (UnrolledGraph, petgraph::graph::NodeIndex) {
    let mut unrolled = UnrolledGraph::new();
    let top = unrolled.add_node(graph[root].network.clone());
    let mut pending = vec![(root, top, 0)];

    while let Some((source, copy, level)) = pending.pop() {
        if level >= depth {
            continue;
        }
        for (edge, target) in successors(graph, source) {
            let child = unrolled.add_node(graph[target].network.clone());
            unrolled.add_edge(copy, child, edge.label.clone());
            pending.push((target, child, level + 1));
        }
    }

    (unrolled, top)
}
