// Depth-first construction of the symbolic execution graph
//
// Every node holds a network state. From each state the explorer tries the
// enabled actions in policy order and keeps the first one whose whole
// subtree can be built. A successor equivalent to a state on the current
// path closes a loop, provided every live process acted somewhere along
// that loop; a loop that starves a process is rejected and the next
// action is tried, after removing whatever the failed attempt added.

use super::graph::{EdgeKind, Label, Seg, SegEdge, SegNode};
use super::strategy::OrderingPolicy;
use super::{multicom, ExtractionError};
use crate::ast::Interaction;
use crate::network::reducer::{self, ReductionError};
use crate::network::{equivalent, fingerprint, Action, Network};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// One way to leave a state
enum Step {
    Fork { process: String, expression: String },
    Single(Interaction),
    Batch(Vec<Interaction>),
    Chain(Vec<Interaction>, Network),
}

enum Failure {
    /// Every way out of `state` closes a loop that starves these processes
    BadLoop { state: Network, starved: Vec<String> },
    Fatal(ExtractionError),
}

impl From<ReductionError> for Failure {
    fn from(error: ReductionError) -> Self {
        Failure::Fatal(error.into())
    }
}

enum Attempt {
    Done,
    /// Nothing worked; carries the last rejected loop, if any
    Exhausted(Option<(Network, Vec<String>)>),
}

struct PathEntry {
    node: NodeIndex,
    fingerprint: u64,
    /// Processes acting on the edge taken out of `node`
    actors: BTreeSet<String>,
}

/// The outcome of exploring one network
pub(crate) struct Exploration {
    pub graph: Seg,
    pub root: NodeIndex,
    pub bad_loops: usize,
}

pub(crate) struct Explorer<'a> {
    services: &'a BTreeSet<String>,
    policy: &'a dyn OrderingPolicy,
    multicom: bool,
    graph: Seg,
    path: Vec<PathEntry>,
    created_nodes: Vec<NodeIndex>,
    created_edges: Vec<EdgeIndex>,
    next_order: usize,
    bad_loops: usize,
}

impl<'a> Explorer<'a> {
    pub fn new(
        services: &'a BTreeSet<String>,
        policy: &'a dyn OrderingPolicy,
        multicom: bool,
    ) -> Self {
        Self {
            services,
            policy,
            multicom,
            graph: Seg::default(),
            path: Vec::new(),
            created_nodes: Vec::new(),
            created_edges: Vec::new(),
            next_order: 0,
            bad_loops: 0,
        }
    }

    pub fn run(mut self, network: Network) -> Result<Exploration, ExtractionError> {
        let root = self.add_node(network, None);
        match self.explore(root) {
            Ok(()) => Ok(Exploration {
                graph: self.graph,
                root,
                bad_loops: self.bad_loops,
            }),
            Err(Failure::Fatal(error)) => Err(error),
            Err(Failure::BadLoop { state, starved }) => {
                Err(ExtractionError::Starvation { state, starved })
            }
        }
    }

    fn add_node(&mut self, network: Network, parent: Option<NodeIndex>) -> NodeIndex {
        let order = self.next_order;
        self.next_order += 1;
        let node = self.graph.add_node(SegNode {
            network,
            parent,
            order,
        });
        self.created_nodes.push(node);
        node
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, label: Label, kind: EdgeKind) {
        let edge = self.graph.add_edge(from, to, SegEdge { label, kind });
        self.created_edges.push(edge);
    }

    fn explore(&mut self, node: NodeIndex) -> Result<(), Failure> {
        let network = self.graph[node].network.clone();
        if network.all_terminated() {
            trace!(node = node.index(), "Reached terminated state");
            return Ok(());
        }

        self.path.push(PathEntry {
            node,
            fingerprint: fingerprint(&network),
            actors: BTreeSet::new(),
        });
        let outcome = self.explore_steps(node, &network);
        self.path.pop();
        outcome
    }

    fn explore_steps(&mut self, node: NodeIndex, network: &Network) -> Result<(), Failure> {
        let mut actions = reducer::enabled_actions(network)?;
        let marked = self.marking(network);
        self.policy.order_marked(network, &marked, &mut actions);

        let (conditions, interactions): (Vec<Action>, Vec<Action>) =
            actions.into_iter().partition(Action::is_condition);
        let mut steps = Vec::with_capacity(conditions.len() + interactions.len() + 1);
        for action in conditions {
            if let Action::Condition {
                process,
                expression,
            } = action
            {
                steps.push(Step::Fork {
                    process,
                    expression,
                });
            }
        }
        if self.multicom {
            if let Some(batch) = multicom::independent(&interactions) {
                steps.push(Step::Batch(batch));
            }
        }
        for action in interactions {
            if let Action::Interaction(interaction) = action {
                steps.push(Step::Single(interaction));
            }
        }

        let mut starved = match self.attempt(node, steps)? {
            Attempt::Done => return Ok(()),
            Attempt::Exhausted(starved) => starved,
        };

        if self.multicom {
            let chains = multicom::chains(network)?
                .into_iter()
                .map(|(interactions, next)| Step::Chain(interactions, next))
                .collect();
            match self.attempt(node, chains)? {
                Attempt::Done => return Ok(()),
                Attempt::Exhausted(chain_starved) => starved = chain_starved.or(starved),
            }
        }

        // A starving dead end is handed back so that an earlier state can
        // try another action.
        match starved {
            Some((state, starved)) => Err(Failure::BadLoop { state, starved }),
            None => Err(Failure::Fatal(ExtractionError::Deadlock {
                state: network.clone(),
            })),
        }
    }

    fn attempt(&mut self, node: NodeIndex, steps: Vec<Step>) -> Result<Attempt, Failure> {
        let mut starved = None;
        for step in steps {
            let mark = (self.created_nodes.len(), self.created_edges.len());
            match self.expand(node, step) {
                Ok(()) => return Ok(Attempt::Done),
                Err(Failure::BadLoop { state, starved: processes }) => {
                    self.rollback(mark);
                    self.bad_loops += 1;
                    debug!(
                        node = node.index(),
                        starved = ?processes,
                        "Rejected loop that starves processes"
                    );
                    starved = Some((state, processes));
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(Attempt::Exhausted(starved))
    }

    fn rollback(&mut self, (nodes, edges): (usize, usize)) {
        for edge in self.created_edges.drain(edges..) {
            self.graph.remove_edge(edge);
        }
        for node in self.created_nodes.drain(nodes..) {
            self.graph.remove_node(node);
        }
    }

    fn expand(&mut self, node: NodeIndex, step: Step) -> Result<(), Failure> {
        let network = self.graph[node].network.clone();
        let successors = match step {
            Step::Fork {
                process,
                expression,
            } => vec![
                (
                    Label::Then {
                        process: process.clone(),
                        expression: expression.clone(),
                    },
                    reducer::branch(&network, &process, true)?,
                ),
                (
                    Label::Else {
                        process: process.clone(),
                        expression,
                    },
                    reducer::branch(&network, &process, false)?,
                ),
            ],
            Step::Single(interaction) => {
                let next = reducer::interact(&network, &interaction)?;
                vec![(Label::Interaction(interaction), next)]
            }
            Step::Batch(interactions) => {
                let mut next = network;
                for interaction in &interactions {
                    reducer::perform(&mut next, interaction)?;
                }
                vec![(Label::Multicom(interactions), next)]
            }
            Step::Chain(interactions, next) => vec![(Label::Multicom(interactions), next)],
        };

        if let (Some(entry), Some((label, _))) = (self.path.last_mut(), successors.first()) {
            entry.actors = label.actors().into_iter().map(str::to_owned).collect();
        }
        for (label, successor) in successors {
            self.attach(node, label, successor)?;
        }
        Ok(())
    }

    fn attach(&mut self, from: NodeIndex, label: Label, successor: Network) -> Result<(), Failure> {
        // Terminated states always get a fresh leaf.
        if !successor.all_terminated() {
            if let Some(position) = self.find_on_path(&successor) {
                let acted: BTreeSet<&str> = self.path[position..]
                    .iter()
                    .flat_map(|entry| entry.actors.iter().map(String::as_str))
                    .collect();
                let starved: Vec<String> = successor
                    .processes()
                    .filter(|(name, term)| {
                        !acted.contains(name)
                            && !self.services.contains(*name)
                            && !term.is_terminated()
                    })
                    .map(|(name, _)| name.to_string())
                    .collect();
                if !starved.is_empty() {
                    return Err(Failure::BadLoop {
                        state: self.graph[from].network.clone(),
                        starved,
                    });
                }

                let target = self.path[position].node;
                trace!(
                    from = from.index(),
                    to = target.index(),
                    action = %label,
                    "Closed loop"
                );
                self.add_edge(from, target, label, EdgeKind::Loop);
                return Ok(());
            }
        }

        let node = self.add_node(successor, Some(from));
        trace!(
            from = from.index(),
            to = node.index(),
            action = %label,
            "Explored action"
        );
        self.add_edge(from, node, label, EdgeKind::Step);
        self.explore(node)
    }

    /// Processes that acted along the path since every live process last
    /// did, plus those that never need to act again.
    fn marking(&self, network: &Network) -> BTreeSet<String> {
        let settled: BTreeSet<&str> = network
            .processes()
            .filter(|(name, term)| self.services.contains(*name) || term.is_terminated())
            .map(|(name, _)| name)
            .collect();
        let live: Vec<&str> = network
            .names()
            .filter(|name| !settled.contains(name))
            .collect();

        let mut marked: BTreeSet<&str> = BTreeSet::new();
        for entry in &self.path {
            marked.extend(entry.actors.iter().map(String::as_str));
            if live.iter().all(|name| marked.contains(name)) {
                marked.clear();
            }
        }
        marked.extend(settled);
        marked.into_iter().map(str::to_owned).collect()
    }

    fn find_on_path(&self, network: &Network) -> Option<usize> {
        let hash = fingerprint(network);
        self.path.iter().position(|entry| {
            entry.fingerprint == hash && equivalent(&self.graph[entry.node].network, network)
        })
    }
}
