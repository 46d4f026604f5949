//! Choreography extraction
//!
//! Extraction explores the reachable states of a network, closes loops on
//! recurring states and reads a choreography off the resulting graph.
//!
//! The network is first purged (optionally) and split into independent
//! sub-networks, each extracted on its own; with `parallel` set they are
//! extracted on the rayon thread pool. Results are joined by position, so
//! the output never depends on scheduling.

/// Linearization of execution graphs
mod builder;

/// DOT export of execution graphs
pub mod dot;

/// Depth-first graph construction
mod explorer;

/// Execution graph types
pub mod graph;

/// Simultaneous interactions
mod multicom;

/// Ordering of enabled actions
pub mod strategy;

pub use dot::Dot;
pub use graph::{EdgeKind, ExecutionGraph, GraphStatistics, Label, Seg, SegEdge, SegNode};
pub use strategy::{OrderingPolicy, Strategy};

use crate::ast::{Choreography, Program};
use crate::network::{purge, split, Network, ReductionError};
use explorer::Explorer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Errors that can occur during extraction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// A reachable state has live processes but no enabled action
    #[error("Deadlock: no action is enabled in {state}")]
    Deadlock {
        /// The stuck state
        state: Network,
    },

    /// Every way of closing a loop leaves some live process out
    #[error("Every action enabled in {state} leads to a loop starving {}", .starved.join(", "))]
    Starvation {
        /// The state from which no good loop was found
        state: Network,
        /// Processes left out of the last rejected loop
        starved: Vec<String>,
    },

    /// A process could not be reduced
    #[error(transparent)]
    Reduction(#[from] ReductionError),

    /// The explored graph cannot be read as a choreography
    #[error("Malformed execution graph: {0}")]
    MalformedGraph(String),
}

/// Result type for extraction
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Order in which enabled actions are tried
    pub strategy: Strategy,
    /// Fire independent interactions together and break send-send cycles
    pub multicom: bool,
    /// Purge the network before exploring it
    pub purge: bool,
    /// Extract independent sub-networks concurrently
    pub parallel: bool,
    /// Depth at which loops stop being unrolled in [`ExecutionGraph::unrolled`]
    pub unroll_depth: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            multicom: true,
            purge: true,
            parallel: false,
            unroll_depth: 12,
        }
    }
}

impl ExtractionConfig {
    /// Use `strategy` to order actions.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable multicom steps.
    pub fn with_multicom(mut self, multicom: bool) -> Self {
        self.multicom = multicom;
        self
    }

    /// Enable or disable purging.
    pub fn with_purge(mut self, purge: bool) -> Self {
        self.purge = purge;
        self
    }

    /// Enable or disable concurrent extraction of sub-networks.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the depth of the unrolled graph.
    pub fn with_unroll_depth(mut self, depth: usize) -> Self {
        self.unroll_depth = depth;
        self
    }
}

/// A program extracted from a network, with the graphs it was read from
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// The extracted choreographies
    pub program: Program,
    /// One graph per choreography of `program`, in the same order
    pub graphs: Vec<ExecutionGraph>,
}

/// Extraction with a reusable configuration.
///
/// Most callers can use [`extract`]; an `Extractor` additionally accepts a
/// custom [`OrderingPolicy`].
pub struct Extractor {
    config: ExtractionConfig,
    services: BTreeSet<String>,
    policy: Option<Box<dyn OrderingPolicy>>,
}

impl Extractor {
    /// An extractor with no services and the configured strategy.
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            services: BTreeSet::new(),
            policy: None,
        }
    }

    /// Processes allowed to starve in a loop and never purged.
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    /// Replace the configured [`Strategy`] with a custom policy.
    pub fn with_policy(mut self, policy: impl OrderingPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    fn policy(&self) -> &dyn OrderingPolicy {
        match &self.policy {
            Some(policy) => policy.as_ref(),
            None => &self.config.strategy,
        }
    }

    /// Extract a choreography program from `network`.
    pub fn extract(&self, network: &Network) -> Result<ExtractionResult> {
        let mut network = network.clone();
        if self.config.purge {
            purge(&mut network, &self.services);
        }

        let parts = split(&network);
        info!(
            processes = network.len(),
            choreographies = parts.len(),
            parallel = self.config.parallel,
            "Extracting network"
        );

        let extracted: Vec<Result<(Choreography, ExecutionGraph)>> = if self.config.parallel {
            parts.par_iter().map(|part| self.extract_part(part)).collect()
        } else {
            parts.iter().map(|part| self.extract_part(part)).collect()
        };

        let (choreographies, graphs): (Vec<_>, Vec<_>) = extracted
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        Ok(ExtractionResult {
            program: Program::new(choreographies),
            graphs,
        })
    }

    fn extract_part(&self, network: &Network) -> Result<(Choreography, ExecutionGraph)> {
        let processes: BTreeSet<String> = network.names().map(str::to_owned).collect();
        let exploration =
            Explorer::new(&self.services, self.policy(), self.config.multicom).run(network.clone())?;
        let choreography = builder::build(&exploration.graph, exploration.root, processes)?;
        let graph = ExecutionGraph::new(
            exploration.graph,
            exploration.root,
            exploration.bad_loops,
            self.config.unroll_depth,
        );

        debug!(
            choreography = %choreography,
            nodes = graph.statistics.nodes,
            bad_loops = graph.statistics.bad_loops,
            "Extracted choreography"
        );
        Ok((choreography, graph))
    }
}

/// Extract a choreography program from `network`.
///
/// `services` name processes that may starve in a loop and are never
/// purged away.
pub fn extract(
    network: &Network,
    services: &BTreeSet<String>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    Extractor::new(config.clone())
        .with_services(services.iter().cloned())
        .extract(network)
}
