// Linearization of an execution graph into a choreography
//
// Every target of a loop-closing edge heads a procedure, named X1, X2, ...
// in the order the states were discovered. Bodies are read off the graph
// by following its edges; reaching a procedure head turns into an
// invocation of that procedure.

use super::graph::{successors, EdgeKind, Label, Seg};
use super::ExtractionError;
use crate::ast::{Choreography, ChoreographyBody, ProcedureDefinition};
use petgraph::stable_graph::NodeIndex;
use std::collections::{BTreeSet, HashMap};

pub(crate) fn build(
    graph: &Seg,
    root: NodeIndex,
    processes: BTreeSet<String>,
) -> Result<Choreography, ExtractionError> {
    let mut heads: Vec<NodeIndex> = graph
        .edge_indices()
        .filter(|edge| graph[*edge].kind == EdgeKind::Loop)
        .filter_map(|edge| graph.edge_endpoints(edge).map(|(_, target)| target))
        .collect();
    heads.sort_by_key(|head| graph[*head].order);
    heads.dedup();

    let names: HashMap<NodeIndex, String> = heads
        .iter()
        .enumerate()
        .map(|(i, head)| (*head, format!("X{}", i + 1)))
        .collect();
    let builder = Builder {
        graph,
        names: &names,
    };

    let procedures = heads
        .iter()
        .map(|head| {
            Ok(ProcedureDefinition::new(
                names[head].clone(),
                builder.body(*head, true)?,
            ))
        })
        .collect::<Result<Vec<_>, ExtractionError>>()?;
    let main = builder.body(root, false)?;

    Ok(Choreography {
        procedures,
        main,
        processes,
    })
}

struct Builder<'a> {
    graph: &'a Seg,
    names: &'a HashMap<NodeIndex, String>,
}

impl Builder<'_> {
    /// The body starting at `node`; `defining` is set for the head of the
    /// procedure being defined, which must not call itself right away.
    fn body(&self, node: NodeIndex, defining: bool) -> Result<ChoreographyBody, ExtractionError> {
        if !defining {
            if let Some(name) = self.names.get(&node) {
                return Ok(ChoreographyBody::invoke(name.clone()));
            }
        }

        match successors(self.graph, node).as_slice() {
            [] => Ok(ChoreographyBody::Termination),
            [(edge, target)] => match &edge.label {
                Label::Interaction(interaction) => {
                    Ok(interaction.clone().then(self.body(*target, false)?))
                }
                Label::Multicom(interactions) => Ok(ChoreographyBody::multicom(
                    interactions.clone(),
                    self.body(*target, false)?,
                )),
                Label::Then { .. } | Label::Else { .. } => Err(ExtractionError::MalformedGraph(
                    format!("conditional at node {} has a single branch", node.index()),
                )),
            },
            [(first, first_target), (second, second_target)] => {
                let (process, expression, then_target, else_target) =
                    match (&first.label, &second.label) {
                        (
                            Label::Then {
                                process,
                                expression,
                            },
                            Label::Else { .. },
                        ) => (process, expression, first_target, second_target),
                        (
                            Label::Else { .. },
                            Label::Then {
                                process,
                                expression,
                            },
                        ) => (process, expression, second_target, first_target),
                        _ => {
                            return Err(ExtractionError::MalformedGraph(format!(
                                "node {} has two successors that are not branches",
                                node.index()
                            )))
                        }
                    };
                Ok(ChoreographyBody::condition(
                    process.clone(),
                    expression.clone(),
                    self.body(*then_target, false)?,
                    self.body(*else_target, false)?,
                ))
            }
            more => Err(ExtractionError::MalformedGraph(format!(
                "node {} has {} successors",
                node.index(),
                more.len()
            ))),
        }
    }
}
