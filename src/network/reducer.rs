// Enabled actions of a network and their application
//
// Processes are unfolded on the fly: a process sitting at a procedure
// invocation acts with the body of that procedure. Only the processes that
// take part in an action are stored back unfolded, so states keep their
// folded shape and recurring states compare equal.

use super::term::UnfoldError;
use super::{Network, ProcessTerm};
use crate::ast::{Behavior, Interaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use tracing::trace;

/// A global step of a network
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// A send or selection matched with its receive or offering
    Interaction(Interaction),
    /// A conditional of a single process
    Condition {
        /// The branching process
        process: String,
        /// The tested expression
        expression: String,
    },
}

impl Action {
    /// Processes taking part in the action, sender first.
    pub fn participants(&self) -> Vec<&str> {
        match self {
            Action::Interaction(interaction) => vec![interaction.sender(), interaction.receiver()],
            Action::Condition { process, .. } => vec![process.as_str()],
        }
    }

    /// Whether this is a conditional.
    pub fn is_condition(&self) -> bool {
        matches!(self, Action::Condition { .. })
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Action::Interaction(interaction) => write!(f, "{interaction}"),
            Action::Condition {
                process,
                expression,
            } => write!(f, "if {process}.{expression}"),
        }
    }
}

/// Errors raised while reducing a network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReductionError {
    /// The action cannot fire in the current state
    #[error("Action {0} is not enabled")]
    Disabled(Action),

    /// A branch was requested of a process that is not branching
    #[error("Process {0} is not at a conditional")]
    NotBranching(String),

    /// No process of that name
    #[error("Process {0} is not part of the network")]
    UnknownProcess(String),

    /// An invoked procedure is missing from the process's table
    #[error("Process {process} invokes undefined procedure {procedure}")]
    UndefinedProcedure {
        /// The invoking process
        process: String,
        /// The missing procedure
        procedure: String,
    },

    /// Unfolding reached a procedure again without any action in between
    #[error("Procedure {procedure} of process {process} recurses without acting")]
    UnguardedRecursion {
        /// The invoking process
        process: String,
        /// The procedure entered twice
        procedure: String,
    },
}

impl ReductionError {
    pub(crate) fn unfolding(process: &str, error: UnfoldError) -> Self {
        let process = process.to_string();
        match error {
            UnfoldError::Undefined(procedure) => Self::UndefinedProcedure { process, procedure },
            UnfoldError::Unguarded(procedure) => Self::UnguardedRecursion { process, procedure },
        }
    }
}

/// Result type for reductions
pub type Result<T> = std::result::Result<T, ReductionError>;

/// The term of `process` with its leading procedure invocations unfolded.
pub fn unfolded(network: &Network, process: &str) -> Result<ProcessTerm> {
    let mut term = network
        .get(process)
        .cloned()
        .ok_or_else(|| ReductionError::UnknownProcess(process.to_string()))?;
    term.unfold()
        .map_err(|error| ReductionError::unfolding(process, error))?;
    Ok(term)
}

fn unfold_all(network: &Network) -> Result<BTreeMap<&str, ProcessTerm>> {
    network
        .names()
        .map(|name| Ok((name, unfolded(network, name)?)))
        .collect()
}

/// Every action the network can take right now, in process name order.
pub fn enabled_actions(network: &Network) -> Result<Vec<Action>> {
    let terms = unfold_all(network)?;
    let mut actions = Vec::new();

    for (&name, term) in &terms {
        match term.main.as_ref() {
            Behavior::Send {
                receiver,
                expression,
                ..
            } => {
                let receives = terms.get(receiver.as_str()).is_some_and(|partner| {
                    matches!(partner.main.as_ref(), Behavior::Receive { sender, .. } if sender == name)
                });
                if receives {
                    actions.push(Action::Interaction(Interaction::communication(
                        name, receiver, expression,
                    )));
                }
            }
            Behavior::Selection {
                receiver, label, ..
            } => {
                let offers = terms.get(receiver.as_str()).is_some_and(|partner| {
                    matches!(
                        partner.main.as_ref(),
                        Behavior::Offering { sender, branches, .. }
                            if sender == name && branches.contains_key(label)
                    )
                });
                if offers {
                    actions.push(Action::Interaction(Interaction::selection(
                        name, receiver, label,
                    )));
                }
            }
            Behavior::Condition { expression, .. } => actions.push(Action::Condition {
                process: name.to_string(),
                expression: expression.clone(),
            }),
            _ => {}
        }
    }

    Ok(actions)
}

/// Apply `action`, resolving a conditional with `valuation(process, guard)`.
pub fn apply<V>(network: &Network, action: &Action, valuation: V) -> Result<Network>
where
    V: FnOnce(&str, &str) -> bool,
{
    match action {
        Action::Interaction(interaction) => interact(network, interaction),
        Action::Condition {
            process,
            expression,
        } => {
            let term = unfolded(network, process)?;
            match term.main.as_ref() {
                Behavior::Condition { expression: e, .. } if e == expression => {
                    branch(network, process, valuation(process, expression))
                }
                _ => Err(ReductionError::Disabled(action.clone())),
            }
        }
    }
}

/// The network after `interaction`.
pub fn interact(network: &Network, interaction: &Interaction) -> Result<Network> {
    let mut next = network.clone();
    perform(&mut next, interaction)?;
    Ok(next)
}

/// Perform `interaction` in place.
pub(crate) fn perform(network: &mut Network, interaction: &Interaction) -> Result<()> {
    let disabled = || ReductionError::Disabled(Action::Interaction(interaction.clone()));
    let mut sender = unfolded(network, interaction.sender())?;
    let mut receiver = unfolded(network, interaction.receiver())?;
    let (sent, received) = (sender.main.clone(), receiver.main.clone());

    match (interaction, sent.as_ref(), received.as_ref()) {
        (
            Interaction::Communication {
                sender: s,
                receiver: r,
                expression,
            },
            Behavior::Send {
                receiver: to,
                expression: payload,
                continuation: sender_next,
            },
            Behavior::Receive {
                sender: from,
                continuation: receiver_next,
            },
        ) if to == r && from == s && payload == expression => {
            sender.advance(sender_next);
            receiver.advance(receiver_next);
        }
        (
            Interaction::Selection {
                sender: s,
                receiver: r,
                label,
            },
            Behavior::Selection {
                receiver: to,
                label: chosen,
                continuation: sender_next,
            },
            Behavior::Offering {
                sender: from,
                branches,
                continuation: join,
            },
        ) if to == r && from == s && chosen == label => {
            let branch = branches.get(label).ok_or_else(disabled)?;
            sender.advance(sender_next);
            receiver.enter(branch, join);
        }
        _ => return Err(disabled()),
    }

    trace!(action = %interaction, "Performed interaction");
    network.insert(interaction.sender(), sender);
    network.insert(interaction.receiver(), receiver);
    Ok(())
}

/// The network after `process` takes the `then` (or `else`) branch of its
/// conditional.
pub fn branch(network: &Network, process: &str, then: bool) -> Result<Network> {
    let mut term = unfolded(network, process)?;
    let main = term.main.clone();
    let Behavior::Condition {
        then_branch,
        else_branch,
        continuation,
        ..
    } = main.as_ref()
    else {
        return Err(ReductionError::NotBranching(process.to_string()));
    };

    term.enter(if then { then_branch } else { else_branch }, continuation);
    trace!(process, then, "Took branch");

    let mut next = network.clone();
    next.insert(process, term);
    Ok(next)
}
