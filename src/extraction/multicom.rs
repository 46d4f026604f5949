// Multicoms: several interactions fired as one step
//
// Two kinds are produced:
// - independent batches: enabled interactions with pairwise disjoint
//   participants, which commute and are fired together;
// - output chains: a process sends before it receives, every receiver of
//   those messages does the same, and all of the receives are eventually
//   satisfied. No single interaction is enabled in such a state, yet the
//   network makes progress once all outputs are in flight.

use crate::ast::{Behavior, Interaction};
use crate::network::reducer::{self, ReductionError};
use crate::network::{Action, Network};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Greedily pick, in order, interactions whose participants are disjoint
/// from every interaction picked before. `None` unless at least two qualify.
pub(crate) fn independent(actions: &[Action]) -> Option<Vec<Interaction>> {
    let mut busy: BTreeSet<&str> = BTreeSet::new();
    let mut batch = Vec::new();

    for action in actions {
        let Action::Interaction(interaction) = action else {
            continue;
        };
        let (sender, receiver) = (interaction.sender(), interaction.receiver());
        if busy.contains(sender) || busy.contains(receiver) {
            continue;
        }
        busy.extend([sender, receiver]);
        batch.push(interaction.clone());
    }

    (batch.len() > 1).then_some(batch)
}

/// Every output chain of `network` with more than one interaction,
/// together with the state it leads to.
pub(crate) fn chains(
    network: &Network,
) -> Result<Vec<(Vec<Interaction>, Network)>, ReductionError> {
    let mut found = Vec::new();
    let mut seen: BTreeSet<Vec<Interaction>> = BTreeSet::new();

    for start in network.names() {
        let head = reducer::unfolded(network, start)?;
        if !matches!(
            head.main().as_ref(),
            Behavior::Send { .. } | Behavior::Selection { .. }
        ) {
            continue;
        }
        let Some((interactions, next)) = chain_from(network, start)? else {
            continue;
        };
        let mut key = interactions.clone();
        key.sort();
        if interactions.len() > 1 && seen.insert(key) {
            found.push((interactions, next));
        }
    }

    Ok(found)
}

fn chain_from(
    network: &Network,
    start: &str,
) -> Result<Option<(Vec<Interaction>, Network)>, ReductionError> {
    let mut state = network.clone();
    let mut pending = VecDeque::new();
    let mut performed = Vec::new();
    let mut visited = HashSet::new();

    if !emit_outputs(&mut state, start, &mut pending)? {
        return Ok(None);
    }
    while let Some(interaction) = pending.pop_front() {
        let receiver = interaction.receiver().to_string();
        if !emit_outputs(&mut state, &receiver, &mut pending)?
            || !consume(&mut state, &interaction)?
        {
            return Ok(None);
        }
        performed.push(interaction);
        if !visited.insert(state.clone()) {
            return Ok(None);
        }
    }

    Ok(Some((performed, state)))
}

/// Fire the leading sends and selections of `process`. Returns `false`
/// when the process is unknown or outputs forever.
fn emit_outputs(
    state: &mut Network,
    process: &str,
    pending: &mut VecDeque<Interaction>,
) -> Result<bool, ReductionError> {
    let Some(mut folded) = state.get(process).cloned() else {
        return Ok(false);
    };
    let mut seen = HashSet::new();

    loop {
        let mut current = folded.clone();
        current
            .unfold()
            .map_err(|error| ReductionError::unfolding(process, error))?;
        let main = current.main().clone();
        let interaction = match main.as_ref() {
            Behavior::Send {
                receiver,
                expression,
                continuation,
            } => {
                current.advance(continuation);
                Interaction::communication(process, receiver, expression)
            }
            Behavior::Selection {
                receiver,
                label,
                continuation,
            } => {
                current.advance(continuation);
                Interaction::selection(process, receiver, label)
            }
            _ => break,
        };
        if !seen.insert(current.clone()) {
            return Ok(false);
        }
        pending.push_back(interaction);
        folded = current;
    }

    state.insert(process, folded);
    Ok(true)
}

/// Let the receiver of `interaction` take it in. Returns `false` when the
/// receiver is waiting for something else.
fn consume(state: &mut Network, interaction: &Interaction) -> Result<bool, ReductionError> {
    let process = interaction.receiver();
    let Some(mut term) = state.get(process).cloned() else {
        return Ok(false);
    };
    term.unfold()
        .map_err(|error| ReductionError::unfolding(process, error))?;
    let main = term.main().clone();

    match (interaction, main.as_ref()) {
        (
            Interaction::Communication { sender, .. },
            Behavior::Receive {
                sender: from,
                continuation,
            },
        ) if from == sender => term.advance(continuation),
        (
            Interaction::Selection { sender, label, .. },
            Behavior::Offering {
                sender: from,
                branches,
                continuation,
            },
        ) if from == sender => match branches.get(label) {
            Some(branch) => term.enter(branch, continuation),
            None => return Ok(false),
        },
        _ => return Ok(false),
    }

    state.insert(process, term);
    Ok(true)
}
