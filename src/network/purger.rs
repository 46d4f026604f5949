// Network purging
//
// Purging runs once before extraction. It folds away everything that can
// only ever reach an immediate `stop`:
// - invocations of procedures whose body is `stop` become `stop`,
// - procedures unreachable from main (or a pending join) are dropped,
// - processes that have already terminated are removed, except services
//   and at least one process so the network never becomes empty.

use super::{Network, Procedures};
use crate::ast::Behavior;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Purge `network` in place. Processes named in `services` are never removed.
pub fn purge(network: &mut Network, services: &BTreeSet<String>) {
    for (name, term) in network.processes_mut() {
        let mut procedures = term.procedures.as_ref().clone();
        let mut main = term.main.clone();
        let mut stack = term.stack.clone();

        loop {
            let terminal: BTreeSet<String> = procedures
                .iter()
                .filter(|(_, body)| body.is_termination())
                .map(|(procedure, _)| procedure.clone())
                .collect();

            let mut changed = false;
            for body in procedures.values_mut() {
                changed |= collapse_in_place(body, &terminal);
            }
            changed |= collapse_in_place(&mut main, &terminal);
            for join in stack.iter_mut() {
                changed |= collapse_in_place(join, &terminal);
            }
            if !changed {
                break;
            }
        }

        let reachable = reachable_procedures(&procedures, &main, &stack);
        procedures.retain(|procedure, _| {
            let keep = reachable.contains(procedure);
            if !keep {
                trace!(process = name, procedure = %procedure, "Dropped unreachable procedure");
            }
            keep
        });

        if procedures != *term.procedures {
            term.procedures = Arc::new(procedures);
        }
        term.main = main;
        term.stack = stack;
    }

    let removable: Vec<String> = network
        .processes()
        .filter(|(name, term)| !services.contains(*name) && term.is_terminated())
        .map(|(name, _)| name.to_string())
        .collect();
    let keep_one = removable.len() == network.len();
    for name in removable.into_iter().skip(usize::from(keep_one)) {
        debug!(process = %name, "Removed terminated process");
        network.remove(&name);
    }
}

fn collapse_in_place(behavior: &mut Arc<Behavior>, terminal: &BTreeSet<String>) -> bool {
    match collapse(behavior, terminal) {
        Some(collapsed) => {
            *behavior = collapsed;
            true
        }
        None => false,
    }
}

/// Rewrite invocations of `terminal` procedures into `stop`, or `None`
/// when nothing changes.
fn collapse(behavior: &Arc<Behavior>, terminal: &BTreeSet<String>) -> Option<Arc<Behavior>> {
    let rewritten = match behavior.as_ref() {
        Behavior::Termination | Behavior::Continue => return None,
        Behavior::ProcedureInvocation { procedure, .. } if terminal.contains(procedure) => {
            Behavior::Termination
        }
        Behavior::ProcedureInvocation {
            procedure,
            continuation,
        } => Behavior::ProcedureInvocation {
            procedure: procedure.clone(),
            continuation: collapse(continuation, terminal)?,
        },
        Behavior::Send {
            receiver,
            expression,
            continuation,
        } => Behavior::Send {
            receiver: receiver.clone(),
            expression: expression.clone(),
            continuation: collapse(continuation, terminal)?,
        },
        Behavior::Receive {
            sender,
            continuation,
        } => Behavior::Receive {
            sender: sender.clone(),
            continuation: collapse(continuation, terminal)?,
        },
        Behavior::Selection {
            receiver,
            label,
            continuation,
        } => Behavior::Selection {
            receiver: receiver.clone(),
            label: label.clone(),
            continuation: collapse(continuation, terminal)?,
        },
        Behavior::Offering {
            sender,
            branches,
            continuation,
        } => {
            let collapsed: Vec<_> = branches
                .values()
                .map(|branch| collapse(branch, terminal))
                .collect();
            let join = collapse(continuation, terminal);
            if join.is_none() && collapsed.iter().all(Option::is_none) {
                return None;
            }
            Behavior::Offering {
                sender: sender.clone(),
                branches: branches
                    .iter()
                    .zip(collapsed)
                    .map(|((label, branch), new)| {
                        (label.clone(), new.unwrap_or_else(|| branch.clone()))
                    })
                    .collect(),
                continuation: join.unwrap_or_else(|| continuation.clone()),
            }
        }
        Behavior::Condition {
            expression,
            then_branch,
            else_branch,
            continuation,
        } => {
            let then = collapse(then_branch, terminal);
            let otherwise = collapse(else_branch, terminal);
            let join = collapse(continuation, terminal);
            if then.is_none() && otherwise.is_none() && join.is_none() {
                return None;
            }
            Behavior::Condition {
                expression: expression.clone(),
                then_branch: then.unwrap_or_else(|| then_branch.clone()),
                else_branch: otherwise.unwrap_or_else(|| else_branch.clone()),
                continuation: join.unwrap_or_else(|| continuation.clone()),
            }
        }
    };
    Some(Arc::new(rewritten))
}

fn reachable_procedures(
    procedures: &Procedures,
    main: &Behavior,
    stack: &[Arc<Behavior>],
) -> BTreeSet<String> {
    let mut reachable = BTreeSet::new();
    let mut pending: Vec<&str> = main.invocations().into_iter().collect();
    for join in stack {
        pending.extend(join.invocations());
    }

    while let Some(procedure) = pending.pop() {
        if reachable.insert(procedure.to_string()) {
            if let Some(body) = procedures.get(procedure) {
                pending.extend(body.invocations());
            }
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ProcessTerm;
    use proptest::prelude::*;

    fn no_services() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_unreachable_procedures_are_dropped() {
        let mut network = Network::new().with_process(
            "a",
            ProcessTerm::new(
                [
                    ("X", Behavior::send("b", "m", Behavior::invoke("X"))),
                    ("Unused", Behavior::receive("b", Behavior::Termination)),
                ],
                Behavior::invoke("X"),
            ),
        );
        purge(&mut network, &no_services());

        let a = network.get("a").unwrap();
        assert_eq!(a.procedures().keys().collect::<Vec<_>>(), vec!["X"]);
    }

    #[test]
    fn test_invocations_of_stop_collapse() {
        let mut network = Network::new()
            .with_process(
                "a",
                ProcessTerm::new(
                    [
                        ("X", Behavior::Termination),
                        ("Y", Behavior::invoke("X")),
                        (
                            "Z",
                            Behavior::send("b", "m", Behavior::invoke_then("Y", Behavior::Continue)),
                        ),
                    ],
                    Behavior::invoke("Z"),
                ),
            )
            .with_process(
                "b",
                ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)),
            );
        purge(&mut network, &no_services());

        let a = network.get("a").unwrap();
        assert_eq!(a.to_string(), "{def Z {b!<m>; stop} main {Z}}");
    }

    #[test]
    fn test_terminated_processes_are_removed_except_services() {
        let mut network = Network::new()
            .with_process(
                "a",
                ProcessTerm::main_only(Behavior::send("b", "m", Behavior::Termination)),
            )
            .with_process(
                "b",
                ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)),
            )
            .with_process("idle", ProcessTerm::main_only(Behavior::Termination))
            .with_process(
                "server",
                ProcessTerm::new([("S", Behavior::Termination)], Behavior::invoke("S")),
            );
        let services = BTreeSet::from(["server".to_string()]);
        purge(&mut network, &services);

        assert_eq!(network.names().collect::<Vec<_>>(), vec!["a", "b", "server"]);
    }

    #[test]
    fn test_one_process_survives() {
        let mut network = Network::new()
            .with_process("a", ProcessTerm::main_only(Behavior::Termination))
            .with_process("b", ProcessTerm::main_only(Behavior::Termination));
        purge(&mut network, &no_services());
        assert_eq!(network.names().collect::<Vec<_>>(), vec!["a"]);
    }

    fn partner() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("a"), Just("b"), Just("c")]
    }

    fn behavior() -> impl Strategy<Value = Behavior> {
        let leaf = prop_oneof![
            Just(Behavior::Termination),
            Just(Behavior::invoke("X")),
            Just(Behavior::invoke("Y")),
        ];
        leaf.prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (partner(), inner.clone()).prop_map(|(p, k)| Behavior::send(p, "e", k)),
                (partner(), inner.clone()).prop_map(|(p, k)| Behavior::receive(p, k)),
                (inner.clone(), inner.clone()).prop_map(|(t, e)| Behavior::condition("g", t, e)),
                (partner(), inner.clone(), inner.clone())
                    .prop_map(|(p, l, r)| Behavior::offer(p, [("l", l), ("r", r)])),
                (inner.clone(), inner).prop_map(|(call, join)| match call {
                    Behavior::Termination => join,
                    _ => Behavior::invoke_then("Y", join),
                }),
            ]
        })
    }

    fn process() -> impl Strategy<Value = ProcessTerm> {
        (behavior(), behavior(), behavior())
            .prop_map(|(main, x, y)| ProcessTerm::new([("X", x), ("Y", y)], main))
    }

    fn network() -> impl Strategy<Value = Network> {
        (process(), process(), process()).prop_map(|(a, b, c)| {
            Network::new()
                .with_process("a", a)
                .with_process("b", b)
                .with_process("c", c)
        })
    }

    proptest! {
        #[test]
        fn purge_is_idempotent(network in network()) {
            let mut once = network;
            purge(&mut once, &no_services());
            let mut twice = once.clone();
            purge(&mut twice, &no_services());
            prop_assert_eq!(once, twice);
        }
    }
}
