// Decomposition of a network into independent sub-networks
//
// Two processes belong to the same sub-network when one of them names the
// other anywhere in its behavior, procedures or pending joins. Each
// connected component of that graph can be extracted on its own.

use super::Network;
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

/// Split `network` into its connected components.
///
/// Components are ordered by their smallest process name, so the result
/// does not depend on anything but the network itself.
pub fn split(network: &Network) -> Vec<Network> {
    let index: BTreeMap<&str, usize> = network
        .names()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();
    let mut components = UnionFind::<usize>::new(index.len());

    for (name, term) in network.processes() {
        let behaviors = std::iter::once(term.main())
            .chain(term.procedures().values())
            .chain(term.continuation_stack());
        for behavior in behaviors {
            for partner in behavior.partners() {
                if let Some(&other) = index.get(partner) {
                    components.union(index[name], other);
                }
            }
        }
    }

    let mut grouped: BTreeMap<usize, Network> = BTreeMap::new();
    let mut order: Vec<usize> = Vec::new();
    for (name, term) in network.processes() {
        let root = components.find_mut(index[name]);
        if !grouped.contains_key(&root) {
            order.push(root);
        }
        grouped
            .entry(root)
            .or_default()
            .insert(name, term.clone());
    }

    order
        .into_iter()
        .filter_map(|root| grouped.remove(&root))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Behavior;
    use crate::network::ProcessTerm;

    fn looping_sender(to: &str) -> ProcessTerm {
        ProcessTerm::new(
            [("X", Behavior::send(to, "e", Behavior::invoke("X")))],
            Behavior::invoke("X"),
        )
    }

    fn looping_receiver(from: &str) -> ProcessTerm {
        ProcessTerm::new(
            [("X", Behavior::receive(from, Behavior::invoke("X")))],
            Behavior::invoke("X"),
        )
    }

    #[test]
    fn test_independent_pairs_are_separated() {
        let network = Network::new()
            .with_process("p", looping_sender("q"))
            .with_process("q", looping_receiver("p"))
            .with_process("r", looping_sender("s"))
            .with_process("s", looping_receiver("r"));

        let parts = split(&network);
        let names: Vec<Vec<&str>> = parts.iter().map(|part| part.names().collect()).collect();
        assert_eq!(names, vec![vec!["p", "q"], vec!["r", "s"]]);
    }

    #[test]
    fn test_links_through_procedures_are_followed() {
        let network = Network::new()
            .with_process(
                "a",
                ProcessTerm::new(
                    [("X", Behavior::send("c", "e", Behavior::Termination))],
                    Behavior::send("b", "e", Behavior::invoke("X")),
                ),
            )
            .with_process("b", looping_receiver("a"))
            .with_process("c", looping_receiver("a"))
            .with_process("d", ProcessTerm::main_only(Behavior::Termination));

        let parts = split(&network);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].names().collect::<Vec<_>>(), vec!["d"]);
    }
}
