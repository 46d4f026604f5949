// Structural equivalence of network states
//
// Two states are equivalent when their live processes coincide: same
// names, and terms equal in main behavior, procedure table and
// continuation stack. A finished process carries no future, so it is
// ignored whatever its residual stack looks like.

use super::{Network, ProcessTerm};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn live(network: &Network) -> impl Iterator<Item = (&str, &ProcessTerm)> {
    network.processes().filter(|(_, term)| !term.is_terminated())
}

/// Whether `left` and `right` denote the same execution state.
pub fn equivalent(left: &Network, right: &Network) -> bool {
    live(left).eq(live(right))
}

/// A hash consistent with [`equivalent`].
pub fn fingerprint(network: &Network) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, term) in live(network) {
        name.hash(&mut hasher);
        term.hash(&mut hasher);
    }
    hasher.finish()
}
