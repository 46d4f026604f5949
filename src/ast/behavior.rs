// Local behaviors of a single process

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The local program of one process.
///
/// Continuations are reference counted: successor states built during
/// extraction share every subtree they do not rewrite, and equality of two
/// shared subtrees short-circuits on pointer identity.
///
/// `Offering`, `Condition` and `ProcedureInvocation` carry a *join*
/// continuation. It runs once the chosen branch (or the invoked procedure)
/// reaches [`Behavior::Continue`]. A join of `Continue` means "nothing of
/// our own, resume whatever encloses us".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// `stop`
    Termination,

    /// `receiver!<expression>; continuation`
    Send {
        receiver: String,
        expression: String,
        continuation: Arc<Behavior>,
    },

    /// `sender?; continuation`
    Receive {
        sender: String,
        continuation: Arc<Behavior>,
    },

    /// `receiver+label; continuation`
    Selection {
        receiver: String,
        label: String,
        continuation: Arc<Behavior>,
    },

    /// `sender&{label: branch, ...}`
    Offering {
        sender: String,
        branches: BTreeMap<String, Arc<Behavior>>,
        continuation: Arc<Behavior>,
    },

    /// `if expression then ... else ...`
    Condition {
        expression: String,
        then_branch: Arc<Behavior>,
        else_branch: Arc<Behavior>,
        continuation: Arc<Behavior>,
    },

    /// Call of a procedure from the owning process's table.
    ProcedureInvocation {
        procedure: String,
        continuation: Arc<Behavior>,
    },

    /// End of a branch or procedure body: resume the innermost pending join.
    Continue,
}

impl Behavior {
    /// `receiver!<expression>; continuation`
    pub fn send(
        receiver: impl Into<String>,
        expression: impl Into<String>,
        continuation: Behavior,
    ) -> Self {
        Behavior::Send {
            receiver: receiver.into(),
            expression: expression.into(),
            continuation: Arc::new(continuation),
        }
    }

    /// `sender?; continuation`
    pub fn receive(sender: impl Into<String>, continuation: Behavior) -> Self {
        Behavior::Receive {
            sender: sender.into(),
            continuation: Arc::new(continuation),
        }
    }

    /// `receiver+label; continuation`
    pub fn select(
        receiver: impl Into<String>,
        label: impl Into<String>,
        continuation: Behavior,
    ) -> Self {
        Behavior::Selection {
            receiver: receiver.into(),
            label: label.into(),
            continuation: Arc::new(continuation),
        }
    }

    /// Offering whose branches never fall through to a join.
    pub fn offer<L, I>(sender: impl Into<String>, branches: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, Behavior)>,
    {
        Self::offer_then(sender, branches, Behavior::Continue)
    }

    /// Offering whose branches resume `join` when they reach `Continue`.
    pub fn offer_then<L, I>(sender: impl Into<String>, branches: I, join: Behavior) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, Behavior)>,
    {
        Behavior::Offering {
            sender: sender.into(),
            branches: branches
                .into_iter()
                .map(|(label, branch)| (label.into(), Arc::new(branch)))
                .collect(),
            continuation: Arc::new(join),
        }
    }

    /// Conditional whose branches never fall through to a join.
    pub fn condition(expression: impl Into<String>, then: Behavior, otherwise: Behavior) -> Self {
        Self::condition_then(expression, then, otherwise, Behavior::Continue)
    }

    /// Conditional whose branches resume `join` when they reach `Continue`.
    pub fn condition_then(
        expression: impl Into<String>,
        then: Behavior,
        otherwise: Behavior,
        join: Behavior,
    ) -> Self {
        Behavior::Condition {
            expression: expression.into(),
            then_branch: Arc::new(then),
            else_branch: Arc::new(otherwise),
            continuation: Arc::new(join),
        }
    }

    /// Tail call of `procedure`.
    pub fn invoke(procedure: impl Into<String>) -> Self {
        Self::invoke_then(procedure, Behavior::Continue)
    }

    /// Call of `procedure` followed by `join` once its body falls through.
    pub fn invoke_then(procedure: impl Into<String>, join: Behavior) -> Self {
        Behavior::ProcedureInvocation {
            procedure: procedure.into(),
            continuation: Arc::new(join),
        }
    }

    /// Whether this is `stop`.
    pub fn is_termination(&self) -> bool {
        matches!(self, Behavior::Termination)
    }

    /// Whether this is [`Behavior::Continue`].
    pub fn is_continue(&self) -> bool {
        matches!(self, Behavior::Continue)
    }

    /// Every process this behavior interacts with, ignoring procedure bodies.
    pub fn partners(&self) -> BTreeSet<&str> {
        let mut partners = BTreeSet::new();
        self.collect_partners(&mut partners);
        partners
    }

    fn collect_partners<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Behavior::Termination | Behavior::Continue => {}
            Behavior::Send {
                receiver,
                continuation,
                ..
            }
            | Behavior::Selection {
                receiver,
                continuation,
                ..
            } => {
                out.insert(receiver);
                continuation.collect_partners(out);
            }
            Behavior::Receive {
                sender,
                continuation,
            } => {
                out.insert(sender);
                continuation.collect_partners(out);
            }
            Behavior::Offering {
                sender,
                branches,
                continuation,
            } => {
                out.insert(sender);
                for branch in branches.values() {
                    branch.collect_partners(out);
                }
                continuation.collect_partners(out);
            }
            Behavior::Condition {
                then_branch,
                else_branch,
                continuation,
                ..
            } => {
                then_branch.collect_partners(out);
                else_branch.collect_partners(out);
                continuation.collect_partners(out);
            }
            Behavior::ProcedureInvocation { continuation, .. } => {
                continuation.collect_partners(out);
            }
        }
    }

    /// Names of the procedures invoked directly by this behavior.
    pub fn invocations(&self) -> BTreeSet<&str> {
        let mut invoked = BTreeSet::new();
        self.collect_invocations(&mut invoked);
        invoked
    }

    fn collect_invocations<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Behavior::Termination | Behavior::Continue => {}
            Behavior::Send { continuation, .. }
            | Behavior::Receive { continuation, .. }
            | Behavior::Selection { continuation, .. } => continuation.collect_invocations(out),
            Behavior::Offering {
                branches,
                continuation,
                ..
            } => {
                for branch in branches.values() {
                    branch.collect_invocations(out);
                }
                continuation.collect_invocations(out);
            }
            Behavior::Condition {
                then_branch,
                else_branch,
                continuation,
                ..
            } => {
                then_branch.collect_invocations(out);
                else_branch.collect_invocations(out);
                continuation.collect_invocations(out);
            }
            Behavior::ProcedureInvocation {
                procedure,
                continuation,
            } => {
                out.insert(procedure);
                continuation.collect_invocations(out);
            }
        }
    }
}

impl Display for Behavior {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Termination => write!(f, "stop"),
            Behavior::Continue => write!(f, "continue"),
            Behavior::Send {
                receiver,
                expression,
                continuation,
            } => write!(f, "{receiver}!<{expression}>; {continuation}"),
            Behavior::Receive {
                sender,
                continuation,
            } => write!(f, "{sender}?; {continuation}"),
            Behavior::Selection {
                receiver,
                label,
                continuation,
            } => write!(f, "{receiver}+{label}; {continuation}"),
            Behavior::Offering {
                sender,
                branches,
                continuation,
            } => {
                write!(f, "{sender}&{{")?;
                for (i, (label, branch)) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label}: {branch}")?;
                }
                write!(f, "}}")?;
                write_join(f, continuation)
            }
            Behavior::Condition {
                expression,
                then_branch,
                else_branch,
                continuation,
            } => {
                write!(f, "if {expression} then {then_branch} else {else_branch}")?;
                write_join(f, continuation)
            }
            Behavior::ProcedureInvocation {
                procedure,
                continuation,
            } => {
                write!(f, "{procedure}")?;
                write_join(f, continuation)
            }
        }
    }
}

fn write_join(f: &mut Formatter<'_>, join: &Behavior) -> fmt::Result {
    if join.is_continue() {
        Ok(())
    } else {
        write!(f, "; {join}")
    }
}
