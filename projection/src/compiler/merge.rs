// Merging of the behaviors a process has in the two branches of a
// conditional it does not evaluate

use chorex::ast::Behavior;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// What made two behaviors unmergeable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conflict {
    /// Different kinds of action, e.g. a send against a receive
    Shape,
    /// Same action towards different processes
    Partner,
    /// Different labels selected
    Label,
    /// Different values sent
    Expression,
    /// Conditionals on different expressions
    Guard,
    /// Invocations of different procedures
    Procedure,
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Conflict::Shape => "different kinds of action",
            Conflict::Partner => "different partners",
            Conflict::Label => "different labels",
            Conflict::Expression => "different expressions",
            Conflict::Guard => "different guards",
            Conflict::Procedure => "different procedures",
        };
        f.write_str(reason)
    }
}

/// Two behaviors that cannot be merged, with the innermost fragments that
/// disagree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot merge `{left}` with `{right}`: {conflict}")]
pub struct MergeError {
    /// Kind of disagreement
    pub conflict: Conflict,
    /// Fragment from the first behavior
    pub left: Arc<Behavior>,
    /// Fragment from the second behavior
    pub right: Arc<Behavior>,
}

impl MergeError {
    fn new(conflict: Conflict, left: &Arc<Behavior>, right: &Arc<Behavior>) -> Self {
        Self {
            conflict,
            left: left.clone(),
            right: right.clone(),
        }
    }
}

/// Merge two behaviors of one process into a behavior that is ready for
/// either of them.
///
/// Behaviors merge when they are equal up to offerings: two offerings from
/// the same sender merge into one offering the union of their labels, with
/// shared labels merged recursively. Any other difference is an error.
///
/// Merging is symmetric and `merge(b, b) == b`.
pub fn merge(left: &Arc<Behavior>, right: &Arc<Behavior>) -> Result<Arc<Behavior>, MergeError> {
    if Arc::ptr_eq(left, right) || left == right {
        return Ok(left.clone());
    }

    let conflict = |conflict| Err(MergeError::new(conflict, left, right));
    match (left.as_ref(), right.as_ref()) {
        (
            Behavior::Send {
                receiver,
                expression,
                continuation,
            },
            Behavior::Send {
                receiver: other_receiver,
                expression: other_expression,
                continuation: other_continuation,
            },
        ) => {
            if receiver != other_receiver {
                conflict(Conflict::Partner)
            } else if expression != other_expression {
                conflict(Conflict::Expression)
            } else {
                Ok(Arc::new(Behavior::Send {
                    receiver: receiver.clone(),
                    expression: expression.clone(),
                    continuation: merge(continuation, other_continuation)?,
                }))
            }
        }

        (
            Behavior::Receive {
                sender,
                continuation,
            },
            Behavior::Receive {
                sender: other_sender,
                continuation: other_continuation,
            },
        ) => {
            if sender != other_sender {
                return conflict(Conflict::Partner);
            }
            Ok(Arc::new(Behavior::Receive {
                sender: sender.clone(),
                continuation: merge(continuation, other_continuation)?,
            }))
        }

        (
            Behavior::Selection {
                receiver,
                label,
                continuation,
            },
            Behavior::Selection {
                receiver: other_receiver,
                label: other_label,
                continuation: other_continuation,
            },
        ) => {
            if receiver != other_receiver {
                conflict(Conflict::Partner)
            } else if label != other_label {
                conflict(Conflict::Label)
            } else {
                Ok(Arc::new(Behavior::Selection {
                    receiver: receiver.clone(),
                    label: label.clone(),
                    continuation: merge(continuation, other_continuation)?,
                }))
            }
        }

        (
            Behavior::Offering {
                sender,
                branches,
                continuation,
            },
            Behavior::Offering {
                sender: other_sender,
                branches: other_branches,
                continuation: other_continuation,
            },
        ) => {
            if sender != other_sender {
                return conflict(Conflict::Partner);
            }
            let mut merged = branches.clone();
            for (label, branch) in other_branches {
                let branch = match branches.get(label) {
                    Some(existing) => merge(existing, branch)?,
                    None => branch.clone(),
                };
                merged.insert(label.clone(), branch);
            }
            Ok(Arc::new(Behavior::Offering {
                sender: sender.clone(),
                branches: merged,
                continuation: merge(continuation, other_continuation)?,
            }))
        }

        (
            Behavior::Condition {
                expression,
                then_branch,
                else_branch,
                continuation,
            },
            Behavior::Condition {
                expression: other_expression,
                then_branch: other_then,
                else_branch: other_else,
                continuation: other_continuation,
            },
        ) => {
            if expression != other_expression {
                return conflict(Conflict::Guard);
            }
            Ok(Arc::new(Behavior::Condition {
                expression: expression.clone(),
                then_branch: merge(then_branch, other_then)?,
                else_branch: merge(else_branch, other_else)?,
                continuation: merge(continuation, other_continuation)?,
            }))
        }

        (
            Behavior::ProcedureInvocation {
                procedure,
                continuation,
            },
            Behavior::ProcedureInvocation {
                procedure: other_procedure,
                continuation: other_continuation,
            },
        ) => {
            if procedure != other_procedure {
                return conflict(Conflict::Procedure);
            }
            Ok(Arc::new(Behavior::ProcedureInvocation {
                procedure: procedure.clone(),
                continuation: merge(continuation, other_continuation)?,
            }))
        }

        _ => conflict(Conflict::Shape),
    }
}
