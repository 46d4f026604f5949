// Global programs: choreographies and the programs that group them

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// A single point-to-point interaction between two processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interaction {
    /// `sender.expression->receiver`
    Communication {
        sender: String,
        receiver: String,
        expression: String,
    },
    /// `sender->receiver[label]`
    Selection {
        sender: String,
        receiver: String,
        label: String,
    },
}

impl Interaction {
    /// `sender.expression->receiver`
    pub fn communication(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Interaction::Communication {
            sender: sender.into(),
            receiver: receiver.into(),
            expression: expression.into(),
        }
    }

    /// `sender->receiver[label]`
    pub fn selection(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Interaction::Selection {
            sender: sender.into(),
            receiver: receiver.into(),
            label: label.into(),
        }
    }

    /// The process that acts first.
    pub fn sender(&self) -> &str {
        match self {
            Interaction::Communication { sender, .. } | Interaction::Selection { sender, .. } => {
                sender
            }
        }
    }

    /// The process that reacts.
    pub fn receiver(&self) -> &str {
        match self {
            Interaction::Communication { receiver, .. }
            | Interaction::Selection { receiver, .. } => receiver,
        }
    }

    /// Wrap this interaction around `continuation`.
    pub fn then(self, continuation: ChoreographyBody) -> ChoreographyBody {
        let continuation = Box::new(continuation);
        match self {
            Interaction::Communication {
                sender,
                receiver,
                expression,
            } => ChoreographyBody::Communication {
                sender,
                receiver,
                expression,
                continuation,
            },
            Interaction::Selection {
                sender,
                receiver,
                label,
            } => ChoreographyBody::Selection {
                sender,
                receiver,
                label,
                continuation,
            },
        }
    }
}

impl Display for Interaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Interaction::Communication {
                sender,
                receiver,
                expression,
            } => write!(f, "{sender}.{expression}->{receiver}"),
            Interaction::Selection {
                sender,
                receiver,
                label,
            } => write!(f, "{sender}->{receiver}[{label}]"),
        }
    }
}

/// Body of a choreography or of one of its procedures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoreographyBody {
    /// `stop`
    Termination,

    /// `sender.expression->receiver; continuation`
    Communication {
        sender: String,
        receiver: String,
        expression: String,
        continuation: Box<ChoreographyBody>,
    },

    /// `sender->receiver[label]; continuation`
    Selection {
        sender: String,
        receiver: String,
        label: String,
        continuation: Box<ChoreographyBody>,
    },

    /// `introducer.left<->right; continuation`: `left` and `right` learn
    /// each other's names from `introducer`.
    Introduction {
        introducer: String,
        left: String,
        right: String,
        continuation: Box<ChoreographyBody>,
    },

    /// `parent spawns child; continuation`
    Spawn {
        parent: String,
        child: String,
        continuation: Box<ChoreographyBody>,
    },

    /// Several interactions that happen as one step: `(a.m->b, b.n->a); continuation`.
    Multicom {
        interactions: Vec<Interaction>,
        continuation: Box<ChoreographyBody>,
    },

    /// `if process.expression then ... else ...`
    Condition {
        process: String,
        expression: String,
        then_branch: Box<ChoreographyBody>,
        else_branch: Box<ChoreographyBody>,
    },

    /// Tail call of a procedure of the enclosing choreography.
    ProcedureInvocation { procedure: String },
}

impl ChoreographyBody {
    /// `sender.expression->receiver; continuation`
    pub fn communication(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        expression: impl Into<String>,
        continuation: ChoreographyBody,
    ) -> Self {
        Interaction::communication(sender, receiver, expression).then(continuation)
    }

    /// `sender->receiver[label]; continuation`
    pub fn selection(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        label: impl Into<String>,
        continuation: ChoreographyBody,
    ) -> Self {
        Interaction::selection(sender, receiver, label).then(continuation)
    }

    /// `introducer.left<->right; continuation`
    pub fn introduction(
        introducer: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
        continuation: ChoreographyBody,
    ) -> Self {
        ChoreographyBody::Introduction {
            introducer: introducer.into(),
            left: left.into(),
            right: right.into(),
            continuation: Box::new(continuation),
        }
    }

    /// `parent spawns child; continuation`
    pub fn spawn(
        parent: impl Into<String>,
        child: impl Into<String>,
        continuation: ChoreographyBody,
    ) -> Self {
        ChoreographyBody::Spawn {
            parent: parent.into(),
            child: child.into(),
            continuation: Box::new(continuation),
        }
    }

    /// Interactions fired as a single step
    pub fn multicom(interactions: Vec<Interaction>, continuation: ChoreographyBody) -> Self {
        ChoreographyBody::Multicom {
            interactions,
            continuation: Box::new(continuation),
        }
    }

    /// `if process.expression then ... else ...`
    pub fn condition(
        process: impl Into<String>,
        expression: impl Into<String>,
        then: ChoreographyBody,
        otherwise: ChoreographyBody,
    ) -> Self {
        ChoreographyBody::Condition {
            process: process.into(),
            expression: expression.into(),
            then_branch: Box::new(then),
            else_branch: Box::new(otherwise),
        }
    }

    /// Tail call of `procedure`.
    pub fn invoke(procedure: impl Into<String>) -> Self {
        ChoreographyBody::ProcedureInvocation {
            procedure: procedure.into(),
        }
    }

    /// Processes named anywhere in this body, procedures excluded.
    pub fn processes(&self) -> BTreeSet<&str> {
        let mut processes = BTreeSet::new();
        self.collect_processes(&mut processes);
        processes
    }

    fn collect_processes<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            ChoreographyBody::Termination | ChoreographyBody::ProcedureInvocation { .. } => {}
            ChoreographyBody::Communication {
                sender,
                receiver,
                continuation,
                ..
            }
            | ChoreographyBody::Selection {
                sender,
                receiver,
                continuation,
                ..
            } => {
                out.insert(sender);
                out.insert(receiver);
                continuation.collect_processes(out);
            }
            ChoreographyBody::Introduction {
                introducer,
                left,
                right,
                continuation,
            } => {
                out.extend([introducer.as_str(), left.as_str(), right.as_str()]);
                continuation.collect_processes(out);
            }
            ChoreographyBody::Spawn {
                parent,
                child,
                continuation,
            } => {
                out.extend([parent.as_str(), child.as_str()]);
                continuation.collect_processes(out);
            }
            ChoreographyBody::Multicom {
                interactions,
                continuation,
            } => {
                for interaction in interactions {
                    out.insert(interaction.sender());
                    out.insert(interaction.receiver());
                }
                continuation.collect_processes(out);
            }
            ChoreographyBody::Condition {
                process,
                then_branch,
                else_branch,
                ..
            } => {
                out.insert(process);
                then_branch.collect_processes(out);
                else_branch.collect_processes(out);
            }
        }
    }

    /// Procedures invoked anywhere in this body.
    pub fn invocations(&self) -> BTreeSet<&str> {
        let mut invoked = BTreeSet::new();
        self.collect_invocations(&mut invoked);
        invoked
    }

    fn collect_invocations<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            ChoreographyBody::Termination => {}
            ChoreographyBody::ProcedureInvocation { procedure } => {
                out.insert(procedure);
            }
            ChoreographyBody::Communication { continuation, .. }
            | ChoreographyBody::Selection { continuation, .. }
            | ChoreographyBody::Introduction { continuation, .. }
            | ChoreographyBody::Spawn { continuation, .. }
            | ChoreographyBody::Multicom { continuation, .. } => {
                continuation.collect_invocations(out)
            }
            ChoreographyBody::Condition {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.collect_invocations(out);
                else_branch.collect_invocations(out);
            }
        }
    }
}

impl Display for ChoreographyBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChoreographyBody::Termination => write!(f, "stop"),
            ChoreographyBody::Communication {
                sender,
                receiver,
                expression,
                continuation,
            } => write!(f, "{sender}.{expression}->{receiver}; {continuation}"),
            ChoreographyBody::Selection {
                sender,
                receiver,
                label,
                continuation,
            } => write!(f, "{sender}->{receiver}[{label}]; {continuation}"),
            ChoreographyBody::Introduction {
                introducer,
                left,
                right,
                continuation,
            } => write!(f, "{introducer}.{left}<->{right}; {continuation}"),
            ChoreographyBody::Spawn {
                parent,
                child,
                continuation,
            } => write!(f, "{parent} spawns {child}; {continuation}"),
            ChoreographyBody::Multicom {
                interactions,
                continuation,
            } => {
                write!(f, "(")?;
                for (i, interaction) in interactions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{interaction}")?;
                }
                write!(f, "); {continuation}")
            }
            ChoreographyBody::Condition {
                process,
                expression,
                then_branch,
                else_branch,
            } => write!(
                f,
                "if {process}.{expression} then {then_branch} else {else_branch}"
            ),
            ChoreographyBody::ProcedureInvocation { procedure } => write!(f, "{procedure}"),
        }
    }
}

/// `def name { body }`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    /// Procedure name, unique within its choreography
    pub name: String,
    /// What an invocation runs
    pub body: ChoreographyBody,
}

impl ProcedureDefinition {
    /// Define `name` as `body`.
    pub fn new(name: impl Into<String>, body: ChoreographyBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl Display for ProcedureDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "def {} {{ {} }}", self.name, self.body)
    }
}

/// A global program over a fixed set of participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choreography {
    /// Procedures, in definition order
    pub procedures: Vec<ProcedureDefinition>,
    /// Body run on start
    pub main: ChoreographyBody,
    /// Declared participants
    pub processes: BTreeSet<String>,
}

impl Choreography {
    /// Build a choreography whose participants are exactly the processes
    /// named in `main` and in `procedures`.
    pub fn new(procedures: Vec<ProcedureDefinition>, main: ChoreographyBody) -> Self {
        let mut processes: BTreeSet<String> =
            main.processes().into_iter().map(str::to_owned).collect();
        for procedure in &procedures {
            processes.extend(procedure.body.processes().into_iter().map(str::to_owned));
        }
        Self {
            procedures,
            main,
            processes,
        }
    }

    /// Declare extra participants, e.g. processes that never interact.
    pub fn with_processes<I, S>(mut self, processes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes.extend(processes.into_iter().map(Into::into));
        self
    }

    /// The definition of procedure `name`.
    pub fn procedure(&self, name: &str) -> Option<&ProcedureDefinition> {
        self.procedures.iter().find(|procedure| procedure.name == name)
    }
}

impl Display for Choreography {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for procedure in &self.procedures {
            write!(f, "{procedure} ")?;
        }
        write!(f, "main {{{}}}", self.main)
    }
}

/// Independent choreographies, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// One choreography per independent sub-network
    pub choreographies: Vec<Choreography>,
}

impl Program {
    /// Group `choreographies` into a program.
    pub fn new(choreographies: Vec<Choreography>) -> Self {
        Self { choreographies }
    }
}

impl From<Choreography> for Program {
    fn from(choreography: Choreography) -> Self {
        Self::new(vec![choreography])
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, choreography) in self.choreographies.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            write!(f, "{choreography}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_of_procedures_and_main() {
        let body = ChoreographyBody::communication(
            "p",
            "q",
            "e1",
            ChoreographyBody::invoke("X1"),
        );
        let choreography = Choreography::new(
            vec![ProcedureDefinition::new("X1", body)],
            ChoreographyBody::invoke("X1"),
        );
        assert_eq!(choreography.to_string(), "def X1 { p.e1->q; X1 } main {X1}");
        assert_eq!(
            choreography.processes,
            BTreeSet::from(["p".to_string(), "q".to_string()])
        );
    }

    #[test]
    fn test_display_of_multicom_and_condition() {
        let body = ChoreographyBody::condition(
            "a",
            "e",
            ChoreographyBody::multicom(
                vec![
                    Interaction::communication("a", "b", "m1"),
                    Interaction::communication("b", "a", "m2"),
                ],
                ChoreographyBody::Termination,
            ),
            ChoreographyBody::selection("a", "b", "l", ChoreographyBody::Termination),
        );
        assert_eq!(
            body.to_string(),
            "if a.e then (a.m1->b, b.m2->a); stop else a->b[l]; stop"
        );
    }

    #[test]
    fn test_program_joins_choreographies() {
        let program = Program::new(vec![
            Choreography::new(vec![], ChoreographyBody::Termination),
            Choreography::new(
                vec![],
                ChoreographyBody::introduction("a", "b", "c", ChoreographyBody::Termination),
            ),
        ]);
        assert_eq!(program.to_string(), "main {stop} || main {a.b<->c; stop}");
    }
}
