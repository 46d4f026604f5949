// Process terms: a main behavior, a procedure table and a continuation stack

use crate::ast::Behavior;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Procedure table of a single process.
pub type Procedures = BTreeMap<String, Arc<Behavior>>;

/// The state of one process.
///
/// The continuation stack holds the joins of every branch and procedure
/// call the process is currently inside. It is part of the observable
/// state: two terms are equal only when their main behaviors, procedure
/// tables and stacks are pairwise equal.
///
/// The main behavior of a term is never [`Behavior::Continue`]; reaching a
/// `Continue` immediately resumes the innermost join, or terminates the
/// process when the stack is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessTerm {
    pub(crate) procedures: Arc<Procedures>,
    pub(crate) main: Arc<Behavior>,
    pub(crate) stack: Vec<Arc<Behavior>>,
}

/// Why a procedure invocation could not be unfolded
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnfoldError {
    Undefined(String),
    Unguarded(String),
}

impl ProcessTerm {
    /// Create a term from its procedure definitions and main behavior.
    pub fn new<N, I>(procedures: I, main: Behavior) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Behavior)>,
    {
        let procedures = procedures
            .into_iter()
            .map(|(name, body)| (name.into(), Arc::new(body)))
            .collect();
        Self::from_parts(procedures, Arc::new(main))
    }

    /// Create a term with no procedures.
    pub fn main_only(main: Behavior) -> Self {
        Self::from_parts(Procedures::new(), Arc::new(main))
    }

    /// Create a term from an existing procedure table.
    pub fn from_parts(procedures: Procedures, main: Arc<Behavior>) -> Self {
        let mut term = Self {
            procedures: Arc::new(procedures),
            main,
            stack: Vec::new(),
        };
        term.resume();
        term
    }

    /// The behavior the process runs next.
    pub fn main(&self) -> &Arc<Behavior> {
        &self.main
    }

    /// Every procedure of the process.
    pub fn procedures(&self) -> &Procedures {
        &self.procedures
    }

    /// The body of procedure `name`.
    pub fn procedure(&self, name: &str) -> Option<&Arc<Behavior>> {
        self.procedures.get(name)
    }

    /// Pending joins, innermost last.
    pub fn continuation_stack(&self) -> &[Arc<Behavior>] {
        &self.stack
    }

    /// Whether the process has finished, possibly behind procedure calls.
    pub fn is_terminated(&self) -> bool {
        match self.main.as_ref() {
            Behavior::Termination => true,
            Behavior::ProcedureInvocation { .. } => {
                let mut term = self.clone();
                term.unfold().is_ok() && term.main.is_termination()
            }
            _ => false,
        }
    }

    /// Replace leading procedure invocations by the bodies they call.
    ///
    /// A procedure invoked again before its previous body was left, without
    /// any action in between, is unguarded recursion.
    pub(crate) fn unfold(&mut self) -> Result<(), UnfoldError> {
        // Procedures entered so far, with the stack height their body runs at
        let mut entered: Vec<(String, usize)> = Vec::new();
        loop {
            let (procedure, join) = match self.main.as_ref() {
                Behavior::ProcedureInvocation {
                    procedure,
                    continuation,
                } => (procedure.clone(), continuation.clone()),
                _ => return Ok(()),
            };
            let body = self
                .procedures
                .get(&procedure)
                .cloned()
                .ok_or_else(|| UnfoldError::Undefined(procedure.clone()))?;
            if entered.iter().any(|(name, _)| *name == procedure) {
                return Err(UnfoldError::Unguarded(procedure));
            }
            if self.push(&join) {
                // Bodies below a cleared stack can no longer be left.
                entered.iter_mut().for_each(|(_, height)| *height = 0);
            }
            entered.push((procedure, self.stack.len()));
            self.advance(&body);

            let height = self.stack.len();
            entered.retain(|(_, entered_at)| *entered_at <= height);
        }
    }

    /// Move on to `next` after acting.
    pub(crate) fn advance(&mut self, next: &Arc<Behavior>) {
        self.main = next.clone();
        self.resume();
    }

    /// Enter a branch of an offering or condition whose join is `join`.
    pub(crate) fn enter(&mut self, branch: &Arc<Behavior>, join: &Arc<Behavior>) {
        self.push(join);
        self.advance(branch);
    }

    /// Push `join`, returning whether the stack below it was discarded.
    fn push(&mut self, join: &Arc<Behavior>) -> bool {
        if join.is_continue() {
            return false;
        }
        // Nothing below a join that never falls through can run again.
        let cleared = !falls_through(join, &self.procedures, &mut BTreeSet::new());
        if cleared {
            self.stack.clear();
        }
        self.stack.push(join.clone());
        cleared
    }

    fn resume(&mut self) {
        while self.main.is_continue() {
            self.main = self
                .stack
                .pop()
                .unwrap_or_else(|| Arc::new(Behavior::Termination));
        }
    }
}

/// Whether some path through `behavior` reaches `Continue`.
fn falls_through<'a>(
    behavior: &'a Behavior,
    procedures: &'a Procedures,
    calling: &mut BTreeSet<&'a str>,
) -> bool {
    match behavior {
        Behavior::Termination => false,
        Behavior::Continue => true,
        Behavior::Send { continuation, .. }
        | Behavior::Receive { continuation, .. }
        | Behavior::Selection { continuation, .. } => {
            falls_through(continuation, procedures, calling)
        }
        Behavior::Offering {
            branches,
            continuation,
            ..
        } => {
            branches
                .values()
                .any(|branch| falls_through(branch, procedures, calling))
                && falls_through(continuation, procedures, calling)
        }
        Behavior::Condition {
            then_branch,
            else_branch,
            continuation,
            ..
        } => {
            (falls_through(then_branch, procedures, calling)
                || falls_through(else_branch, procedures, calling))
                && falls_through(continuation, procedures, calling)
        }
        Behavior::ProcedureInvocation {
            procedure,
            continuation,
        } => {
            let Some(body) = procedures.get(procedure) else {
                return false;
            };
            if !calling.insert(procedure.as_str()) {
                return false;
            }
            let body_falls = falls_through(body, procedures, calling);
            calling.remove(procedure.as_str());
            body_falls && falls_through(continuation, procedures, calling)
        }
    }
}

impl Display for ProcessTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (name, body) in self.procedures.iter() {
            write!(f, "def {name} {{{body}}} ")?;
        }
        write!(f, "main {{{}}}}}", self.main)
    }
}
