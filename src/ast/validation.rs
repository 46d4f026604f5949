// Structural checks on choreographies

use super::{Choreography, ChoreographyBody};
use std::collections::BTreeSet;

/// Errors found when validating a choreography
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A body names a process outside the participants
    #[error("Process {process} is not declared in choreography{}", in_procedure(.procedure))]
    UndeclaredProcess {
        /// The undeclared process
        process: String,
        /// Enclosing procedure, `None` for main
        procedure: Option<String>,
    },

    /// Invocation of a missing procedure
    #[error("Procedure {0} is invoked but never defined")]
    UndefinedProcedure(String),

    /// Two definitions share a name
    #[error("Procedure {0} is defined more than once")]
    DuplicateProcedure(String),
}

fn in_procedure(procedure: &Option<String>) -> String {
    procedure
        .as_ref()
        .map(|name| format!(" (in procedure {name})"))
        .unwrap_or_default()
}

impl Choreography {
    /// Check that every process named in a body is a declared participant
    /// and that every invoked procedure has exactly one definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut defined = BTreeSet::new();
        for procedure in &self.procedures {
            if !defined.insert(procedure.name.as_str()) {
                return Err(ValidationError::DuplicateProcedure(procedure.name.clone()));
            }
        }

        self.validate_body(&self.main, None, &defined)?;
        for procedure in &self.procedures {
            self.validate_body(&procedure.body, Some(&procedure.name), &defined)?;
        }
        Ok(())
    }

    fn validate_body(
        &self,
        body: &ChoreographyBody,
        procedure: Option<&String>,
        defined: &BTreeSet<&str>,
    ) -> Result<(), ValidationError> {
        if let Some(process) = body
            .processes()
            .into_iter()
            .find(|process| !self.processes.contains(*process))
        {
            return Err(ValidationError::UndeclaredProcess {
                process: process.to_string(),
                procedure: procedure.cloned(),
            });
        }

        match body
            .invocations()
            .into_iter()
            .find(|invoked| !defined.contains(invoked))
        {
            Some(invoked) => Err(ValidationError::UndefinedProcedure(invoked.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ProcedureDefinition;

    #[test]
    fn test_inferred_participants_validate() {
        let choreography = Choreography::new(
            vec![ProcedureDefinition::new(
                "X1",
                ChoreographyBody::communication("p", "q", "e", ChoreographyBody::invoke("X1")),
            )],
            ChoreographyBody::invoke("X1"),
        );
        assert_eq!(choreography.validate(), Ok(()));
    }

    #[test]
    fn test_undeclared_process_in_procedure() {
        let mut choreography = Choreography::new(
            vec![ProcedureDefinition::new(
                "X1",
                ChoreographyBody::communication("p", "q", "e", ChoreographyBody::Termination),
            )],
            ChoreographyBody::invoke("X1"),
        );
        choreography.processes.remove("q");

        let err = choreography.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UndeclaredProcess {
                process: "q".to_string(),
                procedure: Some("X1".to_string()),
            }
        );
        assert_eq!(
            err.to_string(),
            "Process q is not declared in choreography (in procedure X1)"
        );
    }

    #[test]
    fn test_undefined_procedure() {
        let choreography = Choreography::new(vec![], ChoreographyBody::invoke("X9"));
        assert_eq!(
            choreography.validate(),
            Err(ValidationError::UndefinedProcedure("X9".to_string()))
        );
    }
}
