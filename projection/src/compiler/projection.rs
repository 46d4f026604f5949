// Endpoint projection of choreographies onto networks

use super::merge::{merge, MergeError};
use chorex::ast::{Choreography, ChoreographyBody, Interaction, Program, ValidationError};
use chorex::network::{Network, ProcessTerm, Procedures};
use chorex::Behavior;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Errors that can occur during projection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// The branches of a conditional disagree for `process`
    #[error("Cannot project process {process}{}: {source}", in_procedure(.procedure))]
    Merge {
        /// The process being projected
        process: String,
        /// Enclosing procedure, `None` for main
        procedure: Option<String>,
        /// What could not be merged
        source: MergeError,
    },

    /// Two choreographies of a program share a participant
    #[error("Process {0} takes part in more than one choreography")]
    SharedProcess(String),

    /// The choreography is malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn in_procedure(procedure: &Option<String>) -> String {
    procedure
        .as_ref()
        .map(|name| format!(" in procedure {name}"))
        .unwrap_or_default()
}

/// Project every choreography of `program` and join the resulting networks.
pub fn project(program: &Program) -> Result<Network, ProjectionError> {
    let mut network = Network::new();
    for choreography in &program.choreographies {
        for (name, term) in project_choreography(choreography)? {
            if network.contains(&name) {
                return Err(ProjectionError::SharedProcess(name));
            }
            network.insert(name, term);
        }
    }
    Ok(network)
}

/// Like [`project`], but keeps going after a failure and reports every
/// process that cannot be projected.
pub fn project_collecting(program: &Program) -> Result<Network, Vec<ProjectionError>> {
    let mut network = Network::new();
    let mut errors = Vec::new();
    for choreography in &program.choreographies {
        if let Err(error) = choreography.validate() {
            errors.push(error.into());
            continue;
        }
        let used = used_processes(choreography);
        for process in &choreography.processes {
            match project_validated(choreography, process, &used) {
                Ok(_) if network.contains(process) => {
                    errors.push(ProjectionError::SharedProcess(process.clone()));
                }
                Ok(term) => {
                    network.insert(process.clone(), term);
                }
                Err(error) => errors.push(error),
            }
        }
    }

    if errors.is_empty() {
        Ok(network)
    } else {
        Err(errors)
    }
}

/// Project one choreography onto a network with a process per participant.
pub fn project_choreography(choreography: &Choreography) -> Result<Network, ProjectionError> {
    choreography.validate()?;
    let used = used_processes(choreography);
    let mut network = Network::new();
    for process in &choreography.processes {
        network.insert(process.clone(), project_validated(choreography, process, &used)?);
    }
    debug!(
        processes = network.len(),
        procedures = choreography.procedures.len(),
        "Projected choreography"
    );
    Ok(network)
}

/// The local program of `process` in `choreography`.
pub fn project_process(
    choreography: &Choreography,
    process: &str,
) -> Result<ProcessTerm, ProjectionError> {
    choreography.validate()?;
    project_validated(choreography, process, &used_processes(choreography))
}

fn project_validated(
    choreography: &Choreography,
    process: &str,
    used: &BTreeMap<String, BTreeSet<String>>,
) -> Result<ProcessTerm, ProjectionError> {
    // Each procedure body is projected once for this process; invocations
    // only refer to the result by name.
    let mut procedures = Procedures::new();
    for definition in &choreography.procedures {
        if !uses(used, &definition.name, process) {
            continue;
        }
        let context = ProjectionContext {
            process,
            procedure: Some(definition.name.as_str()),
            used,
        };
        procedures.insert(definition.name.clone(), context.project(&definition.body)?);
    }

    let context = ProjectionContext {
        process,
        procedure: None,
        used,
    };
    let main = context.project(&choreography.main)?;
    trace!(process, main = %main, "Projected process");
    Ok(ProcessTerm::from_parts(procedures, main))
}

/// For every procedure, the processes taking part in it or in any procedure
/// it reaches through invocations.
fn used_processes(choreography: &Choreography) -> BTreeMap<String, BTreeSet<String>> {
    let mut used: BTreeMap<String, BTreeSet<String>> = choreography
        .procedures
        .iter()
        .map(|definition| {
            let processes = definition.body.processes();
            (
                definition.name.clone(),
                processes.into_iter().map(str::to_owned).collect(),
            )
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for definition in &choreography.procedures {
            let reached: BTreeSet<String> = definition
                .body
                .invocations()
                .into_iter()
                .filter_map(|invoked| used.get(invoked))
                .flatten()
                .cloned()
                .collect();
            if let Some(processes) = used.get_mut(&definition.name) {
                let before = processes.len();
                processes.extend(reached);
                changed |= processes.len() != before;
            }
        }
    }
    used
}

fn uses(used: &BTreeMap<String, BTreeSet<String>>, procedure: &str, process: &str) -> bool {
    used.get(procedure)
        .map_or(false, |processes| processes.contains(process))
}

/// Projection of bodies onto one process
struct ProjectionContext<'a> {
    process: &'a str,
    /// Procedure being projected, for error reports
    procedure: Option<&'a str>,
    used: &'a BTreeMap<String, BTreeSet<String>>,
}

impl ProjectionContext<'_> {
    fn project(&self, body: &ChoreographyBody) -> Result<Arc<Behavior>, ProjectionError> {
        let process = self.process;
        match body {
            ChoreographyBody::Termination => Ok(Arc::new(Behavior::Termination)),

            ChoreographyBody::Communication {
                sender,
                receiver,
                expression,
                continuation,
            } => {
                let continuation = self.project(continuation)?;
                Ok(if sender == process {
                    Arc::new(Behavior::Send {
                        receiver: receiver.clone(),
                        expression: expression.clone(),
                        continuation,
                    })
                } else if receiver == process {
                    Arc::new(Behavior::Receive {
                        sender: sender.clone(),
                        continuation,
                    })
                } else {
                    continuation
                })
            }

            ChoreographyBody::Selection {
                sender,
                receiver,
                label,
                continuation,
            } => {
                let continuation = self.project(continuation)?;
                Ok(if sender == process {
                    Arc::new(Behavior::Selection {
                        receiver: receiver.clone(),
                        label: label.clone(),
                        continuation,
                    })
                } else if receiver == process {
                    Arc::new(Behavior::Offering {
                        sender: sender.clone(),
                        branches: BTreeMap::from([(label.clone(), continuation)]),
                        continuation: Arc::new(Behavior::Continue),
                    })
                } else {
                    continuation
                })
            }

            ChoreographyBody::Introduction {
                introducer,
                left,
                right,
                continuation,
            } => {
                let mut projected = self.project(continuation)?;
                if introducer == process {
                    projected = Arc::new(Behavior::Send {
                        receiver: right.clone(),
                        expression: left.clone(),
                        continuation: projected,
                    });
                    projected = Arc::new(Behavior::Send {
                        receiver: left.clone(),
                        expression: right.clone(),
                        continuation: projected,
                    });
                } else if left == process || right == process {
                    projected = Arc::new(Behavior::Receive {
                        sender: introducer.clone(),
                        continuation: projected,
                    });
                }
                Ok(projected)
            }

            // Only the continuation is observable: processes are not created
            // at run time in a network.
            ChoreographyBody::Spawn { continuation, .. } => self.project(continuation),

            ChoreographyBody::Multicom {
                interactions,
                continuation,
            } => {
                let mut projected = self.project(continuation)?;
                let inputs = interactions
                    .iter()
                    .filter(|interaction| interaction.receiver() == process);
                for interaction in inputs.rev() {
                    projected = input(interaction, projected);
                }
                let outputs = interactions
                    .iter()
                    .filter(|interaction| interaction.sender() == process);
                for interaction in outputs.rev() {
                    projected = output(interaction, projected);
                }
                Ok(projected)
            }

            ChoreographyBody::Condition {
                process: owner,
                expression,
                then_branch,
                else_branch,
            } => {
                let then_branch = self.project(then_branch)?;
                let else_branch = self.project(else_branch)?;
                if owner == process {
                    return Ok(Arc::new(Behavior::Condition {
                        expression: expression.clone(),
                        then_branch,
                        else_branch,
                        continuation: Arc::new(Behavior::Continue),
                    }));
                }
                merge(&then_branch, &else_branch).map_err(|source| ProjectionError::Merge {
                    process: process.to_string(),
                    procedure: self.procedure.map(str::to_owned),
                    source,
                })
            }

            ChoreographyBody::ProcedureInvocation { procedure } => {
                Ok(Arc::new(if uses(self.used, procedure, process) {
                    Behavior::ProcedureInvocation {
                        procedure: procedure.clone(),
                        continuation: Arc::new(Behavior::Continue),
                    }
                } else {
                    Behavior::Termination
                }))
            }
        }
    }
}

fn output(interaction: &Interaction, continuation: Arc<Behavior>) -> Arc<Behavior> {
    Arc::new(match interaction {
        Interaction::Communication {
            receiver,
            expression,
            ..
        } => Behavior::Send {
            receiver: receiver.clone(),
            expression: expression.clone(),
            continuation,
        },
        Interaction::Selection {
            receiver, label, ..
        } => Behavior::Selection {
            receiver: receiver.clone(),
            label: label.clone(),
            continuation,
        },
    })
}

fn input(interaction: &Interaction, continuation: Arc<Behavior>) -> Arc<Behavior> {
    Arc::new(match interaction {
        Interaction::Communication { sender, .. } => Behavior::Receive {
            sender: sender.clone(),
            continuation,
        },
        Interaction::Selection { sender, label, .. } => Behavior::Offering {
            sender: sender.clone(),
            branches: BTreeMap::from([(label.clone(), continuation)]),
            continuation: Arc::new(Behavior::Continue),
        },
    })
}
