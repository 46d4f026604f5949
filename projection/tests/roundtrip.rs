// Projection of extracted choreographies and the scenarios around merging

use anyhow::Result;
use chorex::ast::{Behavior, Choreography, ChoreographyBody, Program};
use chorex::extraction::{extract, ExtractionConfig};
use chorex::network::{Network, ProcessTerm};
use chorex_projection::{project, project_choreography, project_collecting, ProjectionError};
use std::collections::BTreeSet;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn login_network() -> Network {
    let retry = |on_ok: Behavior| {
        Behavior::offer("a", [("ok", on_ok), ("ko", Behavior::invoke("X"))])
    };
    Network::new()
        .with_process(
            "c",
            ProcessTerm::new(
                [(
                    "X",
                    Behavior::send("a", "pwd", retry(Behavior::receive("s", Behavior::Termination))),
                )],
                Behavior::invoke("X"),
            ),
        )
        .with_process(
            "a",
            ProcessTerm::new(
                [(
                    "X",
                    Behavior::receive(
                        "c",
                        Behavior::receive(
                            "s",
                            Behavior::condition(
                                "s",
                                Behavior::select(
                                    "c",
                                    "ok",
                                    Behavior::select("s", "ok", Behavior::Termination),
                                ),
                                Behavior::select(
                                    "c",
                                    "ko",
                                    Behavior::select("s", "ko", Behavior::invoke("X")),
                                ),
                            ),
                        ),
                    ),
                )],
                Behavior::invoke("X"),
            ),
        )
        .with_process(
            "s",
            ProcessTerm::new(
                [(
                    "X",
                    Behavior::send("a", "s", retry(Behavior::send("c", "t", Behavior::Termination))),
                )],
                Behavior::invoke("X"),
            ),
        )
}

fn extract_default(network: &Network) -> Result<Program> {
    Ok(extract(network, &BTreeSet::new(), &ExtractionConfig::default())?.program)
}

#[test]
fn test_extract_then_project_then_extract() -> Result<()> {
    init_tracing();
    let program = extract_default(&login_network())?;
    let projected = project(&program)?;

    assert_eq!(
        projected.get("c").map(|term| term.procedure("X1").map(ToString::to_string)),
        Some(Some("a!<pwd>; a&{ko: X1, ok: s?; stop}".to_string()))
    );
    assert_eq!(extract_default(&projected)?, program);
    Ok(())
}

#[test]
fn test_roundtrip_of_independent_choreographies() -> Result<()> {
    let looping = |from: &str, to: &str| {
        Choreography::new(
            vec![chorex::ast::ProcedureDefinition::new(
                "X1",
                ChoreographyBody::communication(from, to, "e", ChoreographyBody::invoke("X1")),
            )],
            ChoreographyBody::invoke("X1"),
        )
    };
    let program = Program::new(vec![looping("p", "q"), looping("r", "s")]);

    let network = project(&program)?;
    assert_eq!(network.len(), 4);
    assert_eq!(extract_default(&network)?, program);

    let parallel = extract(
        &network,
        &BTreeSet::new(),
        &ExtractionConfig::default().with_parallel(true),
    )?;
    assert_eq!(parallel.program, program);
    Ok(())
}

#[test]
fn test_termination_projects_to_stopped_processes() -> Result<()> {
    let choreography =
        Choreography::new(vec![], ChoreographyBody::Termination).with_processes(["a", "b", "c"]);
    let network = project_choreography(&choreography)?;

    assert!(network
        .processes()
        .all(|(_, term)| term.main().is_termination()));
    assert_eq!(
        network.to_string(),
        "a{main {stop}} | b{main {stop}} | c{main {stop}}"
    );
    Ok(())
}

#[test]
fn test_unmergeable_branches_name_the_process() {
    let choreography = Choreography::new(
        vec![],
        ChoreographyBody::condition(
            "p",
            "e",
            ChoreographyBody::communication("q", "r", "m", ChoreographyBody::Termination),
            ChoreographyBody::communication("r", "q", "m", ChoreographyBody::Termination),
        ),
    );

    let error = project_choreography(&choreography).unwrap_err();
    assert!(matches!(&error, ProjectionError::Merge { process, .. } if process == "q"));
    assert!(error.to_string().starts_with("Cannot project process q: "));

    let errors = project_collecting(&choreography.into()).unwrap_err();
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_selections_merge_into_one_offering() -> Result<()> {
    let choreography = Choreography::new(
        vec![],
        ChoreographyBody::condition(
            "p",
            "e",
            ChoreographyBody::selection("p", "r", "l1", ChoreographyBody::Termination),
            ChoreographyBody::selection("p", "r", "l2", ChoreographyBody::Termination),
        ),
    );
    let network = project_choreography(&choreography)?;

    let expected = Behavior::offer(
        "p",
        [("l1", Behavior::Termination), ("l2", Behavior::Termination)],
    );
    assert_eq!(network.get("r").map(|term| term.main().as_ref()), Some(&expected));

    // The projection extracts back to the same conditional.
    assert_eq!(extract_default(&network)?, Program::from(choreography));
    Ok(())
}
