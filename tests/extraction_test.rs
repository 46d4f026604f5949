// End-to-end extraction of small networks

use anyhow::Result;
use chorex::ast::Behavior;
use chorex::extraction::{
    extract, Dot, ExecutionGraph, ExtractionConfig, ExtractionError, Extractor, OrderingPolicy,
    Strategy,
};
use chorex::network::{Action, Network, ProcessTerm};
use std::collections::BTreeSet;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn no_services() -> BTreeSet<String> {
    BTreeSet::new()
}

/// Client `c`, authenticator `a` and server `s` retrying a login until it
/// succeeds.
fn login_network() -> Network {
    let client = ProcessTerm::new(
        [(
            "X",
            Behavior::send(
                "a",
                "pwd",
                Behavior::offer(
                    "a",
                    [
                        ("ok", Behavior::receive("s", Behavior::Termination)),
                        ("ko", Behavior::invoke("X")),
                    ],
                ),
            ),
        )],
        Behavior::invoke("X"),
    );
    let authenticator = ProcessTerm::new(
        [(
            "X",
            Behavior::receive(
                "c",
                Behavior::receive(
                    "s",
                    Behavior::condition(
                        "s",
                        Behavior::select("c", "ok", Behavior::select("s", "ok", Behavior::Termination)),
                        Behavior::select("c", "ko", Behavior::select("s", "ko", Behavior::invoke("X"))),
                    ),
                ),
            ),
        )],
        Behavior::invoke("X"),
    );
    let server = ProcessTerm::new(
        [(
            "X",
            Behavior::send(
                "a",
                "s",
                Behavior::offer(
                    "a",
                    [
                        ("ok", Behavior::send("c", "t", Behavior::Termination)),
                        ("ko", Behavior::invoke("X")),
                    ],
                ),
            ),
        )],
        Behavior::invoke("X"),
    );

    Network::new()
        .with_process("c", client)
        .with_process("a", authenticator)
        .with_process("s", server)
}

fn ping(from: &str, to: &str, expression: &str) -> (ProcessTerm, ProcessTerm) {
    (
        ProcessTerm::new(
            [("X", Behavior::send(to, expression, Behavior::invoke("X")))],
            Behavior::invoke("X"),
        ),
        ProcessTerm::new(
            [("Y", Behavior::receive(from, Behavior::invoke("Y")))],
            Behavior::invoke("Y"),
        ),
    )
}

fn two_pairs() -> Network {
    let (p, q) = ping("p", "q", "e1");
    let (r, s) = ping("r", "s", "e2");
    [("p", p), ("q", q), ("r", r), ("s", s)].into_iter().collect()
}

/// `a` selects towards `b` while `c` talks to `d`; afterwards `a` talks to `c`.
fn concurrent_selection() -> Network {
    Network::new()
        .with_process(
            "a",
            ProcessTerm::main_only(Behavior::select(
                "b",
                "l",
                Behavior::send("c", "x", Behavior::Termination),
            )),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::offer("a", [("l", Behavior::Termination)])),
        )
        .with_process(
            "c",
            ProcessTerm::main_only(Behavior::send(
                "d",
                "e",
                Behavior::receive("a", Behavior::Termination),
            )),
        )
        .with_process(
            "d",
            ProcessTerm::main_only(Behavior::receive("c", Behavior::Termination)),
        )
}

/// `a` sends twice to `b` and then hears from `c`, which first talks to `d`.
fn staggered_senders() -> Network {
    Network::new()
        .with_process(
            "a",
            ProcessTerm::main_only(Behavior::send(
                "b",
                "m1",
                Behavior::send("b", "m2", Behavior::receive("c", Behavior::Termination)),
            )),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::receive(
                "a",
                Behavior::receive("a", Behavior::Termination),
            )),
        )
        .with_process(
            "c",
            ProcessTerm::main_only(Behavior::send(
                "d",
                "m3",
                Behavior::send("a", "m4", Behavior::Termination),
            )),
        )
        .with_process(
            "d",
            ProcessTerm::main_only(Behavior::receive("c", Behavior::Termination)),
        )
}

/// Tries actions in reverse textual order.
struct Reversed;

impl OrderingPolicy for Reversed {
    fn order(&self, _network: &Network, actions: &mut Vec<Action>) {
        actions.sort_by_key(|action| std::cmp::Reverse(action.to_string()));
    }
}

fn unrolled_depth(graph: &ExecutionGraph) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(graph.unrolled_root, 0)];
    while let Some((node, level)) = pending.pop() {
        deepest = deepest.max(level);
        pending.extend(graph.unrolled.neighbors(node).map(|child| (child, level + 1)));
    }
    deepest
}

#[test]
fn test_extract_login_loop() -> Result<()> {
    init_tracing();
    let result = extract(&login_network(), &no_services(), &ExtractionConfig::default())?;

    assert_eq!(result.program.choreographies.len(), 1);
    let choreography = &result.program.choreographies[0];
    assert_eq!(choreography.procedures.len(), 1);
    assert!(choreography.procedures[0].body.to_string().starts_with("c.pwd->a; "));
    assert_eq!(
        result.program.to_string(),
        "def X1 { c.pwd->a; s.s->a; if a.s then a->c[ok]; a->s[ok]; s.t->c; stop \
         else a->c[ko]; a->s[ko]; X1 } main {X1}"
    );
    Ok(())
}

#[test]
fn test_extract_splits_independent_pairs() -> Result<()> {
    let result = extract(&two_pairs(), &no_services(), &ExtractionConfig::default())?;

    assert_eq!(
        result.program.to_string(),
        "def X1 { p.e1->q; X1 } main {X1} || def X1 { r.e2->s; X1 } main {X1}"
    );
    assert_eq!(result.graphs.len(), 2);
    assert!(result.graphs.iter().all(|graph| graph.statistics.loops == 1));
    Ok(())
}

#[test]
fn test_parallel_extraction_matches_sequential() -> Result<()> {
    let sequential = extract(&two_pairs(), &no_services(), &ExtractionConfig::default())?;
    let parallel = extract(
        &two_pairs(),
        &no_services(),
        &ExtractionConfig::default().with_parallel(true),
    )?;

    assert_eq!(sequential.program, parallel.program);
    Ok(())
}

#[test]
fn test_extraction_is_deterministic() -> Result<()> {
    let first = extract(&login_network(), &no_services(), &ExtractionConfig::default())?;
    let second = extract(&login_network(), &no_services(), &ExtractionConfig::default())?;

    assert_eq!(first.program.to_string(), second.program.to_string());
    Ok(())
}

#[test]
fn test_extract_send_cycle_as_multicom() -> Result<()> {
    let network = Network::new()
        .with_process(
            "a",
            ProcessTerm::main_only(Behavior::send(
                "b",
                "msg1",
                Behavior::receive("b", Behavior::Termination),
            )),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::send(
                "a",
                "msg2",
                Behavior::receive("a", Behavior::Termination),
            )),
        );

    let result = extract(&network, &no_services(), &ExtractionConfig::default())?;
    assert_eq!(result.program.to_string(), "main {(a.msg1->b, b.msg2->a); stop}");

    let error = extract(
        &network,
        &no_services(),
        &ExtractionConfig::default().with_multicom(false),
    )
    .unwrap_err();
    assert!(matches!(error, ExtractionError::Deadlock { .. }));
    Ok(())
}

#[test]
fn test_extract_batches_independent_interactions() -> Result<()> {
    let result = extract(&concurrent_selection(), &no_services(), &ExtractionConfig::default())?;

    assert_eq!(
        result.program.to_string(),
        "main {(a->b[l], c.e->d); a.x->c; stop}"
    );
    Ok(())
}

#[test]
fn test_strategies_order_interactions() -> Result<()> {
    let config = ExtractionConfig::default().with_multicom(false);

    let default = extract(&concurrent_selection(), &no_services(), &config)?;
    assert_eq!(
        default.program.to_string(),
        "main {a->b[l]; c.e->d; a.x->c; stop}"
    );

    let interaction_first = extract(
        &concurrent_selection(),
        &no_services(),
        &config.with_strategy(Strategy::InteractionFirst),
    )?;
    assert_eq!(
        interaction_first.program.to_string(),
        "main {c.e->d; a->b[l]; a.x->c; stop}"
    );
    Ok(())
}

#[test]
fn test_extract_reports_deadlock() {
    let network = Network::new()
        .with_process(
            "a",
            ProcessTerm::main_only(Behavior::receive("b", Behavior::Termination)),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)),
        );

    match extract(&network, &no_services(), &ExtractionConfig::default()) {
        Err(ExtractionError::Deadlock { state }) => assert_eq!(state, network),
        other => panic!("expected a deadlock, got {other:?}"),
    }
}

#[test]
fn test_starving_loop_is_rejected_unless_service() -> Result<()> {
    let (p, q) = ping("p", "q", "e");
    let network = Network::new()
        .with_process("p", p)
        .with_process("q", q)
        .with_process(
            "r",
            ProcessTerm::main_only(Behavior::receive("q", Behavior::Termination)),
        );

    match extract(&network, &no_services(), &ExtractionConfig::default()) {
        Err(ExtractionError::Starvation { starved, .. }) => assert_eq!(starved, ["r"]),
        other => panic!("expected starvation, got {other:?}"),
    }

    let result = Extractor::new(ExtractionConfig::default())
        .with_services(["r"])
        .extract(&network)?;
    assert_eq!(result.program.to_string(), "def X1 { p.e->q; X1 } main {X1}");
    assert!(result.program.choreographies[0].processes.contains("r"));
    assert!(result.graphs[0].statistics.bad_loops == 0);
    Ok(())
}

#[test]
fn test_purge_drops_terminated_processes() -> Result<()> {
    let network = Network::new()
        .with_process(
            "a",
            ProcessTerm::main_only(Behavior::send("b", "m", Behavior::Termination)),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)),
        )
        .with_process("c", ProcessTerm::main_only(Behavior::Termination));

    let purged = extract(&network, &no_services(), &ExtractionConfig::default())?;
    assert_eq!(purged.program.to_string(), "main {a.m->b; stop}");

    let kept = extract(
        &network,
        &no_services(),
        &ExtractionConfig::default().with_purge(false),
    )?;
    assert_eq!(kept.program.to_string(), "main {a.m->b; stop} || main {stop}");
    Ok(())
}

#[test]
fn test_dot_export_of_extracted_graph() -> Result<()> {
    let result = extract(&two_pairs(), &no_services(), &ExtractionConfig::default())?;
    let dot = Dot::new(&result.graphs[0]).to_string();

    assert!(dot.starts_with("digraph \"seg\" {"));
    assert!(dot.contains("style=dashed"));
    assert!(dot.contains("p.e1->q"));
    Ok(())
}

#[test]
fn test_custom_policy_replaces_strategy() -> Result<()> {
    let result = Extractor::new(ExtractionConfig::default().with_multicom(false))
        .with_policy(Reversed)
        .extract(&concurrent_selection())?;

    assert_eq!(
        result.program.to_string(),
        "main {c.e->d; a->b[l]; a.x->c; stop}"
    );
    Ok(())
}

#[test]
fn test_unmarked_first_prefers_idle_processes() -> Result<()> {
    let config = ExtractionConfig::default().with_multicom(false);

    let default = extract(&staggered_senders(), &no_services(), &config)?;
    assert_eq!(
        default.program.to_string(),
        "main {a.m1->b; a.m2->b; c.m3->d; c.m4->a; stop}"
    );

    let unmarked = extract(
        &staggered_senders(),
        &no_services(),
        &config.with_strategy(Strategy::UnmarkedFirst),
    )?;
    assert_eq!(
        unmarked.program.to_string(),
        "main {a.m1->b; c.m3->d; a.m2->b; c.m4->a; stop}"
    );
    Ok(())
}

#[test]
fn test_unrolled_graph_respects_depth() -> Result<()> {
    for depth in [4, 12] {
        let result = extract(
            &login_network(),
            &no_services(),
            &ExtractionConfig::default().with_unroll_depth(depth),
        )?;
        assert_eq!(unrolled_depth(&result.graphs[0]), depth);
    }

    // Finite runs end before the limit.
    let result = extract(
        &concurrent_selection(),
        &no_services(),
        &ExtractionConfig::default().with_multicom(false),
    )?;
    assert_eq!(unrolled_depth(&result.graphs[0]), 3);
    Ok(())
}

#[test]
fn test_repeated_call_of_empty_procedure() -> Result<()> {
    let network = Network::new()
        .with_process(
            "a",
            ProcessTerm::new(
                [("N", Behavior::Continue)],
                Behavior::invoke_then(
                    "N",
                    Behavior::invoke_then("N", Behavior::send("b", "m", Behavior::Termination)),
                ),
            ),
        )
        .with_process(
            "b",
            ProcessTerm::main_only(Behavior::receive("a", Behavior::Termination)),
        );

    let result = extract(&network, &no_services(), &ExtractionConfig::default())?;
    assert_eq!(result.program.to_string(), "main {a.m->b; stop}");
    Ok(())
}
