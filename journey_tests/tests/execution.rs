// End-to-end execution scenarios: a `Navigator` driving a `SimWorld` with
// synthetic ticks through bonks, warps, animation windows, cancellation and
// transition discovery.

use journey_tests::{Journey, SimWorld};
use wayfarer_nav::{
    Direction, FailureReason, Location, MapId, NavConfig, NavEvent, NavEventKind, PathNotFound,
    PlanError, Position, SourceGrid, SourceTile, TickStatus,
};

const A: MapId = MapId(1);
const B: MapId = MapId(2);

/// Generous upper bound on ticks for any scenario here.
const MAX_TICKS: u64 = 1_000;

fn p(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn corridor(start_x: i32) -> SimWorld {
    SimWorld::new(Location::new(A, p(start_x, 0))).with_map(A, SourceGrid::new(6, 1))
}

/// Two 5x5 maps; stepping right from A(4,2) warps to B(0,2).
fn two_map_journey(config: NavConfig) -> Journey {
    let mut world = SimWorld::new(Location::new(A, p(0, 0)))
        .with_map(A, SourceGrid::new(5, 5))
        .with_map(B, SourceGrid::new(5, 5));
    world.add_warp(Location::new(A, p(4, 2)), Direction::Right, Location::new(B, p(0, 2)));
    world.set_warp_animation(5);
    let mut journey = Journey::new(world, config);
    journey
        .nav
        .map_graph_mut()
        .add_edge(A, p(4, 2), B, p(0, 2), false);
    journey
}

fn is_bonk(e: &NavEvent) -> bool {
    matches!(e.kind, NavEventKind::Bonk { .. })
}

// ---------------------------------------------------------------------------
// Happy path and transitions
// ---------------------------------------------------------------------------

#[test]
fn full_journey_across_two_maps() {
    let mut journey = two_map_journey(NavConfig::default());
    assert_eq!(journey.go(B, p(4, 4)).unwrap(), 13);

    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
    assert_eq!(journey.world.agent(), Location::new(B, p(4, 4)));
    assert_eq!(journey.actuator.history().len(), 13);
    assert_eq!(journey.count_events(is_bonk), 0);
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::TransitionStarted { from_map: A, to_map: B })),
        1
    );
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::TransitionCompleted { map: B, .. })),
        1
    );
    // The edge was already known.
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::TransitionLearned { .. })),
        0
    );
    assert_eq!(journey.nav.map_graph().edge_count(), 1);
}

#[test]
fn no_commands_issued_while_transitioning() {
    let mut journey = two_map_journey(NavConfig::default());
    journey.go(B, p(4, 4)).unwrap();

    let mut saw_transition = false;
    for _ in 0..MAX_TICKS {
        let before = journey.actuator.history().len();
        let status = journey.step();
        if status == TickStatus::Transitioning {
            saw_transition = true;
            assert_eq!(journey.actuator.history().len(), before);
        }
        if status == TickStatus::Done {
            break;
        }
    }
    assert!(saw_transition);
    assert_eq!(journey.nav.status(), &TickStatus::Done);
}

#[test]
fn transition_waits_at_least_the_minimum() {
    let config = NavConfig {
        transition_min_ticks: 20,
        ..NavConfig::default()
    };
    let mut journey = two_map_journey(config);
    journey.go(B, p(4, 4)).unwrap();
    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);

    let started = journey
        .events
        .iter()
        .find(|e| matches!(e.kind, NavEventKind::TransitionStarted { .. }))
        .map(|e| e.tick)
        .unwrap();
    let completed = journey
        .events
        .iter()
        .find_map(|e| match e.kind {
            NavEventKind::TransitionCompleted { waited_ticks, .. } => Some((e.tick, waited_ticks)),
            _ => None,
        })
        .unwrap();
    assert_eq!(completed.0 - started, 20);
    assert_eq!(completed.1, 20);
}

#[test]
fn transition_timeout_is_a_warning_not_a_failure() {
    let config = NavConfig {
        transition_min_ticks: 4,
        transition_timeout_ticks: Some(15),
        ..NavConfig::default()
    };
    let mut journey = two_map_journey(config);
    journey.world.set_warp_animation(0);
    journey.world.set_stability_stuck(true);
    journey.go(B, p(4, 4)).unwrap();

    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
    assert_eq!(
        journey.count_events(|e| e.kind == NavEventKind::TransitionTimeout { map: B, waited_ticks: 15 }),
        1
    );
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::TransitionCompleted { .. })),
        0
    );
}

#[test]
fn unknown_warp_is_learned_and_then_routable() {
    let mut world = SimWorld::new(Location::new(A, p(2, 0)))
        .with_map(A, SourceGrid::new(5, 5))
        .with_map(B, SourceGrid::new(5, 5));
    // Stepping down from A(2,3) drops the agent onto B(2,0).
    world.add_warp(Location::new(A, p(2, 3)), Direction::Down, Location::new(B, p(2, 0)));
    world.set_warp_animation(3);
    let mut journey = Journey::new(world, NavConfig::default());

    // The registry knows nothing about B.
    assert!(matches!(
        journey.nav.plan_route(&journey.world, B, p(2, 4)),
        Err(PlanError::PathNotFound(PathNotFound::NoMapSequence { .. }))
    ));

    // Walking to A(2,4) falls through the warp; the executor bonks on B
    // until it gives up, but the transition is recorded.
    journey.go(A, p(2, 4)).unwrap();
    let status = journey.run(MAX_TICKS);
    assert!(matches!(status, TickStatus::Failed(FailureReason::MovementStuck { .. })));

    let graph = journey.nav.map_graph();
    let edge = graph.find_edge(A, p(2, 3), B, p(2, 0)).expect("edge learned");
    assert_eq!(graph.edge(edge).unwrap().exit_direction, Some(Direction::Down));
    assert!(!graph.has_edge(B, p(2, 0), A, p(2, 3)));
    assert_eq!(
        journey.count_events(|e| e.kind == NavEventKind::TransitionLearned { edge }),
        1
    );

    // Back on A, the learned edge now routes to B.
    journey.world.teleport(Location::new(A, p(0, 0)));
    let route = journey.nav.plan_route(&journey.world, B, p(4, 4)).unwrap();
    assert_eq!(route.map_hops(), 1);
}

// ---------------------------------------------------------------------------
// Bonk recovery
// ---------------------------------------------------------------------------

#[test]
fn two_bonks_then_success_completes_without_replan() {
    let mut world = corridor(0);
    world.swallow_attempts([1, 2]);
    let mut journey = Journey::new(world, NavConfig::default());
    journey.go(A, p(3, 0)).unwrap();

    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
    assert_eq!(journey.world.agent(), Location::new(A, p(3, 0)));
    assert_eq!(journey.count_events(is_bonk), 2);
    assert_eq!(journey.actuator.history().len(), 3 + 2);

    let attempts_on_first_step = journey
        .events
        .iter()
        .filter_map(|e| match e.kind {
            NavEventKind::StepStarted { step_index: 0, attempt, .. } => Some(attempt),
            _ => None,
        })
        .max();
    assert_eq!(attempts_on_first_step, Some(3));
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::RoutePlanned { .. })),
        1
    );
}

#[test]
fn always_failing_actuator_exhausts_bonk_budget() {
    let mut world = corridor(0);
    world.set_jammed(true);
    let mut journey = Journey::new(world, NavConfig::default());
    journey.go(A, p(3, 0)).unwrap();

    match journey.run(MAX_TICKS) {
        TickStatus::Failed(FailureReason::MovementStuck {
            step_index,
            expected,
            observed,
            attempts,
            ..
        }) => {
            assert_eq!(step_index, 0);
            assert_eq!(expected, p(1, 0));
            assert_eq!(observed, p(0, 0));
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(journey.actuator.history().len(), 3);
    assert_eq!(
        journey.count_events(|e| matches!(e.kind, NavEventKind::MovementStuck { .. })),
        1
    );

    // Failed is terminal: more ticks issue nothing.
    for _ in 0..20 {
        assert!(matches!(journey.step(), TickStatus::Failed(_)));
    }
    assert_eq!(journey.actuator.history().len(), 3);
}

#[test]
fn earlier_success_does_not_extend_budget_on_later_step() {
    let mut world = corridor(0);
    world.swallow_attempts(2..=50);
    let mut journey = Journey::new(world, NavConfig::default());
    journey.go(A, p(3, 0)).unwrap();

    let status = journey.run(MAX_TICKS);
    assert!(matches!(
        status,
        TickStatus::Failed(FailureReason::MovementStuck { step_index: 1, attempts: 3, .. })
    ));
    assert_eq!(journey.actuator.history().len(), 1 + 3);
}

#[test]
fn bonk_budget_comes_from_json_config() {
    let config = NavConfig::from_json(r#"{ "max_bonks": 2, "settle_ticks": 1, "bonk_recovery_ticks": 1 }"#).unwrap();
    let mut world = corridor(0);
    world.set_jammed(true);
    let mut journey = Journey::new(world, config);
    journey.go(A, p(2, 0)).unwrap();

    assert!(matches!(
        journey.run(MAX_TICKS),
        TickStatus::Failed(FailureReason::MovementStuck { attempts: 2, .. })
    ));
}

#[test]
fn blocker_after_planning_fails_then_replan_detours() {
    let world = SimWorld::new(Location::new(A, p(0, 1))).with_map(A, SourceGrid::new(5, 3));
    let mut journey = Journey::new(world, NavConfig::default());
    journey.go(A, p(4, 1)).unwrap();

    // Something wanders onto the straight line after the plan was made.
    journey.world.set_transient_blockers(A, vec![p(2, 1)]);
    let status = journey.run(MAX_TICKS);
    assert!(matches!(
        status,
        TickStatus::Failed(FailureReason::MovementStuck { step_index: 1, .. })
    ));
    assert_eq!(journey.world.agent(), Location::new(A, p(1, 1)));

    let steps = journey.go(A, p(4, 1)).unwrap();
    assert_eq!(steps, 5);
    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
    assert_eq!(journey.world.agent(), Location::new(A, p(4, 1)));
}

#[test]
fn capability_acquired_then_route_executes() {
    let layout = SourceGrid::from_rows(&["..#..", ".....", "..#.."]).with(p(2, 1), SourceTile::Gate("cut".into()));
    let world = SimWorld::new(Location::new(A, p(0, 1))).with_map(A, layout);
    let mut journey = Journey::new(world, NavConfig::default());

    assert!(journey.go(A, p(4, 1)).is_err());
    journey.world.grant("cut");
    assert_eq!(journey.go(A, p(4, 1)).unwrap(), 4);
    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
}

// ---------------------------------------------------------------------------
// Cancellation and determinism
// ---------------------------------------------------------------------------

#[test]
fn cancel_is_honored_at_next_step_boundary() {
    let mut journey = Journey::new(corridor(0), NavConfig::default());
    journey.go(A, p(4, 0)).unwrap();

    while journey.count_events(|e| matches!(e.kind, NavEventKind::StepCompleted { .. })) == 0 {
        journey.step();
    }
    // The second step's move has already been issued.
    let issued = journey.actuator.history().len();
    assert_eq!(issued, 2);
    journey.nav.cancel();

    assert_eq!(journey.run(MAX_TICKS), TickStatus::Idle);
    assert_eq!(journey.actuator.history().len(), issued);
    assert_eq!(journey.world.agent(), Location::new(A, p(2, 0)));
    assert_eq!(
        journey.count_events(|e| e.kind == NavEventKind::RouteCancelled { remaining_steps: 2 }),
        1
    );
    assert_eq!(journey.nav.status(), &TickStatus::Idle);

    // A new route can be started right away.
    journey.go(A, p(5, 0)).unwrap();
    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
}

#[test]
fn identical_journeys_log_identical_events() {
    let run = || {
        let mut journey = two_map_journey(NavConfig::default());
        journey.world.swallow_attempts([4, 9]);
        journey.go(B, p(4, 4)).unwrap();
        let status = journey.run(MAX_TICKS);
        (status, journey.events, journey.actuator.history().to_vec())
    };
    let (status_a, events_a, moves_a) = run();
    let (status_b, events_b, moves_b) = run();
    assert_eq!(status_a, TickStatus::Done);
    assert_eq!(status_a, status_b);
    assert_eq!(moves_a, moves_b);
    assert_eq!(
        serde_json::to_string(&events_a).unwrap(),
        serde_json::to_string(&events_b).unwrap()
    );
}

#[test]
fn world_follows_configured_ledge_direction() {
    // The ledge is open above and below only; the tie-break decides.
    let layout = SourceGrid::from_rows(&[".....", ".#L#.", "....."]);
    let world = SimWorld::new(Location::new(A, p(2, 2))).with_map(A, layout);
    let config = NavConfig {
        descending_direction: Direction::Up,
        ..NavConfig::default()
    };
    let mut journey = Journey::new(world, config);

    assert_eq!(journey.go(A, p(2, 0)).unwrap(), 2);
    assert_eq!(journey.run(MAX_TICKS), TickStatus::Done);
    assert_eq!(journey.world.agent(), Location::new(A, p(2, 0)));
    assert_eq!(journey.count_events(is_bonk), 0);
}
