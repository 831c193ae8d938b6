// The engine facade: planning, execution, and the per-tick loop.
//
// `Navigator` owns every piece of mutable navigation state: the map graph
// registry, the collision grid cache, the in-flight route (inside the step
// executor), the transition supervisor, the config, and the event log.
// Collaborators are never owned. Perception and actuation are passed into
// each call, so the engine holds no references to the outside world between
// ticks and a test can drive it with plain structs.
//
// ## Planning
//
// `plan_route()` reads the agent's current map and tile from perception,
// adopts the current capability snapshot (evicting grids gated by changed
// capabilities), and runs the global router. The route is returned to the
// caller; nothing runs until `begin_execution()` hands it back.
//
// ## Tick loop
//
// Each `tick()` call is one bounded unit of work:
//
//   1. Advance the tick counter and read perception.
//   2. Register the observed map and adopt the capability snapshot.
//   3. Let the transition supervisor look at the observation. While it
//      reports a transition the executor is not ticked at all and the
//      status is `Transitioning`.
//   4. On release, optionally learn the transition edge that was just
//      crossed (last stable location -> first stable location on the new
//      map), unless an identical edge is already registered. The edge gets
//      an exit direction only if a move was in flight when the map change
//      was detected; a teleport with no pending move records none.
//   5. Tick the step executor.
//
// See also: `global_router.rs`, `executor.rs`, `transition.rs`.
//
// **Critical constraint: determinism.** Given the same config, the same
// sequence of perception observations and the same calls, the navigator
// issues the same moves and logs the same events.

use crate::collision::CollisionProvider;
use crate::config::NavConfig;
use crate::error::PlanError;
use crate::event::{EventLog, NavEvent, NavEventKind};
use crate::executor::{StepExecutor, TickStatus};
use crate::global_router::GlobalRouter;
use crate::map_graph::MapGraph;
use crate::perception::{Actuator, Perception};
use crate::transition::{SupervisorStatus, TransitionOutcome, TransitionSupervisor};
use crate::types::{Direction, Location, MapId, Position, Route};

#[derive(Debug)]
pub struct Navigator {
    config: NavConfig,
    graph: MapGraph,
    collision: CollisionProvider,
    executor: StepExecutor,
    supervisor: TransitionSupervisor,
    events: EventLog,
    tick: u64,
    status: TickStatus,
    /// Move in flight when the current transition was detected.
    transition_move: Option<Direction>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(NavConfig::default())
    }
}

impl Navigator {
    pub fn new(config: NavConfig) -> Self {
        Self::with_map_graph(config, MapGraph::new())
    }

    /// Start from a previously discovered registry.
    pub fn with_map_graph(config: NavConfig, graph: MapGraph) -> Self {
        Self {
            collision: CollisionProvider::new(config.descending_direction),
            executor: StepExecutor::new(&config),
            supervisor: TransitionSupervisor::new(&config),
            config,
            graph,
            events: EventLog::new(),
            tick: 0,
            status: TickStatus::Idle,
            transition_move: None,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn map_graph(&self) -> &MapGraph {
        &self.graph
    }

    pub fn map_graph_mut(&mut self) -> &mut MapGraph {
        &mut self.graph
    }

    pub fn collision(&self) -> &CollisionProvider {
        &self.collision
    }

    /// Drop the cached collision grid for one map.
    pub fn invalidate_map(&mut self, map: MapId) -> bool {
        self.collision.invalidate(map)
    }

    pub fn invalidate_all(&mut self) {
        self.collision.invalidate_all();
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Number of `tick()` calls so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Status returned by the most recent `tick()`.
    pub fn status(&self) -> &TickStatus {
        &self.status
    }

    /// Remove and return all events logged so far.
    pub fn drain_events(&mut self) -> Vec<NavEvent> {
        self.events.drain()
    }

    /// Plan a route from the agent's current location to `goal` on
    /// `goal_map`.
    pub fn plan_route<P: Perception + ?Sized>(
        &mut self,
        perception: &P,
        goal_map: MapId,
        goal: Position,
    ) -> Result<Route, PlanError> {
        let start_map = perception.current_map();
        let start = perception.current_position();
        self.graph.add_map(start_map);
        self.collision.sync_capabilities(perception.capabilities());

        let result = GlobalRouter::new(&self.graph, &mut self.collision, perception, &self.config)
            .plan(start_map, start, goal_map, goal);
        match &result {
            Ok(route) => {
                tracing::debug!(
                    %start_map,
                    %start,
                    %goal_map,
                    %goal,
                    steps = route.len(),
                    hops = route.map_hops(),
                    "route planned"
                );
                self.events.push(
                    self.tick,
                    NavEventKind::RoutePlanned {
                        goal_map,
                        goal,
                        steps: route.len(),
                        hops: route.map_hops(),
                    },
                );
            }
            Err(err) => tracing::debug!(%err, %start_map, %goal_map, "no route"),
        }
        result
    }

    /// Hand a route to the step executor, replacing any route in flight.
    pub fn begin_execution(&mut self, route: Route) {
        self.executor.begin(route);
        self.status = TickStatus::InProgress;
    }

    /// Cancel the route in flight. Honored at the next step boundary.
    pub fn cancel(&mut self) {
        self.executor.cancel(self.tick, &mut self.events);
        if self.executor.route().is_none() {
            self.status = TickStatus::Idle;
        }
    }

    /// Advance the engine by one tick.
    pub fn tick<P, A>(&mut self, perception: &P, actuator: &mut A) -> TickStatus
    where
        P: Perception + ?Sized,
        A: Actuator + ?Sized,
    {
        self.tick += 1;
        let now = self.tick;
        let observed = Location::new(perception.current_map(), perception.current_position());
        self.graph.add_map(observed.map);
        self.collision.sync_capabilities(perception.capabilities());

        let was_transitioning = self.supervisor.is_transitioning();
        let supervision = self.supervisor.observe(
            now,
            observed,
            perception.is_animation_stable(),
            &mut self.events,
        );
        if !was_transitioning && self.supervisor.is_transitioning() {
            self.transition_move = self.executor.in_flight_direction();
        }
        let status = match supervision {
            SupervisorStatus::Transitioning => TickStatus::Transitioning,
            SupervisorStatus::Released(outcome) => {
                let exit_direction = self.transition_move.take();
                if self.config.learn_transitions {
                    self.learn_transition(now, outcome, exit_direction);
                }
                self.executor.tick(now, observed, actuator, &mut self.events)
            }
            SupervisorStatus::Stable => self.executor.tick(now, observed, actuator, &mut self.events),
        };
        self.status = status.clone();
        status
    }

    fn learn_transition(&mut self, now: u64, outcome: TransitionOutcome, exit_direction: Option<Direction>) {
        let TransitionOutcome { from, to, .. } = outcome;
        if self.graph.has_edge(from.map, from.position, to.map, to.position) {
            return;
        }
        let edge = match exit_direction {
            Some(direction) => {
                self.graph
                    .add_edge_with_direction(from.map, from.position, to.map, to.position, direction)
            }
            None => self
                .graph
                .add_edge(from.map, from.position, to.map, to.position, false),
        };
        tracing::info!(%edge, %from, %to, "learned transition edge");
        self.events.push(now, NavEventKind::TransitionLearned { edge });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::collision::SourceGrid;
    use crate::perception::{TileAtlas, TileSource};

    const A: MapId = MapId(1);
    const B: MapId = MapId(2);

    /// Minimal perception: a fixed atlas and a mutable agent location.
    struct Fixture {
        atlas: TileAtlas,
        at: Location,
        stable: bool,
    }

    impl TileSource for Fixture {
        fn tile_grid(&self, map: MapId) -> Option<SourceGrid> {
            self.atlas.tile_grid(map)
        }
    }

    impl Perception for Fixture {
        fn current_map(&self) -> MapId {
            self.at.map
        }
        fn current_position(&self) -> Position {
            self.at.position
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn is_animation_stable(&self) -> bool {
            self.stable
        }
    }

    #[derive(Default)]
    struct Moves(Vec<Direction>);

    impl Actuator for Moves {
        fn attempt_move(&mut self, direction: Direction) {
            self.0.push(direction);
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            atlas: TileAtlas::new()
                .with_map(A, SourceGrid::new(5, 5))
                .with_map(B, SourceGrid::new(5, 5)),
            at: Location::new(A, Position::new(0, 0)),
            stable: true,
        }
    }

    #[test]
    fn plan_route_logs_event_and_registers_start_map() {
        let world = fixture();
        let mut nav = Navigator::default();
        let route = nav.plan_route(&world, A, Position::new(2, 2)).unwrap();
        assert_eq!(route.len(), 4);
        assert!(nav.map_graph().contains_map(A));
        let events = nav.drain_events();
        assert!(matches!(events[0].kind, NavEventKind::RoutePlanned { steps: 4, hops: 0, .. }));
    }

    #[test]
    fn plan_route_is_deterministic() {
        let world = fixture();
        let mut nav = Navigator::default();
        nav.map_graph_mut()
            .add_edge(A, Position::new(4, 2), B, Position::new(0, 2), false);
        let first = nav.plan_route(&world, B, Position::new(4, 4)).unwrap();
        let second = nav.plan_route(&world, B, Position::new(4, 4)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn idle_ticks_report_idle() {
        let world = fixture();
        let mut nav = Navigator::default();
        let mut moves = Moves::default();
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Idle);
        assert_eq!(nav.current_tick(), 1);
        assert!(moves.0.is_empty());
    }

    #[test]
    fn unobserved_map_change_is_learned() {
        let mut world = fixture();
        world.at = Location::new(A, Position::new(2, 4));
        let mut nav = Navigator::new(NavConfig {
            transition_min_ticks: 1,
            ..NavConfig::default()
        });
        let mut moves = Moves::default();
        nav.tick(&world, &mut moves);

        world.at = Location::new(B, Position::new(2, 0));
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Transitioning);
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Idle);
        assert!(nav.map_graph().has_edge(A, Position::new(2, 4), B, Position::new(2, 0)));
        assert!(!nav.map_graph().has_edge(B, Position::new(2, 0), A, Position::new(2, 4)));
        assert!(nav
            .drain_events()
            .iter()
            .any(|e| matches!(e.kind, NavEventKind::TransitionLearned { .. })));
    }

    #[test]
    fn teleport_after_finished_route_learns_no_exit_direction() {
        let mut world = fixture();
        let mut nav = Navigator::new(NavConfig {
            transition_min_ticks: 1,
            settle_ticks: 1,
            ..NavConfig::default()
        });
        let mut moves = Moves::default();
        let route = nav.plan_route(&world, A, Position::new(1, 0)).unwrap();
        nav.begin_execution(route);

        nav.tick(&world, &mut moves);
        assert_eq!(moves.0, vec![Direction::Right]);
        world.at = Location::new(A, Position::new(1, 0));
        nav.tick(&world, &mut moves);
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Done);

        // Moved by something other than the executor.
        world.at = Location::new(B, Position::new(3, 3));
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Transitioning);
        nav.tick(&world, &mut moves);

        let graph = nav.map_graph();
        let edge = graph
            .find_edge(A, Position::new(1, 0), B, Position::new(3, 3))
            .unwrap();
        assert_eq!(graph.edge(edge).unwrap().exit_direction, None);
        assert_eq!(moves.0.len(), 1);
    }

    #[test]
    fn warp_during_move_learns_its_direction() {
        let mut world = fixture();
        world.at = Location::new(A, Position::new(0, 4));
        let mut nav = Navigator::new(NavConfig {
            transition_min_ticks: 1,
            ..NavConfig::default()
        });
        let mut moves = Moves::default();
        let route = nav.plan_route(&world, A, Position::new(1, 4)).unwrap();
        nav.begin_execution(route);
        nav.tick(&world, &mut moves);
        assert_eq!(moves.0, vec![Direction::Right]);

        // The move lands on a warp.
        world.at = Location::new(B, Position::new(0, 0));
        assert_eq!(nav.tick(&world, &mut moves), TickStatus::Transitioning);
        nav.tick(&world, &mut moves);

        let graph = nav.map_graph();
        let edge = graph
            .find_edge(A, Position::new(0, 4), B, Position::new(0, 0))
            .unwrap();
        assert_eq!(graph.edge(edge).unwrap().exit_direction, Some(Direction::Right));
    }

    #[test]
    fn learning_can_be_disabled() {
        let mut world = fixture();
        let mut nav = Navigator::new(NavConfig {
            transition_min_ticks: 1,
            learn_transitions: false,
            ..NavConfig::default()
        });
        let mut moves = Moves::default();
        nav.tick(&world, &mut moves);
        world.at = Location::new(B, Position::new(0, 0));
        nav.tick(&world, &mut moves);
        nav.tick(&world, &mut moves);
        assert_eq!(nav.map_graph().edge_count(), 0);
        assert!(nav.map_graph().contains_map(B));
    }
}
