// Synthetic world for end-to-end navigation tests.
//
// `SimWorld` is a tiny deterministic stand-in for a real game: it holds the
// per-map tile layouts, the agent's location, the capability set, and a table
// of warps. It implements `Perception` so a `Navigator` can read it, and it
// applies the moves a `SimActuator` collected, using the same collision
// rules as the engine (so a route the engine thinks is legal really is).
//
// On top of that it can misbehave on purpose, to exercise recovery paths:
//
// - swallow specific move attempts, or every attempt ("jammed"), as bonks;
// - play a warp animation for a number of ticks during which moves are
//   ignored and perception reports the screen unstable;
// - report the screen unstable forever while accepting moves (a broken
//   stability signal, for transition timeouts);
// - place transient blockers that both the engine and the world respect.
//
// `Journey` bundles world, actuator and navigator with a tick driver.
//
// See also: `tests/routing.rs` and `tests/execution.rs` for the scenarios.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use wayfarer_nav::collision::{CollisionGrid, GridSnapshot};
use wayfarer_nav::{
    Actuator, CapabilitySet, Direction, Location, MapId, NavConfig, NavEvent, Navigator,
    Perception, Position, SourceGrid, SourceTile, TickStatus, TileAtlas, TileSource,
};

/// Install a `tracing` subscriber for test output, filtered by `RUST_LOG`.
/// Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct SimWorld {
    atlas: TileAtlas,
    agent: Location,
    capabilities: CapabilitySet,
    /// (standing on, moving) -> destination.
    warps: BTreeMap<(Location, Direction), Location>,
    warp_animation_ticks: u64,
    animation_remaining: u64,
    stability_stuck: bool,
    swallowed: BTreeSet<u32>,
    jammed: bool,
    attempts: u32,
    /// Tie-break for ledges without a declared direction.
    descending: Direction,
}

impl SimWorld {
    pub fn new(start: Location) -> Self {
        Self {
            atlas: TileAtlas::new(),
            agent: start,
            capabilities: CapabilitySet::new(),
            warps: BTreeMap::new(),
            warp_animation_ticks: 0,
            animation_remaining: 0,
            stability_stuck: false,
            swallowed: BTreeSet::new(),
            jammed: false,
            attempts: 0,
            descending: Direction::Down,
        }
    }

    pub fn with_map(mut self, map: MapId, grid: SourceGrid) -> Self {
        self.atlas.insert(map, grid);
        self
    }

    /// Add a warp: moving `direction` while on `from` lands on `to`. The
    /// tile at `from` is marked as a warp tile.
    pub fn add_warp(&mut self, from: Location, direction: Direction, to: Location) {
        if let Some(grid) = self.atlas.grid_mut(from.map) {
            grid.set(from.position, SourceTile::Warp);
        }
        self.warps.insert((from, direction), to);
    }

    /// Ticks of animation after every warp.
    pub fn set_warp_animation(&mut self, ticks: u64) {
        self.warp_animation_ticks = ticks;
    }

    /// Perception reports "unstable" forever, while moves still work.
    pub fn set_stability_stuck(&mut self, stuck: bool) {
        self.stability_stuck = stuck;
    }

    /// Swallow these (1-based) move attempts.
    pub fn swallow_attempts(&mut self, attempts: impl IntoIterator<Item = u32>) {
        self.swallowed.extend(attempts);
    }

    /// Swallow every move from now on.
    pub fn set_jammed(&mut self, jammed: bool) {
        self.jammed = jammed;
    }

    /// Resolve ambiguous ledges the way an engine configured with
    /// `descending` does. `Journey::new` copies it from the config.
    pub fn set_descending(&mut self, descending: Direction) {
        self.descending = descending;
    }

    pub fn grant(&mut self, capability: &str) {
        self.capabilities.insert(capability);
    }

    pub fn set_transient_blockers(&mut self, map: MapId, blockers: Vec<Position>) {
        self.atlas.set_transient_blockers(map, blockers);
    }

    pub fn agent(&self) -> Location {
        self.agent
    }

    pub fn teleport(&mut self, to: Location) {
        self.agent = to;
    }

    /// Total moves received so far, including swallowed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_animating(&self) -> bool {
        self.animation_remaining > 0
    }

    /// Advance world time by one tick.
    pub fn end_tick(&mut self) {
        self.animation_remaining = self.animation_remaining.saturating_sub(1);
    }

    /// Apply one move request.
    pub fn apply_move(&mut self, direction: Direction) {
        self.attempts += 1;
        if self.is_animating() || self.jammed || self.swallowed.contains(&self.attempts) {
            tracing::debug!(attempt = self.attempts, %direction, "world swallowed move");
            return;
        }
        if let Some(&to) = self.warps.get(&(self.agent, direction)) {
            self.agent = to;
            self.animation_remaining = self.warp_animation_ticks;
            return;
        }
        if self.truth(self.agent.map).is_some_and(|g| g.can_move(self.agent.position, direction)) {
            self.agent.position = self.agent.position.step(direction);
        }
    }

    /// The world's own view of walkability on `map`.
    fn truth(&self, map: MapId) -> Option<GridSnapshot> {
        let source = self.atlas.tile_grid(map)?;
        let grid = CollisionGrid::build(map, &source, &self.capabilities, self.descending);
        Some(GridSnapshot::new(Arc::new(grid), self.atlas.transient_blockers(map)))
    }
}

impl TileSource for SimWorld {
    fn tile_grid(&self, map: MapId) -> Option<SourceGrid> {
        self.atlas.tile_grid(map)
    }

    fn transient_blockers(&self, map: MapId) -> Vec<Position> {
        self.atlas.transient_blockers(map)
    }
}

impl Perception for SimWorld {
    fn current_map(&self) -> MapId {
        self.agent.map
    }

    fn current_position(&self) -> Position {
        self.agent.position
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    fn is_animation_stable(&self) -> bool {
        !self.stability_stuck && !self.is_animating()
    }
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// Queues move requests; the harness hands them to the world after each
/// engine tick.
#[derive(Debug, Default)]
pub struct SimActuator {
    pending: Vec<Direction>,
    history: Vec<Direction>,
}

impl SimActuator {
    pub fn take_pending(&mut self) -> Vec<Direction> {
        std::mem::take(&mut self.pending)
    }

    /// Every move ever requested, in order.
    pub fn history(&self) -> &[Direction] {
        &self.history
    }
}

impl Actuator for SimActuator {
    fn attempt_move(&mut self, direction: Direction) {
        self.pending.push(direction);
        self.history.push(direction);
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct Journey {
    pub world: SimWorld,
    pub actuator: SimActuator,
    pub nav: Navigator,
    pub events: Vec<NavEvent>,
}

impl Journey {
    pub fn new(mut world: SimWorld, config: NavConfig) -> Self {
        init_test_logging();
        world.set_descending(config.descending_direction);
        Self {
            world,
            actuator: SimActuator::default(),
            nav: Navigator::new(config),
            events: Vec::new(),
        }
    }

    /// One engine tick followed by one world tick.
    pub fn step(&mut self) -> TickStatus {
        let status = self.nav.tick(&self.world, &mut self.actuator);
        self.world.end_tick();
        for direction in self.actuator.take_pending() {
            self.world.apply_move(direction);
        }
        self.events.extend(self.nav.drain_events());
        status
    }

    /// Tick until `Done`, `Failed` or `Idle`, or until `max_ticks` pass.
    pub fn run(&mut self, max_ticks: u64) -> TickStatus {
        let mut status = TickStatus::Idle;
        for _ in 0..max_ticks {
            status = self.step();
            if matches!(status, TickStatus::Done | TickStatus::Failed(_) | TickStatus::Idle) {
                break;
            }
        }
        status
    }

    /// Plan from the agent's location and start executing.
    pub fn go(&mut self, goal_map: MapId, goal: Position) -> Result<usize, wayfarer_nav::PlanError> {
        let route = self.nav.plan_route(&self.world, goal_map, goal)?;
        let len = route.len();
        self.nav.begin_execution(route);
        self.events.extend(self.nav.drain_events());
        Ok(len)
    }

    pub fn count_events(&self, matches: impl Fn(&NavEvent) -> bool) -> usize {
        self.events.iter().filter(|e| matches(e)).count()
    }
}
