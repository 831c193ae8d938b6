// Core types shared across the navigation engine.
//
// Defines map identifiers (`MapId`), map-relative tile coordinates
// (`Position`) and their pairing (`Location`), the four movement directions
// (`Direction`), and the route data produced by planning (`Step`,
// `StepKind`, `Route`). All types derive `Serialize` and `Deserialize` so
// callers can log or snapshot them.
//
// See also: `collision.rs` for per-tile classification, `composer.rs` which
// is the only producer of `Route` values, `executor.rs` which consumes them.
//
// **Critical constraint: determinism.** `Direction::ALL` is the neighbor
// expansion order for every grid search in this crate. Changing it changes
// which of several equal-length routes is returned.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// Opaque identifier for one discrete map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// A tile coordinate, always relative to the map it belongs to.
///
/// `x` grows to the right, `y` grows downward (screen convention), so
/// `Direction::Down` is the "descending" direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two positions.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// The neighboring position one tile away in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A tile on a specific map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub map: MapId,
    pub position: Position,
}

impl Location {
    pub const fn new(map: MapId, position: Position) -> Self {
        Self { map, position }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.position, self.map)
    }
}

/// One of the four grid movement directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Fixed neighbor expansion order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit `(dx, dy)` offset for this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// The direction that moves `from` onto `to`, or `None` if the two
    /// positions are not 4-adjacent.
    pub fn between(from: Position, to: Position) -> Option<Self> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Whether a step walks within a map or crosses a transition edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Walk,
    Transition,
}

/// A single directional move. `position` is where the agent should stand on
/// `map` once the move has taken effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub map: MapId,
    pub position: Position,
    pub direction: Direction,
    pub kind: StepKind,
}

impl Step {
    /// Where the agent should be once this step has taken effect.
    pub fn target(&self) -> Location {
        Location::new(self.map, self.position)
    }
}

/// An ordered, immutable sequence of steps from a start tile to a goal tile.
///
/// Routes are produced only by the path composer. A route is discarded once
/// the executor consumes it or the caller replans.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    start_map: MapId,
    start: Position,
    goal_map: MapId,
    goal: Position,
    steps: Vec<Step>,
}

impl Route {
    pub(crate) fn new(
        start_map: MapId,
        start: Position,
        goal_map: MapId,
        goal: Position,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            start_map,
            start,
            goal_map,
            goal,
            steps,
        }
    }

    pub fn start_map(&self) -> MapId {
        self.start_map
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn goal_map(&self) -> MapId {
        self.goal_map
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of map-to-map transitions along the route.
    pub fn map_hops(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Transition)
            .count()
    }

    /// The distinct maps visited, in order.
    pub fn maps(&self) -> Vec<MapId> {
        let mut maps = vec![self.start_map];
        for step in &self.steps {
            if maps.last() != Some(&step.map) {
                maps.push(step.map);
            }
        }
        maps
    }
}
