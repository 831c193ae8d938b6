// Collaborator interfaces: what the engine reads and what it drives.
//
// The engine never extracts game state itself. A perception collaborator
// reports the agent's map and tile, raw per-map tile data, the capability
// snapshot, and whether the screen has settled; an actuation collaborator
// accepts fire-and-forget directional move requests whose outcome only shows
// up through perception on a later tick.
//
// `TileSource` is split out of `Perception` so planning-only callers (tests,
// benchmarks, offline tools) can hand the routers a plain `TileAtlas`
// without faking the live-agent parts.
//
// See also: `collision.rs` which consumes `TileSource`, `navigator.rs` which
// polls `Perception` and drives `Actuator` once per tick.

use crate::capability::CapabilitySet;
use crate::collision::SourceGrid;
use crate::types::{Direction, MapId, Position};
use std::collections::BTreeMap;

/// Supplier of raw per-map tile classifications.
pub trait TileSource {
    /// Raw source grid for `map`, or `None` if the map has never been seen.
    fn tile_grid(&self, map: MapId) -> Option<SourceGrid>;

    /// Tiles currently occupied by moving blockers. Queried on every grid
    /// lookup because it changes without any capability edit.
    fn transient_blockers(&self, _map: MapId) -> Vec<Position> {
        Vec::new()
    }
}

/// Live view of the agent and its surroundings.
pub trait Perception: TileSource {
    fn current_map(&self) -> MapId;
    fn current_position(&self) -> Position;
    fn capabilities(&self) -> CapabilitySet;

    /// True once any map-transition animation has finished and commands will
    /// be accepted again.
    fn is_animation_stable(&self) -> bool;
}

/// Movement actuator. `attempt_move` is fire-and-forget: it may be silently
/// swallowed, and the outcome is only visible through `Perception`.
pub trait Actuator {
    fn attempt_move(&mut self, direction: Direction);
}

/// In-memory tile source keyed by map.
#[derive(Clone, Debug, Default)]
pub struct TileAtlas {
    grids: BTreeMap<MapId, SourceGrid>,
    transient: BTreeMap<MapId, Vec<Position>>,
}

impl TileAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, map: MapId, grid: SourceGrid) {
        self.grids.insert(map, grid);
    }

    pub fn with_map(mut self, map: MapId, grid: SourceGrid) -> Self {
        self.insert(map, grid);
        self
    }

    pub fn grid(&self, map: MapId) -> Option<&SourceGrid> {
        self.grids.get(&map)
    }

    pub fn grid_mut(&mut self, map: MapId) -> Option<&mut SourceGrid> {
        self.grids.get_mut(&map)
    }

    /// Replace the moving-blocker overlay for `map`.
    pub fn set_transient_blockers(&mut self, map: MapId, blockers: Vec<Position>) {
        if blockers.is_empty() {
            self.transient.remove(&map);
        } else {
            self.transient.insert(map, blockers);
        }
    }

    pub fn maps(&self) -> impl Iterator<Item = MapId> + '_ {
        self.grids.keys().copied()
    }
}

impl TileSource for TileAtlas {
    fn tile_grid(&self, map: MapId) -> Option<SourceGrid> {
        self.grids.get(&map).cloned()
    }

    fn transient_blockers(&self, map: MapId) -> Vec<Position> {
        self.transient.get(&map).cloned().unwrap_or_default()
    }
}
