// Tile collision provider: per-map walkability grids.
//
// A `CollisionGrid` is a dense 2D grid stored as a flat `Vec<TileClass>`
// indexed by `x + y * width`, built from three layers:
//
// 1. Static source data (`SourceGrid`) reported by perception.
// 2. A capability overlay: every `Gate` source tile becomes an
//    `Obstacle { open }` whose `open` flag is resolved against the capability
//    snapshot at build time.
// 3. A transient overlay of moving blockers, which is *not* baked into the
//    grid. It is fetched on every `get_grid()` call and layered on top by
//    `GridSnapshot`, because it changes without any capability edit.
//
// One-way (ledge) tiles without an explicit direction in the source are
// classified at build time by looking at which axis is open on both sides.
// See `infer_one_way()` for the tie-break policy.
//
// Built grids are cached per map and stamped with the signature of the
// capabilities that gate that map's obstacles. `sync_capabilities()` evicts
// every grid gated by a changed capability. A rebuild always allocates a
// fresh `Arc<CollisionGrid>`, so a reader holding an older snapshot keeps
// reading consistent (if stale) data until its next query.
//
// See also: `perception.rs` for `TileSource`, `local_router.rs` which
// searches `GridSnapshot`s, `composer.rs` which re-validates moves through
// `GridSnapshot::check_move()`.
//
// **Critical constraint: determinism.** Grid contents are a pure function of
// (source grid, capability snapshot, descending direction).

use crate::capability::{CapabilityKey, CapabilitySet};
use crate::error::{PathNotFound, ViolationKind};
use crate::perception::TileSource;
use crate::types::{Direction, MapId, Position};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Raw source data
// ---------------------------------------------------------------------------

/// Raw classification of one tile as reported by perception.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTile {
    #[default]
    Floor,
    Wall,
    /// A ledge, optionally with a known crossing direction.
    Ledge(Option<Direction>),
    /// Passable only while the named capability is held.
    Gate(CapabilityKey),
    /// Stepping here moves the agent to another map.
    Warp,
}

/// Raw per-map tile data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGrid {
    width: u32,
    height: u32,
    tiles: Vec<SourceTile>,
}

impl SourceGrid {
    /// Create a grid filled with `Floor`.
    pub fn new(width: u32, height: u32) -> Self {
        let total = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tiles: vec![SourceTile::Floor; total],
        }
    }

    /// Parse an ASCII layout, one string per row:
    /// `.` floor, `#` wall, `L` ledge without a direction, `^ v < >` ledges
    /// with a direction, `W` warp. Short rows are padded with walls and
    /// unrecognized characters read as walls. Gates are added with `set()`.
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let height = rows.len() as u32;
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            let mut chars = row.chars();
            for x in 0..width as usize {
                let tile = match chars.next() {
                    Some('.') => SourceTile::Floor,
                    Some('L') => SourceTile::Ledge(None),
                    Some('^') => SourceTile::Ledge(Some(Direction::Up)),
                    Some('v') => SourceTile::Ledge(Some(Direction::Down)),
                    Some('<') => SourceTile::Ledge(Some(Direction::Left)),
                    Some('>') => SourceTile::Ledge(Some(Direction::Right)),
                    Some('W') => SourceTile::Warp,
                    _ => SourceTile::Wall,
                };
                grid.tiles[x + y * width as usize] = tile;
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Read a tile. `None` for out-of-bounds positions.
    pub fn get(&self, pos: Position) -> Option<&SourceTile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    /// Write a tile. No-op for out-of-bounds positions.
    pub fn set(&mut self, pos: Position, tile: SourceTile) {
        if let Some(i) = self.index(pos) {
            self.tiles[i] = tile;
        }
    }

    /// Builder form of `set()`.
    pub fn with(mut self, pos: Position, tile: SourceTile) -> Self {
        self.set(pos, tile);
        self
    }

    /// Every capability referenced by a gate tile on this map.
    pub fn gate_keys(&self) -> BTreeSet<CapabilityKey> {
        self.tiles
            .iter()
            .filter_map(|t| match t {
                SourceTile::Gate(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// True if `pos` is in bounds and not a wall. Used for one-way inference.
    fn is_unwalled(&self, pos: Position) -> bool {
        matches!(self.get(pos), Some(tile) if *tile != SourceTile::Wall)
    }
}

// ---------------------------------------------------------------------------
// Built classification
// ---------------------------------------------------------------------------

/// Walkability class of one tile in a built grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileClass {
    Open,
    Blocked,
    /// Crossable only moving in the given direction, both in and out.
    OneWay(Direction),
    /// Capability-gated; `open` is the resolution at grid-build time.
    Obstacle { gate: CapabilityKey, open: bool },
    /// Walkable tile that moves the agent to another map. Routed as open.
    Transition,
}

/// Shared `Blocked` value handed out for transient blockers.
static BLOCKED: TileClass = TileClass::Blocked;

impl TileClass {
    pub fn is_passable(&self) -> bool {
        match self {
            TileClass::Open | TileClass::OneWay(_) | TileClass::Transition => true,
            TileClass::Obstacle { open, .. } => *open,
            TileClass::Blocked => false,
        }
    }

    /// The only direction this tile may be crossed in, if constrained.
    pub fn one_way(&self) -> Option<Direction> {
        match self {
            TileClass::OneWay(dir) => Some(*dir),
            _ => None,
        }
    }
}

/// Pick the crossing direction for a ledge at `pos` with no explicit hint.
///
/// A direction `d` is a candidate when the entry side `pos - d` and the exit
/// side `pos + d` are both in bounds and unwalled. With one candidate it is
/// used directly. With several, `descending` wins if it is a candidate,
/// otherwise the first candidate in `Direction::ALL` order. With none the
/// ledge cannot be crossed at all.
pub fn infer_one_way(source: &SourceGrid, pos: Position, descending: Direction) -> Option<Direction> {
    let candidates: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|&d| {
            source.is_unwalled(pos.step(d.opposite())) && source.is_unwalled(pos.step(d))
        })
        .collect();
    match candidates.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ if candidates.contains(&descending) => Some(descending),
        [first, ..] => Some(*first),
    }
}

/// Capability-resolved walkability grid for one map.
#[derive(Clone, Debug)]
pub struct CollisionGrid {
    map: MapId,
    width: u32,
    height: u32,
    tiles: Vec<TileClass>,
    /// Capabilities referenced by this map's obstacles.
    gates: BTreeSet<CapabilityKey>,
    /// `CapabilitySet::signature_for(gates)` of the snapshot used to build.
    signature: u64,
}

impl CollisionGrid {
    /// Classify every tile of `source` against `capabilities`.
    pub fn build(
        map: MapId,
        source: &SourceGrid,
        capabilities: &CapabilitySet,
        descending: Direction,
    ) -> Self {
        let mut tiles = Vec::with_capacity(source.tiles.len());
        for y in 0..source.height as i32 {
            for x in 0..source.width as i32 {
                let pos = Position::new(x, y);
                let class = match source.get(pos) {
                    Some(SourceTile::Floor) => TileClass::Open,
                    Some(SourceTile::Wall) | None => TileClass::Blocked,
                    Some(SourceTile::Warp) => TileClass::Transition,
                    Some(SourceTile::Gate(key)) => TileClass::Obstacle {
                        gate: key.clone(),
                        open: capabilities.contains(key),
                    },
                    Some(SourceTile::Ledge(Some(dir))) => TileClass::OneWay(*dir),
                    Some(SourceTile::Ledge(None)) => match infer_one_way(source, pos, descending) {
                        Some(dir) => TileClass::OneWay(dir),
                        None => {
                            tracing::debug!(%map, %pos, "ledge has no open axis, treating as blocked");
                            TileClass::Blocked
                        }
                    },
                };
                tiles.push(class);
            }
        }
        let gates = source.gate_keys();
        let signature = capabilities.signature_for(&gates);
        tracing::debug!(
            %map,
            width = source.width,
            height = source.height,
            gates = gates.len(),
            "built collision grid"
        );
        Self {
            map,
            width: source.width,
            height: source.height,
            tiles,
            gates,
            signature,
        }
    }

    pub fn map(&self) -> MapId {
        self.map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn gates(&self) -> &BTreeSet<CapabilityKey> {
        &self.gates
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Read a tile. `None` for out-of-bounds positions.
    pub fn tile(&self, pos: Position) -> Option<&TileClass> {
        if self.in_bounds(pos) {
            Some(&self.tiles[pos.x as usize + pos.y as usize * self.width as usize])
        } else {
            None
        }
    }

    fn is_current_for(&self, capabilities: &CapabilitySet) -> bool {
        self.signature == capabilities.signature_for(&self.gates)
    }
}

/// A built grid plus the transient blockers observed at query time.
#[derive(Clone, Debug)]
pub struct GridSnapshot {
    base: Arc<CollisionGrid>,
    transient: FxHashSet<Position>,
}

impl GridSnapshot {
    pub fn new(base: Arc<CollisionGrid>, transient: impl IntoIterator<Item = Position>) -> Self {
        Self {
            base,
            transient: transient.into_iter().collect(),
        }
    }

    pub fn map(&self) -> MapId {
        self.base.map
    }

    pub fn base(&self) -> &Arc<CollisionGrid> {
        &self.base
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.base.in_bounds(pos)
    }

    /// Effective class at `pos`: transient blockers read as `Blocked`.
    pub fn tile(&self, pos: Position) -> Option<&TileClass> {
        let class = self.base.tile(pos)?;
        if self.transient.contains(&pos) {
            Some(&BLOCKED)
        } else {
            Some(class)
        }
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.tile(pos).is_some_and(TileClass::is_passable)
    }

    /// Check a single move of one tile from `from` in `direction`.
    ///
    /// The destination must be in bounds and passable, and any one-way tile
    /// involved (the one being left, or the one being entered) must allow
    /// `direction`. The origin's own passability is not checked: the agent
    /// may already be standing on a tile that has since become blocked.
    pub fn check_move(&self, from: Position, direction: Direction) -> Result<(), ViolationKind> {
        let to = from.step(direction);
        let target = self.tile(to).ok_or(ViolationKind::OutOfBounds)?;
        if !target.is_passable() {
            return Err(ViolationKind::Impassable);
        }
        let leaving = self.base.tile(from).and_then(TileClass::one_way);
        let entering = target.one_way();
        match leaving.into_iter().chain(entering).find(|&a| a != direction) {
            Some(allowed) => Err(ViolationKind::OneWayDirection {
                allowed,
                attempted: direction,
            }),
            None => Ok(()),
        }
    }

    pub fn can_move(&self, from: Position, direction: Direction) -> bool {
        self.check_move(from, direction).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Provider with capability-aware cache
// ---------------------------------------------------------------------------

/// Lazily builds and caches collision grids.
#[derive(Debug)]
pub struct CollisionProvider {
    cache: FxHashMap<MapId, Arc<CollisionGrid>>,
    capabilities: CapabilitySet,
    descending: Direction,
    builds: u64,
}

impl CollisionProvider {
    pub fn new(descending: Direction) -> Self {
        Self {
            cache: FxHashMap::default(),
            capabilities: CapabilitySet::new(),
            descending,
            builds: 0,
        }
    }

    /// The capability snapshot grids are currently built against.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Adopt a new capability snapshot, evicting every cached grid whose
    /// obstacles are gated by a capability that changed. Returns the number
    /// of evicted grids.
    pub fn sync_capabilities(&mut self, capabilities: CapabilitySet) -> usize {
        let changed = self.capabilities.changed(&capabilities);
        self.capabilities = capabilities;
        if changed.is_empty() {
            return 0;
        }
        let before = self.cache.len();
        self.cache
            .retain(|_, grid| grid.gates.intersection(&changed).next().is_none());
        let evicted = before - self.cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, changed = changed.len(), "capability change invalidated grids");
        }
        evicted
    }

    /// Collision grid for `map`, building it on first use or after
    /// invalidation, with the current transient blockers layered on top.
    pub fn get_grid<S: TileSource + ?Sized>(
        &mut self,
        source: &S,
        map: MapId,
    ) -> Result<GridSnapshot, PathNotFound> {
        let base = match self.cache.get(&map) {
            Some(grid) if grid.is_current_for(&self.capabilities) => Arc::clone(grid),
            _ => {
                let raw = source.tile_grid(map).ok_or(PathNotFound::UnknownMap { map })?;
                let grid = Arc::new(CollisionGrid::build(
                    map,
                    &raw,
                    &self.capabilities,
                    self.descending,
                ));
                self.builds += 1;
                self.cache.insert(map, Arc::clone(&grid));
                grid
            }
        };
        Ok(GridSnapshot::new(base, source.transient_blockers(map)))
    }

    /// Drop the cached grid for `map`. Returns whether one was cached.
    pub fn invalidate(&mut self, map: MapId) -> bool {
        self.cache.remove(&map).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, map: MapId) -> bool {
        self.cache.contains_key(&map)
    }

    /// Total number of grid builds performed.
    pub fn build_count(&self) -> u64 {
        self.builds
    }
}
