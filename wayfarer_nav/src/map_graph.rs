// Map graph registry: discovered maps and directed transition edges.
//
// Maps are nodes keyed by opaque `MapId`; transition edges live in a single
// arena `Vec<TransitionEdge>` indexed by `EdgeId`, and each map keeps the
// ids of its outgoing edges in registration order. Edges are strictly
// directional: `add_edge(.., bidirectional: true)` registers a second,
// independent reverse edge rather than marking one edge as two-way.
//
// `shortest_map_sequence()` is a uniform-cost search over maps. Labels are
// compared by (total weight, hop count, edge ids along the path), so among
// equally cheap sequences the one with fewer hops wins, and among those the
// one whose edges were registered earliest.
//
// See also: `global_router.rs` which turns a map sequence into per-map
// segments, `navigator.rs` which registers maps and learns edges at runtime.
//
// **Critical constraint: determinism.** Edge ids are assigned sequentially in
// registration order and all map-keyed storage is a `BTreeMap`.

use crate::error::PathNotFound;
use crate::types::{Direction, MapId, Position};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

/// Index of a transition edge in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

/// A directed connection from a tile on one map to a tile on another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEdge {
    pub id: EdgeId,
    pub from_map: MapId,
    pub from_pos: Position,
    pub to_map: MapId,
    pub to_pos: Position,
    /// Move that triggers the transition while standing on `from_pos`.
    /// `None` lets the router pick one from the from-map's layout.
    pub exit_direction: Option<Direction>,
    /// Traversal cost in map hops. Always at least 1.
    pub weight: u32,
}

impl TransitionEdge {
    fn connects(&self, from_map: MapId, from_pos: Position, to_map: MapId, to_pos: Position) -> bool {
        self.from_map == from_map
            && self.from_pos == from_pos
            && self.to_map == to_map
            && self.to_pos == to_pos
    }
}

/// The registry container.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapGraph {
    /// Outgoing edge ids per map, in registration order.
    maps: BTreeMap<MapId, SmallVec<[EdgeId; 4]>>,
    edges: Vec<TransitionEdge>,
}

impl MapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a map. Returns `false` if it was already known.
    pub fn add_map(&mut self, map: MapId) -> bool {
        if self.maps.contains_key(&map) {
            return false;
        }
        self.maps.insert(map, SmallVec::new());
        tracing::debug!(%map, "registered map");
        true
    }

    pub fn contains_map(&self, map: MapId) -> bool {
        self.maps.contains_key(&map)
    }

    /// Add a unit-weight edge. With `bidirectional`, a reverse edge from
    /// `(to_map, to_pos)` back to `(from_map, from_pos)` is registered too.
    /// Returns the forward edge id.
    pub fn add_edge(
        &mut self,
        from_map: MapId,
        from_pos: Position,
        to_map: MapId,
        to_pos: Position,
        bidirectional: bool,
    ) -> EdgeId {
        self.add_weighted_edge(from_map, from_pos, to_map, to_pos, 1, bidirectional)
    }

    /// Like `add_edge`, with an explicit traversal weight (clamped to >= 1).
    pub fn add_weighted_edge(
        &mut self,
        from_map: MapId,
        from_pos: Position,
        to_map: MapId,
        to_pos: Position,
        weight: u32,
        bidirectional: bool,
    ) -> EdgeId {
        let forward = self.insert_edge(from_map, from_pos, to_map, to_pos, None, weight);
        if bidirectional {
            self.insert_edge(to_map, to_pos, from_map, from_pos, None, weight);
        }
        forward
    }

    /// Add a one-way, unit-weight edge triggered by moving `direction` from
    /// `from_pos`. If the edge already exists without a direction, the
    /// direction is filled in.
    pub fn add_edge_with_direction(
        &mut self,
        from_map: MapId,
        from_pos: Position,
        to_map: MapId,
        to_pos: Position,
        direction: Direction,
    ) -> EdgeId {
        self.insert_edge(from_map, from_pos, to_map, to_pos, Some(direction), 1)
    }

    fn insert_edge(
        &mut self,
        from_map: MapId,
        from_pos: Position,
        to_map: MapId,
        to_pos: Position,
        exit_direction: Option<Direction>,
        weight: u32,
    ) -> EdgeId {
        if let Some(id) = self.find_edge(from_map, from_pos, to_map, to_pos) {
            let edge = &mut self.edges[id.0 as usize];
            if edge.exit_direction.is_none() {
                edge.exit_direction = exit_direction;
            }
            return id;
        }
        self.add_map(from_map);
        self.add_map(to_map);
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(TransitionEdge {
            id,
            from_map,
            from_pos,
            to_map,
            to_pos,
            exit_direction,
            weight: weight.max(1),
        });
        if let Some(outgoing) = self.maps.get_mut(&from_map) {
            outgoing.push(id);
        }
        tracing::debug!(%id, %from_map, %from_pos, %to_map, %to_pos, "registered transition edge");
        id
    }

    /// The id of the edge with exactly these endpoints, if registered.
    pub fn find_edge(
        &self,
        from_map: MapId,
        from_pos: Position,
        to_map: MapId,
        to_pos: Position,
    ) -> Option<EdgeId> {
        self.edges_from(from_map)
            .find(|e| e.connects(from_map, from_pos, to_map, to_pos))
            .map(|e| e.id)
    }

    pub fn has_edge(&self, from_map: MapId, from_pos: Position, to_map: MapId, to_pos: Position) -> bool {
        self.find_edge(from_map, from_pos, to_map, to_pos).is_some()
    }

    /// Get an edge by id. `None` for ids this registry never issued.
    pub fn edge(&self, id: EdgeId) -> Option<&TransitionEdge> {
        self.edges.get(id.0 as usize)
    }

    /// Outgoing edges of `map`, in registration order.
    pub fn edges_from(&self, map: MapId) -> impl Iterator<Item = &TransitionEdge> + '_ {
        self.maps
            .get(&map)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .map(|id| &self.edges[id.0 as usize])
    }

    pub fn maps(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.keys().copied()
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Cheapest ordered edge sequence leading from `start` to `goal`.
    ///
    /// Returns an empty sequence when `start == goal`. Gives up with
    /// `ExpansionLimit` after settling `max_expansions` maps.
    pub fn shortest_map_sequence(
        &self,
        start: MapId,
        goal: MapId,
        max_expansions: u32,
    ) -> Result<Vec<EdgeId>, PathNotFound> {
        if start == goal {
            return Ok(Vec::new());
        }
        let not_found = PathNotFound::NoMapSequence {
            from: start,
            to: goal,
        };
        if !self.contains_map(start) || !self.contains_map(goal) {
            return Err(not_found);
        }

        let mut settled: BTreeSet<MapId> = BTreeSet::new();
        let mut best: BTreeMap<MapId, Label> = BTreeMap::new();
        let mut open = BinaryHeap::new();
        let origin = Label {
            map: start,
            cost: 0,
            edges: Vec::new(),
        };
        best.insert(start, origin.clone());
        open.push(origin);
        let mut expansions = 0u32;

        while let Some(current) = open.pop() {
            if settled.contains(&current.map) {
                continue;
            }
            if current.map == goal {
                tracing::debug!(
                    %start,
                    %goal,
                    hops = current.edges.len(),
                    cost = current.cost,
                    expansions,
                    "map sequence found"
                );
                return Ok(current.edges);
            }
            if expansions >= max_expansions {
                return Err(PathNotFound::ExpansionLimit {
                    map: start,
                    limit: max_expansions,
                });
            }
            expansions += 1;
            settled.insert(current.map);

            for edge in self.edges_from(current.map) {
                if settled.contains(&edge.to_map) {
                    continue;
                }
                let mut edges = current.edges.clone();
                edges.push(edge.id);
                let candidate = Label {
                    map: edge.to_map,
                    cost: current.cost + u64::from(edge.weight),
                    edges,
                };
                let improves = best
                    .get(&edge.to_map)
                    .is_none_or(|known| candidate.rank(known) == Ordering::Less);
                if improves {
                    best.insert(edge.to_map, candidate.clone());
                    open.push(candidate);
                }
            }
        }

        Err(not_found)
    }
}

/// Search label for one map (min-heap via reversed ordering).
#[derive(Clone, Debug)]
struct Label {
    map: MapId,
    cost: u64,
    /// Edges taken from the start, in order.
    edges: Vec<EdgeId>,
}

impl Label {
    /// Natural "better first" order: cheaper, then fewer hops, then
    /// earlier-registered edges.
    fn rank(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.edges.len().cmp(&other.edges.len()))
            .then_with(|| self.edges.cmp(&other.edges))
            .then_with(|| self.map.cmp(&other.map))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: the best label is "greatest".
        other.rank(self)
    }
}
