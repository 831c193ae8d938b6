// Global (multi-map) routing.
//
// Planning is hierarchical. The map graph registry supplies the cheapest
// sequence of transition edges from the start map to the goal map; then one
// local A* search per map walks from the entry tile to that map's exit tile,
// and a final search walks from the last entry tile to the goal. Same-map
// requests skip the registry entirely and run one local search.
//
// The output of this stage is a `RoutePlan` (per-map position lists plus the
// edge used to leave each map). `composer::compose()` turns it into the step
// list. Any segment failure aborts the whole plan and the returned
// `PathNotFound` names the failing map; partial plans are never returned.
//
// See also: `map_graph.rs`, `local_router.rs`, `composer.rs`.

use crate::collision::{CollisionProvider, GridSnapshot};
use crate::composer;
use crate::config::NavConfig;
use crate::error::{PathNotFound, PlanError};
use crate::local_router;
use crate::map_graph::{EdgeId, MapGraph};
use crate::perception::TileSource;
use crate::types::{Direction, MapId, Position, Route};

/// How a segment leaves its map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentExit {
    pub edge: EdgeId,
    /// Move issued on the last tile of the segment to trigger the transition.
    pub direction: Direction,
    pub to_map: MapId,
    pub to_pos: Position,
}

/// A contiguous walk on one map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapSegment {
    pub map: MapId,
    /// Tiles from entry to exit (or goal), both inclusive.
    pub path: Vec<Position>,
    /// `None` for the final segment.
    pub exit: Option<SegmentExit>,
}

/// The uncomposed result of global planning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePlan {
    pub start_map: MapId,
    pub start: Position,
    pub goal_map: MapId,
    pub goal: Position,
    pub segments: Vec<MapSegment>,
}

/// Move that leaves `pos` through the map border, falling back to
/// `descending` for interior tiles such as doors.
pub fn resolve_exit_direction(grid: &GridSnapshot, pos: Position, descending: Direction) -> Direction {
    Direction::ALL
        .into_iter()
        .find(|&d| !grid.in_bounds(pos.step(d)))
        .unwrap_or(descending)
}

/// Borrowed view of everything a planning request reads.
pub struct GlobalRouter<'a, S: TileSource + ?Sized> {
    graph: &'a MapGraph,
    provider: &'a mut CollisionProvider,
    source: &'a S,
    config: &'a NavConfig,
}

impl<'a, S: TileSource + ?Sized> GlobalRouter<'a, S> {
    pub fn new(
        graph: &'a MapGraph,
        provider: &'a mut CollisionProvider,
        source: &'a S,
        config: &'a NavConfig,
    ) -> Self {
        Self {
            graph,
            provider,
            source,
            config,
        }
    }

    /// Plan and compose a full route.
    pub fn plan(
        &mut self,
        start_map: MapId,
        start: Position,
        goal_map: MapId,
        goal: Position,
    ) -> Result<Route, PlanError> {
        let plan = self.plan_segments(start_map, start, goal_map, goal)?;
        composer::compose(&plan, self.provider, self.source)
    }

    /// Compute the per-map segments without composing steps.
    pub fn plan_segments(
        &mut self,
        start_map: MapId,
        start: Position,
        goal_map: MapId,
        goal: Position,
    ) -> Result<RoutePlan, PathNotFound> {
        let edges = if start_map == goal_map {
            Vec::new()
        } else {
            self.graph
                .shortest_map_sequence(start_map, goal_map, self.config.max_map_expansions)?
        };

        let mut segments = Vec::with_capacity(edges.len() + 1);
        let mut map = start_map;
        let mut entry = start;
        for id in edges {
            let edge = self
                .graph
                .edge(id)
                .ok_or(PathNotFound::NoMapSequence {
                    from: start_map,
                    to: goal_map,
                })?;
            let landing = self.provider.get_grid(self.source, edge.to_map)?;
            if !landing.in_bounds(edge.to_pos) {
                return Err(PathNotFound::OutOfBounds {
                    map: edge.to_map,
                    position: edge.to_pos,
                });
            }
            if !landing.is_passable(edge.to_pos) {
                return Err(PathNotFound::GoalBlocked {
                    map: edge.to_map,
                    position: edge.to_pos,
                });
            }
            let grid = self.provider.get_grid(self.source, edge.from_map)?;
            let path = local_router::find_path(&grid, entry, edge.from_pos, self.config.max_local_expansions)?;
            let direction = edge.exit_direction.unwrap_or_else(|| {
                resolve_exit_direction(&grid, edge.from_pos, self.config.descending_direction)
            });
            tracing::debug!(%map, %entry, exit = %edge.from_pos, moves = path.len(), "planned segment");
            segments.push(MapSegment {
                map,
                path: path.positions,
                exit: Some(SegmentExit {
                    edge: id,
                    direction,
                    to_map: edge.to_map,
                    to_pos: edge.to_pos,
                }),
            });
            map = edge.to_map;
            entry = edge.to_pos;
        }

        let grid = self.provider.get_grid(self.source, map)?;
        let path = local_router::find_path(&grid, entry, goal, self.config.max_local_expansions)?;
        tracing::debug!(%map, %entry, %goal, moves = path.len(), "planned final segment");
        segments.push(MapSegment {
            map,
            path: path.positions,
            exit: None,
        });

        Ok(RoutePlan {
            start_map,
            start,
            goal_map,
            goal,
            segments,
        })
    }
}
