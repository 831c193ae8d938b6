// A* pathfinding on a single map's collision grid.
//
// 4-connected grid, unit step cost, Manhattan heuristic (admissible and
// consistent for unit-cost 4-connected movement, so the first time the goal
// is popped its path is optimal). Uses a `BinaryHeap` min-heap via a
// reversed `Ord` on `OpenEntry`. Scores and came-from links live in `Vec`s
// indexed by flat tile index.
//
// Movement legality is delegated entirely to `GridSnapshot::check_move()`:
// blocked and closed-obstacle tiles are never entered, one-way tiles are
// only entered and left along their allowed direction, transition tiles are
// walked like open floor.
//
// Search effort is capped by a node-expansion budget; exceeding it is a
// `PathNotFound::ExpansionLimit`, never a partial path.
//
// See also: `collision.rs` for the grid being searched, `global_router.rs`
// which runs one search per map segment.
//
// **Critical constraint: determinism.** Neighbors are expanded in
// `Direction::ALL` order and open-set ties are broken by (f, h, insertion
// sequence), so identical inputs always yield the identical path.

use crate::collision::GridSnapshot;
use crate::error::PathNotFound;
use crate::types::{Direction, MapId, Position};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// The result of a successful single-map search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPath {
    pub map: MapId,
    /// Tiles from start to goal, both inclusive.
    pub positions: Vec<Position>,
    /// Nodes closed during the search.
    pub expansions: u32,
}

impl LocalPath {
    /// Number of moves (one less than the number of tiles).
    pub fn len(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entry in the A* open set (min-heap via reversed ordering).
#[derive(PartialEq, Eq)]
struct OpenEntry {
    index: usize,
    f_score: u32,
    h_score: u32,
    seq: u64,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f (then h, then seq) is "greatest".
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find a shortest path from `start` to `goal` on `grid`.
pub fn find_path(
    grid: &GridSnapshot,
    start: Position,
    goal: Position,
    max_expansions: u32,
) -> Result<LocalPath, PathNotFound> {
    let map = grid.map();
    for position in [start, goal] {
        if !grid.in_bounds(position) {
            return Err(PathNotFound::OutOfBounds { map, position });
        }
    }
    if !grid.is_passable(goal) {
        return Err(PathNotFound::GoalBlocked {
            map,
            position: goal,
        });
    }
    if start == goal {
        return Ok(LocalPath {
            map,
            positions: vec![start],
            expansions: 0,
        });
    }

    let width = grid.base().width() as usize;
    let n = width * grid.base().height() as usize;
    let index_of = |p: Position| p.x as usize + p.y as usize * width;
    let position_of = |i: usize| Position::new((i % width) as i32, (i / width) as i32);

    // g_score[i] = cost of cheapest known path from start to tile i.
    let mut g_score = vec![u32::MAX; n];
    let mut came_from: Vec<Option<usize>> = vec![None; n];
    let mut closed = vec![false; n];

    let start_index = index_of(start);
    let goal_index = index_of(goal);
    g_score[start_index] = 0;

    let mut seq = 0u64;
    let mut open = BinaryHeap::new();
    let h_start = start.manhattan_distance(goal);
    open.push(OpenEntry {
        index: start_index,
        f_score: h_start,
        h_score: h_start,
        seq,
    });

    let mut expansions = 0u32;
    while let Some(current) = open.pop() {
        let ci = current.index;
        if ci == goal_index {
            let positions = reconstruct_path(&came_from, start_index, goal_index)
                .into_iter()
                .map(position_of)
                .collect();
            tracing::trace!(%map, %start, %goal, cost = g_score[ci], expansions, "local path found");
            return Ok(LocalPath {
                map,
                positions,
                expansions,
            });
        }
        if closed[ci] {
            continue;
        }
        if expansions >= max_expansions {
            tracing::debug!(%map, %start, %goal, limit = max_expansions, "local search hit expansion cap");
            return Err(PathNotFound::ExpansionLimit {
                map,
                limit: max_expansions,
            });
        }
        closed[ci] = true;
        expansions += 1;

        let here = position_of(ci);
        let tentative_g = g_score[ci] + 1;
        for direction in Direction::ALL {
            if !grid.can_move(here, direction) {
                continue;
            }
            let neighbor = here.step(direction);
            let ni = index_of(neighbor);
            if closed[ni] || tentative_g >= g_score[ni] {
                continue;
            }
            g_score[ni] = tentative_g;
            came_from[ni] = Some(ci);
            let h = neighbor.manhattan_distance(goal);
            seq += 1;
            open.push(OpenEntry {
                index: ni,
                f_score: tentative_g + h,
                h_score: h,
                seq,
            });
        }
    }

    Err(PathNotFound::Unreachable {
        map,
        from: start,
        to: goal,
    })
}

/// Walk `came_from` links back from `goal` and return indices start-first.
fn reconstruct_path(came_from: &[Option<usize>], start: usize, goal: usize) -> Vec<usize> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from[current] {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
