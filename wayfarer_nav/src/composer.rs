// Route composition: per-map segments -> one ordered step list.
//
// Each walking step's direction is the unit delta from the previous tile.
// Consecutive identical directions are kept as separate steps so the
// executor can apply uniform per-step timing. Crossing a transition edge is
// a single `StepKind::Transition` step whose expected position is the entry
// tile on the next map.
//
// Every walking move, and every transition's arrival tile, is re-checked
// against a freshly fetched collision grid before it is emitted. Capabilities or transient blockers may have changed
// since the segment was searched, and a one-way tile must still be crossed
// in its allowed direction. Any mismatch (including non-adjacent tiles or
// segments that do not join up) aborts with a `ConstraintViolation`, logged
// at error level. No route is returned in that case.
//
// See also: `global_router.rs` which produces `RoutePlan`s, `executor.rs`
// which consumes the composed `Route`.

use crate::collision::CollisionProvider;
use crate::error::{ConstraintViolation, PlanError, ViolationKind};
use crate::global_router::RoutePlan;
use crate::perception::TileSource;
use crate::types::{Direction, MapId, Position, Route, Step, StepKind};

fn violation(map: MapId, position: Position, kind: ViolationKind) -> PlanError {
    let violation = ConstraintViolation {
        map,
        position,
        kind,
    };
    tracing::error!(%violation, "route composition aborted");
    violation.into()
}

/// Flatten `plan` into a validated `Route`.
pub fn compose<S: TileSource + ?Sized>(
    plan: &RoutePlan,
    provider: &mut CollisionProvider,
    source: &S,
) -> Result<Route, PlanError> {
    let mut steps: Vec<Step> = Vec::new();
    let mut map = plan.start_map;
    let mut cursor = plan.start;

    for segment in &plan.segments {
        let first = segment.path.first().copied().unwrap_or(cursor);
        if segment.map != map || first != cursor || segment.path.is_empty() {
            return Err(violation(
                segment.map,
                first,
                ViolationKind::Discontinuous {
                    expected: cursor,
                    found: first,
                },
            ));
        }

        let grid = provider.get_grid(source, segment.map)?;
        for pair in segment.path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let direction = Direction::between(from, to)
                .ok_or_else(|| violation(segment.map, to, ViolationKind::NotAdjacent { from }))?;
            grid.check_move(from, direction)
                .map_err(|kind| violation(segment.map, to, kind))?;
            steps.push(Step {
                map: segment.map,
                position: to,
                direction,
                kind: StepKind::Walk,
            });
        }
        cursor = segment.path.last().copied().unwrap_or(cursor);

        if let Some(exit) = &segment.exit {
            let landing = provider.get_grid(source, exit.to_map)?;
            let arrival = match landing.tile(exit.to_pos) {
                None => Err(ViolationKind::OutOfBounds),
                Some(class) if !class.is_passable() => Err(ViolationKind::Impassable),
                Some(_) => Ok(()),
            };
            arrival.map_err(|kind| violation(exit.to_map, exit.to_pos, kind))?;
            steps.push(Step {
                map: exit.to_map,
                position: exit.to_pos,
                direction: exit.direction,
                kind: StepKind::Transition,
            });
            map = exit.to_map;
            cursor = exit.to_pos;
        }
    }

    if map != plan.goal_map || cursor != plan.goal {
        return Err(violation(
            map,
            cursor,
            ViolationKind::Discontinuous {
                expected: plan.goal,
                found: cursor,
            },
        ));
    }

    let route = Route::new(plan.start_map, plan.start, plan.goal_map, plan.goal, steps);
    tracing::debug!(
        start_map = %plan.start_map,
        goal_map = %plan.goal_map,
        steps = route.len(),
        hops = route.map_hops(),
        "composed route"
    );
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::collision::{SourceGrid, SourceTile};
    use crate::global_router::{MapSegment, SegmentExit};
    use crate::map_graph::EdgeId;
    use crate::perception::TileAtlas;

    const A: MapId = MapId(1);
    const B: MapId = MapId(2);

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn single(map: MapId, path: Vec<Position>) -> RoutePlan {
        RoutePlan {
            start_map: map,
            start: path[0],
            goal_map: map,
            goal: *path.last().unwrap(),
            segments: vec![MapSegment {
                map,
                path,
                exit: None,
            }],
        }
    }

    fn violation_kind(err: PlanError) -> ViolationKind {
        match err {
            PlanError::ConstraintViolation(v) => v.kind,
            other => panic!("expected constraint violation, got {other}"),
        }
    }

    #[test]
    fn keeps_repeated_directions() {
        let atlas = TileAtlas::new().with_map(A, SourceGrid::new(4, 1));
        let mut provider = CollisionProvider::new(Direction::Down);
        let route = compose(&single(A, vec![p(0, 0), p(1, 0), p(2, 0), p(3, 0)]), &mut provider, &atlas).unwrap();
        assert_eq!(route.len(), 3);
        assert!(route.steps().iter().all(|s| s.direction == Direction::Right));
        assert!(route.steps().iter().all(|s| s.kind == StepKind::Walk));
    }

    #[test]
    fn emits_transition_step_between_maps() {
        let atlas = TileAtlas::new()
            .with_map(A, SourceGrid::new(2, 1))
            .with_map(B, SourceGrid::new(2, 1));
        let mut provider = CollisionProvider::new(Direction::Down);
        let plan = RoutePlan {
            start_map: A,
            start: p(0, 0),
            goal_map: B,
            goal: p(1, 0),
            segments: vec![
                MapSegment {
                    map: A,
                    path: vec![p(0, 0), p(1, 0)],
                    exit: Some(SegmentExit {
                        edge: EdgeId(0),
                        direction: Direction::Right,
                        to_map: B,
                        to_pos: p(0, 0),
                    }),
                },
                MapSegment {
                    map: B,
                    path: vec![p(0, 0), p(1, 0)],
                    exit: None,
                },
            ],
        };
        let route = compose(&plan, &mut provider, &atlas).unwrap();
        let kinds: Vec<StepKind> = route.steps().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepKind::Walk, StepKind::Transition, StepKind::Walk]);
        assert_eq!(route.steps()[1].map, B);
    }

    #[test]
    fn rejects_transition_onto_blocked_tile() {
        let atlas = TileAtlas::new()
            .with_map(A, SourceGrid::new(2, 1))
            .with_map(B, SourceGrid::from_rows(&["#."]));
        let mut provider = CollisionProvider::new(Direction::Down);
        let plan = RoutePlan {
            start_map: A,
            start: p(0, 0),
            goal_map: B,
            goal: p(0, 0),
            segments: vec![
                MapSegment {
                    map: A,
                    path: vec![p(0, 0), p(1, 0)],
                    exit: Some(SegmentExit {
                        edge: EdgeId(0),
                        direction: Direction::Right,
                        to_map: B,
                        to_pos: p(0, 0),
                    }),
                },
                MapSegment {
                    map: B,
                    path: vec![p(0, 0)],
                    exit: None,
                },
            ],
        };
        let err = compose(&plan, &mut provider, &atlas).unwrap_err();
        assert_eq!(violation_kind(err), ViolationKind::Impassable);
    }

    #[test]
    fn rejects_wrong_way_ledge() {
        let atlas = TileAtlas::new().with_map(A, SourceGrid::from_rows(&["...", "#L#", "..."]));
        let mut provider = CollisionProvider::new(Direction::Down);
        let err = compose(&single(A, vec![p(1, 2), p(1, 1), p(1, 0)]), &mut provider, &atlas).unwrap_err();
        assert_eq!(
            violation_kind(err),
            ViolationKind::OneWayDirection {
                allowed: Direction::Down,
                attempted: Direction::Up,
            }
        );
    }

    #[test]
    fn rejects_stale_segment_after_capability_loss() {
        let source = SourceGrid::new(3, 1).with(p(1, 0), SourceTile::Gate("cut".into()));
        let atlas = TileAtlas::new().with_map(A, source);
        let mut provider = CollisionProvider::new(Direction::Down);
        provider.sync_capabilities(CapabilitySet::new().with("cut"));
        let plan = single(A, vec![p(0, 0), p(1, 0), p(2, 0)]);
        assert!(compose(&plan, &mut provider, &atlas).is_ok());

        provider.sync_capabilities(CapabilitySet::new());
        let err = compose(&plan, &mut provider, &atlas).unwrap_err();
        assert_eq!(violation_kind(err), ViolationKind::Impassable);
    }

    #[test]
    fn rejects_gaps() {
        let atlas = TileAtlas::new().with_map(A, SourceGrid::new(4, 4));
        let mut provider = CollisionProvider::new(Direction::Down);
        let err = compose(&single(A, vec![p(0, 0), p(2, 0)]), &mut provider, &atlas).unwrap_err();
        assert_eq!(violation_kind(err), ViolationKind::NotAdjacent { from: p(0, 0) });

        let mut plan = single(A, vec![p(1, 0), p(2, 0)]);
        plan.start = p(0, 0);
        let err = compose(&plan, &mut provider, &atlas).unwrap_err();
        assert_eq!(
            violation_kind(err),
            ViolationKind::Discontinuous {
                expected: p(0, 0),
                found: p(1, 0)
            }
        );
    }
}
