// Error taxonomy for planning, execution, and configuration.
//
// Expected conditions are ordinary return values: a missing route is a
// `PathNotFound`, handed back through `Result` and never a panic. The only
// assertion-style failure is `ConstraintViolation`, which means the route
// composer caught an invariant breach (stale cache or a bug) between planning
// and emitting steps. Execution-time failures surface through
// `TickStatus::Failed(FailureReason)` rather than `Err`, so the caller can
// retry, replan, or escalate.
//
// See also: `navigator.rs` for `TickStatus`, `composer.rs` where constraint
// violations are detected, `config.rs` for `ConfigError` producers.

use crate::types::{Direction, MapId, Position};
use serde::{Deserialize, Serialize};

/// No route exists (or none was found within the search budget).
///
/// Recoverable: choose a different goal, wait for a capability, or raise the
/// expansion caps. Every variant names the map on which planning failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathNotFound {
    #[error("no map sequence from {from} to {to}")]
    NoMapSequence { from: MapId, to: MapId },

    #[error("no tile data available for {map}")]
    UnknownMap { map: MapId },

    #[error("{position} is outside the bounds of {map}")]
    OutOfBounds { map: MapId, position: Position },

    #[error("goal {position} on {map} is not walkable")]
    GoalBlocked { map: MapId, position: Position },

    #[error("no path on {map} from {from} to {to}")]
    Unreachable {
        map: MapId,
        from: Position,
        to: Position,
    },

    #[error("search from {map} gave up after {limit} node expansions")]
    ExpansionLimit { map: MapId, limit: u32 },
}

impl PathNotFound {
    /// The map on which planning failed.
    pub fn map(&self) -> MapId {
        match *self {
            PathNotFound::NoMapSequence { from, .. } => from,
            PathNotFound::UnknownMap { map }
            | PathNotFound::OutOfBounds { map, .. }
            | PathNotFound::GoalBlocked { map, .. }
            | PathNotFound::Unreachable { map, .. }
            | PathNotFound::ExpansionLimit { map, .. } => map,
        }
    }
}

/// What invariant a composed step would have broken.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ViolationKind {
    #[error("one-way tile allows {allowed}, step moves {attempted}")]
    OneWayDirection {
        allowed: Direction,
        attempted: Direction,
    },

    #[error("step from {from} is not 4-adjacent")]
    NotAdjacent { from: Position },

    #[error("step leaves the map bounds")]
    OutOfBounds,

    #[error("step enters an impassable tile")]
    Impassable,

    #[error("segment starts at {found} but the previous segment ended at {expected}")]
    Discontinuous { expected: Position, found: Position },
}

/// An invariant breach detected between planning and composition.
///
/// Always indicates a bug or a stale cache. The plan is aborted rather than
/// emitting an invalid step.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("constraint violation on {map} at {position}: {kind}")]
pub struct ConstraintViolation {
    pub map: MapId,
    pub position: Position,
    pub kind: ViolationKind,
}

/// Why a planning request produced no route.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    PathNotFound(#[from] PathNotFound),

    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolation),
}

/// Why route execution stopped. Reported by `TickStatus::Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FailureReason {
    /// The bonk retry budget was exhausted on one step.
    #[error(
        "stuck on step {step_index}: expected {expected} on {expected_map}, \
         observed {observed} on {observed_map} after {attempts} attempts"
    )]
    MovementStuck {
        step_index: usize,
        expected_map: MapId,
        expected: Position,
        observed_map: MapId,
        observed: Position,
        attempts: u32,
    },
}

/// Failure to load or validate a `NavConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
