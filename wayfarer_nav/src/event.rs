// Navigation events emitted for the caller's log.
//
// Every noteworthy thing the engine does (a plan, a step, a bonk, a map
// transition) is appended to an `EventLog` as a `NavEvent` stamped with the
// engine tick on which it happened. Callers drain the log whenever they
// like; the engine never reads it back.
//
// See also: `navigator.rs` which owns the log, `executor.rs` and
// `transition.rs` which produce most of the events.
//
// **Critical constraint: determinism.** Events are appended in the order the
// engine performs the work, so identical inputs give identical logs.

use crate::error::FailureReason;
use crate::map_graph::EdgeId;
use crate::types::{Direction, MapId, Position};
use serde::{Deserialize, Serialize};

/// A single event with the tick it occurred on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEvent {
    pub tick: u64,
    pub kind: NavEventKind,
}

/// Types of navigation events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavEventKind {
    /// A route was planned (and not yet necessarily started).
    RoutePlanned {
        goal_map: MapId,
        goal: Position,
        steps: usize,
        hops: usize,
    },
    /// A move command was issued for a step.
    StepStarted {
        step_index: usize,
        direction: Direction,
        attempt: u32,
    },
    /// The agent was observed where the step expected it.
    StepCompleted { step_index: usize },
    /// The agent did not move as expected.
    Bonk {
        step_index: usize,
        expected: Position,
        observed: Position,
        consecutive: u32,
    },
    /// The bonk budget ran out; execution failed.
    MovementStuck { reason: FailureReason },
    TransitionStarted { from_map: MapId, to_map: MapId },
    TransitionCompleted { map: MapId, waited_ticks: u64 },
    /// The supervisor gave up waiting for visual stability.
    TransitionTimeout { map: MapId, waited_ticks: u64 },
    /// A transition edge was recorded from an observed map change.
    TransitionLearned { edge: EdgeId },
    RouteCompleted { map: MapId, position: Position },
    RouteCancelled { remaining_steps: usize },
}

/// Append-only event buffer.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<NavEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: u64, kind: NavEventKind) {
        self.events.push(NavEvent { tick, kind });
    }

    /// Remove and return everything logged so far, oldest first.
    pub fn drain(&mut self) -> Vec<NavEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NavEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
