// wayfarer_nav: hierarchical navigation engine for grid-based multi-map worlds.
//
// This crate plans routes across many discrete tile maps joined by
// directional transition points, then drives a failure-prone movement
// actuator along them one step per tick, recovering from swallowed moves
// ("bonks") and waiting out map-transition animations. It extracts nothing
// from the game itself: perception and actuation are traits implemented by
// the host.
//
// Module overview:
// - `navigator.rs`:     Navigator facade: plan_route / begin_execution / tick / cancel.
// - `map_graph.rs`:     Map graph registry: maps, transition edges, map-sequence search.
// - `collision.rs`:     Source tiles, one-way inference, capability-aware grid cache.
// - `local_router.rs`:  Single-map A* over a collision grid.
// - `global_router.rs`: Map sequence -> per-map segments.
// - `composer.rs`:      Segments -> validated step list (`Route`).
// - `executor.rs`:      Step executor state machine with bonk recovery.
// - `transition.rs`:    Transition supervisor (animation windows, edge discovery).
// - `perception.rs`:    TileSource / Perception / Actuator collaborator traits.
// - `capability.rs`:    CapabilitySet snapshots and cache signatures.
// - `event.rs`:         NavEvent log drained by callers.
// - `config.rs`:        NavConfig: search caps and tick timings, loadable from JSON.
// - `error.rs`:         PathNotFound, ConstraintViolation, FailureReason, ConfigError.
// - `types.rs`:         MapId, Position, Location, Direction, Step, Route.
//
// The library logs through `tracing` and never installs a subscriber.
//
// **Critical constraint: determinism.** No system time, no randomness, and
// fixed iteration orders (`BTreeMap`, `Direction::ALL`). Identical inputs
// produce identical routes, moves, and events.

pub mod capability;
pub mod collision;
pub mod composer;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod global_router;
pub mod local_router;
pub mod map_graph;
pub mod navigator;
pub mod perception;
pub mod transition;
pub mod types;

pub use capability::{CapabilityKey, CapabilitySet};
pub use collision::{CollisionProvider, SourceGrid, SourceTile, TileClass};
pub use config::NavConfig;
pub use error::{ConfigError, ConstraintViolation, FailureReason, PathNotFound, PlanError};
pub use event::{NavEvent, NavEventKind};
pub use executor::TickStatus;
pub use map_graph::{EdgeId, MapGraph, TransitionEdge};
pub use navigator::Navigator;
pub use perception::{Actuator, Perception, TileAtlas, TileSource};
pub use types::{Direction, Location, MapId, Position, Route, Step, StepKind};
