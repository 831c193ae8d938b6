// Data-driven navigation configuration.
//
// All tunable engine parameters live in `NavConfig`, loadable from JSON. The
// engine never uses magic numbers for search caps or timing; it reads them
// from here. Every field has a default, so a partial JSON document (or `{}`)
// is a valid config.
//
// Timing values are expressed in ticks, not wall-clock time: the engine is
// driven by an external tick loop and has no clock of its own.
//
// See also: `navigator.rs` which owns the config, `collision.rs` for the
// one-way inference that reads `descending_direction`, `executor.rs` and
// `transition.rs` for the timing fields.
//
// **Critical constraint: determinism.** Identical configs plus identical
// perception inputs must produce identical routes and tick sequences.

use crate::error::ConfigError;
use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Tunable parameters for planning and execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Node-expansion cap for one single-map A* search. Exceeding it yields
    /// `PathNotFound::ExpansionLimit` instead of stalling the tick loop.
    pub max_local_expansions: u32,

    /// Node-expansion cap for one map-graph search.
    pub max_map_expansions: u32,

    /// Consecutive failed attempts on one step before the executor gives up
    /// with `MovementStuck`.
    pub max_bonks: u32,

    /// Ticks to wait after issuing a move before checking the observed
    /// position.
    pub settle_ticks: u64,

    /// Ticks to wait after a bonk before retrying the same step.
    pub bonk_recovery_ticks: u64,

    /// Minimum ticks a map transition suppresses commands, even if perception
    /// reports the screen stable sooner.
    pub transition_min_ticks: u64,

    /// Optional cap on how long the transition supervisor waits for visual
    /// stability. Reaching it releases the executor with a warning.
    pub transition_timeout_ticks: Option<u64>,

    /// Direction chosen for a one-way tile when several directions look
    /// equally open, and the exit direction of interior warp tiles.
    pub descending_direction: Direction,

    /// Record a transition edge whenever a map change is observed.
    pub learn_transitions: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_local_expansions: 20_000,
            max_map_expansions: 10_000,
            max_bonks: 3,
            settle_ticks: 2,
            bonk_recovery_ticks: 4,
            transition_min_ticks: 8,
            transition_timeout_ticks: Some(600),
            descending_direction: Direction::Down,
            learn_transitions: true,
        }
    }
}

impl NavConfig {
    /// Parse and validate a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bonks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_bonks",
                reason: "must be at least 1",
            });
        }
        if self.max_local_expansions == 0 {
            return Err(ConfigError::Invalid {
                field: "max_local_expansions",
                reason: "must be non-zero",
            });
        }
        if self.max_map_expansions == 0 {
            return Err(ConfigError::Invalid {
                field: "max_map_expansions",
                reason: "must be non-zero",
            });
        }
        if self
            .transition_timeout_ticks
            .is_some_and(|timeout| timeout < self.transition_min_ticks)
        {
            return Err(ConfigError::Invalid {
                field: "transition_timeout_ticks",
                reason: "must not be shorter than transition_min_ticks",
            });
        }
        Ok(())
    }
}
