// Transition supervisor: waits out map-change animations.
//
// While a map transition animates, the game silently swallows movement
// commands, so any step issued during that window would be misread as a
// bonk. The supervisor watches the observed map identifier every tick. When
// it differs from the last stable observation, it enters the transitioning
// state and the navigator stops ticking the executor. It releases once
// both of these hold:
//
// - at least `transition_min_ticks` have passed since the change was seen;
// - perception reports the animation as stable.
//
// An optional `transition_timeout_ticks` bounds the wait. Reaching it
// releases anyway, with a warning and a `TransitionTimeout` event. It is
// never fatal.
//
// Each release reports where the agent was before and after the change, so
// the navigator can learn transition edges it did not know about.
//
// See also: `navigator.rs` which gates the executor on `observe()`.

use crate::config::NavConfig;
use crate::event::{EventLog, NavEventKind};
use crate::types::{Location, MapId};

/// A completed transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Last stable location before the map changed.
    pub from: Location,
    /// First stable location after.
    pub to: Location,
    pub waited_ticks: u64,
    pub timed_out: bool,
}

/// What the supervisor decided for this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// No transition in progress; commands may be issued.
    Stable,
    /// Commands are suppressed this tick.
    Transitioning,
    /// A transition just finished; commands may be issued again.
    Released(TransitionOutcome),
}

#[derive(Clone, Copy, Debug)]
struct ActiveTransition {
    from: Location,
    to_map: MapId,
    started_at: u64,
}

#[derive(Debug)]
pub struct TransitionSupervisor {
    min_ticks: u64,
    timeout_ticks: Option<u64>,
    last_stable: Option<Location>,
    active: Option<ActiveTransition>,
}

impl TransitionSupervisor {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            min_ticks: config.transition_min_ticks,
            timeout_ticks: config.transition_timeout_ticks,
            last_stable: None,
            active: None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    /// The most recent location observed outside a transition.
    pub fn last_stable(&self) -> Option<Location> {
        self.last_stable
    }

    /// Feed one tick's observation.
    pub fn observe(
        &mut self,
        now: u64,
        observed: Location,
        animation_stable: bool,
        events: &mut EventLog,
    ) -> SupervisorStatus {
        let Some(mut active) = self.active else {
            match self.last_stable {
                Some(previous) if previous.map != observed.map => {
                    tracing::debug!(from = %previous, to_map = %observed.map, "map transition detected");
                    events.push(
                        now,
                        NavEventKind::TransitionStarted {
                            from_map: previous.map,
                            to_map: observed.map,
                        },
                    );
                    self.active = Some(ActiveTransition {
                        from: previous,
                        to_map: observed.map,
                        started_at: now,
                    });
                    return SupervisorStatus::Transitioning;
                }
                _ => {
                    self.last_stable = Some(observed);
                    return SupervisorStatus::Stable;
                }
            }
        };

        if observed.map != active.to_map {
            // Chained transition (e.g. a warp landing on another warp).
            tracing::debug!(to_map = %observed.map, "transition retargeted");
            active.to_map = observed.map;
            active.started_at = now;
            self.active = Some(active);
            return SupervisorStatus::Transitioning;
        }

        let waited_ticks = now.saturating_sub(active.started_at);
        let settled = waited_ticks >= self.min_ticks && animation_stable;
        let timed_out = !settled && self.timeout_ticks.is_some_and(|t| waited_ticks >= t);
        if !settled && !timed_out {
            return SupervisorStatus::Transitioning;
        }

        if timed_out {
            tracing::warn!(map = %observed.map, waited_ticks, "transition never settled, releasing anyway");
            events.push(
                now,
                NavEventKind::TransitionTimeout {
                    map: observed.map,
                    waited_ticks,
                },
            );
        } else {
            events.push(
                now,
                NavEventKind::TransitionCompleted {
                    map: observed.map,
                    waited_ticks,
                },
            );
        }
        tracing::debug!(to = %observed, waited_ticks, "transition released");
        self.active = None;
        self.last_stable = Some(observed);
        SupervisorStatus::Released(TransitionOutcome {
            from: active.from,
            to: observed,
            waited_ticks,
            timed_out,
        })
    }
}
