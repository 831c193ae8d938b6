// Step executor: drives the actuator along a route, one step at a time.
//
// The executor is a small state machine advanced once per engine tick, with
// at most one state transition per call:
//
//   Idle        -> AwaitingMove  issue the next step's move
//   AwaitingMove-> Verifying     after `settle_ticks`
//   Verifying   -> AwaitingMove  observed == expected: advance, issue next
//               -> Done          ... and that was the last step
//               -> Recovering    observed != expected ("bonk")
//               -> Failed        ... and the bonk budget is spent
//   Recovering  -> AwaitingMove  after `bonk_recovery_ticks`: advance if the
//                                late move has landed, else retry the step
//
// Only consecutive failures on one step count against `max_bonks`; a
// verified step resets the counter. Moves are fire-and-forget, so every
// outcome is judged purely from the `Location` passed into `tick()`.
//
// Cancellation is honored only at step boundaries. A cancel requested while
// a move is in flight (AwaitingMove / Verifying) is held until that step has
// been judged.
//
// See also: `navigator.rs` which owns the executor and pauses it while the
// `TransitionSupervisor` reports a map transition, `composer.rs` for the
// routes consumed here.

use crate::config::NavConfig;
use crate::error::FailureReason;
use crate::event::{EventLog, NavEventKind};
use crate::perception::Actuator;
use crate::types::{Direction, Location, Route, Step};

/// Result of one engine tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickStatus {
    /// No route in flight.
    Idle,
    InProgress,
    /// A map transition is in progress; no commands are being issued.
    Transitioning,
    Done,
    Failed(FailureReason),
}

/// Internal executor state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    /// A move was issued on tick `issued_at`.
    AwaitingMove { issued_at: u64 },
    Verifying,
    /// A bonk was detected on tick `since`.
    Recovering { since: u64 },
    Done,
    Failed(FailureReason),
}

#[derive(Debug)]
pub struct StepExecutor {
    max_bonks: u32,
    settle_ticks: u64,
    bonk_recovery_ticks: u64,
    route: Option<Route>,
    step_index: usize,
    state: ExecState,
    consecutive_bonks: u32,
    /// Moves issued for the current step.
    attempts: u32,
    cancel_requested: bool,
    last_direction: Option<Direction>,
}

impl StepExecutor {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            max_bonks: config.max_bonks.max(1),
            settle_ticks: config.settle_ticks,
            bonk_recovery_ticks: config.bonk_recovery_ticks,
            route: None,
            step_index: 0,
            state: ExecState::Idle,
            consecutive_bonks: 0,
            attempts: 0,
            cancel_requested: false,
            last_direction: None,
        }
    }

    /// Start executing `route`, replacing whatever was in flight.
    pub fn begin(&mut self, route: Route) {
        tracing::debug!(steps = route.len(), goal = %route.goal(), "begin execution");
        self.route = Some(route);
        self.step_index = 0;
        self.state = ExecState::Idle;
        self.consecutive_bonks = 0;
        self.attempts = 0;
        self.cancel_requested = false;
        self.last_direction = None;
    }

    pub fn state(&self) -> &ExecState {
        &self.state
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Index of the step currently being executed.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn consecutive_bonks(&self) -> u32 {
        self.consecutive_bonks
    }

    /// Direction of the most recently issued move on the current route.
    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// Direction of the move issued but not yet judged, if any.
    pub fn in_flight_direction(&self) -> Option<Direction> {
        if self.is_mid_step() {
            self.last_direction
        } else {
            None
        }
    }

    /// True while a move has been issued but not yet judged.
    pub fn is_mid_step(&self) -> bool {
        matches!(self.state, ExecState::AwaitingMove { .. } | ExecState::Verifying)
    }

    fn remaining_steps(&self) -> usize {
        self.route
            .as_ref()
            .map_or(0, |r| r.len().saturating_sub(self.step_index))
    }

    fn current_step(&self) -> Option<Step> {
        self.route
            .as_ref()
            .and_then(|r| r.steps().get(self.step_index))
            .copied()
    }

    /// Request cancellation. Applied immediately at a step boundary,
    /// otherwise deferred until the in-flight step has been judged.
    pub fn cancel(&mut self, now: u64, events: &mut EventLog) {
        if self.route.is_none() {
            return;
        }
        if self.is_mid_step() {
            tracing::debug!(step = self.step_index, "cancel deferred until step boundary");
            self.cancel_requested = true;
        } else {
            self.apply_cancel(now, events);
        }
    }

    fn apply_cancel(&mut self, now: u64, events: &mut EventLog) {
        let remaining_steps = match self.state {
            ExecState::Done | ExecState::Failed(_) => 0,
            _ => self.remaining_steps(),
        };
        if remaining_steps > 0 {
            events.push(now, NavEventKind::RouteCancelled { remaining_steps });
            tracing::info!(remaining_steps, "route cancelled");
        }
        self.route = None;
        self.step_index = 0;
        self.state = ExecState::Idle;
        self.consecutive_bonks = 0;
        self.attempts = 0;
        self.cancel_requested = false;
        self.last_direction = None;
    }

    /// Advance the state machine by one transition.
    pub fn tick<A: Actuator + ?Sized>(
        &mut self,
        now: u64,
        observed: Location,
        actuator: &mut A,
        events: &mut EventLog,
    ) -> TickStatus {
        match self.state.clone() {
            ExecState::Idle => {
                if self.route.is_none() {
                    return TickStatus::Idle;
                }
                if self.cancel_requested {
                    self.apply_cancel(now, events);
                    return TickStatus::Idle;
                }
                self.issue_or_finish(now, observed, actuator, events)
            }
            ExecState::AwaitingMove { issued_at } => {
                if now.saturating_sub(issued_at) >= self.settle_ticks {
                    self.state = ExecState::Verifying;
                }
                TickStatus::InProgress
            }
            ExecState::Verifying => self.verify(now, observed, actuator, events),
            ExecState::Recovering { since } => {
                if now.saturating_sub(since) < self.bonk_recovery_ticks {
                    return TickStatus::InProgress;
                }
                // A move may land after the settle window; never retry a step
                // the agent has already completed.
                if self.current_step().is_some_and(|step| step.target() == observed) {
                    tracing::debug!(step = self.step_index, "late move landed during recovery");
                    return self.advance(now, observed, actuator, events);
                }
                if self.cancel_requested {
                    self.apply_cancel(now, events);
                    return TickStatus::Idle;
                }
                self.issue_or_finish(now, observed, actuator, events)
            }
            ExecState::Done => TickStatus::Done,
            ExecState::Failed(reason) => TickStatus::Failed(reason),
        }
    }

    /// Issue the current step, or finish if the route is exhausted.
    fn issue_or_finish<A: Actuator + ?Sized>(
        &mut self,
        now: u64,
        observed: Location,
        actuator: &mut A,
        events: &mut EventLog,
    ) -> TickStatus {
        let Some(step) = self.current_step() else {
            return self.finish(now, observed, events);
        };
        self.attempts += 1;
        self.last_direction = Some(step.direction);
        actuator.attempt_move(step.direction);
        events.push(
            now,
            NavEventKind::StepStarted {
                step_index: self.step_index,
                direction: step.direction,
                attempt: self.attempts,
            },
        );
        tracing::trace!(step = self.step_index, direction = %step.direction, attempt = self.attempts, "move issued");
        self.state = ExecState::AwaitingMove { issued_at: now };
        TickStatus::InProgress
    }

    fn verify<A: Actuator + ?Sized>(
        &mut self,
        now: u64,
        observed: Location,
        actuator: &mut A,
        events: &mut EventLog,
    ) -> TickStatus {
        let Some(step) = self.current_step() else {
            return self.finish(now, observed, events);
        };
        let expected = step.target();

        if observed == expected {
            return self.advance(now, observed, actuator, events);
        }

        self.consecutive_bonks += 1;
        events.push(
            now,
            NavEventKind::Bonk {
                step_index: self.step_index,
                expected: expected.position,
                observed: observed.position,
                consecutive: self.consecutive_bonks,
            },
        );
        tracing::warn!(
            step = self.step_index,
            %expected,
            %observed,
            consecutive = self.consecutive_bonks,
            "bonk: agent did not move as expected"
        );

        if self.consecutive_bonks >= self.max_bonks {
            let reason = FailureReason::MovementStuck {
                step_index: self.step_index,
                expected_map: expected.map,
                expected: expected.position,
                observed_map: observed.map,
                observed: observed.position,
                attempts: self.attempts,
            };
            tracing::warn!(%reason, "giving up on route");
            events.push(now, NavEventKind::MovementStuck { reason: reason.clone() });
            self.cancel_requested = false;
            self.last_direction = None;
            self.state = ExecState::Failed(reason.clone());
            return TickStatus::Failed(reason);
        }

        if self.cancel_requested {
            self.apply_cancel(now, events);
            return TickStatus::Idle;
        }
        self.state = ExecState::Recovering { since: now };
        TickStatus::InProgress
    }

    /// The current step has been observed complete: move on to the next.
    fn advance<A: Actuator + ?Sized>(
        &mut self,
        now: u64,
        observed: Location,
        actuator: &mut A,
        events: &mut EventLog,
    ) -> TickStatus {
        events.push(now, NavEventKind::StepCompleted { step_index: self.step_index });
        self.step_index += 1;
        self.consecutive_bonks = 0;
        self.attempts = 0;
        if self.cancel_requested {
            self.apply_cancel(now, events);
            return TickStatus::Idle;
        }
        self.issue_or_finish(now, observed, actuator, events)
    }

    /// All steps consumed: done if the agent stands on the goal.
    fn finish(&mut self, now: u64, observed: Location, events: &mut EventLog) -> TickStatus {
        self.last_direction = None;
        let Some(route) = &self.route else {
            self.state = ExecState::Idle;
            return TickStatus::Idle;
        };
        let goal = Location::new(route.goal_map(), route.goal());
        if observed == goal {
            events.push(
                now,
                NavEventKind::RouteCompleted {
                    map: goal.map,
                    position: goal.position,
                },
            );
            tracing::info!(%goal, steps = route.len(), "route completed");
            self.state = ExecState::Done;
            return TickStatus::Done;
        }
        let reason = FailureReason::MovementStuck {
            step_index: self.step_index,
            expected_map: goal.map,
            expected: goal.position,
            observed_map: observed.map,
            observed: observed.position,
            attempts: self.attempts,
        };
        tracing::warn!(%reason, "route exhausted away from goal");
        events.push(now, NavEventKind::MovementStuck { reason: reason.clone() });
        self.state = ExecState::Failed(reason.clone());
        TickStatus::Failed(reason)
    }
}
