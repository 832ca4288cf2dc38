//! Dispatch state tracking
//!
//! Counts inbound events for the warm-up gate and remembers when the last
//! reply went out for the global cooldown.

use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────
// Phase
// ─────────────────────────────────────────────────────────────────

/// Dispatcher phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Events are counted but never evaluated
    WarmingUp,
    /// Events are matched and may produce replies
    Active,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::WarmingUp => write!(f, "warming_up"),
            Phase::Active => write!(f, "active"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Dispatch State
// ─────────────────────────────────────────────────────────────────

/// Mutable throttling state, owned by one dispatcher
#[derive(Debug, Clone)]
pub struct DispatchState {
    /// When the last reply was sent (or the dispatcher started)
    last_dispatch: Instant,

    /// Inbound events seen, malformed ones included
    event_count: u64,
}

impl DispatchState {
    /// Create state anchored at the dispatcher's start instant
    pub fn new(started_at: Instant) -> Self {
        Self {
            last_dispatch: started_at,
            event_count: 0,
        }
    }

    /// Count one inbound event and report the phase it falls in
    pub fn record_event(&mut self, warmup_events: u64) -> Phase {
        self.event_count = self.event_count.saturating_add(1);
        self.phase(warmup_events)
    }

    /// Current phase for the given warm-up threshold
    pub fn phase(&self, warmup_events: u64) -> Phase {
        if self.event_count > warmup_events {
            Phase::Active
        } else {
            Phase::WarmingUp
        }
    }

    /// Claim the reply slot at `now`.
    ///
    /// Succeeds only when strictly more than `cooldown` has passed since the
    /// last dispatch, and then moves `last_dispatch` to `now`. On failure the
    /// state is untouched and the remaining wait is returned.
    pub fn try_claim(&mut self, now: Instant, cooldown: Duration) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_dispatch);
        if elapsed <= cooldown {
            return Err(cooldown - elapsed);
        }
        self.last_dispatch = now;
        Ok(())
    }

    #[cfg(test)]
    pub fn last_dispatch(&self) -> Instant {
        self.last_dispatch
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}
