//! Event dispatcher
//!
//! Turns inbound chat events into at most one reply per cooldown window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, trace};

use crate::config::MonstersConfig;
use crate::error::Error;
use crate::persona::PersonaRegistry;
use crate::protocol::{InboundEvent, OutboundEvent};

use super::state::{DispatchState, Phase};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// API key stamped on every outbound reply
    pub api_key: String,

    /// Minimum gap between two replies (exclusive)
    pub cooldown: Duration,

    /// Events to swallow before evaluating anything
    pub warmup_events: u64,

    /// RNG seed for reproducible reply selection
    pub seed: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cooldown: Duration::from_secs(10),
            warmup_events: 10,
            seed: None,
        }
    }
}

impl DispatcherConfig {
    /// Build from the process configuration
    pub fn from_settings(config: &MonstersConfig) -> Self {
        Self {
            api_key: config.transport.api_key.clone(),
            cooldown: config.dispatch.cooldown(),
            warmup_events: config.dispatch.warmup_events,
            seed: config.dispatch.seed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────

/// What happened to one inbound event
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Still inside the warm-up window
    WarmingUp { seen: u64 },

    /// Inbound frame could not be decoded
    Malformed,

    /// No trigger matched
    NoMatch,

    /// A trigger matched inside the cooldown window
    Throttled {
        persona: String,
        action: String,
        remaining: Duration,
    },

    /// A reply is ready to send
    Replied {
        persona: String,
        action: String,
        event: OutboundEvent,
    },

    /// A trigger matched but no reply could be built
    Failed {
        persona: String,
        action: String,
        error: Error,
    },
}

#[cfg(test)]
impl DispatchOutcome {
    fn into_reply(self) -> Option<OutboundEvent> {
        match self {
            DispatchOutcome::Replied { event, .. } => Some(event),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────

struct Inner {
    state: DispatchState,
    rng: StdRng,
}

/// Matches events against the registry and enforces warm-up and cooldown.
///
/// All mutable state sits behind one mutex, held for the whole of each
/// `handle_*` call, so concurrent callers still see at most one reply per
/// cooldown window.
pub struct Dispatcher {
    registry: Arc<PersonaRegistry>,
    config: DispatcherConfig,
    inner: Mutex<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher whose cooldown window starts at `started_at`
    pub fn new(registry: Arc<PersonaRegistry>, config: DispatcherConfig, started_at: Instant) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            registry,
            config,
            inner: Mutex::new(Inner {
                state: DispatchState::new(started_at),
                rng,
            }),
        }
    }

    /// Handle one decoded inbound event received at `now`
    pub fn handle_event(&self, event: &InboundEvent, now: Instant) -> DispatchOutcome {
        let mut inner = self.inner.lock();

        if inner.state.record_event(self.config.warmup_events) == Phase::WarmingUp {
            return DispatchOutcome::WarmingUp {
                seen: inner.state.event_count(),
            };
        }

        let Some(binding) = self.registry.find_match(&event.message) else {
            trace!("No trigger matched");
            return DispatchOutcome::NoMatch;
        };

        let persona = binding.persona.name().to_string();
        let action = binding.action.clone();

        if let Err(remaining) = inner.state.try_claim(now, self.config.cooldown) {
            return DispatchOutcome::Throttled {
                persona,
                action,
                remaining,
            };
        }

        match binding.persona.select(&action, &mut inner.rng) {
            Ok(response) => {
                info!(
                    persona = %persona,
                    action = %action,
                    pattern = %binding.pattern.as_str(),
                    "Trigger matched, replying"
                );
                DispatchOutcome::Replied {
                    persona,
                    action,
                    event: OutboundEvent {
                        api_key: self.config.api_key.clone(),
                        message: response.message,
                        fingerprint: response.fingerprint,
                        picture: response.picture,
                    },
                }
            }
            Err(e) => DispatchOutcome::Failed {
                persona,
                action,
                error: e,
            },
        }
    }

    /// Account for an inbound frame that could not be decoded
    pub fn handle_malformed(&self) -> DispatchOutcome {
        let mut inner = self.inner.lock();
        inner.state.record_event(self.config.warmup_events);
        DispatchOutcome::Malformed
    }

    /// Inbound events seen so far, malformed ones included
    pub fn event_count(&self) -> u64 {
        self.inner.lock().state.event_count()
    }

    #[cfg(test)]
    fn last_dispatch(&self) -> Instant {
        self.inner.lock().state.last_dispatch()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().state.phase(self.config.warmup_events)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
