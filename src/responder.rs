//! Responder loop
//!
//! Glues the transport's event stream to the dispatcher and sends the
//! resulting replies back through a [`ReplySink`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{Error, Result};
use crate::protocol::OutboundEvent;
use crate::transport::ClientEvent;

// ─────────────────────────────────────────────────────────────────
// Reply Sink
// ─────────────────────────────────────────────────────────────────

/// Destination for outbound replies
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Send one reply; errors are reported to the caller, not retried
    async fn send_reply(&self, event: OutboundEvent) -> Result<()>;
}

#[async_trait]
impl<T: ReplySink + ?Sized> ReplySink for Arc<T> {
    async fn send_reply(&self, event: OutboundEvent) -> Result<()> {
        (**self).send_reply(event).await
    }
}

// ─────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────

/// Counters for one responder run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponderStats {
    /// Chat events received (malformed ones included)
    pub events: u64,
    /// Replies the sink accepted for a live connection
    pub replies: u64,
    /// Matches suppressed by the cooldown
    pub throttled: u64,
    /// Frames that could not be decoded
    pub malformed: u64,
    /// Matches that failed to build a reply or that the sink refused,
    /// including replies produced while disconnected
    pub failed: u64,
}

// ─────────────────────────────────────────────────────────────────
// Responder
// ─────────────────────────────────────────────────────────────────

/// Processes transport events in arrival order
pub struct Responder<S: ReplySink> {
    dispatcher: Arc<Dispatcher>,
    sink: S,
    stats: ResponderStats,
}

impl<S: ReplySink> Responder<S> {
    pub fn new(dispatcher: Arc<Dispatcher>, sink: S) -> Self {
        Self {
            dispatcher,
            sink,
            stats: ResponderStats::default(),
        }
    }

    /// Run until the event channel closes, `shutdown` resolves, or the
    /// transport reports a fatal error.
    pub async fn run<F>(
        mut self,
        events: &mut mpsc::Receiver<ClientEvent>,
        shutdown: F,
    ) -> Result<ResponderStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping responder");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Transport event channel closed");
                        break;
                    };
                    let now = tokio::time::Instant::now().into_std();
                    self.handle_event(event, now).await?;
                }
            }
        }

        Ok(self.stats)
    }

    /// Handle one transport event received at `now`
    pub async fn handle_event(&mut self, event: ClientEvent, now: Instant) -> Result<()> {
        match event {
            ClientEvent::Connected => {
                info!("Connected to chat server");
            }
            ClientEvent::Disconnected { reason } => {
                warn!(reason = %reason, "Disconnected from chat server");
            }
            ClientEvent::Reconnecting { attempt } => {
                debug!(attempt, "Reconnecting to chat server");
            }
            ClientEvent::Error { message, fatal } => {
                if fatal {
                    error!(error = %message, "Fatal transport error");
                    return Err(Error::ConnectionLost { message });
                }
                warn!(error = %message, "Transport error");
            }
            ClientEvent::Malformed { reason } => {
                self.stats.events += 1;
                self.stats.malformed += 1;
                debug!(reason = %reason, "Dropping malformed frame");
                self.dispatcher.handle_malformed();
            }
            ClientEvent::Chat(inbound) => {
                self.stats.events += 1;
                match self.dispatcher.handle_event(&inbound, now) {
                    DispatchOutcome::Replied {
                        persona,
                        action,
                        event,
                    } => match self.sink.send_reply(event).await {
                        Ok(()) => self.stats.replies += 1,
                        Err(e) => {
                            self.stats.failed += 1;
                            warn!(
                                persona = %persona,
                                action = %action,
                                error = %e,
                                "Failed to send reply"
                            );
                        }
                    },
                    DispatchOutcome::Throttled {
                        persona,
                        action,
                        remaining,
                    } => {
                        self.stats.throttled += 1;
                        debug!(
                            persona = %persona,
                            action = %action,
                            remaining_ms = remaining.as_millis() as u64,
                            "Match suppressed by cooldown"
                        );
                    }
                    DispatchOutcome::Failed {
                        persona,
                        action,
                        error,
                    } => {
                        self.stats.failed += 1;
                        error!(
                            persona = %persona,
                            action = %action,
                            error = %error,
                            "Failed to build reply"
                        );
                    }
                    DispatchOutcome::Malformed => self.stats.malformed += 1,
                    DispatchOutcome::WarmingUp { seen } => {
                        trace!(seen, "Warming up, event ignored");
                    }
                    DispatchOutcome::NoMatch => {}
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn stats(&self) -> &ResponderStats {
        &self.stats
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
