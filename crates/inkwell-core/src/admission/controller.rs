//! Concurrency admission controller.
//!
//! At most `max_concurrent` requests stream at once; arrivals beyond that
//! wait in a bounded FIFO queue until a slot frees, the queue timeout
//! fires, or the owner stops them. Each admitted request holds an
//! [`AdmissionTicket`] whose `Drop` returns the slot and promotes the
//! next waiter, so a slot cannot leak on any exit path. A periodic sweep
//! reclaims slots whose tickets have somehow outlived the maximum request
//! age.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use inkwell_types::chat::{ActiveRequest, AdmissionSnapshot};
use inkwell_types::config::ConcurrencyLimits;
use inkwell_types::error::AdmissionError;

/// Grants and tracks concurrency slots.
pub struct AdmissionController {
    limits: ConcurrencyLimits,
    state: Mutex<AdmissionState>,
    shutdown: CancellationToken,
}

#[derive(Default)]
struct AdmissionState {
    active: HashMap<String, ActiveEntry>,
    queue: VecDeque<Waiting>,
}

struct ActiveEntry {
    owner: String,
    acquired_at: DateTime<Utc>,
    cancel: CancellationToken,
}

struct Waiting {
    ticket_id: String,
    owner: String,
    cancel: CancellationToken,
    promote: oneshot::Sender<()>,
}

impl AdmissionController {
    pub fn new(limits: ConcurrencyLimits) -> Arc<Self> {
        Arc::new(Self {
            limits,
            state: Mutex::new(AdmissionState::default()),
            shutdown: CancellationToken::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire a concurrency slot for `owner`, waiting in the queue if the
    /// service is at capacity.
    ///
    /// Fails fast with [`AdmissionError::QueueFull`] when the queue is at
    /// capacity, with [`AdmissionError::Timeout`] when no slot frees
    /// within the queue timeout, and with [`AdmissionError::Stopped`] when
    /// the owner stops the request while it is still queued.
    pub async fn acquire(
        self: &Arc<Self>,
        owner: &str,
    ) -> Result<AdmissionTicket, AdmissionError> {
        let ticket_id = Uuid::now_v7().to_string();
        let cancel = CancellationToken::new();

        let promoted = {
            let mut state = self.state();
            if state.active.len() < self.limits.max_concurrent {
                state.active.insert(
                    ticket_id.clone(),
                    ActiveEntry {
                        owner: owner.to_string(),
                        acquired_at: Utc::now(),
                        cancel: cancel.clone(),
                    },
                );
                None
            } else if state.queue.len() >= self.limits.queue_capacity {
                return Err(AdmissionError::QueueFull);
            } else {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(Waiting {
                    ticket_id: ticket_id.clone(),
                    owner: owner.to_string(),
                    cancel: cancel.clone(),
                    promote: tx,
                });
                Some(rx)
            }
        };

        let Some(rx) = promoted else {
            debug!(owner, ticket_id, "slot acquired immediately");
            return Ok(AdmissionTicket::new(ticket_id, cancel, Arc::clone(self)));
        };

        debug!(owner, ticket_id, "queued for a slot");
        let timeout = Duration::from_secs(self.limits.queue_timeout_secs);
        tokio::select! {
            res = tokio::time::timeout(timeout, rx) => match res {
                Ok(Ok(())) => {
                    debug!(owner, ticket_id, "promoted from queue");
                    Ok(AdmissionTicket::new(ticket_id, cancel, Arc::clone(self)))
                }
                // Sender dropped without promoting: the entry was removed
                // out from under us (stop or shutdown).
                Ok(Err(_)) => Err(AdmissionError::Stopped),
                Err(_elapsed) => {
                    self.abandon(&ticket_id);
                    Err(AdmissionError::Timeout)
                }
            },
            _ = cancel.cancelled() => {
                self.abandon(&ticket_id);
                Err(AdmissionError::Stopped)
            }
        }
    }

    /// Remove a ticket that gave up waiting.
    ///
    /// The ticket may have been promoted into the active set concurrently
    /// with the timeout/stop; in that case the slot is returned and the
    /// next waiter promoted, exactly as a normal release would.
    fn abandon(&self, ticket_id: &str) {
        let mut state = self.state();
        if let Some(pos) = state.queue.iter().position(|w| w.ticket_id == ticket_id) {
            state.queue.remove(pos);
        } else if state.active.remove(ticket_id).is_some() {
            Self::promote_next(&mut state);
        }
    }

    /// Return a slot and promote the next waiter. Idempotent.
    fn release(&self, ticket_id: &str) {
        let mut state = self.state();
        if state.active.remove(ticket_id).is_some() {
            Self::promote_next(&mut state);
        }
    }

    /// Move the next live waiter into the active set.
    ///
    /// Callers must hold the lock and have freed a slot first.
    fn promote_next(state: &mut AdmissionState) {
        while let Some(waiting) = state.queue.pop_front() {
            let ticket_id = waiting.ticket_id.clone();
            state.active.insert(
                ticket_id.clone(),
                ActiveEntry {
                    owner: waiting.owner,
                    acquired_at: Utc::now(),
                    cancel: waiting.cancel,
                },
            );
            if waiting.promote.send(()).is_ok() {
                break;
            }
            // Waiter gave up before we got to it; undo and try the next.
            state.active.remove(&ticket_id);
        }
    }

    /// Stop all of an owner's requests, active and queued.
    ///
    /// Returns the ticket ids that were signalled. Active streams observe
    /// the cancellation and wind down through their normal finalization,
    /// releasing their slots via ticket drop.
    pub fn stop_user(&self, owner: &str) -> Vec<String> {
        let state = self.state();
        let mut stopped = Vec::new();
        for (ticket_id, entry) in &state.active {
            if entry.owner == owner {
                entry.cancel.cancel();
                stopped.push(ticket_id.clone());
            }
        }
        for waiting in &state.queue {
            if waiting.owner == owner {
                waiting.cancel.cancel();
                stopped.push(waiting.ticket_id.clone());
            }
        }
        if !stopped.is_empty() {
            info!(owner, stopped = stopped.len(), "stop requested");
        }
        stopped
    }

    /// Stop one request by ticket id, if it belongs to `owner`.
    pub fn stop_ticket(&self, owner: &str, ticket_id: &str) -> bool {
        let state = self.state();
        if let Some(entry) = state.active.get(ticket_id) {
            if entry.owner == owner {
                entry.cancel.cancel();
                info!(owner, ticket_id, "stop requested");
                return true;
            }
            return false;
        }
        if let Some(waiting) = state.queue.iter().find(|w| w.ticket_id == ticket_id) {
            if waiting.owner == owner {
                waiting.cancel.cancel();
                info!(owner, ticket_id, "stop requested");
                return true;
            }
        }
        false
    }

    /// Point-in-time load view.
    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.state();
        AdmissionSnapshot {
            active: state.active.len(),
            queued: state.queue.len(),
            max_concurrent: self.limits.max_concurrent,
            queue_capacity: self.limits.queue_capacity,
        }
    }

    /// The owner's currently admitted requests, oldest first.
    pub fn requests_for(&self, owner: &str) -> Vec<ActiveRequest> {
        let state = self.state();
        let mut requests: Vec<ActiveRequest> = state
            .active
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, entry)| ActiveRequest {
                ticket_id: id.clone(),
                acquired_at: entry.acquired_at,
            })
            .collect();
        requests.sort_by_key(|r| r.acquired_at);
        requests
    }

    /// Reclaim active slots older than the maximum ticket age.
    ///
    /// Returns the number of slots reclaimed. Swept streams are cancelled
    /// so a wedged request cannot hold a slot forever.
    pub fn sweep_stale(&self) -> usize {
        let max_age = chrono::Duration::seconds(self.limits.max_ticket_age_secs as i64);
        let cutoff = Utc::now() - max_age;

        let mut state = self.state();
        let stale: Vec<String> = state
            .active
            .iter()
            .filter(|(_, entry)| entry.acquired_at <= cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for ticket_id in &stale {
            if let Some(entry) = state.active.remove(ticket_id) {
                entry.cancel.cancel();
                Self::promote_next(&mut state);
            }
        }
        stale.len()
    }

    /// Spawn the periodic stale-ticket sweeper.
    ///
    /// The task holds only a weak reference, so dropping the controller
    /// (or calling [`AdmissionController::shutdown`]) ends it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let period = Duration::from_secs(self.limits.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(controller) = weak.upgrade() else { break };
                        let swept = controller.sweep_stale();
                        if swept > 0 {
                            warn!(swept, "reclaimed stale concurrency slots");
                        }
                    }
                }
            }
        })
    }

    /// Stop the sweeper task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// A held concurrency slot.
///
/// Dropping the ticket releases the slot and promotes the next waiter.
pub struct AdmissionTicket {
    id: String,
    cancel: CancellationToken,
    controller: Arc<AdmissionController>,
}

impl AdmissionTicket {
    fn new(id: String, cancel: CancellationToken, controller: Arc<AdmissionController>) -> Self {
        Self {
            id,
            cancel,
            controller,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token cancelled when the owner stops this request.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionTicket")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.controller.release(&self.id);
    }
}
