//! Download coordination: at-most-one acquisition per canonical URL.
//!
//! Concurrent duplicate submissions of the same link must not spawn
//! duplicate acquisitions. The coordinator elects a single leader per
//! canonical URL; everyone else either reuses an already-persisted ready
//! result or joins the in-flight leader and copies its outcome.
//!
//! The registry of in-flight acquisitions is process-local and ephemeral:
//! it is never persisted and does not survive a restart. Leader election is
//! a single locked check-then-insert completed before the first suspension
//! point, which is what upholds the at-most-one-leader invariant on a
//! multi-threaded runtime.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::{MediaResult, MediaStatus, RequestStore};
use crate::urlnorm;

/// Terminal result a leader publishes to its followers.
#[derive(Debug, Clone)]
pub struct LeaderOutcome {
    pub status: MediaStatus,
    pub result: MediaResult,
}

type PendingMap = HashMap<String, watch::Receiver<Option<LeaderOutcome>>>;

enum Role {
    Leader(watch::Sender<Option<LeaderOutcome>>),
    Follower(watch::Receiver<Option<LeaderOutcome>>),
}

/// Removes a pending registry entry when dropped, unless disarmed.
///
/// Covers the path where a leader unwinds mid-acquisition: the entry must
/// not outlive the leader or followers would wait on a dead channel forever.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingMap>,
    key: &'a str,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.lock().unwrap().remove(self.key);
        }
    }
}

/// Coordinates acquisitions so each canonical URL is fetched at most once
/// concurrently, sharing the leader's outcome with every joiner.
pub struct DownloadCoordinator {
    store: Arc<dyn RequestStore>,
    pending: Mutex<PendingMap>,
}

impl DownloadCoordinator {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of acquisitions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Run `acquire` for `request_id` unless the result already exists or an
    /// acquisition for the same canonical URL is already in flight.
    ///
    /// Terminal state is read from the persisted record afterward, not
    /// returned: errors from the leader path are caught here, logged, and
    /// converted into a `failed` record. No error crosses this boundary.
    ///
    /// A failed leader does not doom its followers: each joiner that
    /// observes a failed outcome gets an independent chance to become the
    /// next leader and retry. There is deliberately no circuit breaker.
    pub async fn coordinate<F, Fut, E>(&self, request_id: &str, url: &str, acquire: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let key = urlnorm::normalize(url);

        // Phase 1: reuse a persisted ready result. Pure optimization; any
        // failure falls through to coordination.
        match self.reuse_ready(request_id, &key) {
            Ok(true) => {
                debug!(request_id, %key, "reused persisted ready result");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(request_id, %key, error = %e, "store reuse failed, coordinating instead");
            }
        }

        let mut acquire = Some(acquire);
        loop {
            // Phases 2+3 share one critical section: either join the
            // in-flight leader or become it. The insert happens before any
            // await so a concurrently-arriving duplicate can only observe
            // "pending" — never a window with no leader.
            let role = {
                let mut pending = self.pending.lock().unwrap();
                match pending.get(&key) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        pending.insert(key.clone(), rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Follower(mut rx) => {
                    debug!(request_id, %key, "joining in-flight acquisition");
                    let outcome = match rx.wait_for(|o| o.is_some()).await {
                        Ok(published) => published.clone(),
                        // Leader unwound without publishing; treat as failed.
                        Err(_) => None,
                    };
                    match outcome {
                        Some(outcome) if outcome.status == MediaStatus::Ready => {
                            self.adopt_result(request_id, &outcome.result);
                            return;
                        }
                        _ => {
                            debug!(request_id, %key, "leader failed, attempting to lead");
                            continue;
                        }
                    }
                }
                Role::Leader(tx) => {
                    let Some(acquire) = acquire.take() else {
                        return;
                    };
                    self.lead(request_id, &key, tx, acquire).await;
                    return;
                }
            }
        }
    }

    /// Phase 1: copy an already-persisted ready result onto this request.
    fn reuse_ready(
        &self,
        request_id: &str,
        key: &str,
    ) -> Result<bool, crate::store::StoreError> {
        let Some(existing) = self.store.find_ready_by_canonical_url(key)? else {
            return Ok(false);
        };
        if existing.id == request_id {
            return Ok(false);
        }
        self.store
            .update_result(request_id, &existing.result, MediaStatus::Ready)?;
        Ok(true)
    }

    /// Phase 3: run the acquisition as leader and publish the outcome.
    async fn lead<F, Fut, E>(
        &self,
        request_id: &str,
        key: &str,
        tx: watch::Sender<Option<LeaderOutcome>>,
        acquire: F,
    ) where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let mut guard = PendingGuard {
            pending: &self.pending,
            key,
            armed: true,
        };

        debug!(request_id, key, "became acquisition leader");
        if let Err(e) = acquire().await {
            warn!(request_id, key, error = %e, "acquisition failed");
            if let Err(store_err) = self.store.mark_failed(request_id, None) {
                warn!(request_id, error = %store_err, "failed to persist failed status");
            }
        }

        let outcome = match self.store.get(request_id) {
            Ok(Some(request)) => LeaderOutcome {
                status: request.status,
                result: request.result,
            },
            Ok(None) => {
                warn!(request_id, "request vanished during acquisition");
                LeaderOutcome {
                    status: MediaStatus::Failed,
                    result: MediaResult::default(),
                }
            }
            Err(e) => {
                warn!(request_id, error = %e, "could not read terminal state");
                LeaderOutcome {
                    status: MediaStatus::Failed,
                    result: MediaResult::default(),
                }
            }
        };

        // Remove the entry before publishing: a follower that sees a failed
        // outcome and loops must re-elect immediately rather than re-join
        // this finished channel. Waiting followers keep their own receiver
        // clones, so the outcome still reaches all of them.
        self.pending.lock().unwrap().remove(key);
        guard.armed = false;
        let _ = tx.send(Some(outcome));
    }

    /// Copy a ready leader result onto a follower request.
    fn adopt_result(&self, request_id: &str, result: &MediaResult) {
        if let Err(e) = self
            .store
            .update_result(request_id, result, MediaStatus::Ready)
        {
            warn!(request_id, error = %e, "failed to adopt leader result");
            if let Err(store_err) = self.store.mark_failed(request_id, None) {
                warn!(request_id, error = %store_err, "failed to persist failed status");
            }
        }
    }
}
