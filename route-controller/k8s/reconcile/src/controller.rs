use crate::{apply::Apply, metrics::ControllerMetrics, reconciler::Reconciler};
use ahash::AHashMap as HashMap;
use futures::prelude::*;
use kubert::lease::Claim;
use parking_lot::Mutex;
use rand::Rng;
use route_controller_core::RouteId;
use route_controller_k8s_index::RouteStore;
use std::{collections::hash_map::Entry, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    time,
};
use tracing::{debug, info, warn, Instrument};

const MIN_BACKOFF: time::Duration = time::Duration::from_millis(250);
const MAX_BACKOFF: time::Duration = time::Duration::from_secs(5 * 60);

/// Drains the work queue, running at most `concurrency` passes at once and at
/// most one pass per route at a time.
pub struct Controller<S, A> {
    reconciler: Arc<Reconciler<S, A>>,
    lease: WriteLease,
    queue: mpsc::UnboundedSender<RouteId>,
    concurrency: usize,
    metrics: ControllerMetrics,

    /// Routes with a pass in flight, flagged when they were enqueued again
    /// during that pass.
    active: Mutex<HashMap<RouteId, bool>>,
    backoff: Backoff,
}

/// Whether this replica currently holds the write lease.
#[derive(Clone, Debug)]
pub struct WriteLease {
    claims: watch::Receiver<Arc<Claim>>,
    claimant: String,
}

/// Per-route exponential backoff for transient failures.
#[derive(Debug)]
struct Backoff {
    min: time::Duration,
    max: time::Duration,
    next: Mutex<HashMap<RouteId, time::Duration>>,
}

// === impl Controller ===

impl<S, A> Controller<S, A>
where
    S: RouteStore + Send + Sync + 'static,
    A: Apply + Send + Sync + 'static,
{
    pub fn new(
        reconciler: Reconciler<S, A>,
        lease: WriteLease,
        queue: mpsc::UnboundedSender<RouteId>,
        concurrency: usize,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            lease,
            queue,
            concurrency: concurrency.max(1),
            metrics,
            active: Mutex::new(HashMap::new()),
            backoff: Backoff::new(MIN_BACKOFF, MAX_BACKOFF),
        }
    }

    /// Processes routes from `rx` until the queue closes or shutdown is
    /// signaled. Passes still in flight at shutdown are abandoned.
    pub async fn run(self, rx: mpsc::UnboundedReceiver<RouteId>, shutdown: drain::Watch) {
        let ids = stream::unfold(rx, |mut rx| async move {
            let id = rx.recv().await?;
            Some((id, rx))
        });
        let workers = ids.for_each_concurrent(self.concurrency, |id| self.process(id));

        info!(concurrency = self.concurrency, "Controller started");
        tokio::select! {
            _ = workers => {}
            _ = shutdown.signaled() => info!("Shutting down"),
        }
    }

    async fn process(&self, id: RouteId) {
        if !self.lease.is_current() {
            debug!(route = %id, "Not holding the write lease");
            self.metrics.pass("skipped");
            return;
        }

        match self.active.lock().entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() = true;
                return;
            }
            Entry::Vacant(entry) => {
                entry.insert(false);
            }
        }

        loop {
            self.pass(&id).await;
            if !self.finish(&id) {
                return;
            }
        }
    }

    /// Releases a route after a pass, returning whether it must run again.
    fn finish(&self, id: &RouteId) -> bool {
        let mut active = self.active.lock();
        if active.get(id) == Some(&true) {
            active.insert(id.clone(), false);
            return true;
        }
        active.remove(id);
        false
    }

    async fn pass(&self, id: &RouteId) {
        match self.reconciler.reconcile(id).await {
            Ok(summary) => {
                self.backoff.reset(id);
                let result = if summary.invalid.is_empty() {
                    "ok"
                } else {
                    "invalid"
                };
                self.metrics.pass(result);
                debug!(route = %id, ?summary, "Reconciled");
            }
            Err(error) => {
                self.metrics.pass("error");
                self.metrics.requeued();
                let delay = jitter(self.backoff.next(id));
                warn!(route = %id, %error, ?delay, "Reconciliation failed; requeueing");

                let queue = self.queue.clone();
                let id = id.clone();
                tokio::spawn(
                    async move {
                        time::sleep(delay).await;
                        // The queue only closes on shutdown.
                        let _ = queue.send(id);
                    }
                    .in_current_span(),
                );
            }
        }
    }
}

// === impl WriteLease ===

impl WriteLease {
    pub fn new(claims: watch::Receiver<Arc<Claim>>, claimant: impl ToString) -> Self {
        Self {
            claims,
            claimant: claimant.to_string(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.claims.borrow().is_current_for(&self.claimant)
    }

    /// Waits until the claim changes, returning whether this replica holds
    /// it, or `None` once the lease manager has stopped.
    pub async fn changed(&mut self) -> Option<bool> {
        self.claims.changed().await.ok()?;
        let current = self.claims.borrow_and_update().is_current_for(&self.claimant);
        Some(current)
    }
}

// === impl Backoff ===

impl Backoff {
    fn new(min: time::Duration, max: time::Duration) -> Self {
        Self {
            min,
            max,
            next: Mutex::new(HashMap::new()),
        }
    }

    fn next(&self, id: &RouteId) -> time::Duration {
        let mut next = self.next.lock();
        let delay = next.get(id).copied().unwrap_or(self.min);
        next.insert(id.clone(), (delay * 2).min(self.max));
        delay
    }

    fn reset(&self, id: &RouteId) {
        self.next.lock().remove(id);
    }
}

/// Spreads a delay over 0.5x to 1.5x so that routes failing together do not
/// retry in lockstep.
fn jitter(delay: time::Duration) -> time::Duration {
    delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}
