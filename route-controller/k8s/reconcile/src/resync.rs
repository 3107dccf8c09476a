use crate::controller::WriteLease;
use route_controller_core::RouteId;
use route_controller_k8s_index::RouteStore;
use tokio::{sync::mpsc, time};
use tracing::{debug, info};

/// Periodically enqueues every live route so that drift in managed objects is
/// corrected even without watch events.
///
/// Routes are also enqueued as soon as this replica acquires the write lease,
/// since events observed while another replica held it were skipped.
pub async fn resync<S: RouteStore>(
    store: S,
    queue: mpsc::UnboundedSender<RouteId>,
    mut lease: WriteLease,
    period: time::Duration,
) {
    let mut timer = time::interval_at(time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut leader = lease.is_current();
    let mut watching = true;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                // A claim can lapse without the lease manager publishing it.
                leader = lease.is_current();
                if !leader {
                    continue;
                }
            }
            current = lease.changed(), if watching => {
                let Some(current) = current else {
                    debug!("Lease claims closed");
                    watching = false;
                    continue;
                };
                let acquired = current && !leader;
                leader = current;
                if !acquired {
                    continue;
                }
                info!("Acquired write lease");
            }
        }

        let ids = store.route_ids();
        debug!(routes = ids.len(), "Resyncing");
        for id in ids {
            if queue.send(id).is_err() {
                return;
            }
        }
    }
}
