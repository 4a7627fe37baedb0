use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::service::LocationProvider;
use crate::sync::MapCatalogSync;

/// Background refresh while the map selector is open.
///
/// Dropping the guard stops the timer. Refreshes already queued keep running.
#[derive(Debug)]
pub struct PeriodicRefresh {
    handle: JoinHandle<()>,
}

impl PeriodicRefresh {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PeriodicRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MapCatalogSync {
    /// Queues a refresh every `refresh_interval`, starting one interval from
    /// now. A tick is skipped while a previous job is still pending.
    pub fn start_periodic_refresh(
        self: &Arc<Self>,
        location: Arc<dyn LocationProvider>,
    ) -> PeriodicRefresh {
        let period = self.config().refresh_interval;
        let handle = tokio::spawn(tick_refresh(Arc::downgrade(self), location, period));
        PeriodicRefresh { handle }
    }
}

async fn tick_refresh(
    sync: Weak<MapCatalogSync>,
    location: Arc<dyn LocationProvider>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(sync) = sync.upgrade() else {
            return;
        };
        if sync.pending_jobs() > 0 {
            debug!("periodic refresh skipped, previous job still pending");
            continue;
        }
        // Fire and forget; the outcome is logged by the refresh job itself.
        let _ = sync.refresh_near(location.as_ref());
    }
}
