use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::TicketRegistry;

/// Start the background sweep task for backends without native TTL
/// eviction (memory, redb). Redis deployments don't need one; its sweep is
/// a no-op.
pub fn start_registry_cleaner(
    registry: Arc<dyn TicketRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            debug!("Running ticket registry sweep");
            let removed = registry.sweep().await;
            if removed > 0 {
                debug!(tickets_removed = removed, "Expired tickets swept");
            }
        }
    })
}
