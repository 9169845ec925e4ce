use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::{Broker, state::BrokerState};

impl BrokerState {
    /// Deletes rooms that have no members and are older than `grace`.
    pub(crate) fn sweep_empty_rooms(&mut self, grace: Duration, now: Instant) -> Vec<String> {
        let doomed: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.members.is_empty())
            .filter(|room| now.saturating_duration_since(room.created_at) >= grace)
            .map(|room| room.id.clone())
            .collect();

        for room_id in &doomed {
            self.rooms.remove(room_id);
        }
        doomed
    }
}

/// Sweeps every `every`, deleting empty rooms older than `grace`. Rooms with
/// members are never touched. A `grace` of zero deletes every empty room on
/// each pass; a non-zero grace keeps freshly created rooms around until their
/// creator has had a chance to join.
pub fn spawn(broker: Broker, every: Duration, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = broker.sweep(grace).await;
            if removed > 0 {
                tracing::info!(removed, "swept empty rooms");
            }

            for problem in broker.audit().await {
                tracing::warn!(%problem, "room membership out of sync");
            }
        }
    })
}
