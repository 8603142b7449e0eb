use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub of committed events, one channel per facility.
///
/// Outbound delivery (webhooks, email) subscribes here; the engine never waits on it.
#[derive(Default)]
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a facility's events. Creates the channel if needed.
    pub fn subscribe(&self, facility_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(facility_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, facility_id: Ulid, event: Event) {
        if let Some(sender) = self.channels.get(&facility_id) {
            let _ = sender.send(event);
        }
    }

    /// Drop a facility's channel; existing receivers see the stream close.
    pub fn remove(&self, facility_id: &Ulid) {
        self.channels.remove(facility_id);
    }
}
