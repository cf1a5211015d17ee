use crate::types::EventRecord;
use tokio::sync::broadcast;

/// In-process fan-out of lifecycle events. Publishing with no subscriber is
/// not an error for callers; the record is simply dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event: EventRecord,
    ) -> Result<(), broadcast::error::SendError<EventRecord>> {
        self.sender.send(event).map(|_| ())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
