use async_trait::async_trait;
use nudge_core::error::GatewayError;
use nudge_core::gateway::{Notification, NotificationGateway};
use tokio::sync::broadcast;
use tracing::debug;

/// Default transport: fans notifications out to every connected stream
/// subscriber (a chat bot, a UI). With nobody listening a send fails, so
/// the scheduler keeps the task due and retries on its next tick.
#[derive(Clone)]
pub struct OutboundBus {
    sender: broadcast::Sender<Notification>,
}

impl OutboundBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationGateway for OutboundBus {
    async fn send_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        match self.sender.send(notification.clone()) {
            Ok(receivers) => {
                debug!(task_id = %notification.task_id, receivers, "notification published");
                Ok(())
            }
            Err(_) => Err(GatewayError::Unavailable {
                reason: "no outbound subscriber connected".to_string(),
            }),
        }
    }
}
