use super::channel_registry::ChannelRegistry;
use crate::domain::event::Notification;
use crate::domain::party::PartyId;
use crate::domain::ports::EventDispatcher;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// Pushes notifications through a shared [`ChannelRegistry`].
///
/// At-most-once: a recipient without a live session simply misses the event.
#[derive(Clone)]
pub struct RegistryDispatcher {
    registry: Arc<ChannelRegistry>,
}

impl RegistryDispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventDispatcher for RegistryDispatcher {
    async fn dispatch(&self, recipient: &PartyId, notification: Notification) -> usize {
        let delivered = self.registry.push(recipient, &notification).await;
        trace!(
            recipient = %recipient,
            event = notification.event.name(),
            delivered,
            "notification pushed"
        );
        delivered
    }
}
