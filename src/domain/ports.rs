use super::event::Notification;
use super::party::{Holder, PartyId, Requester};
use super::request::{Request, RequestId};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for requests. Only the coordinator writes through it.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn store(&self, request: Request) -> Result<()>;
    async fn get(&self, id: RequestId) -> Result<Option<Request>>;
    async fn by_holder(&self, holder: &PartyId) -> Result<Vec<Request>>;
    async fn get_all(&self) -> Result<Vec<Request>>;
}

/// Lookup of registered parties, owned by the account layer.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn requester(&self, id: &PartyId) -> Result<Option<Requester>>;
    async fn holder(&self, id: &PartyId) -> Result<Option<Holder>>;
    async fn store_requester(&self, requester: Requester) -> Result<()>;
    async fn store_holder(&self, holder: Holder) -> Result<()>;
}

/// Best-effort push of a notification to every live session of `recipient`.
///
/// Returns how many sessions received it; zero means it was dropped.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, recipient: &PartyId, notification: Notification) -> usize;
}

pub type RequestStoreBox = Box<dyn RequestStore>;
pub type PartyDirectoryBox = Box<dyn PartyDirectory>;
pub type EventDispatcherBox = Box<dyn EventDispatcher>;
