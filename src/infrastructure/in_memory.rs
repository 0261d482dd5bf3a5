use crate::domain::party::{Holder, PartyId, Requester};
use crate::domain::ports::{PartyDirectory, RequestStore};
use crate::domain::request::{Request, RequestId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for requests.
///
/// Uses `Arc<RwLock<HashMap<RequestId, Request>>>` so clones share state.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<RequestId, Request>>>,
}

impl InMemoryRequestStore {
    /// Creates a new, empty in-memory request store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn store(&self, request: Request) -> Result<()> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<Request>> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id).cloned())
    }

    async fn by_holder(&self, holder: &PartyId) -> Result<Vec<Request>> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .filter(|request| &request.holder == holder)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Request>> {
        let requests = self.requests.read().await;
        Ok(requests.values().cloned().collect())
    }
}

/// A thread-safe in-memory directory of requesters and holders.
#[derive(Default, Clone)]
pub struct InMemoryPartyDirectory {
    requesters: Arc<RwLock<HashMap<PartyId, Requester>>>,
    holders: Arc<RwLock<HashMap<PartyId, Holder>>>,
}

impl InMemoryPartyDirectory {
    /// Creates a new, empty in-memory party directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartyDirectory for InMemoryPartyDirectory {
    async fn requester(&self, id: &PartyId) -> Result<Option<Requester>> {
        let requesters = self.requesters.read().await;
        Ok(requesters.get(id).cloned())
    }

    async fn holder(&self, id: &PartyId) -> Result<Option<Holder>> {
        let holders = self.holders.read().await;
        Ok(holders.get(id).cloned())
    }

    async fn store_requester(&self, requester: Requester) -> Result<()> {
        let mut requesters = self.requesters.write().await;
        requesters.insert(requester.id.clone(), requester);
        Ok(())
    }

    async fn store_holder(&self, holder: Holder) -> Result<()> {
        let mut holders = self.holders.write().await;
        holders.insert(holder.id.clone(), holder);
        Ok(())
    }
}
