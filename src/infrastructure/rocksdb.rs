use crate::domain::party::{Holder, PartyId, Requester};
use crate::domain::ports::{PartyDirectory, RequestStore};
use crate::domain::request::{Request, RequestId};
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing requests.
pub const CF_REQUESTS: &str = "requests";
/// Column Family for storing requesters.
pub const CF_REQUESTERS: &str = "requesters";
/// Column Family for storing holders.
pub const CF_HOLDERS: &str = "holders";

/// A persistent store implementation using RocksDB.
///
/// Requests, requesters and holders live in separate Column Families and are
/// encoded as JSON. `Clone` shares the underlying `Arc<DB>`, so one instance
/// can back both ports.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the column families if they are missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_REQUESTS, CF_REQUESTERS, CF_HOLDERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put<T: Serialize>(&self, family: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.family(family)?;
        let bytes = serde_json::to_vec(value).map_err(|e| {
            BrokerError::InternalError(format!("serialization error in {family}: {e}").into())
        })?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.family(family)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(family, &bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.family(family)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, bytes) = item?;
            values.push(decode(family, &bytes)?);
        }
        Ok(values)
    }

    fn family(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BrokerError::InternalError(format!("column family {name} not found").into())
        })
    }
}

fn decode<T: DeserializeOwned>(family: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        BrokerError::InternalError(format!("deserialization error in {family}: {e}").into())
    })
}

#[async_trait]
impl RequestStore for RocksDBStore {
    async fn store(&self, request: Request) -> Result<()> {
        self.put(CF_REQUESTS, request.id.as_bytes(), &request)
    }

    async fn get(&self, id: RequestId) -> Result<Option<Request>> {
        self.fetch(CF_REQUESTS, id.as_bytes())
    }

    async fn by_holder(&self, holder: &PartyId) -> Result<Vec<Request>> {
        let requests: Vec<Request> = self.scan(CF_REQUESTS)?;
        Ok(requests
            .into_iter()
            .filter(|request| &request.holder == holder)
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Request>> {
        self.scan(CF_REQUESTS)
    }
}

#[async_trait]
impl PartyDirectory for RocksDBStore {
    async fn requester(&self, id: &PartyId) -> Result<Option<Requester>> {
        self.fetch(CF_REQUESTERS, id.as_str().as_bytes())
    }

    async fn holder(&self, id: &PartyId) -> Result<Option<Holder>> {
        self.fetch(CF_HOLDERS, id.as_str().as_bytes())
    }

    async fn store_requester(&self, requester: Requester) -> Result<()> {
        self.put(CF_REQUESTERS, requester.id.as_str().as_bytes(), &requester)
    }

    async fn store_holder(&self, holder: Holder) -> Result<()> {
        self.put(CF_HOLDERS, holder.id.as_str().as_bytes(), &holder)
    }
}
