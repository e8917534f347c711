use crate::config::ConnectionUri;
use crate::error::{Result, TomeError};
use crate::network::driver::{Connector, Driver};
use crate::network::protocol::{Namespace, Request, Response};
use crate::storage::collection_data::CollectionData;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// URI scheme served by [`MemoryStore`].
pub const MEMORY_SCHEME: &str = "memory";

// Store statistics structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub collection_count: usize,
    pub document_count: usize,
    pub request_count: u64,
    pub open_sessions: usize,
}

/// An in-process document store reachable at a single `memory://host:port` address.
///
/// Clones share the same data, so a test can keep a handle to inspect what a client wrote.
#[derive(Clone)]
pub struct MemoryStore {
    address: String,
    collections: Arc<DashMap<Namespace, CollectionData>>,
    request_count: Arc<AtomicU64>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Creates a store answering at `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            collections: Arc::new(DashMap::new()),
            request_count: Arc::new(AtomicU64::new(0)),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a store at the address named by `uri`.
    pub fn for_uri(uri: &ConnectionUri) -> Self {
        Self::new(uri.address())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn get_stats(&self) -> StoreStats {
        StoreStats {
            collection_count: self.collections.len(),
            document_count: self.collections.iter().map(|c| c.len()).sum(),
            request_count: self.request_count.load(Ordering::Relaxed),
            open_sessions: self.open_sessions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn process_request(&self, request: Request) -> Result<Response> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        match request {
            Request::Ping => Ok(Response::Done),

            Request::CreateCollection { ns } => match self.collections.entry(ns) {
                Entry::Occupied(entry) => Err(TomeError::write(
                    format!("collection '{}' already exists", entry.key()),
                    0,
                )),
                Entry::Vacant(entry) => {
                    entry.insert(CollectionData::default());
                    Ok(Response::Done)
                }
            },

            Request::ListCollections { database } => {
                let mut names: Vec<String> = self
                    .collections
                    .iter()
                    .filter(|entry| entry.key().database == database)
                    .map(|entry| entry.key().collection.clone())
                    .collect();
                names.sort();
                Ok(Response::Names(names))
            }

            Request::Insert {
                ns,
                documents,
                ordered,
            } => {
                let mut data = self.collections.entry(ns).or_default();
                data.insert_many(documents, ordered).map(Response::Inserted)
            }

            Request::Find {
                ns,
                filter,
                options,
            } => match self.collections.get(&ns) {
                Some(data) => data.find(&filter, &options).map(Response::Documents),
                None => Ok(Response::Documents(Vec::new())),
            },

            Request::Count { ns, filter } => match self.collections.get(&ns) {
                Some(data) => data.count(&filter).map(Response::Count),
                None => Ok(Response::Count(0)),
            },

            Request::Update {
                ns,
                filter,
                update,
                multi,
            } => match self.collections.get_mut(&ns) {
                Some(mut data) => {
                    let (matched, modified) = data.update(&filter, &update, multi)?;
                    Ok(Response::Updated { matched, modified })
                }
                None => Ok(Response::Updated {
                    matched: 0,
                    modified: 0,
                }),
            },

            Request::Delete { ns, filter, multi } => match self.collections.get_mut(&ns) {
                Some(mut data) => data.delete(&filter, multi).map(Response::Deleted),
                None => Ok(Response::Deleted(0)),
            },

            Request::Aggregate { ns, pipeline } => match self.collections.get(&ns) {
                Some(data) => data.aggregate(&pipeline).map(Response::Documents),
                None => pipeline.execute(Vec::new()).map(Response::Documents),
            },

            Request::CreateIndex { ns, definition } => {
                let mut data = self.collections.entry(ns).or_default();
                data.create_index(definition).map(Response::IndexName)
            }

            Request::ListIndexes { ns } => match self.collections.get(&ns) {
                Some(data) => Ok(Response::Indexes(data.list_indexes())),
                None => Ok(Response::Indexes(Vec::new())),
            },

            Request::Explain {
                ns,
                filter,
                options,
            } => {
                let data = self.collections.get(&ns);
                let empty = CollectionData::default();
                let data = data.as_deref().unwrap_or(&empty);
                data.explain(&filter, &options).map(Response::Explain)
            }
        }
    }
}

#[async_trait]
impl Connector for MemoryStore {
    async fn connect(&self, uri: &ConnectionUri) -> Result<Arc<dyn Driver>> {
        if uri.scheme != MEMORY_SCHEME {
            return Err(TomeError::Connection(format!(
                "unsupported scheme '{}' (expected '{}')",
                uri.scheme, MEMORY_SCHEME
            )));
        }
        if uri.address() != self.address {
            return Err(TomeError::Connection(format!(
                "no store reachable at {}",
                uri.address()
            )));
        }
        self.open_sessions.fetch_add(1, Ordering::Relaxed);
        debug!("memory store {}: session opened", self.address);
        Ok(Arc::new(MemorySession {
            store: self.clone(),
            open: AtomicBool::new(true),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
    open: AtomicBool,
}

#[async_trait]
impl Driver for MemorySession {
    async fn dispatch(&self, request: Request) -> Result<Response> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TomeError::Connection("session is closed".into()));
        }
        self.store.process_request(request)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.store.open_sessions.fetch_sub(1, Ordering::Relaxed);
            debug!("memory store {}: session closed", self.store.address);
        }
        Ok(())
    }
}
