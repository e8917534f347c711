use crate::collection::Collection;
use crate::config::{ClientConfig, ConnectionUri};
use crate::error::{Result, TomeError};
use crate::network::driver::{Connector, Driver};
use crate::network::protocol::{Namespace, Request, Response};
use crate::results::{expect_done, expect_names};
use log::{Level, debug, info, log_enabled, warn};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Database used when the connection URI names none.
pub const DEFAULT_DATABASE: &str = "test";

/// Connection manager. Cloning is cheap and every clone shares one connection,
/// so closing any clone closes them all.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("uri", &self.inner.uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct ClientInner {
    uri: ConnectionUri,
    driver: Arc<dyn Driver>,
    closed: AtomicBool,
}

impl Client {
    /// Parses `uri` and connects through `connector`.
    pub async fn open(uri: &str, connector: &dyn Connector) -> Result<Self> {
        let uri = ConnectionUri::parse(uri)?;
        let driver = connector.connect(&uri).await?;
        info!("Connected to {}", uri);
        Ok(Self {
            inner: Arc::new(ClientInner {
                uri,
                driver,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub async fn open_with_config(config: &ClientConfig, connector: &dyn Connector) -> Result<Self> {
        Self::open(&config.uri, connector).await
    }

    /// Opens a client, hands it to `f`, and closes it whether or not `f` succeeded.
    ///
    /// The result of `f` is returned as is. A failure to close is logged and
    /// never replaces the outcome of `f`.
    pub async fn run<F, Fut, T, E>(uri: &str, connector: &dyn Connector, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<TomeError>,
    {
        let client = Self::open(uri, connector).await?;
        let outcome = f(client.clone()).await;
        if let Err(e) = client.close().await {
            warn!("Failed to close connection to {}: {}", client.uri(), e);
        }
        outcome
    }

    /// Releases the connection. Closing an already closed client does nothing.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing connection to {}", self.inner.uri);
        self.inner.driver.disconnect().await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn uri(&self) -> &ConnectionUri {
        &self.inner.uri
    }

    pub async fn ping(&self) -> Result<()> {
        expect_done(self.dispatch(Request::Ping).await?)
    }

    /// Handle to the database `name`. No request is sent.
    pub fn database(&self, name: &str) -> Result<Database> {
        validate_database_name(name)?;
        Ok(Database {
            client: self.clone(),
            name: name.to_string(),
        })
    }

    /// The database named in the URI path, or `test`.
    pub fn default_database(&self) -> Result<Database> {
        let name = self.inner.uri.database.as_deref().unwrap_or(DEFAULT_DATABASE);
        self.database(name)
    }

    /// Sends one request to the store.
    pub(crate) async fn dispatch(&self, request: Request) -> Result<Response> {
        if self.is_closed() {
            return Err(TomeError::Connection(format!(
                "client for {} is closed",
                self.inner.uri
            )));
        }
        if log_enabled!(Level::Debug) {
            debug!("{} -> {}", request.name(), serde_json::to_string(&request)?);
        }
        self.inner.driver.dispatch(request).await
    }
}

/// A named database on an open client.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    name: String,
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the collection explicitly. Fails with a write error if it exists.
    pub async fn create_collection(&self, name: &str) -> Result<Collection> {
        let collection = self.collection(name)?;
        let ns = collection.namespace().clone();
        expect_done(self.client.dispatch(Request::CreateCollection { ns }).await?)?;
        Ok(collection)
    }

    pub async fn list_collection_names(&self) -> Result<Vec<String>> {
        let request = Request::ListCollections {
            database: self.name.clone(),
        };
        expect_names(self.client.dispatch(request).await?)
    }

    /// Handle to the collection `name`. The store creates it on first write.
    pub fn collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        Ok(Collection::new(
            self.client.clone(),
            Namespace::new(&self.name, name),
        ))
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TomeError::Validation("database name cannot be empty".into()));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$')) {
        return Err(TomeError::Validation(format!(
            "database name '{}' contains invalid character {:?}",
            name, c
        )));
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TomeError::Validation("collection name cannot be empty".into()));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(TomeError::Validation(format!(
            "collection name '{}' contains '$' or a null character",
            name.escape_debug()
        )));
    }
    Ok(())
}
