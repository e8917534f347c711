use crate::config::ConnectionUri;
use crate::error::Result;
use crate::network::protocol::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// An open session with a document store. Requests are dispatched one at a time
/// and each reply is awaited before the next request is sent.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn dispatch(&self, request: Request) -> Result<Response>;

    /// Releases the session. Called once per successful connect.
    async fn disconnect(&self) -> Result<()>;
}

/// Establishes driver sessions for a connection URI.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, uri: &ConnectionUri) -> Result<Arc<dyn Driver>>;
}
