use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pilot_core::protocol::RpcError;
use pilot_core::tx::Connection;

/// Executes JSON-RPC calls against the selected execution route (an RPC node,
/// a simulation fork, or a signer that wraps transactions for the module).
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Errors are handed to the dApp verbatim.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// The route currently selected in the panel, together with its provider.
#[derive(Clone)]
pub struct ActiveRoute {
    pub connection: Connection,
    pub provider: Arc<dyn RouteProvider>,
}

impl ActiveRoute {
    pub fn new(connection: Connection, provider: Arc<dyn RouteProvider>) -> Self {
        Self {
            connection,
            provider,
        }
    }
}

impl fmt::Debug for ActiveRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRoute")
            .field("avatar", &self.connection.avatar_address)
            .field("chain_id", &self.connection.chain_id)
            .finish_non_exhaustive()
    }
}
