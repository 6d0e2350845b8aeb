//! Transport traits connecting the engine to the RPC layer.
//!
//! The engine never opens sockets itself. It talks to each cluster node
//! through a [`ProtocolApi`] handle and obtains those handles from a
//! [`NodeConnector`]. Channel setup, TLS, load balancing across a node's
//! addresses and the wire encoding of messages all live behind these two
//! traits, outside this crate.
//!
//! In production the connector wraps a gRPC channel builder; in tests it
//! hands out scripted in-memory nodes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CurpError;
use crate::types::{
    FetchClusterRequest, FetchClusterResponse, ProposeRequest, ProposeResponse, WaitSyncedRequest,
    WaitSyncedResponse,
};

/// RPC surface of a single cluster node.
///
/// Implementations must map transport-level failures (connection refused,
/// broken stream, missing error detail) to [`CurpError::RpcTransport`] so
/// the rounds can classify every failure uniformly. Calls may run
/// concurrently on one handle.
#[async_trait]
pub trait ProtocolApi: Send + Sync {
    /// Fast-path propose: ask this node to record (and, on the leader,
    /// speculatively execute) the command.
    async fn propose(&self, request: ProposeRequest) -> Result<ProposeResponse, CurpError>;

    /// Slow-path request: wait until the leader has durably synced the
    /// propose and return the authoritative results.
    async fn wait_synced(&self, request: WaitSyncedRequest)
        -> Result<WaitSyncedResponse, CurpError>;

    /// Fetch the cluster layout as this node sees it. Must tolerate being
    /// called on a non-leader or a node holding a stale view.
    async fn fetch_cluster(
        &self,
        request: FetchClusterRequest,
    ) -> Result<FetchClusterResponse, CurpError>;
}

/// Factory building [`ProtocolApi`] handles from node addresses.
///
/// Connecting is lazy and therefore infallible: a handle is always
/// returned, and an unreachable node surfaces as
/// [`CurpError::RpcTransport`] on its first RPC. This keeps membership
/// swaps in the cluster view all-or-nothing — building the new table can
/// never fail halfway through.
pub trait NodeConnector: Send + Sync {
    /// Build a handle that reaches a node at any of `endpoints`.
    fn connect(&self, endpoints: &[String]) -> Arc<dyn ProtocolApi>;
}
