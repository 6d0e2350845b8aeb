//! The slow round: wait for the leader to durably sync the command.
//!
//! One RPC against the current leader asks it to answer once the propose
//! has been ordered and executed after sync. The response is authoritative:
//! its after-sync metadata supersedes anything the fast path returned
//! speculatively.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cluster::ClusterView;
use crate::error::{ClientError, CurpError};
use crate::transport::ProtocolApi;
use crate::types::{CmdResult, ProposeId, WaitSyncedRequest};

/// Wait for the leader to sync `propose_id` and return
/// `(execution payload, after-sync payload)`.
///
/// Protocol errors are returned untouched; the orchestrator owns the
/// decision between refreshing and retrying or giving up.
pub(crate) async fn slow_round(
    cluster: &ClusterView,
    propose_id: ProposeId,
    rpc_timeout: Duration,
    retry_interval: Duration,
) -> Result<(Vec<u8>, Vec<u8>), ClientError> {
    debug!(%propose_id, "slow round start");
    let leader = resolve_leader(cluster, retry_interval).await?;
    let request = WaitSyncedRequest {
        propose_id,
        cluster_version: cluster.cluster_version(),
    };
    let response = match tokio::time::timeout(rpc_timeout, leader.wait_synced(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => {
            warn!(%propose_id, %error, "wait_synced failed");
            return Err(ClientError::Curp(error));
        }
        Err(_) => {
            warn!(%propose_id, "wait_synced timed out");
            return Err(ClientError::Curp(CurpError::RpcTransport(
                "wait_synced timed out".into(),
            )));
        }
    };

    // The execution error is checked before the after-sync error; either
    // one is a definitive command failure.
    let exe_payload = match response.exe_result {
        CmdResult::Ok(payload) => payload,
        CmdResult::Err(error) => {
            debug!(%propose_id, "command rejected at execution");
            return Err(ClientError::Execution(error));
        }
    };
    let after_sync_payload = match response.after_sync_result {
        CmdResult::Ok(payload) => payload,
        CmdResult::Err(error) => {
            debug!(%propose_id, "command rejected after sync");
            return Err(ClientError::Execution(error));
        }
    };
    debug!(%propose_id, "slow round synced");
    Ok((exe_payload, after_sync_payload))
}

/// Resolve a connection to the current leader, refreshing the cluster view
/// until one is known.
///
/// An unknown leader is a normal transient state, so fetch failures are
/// absorbed and retried — the loop is bounded by the caller's deadline. A
/// *successful* fetch that names a leader missing from its own member list
/// is a different matter entirely: that response is self-contradictory and
/// surfaces as an invariant violation.
async fn resolve_leader(
    cluster: &ClusterView,
    retry_interval: Duration,
) -> Result<Arc<dyn ProtocolApi>, ClientError> {
    loop {
        if let Some(api) = cluster.leader_api() {
            return Ok(api);
        }
        match cluster.refresh().await {
            Ok(response) => {
                if let Some(leader_id) = response.leader_id {
                    if !response.members.iter().any(|m| m.id == leader_id) {
                        return Err(ClientError::Invariant(format!(
                            "fetched leader {leader_id} is absent from the fetched membership"
                        )));
                    }
                } else {
                    debug!("cluster still has no leader, retrying");
                }
            }
            Err(error) => {
                warn!(%error, "cluster refresh failed while resolving the leader");
            }
        }
        if cluster.leader_api().is_none() {
            tokio::time::sleep(retry_interval).await;
        }
    }
}
