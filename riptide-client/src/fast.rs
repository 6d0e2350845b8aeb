//! The fast round: optimistic leaderless broadcast.
//!
//! The command is proposed to every member of the current view at once.
//! Each member records it if it conflicts with nothing in flight; the
//! leader additionally executes it speculatively and returns the payload.
//! Once a super quorum has acknowledged *and* the leader's payload is in
//! hand, the result is trustworthy without waiting for the sync — any
//! future recovery is guaranteed to observe the command.
//!
//! Responses are aggregated in arrival order by a single task fed over a
//! channel, so the algorithm is commutative by construction: network
//! completion order never changes the outcome.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cluster::ClusterView;
use crate::error::{self, ClientError, CurpError};
use crate::quorum;
use crate::types::{CmdResult, Command, ProposeId, ProposeRequest, ProposeResponse};

/// Broadcast `command` to every member and wait for a super quorum.
///
/// Returns the speculative execution payload on success. Protocol errors
/// that cannot be absorbed, execution errors and invariant violations are
/// surfaced as [`ClientError`]; absorbable errors are retained under the
/// severity dominance rule and only surfaced if the round fails as a whole.
pub(crate) async fn fast_round(
    cluster: &ClusterView,
    propose_id: ProposeId,
    command: &Command,
    rpc_timeout: Duration,
) -> Result<Vec<u8>, ClientError> {
    let members = cluster.member_apis();
    let contacted = members.len();
    if contacted == 0 {
        return Err(ClientError::Invariant(
            "cluster view holds no members".into(),
        ));
    }
    let super_quorum = quorum::super_quorum(contacted);
    let cluster_version = cluster.cluster_version();
    debug!(
        %propose_id,
        members = contacted,
        super_quorum,
        "fast round start"
    );

    let (reply_tx, mut reply_rx) = mpsc::channel(contacted);
    for (member_id, api) in members {
        let request = ProposeRequest {
            propose_id,
            command: command.clone(),
            cluster_version,
        };
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(rpc_timeout, api.propose(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(CurpError::RpcTransport(format!(
                    "propose to member {member_id} timed out"
                ))),
            };
            // The aggregator may have settled the round and dropped the
            // receiver; the late result is simply discarded.
            let _ = reply_tx.send((member_id, outcome)).await;
        });
    }
    drop(reply_tx);

    let mut ok_count = 0usize;
    let mut answered = 0usize;
    let mut exe_result: Option<Vec<u8>> = None;
    let mut retained: Option<CurpError> = None;

    while let Some((member_id, outcome)) = reply_rx.recv().await {
        answered += 1;
        match outcome {
            Ok(ProposeResponse {
                result: Some(CmdResult::Err(error)),
            }) => {
                // The state machine itself rejected the command; definitive.
                debug!(%propose_id, member_id, "command rejected in fast round");
                return Err(ClientError::Execution(error));
            }
            Ok(ProposeResponse {
                result: Some(CmdResult::Ok(payload)),
            }) => {
                match &exe_result {
                    Some(existing) if *existing != payload => {
                        return Err(ClientError::Invariant(format!(
                            "two distinct execution results for {propose_id}"
                        )));
                    }
                    _ => exe_result = Some(payload),
                }
                ok_count += 1;
            }
            Ok(ProposeResponse { result: None }) => {
                ok_count += 1;
            }
            Err(error) if error.should_abort_fast_round() => {
                warn!(%propose_id, member_id, %error, "fast round aborted");
                return Err(ClientError::Curp(error));
            }
            Err(error) => {
                debug!(%propose_id, member_id, %error, "fast round member failed");
                error::retain(&mut retained, error);
            }
        }

        if ok_count >= super_quorum {
            if let Some(payload) = exe_result.take() {
                debug!(%propose_id, ok_count, "fast round reached super quorum");
                return Ok(payload);
            }
        }

        // Liveness: once the members still pending cannot close the gap to
        // the super quorum, stop waiting for them.
        let pending = contacted - answered;
        if ok_count + pending < super_quorum {
            debug!(
                %propose_id,
                ok_count,
                pending,
                "fast round can no longer reach super quorum"
            );
            break;
        }
    }

    if let Some(error) = retained {
        return Err(ClientError::Curp(error));
    }
    // Every member acknowledged, yet no speculative payload arrived: the
    // leader must produce one when no error occurred.
    Err(ClientError::Invariant(format!(
        "fast round for {propose_id} ended without a result or an error"
    )))
}
