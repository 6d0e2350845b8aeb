//! The propose orchestrator: public entry point of the engine.
//!
//! [`RiptideClient::propose`] races the fast round against the slow round
//! and applies a fixed priority to whichever settles first:
//!
//! - a slow-round success is always authoritative and final;
//! - a fast-round success is returned immediately, with the absent
//!   after-sync payload marking it as not yet durably confirmed;
//! - an abort-worthy protocol error from either round ends the attempt;
//! - an absorbable error is retained and the other round decides.
//!
//! A stale membership view (`WrongClusterVersion`, a redirect, a leader
//! handover) is handled entirely inside the orchestrator: the cluster view
//! is refreshed once and the *identical* propose id and command are sent
//! again, so the servers deduplicate the replay. Those retries are
//! invisible to the caller except as latency, and only the caller's
//! deadline bounds them.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::cluster::ClusterView;
use crate::config::ClientOptions;
use crate::error::{self, ClientError, CurpError};
use crate::fast::fast_round;
use crate::session::ClientSession;
use crate::slow::slow_round;
use crate::transport::NodeConnector;
use crate::types::{ClusterStateSummary, Command, ProposeId};

/// Outcome of a successful propose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeResult {
    /// Payload from executing the command.
    pub exe_result: Vec<u8>,

    /// Payload produced once the command was durably ordered.
    ///
    /// `None` when the fast path won the race: the command is accepted but
    /// not yet confirmed synced, and any revision-like metadata it carries
    /// is speculative. Callers that need durable metadata propose with the
    /// fast path disabled.
    pub after_sync_result: Option<Vec<u8>>,
}

/// Client for proposing commands to a Riptide cluster.
///
/// ## Usage
///
/// ```ignore
/// let client = RiptideClient::connect(connector, options).await;
/// let result = client.propose(&command, true).await?;
/// ```
pub struct RiptideClient {
    cluster: Arc<ClusterView>,
    session: ClientSession,
    options: ClientOptions,
}

impl RiptideClient {
    /// Discover the cluster through `connector` and build a client.
    ///
    /// Blocks until a cluster response carrying a leader id is obtained;
    /// wrap the call in a timeout to bound startup.
    pub async fn connect(connector: Arc<dyn NodeConnector>, options: ClientOptions) -> Self {
        let cluster = Arc::new(ClusterView::bootstrap(connector, options.clone()).await);
        Self {
            cluster,
            session: ClientSession::new(),
            options,
        }
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Current `{leader_id, term, cluster_version}`, for diagnostics.
    pub fn cluster_state(&self) -> ClusterStateSummary {
        self.cluster.state()
    }

    /// Propose a command and wait for a trustworthy result.
    ///
    /// With `use_fast_path` the command races both rounds and may return as
    /// soon as a super quorum acknowledges it (see [`ProposeResult`]);
    /// without it, only the slow round runs and the result always carries
    /// the after-sync payload.
    ///
    /// # Errors
    ///
    /// [`ClientError::Execution`] when the state machine rejected the
    /// command (never retried here), [`ClientError::Curp`] for a terminal
    /// protocol error, [`ClientError::Invariant`] for consistency bugs.
    pub async fn propose(
        &self,
        command: &Command,
        use_fast_path: bool,
    ) -> Result<ProposeResult, ClientError> {
        // One id per call; retries below resend it verbatim so the servers
        // treat them as replays of the same command.
        let propose_id = self.session.next_id();
        loop {
            let outcome = if use_fast_path {
                self.race_rounds(propose_id, command).await
            } else {
                self.slow_only(propose_id).await
            };
            match outcome {
                Err(ClientError::Curp(error)) if needs_view_refresh(&error) => {
                    debug!(%propose_id, %error, "refreshing cluster state before retrying");
                    if matches!(error, CurpError::LeaderTransfer) {
                        // Give the handover a beat to finish.
                        tokio::time::sleep(self.options.retry_interval()).await;
                    }
                    if let Err(refresh_error) = self.cluster.refresh().await {
                        warn!(%refresh_error, "cluster refresh failed, retrying");
                        tokio::time::sleep(self.options.retry_interval()).await;
                    }
                }
                outcome => return outcome,
            }
        }
    }

    async fn slow_only(&self, propose_id: ProposeId) -> Result<ProposeResult, ClientError> {
        let (exe_result, after_sync_result) = slow_round(
            &self.cluster,
            propose_id,
            self.options.rpc_timeout(),
            self.options.retry_interval(),
        )
        .await?;
        Ok(ProposeResult {
            exe_result,
            after_sync_result: Some(after_sync_result),
        })
    }

    async fn race_rounds(
        &self,
        propose_id: ProposeId,
        command: &Command,
    ) -> Result<ProposeResult, ClientError> {
        let rpc_timeout = self.options.rpc_timeout();
        let retry_interval = self.options.retry_interval();

        let mut fast_task: JoinHandle<Result<Vec<u8>, ClientError>> = {
            let cluster = Arc::clone(&self.cluster);
            let command = command.clone();
            tokio::spawn(
                async move { fast_round(&cluster, propose_id, &command, rpc_timeout).await },
            )
        };
        let mut slow_task: JoinHandle<Result<(Vec<u8>, Vec<u8>), ClientError>> = {
            let cluster = Arc::clone(&self.cluster);
            tokio::spawn(async move {
                slow_round(&cluster, propose_id, rpc_timeout, retry_interval).await
            })
        };

        enum First {
            Fast(Result<Vec<u8>, ClientError>),
            Slow(Result<(Vec<u8>, Vec<u8>), ClientError>),
        }
        let first = tokio::select! {
            fast_joined = &mut fast_task => First::Fast(flatten(fast_joined)),
            slow_joined = &mut slow_task => First::Slow(flatten(slow_joined)),
        };

        // Aborting the loser is safe: cluster-view writes happen inside a
        // synchronous critical section that cancellation cannot interrupt,
        // and per-member propose tasks outlive the round harmlessly.
        let mut retained: Option<CurpError> = None;
        match first {
            First::Fast(Ok(exe_result)) => {
                slow_task.abort();
                debug!(%propose_id, "fast path succeeded");
                Ok(ProposeResult {
                    exe_result,
                    after_sync_result: None,
                })
            }
            First::Slow(Ok((exe_result, after_sync_result))) => {
                fast_task.abort();
                debug!(%propose_id, "slow path succeeded");
                Ok(ProposeResult {
                    exe_result,
                    after_sync_result: Some(after_sync_result),
                })
            }
            First::Fast(Err(error)) => {
                if is_terminal(&error) {
                    slow_task.abort();
                    return Err(error);
                }
                absorb(&mut retained, error);
                match flatten(slow_task.await) {
                    Ok((exe_result, after_sync_result)) => Ok(ProposeResult {
                        exe_result,
                        after_sync_result: Some(after_sync_result),
                    }),
                    Err(error) => Err(merge_final(error, &mut retained)),
                }
            }
            First::Slow(Err(error)) => {
                if is_terminal(&error) {
                    fast_task.abort();
                    return Err(error);
                }
                absorb(&mut retained, error);
                match flatten(fast_task.await) {
                    Ok(exe_result) => Ok(ProposeResult {
                        exe_result,
                        after_sync_result: None,
                    }),
                    Err(error) => Err(merge_final(error, &mut retained)),
                }
            }
        }
    }
}

/// Whether this error ends the current attempt outright.
///
/// Execution failures and invariant violations are always final; protocol
/// errors are final exactly when the slow round cannot absorb them — the
/// slow round is the authoritative one, so an error it cannot survive
/// leaves nothing to wait for.
fn is_terminal(error: &ClientError) -> bool {
    match error {
        ClientError::Curp(curp) => curp.should_abort_slow_round(),
        ClientError::Execution(_) | ClientError::Invariant(_) => true,
    }
}

/// Whether the orchestrator should refresh the view and replay the propose.
fn needs_view_refresh(error: &CurpError) -> bool {
    matches!(
        error,
        CurpError::WrongClusterVersion | CurpError::Redirect { .. } | CurpError::LeaderTransfer
    )
}

/// Retain an absorbable protocol error for later reporting.
fn absorb(retained: &mut Option<CurpError>, error: ClientError) {
    if let ClientError::Curp(curp) = error {
        error::retain(retained, curp);
    }
}

/// Decide the surfaced error once both rounds have failed.
fn merge_final(error: ClientError, retained: &mut Option<CurpError>) -> ClientError {
    match error {
        ClientError::Curp(curp) if !curp.should_abort_slow_round() => {
            error::retain(retained, curp);
            match retained.take() {
                Some(strongest) => ClientError::Curp(strongest),
                None => ClientError::Invariant("both rounds failed without an error".into()),
            }
        }
        terminal => terminal,
    }
}

fn flatten<T>(joined: Result<Result<T, ClientError>, JoinError>) -> Result<T, ClientError> {
    match joined {
        Ok(outcome) => outcome,
        // Only a panic lands here; aborted tasks are never awaited.
        Err(join_error) => Err(ClientError::Invariant(format!(
            "round task failed: {join_error}"
        ))),
    }
}
