//! Error types and protocol error classification.
//!
//! The engine distinguishes three failure families:
//!
//! - [`CurpError`]: protocol-level errors returned by servers or synthesized
//!   from transport failures. A round classifies each one into a severity
//!   and two abort predicates before deciding whether to keep waiting.
//! - Execution errors: the state machine rejected the command itself. These
//!   are carried as opaque bytes in [`ClientError::Execution`] and are never
//!   retried by the engine.
//! - Invariant violations: conditions that indicate a consistency-threatening
//!   bug (two distinct results for one propose, a fetched leader missing from
//!   its own member list). Surfaced as [`ClientError::Invariant`], never
//!   swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A protocol-level error from the CURP layer.
///
/// The set is closed: every error a server can return maps to exactly one
/// variant, and transport failures are folded into [`CurpError::RpcTransport`]
/// by the transport implementation. Variants carry no retry state — whether
/// an error aborts a round is derived by the classifier methods below, never
/// stored on the error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CurpError {
    /// The propose id was already seen by the server.
    #[error("duplicated propose")]
    Duplicated,

    /// The cluster is shutting down and will not accept the command.
    #[error("cluster is shutting down")]
    ShuttingDown,

    /// The proposed configuration change is invalid.
    #[error("invalid cluster config")]
    InvalidConfig,

    /// A node with this id already exists in the cluster.
    #[error("node already exists")]
    NodeAlreadyExists,

    /// The addressed node is not part of the cluster.
    #[error("node does not exist")]
    NodeNotExists,

    /// A learner replica has not caught up with the leader yet.
    #[error("learner has not caught up")]
    LearnerNotCaughtUp,

    /// The client id is no longer valid; the session must be re-established.
    #[error("client id expired")]
    ExpiredClientId,

    /// The contacted node is not the leader.
    #[error("redirect: leader {leader_id:?} at term {term}")]
    Redirect {
        /// The leader the responding node believes in, if any.
        leader_id: Option<u64>,
        /// The term that leader claim belongs to.
        term: u64,
    },

    /// The request never produced a response (connection refused, broken
    /// stream, deadline elapsed).
    #[error("rpc transport failure: {0}")]
    RpcTransport(String),

    /// The server hit an internal error while handling the request.
    #[error("internal server error: {0}")]
    Internal(String),

    /// The command conflicts with another in-flight command on the fast path.
    #[error("key conflict with an in-flight command")]
    KeyConflict,

    /// Leadership is being handed over; the command was not accepted.
    #[error("leader transfer in progress")]
    LeaderTransfer,

    /// The request was built against a stale membership view.
    #[error("wrong cluster version")]
    WrongClusterVersion,
}

/// How strongly an error should be preferred when only one can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Transient or absorbable: the round may still succeed via other members.
    Low,

    /// Terminal for the round that observed it.
    High,
}

impl CurpError {
    /// Severity of this error, or `None` for [`CurpError::WrongClusterVersion`],
    /// which sits outside both buckets: it always short-circuits into a
    /// cluster-state refresh instead of competing with other errors.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            CurpError::Duplicated
            | CurpError::ShuttingDown
            | CurpError::InvalidConfig
            | CurpError::NodeAlreadyExists
            | CurpError::NodeNotExists
            | CurpError::LearnerNotCaughtUp
            | CurpError::ExpiredClientId
            | CurpError::Redirect { .. } => Some(Severity::High),
            CurpError::RpcTransport(_)
            | CurpError::Internal(_)
            | CurpError::KeyConflict
            | CurpError::LeaderTransfer => Some(Severity::Low),
            CurpError::WrongClusterVersion => None,
        }
    }

    /// Whether the fast round can no longer succeed after this error.
    ///
    /// True exactly for the high-severity variants: once one is observed the
    /// broadcast is abandoned and the error surfaces to the orchestrator.
    pub fn should_abort_fast_round(&self) -> bool {
        matches!(self.severity(), Some(Severity::High))
    }

    /// Whether the slow round can no longer succeed after this error.
    ///
    /// True for every high-severity variant plus
    /// [`CurpError::WrongClusterVersion`], which demands a membership refresh
    /// before the same propose is sent again.
    pub fn should_abort_slow_round(&self) -> bool {
        self.should_abort_fast_round() || matches!(self, CurpError::WrongClusterVersion)
    }
}

/// Keep the strongest error observed so far in `slot`.
///
/// High severity dominates low; among equal severity the most recent wins.
/// `WrongClusterVersion` ranks with low severity here — high-severity errors
/// abort a round before retention ever compares against it, and a retained
/// `WrongClusterVersion` is exactly what routes the orchestrator into a
/// refresh-and-retry.
pub(crate) fn retain(slot: &mut Option<CurpError>, candidate: CurpError) {
    let candidate_rank = candidate.severity().unwrap_or(Severity::Low);
    match slot {
        Some(current) if current.severity().unwrap_or(Severity::Low) > candidate_rank => {}
        _ => *slot = Some(candidate),
    }
}

/// Terminal outcome of a propose, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A protocol error that neither round could absorb.
    #[error(transparent)]
    Curp(#[from] CurpError),

    /// The state machine rejected the command. The payload is the
    /// server-encoded error detail, returned untransformed.
    #[error("command rejected by the state machine")]
    Execution(Vec<u8>),

    /// A protocol invariant was violated; this indicates a bug in the
    /// client or the cluster, not an expected runtime condition.
    #[error("protocol invariant violated: {0}")]
    Invariant(String),
}
