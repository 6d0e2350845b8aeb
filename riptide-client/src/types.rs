//! Core types for the CURP client protocol.
//!
//! This module defines the fundamental building blocks used throughout
//! the client engine:
//!
//! - [`ProposeId`]: Process-unique identifier correlating one command across rounds and retries
//! - [`Command`]: Opaque command payload plus the key ranges it touches
//! - [`ClusterMember`]: One cluster node and its reachable addresses
//! - [`CmdResult`]: Execution outcome of a command on the state machine
//! - Wire messages: [`ProposeRequest`], [`WaitSyncedRequest`], [`FetchClusterRequest`]
//!   and their responses

use serde::{Deserialize, Serialize};

/// Identifier for one command invocation.
///
/// A `ProposeId` is created once per propose call and is never reused. The
/// server keys its exactly-once deduplication on `(client_id, seq_num)`, so
/// the same id MUST be resent verbatim when a propose is retried — a replay
/// of a known id is a no-op server-side and returns the prior result.
///
/// # Invariants
///
/// - `client_id` identifies this client process for the session lifetime.
/// - `seq_num` never repeats for the same `client_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposeId {
    /// Identifier of the proposing client process.
    pub client_id: u64,

    /// Per-client sequence number, strictly increasing across proposes.
    pub seq_num: u64,
}

impl ProposeId {
    /// Create a new propose id.
    pub const fn new(client_id: u64, seq_num: u64) -> Self {
        Self { client_id, seq_num }
    }
}

impl std::fmt::Display for ProposeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prop({:x}, {})", self.client_id, self.seq_num)
    }
}

/// A contiguous range of keys touched by a command.
///
/// The client never interprets key ranges; they are forwarded so the
/// servers can detect conflicting in-flight commands on the fast path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    /// Inclusive start of the range.
    pub start: Vec<u8>,

    /// Exclusive end of the range. An empty end means a single-key range.
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Create a new key range.
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Create a range covering a single key.
    pub fn single(key: impl Into<Vec<u8>>) -> Self {
        Self {
            start: key.into(),
            end: Vec::new(),
        }
    }
}

/// A command submitted to the replicated state machine.
///
/// The payload is opaque to the client engine; it is broadcast as-is and
/// interpreted only by the servers. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Key ranges this command touches, used server-side for conflict
    /// detection during the fast path.
    pub keys: Vec<KeyRange>,

    /// The serialized command body.
    pub payload: Vec<u8>,
}

impl Command {
    /// Create a new command.
    pub fn new(keys: Vec<KeyRange>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            keys,
            payload: payload.into(),
        }
    }
}

/// One cluster node and its reachable addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Server-assigned node id, stable across address changes.
    pub id: u64,

    /// Addresses this node can be reached at.
    pub endpoints: Vec<String>,
}

impl ClusterMember {
    /// Create a new cluster member.
    pub fn new(id: u64, endpoints: Vec<String>) -> Self {
        Self { id, endpoints }
    }
}

/// Execution outcome of a command on the state machine.
///
/// Both sides carry opaque bytes: the success payload and the error payload
/// are encoded by the server's state machine and decoded by the layer above
/// this engine. An `Err` here is a *command* rejection (e.g. a failed
/// transaction compare), not a protocol failure, and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdResult {
    /// The command executed successfully.
    Ok(Vec<u8>),

    /// The state machine rejected the command.
    Err(Vec<u8>),
}

/// Fast-path propose request, broadcast to every cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeRequest {
    /// Id correlating this command across rounds and retries.
    pub propose_id: ProposeId,

    /// The command to replicate.
    pub command: Command,

    /// The cluster version this request was routed under. Servers reject
    /// requests built against a stale membership view.
    pub cluster_version: u64,
}

/// Fast-path propose response from a single member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeResponse {
    /// Speculative execution result.
    ///
    /// Only the leader executes speculatively and returns a payload;
    /// followers acknowledge with `None` once the command is recorded
    /// as conflict-free.
    pub result: Option<CmdResult>,
}

/// Slow-path request: wait until the command is synced by the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSyncedRequest {
    /// Id of the propose to wait for.
    pub propose_id: ProposeId,

    /// The cluster version this request was routed under.
    pub cluster_version: u64,
}

/// Slow-path response carrying the authoritative outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSyncedResponse {
    /// Execution result of the command.
    pub exe_result: CmdResult,

    /// After-sync result, produced once the command is durably ordered.
    /// Metadata assigned at durable-commit time (e.g. the revision)
    /// supersedes anything speculative from the fast path.
    pub after_sync_result: CmdResult,
}

/// Request for the current cluster layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchClusterRequest {
    /// When true, the responding node must confirm its view through the
    /// leader instead of answering from possibly-stale local state.
    pub linearizable: bool,
}

/// Response describing the cluster layout as one node sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchClusterResponse {
    /// Current leader, if the responding node knows one.
    pub leader_id: Option<u64>,

    /// The term the responding node observed.
    pub term: u64,

    /// Monotonic counter bumped on every membership change.
    pub cluster_version: u64,

    /// The full member list at `cluster_version`.
    pub members: Vec<ClusterMember>,
}

/// Snapshot of the client's view of the cluster, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterStateSummary {
    /// Leader id the client currently routes slow rounds to.
    pub leader_id: u64,

    /// Highest term observed.
    pub term: u64,

    /// Cluster version the member table was built at.
    pub cluster_version: u64,
}

impl std::fmt::Display for ClusterStateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "leader={} term={} cluster_version={}",
            self.leader_id, self.term, self.cluster_version
        )
    }
}
