//! # Riptide Client: CURP Consensus Engine
//!
//! This crate implements the client side of the CURP consensus protocol
//! for the Riptide replicated key-value store. CURP pairs a coordinated,
//! leader-driven round with an optimistic leaderless round, cutting median
//! commit latency to one round trip when commands do not conflict.
//!
//! ## Raft Comparison
//!
//! If you're familiar with Raft clients, here's how the concepts map:
//!
//! | CURP Concept | Raft Equivalent | Notes |
//! |---|---|---|
//! | **Fast round** | *(no equivalent)* | Broadcast to all members, trust on super quorum |
//! | **Slow round** | Leader request | Waits for durable ordering; always authoritative |
//! | **Super quorum** | Majority quorum | Strictly more than a majority |
//! | **Term** | Term | Monotonic epoch; stale leader claims are discarded |
//! | **Cluster version** | Membership config index | Bumped on every membership change |
//! | **Propose id** | Client request id | `(client_id, seq_num)`, deduplicated server-side |
//!
//! The hard part is entirely client-side: racing the two rounds across an
//! unreliable cluster, interpreting partial and conflicting responses,
//! keeping a membership view that may be stale or wrong, and classifying
//! protocol errors into retry/abort decisions without ever returning an
//! untrustworthy result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     RiptideClient                        │
//! │   Races the rounds, retries on stale views, classifies   │
//! └──────────┬──────────────────────────────┬────────────────┘
//!            │ broadcast propose            │ wait_synced
//!            ▼                              ▼
//! ┌───────────────────────┐     ┌───────────────────────────┐
//! │      Fast round       │     │       Slow round          │
//! │  every member, super  │     │  current leader, durable  │
//! │  quorum to trust      │     │  and authoritative        │
//! └──────────┬────────────┘     └──────────┬────────────────┘
//!            │            read / refresh   │
//!            ▼                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ClusterView                         │
//! │   leader, term, cluster version, member connections      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `ProposeId`, `Command`, wire messages |
//! | [`error`] | `CurpError` classification, `ClientError` |
//! | [`quorum`] | Quorum, fault tolerance and super-quorum arithmetic |
//! | [`session`] | Client identity and propose-id generation |
//! | [`transport`] | `ProtocolApi` / `NodeConnector` seams to the RPC layer |
//! | [`cluster`] | Shared membership/leadership view with monotone updates |
//! | [`config`] | `ClientOptions` and its builder |
//! | [`client`] | `RiptideClient`, the propose orchestrator |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod quorum;
pub mod session;
pub mod transport;
pub mod types;

mod fast;
mod slow;


// Re-export key types at crate root for convenience
pub use client::{ProposeResult, RiptideClient};
pub use cluster::ClusterView;
pub use config::{ClientOptions, ClientOptionsBuilder, ConfigError};
pub use error::{ClientError, CurpError, Severity};
pub use session::ClientSession;
pub use transport::{NodeConnector, ProtocolApi};
pub use types::{
    ClusterMember, ClusterStateSummary, CmdResult, Command, FetchClusterRequest,
    FetchClusterResponse, KeyRange, ProposeId, ProposeRequest, ProposeResponse, WaitSyncedRequest,
    WaitSyncedResponse,
};
