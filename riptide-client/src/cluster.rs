//! Client-side view of cluster membership and leadership.
//!
//! [`ClusterView`] is the single piece of shared mutable state in the
//! engine. Every round executor reads it to route requests; it is written
//! only when a `fetch_cluster` response is applied. Reads and writes go
//! through a readers-writer lock around one owned structure, so a reader
//! never observes a half-updated member table.
//!
//! ## Monotonicity
//!
//! Responses can arrive from stale nodes in any order, so [`ClusterView::apply`]
//! enforces:
//!
//! - a response with a smaller term than the current one is discarded;
//! - the leader is only overwritten when the incoming term is strictly
//!   greater (a leader claim from an equal or older term is stale);
//! - the cluster version is only overwritten, and member connections only
//!   rebuilt, when the incoming version is strictly greater. The member
//!   table is swapped wholesale; in-flight RPCs on replaced connections are
//!   left to fail naturally.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::config::ClientOptions;
use crate::error::CurpError;
use crate::transport::{NodeConnector, ProtocolApi};
use crate::types::{ClusterMember, ClusterStateSummary, FetchClusterRequest, FetchClusterResponse};

/// A member together with its live connection.
#[derive(Clone)]
struct MemberHandle {
    member: ClusterMember,
    api: Arc<dyn ProtocolApi>,
}

struct ViewInner {
    leader_id: u64,
    term: u64,
    cluster_version: u64,
    members: HashMap<u64, MemberHandle>,
}

/// Shared, concurrently-readable snapshot of the cluster.
///
/// Created once at client startup by [`ClusterView::bootstrap`] and mutated
/// in place for the life of the client.
pub struct ClusterView {
    connector: Arc<dyn NodeConnector>,
    options: ClientOptions,
    inner: RwLock<ViewInner>,
}

impl ClusterView {
    /// Discover the cluster from the seed endpoints.
    ///
    /// Round-robins `fetch_cluster` over the seeds until a response carrying
    /// a leader id is obtained; the client is not usable before that. The
    /// loop has no ceiling of its own — callers bound it with their deadline
    /// or cancellation.
    pub async fn bootstrap(connector: Arc<dyn NodeConnector>, options: ClientOptions) -> Self {
        let request = FetchClusterRequest {
            linearizable: false,
        };
        let mut seeds = options.seed_endpoints().iter().cycle();
        let response = loop {
            // seed_endpoints is validated non-empty at options build time
            let Some(seed) = seeds.next() else {
                unreachable!("options guarantee at least one seed endpoint");
            };
            let api = connector.connect(std::slice::from_ref(seed));
            match tokio::time::timeout(options.rpc_timeout(), api.fetch_cluster(request)).await {
                Ok(Ok(response)) if response.leader_id.is_some() => break response,
                Ok(Ok(_)) => debug!(%seed, "cluster has no leader yet, retrying"),
                Ok(Err(error)) => debug!(%seed, %error, "seed fetch failed, retrying"),
                Err(_) => debug!(%seed, "seed fetch timed out, retrying"),
            }
            tokio::time::sleep(options.retry_interval()).await;
        };

        let members = build_members(&connector, &response.members);
        let leader_id = response.leader_id.unwrap_or_default();
        info!(
            leader_id,
            term = response.term,
            cluster_version = response.cluster_version,
            members = members.len(),
            "cluster discovered"
        );
        Self {
            connector,
            options,
            inner: RwLock::new(ViewInner {
                leader_id,
                term: response.term,
                cluster_version: response.cluster_version,
                members,
            }),
        }
    }

    /// Current `{leader_id, term, cluster_version}`, for diagnostics.
    pub fn state(&self) -> ClusterStateSummary {
        let inner = self.read();
        ClusterStateSummary {
            leader_id: inner.leader_id,
            term: inner.term,
            cluster_version: inner.cluster_version,
        }
    }

    /// The cluster version the member table was built at.
    pub fn cluster_version(&self) -> u64 {
        self.read().cluster_version
    }

    /// Connections to every known member, for a fast-round broadcast.
    pub fn member_apis(&self) -> Vec<(u64, Arc<dyn ProtocolApi>)> {
        self.read()
            .members
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(&handle.api)))
            .collect()
    }

    /// Connection to the current leader.
    ///
    /// `None` when the leader id is not in the current membership — a
    /// normal transient state right after a leadership or membership
    /// change, resolved by a refresh.
    pub fn leader_api(&self) -> Option<Arc<dyn ProtocolApi>> {
        let inner = self.read();
        inner
            .members
            .get(&inner.leader_id)
            .map(|handle| Arc::clone(&handle.api))
    }

    /// Apply a fetched cluster response under the monotonicity rules.
    ///
    /// A no-op for stale responses; idempotent under replay of the same
    /// response.
    pub fn apply(&self, response: &FetchClusterResponse) {
        let mut inner = self.write();
        if response.term < inner.term {
            return;
        }
        if let Some(leader_id) = response.leader_id {
            if response.term > inner.term {
                inner.term = response.term;
                inner.leader_id = leader_id;
                info!(leader_id, term = inner.term, "leader updated");
            }
        }
        if response.cluster_version <= inner.cluster_version {
            return;
        }
        inner.cluster_version = response.cluster_version;
        let members = build_members(&self.connector, &response.members);
        // A response with an empty member list still advances the version,
        // but the old table keeps serving rather than leaving no routes.
        if !members.is_empty() {
            info!(
                cluster_version = inner.cluster_version,
                members = members.len(),
                "membership updated"
            );
            inner.members = members;
        }
    }

    /// Refresh the view with a linearizable fetch against current members.
    ///
    /// Tries each member until one answers; the first response is applied
    /// and returned so callers can inspect what the cluster reported.
    ///
    /// # Errors
    ///
    /// Returns the last per-member error when every member failed.
    pub async fn refresh(&self) -> Result<FetchClusterResponse, CurpError> {
        let request = FetchClusterRequest {
            linearizable: true,
        };
        let mut last_error = CurpError::RpcTransport("no cluster member reachable".into());
        for (member_id, api) in self.member_apis() {
            match tokio::time::timeout(self.options.rpc_timeout(), api.fetch_cluster(request)).await
            {
                Ok(Ok(response)) => {
                    debug!(member_id, "cluster state refreshed");
                    self.apply(&response);
                    return Ok(response);
                }
                Ok(Err(error)) => {
                    warn!(member_id, %error, "cluster fetch failed");
                    last_error = error;
                }
                Err(_) => {
                    warn!(member_id, "cluster fetch timed out");
                    last_error = CurpError::RpcTransport("fetch_cluster timed out".into());
                }
            }
        }
        Err(last_error)
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_members(
    connector: &Arc<dyn NodeConnector>,
    members: &[ClusterMember],
) -> HashMap<u64, MemberHandle> {
    members
        .iter()
        .map(|member| {
            let api = connector.connect(&member.endpoints);
            (
                member.id,
                MemberHandle {
                    member: member.clone(),
                    api,
                },
            )
        })
        .collect()
}

impl std::fmt::Debug for ClusterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("ClusterView")
            .field("leader_id", &inner.leader_id)
            .field("term", &inner.term)
            .field("cluster_version", &inner.cluster_version)
            .field(
                "members",
                &inner.members.values().map(|h| &h.member).collect::<Vec<_>>(),
            )
            .finish()
    }
}
