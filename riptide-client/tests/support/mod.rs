//! In-memory cluster harness for end-to-end propose tests.
//!
//! A [`TestCluster`] stands in for a full Riptide deployment: every node is
//! a scripted [`ProtocolApi`] implementation and the connector resolves the
//! conventional `node-{id}:2379` endpoints against them. Tests stage
//! per-node behavior, build a real client through the public API and assert
//! on the recorded traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use riptide_client::{
    ClientOptions, ClusterMember, CmdResult, CurpError, FetchClusterRequest, FetchClusterResponse,
    NodeConnector, ProposeId, ProposeRequest, ProposeResponse, ProtocolApi, RiptideClient,
    WaitSyncedRequest, WaitSyncedResponse,
};

/// One staged behavior for an RPC.
#[derive(Clone)]
pub enum Step<T> {
    /// Answer with this value.
    Reply(T),
    /// Answer with this protocol error.
    Fail(CurpError),
    /// Never answer; the client's timeout decides.
    Silent,
}

struct Steps<T> {
    scripted: Mutex<VecDeque<Step<T>>>,
    fallback: Mutex<Option<Step<T>>>,
}

impl<T: Clone> Steps<T> {
    fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
        }
    }

    fn stage(&self, step: Step<T>) {
        self.scripted.lock().unwrap().push_back(step);
    }

    fn set_fallback(&self, step: Step<T>) {
        *self.fallback.lock().unwrap() = Some(step);
    }

    async fn run(&self, what: &str) -> Result<T, CurpError> {
        let step = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone());
        match step {
            Some(Step::Reply(value)) => Ok(value),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Silent) => std::future::pending().await,
            None => Err(CurpError::Internal(format!("unscripted {what} call"))),
        }
    }
}

/// A scripted cluster node.
pub struct TestNode {
    /// This node's id, as reported in cluster layouts.
    pub id: u64,
    propose: Steps<ProposeResponse>,
    wait_synced: Steps<WaitSyncedResponse>,
    fetch: Steps<FetchClusterResponse>,
    proposed: Mutex<Vec<ProposeId>>,
    synced: Mutex<Vec<ProposeId>>,
    fetches: AtomicUsize,
}

impl TestNode {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            propose: Steps::new(),
            wait_synced: Steps::new(),
            fetch: Steps::new(),
            proposed: Mutex::new(Vec::new()),
            synced: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    /// Stage a speculative execution payload for the next propose.
    pub fn propose_ok(&self, payload: &[u8]) {
        self.propose.stage(Step::Reply(ProposeResponse {
            result: Some(CmdResult::Ok(payload.to_vec())),
        }));
    }

    /// Stage a follower acknowledgement (no payload) for the next propose.
    pub fn propose_ack(&self) {
        self.propose.stage(Step::Reply(ProposeResponse { result: None }));
    }

    /// Stage a command-execution rejection for the next propose.
    pub fn propose_exec_err(&self, error: &[u8]) {
        self.propose.stage(Step::Reply(ProposeResponse {
            result: Some(CmdResult::Err(error.to_vec())),
        }));
    }

    /// Stage a protocol error for the next propose.
    pub fn propose_fail(&self, error: CurpError) {
        self.propose.stage(Step::Fail(error));
    }

    /// Make the next propose hang until the client gives up on it.
    pub fn propose_silent(&self) {
        self.propose.stage(Step::Silent);
    }

    /// Stage a successful sync response.
    pub fn sync_ok(&self, exe: &[u8], after_sync: &[u8]) {
        self.wait_synced.stage(Step::Reply(WaitSyncedResponse {
            exe_result: CmdResult::Ok(exe.to_vec()),
            after_sync_result: CmdResult::Ok(after_sync.to_vec()),
        }));
    }

    /// Stage a protocol error for the next wait_synced.
    pub fn sync_fail(&self, error: CurpError) {
        self.wait_synced.stage(Step::Fail(error));
    }

    /// Make wait_synced hang for every request from now on.
    pub fn sync_silent_forever(&self) {
        self.wait_synced.set_fallback(Step::Silent);
    }

    /// Stage a one-off cluster layout answer ahead of the fallback.
    pub fn fetch_reply(&self, response: FetchClusterResponse) {
        self.fetch.stage(Step::Reply(response));
    }

    fn set_fetch_fallback(&self, response: FetchClusterResponse) {
        self.fetch.set_fallback(Step::Reply(response));
    }

    /// Propose ids this node received, in arrival order.
    pub fn proposed_ids(&self) -> Vec<ProposeId> {
        self.proposed.lock().unwrap().clone()
    }

    /// Propose ids this node was asked to sync, in arrival order.
    pub fn synced_ids(&self) -> Vec<ProposeId> {
        self.synced.lock().unwrap().clone()
    }

    /// Number of fetch_cluster calls served by this node.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolApi for TestNode {
    async fn propose(&self, request: ProposeRequest) -> Result<ProposeResponse, CurpError> {
        self.proposed.lock().unwrap().push(request.propose_id);
        self.propose.run("propose").await
    }

    async fn wait_synced(
        &self,
        request: WaitSyncedRequest,
    ) -> Result<WaitSyncedResponse, CurpError> {
        self.synced.lock().unwrap().push(request.propose_id);
        self.wait_synced.run("wait_synced").await
    }

    async fn fetch_cluster(
        &self,
        _request: FetchClusterRequest,
    ) -> Result<FetchClusterResponse, CurpError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch.run("fetch_cluster").await
    }
}

struct TestConnector {
    nodes: Mutex<HashMap<String, Arc<TestNode>>>,
}

impl NodeConnector for TestConnector {
    fn connect(&self, endpoints: &[String]) -> Arc<dyn ProtocolApi> {
        let nodes = self.nodes.lock().unwrap();
        endpoints
            .iter()
            .find_map(|endpoint| nodes.get(endpoint).cloned())
            .map(|node| node as Arc<dyn ProtocolApi>)
            .unwrap_or_else(|| Arc::new(DeadEnd))
    }
}

/// Endpoint with no node behind it; behaves like a refused connection.
struct DeadEnd;

#[async_trait]
impl ProtocolApi for DeadEnd {
    async fn propose(&self, _request: ProposeRequest) -> Result<ProposeResponse, CurpError> {
        Err(CurpError::RpcTransport("connection refused".into()))
    }

    async fn wait_synced(
        &self,
        _request: WaitSyncedRequest,
    ) -> Result<WaitSyncedResponse, CurpError> {
        Err(CurpError::RpcTransport("connection refused".into()))
    }

    async fn fetch_cluster(
        &self,
        _request: FetchClusterRequest,
    ) -> Result<FetchClusterResponse, CurpError> {
        Err(CurpError::RpcTransport("connection refused".into()))
    }
}

/// A scripted cluster of `size` nodes, with node 1 leading at term 1,
/// cluster version 1.
pub struct TestCluster {
    connector: Arc<TestConnector>,
    nodes: Vec<Arc<TestNode>>,
}

impl TestCluster {
    /// Build a cluster of `size` nodes and point every node's layout
    /// answer at node 1 as leader.
    pub fn new(size: u64) -> Self {
        let nodes: Vec<Arc<TestNode>> = (1..=size).map(TestNode::new).collect();
        let mut table = HashMap::new();
        for node in &nodes {
            table.insert(endpoint(node.id), Arc::clone(node));
        }
        let cluster = Self {
            connector: Arc::new(TestConnector {
                nodes: Mutex::new(table),
            }),
            nodes,
        };
        cluster.set_layout(1, 1, 1);
        cluster
    }

    /// Point every node's layout answer at `leader_id` for `term` /
    /// `cluster_version`, keeping the full member list.
    pub fn set_layout(&self, leader_id: u64, term: u64, cluster_version: u64) {
        let response = self.layout(Some(leader_id), term, cluster_version);
        for node in &self.nodes {
            node.set_fetch_fallback(response.clone());
        }
    }

    /// The layout response for the current member set.
    pub fn layout(
        &self,
        leader_id: Option<u64>,
        term: u64,
        cluster_version: u64,
    ) -> FetchClusterResponse {
        FetchClusterResponse {
            leader_id,
            term,
            cluster_version,
            members: self
                .nodes
                .iter()
                .map(|node| ClusterMember::new(node.id, vec![endpoint(node.id)]))
                .collect(),
        }
    }

    /// Node by id; panics when absent.
    pub fn node(&self, id: u64) -> &Arc<TestNode> {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .unwrap_or_else(|| panic!("no node {id} in the test cluster"))
    }

    /// fetch_cluster calls served across all nodes.
    pub fn total_fetches(&self) -> usize {
        self.nodes.iter().map(|node| node.fetch_count()).sum()
    }

    /// Connect a client with test-sized timeouts.
    pub async fn client(&self) -> RiptideClient {
        let options = ClientOptions::builder()
            .seed_endpoints(self.nodes.iter().map(|node| endpoint(node.id)))
            .rpc_timeout(Duration::from_millis(200))
            .retry_interval(Duration::from_millis(5))
            .build()
            .expect("test options are valid");
        RiptideClient::connect(Arc::clone(&self.connector) as Arc<dyn NodeConnector>, options)
            .await
    }
}

/// Conventional endpoint for a node id.
pub fn endpoint(id: u64) -> String {
    format!("node-{id}:2379")
}
