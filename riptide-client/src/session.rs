//! Client session identity and propose-id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ProposeId;

/// Identity of one client process, issuing propose ids.
///
/// The `client_id` is drawn once from a high-entropy source at construction
/// and identifies this process to the cluster for the session lifetime. The
/// sequence counter increases by one per propose and never repeats, since
/// the servers deduplicate on `(client_id, seq_num)`.
#[derive(Debug)]
pub struct ClientSession {
    client_id: u64,
    next_seq: AtomicU64,
}

impl ClientSession {
    /// Create a session with a random client id.
    pub fn new() -> Self {
        Self::with_client_id(rand::random())
    }

    /// Create a session with a fixed client id.
    ///
    /// Intended for tests and for callers that negotiate an id with the
    /// cluster out of band.
    pub fn with_client_id(client_id: u64) -> Self {
        Self {
            client_id,
            next_seq: AtomicU64::new(0),
        }
    }

    /// The id identifying this client process.
    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Issue the next propose id.
    ///
    /// Ids from one session are unique and their sequence numbers strictly
    /// increase; the same id is never handed out twice.
    pub fn next_id(&self) -> ProposeId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        ProposeId::new(self.client_id, seq)
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
