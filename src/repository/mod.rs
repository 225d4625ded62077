//! Content repository client boundary.
//!
//! Trackers poll the repository through this trait to discover what changed
//! since their last run: published content models, committed transactions
//! with node metadata, and node text content updates. The crate ships no
//! network implementation; hosts plug in their own client and tests use
//! [`NullRepositoryClient`].

use anyhow::Result;
use std::collections::HashMap;

/// A content model published in the repository.
///
/// Models are compared by checksum; a differing checksum for a known name
/// means the model was republished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDiff {
    pub name: String,
    pub checksum: u64,
}

/// Metadata for a single repository node.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub id: u64,
    pub properties: HashMap<String, String>,
}

/// A committed repository transaction: the nodes it touched and deleted.
///
/// Transaction ids are strictly increasing; trackers use the highest id they
/// have processed as their polling checkpoint.
#[derive(Debug, Clone, Default)]
pub struct RepoTransaction {
    pub id: u64,
    pub updated: Vec<NodeRecord>,
    pub deleted: Vec<u64>,
}

/// A node whose text content changed, addressed by a monotonic change id.
#[derive(Debug, Clone)]
pub struct ContentChange {
    pub change_id: u64,
    pub node_id: u64,
    pub text: String,
}

/// Read access to the content repository's change feeds.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait RepositoryClient: Send + Sync {
    /// Models whose checksum differs from the caller's `known` snapshot,
    /// including models the caller has never seen.
    fn fetch_model_diffs(&self, known: &HashMap<String, u64>) -> Result<Vec<ModelDiff>>;

    /// Transactions committed after `from_txn`, oldest first, at most `limit`.
    fn fetch_transactions(&self, from_txn: u64, limit: usize) -> Result<Vec<RepoTransaction>>;

    /// Content changes recorded after `from_change`, oldest first, at most `limit`.
    fn fetch_content_changes(&self, from_change: u64, limit: usize) -> Result<Vec<ContentChange>>;
}

/// A no-op repository client that reports no changes.
///
/// Useful for wiring up the subsystem in tests or hosts that want trackers
/// scheduled but idle.
pub struct NullRepositoryClient;

impl RepositoryClient for NullRepositoryClient {
    fn fetch_model_diffs(&self, _known: &HashMap<String, u64>) -> Result<Vec<ModelDiff>> {
        Ok(Vec::new())
    }

    fn fetch_transactions(&self, _from_txn: u64, _limit: usize) -> Result<Vec<RepoTransaction>> {
        Ok(Vec::new())
    }

    fn fetch_content_changes(
        &self,
        _from_change: u64,
        _limit: usize,
    ) -> Result<Vec<ContentChange>> {
        Ok(Vec::new())
    }
}
