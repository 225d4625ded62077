//! Search index writer boundary.
//!
//! Each core owns one writer. Trackers push node metadata and content into it
//! and commit at the end of a successful run; the shutdown coordinator closes
//! it when the core is torn down. Implementations must tolerate `close` being
//! called more than once and concurrently with a late `commit` from an
//! in-flight tracker run.

use crate::repository::NodeRecord;
use anyhow::Result;

/// Write access to one core's search index.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait IndexWriter: Send + Sync {
    /// Add or replace the given nodes' metadata documents.
    fn index_nodes(&self, nodes: &[NodeRecord]) -> Result<()>;

    /// Remove the documents for the given node ids.
    fn delete_nodes(&self, node_ids: &[u64]) -> Result<()>;

    /// Replace the indexed text content of one node.
    fn update_content(&self, node_id: u64, text: &str) -> Result<()>;

    /// Make all changes since the previous commit visible to searches.
    fn commit(&self) -> Result<()>;

    /// Flush pending changes and release the underlying writer resources.
    fn close(&self) -> Result<()>;
}

/// A writer that discards everything. For tests and dry wiring.
pub struct NullIndexWriter;

impl IndexWriter for NullIndexWriter {
    fn index_nodes(&self, _nodes: &[NodeRecord]) -> Result<()> {
        Ok(())
    }

    fn delete_nodes(&self, _node_ids: &[u64]) -> Result<()> {
        Ok(())
    }

    fn update_content(&self, _node_id: u64, _text: &str) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
