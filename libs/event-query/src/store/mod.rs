//! Storage backends for the read side.

mod memory;
pub mod postgres;

pub use memory::{Fixture, MemoryEventStore};
pub use postgres::PgEventStore;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::filter::PredicateKind;
use crate::models::{EventRow, Keyword, KeywordId, Location, LocationId};
use crate::planner::StorageQuery;
use crate::Result;

/// What a backend can evaluate natively, and which fields it indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCapabilities {
    native: BTreeSet<PredicateKind>,
    indexed: BTreeSet<PredicateKind>,
}

impl StorageCapabilities {
    /// Every predicate kind native and indexed.
    pub fn all() -> Self {
        Self {
            native: PredicateKind::ALL.into_iter().collect(),
            indexed: PredicateKind::ALL.into_iter().collect(),
        }
    }

    pub fn without_native(mut self, kind: PredicateKind) -> Self {
        self.native.remove(&kind);
        self
    }

    /// Restrict the indexed set to `kinds`.
    pub fn with_indexed(mut self, kinds: &[PredicateKind]) -> Self {
        self.indexed = kinds.iter().copied().collect();
        self
    }

    pub fn supports(&self, kind: PredicateKind) -> bool {
        self.native.contains(&kind)
    }

    pub fn is_indexed(&self, kind: PredicateKind) -> bool {
        self.indexed.contains(&kind)
    }
}

/// Read access to the event catalogue.
///
/// Implementations never retry; failures surface as
/// [`Error::StorageUnavailable`](crate::Error::StorageUnavailable).
#[async_trait]
pub trait EventStore: Send + Sync {
    fn capabilities(&self) -> StorageCapabilities;

    /// Rows matching every clause, in `query.sort` order, windowed when
    /// `query.window` is set.
    async fn fetch_events(&self, query: &StorageQuery) -> Result<Vec<EventRow>>;

    /// Number of rows matching every clause, ignoring the window.
    async fn count_events(&self, query: &StorageQuery) -> Result<usize>;

    /// Bulk lookup; unknown ids are omitted.
    async fn fetch_keywords(&self, ids: &[KeywordId]) -> Result<Vec<Keyword>>;

    /// Bulk lookup; unknown ids are omitted.
    async fn fetch_locations(&self, ids: &[LocationId]) -> Result<Vec<Location>>;
}
