//! Search orchestration: plan, fetch, post-filter, window and serialize.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::QueryConfig;
use crate::error::Advisory;
use crate::locale::LocaleResolver;
use crate::models::EventRow;
use crate::planner::{ExecutableQuery, PageToken, QueryPlanner};
use crate::request::SearchRequest;
use crate::serializer::{ResultSerializer, SerializedPage};
use crate::store::EventStore;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub events: SerializedPage,
    pub total: usize,
    pub next: Option<PageToken>,
    pub previous: Option<PageToken>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
}

/// Stateless across requests; safe to share between tasks.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn EventStore>,
    planner: QueryPlanner,
    serializer: ResultSerializer,
    parallel_threshold: usize,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn EventStore>, config: QueryConfig) -> Self {
        let planner = QueryPlanner::new(config.clone(), store.capabilities());
        let serializer = ResultSerializer::new(LocaleResolver::new(&config));
        Self {
            store,
            planner,
            serializer,
            parallel_threshold: config.parallel_post_filter_threshold,
        }
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn plan(&self, request: &SearchRequest) -> Result<ExecutableQuery> {
        self.planner.plan(request)
    }

    #[instrument(skip_all)]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let plan = self.planner.plan(request)?;

        let (rows, total) = if plan.needs_post_filter() {
            let candidates = self.store.fetch_events(&plan.storage).await?;
            let candidate_count = candidates.len();
            let matched = self.post_filter(&plan, candidates);
            let total = matched.len();
            debug!(candidates = candidate_count, matched = total, "Applied post-filters");
            (plan.window.slice(matched), total)
        } else {
            let rows = self.store.fetch_events(&plan.storage).await?;
            let total = self.store.count_events(&plan.storage).await?;
            (rows, total)
        };

        let (next, previous) = plan.window.neighbours(total);
        let events = self
            .serializer
            .serialize(rows, &plan.languages, self.store.as_ref())
            .await?;

        debug!(returned = events.len(), total, "Search complete");
        Ok(SearchResult {
            events,
            total,
            next,
            previous,
            advisories: plan.advisories,
        })
    }

    /// Order-preserving; parallel above the configured candidate count.
    fn post_filter(&self, plan: &ExecutableQuery, candidates: Vec<EventRow>) -> Vec<EventRow> {
        if candidates.len() >= self.parallel_threshold {
            candidates
                .into_par_iter()
                .filter(|row| plan.passes_post_filters(row))
                .collect()
        } else {
            candidates
                .into_iter()
                .filter(|row| plan.passes_post_filters(row))
                .collect()
        }
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("planner", &self.planner)
            .field("parallel_threshold", &self.parallel_threshold)
            .finish_non_exhaustive()
    }
}
