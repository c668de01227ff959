//! Query planning
//!
//! Turns a `SearchRequest` into an `ExecutableQuery`:
//! - collects the request's predicates as a flat list of conjunctive clauses
//! - validates them (including cross-clause time contradictions) before any I/O
//! - routes each clause to storage or to the in-memory post-filter
//! - orders clauses cheapest and most selective first
//! - fixes sort order (with an id tie-break) and the page window

mod paging;
mod sort;

pub use paging::{PageToken, Window, MAX_OFFSET};
pub use sort::{compare_rows, SortField, SortKey};

use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::error::Advisory;
use crate::filter::temporal::TimeBounds;
use crate::filter::{
    AttributePredicate, FilterAtom, FilterExpr, PredicateKind, TextPredicate,
};
use crate::models::{EventRow, EventStatus, Language};
use crate::request::{Page, SearchRequest};
use crate::store::StorageCapabilities;
use crate::{Error, Result};

/// Where a clause is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Storage,
    PostFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedClause {
    pub expr: FilterExpr,
    pub cost: u32,
    pub placement: Placement,
}

/// The part of a plan the storage layer executes.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageQuery {
    /// Conjunctive clauses, cheapest first.
    pub clauses: Vec<FilterExpr>,
    pub sort: Vec<SortKey>,
    /// Full translation order for name sorting: preferences, default, the rest.
    pub name_languages: Vec<Language>,
    /// Present only when storage can apply the page window itself.
    pub window: Option<Window>,
}

impl StorageQuery {
    pub fn matches(&self, row: &EventRow) -> bool {
        self.clauses.iter().all(|clause| clause.matches(row))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableQuery {
    pub clauses: Vec<PlannedClause>,
    pub storage: StorageQuery,
    pub post_filters: Vec<FilterExpr>,
    pub sort: Vec<SortKey>,
    pub window: Window,
    pub languages: Vec<Language>,
    pub advisories: Vec<Advisory>,
}

impl ExecutableQuery {
    pub fn needs_post_filter(&self) -> bool {
        !self.post_filters.is_empty()
    }

    pub fn passes_post_filters(&self, row: &EventRow) -> bool {
        self.post_filters.iter().all(|clause| clause.matches(row))
    }

    /// Human-readable rendering of the plan.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        for (title, placement) in [
            ("storage", Placement::Storage),
            ("post-filter", Placement::PostFilter),
        ] {
            let clauses: Vec<&PlannedClause> = self
                .clauses
                .iter()
                .filter(|c| c.placement == placement)
                .collect();
            let _ = writeln!(out, "{title}:");
            if clauses.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for (i, clause) in clauses.iter().enumerate() {
                let _ = writeln!(out, "  {}. [cost {}] {}", i + 1, clause.cost, clause.expr);
            }
        }

        let sort: Vec<String> = self
            .sort
            .iter()
            .map(|k| format!("{} {}", k.field.as_str(), if k.descending { "desc" } else { "asc" }))
            .collect();
        let _ = writeln!(out, "sort: {}", sort.join(", "));

        let applied = if self.storage.window.is_some() {
            "in storage"
        } else {
            "after post-filter"
        };
        let _ = writeln!(
            out,
            "window: offset {}, limit {} ({applied})",
            self.window.offset, self.window.limit
        );
        for advisory in &self.advisories {
            let _ = writeln!(out, "advisory: {advisory}");
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct QueryPlanner {
    config: QueryConfig,
    capabilities: StorageCapabilities,
}

impl QueryPlanner {
    pub fn new(config: QueryConfig, capabilities: StorageCapabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn plan(&self, request: &SearchRequest) -> Result<ExecutableQuery> {
        let conjuncts = self.collect_conjuncts(request);

        for clause in &conjuncts {
            clause.validate()?;
        }
        check_time_bounds(&conjuncts)?;

        let mut clauses: Vec<PlannedClause> = conjuncts
            .into_iter()
            .map(|expr| {
                let placement = if expr.is_supported_by(&self.capabilities) {
                    Placement::Storage
                } else {
                    Placement::PostFilter
                };
                PlannedClause {
                    cost: expr.cost(&self.capabilities),
                    expr,
                    placement,
                }
            })
            .collect();
        // Stable: equal-cost clauses keep request order.
        clauses.sort_by_key(|c| c.cost);

        let mut advisories = Vec::new();
        let window = self.window(request, &mut advisories)?;
        let sort = sort::with_tie_break(&request.sort);

        let storage_clauses: Vec<FilterExpr> = clauses
            .iter()
            .filter(|c| c.placement == Placement::Storage)
            .map(|c| c.expr.clone())
            .collect();
        let post_filters: Vec<FilterExpr> = clauses
            .iter()
            .filter(|c| c.placement == Placement::PostFilter)
            .map(|c| c.expr.clone())
            .collect();

        let storage = StorageQuery {
            clauses: storage_clauses,
            sort: sort.clone(),
            name_languages: self.name_languages(&request.languages),
            window: post_filters.is_empty().then_some(window),
        };

        debug!(
            storage_clauses = storage.clauses.len(),
            post_filters = post_filters.len(),
            offset = window.offset,
            limit = window.limit,
            "Planned search"
        );

        Ok(ExecutableQuery {
            clauses,
            storage,
            post_filters,
            sort,
            window,
            languages: self.supported_preferences(&request.languages),
            advisories,
        })
    }

    fn collect_conjuncts(&self, request: &SearchRequest) -> Vec<FilterExpr> {
        let mut conjuncts = Vec::new();

        if let Some(text) = &request.text {
            conjuncts.push(FilterExpr::atom(TextPredicate::new(text.clone())));
        }
        if let Some(geo) = &request.geo {
            conjuncts.push(FilterExpr::atom(geo.clone()));
        }
        if let Some(time) = &request.time {
            conjuncts.push(FilterExpr::atom(*time));
        }
        if let Some(ids) = &request.keywords {
            conjuncts.push(FilterExpr::atom(AttributePredicate::AnyOfKeywords {
                ids: ids.clone(),
            }));
        }
        if let Some(filter) = &request.filter {
            conjuncts.extend(filter.clone().conjuncts());
        }

        let constrains_status = conjuncts
            .iter()
            .any(|c| c.requires(PredicateKind::Status));
        if !request.include_drafts && !constrains_status {
            conjuncts.push(FilterExpr::atom(AttributePredicate::Status {
                one_of: EventStatus::visible(),
            }));
        }

        conjuncts
    }

    fn window(&self, request: &SearchRequest, advisories: &mut Vec<Advisory>) -> Result<Window> {
        let (offset, token_size) = match &request.page {
            Page::Offset(offset) => (*offset, None),
            Page::Token(token) => {
                let (offset, size) = token.decode()?;
                (offset, Some(size))
            }
        };

        if offset > MAX_OFFSET {
            return Err(Error::invalid_predicate(
                "page",
                format!("offset {offset} exceeds the maximum of {MAX_OFFSET}"),
            ));
        }

        let requested = request
            .page_size
            .or(token_size)
            .unwrap_or(self.config.default_page_size);
        if requested == 0 {
            return Err(Error::invalid_predicate("page_size", "page size must be at least 1"));
        }

        let max = self.config.max_page_size;
        let limit = if requested > max {
            warn!(requested, max, "Clamping page size");
            advisories.push(Advisory::PageSizeClamped { requested, max });
            max
        } else {
            requested
        };

        Ok(Window { offset, limit })
    }

    /// Request preferences without languages the catalogue does not serve.
    fn supported_preferences(&self, preferences: &[Language]) -> Vec<Language> {
        let (supported, dropped): (Vec<Language>, Vec<Language>) = preferences
            .iter()
            .partition(|lang| self.config.supported_languages.contains(*lang));
        if !dropped.is_empty() {
            debug!(?dropped, "Ignoring unsupported language preferences");
        }
        supported
    }

    fn name_languages(&self, preferences: &[Language]) -> Vec<Language> {
        let mut order: Vec<Language> = Vec::with_capacity(Language::ALL.len());
        let candidates = preferences
            .iter()
            .copied()
            .chain(std::iter::once(self.config.default_language))
            .chain(Language::ALL);
        for lang in candidates {
            if self.config.supported_languages.contains(&lang) && !order.contains(&lang) {
                order.push(lang);
            }
        }
        order
    }
}

/// Reject conjunctions of time predicates no event can satisfy.
fn check_time_bounds(conjuncts: &[FilterExpr]) -> Result<()> {
    let mut bounds = TimeBounds::default();
    for clause in conjuncts {
        if let FilterExpr::Atom(FilterAtom::Time(predicate)) = clause {
            bounds.add(predicate);
        }
    }
    bounds.check()
}
