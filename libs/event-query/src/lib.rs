//! Linked Events query engine
//!
//! Read-side search over a multilingual, geospatially indexed event catalogue:
//! - Typed filter predicates (geo, temporal, attribute, free text) combined in an expression tree
//! - A query planner that orders clauses by selectivity and splits storage vs. post-filter work
//! - Storage backends (in-memory, PostGIS) behind a single async trait
//! - Locale-aware serialization with batched keyword and location expansion

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod locale;
pub mod models;
pub mod planner;
pub mod request;
pub mod serializer;
pub mod store;
pub mod text;

pub use crate::config::QueryConfig;
pub use engine::{SearchEngine, SearchResult};
pub use error::{Advisory, Error, Result};
pub use filter::{
    AttributePredicate, FilterAtom, FilterExpr, GeoPredicate, PredicateKind, TextPredicate,
    TimePredicate,
};
pub use locale::LocaleResolver;
pub use models::{
    Coordinate, Event, EventId, EventRow, EventStatus, Geometry, Keyword, KeywordId, Language,
    LocalizedText, Location, LocationId,
};
pub use planner::{ExecutableQuery, PageToken, QueryPlanner, SortField, SortKey, StorageQuery};
pub use request::{Page, SearchRequest};
pub use serializer::{ResultSerializer, SerializedEvent, SerializedPage};
pub use store::{EventStore, Fixture, MemoryEventStore, PgEventStore, StorageCapabilities};
