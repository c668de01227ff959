use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{EventStore, StorageCapabilities};
use crate::locale::LocaleResolver;
use crate::models::{Event, EventId, EventRow, Keyword, KeywordId, Location, LocationId};
use crate::planner::{compare_rows, StorageQuery};
use crate::Result;

/// Catalogue snapshot used to seed a [`MemoryEventStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub events: Vec<Event>,
    pub keywords: Vec<Keyword>,
    pub locations: Vec<Location>,
}

/// In-process store evaluating every predicate kind itself.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: BTreeMap<EventId, Event>,
    keywords: HashMap<KeywordId, Keyword>,
    locations: HashMap<LocationId, Location>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Result<Self> {
        let mut store = Self::new();
        for keyword in fixture.keywords {
            store.insert_keyword(keyword);
        }
        for location in fixture.locations {
            store.insert_location(location);
        }
        for event in fixture.events {
            store.insert_event(event)?;
        }
        Ok(store)
    }

    /// Insert or replace an event after checking its invariants.
    pub fn insert_event(&mut self, event: Event) -> Result<()> {
        event.validate()?;
        self.events.insert(event.id.clone(), event);
        Ok(())
    }

    pub fn insert_keyword(&mut self, keyword: Keyword) {
        self.keywords.insert(keyword.id.clone(), keyword);
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.insert(location.id.clone(), location);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn row(&self, event: &Event) -> EventRow {
        let geometry = event
            .location
            .as_ref()
            .and_then(|id| self.locations.get(id))
            .map(|location| location.geometry.clone());
        EventRow::new(event.clone(), geometry)
    }

    fn matching_rows(&self, query: &StorageQuery) -> Vec<EventRow> {
        self.events
            .values()
            .map(|event| self.row(event))
            .filter(|row| query.matches(row))
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities::all()
    }

    async fn fetch_events(&self, query: &StorageQuery) -> Result<Vec<EventRow>> {
        let mut rows = self.matching_rows(query);
        // Names resolve only through the languages the planner allows.
        let resolver = match query.name_languages.first() {
            Some(first) => LocaleResolver::with_supported(*first, query.name_languages.clone()),
            None => LocaleResolver::default(),
        };
        rows.sort_by(|a, b| compare_rows(a, b, &query.sort, &resolver, &query.name_languages));

        let rows = match query.window {
            Some(window) => window.slice(rows),
            None => rows,
        };
        debug!(rows = rows.len(), "Fetched events from memory store");
        Ok(rows)
    }

    async fn count_events(&self, query: &StorageQuery) -> Result<usize> {
        Ok(self.matching_rows(query).len())
    }

    async fn fetch_keywords(&self, ids: &[KeywordId]) -> Result<Vec<Keyword>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.keywords.get(id).cloned())
            .collect())
    }

    async fn fetch_locations(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.locations.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AttributePredicate, FilterExpr};
    use crate::models::{EventStatus, Geometry, Language, LocalizedText};
    use crate::planner::{SortField, SortKey, Window};
    use crate::Error;
    use chrono::{TimeZone, Utc};

    fn event(id: &str, hour: u32, publisher: &str) -> Event {
        Event {
            id: EventId::new(id),
            name: LocalizedText::new().with(Language::Fi, id),
            short_description: None,
            description: None,
            info_url: None,
            location_extra_info: None,
            start_time: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
            end_time: None,
            location: Some(LocationId::new("tprek:1")),
            keywords: Vec::new(),
            audience: Vec::new(),
            in_language: Vec::new(),
            publisher: publisher.to_string(),
            data_source: None,
            super_event: None,
            status: EventStatus::Published,
            last_modified_time: None,
        }
    }

    fn store() -> MemoryEventStore {
        MemoryEventStore::from_fixture(Fixture {
            events: vec![
                event("c", 9, "ahjo:1"),
                event("a", 11, "ahjo:2"),
                event("b", 10, "ahjo:1"),
            ],
            keywords: Vec::new(),
            locations: vec![Location {
                id: LocationId::new("tprek:1"),
                geometry: Geometry::point(60.17, 24.94),
                name: None,
                street_address: None,
            }],
        })
        .unwrap()
    }

    fn query(clauses: Vec<FilterExpr>, sort: Vec<SortKey>, window: Option<Window>) -> StorageQuery {
        StorageQuery {
            clauses,
            sort,
            name_languages: Language::ALL.to_vec(),
            window,
        }
    }

    #[tokio::test]
    async fn filters_sorts_and_windows() {
        let store = store();
        let publisher = FilterExpr::atom(AttributePredicate::Publisher {
            id: "ahjo:1".to_string(),
        });

        let q = query(vec![publisher.clone()], vec![SortKey::asc(SortField::Id)], None);
        let ids: Vec<String> = store
            .fetch_events(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.event.id.0)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);

        let q = query(
            Vec::new(),
            vec![SortKey::asc(SortField::StartTime), SortKey::asc(SortField::Id)],
            Some(Window { offset: 1, limit: 1 }),
        );
        let rows = store.fetch_events(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event.id.as_str(), "b");
        assert_eq!(store.count_events(&q).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rows_carry_location_geometry() {
        let rows = store()
            .fetch_events(&query(Vec::new(), vec![SortKey::asc(SortField::Id)], None))
            .await
            .unwrap();
        assert_eq!(rows[0].geometry, Some(Geometry::point(60.17, 24.94)));
    }

    #[test]
    fn invalid_events_are_rejected_on_insert() {
        let mut bad = event("x", 10, "ahjo:1");
        bad.end_time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let err = MemoryEventStore::new().insert_event(bad).unwrap_err();
        assert!(matches!(err, Error::InvalidEvent { .. }));
    }
}
