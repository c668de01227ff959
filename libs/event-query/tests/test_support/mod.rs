#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkedevents_query::{
    Error, Event, EventId, EventRow, EventStatus, EventStore, Fixture, Geometry, Keyword,
    KeywordId, Language, LocalizedText, Location, LocationId, MemoryEventStore, Result,
    StorageCapabilities, StorageQuery,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid test timestamp")
        .with_timezone(&Utc)
}

/// Minimal published event; tweak fields on the returned value.
pub fn event(id: &str, name: LocalizedText) -> Event {
    Event {
        id: EventId::new(id),
        name,
        short_description: None,
        description: None,
        info_url: None,
        location_extra_info: None,
        start_time: ts("2024-06-01T10:00:00Z"),
        end_time: Some(ts("2024-06-01T14:00:00Z")),
        location: None,
        keywords: Vec::new(),
        audience: Vec::new(),
        in_language: vec![Language::Fi],
        publisher: "ahjo:00001".to_string(),
        data_source: Some("helsinki".to_string()),
        super_event: None,
        status: EventStatus::Published,
        last_modified_time: None,
    }
}

pub fn fi(text: &str) -> LocalizedText {
    LocalizedText::new().with(Language::Fi, text)
}

pub fn place(id: &str, lat: f64, lon: f64) -> Location {
    Location {
        id: LocationId::new(id),
        geometry: Geometry::point(lat, lon),
        name: Some(fi(id)),
        street_address: None,
    }
}

pub fn keyword(id: &str, fi_name: &str, en_name: &str) -> Keyword {
    Keyword {
        id: KeywordId::new(id),
        name: LocalizedText::new()
            .with(Language::Fi, fi_name)
            .with(Language::En, en_name),
        data_source: Some("yso".to_string()),
        deprecated: false,
        replaced_by: None,
    }
}

/// Five events around central Helsinki on 2024-06-01.
///
/// Relative to (60.17, 24.94) at 12:00Z:
/// - agg-1: 200 m away, 10:00-14:00, fi + en names
/// - agg-2: 1.7 km away, open-ended since May, sv + en names
/// - agg-3: Tapiola, 7.5 km away, running
/// - agg-4: 200 m away, starts 13:00
/// - agg-5: no location, running
pub fn helsinki_fixture() -> Fixture {
    serde_json::from_value(json!({
        "keywords": [
            {"id": "yso:p11185", "name": {"fi": "konsertit", "en": "concerts"}},
            {"id": "yso:p5121", "name": {"fi": "näyttelyt", "sv": "utställningar", "en": "exhibitions"}},
            {"id": "yso:p4354", "name": {"fi": "lapset", "en": "children"}, "deprecated": true, "replaced_by": "yso:p13050"}
        ],
        "locations": [
            {"id": "tprek:7254", "geometry": {"type": "point", "coordinate": {"lat": 60.1699, "lon": 24.9384}}, "name": {"fi": "Kaisaniemen puisto"}},
            {"id": "tprek:8740", "geometry": {"type": "point", "coordinate": {"lat": 60.1841, "lon": 24.9497}}, "name": {"sv": "Berghäll"}},
            {"id": "tprek:15417", "geometry": {"type": "point", "coordinate": {"lat": 60.1756, "lon": 24.8050}}, "name": {"fi": "Tapiola"}}
        ],
        "events": [
            {
                "id": "linkedevents:agg-1",
                "name": {"fi": "Kesäkonsertti", "en": "Summer concert"},
                "start_time": "2024-06-01T13:00:00+03:00",
                "end_time": "2024-06-01T17:00:00+03:00",
                "location": "tprek:7254",
                "keywords": ["yso:p11185"],
                "audience": ["yso:p4354"],
                "publisher": "ahjo:00001",
                "status": "published"
            },
            {
                "id": "linkedevents:agg-2",
                "name": {"sv": "Konstutställning", "en": "Art exhibition"},
                "start_time": "2024-05-01T00:00:00Z",
                "location": "tprek:8740",
                "keywords": ["yso:p5121"],
                "publisher": "ahjo:00002",
                "status": "published"
            },
            {
                "id": "linkedevents:agg-3",
                "name": {"fi": "Tapiolan kesäpäivä"},
                "start_time": "2024-06-01T08:00:00Z",
                "end_time": "2024-06-01T16:00:00Z",
                "location": "tprek:15417",
                "keywords": ["yso:p11185"],
                "publisher": "espoo:1",
                "status": "published"
            },
            {
                "id": "linkedevents:agg-4",
                "name": {"fi": "Iltakonsertti", "en": "Evening concert"},
                "start_time": "2024-06-01T13:00:00Z",
                "end_time": "2024-06-01T15:00:00Z",
                "location": "tprek:7254",
                "keywords": ["yso:p11185"],
                "publisher": "ahjo:00001",
                "status": "published"
            },
            {
                "id": "linkedevents:agg-5",
                "name": {"en": "Online lecture"},
                "start_time": "2024-06-01T11:00:00Z",
                "end_time": "2024-06-01T13:00:00Z",
                "publisher": "ahjo:00001",
                "status": "published"
            }
        ]
    }))
    .expect("valid fixture")
}

/// Store double counting every call, with optional capability override and
/// forced storage failure.
pub struct CountingStore {
    inner: MemoryEventStore,
    capabilities: Option<StorageCapabilities>,
    fail: bool,
    pub fetch_events_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    pub keyword_calls: AtomicUsize,
    pub location_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            inner: MemoryEventStore::from_fixture(fixture).expect("valid fixture"),
            capabilities: None,
            fail: false,
            fetch_events_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            keyword_calls: AtomicUsize::new(0),
            location_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: StorageCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Self::calls(&self.fetch_events_calls)
            + Self::calls(&self.count_calls)
            + Self::calls(&self.keyword_calls)
            + Self::calls(&self.location_calls)
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(Error::StorageUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for CountingStore {
    fn capabilities(&self) -> StorageCapabilities {
        self.capabilities
            .clone()
            .unwrap_or_else(|| self.inner.capabilities())
    }

    async fn fetch_events(&self, query: &StorageQuery) -> Result<Vec<EventRow>> {
        self.fetch_events_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.fetch_events(query).await
    }

    async fn count_events(&self, query: &StorageQuery) -> Result<usize> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.count_events(query).await
    }

    async fn fetch_keywords(&self, ids: &[KeywordId]) -> Result<Vec<Keyword>> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.fetch_keywords(ids).await
    }

    async fn fetch_locations(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.fetch_locations(ids).await
    }
}
