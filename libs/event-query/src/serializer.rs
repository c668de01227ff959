//! Public representation of search results.
//!
//! Related keywords and locations are fetched once per page, in bulk, and
//! expanded inline. Records are produced lazily from the page on every
//! iteration.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::filter::temporal::{serde_instant, serde_instant_opt};
use crate::locale::LocaleResolver;
use crate::models::{
    EventId, EventRow, EventStatus, Geometry, Keyword, KeywordId, Language, LocalizedText,
    Location, LocationId,
};
use crate::store::EventStore;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedKeyword {
    pub id: KeywordId,
    pub name: Option<String>,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<KeywordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedLocation {
    pub id: LocationId,
    pub geometry: Geometry,
    pub name: Option<String>,
    pub street_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedEvent {
    pub id: EventId,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub info_url: Option<String>,
    pub location_extra_info: Option<String>,
    #[serde(with = "serde_instant")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "serde_instant_opt")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub publisher: String,
    pub data_source: Option<String>,
    pub super_event: Option<EventId>,
    pub in_language: Vec<Language>,
    pub location: Option<SerializedLocation>,
    pub keywords: Vec<SerializedKeyword>,
    pub audience: Vec<SerializedKeyword>,
    #[serde(with = "serde_instant_opt")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ResultSerializer {
    resolver: LocaleResolver,
}

impl ResultSerializer {
    pub fn new(resolver: LocaleResolver) -> Self {
        Self { resolver }
    }

    /// Prepare a page for serialization: one bulk keyword lookup (skipped when
    /// the page references none) and at most one bulk location lookup.
    pub async fn serialize(
        &self,
        rows: Vec<EventRow>,
        preferences: &[Language],
        store: &dyn EventStore,
    ) -> Result<SerializedPage> {
        let keyword_ids = unique(
            rows.iter()
                .flat_map(|row| row.event.keywords.iter().chain(&row.event.audience)),
        );
        let location_ids = unique(rows.iter().filter_map(|row| row.event.location.as_ref()));

        let keywords: HashMap<KeywordId, Keyword> = if keyword_ids.is_empty() {
            HashMap::new()
        } else {
            store
                .fetch_keywords(&keyword_ids)
                .await?
                .into_iter()
                .map(|k| (k.id.clone(), k))
                .collect()
        };
        let locations: HashMap<LocationId, Location> = if location_ids.is_empty() {
            HashMap::new()
        } else {
            store
                .fetch_locations(&location_ids)
                .await?
                .into_iter()
                .map(|l| (l.id.clone(), l))
                .collect()
        };

        for id in keyword_ids.iter().filter(|id| !keywords.contains_key(*id)) {
            warn!(keyword = %id, "Event references unknown keyword");
        }
        debug!(
            rows = rows.len(),
            keywords = keywords.len(),
            locations = locations.len(),
            "Prepared page for serialization"
        );

        Ok(SerializedPage {
            rows,
            keywords,
            locations,
            preferences: preferences.to_vec(),
            resolver: self.resolver.clone(),
        })
    }
}

fn unique<'a, T>(ids: impl Iterator<Item = &'a T>) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash + 'a,
{
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).cloned().collect()
}

/// A page of rows plus everything needed to render them.
#[derive(Debug, Clone)]
pub struct SerializedPage {
    rows: Vec<EventRow>,
    keywords: HashMap<KeywordId, Keyword>,
    locations: HashMap<LocationId, Location>,
    preferences: Vec<Language>,
    resolver: LocaleResolver,
}

impl SerializedPage {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    /// Serialized records in page order; each call starts over.
    pub fn iter(&self) -> impl Iterator<Item = SerializedEvent> + '_ {
        self.rows.iter().map(|row| self.render(row))
    }

    fn text(&self, field: &str, value: Option<&LocalizedText>) -> Option<String> {
        value
            .and_then(|text| self.resolver.resolve_or_none(field, text, &self.preferences))
            .map(str::to_string)
    }

    fn keyword_list(&self, ids: &[KeywordId]) -> Vec<SerializedKeyword> {
        ids.iter()
            .filter_map(|id| self.keywords.get(id))
            .map(|keyword| SerializedKeyword {
                id: keyword.id.clone(),
                name: self.text("keyword.name", Some(&keyword.name)),
                deprecated: keyword.deprecated,
                replaced_by: keyword.replaced_by.clone(),
            })
            .collect()
    }

    fn render(&self, row: &EventRow) -> SerializedEvent {
        let event = &row.event;
        let location = event
            .location
            .as_ref()
            .and_then(|id| self.locations.get(id))
            .map(|location| SerializedLocation {
                id: location.id.clone(),
                geometry: location.geometry.clone(),
                name: self.text("location.name", location.name.as_ref()),
                street_address: self.text("location.street_address", location.street_address.as_ref()),
            });

        SerializedEvent {
            id: event.id.clone(),
            name: self.text("name", Some(&event.name)),
            short_description: self.text("short_description", event.short_description.as_ref()),
            description: self.text("description", event.description.as_ref()),
            info_url: self.text("info_url", event.info_url.as_ref()),
            location_extra_info: self.text("location_extra_info", event.location_extra_info.as_ref()),
            start_time: event.start_time,
            end_time: event.end_time,
            status: event.status,
            publisher: event.publisher.clone(),
            data_source: event.data_source.clone(),
            super_event: event.super_event.clone(),
            in_language: event.in_language.clone(),
            location,
            keywords: self.keyword_list(&event.keywords),
            audience: self.keyword_list(&event.audience),
            last_modified_time: event.last_modified_time,
        }
    }
}

impl Serialize for SerializedPage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
