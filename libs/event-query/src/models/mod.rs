//! Catalogue records as seen by the read side.
//!
//! Events, keywords and locations are created by the write-side API and are
//! read-only here.

mod geometry;
mod language;

pub use geometry::{Coordinate, Geometry};
pub(crate) use geometry::polygon_wkt;
pub use language::{Language, LocalizedText};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filter::temporal::{serde_instant, serde_instant_opt};
use crate::{Error, Result};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(EventId);
string_id!(KeywordId);
string_id!(LocationId);

/// Event lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Postponed,
    Rescheduled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 5] = [
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Cancelled,
        EventStatus::Postponed,
        EventStatus::Rescheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Postponed => "postponed",
            EventStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        EventStatus::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
    }

    /// Statuses visible to anonymous readers.
    pub fn visible() -> Vec<EventStatus> {
        EventStatus::ALL
            .into_iter()
            .filter(|s| *s != EventStatus::Draft)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: LocalizedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_extra_info: Option<LocalizedText>,
    #[serde(with = "serde_instant")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "serde_instant_opt")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<LocationId>,
    #[serde(default)]
    pub keywords: Vec<KeywordId>,
    #[serde(default)]
    pub audience: Vec<KeywordId>,
    #[serde(default)]
    pub in_language: Vec<Language>,
    pub publisher: String,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub super_event: Option<EventId>,
    pub status: EventStatus,
    #[serde(default, with = "serde_instant_opt")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl Event {
    /// Check the record invariants the read side relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(Error::invalid_event("<blank>", "id must not be blank"));
        }

        if self.name.is_empty() {
            return Err(Error::invalid_event(
                self.id.as_str(),
                "name must have at least one translation",
            ));
        }

        let optional = [
            ("short_description", &self.short_description),
            ("description", &self.description),
            ("info_url", &self.info_url),
            ("location_extra_info", &self.location_extra_info),
        ];
        for (field, value) in optional {
            if value.as_ref().is_some_and(LocalizedText::is_empty) {
                return Err(Error::invalid_event(
                    self.id.as_str(),
                    format!("{field} must have at least one translation when present"),
                ));
            }
        }

        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(Error::invalid_event(
                    self.id.as_str(),
                    format!(
                        "end_time {} is before start_time {}",
                        end.to_rfc3339(),
                        self.start_time.to_rfc3339()
                    ),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub name: LocalizedText,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub replaced_by: Option<KeywordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub geometry: Geometry,
    #[serde(default)]
    pub name: Option<LocalizedText>,
    #[serde(default)]
    pub street_address: Option<LocalizedText>,
}

/// A storage row: the event plus the geometry of its joined location.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event: Event,
    pub geometry: Option<Geometry>,
}

impl EventRow {
    pub fn new(event: Event, geometry: Option<Geometry>) -> Self {
        Self { event, geometry }
    }
}
