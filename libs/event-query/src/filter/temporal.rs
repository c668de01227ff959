//! Temporal predicates over an event's `[start, end?]` span.
//!
//! All instants are normalized to UTC before comparison. Open-ended events
//! (no end time) are active indefinitely once started.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimePredicate {
    /// The event span intersects `[from, to]`.
    Overlaps {
        #[serde(with = "serde_instant")]
        from: DateTime<Utc>,
        #[serde(with = "serde_instant")]
        to: DateTime<Utc>,
    },
    /// The event starts at or after `instant`.
    StartsAfter {
        #[serde(with = "serde_instant")]
        instant: DateTime<Utc>,
    },
    /// The event has an end time at or before `instant`.
    EndsBefore {
        #[serde(with = "serde_instant")]
        instant: DateTime<Utc>,
    },
    /// The event is running at `instant`.
    ActiveAt {
        #[serde(with = "serde_instant")]
        instant: DateTime<Utc>,
    },
}

impl TimePredicate {
    pub fn name(&self) -> &'static str {
        match self {
            TimePredicate::Overlaps { .. } => "time.overlaps",
            TimePredicate::StartsAfter { .. } => "time.starts_after",
            TimePredicate::EndsBefore { .. } => "time.ends_before",
            TimePredicate::ActiveAt { .. } => "time.active_at",
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let TimePredicate::Overlaps { from, to } = self {
            if to < from {
                return Err(Error::invalid_predicate(
                    self.name(),
                    format!(
                        "`to` ({}) is before `from` ({})",
                        to.to_rfc3339(),
                        from.to_rfc3339()
                    ),
                ));
            }
        }
        Ok(())
    }
}

pub fn matches(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    predicate: &TimePredicate,
) -> bool {
    match *predicate {
        TimePredicate::Overlaps { from, to } => start <= to && end.map_or(true, |e| e >= from),
        TimePredicate::StartsAfter { instant } => start >= instant,
        TimePredicate::EndsBefore { instant } => end.is_some_and(|e| e <= instant),
        TimePredicate::ActiveAt { instant } => {
            start <= instant && end.map_or(true, |e| instant <= e)
        }
    }
}

/// Bounds implied by a conjunction of time predicates.
///
/// Every event satisfies `start <= end`, so a conjunction whose bounds cross
/// can never match.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TimeBounds {
    start_min: Option<DateTime<Utc>>,
    start_max: Option<DateTime<Utc>>,
    end_min: Option<DateTime<Utc>>,
    end_max: Option<DateTime<Utc>>,
}

impl TimeBounds {
    pub(crate) fn add(&mut self, predicate: &TimePredicate) {
        match *predicate {
            TimePredicate::Overlaps { from, to } => {
                self.start_max = min(self.start_max, to);
                self.end_min = max(self.end_min, from);
            }
            TimePredicate::StartsAfter { instant } => {
                self.start_min = max(self.start_min, instant);
            }
            TimePredicate::EndsBefore { instant } => {
                self.end_max = min(self.end_max, instant);
            }
            TimePredicate::ActiveAt { instant } => {
                self.start_max = min(self.start_max, instant);
                self.end_min = max(self.end_min, instant);
            }
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        let crossed = |lower: Option<DateTime<Utc>>, upper: Option<DateTime<Utc>>| {
            matches!((lower, upper), (Some(l), Some(u)) if l > u)
        };

        if crossed(self.start_min, self.start_max) {
            return Err(Error::invalid_predicate(
                "time",
                "no event can start after the latest start the other time filters allow",
            ));
        }
        // End bounds only bind events that have an end, which `ends_before` requires.
        if crossed(self.start_min, self.end_max) || crossed(self.end_min, self.end_max) {
            return Err(Error::invalid_predicate(
                "time",
                "time filters imply an end time before the start time",
            ));
        }
        Ok(())
    }
}

fn min(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(current.map_or(candidate, |c| c.min(candidate)))
}

fn max(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(current.map_or(candidate, |c| c.max(candidate)))
}

/// Parse an RFC 3339 timestamp and normalize it to UTC.
///
/// Timestamps without an offset (and bare dates) are rejected as ambiguous.
pub fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if naive {
        return Err(Error::ambiguous_time(field, value));
    }

    Err(Error::invalid_predicate(
        field,
        format!("'{value}' is not an RFC 3339 timestamp"),
    ))
}

/// Serde adapter rejecting naive timestamps.
pub mod serde_instant {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_instant("timestamp", &raw).map_err(serde::de::Error::custom)
    }
}

/// Optional variant of [`serde_instant`].
pub mod serde_instant_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|r| super::parse_instant("timestamp", &r).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn overlaps_with_bounded_event() {
        let p = TimePredicate::Overlaps { from: at(10), to: at(12) };
        assert!(matches(at(9), Some(at(10)), &p));
        assert!(matches(at(11), Some(at(11)), &p));
        assert!(matches(at(12), Some(at(15)), &p));
        assert!(!matches(at(7), Some(at(9)), &p));
        assert!(!matches(at(13), Some(at(14)), &p));
    }

    #[test]
    fn open_ended_event_overlaps_once_started() {
        let p = TimePredicate::Overlaps { from: at(20), to: at(22) };
        assert!(matches(at(1), None, &p));
        assert!(matches(at(22), None, &p));
        assert!(!matches(at(23), None, &p));
    }

    #[test]
    fn starts_after_is_inclusive() {
        let p = TimePredicate::StartsAfter { instant: at(10) };
        assert!(matches(at(10), None, &p));
        assert!(!matches(at(9), Some(at(23)), &p));
    }

    #[test]
    fn open_ended_event_never_ends_before() {
        let p = TimePredicate::EndsBefore { instant: at(23) };
        assert!(!matches(at(1), None, &p));
        assert!(matches(at(1), Some(at(23)), &p));
    }

    #[test]
    fn active_at_boundaries() {
        let p = TimePredicate::ActiveAt { instant: at(12) };
        assert!(matches(at(12), Some(at(12)), &p));
        assert!(matches(at(8), None, &p));
        assert!(!matches(at(13), None, &p));
        assert!(!matches(at(8), Some(at(11)), &p));
    }

    #[test]
    fn reversed_overlap_is_invalid() {
        let p = TimePredicate::Overlaps { from: at(12), to: at(10) };
        assert!(matches!(p.validate(), Err(Error::InvalidPredicate { .. })));
    }

    #[test]
    fn crossing_bounds_are_detected() {
        let mut bounds = TimeBounds::default();
        bounds.add(&TimePredicate::StartsAfter { instant: at(12) });
        bounds.add(&TimePredicate::EndsBefore { instant: at(10) });
        assert!(bounds.check().is_err());

        let mut bounds = TimeBounds::default();
        bounds.add(&TimePredicate::StartsAfter { instant: at(8) });
        bounds.add(&TimePredicate::EndsBefore { instant: at(10) });
        bounds.add(&TimePredicate::ActiveAt { instant: at(9) });
        assert!(bounds.check().is_ok());

        let mut bounds = TimeBounds::default();
        bounds.add(&TimePredicate::ActiveAt { instant: at(12) });
        bounds.add(&TimePredicate::EndsBefore { instant: at(11) });
        assert!(bounds.check().is_err());
    }

    #[test]
    fn parse_instant_normalizes_offsets() {
        let parsed = parse_instant("from", "2024-06-01T15:00:00+03:00").unwrap();
        assert_eq!(parsed, at(12));
        assert_eq!(parse_instant("from", "2024-06-01T12:00:00Z").unwrap(), at(12));
    }

    #[test]
    fn parse_instant_rejects_naive_input() {
        for raw in ["2024-06-01T12:00:00", "2024-06-01 12:00:00", "2024-06-01"] {
            assert!(
                matches!(parse_instant("from", raw), Err(Error::AmbiguousTime { .. })),
                "{raw} should be ambiguous"
            );
        }
        assert!(matches!(
            parse_instant("from", "yesterday"),
            Err(Error::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn predicates_deserialize_from_tagged_json() {
        let p: TimePredicate = serde_json::from_value(serde_json::json!({
            "type": "active_at",
            "instant": "2024-06-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(p, TimePredicate::ActiveAt { instant: at(12) });
    }
}
