use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::locale::LocaleResolver;
use crate::models::{EventRow, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    StartTime,
    /// Open-ended events sort last in either direction.
    EndTime,
    LastModified,
    /// Resolved through the request's language preferences, case-insensitive.
    Name,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::StartTime => "start_time",
            SortField::EndTime => "end_time",
            SortField::LastModified => "last_modified_time",
            SortField::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// Requested keys plus an ascending id tie-break unless id is already a key.
pub(crate) fn with_tie_break(requested: &[SortKey]) -> Vec<SortKey> {
    let mut keys = Vec::with_capacity(requested.len() + 1);
    for key in requested {
        if !keys.iter().any(|k: &SortKey| k.field == key.field) {
            keys.push(*key);
        }
    }
    if !keys.iter().any(|k| k.field == SortField::Id) {
        keys.push(SortKey::asc(SortField::Id));
    }
    keys
}

/// In-memory row ordering equivalent to the SQL `ORDER BY` the store renders.
pub fn compare_rows(
    a: &EventRow,
    b: &EventRow,
    keys: &[SortKey],
    resolver: &LocaleResolver,
    languages: &[Language],
) -> Ordering {
    for key in keys {
        let ordering = match key.field {
            SortField::Id => directed(a.event.id.cmp(&b.event.id), key.descending),
            SortField::StartTime => directed(a.event.start_time.cmp(&b.event.start_time), key.descending),
            SortField::EndTime => nulls_last(a.event.end_time, b.event.end_time, key.descending),
            SortField::LastModified => nulls_last(
                a.event.last_modified_time,
                b.event.last_modified_time,
                key.descending,
            ),
            SortField::Name => {
                let name = |row: &EventRow| {
                    resolver
                        .resolve_or_none("name", &row.event.name, languages)
                        .map(str::to_lowercase)
                };
                nulls_last(name(a), name(b), key.descending)
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(&b), descending),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
