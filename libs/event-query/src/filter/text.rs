//! Free-text predicate over an event's translatable display fields.

use serde::{Deserialize, Serialize};

use crate::models::{Event, Language, LocalizedText};
use crate::text::normalize_for_search;
use crate::{Error, Result};

/// Case-, diacritic- and whitespace-insensitive substring search over name,
/// short description and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPredicate {
    pub query: String,
    /// Restrict the search to these translations; all when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<Language>>,
}

impl TextPredicate {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            languages: None,
        }
    }

    pub fn in_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = Some(languages);
        self
    }

    pub fn name(&self) -> &'static str {
        "text"
    }

    pub fn validate(&self) -> Result<()> {
        if normalize_for_search(&self.query).is_empty() {
            return Err(Error::invalid_predicate(self.name(), "query must not be blank"));
        }
        if self.languages.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::invalid_predicate(
                self.name(),
                "language restriction must name at least one language",
            ));
        }
        Ok(())
    }

    /// The normalized needle as matched against normalized field text.
    pub fn needle(&self) -> String {
        normalize_for_search(&self.query)
    }

    fn accepts(&self, language: Language) -> bool {
        self.languages
            .as_ref()
            .map_or(true, |languages| languages.contains(&language))
    }
}

pub fn matches(event: &Event, predicate: &TextPredicate) -> bool {
    let needle = predicate.needle();
    if needle.is_empty() {
        return false;
    }

    let fields: [Option<&LocalizedText>; 3] = [
        Some(&event.name),
        event.short_description.as_ref(),
        event.description.as_ref(),
    ];
    fields.into_iter().flatten().any(|field| {
        field
            .iter()
            .filter(|(language, _)| predicate.accepts(*language))
            .any(|(_, text)| normalize_for_search(text).contains(&needle))
    })
}
