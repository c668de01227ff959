//! Categorical predicates: keyword sets, publisher, status, data source and
//! event language.

use serde::{Deserialize, Serialize};

use crate::models::{Event, EventStatus, KeywordId, Language};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributePredicate {
    /// At least one of `ids` is among the event keywords.
    AnyOfKeywords { ids: Vec<KeywordId> },
    /// Every one of `ids` is among the event keywords.
    AllOfKeywords { ids: Vec<KeywordId> },
    Publisher { id: String },
    Status { one_of: Vec<EventStatus> },
    DataSource { id: String },
    /// The event is held in at least one of `languages`.
    InLanguage { languages: Vec<Language> },
}

impl AttributePredicate {
    pub fn name(&self) -> &'static str {
        match self {
            AttributePredicate::AnyOfKeywords { .. } => "keywords.any_of",
            AttributePredicate::AllOfKeywords { .. } => "keywords.all_of",
            AttributePredicate::Publisher { .. } => "publisher",
            AttributePredicate::Status { .. } => "status",
            AttributePredicate::DataSource { .. } => "data_source",
            AttributePredicate::InLanguage { .. } => "in_language",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let empty = || Err(Error::invalid_predicate(self.name(), "value set is empty"));
        let blank = || Err(Error::invalid_predicate(self.name(), "id must not be blank"));

        match self {
            AttributePredicate::AnyOfKeywords { ids } | AttributePredicate::AllOfKeywords { ids } => {
                if ids.is_empty() {
                    return empty();
                }
                if ids.iter().any(|id| id.as_str().trim().is_empty()) {
                    return blank();
                }
            }
            AttributePredicate::Publisher { id } | AttributePredicate::DataSource { id } => {
                if id.trim().is_empty() {
                    return blank();
                }
            }
            AttributePredicate::Status { one_of } => {
                if one_of.is_empty() {
                    return empty();
                }
            }
            AttributePredicate::InLanguage { languages } => {
                if languages.is_empty() {
                    return empty();
                }
            }
        }
        Ok(())
    }
}

pub fn matches(event: &Event, predicate: &AttributePredicate) -> bool {
    match predicate {
        AttributePredicate::AnyOfKeywords { ids } => ids.iter().any(|id| event.keywords.contains(id)),
        AttributePredicate::AllOfKeywords { ids } => ids.iter().all(|id| event.keywords.contains(id)),
        AttributePredicate::Publisher { id } => event.publisher == *id,
        AttributePredicate::Status { one_of } => one_of.contains(&event.status),
        AttributePredicate::DataSource { id } => event.data_source.as_deref() == Some(id.as_str()),
        AttributePredicate::InLanguage { languages } => {
            languages.iter().any(|l| event.in_language.contains(l))
        }
    }
}
