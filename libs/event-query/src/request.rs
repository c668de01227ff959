//! Typed search requests, as handed over by the HTTP handler layer.

use serde::{Deserialize, Serialize};

use crate::filter::{FilterExpr, GeoPredicate, TimePredicate};
use crate::models::{KeywordId, Language};
use crate::planner::{PageToken, SortKey};

/// Which window of the result set to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Offset(usize),
    Token(PageToken),
}

impl Default for Page {
    fn default() -> Self {
        Page::Offset(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Free-text query over names and descriptions.
    pub text: Option<String>,
    pub geo: Option<GeoPredicate>,
    pub time: Option<TimePredicate>,
    /// Keyword ids, any of which must be present.
    pub keywords: Option<Vec<KeywordId>>,
    /// Composite filter, AND-ed with the other predicates.
    pub filter: Option<FilterExpr>,
    /// Language preferences, most preferred first.
    pub languages: Vec<Language>,
    pub page: Page,
    pub page_size: Option<usize>,
    pub sort: Vec<SortKey>,
    pub include_drafts: bool,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_geo(mut self, geo: GeoPredicate) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_time(mut self, time: TimePredicate) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_keywords<I, K>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<KeywordId>,
    {
        self.keywords = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_languages(mut self, languages: impl Into<Vec<Language>>) -> Self {
        self.languages = languages.into();
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn include_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }
}
