//! Single owner of the translation fallback policy.

use tracing::debug;

use crate::config::QueryConfig;
use crate::models::{Language, LocalizedText};
use crate::{Error, Result};

/// Picks the best available translation of a field.
///
/// Order: the caller's preferences, then the configured default language,
/// then the first entry in language enumeration order (fi, sv, en).
/// Translations outside the supported languages are never served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleResolver {
    default_language: Language,
    supported: Vec<Language>,
}

impl LocaleResolver {
    pub fn new(config: &QueryConfig) -> Self {
        Self::with_supported(config.default_language, config.supported_languages.clone())
    }

    pub fn with_default(default_language: Language) -> Self {
        Self::with_supported(default_language, Language::ALL.to_vec())
    }

    pub fn with_supported(default_language: Language, supported: Vec<Language>) -> Self {
        Self {
            default_language,
            supported,
        }
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn supports(&self, language: Language) -> bool {
        self.supported.contains(&language)
    }

    pub fn resolve<'a>(
        &self,
        field: &str,
        text: &'a LocalizedText,
        preferences: &[Language],
    ) -> Result<&'a str> {
        self.resolve_with_language(field, text, preferences)
            .map(|(_, value)| value)
    }

    /// Like [`resolve`](Self::resolve), also reporting which translation was chosen.
    pub fn resolve_with_language<'a>(
        &self,
        field: &str,
        text: &'a LocalizedText,
        preferences: &[Language],
    ) -> Result<(Language, &'a str)> {
        preferences
            .iter()
            .chain(std::iter::once(&self.default_language))
            .filter(|lang| self.supports(**lang))
            .find_map(|lang| text.get(*lang).map(|value| (*lang, value)))
            .or_else(|| text.iter().find(|(lang, _)| self.supports(*lang)))
            .ok_or_else(|| Error::MissingTranslation {
                field: field.to_string(),
            })
    }

    /// Resolve, rendering a missing translation as `None`.
    pub fn resolve_or_none<'a>(
        &self,
        field: &str,
        text: &'a LocalizedText,
        preferences: &[Language],
    ) -> Option<&'a str> {
        match self.resolve(field, text, preferences) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(field = field, error = %err, "Rendering translatable field as null");
                None
            }
        }
    }
}

impl Default for LocaleResolver {
    fn default() -> Self {
        Self::new(&QueryConfig::default())
    }
}
