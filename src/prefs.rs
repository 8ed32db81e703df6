use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::storage::{self, KeyValueStorage};

/// Display languages the application ships with. The tag is sent verbatim as
/// the catalog provider's `language` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "pt-BR")]
    PtBr,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::EnUs => "en-US",
            Language::PtBr => "pt-BR",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "en-US" => Some(Language::EnUs),
            "pt-BR" => Some(Language::PtBr),
            _ => None,
        }
    }

    /// Region used when picking a watch-provider availability block.
    pub fn watch_region(self) -> &'static str {
        match self {
            Language::EnUs => "US",
            Language::PtBr => "BR",
        }
    }
}

/// Small read-through accessors for the two scalar preferences. The language
/// is re-read on every call so a change in one place (or another tab over the
/// same backend) is picked up by the next catalog request.
pub struct Preferences {
    storage: Arc<dyn KeyValueStorage>,
}

impl Preferences {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn language(&self) -> Language {
        match self.storage.read(storage::LANGUAGE) {
            Ok(Some(raw)) => Language::from_tag(raw.trim()).unwrap_or_else(|| {
                warn!("Unknown language tag '{}', falling back to en-US", raw);
                Language::EnUs
            }),
            Ok(None) => Language::EnUs,
            Err(e) => {
                warn!("Failed to read language preference: {e:#}");
                Language::EnUs
            }
        }
    }

    pub fn set_language(&self, lang: Language) -> anyhow::Result<()> {
        self.storage.write(storage::LANGUAGE, lang.tag())
    }

    pub fn best_score(&self) -> Option<u32> {
        match self.storage.read(storage::HIGH_SCORE) {
            Ok(Some(raw)) => raw.trim().parse().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read best score: {e:#}");
                None
            }
        }
    }

    /// Persists the score only when it beats the stored one.
    pub fn record_best_score(&self, score: u32) -> anyhow::Result<()> {
        if self.best_score().is_some_and(|best| best >= score) {
            return Ok(());
        }
        self.storage.write(storage::HIGH_SCORE, &score.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn language_defaults_and_round_trips() {
        let prefs = Preferences::new(Arc::new(MemoryStorage::new()));
        assert_eq!(prefs.language(), Language::EnUs);
        prefs.set_language(Language::PtBr).unwrap();
        assert_eq!(prefs.language(), Language::PtBr);
        assert_eq!(prefs.language().watch_region(), "BR");
    }

    #[test]
    fn garbage_language_falls_back() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(crate::storage::LANGUAGE, "xx-YY").unwrap();
        let prefs = Preferences::new(storage);
        assert_eq!(prefs.language(), Language::EnUs);
    }

    #[test]
    fn best_score_keeps_maximum() {
        let prefs = Preferences::new(Arc::new(MemoryStorage::new()));
        assert_eq!(prefs.best_score(), None);
        prefs.record_best_score(7).unwrap();
        prefs.record_best_score(3).unwrap();
        assert_eq!(prefs.best_score(), Some(7));
        prefs.record_best_score(9).unwrap();
        assert_eq!(prefs.best_score(), Some(9));
    }
}
