use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::parse::Candidate;
use crate::models::CatalogItem;
use crate::tmdb::CatalogApi;

/// Resolves each candidate against the catalog independently: the provider's
/// first hit wins, a miss or a failed call drops that candidate and never
/// aborts the rest. Results keep candidate order.
pub async fn resolve_candidates(
    catalog: &dyn CatalogApi,
    candidates: &[Candidate],
) -> Vec<CatalogItem> {
    let mut resolved = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match catalog.search_multi(&candidate.title, candidate.year).await {
            Ok(hits) => match hits.into_iter().next() {
                Some(item) => {
                    debug!("Resolved '{}' -> {} ({})", candidate.title, item.title, item.id);
                    resolved.push(item);
                }
                None => warn!("No catalog match for '{}'", candidate.title),
            },
            Err(e) => warn!("Catalog search failed for '{}': {e:#}", candidate.title),
        }
    }
    resolved
}

/// Id-deduplicated accumulation of every record resolved across a chat
/// session. Grows monotonically until cleared. Serializes as a plain array,
/// the layout the transcript storage key expects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationSet {
    items: Vec<CatalogItem>,
}

impl RecommendationSet {
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Appends the records whose ids are not present yet; titles are allowed
    /// to collide across distinct productions, so only the id counts.
    /// Returns how many were actually added.
    pub fn merge(&mut self, records: &[CatalogItem]) -> usize {
        let mut added = 0;
        for record in records {
            if !self.contains(record.id) {
                self.items.push(record.clone());
                added += 1;
            }
        }
        added
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn item(id: i32, title: &str) -> CatalogItem {
        CatalogItem {
            id,
            kind: MediaKind::Movie,
            title: title.to_string(),
            release_date: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: None,
            overview: None,
            genre_ids: Vec::new(),
            genres: Vec::new(),
        }
    }

    #[test]
    fn merge_dedups_by_id_not_title() {
        let mut set = RecommendationSet::default();
        assert_eq!(set.merge(&[item(1, "Solaris"), item(2, "Solaris")]), 2);
        assert_eq!(set.merge(&[item(1, "Solaris"), item(3, "Stalker")]), 1);
        let ids: Vec<i32> = set.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = RecommendationSet::default();
        set.merge(&[item(1, "Solaris")]);
        set.clear();
        assert!(set.is_empty());
    }
}
