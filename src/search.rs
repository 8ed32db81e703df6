use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::models::CatalogItem;
use crate::tmdb::CatalogApi;

/// Queries shorter than this return nothing instead of hitting the provider.
pub const MIN_QUERY_LEN: usize = 3;
pub const MAX_RESULTS: usize = 10;

/// Search-as-you-type coordinator. Each keystroke calls [`begin`] for a
/// fresh generation; a completed request whose generation is no longer
/// current is discarded deterministically instead of being applied to
/// now-stale UI state.
///
/// [`begin`]: SearchSession::begin
#[derive(Debug, Default)]
pub struct SearchSession {
    generation: AtomicU64,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new query generation, superseding every in-flight one.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Resolves one query under a generation obtained from [`begin`].
    /// `None` means the result was superseded and must not be applied; a
    /// provider failure degrades to an empty hit list. Hits are limited to
    /// records with a poster, capped at [`MAX_RESULTS`].
    ///
    /// [`begin`]: SearchSession::begin
    pub async fn run(
        &self,
        generation: u64,
        catalog: &dyn CatalogApi,
        query: &str,
    ) -> Option<Vec<CatalogItem>> {
        if !self.is_current(generation) {
            return None;
        }
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Some(Vec::new());
        }
        let hits = match catalog.search_multi(query, None).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Live search failed for '{query}': {e:#}");
                Vec::new()
            }
        };
        if !self.is_current(generation) {
            debug!("Discarding stale search results for '{query}'");
            return None;
        }
        Some(
            hits.into_iter()
                .filter(|item| item.poster_path.is_some())
                .take(MAX_RESULTS)
                .collect(),
        )
    }
}
