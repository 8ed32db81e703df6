//! Turns an assistant's free-form reply into verified catalog records:
//! extract numbered title/year candidates, resolve each against the catalog,
//! accumulate the results deduplicated by id.

mod parse;
mod resolve;

pub use parse::{extract_candidates, Candidate, MAX_CANDIDATES};
pub use resolve::{resolve_candidates, RecommendationSet};

use crate::models::CatalogItem;
use crate::tmdb::CatalogApi;

/// Extraction and resolution in one step. Malformed lines never fail the
/// call; they just do not contribute a record.
pub async fn reconcile(catalog: &dyn CatalogApi, text: &str) -> Vec<CatalogItem> {
    let candidates = extract_candidates(text);
    resolve_candidates(catalog, &candidates).await
}
