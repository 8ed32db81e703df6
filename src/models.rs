use serde::{Deserialize, Serialize};

/// Discriminant assigned once, when a record enters the system from the
/// catalog provider. Downstream code matches on it and never re-infers the
/// kind from field shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

/// Snapshot of a provider record as the application persists it. Immutable
/// once taken; removal + re-add is the only way to replace one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i32,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre_ids: Vec<i32>,
    // Full genre detail is only present on snapshots taken from a detail
    // endpoint; list/search snapshots carry genre_ids at most.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEpisode {
    pub id: i32,
    pub name: String,
    pub season_number: i32,
    pub episode_number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<String>,
}
