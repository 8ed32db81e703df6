use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::MediaKind;
use crate::store::{ListKind, WatchStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreStat {
    pub name: String,
    pub count: usize,
    /// Share of the favorites count, rounded. Zero favorites yields zero.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub movie_count: usize,
    pub series_count: usize,
    pub episodes_watched: usize,
    pub top_genres: Vec<GenreStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievements {
    pub first_episode: bool,
    pub cinephile: bool,
    pub binger: bool,
}

/// Read-only counts over the three watch-state collections.
///
/// Movies and series are counted over the favorites+watchlist union,
/// deduplicated by id; a series additionally counts when it only appears in
/// the episode-progress map (id-set union, not a sum). The genre histogram
/// is built from favorites that carry full genre detail; list-shaped
/// snapshots with bare genre ids contribute nothing.
pub fn compute_stats(store: &WatchStore) -> ProfileStats {
    let favorites = store.list(ListKind::Favorites);
    let watchlist = store.list(ListKind::Watchlist);
    let progress = store.progress_map();

    let mut seen = HashSet::new();
    let unique: Vec<_> = favorites
        .iter()
        .chain(watchlist.iter())
        .filter(|item| seen.insert(item.id))
        .collect();

    let movie_count = unique
        .iter()
        .filter(|item| item.kind == MediaKind::Movie)
        .count();

    let mut series_ids: HashSet<i32> = unique
        .iter()
        .filter(|item| item.kind == MediaKind::Series)
        .map(|item| item.id)
        .collect();
    series_ids.extend(progress.keys().copied());
    let series_count = series_ids.len();

    let episodes_watched = progress.values().map(|eps| eps.len()).sum();

    let mut genre_counts: HashMap<&str, usize> = HashMap::new();
    for item in &favorites {
        for genre in &item.genres {
            *genre_counts.entry(genre.name.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = genre_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let total_favorites = favorites.len();
    let top_genres = ranked
        .into_iter()
        .take(3)
        .map(|(name, count)| GenreStat {
            name: name.to_string(),
            count,
            percent: if total_favorites == 0 {
                0
            } else {
                ((count as f64 / total_favorites as f64) * 100.0).round() as u32
            },
        })
        .collect();

    ProfileStats {
        movie_count,
        series_count,
        episodes_watched,
        top_genres,
    }
}

pub fn achievements(stats: &ProfileStats) -> Achievements {
    Achievements {
        first_episode: stats.episodes_watched > 0,
        cinephile: stats.movie_count >= 10,
        binger: stats.episodes_watched >= 20,
    }
}
