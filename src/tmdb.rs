use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::models::{CatalogItem, Genre, MediaKind, UpcomingEpisode};
use crate::prefs::Preferences;

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Full-size image URL for a provider-relative path like `/abc123.jpg`.
pub fn image_url(size: &str, path: &str) -> String {
    format!("{IMAGE_BASE}/{size}{path}")
}

/// The seam consumed by the reconciler, the calendar aggregator and live
/// search. The concrete client carries the full read surface as inherent
/// methods; tests substitute fakes for just these two calls.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Multi-type search. Person hits are dropped at this boundary; every
    /// returned item carries its kind tag.
    async fn search_multi(&self, query: &str, year: Option<i32>) -> Result<Vec<CatalogItem>>;
    async fn series_detail(&self, id: i32) -> Result<SeriesDetail>;
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    prefs: Arc<Preferences>,
}

impl TmdbClient {
    pub fn new(settings: &Settings, prefs: Arc<Preferences>) -> Result<Self> {
        let user_agent = format!("cineverse/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: settings.tmdb_api_key.clone(),
            base_url: settings.tmdb_base_url.trim_end_matches('/').to_string(),
            prefs,
        })
    }

    /// Every request carries the key and the active display language, the
    /// latter re-read per call so a preference change applies immediately.
    fn url(&self, path_and_query: &str) -> String {
        let sep = if path_and_query.contains('?') { '&' } else { '?' };
        format!(
            "{}/{}{}api_key={}&language={}",
            self.base_url,
            path_and_query,
            sep,
            self.api_key,
            self.prefs.language().tag()
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        debug!("GET {url}");
        let res = self.client.get(url).send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", url, status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }

    pub async fn movie_detail(&self, id: i32) -> Result<MovieDetail> {
        self.get_json(&self.url(&format!("movie/{id}"))).await
    }

    pub async fn season_detail(&self, series_id: i32, season: i32) -> Result<SeasonDetail> {
        self.get_json(&self.url(&format!("tv/{series_id}/season/{season}")))
            .await
    }

    pub async fn person_detail(&self, id: i32) -> Result<PersonDetail> {
        self.get_json(&self.url(&format!("person/{id}"))).await
    }

    pub async fn person_movie_credits(&self, id: i32) -> Result<Vec<CatalogItem>> {
        let data: CastCredits = self
            .get_json(&self.url(&format!("person/{id}/movie_credits")))
            .await?;
        Ok(data
            .cast
            .into_iter()
            .map(|e| e.into_item_as(MediaKind::Movie))
            .collect())
    }

    pub async fn credits(&self, kind: MediaKind, id: i32) -> Result<Credits> {
        self.get_json(&self.url(&format!("{}/{id}/credits", kind_path(kind))))
            .await
    }

    pub async fn videos(&self, kind: MediaKind, id: i32) -> Result<Vec<Video>> {
        let data: Videos = self
            .get_json(&self.url(&format!("{}/{id}/videos", kind_path(kind))))
            .await?;
        Ok(data.results)
    }

    pub async fn recommendations(&self, kind: MediaKind, id: i32) -> Result<Vec<CatalogItem>> {
        let data: EntryPage = self
            .get_json(&self.url(&format!("{}/{id}/recommendations", kind_path(kind))))
            .await?;
        Ok(data
            .results
            .into_iter()
            .map(|e| e.into_item_as(kind))
            .collect())
    }

    pub async fn reviews(&self, kind: MediaKind, id: i32) -> Result<Vec<Review>> {
        let data: ReviewPage = self
            .get_json(&self.url(&format!("{}/{id}/reviews", kind_path(kind))))
            .await?;
        Ok(data.results.into_iter().map(Review::from_wire).collect())
    }

    /// Availability block for the active language's region, when the
    /// provider lists one.
    pub async fn watch_providers(&self, kind: MediaKind, id: i32) -> Result<Option<ProviderRegion>> {
        let region = self.prefs.language().watch_region();
        let mut data: ProviderResponse = self
            .get_json(&self.url(&format!("{}/{id}/watch/providers", kind_path(kind))))
            .await?;
        Ok(data.results.remove(region))
    }

    pub async fn discover_movies(&self, filter: &DiscoverFilter) -> Result<Page<CatalogItem>> {
        let mut query = format!("discover/movie?page={}", filter.page.max(1));
        if !filter.with_genres.is_empty() {
            let genres = filter
                .with_genres
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(",");
            query.push_str(&format!("&with_genres={genres}"));
        }
        if let Some(year) = filter.year {
            query.push_str(&format!("&primary_release_year={year}"));
        }
        if let Some(sort) = &filter.sort_by {
            query.push_str(&format!("&sort_by={}", urlencoding::encode(sort)));
        }
        let data: EntryPage = self.get_json(&self.url(&query)).await?;
        Ok(Page {
            page: data.page.unwrap_or(1),
            total_pages: data.total_pages.unwrap_or(1),
            total_results: data.total_results.unwrap_or(0),
            items: data
                .results
                .into_iter()
                .map(|e| e.into_item_as(MediaKind::Movie))
                .collect(),
        })
    }

    pub async fn genre_list(&self, kind: MediaKind) -> Result<Vec<Genre>> {
        let data: GenreList = self
            .get_json(&self.url(&format!("genre/{}/list", kind_path(kind))))
            .await?;
        Ok(data.genres)
    }

    pub async fn collection_detail(&self, id: i32) -> Result<CollectionDetail> {
        let data: CollectionWire = self.get_json(&self.url(&format!("collection/{id}"))).await?;
        Ok(CollectionDetail {
            id: data.id,
            name: data.name,
            overview: data.overview,
            poster_path: data.poster_path,
            backdrop_path: data.backdrop_path,
            parts: data
                .parts
                .into_iter()
                .map(|e| e.into_item_as(MediaKind::Movie))
                .collect(),
        })
    }

    pub async fn top_rated_movies(&self) -> Result<Vec<CatalogItem>> {
        let data: EntryPage = self.get_json(&self.url("movie/top_rated")).await?;
        Ok(data
            .results
            .into_iter()
            .map(|e| e.into_item_as(MediaKind::Movie))
            .collect())
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn search_multi(&self, query: &str, year: Option<i32>) -> Result<Vec<CatalogItem>> {
        let mut path = format!("search/multi?query={}", urlencoding::encode(query));
        if let Some(year) = year {
            path.push_str(&format!("&year={year}"));
        }
        let data: EntryPage = self.get_json(&self.url(&path)).await?;
        Ok(data.results.into_iter().filter_map(SearchEntry::into_item).collect())
    }

    async fn series_detail(&self, id: i32) -> Result<SeriesDetail> {
        self.get_json(&self.url(&format!("tv/{id}"))).await
    }
}

fn kind_path(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::Series => "tv",
    }
}

/// First YouTube trailer, else first YouTube teaser.
pub fn select_trailer(videos: &[Video]) -> Option<String> {
    videos
        .iter()
        .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Trailer")
        .or_else(|| {
            videos
                .iter()
                .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Teaser")
        })
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverFilter {
    pub with_genres: Vec<i32>,
    pub year: Option<i32>,
    pub sort_by: Option<String>,
    pub page: u32,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieDetail {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub belongs_to_collection: Option<CollectionRef>,
}

impl MovieDetail {
    /// Snapshot taken when the user saves this record.
    pub fn to_item(&self) -> CatalogItem {
        CatalogItem {
            id: self.id,
            kind: MediaKind::Movie,
            title: self.title.clone(),
            release_date: self.release_date.clone(),
            poster_path: self.poster_path.clone(),
            backdrop_path: self.backdrop_path.clone(),
            vote_average: self.vote_average,
            overview: none_if_empty(&self.overview),
            genre_ids: self.genres.iter().map(|g| g.id).collect(),
            genres: self.genres.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRef {
    pub id: i32,
    pub name: String,
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesDetail {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub number_of_episodes: u32,
    #[serde(default)]
    pub number_of_seasons: u32,
    pub next_episode_to_air: Option<UpcomingEpisode>,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
}

impl SeriesDetail {
    pub fn to_item(&self) -> CatalogItem {
        CatalogItem {
            id: self.id,
            kind: MediaKind::Series,
            title: self.name.clone(),
            release_date: self.first_air_date.clone(),
            poster_path: self.poster_path.clone(),
            backdrop_path: self.backdrop_path.clone(),
            vote_average: self.vote_average,
            overview: none_if_empty(&self.overview),
            genre_ids: self.genres.iter().map(|g| g.id).collect(),
            genres: self.genres.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonSummary {
    pub id: i32,
    pub season_number: i32,
    pub name: String,
    #[serde(default)]
    pub episode_count: u32,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonDetail {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub air_date: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub episodes: Vec<EpisodeDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeDetail {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub episode_number: i32,
    #[serde(default)]
    pub season_number: i32,
    pub air_date: Option<String>,
    pub still_path: Option<String>,
    pub vote_average: Option<f32>,
    pub runtime: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonDetail {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub biography: String,
    pub birthday: Option<String>,
    pub place_of_birth: Option<String>,
    pub profile_path: Option<String>,
    pub known_for_department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub id: i32,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Review {
    pub author: String,
    pub content: String,
    pub created_at: Option<String>,
    pub rating: Option<f32>,
    pub url: Option<String>,
}

impl Review {
    fn from_wire(wire: ReviewWire) -> Self {
        Self {
            author: wire.author,
            content: wire.content,
            created_at: wire.created_at,
            rating: wire.author_details.and_then(|d| d.rating),
            url: wire.url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderRegion {
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
    #[serde(default)]
    pub rent: Vec<ProviderEntry>,
    #[serde(default)]
    pub buy: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub provider_name: String,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollectionDetail {
    pub id: i32,
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub parts: Vec<CatalogItem>,
}

fn none_if_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// Wire shapes below stay private; the kind tag is attached here and only
// here.

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: i32,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f32>,
    overview: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i32>,
}

impl SearchEntry {
    fn into_item(self) -> Option<CatalogItem> {
        let kind = match self.media_type.as_deref() {
            Some("movie") => MediaKind::Movie,
            Some("tv") => MediaKind::Series,
            _ => return None,
        };
        Some(self.into_item_as(kind))
    }

    fn into_item_as(self, kind: MediaKind) -> CatalogItem {
        let title = match kind {
            MediaKind::Movie => self.title,
            MediaKind::Series => self.name,
        };
        let release_date = match kind {
            MediaKind::Movie => self.release_date,
            MediaKind::Series => self.first_air_date,
        };
        CatalogItem {
            id: self.id,
            kind,
            title: title.unwrap_or_default(),
            release_date: release_date.filter(|d| !d.is_empty()),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            vote_average: self.vote_average,
            overview: self.overview.filter(|o| !o.is_empty()),
            genre_ids: self.genre_ids,
            genres: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntryPage {
    #[serde(default)]
    results: Vec<SearchEntry>,
    page: Option<u32>,
    total_pages: Option<u32>,
    total_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CastCredits {
    #[serde(default)]
    cast: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct ReviewPage {
    #[serde(default)]
    results: Vec<ReviewWire>,
}

#[derive(Debug, Deserialize)]
struct ReviewWire {
    author: String,
    content: String,
    created_at: Option<String>,
    author_details: Option<AuthorDetails>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorDetails {
    rating: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    results: std::collections::HashMap<String, ProviderRegion>,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct CollectionWire {
    id: i32,
    name: String,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    parts: Vec<SearchEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_entries_keep_media_and_drop_people() {
        let raw = r#"{
            "results": [
                {"id": 1, "media_type": "movie", "title": "Dune", "release_date": "2021-10-22"},
                {"id": 2, "media_type": "person", "name": "Denis Villeneuve"},
                {"id": 3, "media_type": "tv", "name": "Dark", "first_air_date": "2017-12-01"}
            ]
        }"#;
        let page: EntryPage = serde_json::from_str(raw).unwrap();
        let items: Vec<CatalogItem> = page.results.into_iter().filter_map(SearchEntry::into_item).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, MediaKind::Movie);
        assert_eq!(items[0].title, "Dune");
        assert_eq!(items[1].kind, MediaKind::Series);
        assert_eq!(items[1].release_date.as_deref(), Some("2017-12-01"));
    }

    #[test]
    fn empty_dates_read_as_absent() {
        let raw = r#"{"id": 9, "media_type": "movie", "title": "TBA", "release_date": ""}"#;
        let entry: SearchEntry = serde_json::from_str(raw).unwrap();
        let item = entry.into_item().unwrap();
        assert_eq!(item.release_date, None);
    }

    #[test]
    fn series_detail_carries_next_episode_and_networks() {
        let raw = r#"{
            "id": 1399,
            "name": "Game of Thrones",
            "overview": "Winter is coming.",
            "first_air_date": "2011-04-17",
            "number_of_episodes": 73,
            "number_of_seasons": 8,
            "genres": [{"id": 18, "name": "Drama"}],
            "networks": [{"name": "HBO"}],
            "next_episode_to_air": {
                "id": 63056,
                "name": "Winterfell",
                "season_number": 8,
                "episode_number": 1,
                "air_date": "2019-04-14"
            },
            "seasons": [
                {"id": 3624, "season_number": 1, "name": "Season 1", "episode_count": 10,
                 "poster_path": "/s1.jpg", "air_date": "2011-04-17"}
            ]
        }"#;
        let detail: SeriesDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.number_of_episodes, 73);
        assert_eq!(detail.networks[0].name, "HBO");
        let next = detail.next_episode_to_air.as_ref().unwrap();
        assert_eq!((next.season_number, next.episode_number), (8, 1));

        let item = detail.to_item();
        assert_eq!(item.kind, MediaKind::Series);
        assert_eq!(item.genres[0].name, "Drama");
    }

    #[test]
    fn ended_series_parse_without_a_next_episode() {
        let detail: SeriesDetail =
            serde_json::from_str(r#"{"id": 1, "name": "Done"}"#).unwrap();
        assert!(detail.next_episode_to_air.is_none());
        assert!(detail.networks.is_empty());
    }

    #[test]
    fn review_rating_comes_from_author_details() {
        let raw = r#"{
            "results": [
                {"author": "a", "content": "Great.", "created_at": "2024-01-01T00:00:00Z",
                 "author_details": {"rating": 9.0}, "url": "https://r/1"},
                {"author": "b", "content": "Meh.", "author_details": {}}
            ]
        }"#;
        let page: ReviewPage = serde_json::from_str(raw).unwrap();
        let reviews: Vec<Review> = page.results.into_iter().map(Review::from_wire).collect();
        assert_eq!(reviews[0].rating, Some(9.0));
        assert_eq!(reviews[1].rating, None);
    }

    #[test]
    fn provider_regions_key_by_country() {
        let raw = r#"{
            "results": {
                "BR": {"link": "https://w/br", "flatrate": [{"provider_name": "Netflix", "logo_path": "/n.jpg"}]},
                "US": {"link": "https://w/us"}
            }
        }"#;
        let mut data: ProviderResponse = serde_json::from_str(raw).unwrap();
        let br = data.results.remove("BR").unwrap();
        assert_eq!(br.flatrate[0].provider_name, "Netflix");
        let us = data.results.remove("US").unwrap();
        assert!(us.flatrate.is_empty());
    }

    #[test]
    fn trailer_wins_over_teaser() {
        let videos = vec![
            Video {
                site: "YouTube".into(),
                video_type: "Teaser".into(),
                key: "teaser".into(),
                name: String::new(),
            },
            Video {
                site: "YouTube".into(),
                video_type: "Trailer".into(),
                key: "trailer".into(),
                name: String::new(),
            },
        ];
        assert_eq!(
            select_trailer(&videos).as_deref(),
            Some("https://www.youtube.com/watch?v=trailer")
        );
        assert_eq!(
            select_trailer(&videos[..1]).as_deref(),
            Some("https://www.youtube.com/watch?v=teaser")
        );
        assert_eq!(select_trailer(&[]), None);
    }
}
