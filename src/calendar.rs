use chrono::{Datelike, Local, NaiveDate};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::{CatalogItem, MediaKind, UpcomingEpisode};
use crate::prefs::Language;
use crate::tmdb::CatalogApi;

/// One future-dated entry projected from the watchlist. Derived data:
/// recomputed in full on every view activation, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: i32,
    pub title: String,
    pub date: NaiveDate,
    pub kind: MediaKind,
    pub image: Option<String>,
    pub episode: Option<UpcomingEpisode>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGroup {
    pub label: String,
    pub events: Vec<CalendarEvent>,
}

/// Date-only "now", time truncated to midnight.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Projects the watchlist into future events, ascending by date. Entries
/// are deduplicated by id (first occurrence wins); per-series lookups run
/// concurrently and a failed one only drops its own event.
pub async fn upcoming_events(
    catalog: &dyn CatalogApi,
    watchlist: &[CatalogItem],
    today: NaiveDate,
) -> Vec<CalendarEvent> {
    let mut seen = HashSet::new();
    let unique: Vec<&CatalogItem> = watchlist.iter().filter(|item| seen.insert(item.id)).collect();

    let fetches = unique.into_iter().map(|item| event_for(catalog, item, today));
    let mut events: Vec<CalendarEvent> = join_all(fetches).await.into_iter().flatten().collect();
    events.sort_by_key(|e| e.date);
    events
}

async fn event_for(
    catalog: &dyn CatalogApi,
    item: &CatalogItem,
    today: NaiveDate,
) -> Option<CalendarEvent> {
    match item.kind {
        MediaKind::Movie => {
            let date = parse_date(item.release_date.as_deref()?)?;
            if date < today {
                return None;
            }
            Some(CalendarEvent {
                id: item.id,
                title: item.title.clone(),
                date,
                kind: MediaKind::Movie,
                image: item.backdrop_path.clone().or_else(|| item.poster_path.clone()),
                episode: None,
                network: None,
            })
        }
        MediaKind::Series => {
            let detail = match catalog.series_detail(item.id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("Skipping series {} in calendar: {e:#}", item.id);
                    return None;
                }
            };
            let Some(next) = detail.next_episode_to_air else {
                debug!("Series {} has no scheduled next episode", item.id);
                return None;
            };
            let date = parse_date(next.air_date.as_deref()?)?;
            if date < today {
                return None;
            }
            Some(CalendarEvent {
                id: item.id,
                title: detail.name,
                date,
                kind: MediaKind::Series,
                image: detail
                    .backdrop_path
                    .or(detail.poster_path),
                network: detail.networks.first().map(|n| n.name.clone()),
                episode: Some(next),
            })
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Splits a date-sorted event list into consecutive month-year groups,
/// labelled in the active display language.
pub fn group_by_month(events: &[CalendarEvent], language: Language) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    let mut last_key = None;
    for event in events {
        let key = (event.date.year(), event.date.month());
        if last_key != Some(key) {
            groups.push(MonthGroup {
                label: month_label(event.date, language),
                events: Vec::new(),
            });
            last_key = Some(key);
        }
        if let Some(group) = groups.last_mut() {
            group.events.push(event.clone());
        }
    }
    groups
}

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const MONTHS_PT: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

fn month_label(date: NaiveDate, language: Language) -> String {
    match language {
        Language::EnUs => format!("{} {}", MONTHS_EN[date.month0() as usize], date.year()),
        Language::PtBr => format!("{} de {}", MONTHS_PT[date.month0() as usize], date.year()),
    }
}

/// Countdown tag shown next to an event.
pub fn days_until_label(date: NaiveDate, today: NaiveDate, language: Language) -> String {
    let days = (date - today).num_days();
    match (language, days) {
        (Language::PtBr, d) if d <= 0 => "Hoje!".to_string(),
        (Language::EnUs, d) if d <= 0 => "Today!".to_string(),
        (Language::PtBr, 1) => "Amanhã".to_string(),
        (Language::EnUs, 1) => "Tomorrow".to_string(),
        (Language::PtBr, d) => format!("Em {d} dias"),
        (Language::EnUs, d) => format!("In {d} days"),
    }
}
