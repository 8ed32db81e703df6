pub mod calendar;
pub mod chat;
pub mod config;
pub mod gemini;
pub mod models;
pub mod prefs;
pub mod profile;
pub mod recommend;
pub mod search;
pub mod storage;
pub mod store;
pub mod tmdb;

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::chat::ChatSession;
use crate::config::Settings;
use crate::gemini::GeminiClient;
use crate::prefs::Preferences;
use crate::search::SearchSession;
use crate::storage::{FileStorage, KeyValueStorage};
use crate::store::WatchStore;
use crate::tmdb::TmdbClient;

/// Log setup for the embedding host. Defaults to `info` unless `RUST_LOG`
/// says otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Everything a host needs, wired over one storage backend. The generative
/// client is `None` when no key is configured; the chat surface turns that
/// into a user-visible message rather than an error.
pub struct App {
    pub storage: Arc<dyn KeyValueStorage>,
    pub prefs: Arc<Preferences>,
    pub catalog: Arc<TmdbClient>,
    pub gemini: Option<Arc<GeminiClient>>,
    pub store: WatchStore,
    pub search: SearchSession,
}

impl App {
    pub fn from_env() -> Result<Self> {
        let settings = Settings::from_env()?;
        let storage: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::new(settings.data_dir.clone()));
        Self::with_storage(&settings, storage)
    }

    pub fn with_storage(settings: &Settings, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let prefs = Arc::new(Preferences::new(storage.clone()));
        let catalog = Arc::new(TmdbClient::new(settings, prefs.clone())?);
        let gemini = match &settings.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(key)?)),
            None => None,
        };
        let store = WatchStore::load(storage.clone());
        Ok(Self {
            storage,
            prefs,
            catalog,
            gemini,
            store,
            search: SearchSession::new(),
        })
    }

    /// Loads the persisted chat transcript, selection and recommendation
    /// set from this app's backend.
    pub fn chat_session(&self) -> ChatSession {
        ChatSession::load(self.storage.clone())
    }
}
