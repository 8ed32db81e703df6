use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone)]
pub struct Settings {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    /// Absent key is a supported state: the chat surface reports it to the
    /// user instead of attempting a request.
    pub gemini_api_key: Option<String>,
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {:?}", path),
            Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
        }

        let tmdb_api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let tmdb_base_url =
            env::var("TMDB_BASE_URL").unwrap_or_else(|_| DEFAULT_TMDB_BASE.to_string());
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty());
        let data_dir = match env::var("CINEVERSE_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .map(|d| d.join("cineverse"))
                .context("No platform data directory; set CINEVERSE_DATA_DIR")?,
        };

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            gemini_api_key,
            data_dir,
        })
    }
}
