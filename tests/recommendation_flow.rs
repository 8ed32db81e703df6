use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use cineverse::chat::{ChatSession, Role};
use cineverse::gemini::GenerativeApi;
use cineverse::models::{CatalogItem, MediaKind};
use cineverse::prefs::{Language, Preferences};
use cineverse::storage::{KeyValueStorage, MemoryStorage};
use cineverse::tmdb::{CatalogApi, SeriesDetail};

/// Deterministic stand-in for the catalog: one hit per known title,
/// optional per-title failures, and a log of received queries.
struct FakeCatalog {
    by_title: HashMap<String, CatalogItem>,
    failing: Vec<String>,
    queries: Mutex<Vec<(String, Option<i32>)>>,
}

impl FakeCatalog {
    fn new(items: &[(i32, &str, MediaKind)]) -> Self {
        let by_title = items
            .iter()
            .map(|(id, title, kind)| (title.to_lowercase(), item(*id, title, *kind)))
            .collect();
        Self {
            by_title,
            failing: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, title: &str) -> Self {
        self.failing.push(title.to_lowercase());
        self
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn search_multi(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> anyhow::Result<Vec<CatalogItem>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), year));
        let key = query.to_lowercase();
        if self.failing.contains(&key) {
            return Err(anyhow!("catalog unavailable"));
        }
        Ok(self.by_title.get(&key).cloned().into_iter().collect())
    }

    async fn series_detail(&self, id: i32) -> anyhow::Result<SeriesDetail> {
        Err(anyhow!("not used in this suite ({id})"))
    }
}

struct FakeGemini {
    reply: anyhow::Result<String>,
}

#[async_trait]
impl GenerativeApi for FakeGemini {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(anyhow!("{e:#}")),
        }
    }
}

fn item(id: i32, title: &str, kind: MediaKind) -> CatalogItem {
    CatalogItem {
        id,
        kind,
        title: title.to_string(),
        release_date: None,
        poster_path: Some(format!("/p{id}.jpg")),
        backdrop_path: None,
        vote_average: None,
        overview: None,
        genre_ids: Vec::new(),
        genres: Vec::new(),
    }
}

fn catalog_of_five() -> FakeCatalog {
    FakeCatalog::new(&[
        (101, "Dune", MediaKind::Movie),
        (102, "Arrival", MediaKind::Movie),
        (103, "Dark", MediaKind::Series),
        (104, "Severance", MediaKind::Series),
        (105, "Coherence", MediaKind::Movie),
    ])
}

const WELL_FORMED: &str = "Great picks coming up!\n\n\
1. Dune (2021)\nReason: Epic scale.\n\
2. Arrival (2016)\nReason: Language as time.\n\
3. Dark (2017)\nReason: Knots in time.\n\
4. Severance (2022)\nReason: Work-life split.\n\
5. Coherence (2013)\nReason: Small and sharp.\n";

#[tokio::test]
async fn five_well_formed_lines_resolve_five_records() {
    let catalog = catalog_of_five();
    let mut session = ChatSession::load(Arc::new(MemoryStorage::new()));
    let gemini = FakeGemini {
        reply: Ok(WELL_FORMED.to_string()),
    };

    let reply = session
        .send("something mind-bending", Some(&gemini), &catalog)
        .await
        .unwrap()
        .expect("non-empty input produces a reply");

    assert_eq!(reply.role, Role::Assistant);
    let ids: Vec<i32> = reply.recommendations.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![101, 102, 103, 104, 105]);
    assert_eq!(session.recommendations().len(), 5);

    // The year hint travels with the query.
    let queries = catalog.queries.lock().unwrap();
    assert_eq!(queries[0], ("Dune".to_string(), Some(2021)));
}

#[tokio::test]
async fn malformed_line_is_skipped_without_aborting() {
    let catalog = catalog_of_five();
    let mut session = ChatSession::load(Arc::new(MemoryStorage::new()));
    let text = "1. Dune (2021)\n\
2. Arrival (2016)\n\
Dark, which you will love\n\
4. Severance (2022)\n\
5. Coherence (2013)\n";
    let gemini = FakeGemini {
        reply: Ok(text.to_string()),
    };

    let reply = session
        .send("anything", Some(&gemini), &catalog)
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<i32> = reply.recommendations.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![101, 102, 104, 105]);
}

#[tokio::test]
async fn one_failing_search_does_not_abort_the_rest() {
    let catalog = catalog_of_five().failing("dark");
    let mut session = ChatSession::load(Arc::new(MemoryStorage::new()));
    let gemini = FakeGemini {
        reply: Ok(WELL_FORMED.to_string()),
    };

    let reply = session
        .send("anything", Some(&gemini), &catalog)
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<i32> = reply.recommendations.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![101, 102, 104, 105]);
    // The transcript still shows the full generated text.
    assert!(reply.content.contains("3. Dark (2017)"));
}

#[tokio::test]
async fn recommendation_set_accumulates_without_duplicates() {
    let catalog = catalog_of_five();
    let mut session = ChatSession::load(Arc::new(MemoryStorage::new()));

    let first = FakeGemini {
        reply: Ok("1. Dune (2021)\n2. Dark (2017)\n".to_string()),
    };
    session.send("round one", Some(&first), &catalog).await.unwrap();
    assert_eq!(session.recommendations().len(), 2);

    let second = FakeGemini {
        reply: Ok("1. Dune (2021)\n2. Severance (2022)\n".to_string()),
    };
    let reply = session
        .send("round two", Some(&second), &catalog)
        .await
        .unwrap()
        .unwrap();

    // The message keeps its own resolved list; the set grows by one.
    assert_eq!(reply.recommendations.len(), 2);
    let ids: Vec<i32> = session.recommendations().items().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![101, 103, 104]);
}

#[tokio::test]
async fn missing_key_produces_a_localized_message_and_no_network_call() {
    let catalog = catalog_of_five();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
    Preferences::new(storage.clone())
        .set_language(Language::PtBr)
        .unwrap();

    let mut session = ChatSession::load(storage);
    let reply = session
        .send("recommend me something", None, &catalog)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply.role, Role::Assistant);
    assert!(reply.content.contains("Chave da API do Gemini não configurada"));
    assert!(reply.recommendations.is_empty());
    // No user message is appended and the catalog is never queried.
    assert_eq!(session.messages().len(), 1);
    assert!(catalog.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_http_error_surfaces_status_and_body_in_chat() {
    let catalog = catalog_of_five();
    let mut session = ChatSession::load(Arc::new(MemoryStorage::new()));
    let gemini = FakeGemini {
        reply: Err(anyhow!(
            "Generative provider HTTP error (status 503): model overloaded"
        )),
    };

    let reply = session
        .send("anything", Some(&gemini), &catalog)
        .await
        .unwrap()
        .unwrap();

    assert!(reply.content.contains("Details:"));
    assert!(reply.content.contains("503"));
    assert!(reply.content.contains("model overloaded"));
    assert!(reply.recommendations.is_empty());
    // The user message made it into the transcript before the failure.
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[0].role, Role::User);
}

#[tokio::test]
async fn transcript_and_set_survive_a_reload_and_clear_wipes_them() {
    let catalog = catalog_of_five();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());

    let mut session = ChatSession::load(storage.clone());
    let gemini = FakeGemini {
        reply: Ok("1. Dune (2021)\n".to_string()),
    };
    session.send("hi", Some(&gemini), &catalog).await.unwrap();
    drop(session);

    let mut reloaded = ChatSession::load(storage.clone());
    assert_eq!(reloaded.messages().len(), 2);
    assert_eq!(reloaded.recommendations().len(), 1);

    reloaded.clear().unwrap();
    drop(reloaded);
    let after_clear = ChatSession::load(storage);
    assert!(after_clear.messages().is_empty());
    assert!(after_clear.recommendations().is_empty());
}
