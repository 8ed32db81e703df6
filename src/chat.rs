use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::gemini::GenerativeApi;
use crate::models::CatalogItem;
use crate::prefs::{Language, Preferences};
use crate::recommend::{self, RecommendationSet};
use crate::storage::{self, read_json_or_default, KeyValueStorage};
use crate::tmdb::CatalogApi;

/// Selected-media context sent with a prompt is capped like the original UI.
pub const MAX_SELECTED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Catalog records resolved out of this assistant reply; empty for user
    /// messages and for replies where nothing resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<CatalogItem>,
}

/// A persistent chat with the generative provider. The transcript, the
/// selected-media list and the accumulated recommendation set survive
/// reloads; every append writes through to storage before returning.
pub struct ChatSession {
    storage: Arc<dyn KeyValueStorage>,
    prefs: Preferences,
    messages: Vec<ChatMessage>,
    selected: Vec<CatalogItem>,
    recommendations: RecommendationSet,
}

impl ChatSession {
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let messages = read_json_or_default(storage.as_ref(), storage::CHAT_MESSAGES);
        let selected = read_json_or_default(storage.as_ref(), storage::SELECTED_MEDIA);
        let recommendations = read_json_or_default(storage.as_ref(), storage::RECOMMENDATIONS);
        let prefs = Preferences::new(storage.clone());
        Self {
            storage,
            prefs,
            messages,
            selected,
            recommendations,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn selected(&self) -> &[CatalogItem] {
        &self.selected
    }

    pub fn recommendations(&self) -> &RecommendationSet {
        &self.recommendations
    }

    /// Deselects the item if it is already selected, selects it otherwise.
    /// Selecting past the cap is a no-op. Returns whether the item is
    /// selected after the call.
    pub fn toggle_selected(&mut self, item: CatalogItem) -> Result<bool> {
        let selected = if let Some(pos) = self.selected.iter().position(|m| m.id == item.id) {
            self.selected.remove(pos);
            false
        } else if self.selected.len() < MAX_SELECTED {
            self.selected.push(item);
            true
        } else {
            return Ok(false);
        };
        self.persist(storage::SELECTED_MEDIA, &self.selected)?;
        Ok(selected)
    }

    /// Drops the transcript, the selection and the recommendation set.
    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.selected.clear();
        self.recommendations.clear();
        self.storage.delete(storage::CHAT_MESSAGES)?;
        self.storage.delete(storage::SELECTED_MEDIA)?;
        self.storage.delete(storage::RECOMMENDATIONS)?;
        Ok(())
    }

    /// Clears only the accumulated recommendation grid.
    pub fn clear_recommendations(&mut self) -> Result<()> {
        self.recommendations.clear();
        self.storage.delete(storage::RECOMMENDATIONS)
    }

    /// Runs one chat turn. A missing generative client (no API key) and any
    /// provider failure become localized assistant messages in the
    /// transcript; neither propagates as an error. `Ok(None)` means the
    /// input was blank and nothing happened.
    pub async fn send(
        &mut self,
        input: &str,
        gemini: Option<&dyn GenerativeApi>,
        catalog: &dyn CatalogApi,
    ) -> Result<Option<ChatMessage>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        let language = self.prefs.language();

        let Some(gemini) = gemini else {
            let message = ChatMessage {
                role: Role::Assistant,
                content: missing_key_message(language).to_string(),
                recommendations: Vec::new(),
            };
            self.push_message(message.clone())?;
            return Ok(Some(message));
        };

        self.push_message(ChatMessage {
            role: Role::User,
            content: input.to_string(),
            recommendations: Vec::new(),
        })?;

        let prompt = build_prompt(input, &self.selected, language);
        let reply = match gemini.generate(&prompt).await {
            Ok(text) => {
                let resolved = recommend::reconcile(catalog, &text).await;
                let added = self.recommendations.merge(&resolved);
                if added > 0 {
                    self.persist(storage::RECOMMENDATIONS, &self.recommendations)?;
                }
                info!(
                    "Assistant reply resolved {} record(s), {} new",
                    resolved.len(),
                    added
                );
                ChatMessage {
                    role: Role::Assistant,
                    content: text,
                    recommendations: resolved,
                }
            }
            Err(e) => {
                warn!("Generative call failed: {e:#}");
                ChatMessage {
                    role: Role::Assistant,
                    content: failure_message(language, &e),
                    recommendations: Vec::new(),
                }
            }
        };
        self.push_message(reply.clone())?;
        Ok(Some(reply))
    }

    fn push_message(&mut self, message: ChatMessage) -> Result<()> {
        self.messages.push(message);
        self.persist(storage::CHAT_MESSAGES, &self.messages)
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized =
            serde_json::to_string(value).with_context(|| format!("Failed to serialize {key}"))?;
        self.storage.write(key, &serialized)
    }
}

fn missing_key_message(language: Language) -> &'static str {
    match language {
        Language::PtBr => {
            "Erro: Chave da API do Gemini não configurada. Por favor, defina GEMINI_API_KEY no arquivo .env"
        }
        Language::EnUs => {
            "Error: Gemini API key not configured. Please set GEMINI_API_KEY in your .env file"
        }
    }
}

fn failure_message(language: Language, error: &anyhow::Error) -> String {
    match language {
        Language::PtBr => format!(
            "Desculpe, ocorreu um erro ao gerar recomendações.\n\nDetalhes: {error:#}"
        ),
        Language::EnUs => format!(
            "Sorry, an error occurred while generating recommendations.\n\nDetails: {error:#}"
        ),
    }
}

/// Prompt the generative provider with the exact output contract the
/// extraction grammar understands: five numbered "Title (Year)" lines, each
/// followed by a one-line reason, no markdown.
fn build_prompt(user_message: &str, selected: &[CatalogItem], language: Language) -> String {
    let (answer_language, title_rule) = match language {
        Language::PtBr => (
            "Brazilian Portuguese",
            "Use the PORTUGUESE titles as they appear in Brazil",
        ),
        Language::EnUs => (
            "English",
            "Use the EXACT English titles as they appear in the catalog",
        ),
    };

    let mut prompt = String::from(
        "You are CineVerse AI, a specialist in movie, series and anime recommendations.\n\n",
    );
    if !selected.is_empty() {
        let titles = selected
            .iter()
            .map(|m| m.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!("CONTEXT: The user likes: {titles}\n\n"));
    }
    prompt.push_str(&format!("USER QUESTION: {user_message}\n\n"));
    prompt.push_str(&format!(
        "FORMAT INSTRUCTIONS (IMPORTANT):\n\n\
         Answer in {answer_language} following EXACTLY this format:\n\n\
         [1-2 friendly, enthusiastic introduction sentences]\n\n"
    ));
    for n in 1..=5 {
        prompt.push_str(&format!(
            "{n}. [Exact Title] ([Year])\nReason: [1 short, direct sentence explaining why it fits the user]\n\n"
        ));
    }
    prompt.push_str(&format!(
        "IMPORTANT RULES:\n\
         - {title_rule}\n\
         - Year in parentheses right after the title\n\
         - Every reason starts with \"Reason:\"\n\
         - Be enthusiastic and personal\n\
         - Reasons should be 15-25 words\n\
         - Do NOT use asterisks, hashes or markdown\n\
         - Do NOT add extra information outside the format\n\
         - Provide EXACTLY 5 recommendations"
    ));
    prompt
}
