use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::canvas::Snapshot;
use crate::words::Language;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_TOKENS: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("invalid image format, expected a base64 image")]
    InvalidImage,
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(String),
    #[error("service answered with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("round was superseded")]
    Cancelled,
    #[error("no answer within {0:?}")]
    TimedOut(Duration),
}

/// Flag shared between the engine and an in-flight classification. Tripped
/// when the round that issued the call is superseded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Image-to-label service. Implementations may block; the engine calls them
/// from a worker thread.
pub trait Classifier: Send + Sync + 'static {
    fn classify(
        &self,
        snapshot: &Snapshot,
        language: Language,
        cancel: &CancelToken,
    ) -> Result<String, ClassifyError>;
}

/// Instruction sent along with the drawing
pub fn prompt_for(language: Language) -> &'static str {
    match language {
        Language::English => "This is a hand-drawn image, like those in a children's game. Respond with ONLY ONE ENGLISH WORD that directly describes what it represents. If you don't receive any image, respond with \"none\".",
        Language::Italian => "Questa è un'immagine disegnata a mano, come quelle di un gioco per bambini. Rispondi con UNA SOLA PAROLA ITALIANA che descrive in modo diretto ciò che rappresenta. Se non ricevi nessuna immagine, rispondi con \"nessuna\".",
    }
}

/// Trim, lowercase and drop punctuation from a raw model answer
pub fn clean_label(raw: &str, language: Language) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        language.undefined_label().to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions vision endpoint
pub struct VisionClassifier {
    client: reqwest::blocking::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl VisionClassifier {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, data_url: String, language: Language) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt_for(language),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url,
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: MAX_TOKENS,
        }
    }
}

impl Classifier for VisionClassifier {
    fn classify(
        &self,
        snapshot: &Snapshot,
        language: Language,
        cancel: &CancelToken,
    ) -> Result<String, ClassifyError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifyError::MissingApiKey)?;

        let data_url = snapshot.to_data_url();
        if snapshot.png().is_empty() || !data_url.starts_with("data:image/") {
            return Err(ClassifyError::InvalidImage);
        }

        if cancel.is_cancelled() {
            return Err(ClassifyError::Cancelled);
        }

        debug!("classifying {} byte drawing ({language})", snapshot.png().len());
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.request_body(data_url, language))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("classifier timed out: {e}");
                }
                ClassifyError::Http(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;

        let raw = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(clean_label(&raw, language))
    }
}
