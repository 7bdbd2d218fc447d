use crate::core::config::ServerConfig;
use crate::core::error::GenerationError;
use crate::core::state::{Episode, Importance, Parameters, Perspective, Prompt, StoryBible};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use url::Url;

pub const UNKNOWN_ERROR: &str = "An unknown error occurred";
pub const PDF_FAILED: &str = "Failed to generate PDF";
pub const MISSING_CONTENT: &str = "No content generated. Please try again.";

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_PDF: &str = "application/pdf";

/// The remote story generation service.
///
/// Every call is a single attempt: no retry, no backoff. A failure leaves the
/// caller's state untouched.
#[async_trait]
pub trait GenerationClient: Send + Sync + Debug {
    async fn request_perspectives(
        &self,
        prompt: &Prompt,
    ) -> Result<Vec<Perspective>, GenerationError>;

    async fn request_story_bible(
        &self,
        request: &StoryBibleRequest<'_>,
    ) -> Result<StoryBible, GenerationError>;

    async fn request_episode(
        &self,
        story_bible: &StoryBible,
        episode_number: u32,
        previous_episodes: &[Episode],
    ) -> Result<Episode, GenerationError>;

    async fn render_episode_document(
        &self,
        request: &EpisodeDocumentRequest<'_>,
    ) -> Result<Vec<u8>, GenerationError>;

    async fn render_story_bible_document(
        &self,
        story_bible: &StoryBible,
    ) -> Result<Vec<u8>, GenerationError>;
}

/// Body of `/generate-story-bible`. The two shapes are not interchangeable.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StoryBibleRequest<'a> {
    Classic {
        perspective: &'a Perspective,
        parameters: &'a Parameters,
        importance: &'a Importance,
    },
    Prompted {
        prompt: &'a Prompt,
        perspective: &'a Perspective,
        parameters: &'a Parameters,
    },
}

impl StoryBibleRequest<'_> {
    pub fn perspective(&self) -> &Perspective {
        match self {
            StoryBibleRequest::Classic { perspective, .. } => perspective,
            StoryBibleRequest::Prompted { perspective, .. } => perspective,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDocumentRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub story_title: &'a str,
    pub episode_number: u32,
}

impl<'a> EpisodeDocumentRequest<'a> {
    pub fn new(story_bible: &'a StoryBible, episode: &'a Episode) -> Self {
        Self {
            title: &episode.title,
            content: &episode.content,
            story_title: &story_bible.title,
            episode_number: episode.number,
        }
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct PerspectivesBody<'a> {
    query: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeBody<'a> {
    story_bible: &'a StoryBible,
    episode_number: u32,
    previous_episodes: &'a [Episode],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoryBibleDocumentBody<'a> {
    story_bible: &'a StoryBible,
    title: &'a str,
}

#[derive(Deserialize, Default)]
struct EpisodePayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    scenes: Option<Vec<Value>>,
}

impl EpisodePayload {
    // Empty strings count as missing, like the fields that never arrived.
    fn into_episode(self, number: u32) -> Episode {
        Episode {
            number,
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Episode {}", number)),
            content: self
                .content
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| MISSING_CONTENT.to_string()),
            scenes: self.scenes.unwrap_or_default(),
        }
    }
}

fn preview(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() > LIMIT {
        format!("{}...", body.chars().take(LIMIT).collect::<String>())
    } else {
        body.to_string()
    }
}

/// Unwraps a `{ success, <field>, error }` envelope.
fn read_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    field: &str,
) -> Result<T, GenerationError> {
    let mut envelope: Map<String, Value> = match serde_json::from_str(body) {
        Ok(map) => map,
        Err(e) => {
            if !status.is_success() {
                return Err(GenerationError::Status {
                    status,
                    body: body.to_string(),
                });
            }
            return Err(GenerationError::Decode {
                message: format!("{} (body: {})", e, preview(body)),
            });
        }
    };

    let success = envelope
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        let message = envelope
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();
        return Err(GenerationError::Application { message });
    }

    let payload = envelope.remove(field).unwrap_or(Value::Null);
    serde_json::from_value(payload).map_err(|e| GenerationError::Decode {
        message: format!("invalid {}: {}", field, e),
    })
}

// --- HTTP implementation ---

#[derive(Debug)]
struct Endpoints {
    perspectives: Url,
    story_bible: Url,
    episode: Url,
    episode_document: Url,
    story_bible_document: Url,
}

#[derive(Debug)]
pub struct HttpGenerationClient {
    base_url: Url,
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl HttpGenerationClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let endpoints = Endpoints {
            perspectives: base_url.join("generate")?,
            story_bible: base_url.join("generate-story-bible")?,
            episode: base_url.join("generate_episode")?,
            episode_document: base_url.join("generate-episode-pdf")?,
            story_bible_document: base_url.join("generate-story-bible-pdf")?,
        };

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            endpoints,
            client,
        })
    }

    fn transport(&self, source: reqwest::Error) -> GenerationError {
        let url = self.base_url.to_string();
        if source.is_timeout() {
            GenerationError::Timeout { url, source }
        } else {
            GenerationError::Transport { url, source }
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &B,
        accept: &str,
    ) -> Result<reqwest::Response, GenerationError> {
        log::debug!("POST {}", url);
        self.client
            .post(url.clone())
            .header(ACCEPT, accept)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport(e))
    }

    async fn post_for_text<B: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<(StatusCode, String), GenerationError> {
        let resp = self.post(url, body, APPLICATION_JSON).await?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport(e))?;
        log::debug!("{} answered {} ({} bytes)", url, status, text.len());
        Ok((status, text))
    }

    async fn post_for_document<B: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<Vec<u8>, GenerationError> {
        let resp = self.post(url, body, APPLICATION_PDF).await?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());
        let bytes = resp.bytes().await.map_err(|e| self.transport(e))?;

        match content_type.as_deref() {
            Some(ct) if ct.contains(APPLICATION_JSON) => {
                let message = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| PDF_FAILED.to_string());
                Err(GenerationError::Application { message })
            }
            Some(ct) if ct.contains(APPLICATION_PDF) && status.is_success() => Ok(bytes.to_vec()),
            _ if !status.is_success() => Err(GenerationError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).to_string(),
            }),
            other => Err(GenerationError::UnexpectedContentType {
                content_type: other.map(str::to_string),
            }),
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn request_perspectives(
        &self,
        prompt: &Prompt,
    ) -> Result<Vec<Perspective>, GenerationError> {
        let body = PerspectivesBody {
            query: prompt.as_str(),
        };
        let (status, text) = self.post_for_text(&self.endpoints.perspectives, &body).await?;
        let cards: Option<Vec<Value>> = read_envelope(status, &text, "perspectives")?;
        Ok(cards
            .unwrap_or_default()
            .into_iter()
            .filter_map(|card| match Perspective::from_value(card) {
                Ok(perspective) => Some(perspective),
                Err(e) => {
                    log::warn!("skipping perspective: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn request_story_bible(
        &self,
        request: &StoryBibleRequest<'_>,
    ) -> Result<StoryBible, GenerationError> {
        let (status, text) = self.post_for_text(&self.endpoints.story_bible, request).await?;
        let raw: Option<Value> = read_envelope(status, &text, "storyBible")?;
        let raw = raw.ok_or_else(|| GenerationError::Decode {
            message: "response did not include a story bible".to_string(),
        })?;
        StoryBible::from_value(raw).map_err(|e| GenerationError::Decode {
            message: format!("invalid storyBible: {}", e),
        })
    }

    async fn request_episode(
        &self,
        story_bible: &StoryBible,
        episode_number: u32,
        previous_episodes: &[Episode],
    ) -> Result<Episode, GenerationError> {
        let body = EpisodeBody {
            story_bible,
            episode_number,
            previous_episodes,
        };
        let (status, text) = self.post_for_text(&self.endpoints.episode, &body).await?;
        if !status.is_success() {
            return Err(GenerationError::Status { status, body: text });
        }

        let payload: EpisodePayload =
            serde_json::from_str(&text).map_err(|e| GenerationError::Decode {
                message: format!("{} (body: {})", e, preview(&text)),
            })?;
        Ok(payload.into_episode(episode_number))
    }

    async fn render_episode_document(
        &self,
        request: &EpisodeDocumentRequest<'_>,
    ) -> Result<Vec<u8>, GenerationError> {
        self.post_for_document(&self.endpoints.episode_document, request)
            .await
    }

    async fn render_story_bible_document(
        &self,
        story_bible: &StoryBible,
    ) -> Result<Vec<u8>, GenerationError> {
        let title = if story_bible.title.trim().is_empty() {
            "Story Bible"
        } else {
            story_bible.title.as_str()
        };
        let body = StoryBibleDocumentBody { story_bible, title };
        self.post_for_document(&self.endpoints.story_bible_document, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_failure_uses_backend_message() {
        let err = read_envelope::<Value>(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success": false, "error": "model overloaded"}"#,
            "perspectives",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "model overloaded");
    }

    #[test]
    fn test_envelope_without_success_flag_is_a_failure() {
        let err = read_envelope::<Value>(
            StatusCode::BAD_REQUEST,
            r#"{"error": "No query provided"}"#,
            "perspectives",
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Application { ref message } if message == "No query provided"));

        let err = read_envelope::<Value>(StatusCode::OK, r#"{"success": false}"#, "x").unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_ERROR);
    }

    #[test]
    fn test_envelope_non_json_error_keeps_status() {
        let err = read_envelope::<Value>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>", "x")
            .unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: StatusCode::BAD_GATEWAY, .. }));
        assert!(err.to_string().contains("502"));

        let err = read_envelope::<Value>(StatusCode::OK, "not json", "x").unwrap_err();
        assert!(matches!(err, GenerationError::Decode { .. }));
    }

    #[test]
    fn test_episode_payload_fallbacks() {
        let payload: EpisodePayload = serde_json::from_str(r#"{"title": "", "scenes": null}"#).unwrap();
        let episode = payload.into_episode(4);
        assert_eq!(episode.number, 4);
        assert_eq!(episode.title, "Episode 4");
        assert_eq!(episode.content, MISSING_CONTENT);
        assert!(episode.scenes.is_empty());
    }
}
