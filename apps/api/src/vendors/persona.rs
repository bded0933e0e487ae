//! Persona API client: creates, inspects and ends avatar conversations.
//!
//! Speaks the Tavus-compatible REST surface (`/v2/conversations`).
//! Only reads are retried; creating or deleting twice is never safe to assume.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TavusConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_READ_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Persona API key and persona id must be configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response is missing '{0}'")]
    MissingField(&'static str),
}

/// Parameters for a new conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationRequest {
    pub conversation_name: Option<String>,
    pub conversational_context: Option<String>,
    pub callback_url: Option<String>,
}

/// The vendor's view of a conversation. `raw` keeps the full pass-through body.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub conversation_url: Option<String>,
    pub status: Option<String>,
    pub raw: Value,
}

impl Conversation {
    fn from_value(raw: Value) -> Result<Self, PersonaError> {
        let conversation_id = raw
            .get("conversation_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(PersonaError::MissingField("conversation_id"))?
            .to_string();

        Ok(Self {
            conversation_id,
            conversation_url: raw
                .get("conversation_url")
                .and_then(Value::as_str)
                .map(String::from),
            status: raw.get("status").and_then(Value::as_str).map(String::from),
            raw,
        })
    }
}

#[async_trait]
pub trait PersonaProvider: Send + Sync {
    async fn create_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<Conversation, PersonaError>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, PersonaError>;

    /// Ends a conversation. A conversation the vendor no longer knows counts as ended.
    async fn end_conversation(&self, conversation_id: &str) -> Result<(), PersonaError>;
}

#[derive(Debug, Serialize)]
struct CreateConversationBody<'a> {
    persona_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    replica_id: Option<&'a str>,
    conversation_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversational_context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct VendorErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct TavusClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    persona_id: Option<String>,
    replica_id: Option<String>,
}

impl TavusClient {
    pub fn new(config: &TavusConfig) -> Result<Self, PersonaError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            persona_id: config.persona_id.clone(),
            replica_id: config.replica_id.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PersonaError> {
        let api_key = self.api_key.as_deref().ok_or(PersonaError::NotConfigured)?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", api_key)
            .header("content-type", "application/json"))
    }

    /// GET with retry on 429 and 5xx. Backoff: 500ms, 1s.
    async fn get_with_retry(&self, path: &str) -> Result<Value, PersonaError> {
        let mut last_error: Option<PersonaError> = None;

        for attempt in 0..MAX_READ_ATTEMPTS {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "Persona API read attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.request(Method::GET, path)?.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(PersonaError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(api_error(response).await);
                continue;
            }
            if !status.is_success() {
                return Err(api_error(response).await);
            }

            return Ok(response.json::<Value>().await?);
        }

        Err(last_error.unwrap_or(PersonaError::Api {
            status: 429,
            message: format!("gave up after {MAX_READ_ATTEMPTS} attempts"),
        }))
    }
}

#[async_trait]
impl PersonaProvider for TavusClient {
    async fn create_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<Conversation, PersonaError> {
        let persona_id = self.persona_id.as_deref().ok_or(PersonaError::NotConfigured)?;

        let body = CreateConversationBody {
            persona_id,
            replica_id: self.replica_id.as_deref(),
            conversation_name: request
                .conversation_name
                .clone()
                .unwrap_or_else(|| format!("conversation_{}", Utc::now().to_rfc3339())),
            conversational_context: request.conversational_context.as_deref(),
            callback_url: request.callback_url.as_deref(),
        };

        info!("Creating persona conversation with persona {persona_id}");
        let response = self
            .request(Method::POST, "/v2/conversations")?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let conversation = Conversation::from_value(response.json::<Value>().await?)?;
        info!(
            "Created persona conversation {}",
            conversation.conversation_id
        );
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, PersonaError> {
        let raw = self
            .get_with_retry(&format!("/v2/conversations/{conversation_id}"))
            .await?;
        Conversation::from_value(raw)
    }

    async fn end_conversation(&self, conversation_id: &str) -> Result<(), PersonaError> {
        info!("Ending persona conversation {conversation_id}");
        let response = self
            .request(Method::DELETE, &format!("/v2/conversations/{conversation_id}"))?
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            debug!("Conversation {conversation_id} already gone on the vendor side");
            return Ok(());
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

async fn api_error(response: Response) -> PersonaError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!("Persona API returned {status}: {body}");
    PersonaError::Api {
        status,
        message: vendor_message(&body),
    }
}

/// Pulls a human-readable message out of a vendor error body.
fn vendor_message(body: &str) -> String {
    serde_json::from_str::<VendorErrorBody>(body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| body.to_string())
}
