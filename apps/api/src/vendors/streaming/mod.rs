//! Streaming provider client: room management plus participant access tokens.
//!
//! Rooms are managed over the LiveKit-compatible Twirp JSON API
//! (`/twirp/livekit.RoomService/*`), authorized with a short-lived server token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LiveKitConfig;

pub mod token;

use token::{sign_access_token, VideoGrant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SERVER_TOKEN_TTL_SECS: u64 = 600;
const ROOM_SERVICE: &str = "twirp/livekit.RoomService";

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("Streaming provider URL and credentials must be configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomOptions {
    pub name: String,
    /// Seconds an empty room survives before the provider closes it.
    pub empty_timeout: u32,
    pub max_participants: u32,
}

impl RoomOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            empty_timeout: 300,
            max_participants: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default, alias = "numParticipants", deserialize_with = "lenient_u64")]
    pub num_participants: u64,
    #[serde(default, alias = "creationTime", deserialize_with = "lenient_u64")]
    pub creation_time: u64,
}

#[derive(Debug, Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<Room>,
}

/// Who the token is for and which room it opens.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub room_name: String,
    pub identity: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Client-facing URL the browser connects to.
    fn url(&self) -> Option<&str>;

    fn is_configured(&self) -> bool;

    fn issue_token(&self, request: &TokenRequest) -> Result<String, StreamingError>;

    async fn create_room(&self, options: &RoomOptions) -> Result<Room, StreamingError>;

    async fn delete_room(&self, room_name: &str) -> Result<(), StreamingError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, StreamingError>;
}

#[derive(Clone)]
pub struct LiveKitClient {
    client: Client,
    url: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    token_ttl_secs: u64,
}

impl LiveKitClient {
    pub fn new(config: &LiveKitConfig) -> Result<Self, StreamingError> {
        if !config.is_configured() {
            warn!("Streaming provider credentials not configured");
        }
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            token_ttl_secs: config.token_ttl_secs,
        })
    }

    fn credentials(&self) -> Result<(&str, &str), StreamingError> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(StreamingError::NotConfigured),
        }
    }

    async fn twirp<B>(
        &self,
        method: &str,
        room: Option<&str>,
        body: &B,
    ) -> Result<reqwest::Response, StreamingError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let base = self
            .url
            .as_deref()
            .map(http_base_url)
            .ok_or(StreamingError::NotConfigured)?;
        let (key, secret) = self.credentials()?;
        let server_token = sign_access_token(
            key,
            secret,
            None,
            None,
            VideoGrant::room_service(room),
            SERVER_TOKEN_TTL_SECS,
        )?;

        let response = self
            .client
            .post(format!("{base}/{ROOM_SERVICE}/{method}"))
            .bearer_auth(server_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("msg").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            return Err(StreamingError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl StreamingProvider for LiveKitClient {
    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }

    fn issue_token(&self, request: &TokenRequest) -> Result<String, StreamingError> {
        let (key, secret) = self.credentials()?;
        info!(
            "Issuing streaming token for {} in room {}",
            request.identity, request.room_name
        );
        let token = sign_access_token(
            key,
            secret,
            Some(&request.identity),
            Some(request.name.as_deref().unwrap_or(&request.identity)),
            VideoGrant::participant(&request.room_name),
            self.token_ttl_secs,
        )?;
        Ok(token)
    }

    async fn create_room(&self, options: &RoomOptions) -> Result<Room, StreamingError> {
        info!("Creating streaming room {}", options.name);
        let response = self.twirp("CreateRoom", None, options).await?;
        let room: Room = response.json().await?;
        info!("Created streaming room {} (sid {})", room.name, room.sid);
        Ok(room)
    }

    async fn delete_room(&self, room_name: &str) -> Result<(), StreamingError> {
        info!("Deleting streaming room {room_name}");
        self.twirp("DeleteRoom", Some(room_name), &json!({ "room": room_name }))
            .await?;
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StreamingError> {
        let response = self.twirp("ListRooms", None, &json!({})).await?;
        let list: ListRoomsResponse = response.json().await?;
        Ok(list.rooms)
    }
}

/// Maps the client-facing WebSocket URL onto the HTTP origin of the API.
pub fn http_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        url.to_string()
    }
}

/// protojson encodes 64-bit integers as strings; accept both forms.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom("expected an unsigned integer")),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s.parse().map_err(de::Error::custom),
        Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("unexpected value {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    use super::*;
    use crate::testing::{RecordedRequest, ScriptedVendor};
    use super::token::AccessClaims;

    fn client(configured: bool) -> LiveKitClient {
        let config = if configured {
            LiveKitConfig {
                url: Some("wss://media.example.test".to_string()),
                api_key: Some("key".to_string()),
                api_secret: Some("secret".to_string()),
                token_ttl_secs: 900,
            }
        } else {
            LiveKitConfig {
                url: None,
                api_key: None,
                api_secret: None,
                token_ttl_secs: 900,
            }
        };
        LiveKitClient::new(&config).unwrap()
    }

    #[test]
    fn test_http_base_url() {
        assert_eq!(http_base_url("wss://lk.example.test/"), "https://lk.example.test");
        assert_eq!(http_base_url("ws://localhost:7880"), "http://localhost:7880");
        assert_eq!(http_base_url("https://already.http"), "https://already.http");
    }

    #[test]
    fn test_room_accepts_protojson_strings() {
        let room: Room = serde_json::from_str(
            r#"{"name": "avatar_1", "sid": "RM_x", "num_participants": 2, "creation_time": "1700000000"}"#,
        )
        .unwrap();
        assert_eq!(room.num_participants, 2);
        assert_eq!(room.creation_time, 1_700_000_000);

        let camel: Room =
            serde_json::from_str(r#"{"name": "r", "numParticipants": "3"}"#).unwrap();
        assert_eq!(camel.num_participants, 3);
        assert_eq!(camel.creation_time, 0);
    }

    #[test]
    fn test_issue_token_requires_credentials() {
        let request = TokenRequest {
            room_name: "r".to_string(),
            identity: "u".to_string(),
            name: None,
        };
        assert!(matches!(
            client(false).issue_token(&request),
            Err(StreamingError::NotConfigured)
        ));
        assert!(client(true).issue_token(&request).is_ok());
    }

    #[tokio::test]
    async fn test_room_calls_require_configuration() {
        let err = client(false).delete_room("r").await.unwrap_err();
        assert!(matches!(err, StreamingError::NotConfigured));
    }

    fn client_for(vendor: &ScriptedVendor) -> LiveKitClient {
        LiveKitClient::new(&LiveKitConfig {
            url: Some(vendor.url("ws")),
            api_key: Some("APIkey".to_string()),
            api_secret: Some("s3cret".to_string()),
            token_ttl_secs: 3600,
        })
        .unwrap()
    }

    fn bearer_claims(request: &RecordedRequest) -> AccessClaims {
        let header = request.headers["authorization"].to_str().unwrap();
        let token = header.strip_prefix("Bearer ").unwrap();
        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(b"s3cret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims
    }

    #[tokio::test]
    async fn test_create_room_calls_twirp_with_server_token() {
        let vendor = ScriptedVendor::start(vec![(
            200,
            json!({ "name": "avatar_1", "sid": "RM_abc", "creation_time": "1700000000" }),
        )])
        .await;

        let room = client_for(&vendor)
            .create_room(&RoomOptions::new("avatar_1"))
            .await
            .unwrap();
        assert_eq!(room.sid, "RM_abc");
        assert_eq!(vendor.hits(), 1);

        let request = &vendor.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/twirp/livekit.RoomService/CreateRoom");
        assert_eq!(request.body["name"], "avatar_1");
        assert_eq!(request.body["empty_timeout"], 300);

        let claims = bearer_claims(request);
        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.video.room_create, Some(true));
        assert_eq!(claims.video.room_list, Some(true));
    }

    #[tokio::test]
    async fn test_delete_room_scopes_token_to_room() {
        let vendor = ScriptedVendor::start(vec![(200, json!({}))]).await;

        client_for(&vendor).delete_room("avatar_2").await.unwrap();
        let request = &vendor.requests()[0];
        assert_eq!(request.path, "/twirp/livekit.RoomService/DeleteRoom");
        assert_eq!(request.body["room"], "avatar_2");
        let claims = bearer_claims(request);
        assert_eq!(claims.video.room.as_deref(), Some("avatar_2"));
        assert_eq!(claims.video.room_admin, Some(true));
    }

    #[tokio::test]
    async fn test_error_body_message_is_extracted() {
        let vendor = ScriptedVendor::start(vec![(
            404,
            json!({ "code": "not_found", "msg": "room not found" }),
        )])
        .await;

        let err = client_for(&vendor).delete_room("missing").await.unwrap_err();
        match err {
            StreamingError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "room not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
        // Room calls are never retried.
        assert_eq!(vendor.hits(), 1);
    }

    #[tokio::test]
    async fn test_list_rooms() {
        let vendor = ScriptedVendor::start(vec![(
            200,
            json!({ "rooms": [
                { "name": "avatar_a", "sid": "RM_a", "num_participants": 2 },
                { "name": "avatar_b", "sid": "RM_b" }
            ] }),
        )])
        .await;

        let rooms = client_for(&vendor).list_rooms().await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].num_participants, 2);
        assert_eq!(vendor.requests()[0].path, "/twirp/livekit.RoomService/ListRooms");
    }

    #[test]
    fn test_room_options_defaults() {
        let options = RoomOptions::new("avatar_x");
        assert_eq!(options.empty_timeout, 300);
        assert_eq!(options.max_participants, 10);
    }
}
