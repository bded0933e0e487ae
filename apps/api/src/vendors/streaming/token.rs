//! Access tokens for the streaming provider: HS256 JWTs carrying a `video` grant.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room permissions. Unset fields are left out of the token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_publish_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_admin: Option<bool>,
}

impl VideoGrant {
    /// Full participant permissions inside a single room.
    pub fn participant(room: &str) -> Self {
        Self {
            room_join: Some(true),
            room: Some(room.to_string()),
            can_publish: Some(true),
            can_subscribe: Some(true),
            can_publish_data: Some(true),
            ..Default::default()
        }
    }

    /// Server-side room management (create, list, delete).
    pub fn room_service(room: Option<&str>) -> Self {
        Self {
            room: room.map(String::from),
            room_create: Some(true),
            room_list: Some(true),
            room_admin: room.map(|_| true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nbf: u64,
    pub exp: u64,
    pub jti: String,
    pub video: VideoGrant,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn sign_access_token(
    api_key: &str,
    api_secret: &str,
    identity: Option<&str>,
    name: Option<&str>,
    grant: VideoGrant,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let issued = now();
    let claims = AccessClaims {
        iss: api_key.to_string(),
        sub: identity.map(String::from),
        name: name.map(String::from),
        nbf: issued,
        exp: issued + ttl_secs,
        jti: identity
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        video: grant,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
}
