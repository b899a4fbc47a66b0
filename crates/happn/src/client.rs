//! Capability boundary to the Happn platform.
//!
//! The HTTP transport, token exchange, and wire protocol live behind the
//! [`HappnClient`] trait; the adapter only consumes the typed payloads and
//! matches on the error kind.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::error::Error as StdError,
};

/// Result type for platform client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors a platform client call can signal.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The platform rejected the current session (expired/invalid token).
    #[error("happn rejected the session")]
    NotAuthorized,

    /// Any other platform failure; passes through to the caller unchanged.
    #[error("happn request failed: {context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ClientError {
    #[must_use]
    pub fn platform(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Platform {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<ClientError> for amora_channels::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotAuthorized => Self::NotAuthorized,
            ClientError::Platform { context, source } => Self::External { context, source },
        }
    }
}

/// Session tokens resolved by the social-login token exchange.
#[derive(Debug, Clone)]
pub struct HappnTokens {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// One profile photo as the platform sends it.  Normalization keeps only
/// `id` and `url`; the rest survives inside the raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HappnProfilePhoto {
    pub id: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A user profile payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HappnUser {
    pub id: String,
    pub first_name: String,
    /// Platform relation code; `4` means a mutual match.
    #[serde(default)]
    pub my_relation: i64,
    #[serde(default)]
    pub profiles: Vec<HappnProfilePhoto>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One notification item from the recommendations or updates feeds, newest
/// first within a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HappnNotification {
    pub notifier: HappnUser,
    pub creation_date: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The Happn platform client capability consumed by the adapter.
///
/// Every method may signal [`ClientError::NotAuthorized`] when the platform
/// considers the supplied token expired or invalid.
#[async_trait]
pub trait HappnClient: Send + Sync {
    /// Exchange a Facebook login token for a platform session.
    async fn authorize(&self, facebook_access_token: &str) -> ClientResult<HappnTokens>;

    /// Fetch up to `limit` recommendation candidates.
    async fn get_recommendations(
        &self,
        access_token: &str,
        limit: u32,
    ) -> ClientResult<Vec<HappnNotification>>;

    /// Fetch one page of the match notification feed.
    async fn get_updates(
        &self,
        access_token: &str,
        limit: u32,
        offset: u32,
    ) -> ClientResult<Vec<HappnNotification>>;

    /// Like a user.
    async fn like(&self, access_token: &str, user_id: &str) -> ClientResult<()>;

    /// Fetch a single user profile.
    async fn get_user(&self, access_token: &str, user_id: &str) -> ClientResult<HappnUser>;
}
