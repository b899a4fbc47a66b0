use {async_trait::async_trait, chrono::{DateTime, Utc}, serde::Serialize};

use crate::Result;

// ── Normalized records ──────────────────────────────────────────────────────

/// A single profile photo, reduced to the two fields every platform provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photo {
    pub url: String,
    pub id: String,
}

/// The normalized candidate/match record emitted by every data-returning
/// adapter operation.
///
/// `channel` always carries the adapter's fixed platform identifier;
/// `data` carries the raw platform payload for downstream consumers that
/// need platform-specific fields.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub channel: String,
    pub channel_id: String,
    pub name: String,
    pub photos: Vec<Photo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    pub data: serde_json::Value,
}

/// A single message inside an update notification.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub channel_id: String,
    pub text: String,
    pub sent_date: DateTime<Utc>,
}

/// One update produced by [`ChannelAdapter::get_updates`] — currently always
/// a new match paired with an (empty) message list.
#[derive(Debug, Clone, Serialize)]
pub struct Update {
    pub is_new_match: bool,
    pub recommendation: Recommendation,
    pub messages: Vec<Message>,
}

// ── Adapter trait ───────────────────────────────────────────────────────────

/// Uniform interface implemented by every platform adapter.  The
/// orchestration layer drives adapters polymorphically through this trait.
///
/// Operations take `&mut self` because each adapter owns the in-memory
/// session for its platform account; calls on one adapter instance are
/// sequential, never interleaved.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Fixed platform identifier (e.g. "happn").  Also the store key.
    fn name(&self) -> &str;

    /// Find an existing session or perform the platform's authorization
    /// exchange, leaving the in-memory session usable on success.
    async fn authorize(&mut self) -> Result<()>;

    /// Fetch a page of recommendation candidates, normalized, source order
    /// preserved.
    async fn get_recommendations(&mut self) -> Result<Vec<Recommendation>>;

    /// Fetch everything that happened since the last successful fetch
    /// (new matches), advancing the persisted activity cursor.
    async fn get_updates(&mut self) -> Result<Vec<Update>>;

    /// Like a user.  Resolves with a normalized record only when the like
    /// completed a mutual match, `None` otherwise.
    async fn like(&mut self, user_id: &str) -> Result<Option<Recommendation>>;

    /// Fetch and normalize a single user profile.
    async fn get_user(&mut self, user_id: &str) -> Result<Recommendation>;

    /// Platform rejected the current session: clear local session state and
    /// delegate to the shared recovery policy.
    async fn on_not_authorized(&mut self) -> Result<()>;
}
