use std::collections::HashMap;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::Serialize,
    tokio::sync::RwLock,
};

use crate::{Error, Result};

/// A persisted per-channel state record, keyed by channel name.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelRecord {
    pub name: String,
    pub is_enabled: bool,
    /// Platform account id of the authorized session, if any.
    pub user_id: Option<String>,
    /// Platform access token of the authorized session, if any.
    pub token: Option<String>,
    /// Social-login token used for the platform's authorization exchange.
    pub facebook_access_token: Option<String>,
    /// Activity cursor: updates older than this have already been fetched.
    pub last_activity_date: Option<DateTime<Utc>>,
}

impl ChannelRecord {
    /// A fresh, disabled record with no credentials.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_enabled: false,
            user_id: None,
            token: None,
            facebook_access_token: None,
            last_activity_date: None,
        }
    }
}

/// Partial update merged over a stored [`ChannelRecord`] by
/// [`ChannelStore::save`].  `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ChannelUpdate {
    pub is_enabled: Option<bool>,
    pub user_id: Option<String>,
    pub token: Option<String>,
    /// Unset both `user_id` and `token` (applied before the fields above).
    pub clear_credentials: bool,
    pub last_activity_date: Option<DateTime<Utc>>,
}

impl ChannelUpdate {
    /// Update that advances only the activity cursor.
    #[must_use]
    pub fn activity(at: DateTime<Utc>) -> Self {
        Self {
            last_activity_date: Some(at),
            ..Self::default()
        }
    }

    /// Update that stores a fresh set of session credentials.
    #[must_use]
    pub fn credentials(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Update that drops the stored session credentials.
    #[must_use]
    pub fn cleared_credentials() -> Self {
        Self {
            clear_credentials: true,
            ..Self::default()
        }
    }

    /// Merge this update into `record`.  The activity cursor only moves
    /// forward; an older timestamp is ignored.
    pub fn apply(&self, record: &mut ChannelRecord) {
        if self.clear_credentials {
            record.user_id = None;
            record.token = None;
        }
        if let Some(enabled) = self.is_enabled {
            record.is_enabled = enabled;
        }
        if let Some(user_id) = &self.user_id {
            record.user_id = Some(user_id.clone());
        }
        if let Some(token) = &self.token {
            record.token = Some(token.clone());
        }
        if let Some(at) = self.last_activity_date
            && record.last_activity_date.is_none_or(|prev| at > prev)
        {
            record.last_activity_date = Some(at);
        }
    }
}

/// Persistent storage for per-channel state.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Look up one channel record by name.
    async fn find_by_name(&self, name: &str) -> Result<ChannelRecord>;

    /// Merge a partial update into each named channel record.
    async fn save(&self, names: &[&str], update: &ChannelUpdate) -> Result<()>;
}

/// In-memory [`ChannelStore`] for tests and single-process runs.
#[derive(Default)]
pub struct MemoryChannelStore {
    records: RwLock<HashMap<String, ChannelRecord>>,
}

impl MemoryChannelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or replace) a channel record.
    pub async fn insert(&self, record: ChannelRecord) {
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), record);
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn find_by_name(&self, name: &str) -> Result<ChannelRecord> {
        let records = self.records.read().await;
        records
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_channel(name))
    }

    async fn save(&self, names: &[&str], update: &ChannelUpdate) -> Result<()> {
        let mut records = self.records.write().await;
        for name in names {
            let record = records
                .get_mut(*name)
                .ok_or_else(|| Error::unknown_channel(name))?;
            update.apply(record);
        }
        Ok(())
    }
}
