use {
    secrecy::{ExposeSecret, Secret},
    std::sync::Arc,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    store::{ChannelRecord, ChannelStore, ChannelUpdate},
};

/// What a platform authorization exchange resolves to.
#[derive(Clone)]
pub struct SessionCredentials {
    pub user_id: String,
    pub token: String,
    /// Only present after a fresh exchange; stored credentials carry none.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// In-memory authorization state for one platform account.
///
/// Owned by a single adapter instance; operations on one adapter never
/// interleave, so no lock is needed.
#[derive(Default)]
pub struct ChannelSession {
    user_id: Option<String>,
    access_token: Option<Secret<String>>,
    refresh_token: Option<Secret<String>>,
}

impl ChannelSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session with freshly resolved credentials.
    pub fn set(&mut self, credentials: &SessionCredentials) {
        self.user_id = Some(credentials.user_id.clone());
        self.access_token = Some(Secret::new(credentials.token.clone()));
        self.refresh_token = credentials.refresh_token.clone().map(Secret::new);
    }

    /// Unset all session fields.
    pub fn clear(&mut self) {
        self.user_id = None;
        self.access_token = None;
        self.refresh_token = None;
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
    }

    /// Whether the session holds a usable access token.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.access_token.is_some()
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("user_id", &self.user_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Shared authorization policy used by every platform adapter: reuse stored
/// credentials when present, otherwise run the platform-specific exchange
/// and persist the result.
pub struct AuthPolicy {
    store: Arc<dyn ChannelStore>,
}

impl AuthPolicy {
    #[must_use]
    pub fn new(store: Arc<dyn ChannelStore>) -> Self {
        Self { store }
    }

    /// Return the credentials already present on `record`, or run
    /// `authorize` to obtain fresh ones and persist them under the record's
    /// name.
    ///
    /// Disabled channels refuse to authorize.
    pub async fn find_or_authorize<F, Fut>(
        &self,
        record: &ChannelRecord,
        authorize: F,
    ) -> Result<SessionCredentials>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SessionCredentials>>,
    {
        if !record.is_enabled {
            return Err(Error::unavailable(format!(
                "channel {} is disabled",
                record.name
            )));
        }

        if let (Some(user_id), Some(token)) = (&record.user_id, &record.token) {
            debug!(channel = %record.name, "reusing stored session credentials");
            return Ok(SessionCredentials {
                user_id: user_id.clone(),
                token: token.clone(),
                refresh_token: None,
            });
        }

        let credentials = authorize().await?;

        self.store
            .save(
                &[record.name.as_str()],
                &ChannelUpdate::credentials(&credentials.user_id, &credentials.token),
            )
            .await?;
        debug!(channel = %record.name, "stored fresh session credentials");

        Ok(credentials)
    }

    /// Shared recovery for a platform-rejected session: drop the persisted
    /// credentials so the next `authorize()` performs a fresh exchange, and
    /// hand the caller a typed not-authorized error.
    pub async fn on_not_authorized(&self, channel_name: &str) -> Error {
        warn!(
            channel = channel_name,
            "platform rejected session, clearing stored credentials"
        );

        match self
            .store
            .save(&[channel_name], &ChannelUpdate::cleared_credentials())
            .await
        {
            Ok(()) => Error::NotAuthorized,
            Err(err) => err,
        }
    }
}
