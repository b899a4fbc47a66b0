use std::sync::Arc;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tracing::{debug, info},
};

use amora_channels::{
    AuthPolicy, ChannelAdapter, ChannelSession, ChannelStore, ChannelUpdate, Error, Message, Photo,
    Recommendation, Result, SessionCredentials, Update,
};

use crate::{
    client::{ClientError, ClientResult, HappnClient, HappnNotification, HappnUser},
    config::HappnConfig,
};

/// Fixed platform identifier; also the store key for this channel.
pub const CHANNEL_NAME: &str = "happn";

/// Candidates requested per recommendations fetch.
const RECOMMENDATIONS_PAGE_SIZE: u32 = 16;

/// Page size of the match notification feed.
const UPDATES_PAGE_SIZE: u32 = 10;

/// `my_relation` code the platform reports once a like became mutual.
const RELATION_MUTUAL: i64 = 4;

/// Channel adapter for the Happn platform.
///
/// Owns the in-memory session for a single platform account; the
/// orchestration layer calls operations sequentially, never interleaved.
pub struct HappnAdapter {
    client: Arc<dyn HappnClient>,
    store: Arc<dyn ChannelStore>,
    auth: AuthPolicy,
    session: ChannelSession,
    config: HappnConfig,
}

/// Updates accumulated while paging through the notification feed.
/// Conversation polling is not implemented, so `conversations` stays empty.
#[derive(Default)]
struct UpdateBatch {
    matches: Vec<HappnNotification>,
    conversations: Vec<Message>,
}

impl HappnAdapter {
    #[must_use]
    pub fn new(client: Arc<dyn HappnClient>, store: Arc<dyn ChannelStore>) -> Self {
        let auth = AuthPolicy::new(Arc::clone(&store));
        Self {
            client,
            store,
            auth,
            session: ChannelSession::new(),
            config: HappnConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: HappnConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &HappnConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &ChannelSession {
        &self.session
    }

    /// Access token precondition shared by every data operation: fail before
    /// any network call when the session holds no token.
    fn require_token(&self) -> Result<String> {
        self.session
            .access_token()
            .map(str::to_owned)
            .ok_or(Error::NotAuthorized)
    }

    /// Clear the session and delegate to the shared recovery policy.
    async fn recover(&mut self) -> Error {
        self.session.clear();
        self.auth.on_not_authorized(CHANNEL_NAME).await
    }

    /// Route a platform not-authorized signal to recovery; any other client
    /// error passes through as a channel error.
    async fn or_recover<T>(&mut self, result: ClientResult<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(ClientError::NotAuthorized) => Err(self.recover().await),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ChannelAdapter for HappnAdapter {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn authorize(&mut self) -> Result<()> {
        let record = self.store.find_by_name(CHANNEL_NAME).await?;

        let client = Arc::clone(&self.client);
        let facebook_token = record.facebook_access_token.clone();

        let credentials = self
            .auth
            .find_or_authorize(&record, move || async move {
                let token = facebook_token.ok_or_else(|| {
                    Error::unavailable("no facebook access token configured for happn")
                })?;
                let tokens = client.authorize(&token).await?;
                Ok(SessionCredentials {
                    user_id: tokens.user_id,
                    token: tokens.access_token,
                    refresh_token: tokens.refresh_token,
                })
            })
            .await?;

        self.session.set(&credentials);
        info!(channel = CHANNEL_NAME, user_id = %credentials.user_id, "authorized");

        Ok(())
    }

    async fn get_recommendations(&mut self) -> Result<Vec<Recommendation>> {
        let token = self.require_token()?;

        let result = self
            .client
            .get_recommendations(&token, RECOMMENDATIONS_PAGE_SIZE)
            .await;
        let candidates = self.or_recover(result).await?;

        debug!(
            channel = CHANNEL_NAME,
            count = candidates.len(),
            "fetched recommendations"
        );

        candidates.iter().map(normalize_candidate).collect()
    }

    async fn get_updates(&mut self) -> Result<Vec<Update>> {
        let token = self.require_token()?;

        let record = self.store.find_by_name(CHANNEL_NAME).await?;
        let cursor = record.last_activity_date;

        let mut batch = UpdateBatch::default();
        let mut offset = 0;
        loop {
            let result = self
                .client
                .get_updates(&token, UPDATES_PAGE_SIZE, offset)
                .await;
            let page = self.or_recover(result).await?;

            // Stop A: feed exhausted, or the whole page predates the cursor.
            let Some(first) = page.first() else { break };
            if !is_newer(first.creation_date, cursor) {
                break;
            }

            batch.matches.extend(
                page.iter()
                    .filter(|item| is_newer(item.creation_date, cursor))
                    .cloned(),
            );

            // Stop B: the page's tail already reached the cursor, so the
            // rest of the feed is older.
            if let Some(last) = page.last()
                && !is_newer(last.creation_date, cursor)
            {
                break;
            }

            offset += UPDATES_PAGE_SIZE;
        }

        // The cursor advances to now rather than to the newest item's
        // timestamp: matches created while this fetch ran can be missed on
        // the next one.
        let fetched_at = Utc::now();
        self.store
            .save(&[CHANNEL_NAME], &ChannelUpdate::activity(fetched_at))
            .await?;

        debug!(
            channel = CHANNEL_NAME,
            matches = batch.matches.len(),
            conversations = batch.conversations.len(),
            "accumulated updates"
        );

        batch.matches.iter().map(normalize_match).collect()
    }

    async fn like(&mut self, user_id: &str) -> Result<Option<Recommendation>> {
        if user_id.is_empty() {
            return Err(Error::invalid_input("user id is required"));
        }
        let token = self.require_token()?;

        let result = self.client.like(&token, user_id).await;
        self.or_recover(result).await?;

        let result = self.client.get_user(&token, user_id).await;
        let user = self.or_recover(result).await?;

        if user.my_relation == RELATION_MUTUAL {
            info!(channel = CHANNEL_NAME, user_id, "like completed a mutual match");
            return Ok(Some(normalize_user(&user)?));
        }

        Ok(None)
    }

    async fn get_user(&mut self, user_id: &str) -> Result<Recommendation> {
        if user_id.is_empty() {
            return Err(Error::invalid_input("user id is required"));
        }
        let token = self.require_token()?;

        let result = self.client.get_user(&token, user_id).await;
        let user = self.or_recover(result).await?;

        normalize_user(&user)
    }

    async fn on_not_authorized(&mut self) -> Result<()> {
        Err(self.recover().await)
    }
}

/// Whether `created` falls after the cursor.  No cursor means a first run:
/// everything currently available counts as new.
fn is_newer(created: DateTime<Utc>, cursor: Option<DateTime<Utc>>) -> bool {
    cursor.is_none_or(|cursor| created > cursor)
}

fn pick_photos(user: &HappnUser) -> Vec<Photo> {
    user.profiles
        .iter()
        .map(|photo| Photo {
            url: photo.url.clone(),
            id: photo.id.clone(),
        })
        .collect()
}

/// Normalize one recommendations feed item; `data` carries the whole raw
/// candidate payload.
fn normalize_candidate(item: &HappnNotification) -> Result<Recommendation> {
    Ok(Recommendation {
        channel: CHANNEL_NAME.into(),
        channel_id: item.notifier.id.clone(),
        name: item.notifier.first_name.clone(),
        photos: pick_photos(&item.notifier),
        match_id: None,
        data: serde_json::to_value(item)?,
    })
}

/// Normalize one accumulated match into a new-match update.
fn normalize_match(item: &HappnNotification) -> Result<Update> {
    Ok(Update {
        is_new_match: true,
        recommendation: Recommendation {
            channel: CHANNEL_NAME.into(),
            channel_id: item.notifier.id.clone(),
            name: item.notifier.first_name.clone(),
            photos: pick_photos(&item.notifier),
            match_id: Some(item.notifier.id.clone()),
            data: serde_json::to_value(&item.notifier)?,
        },
        messages: Vec::new(),
    })
}

/// Normalize a plain user profile payload.
fn normalize_user(user: &HappnUser) -> Result<Recommendation> {
    Ok(Recommendation {
        channel: CHANNEL_NAME.into(),
        channel_id: user.id.clone(),
        name: user.first_name.clone(),
        photos: pick_photos(user),
        match_id: None,
        data: serde_json::to_value(user)?,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use {
        amora_channels::{ChannelRecord, MemoryChannelStore},
        chrono::TimeZone,
        rstest::rstest,
    };

    use {
        super::*,
        crate::client::{HappnProfilePhoto, HappnTokens},
    };

    /// Scripted [`HappnClient`] recording every call it receives.
    #[derive(Default)]
    struct MockClient {
        calls: Mutex<Vec<String>>,
        recommendations: Vec<HappnNotification>,
        update_pages: Vec<Vec<HappnNotification>>,
        users: HashMap<String, HappnUser>,
        /// When set, every call signals the platform's not-authorized error.
        reject_session: bool,
    }

    impl MockClient {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn check_session(&self) -> ClientResult<()> {
            if self.reject_session {
                Err(ClientError::NotAuthorized)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl HappnClient for MockClient {
        async fn authorize(&self, facebook_access_token: &str) -> ClientResult<HappnTokens> {
            self.record(format!("authorize {facebook_access_token}"));
            self.check_session()?;
            Ok(HappnTokens {
                user_id: "me".into(),
                access_token: "fresh-token".into(),
                refresh_token: Some("fresh-refresh".into()),
            })
        }

        async fn get_recommendations(
            &self,
            _access_token: &str,
            limit: u32,
        ) -> ClientResult<Vec<HappnNotification>> {
            self.record(format!("get_recommendations limit={limit}"));
            self.check_session()?;
            Ok(self.recommendations.clone())
        }

        async fn get_updates(
            &self,
            _access_token: &str,
            limit: u32,
            offset: u32,
        ) -> ClientResult<Vec<HappnNotification>> {
            self.record(format!("get_updates offset={offset}"));
            self.check_session()?;
            let index = (offset / limit) as usize;
            Ok(self.update_pages.get(index).cloned().unwrap_or_default())
        }

        async fn like(&self, _access_token: &str, user_id: &str) -> ClientResult<()> {
            self.record(format!("like {user_id}"));
            self.check_session()
        }

        async fn get_user(&self, _access_token: &str, user_id: &str) -> ClientResult<HappnUser> {
            self.record(format!("get_user {user_id}"));
            self.check_session()?;
            self.users.get(user_id).cloned().ok_or_else(|| {
                ClientError::platform(
                    "GET /api/users",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such user"),
                )
            })
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn photo(id: &str, url: &str) -> HappnProfilePhoto {
        let mut extra = serde_json::Map::new();
        extra.insert("width".into(), 640.into());
        extra.insert("mode".into(), 1.into());
        HappnProfilePhoto {
            id: id.into(),
            url: url.into(),
            extra,
        }
    }

    fn user(id: &str, name: &str, relation: i64) -> HappnUser {
        HappnUser {
            id: id.into(),
            first_name: name.into(),
            my_relation: relation,
            profiles: vec![photo(&format!("{id}-photo"), &format!("https://cdn/{id}.jpg"))],
            extra: serde_json::Map::new(),
        }
    }

    fn notification(id: &str, name: &str, created: DateTime<Utc>) -> HappnNotification {
        HappnNotification {
            notifier: user(id, name, 0),
            creation_date: created,
            extra: serde_json::Map::new(),
        }
    }

    async fn seeded_store(record: ChannelRecord) -> Arc<MemoryChannelStore> {
        let store = Arc::new(MemoryChannelStore::new());
        store.insert(record).await;
        store
    }

    fn enabled_record() -> ChannelRecord {
        ChannelRecord {
            is_enabled: true,
            ..ChannelRecord::new(CHANNEL_NAME)
        }
    }

    /// Adapter whose session was restored from stored credentials — no
    /// client call involved.
    async fn authorized_adapter(
        client: Arc<MockClient>,
    ) -> (HappnAdapter, Arc<MemoryChannelStore>) {
        let mut record = enabled_record();
        record.user_id = Some("me".into());
        record.token = Some("stored-token".into());
        let store = seeded_store(record).await;

        let mut adapter =
            HappnAdapter::new(client, Arc::clone(&store) as Arc<dyn ChannelStore>);
        adapter.authorize().await.unwrap();
        (adapter, store)
    }

    #[tokio::test]
    async fn authorize_reuses_stored_credentials_without_client_call() {
        let client = Arc::new(MockClient::default());
        let (adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        assert!(adapter.session().is_authorized());
        assert_eq!(adapter.session().user_id(), Some("me"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn authorize_exchanges_facebook_token_and_persists() {
        let client = Arc::new(MockClient::default());
        let mut record = enabled_record();
        record.facebook_access_token = Some("fb-token".into());
        let store = seeded_store(record).await;

        let mut adapter = HappnAdapter::new(
            Arc::clone(&client) as Arc<dyn HappnClient>,
            Arc::clone(&store) as Arc<dyn ChannelStore>,
        );
        adapter.authorize().await.unwrap();

        assert_eq!(client.calls(), vec!["authorize fb-token"]);
        assert_eq!(adapter.session().user_id(), Some("me"));
        assert_eq!(adapter.session().access_token(), Some("fresh-token"));
        assert_eq!(adapter.session().refresh_token(), Some("fresh-refresh"));

        let record = store.find_by_name(CHANNEL_NAME).await.unwrap();
        assert_eq!(record.user_id.as_deref(), Some("me"));
        assert_eq!(record.token.as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn authorize_without_facebook_token_is_unavailable() {
        let client = Arc::new(MockClient::default());
        let store = seeded_store(enabled_record()).await;

        let mut adapter =
            HappnAdapter::new(client, Arc::clone(&store) as Arc<dyn ChannelStore>);
        let err = adapter.authorize().await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[tokio::test]
    async fn operations_require_a_session_before_any_client_call() {
        let client = Arc::new(MockClient::default());
        let store = seeded_store(enabled_record()).await;
        let mut adapter = HappnAdapter::new(
            Arc::clone(&client) as Arc<dyn HappnClient>,
            Arc::clone(&store) as Arc<dyn ChannelStore>,
        );

        assert!(adapter.get_recommendations().await.unwrap_err().is_not_authorized());
        assert!(adapter.get_updates().await.unwrap_err().is_not_authorized());
        assert!(adapter.like("u-1").await.unwrap_err().is_not_authorized());
        assert!(adapter.get_user("u-1").await.unwrap_err().is_not_authorized());

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn like_and_get_user_reject_an_empty_user_id() {
        let client = Arc::new(MockClient::default());
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let err = adapter.like("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let err = adapter.get_user("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn recommendations_preserve_order_and_pick_photo_fields() {
        let client = Arc::new(MockClient {
            recommendations: vec![
                notification("u-1", "Ana", at(100)),
                notification("u-2", "Bea", at(90)),
                notification("u-3", "Cris", at(80)),
            ],
            ..MockClient::default()
        });
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let recommendations = adapter.get_recommendations().await.unwrap();

        assert_eq!(client.calls(), vec!["get_recommendations limit=16"]);
        let ids: Vec<&str> = recommendations.iter().map(|r| r.channel_id.as_str()).collect();
        assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);

        for rec in &recommendations {
            assert_eq!(rec.channel, "happn");
            assert_eq!(rec.match_id, None);
        }

        // photos are reduced to {url, id}; the extra fields only survive in
        // the raw payload
        assert_eq!(
            recommendations[0].photos,
            vec![Photo {
                url: "https://cdn/u-1.jpg".into(),
                id: "u-1-photo".into(),
            }]
        );
        assert_eq!(recommendations[0].data["notifier"]["profiles"][0]["width"], 640);
    }

    #[tokio::test]
    async fn platform_rejection_clears_session_and_stored_credentials() {
        let client = Arc::new(MockClient {
            reject_session: true,
            ..MockClient::default()
        });
        let (mut adapter, store) = authorized_adapter(Arc::clone(&client)).await;

        let err = adapter.get_recommendations().await.unwrap_err();
        assert!(err.is_not_authorized());

        assert!(!adapter.session().is_authorized());
        assert_eq!(adapter.session().user_id(), None);
        assert_eq!(adapter.session().access_token(), None);
        assert_eq!(adapter.session().refresh_token(), None);

        let record = store.find_by_name(CHANNEL_NAME).await.unwrap();
        assert_eq!(record.user_id, None);
        assert_eq!(record.token, None);
    }

    #[tokio::test]
    async fn updates_stop_at_the_cursor_boundary() {
        let cursor = at(1_000);
        let client = Arc::new(MockClient {
            update_pages: vec![
                vec![
                    notification("m-1", "Ana", at(1_030)),
                    notification("m-2", "Bea", at(1_020)),
                ],
                vec![
                    notification("m-3", "Cris", at(1_010)),
                    notification("m-4", "Dee", at(995)),
                ],
                vec![
                    notification("m-5", "Eva", at(980)),
                    notification("m-6", "Fab", at(970)),
                ],
            ],
            ..MockClient::default()
        });

        let mut record = enabled_record();
        record.user_id = Some("me".into());
        record.token = Some("stored-token".into());
        record.last_activity_date = Some(cursor);
        let store = seeded_store(record).await;

        let mut adapter = HappnAdapter::new(
            Arc::clone(&client) as Arc<dyn HappnClient>,
            Arc::clone(&store) as Arc<dyn ChannelStore>,
        );
        adapter.authorize().await.unwrap();

        let updates = adapter.get_updates().await.unwrap();

        // items strictly newer than the cursor, source order preserved
        let ids: Vec<&str> = updates
            .iter()
            .map(|u| u.recommendation.channel_id.as_str())
            .collect();
        assert_eq!(ids, vec!["m-1", "m-2", "m-3"]);

        // page 2's tail (995 <= cursor) stops iteration: page 3 never requested
        assert_eq!(
            client.calls(),
            vec!["get_updates offset=0", "get_updates offset=10"]
        );

        for update in &updates {
            assert!(update.is_new_match);
            assert!(update.messages.is_empty());
            assert_eq!(update.recommendation.channel, "happn");
            assert_eq!(
                update.recommendation.match_id,
                Some(update.recommendation.channel_id.clone())
            );
        }
    }

    #[tokio::test]
    async fn updates_first_run_keeps_everything() {
        let client = Arc::new(MockClient {
            update_pages: vec![vec![
                notification("m-1", "Ana", at(300)),
                notification("m-2", "Bea", at(200)),
                notification("m-3", "Cris", at(100)),
            ]],
            ..MockClient::default()
        });
        let (mut adapter, store) = authorized_adapter(Arc::clone(&client)).await;

        let before = Utc::now();
        let updates = adapter.get_updates().await.unwrap();

        assert_eq!(updates.len(), 3);

        // every page tail looked newer than the (absent) cursor, so the loop
        // only stopped on the empty second page
        assert_eq!(
            client.calls(),
            vec!["get_updates offset=0", "get_updates offset=10"]
        );

        // the new cursor is the fetch's wall-clock time, not the newest item
        let record = store.find_by_name(CHANNEL_NAME).await.unwrap();
        let cursor = record.last_activity_date.unwrap();
        assert!(cursor >= before);
        assert!(cursor <= Utc::now());
    }

    #[tokio::test]
    async fn updates_with_an_empty_feed_still_advance_the_cursor() {
        let client = Arc::new(MockClient::default());
        let (mut adapter, store) = authorized_adapter(Arc::clone(&client)).await;

        let updates = adapter.get_updates().await.unwrap();
        assert!(updates.is_empty());

        let record = store.find_by_name(CHANNEL_NAME).await.unwrap();
        assert!(record.last_activity_date.is_some());
    }

    #[rstest]
    #[case::stranger(0)]
    #[case::liked(1)]
    #[case::liked_back(3)]
    #[case::blocked(5)]
    #[tokio::test]
    async fn like_without_a_mutual_match_resolves_empty(#[case] relation: i64) {
        let mut users = HashMap::new();
        users.insert("u-1".to_string(), user("u-1", "Ana", relation));
        let client = Arc::new(MockClient {
            users,
            ..MockClient::default()
        });
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let outcome = adapter.like("u-1").await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(client.calls(), vec!["like u-1", "get_user u-1"]);
    }

    #[tokio::test]
    async fn like_returns_the_profile_on_a_mutual_match() {
        let mut users = HashMap::new();
        users.insert("u-1".to_string(), user("u-1", "Ana", RELATION_MUTUAL));
        let client = Arc::new(MockClient {
            users,
            ..MockClient::default()
        });
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let rec = adapter.like("u-1").await.unwrap().expect("mutual match");
        assert_eq!(rec.channel, "happn");
        assert_eq!(rec.channel_id, "u-1");
        assert_eq!(rec.name, "Ana");
        assert_eq!(rec.data["my_relation"], 4);
    }

    #[tokio::test]
    async fn get_user_normalizes_unconditionally() {
        let mut users = HashMap::new();
        users.insert("u-9".to_string(), user("u-9", "Gia", 1));
        let client = Arc::new(MockClient {
            users,
            ..MockClient::default()
        });
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let rec = adapter.get_user("u-9").await.unwrap();
        assert_eq!(rec.channel, "happn");
        assert_eq!(rec.channel_id, "u-9");
        assert_eq!(
            rec.photos,
            vec![Photo {
                url: "https://cdn/u-9.jpg".into(),
                id: "u-9-photo".into(),
            }]
        );
        assert_eq!(client.calls(), vec!["get_user u-9"]);
    }

    #[tokio::test]
    async fn unknown_user_error_passes_through_unchanged() {
        let client = Arc::new(MockClient::default());
        let (mut adapter, _store) = authorized_adapter(Arc::clone(&client)).await;

        let err = adapter.get_user("missing").await.unwrap_err();
        assert!(matches!(err, Error::External { .. }));
        // the session survives a non-authorization failure
        assert!(adapter.session().is_authorized());
    }
}
