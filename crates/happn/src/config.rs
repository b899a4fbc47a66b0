use {
    amora_channels::{ChannelRecord, Error, Result},
    serde::{Deserialize, Serialize},
    url::Url,
};

/// Facebook login app used for Happn's social-login token exchange.
const FACEBOOK_LOGIN_APP_CLIENT_ID: &str = "247294518656661";
const FACEBOOK_LOGIN_APP_REDIRECT_URI: &str = "https://www.happn.fr";
const FACEBOOK_LOGIN_SCOPE: &str = "basic_info";
const FACEBOOK_LOGIN_RESPONSE_TYPE: &str = "token";

/// Parameters of the Facebook login dialog that yields the access token the
/// adapter later exchanges for a platform session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FacebookLoginConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub response_type: String,
}

impl Default for FacebookLoginConfig {
    fn default() -> Self {
        Self {
            client_id: FACEBOOK_LOGIN_APP_CLIENT_ID.into(),
            redirect_uri: FACEBOOK_LOGIN_APP_REDIRECT_URI.into(),
            scope: FACEBOOK_LOGIN_SCOPE.into(),
            response_type: FACEBOOK_LOGIN_RESPONSE_TYPE.into(),
        }
    }
}

/// Configuration for the Happn channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HappnConfig {
    pub facebook: FacebookLoginConfig,
    /// Whether a freshly created channel record starts enabled.
    pub is_enabled: bool,
}

impl HappnConfig {
    /// Build the Facebook login dialog URL for this channel.
    pub fn login_url(&self) -> Result<String> {
        let mut url = Url::parse("https://www.facebook.com/dialog/oauth")
            .map_err(|source| Error::external("invalid facebook dialog url", source))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.facebook.client_id)
            .append_pair("redirect_uri", &self.facebook.redirect_uri)
            .append_pair("scope", &self.facebook.scope)
            .append_pair("response_type", &self.facebook.response_type);
        Ok(url.into())
    }

    /// The initial channel record to seed the store with.
    #[must_use]
    pub fn initial_record(&self, name: &str) -> ChannelRecord {
        ChannelRecord {
            is_enabled: self.is_enabled,
            ..ChannelRecord::new(name)
        }
    }
}
