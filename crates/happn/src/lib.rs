//! Happn channel adapter for the dating aggregation service.
//!
//! Implements `ChannelAdapter` over the platform client capability,
//! normalizing Happn's recommendation and notification payloads and paging
//! the match feed against the persisted activity cursor.

pub mod adapter;
pub mod client;
pub mod config;

pub use {
    adapter::{CHANNEL_NAME, HappnAdapter},
    client::{ClientError, ClientResult, HappnClient, HappnNotification, HappnTokens, HappnUser},
    config::HappnConfig,
};
