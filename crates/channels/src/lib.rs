//! Channel adapter system for the dating aggregation service.
//!
//! Each platform (Happn, Tinder, etc.) implements the [`ChannelAdapter`]
//! trait over its own client, with the session/authorization policy and the
//! per-channel state store shared across adapters.

pub mod adapter;
pub mod auth;
pub mod error;
pub mod registry;
pub mod store;

pub use {
    adapter::{ChannelAdapter, Message, Photo, Recommendation, Update},
    auth::{AuthPolicy, ChannelSession, SessionCredentials},
    error::{Error, Result},
    registry::ChannelRegistry,
    store::{ChannelRecord, ChannelStore, ChannelUpdate, MemoryChannelStore},
};
