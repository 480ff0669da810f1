//! Channel plugin system.
//!
//! Each messaging platform (Feishu/Lark today, others later) implements the
//! [`ChannelPlugin`] trait plus the outbound/status sub-traits. This crate
//! also owns the seams the connector core talks through: the pairing/allow
//! store, the config store, and the event sink the gateway provides.

pub mod error;
pub mod gating;
pub mod pairing;
pub mod plugin;
pub mod registry;
pub mod store;

pub use {
    error::{Error, Result},
    pairing::{MemoryPairingStore, PairingQuery, PairingReceipt, PairingStore, PairingUpsert},
    plugin::{
        ChannelEvent, ChannelEventSink, ChannelHealthSnapshot, ChannelMessageMeta, ChannelOutbound,
        ChannelPlugin, ChannelReplyTarget, ChannelStatus,
    },
    store::{ConfigStore, FileConfigStore},
};
