//! Configuration schema, loading, and persistence.
//!
//! Config files: `skylark.toml`, `skylark.yaml`, or `skylark.json`,
//! searched in `./` then `~/.config/skylark/`.
//!
//! Supports `${ENV_VAR}` substitution in the raw config text. Writes are
//! always full-document replaces; the connector core mutates only the
//! `agents` and `bindings` collections and persists through
//! [`loader::write_config_file`].

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, write_config_file},
    schema::{
        AgentBinding, AgentDefaults, AgentEntry, AgentsConfig, BindingMatch, ChannelsConfig,
        PeerKind, PeerMatch, SkylarkConfig,
    },
};
