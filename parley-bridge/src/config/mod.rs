//! Configuration management for the bridge
//!
//! Settings live in a TOML file and are shared lock-free through
//! [`ConfigHandle`]; readers always see a complete snapshot.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::ConfigLoader;
pub use schema::*;

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Shared configuration handle
pub type ConfigHandle = Arc<ArcSwap<BridgeConfig>>;

/// Create a config handle around `config`
pub fn new_config_handle(config: BridgeConfig) -> ConfigHandle {
    Arc::new(ArcSwap::from_pointee(config))
}
