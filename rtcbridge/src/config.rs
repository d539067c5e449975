//! Configuration types and defaults

use serde::{Deserialize, Serialize};

/// Default directives used when debug logging is on and no filter is given
pub const DEFAULT_LOG_FILTER: &str = "rtcbridge=debug,rtcbridge_core=debug,rtcbridge_channel=debug";

/// Global rtcbridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Install a `tracing` subscriber on init
    pub debug_logging: bool,
    /// `EnvFilter` directives. Falls back to `RUST_LOG`, then
    /// [`DEFAULT_LOG_FILTER`].
    pub log_filter: Option<String>,
    /// Maximum number of live peer connections, unlimited when unset
    pub max_peer_connections: Option<usize>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_filter: None,
            max_peer_connections: Some(32),
        }
    }
}

impl GlobalConfig {
    /// Configuration with debug logging enabled
    pub fn debug() -> Self {
        Self {
            debug_logging: true,
            ..Self::default()
        }
    }
}
