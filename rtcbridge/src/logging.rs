//! `tracing` subscriber setup

use crate::config::{GlobalConfig, DEFAULT_LOG_FILTER};
use rtcbridge_core::BridgeError;
use tracing_subscriber::EnvFilter;

fn filter(config: &GlobalConfig) -> Result<EnvFilter, BridgeError> {
    match &config.log_filter {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|e| BridgeError::Initialization {
                reason: format!("Invalid log filter {:?}: {}", directives, e),
            })
        }
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
    }
}

/// Install the global subscriber when `debug_logging` is set.
///
/// Returns `true` when this call installed it. A subscriber installed
/// earlier, by rtcbridge or the host application, is left in place.
pub fn init_logging(config: &GlobalConfig) -> Result<bool, BridgeError> {
    if !config.debug_logging {
        return Ok(false);
    }
    let filter = filter(config)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok())
}
