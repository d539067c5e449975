//! Error types for rtcbridge

use thiserror::Error;

/// Main error type for rtcbridge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// The native engine rejected a sender track swap
    #[error("Native engine rejected track replacement on sender {sender_id}")]
    ReplaceTrackFailed {
        /// ID of the sender whose track was being replaced
        sender_id: String,
    },

    /// The native engine refused to create a transceiver
    #[error("Failed to add transceiver: {reason}")]
    AddTransceiverFailed {
        /// Reason reported by the native engine
        reason: String,
    },

    /// An operation reached an object that was already disposed.
    ///
    /// Never surfaced to application callers, only used for logging.
    #[error("Operation {operation} ignored: target is disposed")]
    OperationOnDisposed {
        /// Operation that was attempted
        operation: String,
    },

    /// A native callback referenced a receiver no transceiver knows about.
    ///
    /// Never surfaced to application callers, only used for logging.
    #[error("No transceiver owns receiver {receiver_id}")]
    NativeCallbackRaceMiss {
        /// ID of the receiver carried by the callback
        receiver_id: String,
    },

    /// Native signaling or ICE operation failed
    #[error("Native {operation} failed: {reason}")]
    Native {
        /// Operation that failed
        operation: String,
        /// Reason reported by the native engine
        reason: String,
    },

    /// Native factory could not create a peer connection
    #[error("Failed to create peer connection: {reason}")]
    PeerConnectionCreationFailed {
        /// Reason reported by the native factory
        reason: String,
    },

    /// Resource limit exceeded
    #[error("Resource limit exceeded: {resource} (limit {limit})")]
    ResourceLimit {
        /// Resource that exceeded limit
        resource: String,
        /// Configured limit
        limit: usize,
    },

    /// Track not found in the local track registry
    #[error("Track not found: {track_id}")]
    TrackNotFound {
        /// ID of the missing track
        track_id: String,
    },
}

impl BridgeError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            BridgeError::Initialization { .. } => "INITIALIZATION_FAILED".to_string(),
            BridgeError::ReplaceTrackFailed { .. } => "REPLACE_TRACK_FAILED".to_string(),
            BridgeError::AddTransceiverFailed { .. } => "ADD_TRANSCEIVER_FAILED".to_string(),
            BridgeError::OperationOnDisposed { .. } => "OPERATION_ON_DISPOSED".to_string(),
            BridgeError::NativeCallbackRaceMiss { .. } => "NATIVE_CALLBACK_RACE_MISS".to_string(),
            BridgeError::Native { .. } => "NATIVE_OPERATION_FAILED".to_string(),
            BridgeError::PeerConnectionCreationFailed { .. } => {
                "PEER_CONNECTION_CREATION_FAILED".to_string()
            }
            BridgeError::ResourceLimit { .. } => "RESOURCE_LIMIT_EXCEEDED".to_string(),
            BridgeError::TrackNotFound { .. } => "TRACK_NOT_FOUND".to_string(),
        }
    }

    /// Whether this error must be swallowed instead of reported to the caller.
    ///
    /// Disposal races and callbacks racing a removal are expected during
    /// teardown.
    pub fn is_suppressed(&self) -> bool {
        matches!(
            self,
            BridgeError::OperationOnDisposed { .. } | BridgeError::NativeCallbackRaceMiss { .. }
        )
    }

    pub(crate) fn native(operation: &str, err: crate::native::NativeError) -> Self {
        BridgeError::Native {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = BridgeError::ReplaceTrackFailed {
            sender_id: "s1".to_string(),
        };
        assert_eq!(err.error_code(), "REPLACE_TRACK_FAILED");
        assert!(!err.is_suppressed());

        let err = BridgeError::OperationOnDisposed {
            operation: "replaceTrack".to_string(),
        };
        assert!(err.is_suppressed());

        let err = BridgeError::NativeCallbackRaceMiss {
            receiver_id: "r1".to_string(),
        };
        assert!(err.is_suppressed());
        assert_eq!(err.to_string(), "No transceiver owns receiver r1");
    }
}
