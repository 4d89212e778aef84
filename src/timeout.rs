//! Timeouts for external calls
//!
//! Every network request and subprocess is bounded. Calls are never
//! retried; a timeout surfaces as an external-service failure.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect timeout for the timestamp authority (default: 30)
    pub connect_seconds: u64,

    /// Whole-request timeout for HTTP calls (default: 60)
    pub request_seconds: u64,

    /// Deadline for gpg, openssl and file subprocesses (default: 120)
    pub process_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_seconds: 30,
            request_seconds: 60,
            process_seconds: 120,
        }
    }
}

impl TimeoutConfig {
    /// Check bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // connect_seconds must be in (0, 300]
        if self.connect_seconds == 0 || self.connect_seconds > 300 {
            return Err(TimeoutValidationError::ConnectOutOfBounds {
                value: self.connect_seconds,
            });
        }

        // request_seconds must be in [connect_seconds, 3600]
        if self.request_seconds < self.connect_seconds || self.request_seconds > 3600 {
            return Err(TimeoutValidationError::RequestOutOfBounds {
                value: self.request_seconds,
                min: self.connect_seconds,
            });
        }

        // process_seconds must be in (0, 3600]
        if self.process_seconds == 0 || self.process_seconds > 3600 {
            return Err(TimeoutValidationError::ProcessOutOfBounds {
                value: self.process_seconds,
            });
        }

        Ok(())
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_seconds)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_seconds)
    }

    pub fn process(&self) -> Duration {
        Duration::from_secs(self.process_seconds)
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("timeouts.connect_seconds must be in (0, 300], got {value}")]
    ConnectOutOfBounds { value: u64 },

    #[error("timeouts.request_seconds must be in [{min}, 3600], got {value}")]
    RequestOutOfBounds { value: u64, min: u64 },

    #[error("timeouts.process_seconds must be in (0, 3600], got {value}")]
    ProcessOutOfBounds { value: u64 },
}
