//! Configuration for cloudwrap components
//!
//! [`ClientConfig`] is the immutable runtime bundle (client identity, optional
//! cleanup policy, telemetry sink) handed to every component. [`Settings`] is
//! its on-disk TOML form together with polling and retry defaults.

pub mod client;
pub mod error;
pub mod resilience;
pub mod settings;

// Re-export main types for convenience
pub use client::{
    CleanupConfig, ClientConfig, ClientConfigBuilder, DEFAULT_TIME_TO_LIVE, TrackerCredentials,
};
pub use error::{ConfigError, Result};
pub use resilience::{PollingConfig, RetryConfig};
pub use settings::{CleanupSettings, Settings, TelemetrySettings};
