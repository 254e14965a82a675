//! Configuration for a session room.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Default session lifetime: 30 minutes of inactivity.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Default capacity of each session's activity channel.
/// One pending signal is enough to reset a deadline.
pub const DEFAULT_ACTIVITY_BUFFER: usize = 1;

/// Configuration for a [`Room`](crate::Room).
///
/// Can be embedded in a larger TOML document:
///
/// ```toml
/// [session]
/// lifetime_ms = 900000
/// activity_buffer = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// How long a session may sit idle before it is deleted.
    /// Read from `lifetime_ms` in TOML.
    #[serde(rename = "lifetime_ms", deserialize_with = "duration_from_millis")]
    pub lifetime: Duration,

    /// Capacity of each session's activity channel.
    /// Signals sent while the channel is full are dropped.
    pub activity_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
            activity_buffer: DEFAULT_ACTIVITY_BUFFER,
        }
    }
}

impl RoomConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from a TOML document.
    ///
    /// Missing fields fall back to their defaults. The result is validated.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the session lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set the activity channel capacity.
    pub fn with_activity_buffer(mut self, size: usize) -> Self {
        self.activity_buffer = size;
        self
    }

    /// Session lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Check that the configuration can drive a room.
    pub fn validate(&self) -> Result<()> {
        if self.lifetime.is_zero() {
            return Err(Error::InvalidConfig(
                "lifetime must be greater than zero".to_string(),
            ));
        }
        if self.activity_buffer == 0 {
            return Err(Error::InvalidConfig(
                "activity_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
