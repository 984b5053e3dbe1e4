//! Board configuration.
//!
//! Every section has working defaults, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [resolver]
//! on_malformed = "reject"
//!
//! [identity]
//! rsa_bits = 4096
//!
//! [settings]
//! blob_name = "settings"
//! write_timeout = "5s"
//!
//! [feed]
//! missing_record_grace = "30s"
//! retry_interval = "1s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tessera_chain::{ChallengeConfig, ResolverConfig};
use tessera_mail::DEFAULT_MODULUS_BITS;

use crate::error::{BoardError, Result};

/// Configuration for a [`Board`](crate::Board).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub resolver: ResolverConfig,
    pub challenge: ChallengeConfig,
    pub identity: IdentityConfig,
    pub settings: SettingsConfig,
    pub feed: FeedConfig,
}

impl BoardConfig {
    /// Parse a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| BoardError::Config(e.to_string()))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BoardError::Config(e.to_string()))
    }
}

/// Key generation for new identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// RSA modulus size for encryption keys.
    pub rsa_bits: usize,
    /// Create an identity when the settings hold none.
    pub create_on_first_run: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            rsa_bits: DEFAULT_MODULUS_BITS,
            create_on_first_run: true,
        }
    }
}

/// Local settings persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Blob name the settings document is stored under.
    pub blob_name: String,
    /// How long one blob write may take before the mutation fails.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Pending mutations the writer queue holds before callers wait.
    pub queue_depth: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            blob_name: "settings".into(),
            write_timeout: Duration::from_secs(5),
            queue_depth: 64,
        }
    }
}

/// Feed filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Drop anonymous records from feeds.
    pub require_signature: bool,
    /// How long a member may name a record node that has not replicated
    /// yet before it is counted as a parse error.
    #[serde(with = "humantime_serde")]
    pub missing_record_grace: Duration,
    /// How often a waiting feed retries records it is still missing.
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            require_signature: false,
            missing_record_grace: Duration::from_secs(30),
            retry_interval: Duration::from_secs(1),
        }
    }
}
