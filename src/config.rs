//! Unified configuration system for the fingerprint engine.
//!
//! This module controls the policy decisions the engine makes on top of the
//! loaded rules: how unresolvable fingerprint placeholders are handled, which
//! variant wins when a rule salts the default grouping, and when batch
//! evaluation goes parallel.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Policy for fingerprint placeholders that reference a field the event
/// does not carry.
///
/// # Policy Comparison
///
/// | Policy | `evaluate` result | Fingerprint component |
/// |--------|-------------------|-----------------------|
/// | `Empty` | `Ok` | empty string |
/// | `Fail` | `Err(UnresolvedPlaceholder)` | n/a |
///
/// # Examples
///
/// ```rust
/// use fingerprint_engine::UnresolvedPolicy;
///
/// // Keep grouping events that lack the field (default)
/// let lenient = UnresolvedPolicy::Empty;
///
/// // Surface misconfigured templates to the caller
/// let strict = UnresolvedPolicy::Fail;
/// assert_ne!(lenient, strict);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Substitute an empty string for the placeholder.
    ///
    /// The token keeps its position, so fingerprints of events with and
    /// without the field stay the same length.
    #[default]
    Empty,

    /// Propagate [`FingerprintError::UnresolvedPlaceholder`](crate::FingerprintError::UnresolvedPlaceholder).
    Fail,
}

/// Which default-grouping variant contributes when a rule salts
/// `{{ default }}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaltedPrecedence {
    /// `system` contributes, `app` is suppressed.
    #[default]
    System,
    /// `app` contributes, `system` is suppressed.
    App,
}

impl SaltedPrecedence {
    /// Name of the winning variant.
    pub fn winner(self) -> &'static str {
        match self {
            SaltedPrecedence::System => "system",
            SaltedPrecedence::App => "app",
        }
    }

    /// Name of the suppressed variant.
    pub fn loser(self) -> &'static str {
        match self {
            SaltedPrecedence::System => "app",
            SaltedPrecedence::App => "system",
        }
    }
}

/// Variant classification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Winner of salted `app`/`system` arbitration.
    ///
    /// **Default**: `System`
    pub salted_precedence: SaltedPrecedence,

    /// Treat a fingerprint sent by the client SDK like a matched rule when
    /// no server-side rule matches.
    ///
    /// **Default**: true
    pub honor_client_fingerprint: bool,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            salted_precedence: SaltedPrecedence::System,
            honor_client_fingerprint: true,
        }
    }
}

/// Batch evaluation configuration.
///
/// # Batch Size Guidelines
///
/// | Batch Size | Strategy | Use Case |
/// |------------|----------|----------|
/// | < threshold | sequential | interactive, small backfills |
/// | >= threshold | rayon pool | ingestion workers, reprocessing |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Minimum batch size for parallel evaluation.
    ///
    /// **Default**: 64
    pub parallel_threshold: usize,

    /// Enable parallel evaluation at all.
    ///
    /// **Default**: true
    pub enable_parallelism: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 64,
            enable_parallelism: true,
        }
    }
}

/// Fingerprint engine configuration.
///
/// # Example
/// ```rust
/// use fingerprint_engine::{EngineConfig, SaltedPrecedence, UnresolvedPolicy};
///
/// let config = EngineConfig::new()
///     .with_unresolved_policy(UnresolvedPolicy::Fail)
///     .with_salted_precedence(SaltedPrecedence::App)
///     .with_parallel_threshold(1000);
///
/// assert_eq!(config.batch.parallel_threshold, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unresolved placeholder handling
    pub unresolved_policy: UnresolvedPolicy,
    /// Variant classification configuration
    pub variants: VariantConfig,
    /// Batch evaluation configuration
    pub batch: BatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unresolved_policy: UnresolvedPolicy::Empty,
            variants: VariantConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on unresolved placeholders and ignore client fingerprints.
    pub fn strict() -> Self {
        Self {
            unresolved_policy: UnresolvedPolicy::Fail,
            variants: VariantConfig {
                honor_client_fingerprint: false,
                ..VariantConfig::default()
            },
            ..Self::default()
        }
    }

    /// Go parallel early for large ingestion batches.
    pub fn high_throughput() -> Self {
        Self {
            batch: BatchConfig {
                parallel_threshold: 16,
                enable_parallelism: true,
            },
            ..Self::default()
        }
    }

    /// Load a configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_unresolved_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved_policy = policy;
        self
    }

    pub fn with_salted_precedence(mut self, precedence: SaltedPrecedence) -> Self {
        self.variants.salted_precedence = precedence;
        self
    }

    pub fn with_client_fingerprint(mut self, honor: bool) -> Self {
        self.variants.honor_client_fingerprint = honor;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.batch.parallel_threshold = threshold;
        self
    }

    pub fn with_parallelism(mut self, enable: bool) -> Self {
        self.batch.enable_parallelism = enable;
        self
    }
}
