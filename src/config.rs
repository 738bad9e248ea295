//! Configuration types for cutout segmentation and mockup-job polling

use crate::error::{DesignForgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum possible Euclidean distance between two RGB colors (√(3·255²))
pub const MAX_RGB_DISTANCE: f32 = 441.68;

/// Configuration for the background segmenter
///
/// The tolerance defaults are tuned for AI-generated design imagery on a
/// roughly uniform background. They are deliberately configurable: different
/// image generators produce different amounts of background noise, so callers
/// re-tuning against their own sample imagery only need new config values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Colors within this Euclidean RGB distance of the estimated background
    /// are certainly background: seeds for the flood fill, forced to alpha 0
    pub hard_tolerance: f32,

    /// Colors between `hard_tolerance` and this bound are transitional:
    /// joined by the fill and feathered rather than fully cleared
    pub soft_tolerance: f32,

    /// Images larger than this on either axis are downsampled (preserving
    /// aspect ratio) before processing. Purely a performance tunable.
    pub max_dimension: u32,

    /// Approximate number of border samples taken per edge axis when
    /// estimating the background color
    pub border_samples: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            hard_tolerance: 30.0,
            soft_tolerance: 62.0,
            max_dimension: 768,
            border_samples: 140,
        }
    }
}

impl SegmenterConfig {
    /// Create a new builder for segmenter configuration
    #[must_use]
    pub fn builder() -> SegmenterConfigBuilder {
        SegmenterConfigBuilder::default()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Non-positive or out-of-range tolerances
    /// - Soft tolerance not strictly greater than hard tolerance
    /// - Degenerate downsample cap or sample count
    pub fn validate(&self) -> Result<()> {
        if self.hard_tolerance <= 0.0 || self.hard_tolerance > MAX_RGB_DISTANCE {
            return Err(DesignForgeError::invalid_config(format!(
                "hard tolerance must be in (0, {}], got {}",
                MAX_RGB_DISTANCE, self.hard_tolerance
            )));
        }
        if self.soft_tolerance <= self.hard_tolerance || self.soft_tolerance > MAX_RGB_DISTANCE {
            return Err(DesignForgeError::invalid_config(format!(
                "soft tolerance must be in (hard, {}], got {} (hard {})",
                MAX_RGB_DISTANCE, self.soft_tolerance, self.hard_tolerance
            )));
        }
        if self.max_dimension < 16 {
            return Err(DesignForgeError::invalid_config(format!(
                "max dimension must be at least 16px, got {}",
                self.max_dimension
            )));
        }
        if self.border_samples < 4 {
            return Err(DesignForgeError::invalid_config(format!(
                "border samples must be at least 4, got {}",
                self.border_samples
            )));
        }
        Ok(())
    }
}

/// Builder for [`SegmenterConfig`]
#[derive(Debug, Clone, Default)]
pub struct SegmenterConfigBuilder {
    config: SegmenterConfig,
}

impl SegmenterConfigBuilder {
    /// Set the hard background tolerance
    #[must_use]
    pub fn hard_tolerance(mut self, tolerance: f32) -> Self {
        self.config.hard_tolerance = tolerance;
        self
    }

    /// Set the soft (feathering) background tolerance
    #[must_use]
    pub fn soft_tolerance(mut self, tolerance: f32) -> Self {
        self.config.soft_tolerance = tolerance;
        self
    }

    /// Set the downsample cap in pixels
    #[must_use]
    pub fn max_dimension(mut self, pixels: u32) -> Self {
        self.config.max_dimension = pixels;
        self
    }

    /// Set the approximate border sample count per edge axis
    #[must_use]
    pub fn border_samples(mut self, samples: u32) -> Self {
        self.config.border_samples = samples;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any validation failure from [`SegmenterConfig::validate`]
    pub fn build(self) -> Result<SegmenterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the async job poller
///
/// Defaults match the behavior of the remote generation queue this crate was
/// built against: 70 poll attempts at 1.8s intervals, a 2.5s minimum gap
/// between outbound requests, and a 15 minute result cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Maximum number of status-poll attempts before the job is reported as
    /// timed out. Polling always terminates.
    pub max_attempts: u32,

    /// Fixed sleep between consecutive status polls
    pub poll_interval: Duration,

    /// Minimum spacing between any two outbound requests, across all
    /// concurrent callers sharing the same rate limiter
    pub min_request_gap: Duration,

    /// Cooldown applied after a rate-limit response that carries no usable
    /// "retry after" hint
    pub default_cooldown: Duration,

    /// Time-to-live for completed job results in the cache
    pub cache_ttl: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 70,
            poll_interval: Duration::from_millis(1800),
            min_request_gap: Duration::from_millis(2500),
            default_cooldown: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl PollerConfig {
    /// Create a new builder for poller configuration
    #[must_use]
    pub fn builder() -> PollerConfigBuilder {
        PollerConfigBuilder::default()
    }

    /// Configuration suited to the garment mockup queue, which completes much
    /// faster than full image generation
    #[must_use]
    pub fn mockup_preview() -> Self {
        Self {
            max_attempts: 18,
            poll_interval: Duration::from_millis(1400),
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero attempt bound (polling would never observe a status)
    /// - Zero poll interval (would hammer the remote queue)
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DesignForgeError::invalid_config(
                "max attempts must be at least 1",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(DesignForgeError::invalid_config(
                "poll interval must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Builder for [`PollerConfig`]
#[derive(Debug, Clone, Default)]
pub struct PollerConfigBuilder {
    config: PollerConfig,
}

impl PollerConfigBuilder {
    /// Set the maximum poll attempt bound
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the sleep between status polls
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the minimum gap between outbound requests
    #[must_use]
    pub fn min_request_gap(mut self, gap: Duration) -> Self {
        self.config.min_request_gap = gap;
        self
    }

    /// Set the cooldown used when a rate-limit response has no retry hint
    #[must_use]
    pub fn default_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.default_cooldown = cooldown;
        self
    }

    /// Set the result cache time-to-live
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any validation failure from [`PollerConfig::validate`]
    pub fn build(self) -> Result<PollerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
