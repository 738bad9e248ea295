//! Core data types shared by the segmenter and the job poller

use crate::error::{DesignForgeError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Composite cache and de-duplication key for remote jobs
///
/// A `JobKey` is built from every parameter that affects a job's output. Two
/// requests with an identical key describe the same logical job and must
/// share one cache slot and one in-flight remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey(String);

impl JobKey {
    /// Build a key by joining the output-affecting parameters in order
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("|");
        Self(joined)
    }

    /// The raw joined key string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 digest of the key, safe for log lines
    ///
    /// Keys frequently embed full design URLs; log output uses this digest
    /// instead of the raw key.
    #[must_use]
    pub fn short_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest.chars().take(12).collect()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_digest())
    }
}

/// On-garment placement of a design
///
/// Values are rounded to integers before entering a [`JobKey`] so that
/// visually identical placements (slider jitter well below print resolution)
/// share a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Design width as a percentage-like scale factor of the print area
    pub scale: f32,
    /// Vertical offset from the default print position
    pub y_offset: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            scale: 20.0,
            y_offset: 0.0,
        }
    }
}

impl Placement {
    /// Placement rounded to the stable granularity used for job keys
    #[must_use]
    pub fn rounded(&self) -> (i64, i64) {
        (self.scale.round() as i64, self.y_offset.round() as i64)
    }
}

/// Parameters for a garment mockup job
///
/// This is the descriptor handed to a mockup-queue [`crate::JobOperations`]
/// implementation; the poller itself only ever sees the derived [`JobKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockupRequest {
    /// Print-provider catalog product identifier
    pub product_id: u64,
    /// Catalog variant identifier (size/color combination)
    pub variant_id: u64,
    /// Publicly fetchable URL of the design image
    pub design_url: String,
    /// Requested on-garment placement
    pub placement: Placement,
}

impl MockupRequest {
    /// Validate the request before any network activity
    ///
    /// # Errors
    /// - Empty design URL
    /// - `data:` URL, which the remote mockup queue cannot fetch
    pub fn validate(&self) -> Result<()> {
        if self.design_url.is_empty() {
            return Err(DesignForgeError::invalid_config(
                "design URL must not be empty",
            ));
        }
        if self.design_url.starts_with("data:") {
            return Err(DesignForgeError::invalid_config(
                "data: URLs are not fetchable by the mockup queue; upload the design first",
            ));
        }
        Ok(())
    }

    /// Derive the job key from all output-affecting parameters
    #[must_use]
    pub fn job_key(&self) -> JobKey {
        let (scale, y_offset) = self.placement.rounded();
        JobKey::from_parts([
            self.product_id.to_string(),
            self.variant_id.to_string(),
            self.design_url.clone(),
            scale.to_string(),
            y_offset.to_string(),
        ])
    }
}
