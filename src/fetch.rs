//! Best-effort remote design loading
//!
//! Design images live on third-party CDNs (generation queues, print
//! providers), and fetching them is a cosmetic enhancement, never a hard
//! dependency: when a design cannot be fetched or decoded, callers fall back
//! to displaying the original reference untouched instead of failing the
//! user's flow.

use crate::error::{DesignForgeError, Result};
use crate::segmenter::Segmenter;
use image::{DynamicImage, RgbaImage};
use tracing::{debug, warn};

/// Outcome of a best-effort cutout over a remote design reference
#[derive(Debug, Clone, PartialEq)]
pub enum DesignSource {
    /// The design was fetched, decoded, and segmented
    Cutout(RgbaImage),
    /// The source was unavailable or undecodable; use the reference as-is
    Original(String),
}

/// HTTP loader for remote design images
#[derive(Debug, Clone)]
pub struct DesignFetcher {
    client: reqwest::Client,
}

impl Default for DesignFetcher {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl DesignFetcher {
    /// Create a fetcher with a dedicated HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher reusing an existing HTTP client (connection pooling)
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch and decode a design image, surfacing failures as typed errors
    ///
    /// # Errors
    /// - HTTP transport failures or non-2xx responses
    /// - Undecodable response bodies
    pub async fn load(&self, url: &str) -> Result<DynamicImage> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes for design {}", bytes.len(), url);
        image::load_from_memory(&bytes)
            .map_err(|e| DesignForgeError::decode_error("remote design", &e))
    }

    /// Fetch a design and segment it, falling back to the original reference
    ///
    /// This is the composition UI surfaces want: a transparent cutout when
    /// possible, the untouched original when the source is unavailable
    /// (cross-origin denial, CDN expiry, decode failure).
    pub async fn load_cutout(&self, url: &str, segmenter: &Segmenter) -> DesignSource {
        match self.load(url).await {
            Ok(image) => DesignSource::Cutout(segmenter.segment(&image)),
            Err(error) => {
                warn!(
                    "Design {} unavailable ({}); falling back to original",
                    url, error
                );
                DesignSource::Original(url.to_owned())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_source_falls_back_to_original() {
        let fetcher = DesignFetcher::new();
        let segmenter = Segmenter::default();
        // Reserved TLD guarantees resolution failure without network access
        let source = fetcher
            .load_cutout("http://design-cdn.invalid/art.png", &segmenter)
            .await;
        assert_eq!(
            source,
            DesignSource::Original("http://design-cdn.invalid/art.png".to_owned())
        );
    }
}
