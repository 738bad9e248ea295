#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # DesignForge
//!
//! Core engines for a custom-apparel design studio: chroma-key background
//! removal for AI-generated design images, and a generic polling client for
//! the asynchronous remote queues (image generation, garment mockups, print
//! upscaling) those designs flow through.
//!
//! ## Features
//!
//! - **Background Segmenter**: histogram-based border color estimation,
//!   4-connected flood fill from the image edges, and feathered alpha edges
//!   so cutouts composite cleanly onto garment mockups
//! - **Async Job Poller**: attempt-bounded create/poll/fetch state machine
//!   with a TTL result cache, in-flight de-duplication, minimum request
//!   spacing, and rate-limit cooldown windows shared across callers
//! - **Best-Effort Fetching**: remote designs that cannot be fetched or
//!   decoded degrade to the original reference instead of failing the flow
//!
//! ## Quick Start
//!
//! ### Cutting out a design
//!
//! ```rust,no_run
//! use designforge::{cutout_from_bytes, SegmenterConfig};
//!
//! # fn example(design_bytes: Vec<u8>) -> anyhow::Result<()> {
//! let config = SegmenterConfig::builder()
//!     .hard_tolerance(30.0)
//!     .soft_tolerance(62.0)
//!     .build()?;
//! let cutout = cutout_from_bytes(&design_bytes, &config)?;
//! cutout.save("cutout.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Polling a mockup job
//!
//! ```rust,no_run
//! use designforge::{JobPoller, JobOperations, PollerConfig, RateLimiter};
//! use tokio_util::sync::CancellationToken;
//! use std::sync::Arc;
//!
//! # async fn example<Q>(mockup_queue: Q) -> anyhow::Result<()>
//! # where Q: JobOperations<Params = designforge::MockupRequest, Output = String> {
//! let limiter = Arc::new(RateLimiter::new(
//!     PollerConfig::default().min_request_gap,
//! ));
//! let poller = JobPoller::new(mockup_queue, PollerConfig::mockup_preview(), limiter)?;
//!
//! let request = designforge::MockupRequest {
//!     product_id: 71,
//!     variant_id: 4012,
//!     design_url: "https://cdn.example.com/designs/abc.png".into(),
//!     placement: designforge::Placement::default(),
//! };
//! request.validate()?;
//! let mockup_url = poller
//!     .run_job(&request.job_key(), &request, &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The poller is vendor-agnostic: implement [`JobOperations`] once per remote
//! queue and the same engine drives all of them.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod poller;
pub mod ratelimit;
pub mod segmenter;
pub mod types;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use cache::ResultCache;
pub use config::{
    PollerConfig, PollerConfigBuilder, SegmenterConfig, SegmenterConfigBuilder, MAX_RGB_DISTANCE,
};
pub use error::{DesignForgeError, Result};
pub use fetch::{DesignFetcher, DesignSource};
pub use poller::{JobError, JobId, JobOperations, JobPoller, JobStatus, PollError};
pub use ratelimit::{parse_retry_after, RateLimiter};
pub use segmenter::{BackgroundEstimate, Segmenter};
pub use types::{JobKey, MockupRequest, Placement};

/// Cut out the background of a design image provided as bytes
///
/// Decodes the image (PNG or JPEG), then removes its edge-connected
/// background with feathered edges.
///
/// # Errors
/// - Undecodable image data
/// - Invalid segmenter configuration
pub fn cutout_from_bytes(image_bytes: &[u8], config: &SegmenterConfig) -> Result<image::RgbaImage> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| DesignForgeError::decode_error("memory buffer", &e))?;
    cutout_from_image(&image, config)
}

/// Cut out the background of an already-decoded design image
///
/// # Errors
/// - Invalid segmenter configuration
pub fn cutout_from_image(
    image: &image::DynamicImage,
    config: &SegmenterConfig,
) -> Result<image::RgbaImage> {
    let segmenter = Segmenter::new(config.clone())?;
    Ok(segmenter.segment(image))
}

/// Cut out the background of a design image read from an async stream
///
/// Suitable for web-server upload handling or any async byte source.
///
/// # Errors
/// - Stream read failures
/// - Undecodable image data
/// - Invalid segmenter configuration
pub async fn cutout_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &SegmenterConfig,
) -> Result<image::RgbaImage> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    cutout_from_bytes(&buffer, config)
}
