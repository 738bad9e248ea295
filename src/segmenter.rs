//! Chroma-key background segmentation for design cutouts
//!
//! Removes the roughly uniform background of a generated design image so the
//! subject composites cleanly onto a garment mockup. The pipeline is:
//!
//! 1. Estimate the dominant background color from border samples using a
//!    16×16×16 RGB histogram.
//! 2. Flood-fill (4-connected BFS) from every border pixel that matches the
//!    estimate, growing through a looser soft tolerance so anti-aliased halos
//!    join the background region.
//! 3. Rewrite alpha: certain background goes fully transparent, the
//!    transitional band is feathered, and pixels never reached by the fill
//!    are left untouched. An enclosed subject region keeps its alpha even if
//!    it happens to share the background color.

use crate::config::SegmenterConfig;
use crate::error::Result;
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use std::collections::VecDeque;
use tracing::debug;

/// Alpha below which a pixel is treated as already transparent
const TRANSPARENT_ALPHA: u8 = 8;

/// Minimum alpha for a border sample to count toward the color histogram
const SAMPLE_MIN_ALPHA: u8 = 10;

/// Histogram buckets along each color axis (top 4 bits of the channel)
const BUCKETS_PER_AXIS: usize = 16;

/// Total histogram buckets (16×16×16)
const BUCKET_COUNT: usize = BUCKETS_PER_AXIS * BUCKETS_PER_AXIS * BUCKETS_PER_AXIS;

/// Dominant border color estimate for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundEstimate {
    /// Mean red of the most populous border-sample bucket
    pub r: u8,
    /// Mean green of the most populous border-sample bucket
    pub g: u8,
    /// Mean blue of the most populous border-sample bucket
    pub b: u8,
}

impl BackgroundEstimate {
    /// Squared Euclidean RGB distance from this estimate to a pixel
    ///
    /// Squared form keeps the hot fill loop free of square roots; only the
    /// final feathering step needs the true distance.
    #[inline]
    fn distance_squared(&self, pixel: Rgba<u8>) -> f32 {
        let dr = f32::from(self.r) - f32::from(pixel[0]);
        let dg = f32::from(self.g) - f32::from(pixel[1]);
        let db = f32::from(self.b) - f32::from(pixel[2]);
        dr.mul_add(dr, dg.mul_add(dg, db * db))
    }
}

/// Background removal engine for design images
///
/// Stateless and reentrant: each [`Segmenter::segment`] call allocates its
/// own working buffers, so one instance may serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            config: SegmenterConfig::default(),
        }
    }
}

impl Segmenter {
    /// Create a segmenter with a validated configuration
    ///
    /// # Errors
    /// - Invalid tolerance or sizing parameters
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the active configuration
    #[must_use]
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Remove the background from a design image
    ///
    /// Returns a new RGBA image with the edge-connected background region
    /// made transparent and its transitional band feathered. Images larger
    /// than the configured cap are downsampled first (aspect preserved).
    ///
    /// Segmentation is cosmetic and total: it cannot fail once the image is
    /// in memory. If no opaque border samples exist (the image is already
    /// fully cut out along its edges) the input is returned unchanged.
    #[must_use]
    pub fn segment(&self, image: &DynamicImage) -> RgbaImage {
        let mut rgba = self.prepare(image);

        let Some(background) = self.estimate_background(&rgba) else {
            debug!("No opaque border samples; returning image unchanged");
            return rgba;
        };
        debug!(
            "Estimated background color rgb({}, {}, {})",
            background.r, background.g, background.b
        );

        let visited = self.flood_fill(&rgba, background);
        self.apply_feather(&mut rgba, &visited, background);
        rgba
    }

    /// Downsample to the configured cap, preserving aspect ratio
    fn prepare(&self, image: &DynamicImage) -> RgbaImage {
        let (width, height) = (image.width(), image.height());
        let largest = width.max(height);
        if largest <= self.config.max_dimension || largest == 0 {
            return image.to_rgba8();
        }

        let scale = self.config.max_dimension as f32 / largest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        debug!(
            "Downsampling {}x{} -> {}x{} before segmentation",
            width, height, new_width, new_height
        );
        image.resize(new_width, new_height, FilterType::Triangle).to_rgba8()
    }

    /// Estimate the dominant border color via a 16×16×16 histogram
    ///
    /// Samples all four edges at a stride proportional to image size, skips
    /// near-transparent pixels, and returns the mean color of the most
    /// populous bucket. A single mode is robust against stray bright or dark
    /// border pixels from anti-aliasing and JPEG artifacts.
    ///
    /// Returns `None` when no border sample is opaque enough to count.
    #[must_use]
    pub fn estimate_background(&self, image: &RgbaImage) -> Option<BackgroundEstimate> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let stride = (width.max(height) / self.config.border_samples).max(1);

        let mut counts = vec![0u32; BUCKET_COUNT];
        let mut sums = vec![[0u64; 3]; BUCKET_COUNT];

        let mut tally = |pixel: Rgba<u8>| {
            if pixel[3] < SAMPLE_MIN_ALPHA {
                return;
            }
            let bucket = (usize::from(pixel[0] >> 4) << 8)
                | (usize::from(pixel[1] >> 4) << 4)
                | usize::from(pixel[2] >> 4);
            counts[bucket] += 1;
            sums[bucket][0] += u64::from(pixel[0]);
            sums[bucket][1] += u64::from(pixel[1]);
            sums[bucket][2] += u64::from(pixel[2]);
        };

        let mut x = 0;
        while x < width {
            tally(*image.get_pixel(x, 0));
            tally(*image.get_pixel(x, height - 1));
            x += stride;
        }
        let mut y = 0;
        while y < height {
            tally(*image.get_pixel(0, y));
            tally(*image.get_pixel(width - 1, y));
            y += stride;
        }
        drop(tally);

        let (bucket, &count) = counts
            .iter()
            .enumerate()
            .max_by_key(|&(_, count)| count)?;
        if count == 0 {
            return None;
        }

        let total = u64::from(count);
        Some(BackgroundEstimate {
            r: (sums[bucket][0] / total) as u8,
            g: (sums[bucket][1] / total) as u8,
            b: (sums[bucket][2] / total) as u8,
        })
    }

    /// Breadth-first flood fill of the edge-connected background region
    ///
    /// Border pixels seed the fill when near-transparent or within the hard
    /// tolerance of the estimate; interior pixels join when near-transparent
    /// or within the looser soft tolerance. Each pixel is visited at most
    /// once. The queue is sized to the pixel count up front; that bound is
    /// part of the correctness argument, not a tuning knob.
    fn flood_fill(&self, image: &RgbaImage, background: BackgroundEstimate) -> Vec<bool> {
        let (width, height) = image.dimensions();
        let total = width as usize * height as usize;

        let hard_sq = self.config.hard_tolerance * self.config.hard_tolerance;
        let soft_sq = self.config.soft_tolerance * self.config.soft_tolerance;

        let mut visited = vec![false; total];
        let mut queue: VecDeque<(u32, u32)> = VecDeque::with_capacity(total);

        let is_seed = |pixel: Rgba<u8>| {
            pixel[3] < TRANSPARENT_ALPHA || background.distance_squared(pixel) <= hard_sq
        };

        let seed = |x: u32, y: u32, visited: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
            let idx = y as usize * width as usize + x as usize;
            if !visited[idx] && is_seed(*image.get_pixel(x, y)) {
                visited[idx] = true;
                queue.push_back((x, y));
            }
        };

        for x in 0..width {
            seed(x, 0, &mut visited, &mut queue);
            seed(x, height - 1, &mut visited, &mut queue);
        }
        for y in 0..height {
            seed(0, y, &mut visited, &mut queue);
            seed(width - 1, y, &mut visited, &mut queue);
        }

        let seed_count = queue.len();

        while let Some((x, y)) = queue.pop_front() {
            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx >= width || ny >= height {
                    continue;
                }
                let idx = ny as usize * width as usize + nx as usize;
                if visited[idx] {
                    continue;
                }
                let pixel = *image.get_pixel(nx, ny);
                if pixel[3] < TRANSPARENT_ALPHA || background.distance_squared(pixel) <= soft_sq {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        debug!(
            "Flood fill: {} seeds, {} of {} pixels marked background",
            seed_count,
            visited.iter().filter(|&&v| v).count(),
            total
        );
        visited
    }

    /// Rewrite alpha over the filled region with a feathered transition band
    ///
    /// Distance ≤ hard tolerance clears alpha entirely; between hard and
    /// soft, existing alpha scales linearly with the distance so cutouts do
    /// not show a hard halo. Unvisited pixels are never modified.
    fn apply_feather(&self, image: &mut RgbaImage, visited: &[bool], background: BackgroundEstimate) {
        let width = image.width() as usize;
        let hard = self.config.hard_tolerance;
        let soft = self.config.soft_tolerance;
        let band = soft - hard;

        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let idx = y as usize * width + x as usize;
            if !visited[idx] {
                continue;
            }
            let distance = background.distance_squared(*pixel).sqrt();
            let factor = ((distance - hard) / band).clamp(0.0, 1.0);
            pixel[3] = (f32::from(pixel[3]) * factor).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_estimate_picks_dominant_border_color() {
        let image = solid_image(32, 32, [12, 14, 16, 255]);
        let segmenter = Segmenter::default();
        let estimate = segmenter.estimate_background(&image).unwrap();
        assert_eq!((estimate.r, estimate.g, estimate.b), (12, 14, 16));
    }

    #[test]
    fn test_estimate_ignores_stray_border_pixels() {
        let mut image = solid_image(64, 64, [10, 10, 10, 255]);
        // A couple of bright JPEG-artifact pixels must not move the mode
        image.put_pixel(0, 0, Rgba([250, 250, 250, 255]));
        image.put_pixel(63, 0, Rgba([240, 5, 5, 255]));
        let segmenter = Segmenter::default();
        let estimate = segmenter.estimate_background(&image).unwrap();
        assert!(estimate.r < 20 && estimate.g < 20 && estimate.b < 20);
    }

    #[test]
    fn test_estimate_skips_transparent_border() {
        let image = solid_image(16, 16, [0, 0, 0, 0]);
        let segmenter = Segmenter::default();
        assert!(segmenter.estimate_background(&image).is_none());
    }

    #[test]
    fn test_segment_clears_uniform_background() {
        let mut image = solid_image(24, 24, [8, 8, 8, 255]);
        // A bright foreground blob in the center, well past the soft tolerance
        for y in 8..16 {
            for x in 8..16 {
                image.put_pixel(x, y, Rgba([220, 60, 40, 255]));
            }
        }
        let segmenter = Segmenter::default();
        let result = segmenter.segment(&DynamicImage::ImageRgba8(image));
        assert_eq!(result.get_pixel(0, 0)[3], 0);
        assert_eq!(result.get_pixel(23, 23)[3], 0);
        assert_eq!(result.get_pixel(12, 12)[3], 255);
    }

    #[test]
    fn test_segment_downsamples_oversized_input() {
        let image = solid_image(96, 48, [5, 5, 5, 255]);
        let segmenter = Segmenter::new(
            SegmenterConfig::builder().max_dimension(48).build().unwrap(),
        )
        .unwrap();
        let result = segmenter.segment(&DynamicImage::ImageRgba8(image));
        assert_eq!(result.dimensions(), (48, 24));
    }

    #[test]
    fn test_near_transparent_border_seeds_fill() {
        // Border alpha below the transparency threshold seeds the fill even
        // when its color is nowhere near the background estimate
        let mut image = solid_image(12, 12, [200, 200, 200, 255]);
        for x in 0..12 {
            image.put_pixel(x, 0, Rgba([0, 255, 0, 3]));
        }
        let segmenter = Segmenter::default();
        let background = BackgroundEstimate { r: 0, g: 0, b: 0 };
        let visited = segmenter.flood_fill(&image, background);
        assert!(visited[0]);
        assert!(visited[5]);
        // The opaque bright body is neither seeded nor joined
        assert!(!visited[6 * 12 + 6]);
    }
}
