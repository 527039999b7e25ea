use log::{debug, error};

use crate::feature::{rearrange, ScanSettings};
use crate::raster::{Point2i, RasterImage};
use crate::trace::{detect_colour_pixel, trace, MAX_ITERATIONS};

/// Finds every blob of a feature colour on an image and turns each one into
/// an ordered point sequence.
pub struct FeatureScanner<'a> {
    image: &'a RasterImage,
}

impl<'a> FeatureScanner<'a> {
    pub fn new(image: &'a RasterImage) -> Self {
        Self { image }
    }

    /// Returns one point sequence per detected blob. With `points` given
    /// every sequence is resampled to exactly that many points.
    pub fn scan(
        &self,
        settings: &ScanSettings,
        points: Option<usize>,
    ) -> Vec<Vec<Point2i>> {
        let mut instances = Vec::new();
        let mut start = settings.start;

        for i in 0.. {
            if i == MAX_ITERATIONS {
                error!(
                    "feature scan for {:?} exceeded {} blobs",
                    settings.colour, MAX_ITERATIONS
                );
                break;
            }

            let seed = match detect_colour_pixel(
                self.image,
                settings.colour,
                start,
                settings.order,
            ) {
                Some(seed) => seed,
                None => break,
            };

            let traced = trace(self.image, settings.colour, seed, settings.order);
            start = traced.resume;
            if traced.ring.is_empty() {
                continue;
            }

            let mut ring = rearrange(traced.ring, settings.tie_break);
            if !settings.is_ring {
                ring.truncate(ring.len() / 2);
            }
            debug!(
                "blob at ({}, {}) traced into {} points",
                seed.x,
                seed.y,
                ring.len()
            );

            instances.push(match points {
                Some(points) => resample(&ring, points),
                None => ring,
            });
        }

        instances
    }
}

/// Picks `points` entries at a fixed fractional stride.
pub fn resample(ring: &[Point2i], points: usize) -> Vec<Point2i> {
    if ring.is_empty() {
        return vec![];
    }

    let stride = ring.len() as f64 / points as f64;
    let mut sampled = Vec::with_capacity(points);
    let mut position = 0.0;

    for i in 0..points {
        if i == MAX_ITERATIONS {
            error!("resampling truncated at {} points", MAX_ITERATIONS);
            break;
        }
        let index = (position as usize).min(ring.len() - 1);
        sampled.push(ring[index]);
        position += stride;
    }

    sampled
}
