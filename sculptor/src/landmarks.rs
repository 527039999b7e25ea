use indexmap::IndexMap;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::feature::{
    tie_break_index, Feature, ResolutionParams, ScanSettings, StartTieBreak,
    SIDE_PROFILE_POINTS,
};
use crate::mesh::{Point3, Vector3};
use crate::raster::{Point2i, RasterImage};
use crate::scan::{resample, FeatureScanner};
use base::defs::{Error, ErrorKind::*, Result};

/// Combines front-view (x, y) and side-view (z, y) scans of one feature
/// into 3D landmarks.
pub struct StereoLandmarkBuilder<'a> {
    front: &'a RasterImage,
    side: &'a RasterImage,
}

fn y_span(points: &[Point2i]) -> (i32, i32) {
    let lowest = tie_break_index(points, StartTieBreak::LowestY)
        .map_or(0, |i| points[i].y);
    let highest = tie_break_index(points, StartTieBreak::HighestY)
        .map_or(0, |i| points[i].y);
    (lowest, highest)
}

impl<'a> StereoLandmarkBuilder<'a> {
    pub fn new(front: &'a RasterImage, side: &'a RasterImage) -> Self {
        Self { front, side }
    }

    /// Builds per-instance landmark lists of `points` points each.
    pub fn build_3d(
        &self,
        settings: &ScanSettings,
        points: usize,
    ) -> Result<Vec<Vec<Point3>>> {
        let front: Vec<Point2i> = FeatureScanner::new(self.front)
            .scan(settings, Some(points))
            .concat();
        if front.is_empty() {
            let desc =
                format!("colour {:?} not found on front image", settings.colour);
            return Err(Error::new(DataAbsent, desc));
        }

        let mut side: Vec<Point2i> =
            FeatureScanner::new(self.side).scan(settings, None).concat();
        if side.is_empty() {
            let desc = format!(
                "colour {:?} found on front image but not on side one",
                settings.colour
            );
            return Err(Error::new(ViewMismatch, desc));
        }

        let (front_lowest, front_highest) = y_span(&front);
        let (side_lowest, side_highest) = y_span(&side);

        let offset = (front_lowest + front_highest).div_euclid(2)
            - (side_lowest + side_highest).div_euclid(2);
        for point in side.iter_mut() {
            point.y += offset;
        }

        let front_range = front_highest - front_lowest;
        let side_range = side_highest - side_lowest;
        if front_range > side_range {
            let desc = format!(
                "side range {} of colour {:?} is smaller than front range {}",
                side_range, settings.colour, front_range
            );
            return Err(Error::new(ViewMismatch, desc));
        }

        let mut landmarks = Vec::with_capacity(front.len());
        for f in &front {
            match side.iter().find(|s| s.y == f.y) {
                Some(s) => landmarks.push(Point3::new(
                    f.x as f64,
                    f.y as f64,
                    s.x as f64,
                )),
                None => warn!(
                    "no side match for front point ({}, {}) of colour {:?}",
                    f.x, f.y, settings.colour
                ),
            }
        }

        Ok(group_instances(landmarks, points))
    }

    /// Scans the side profile alone; the profile lies in the X = 0 plane.
    pub fn build_side_profile(
        &self,
        settings: &ScanSettings,
    ) -> Result<Vec<Vec<Point3>>> {
        let side: Vec<Point2i> =
            FeatureScanner::new(self.side).scan(settings, None).concat();
        if side.is_empty() {
            let desc = "side profile not found on side image".to_string();
            return Err(Error::new(DataAbsent, desc));
        }

        let profile = resample(&side, SIDE_PROFILE_POINTS)
            .into_iter()
            .map(|p| Point3::new(0.0, p.y as f64, p.x as f64))
            .collect();
        Ok(vec![profile])
    }
}

fn group_instances(landmarks: Vec<Point3>, points: usize) -> Vec<Vec<Point3>> {
    if points == 0 {
        return vec![];
    }

    let chunks = landmarks.chunks_exact(points);
    if !chunks.remainder().is_empty() {
        warn!(
            "dropping {} landmarks not forming a whole instance",
            chunks.remainder().len()
        );
    }
    chunks.map(|c| c.to_vec()).collect()
}

/// Landmark instances of every scanned feature, in scanning order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub features: IndexMap<Feature, Vec<Vec<Point3>>>,
}

impl LandmarkSet {
    pub fn generate(
        front: &RasterImage,
        side: &RasterImage,
        resolution: &ResolutionParams,
    ) -> Result<LandmarkSet> {
        let builder = StereoLandmarkBuilder::new(front, side);

        let scanned: Vec<(Feature, Result<Vec<Vec<Point3>>>)> = Feature::ALL
            .par_iter()
            .map(|&feature| {
                let settings = feature.scan_settings();
                let res = if feature == Feature::SideProfile {
                    builder.build_side_profile(&settings)
                } else {
                    builder.build_3d(&settings, feature.points(resolution))
                };
                (feature, res)
            })
            .collect();

        let mut set = LandmarkSet::default();
        for (feature, res) in scanned {
            match res {
                Ok(instances) => {
                    info!("  {} instance(s) of {}", instances.len(), feature);
                    set.features.insert(feature, instances);
                }
                Err(err) if err.is_recoverable() => {
                    warn!("skipping {}: {}", feature, err);
                }
                Err(err) => return Err(err),
            }
        }

        set.scale_to_unit_volume()?;
        set.mirror_instances();
        set.flatten_side_profile();
        Ok(set)
    }

    pub fn get(&self, feature: Feature) -> &[Vec<Point3>] {
        self.features.get(&feature).map_or(&[], |v| v.as_slice())
    }

    fn points_mut(&mut self) -> impl Iterator<Item = &mut Point3> {
        self.features.values_mut().flatten().flatten()
    }

    /// Scales uniformly so that the longest bounding-box side becomes 1 and
    /// centres the set on the origin.
    pub fn scale_to_unit_volume(&mut self) -> Result<()> {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for p in self.points_mut() {
            min = min.inf(&p.coords);
            max = max.sup(&p.coords);
        }

        let extent = max - min;
        if !extent.iter().all(|&e| e.is_finite() && e > 0.0) {
            let desc = format!(
                "landmark bounding box {:?} has no volume",
                extent.as_slice()
            );
            return Err(Error::new(DegenerateGeometry, desc));
        }

        let scale = 1.0 / extent.max();
        let centre = (min + max) / 2.0;
        for p in self.points_mut() {
            p.coords = (p.coords - centre) * scale;
        }
        Ok(())
    }

    /// Numbers eye and ear instances right-to-left.
    pub fn mirror_instances(&mut self) {
        for (feature, instances) in self.features.iter_mut() {
            if feature.is_mirrored() {
                instances.reverse();
            }
        }
    }

    pub fn flatten_side_profile(&mut self) {
        if let Some(instances) = self.features.get_mut(&Feature::SideProfile) {
            for p in instances.iter_mut().flatten() {
                p.x = 0.0;
            }
        }
    }
}
