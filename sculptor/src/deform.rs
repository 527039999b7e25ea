use log::{error, info, warn};

use crate::curve::{ControlCurve, CurveKind};
use crate::feature::{Feature, ResolutionParams};
use crate::landmarks::LandmarkSet;
use crate::mesh::Point3;
use crate::orientation::{find_start, match_linear, match_rotational, LineAxis};
use base::defs::{Error, ErrorKind::*, Result};

/// How control points take over scanned landmark positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeformKind {
    RingDirect,
    LineDirect(LineAxis),
    NearestGreedy,
    WeightedBlendRing,
}

/// Share of the eyebrow landmark taken over by each lower forehead point.
pub const EYEBROW_WEIGHTS: [f64; 16] = [
    1.0, 1.0, 1.0, 1.0, 0.7, 0.5, 0.3, 0.0, 0.0, 0.3, 0.5, 0.7, 1.0, 1.0, 1.0,
    1.0,
];

pub const SIDE_PROFILE_CURVE_POINTS: usize = 4;
pub const FRONT_PROFILE_CURVE_POINTS: usize = 6;

fn eyebrow_weight(index: usize, count: usize) -> f64 {
    let last = EYEBROW_WEIGHTS.len() - 1;
    let i = if count == EYEBROW_WEIGHTS.len() {
        index
    } else if count > 1 {
        ((index * last) as f64 / (count - 1) as f64).round() as usize
    } else {
        0
    };
    EYEBROW_WEIGHTS[i.min(last)]
}

fn check_count(what: &str, len: usize, point_count: usize) -> Result<()> {
    if len != point_count {
        let desc = format!("{} has {} points, {} expected", what, len, point_count);
        return Err(Error::new(CorrespondenceFailure, desc));
    }
    Ok(())
}

/// Copies `aligned` onto `control` in lockstep from the given start
/// indices, wrapping around both rings.
fn walk_ring(
    control: &mut [Point3],
    aligned: &[Point3],
    (control_start, target_start): (usize, usize),
    max_steps: usize,
) -> Result<()> {
    let n = control.len();
    let (mut c, mut t) = (control_start, target_start);
    let mut steps = 0;
    loop {
        steps += 1;
        if steps > max_steps {
            error!("ring walk exceeded {} steps", max_steps);
            let desc = "ring walk did not return to its start".to_string();
            return Err(Error::new(InconsistentState, desc));
        }
        control[c] = aligned[t];
        c = (c + 1) % n;
        t = (t + 1) % n;
        if c == control_start {
            return Ok(());
        }
    }
}

/// Moves `control` points onto `targets` according to `kind`.
pub fn deform(
    control: &mut [Point3],
    targets: &[Point3],
    point_count: usize,
    kind: DeformKind,
) -> Result<()> {
    if kind != DeformKind::NearestGreedy {
        check_count("control", control.len(), point_count)?;
        check_count("target", targets.len(), point_count)?;
    }
    if point_count == 0 {
        return Ok(());
    }

    match kind {
        DeformKind::RingDirect => {
            let aligned = match_rotational(control, targets.to_vec());
            let starts = find_start(control, &aligned);
            walk_ring(control, &aligned, starts, point_count + 1)?;
        }
        DeformKind::LineDirect(axis) => {
            let aligned = match_linear(control, targets.to_vec(), axis);
            control.copy_from_slice(&aligned);
        }
        DeformKind::WeightedBlendRing => {
            let aligned =
                match_linear(control, targets.to_vec(), LineAxis::Horizontal);
            for (i, (c, t)) in control.iter_mut().zip(aligned).enumerate() {
                let w = eyebrow_weight(i, point_count);
                *c = Point3::from(t.coords * w + c.coords * (1.0 - w));
            }
        }
        DeformKind::NearestGreedy => {
            let mut pool = targets.to_vec();
            for c in control.iter_mut() {
                let mut nearest: Option<(usize, f64)> = None;
                for (i, t) in pool.iter().enumerate() {
                    let distance = (t - *c).norm();
                    if nearest.map_or(true, |(_, d)| distance < d) {
                        nearest = Some((i, distance));
                    }
                }
                match nearest {
                    Some((i, _)) => *c = pool.remove(i),
                    None => {
                        let desc = "ran out of target points".to_string();
                        return Err(Error::new(CorrespondenceFailure, desc));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Drives every control curve with its scanned landmarks. Instances
/// lacking a curve or data are skipped; the number of deformed curves is
/// returned.
pub struct RegionDeformer<'a> {
    landmarks: &'a LandmarkSet,
    resolution: &'a ResolutionParams,
}

impl<'a> RegionDeformer<'a> {
    pub fn new(landmarks: &'a LandmarkSet, resolution: &'a ResolutionParams) -> Self {
        Self {
            landmarks,
            resolution,
        }
    }

    pub fn run(&self, curves: &mut [ControlCurve]) -> usize {
        let mut deformed = 0;

        let direct = [
            (Feature::Eye, CurveKind::Eye, DeformKind::RingDirect),
            (Feature::Mouth, CurveKind::InnerMouth, DeformKind::RingDirect),
            (
                Feature::MouthLoop,
                CurveKind::MouthLoop,
                DeformKind::LineDirect(LineAxis::Horizontal),
            ),
            (
                Feature::Nose,
                CurveKind::Nose,
                DeformKind::LineDirect(LineAxis::Horizontal),
            ),
            (
                Feature::Eyebrow,
                CurveKind::LowerForehead,
                DeformKind::WeightedBlendRing,
            ),
            (
                Feature::Ear,
                CurveKind::Ear,
                DeformKind::LineDirect(LineAxis::Vertical),
            ),
        ];

        for (feature, curve_kind, kind) in direct {
            let point_count = feature.points(self.resolution);
            for (i, targets) in self.landmarks.get(feature).iter().enumerate() {
                deformed += self.deform_instance(
                    curves,
                    curve_kind,
                    i + 1,
                    targets,
                    point_count,
                    kind,
                );
            }
        }

        let point_count = Feature::NoseBridge.points(self.resolution);
        for (i, targets) in self.landmarks.get(Feature::NoseBridge).iter().enumerate() {
            let curve_kind = if i % 2 == 0 {
                CurveKind::RightNoseBridge
            } else {
                CurveKind::LeftNoseBridge
            };
            deformed += self.deform_instance(
                curves,
                curve_kind,
                i / 2 + 1,
                targets,
                point_count,
                DeformKind::LineDirect(LineAxis::Vertical),
            );
        }

        deformed += self.deform_profiles(
            curves,
            Feature::SideProfile,
            |kind| kind == CurveKind::Profile,
            SIDE_PROFILE_CURVE_POINTS,
        );
        deformed += self.deform_profiles(
            curves,
            Feature::FrontProfile,
            CurveKind::is_front_profile,
            FRONT_PROFILE_CURVE_POINTS,
        );

        info!("  {} of {} control curves deformed", deformed, curves.len());
        deformed
    }

    fn deform_instance(
        &self,
        curves: &mut [ControlCurve],
        curve_kind: CurveKind,
        index: usize,
        targets: &[Point3],
        point_count: usize,
        kind: DeformKind,
    ) -> usize {
        let curve = match curves
            .iter_mut()
            .find(|c| c.kind == curve_kind && c.index == index)
        {
            Some(curve) => curve,
            None => {
                warn!("no {}{} for scanned landmarks", curve_kind, index);
                return 0;
            }
        };

        match deform(&mut curve.points, targets, point_count, kind) {
            Ok(()) => 1,
            Err(err) => {
                warn!("skipping {}: {}", curve.name, err);
                0
            }
        }
    }

    fn deform_profiles<F: Fn(CurveKind) -> bool>(
        &self,
        curves: &mut [ControlCurve],
        feature: Feature,
        selects: F,
        point_count: usize,
    ) -> usize {
        let pool: Vec<Point3> = self.landmarks.get(feature).concat();
        let mut deformed = 0;

        for curve in curves.iter_mut().filter(|c| selects(c.kind)) {
            if curve.points.len() != point_count {
                warn!(
                    "skipping {}: {} points, {} expected",
                    curve.name,
                    curve.points.len(),
                    point_count
                );
                continue;
            }
            match deform(&mut curve.points, &pool, point_count, DeformKind::NearestGreedy)
            {
                Ok(()) => deformed += 1,
                Err(err) => warn!("skipping {}: {}", curve.name, err),
            }
        }

        deformed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::curve::WireBinding;
    use base::assert_eq_point3;

    fn ring(count: usize, radius: f64, dx: f64, clockwise: bool) -> Vec<Point3> {
        (0..count)
            .map(|i| {
                let sign = if clockwise { -1.0 } else { 1.0 };
                let a = -std::f64::consts::FRAC_PI_2
                    + sign * 2.0 * std::f64::consts::PI * i as f64 / count as f64;
                Point3::new(dx + radius * a.cos(), radius * a.sin(), 0.0)
            })
            .collect()
    }

    fn winding(points: &[Point3]) -> f64 {
        let n = points.len();
        (0..n)
            .map(|i| {
                let (a, b) = (points[i], points[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum()
    }

    #[test]
    fn test_ring_walk_step_cap() {
        let aligned = ring(4, 1.0, 0.0, false);
        let mut control = vec![Point3::origin(); 4];

        let err = walk_ring(&mut control, &aligned, (0, 0), 3).unwrap_err();
        assert_eq!(err.kind, InconsistentState);

        walk_ring(&mut control, &aligned, (1, 3), 5).unwrap();
        for i in 0..4 {
            assert_eq!(control[(1 + i) % 4], aligned[(3 + i) % 4]);
        }
    }

    #[test]
    fn test_ring_direct_matches_target_sense() {
        let mut control = ring(16, 1.0, 0.0, false);
        let mut targets = ring(16, 0.5, 0.0, true);
        targets.rotate_left(5);

        deform(&mut control, &targets, 16, DeformKind::RingDirect).unwrap();

        assert!(winding(&control) > 0.0);
        assert_eq_point3!(control[0], Point3::new(0.0, -0.5, 0.0));
        let mut sorted_targets = targets.clone();
        let mut sorted_control = control.clone();
        let key = |p: &Point3| (p.x * 1e6).round() as i64 * 1_000_000 + (p.y * 1e6).round() as i64;
        sorted_targets.sort_by_key(key);
        sorted_control.sort_by_key(key);
        assert_eq!(sorted_control, sorted_targets);
    }

    #[test]
    fn test_line_direct() {
        let mut control: Vec<Point3> =
            (0..4).map(|i| Point3::new(0.0, i as f64, 0.0)).collect();
        let targets: Vec<Point3> =
            (0..4).map(|i| Point3::new(1.0, 3.0 - i as f64, 2.0)).collect();

        deform(
            &mut control,
            &targets,
            4,
            DeformKind::LineDirect(LineAxis::Vertical),
        )
        .unwrap();
        assert_eq_point3!(control[0], Point3::new(1.0, 0.0, 2.0));
        assert_eq_point3!(control[3], Point3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_count_mismatch() {
        let mut control = vec![Point3::origin(); 3];
        let err = deform(
            &mut control,
            &[Point3::origin(); 4],
            4,
            DeformKind::LineDirect(LineAxis::Horizontal),
        )
        .unwrap_err();
        assert_eq!(err.kind, CorrespondenceFailure);
    }

    #[test]
    fn test_weighted_blend_keeps_mid_brow() {
        let mut control: Vec<Point3> =
            (0..16).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let before = control.clone();
        let targets: Vec<Point3> =
            (0..16).map(|i| Point3::new(i as f64, 1.0, 0.5)).collect();

        deform(&mut control, &targets, 16, DeformKind::WeightedBlendRing).unwrap();

        assert_eq!(control[7], before[7]);
        assert_eq!(control[8], before[8]);
        assert_eq_point3!(control[0], targets[0]);
        assert_eq_point3!(control[5], Point3::new(5.0, 0.5, 0.25));
    }

    #[test]
    fn test_eyebrow_weight_scaling() {
        assert_eq!(eyebrow_weight(7, 16), 0.0);
        assert_eq!(eyebrow_weight(0, 8), 1.0);
        assert_eq!(eyebrow_weight(7, 8), 1.0);
        assert_eq!(eyebrow_weight(4, 9), 0.0);
    }

    #[test]
    fn test_nearest_greedy_bijection() {
        let mut control = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
        ];
        let targets = vec![
            Point3::new(0.0, 3.1, 0.2),
            Point3::new(0.0, 0.9, 0.2),
            Point3::new(0.0, -0.1, 0.2),
            Point3::new(0.0, 2.1, 0.2),
        ];

        deform(&mut control, &targets, 4, DeformKind::NearestGreedy).unwrap();
        assert_eq!(control, vec![targets[2], targets[1], targets[3], targets[0]]);

        let mut control = vec![Point3::origin(); 5];
        let err = deform(&mut control, &targets, 5, DeformKind::NearestGreedy)
            .unwrap_err();
        assert_eq!(err.kind, CorrespondenceFailure);
    }

    #[test]
    fn test_region_deformer_pairs_instances() {
        let mut landmarks = LandmarkSet::default();
        let bridge = |x: f64| -> Vec<Point3> {
            (0..4).map(|i| Point3::new(x, i as f64, 1.0)).collect()
        };
        landmarks
            .features
            .insert(Feature::NoseBridge, vec![bridge(-1.0), bridge(1.0)]);

        let binding = WireBinding {
            piece: "NoseBridge_geo_1".to_string(),
            dropoff: 0.05,
        };
        let flat = |x: f64| -> Vec<Point3> {
            (0..4).map(|i| Point3::new(x, i as f64, 0.0)).collect()
        };
        let mut curves = vec![
            ControlCurve::new(CurveKind::LeftNoseBridge, 1, flat(0.5), false, binding.clone()),
            ControlCurve::new(CurveKind::RightNoseBridge, 1, flat(-0.5), false, binding),
        ];

        let resolution = ResolutionParams::default();
        let deformed = RegionDeformer::new(&landmarks, &resolution).run(&mut curves);
        assert_eq!(deformed, 2);
        assert_eq!(curves[0].points, bridge(1.0));
        assert_eq!(curves[1].points, bridge(-1.0));
        assert_eq!(curves[0].base, flat(0.5));
    }
}
