use log::warn;

use crate::mesh::Point3;

/// Axis along which the direction of a line is compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineAxis {
    Horizontal,
    Vertical,
}

fn centroid(points: &[Point3]) -> (f64, f64) {
    let n = points.len().max(1) as f64;
    let (x, y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    (x / n, y / n)
}

fn bounding_box_centre(points: &[Point3]) -> (f64, f64) {
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min = (min.0.min(p.x), min.1.min(p.y));
        max = (max.0.max(p.x), max.1.max(p.y));
    }
    ((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0)
}

/// Z-component of (first − centre) × (second − centre) in the XY plane.
fn winding(points: &[Point3], centre: (f64, f64)) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let (a, b) = (&points[0], &points[1]);
    (a.x - centre.0) * (b.y - centre.1) - (a.y - centre.1) * (b.x - centre.0)
}

/// Reverses `target` when it runs in the opposite rotational sense to
/// `control`. The control ring is measured around its centroid, the target
/// around its bounding-box centre.
pub fn match_rotational(control: &[Point3], mut target: Vec<Point3>) -> Vec<Point3> {
    let control_winding = winding(control, centroid(control));
    let target_winding = winding(&target, bounding_box_centre(&target));

    if control_winding == 0.0 || target_winding == 0.0 {
        warn!("ring direction is ambiguous, keeping target order");
        return target;
    }

    if (control_winding > 0.0) != (target_winding > 0.0) {
        target.reverse();
    }
    target
}

/// Reverses `target` when its end points run opposite to `control`'s along
/// the given axis.
pub fn match_linear(
    control: &[Point3],
    mut target: Vec<Point3>,
    axis: LineAxis,
) -> Vec<Point3> {
    let descending = |points: &[Point3]| match (points.first(), points.last()) {
        (Some(first), Some(last)) => match axis {
            LineAxis::Horizontal => first.x > last.x,
            LineAxis::Vertical => first.y > last.y,
        },
        _ => false,
    };

    if descending(control) != descending(&target) {
        target.reverse();
    }
    target
}

/// Bottom-most of the two points nearest to the ring's bounding-box centre
/// X; ties go to the lower index.
fn ring_start(ring: &[Point3]) -> usize {
    let (centre_x, _) = bounding_box_centre(ring);

    let mut indices: Vec<usize> = (0..ring.len()).collect();
    indices.sort_by(|&a, &b| {
        let da = (ring[a].x - centre_x).abs();
        let db = (ring[b].x - centre_x).abs();
        da.total_cmp(&db)
    });

    match indices.as_slice() {
        [] => 0,
        [only] => *only,
        [a, b, ..] => {
            let (a, b) = (*a.min(b), *a.max(b));
            if ring[b].y < ring[a].y {
                b
            } else {
                a
            }
        }
    }
}

/// Start indices from which both rings are walked in lockstep.
pub fn find_start(control: &[Point3], target: &[Point3]) -> (usize, usize) {
    (ring_start(control), ring_start(target))
}

#[cfg(test)]
mod test {
    use super::*;

    /// Eight points around the origin, anti-clockwise from the bottom.
    fn diamond(scale: f64, dx: f64) -> Vec<Point3> {
        [
            (0.0, -2.0),
            (1.0, -1.5),
            (2.0, 0.0),
            (1.0, 1.5),
            (0.0, 2.0),
            (-1.0, 1.5),
            (-2.0, 0.0),
            (-1.0, -1.5),
        ]
        .iter()
        .map(|&(x, y)| Point3::new(x * scale + dx, y * scale, 0.0))
        .collect()
    }

    #[test]
    fn test_match_rotational() {
        let control = diamond(1.0, 0.0);
        let mut clockwise = diamond(0.5, 3.0);
        clockwise.reverse();

        let aligned = match_rotational(&control, clockwise.clone());
        assert_eq!(aligned, diamond(0.5, 3.0));

        let again = match_rotational(&control, aligned.clone());
        assert_eq!(again, aligned);
    }

    #[test]
    fn test_match_rotational_ambiguous() {
        let control = diamond(1.0, 0.0);
        let collinear = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let mut reversed = collinear.clone();
        reversed.reverse();
        assert_eq!(match_rotational(&control, reversed.clone()), reversed);
    }

    #[test]
    fn test_match_linear() {
        let control = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 5.0, 0.0)];
        let target = vec![Point3::new(3.0, 1.0, 0.0), Point3::new(2.0, 0.0, 0.0)];

        let aligned = match_linear(&control, target.clone(), LineAxis::Horizontal);
        assert_eq!(aligned[0].x, 2.0);

        let aligned = match_linear(&control, target.clone(), LineAxis::Vertical);
        assert_eq!(aligned[0].y, 0.0);

        let mut same = target.clone();
        same.reverse();
        assert_eq!(match_linear(&control, same.clone(), LineAxis::Horizontal), same);
    }

    #[test]
    fn test_find_start() {
        let control = diamond(1.0, 0.0);
        let mut target = diamond(2.0, 10.0);
        target.rotate_left(3);

        assert_eq!(find_start(&control, &target), (0, 5));
    }

    #[test]
    fn test_find_start_tie_goes_to_lower_index() {
        let ring = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert_eq!(find_start(&ring, &ring), (1, 1));
        assert_eq!(find_start(&[], &[]), (0, 0));
    }
}
