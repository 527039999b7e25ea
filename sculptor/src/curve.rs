use std::collections::{HashMap, HashSet};

use derive_more::Display;
use serde::Serialize;

use crate::mesh::{edge_key, Edge, Point3, Vector3};
use crate::region::RegionSet;

/// Role of a control curve on the head.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize)]
pub enum CurveKind {
    #[display(fmt = "EyeCurve")]
    Eye,
    #[display(fmt = "InnerMouthCurve")]
    InnerMouth,
    #[display(fmt = "MouthLoopCurve")]
    MouthLoop,
    #[display(fmt = "NoseCurve")]
    Nose,
    #[display(fmt = "LowerForeheadCurve")]
    LowerForehead,
    #[display(fmt = "EarCurve")]
    Ear,
    #[display(fmt = "RtNoseBridgeCurve")]
    RightNoseBridge,
    #[display(fmt = "LfNoseBridgeCurve")]
    LeftNoseBridge,
    #[display(fmt = "_ProfileCurve")]
    Profile,
    #[display(fmt = "UpperForehead_FtProfileCurve")]
    UpperForeheadProfile,
    #[display(fmt = "Cheek_FtProfileCurve")]
    CheekProfile,
    #[display(fmt = "Chin_FtProfileCurve")]
    ChinProfile,
}

impl CurveKind {
    pub fn is_front_profile(self) -> bool {
        matches!(
            self,
            CurveKind::UpperForeheadProfile
                | CurveKind::CheekProfile
                | CurveKind::ChinProfile
        )
    }
}

/// Piece deformed by a curve and the distance its influence fades over.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WireBinding {
    pub piece: String,
    pub dropoff: f64,
}

/// Ordered edit points bound to a mesh piece. `base` keeps the points the
/// binding was made with.
#[derive(Clone, Debug, Serialize)]
pub struct ControlCurve {
    pub name: String,
    pub kind: CurveKind,
    pub index: usize,
    pub is_ring: bool,
    pub base: Vec<Point3>,
    pub points: Vec<Point3>,
    pub binding: WireBinding,
}

impl ControlCurve {
    pub fn new(
        kind: CurveKind,
        index: usize,
        points: Vec<Point3>,
        is_ring: bool,
        binding: WireBinding,
    ) -> Self {
        let name = if kind == CurveKind::Profile {
            format!("{}{}", binding.piece, kind)
        } else {
            format!("{}{}", kind, index)
        };
        Self {
            name,
            kind,
            index,
            is_ring,
            base: points.clone(),
            points,
            binding,
        }
    }

    fn segments(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.base.len();
        let count = if self.is_ring { n } else { n.saturating_sub(1) };
        (0..count).map(move |i| (i, (i + 1) % n))
    }

    /// Distance from `p` to the bind-time curve and the curve displacement
    /// at the closest spot.
    pub fn displacement_near(&self, p: &Point3) -> Option<(f64, Vector3)> {
        let offset = |i: usize| self.points[i] - self.base[i];

        if self.base.len() == 1 {
            return Some(((p - self.base[0]).norm(), offset(0)));
        }

        let mut best: Option<(f64, Vector3)> = None;
        for (i, j) in self.segments() {
            let (a, b) = (self.base[i], self.base[j]);
            let ab = b - a;
            let len2 = ab.norm_squared();
            let t = if len2 > 0.0 {
                ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let distance = (p - (a + ab * t)).norm();
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, offset(i) * (1.0 - t) + offset(j) * t));
            }
        }
        best
    }
}

/// Smooth influence fading from 1 on the curve to 0 at `dropoff`.
pub fn falloff(distance: f64, dropoff: f64) -> f64 {
    if dropoff <= 0.0 || distance >= dropoff {
        return 0.0;
    }
    let s = distance / dropoff;
    1.0 - s * s * (3.0 - 2.0 * s)
}

/// Moves every bound vertex by the weighted displacement of its curves.
/// Distances are measured against the undeformed piece.
pub fn apply_wires(regions: &mut RegionSet, curves: &[ControlCurve]) {
    let mut offsets: HashMap<&str, Vec<Vector3>> = HashMap::new();

    for curve in curves {
        let piece = match regions.get(&curve.binding.piece) {
            Some(piece) => piece,
            None => continue,
        };
        let piece_offsets = offsets
            .entry(curve.binding.piece.as_str())
            .or_insert_with(|| vec![Vector3::zeros(); piece.mesh.vertices.len()]);

        for (v, p) in piece.mesh.vertices.iter().enumerate() {
            if let Some((distance, displacement)) = curve.displacement_near(p) {
                let weight = falloff(distance, curve.binding.dropoff);
                if weight > 0.0 {
                    piece_offsets[v] += displacement * weight;
                }
            }
        }
    }

    for (name, piece_offsets) in offsets {
        if let Some(piece) = regions.get_mut(name) {
            for (p, offset) in piece.mesh.vertices.iter_mut().zip(piece_offsets) {
                *p += offset;
            }
        }
    }
}

/// Evenly spaced points along a polyline, by arc length.
pub fn rebuild(points: &[Point3], count: usize, closed: bool) -> Vec<Point3> {
    if points.is_empty() || count == 0 {
        return vec![];
    }

    let mut path = points.to_vec();
    if closed {
        path.push(points[0]);
    }

    let mut lengths = vec![0.0];
    for w in path.windows(2) {
        let last = lengths[lengths.len() - 1];
        lengths.push(last + (w[1] - w[0]).norm());
    }
    let total = lengths[lengths.len() - 1];
    if total == 0.0 {
        return vec![points[0]; count];
    }

    let step = if closed {
        total / count as f64
    } else if count > 1 {
        total / (count - 1) as f64
    } else {
        0.0
    };

    let mut rebuilt = Vec::with_capacity(count);
    let mut segment = 0;
    for k in 0..count {
        let s = (step * k as f64).min(total);
        while segment + 2 < lengths.len() && lengths[segment + 1] < s {
            segment += 1;
        }
        let span = lengths[segment + 1] - lengths[segment];
        let t = if span > 0.0 {
            (s - lengths[segment]) / span
        } else {
            0.0
        };
        let (a, b) = (path[segment], path[segment + 1]);
        rebuilt.push(a + (b - a) * t);
    }
    rebuilt
}

/// Vertex sequence formed by connected edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    pub vertices: Vec<usize>,
    pub closed: bool,
}

/// Links edges into chains: open paths first, then loops.
pub fn chain_edges(edges: &[Edge]) -> Vec<Chain> {
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut vertices: Vec<usize> = adjacency.keys().copied().collect();
    vertices.sort_unstable();
    let ends: Vec<usize> = vertices
        .iter()
        .copied()
        .filter(|v| adjacency[v].len() == 1)
        .collect();

    let mut used: HashSet<Edge> = HashSet::new();
    let mut chains = Vec::new();

    for start in ends.into_iter().chain(vertices) {
        let mut chain = vec![start];
        let mut current = start;
        let mut closed = false;
        loop {
            let next = adjacency[&current]
                .iter()
                .copied()
                .find(|&n| !used.contains(&edge_key(current, n)));
            match next {
                Some(n) => {
                    used.insert(edge_key(current, n));
                    if n == start {
                        closed = true;
                        break;
                    }
                    chain.push(n);
                    current = n;
                }
                None => break,
            }
        }

        if chain.len() > 1 {
            chains.push(Chain {
                vertices: chain,
                closed,
            });
        }
    }

    chains
}
