use std::cmp::Ordering;
use std::collections::HashSet;

use log::{debug, info, warn};
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::curve::{chain_edges, rebuild, Chain, ControlCurve, CurveKind, WireBinding};
use crate::deform::{FRONT_PROFILE_CURVE_POINTS, SIDE_PROFILE_CURVE_POINTS};
use crate::feature::{ResolutionParams, EAR_POINTS};
use crate::mesh::{clean_coordinate, position_key, Edge, Mesh, Point3, Topology};
use crate::region::{MeshRegion, Region, RegionSet, VertexRef, VertexStore};
use base::defs::{Error, ErrorKind::*, Result};

const FACE_DROPOFF: f64 = 0.05;
const FEATURE_DROPOFF: f64 = 0.1;
const SURFACE_DROPOFF: f64 = 0.2;

/// Edge identified by its end positions, the end with the lower cleaned
/// X (then Y, Z) first.
pub type EdgePositions = ([u64; 3], [u64; 3]);

fn cleaned(p: &Point3) -> [f64; 3] {
    [
        clean_coordinate(p.x),
        clean_coordinate(p.y),
        clean_coordinate(p.z),
    ]
}

fn compare_positions(a: &Point3, b: &Point3) -> Ordering {
    cleaned(a)
        .iter()
        .zip(cleaned(b).iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub fn edge_positions(mesh: &Mesh, (a, b): Edge) -> EdgePositions {
    let (pa, pb) = (&mesh.vertices[a], &mesh.vertices[b]);
    if compare_positions(pb, pa) == Ordering::Less {
        (position_key(pb), position_key(pa))
    } else {
        (position_key(pa), position_key(pb))
    }
}

fn border_positions(piece: &MeshRegion) -> HashSet<EdgePositions> {
    piece
        .mesh
        .topology()
        .border_edges()
        .into_iter()
        .map(|e| edge_positions(&piece.mesh, e))
        .collect()
}

/// Border edges of `piece` not lying on the border of any `neighbours`.
fn free_border(piece: &MeshRegion, neighbours: &[&MeshRegion]) -> Vec<Edge> {
    let shared: HashSet<EdgePositions> =
        neighbours.iter().flat_map(|n| border_positions(n)).collect();

    piece
        .mesh
        .topology()
        .border_edges()
        .into_iter()
        .filter(|&e| !shared.contains(&edge_positions(&piece.mesh, e)))
        .collect()
}

fn chain_points(mesh: &Mesh, chain: &Chain) -> Vec<Point3> {
    chain.vertices.iter().map(|&v| mesh.vertices[v]).collect()
}

/// Points of the longest chain the edges form; the first one wins a tie.
fn longest_line(piece: &MeshRegion, edges: &[Edge]) -> Result<Vec<Point3>> {
    let longest = chain_edges(edges).into_iter().fold(None, |best: Option<Chain>, c| {
        match best {
            Some(b) if b.vertices.len() >= c.vertices.len() => Some(b),
            _ => Some(c),
        }
    });

    match longest {
        Some(chain) => Ok(chain_points(&piece.mesh, &chain)),
        None => {
            let desc = format!("no free border edges on {}", piece.name);
            Err(Error::new(CorrespondenceFailure, desc))
        }
    }
}

/// Bounding-box volume and diagonal of the points.
fn extent(points: &[Point3]) -> (f64, f64) {
    let mut bounds: Option<(Point3, Point3)> = None;
    for p in points {
        bounds = Some(match bounds {
            None => (*p, *p),
            Some((min, max)) => (min.inf(p), max.sup(p)),
        });
    }

    match bounds {
        Some((min, max)) => {
            let size = max - min;
            (size.x * size.y * size.z, size.norm())
        }
        None => (0.0, 0.0),
    }
}

/// The smaller of the first two border loops, such as the opening of an
/// eye socket.
fn inner_loop(piece: &MeshRegion) -> Result<Vec<Point3>> {
    let mesh = &piece.mesh;
    chain_edges(&mesh.topology().border_edges())
        .into_iter()
        .filter(|c| c.closed)
        .take(2)
        .map(|c| chain_points(mesh, &c))
        .min_by(|a, b| {
            let ((va, da), (vb, db)) = (extent(a), extent(b));
            va.total_cmp(&vb).then(da.total_cmp(&db))
        })
        .ok_or_else(|| {
            let desc = format!("no border loop on {}", piece.name);
            Error::new(CorrespondenceFailure, desc)
        })
}

fn shortest_path(
    mesh: &Mesh,
    topology: &Topology,
    from: usize,
    to: usize,
) -> Result<Vec<Point3>> {
    let mut graph = UnGraph::<(), f64>::with_capacity(
        mesh.vertices.len(),
        topology.edge_faces.len(),
    );
    for _ in &mesh.vertices {
        graph.add_node(());
    }
    for &(a, b) in topology.edge_faces.keys() {
        let length = (mesh.vertices[b] - mesh.vertices[a]).norm();
        graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), length);
    }

    let goal = NodeIndex::new(to);
    let target = mesh.vertices[to];
    let (_, path) = astar(
        &graph,
        NodeIndex::new(from),
        |n| n == goal,
        |e| *e.weight(),
        |n| (mesh.vertices[n.index()] - target).norm(),
    )
    .ok_or_else(|| {
        let desc = format!("vertices {} and {} are not connected", from, to);
        Error::new(CorrespondenceFailure, desc)
    })?;

    Ok(path.into_iter().map(|n| mesh.vertices[n.index()]).collect())
}

fn too_many_corners(piece: &MeshRegion, count: usize) -> Error {
    let desc = format!("{} has {} corners, 4 expected", piece.name, count);
    Error::new(CorrespondenceFailure, desc)
}

/// Front (eyebrow) and back paths across a forehead piece, each running
/// from its right corner to its left one.
fn forehead_paths(piece: &MeshRegion) -> Result<(Vec<Point3>, Vec<Point3>)> {
    let mesh = &piece.mesh;
    let topology = mesh.topology();
    let corners = topology.corner_vertices();
    if corners.len() != 4 {
        return Err(too_many_corners(piece, corners.len()));
    }

    let (mut left, mut right): (Vec<usize>, Vec<usize>) = corners
        .into_iter()
        .partition(|&v| clean_coordinate(mesh.vertices[v].x) > 0.0);
    if left.len() != 2 || right.len() != 2 {
        let desc = format!("{} corners are not split evenly by side", piece.name);
        return Err(Error::new(CorrespondenceFailure, desc));
    }

    for side in [&mut left, &mut right] {
        side.sort_by(|&a, &b| mesh.vertices[b].z.total_cmp(&mesh.vertices[a].z));
    }

    let front = shortest_path(mesh, &topology, right[0], left[0])?;
    let back = shortest_path(mesh, &topology, right[1], left[1])?;
    Ok((front, back))
}

/// Path between the two rearmost corners of a cheek or chin piece.
fn rear_edge_path(piece: &MeshRegion) -> Result<Vec<Point3>> {
    let mesh = &piece.mesh;
    let topology = mesh.topology();
    let mut corners = topology.corner_vertices();
    if corners.len() > 4 {
        return Err(too_many_corners(piece, corners.len()));
    }
    if corners.len() < 2 {
        let desc = format!("{} has fewer than 2 corners", piece.name);
        return Err(Error::new(CorrespondenceFailure, desc));
    }

    corners.sort_by(|&a, &b| mesh.vertices[a].z.total_cmp(&mesh.vertices[b].z));
    shortest_path(mesh, &topology, corners[0], corners[1])
}

/// Links polylines into one, always attaching the piece whose end lies
/// closest to either end of the growing line.
fn join_lines(mut lines: Vec<Vec<Point3>>) -> Vec<Point3> {
    lines.retain(|l| !l.is_empty());
    if lines.is_empty() {
        return vec![];
    }

    let mut joined = lines.remove(0);
    while !lines.is_empty() {
        let (head, tail) = (joined[0], joined[joined.len() - 1]);

        let mut best = (0, false, false, f64::INFINITY);
        for (i, line) in lines.iter().enumerate() {
            let (first, last) = (line[0], line[line.len() - 1]);
            for (at_head, reversed, distance) in [
                (false, false, (first - tail).norm()),
                (false, true, (last - tail).norm()),
                (true, false, (last - head).norm()),
                (true, true, (first - head).norm()),
            ] {
                if distance < best.3 {
                    best = (i, at_head, reversed, distance);
                }
            }
        }

        let (i, at_head, reversed, _) = best;
        let mut line = lines.remove(i);
        if reversed {
            line.reverse();
        }
        if at_head {
            line.extend(joined);
            joined = line;
        } else {
            joined.extend(line);
        }
    }
    joined
}

/// Centre-line (X = 0) polyline of a piece, bridging holes.
fn centre_line(piece: &MeshRegion) -> Option<Vec<Point3>> {
    let mesh = &piece.mesh;
    let on_centre = |v: usize| clean_coordinate(mesh.vertices[v].x) == 0.0;

    let edges: Vec<Edge> = mesh
        .topology()
        .edge_faces
        .keys()
        .copied()
        .filter(|&(a, b)| on_centre(a) && on_centre(b))
        .collect();
    if edges.is_empty() {
        return None;
    }

    let lines = chain_edges(&edges)
        .iter()
        .map(|c| chain_points(mesh, c))
        .collect();
    Some(join_lines(lines))
}

/// Builds the control curves of every piece of a separated head.
pub struct ControlBuilder<'a> {
    regions: &'a RegionSet,
    resolution: &'a ResolutionParams,
}

impl<'a> ControlBuilder<'a> {
    pub fn new(regions: &'a RegionSet, resolution: &'a ResolutionParams) -> Self {
        Self {
            regions,
            resolution,
        }
    }

    /// Creates all controls; `ear_data` holds five vertices per ear. A
    /// control that cannot be built is skipped with a warning.
    pub fn build(&self, ear_data: &[Vec<VertexRef>]) -> Vec<ControlCurve> {
        let mut curves = Vec::new();
        let res = self.resolution;

        for piece in self.regions.pieces.values() {
            if let Some(line) = centre_line(piece) {
                let dropoff = if piece.region == Region::Mouth {
                    FEATURE_DROPOFF
                } else {
                    SURFACE_DROPOFF
                };
                let points = rebuild(&line, SIDE_PROFILE_CURVE_POINTS, false);
                add(&mut curves, CurveKind::Profile, piece, Ok(points), false, dropoff);
            }
        }

        for piece in self.regions.of_kind(Region::Forehead) {
            match forehead_paths(piece) {
                Ok((front, back)) => {
                    let front = rebuild(&front, res.eyebrow, false);
                    let back = rebuild(&back, FRONT_PROFILE_CURVE_POINTS, false);
                    let kind = CurveKind::LowerForehead;
                    add(&mut curves, kind, piece, Ok(front), false, SURFACE_DROPOFF);
                    let kind = CurveKind::UpperForeheadProfile;
                    add(&mut curves, kind, piece, Ok(back), false, SURFACE_DROPOFF);
                }
                Err(err) => warn!("skipping forehead controls of {}: {}", piece.name, err),
            }
        }

        for (region, kind, count, dropoff) in [
            (Region::Eye, CurveKind::Eye, res.eye, FEATURE_DROPOFF),
            (Region::Mouth, CurveKind::InnerMouth, res.mouth, FACE_DROPOFF),
        ] {
            for piece in self.regions.of_kind(region) {
                let ring = inner_loop(piece).map(|ring| {
                    let mut ring = rebuild(&ring, count, true);
                    ring.reverse();
                    ring
                });
                add(&mut curves, kind, piece, ring, true, dropoff);
            }
        }

        let noses: Vec<&MeshRegion> = self.regions.of_kind(Region::Nose).collect();
        let bridges: Vec<&MeshRegion> =
            self.regions.of_kind(Region::NoseBridge).collect();
        let foreheads: Vec<&MeshRegion> =
            self.regions.of_kind(Region::Forehead).collect();
        let mouths: Vec<&MeshRegion> = self.regions.of_kind(Region::Mouth).collect();

        for piece in &noses {
            let line = longest_line(piece, &free_border(piece, &bridges))
                .map(|line| rebuild(&line, res.nose, false));
            add(&mut curves, CurveKind::Nose, piece, line, false, FACE_DROPOFF);
        }

        for piece in &bridges {
            let neighbours: Vec<&MeshRegion> =
                noses.iter().chain(&foreheads).copied().collect();
            let mesh = &piece.mesh;
            let (left, right): (Vec<Edge>, Vec<Edge>) = free_border(piece, &neighbours)
                .into_iter()
                .partition(|&(a, b)| {
                    clean_coordinate(mesh.vertices[a].x) > 0.0
                        || clean_coordinate(mesh.vertices[b].x) > 0.0
                });

            for (kind, edges) in [
                (CurveKind::RightNoseBridge, right),
                (CurveKind::LeftNoseBridge, left),
            ] {
                let line = longest_line(piece, &edges)
                    .map(|line| rebuild(&line, res.nose_bridge, false));
                add(&mut curves, kind, piece, line, false, FACE_DROPOFF);
            }
        }

        for piece in self.regions.of_kind(Region::MouthLoop) {
            let neighbours: Vec<&MeshRegion> =
                noses.iter().chain(&mouths).copied().collect();
            let line = longest_line(piece, &free_border(piece, &neighbours))
                .map(|line| rebuild(&line, res.mouth_loop, false));
            add(&mut curves, CurveKind::MouthLoop, piece, line, false, FACE_DROPOFF);
        }

        for (region, kind) in [
            (Region::Cheek, CurveKind::CheekProfile),
            (Region::Chin, CurveKind::ChinProfile),
        ] {
            for piece in self.regions.of_kind(region) {
                let line = rear_edge_path(piece)
                    .map(|line| rebuild(&line, FRONT_PROFILE_CURVE_POINTS, false));
                add(&mut curves, kind, piece, line, false, SURFACE_DROPOFF);
            }
        }

        for vertices in ear_data {
            match self.ear_points(vertices) {
                Ok((piece, points)) => {
                    let index = next_index(&curves, CurveKind::Ear);
                    let binding = WireBinding {
                        piece,
                        dropoff: FEATURE_DROPOFF,
                    };
                    curves.push(ControlCurve::new(
                        CurveKind::Ear,
                        index,
                        points,
                        false,
                        binding,
                    ));
                }
                Err(err) => warn!("skipping ear control: {}", err),
            }
        }

        info!("  {} control curves created", curves.len());
        curves
    }

    fn ear_points(&self, vertices: &[VertexRef]) -> Result<(String, Vec<Point3>)> {
        if vertices.len() != EAR_POINTS {
            let desc = format!(
                "{} ear vertices given, {} expected",
                vertices.len(),
                EAR_POINTS
            );
            return Err(Error::new(MalformedData, desc));
        }

        let points = vertices
            .iter()
            .map(|v| {
                self.regions.position(v).ok_or_else(|| {
                    let desc = format!("missing ear vertex {}", v);
                    Error::new(InconsistentState, desc)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((vertices[0].piece.clone(), points))
    }
}

fn next_index(curves: &[ControlCurve], kind: CurveKind) -> usize {
    curves.iter().filter(|c| c.kind == kind).count() + 1
}

fn add(
    curves: &mut Vec<ControlCurve>,
    kind: CurveKind,
    piece: &MeshRegion,
    points: Result<Vec<Point3>>,
    is_ring: bool,
    dropoff: f64,
) {
    match points {
        Ok(points) => {
            let binding = WireBinding {
                piece: piece.name.clone(),
                dropoff,
            };
            let curve =
                ControlCurve::new(kind, next_index(curves, kind), points, is_ring, binding);
            debug!("{} bound to {}", curve.name, piece.name);
            curves.push(curve);
        }
        Err(err) => warn!("skipping {} of {}: {}", kind, piece.name, err),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::test_util::*;
    use base::{assert_eq_f64, assert_eq_point3};

    fn piece(mesh: Mesh, region: Region) -> MeshRegion {
        let set = RegionSet::separate(&tagged(mesh, region));
        set.pieces[0].clone()
    }

    fn names(curves: &[ControlCurve]) -> Vec<&str> {
        curves.iter().map(|c| c.name.as_str()).collect()
    }

    fn find<'a>(curves: &'a [ControlCurve], name: &str) -> &'a ControlCurve {
        curves.iter().find(|c| c.name == name).unwrap()
    }

    /// 3 × 3 grid with the middle quad removed.
    fn socket() -> Mesh {
        let mut mesh = grid(0.0, 0.0, 0.0, 3, 3);
        mesh.faces.remove(4);
        mesh.face_regions.remove(4);
        mesh
    }

    /// 2 × 2 grid lying in the Y = 1 plane, depth running along Z.
    fn slab() -> Mesh {
        let mut mesh = grid(-1.0, 0.0, 0.0, 2, 2);
        for p in mesh.vertices.iter_mut() {
            *p = Point3::new(p.x, 1.0, p.y);
        }
        mesh
    }

    #[test]
    fn test_edge_positions() {
        let mesh = grid(-1.0, 0.0, 0.0, 1, 1);
        assert_eq!(edge_positions(&mesh, (0, 1)), edge_positions(&mesh, (1, 0)));

        let (first, _) = edge_positions(&mesh, (1, 0));
        assert_eq!(first, position_key(&Point3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_eye_uses_inner_loop() {
        let regions = RegionSet::separate(&tagged(socket(), Region::Eye));
        let curves = ControlBuilder::new(&regions, &ResolutionParams::default())
            .build(&[]);

        let eye = find(&curves, "EyeCurve1");
        assert!(eye.is_ring);
        assert_eq!(eye.points.len(), 16);
        assert_eq!(eye.binding.piece, "Eye_geo_1");
        assert_eq_f64!(eye.binding.dropoff, 0.1);
        for p in &eye.points {
            assert!(p.x >= 1.0 && p.x <= 2.0);
            assert!(p.y >= 1.0 && p.y <= 2.0);
        }
    }

    #[test]
    fn test_nose_and_bridge() {
        let nose = tagged(grid(-1.0, 0.0, 0.0, 2, 1), Region::Nose);
        let bridge = tagged(grid(-1.0, 1.0, 0.0, 2, 1), Region::NoseBridge);
        let regions = RegionSet::separate(&Mesh::combine([&nose, &bridge]));
        let curves = ControlBuilder::new(&regions, &ResolutionParams::default())
            .build(&[]);

        assert_eq!(
            names(&curves),
            vec![
                "NoseBridge_geo_1_ProfileCurve",
                "Nose_geo_1_ProfileCurve",
                "NoseCurve1",
                "RtNoseBridgeCurve1",
                "LfNoseBridgeCurve1",
            ]
        );

        let nose = find(&curves, "NoseCurve1");
        assert_eq!(nose.points.len(), 8);
        assert_eq_f64!(nose.points[0].y, 1.0);
        assert_eq_f64!(nose.points[7].y, 1.0);
        assert_eq_f64!(nose.points[0].x.abs(), 1.0);

        let right = find(&curves, "RtNoseBridgeCurve1");
        let left = find(&curves, "LfNoseBridgeCurve1");
        assert_eq!(right.points.len(), 4);
        assert!(right.points.iter().all(|p| p.x <= 0.0));
        assert!(left.points.iter().all(|p| p.x >= 0.0));

        let profile = find(&curves, "Nose_geo_1_ProfileCurve");
        assert_eq!(profile.points.len(), 4);
        assert!(profile.points.iter().all(|p| p.x == 0.0));
        assert_eq_f64!(profile.binding.dropoff, 0.2);
    }

    #[test]
    fn test_forehead_paths() {
        let forehead = piece(slab(), Region::Forehead);
        let (front, back) = forehead_paths(&forehead).unwrap();

        assert_eq_point3!(front[0], Point3::new(-1.0, 1.0, 2.0));
        assert_eq_point3!(front[front.len() - 1], Point3::new(1.0, 1.0, 2.0));
        assert!(front.iter().all(|p| p.z == 2.0));
        assert_eq_point3!(back[0], Point3::new(-1.0, 1.0, 0.0));
        assert!(back.iter().all(|p| p.z == 0.0));

        let regions = RegionSet::separate(&tagged(slab(), Region::Forehead));
        let curves = ControlBuilder::new(&regions, &ResolutionParams::default())
            .build(&[]);
        assert_eq!(find(&curves, "LowerForeheadCurve1").points.len(), 16);
        let upper = find(&curves, "UpperForehead_FtProfileCurve1");
        assert_eq!(upper.points.len(), 6);
        assert!(upper.kind.is_front_profile());
    }

    #[test]
    fn test_forehead_with_extra_corners() {
        let mut mesh = grid(0.0, 0.0, 0.0, 2, 2);
        mesh.faces.remove(3);
        mesh.face_regions.remove(3);

        let err = forehead_paths(&piece(mesh, Region::Forehead)).unwrap_err();
        assert_eq!(err.kind, CorrespondenceFailure);
    }

    #[test]
    fn test_cheek_rear_edge() {
        let mut mesh = grid(0.0, 0.0, 0.0, 2, 2);
        for p in mesh.vertices.iter_mut() {
            p.z = p.y;
        }
        let regions = RegionSet::separate(&tagged(mesh, Region::Cheek));
        let curves = ControlBuilder::new(&regions, &ResolutionParams::default())
            .build(&[]);

        let cheek = find(&curves, "Cheek_FtProfileCurve1");
        assert_eq!(cheek.points.len(), 6);
        assert!(cheek.points.iter().all(|p| p.y == 0.0 && p.z == 0.0));
    }

    #[test]
    fn test_centre_line_across_hole() {
        let mut mesh = grid(-2.0, 0.0, 0.0, 4, 3);
        for f in [6, 5] {
            mesh.faces.remove(f);
            mesh.face_regions.remove(f);
        }

        let line = centre_line(&piece(mesh, Region::Default)).unwrap();
        let rebuilt = rebuild(&line, 4, false);
        let mut heights: Vec<f64> = rebuilt.iter().map(|p| p.y).collect();
        heights.sort_by(f64::total_cmp);
        for (h, expected) in heights.iter().zip([0.0, 1.0, 2.0, 3.0]) {
            assert_eq_f64!(*h, expected);
        }
        assert!(centre_line(&piece(grid(1.0, 0.0, 0.0, 1, 1), Region::Eye)).is_none());
    }

    #[test]
    fn test_ear_control() {
        let regions = RegionSet::separate(&tagged(grid(0.0, 0.0, 1.0, 4, 1), Region::Ear));
        let params = ResolutionParams::default();
        let builder = ControlBuilder::new(&regions, &params);
        let ear: Vec<VertexRef> = [0, 2, 4, 6, 8]
            .iter()
            .map(|&v| VertexRef::new("Ear_geo_1", v))
            .collect();

        let curves = builder.build(&[ear.clone()]);
        let curve = find(&curves, "EarCurve1");
        assert_eq!(curve.points.len(), 5);
        assert_eq_f64!(curve.binding.dropoff, 0.1);
        for (p, v) in curve.points.iter().zip(&ear) {
            assert_eq!(Some(*p), regions.position(v));
        }

        let err = builder.ear_points(&ear[..4]).unwrap_err();
        assert_eq!(err.kind, MalformedData);
        let mut missing = ear;
        missing[4] = VertexRef::new("Ear_geo_2", 0);
        let err = builder.ear_points(&missing).unwrap_err();
        assert_eq!(err.kind, InconsistentState);
    }
}
