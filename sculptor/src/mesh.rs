use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;

use crate::region::Region;

pub type Point3 = nalgebra::Point3<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;

/// Coordinates closer to zero than this are treated as exact zeros.
pub const NEGLIGIBLE: f64 = 1e-4;

pub fn clean_coordinate(c: f64) -> f64 {
    if c.abs() < NEGLIGIBLE {
        0.0
    } else {
        c
    }
}

/// Bit-exact key of a position after cleaning near-zero artifacts.
pub fn position_key(p: &Point3) -> [u64; 3] {
    [
        clean_coordinate(p.x).to_bits(),
        clean_coordinate(p.y).to_bits(),
        clean_coordinate(p.z).to_bits(),
    ]
}

/// Polygon mesh with a region tag per face.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Vec<usize>>,
    pub face_regions: Vec<Region>,
}

pub type Edge = (usize, usize);

pub fn edge_key(a: usize, b: usize) -> Edge {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Edge and vertex adjacency of a mesh.
pub struct Topology {
    /// Number of faces around every edge.
    pub edge_faces: IndexMap<Edge, usize>,
    pub neighbours: Vec<Vec<usize>>,
}

impl Topology {
    pub fn build(mesh: &Mesh) -> Self {
        let mut edge_faces = IndexMap::new();
        let mut neighbours = vec![Vec::new(); mesh.vertices.len()];

        for face in &mesh.faces {
            for i in 0..face.len() {
                let (a, b) = (face[i], face[(i + 1) % face.len()]);
                let count = edge_faces.entry(edge_key(a, b)).or_insert(0);
                if *count == 0 {
                    neighbours[a].push(b);
                    neighbours[b].push(a);
                }
                *count += 1;
            }
        }

        Self {
            edge_faces,
            neighbours,
        }
    }

    /// Edges with exactly one adjacent face.
    pub fn border_edges(&self) -> Vec<Edge> {
        self.edge_faces
            .iter()
            .filter(|(_, &count)| count == 1)
            .map(|(&edge, _)| edge)
            .collect()
    }

    pub fn border_vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<usize> = self
            .border_edges()
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    pub fn edge_count(&self, vertex: usize) -> usize {
        self.neighbours[vertex].len()
    }

    /// Border vertices joined by exactly two edges.
    pub fn corner_vertices(&self) -> Vec<usize> {
        self.border_vertices()
            .into_iter()
            .filter(|&v| self.edge_count(v) == 2)
            .collect()
    }
}

impl Mesh {
    pub fn topology(&self) -> Topology {
        Topology::build(self)
    }

    /// Groups faces into connected shells, ordered by their first face.
    pub fn shells(&self, faces: &[usize]) -> Vec<Vec<usize>> {
        let mut partition = UnionFind::<usize>::new(self.vertices.len());
        for &f in faces {
            let face = &self.faces[f];
            for w in face.windows(2) {
                partition.union(w[0], w[1]);
            }
        }

        let mut shells: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for &f in faces {
            if let Some(&v) = self.faces[f].first() {
                shells.entry(partition.find(v)).or_default().push(f);
            }
        }
        shells.into_values().collect()
    }

    /// Copies the given faces into a new mesh with compacted vertices.
    pub fn extract(&self, faces: &[usize]) -> Mesh {
        let mut mapping = HashMap::new();
        let mut mesh = Mesh::default();

        for &f in faces {
            let face = self.faces[f]
                .iter()
                .map(|&v| {
                    *mapping.entry(v).or_insert_with(|| {
                        mesh.vertices.push(self.vertices[v]);
                        mesh.vertices.len() - 1
                    })
                })
                .collect();
            mesh.faces.push(face);
            mesh.face_regions.push(self.face_regions[f]);
        }

        mesh
    }

    pub fn combine<'a, I: IntoIterator<Item = &'a Mesh>>(meshes: I) -> Mesh {
        let mut combined = Mesh::default();
        for mesh in meshes {
            let offset = combined.vertices.len();
            combined.vertices.extend_from_slice(&mesh.vertices);
            combined.faces.extend(
                mesh.faces
                    .iter()
                    .map(|f| f.iter().map(|v| v + offset).collect::<Vec<_>>()),
            );
            combined.face_regions.extend_from_slice(&mesh.face_regions);
        }
        combined
    }

    /// Welds vertices closer than `epsilon` into their average position and
    /// drops faces collapsed by the weld.
    pub fn merge_coincident(&mut self, epsilon: f64) {
        let cell = |p: &Point3| {
            (
                (p.x / epsilon).floor() as i64,
                (p.y / epsilon).floor() as i64,
                (p.z / epsilon).floor() as i64,
            )
        };

        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        let mut partition = UnionFind::<usize>::new(self.vertices.len());

        for (i, p) in self.vertices.iter().enumerate() {
            let (cx, cy, cz) = cell(p);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(others) = grid.get(&(cx + dx, cy + dy, cz + dz))
                        {
                            for &j in others {
                                if (self.vertices[j] - p).norm() < epsilon {
                                    partition.union(i, j);
                                }
                            }
                        }
                    }
                }
            }
            grid.entry((cx, cy, cz)).or_default().push(i);
        }

        let mut mapping = vec![0; self.vertices.len()];
        let mut sums: IndexMap<usize, (Vector3, usize)> = IndexMap::new();
        for (i, p) in self.vertices.iter().enumerate() {
            let entry = sums
                .entry(partition.find(i))
                .or_insert((Vector3::zeros(), 0));
            entry.0 += p.coords;
            entry.1 += 1;
        }
        for i in 0..self.vertices.len() {
            mapping[i] = sums.get_index_of(&partition.find(i)).unwrap_or(i);
        }

        self.vertices = sums
            .values()
            .map(|(sum, n)| Point3::from(sum / *n as f64))
            .collect();

        let mut faces = Vec::with_capacity(self.faces.len());
        let mut regions = Vec::with_capacity(self.faces.len());
        for (face, region) in self.faces.iter().zip(&self.face_regions) {
            let mut merged: Vec<usize> = Vec::with_capacity(face.len());
            for &v in face {
                let v = mapping[v];
                if merged.last() != Some(&v) && merged.first() != Some(&v) {
                    merged.push(v);
                }
            }
            if merged.len() >= 3 {
                faces.push(merged);
                regions.push(*region);
            }
        }
        self.faces = faces;
        self.face_regions = regions;
    }

    /// Relaxes every non-border vertex towards the average of its
    /// neighbours.
    pub fn average_inside_vertices(&mut self, num_iters: usize) {
        let topology = self.topology();
        let border: HashSet<usize> =
            topology.border_vertices().into_iter().collect();

        for _ in 0..num_iters {
            let mut positions = self.vertices.clone();
            for (i, neighbours) in topology.neighbours.iter().enumerate() {
                if border.contains(&i) || neighbours.is_empty() {
                    continue;
                }
                let sum = neighbours
                    .iter()
                    .fold(Vector3::zeros(), |s, &n| s + self.vertices[n].coords);
                positions[i] = Point3::from(sum / neighbours.len() as f64);
            }
            self.vertices = positions;
        }
    }
}
