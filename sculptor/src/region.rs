use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use derive_more::Display;
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};

use crate::mesh::{Mesh, Point3};
use base::defs::{Error, ErrorKind::*, Result};

/// Head region taxonomy, in separation order.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Region {
    Eye,
    NoseBridge,
    Nose,
    Mouth,
    MouthLoop,
    Forehead,
    Ear,
    BackHead,
    LowerBackHead,
    Cheek,
    Chin,
    Default,
}

impl Region {
    pub const ALL: [Region; 12] = [
        Region::Eye,
        Region::NoseBridge,
        Region::Nose,
        Region::Mouth,
        Region::MouthLoop,
        Region::Forehead,
        Region::Ear,
        Region::BackHead,
        Region::LowerBackHead,
        Region::Cheek,
        Region::Chin,
        Region::Default,
    ];

    /// Parses a face tag such as `Eye` or `region_eye`.
    pub fn from_tag(tag: &str) -> Option<Region> {
        let name = tag.strip_prefix("region_").unwrap_or(tag).replace('_', "");
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.to_string().eq_ignore_ascii_case(&name))
    }
}

/// A connected piece of the head mesh named `<Region>_geo_<n>`.
#[derive(Clone, Debug)]
pub struct MeshRegion {
    pub name: String,
    pub region: Region,
    pub index: usize,
    pub mesh: Mesh,
}

pub fn piece_name(region: Region, index: usize) -> String {
    format!("{}_geo_{}", region, index)
}

/// Vertex of a named piece, written as `Ear_geo_1.vtx[47]`.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub struct VertexRef {
    pub piece: String,
    pub vertex: usize,
}

impl VertexRef {
    pub fn new(piece: &str, vertex: usize) -> Self {
        Self {
            piece: piece.to_string(),
            vertex,
        }
    }
}

impl Display for VertexRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.vtx[{}]", self.piece, self.vertex)
    }
}

impl FromStr for VertexRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed_err = || {
            let desc = format!("malformed vertex identifier '{}'", s);
            Error::new(MalformedData, desc)
        };

        let (piece, rest) = s.split_once(".vtx[").ok_or_else(malformed_err)?;
        let index = rest.strip_suffix(']').ok_or_else(malformed_err)?;
        if piece.is_empty() {
            return Err(malformed_err());
        }

        Ok(Self {
            piece: piece.to_string(),
            vertex: index.parse().map_err(|_| malformed_err())?,
        })
    }
}

/// Accessor for vertex positions addressed by `VertexRef`.
pub trait VertexStore {
    fn position(&self, vertex: &VertexRef) -> Option<Point3>;

    fn set_position(&mut self, vertex: &VertexRef, position: Point3) -> bool;
}

/// Pieces of a separated mesh, in separation order.
#[derive(Clone, Debug, Default)]
pub struct RegionSet {
    pub pieces: IndexMap<String, MeshRegion>,
}

impl RegionSet {
    /// Splits the mesh by face tag, region kind by kind, into connected
    /// pieces. Every piece owns copies of its vertices.
    pub fn separate(mesh: &Mesh) -> RegionSet {
        let mut set = RegionSet::default();

        for region in Region::ALL {
            let faces: Vec<usize> = (0..mesh.faces.len())
                .filter(|&f| mesh.face_regions[f] == region)
                .collect();
            if faces.is_empty() {
                continue;
            }

            for (i, shell) in mesh.shells(&faces).iter().enumerate() {
                set.insert(MeshRegion {
                    name: piece_name(region, i + 1),
                    region,
                    index: i + 1,
                    mesh: mesh.extract(shell),
                });
            }
        }

        info!("  mesh separated into {} pieces", set.pieces.len());
        set
    }

    pub fn insert(&mut self, piece: MeshRegion) {
        self.pieces.insert(piece.name.clone(), piece);
    }

    pub fn get(&self, name: &str) -> Option<&MeshRegion> {
        self.pieces.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut MeshRegion> {
        self.pieces.get_mut(name)
    }

    pub fn of_kind(&self, region: Region) -> impl Iterator<Item = &MeshRegion> {
        self.pieces.values().filter(move |p| p.region == region)
    }

    pub fn average_inside_vertices(&mut self, num_iters: usize) {
        for piece in self.pieces.values_mut() {
            piece.mesh.average_inside_vertices(num_iters);
        }
    }

    pub fn combine(&self) -> Mesh {
        Mesh::combine(self.pieces.values().map(|p| &p.mesh))
    }
}

impl VertexStore for RegionSet {
    fn position(&self, vertex: &VertexRef) -> Option<Point3> {
        self.get(&vertex.piece)
            .and_then(|p| p.mesh.vertices.get(vertex.vertex))
            .copied()
    }

    fn set_position(&mut self, vertex: &VertexRef, position: Point3) -> bool {
        match self
            .get_mut(&vertex.piece)
            .and_then(|p| p.mesh.vertices.get_mut(vertex.vertex))
        {
            Some(p) => {
                *p = position;
                true
            }
            None => false,
        }
    }
}
