use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::Serialize;

use crate::mesh::position_key;
use crate::region::{MeshRegion, Region, RegionSet, VertexRef, VertexStore};
use base::defs::{Error, ErrorKind::*, Result};

/// Child regions and the parents whose borders they snap to, in priority
/// order.
pub const TAXONOMY: &[(Region, &[Region])] = &[
    (Region::NoseBridge, &[Region::Forehead]),
    (Region::Eye, &[Region::Forehead, Region::NoseBridge]),
    (Region::Nose, &[Region::NoseBridge]),
    (Region::MouthLoop, &[Region::Nose]),
    (Region::Mouth, &[Region::MouthLoop]),
    (Region::Cheek, &[Region::MouthLoop]),
    (Region::Chin, &[Region::MouthLoop, Region::Cheek]),
    (Region::Ear, &[Region::Forehead, Region::Cheek]),
    (Region::BackHead, &[Region::Forehead, Region::Ear]),
    (Region::LowerBackHead, &[Region::Ear, Region::BackHead]),
];

/// Tagged regions every piece falls back to, in priority order.
pub const FALLBACK_PARENTS: [Region; 11] = [
    Region::Forehead,
    Region::NoseBridge,
    Region::Nose,
    Region::Eye,
    Region::MouthLoop,
    Region::Mouth,
    Region::Cheek,
    Region::Chin,
    Region::Ear,
    Region::BackHead,
    Region::LowerBackHead,
];

/// Child/parent region pairs in the order they are matched: the taxonomy
/// first, then every region (`Default` included) against each fallback
/// parent. A piece met as its own parent claims its remaining border, so
/// it never becomes the child of a later parent.
pub fn region_pairs() -> Vec<(Region, Region)> {
    let mut pairs: Vec<(Region, Region)> = TAXONOMY
        .iter()
        .flat_map(|(child, parents)| parents.iter().map(move |p| (*child, *p)))
        .collect();

    for child in Region::ALL {
        pairs.extend(FALLBACK_PARENTS.iter().map(|&parent| (child, parent)));
    }
    pairs
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationshipEntry {
    pub child: VertexRef,
    pub parent: VertexRef,
}

/// Child-to-parent correspondence of coincident border vertices.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RelationshipGraph {
    pub entries: Vec<RelationshipEntry>,
}

fn border_positions(piece: &MeshRegion) -> Vec<(usize, [u64; 3])> {
    piece
        .mesh
        .topology()
        .border_vertices()
        .into_iter()
        .map(|v| (v, position_key(&piece.mesh.vertices[v])))
        .collect()
}

impl RelationshipGraph {
    pub fn build(regions: &RegionSet) -> Self {
        Self::build_pairs(regions, &region_pairs())
    }

    pub fn build_pairs(regions: &RegionSet, pairs: &[(Region, Region)]) -> Self {
        let borders: HashMap<&str, Vec<(usize, [u64; 3])>> = regions
            .pieces
            .values()
            .map(|p| (p.name.as_str(), border_positions(p)))
            .collect();

        let mut graph = RelationshipGraph::default();
        let mut assigned = HashSet::new();

        for &(child_region, parent_region) in pairs {
            for child in regions.of_kind(child_region) {
                for parent in regions.of_kind(parent_region) {
                    if child.name == parent.name {
                        for &(v, _) in &borders[child.name.as_str()] {
                            assigned.insert(VertexRef::new(&child.name, v));
                        }
                        continue;
                    }

                    let mut parent_border = HashMap::new();
                    for &(v, key) in &borders[parent.name.as_str()] {
                        parent_border.entry(key).or_insert(v);
                    }

                    let before = graph.entries.len();
                    for &(v, key) in &borders[child.name.as_str()] {
                        let parent_vertex = match parent_border.get(&key) {
                            Some(&pv) => pv,
                            None => continue,
                        };
                        let child_ref = VertexRef::new(&child.name, v);
                        if !assigned.insert(child_ref.clone()) {
                            continue;
                        }
                        graph.entries.push(RelationshipEntry {
                            child: child_ref,
                            parent: VertexRef::new(&parent.name, parent_vertex),
                        });
                    }

                    if graph.entries.len() > before {
                        debug!(
                            "{} -> {}: {} vertices",
                            child.name,
                            parent.name,
                            graph.entries.len() - before
                        );
                    }
                }
            }
        }

        info!("  {} vertex relationships recorded", graph.entries.len());
        graph
    }

    /// Moves every child vertex onto its parent's current position.
    pub fn apply<S: VertexStore>(&self, store: &mut S) -> Result<()> {
        for entry in &self.entries {
            let position = store.position(&entry.parent).ok_or_else(|| {
                let desc = format!("missing parent vertex {}", entry.parent);
                Error::new(InconsistentState, desc)
            })?;
            if !store.set_position(&entry.child, position) {
                let desc = format!("missing child vertex {}", entry.child);
                return Err(Error::new(InconsistentState, desc));
            }
        }
        Ok(())
    }
}
