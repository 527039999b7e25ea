use std::path::PathBuf;

use log::info;
use structopt::StructOpt;

use crate::controls::ControlBuilder;
use crate::curve::{apply_wires, ControlCurve};
use crate::deform::RegionDeformer;
use crate::feature::ResolutionParams;
use crate::landmarks::LandmarkSet;
use crate::mesh::Mesh;
use crate::raster::RasterImage;
use crate::region::{RegionSet, VertexRef};
use crate::relationship::RelationshipGraph;
use base::defs::{Error, ErrorKind::*, Result};

#[derive(Clone, Debug, StructOpt)]
pub struct ScanParams {
    #[structopt(help = "Front view image with feature overlays", long)]
    pub front: PathBuf,

    #[structopt(help = "Side view image with feature overlays", long)]
    pub side: PathBuf,
}

impl ScanParams {
    pub fn open(&self) -> Result<(RasterImage, RasterImage)> {
        Ok((RasterImage::open(&self.front)?, RasterImage::open(&self.side)?))
    }
}

#[derive(Clone, Debug, StructOpt)]
pub struct FusionParams {
    #[structopt(
        help = "Distance under which vertices are welded",
        long,
        default_value = "0.0001",
        parse(try_from_str = parse_epsilon)
    )]
    pub merge_epsilon: f64,

    #[structopt(
        help = "Number of inside vertex averaging iterations",
        long,
        default_value = "10"
    )]
    pub num_averaging_iters: usize,
}

fn parse_epsilon(s: &str) -> Result<f64> {
    let epsilon: f64 = s.trim().parse().map_err(|e| {
        let desc = format!("malformed merge epsilon '{}'", s);
        Error::with_source(InvalidArgument, desc, e)
    })?;
    if epsilon.is_nan() || epsilon <= 0.0 {
        let desc = format!("merge epsilon must be positive, got '{}'", s);
        return Err(Error::new(InvalidArgument, desc));
    }
    Ok(epsilon)
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            merge_epsilon: 0.0001,
            num_averaging_iters: 10,
        }
    }
}

pub struct GeneratedHead {
    pub mesh: Mesh,
    pub landmarks: LandmarkSet,
    pub curves: Vec<ControlCurve>,
}

/// Fits a region-tagged base head to the features painted on the front
/// and side images.
pub fn generate_head(
    mesh: &Mesh,
    front: &RasterImage,
    side: &RasterImage,
    ear_data: &[Vec<VertexRef>],
    resolution: &ResolutionParams,
    fusion: &FusionParams,
) -> Result<GeneratedHead> {
    info!("Separating mesh into regions...");
    let mut regions = RegionSet::separate(mesh);
    let graph = RelationshipGraph::build(&regions);

    info!("Creating controls...");
    let mut curves = ControlBuilder::new(&regions, resolution).build(ear_data);

    info!("Scanning images...");
    let landmarks = LandmarkSet::generate(front, side, resolution)?;

    info!("Deforming controls...");
    RegionDeformer::new(&landmarks, resolution).run(&mut curves);
    apply_wires(&mut regions, &curves);

    info!("Fusing regions...");
    graph.apply(&mut regions)?;
    regions.average_inside_vertices(fusion.num_averaging_iters);
    let mut mesh = regions.combine();
    mesh.merge_coincident(fusion.merge_epsilon);
    info!(
        "  {} vertices and {} faces in result",
        mesh.vertices.len(),
        mesh.faces.len()
    );

    Ok(GeneratedHead {
        mesh,
        landmarks,
        curves,
    })
}
