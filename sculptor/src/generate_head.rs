use std::io::Write;
use std::path::PathBuf;

use log::info;
use structopt::StructOpt;

use crate::feature::{ResolutionParams, EAR_POINTS};
use crate::library::Library;
use crate::mesh::Mesh;
use crate::obj::{read_obj, write_obj};
use crate::pipeline::{generate_head, FusionParams, ScanParams};
use crate::region::VertexRef;
use base::defs::{IntoResult, Result};
use base::util::cli::Array;
use base::util::fs;
use base::{define_raw_input, define_raw_output};

define_raw_input!(ObjInput, "obj");
define_raw_output!(ObjOutput, "obj");

pub type EarVertices = Array<VertexRef, EAR_POINTS>;

/// Drops trailing blank identifiers; ears left without vertices vanish.
pub fn ear_vertices(ears: &[EarVertices]) -> Vec<Vec<VertexRef>> {
    ears.iter()
        .map(|ear| {
            ear.0
                .iter()
                .take_while(|v| !v.piece.is_empty())
                .cloned()
                .collect::<Vec<_>>()
        })
        .filter(|ear| !ear.is_empty())
        .collect()
}

#[derive(StructOpt)]
#[structopt(about = "Fit a region-tagged head to front and side images")]
pub struct GenerateHeadCommand {
    #[structopt(flatten)]
    input: ObjInput,

    #[structopt(flatten)]
    output: ObjOutput,

    #[structopt(flatten)]
    scan: ScanParams,

    #[structopt(flatten)]
    resolution: ResolutionParams,

    #[structopt(flatten)]
    fusion: FusionParams,

    #[structopt(
        help = "Five comma-separated ear vertices (e.g. Ear_geo_1.vtx[47],...)",
        long = "ear",
        number_of_values = 1
    )]
    ears: Vec<EarVertices>,

    #[structopt(
        help = "Library head to fit instead of the input file",
        long,
        conflicts_with = "in-file"
    )]
    name: Option<String>,

    #[structopt(help = "Library directory", long, default_value = "library")]
    library: PathBuf,

    #[structopt(help = "Output .json file for landmarks", long)]
    landmarks: Option<PathBuf>,

    #[structopt(help = "Output .json file for control curves", long)]
    curves: Option<PathBuf>,
}

impl GenerateHeadCommand {
    /// Base head with its ear vertices. `--ear` flags take precedence over
    /// the ear data stored with a library head.
    fn load_head(&self) -> Result<(Mesh, Vec<Vec<VertexRef>>)> {
        let ears = ear_vertices(&self.ears);
        let name = match &self.name {
            Some(name) => name,
            None => return Ok((read_obj(self.input.get()?)?, ears)),
        };

        let library = Library::new(&self.library);
        let mesh = library.load(name)?;
        if !ears.is_empty() {
            return Ok((mesh, ears));
        }
        info!("Loading ear data of '{}'...", name);
        Ok((mesh, library.load_ear_data(name)?))
    }

    pub fn run(&self) -> Result<()> {
        let (mesh, ears) = self.load_head()?;
        let (front, side) = self.scan.open()?;

        let head = generate_head(
            &mesh,
            &front,
            &side,
            &ears,
            &self.resolution,
            &self.fusion,
        )?;

        if let Some(path) = &self.landmarks {
            let json = serde_json::to_vec_pretty(&head.landmarks)
                .res(|| "failed to serialize landmarks".to_string())?;
            fs::write_file(path, &json)?;
        }

        if let Some(path) = &self.curves {
            let json = serde_json::to_vec_pretty(&head.curves)
                .res(|| "failed to serialize control curves".to_string())?;
            fs::write_file(path, &json)?;
        }

        info!("Writing result...");
        let mut writer = self.output.get()?;
        write_obj(&head.mesh, &mut writer)?;
        writer.flush().res(|| "failed to write OBJ-file".to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::library::ear_info;
    use crate::mesh::test_util::*;
    use crate::region::Region;
    use image::RgbImage;
    use std::env::temp_dir;

    fn command(args: &[&str]) -> GenerateHeadCommand {
        let required = ["generate", "--front", "front.png", "--side", "side.png"];
        GenerateHeadCommand::from_iter_safe(required.iter().chain(args)).unwrap()
    }

    #[test]
    fn test_ear_vertices() {
        let full: EarVertices = "A.vtx[1],A.vtx[2],A.vtx[3],A.vtx[4],A.vtx[5]"
            .parse()
            .unwrap();
        let short: EarVertices = "B.vtx[9],,,,".parse().unwrap();
        let blank: EarVertices = ",,,,".parse().unwrap();

        let ears = ear_vertices(&[full, blank, short]);
        assert_eq!(ears.len(), 2);
        assert_eq!(ears[0][4], VertexRef::new("A", 5));
        assert_eq!(ears[1], vec![VertexRef::new("B", 9)]);
    }

    #[test]
    fn test_load_library_head() {
        let dir =
            temp_dir().join(format!("sculptor-generate-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mesh = tagged(grid(0.0, 0.0, 0.0, 2, 1), Region::Ear);
        let stored = vec![vec![
            VertexRef::new("Ear_geo_1", 1),
            VertexRef::new("Ear_geo_1", 4),
        ]];
        Library::new(&dir)
            .save("head", &mesh, ear_info(&stored), &RgbImage::new(4, 4))
            .unwrap();
        let dir_arg = dir.to_str().unwrap();

        let (loaded, ears) = command(&["--library", dir_arg, "--name", "head"])
            .load_head()
            .unwrap();
        assert_eq!(loaded.faces, mesh.faces);
        assert_eq!(ears, stored);

        let flag = "Ear_geo_1.vtx[0],Ear_geo_1.vtx[2],,,";
        let args = ["--library", dir_arg, "--name", "head", "--ear", flag];
        let (_, ears) = command(&args).load_head().unwrap();
        assert_eq!(
            ears,
            vec![vec![
                VertexRef::new("Ear_geo_1", 0),
                VertexRef::new("Ear_geo_1", 2),
            ]]
        );

        let err = command(&["--library", dir_arg, "--name", "absent"])
            .load_head()
            .err()
            .unwrap();
        assert_eq!(err.kind, base::defs::ErrorKind::IoError);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
