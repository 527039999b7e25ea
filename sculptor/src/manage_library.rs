use std::io::Write;
use std::path::PathBuf;

use structopt::StructOpt;

use crate::generate_head::{ear_vertices, EarVertices, ObjOutput};
use crate::library::{ear_info, Library};
use crate::obj::{read_obj, write_obj};
use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

#[derive(StructOpt)]
#[structopt(about = "List, save or export library heads")]
pub struct LibraryCommand {
    #[structopt(
        help = "Library directory",
        long,
        default_value = "library"
    )]
    directory: PathBuf,

    #[structopt(subcommand)]
    action: LibraryAction,
}

#[derive(StructOpt)]
enum LibraryAction {
    #[structopt(about = "List complete library heads")]
    List,

    #[structopt(about = "Save a region-tagged head into the library")]
    Save {
        #[structopt(help = "Head name")]
        name: String,

        #[structopt(help = "Input .obj file", long)]
        mesh: PathBuf,

        #[structopt(help = "Thumbnail image", long)]
        thumbnail: PathBuf,

        #[structopt(
            help = "Five comma-separated ear vertices",
            long = "ear",
            number_of_values = 1
        )]
        ears: Vec<EarVertices>,
    },

    #[structopt(about = "Export a library head into OBJ")]
    Export {
        #[structopt(help = "Head name")]
        name: String,

        #[structopt(flatten)]
        output: ObjOutput,
    },
}

impl LibraryCommand {
    pub fn run(&self) -> Result<()> {
        let mut library = Library::new(&self.directory);

        match &self.action {
            LibraryAction::List => {
                library.find()?;
                let stdout_err = || "failed to write to stdout".to_string();
                let mut stdout = std::io::stdout();
                for (name, entry) in &library.entries {
                    writeln!(stdout, "{}\t{}", name, entry.path.display())
                        .into_result(stdout_err)?;
                }
                Ok(())
            }
            LibraryAction::Save {
                name,
                mesh,
                thumbnail,
                ears,
            } => {
                let mesh = read_obj(fs::open_file(mesh)?)?;
                let thumbnail = image::open(thumbnail)
                    .map_err(|e| {
                        let desc =
                            format!("failed to decode image '{}'", thumbnail.display());
                        Error::with_source(ImageError, desc, e)
                    })?
                    .to_rgb8();
                let info = ear_info(&ear_vertices(ears));
                library.save(name, &mesh, info, &thumbnail)
            }
            LibraryAction::Export { name, output } => {
                let mesh = library.load(name)?;
                let mut writer = output.get()?;
                write_obj(&mesh, &mut writer)?;
                writer.flush().res(|| "failed to write OBJ-file".to_string())
            }
        }
    }
}
