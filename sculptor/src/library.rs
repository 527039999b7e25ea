use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feature::EAR_POINTS;
use crate::mesh::Mesh;
use crate::obj::{read_obj, write_obj};
use crate::region::VertexRef;
use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

pub const EAR_DATA_KEY: &str = "earData";

/// Catalog record of a library head.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub screenshot: PathBuf,
    #[serde(flatten)]
    pub info: Map<String, Value>,
}

/// Directory of named heads: `<name>.obj` with its `<name>.json` record
/// and `<name>.jpg` thumbnail.
pub struct Library {
    pub directory: PathBuf,
    pub entries: IndexMap<String, LibraryEntry>,
}

impl Library {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            entries: IndexMap::new(),
        }
    }

    fn file(&self, name: &str, ext: &str) -> PathBuf {
        self.directory.join(name).with_extension(ext)
    }

    pub fn save(
        &mut self,
        name: &str,
        mesh: &Mesh,
        info: Map<String, Value>,
        thumbnail: &RgbImage,
    ) -> Result<()> {
        fs::create_dir(&self.directory)?;

        let path = self.file(name, "obj");
        let mut writer = BufWriter::new(fs::create_file(&path)?);
        write_obj(mesh, &mut writer)?;
        writer
            .flush()
            .res(|| format!("failed to write '{}'", path.display()))?;

        let screenshot = self.file(name, "jpg");
        thumbnail
            .save_with_format(&screenshot, ImageFormat::Jpeg)
            .map_err(|e| {
                let desc = format!("failed to save '{}'", screenshot.display());
                Error::with_source(ImageError, desc, e)
            })?;

        let entry = LibraryEntry {
            name: name.to_string(),
            path,
            screenshot,
            info,
        };
        let json = serde_json::to_vec_pretty(&entry)
            .res(|| format!("failed to serialize record of '{}'", name))?;
        fs::write_file(self.file(name, "json"), &json)?;

        info!("  '{}' saved to library", name);
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    fn read_entry(&self, name: &str) -> Result<LibraryEntry> {
        let json = fs::read_file(self.file(name, "json"))?;
        serde_json::from_slice(&json).map_err(|e| {
            let desc = format!("malformed library record of '{}'", name);
            Error::with_source(MalformedData, desc, e)
        })
    }

    /// Rescans the directory. Heads lacking a record or a thumbnail are
    /// skipped.
    pub fn find(&mut self) -> Result<()> {
        self.entries.clear();
        if !self.directory.is_dir() {
            warn!("library directory '{}' does not exist", self.directory.display());
            return Ok(());
        }

        for path in fs::list_dir(&self.directory)? {
            if path.extension().and_then(|e| e.to_str()) != Some("obj") {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            if !self.file(&name, "json").is_file() {
                warn!("no record found, '{}' is incomplete", name);
                continue;
            }
            let screenshot = self.file(&name, "jpg");
            if !screenshot.is_file() {
                warn!("no thumbnail found, '{}' is incomplete", name);
                continue;
            }

            let mut entry = self.read_entry(&name)?;
            entry.screenshot = screenshot;
            self.entries.insert(name, entry);
        }

        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Mesh> {
        let path = self.file(name, "obj");
        read_obj(fs::open_file(&path)?)
    }

    /// Ear vertices of a head, five per ear. An empty identifier ends an
    /// ear early and ears without vertices are dropped.
    pub fn load_ear_data(&self, name: &str) -> Result<Vec<Vec<VertexRef>>> {
        let entry = self.read_entry(name)?;
        let values = match entry.info.get(EAR_DATA_KEY) {
            Some(Value::Array(values)) => values,
            Some(_) => {
                let desc = format!("{} of '{}' is not a list", EAR_DATA_KEY, name);
                return Err(Error::new(MalformedData, desc));
            }
            None => {
                info!("  no ear data for '{}'", name);
                return Ok(vec![]);
            }
        };

        let ids = values
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    let desc = format!("non-string {} item in '{}'", EAR_DATA_KEY, name);
                    Error::new(MalformedData, desc)
                })
            })
            .collect::<Result<Vec<&str>>>()?;

        let mut ears = Vec::new();
        for chunk in ids.chunks(EAR_POINTS) {
            let ear = chunk
                .iter()
                .take_while(|id| !id.is_empty())
                .map(|id| id.parse::<VertexRef>())
                .collect::<Result<Vec<_>>>()?;
            if !ear.is_empty() {
                ears.push(ear);
            }
        }
        Ok(ears)
    }
}

/// Metadata record carrying ear vertices.
pub fn ear_info(ears: &[Vec<VertexRef>]) -> Map<String, Value> {
    let mut ids = Vec::new();
    for ear in ears {
        for i in 0..EAR_POINTS {
            let id = ear.get(i).map_or_else(String::new, |v| v.to_string());
            ids.push(Value::String(id));
        }
    }

    let mut info = Map::new();
    info.insert(EAR_DATA_KEY.to_string(), Value::Array(ids));
    info
}
