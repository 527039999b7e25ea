use std::io::Write;

use structopt::StructOpt;

use crate::feature::ResolutionParams;
use crate::landmarks::LandmarkSet;
use crate::pipeline::ScanParams;
use base::define_raw_output;
use base::defs::{IntoResult, Result};

define_raw_output!(JsonOutput, "json");

#[derive(StructOpt)]
#[structopt(about = "Scan front and side images into 3D landmarks")]
pub struct ScanImagesCommand {
    #[structopt(flatten)]
    scan: ScanParams,

    #[structopt(flatten)]
    resolution: ResolutionParams,

    #[structopt(flatten)]
    output: JsonOutput,
}

impl ScanImagesCommand {
    pub fn run(&self) -> Result<()> {
        let (front, side) = self.scan.open()?;
        let landmarks = LandmarkSet::generate(&front, &side, &self.resolution)?;

        let mut writer = self.output.get()?;
        serde_json::to_writer_pretty(&mut writer, &landmarks)
            .res(|| "failed to write landmarks".to_string())?;
        writer
            .flush()
            .res(|| "failed to write landmarks".to_string())
    }
}
