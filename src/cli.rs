use clap::{Parser, command};
use std::path::PathBuf;

use crate::config::{Context, RunType};

/// Extract SWOT observations for one reach or lake and stage them as
/// NetCDF time series.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Index into the reach/node JSON document; falls back to the batch
    /// array index when not given
    #[arg(short = 'i', long = "index", env = "AWS_BATCH_JOB_ARRAY_INDEX")]
    pub index: usize,

    /// Path to the reach/node JSON document
    #[arg(short = 'r', long = "reach-json")]
    pub reach_json: PathBuf,

    /// Path to the cycle/pass JSON document
    #[arg(short = 'p', long = "pass-json")]
    pub pass_json: PathBuf,

    /// Path to the shapefile-listing JSON document (cloud mode)
    #[arg(short = 's', long = "shapefile-json", required_unless_present = "local")]
    pub shapefile_json: Option<PathBuf>,

    /// Observation context to extract
    #[arg(short = 'c', long, value_enum, default_value_t = Context::River)]
    pub context: Context,

    /// Output directory (root of the shared mount)
    #[arg(short = 'd', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Read shapefiles from the local filesystem instead of the object store
    #[arg(short = 'l', long = "local", requires = "shapefile_dir")]
    pub local: bool,

    /// Local shapefile directory, used only with -l
    #[arg(short = 'f', long = "shapefile-dir", requires = "local")]
    pub shapefile_dir: Option<PathBuf>,

    /// SoS data product to stage
    #[arg(short = 't', long = "run-type", value_enum, default_value_t = RunType::Unconstrained)]
    pub run_type: RunType,

    /// Explicit SoS version; defaults to the latest version in the bucket
    #[arg(long = "sos-version")]
    pub sos_version: Option<String>,
}

pub fn get_args() -> Args {
    Args::parse()
}
