use thiserror::Error;

pub type Result<T> = std::result::Result<T, InputError>;

// Error taxonomy: configuration mismatches, extraction I/O, NetCDF
// writes and staging transfers. Unmatched identifiers are not errors;
// they produce empty series.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("configuration mismatch: {0}")]
    Config(String),

    #[error("extraction I/O error: {0}")]
    Extraction(String),

    #[error("node observation at cycle/pass {0} has no matching reach observation")]
    ReachNodeMismatch(String),

    #[error("NetCDF write error: {0}")]
    Write(#[from] netcdf::Error),

    #[error("staging error: {0}")]
    Stage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for InputError {
    fn from(e: serde_json::Error) -> Self {
        InputError::Config(e.to_string())
    }
}

impl From<gdal::errors::GdalError> for InputError {
    fn from(e: gdal::errors::GdalError) -> Self {
        InputError::Extraction(e.to_string())
    }
}
