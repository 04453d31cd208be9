use aws_config::Region;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::S3Config;
use crate::error::{InputError, Result};

// Where the shapefiles live. Local directories are read in place; S3
// objects are downloaded to a scratch directory before parsing.
#[derive(Debug)]
pub enum Storage {
    Local { dir: PathBuf },
    S3 { client: Client, bucket: String },
}

impl Storage {
    pub fn local(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(InputError::Extraction(format!(
                "shapefile directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Storage::Local { dir: dir.to_path_buf() })
    }

    /// Fetch temporary scoped credentials from the parameter store and
    /// build an S3 client for the shapefile bucket.
    pub async fn s3(cfg: &S3Config) -> Result<Self> {
        let region = RegionProviderChain::first_try(Region::new(cfg.region.clone()));
        let base = aws_config::from_env().region(region).load().await;

        let ssm = aws_sdk_ssm::Client::new(&base);
        let access_key = fetch_param(&ssm, &cfg.key_param).await?;
        let secret = fetch_param(&ssm, &cfg.secret_param).await?;
        let token = fetch_param(&ssm, &cfg.token_param).await?;

        let creds = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret,
            Some(token),
            None,
            "parameter-store",
        );
        let conf = aws_sdk_s3::config::Builder::from(&base)
            .credentials_provider(creds)
            .build();

        Ok(Storage::S3 {
            client: Client::from_conf(conf),
            bucket: cfg.shapefile_bucket.clone(),
        })
    }

    pub fn client(&self) -> Option<&Client> {
        match self {
            Storage::Local { .. } => None,
            Storage::S3 { client, .. } => Some(client),
        }
    }

    /// Shapefile names visible to this invocation: a directory scan in
    /// local mode, the resolved object keys in cloud mode.
    pub fn shapefile_names(&self, resolved_keys: &[String]) -> Result<Vec<String>> {
        match self {
            Storage::Local { dir } => {
                let mut names = Vec::new();
                for entry in fs::read_dir(dir)? {
                    let name = entry?.file_name().to_string_lossy().into_owned();
                    if name.ends_with(".shp") {
                        names.push(name);
                    }
                }
                names.sort();
                Ok(names)
            }
            Storage::S3 { .. } => Ok(resolved_keys.to_vec()),
        }
    }

    /// Make one shapefile set readable on the local filesystem and
    /// return the .shp path.
    pub async fn fetch(&self, name: &str, scratch: &Path) -> Result<PathBuf> {
        match self {
            Storage::Local { dir } => Ok(dir.join(name)),
            Storage::S3 { client, bucket } => {
                // gdal needs the sidecar files next to the .shp
                let mut shp_path = None;
                for (ext, required) in [("shp", true), ("dbf", true), ("shx", true), ("prj", false)] {
                    let key = swap_extension(name, ext);
                    match download_object(client, bucket, &key, scratch).await {
                        Ok(path) => {
                            if ext == "shp" {
                                shp_path = Some(path);
                            }
                        }
                        Err(e) if required => return Err(e),
                        Err(_) => debug!("no {ext} sidecar for {name}"),
                    }
                }
                shp_path
                    .ok_or_else(|| InputError::Extraction(format!("no .shp object for {name}")))
            }
        }
    }
}

async fn fetch_param(ssm: &aws_sdk_ssm::Client, name: &str) -> Result<String> {
    let response = ssm
        .get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| InputError::Extraction(format!("credential fetch for {name}: {e}")))?;

    response
        .parameter
        .and_then(|p| p.value)
        .ok_or_else(|| InputError::Extraction(format!("parameter {name} has no value")))
}

/// Download one object into `dest_dir` under its key's file name.
pub async fn download_object(
    client: &Client,
    bucket: &str,
    key: &str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let path = dest_dir.join(file_name);

    let mut object = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| InputError::Extraction(format!("get {bucket}/{key}: {e}")))?;

    let mut file = File::create(&path)?;
    while let Some(bytes) = object
        .body
        .try_next()
        .await
        .map_err(|e| InputError::Extraction(format!("read {bucket}/{key}: {e}")))?
    {
        file.write_all(&bytes)?;
    }

    Ok(path)
}

fn swap_extension(key: &str, ext: &str) -> String {
    match key.strip_suffix(".shp") {
        Some(stem) => format!("{stem}.{ext}"),
        None => key.to_string(),
    }
}
