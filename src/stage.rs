use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{RunType, S3Config};
use crate::error::{InputError, Result};
use crate::storage::{Storage, download_object};

/// Move produced NetCDF files onto the shared mount under
/// `<output>/swot/<continent>/`. Each file lands via a `.tmp` sibling
/// and an atomic rename so partial copies are never visible under the
/// final name.
pub fn stage_outputs(files: &[PathBuf], output_dir: &Path, continent: &str) -> Result<Vec<PathBuf>> {
    let dest_dir = output_dir.join("swot").join(continent.to_lowercase());
    fs::create_dir_all(&dest_dir)
        .map_err(|e| InputError::Stage(format!("cannot create {}: {e}", dest_dir.display())))?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .ok_or_else(|| InputError::Stage(format!("no file name in {}", file.display())))?;
        let dest = dest_dir.join(name);
        let tmp = dest_dir.join(format!("{}.tmp", name.to_string_lossy()));

        fs::copy(file, &tmp)
            .map_err(|e| InputError::Stage(format!("copy to {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &dest)
            .map_err(|e| InputError::Stage(format!("rename to {}: {e}", dest.display())))?;
        info!("staged {}", dest.display());
        staged.push(dest);
    }
    Ok(staged)
}

/// Stage the SoS reference dataset for the selected run type under
/// `<output>/sos/<run_type>/`. The version defaults to the latest one
/// present in the bucket. Local mode has no SoS source and skips.
pub async fn stage_sos(
    storage: &Storage,
    cfg: &S3Config,
    run_type: RunType,
    version: Option<&str>,
    output_dir: &Path,
) -> Result<()> {
    let Some(client) = storage.client() else {
        warn!("local mode: skipping SoS staging, no local SoS source");
        return Ok(());
    };

    let version = match version {
        Some(v) => v.to_string(),
        None => latest_sos_version(client, &cfg.sos_bucket, run_type).await?,
    };
    let prefix = format!("{}/{}/", run_type.as_str(), version);
    info!("staging SoS {prefix} from {}", cfg.sos_bucket);

    let keys = list_keys(client, &cfg.sos_bucket, &prefix).await?;
    if keys.is_empty() {
        return Err(InputError::Stage(format!(
            "no SoS objects under {}/{prefix}",
            cfg.sos_bucket
        )));
    }

    let dest_dir = output_dir.join("sos").join(run_type.as_str());
    fs::create_dir_all(&dest_dir)
        .map_err(|e| InputError::Stage(format!("cannot create {}: {e}", dest_dir.display())))?;

    let scratch = tempfile::tempdir()
        .map_err(|e| InputError::Stage(format!("no scratch directory: {e}")))?;
    for key in &keys {
        let fetched = download_object(client, &cfg.sos_bucket, key, scratch.path())
            .await
            .map_err(|e| InputError::Stage(e.to_string()))?;
        let name = key.rsplit('/').next().unwrap_or(key);
        let dest = dest_dir.join(name);
        let tmp = dest_dir.join(format!("{name}.tmp"));
        fs::copy(&fetched, &tmp)
            .map_err(|e| InputError::Stage(format!("copy to {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &dest)
            .map_err(|e| InputError::Stage(format!("rename to {}: {e}", dest.display())))?;
    }
    info!("staged {} SoS files to {}", keys.len(), dest_dir.display());
    Ok(())
}

// Latest version prefix under "<run_type>/" in the SoS bucket
async fn latest_sos_version(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    run_type: RunType,
) -> Result<String> {
    let response = client
        .list_objects_v2()
        .bucket(bucket)
        .prefix(format!("{}/", run_type.as_str()))
        .delimiter("/")
        .send()
        .await
        .map_err(|e| InputError::Stage(format!("list {bucket}: {e}")))?;

    response
        .common_prefixes()
        .iter()
        .filter_map(|p| p.prefix())
        .filter_map(|p| {
            p.trim_end_matches('/')
                .rsplit('/')
                .next()
                .map(str::to_string)
        })
        .max()
        .ok_or_else(|| {
            InputError::Stage(format!("no SoS versions under {bucket}/{}/", run_type.as_str()))
        })
}

async fn list_keys(client: &aws_sdk_s3::Client, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let response = client
        .list_objects_v2()
        .bucket(bucket)
        .prefix(prefix)
        .send()
        .await
        .map_err(|e| InputError::Stage(format!("list {bucket}/{prefix}: {e}")))?;

    Ok(response
        .contents()
        .iter()
        .filter_map(|o| o.key().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_files_under_continent_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let produced = scratch.path().join("74267800071_SWOT.nc");
        fs::write(&produced, b"netcdf bytes").unwrap();

        let staged = stage_outputs(&[produced], out.path(), "NA").unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(
            staged[0],
            out.path().join("swot").join("na").join("74267800071_SWOT.nc")
        );
        assert_eq!(fs::read(&staged[0]).unwrap(), b"netcdf bytes");
        // no .tmp leftovers
        let leftovers: Vec<_> = fs::read_dir(out.path().join("swot").join("na"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn restaging_overwrites_previous_output() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let produced = scratch.path().join("74267800071_SWOT.nc");

        fs::write(&produced, b"first").unwrap();
        stage_outputs(&[produced.clone()], out.path(), "NA").unwrap();
        fs::write(&produced, b"second").unwrap();
        let staged = stage_outputs(&[produced], out.path(), "NA").unwrap();

        assert_eq!(fs::read(&staged[0]).unwrap(), b"second");
    }
}
