use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;

mod cli;
mod config;
mod error;
mod extract;
mod index;
mod io;
mod stage;
mod storage;
mod vars;


use config::S3Config;
use storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let start = Instant::now();

    // Resolve what this invocation owns
    let args = cli::get_args();
    let resolved = index::resolve(
        args.context,
        args.index,
        &args.reach_json,
        &args.pass_json,
        args.shapefile_json.as_deref(),
    )
    .with_context(|| format!("failed to resolve job index {}", args.index))?;
    info!(
        "index {} -> {} ({} cycle/passes, continent {})",
        args.index,
        resolved.target.swot_id(),
        resolved.cycle_passes.len(),
        resolved.continent
    );

    // Open shapefile storage
    let s3_cfg = S3Config::default();
    let storage = match &args.shapefile_dir {
        Some(dir) if args.local => Storage::local(dir)?,
        _ => {
            info!("requesting temporary object-store credentials");
            Storage::s3(&s3_cfg).await?
        }
    };

    let scratch = tempfile::tempdir().context("cannot create scratch directory")?;

    // Extract observations
    let extracted = extract::extract(&storage, &resolved, scratch.path())
        .await
        .context("extraction failed")?;
    info!("extracted {} observed time steps", extracted.observation_count());

    // Write NetCDF into scratch, then stage onto the shared mount
    let written = io::netcdf::write(scratch.path(), resolved.continent, &extracted)
        .context("NetCDF write failed")?;
    stage::stage_outputs(&[written], &args.output_dir, resolved.continent)
        .context("output staging failed")?;
    stage::stage_sos(
        &storage,
        &s3_cfg,
        args.run_type,
        args.sos_version.as_deref(),
        &args.output_dir,
    )
    .await
    .context("SoS staging failed")?;

    info!("Input operations complete. Execution time: {:?}", start.elapsed());
    Ok(())
}
