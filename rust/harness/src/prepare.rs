//! Run preparation: allocate a dump directory and record the run's parameters.

use std::{
    fs::File,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use expkit_config::{DeviceMapping, ExperimentParams};
use serde::Serialize;

use crate::dump::{DumpError, DumpPathAllocator};

/// File written into every prepared dump directory.
pub const MANIFEST_FILE: &str = "params.json";

/// Everything recorded about a run when its directory is created.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub params: ExperimentParams,
    pub device_mapping: DeviceMapping,
    pub created_at: String,
}

/// A run whose dump directory exists and holds its manifest.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub dump_path: PathBuf,
    pub manifest: RunManifest,
}

/// Prepare a run with the default (thread-local) random source.
pub fn prepare_run(params: &ExperimentParams) -> Result<PreparedRun, PrepareError> {
    prepare_run_with(&mut DumpPathAllocator::new(), params)
}

/// Prepare a run using the given allocator.
pub fn prepare_run_with<R: rand::RngExt>(
    allocator: &mut DumpPathAllocator<R>,
    params: &ExperimentParams,
) -> Result<PreparedRun, PrepareError> {
    // Reject bad settings before touching the filesystem
    params.thread_settings()?;

    let dump_path = allocator.allocate(&params.dump_path, &params.exp_name)?;
    let manifest = RunManifest {
        params: params.clone(),
        device_mapping: params.device_mapping(),
        created_at: now_timestamp(),
    };
    record_manifest(&dump_path, &manifest)?;

    Ok(PreparedRun {
        dump_path,
        manifest,
    })
}

/// Write the manifest into a fresh run directory, removing the directory
/// again if that fails.
fn record_manifest(dump_path: &Path, manifest: &RunManifest) -> Result<(), PrepareError> {
    let Err(e) = write_manifest(dump_path, manifest) else {
        return Ok(());
    };

    let manifest_path = dump_path.join(MANIFEST_FILE);
    let cleanup = match std::fs::remove_file(&manifest_path) {
        Err(rm) if rm.kind() != ErrorKind::NotFound => Err(rm),
        _ => std::fs::remove_dir(dump_path),
    };
    if let Err(rm) = cleanup {
        tracing::warn!("Failed to remove {}: {}", dump_path.display(), rm);
    }
    Err(e)
}

fn write_manifest(dump_path: &Path, manifest: &RunManifest) -> Result<(), PrepareError> {
    let path = dump_path.join(MANIFEST_FILE);
    let file = File::create(&path).map_err(|e| PrepareError::Io(path.clone(), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)
        .map_err(|e| PrepareError::Write(path.clone(), e.to_string()))?;
    writer.flush().map_err(|e| PrepareError::Io(path, e))
}

/// Get current local time as a string.
#[must_use]
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Errors that can occur when preparing a run.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("invalid parameters: {0}")]
    Params(#[from] expkit_config::FlagError),
    #[error(transparent)]
    Dump(#[from] DumpError),
    #[error("failed to write {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to serialize {0}: {1}")]
    Write(PathBuf, String),
}
