//! Experiment dump directory allocation.
//!
//! Layout: `<root>/<exp_name>/<id>` where `id` is 10 random characters
//! from `[a-z0-9]`.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use rand::{RngExt, rngs::ThreadRng};

/// Characters used for experiment IDs.
pub const ID_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Length of a generated experiment ID.
pub const ID_LEN: usize = 10;

/// Allocates fresh experiment directories.
pub struct DumpPathAllocator<R = ThreadRng> {
    rng: R,
}

impl DumpPathAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for DumpPathAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngExt> DumpPathAllocator<R> {
    /// Use a specific random source (e.g. a seeded `StdRng` in tests).
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draw a candidate experiment ID.
    pub fn random_id(&mut self) -> String {
        (0..ID_LEN)
            .map(|_| char::from(ID_ALPHABET[self.rng.random_range(0..ID_ALPHABET.len())]))
            .collect()
    }

    /// Create `root/exp_name/<id>` for a fresh `id` and return its path.
    ///
    /// Parent directories are created if missing. The leaf is created with
    /// `create_dir`, so an ID taken concurrently by another process is
    /// detected and a new one is drawn.
    pub fn allocate(
        &mut self,
        root: impl AsRef<Path>,
        exp_name: &str,
    ) -> Result<PathBuf, DumpError> {
        if exp_name.is_empty() {
            return Err(DumpError::EmptyExperimentName);
        }

        let sweep_path = root.as_ref().join(exp_name);
        std::fs::create_dir_all(&sweep_path).map_err(|e| DumpError::Io(sweep_path.clone(), e))?;

        loop {
            let dump_path = sweep_path.join(self.random_id());
            match std::fs::create_dir(&dump_path) {
                Ok(()) => {
                    tracing::info!("Created experiment directory {}", dump_path.display());
                    return Ok(dump_path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("{} already exists, drawing a new ID", dump_path.display());
                }
                Err(e) => return Err(DumpError::Io(dump_path, e)),
            }
        }
    }
}

/// Create a fresh experiment directory under `root/exp_name`.
pub fn get_dump_path(root: impl AsRef<Path>, exp_name: &str) -> Result<PathBuf, DumpError> {
    DumpPathAllocator::new().allocate(root, exp_name)
}

/// Errors that can occur when allocating a dump directory.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("experiment name must not be empty")]
    EmptyExperimentName,
    #[error("failed to create directory {0}: {1}")]
    Io(PathBuf, std::io::Error),
}
