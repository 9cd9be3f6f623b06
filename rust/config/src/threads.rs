//! CPU thread-count configuration.

use std::{
    num::NonZeroUsize,
    process::Command,
    sync::{Arc, PoisonError, RwLock},
};

use crate::FlagError;

/// Environment variable read by MKL for its thread count.
pub const MKL_NUM_THREADS: &str = "MKL_NUM_THREADS";
/// Environment variable read by OpenMP runtimes.
pub const OMP_NUM_THREADS: &str = "OMP_NUM_THREADS";

/// Process-wide settings, replaced by every [`ThreadSettings::install`].
static INSTALLED: RwLock<Option<InstalledPool>> = RwLock::new(None);

struct InstalledPool {
    settings: ThreadSettings,
    pool: Arc<rayon::ThreadPool>,
}

/// A validated CPU thread count.
///
/// Pass this around instead of mutating process state; [`install`] is there
/// for binaries that do want a process-wide setting.
///
/// [`install`]: ThreadSettings::install
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadSettings {
    num_threads: NonZeroUsize,
}

impl ThreadSettings {
    pub fn new(num_threads: usize) -> Result<Self, FlagError> {
        NonZeroUsize::new(num_threads)
            .map(|num_threads| Self { num_threads })
            .ok_or(FlagError::InvalidThreads(num_threads))
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads.get()
    }

    /// Build a dedicated rayon pool with this many threads.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool, ThreadError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()
            .map_err(ThreadError::Pool)
    }

    /// Set the thread-count variables on a child process.
    pub fn apply_to_command(&self, cmd: &mut Command) {
        let n = self.num_threads().to_string();
        cmd.env(MKL_NUM_THREADS, &n).env(OMP_NUM_THREADS, &n);
    }

    /// Make these the process-wide settings until the next call.
    ///
    /// Rebuilds the process pool used by [`in_current_pool`] and sets
    /// `MKL_NUM_THREADS`. Works whether or not rayon's own global pool
    /// has already been initialized.
    pub fn install(&self) -> Result<(), ThreadError> {
        let pool = Arc::new(self.build_pool()?);

        // SAFETY: thread settings are applied during startup, before worker
        // threads read the environment
        unsafe { std::env::set_var(MKL_NUM_THREADS, self.num_threads().to_string()) };

        let previous = INSTALLED
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(InstalledPool {
                settings: *self,
                pool,
            });
        if let Some(previous) = previous {
            tracing::debug!(
                "Replacing {} CPU threads with {}",
                previous.settings.num_threads(),
                self.num_threads()
            );
        } else {
            tracing::debug!("Using {} CPU threads", self.num_threads());
        }
        Ok(())
    }

    /// Settings from the last successful [`install`](Self::install), if any.
    pub fn current() -> Option<Self> {
        INSTALLED
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| installed.settings)
    }
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            num_threads: NonZeroUsize::MIN,
        }
    }
}

/// Validate `n` and install it process-wide.
pub fn set_num_threads(n: usize) -> Result<ThreadSettings, ThreadError> {
    let settings = ThreadSettings::new(n)?;
    settings.install()?;
    Ok(settings)
}

/// Thread count in effect for this process.
///
/// Falls back to rayon's global pool when nothing was installed.
pub fn current_num_threads() -> usize {
    ThreadSettings::current().map_or_else(rayon::current_num_threads, |s| s.num_threads())
}

/// Run `op` inside the installed pool, or rayon's global pool if none.
pub fn in_current_pool<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    let pool = INSTALLED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|installed| Arc::clone(&installed.pool));
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Errors from applying thread settings.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error(transparent)]
    Invalid(#[from] FlagError),
    #[error("failed to build thread pool: {0}")]
    Pool(rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            ThreadSettings::new(0),
            Err(FlagError::InvalidThreads(0))
        ));
        assert!(matches!(
            set_num_threads(0),
            Err(ThreadError::Invalid(FlagError::InvalidThreads(0)))
        ));
    }

    #[test]
    fn test_dedicated_pool_size() {
        let pool = ThreadSettings::new(3).unwrap().build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn test_apply_to_command() {
        let mut cmd = Command::new("true");
        ThreadSettings::new(4).unwrap().apply_to_command(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        let four = Some(OsStr::new("4"));
        assert!(envs.contains(&(OsStr::new(MKL_NUM_THREADS), four)));
        assert!(envs.contains(&(OsStr::new(OMP_NUM_THREADS), four)));
    }
}
