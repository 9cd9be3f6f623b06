//! Process-wide thread configuration.
//!
//! Lives in its own test binary since it mutates process state.

use expkit_config::{
    MKL_NUM_THREADS, ThreadError, ThreadSettings, current_num_threads, in_current_pool,
    set_num_threads,
};
use rayon::prelude::*;

fn assert_threads(n: usize) {
    assert_eq!(ThreadSettings::current().map(|s| s.num_threads()), Some(n));
    assert_eq!(current_num_threads(), n);
    assert_eq!(in_current_pool(rayon::current_num_threads), n);
    assert_eq!(std::env::var(MKL_NUM_THREADS).unwrap(), n.to_string());
}

#[test]
fn test_set_num_threads_process_wide() {
    // Rayon's global pool is already running before any install
    let sum: u64 = (1..=100u64).into_par_iter().sum();
    assert_eq!(sum, 5050);
    assert!(ThreadSettings::current().is_none());

    let settings = set_num_threads(4).unwrap();
    assert_eq!(settings.num_threads(), 4);
    assert_threads(4);

    // Each call replaces the previous setting
    set_num_threads(2).unwrap();
    assert_threads(2);

    let sum: u64 = in_current_pool(|| (1..=100u64).into_par_iter().sum());
    assert_eq!(sum, 5050);

    // A rejected value leaves the current setting in place
    assert!(matches!(set_num_threads(0), Err(ThreadError::Invalid(_))));
    assert_threads(2);
}
