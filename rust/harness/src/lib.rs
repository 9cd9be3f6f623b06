#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! Experiment Harness
//!
//! Allocates unique experiment dump directories and prepares runs from
//! command-line flags or a batch TOML file.

pub mod config;
pub mod dump;
pub mod prepare;

pub use config::{BatchConfig, RunConfig};
pub use dump::{DumpPathAllocator, get_dump_path};
pub use prepare::{PreparedRun, RunManifest, prepare_run};
