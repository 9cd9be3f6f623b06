//! Experiment bootstrap parameters.

use serde::{Deserialize, Serialize};

use crate::{DeviceMapping, FlagError, MapIds, ThreadSettings, get_device_mapping};

#[cfg(feature = "clap")]
use crate::parse_bool_flag;

/// Parameters common to every experiment run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ExperimentParams {
    /// Experiment name (groups runs under `<dump_path>/<exp_name>`)
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub exp_name: String,
    /// Root directory for experiment dumps
    #[serde(default = "default_dump_path")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "./dumped"))]
    pub dump_path: String,
    /// GPU to use, negative for CPU
    #[serde(default = "default_gpu_id")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "-1", allow_hyphen_values = true))]
    pub gpu_id: i32,
    /// Number of CPU threads
    #[serde(default = "default_threads")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "1"))]
    pub threads: usize,
    /// Comma-separated map IDs used for training
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long, default_value = "1"))]
    pub map_ids_train: MapIds,
    /// Comma-separated map IDs used for evaluation (defaults to the training maps)
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub map_ids_test: Option<MapIds>,
    /// Evaluate only, no training
    #[serde(default)]
    #[cfg_attr(
        feature = "clap",
        arg(long, default_value = "false", action = clap::ArgAction::Set, value_parser = parse_bool_flag)
    )]
    pub evaluate: bool,
    /// Render episodes while running
    #[serde(default)]
    #[cfg_attr(
        feature = "clap",
        arg(long, default_value = "false", action = clap::ArgAction::Set, value_parser = parse_bool_flag)
    )]
    pub visualize: bool,
    /// Checkpoint to reload
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub reload: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub seed: Option<u64>,
}

fn default_dump_path() -> String {
    "./dumped".into()
}
fn default_gpu_id() -> i32 {
    -1
}
fn default_threads() -> usize {
    1
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            exp_name: String::new(),
            dump_path: default_dump_path(),
            gpu_id: default_gpu_id(),
            threads: default_threads(),
            map_ids_train: MapIds::default(),
            map_ids_test: None,
            evaluate: false,
            visualize: false,
            reload: None,
            seed: None,
        }
    }
}

impl ExperimentParams {
    /// Map IDs used for evaluation, falling back to the training maps.
    pub fn map_ids_test(&self) -> &MapIds {
        self.map_ids_test.as_ref().unwrap_or(&self.map_ids_train)
    }

    pub fn thread_settings(&self) -> Result<ThreadSettings, FlagError> {
        ThreadSettings::new(self.threads)
    }

    pub fn device_mapping(&self) -> DeviceMapping {
        get_device_mapping(self.gpu_id)
    }

    /// Convert to CLI arguments for subprocess invocation.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--exp-name".into(),
            self.exp_name.clone(),
            "--dump-path".into(),
            self.dump_path.clone(),
            "--gpu-id".into(),
            self.gpu_id.to_string(),
            "--threads".into(),
            self.threads.to_string(),
            "--map-ids-train".into(),
            self.map_ids_train.to_string(),
            "--evaluate".into(),
            u8::from(self.evaluate).to_string(),
            "--visualize".into(),
            u8::from(self.visualize).to_string(),
        ];
        if let Some(ref ids) = self.map_ids_test {
            args.extend(["--map-ids-test".into(), ids.to_string()]);
        }
        if let Some(ref reload) = self.reload {
            args.extend(["--reload".into(), reload.clone()]);
        }
        if let Some(seed) = self.seed {
            args.extend(["--seed".into(), seed.to_string()]);
        }
        args
    }
}
