//! Batch configuration: many experiment runs described in one TOML file.

use std::path::Path;

use expkit_config::ExperimentParams;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from TOML (raw, before merging).
#[derive(Debug, Clone, Deserialize)]
struct RawBatchConfig {
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default = "empty_table")]
    pub defaults: toml::Value,
    #[serde(default)]
    pub runs: Vec<toml::Value>,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

/// Top-level configuration after merging defaults into runs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub harness: HarnessSettings,
    pub runs: Vec<RunConfig>,
}

/// Harness-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessSettings {
    /// Root directory for runs that don't set `dump_path`.
    #[serde(default = "default_dump_root")]
    pub dump_root: String,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            dump_root: default_dump_root(),
            log_level: None,
        }
    }
}

fn default_dump_root() -> String {
    "./dumped".to_string()
}

/// Configuration for a single experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(flatten)]
    pub params: ExperimentParams,
}

/// Merge two TOML tables, with `overlay` values taking precedence.
fn merge_toml(base: &toml::Value, overlay: &toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                merged.insert(
                    k.clone(),
                    if let Some(base_v) = base_map.get(k) {
                        merge_toml(base_v, v)
                    } else {
                        v.clone()
                    },
                );
            }
            toml::Value::Table(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Keys of a merged run table that no `RunConfig` field consumed.
fn unknown_keys(table: &toml::Value, run: &RunConfig) -> Vec<String> {
    let Some(table) = table.as_table() else {
        return Vec::new();
    };
    // JSON keeps `None` fields as nulls, so every field name shows up
    let known = match serde_json::to_value(run) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return Vec::new(),
    };
    table
        .keys()
        .filter(|k| !known.contains_key(k.as_str()))
        .cloned()
        .collect()
}

impl BatchConfig {
    /// Load configuration from a TOML file, merging defaults into each run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawBatchConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let dump_root = raw.harness.dump_root.clone();

        let runs: Vec<RunConfig> = raw
            .runs
            .into_iter()
            .map(|run_value| {
                let mut merged = merge_toml(&raw.defaults, &run_value);
                // Fill dump_path and exp_name unless given explicitly
                if let toml::Value::Table(ref mut t) = merged {
                    if !t.contains_key("dump_path") {
                        t.insert("dump_path".into(), toml::Value::String(dump_root.clone()));
                    }
                    if !t.contains_key("exp_name")
                        && let Some(name) = t.get("name").cloned()
                    {
                        t.insert("exp_name".into(), name);
                    }
                }
                let run: RunConfig = merged
                    .clone()
                    .try_into()
                    .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
                for key in unknown_keys(&merged, &run) {
                    tracing::warn!("Run {}: ignoring unknown key '{key}'", run.name);
                }
                Ok(run)
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            harness: raw.harness,
            runs,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = BatchConfig::parse(
            r#"
[[runs]]
name = "maze"
"#,
        )
        .unwrap();
        assert_eq!(config.harness.dump_root, "./dumped");
        assert_eq!(config.runs.len(), 1);
        assert_eq!(config.runs[0].params.exp_name, "maze");
        assert_eq!(config.runs[0].params.dump_path, "./dumped");
    }

    #[test]
    fn test_defaults_applied() {
        let config = BatchConfig::parse(
            r#"
[harness]
dump_root = "/data/dumped"

[defaults]
threads = 4
map_ids_train = "1,2,3"
gpu_id = 0

[[runs]]
name = "run1"

[[runs]]
name = "run2"
exp_name = "sweep"
gpu_id = -1
dump_path = "/scratch"
"#,
        )
        .unwrap();
        let run1 = &config.runs[0].params;
        assert_eq!(run1.threads, 4);
        assert_eq!(run1.map_ids_train.as_slice(), &[1, 2, 3]);
        assert_eq!(run1.gpu_id, 0);
        assert_eq!(run1.dump_path, "/data/dumped");

        let run2 = &config.runs[1].params;
        assert_eq!(config.runs[1].name, "run2");
        assert_eq!(run2.exp_name, "sweep");
        assert_eq!(run2.threads, 4);
        assert_eq!(run2.gpu_id, -1); // Overridden
        assert_eq!(run2.dump_path, "/scratch");
    }

    #[test]
    fn test_invalid_map_ids_rejected() {
        let res = BatchConfig::parse(
            r#"
[[runs]]
name = "bad"
map_ids_train = "0,1"
"#,
        );
        assert!(matches!(res, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_detected() {
        let merged: toml::Value = toml::from_str(
            r#"
name = "typo"
exp_name = "maze"
thread = 8
map_ids_train = "1,2"
"#,
        )
        .unwrap();
        let run: RunConfig = merged.clone().try_into().unwrap();
        assert_eq!(run.params.threads, 1);
        assert_eq!(unknown_keys(&merged, &run), vec!["thread".to_string()]);
    }

    #[test]
    fn test_known_keys_not_reported() {
        let merged: toml::Value = toml::from_str(
            r#"
name = "full"
exp_name = "maze"
dump_path = "./dumped"
gpu_id = 1
threads = 2
map_ids_train = "1"
map_ids_test = "3"
evaluate = true
visualize = false
reload = "./best.pth"
seed = 5
"#,
        )
        .unwrap();
        let run: RunConfig = merged.clone().try_into().unwrap();
        assert!(unknown_keys(&merged, &run).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("expkit.toml");
        std::fs::write(&path, "[[runs]]\nname = \"a\"\n[[runs]]\nname = \"b\"\n").unwrap();
        let config = BatchConfig::load(&path).unwrap();
        assert_eq!(config.runs.len(), 2);

        assert!(matches!(
            BatchConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_, _))
        ));
    }
}
