//! Command-line value parsers: boolean flags, map-ID lists and JSON broadcasts.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

const FALSY_STRINGS: [&str; 3] = ["off", "false", "0"];
const TRUTHY_STRINGS: [&str; 3] = ["on", "true", "1"];

/// Parse a boolean flag value (`on/off`, `true/false`, `1/0`, any case).
///
/// Usable directly as a clap `value_parser`.
pub fn parse_bool_flag(s: &str) -> Result<bool, FlagError> {
    let lower = s.to_lowercase();
    if FALSY_STRINGS.contains(&lower.as_str()) {
        Ok(false)
    } else if TRUTHY_STRINGS.contains(&lower.as_str()) {
        Ok(true)
    } else {
        Err(FlagError::InvalidBool(s.to_string()))
    }
}

/// Sorted, duplicate-free list of map IDs (all >= 1).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MapIds(Vec<u32>);

impl MapIds {
    /// Build from arbitrary IDs, enforcing the same rules as parsing.
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Result<Self, FlagError> {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(FlagError::InvalidMapId(String::new()));
        }
        ids.sort_unstable();
        if ids[0] == 0 {
            return Err(FlagError::ZeroMapId);
        }
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(FlagError::DuplicateMapId(w[0]));
        }
        Ok(Self(ids))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl Default for MapIds {
    fn default() -> Self {
        Self(vec![1])
    }
}

impl From<MapIds> for Vec<u32> {
    fn from(ids: MapIds) -> Self {
        ids.0
    }
}

/// Parse a comma-separated list of map IDs, e.g. `"3,1,2"` -> `[1, 2, 3]`.
pub fn parse_map_ids(s: &str) -> Result<MapIds, FlagError> {
    let ids = s
        .split(',')
        .map(|tok| {
            // `u32::from_str` accepts a leading '+', plain digits only here
            if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FlagError::InvalidMapId(tok.to_string()));
            }
            tok.parse::<u32>()
                .map_err(|_| FlagError::InvalidMapId(tok.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    MapIds::new(ids)
}

impl std::str::FromStr for MapIds {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_map_ids(s)
    }
}

impl std::fmt::Display for MapIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl Serialize for MapIds {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MapIds {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Broadcast a JSON parameter into a list of `length` elements.
///
/// A JSON list must already have `length` elements and is returned as is.
/// A single JSON integer is repeated `length` times. Anything else is rejected.
pub fn bcast_json_list<T>(param: &str, length: usize) -> Result<Vec<T>, FlagError>
where
    T: DeserializeOwned + Clone,
{
    let value: serde_json::Value = serde_json::from_str(param)?;
    match value {
        serde_json::Value::Array(items) => {
            if items.len() != length {
                return Err(FlagError::BroadcastLength {
                    expected: length,
                    got: items.len(),
                });
            }
            Ok(serde_json::from_value(serde_json::Value::Array(items))?)
        }
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            let item: T = serde_json::from_value(serde_json::Value::Number(n))?;
            Ok(vec![item; length])
        }
        other => Err(FlagError::BroadcastShape(other.to_string())),
    }
}

/// Errors produced by the value parsers.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("invalid value '{0}' for a boolean flag, use 0 or 1")]
    InvalidBool(String),
    #[error("invalid map ID '{0}', expected a non-negative integer")]
    InvalidMapId(String),
    #[error("map IDs must be >= 1")]
    ZeroMapId,
    #[error("duplicate map ID {0}")]
    DuplicateMapId(u32),
    #[error("invalid JSON parameter: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a list of {expected} elements, got {got}")]
    BroadcastLength { expected: usize, got: usize },
    #[error("expected a list or an integer, got {0}")]
    BroadcastShape(String),
    #[error("number of threads must be >= 1, got {0}")]
    InvalidThreads(usize),
}
