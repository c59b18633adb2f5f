use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const UPDATE_LOG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateLogEntry {
    pub version: String,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateLog {
    pub schema_version: u32,
    pub entries: Vec<UpdateLogEntry>,
    #[serde(skip)]
    pub rejected: Vec<String>,
}

#[derive(Deserialize)]
struct RawUpdateLog {
    schema_version: u32,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

impl UpdateLog {
    /// Malformed entries are dropped and described in `rejected`; only a
    /// malformed envelope or an unsupported schema fails the whole parse.
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let raw: RawUpdateLog =
            serde_json::from_str(input).context("failed to parse update log")?;
        if raw.schema_version > UPDATE_LOG_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported update log schema_version {}; newest supported is {}",
                raw.schema_version,
                UPDATE_LOG_SCHEMA_VERSION
            ));
        }

        let mut entries = Vec::with_capacity(raw.entries.len());
        let mut rejected = Vec::new();
        for (index, value) in raw.entries.into_iter().enumerate() {
            match serde_json::from_value::<UpdateLogEntry>(value) {
                Ok(entry) if !entry.version.trim().is_empty() => entries.push(entry),
                Ok(_) => rejected.push(format!("entry {index}: version must not be empty")),
                Err(err) => rejected.push(format!("entry {index}: {err}")),
            }
        }
        for reason in &rejected {
            warn!(reason = %reason, "skipping malformed update log entry");
        }

        Ok(Self {
            schema_version: raw.schema_version,
            entries,
            rejected,
        })
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize update log")
    }
}
