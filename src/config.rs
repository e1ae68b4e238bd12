//! Tunables for loading and searching, readable from a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.75;
pub const DEFAULT_PART_SIZE: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Size of the fixed worker pool.
    pub worker_count: usize,
    /// Results delivered per query.
    pub max_results: usize,
    /// Records must score strictly above this to be reported.
    pub min_relevance: f32,
    /// Run one throwaway query when the service starts.
    pub warmup: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            max_results: DEFAULT_MAX_RESULTS,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            warmup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Regenerate previews the source left empty.
    pub build_thumbs: bool,
    /// Records per part when writing a binary container.
    pub part_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            build_thumbs: true,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub load: LoadConfig,
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            load: LoadConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
