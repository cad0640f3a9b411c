//! Review configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Target search depth per position
    pub analysis_depth: u32,

    /// Hard deadline for a single awaited evaluation
    pub eval_timeout: Duration,

    /// Directory holding cached classifications
    pub cache_dir: PathBuf,

    pub engine_threads: u32,
    pub engine_hash_mb: u32,

    /// Sent as `Skill Level` when present
    pub skill_level: Option<u32>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            analysis_depth: 16,
            eval_timeout: Duration::from_secs(10),
            cache_dir: PathBuf::from(".review-cache"),
            engine_threads: 1,
            engine_hash_mb: 64,
            skill_level: None,
        }
    }
}

impl ReviewConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys keep
    /// their defaults; set but malformed values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stockfish_path = lookup("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path);

        let analysis_depth =
            parse_var(&lookup, "ANALYSIS_DEPTH")?.unwrap_or(defaults.analysis_depth);

        let eval_timeout = parse_var::<u64, _>(&lookup, "EVAL_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.eval_timeout);

        let cache_dir = lookup("REVIEW_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let engine_threads =
            parse_var(&lookup, "ENGINE_THREADS")?.unwrap_or(defaults.engine_threads);
        let engine_hash_mb =
            parse_var(&lookup, "ENGINE_HASH_MB")?.unwrap_or(defaults.engine_hash_mb);
        let skill_level = parse_var(&lookup, "ENGINE_SKILL_LEVEL")?;

        if analysis_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "ANALYSIS_DEPTH",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            stockfish_path,
            analysis_depth,
            eval_timeout,
            cache_dir,
            engine_threads,
            engine_hash_mb,
            skill_level,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
