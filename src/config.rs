//! Declared configuration record, loaded from environment and optional YAML.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{BuilderError, BuilderResult};

/// Global configuration instance, lazily initialized on first access.
static CONFIG: RwLock<Option<BuilderConfig>> = RwLock::new(None);

/// Top-level builder configuration: a struct-of-structs record, never a dict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub tree: TreeConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Completion call deadline (`completion_call_timeout_s`, default 120s).
    #[serde(default = "default_completion_timeout")]
    pub completion_call_timeout_s: u64,
    /// Retry cap for transient failures (10 attempts, capped backoff).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff ceiling in seconds (up to 60s).
    #[serde(default = "default_backoff_cap_s")]
    pub backoff_cap_s: u64,
    /// Default model identifier used for prompt templates.
    #[serde(default = "default_model")]
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Snippets requested per search call (up to 5).
    #[serde(default = "default_snippets_per_call")]
    pub snippets_per_call: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_top_k")]
    pub top_k_answers_per_doc: usize,
    #[serde(default = "default_breadth_cap")]
    pub breadth_cap_parallel: usize,
    /// Fixed at 2; not exposed via env override.
    #[serde(default = "default_depth_cap")]
    pub depth_cap: u8,
    #[serde(default = "default_similarity_threshold")]
    pub semantic_similarity_reject_threshold: f64,
    #[serde(default = "default_keyword_min")]
    pub keyword_min: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Bounded queue depth gating tree submissions (default 32).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Regeneration attempts before a candidate is abandoned (default 3).
    #[serde(default = "default_regeneration_attempts")]
    pub regeneration_attempts: u32,
    /// Max layer-2 series extensions per layer-1 parent (cap 2).
    #[serde(default = "default_series_depth_cap")]
    pub series_depth_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_completion_timeout() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    10
}
fn default_backoff_cap_s() -> u64 {
    60
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_snippets_per_call() -> usize {
    5
}
fn default_top_k() -> usize {
    5
}
fn default_breadth_cap() -> usize {
    3
}
fn default_depth_cap() -> u8 {
    2
}
fn default_similarity_threshold() -> f64 {
    0.30
}
fn default_keyword_min() -> usize {
    2
}
fn default_worker_count() -> usize {
    1
}
fn default_queue_capacity() -> usize {
    32
}
fn default_regeneration_attempts() -> u32 {
    3
}
fn default_series_depth_cap() -> usize {
    2
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                completion_call_timeout_s: default_completion_timeout(),
                max_retries: default_max_retries(),
                backoff_cap_s: default_backoff_cap_s(),
                default_model: default_model(),
            },
            search: SearchConfig {
                snippets_per_call: default_snippets_per_call(),
            },
            tree: TreeConfig {
                top_k_answers_per_doc: default_top_k(),
                breadth_cap_parallel: default_breadth_cap(),
                depth_cap: default_depth_cap(),
                semantic_similarity_reject_threshold: default_similarity_threshold(),
                keyword_min: default_keyword_min(),
                worker_count: default_worker_count(),
                queue_capacity: default_queue_capacity(),
                regeneration_attempts: default_regeneration_attempts(),
                series_depth_cap: default_series_depth_cap(),
            },
            sink: SinkConfig {
                output_dir: default_output_dir(),
            },
        }
    }
}

fn default_output_dir() -> String {
    "./output".to_string()
}

impl BuilderConfig {
    /// Load configuration, preferring `TREE_BUILDER_CONFIG_PATH` if set, then
    /// falling back to defaults with environment overrides applied.
    pub fn load() -> BuilderResult<Self> {
        if let Ok(config_path) = env::var("TREE_BUILDER_CONFIG_PATH") {
            Self::from_file(&config_path)
        } else if Path::new("config/tree-builder.yaml").exists() {
            Self::from_file("config/tree-builder.yaml")
        } else {
            Ok(Self::from_env(Self::default()))
        }
    }

    pub fn from_file(path: &str) -> BuilderResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BuilderError::ConfigurationError(format!("failed to read config file: {e}")))?;
        let config: BuilderConfig = serde_yaml::from_str(&content)
            .map_err(|e| BuilderError::ConfigurationError(format!("failed to parse config: {e}")))?;
        Ok(Self::from_env(config))
    }

    /// Apply environment variable overrides on top of a base configuration.
    pub fn from_env(mut config: BuilderConfig) -> Self {
        if let Ok(v) = env::var("COMPLETION_CALL_TIMEOUT_S") {
            if let Ok(secs) = v.parse() {
                config.llm.completion_call_timeout_s = secs;
            }
        }
        if let Ok(v) = env::var("TREE_TOP_K_ANSWERS_PER_DOC") {
            if let Ok(n) = v.parse() {
                config.tree.top_k_answers_per_doc = n;
            }
        }
        if let Ok(v) = env::var("TREE_BREADTH_CAP_PARALLEL") {
            if let Ok(n) = v.parse() {
                config.tree.breadth_cap_parallel = n;
            }
        }
        if let Ok(v) = env::var("TREE_SEMANTIC_SIMILARITY_THRESHOLD") {
            if let Ok(f) = v.parse() {
                config.tree.semantic_similarity_reject_threshold = f;
            }
        }
        if let Ok(v) = env::var("TREE_KEYWORD_MIN") {
            if let Ok(n) = v.parse() {
                config.tree.keyword_min = n;
            }
        }
        if let Ok(v) = env::var("TREE_WORKER_COUNT") {
            if let Ok(n) = v.parse() {
                config.tree.worker_count = n;
            }
        }
        if let Ok(v) = env::var("TREE_OUTPUT_DIR") {
            config.sink.output_dir = v;
        }
        // depth_cap is intentionally not overridable: fixed at 2.
        config
    }

    /// Verify that at least one recognized LLM credential is present.
    pub fn require_credentials() -> BuilderResult<()> {
        let has_openai = env::var("OPENAI_API_KEY").map(|v| !v.is_empty()).unwrap_or(false);
        let has_anthropic = env::var("ANTHROPIC_API_KEY")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        if has_openai || has_anthropic {
            Ok(())
        } else {
            Err(BuilderError::MissingCredentials)
        }
    }

    /// Get (initializing if necessary) the global configuration instance.
    pub fn global() -> BuilderResult<BuilderConfig> {
        {
            let guard = CONFIG
                .read()
                .map_err(|e| BuilderError::ConfigurationError(format!("config lock poisoned: {e}")))?;
            if let Some(ref config) = *guard {
                return Ok(config.clone());
            }
        }
        Self::initialize()
    }

    /// Load and install the global configuration.
    pub fn initialize() -> BuilderResult<BuilderConfig> {
        let config = Self::load()?;
        let mut guard = CONFIG
            .write()
            .map_err(|e| BuilderError::ConfigurationError(format!("config lock poisoned: {e}")))?;
        *guard = Some(config.clone());
        Ok(config)
    }
}
