//! Environment configuration
//!
//! Every tunable is optional with a documented default; misconfiguration
//! that would corrupt data (bad weights, zero dimensions) is fatal at
//! startup rather than surfaced later.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreWeights, DEFAULT_DECAY_RATE};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Fatal configuration error; the process exits non-zero on these
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid score weights (must be non-negative with a positive sum): {0:?}")]
    InvalidWeights(ScoreWeights),
    #[error("embedding dimensions must be positive")]
    ZeroDimensions,
    #[error("event queue capacity must be positive")]
    ZeroQueueCapacity,
    #[error("max batch size must be in 1..={max}, got {got}")]
    BatchSizeOutOfRange { got: usize, max: usize },
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

// ============================================================================
// CONFIG
// ============================================================================

/// Hard upper bound on the consolidation batch size
pub const BATCH_SIZE_HARD_CAP: usize = 10;

/// Process-wide configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngramConfig {
    // ========== Surfaces ==========
    /// HTTP bind address for the API server
    pub http_addr: String,
    /// Path prefix for the journal API
    pub api_prefix: String,

    // ========== Upstreams ==========
    /// Qdrant-compatible vector store endpoint
    pub qdrant_url: String,
    /// Ollama-compatible model endpoint
    pub ollama_url: String,
    /// Embedding model name
    pub embedding_model: String,
    /// Embedding dimensionality; fixed at collection creation
    pub embedding_dimensions: usize,
    /// Generative model name used for consolidation
    pub generative_model: String,

    // ========== Timeouts ==========
    pub embed_timeout: Duration,
    pub llm_timeout: Duration,
    pub store_timeout: Duration,
    pub drain_timeout: Duration,

    // ========== Processor ==========
    /// Bounded event queue capacity; overflow drops the event
    pub queue_capacity: usize,
    /// Captures processed between threshold-triggered consolidations
    pub consolidation_threshold: usize,

    // ========== Associations ==========
    /// Temporal analysis window
    pub temporal_window: Duration,
    /// Causal analysis window
    pub causal_window: Duration,
    /// Contextual (same-session) analysis window
    pub session_window: Duration,
    /// Semantic analysis k-NN limit
    pub semantic_limit: usize,
    /// Semantic analysis minimum similarity
    pub semantic_threshold: f32,
    /// Minimum strength for any stored association
    pub min_association_strength: f32,
    /// Outgoing-edge cap per memory; overflow evicts the weakest edge
    pub max_associations_per_memory: usize,
    /// Lexical phrases that mark a capture as a causal effect
    pub causal_triggers: Vec<String>,

    // ========== Consolidation ==========
    /// Recent episodic memories examined per consolidation
    pub candidate_limit: usize,
    /// Association strength for two candidates to share a group
    pub group_threshold: f32,
    /// Maximum memories per generative invocation
    pub max_batch_size: usize,
    /// Context-window token budget for one prompt
    pub token_budget: usize,
    /// Delete source episodic memories after a successful batch
    pub delete_sources_after_consolidation: bool,

    // ========== Scoring ==========
    pub decay_rate: f64,
    pub score_weights: ScoreWeights,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8543".to_string(),
            api_prefix: "/api/v1".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            generative_model: "llama3.1".to_string(),
            embed_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(60),
            store_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
            queue_capacity: 1000,
            consolidation_threshold: 50,
            temporal_window: Duration::from_secs(3600),
            causal_window: Duration::from_secs(7200),
            session_window: Duration::from_secs(86400),
            semantic_limit: 10,
            semantic_threshold: 0.7,
            min_association_strength: 0.3,
            max_associations_per_memory: 50,
            causal_triggers: default_causal_triggers(),
            candidate_limit: 200,
            group_threshold: 0.7,
            max_batch_size: 5,
            token_budget: 8192,
            delete_sources_after_consolidation: false,
            decay_rate: DEFAULT_DECAY_RATE,
            score_weights: ScoreWeights::default(),
        }
    }
}

fn default_causal_triggers() -> Vec<String> {
    [
        "because",
        "therefore",
        "due to",
        "as a result",
        "caused",
        "led to",
        "so that",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl EngramConfig {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            http_addr: env_string("ENGRAM_HTTP_ADDR", defaults.http_addr),
            api_prefix: env_string("ENGRAM_API_PREFIX", defaults.api_prefix),
            qdrant_url: env_string("ENGRAM_QDRANT_URL", defaults.qdrant_url),
            ollama_url: env_string("ENGRAM_OLLAMA_URL", defaults.ollama_url),
            embedding_model: env_string("ENGRAM_EMBEDDING_MODEL", defaults.embedding_model),
            embedding_dimensions: env_parse(
                "ENGRAM_EMBEDDING_DIMENSIONS",
                defaults.embedding_dimensions,
            ),
            generative_model: env_string("ENGRAM_GENERATIVE_MODEL", defaults.generative_model),
            embed_timeout: env_secs("ENGRAM_EMBED_TIMEOUT_SECS", defaults.embed_timeout),
            llm_timeout: env_secs("ENGRAM_LLM_TIMEOUT_SECS", defaults.llm_timeout),
            store_timeout: env_secs("ENGRAM_STORE_TIMEOUT_SECS", defaults.store_timeout),
            drain_timeout: env_secs("ENGRAM_DRAIN_TIMEOUT_SECS", defaults.drain_timeout),
            queue_capacity: env_parse("ENGRAM_QUEUE_CAPACITY", defaults.queue_capacity),
            consolidation_threshold: env_parse(
                "ENGRAM_CONSOLIDATION_THRESHOLD",
                defaults.consolidation_threshold,
            ),
            temporal_window: env_secs("ENGRAM_TEMPORAL_WINDOW_SECS", defaults.temporal_window),
            causal_window: env_secs("ENGRAM_CAUSAL_WINDOW_SECS", defaults.causal_window),
            session_window: env_secs("ENGRAM_SESSION_WINDOW_SECS", defaults.session_window),
            semantic_limit: env_parse("ENGRAM_SEMANTIC_LIMIT", defaults.semantic_limit),
            semantic_threshold: env_parse("ENGRAM_SEMANTIC_THRESHOLD", defaults.semantic_threshold),
            min_association_strength: env_parse(
                "ENGRAM_MIN_ASSOC_STRENGTH",
                defaults.min_association_strength,
            ),
            max_associations_per_memory: env_parse(
                "ENGRAM_MAX_ASSOCIATIONS",
                defaults.max_associations_per_memory,
            ),
            causal_triggers: env_list("ENGRAM_CAUSAL_TRIGGERS", defaults.causal_triggers),
            candidate_limit: env_parse("ENGRAM_CANDIDATE_LIMIT", defaults.candidate_limit),
            group_threshold: env_parse("ENGRAM_GROUP_THRESHOLD", defaults.group_threshold),
            max_batch_size: env_parse("ENGRAM_MAX_BATCH_SIZE", defaults.max_batch_size),
            token_budget: env_parse("ENGRAM_TOKEN_BUDGET", defaults.token_budget),
            delete_sources_after_consolidation: env_parse(
                "ENGRAM_DELETE_SOURCES",
                defaults.delete_sources_after_consolidation,
            ),
            decay_rate: env_parse("ENGRAM_DECAY_RATE", defaults.decay_rate),
            score_weights: ScoreWeights {
                time: env_parse("ENGRAM_WEIGHT_TIME", defaults.score_weights.time),
                frequency: env_parse("ENGRAM_WEIGHT_FREQ", defaults.score_weights.frequency),
                association: env_parse("ENGRAM_WEIGHT_ASSOC", defaults.score_weights.association),
                relevance: env_parse("ENGRAM_WEIGHT_REL", defaults.score_weights.relevance),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would corrupt data or deadlock the system
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.score_weights.is_valid() {
            return Err(ConfigError::InvalidWeights(self.score_weights));
        }
        if self.embedding_dimensions == 0 {
            return Err(ConfigError::ZeroDimensions);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_batch_size == 0 || self.max_batch_size > BATCH_SIZE_HARD_CAP {
            return Err(ConfigError::BatchSizeOutOfRange {
                got: self.max_batch_size,
                max: BATCH_SIZE_HARD_CAP,
            });
        }
        Ok(())
    }
}

// ============================================================================
// ENV HELPERS
// ============================================================================

fn env_string(var: &str, default: String) -> String {
    std::env::var(var).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_list(var: &str, default: Vec<String>) -> Vec<String> {
    std::env::var(var)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .filter(|list: &Vec<String>| !list.is_empty())
        .unwrap_or(default)
}

// ============================================================================
// TESTS
// ============================================================================
