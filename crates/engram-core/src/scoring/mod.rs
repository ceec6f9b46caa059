//! Memory Scoring
//!
//! Ranks memories by recency, access frequency, connectedness, and (during
//! a query) similarity. Scores are pure functions of memory state at
//! computation time; nothing here is persisted, so stored records can never
//! drift from the arithmetic.
//!
//! - `decay_factor = exp(-k_decay * age_hours / 24)`
//! - `freq_score  = ln(1 + access_count) / 10`, clamped to [0, 1]
//! - `assoc_score = ln(1 + assoc_count) / 10`, clamped to [0, 1]
//! - `composite   = w_time*decay + w_freq*freq + w_assoc*assoc + w_rel*relevance`

use serde::{Deserialize, Serialize};

use crate::memory::Memory;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default recency decay rate per day
pub const DEFAULT_DECAY_RATE: f64 = 0.1;

/// Log dampening divisor for frequency and connectedness
const LOG_SCALE: f64 = 10.0;

// ============================================================================
// WEIGHTS
// ============================================================================

/// Composite score weights
///
/// The configured defaults (0.3 / 0.3 / 0.4 / 0.3) intentionally sum past
/// 1.0 and are renormalized by [`ScoreWeights::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub time: f64,
    pub frequency: f64,
    pub association: f64,
    pub relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            time: 0.3,
            frequency: 0.3,
            association: 0.4,
            relevance: 0.3,
        }
    }
}

impl ScoreWeights {
    /// Sum of all four weights
    pub fn sum(&self) -> f64 {
        self.time + self.frequency + self.association + self.relevance
    }

    /// True when every weight is non-negative and the sum is meaningful
    pub fn is_valid(&self) -> bool {
        let all_non_negative = self.time >= 0.0
            && self.frequency >= 0.0
            && self.association >= 0.0
            && self.relevance >= 0.0;
        all_non_negative && self.sum() > f64::EPSILON
    }

    /// Renormalize so the weights sum to 1.0
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        Self {
            time: self.time / sum,
            frequency: self.frequency / sum,
            association: self.association / sum,
            relevance: self.relevance / sum,
        }
    }
}

// ============================================================================
// SCORE
// ============================================================================

/// A computed score snapshot for one memory
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryScore {
    /// Recency component in (0, 1]
    pub decay_factor: f64,
    /// Access-frequency component in [0, 1]
    pub frequency_score: f64,
    /// Connectedness component in [0, 1]
    pub association_score: f64,
    /// k-NN similarity; 0 outside a query
    pub relevance_score: f64,
    /// Weighted sum of the normalized components
    pub composite: f64,
}

/// Recency decay in (0, 1]: fresh memories score 1, halving roughly every
/// `24 * ln(2) / decay_rate` hours
pub fn decay_factor(age_hours: f64, decay_rate: f64) -> f64 {
    (-decay_rate * age_hours.max(0.0) / 24.0).exp().clamp(0.0, 1.0)
}

/// Log-dampened access frequency in [0, 1]
pub fn frequency_score(access_count: u32) -> f64 {
    ((1.0 + access_count as f64).ln() / LOG_SCALE).clamp(0.0, 1.0)
}

/// Log-dampened connectedness in [0, 1]
pub fn association_score(assoc_count: usize) -> f64 {
    ((1.0 + assoc_count as f64).ln() / LOG_SCALE).clamp(0.0, 1.0)
}

/// Compute the full score for a memory
///
/// `assoc_count` is the current number of outgoing edges; `relevance` is the
/// k-NN similarity when scoring inside a query, 0.0 otherwise.
pub fn score_memory(
    memory: &Memory,
    assoc_count: usize,
    relevance: f32,
    decay_rate: f64,
    weights: &ScoreWeights,
) -> MemoryScore {
    let weights = weights.normalized();
    let decay = decay_factor(memory.age_hours(chrono::Utc::now()), decay_rate);
    let frequency = frequency_score(memory.access_count);
    let association = association_score(assoc_count);
    let relevance = (relevance as f64).clamp(0.0, 1.0);

    MemoryScore {
        decay_factor: decay,
        frequency_score: frequency,
        association_score: association,
        relevance_score: relevance,
        composite: weights.time * decay
            + weights.frequency * frequency
            + weights.association * association
            + weights.relevance * relevance,
    }
}

// ============================================================================
// TESTS
// ============================================================================
