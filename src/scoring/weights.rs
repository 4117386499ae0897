//! Scoring weight configuration
//!
//! One explicit, typed struct with named fields and documented defaults,
//! passed by value into the scoring functions. Serde-derived so a calibration
//! pass can ship alternative weight profiles as JSON without code changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Weights for the synergy scorer and the recommendation aggregator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per shared synergy theme between candidate and deck.
    pub theme_overlap: f64,
    /// Per shared subtype when the deck has no dominant tribe.
    pub subtype_overlap: f64,
    /// Per shared subtype matching the deck's dominant tribe.
    pub dominant_tribe_subtype: f64,
    /// Maximum curve-gap bonus (scaled by how under-filled the bucket is).
    pub curve_gap_max: f64,
    /// Per complementary keyword pair already represented in the deck.
    pub keyword_pair: f64,
    /// Bonus/penalty magnitude for nudging toward the target type balance.
    pub type_balance: f64,
    /// Target creature fraction of non-land cards.
    pub target_creature_ratio: f64,

    /// Multiplier applied to the synergy sub-score by the aggregator.
    pub synergy_scale: f64,
    /// Flat bonus when candidate text matches a deck archetype keyword.
    pub archetype_bonus: f64,
    /// Maximum popularity bonus (rank 1); decays to 0 at the saturation rank.
    pub popularity_max_bonus: f64,
    /// Popularity rank at which the bonus reaches 0.
    pub popularity_saturation_rank: u32,
    /// Maximum performance-tier bonus (tier S).
    pub tier_max_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            theme_overlap: 6.0,
            subtype_overlap: 2.0,
            dominant_tribe_subtype: 4.0,
            curve_gap_max: 5.0,
            keyword_pair: 1.5,
            type_balance: 2.0,
            target_creature_ratio: 0.55,
            synergy_scale: 1.0,
            archetype_bonus: 5.0,
            popularity_max_bonus: 8.0,
            popularity_saturation_rank: 50_000,
            tier_max_bonus: 6.0,
        }
    }
}

impl ScoringWeights {
    /// Load a weight profile from JSON; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read weight profile: {:?}", path))?;
        serde_json::from_str(&contents).with_context(|| "Failed to parse weight profile JSON")
    }
}
