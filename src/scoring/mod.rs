//! Candidate scoring
//!
//! - `weights`: typed weight configuration with documented defaults
//! - `synergy`: the deck-context synergy scorer

pub mod synergy;
pub mod weights;

// Re-export commonly used types
pub use synergy::SynergyScorer;
pub use weights::ScoringWeights;
