//! Deck Advisor
//!
//! Recommendation engine for trading-card decks: text similarity over the
//! card corpus, combo-completion matching, and deck-context synergy scoring,
//! fronted by an async service.
//!
//! Layout:
//! - `data`: corpus loading (parquet/CSV) and the keyword vocabulary
//! - `features`: per-card encoding and deck-level aggregation
//! - `similarity`: TF-IDF / cosine text similarity index
//! - `combo_index`: inverted index over the combo dataset
//! - `scoring`: synergy scorer and weight configuration
//! - `recommend`: score aggregation and suggestion assembly
//! - `service`: the async `DeckAdvisor` facade and its collaborator traits

pub mod combo_index;
pub mod data;
pub mod features;
pub mod recommend;
pub mod scoring;
pub mod service;
pub mod similarity;

// Re-export the main entry points
pub use combo_index::{Bracket, Combo, ComboIndex, ComboMatch};
pub use data::{load_keyword_vocabulary, CardCatalog, CardRecord};
pub use features::{aggregate_deck, CardFeatureEncoder, CardFeatures, Color, DeckFeatures};
pub use recommend::{CancelFlag, Candidate, PerfTier, RecommendationAggregator, ScoredCandidate};
pub use scoring::{ScoringWeights, SynergyScorer};
pub use service::{
    AdvisorConfig, AdvisorError, CardDatabase, CatalogDatabase, DeckAdvisor, DeckReport,
    GameplayStats, SearchFilters, SynergyPair,
};
pub use similarity::TextSimilarityIndex;
