//! Feature encoding for cards and decks
//!
//! - `card`: raw card record → `CardFeatures` (pure, deterministic)
//! - `deck`: multiset of `CardFeatures` → `DeckFeatures`
//! - `themes`: compiled synergy-theme matchers + fallback keyword vocabulary

pub mod card;
pub mod deck;
pub mod themes;

// Re-export commonly used types
pub use card::{CardFeatureEncoder, CardFeatures, Color};
pub use deck::{aggregate_deck, DeckFeatures, CURVE_BUCKETS};
pub use themes::{ThemeMatchers, FALLBACK_KEYWORDS};
