//! Deck Feature Aggregator
//!
//! Folds `(CardFeatures, quantity)` entries into deck-level features: mana
//! curve, color intensity, type counts, keyword and theme densities, and
//! subtype counts. Features are encoded once per distinct card; quantities
//! multiply its contribution.
//!
//! All ratio properties guard their denominators and return 0 when the deck
//! (or the relevant slice of it) is empty.

use crate::features::card::{CardFeatures, Color};
use rustc_hash::{FxHashMap, FxHashSet};

/// Number of mana-curve buckets: {0, 1, 2, 3, 4, 5, 6+}.
pub const CURVE_BUCKETS: usize = 7;

/// A subtype must reach this many copies before the deck has a dominant tribe.
const DOMINANT_TRIBE_THRESHOLD: u32 = 8;

/// A theme must reach this many cards before it counts as established.
const DOMINANT_THEME_THRESHOLD: u32 = 3;

/// Derived deck-level features.
#[derive(Debug, Clone, Default)]
pub struct DeckFeatures {
    pub card_count: u32,
    /// Average mana value over non-land cards; 0 when there are none.
    pub avg_cmc: f64,
    /// Fraction of non-land cards per curve bucket; sums to 1 when any exist.
    pub cmc_distribution: [f64; CURVE_BUCKETS],

    /// Summed colored pips, indexed in WUBRG order.
    pub color_intensity: [f64; 5],
    pub color_identity: FxHashSet<Color>,

    pub creature_count: u32,
    pub instant_count: u32,
    pub sorcery_count: u32,
    pub artifact_count: u32,
    pub enchantment_count: u32,
    pub planeswalker_count: u32,
    pub land_count: u32,

    pub keyword_presence: FxHashSet<String>,
    /// Keyword → number of copies carrying it.
    pub keyword_density: FxHashMap<String, u32>,
    /// Theme → number of cards expressing it.
    pub synergy_themes: FxHashMap<String, u32>,
    pub subtype_counts: FxHashMap<String, u32>,
}

impl DeckFeatures {
    /// Colors with any intensity at all.
    pub fn color_count(&self) -> usize {
        self.color_intensity.iter().filter(|i| **i > 0.0).count()
    }

    /// The deck's tribe, defined only when the top subtype count is at least 8.
    pub fn dominant_tribe(&self) -> Option<(&str, u32)> {
        self.subtype_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .filter(|(_, count)| **count >= DOMINANT_TRIBE_THRESHOLD)
            .map(|(name, count)| (name.as_str(), *count))
    }

    /// Themes expressed by at least 3 cards, sorted by count descending.
    pub fn dominant_themes(&self) -> Vec<&str> {
        let mut themes: Vec<(&str, u32)> = self
            .synergy_themes
            .iter()
            .filter(|(_, count)| **count >= DOMINANT_THEME_THRESHOLD)
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        themes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        themes.into_iter().map(|(name, _)| name).collect()
    }

    /// Creatures as a fraction of non-land cards; 0 for an all-land deck.
    pub fn creature_ratio(&self) -> f64 {
        let nonland = self.card_count.saturating_sub(self.land_count);
        if nonland == 0 {
            return 0.0;
        }
        self.creature_count as f64 / nonland as f64
    }

    /// Instants plus sorceries as a fraction of non-land cards.
    pub fn spell_ratio(&self) -> f64 {
        let nonland = self.card_count.saturating_sub(self.land_count);
        if nonland == 0 {
            return 0.0;
        }
        (self.instant_count + self.sorcery_count) as f64 / nonland as f64
    }

    /// Curve bucket for a mana value: 0..=5 map directly, 6+ shares a bucket.
    pub fn curve_bucket(mana_value: f64) -> usize {
        (mana_value.max(0.0) as usize).min(CURVE_BUCKETS - 1)
    }
}

/// Aggregate per-card features into deck features.
///
/// Each entry contributes `quantity` times to every count; CMC statistics
/// exclude lands entirely.
pub fn aggregate_deck(entries: &[(CardFeatures, u32)]) -> DeckFeatures {
    let mut deck = DeckFeatures::default();
    let mut curve_counts = [0u32; CURVE_BUCKETS];
    let mut cmc_sum = 0.0;
    let mut nonland_count = 0u32;

    for (features, quantity) in entries {
        let qty = *quantity;
        if qty == 0 {
            continue;
        }
        deck.card_count += qty;

        if features.is_land {
            deck.land_count += qty;
        } else {
            nonland_count += qty;
            cmc_sum += features.mana_value * qty as f64;
            curve_counts[DeckFeatures::curve_bucket(features.mana_value)] += qty;
        }

        if features.is_creature {
            deck.creature_count += qty;
        }
        if features.is_instant {
            deck.instant_count += qty;
        }
        if features.is_sorcery {
            deck.sorcery_count += qty;
        }
        if features.is_artifact {
            deck.artifact_count += qty;
        }
        if features.is_enchantment {
            deck.enchantment_count += qty;
        }
        if features.is_planeswalker {
            deck.planeswalker_count += qty;
        }

        for color in Color::ALL {
            deck.color_intensity[color.index()] +=
                features.color_pips[color.index()] as f64 * qty as f64;
        }
        for color in &features.color_identity {
            deck.color_identity.insert(*color);
        }

        for keyword in &features.keyword_abilities {
            deck.keyword_presence.insert(keyword.clone());
            *deck.keyword_density.entry(keyword.clone()).or_default() += qty;
        }
        for theme in &features.synergy_themes {
            *deck.synergy_themes.entry(theme.clone()).or_default() += qty;
        }
        for subtype in &features.subtypes {
            *deck.subtype_counts.entry(subtype.clone()).or_default() += qty;
        }
    }

    if nonland_count > 0 {
        deck.avg_cmc = cmc_sum / nonland_count as f64;
        for bucket in 0..CURVE_BUCKETS {
            deck.cmc_distribution[bucket] = curve_counts[bucket] as f64 / nonland_count as f64;
        }
    }

    deck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CardRecord;
    use crate::features::card::CardFeatureEncoder;
    use approx::assert_relative_eq;

    fn features(name: &str, mana_value: f64, type_line: &str, text: &str) -> CardFeatures {
        let encoder = CardFeatureEncoder::new(None);
        encoder.encode(&CardRecord {
            name: name.to_string(),
            mana_cost: String::new(),
            mana_value,
            type_line: type_line.to_string(),
            oracle_text: text.to_string(),
            power: None,
            toughness: None,
            color_identity: vec![],
            keywords: vec![],
            popularity_rank: None,
        })
    }

    #[test]
    fn test_lands_excluded_from_curve() {
        // 40 basic lands + 20 one-mana instants
        let entries = vec![
            (features("Island", 0.0, "Basic Land \u{2014} Island", ""), 40),
            (features("Opt", 1.0, "Instant", "Draw a card."), 20),
        ];
        let deck = aggregate_deck(&entries);

        assert_eq!(deck.card_count, 60);
        assert_eq!(deck.land_count, 40);
        assert_relative_eq!(deck.avg_cmc, 1.0, epsilon = 1e-9);
        assert_relative_eq!(deck.cmc_distribution[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cmc_distribution_sums_to_one() {
        let entries = vec![
            (features("A", 1.0, "Instant", ""), 3),
            (features("B", 3.0, "Sorcery", ""), 5),
            (features("C", 9.0, "Creature \u{2014} Dragon", ""), 2),
        ];
        let deck = aggregate_deck(&entries);

        let total: f64 = deck.cmc_distribution.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        // The 9-CMC dragons land in the 6+ bucket
        assert_relative_eq!(deck.cmc_distribution[6], 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_all_land_deck_has_zero_curve() {
        let entries = vec![(features("Wastes", 0.0, "Basic Land", ""), 60)];
        let deck = aggregate_deck(&entries);

        assert_eq!(deck.avg_cmc, 0.0);
        assert_eq!(deck.cmc_distribution.iter().sum::<f64>(), 0.0);
        assert_eq!(deck.creature_ratio(), 0.0);
        assert_eq!(deck.spell_ratio(), 0.0);
    }

    #[test]
    fn test_dominant_tribe_threshold() {
        let goblin = features("Goblin Raider", 2.0, "Creature \u{2014} Goblin", "");
        let deck = aggregate_deck(&[(goblin.clone(), 7)]);
        assert!(deck.dominant_tribe().is_none());

        let deck = aggregate_deck(&[(goblin, 8)]);
        assert_eq!(deck.dominant_tribe(), Some(("Goblin", 8)));
    }

    #[test]
    fn test_dominant_themes_threshold() {
        let miller = features(
            "Vexing Radgull",
            2.0,
            "Creature \u{2014} Bird",
            "When this creature enters, mill three cards.",
        );
        let deck = aggregate_deck(&[(miller.clone(), 2)]);
        assert!(deck.dominant_themes().is_empty());

        let deck = aggregate_deck(&[(miller, 3)]);
        assert_eq!(deck.dominant_themes(), vec!["mill"]);
    }

    #[test]
    fn test_zero_quantity_entries_ignored() {
        let entries = vec![(features("A", 1.0, "Instant", ""), 0)];
        let deck = aggregate_deck(&entries);
        assert_eq!(deck.card_count, 0);
    }
}
