//! Synergy Scorer
//!
//! Stateless scoring of one candidate card against deck-level features. The
//! score is a sum of independently computed sub-scores (theme overlap, tribal
//! overlap, curve-gap fit, keyword co-occurrence, type balance); each
//! sub-score that fires appends a human-readable reason.
//!
//! Lands return `(0.0, [])` immediately: land selection is a slot-filling
//! concern, not a synergy one. External signals (popularity, performance
//! tiers, archetype text) are the aggregator's job; nothing here consults
//! them.

use crate::features::card::CardFeatures;
use crate::features::deck::{DeckFeatures, CURVE_BUCKETS};
use crate::scoring::weights::ScoringWeights;

/// Fraction of non-land slots an idealized curve puts in each bucket
/// {0,1,2,3,4,5,6+}. Used to spot under-represented buckets.
const IDEAL_CURVE: [f64; CURVE_BUCKETS] = [0.04, 0.14, 0.20, 0.20, 0.16, 0.12, 0.14];

/// A theme needs this many cards before the candidate can overlap with it.
const ESTABLISHED_THEME_THRESHOLD: u32 = 2;

/// Keyword pairs that play well together in either direction.
const KEYWORD_COMBOS: &[(&str, &str)] = &[
    ("deathtouch", "first strike"),
    ("deathtouch", "trample"),
    ("lifelink", "vigilance"),
    ("flying", "vigilance"),
    ("menace", "haste"),
    ("hexproof", "ward"),
];

/// Stateless candidate-vs-deck scorer.
#[derive(Clone)]
pub struct SynergyScorer {
    weights: ScoringWeights,
}

impl SynergyScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a candidate against the deck. Returns `(score ≥ 0, reasons)`.
    pub fn score_candidate(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
    ) -> (f64, Vec<String>) {
        if candidate.is_land {
            return (0.0, Vec::new());
        }

        let mut score = 0.0;
        let mut reasons = Vec::new();

        score += self.theme_overlap(candidate, deck, &mut reasons);
        score += self.tribal_overlap(candidate, deck, &mut reasons);
        score += self.curve_gap_fit(candidate, deck, &mut reasons);
        score += self.keyword_cooccurrence(candidate, deck, &mut reasons);
        score += self.type_balance(candidate, deck, &mut reasons);

        (score.max(0.0), reasons)
    }

    /// Fixed weight per synergy theme shared with the deck's established
    /// themes (2+ cards already expressing it).
    fn theme_overlap(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let mut shared: Vec<(&str, u32)> = candidate
            .synergy_themes
            .iter()
            .filter_map(|theme| {
                deck.synergy_themes
                    .get(theme)
                    .filter(|count| **count >= ESTABLISHED_THEME_THRESHOLD)
                    .map(|count| (theme.as_str(), *count))
            })
            .collect();
        shared.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut bonus = 0.0;
        for (theme, count) in shared {
            bonus += self.weights.theme_overlap;
            reasons.push(format!("Shares '{}' theme with {} cards", theme, count));
        }
        bonus
    }

    /// Per shared subtype; larger when the deck already shows a dominant
    /// tribe and the candidate belongs to it.
    fn tribal_overlap(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let dominant = deck.dominant_tribe();

        let mut bonus = 0.0;
        for subtype in &candidate.subtypes {
            let Some(count) = deck.subtype_counts.get(subtype) else {
                continue;
            };

            if dominant.map_or(false, |(tribe, _)| tribe == subtype.as_str()) {
                bonus += self.weights.dominant_tribe_subtype;
                reasons.push(format!(
                    "Joins the deck's dominant {} tribe ({} cards)",
                    subtype, count
                ));
            } else {
                bonus += self.weights.subtype_overlap;
                reasons.push(format!("Shares {} type with {} cards", subtype, count));
            }
        }
        bonus
    }

    /// Proportional bonus when the candidate's mana value lands in a curve
    /// bucket the deck under-fills relative to the ideal shape.
    fn curve_gap_fit(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let bucket = DeckFeatures::curve_bucket(candidate.mana_value);
        let deficit = IDEAL_CURVE[bucket] - deck.cmc_distribution[bucket];
        if deficit <= 0.0 {
            return 0.0;
        }

        let bonus = self.weights.curve_gap_max * (deficit / IDEAL_CURVE[bucket]).min(1.0);
        let label = if bucket == CURVE_BUCKETS - 1 {
            "6+".to_string()
        } else {
            bucket.to_string()
        };
        reasons.push(format!("Fills a gap at {} mana in the curve", label));
        bonus
    }

    /// Small fixed bonus per keyword pair where the candidate brings one half
    /// and the deck already has the complement.
    fn keyword_cooccurrence(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let mut bonus = 0.0;
        for (a, b) in KEYWORD_COMBOS {
            let forward =
                candidate.keyword_abilities.contains(*a) && deck.keyword_presence.contains(*b);
            let backward =
                candidate.keyword_abilities.contains(*b) && deck.keyword_presence.contains(*a);
            if forward || backward {
                bonus += self.weights.keyword_pair;
                let (brings, has) = if forward { (*a, *b) } else { (*b, *a) };
                reasons.push(format!("{} pairs with the deck's {}", brings, has));
            }
        }
        bonus
    }

    /// Nudge toward the target creature/spell balance: a bonus when the
    /// candidate's type moves the deck toward the target, a half-magnitude
    /// penalty when it moves it further away.
    fn type_balance(
        &self,
        candidate: &CardFeatures,
        deck: &DeckFeatures,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let ratio = deck.creature_ratio();
        let target = self.weights.target_creature_ratio;

        if ratio < target && candidate.is_creature {
            reasons.push("Deck wants more creatures".to_string());
            self.weights.type_balance
        } else if ratio > target && !candidate.is_creature {
            reasons.push("Deck wants more non-creature spells".to_string());
            self.weights.type_balance
        } else {
            -self.weights.type_balance * 0.5
        }
    }
}
