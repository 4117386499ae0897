//! Recommendation Aggregator
//!
//! Merges the synergy sub-score with bounded external signals (archetype text
//! match, popularity rank, performance tier) into one ranked list of
//! `ScoredCandidate`s, deterministic under ties (score desc, then name asc).
//!
//! Full-deck suggestion lists are assembled round-robin across categories
//! (synergy / combo-enabling / staple / performance-backed) so no single
//! signal dominates the output.

use crate::combo_index::ComboIndex;
use crate::features::card::CardFeatures;
use crate::features::deck::DeckFeatures;
use crate::scoring::synergy::SynergyScorer;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Performance tier from the gameplay-statistics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PerfTier {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl PerfTier {
    /// Fraction of the maximum tier bonus this tier earns.
    fn bonus_factor(self) -> f64 {
        match self {
            PerfTier::S => 1.0,
            PerfTier::A => 0.8,
            PerfTier::B => 0.6,
            PerfTier::C => 0.4,
            PerfTier::D => 0.2,
            PerfTier::F => 0.0,
        }
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub name: String,
    pub score: f64,
    /// Human-readable reasons, in the order the sub-scores fired.
    pub reasons: Vec<String>,
    /// Performance tier, when the statistics source knows the card.
    pub tier: Option<PerfTier>,
    /// Number of known combos referencing this card.
    pub combo_count: usize,
    /// Observed gameplay lift alongside deck cards, filled in by the service
    /// layer when a statistics source reports one.
    pub synergy_lift: Option<f64>,
}

/// One candidate card offered to the aggregator.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub features: CardFeatures,
    /// Oracle text, used for the archetype-text bonus.
    pub text: String,
}

/// Shared cancellation flag checked between candidates.
///
/// Index builds are never cancelled (a half-built shared index is worse than
/// a slow one); only per-request scoring loops observe this flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A scoring loop observed its cancel flag.
#[derive(Debug, thiserror::Error)]
#[error("recommendation request cancelled")]
pub struct Cancelled;

/// Text needles that mark a candidate as on-archetype for a deck theme.
fn archetype_needles(theme: &str) -> &'static [&'static str] {
    match theme {
        "tokens" => &["token"],
        "sacrifice" => &["sacrifice"],
        "graveyard" => &["graveyard"],
        "counters" => &["+1/+1 counter", "proliferate"],
        "lifegain" => &["gain life", "lifelink"],
        "card_draw" => &["draw"],
        "spellslinger" => &["instant", "sorcery"],
        "landfall" => &["land"],
        "artifacts" => &["artifact"],
        "enchantments" => &["enchantment"],
        "mill" => &["mill"],
        "discard" => &["discard"],
        "reanimator" => &["graveyard to the battlefield"],
        "ramp" => &["search your library", "add"],
        "blink" => &["exile", "return"],
        "burn" => &["damage"],
        _ => &[],
    }
}

/// Merges synergy and external signals into ranked recommendations.
#[derive(Clone)]
pub struct RecommendationAggregator {
    scorer: SynergyScorer,
}

impl RecommendationAggregator {
    pub fn new(scorer: SynergyScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &SynergyScorer {
        &self.scorer
    }

    /// Score and rank a candidate pool against the deck.
    ///
    /// An empty pool is an empty result, not an error. The flag is checked
    /// once per candidate so an abandoned request stops within one card's
    /// worth of work.
    pub fn rank_candidates(
        &self,
        deck: &DeckFeatures,
        pool: &[Candidate],
        tiers: &FxHashMap<String, PerfTier>,
        combo_index: Option<&ComboIndex>,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<ScoredCandidate>, Cancelled> {
        let dominant_themes: Vec<&str> = deck.dominant_themes();
        let weights = *self.scorer.weights();

        let mut scored = pool
            .par_iter()
            .map(|candidate| {
                if cancel.is_cancelled() {
                    return Err(Cancelled);
                }

                let (synergy, mut reasons) = self.scorer.score_candidate(&candidate.features, deck);
                let mut score = synergy * weights.synergy_scale;

                // Archetype-text bonus: fixed amount, at most once
                let text_lower = candidate.text.to_lowercase();
                let archetype = dominant_themes.iter().find(|theme| {
                    archetype_needles(theme)
                        .iter()
                        .any(|needle| text_lower.contains(needle))
                });
                if let Some(theme) = archetype {
                    score += weights.archetype_bonus;
                    reasons.push(format!("Matches the deck's '{}' archetype", theme));
                }

                // Popularity bonus: monotone decreasing in rank, saturating
                // at 0 for unranked or very unpopular cards
                let popularity = popularity_bonus(
                    candidate.features.popularity_rank,
                    weights.popularity_max_bonus,
                    weights.popularity_saturation_rank,
                );
                if popularity > 0.0 {
                    score += popularity;
                    reasons.push("Widely played".to_string());
                }

                // Performance-tier bonus: neutral when the source is missing
                let tier = tiers.get(&candidate.features.name).copied();
                if let Some(tier) = tier {
                    let bonus = weights.tier_max_bonus * tier.bonus_factor();
                    if bonus > 0.0 {
                        score += bonus;
                        reasons.push(format!("Performance tier {:?}", tier));
                    }
                }

                let combo_count = combo_index
                    .map(|index| index.combo_count_for_card(&candidate.features.name))
                    .unwrap_or(0);

                Ok(ScoredCandidate {
                    name: candidate.features.name.clone(),
                    score,
                    reasons,
                    tier,
                    combo_count,
                    synergy_lift: None,
                })
            })
            .collect::<Result<Vec<_>, Cancelled>>()?;

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Build a full-deck suggestion list.
    ///
    /// The round-robin across categories (synergy / combo-enabling / staple /
    /// performance-backed) decides which cards make the cut, so no single
    /// signal dominates the selection; the picked set is then sorted like any
    /// other ranking (score desc, then name asc). Each card has one canonical
    /// scored entry no matter which category selected it.
    pub fn build_suggestions(
        &self,
        deck: &DeckFeatures,
        deck_names: &[String],
        pool: &[Candidate],
        tiers: &FxHashMap<String, PerfTier>,
        combo_index: Option<&ComboIndex>,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<ScoredCandidate>, Cancelled> {
        let synergy = self.rank_candidates(deck, pool, tiers, combo_index, pool.len(), cancel)?;
        let combo_enabling = combo_enabling_candidates(deck_names, combo_index, tiers);

        // Canonical entry per card: the aggregate-ranked entry for pool
        // cards, the combo-derived entry for missing pieces outside the pool.
        // Pool cards that also complete combos keep their aggregate score and
        // pick up the combo reason.
        let mut canonical: FxHashMap<String, ScoredCandidate> = synergy
            .iter()
            .map(|c| (c.name.to_lowercase(), c.clone()))
            .collect();
        for combo_candidate in &combo_enabling {
            let key = combo_candidate.name.to_lowercase();
            match canonical.get_mut(&key) {
                Some(entry) => entry
                    .reasons
                    .extend(combo_candidate.reasons.iter().cloned()),
                None => {
                    canonical.insert(key, combo_candidate.clone());
                }
            }
        }

        let synergy_order: Vec<String> = synergy.iter().map(|c| c.name.clone()).collect();
        let combo_order: Vec<String> = combo_enabling.iter().map(|c| c.name.clone()).collect();
        let staples = staple_order(pool);
        let performance = performance_order(pool, tiers);

        let deck_set: FxHashSet<String> = deck_names.iter().map(|n| n.to_lowercase()).collect();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut picked: Vec<ScoredCandidate> = Vec::with_capacity(limit);

        let categories: [&[String]; 4] = [&synergy_order, &combo_order, &staples, &performance];
        let mut cursors = [0usize; 4];

        while picked.len() < limit {
            let mut advanced = false;
            for (category, cursor) in categories.iter().zip(cursors.iter_mut()) {
                if picked.len() >= limit {
                    break;
                }
                while *cursor < category.len() {
                    let key = category[*cursor].to_lowercase();
                    *cursor += 1;
                    if deck_set.contains(&key) || !seen.insert(key.clone()) {
                        continue;
                    }
                    if let Some(entry) = canonical.get(&key) {
                        picked.push(entry.clone());
                        advanced = true;
                    }
                    break;
                }
            }
            if !advanced {
                break;
            }
        }

        picked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(picked)
    }
}

/// Popularity bonus: linear decay from the maximum at rank 1 down to 0 at the
/// saturation rank; unranked cards get nothing.
fn popularity_bonus(rank: Option<u32>, max_bonus: f64, saturation_rank: u32) -> f64 {
    let Some(rank) = rank else {
        return 0.0;
    };
    if saturation_rank == 0 {
        return 0.0;
    }
    let fraction = 1.0 - (rank as f64 / saturation_rank as f64);
    (max_bonus * fraction).max(0.0)
}

/// Missing combo pieces for the deck, scored by combo desirability.
fn combo_enabling_candidates(
    deck_names: &[String],
    combo_index: Option<&ComboIndex>,
    tiers: &FxHashMap<String, PerfTier>,
) -> Vec<ScoredCandidate> {
    let Some(index) = combo_index else {
        return Vec::new();
    };

    let (matches, _) = index.find_missing_pieces(deck_names, 1, 1, None);

    let mut candidates = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for combo_match in &matches {
        for missing in &combo_match.missing_cards {
            if !seen.insert(missing.to_lowercase()) {
                continue;
            }
            let combo_score = index.get_combo_score(&combo_match.combo);
            candidates.push(ScoredCandidate {
                name: missing.clone(),
                score: combo_score / 10.0,
                reasons: vec![format!(
                    "Completes a {}-card combo ({} of {} pieces in deck)",
                    combo_match.combo.cards.len(),
                    combo_match.present_cards.len(),
                    combo_match.combo.cards.len()
                )],
                tier: tiers.get(missing).copied(),
                combo_count: index.combo_count_for_card(missing),
                synergy_lift: None,
            });
        }
    }
    // matches are already ordered by (popularity, completion); keep that
    candidates
}

/// Pool cards with an external popularity rank, most popular first.
fn staple_order(pool: &[Candidate]) -> Vec<String> {
    let mut ranked: Vec<&Candidate> = pool
        .iter()
        .filter(|c| c.features.popularity_rank.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        a.features
            .popularity_rank
            .cmp(&b.features.popularity_rank)
            .then_with(|| a.features.name.cmp(&b.features.name))
    });
    ranked.into_iter().map(|c| c.features.name.clone()).collect()
}

/// Pool cards with strong performance tiers (S/A/B), best first.
fn performance_order(pool: &[Candidate], tiers: &FxHashMap<String, PerfTier>) -> Vec<String> {
    let mut backed: Vec<(&Candidate, PerfTier)> = pool
        .iter()
        .filter_map(|c| {
            tiers
                .get(&c.features.name)
                .filter(|t| **t <= PerfTier::B)
                .map(|t| (c, *t))
        })
        .collect();
    backed.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.features.name.cmp(&b.0.features.name)));
    backed
        .into_iter()
        .map(|(c, _)| c.features.name.clone())
        .collect()
}
