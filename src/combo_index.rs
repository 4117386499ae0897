//! Combo Index
//!
//! Inverted index over the static combo dataset: lowercased card name →
//! combo ids. Queries find combos a deck is close to completing without ever
//! scanning the full combo set, and a 0-100 desirability score summarizes
//! how much a combo is worth chasing.
//!
//! A missing dataset file is a degraded state, not an error: `is_available`
//! turns false and every query returns empty results / zero scores.

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse power-level tag for a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bracket {
    Casual,
    Mid,
    High,
    Cedh,
}

impl Bracket {
    /// Fixed contribution to the desirability score (max 30).
    fn score(self) -> f64 {
        match self {
            Bracket::Casual => 5.0,
            Bracket::Mid => 12.0,
            Bracket::High => 22.0,
            Bracket::Cedh => 30.0,
        }
    }

    /// Parse a dataset tag; unknown tags degrade to `Casual` rather than
    /// failing the whole load.
    pub fn parse(tag: &str) -> Bracket {
        match tag.to_lowercase().as_str() {
            "cedh" => Bracket::Cedh,
            "high" => Bracket::High,
            "mid" | "medium" => Bracket::Mid,
            _ => Bracket::Casual,
        }
    }
}

/// One combo from the static dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combo {
    pub id: String,
    /// Constituent card names, in dataset order.
    pub cards: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_bracket")]
    pub bracket: Bracket,
    #[serde(default)]
    pub popularity: u64,
    #[serde(default)]
    pub color_identity: String,
    /// Effect labels, e.g. "Win the game" or "Infinite mana".
    #[serde(default)]
    pub produces: Vec<String>,
}

fn default_bracket() -> Bracket {
    Bracket::Casual
}

/// One combo matched against a deck.
#[derive(Debug, Clone, Serialize)]
pub struct ComboMatch {
    pub combo: Combo,
    pub present_cards: Vec<String>,
    pub missing_cards: Vec<String>,
    /// |present| / |combo.cards|, in [0, 1].
    pub completion_ratio: f64,
}

/// Ordered win-effect keywords with their score contribution (max 20).
/// First matching keyword wins; contributions are not cumulative.
const WIN_KEYWORDS: &[(&str, f64)] = &[
    ("win the game", 20.0),
    ("infinite", 16.0),
    ("combat damage", 10.0),
    ("mill", 8.0),
    ("drain", 8.0),
];

/// Popularity saturates its 40-point contribution at this many uses.
/// Popularity is extremely right-skewed, hence the log scale.
const POPULARITY_SATURATION_LOG10: f64 = 5.0; // 100,000 uses

/// Immutable inverted index over the combo dataset.
pub struct ComboIndex {
    combos: Vec<Combo>,
    /// Lowercased card name → combo positions referencing it.
    by_card: FxHashMap<String, Vec<usize>>,
    available: bool,
}

impl ComboIndex {
    /// Load the dataset from a JSON file, dropping combos below
    /// `min_popularity`. A missing file yields an unavailable (empty) index.
    pub fn load(path: &str, min_popularity: u64) -> Result<Self> {
        if !Path::new(path).exists() {
            tracing::warn!("Combo dataset not found: {} (combo matching disabled)", path);
            return Ok(Self::unavailable());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read combo dataset: {}", path))?;
        let combos: Vec<Combo> = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse combo dataset JSON")?;

        tracing::info!("Loaded {} combos from {}", combos.len(), path);
        Ok(Self::from_combos(combos, min_popularity))
    }

    /// Build from combos already in memory (tests, fixtures).
    pub fn from_combos(combos: Vec<Combo>, min_popularity: u64) -> Self {
        let combos: Vec<Combo> = combos
            .into_iter()
            .filter(|c| c.popularity >= min_popularity && !c.cards.is_empty())
            .collect();

        let mut by_card: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, combo) in combos.iter().enumerate() {
            for card in &combo.cards {
                by_card.entry(card.to_lowercase()).or_default().push(idx);
            }
        }

        Self {
            combos,
            by_card,
            available: true,
        }
    }

    fn unavailable() -> Self {
        Self {
            combos: Vec::new(),
            by_card: FxHashMap::default(),
            available: false,
        }
    }

    /// Whether the dataset was present at load time.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Number of combos referencing a card (cheap inverted-index read).
    pub fn combo_count_for_card(&self, card_name: &str) -> usize {
        self.by_card
            .get(&card_name.to_lowercase())
            .map_or(0, |ids| ids.len())
    }

    /// Find combos missing at most `max_missing` pieces from the deck.
    ///
    /// Candidates come from the union of combo ids reachable through the
    /// inverted index, so only combos sharing at least one card with the deck
    /// are ever examined. Results are sorted by (popularity desc, completion
    /// desc, id asc); the second return value maps each missing card name to
    /// the combos it would help complete.
    pub fn find_missing_pieces(
        &self,
        deck_card_names: &[String],
        max_missing: usize,
        min_present: usize,
        bracket_filter: Option<Bracket>,
    ) -> (Vec<ComboMatch>, FxHashMap<String, Vec<String>>) {
        if !self.available || self.combos.is_empty() {
            return (Vec::new(), FxHashMap::default());
        }

        let deck_set: FxHashSet<String> =
            deck_card_names.iter().map(|n| n.to_lowercase()).collect();

        // Union of candidate combos reachable from any deck card
        let mut candidates: FxHashSet<usize> = FxHashSet::default();
        for name in &deck_set {
            if let Some(ids) = self.by_card.get(name) {
                candidates.extend(ids.iter().copied());
            }
        }

        let mut matches: Vec<ComboMatch> = Vec::new();
        let mut missing_map: FxHashMap<String, Vec<String>> = FxHashMap::default();

        for idx in candidates {
            let combo = &self.combos[idx];
            if let Some(bracket) = bracket_filter {
                if combo.bracket != bracket {
                    continue;
                }
            }

            let mut present = Vec::new();
            let mut missing = Vec::new();
            for card in &combo.cards {
                if deck_set.contains(&card.to_lowercase()) {
                    present.push(card.clone());
                } else {
                    missing.push(card.clone());
                }
            }

            if missing.len() > max_missing || present.len() < min_present {
                continue;
            }

            for card in &missing {
                missing_map
                    .entry(card.clone())
                    .or_default()
                    .push(combo.id.clone());
            }

            let completion_ratio = present.len() as f64 / combo.cards.len() as f64;
            matches.push(ComboMatch {
                combo: combo.clone(),
                present_cards: present,
                missing_cards: missing,
                completion_ratio,
            });
        }

        // Most popular, most-complete combos first; id breaks remaining ties
        matches.sort_by(|a, b| {
            b.combo
                .popularity
                .cmp(&a.combo.popularity)
                .then_with(|| {
                    b.completion_ratio
                        .partial_cmp(&a.completion_ratio)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.combo.id.cmp(&b.combo.id))
        });

        for ids in missing_map.values_mut() {
            ids.sort();
        }

        (matches, missing_map)
    }

    /// Desirability score for a combo, clamped to [0, 100].
    ///
    /// Popularity contributes up to 40 points on a log scale, bracket up to
    /// 30 from a fixed table, the first matching win keyword up to 20, and a
    /// piece-count bonus up to 10 (2-card combos max it; 5+ pieces score 0).
    pub fn get_combo_score(&self, combo: &Combo) -> f64 {
        if !self.available {
            return 0.0;
        }

        let popularity_points =
            40.0 * (libm::log10(1.0 + combo.popularity as f64) / POPULARITY_SATURATION_LOG10).min(1.0);

        let bracket_points = combo.bracket.score();

        let mut effect_points = 0.0;
        'outer: for (keyword, points) in WIN_KEYWORDS {
            for effect in &combo.produces {
                if effect.to_lowercase().contains(keyword) {
                    effect_points = *points;
                    break 'outer;
                }
            }
        }

        let pieces = combo.cards.len() as f64;
        let piece_points = (10.0 * (5.0 - pieces) / 3.0).clamp(0.0, 10.0);

        (popularity_points + bracket_points + effect_points + piece_points).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn combo(id: &str, cards: &[&str], popularity: u64) -> Combo {
        Combo {
            id: id.to_string(),
            cards: cards.iter().map(|c| c.to_string()).collect(),
            description: String::new(),
            bracket: Bracket::Mid,
            popularity,
            color_identity: "WU".to_string(),
            produces: vec!["Win the game".to_string()],
        }
    }

    #[test]
    fn test_single_missing_piece() {
        let index = ComboIndex::from_combos(vec![combo("c1", &["A", "B"], 100)], 0);
        let deck = vec!["A".to_string()];

        let (matches, missing_map) = index.find_missing_pieces(&deck, 1, 1, None);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].missing_cards, vec!["B"]);
        assert_eq!(matches[0].present_cards, vec!["A"]);
        assert_relative_eq!(matches[0].completion_ratio, 0.5, epsilon = 1e-9);
        assert_eq!(missing_map.get("B").unwrap(), &vec!["c1".to_string()]);
    }

    #[test]
    fn test_missing_bound_respected() {
        let index = ComboIndex::from_combos(vec![combo("c1", &["A", "B", "C"], 100)], 0);
        let deck = vec!["A".to_string()];

        // Two pieces missing but only one allowed
        let (matches, _) = index.find_missing_pieces(&deck, 1, 1, None);
        assert!(matches.is_empty());

        let (matches, _) = index.find_missing_pieces(&deck, 2, 1, None);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].missing_cards.len() <= 2);
    }

    #[test]
    fn test_min_present_respected() {
        let index = ComboIndex::from_combos(vec![combo("c1", &["A", "B", "C"], 100)], 0);
        let deck = vec!["A".to_string()];

        let (matches, _) = index.find_missing_pieces(&deck, 2, 2, None);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_no_shared_card_never_matches() {
        // The candidate union bounds the search; a deck sharing nothing with
        // any combo must return nothing even with generous limits.
        let index = ComboIndex::from_combos(vec![combo("c1", &["A", "B"], 100)], 0);
        let deck = vec!["Z".to_string()];

        let (matches, _) = index.find_missing_pieces(&deck, 2, 0, None);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_sort_by_popularity_then_completion() {
        let index = ComboIndex::from_combos(
            vec![
                combo("c_low", &["A", "B"], 10),
                combo("c_high", &["A", "C"], 1000),
                combo("c_mid_full", &["A"], 500),
            ],
            0,
        );
        let deck = vec!["A".to_string()];

        let (matches, _) = index.find_missing_pieces(&deck, 1, 1, None);
        let ids: Vec<&str> = matches.iter().map(|m| m.combo.id.as_str()).collect();
        assert_eq!(ids, vec!["c_high", "c_mid_full", "c_low"]);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let index = ComboIndex::from_combos(vec![combo("c1", &["Thassa's Oracle", "Demonic Consultation"], 50)], 0);
        let deck = vec!["THASSA'S ORACLE".to_string()];

        let (matches, _) = index.find_missing_pieces(&deck, 1, 1, None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].missing_cards, vec!["Demonic Consultation"]);
    }

    #[test]
    fn test_min_popularity_filters_at_load() {
        let index = ComboIndex::from_combos(
            vec![combo("c1", &["A", "B"], 5), combo("c2", &["A", "C"], 50)],
            10,
        );
        assert_eq!(index.len(), 1);

        let (matches, _) = index.find_missing_pieces(&["A".to_string()], 1, 1, None);
        assert_eq!(matches[0].combo.id, "c2");
    }

    #[test]
    fn test_bracket_filter() {
        let mut cedh = combo("c_cedh", &["A", "B"], 100);
        cedh.bracket = Bracket::Cedh;
        let index = ComboIndex::from_combos(vec![combo("c_mid", &["A", "C"], 100), cedh], 0);

        let (matches, _) =
            index.find_missing_pieces(&["A".to_string()], 1, 1, Some(Bracket::Cedh));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].combo.id, "c_cedh");
    }

    #[test]
    fn test_combo_score_bounds() {
        let index = ComboIndex::from_combos(vec![], 0);

        let mut maxed = combo("max", &["A", "B"], u64::MAX / 2);
        maxed.bracket = Bracket::Cedh;
        let score = index.get_combo_score(&maxed);
        assert!((0.0..=100.0).contains(&score));

        let minimal = Combo {
            id: "min".to_string(),
            cards: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
            description: String::new(),
            bracket: Bracket::Casual,
            popularity: 0,
            color_identity: String::new(),
            produces: vec![],
        };
        let score = index.get_combo_score(&minimal);
        assert!((0.0..=100.0).contains(&score));
        // No popularity, no effects, 5 pieces: only the bracket contributes
        assert_relative_eq!(score, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_combo_score_first_win_keyword_wins() {
        let index = ComboIndex::from_combos(vec![], 0);
        let mut c = combo("c", &["A", "B"], 0);
        c.bracket = Bracket::Casual;
        c.produces = vec!["Infinite mill".to_string(), "Win the game".to_string()];

        // "win the game" (20) outranks "infinite" (16) and "mill" (8); it is
        // found first in the ordered keyword table and is not cumulative.
        let score = index.get_combo_score(&c);
        // bracket 5 + effect 20 + piece bonus 10
        assert_relative_eq!(score, 35.0, epsilon = 1e-9);
    }

    #[test]
    fn test_piece_count_bonus_decreases() {
        let index = ComboIndex::from_combos(vec![], 0);
        let two = combo("two", &["A", "B"], 0);
        let five = combo("five", &["A", "B", "C", "D", "E"], 0);

        assert!(index.get_combo_score(&two) > index.get_combo_score(&five));
    }

    #[test]
    fn test_unavailable_index_degrades() {
        let index = ComboIndex::load("/nonexistent/combos.json", 0).unwrap();
        assert!(!index.is_available());

        let (matches, map) = index.find_missing_pieces(&["A".to_string()], 1, 1, None);
        assert!(matches.is_empty());
        assert!(map.is_empty());
        assert_eq!(index.get_combo_score(&combo("c", &["A", "B"], 100)), 0.0);
    }

    #[test]
    fn test_completion_ratio_monotone_in_present() {
        let c = combo("c", &["A", "B", "C", "D"], 100);
        let index = ComboIndex::from_combos(vec![c], 0);

        let (one, _) = index.find_missing_pieces(&["A".to_string()], 3, 1, None);
        let (two, _) =
            index.find_missing_pieces(&["A".to_string(), "B".to_string()], 3, 1, None);

        assert!(two[0].completion_ratio > one[0].completion_ratio);
    }
}
