//! Card Feature Encoder
//!
//! Converts a raw card record into a typed `CardFeatures` value: mana
//! profile, type flags, subtypes, recognized keyword abilities, detected
//! synergy themes, and the external popularity rank.
//!
//! Encoding is a pure function of the record: re-encoding the same record
//! always yields identical features. This property is load-bearing for cache
//! correctness, so nothing here reads clocks, RNGs, or mutable state.

use crate::data::CardRecord;
use crate::features::themes::{ThemeMatchers, FALLBACK_KEYWORDS};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// The five mana colors, in canonical WUBRG order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
    ];

    /// Parse a single-letter color symbol (`W`/`U`/`B`/`R`/`G`).
    pub fn from_symbol(symbol: char) -> Option<Color> {
        match symbol.to_ascii_uppercase() {
            'W' => Some(Color::White),
            'U' => Some(Color::Blue),
            'B' => Some(Color::Black),
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            _ => None,
        }
    }

    /// Position in WUBRG order, used to index pip/intensity arrays.
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Blue => 1,
            Color::Black => 2,
            Color::Red => 3,
            Color::Green => 4,
        }
    }

    /// English color word, used when expanding mana symbols into text.
    pub fn as_word(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Blue => "blue",
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
        }
    }
}

/// Derived, immutable per-card features.
#[derive(Debug, Clone, PartialEq)]
pub struct CardFeatures {
    pub name: String,
    pub mana_value: f64,
    /// Colored pips in the mana cost, indexed in WUBRG order.
    pub color_pips: [u32; 5],
    /// Color identity for deck-building legality (distinct from cost colors).
    pub color_identity: SmallVec<[Color; 5]>,
    pub is_colorless: bool,
    pub is_multicolor: bool,

    pub is_creature: bool,
    pub is_instant: bool,
    pub is_sorcery: bool,
    pub is_artifact: bool,
    pub is_enchantment: bool,
    pub is_planeswalker: bool,
    pub is_land: bool,
    pub is_legendary: bool,

    /// Subtypes in printed order (right of the type-line dash).
    pub subtypes: Vec<String>,
    pub power: f64,
    pub toughness: f64,

    /// Keywords from the record, intersected with the known vocabulary.
    pub keyword_abilities: FxHashSet<String>,
    /// Themes detected from oracle text, at most one entry per theme.
    pub synergy_themes: FxHashSet<String>,
    /// Lower rank = more popular; `None` = unranked.
    pub popularity_rank: Option<u32>,
}

/// Encoder holding the keyword vocabulary and compiled theme matchers.
pub struct CardFeatureEncoder {
    keyword_vocab: FxHashSet<String>,
    themes: ThemeMatchers,
}

impl CardFeatureEncoder {
    /// Create an encoder.
    ///
    /// `keyword_vocab` is the external keyword reference table; when it is
    /// unavailable the small evergreen fallback list is used instead.
    pub fn new(keyword_vocab: Option<Vec<String>>) -> Self {
        let keyword_vocab: FxHashSet<String> = match keyword_vocab {
            Some(words) if !words.is_empty() => {
                words.into_iter().map(|w| w.to_lowercase()).collect()
            }
            _ => FALLBACK_KEYWORDS.iter().map(|w| w.to_string()).collect(),
        };

        Self {
            keyword_vocab,
            themes: ThemeMatchers::compile(),
        }
    }

    /// Encode a raw card record into `CardFeatures`. Never fails: malformed
    /// fields normalize to safe defaults instead of erroring partway through.
    pub fn encode(&self, card: &CardRecord) -> CardFeatures {
        let color_pips = count_color_pips(&card.mana_cost);

        let mut color_identity: SmallVec<[Color; 5]> = card
            .color_identity
            .iter()
            .filter_map(|s| s.chars().next().and_then(Color::from_symbol))
            .collect();
        color_identity.sort();
        color_identity.dedup();

        let type_line_lower = card.type_line.to_lowercase();
        let keyword_abilities: FxHashSet<String> = card
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| self.keyword_vocab.contains(k))
            .collect();

        let synergy_themes: FxHashSet<String> = self
            .themes
            .detect(&card.oracle_text)
            .into_iter()
            .map(|t| t.to_string())
            .collect();

        CardFeatures {
            name: card.name.clone(),
            mana_value: card.mana_value,
            color_pips,
            is_colorless: color_identity.is_empty(),
            is_multicolor: color_identity.len() > 1,
            color_identity,
            is_creature: type_line_lower.contains("creature"),
            is_instant: type_line_lower.contains("instant"),
            is_sorcery: type_line_lower.contains("sorcery"),
            is_artifact: type_line_lower.contains("artifact"),
            is_enchantment: type_line_lower.contains("enchantment"),
            is_planeswalker: type_line_lower.contains("planeswalker"),
            is_land: type_line_lower.contains("land"),
            is_legendary: type_line_lower.contains("legendary"),
            subtypes: parse_subtypes(&card.type_line),
            power: parse_stat(card.power.as_deref()),
            toughness: parse_stat(card.toughness.as_deref()),
            keyword_abilities,
            synergy_themes,
            popularity_rank: card.popularity_rank,
        }
    }
}

/// Count colored pips in a mana cost string such as `{1}{W}{W}` or `{W/U}`.
/// Hybrid symbols contribute one pip to each of their colors.
fn count_color_pips(mana_cost: &str) -> [u32; 5] {
    let mut pips = [0u32; 5];
    let mut in_symbol = false;

    for ch in mana_cost.chars() {
        match ch {
            '{' => in_symbol = true,
            '}' => in_symbol = false,
            c if in_symbol => {
                if let Some(color) = Color::from_symbol(c) {
                    pips[color.index()] += 1;
                }
            }
            _ => {}
        }
    }

    pips
}

/// Subtypes are everything right of the type-line dash, in printed order.
pub(crate) fn parse_subtypes(type_line: &str) -> Vec<String> {
    let rhs = type_line
        .split_once('\u{2014}') // em dash on printed cards
        .or_else(|| type_line.split_once(" - "))
        .map(|(_, rhs)| rhs);

    match rhs {
        Some(rhs) => rhs.split_whitespace().map(|s| s.to_string()).collect(),
        None => Vec::new(),
    }
}

/// Parse a power/toughness string.
///
/// Numeric → value; anything containing `*` or `X` → 0.0; otherwise the first
/// embedded integer (handles forms like `1+*` already caught above and
/// half-baked data like `2ish`); total failure → 0.0. Never errors.
fn parse_stat(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let raw = raw.trim();
    if raw.is_empty() || raw.contains('*') || raw.to_ascii_uppercase().contains('X') {
        return 0.0;
    }
    if let Ok(value) = raw.parse::<f64>() {
        return value;
    }

    // First embedded integer, e.g. "+2" or "2.5ish"
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<f64>().unwrap_or(0.0)
}
