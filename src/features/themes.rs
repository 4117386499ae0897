//! Synergy-theme detection tables
//!
//! Holds the fixed, ordered table of (theme → oracle-text patterns) and the
//! fallback keyword-ability vocabulary used when the external reference table
//! is unavailable.
//!
//! Patterns are compiled once at construction into a fixed ordered list of
//! matchers; nothing here is re-parsed per call.

use regex::Regex;

/// Keyword abilities recognized when no external vocabulary table is loaded.
///
/// Deliberately small: evergreen keywords only. The full vocabulary comes from
/// the reference table shipped with the card datasets.
pub const FALLBACK_KEYWORDS: &[&str] = &[
    "deathtouch",
    "defender",
    "double strike",
    "first strike",
    "flash",
    "flying",
    "haste",
    "hexproof",
    "indestructible",
    "lifelink",
    "menace",
    "reach",
    "trample",
    "vigilance",
    "ward",
];

/// Ordered theme table: (theme name, oracle-text patterns).
///
/// A theme is present when ANY of its patterns matches; it is recorded at most
/// once per card. Order is fixed so re-encoding is deterministic.
const THEME_PATTERNS: &[(&str, &[&str])] = &[
    ("tokens", &[
        r"(?i)creates? .* token",
        r"(?i)token creatures? you control",
    ]),
    ("sacrifice", &[
        r"(?i)sacrifice an?other? ",
        r"(?i)whenever .* (is sacrificed|sacrifices)",
        r"(?i)sacrifice a (creature|permanent|artifact)",
    ]),
    ("graveyard", &[
        r"(?i)from (your|a) graveyard",
        r"(?i)leaves? the graveyard",
    ]),
    ("counters", &[
        r"(?i)\+1/\+1 counters?",
        r"(?i)proliferate",
    ]),
    ("lifegain", &[
        r"(?i)you gain \d+ life",
        r"(?i)whenever you gain life",
        r"(?i)gains? .* lifelink",
    ]),
    ("card_draw", &[
        r"(?i)draws? (a|two|three|x) cards?",
        r"(?i)whenever you draw",
    ]),
    ("spellslinger", &[
        r"(?i)whenever you cast an? (instant|sorcery|noncreature)",
        r"(?i)instant and sorcery (cards|spells)",
        r"(?i)copy target (instant|sorcery)",
    ]),
    ("landfall", &[
        r"(?i)whenever a land (enters|you control enters)",
        r"(?i)landfall",
        r"(?i)play an additional land",
    ]),
    ("artifacts", &[
        r"(?i)artifacts? you control",
        r"(?i)whenever an? artifact",
        r"(?i)affinity for artifacts",
    ]),
    ("enchantments", &[
        r"(?i)enchantments? you control",
        r"(?i)whenever an? (enchantment|aura)",
        r"(?i)constellation",
    ]),
    ("mill", &[
        r"(?i)mills? \w+ cards?",
        r"(?i)puts? the top .* of .* library into .* graveyard",
    ]),
    ("discard", &[
        r"(?i)discards? \w+ cards?",
        r"(?i)whenever .* discards?",
    ]),
    ("reanimator", &[
        r"(?i)return .* creature card .* graveyard to the battlefield",
    ]),
    ("ramp", &[
        r"(?i)search your library for .* land",
        r"(?i)adds? \w+ mana",
    ]),
    ("blink", &[
        r"(?i)exile .*, then return (it|that card|them) to the battlefield",
    ]),
    ("burn", &[
        r"(?i)deals? \d+ damage to (any target|each opponent|target player)",
    ]),
];

/// One theme with its compiled patterns.
pub struct ThemeMatcher {
    pub name: &'static str,
    patterns: Vec<Regex>,
}

impl ThemeMatcher {
    fn matches(&self, oracle_text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(oracle_text))
    }
}

/// All theme matchers, compiled once and kept in table order.
pub struct ThemeMatchers {
    matchers: Vec<ThemeMatcher>,
}

impl ThemeMatchers {
    /// Compile the static theme table.
    ///
    /// The pattern strings are fixed at compile time, so a failure here is a
    /// programmer error and panics at construction rather than mid-query.
    pub fn compile() -> Self {
        let matchers = THEME_PATTERNS
            .iter()
            .map(|(name, patterns)| ThemeMatcher {
                name,
                patterns: patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("static theme pattern must compile"))
                    .collect(),
            })
            .collect();

        Self { matchers }
    }

    /// Detect themes expressed by a card's oracle text.
    ///
    /// Returns theme names in table order; each theme appears at most once no
    /// matter how many of its patterns match.
    pub fn detect(&self, oracle_text: &str) -> Vec<&'static str> {
        if oracle_text.is_empty() {
            return Vec::new();
        }

        self.matchers
            .iter()
            .filter(|m| m.matches(oracle_text))
            .map(|m| m.name)
            .collect()
    }

    /// Number of themes in the table.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
