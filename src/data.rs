//! Data Loading and Management
//!
//! Loads the card corpus from parquet/CSV sources into typed records, plus
//! the keyword-vocabulary reference table (JSON). List-valued columns
//! (color identity, keywords) are pipe-separated strings in the source files.
//!
//! The combo dataset has its own loader in `combo_index`.

use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One raw card record as shipped by the card datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub name: String,
    /// Mana cost string, e.g. `{1}{W}{W}`.
    #[serde(default)]
    pub mana_cost: String,
    #[serde(default)]
    pub mana_value: f64,
    #[serde(default)]
    pub type_line: String,
    #[serde(default)]
    pub oracle_text: String,
    pub power: Option<String>,
    pub toughness: Option<String>,
    /// Color identity symbols, e.g. `["W", "U"]`.
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// External popularity rank; lower = more popular, `None` = unranked.
    pub popularity_rank: Option<u32>,
}

/// The card corpus with a name index for O(1) lookup.
pub struct CardCatalog {
    cards: Vec<CardRecord>,
    /// Lowercased name → position in `cards`.
    name_index: FxHashMap<String, usize>,
}

impl CardCatalog {
    /// Load the corpus from a parquet or CSV file (decided by extension).
    pub fn load(path: &str) -> Result<Self> {
        tracing::info!("Loading card corpus: {}", path);

        let df = if path.ends_with(".csv") {
            Self::load_csv(path)?
        } else {
            Self::load_parquet(path)?
        };

        let cards = records_from_frame(&df)?;
        tracing::info!("  Cards: {}", cards.len());

        Ok(Self::from_records(cards))
    }

    /// Build a catalog from records already in memory (tests, fixtures).
    pub fn from_records(cards: Vec<CardRecord>) -> Self {
        let mut name_index = FxHashMap::default();
        for (idx, card) in cards.iter().enumerate() {
            // First entry wins on duplicate printings
            name_index.entry(card.name.to_lowercase()).or_insert(idx);
        }
        Self { cards, name_index }
    }

    fn load_parquet(path: &str) -> Result<DataFrame> {
        LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to scan parquet: {}", path))?
            .select(&[
                col("name"),
                col("mana_cost"),
                col("mana_value"),
                col("type_line"),
                col("oracle_text"),
                col("power"),
                col("toughness"),
                col("color_identity"),
                col("keywords"),
                col("edhrec_rank"),
            ])
            .collect()
            .with_context(|| "Failed to load card parquet")
    }

    fn load_csv(path: &str) -> Result<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))
            .with_context(|| format!("Failed to create CSV reader: {}", path))?
            .finish()
            .with_context(|| "Failed to load card CSV")
    }

    /// Look up a card by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&CardRecord> {
        self.name_index
            .get(&name.to_lowercase())
            .map(|idx| &self.cards[*idx])
    }

    pub fn cards(&self) -> &[CardRecord] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Convert a card DataFrame into typed records.
///
/// Column types vary between exports (ranks as i64 or u32, mana value as
/// float or int), so numeric columns are read with fallbacks.
fn records_from_frame(df: &DataFrame) -> Result<Vec<CardRecord>> {
    let names = df.column("name")?.str()?;
    let mana_costs = df.column("mana_cost")?.str()?;
    let type_lines = df.column("type_line")?.str()?;
    let oracle_texts = df.column("oracle_text")?.str()?;
    let powers = df.column("power")?.str()?;
    let toughnesses = df.column("toughness")?.str()?;
    let identities = df.column("color_identity")?.str()?;
    let keywords = df.column("keywords")?.str()?;

    let mana_value_col = df.column("mana_value")?;
    let rank_col = df.column("edhrec_rank")?;

    let mut records = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let Some(name) = names.get(idx) else {
            continue; // Unnamed rows are unusable
        };

        let mana_value = if let Ok(values) = mana_value_col.f64() {
            values.get(idx).unwrap_or(0.0)
        } else if let Ok(values) = mana_value_col.i64() {
            values.get(idx).unwrap_or(0) as f64
        } else {
            0.0
        };

        let popularity_rank = if let Ok(ranks) = rank_col.u32() {
            ranks.get(idx)
        } else if let Ok(ranks) = rank_col.i64() {
            ranks.get(idx).and_then(|r| u32::try_from(r).ok())
        } else {
            None
        };

        records.push(CardRecord {
            name: name.to_string(),
            mana_cost: mana_costs.get(idx).unwrap_or("").to_string(),
            mana_value,
            type_line: type_lines.get(idx).unwrap_or("").to_string(),
            oracle_text: oracle_texts.get(idx).unwrap_or("").to_string(),
            power: powers.get(idx).map(|s| s.to_string()),
            toughness: toughnesses.get(idx).map(|s| s.to_string()),
            color_identity: split_pipe_list(identities.get(idx)),
            keywords: split_pipe_list(keywords.get(idx)),
            popularity_rank,
        });
    }

    Ok(records)
}

/// Split a pipe-separated list column value, e.g. `"W|U"` or `"Flying|Ward"`.
fn split_pipe_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) => raw
            .split('|')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Load the keyword-ability vocabulary reference table (a JSON string array).
///
/// Returns `None` when the file is absent or malformed; the encoder falls
/// back to its built-in evergreen list in that case.
pub fn load_keyword_vocabulary(path: &str) -> Option<Vec<String>> {
    if !Path::new(path).exists() {
        tracing::warn!("Keyword vocabulary not found: {} (using fallback)", path);
        return None;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read keyword vocabulary: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(words) if !words.is_empty() => Some(words),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to parse keyword vocabulary: {}", e);
            None
        }
    }
}
