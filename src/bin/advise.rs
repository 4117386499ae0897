//! Deck Advisor CLI
//!
//! Loads the card corpus and combo dataset, reads a deck list, and prints a
//! deck report plus ranked recommendations.
//!
//! Usage: cargo run --bin advise -- <decklist.txt>
//! Deck list format: one card per line, optionally prefixed with a quantity
//! ("4 Lightning Bolt"). Blank lines and lines starting with '#' are skipped.

use deck_advisor_rust::{
    AdvisorConfig, CancelFlag, CardCatalog, CatalogDatabase, DeckAdvisor, ScoringWeights,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deck_advisor_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let deck_path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: advise <decklist.txt>"))?;

    // Configuration from environment variables
    let card_data = std::env::var("CARD_DATA").unwrap_or_else(|_| "data/cards.parquet".to_string());
    let combo_data = std::env::var("COMBO_DATA").unwrap_or_else(|_| "data/combos.json".to_string());
    let keyword_vocab =
        std::env::var("KEYWORD_VOCAB").unwrap_or_else(|_| "data/keywords.json".to_string());
    let limit: usize = std::env::var("LIMIT")
        .ok()
        .and_then(|l| l.parse().ok())
        .unwrap_or(15);

    let weights = match std::env::var("WEIGHTS") {
        Ok(path) => ScoringWeights::load(Path::new(&path))?,
        Err(_) => ScoringWeights::default(),
    };

    let deck = parse_deck_list(&std::fs::read_to_string(&deck_path)?);
    tracing::info!("Deck list: {} distinct cards from {}", deck.len(), deck_path);

    let catalog = Arc::new(CardCatalog::load(&card_data)?);
    let corpus = Arc::new(catalog.cards().to_vec());
    let db = Arc::new(CatalogDatabase::new(Arc::clone(&catalog)));

    let advisor = DeckAdvisor::new(
        corpus,
        db,
        None,
        deck_advisor_rust::load_keyword_vocabulary(&keyword_vocab),
        AdvisorConfig {
            combo_dataset_path: combo_data,
            weights,
            ..AdvisorConfig::default()
        },
    );
    advisor.initialize().await?;

    let report = advisor.deck_report(&deck).await?;
    println!("=== Deck Report ===");
    println!(
        "Cards: {} ({} lands, {} creatures), avg CMC {:.2}",
        report.card_count, report.land_count, report.creature_count, report.avg_cmc
    );
    println!("Colors: {}", report.colors.join(", "));
    if let Some((tribe, count)) = &report.dominant_tribe {
        println!("Dominant tribe: {} ({} cards)", tribe, count);
    }
    if !report.dominant_themes.is_empty() {
        println!("Themes: {}", report.dominant_themes.join(", "));
    }
    if !report.complete_combos.is_empty() {
        println!("Complete combos: {}", report.complete_combos.len());
    }
    for near_miss in report.near_miss_combos.iter().take(5) {
        println!(
            "One card from a combo: add {} ({})",
            near_miss.missing_cards.join(" + "),
            near_miss.combo.description
        );
    }

    let suggestions = advisor.recommend(&deck, limit, &CancelFlag::new()).await?;
    println!("\n=== Recommendations ===");
    for (rank, suggestion) in suggestions.iter().enumerate() {
        println!("{:2}. {} ({:.1})", rank + 1, suggestion.name, suggestion.score);
        for reason in &suggestion.reasons {
            println!("      - {}", reason);
        }
    }

    Ok(())
}

/// Parse a deck list: "<qty> <name>" or bare "<name>" per line.
fn parse_deck_list(contents: &str) -> Vec<(String, u32)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let mut parts = line.splitn(2, ' ');
            let first = parts.next().unwrap_or("");
            match (first.parse::<u32>(), parts.next()) {
                (Ok(qty), Some(name)) => (name.trim().to_string(), qty),
                _ => (line.to_string(), 1),
            }
        })
        .collect()
}
