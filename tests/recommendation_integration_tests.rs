// End-to-end tests for the deck advisor service: fixture corpus + combo
// dataset, in-memory catalog database, optional gameplay-statistics fixture.
//
// Run with: cargo test --test recommendation_integration_tests

use async_trait::async_trait;
use deck_advisor_rust::{
    AdvisorConfig, AdvisorError, CancelFlag, CardCatalog, CardRecord, CatalogDatabase,
    DeckAdvisor, GameplayStats, PerfTier, SynergyPair,
};
use std::sync::Arc;

// =========================================================================
// Fixtures
// =========================================================================

fn card(
    name: &str,
    mana_cost: &str,
    mana_value: f64,
    type_line: &str,
    text: &str,
    identity: &[&str],
    rank: Option<u32>,
) -> CardRecord {
    CardRecord {
        name: name.to_string(),
        mana_cost: mana_cost.to_string(),
        mana_value,
        type_line: type_line.to_string(),
        oracle_text: text.to_string(),
        power: None,
        toughness: None,
        color_identity: identity.iter().map(|s| s.to_string()).collect(),
        keywords: vec![],
        popularity_rank: rank,
    }
}

fn fixture_corpus() -> Vec<CardRecord> {
    vec![
        card(
            "Goblin Raider",
            "{1}{R}",
            2.0,
            "Creature \u{2014} Goblin Warrior",
            "Goblin Raider can't block.",
            &["R"],
            Some(20_000),
        ),
        card(
            "Goblin Piker",
            "{1}{R}",
            2.0,
            "Creature \u{2014} Goblin Warrior",
            "",
            &["R"],
            Some(25_000),
        ),
        card(
            "Goblin Matron",
            "{2}{R}",
            3.0,
            "Creature \u{2014} Goblin",
            "When this creature enters, you may search your library for a Goblin card.",
            &["R"],
            Some(2_000),
        ),
        card(
            "Goblin Warchief",
            "{1}{R}{R}",
            3.0,
            "Creature \u{2014} Goblin Warrior",
            "Goblin spells you cast cost {1} less to cast. Goblins you control have haste.",
            &["R"],
            Some(1_500),
        ),
        card(
            "Goblin Chieftain",
            "{1}{R}{R}",
            3.0,
            "Creature \u{2014} Goblin",
            "Other Goblins you control get +1/+1 and have haste.",
            &["R"],
            Some(1_800),
        ),
        card(
            "Skirk Prospector",
            "{R}",
            1.0,
            "Creature \u{2014} Goblin",
            "Sacrifice a Goblin: Add {R}.",
            &["R"],
            Some(1_200),
        ),
        card(
            "Mountain",
            "",
            0.0,
            "Basic Land \u{2014} Mountain",
            "{T}: Add {R}.",
            &["R"],
            None,
        ),
        card(
            "Sol Ring",
            "{1}",
            1.0,
            "Artifact",
            "{T}: Add {C}{C}.",
            &[],
            Some(1),
        ),
        card(
            "Lightning Bolt",
            "{R}",
            1.0,
            "Instant",
            "Lightning Bolt deals 3 damage to any target.",
            &["R"],
            Some(5),
        ),
        card(
            "Merfolk Looter",
            "{1}{U}",
            2.0,
            "Creature \u{2014} Merfolk Rogue",
            "{T}: Draw a card, then discard a card.",
            &["U"],
            Some(3_000),
        ),
        card(
            "Ajani's Pridemate",
            "{1}{W}",
            2.0,
            "Creature \u{2014} Cat Soldier",
            "Whenever you gain life, put a +1/+1 counter on this creature.",
            &["W"],
            Some(4_000),
        ),
    ]
}

const COMBO_FIXTURE: &str = r#"[
    {
        "id": "fixture-1",
        "cards": ["Goblin Matron", "Skirk Prospector"],
        "description": "Matron finds fuel for the Prospector",
        "bracket": "mid",
        "popularity": 4000,
        "color_identity": "R",
        "produces": ["Infinite mana"]
    }
]"#;

fn write_combo_fixture(tag: &str) -> String {
    let path = std::env::temp_dir().join(format!("advisor_combos_{}_{}.json", std::process::id(), tag));
    std::fs::write(&path, COMBO_FIXTURE).expect("Failed to write combo fixture");
    path.to_string_lossy().to_string()
}

async fn build_advisor(tag: &str, stats: Option<Arc<dyn GameplayStats>>) -> DeckAdvisor {
    let catalog = Arc::new(CardCatalog::from_records(fixture_corpus()));
    let corpus = Arc::new(catalog.cards().to_vec());
    let db = Arc::new(CatalogDatabase::new(catalog));

    let advisor = DeckAdvisor::new(
        corpus,
        db,
        stats,
        None,
        AdvisorConfig {
            combo_dataset_path: write_combo_fixture(tag),
            ..AdvisorConfig::default()
        },
    );
    advisor.initialize().await.expect("initialize failed");
    advisor
}

fn goblin_deck() -> Vec<(String, u32)> {
    vec![
        ("Goblin Raider".to_string(), 4),
        ("Goblin Piker".to_string(), 4),
        ("Goblin Matron".to_string(), 4),
        ("Mountain".to_string(), 20),
    ]
}

struct FixtureStats;

#[async_trait]
impl GameplayStats for FixtureStats {
    async fn get_tier(&self, card_name: &str) -> anyhow::Result<Option<PerfTier>> {
        Ok(match card_name {
            "Lightning Bolt" => Some(PerfTier::S),
            "Goblin Chieftain" => Some(PerfTier::B),
            _ => None,
        })
    }

    async fn get_synergy_pairs(
        &self,
        card_name: &str,
        _min_games: u64,
        _min_lift: f64,
    ) -> anyhow::Result<Vec<SynergyPair>> {
        Ok(match card_name {
            "Goblin Matron" => vec![
                SynergyPair {
                    partner: "Goblin Warchief".to_string(),
                    lift: 1.5,
                    sample_size: 200,
                },
                // Under-sampled pair, must be ignored
                SynergyPair {
                    partner: "Sol Ring".to_string(),
                    lift: 3.0,
                    sample_size: 5,
                },
            ],
            _ => Vec::new(),
        })
    }
}

// =========================================================================
// Section 1: Similarity queries
// =========================================================================

#[tokio::test]
async fn test_find_similar_surfaces_tribe_mates() {
    let advisor = build_advisor("similar", None).await;

    let similar = advisor.find_similar("Goblin Raider", 3);
    assert!(!similar.is_empty());
    // The closest cards to a Goblin creature are other Goblin creatures
    assert!(similar[0].0.contains("Goblin"));
    assert!(!similar.iter().any(|(name, _)| name == "Goblin Raider"));
}

#[tokio::test]
async fn test_find_similar_unknown_card_is_empty() {
    let advisor = build_advisor("similar_unknown", None).await;
    assert!(advisor.find_similar("Not A Real Card", 5).is_empty());
}

#[tokio::test]
async fn test_centroid_query_excludes_inputs() {
    let advisor = build_advisor("centroid", None).await;

    let names = vec!["Goblin Raider".to_string(), "Goblin Piker".to_string()];
    let results = advisor.find_similar_to_cards(&names, 5);

    assert!(!results.is_empty());
    assert!(results.iter().all(|(name, _)| !names.contains(name)));
    assert!(results[0].0.contains("Goblin"));
}

#[tokio::test]
async fn test_free_text_query() {
    let advisor = build_advisor("free_text", None).await;

    let results = advisor.find_similar_to_text("goblin creature haste", 5);
    assert!(!results.is_empty());
    assert!(results[0].0.contains("Goblin"));
}

// =========================================================================
// Section 2: Combo queries
// =========================================================================

#[tokio::test]
async fn test_missing_combo_piece_found() {
    let advisor = build_advisor("combo", None).await;

    let deck_names: Vec<String> = goblin_deck().into_iter().map(|(n, _)| n).collect();
    let (matches, missing_map) = advisor.find_missing_combo_pieces(&deck_names, 1, None);

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].combo.id, "fixture-1");
    assert_eq!(matches[0].missing_cards, vec!["Skirk Prospector"]);
    assert_eq!(
        missing_map.get("Skirk Prospector").map(|ids| ids.as_slice()),
        Some(&["fixture-1".to_string()][..])
    );
}

// =========================================================================
// Section 3: Recommendations
// =========================================================================

#[tokio::test]
async fn test_recommend_for_goblin_deck() {
    let advisor = build_advisor("recommend", None).await;

    let suggestions = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .expect("recommend failed");

    assert!(!suggestions.is_empty());
    let names: Vec<&str> = suggestions.iter().map(|s| s.name.as_str()).collect();

    // Tribal fit and combo completion both surface
    assert!(names.contains(&"Goblin Warchief") || names.contains(&"Goblin Chieftain"));
    assert!(names.contains(&"Skirk Prospector"));
    // Deck cards are never suggested
    assert!(!names.contains(&"Goblin Raider"));
    assert!(!names.contains(&"Mountain"));
    // Off-identity cards are filtered out of the pool
    assert!(!names.contains(&"Merfolk Looter"));
    assert!(!names.contains(&"Ajani's Pridemate"));

    // Every suggestion carries at least one reason
    for suggestion in &suggestions {
        assert!(!suggestion.reasons.is_empty(), "{} has no reasons", suggestion.name);
    }
}

#[tokio::test]
async fn test_recommendations_ordered_by_score() {
    // Ordering holds with no statistics source wired in at all
    let advisor = build_advisor("ordering", None).await;

    let suggestions = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .unwrap();

    assert!(suggestions.len() > 1);
    for pair in suggestions.windows(2) {
        assert!(
            pair[0].score >= pair[1].score,
            "{} ({:.2}) ranked above {} ({:.2})",
            pair[0].name,
            pair[0].score,
            pair[1].name,
            pair[1].score
        );
    }
}

#[tokio::test]
async fn test_recommendations_are_deterministic() {
    let advisor = build_advisor("deterministic", None).await;

    let first = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .unwrap();
    let second = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .unwrap();

    let names_first: Vec<&str> = first.iter().map(|s| s.name.as_str()).collect();
    let names_second: Vec<&str> = second.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names_first, names_second);
}

#[tokio::test]
async fn test_cancelled_request_is_rejected() {
    let advisor = build_advisor("cancel", None).await;

    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = advisor.recommend(&goblin_deck(), 10, &cancel).await;

    assert!(matches!(result, Err(AdvisorError::Cancelled)));
}

// =========================================================================
// Section 4: Gameplay statistics
// =========================================================================

#[tokio::test]
async fn test_performance_tiers_attached() {
    let advisor = build_advisor("tiers", Some(Arc::new(FixtureStats))).await;

    let suggestions = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .unwrap();

    let bolt = suggestions.iter().find(|s| s.name == "Lightning Bolt");
    if let Some(bolt) = bolt {
        assert_eq!(bolt.tier, Some(PerfTier::S));
    }
}

#[tokio::test]
async fn test_observed_lift_boosts_and_explains() {
    let advisor = build_advisor("lift", Some(Arc::new(FixtureStats))).await;

    let suggestions = advisor
        .recommend(&goblin_deck(), 10, &CancelFlag::new())
        .await
        .unwrap();

    let warchief = suggestions
        .iter()
        .find(|s| s.name == "Goblin Warchief")
        .expect("Warchief should be suggested");
    assert_eq!(warchief.synergy_lift, Some(1.5));
    assert!(warchief.reasons.iter().any(|r| r.contains("alongside")));

    // The 5-game sample never counts
    let sol_ring = suggestions.iter().find(|s| s.name == "Sol Ring");
    if let Some(sol_ring) = sol_ring {
        assert_eq!(sol_ring.synergy_lift, None);
    }
}

// =========================================================================
// Section 5: Deck report
// =========================================================================

#[tokio::test]
async fn test_deck_report() {
    let advisor = build_advisor("report", None).await;

    let report = advisor.deck_report(&goblin_deck()).await.unwrap();

    assert_eq!(report.card_count, 32);
    assert_eq!(report.land_count, 20);
    assert_eq!(report.dominant_tribe, Some(("Goblin".to_string(), 12)));
    assert_eq!(report.colors, vec!["red"]);
    assert!(report.complete_combos.is_empty());
    assert_eq!(report.near_miss_combos.len(), 1);
    assert_eq!(
        report.near_miss_combos[0].missing_cards,
        vec!["Skirk Prospector"]
    );
}

// =========================================================================
// Section 6: Initialization discipline
// =========================================================================

#[tokio::test]
#[should_panic(expected = "initialize() must complete")]
async fn test_query_before_initialize_panics() {
    let catalog = Arc::new(CardCatalog::from_records(fixture_corpus()));
    let corpus = Arc::new(catalog.cards().to_vec());
    let db = Arc::new(CatalogDatabase::new(catalog));
    let advisor = DeckAdvisor::new(corpus, db, None, None, AdvisorConfig::default());

    let _ = advisor.find_similar("Goblin Raider", 3);
}
