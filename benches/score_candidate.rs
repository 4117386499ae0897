//! Candidate-scoring benchmark: one synergy evaluation against a 60-card
//! deck, and a full ranking pass over a 300-card pool.

use criterion::{criterion_group, criterion_main, Criterion};
use deck_advisor_rust::{
    aggregate_deck, CancelFlag, CardFeatureEncoder, CardRecord, Candidate,
    RecommendationAggregator, ScoringWeights, SynergyScorer,
};
use rustc_hash::FxHashMap;

fn record(name: &str, mana_value: f64, type_line: &str, text: &str) -> CardRecord {
    CardRecord {
        name: name.to_string(),
        mana_cost: String::new(),
        mana_value,
        type_line: type_line.to_string(),
        oracle_text: text.to_string(),
        power: Some("2".to_string()),
        toughness: Some("2".to_string()),
        color_identity: vec!["R".to_string()],
        keywords: vec!["Haste".to_string()],
        popularity_rank: Some(500),
    }
}

fn bench_score_candidate(c: &mut Criterion) {
    let encoder = CardFeatureEncoder::new(None);
    let deck_entries: Vec<_> = (0..15)
        .map(|i| {
            let card = record(
                &format!("Goblin {}", i),
                (i % 5) as f64,
                "Creature \u{2014} Goblin",
                "Whenever this creature attacks, create a 1/1 red Goblin creature token.",
            );
            (encoder.encode(&card), 4)
        })
        .collect();
    let deck = aggregate_deck(&deck_entries);

    let candidate = encoder.encode(&record(
        "Goblin Instigator",
        2.0,
        "Creature \u{2014} Goblin Rogue",
        "When this creature enters, create a 1/1 red Goblin creature token.",
    ));

    let scorer = SynergyScorer::new(ScoringWeights::default());
    c.bench_function("score_one_candidate", |b| {
        b.iter(|| scorer.score_candidate(std::hint::black_box(&candidate), &deck))
    });

    let pool: Vec<Candidate> = (0..300)
        .map(|i| {
            let card = record(
                &format!("Candidate {}", i),
                (i % 7) as f64,
                "Creature \u{2014} Goblin",
                "Other Goblins you control get +1/+0.",
            );
            Candidate {
                features: encoder.encode(&card),
                text: card.oracle_text,
            }
        })
        .collect();

    let aggregator = RecommendationAggregator::new(SynergyScorer::new(ScoringWeights::default()));
    c.bench_function("rank_300_candidates", |b| {
        b.iter(|| {
            aggregator
                .rank_candidates(
                    &deck,
                    std::hint::black_box(&pool),
                    &FxHashMap::default(),
                    None,
                    20,
                    &CancelFlag::new(),
                )
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_score_candidate);
criterion_main!(benches);
