//! Deck Advisor Service
//!
//! Async facade wiring the card database, the optional gameplay-statistics
//! source, and the in-memory indexes behind one API. The heavy indexes are
//! built exactly once through `initialize()`; every query after that is a
//! read against immutable structures and needs no locking.
//!
//! Collaborators are traits so tests (and alternative backends) can swap in
//! fixtures. Database lookups are bounded by a semaphore; CPU-bound index
//! builds run on the blocking pool.

use crate::combo_index::{Bracket, ComboIndex, ComboMatch};
use crate::data::{CardCatalog, CardRecord};
use crate::features::card::{CardFeatureEncoder, CardFeatures, Color};
use crate::features::deck::{aggregate_deck, DeckFeatures, CURVE_BUCKETS};
use crate::recommend::{
    CancelFlag, Candidate, PerfTier, RecommendationAggregator, ScoredCandidate,
};
use crate::scoring::{ScoringWeights, SynergyScorer};
use crate::similarity::TextSimilarityIndex;
use anyhow::anyhow;
use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;

/// Candidates fetched from the database per recommendation request.
const CANDIDATE_POOL_LIMIT: usize = 500;

/// Observed-lift pairs below this sample size are too noisy to act on.
const MIN_LIFT_SAMPLES: u64 = 30;

/// Score points per unit of observed lift above neutral (1.0), capped.
const LIFT_SCALE: f64 = 4.0;
const LIFT_BONUS_CAP: f64 = 6.0;

/// Filters for candidate search against the card database.
#[derive(Debug, Clone)]
pub struct SearchFilters {
    /// Card identity must be a subset of these colors.
    pub color_identity: Option<Vec<Color>>,
    /// Type line must contain at least one of these (case-insensitive).
    pub types: Option<Vec<String>>,
    pub max_mana_value: Option<f64>,
    /// Oracle text must contain this substring (case-insensitive).
    pub text_contains: Option<String>,
    /// Matches to skip before the returned page.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            color_identity: None,
            types: None,
            max_mana_value: None,
            text_contains: None,
            offset: 0,
            limit: 100,
        }
    }
}

/// Read access to the card database.
#[async_trait]
pub trait CardDatabase: Send + Sync {
    async fn get_card_by_name(&self, name: &str) -> anyhow::Result<Option<CardRecord>>;
    /// Batch lookup keyed by lowercased name; missing names are simply
    /// absent from the result.
    async fn get_cards_by_names(
        &self,
        names: &[String],
    ) -> anyhow::Result<FxHashMap<String, CardRecord>>;
    /// One page of matches plus the total match count.
    async fn search_cards(
        &self,
        filters: &SearchFilters,
    ) -> anyhow::Result<(Vec<CardRecord>, usize)>;
}

/// One observed card pairing from gameplay data.
#[derive(Debug, Clone, Serialize)]
pub struct SynergyPair {
    pub partner: String,
    /// Win-rate multiplier when both cards are in the deck; 1.0 is neutral.
    pub lift: f64,
    pub sample_size: u64,
}

/// Optional gameplay-statistics source. Absence degrades bonuses to neutral,
/// it never fails a request.
#[async_trait]
pub trait GameplayStats: Send + Sync {
    async fn get_tier(&self, card_name: &str) -> anyhow::Result<Option<PerfTier>>;
    /// Pairs observed in at least `min_games` games with lift ≥ `min_lift`.
    async fn get_synergy_pairs(
        &self,
        card_name: &str,
        min_games: u64,
        min_lift: f64,
    ) -> anyhow::Result<Vec<SynergyPair>>;
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Data(#[from] anyhow::Error),
}

impl From<crate::recommend::Cancelled> for AdvisorError {
    fn from(_: crate::recommend::Cancelled) -> Self {
        AdvisorError::Cancelled
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub combo_dataset_path: String,
    /// Combos below this popularity are dropped at load time.
    pub min_combo_popularity: u64,
    /// Concurrent database lookups per service instance.
    pub max_concurrent_lookups: usize,
    pub weights: ScoringWeights,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            combo_dataset_path: "data/combos.json".to_string(),
            min_combo_popularity: 0,
            max_concurrent_lookups: 16,
            weights: ScoringWeights::default(),
        }
    }
}

/// Summary of a deck's shape and combo situation.
#[derive(Debug, Clone, Serialize)]
pub struct DeckReport {
    pub card_count: u32,
    pub land_count: u32,
    pub creature_count: u32,
    pub avg_cmc: f64,
    pub cmc_distribution: [f64; CURVE_BUCKETS],
    /// Deck colors as words, in WUBRG order.
    pub colors: Vec<String>,
    pub dominant_tribe: Option<(String, u32)>,
    pub dominant_themes: Vec<String>,
    /// Combos fully present in the deck.
    pub complete_combos: Vec<ComboMatch>,
    /// Combos one card away, best first.
    pub near_miss_combos: Vec<ComboMatch>,
}

/// The deck advisor service.
pub struct DeckAdvisor {
    corpus: Arc<Vec<CardRecord>>,
    db: Arc<dyn CardDatabase>,
    stats: Option<Arc<dyn GameplayStats>>,
    config: AdvisorConfig,
    encoder: CardFeatureEncoder,
    aggregator: RecommendationAggregator,
    similarity: OnceCell<Arc<TextSimilarityIndex>>,
    combos: OnceCell<Arc<ComboIndex>>,
    lookup_permits: Arc<Semaphore>,
}

impl DeckAdvisor {
    pub fn new(
        corpus: Arc<Vec<CardRecord>>,
        db: Arc<dyn CardDatabase>,
        stats: Option<Arc<dyn GameplayStats>>,
        keyword_vocab: Option<Vec<String>>,
        config: AdvisorConfig,
    ) -> Self {
        let lookup_permits = Arc::new(Semaphore::new(config.max_concurrent_lookups.max(1)));
        let aggregator = RecommendationAggregator::new(SynergyScorer::new(config.weights));
        Self {
            corpus,
            db,
            stats,
            config,
            encoder: CardFeatureEncoder::new(keyword_vocab),
            aggregator,
            similarity: OnceCell::new(),
            combos: OnceCell::new(),
            lookup_permits,
        }
    }

    /// Build the similarity and combo indexes. Idempotent: concurrent and
    /// repeated calls share one build. Must complete before any query method.
    pub async fn initialize(&self) -> Result<(), AdvisorError> {
        self.similarity
            .get_or_try_init(|| async {
                let corpus = Arc::clone(&self.corpus);
                let index = tokio::task::spawn_blocking(move || TextSimilarityIndex::build(&corpus))
                    .await
                    .map_err(|e| anyhow!("Similarity index build panicked: {}", e))??;
                Ok::<_, anyhow::Error>(Arc::new(index))
            })
            .await?;

        self.combos
            .get_or_try_init(|| async {
                let path = self.config.combo_dataset_path.clone();
                let min_popularity = self.config.min_combo_popularity;
                let index = tokio::task::spawn_blocking(move || ComboIndex::load(&path, min_popularity))
                    .await
                    .map_err(|e| anyhow!("Combo index load panicked: {}", e))??;
                Ok::<_, anyhow::Error>(Arc::new(index))
            })
            .await?;

        Ok(())
    }

    /// The text similarity index.
    ///
    /// Panics if `initialize()` has not completed: querying an unbuilt index
    /// is a wiring bug, not a runtime condition to recover from.
    pub fn similarity_index(&self) -> &TextSimilarityIndex {
        self.similarity
            .get()
            .expect("initialize() must complete before similarity queries")
    }

    /// The combo index. Panics if `initialize()` has not completed.
    pub fn combo_index(&self) -> &ComboIndex {
        self.combos
            .get()
            .expect("initialize() must complete before combo queries")
    }

    pub fn encode_card(&self, card: &CardRecord) -> CardFeatures {
        self.encoder.encode(card)
    }

    /// Cards most similar to a named card.
    pub fn find_similar(&self, card_name: &str, n: usize) -> Vec<(String, f64)> {
        self.similarity_index().find_similar(card_name, n, true)
    }

    /// Cards most similar to free text.
    pub fn find_similar_to_text(&self, free_text: &str, n: usize) -> Vec<(String, f64)> {
        self.similarity_index().find_similar_to_text(free_text, n)
    }

    /// Cards most similar to the centroid of several named cards.
    pub fn find_similar_to_cards(&self, card_names: &[String], n: usize) -> Vec<(String, f64)> {
        self.similarity_index()
            .find_similar_to_cards(card_names, n, true)
    }

    /// Combos the deck is close to completing, plus which combos each
    /// missing card would help finish.
    pub fn find_missing_combo_pieces(
        &self,
        deck_card_names: &[String],
        max_missing: usize,
        bracket_filter: Option<Bracket>,
    ) -> (Vec<ComboMatch>, FxHashMap<String, Vec<String>>) {
        self.combo_index()
            .find_missing_pieces(deck_card_names, max_missing, 1, bracket_filter)
    }

    /// Recommend additions for a deck given as `(name, quantity)` entries.
    pub async fn recommend(
        &self,
        deck: &[(String, u32)],
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<ScoredCandidate>, AdvisorError> {
        let deck_names: Vec<String> = deck.iter().map(|(name, _)| name.clone()).collect();
        let records = self.lookup_cards(&deck_names).await?;

        let mut entries: Vec<(CardFeatures, u32)> = Vec::with_capacity(deck.len());
        for (name, quantity) in deck {
            match records.get(&name.to_lowercase()) {
                Some(record) => entries.push((self.encoder.encode(record), *quantity)),
                None => tracing::warn!("Unknown deck card skipped: {}", name),
            }
        }
        let deck_features = aggregate_deck(&entries);

        let pool = self.candidate_pool(&deck_features, &deck_names).await?;
        if cancel.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }

        let tiers = self.fetch_tiers(&pool).await;
        if cancel.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }

        // Ranking is pure CPU work; keep it off the I/O loop like the
        // index builds
        let combo_index = Arc::clone(
            self.combos
                .get()
                .expect("initialize() must complete before combo queries"),
        );
        let aggregator = self.aggregator.clone();
        let rank_deck_names = deck_names.clone();
        let rank_cancel = cancel.clone();
        let mut suggestions = tokio::task::spawn_blocking(move || {
            aggregator.build_suggestions(
                &deck_features,
                &rank_deck_names,
                &pool,
                &tiers,
                Some(combo_index.as_ref()),
                limit,
                &rank_cancel,
            )
        })
        .await
        .map_err(|e| anyhow!("Ranking pass panicked: {}", e))??;

        self.apply_observed_lifts(&deck_names, &mut suggestions).await;
        Ok(suggestions)
    }

    /// Summarize a deck's shape and combo situation.
    pub async fn deck_report(&self, deck: &[(String, u32)]) -> Result<DeckReport, AdvisorError> {
        let deck_names: Vec<String> = deck.iter().map(|(name, _)| name.clone()).collect();
        let records = self.lookup_cards(&deck_names).await?;

        let entries: Vec<(CardFeatures, u32)> = deck
            .iter()
            .filter_map(|(name, quantity)| {
                records
                    .get(&name.to_lowercase())
                    .map(|record| (self.encoder.encode(record), *quantity))
            })
            .collect();
        let features = aggregate_deck(&entries);

        let combo_index = self.combo_index();
        let (complete, _) = combo_index.find_missing_pieces(&deck_names, 0, 1, None);
        let (near_misses, _) = combo_index.find_missing_pieces(&deck_names, 1, 1, None);
        let near_miss_combos: Vec<ComboMatch> = near_misses
            .into_iter()
            .filter(|m| !m.missing_cards.is_empty())
            .collect();

        let mut colors: Vec<Color> = features.color_identity.iter().copied().collect();
        colors.sort();

        Ok(DeckReport {
            card_count: features.card_count,
            land_count: features.land_count,
            creature_count: features.creature_count,
            avg_cmc: features.avg_cmc,
            cmc_distribution: features.cmc_distribution,
            colors: colors.iter().map(|c| c.as_word().to_string()).collect(),
            dominant_tribe: features
                .dominant_tribe()
                .map(|(name, count)| (name.to_string(), count)),
            dominant_themes: features
                .dominant_themes()
                .into_iter()
                .map(|t| t.to_string())
                .collect(),
            complete_combos: complete,
            near_miss_combos,
        })
    }

    /// Batch card lookup under the lookup semaphore, keyed by lowercased name.
    async fn lookup_cards(
        &self,
        names: &[String],
    ) -> Result<FxHashMap<String, CardRecord>, AdvisorError> {
        let _permit = self
            .lookup_permits
            .acquire()
            .await
            .map_err(|e| anyhow!("Lookup semaphore closed: {}", e))?;
        Ok(self.db.get_cards_by_names(names).await?)
    }

    /// Candidate pool from the database, restricted to the deck's color
    /// identity and excluding cards already in the deck.
    async fn candidate_pool(
        &self,
        deck_features: &DeckFeatures,
        deck_names: &[String],
    ) -> Result<Vec<Candidate>, AdvisorError> {
        let mut identity: Vec<Color> = deck_features.color_identity.iter().copied().collect();
        identity.sort();
        let filters = SearchFilters {
            // A colorless deck still accepts colorless candidates
            color_identity: Some(identity),
            limit: CANDIDATE_POOL_LIMIT,
            ..SearchFilters::default()
        };

        let (records, total) = {
            let _permit = self
                .lookup_permits
                .acquire()
                .await
                .map_err(|e| anyhow!("Lookup semaphore closed: {}", e))?;
            self.db.search_cards(&filters).await?
        };
        if total > records.len() {
            tracing::debug!(
                "Candidate search matched {} cards; scoring the first {}",
                total,
                records.len()
            );
        }

        let deck_set: FxHashSet<String> = deck_names.iter().map(|n| n.to_lowercase()).collect();
        Ok(records
            .into_iter()
            .filter(|r| !deck_set.contains(&r.name.to_lowercase()))
            .map(|record| {
                let features = self.encoder.encode(&record);
                Candidate {
                    features,
                    text: record.oracle_text,
                }
            })
            .collect())
    }

    /// Fetch performance tiers for the pool, bounded by the semaphore.
    /// A failing or absent statistics source degrades to no tiers.
    async fn fetch_tiers(&self, pool: &[Candidate]) -> FxHashMap<String, PerfTier> {
        let Some(stats) = &self.stats else {
            return FxHashMap::default();
        };

        let mut tasks = JoinSet::new();
        for candidate in pool {
            let stats = Arc::clone(stats);
            let permits = Arc::clone(&self.lookup_permits);
            let name = candidate.features.name.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire().await else {
                    return None;
                };
                match stats.get_tier(&name).await {
                    Ok(Some(tier)) => Some((name, tier)),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!("Tier lookup failed for {}: {}", name, e);
                        None
                    }
                }
            });
        }

        let mut tiers = FxHashMap::default();
        while let Some(result) = tasks.join_next().await {
            if let Ok(Some((name, tier))) = result {
                tiers.insert(name, tier);
            }
        }
        tiers
    }

    /// Boost suggestions with observed gameplay lift alongside deck cards.
    /// Only well-sampled pairs count; the bonus is capped so observed lift
    /// refines the ranking rather than dominating it.
    async fn apply_observed_lifts(
        &self,
        deck_names: &[String],
        suggestions: &mut [ScoredCandidate],
    ) {
        let Some(stats) = &self.stats else {
            return;
        };
        if suggestions.is_empty() {
            return;
        }

        let mut tasks = JoinSet::new();
        for name in deck_names {
            let stats = Arc::clone(stats);
            let permits = Arc::clone(&self.lookup_permits);
            let name = name.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire().await else {
                    return (name, Vec::new());
                };
                match stats.get_synergy_pairs(&name, MIN_LIFT_SAMPLES, 1.0).await {
                    Ok(pairs) => (name, pairs),
                    Err(e) => {
                        tracing::warn!("Synergy pair lookup failed for {}: {}", name, e);
                        (name, Vec::new())
                    }
                }
            });
        }

        // Best well-sampled lift per partner, and which deck card observed it
        let mut best_lift: FxHashMap<String, (f64, String)> = FxHashMap::default();
        while let Some(result) = tasks.join_next().await {
            let Ok((deck_card, pairs)) = result else {
                continue;
            };
            for pair in pairs {
                if pair.sample_size < MIN_LIFT_SAMPLES {
                    continue;
                }
                let key = pair.partner.to_lowercase();
                let entry = best_lift
                    .entry(key)
                    .or_insert((pair.lift, deck_card.clone()));
                if pair.lift > entry.0 {
                    *entry = (pair.lift, deck_card.clone());
                }
            }
        }

        for suggestion in suggestions.iter_mut() {
            let Some((lift, deck_card)) = best_lift.get(&suggestion.name.to_lowercase()) else {
                continue;
            };
            suggestion.synergy_lift = Some(*lift);
            if *lift > 1.0 {
                suggestion.score += (LIFT_SCALE * (lift - 1.0)).min(LIFT_BONUS_CAP);
                suggestion
                    .reasons
                    .push(format!("Wins more often alongside {}", deck_card));
            }
        }

        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
    }
}

/// `CardDatabase` over an in-memory catalog. The production backing store for
/// the CLI, and the fixture-friendly one for tests.
pub struct CatalogDatabase {
    catalog: Arc<CardCatalog>,
}

impl CatalogDatabase {
    pub fn new(catalog: Arc<CardCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CardDatabase for CatalogDatabase {
    async fn get_card_by_name(&self, name: &str) -> anyhow::Result<Option<CardRecord>> {
        Ok(self.catalog.get(name).cloned())
    }

    async fn get_cards_by_names(
        &self,
        names: &[String],
    ) -> anyhow::Result<FxHashMap<String, CardRecord>> {
        Ok(names
            .iter()
            .filter_map(|name| self.catalog.get(name))
            .map(|card| (card.name.to_lowercase(), card.clone()))
            .collect())
    }

    async fn search_cards(
        &self,
        filters: &SearchFilters,
    ) -> anyhow::Result<(Vec<CardRecord>, usize)> {
        let mut total = 0usize;
        let mut page = Vec::new();
        for card in self.catalog.cards() {
            if !matches_filters(card, filters) {
                continue;
            }
            if total >= filters.offset && page.len() < filters.limit {
                page.push(card.clone());
            }
            total += 1;
        }
        Ok((page, total))
    }
}

fn matches_filters(card: &CardRecord, filters: &SearchFilters) -> bool {
    if let Some(identity) = &filters.color_identity {
        let allowed: FxHashSet<Color> = identity.iter().copied().collect();
        let within = card
            .color_identity
            .iter()
            .filter_map(|s| s.chars().next().and_then(Color::from_symbol))
            .all(|color| allowed.contains(&color));
        if !within {
            return false;
        }
    }

    if let Some(types) = &filters.types {
        let line = card.type_line.to_lowercase();
        if !types.iter().any(|t| line.contains(&t.to_lowercase())) {
            return false;
        }
    }

    if let Some(max_mv) = filters.max_mana_value {
        if card.mana_value > max_mv {
            return false;
        }
    }

    if let Some(needle) = &filters.text_contains {
        if !card
            .oracle_text
            .to_lowercase()
            .contains(&needle.to_lowercase())
        {
            return false;
        }
    }

    true
}
