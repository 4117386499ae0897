//! Text Similarity Index
//!
//! TF-IDF vector space over card text with cosine-similarity queries.
//! Built once from the full corpus, then read-only; concurrent queries need
//! no locking.
//!
//! Document construction weights name (×3), type line (×2) and subtypes (×2)
//! above oracle text, and expands mana symbols into color words so that
//! free-text queries like "red damage" can match `{R}` costs.
//!
//! Vocabulary: unigrams + bigrams, terms in fewer than 2 documents or more
//! than 95% of documents excluded, capped at 10,000 terms.

use crate::data::CardRecord;
use crate::features::card::{parse_subtypes, Color};
use ahash::AHashMap;
use anyhow::Result;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

const MIN_DOC_FREQ: u32 = 2;
const MAX_DOC_FREQ_RATIO: f64 = 0.95;
const MAX_VOCABULARY: usize = 10_000;

const NAME_WEIGHT: usize = 3;
const TYPE_WEIGHT: usize = 2;
const SUBTYPE_WEIGHT: usize = 2;

/// L2-normalized sparse TF-IDF vector; term ids sorted ascending.
#[derive(Debug, Clone, Default)]
struct SparseVector {
    terms: Vec<u32>,
    weights: Vec<f64>,
}

impl SparseVector {
    /// Dot product of two unit vectors = cosine similarity.
    fn dot(&self, other: &SparseVector) -> f64 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.terms.len() && j < other.terms.len() {
            match self.terms[i].cmp(&other.terms[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.weights[i] * other.weights[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Immutable TF-IDF index over the card corpus.
pub struct TextSimilarityIndex {
    vocabulary: AHashMap<String, u32>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
    names: Vec<String>,
    /// Exact name → document position.
    name_index: FxHashMap<String, usize>,
    /// Lowercased name → document position (fallback lookup).
    name_index_lower: FxHashMap<String, usize>,
}

impl TextSimilarityIndex {
    /// Build the index over the full corpus. One-time, CPU-bound.
    pub fn build(cards: &[CardRecord]) -> Result<Self> {
        let start = std::time::Instant::now();
        let n_docs = cards.len();

        // Tokenize every document once
        let documents: Vec<Vec<String>> = cards.par_iter().map(document_terms).collect();

        // Document frequencies
        let mut doc_freq: FxHashMap<&str, u32> = FxHashMap::default();
        for doc in &documents {
            let unique: FxHashSet<&str> = doc.iter().map(|t| t.as_str()).collect();
            for term in unique {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        // Filter by document frequency, then cap the vocabulary keeping the
        // most frequent terms (ties broken by term order for stable rebuilds)
        let max_df = (MAX_DOC_FREQ_RATIO * n_docs as f64).floor() as u32;
        let mut kept: Vec<(&str, u32)> = doc_freq
            .iter()
            .filter(|(_, df)| **df >= MIN_DOC_FREQ && **df <= max_df.max(MIN_DOC_FREQ))
            .map(|(term, df)| (*term, *df))
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        kept.truncate(MAX_VOCABULARY);
        kept.sort_by(|a, b| a.0.cmp(b.0));

        let mut vocabulary = AHashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (term_id, (term, df)) in kept.iter().enumerate() {
            vocabulary.insert(term.to_string(), term_id as u32);
            // Smoothed idf keeps every kept term's weight positive
            idf.push(((1.0 + n_docs as f64) / (1.0 + *df as f64)).ln() + 1.0);
        }

        // Per-document sparse vectors
        let vectors: Vec<SparseVector> = documents
            .par_iter()
            .map(|doc| vectorize_counts(term_counts(doc, &vocabulary), &idf))
            .collect();

        let mut names = Vec::with_capacity(n_docs);
        let mut name_index = FxHashMap::default();
        let mut name_index_lower = FxHashMap::default();
        for (idx, card) in cards.iter().enumerate() {
            names.push(card.name.clone());
            name_index.entry(card.name.clone()).or_insert(idx);
            name_index_lower.entry(card.name.to_lowercase()).or_insert(idx);
        }

        tracing::info!(
            "Text similarity index built in {:?} ({} cards, {} terms)",
            start.elapsed(),
            n_docs,
            vocabulary.len()
        );

        Ok(Self {
            vocabulary,
            idf,
            vectors,
            names,
            name_index,
            name_index_lower,
        })
    }

    /// Number of indexed cards.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Resolve a card name: exact match first, then case-insensitive.
    fn resolve(&self, name: &str) -> Option<usize> {
        self.name_index
            .get(name)
            .or_else(|| self.name_index_lower.get(&name.to_lowercase()))
            .copied()
    }

    /// Cards most similar to a named card.
    ///
    /// Unknown names yield an empty list (not-found is not an error here).
    /// Ties keep corpus order; scores are cosine values in [0, 1].
    pub fn find_similar(&self, card_name: &str, n: usize, exclude_self: bool) -> Vec<(String, f64)> {
        let Some(query_idx) = self.resolve(card_name) else {
            return Vec::new();
        };

        let exclude = if exclude_self { Some(query_idx) } else { None };
        self.rank_against(&self.vectors[query_idx], n, |idx| Some(idx) == exclude)
    }

    /// Cards most similar to free text, projected through the fitted
    /// vocabulary. Out-of-vocabulary terms contribute nothing.
    pub fn find_similar_to_text(&self, free_text: &str, n: usize) -> Vec<(String, f64)> {
        let mut terms = ngrams(&tokenize(free_text));
        // Expand mana symbols in queries too, so "{R}" behaves like "red"
        terms.extend(ngrams(&tokenize(&expand_mana_symbols(free_text))));

        let query = vectorize_counts(term_counts(&terms, &self.vocabulary), &self.idf);
        if query.is_zero() {
            return Vec::new();
        }
        self.rank_against(&query, n, |_| false)
    }

    /// Cards most similar to the centroid of several named cards.
    ///
    /// Unknown names are skipped; if none resolve, the result is empty.
    pub fn find_similar_to_cards(
        &self,
        card_names: &[String],
        n: usize,
        exclude_input: bool,
    ) -> Vec<(String, f64)> {
        let input: Vec<usize> = card_names.iter().filter_map(|n| self.resolve(n)).collect();
        if input.is_empty() {
            return Vec::new();
        }

        // Arithmetic mean of the member vectors
        let mut accum: FxHashMap<u32, f64> = FxHashMap::default();
        for idx in &input {
            let vector = &self.vectors[*idx];
            for (term, weight) in vector.terms.iter().zip(&vector.weights) {
                *accum.entry(*term).or_default() += *weight;
            }
        }
        let count = input.len() as f64;
        let mut terms: Vec<(u32, f64)> = accum
            .into_iter()
            .map(|(term, sum)| (term, sum / count))
            .collect();
        terms.sort_by_key(|(term, _)| *term);

        let centroid = normalize(terms);
        if centroid.is_zero() {
            return Vec::new();
        }

        let excluded: FxHashSet<usize> = if exclude_input {
            input.into_iter().collect()
        } else {
            FxHashSet::default()
        };
        self.rank_against(&centroid, n, |idx| excluded.contains(&idx))
    }

    /// Score the query vector against every document and return the top `n`.
    ///
    /// The scan is parallel but results are assembled in corpus order before
    /// the stable sort, so equal scores keep a deterministic order.
    fn rank_against<F>(&self, query: &SparseVector, n: usize, skip: F) -> Vec<(String, f64)>
    where
        F: Fn(usize) -> bool,
    {
        let scores: Vec<f64> = self
            .vectors
            .par_iter()
            .map(|vector| query.dot(vector))
            .collect();

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !skip(*idx))
            .collect();
        // sort_by is stable: ties stay in corpus order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);

        ranked
            .into_iter()
            .map(|(idx, score)| (self.names[idx].clone(), score))
            .collect()
    }
}

/// Weighted unigram+bigram terms for one card document.
fn document_terms(card: &CardRecord) -> Vec<String> {
    let mut terms = Vec::new();

    let name_tokens = tokenize(&card.name);
    for _ in 0..NAME_WEIGHT {
        terms.extend(ngrams(&name_tokens));
    }

    let type_tokens = tokenize(&card.type_line);
    for _ in 0..TYPE_WEIGHT {
        terms.extend(ngrams(&type_tokens));
    }

    let subtype_tokens: Vec<String> = parse_subtypes(&card.type_line)
        .iter()
        .flat_map(|s| tokenize(s))
        .collect();
    for _ in 0..SUBTYPE_WEIGHT {
        terms.extend(ngrams(&subtype_tokens));
    }

    let keyword_tokens: Vec<String> = card.keywords.iter().flat_map(|k| tokenize(k)).collect();
    terms.extend(ngrams(&keyword_tokens));

    let oracle = expand_mana_symbols(&card.oracle_text);
    terms.extend(ngrams(&tokenize(&oracle)));
    // Cost pips also carry color concepts
    terms.extend(tokenize(&expand_mana_symbols(&card.mana_cost)));

    terms
}

/// Replace `{...}` mana symbols with color words; other symbols drop out.
fn expand_mana_symbols(text: &str) -> String {
    if !text.contains('{') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut in_symbol = false;
    for ch in text.chars() {
        match ch {
            '{' => in_symbol = true,
            '}' => in_symbol = false,
            c if in_symbol => {
                if let Some(color) = Color::from_symbol(c) {
                    out.push(' ');
                    out.push_str(color.as_word());
                    out.push(' ');
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Lowercase, strip punctuation to spaces, split on whitespace.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '+' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() > 1 || t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| t.to_string())
        .collect()
}

/// Unigrams plus adjacent bigrams over one token stream.
fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    terms.extend(tokens.iter().cloned());
    for window in tokens.windows(2) {
        terms.push(format!("{} {}", window[0], window[1]));
    }
    terms
}

/// Term-frequency counts restricted to the fitted vocabulary.
fn term_counts(terms: &[String], vocabulary: &AHashMap<String, u32>) -> FxHashMap<u32, u32> {
    let mut counts = FxHashMap::default();
    for term in terms {
        if let Some(term_id) = vocabulary.get(term) {
            *counts.entry(*term_id).or_default() += 1;
        }
    }
    counts
}

/// tf × idf, then L2 normalization.
fn vectorize_counts(counts: FxHashMap<u32, u32>, idf: &[f64]) -> SparseVector {
    let mut weighted: Vec<(u32, f64)> = counts
        .into_iter()
        .map(|(term_id, tf)| (term_id, tf as f64 * idf[term_id as usize]))
        .collect();
    weighted.sort_by_key(|(term_id, _)| *term_id);
    normalize(weighted)
}

fn normalize(weighted: Vec<(u32, f64)>) -> SparseVector {
    let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm == 0.0 {
        return SparseVector::default();
    }
    let mut terms = Vec::with_capacity(weighted.len());
    let mut weights = Vec::with_capacity(weighted.len());
    for (term_id, weight) in weighted {
        terms.push(term_id);
        weights.push(weight / norm);
    }
    SparseVector { terms, weights }
}
