// PerfSleuth - core/recommend.rs
//
// Population-wide scoring and configuration ranking.
// Core layer: pure reduction over an already-collected batch of results.
// Must only run after extraction of the whole batch has finished, because
// the normalisation bases are statistics over the complete population.
//
// Selection is deterministic: ties go to the record that appears first in
// the input, so the input order is never re-sorted.

use crate::core::model::{
    Criterion, PerfResult, ProfileName, Recommendation, RecommendationSet, ScoredResult, TestType,
};
use crate::util::constants::{
    CONSISTENCY_PENALTY_PER_RATIO, MAX_SCORE, WEIGHT_SUM_TOLERANCE,
};
use crate::util::error::RecommendError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Weights
// =============================================================================

/// Weight triple for one composite score profile. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub throughput: f64,
    pub latency: f64,
    pub consistency: f64,
}

impl ScoreWeights {
    pub const fn new(throughput: f64, latency: f64, consistency: f64) -> Self {
        Self {
            throughput,
            latency,
            consistency,
        }
    }

    pub fn sum(&self) -> f64 {
        self.throughput + self.latency + self.consistency
    }

    /// Every weight in 0.0-1.0 and the sum within tolerance of 1.0.
    pub fn is_valid(&self) -> bool {
        let in_range = |w: f64| (0.0..=1.0).contains(&w);
        in_range(self.throughput)
            && in_range(self.latency)
            && in_range(self.consistency)
            && (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Weighted sum of the sub-scores. An undefined consistency score
    /// contributes nothing.
    pub fn composite(&self, throughput: f64, latency: f64, consistency: Option<f64>) -> f64 {
        self.throughput * throughput
            + self.latency * latency
            + self.consistency * consistency.unwrap_or(0.0)
    }
}

/// Weights for every profile. Data, not logic: substitute freely.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub max_throughput: ScoreWeights,
    pub balanced: ScoreWeights,
    pub low_latency: ScoreWeights,
    /// Applied only to the `acks=all` subpopulation.
    pub durability: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_throughput: ScoreWeights::new(0.70, 0.20, 0.10),
            balanced: ScoreWeights::new(0.40, 0.40, 0.20),
            low_latency: ScoreWeights::new(0.20, 0.60, 0.20),
            durability: ScoreWeights::new(0.40, 0.40, 0.20),
        }
    }
}

impl ScoringConfig {
    pub fn weights(&self, profile: ProfileName) -> ScoreWeights {
        match profile {
            ProfileName::MaxThroughput => self.max_throughput,
            ProfileName::Balanced => self.balanced,
            ProfileName::LowLatency => self.low_latency,
            ProfileName::Durability => self.durability,
        }
    }

    pub fn set_weights(&mut self, profile: ProfileName, weights: ScoreWeights) {
        match profile {
            ProfileName::MaxThroughput => self.max_throughput = weights,
            ProfileName::Balanced => self.balanced = weights,
            ProfileName::LowLatency => self.low_latency = weights,
            ProfileName::Durability => self.durability = weights,
        }
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Normalisation bases over one population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationBases {
    pub max_throughput: f64,
    pub max_latency: f64,
    pub min_latency: f64,
}

/// Scored records of one test type, in input order.
#[derive(Debug, Clone)]
pub struct ScoredPopulation {
    pub test_type: TestType,
    pub bases: PopulationBases,
    pub records: Vec<ScoredResult>,
}

/// Score every usable result of `test_type` against the others.
///
/// Results without metrics and results of the other test type are filtered
/// out first. Fails with `EmptyPopulation` when nothing is left.
pub fn score_population(
    test_type: TestType,
    results: &[PerfResult],
    config: &ScoringConfig,
) -> Result<ScoredPopulation, RecommendError> {
    let population: Vec<&PerfResult> = results
        .iter()
        .filter(|r| r.test_type == test_type && r.is_usable())
        .collect();

    if population.is_empty() {
        return Err(RecommendError::EmptyPopulation {
            test_type: test_type.label(),
        });
    }

    let bases = compute_bases(&population);

    let records = population
        .into_iter()
        .map(|r| score_record(r, &bases, config))
        .collect();

    Ok(ScoredPopulation {
        test_type,
        bases,
        records,
    })
}

fn compute_bases(population: &[&PerfResult]) -> PopulationBases {
    let mut max_throughput = 0.0_f64;
    let mut max_latency = 0.0_f64;
    let mut min_latency = f64::INFINITY;

    for m in population.iter().filter_map(|r| r.metrics.as_ref()) {
        max_throughput = max_throughput.max(m.throughput_mb());
        max_latency = max_latency.max(m.latency_ms());
        min_latency = min_latency.min(m.latency_ms());
    }

    PopulationBases {
        max_throughput,
        max_latency,
        min_latency: if min_latency.is_finite() { min_latency } else { 0.0 },
    }
}

fn score_record(result: &PerfResult, bases: &PopulationBases, config: &ScoringConfig) -> ScoredResult {
    // Only usable results reach here.
    let (throughput, latency, tail) = match result.metrics.as_ref() {
        Some(m) => (m.throughput_mb(), m.latency_ms(), m.tail_latency_ms()),
        None => (0.0, 0.0, None),
    };

    let throughput_score = throughput_score(throughput, bases);
    let latency_score = latency_score(latency, bases);
    let consistency_score = consistency_score(latency, tail);

    let durable = result.is_durable();
    let composite_scores: BTreeMap<ProfileName, f64> = ProfileName::all()
        .iter()
        .filter(|p| **p != ProfileName::Durability || durable)
        .map(|p| {
            let score =
                config
                    .weights(*p)
                    .composite(throughput_score, latency_score, consistency_score);
            (*p, score)
        })
        .collect();

    tracing::trace!(
        file = %result.source_path.display(),
        throughput_score,
        latency_score,
        consistency_score = ?consistency_score,
        "Scored record"
    );

    ScoredResult {
        result: result.clone(),
        throughput_score,
        latency_score,
        consistency_score,
        composite_scores,
    }
}

/// `100 * throughput / max_throughput`; 0 when the base is 0.
pub fn throughput_score(throughput: f64, bases: &PopulationBases) -> f64 {
    if bases.max_throughput > 0.0 {
        MAX_SCORE * throughput / bases.max_throughput
    } else {
        0.0
    }
}

/// `100 * (1 - (latency - min_latency) / max_latency)`; 0 when the base is 0.
///
/// The lowest latency in the population scores 100 and every other record
/// loses points in proportion to its distance from it, measured in units of
/// the worst latency. Anchoring at the minimum is what gives a single-record
/// population a latency score of 100; the unanchored `1 - latency / max`
/// would score it 0.
pub fn latency_score(latency: f64, bases: &PopulationBases) -> f64 {
    if bases.max_latency > 0.0 {
        MAX_SCORE * (1.0 - (latency - bases.min_latency) / bases.max_latency)
    } else {
        0.0
    }
}

/// `clamp(100 - (p99/avg - 1) * 20, 0, 100)`; undefined without a p99 or
/// with a zero average.
pub fn consistency_score(avg_latency: f64, p99: Option<f64>) -> Option<f64> {
    let p99 = p99?;
    if avg_latency <= 0.0 {
        return None;
    }
    let ratio = p99 / avg_latency;
    Some((MAX_SCORE - (ratio - 1.0) * CONSISTENCY_PENALTY_PER_RATIO).clamp(0.0, MAX_SCORE))
}

// =============================================================================
// Selection
// =============================================================================

/// Index and value of the greatest key; the earliest record wins ties.
fn argmax<F>(records: &[ScoredResult], key: F) -> Option<(usize, f64)>
where
    F: Fn(&ScoredResult) -> Option<f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, record) in records.iter().enumerate() {
        let Some(value) = key(record) else { continue };
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}

/// Index and value of the smallest key; the earliest record wins ties.
fn argmin<F>(records: &[ScoredResult], key: F) -> Option<(usize, f64)>
where
    F: Fn(&ScoredResult) -> Option<f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, record) in records.iter().enumerate() {
        let Some(value) = key(record) else { continue };
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}

fn raw_throughput(r: &ScoredResult) -> Option<f64> {
    r.result.metrics.as_ref().map(|m| m.throughput_mb())
}

fn raw_latency(r: &ScoredResult) -> Option<f64> {
    r.result.metrics.as_ref().map(|m| m.latency_ms())
}

fn pick_profile(records: &[ScoredResult], profile: ProfileName) -> Option<Recommendation> {
    argmax(records, |r| r.composite(profile)).map(|(idx, score)| Recommendation {
        criterion: Criterion::Composite(profile),
        score,
        record: records[idx].clone(),
    })
}

/// Run every selection rule over an already-scored population.
pub fn select(population: ScoredPopulation) -> RecommendationSet {
    let records = population.records;

    let best_throughput = argmax(&records, raw_throughput).map(|(idx, _)| Recommendation {
        criterion: Criterion::HighestThroughput,
        score: records[idx].throughput_score,
        record: records[idx].clone(),
    });

    let best_latency = argmin(&records, raw_latency).map(|(idx, _)| Recommendation {
        criterion: Criterion::LowestLatency,
        score: records[idx].latency_score,
        record: records[idx].clone(),
    });

    // Only durable records carry a Durability composite, so the argmax is
    // restricted to the acks=all subset without filtering here.
    let durability_pick = pick_profile(&records, ProfileName::Durability);

    RecommendationSet {
        test_type: population.test_type,
        population: records.len(),
        max_throughput: population.bases.max_throughput,
        max_latency: population.bases.max_latency,
        min_latency: population.bases.min_latency,
        best_throughput,
        best_latency,
        balanced: pick_profile(&records, ProfileName::Balanced),
        low_latency_pick: pick_profile(&records, ProfileName::LowLatency),
        max_throughput_pick: pick_profile(&records, ProfileName::MaxThroughput),
        durability_pick,
        scored: records,
    }
}

/// Score and select for one test type.
pub fn recommend_for(
    test_type: TestType,
    results: &[PerfResult],
    config: &ScoringConfig,
) -> Result<RecommendationSet, RecommendError> {
    let population = score_population(test_type, results, config)?;

    tracing::info!(
        %test_type,
        population = population.records.len(),
        max_throughput = population.bases.max_throughput,
        max_latency = population.bases.max_latency,
        "Scoring population"
    );

    let set = select(population);

    if set.durability_pick.is_none() {
        tracing::info!(%test_type, "No acks=all runs; durability recommendation unavailable");
    }

    Ok(set)
}

/// Independent recommendation outcomes per test type. One type failing
/// never affects the other.
#[derive(Debug, Clone)]
pub struct Recommendations {
    pub producer: Result<RecommendationSet, RecommendError>,
    pub consumer: Result<RecommendationSet, RecommendError>,
}

impl Recommendations {
    pub fn get(&self, test_type: TestType) -> &Result<RecommendationSet, RecommendError> {
        match test_type {
            TestType::Producer => &self.producer,
            TestType::Consumer => &self.consumer,
        }
    }
}

/// Recommend with the default weight table.
pub fn recommend(results: &[PerfResult]) -> Recommendations {
    recommend_with(results, &ScoringConfig::default())
}

/// Recommend for both test types over disjoint subpopulations.
pub fn recommend_with(results: &[PerfResult], config: &ScoringConfig) -> Recommendations {
    let outcome = |test_type: TestType| {
        let outcome = recommend_for(test_type, results, config);
        if let Err(ref e) = outcome {
            tracing::warn!(%test_type, error = %e, "Recommendation unavailable");
        }
        outcome
    };

    Recommendations {
        producer: outcome(TestType::Producer),
        consumer: outcome(TestType::Consumer),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ConsumerMetrics, Configuration, Metrics, ProducerMetrics};
    use chrono::Utc;
    use std::path::PathBuf;

    const TOLERANCE: f64 = 0.01;

    fn producer(name: &str, acks: &str, mb: f64, avg: f64, p99: Option<u64>) -> PerfResult {
        let mut configuration = Configuration::new();
        configuration.insert("acks".to_string(), acks.to_string());
        PerfResult {
            test_type: TestType::Producer,
            configuration,
            metrics: Some(Metrics::Producer(ProducerMetrics {
                records_sent: 1_000_000,
                throughput_rps: mb * 1024.0,
                throughput_mb: mb,
                avg_latency_ms: avg,
                max_latency_ms: avg * 2.0,
                p50_ms: None,
                p95_ms: None,
                p99_ms: p99,
                p999_ms: None,
            })),
            source_path: PathBuf::from(format!("producer_{name}.log")),
            parsed_at: Utc::now(),
            failure: None,
        }
    }

    fn consumer(name: &str, mb_sec: f64, rebalance: f64) -> PerfResult {
        PerfResult {
            test_type: TestType::Consumer,
            configuration: Configuration::new(),
            metrics: Some(Metrics::Consumer(ConsumerMetrics {
                start_time: "2024-08-28 12:00:45:269".to_string(),
                end_time: "2024-08-28 12:01:53:199".to_string(),
                data_consumed_mb: 1953.125,
                throughput_mb_sec: mb_sec,
                num_messages: 1_000_000,
                throughput_msg_sec: 14721.0,
                rebalance_time_ms: rebalance,
                fetch_time_ms: 64600.0,
                fetch_mb_sec: 30.2,
                fetch_msg_sec: 15479.8,
            })),
            source_path: PathBuf::from(format!("consumer_{name}.log")),
            parsed_at: Utc::now(),
            failure: None,
        }
    }

    fn unusable(test_type: TestType) -> PerfResult {
        PerfResult {
            test_type,
            configuration: Configuration::new(),
            metrics: None,
            source_path: PathBuf::from("producer_broken.log"),
            parsed_at: Utc::now(),
            failure: None,
        }
    }

    fn picked(rec: &Option<Recommendation>) -> &str {
        rec.as_ref()
            .and_then(|r| r.record.result.source_path.to_str())
            .unwrap_or("<absent>")
    }

    fn reference_population() -> Vec<PerfResult> {
        vec![
            producer("a", "0", 96.71, 880.66, Some(1355)),
            producer("b", "all", 28.59, 3182.27, Some(3568)),
        ]
    }

    #[test]
    fn test_default_weights_are_valid() {
        let config = ScoringConfig::default();
        for p in ProfileName::all() {
            assert!(config.weights(*p).is_valid(), "{p} weights invalid");
        }
        assert!(!ScoreWeights::new(0.5, 0.5, 0.5).is_valid());
        assert!(!ScoreWeights::new(1.2, -0.2, 0.0).is_valid());
    }

    #[test]
    fn test_reference_scenario() {
        let set = recommend_for(TestType::Producer, &reference_population(), &ScoringConfig::default())
            .unwrap();

        assert_eq!(picked(&set.best_throughput), "producer_a.log");
        assert_eq!(picked(&set.best_latency), "producer_a.log");
        assert_eq!(picked(&set.durability_pick), "producer_b.log");
        assert_eq!(picked(&set.balanced), "producer_a.log");

        let a = &set.scored[0];
        assert!((a.throughput_score - 100.0).abs() < TOLERANCE);
        assert!((a.latency_score - 100.0).abs() < TOLERANCE);
        let consistency = a.consistency_score.unwrap();
        assert!((consistency - 89.2276).abs() < TOLERANCE, "{consistency}");

        let balanced = a.composite(ProfileName::Balanced).unwrap();
        let manual = 0.4 * 100.0 + 0.4 * 100.0 + 0.2 * consistency;
        assert!((balanced - manual).abs() < TOLERANCE);
        assert!((balanced - 97.8455).abs() < TOLERANCE, "{balanced}");

        let b = &set.scored[1];
        assert!((b.throughput_score - 29.5626).abs() < TOLERANCE);
        assert!((b.latency_score - 27.6740).abs() < TOLERANCE);
        assert!((b.consistency_score.unwrap() - 97.5758).abs() < TOLERANCE);
        assert!((b.composite(ProfileName::Durability).unwrap() - 42.4098).abs() < TOLERANCE);
        assert!(a.composite(ProfileName::Durability).is_none());
    }

    #[test]
    fn test_single_record_population_scores_full_marks() {
        let results = vec![producer("solo", "1", 12.5, 40.0, Some(60))];
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        assert_eq!(set.scored[0].throughput_score, 100.0);
        assert_eq!(set.scored[0].latency_score, 100.0);
    }

    #[test]
    fn test_zero_bases_score_zero() {
        let results = vec![
            producer("a", "1", 0.0, 0.0, Some(0)),
            producer("b", "1", 0.0, 0.0, None),
        ];
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        for r in &set.scored {
            assert_eq!(r.throughput_score, 0.0);
            assert_eq!(r.latency_score, 0.0);
            assert_eq!(r.consistency_score, None);
        }
        // All composites tie at 0; the first record wins.
        assert_eq!(picked(&set.balanced), "producer_a.log");
    }

    #[test]
    fn test_durability_absent_without_acks_all() {
        let results = vec![
            producer("a", "0", 10.0, 5.0, Some(6)),
            producer("b", "1", 20.0, 9.0, Some(12)),
        ];
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        assert!(set.durability_pick.is_none());
        assert!(set.balanced.is_some());
    }

    #[test]
    fn test_throughput_tie_goes_to_first() {
        let results = vec![
            producer("first", "1", 50.0, 10.0, None),
            producer("second", "1", 50.0, 5.0, None),
        ];
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        assert_eq!(picked(&set.best_throughput), "producer_first.log");
        assert_eq!(picked(&set.best_latency), "producer_second.log");
    }

    #[test]
    fn test_latency_tie_goes_to_first() {
        let results = vec![
            producer("x", "1", 10.0, 7.0, None),
            producer("y", "1", 20.0, 7.0, None),
        ];
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        assert_eq!(picked(&set.best_latency), "producer_x.log");
    }

    #[test]
    fn test_unusable_results_excluded_from_bases() {
        let mut results = reference_population();
        results.insert(0, unusable(TestType::Producer));
        let set = recommend_for(TestType::Producer, &results, &ScoringConfig::default()).unwrap();
        assert_eq!(set.population, 2);
        assert_eq!(set.max_throughput, 96.71);
    }

    #[test]
    fn test_empty_population_is_per_type() {
        let results = reference_population();
        let recs = recommend(&results);
        assert!(recs.producer.is_ok());
        assert_eq!(
            recs.consumer.unwrap_err(),
            RecommendError::EmptyPopulation {
                test_type: "consumer"
            }
        );

        let only_broken = vec![unusable(TestType::Producer)];
        assert!(recommend(&only_broken).producer.is_err());
    }

    #[test]
    fn test_consumer_population_uses_rebalance_time() {
        let results = vec![consumer("slow", 20.0, 5000.0), consumer("fast", 30.0, 1000.0)];
        let set = recommend_for(TestType::Consumer, &results, &ScoringConfig::default()).unwrap();
        assert_eq!(picked(&set.best_throughput), "consumer_fast.log");
        assert_eq!(picked(&set.best_latency), "consumer_fast.log");
        assert!(set.scored.iter().all(|r| r.consistency_score.is_none()));
        assert!(set.durability_pick.is_none());
    }

    #[test]
    fn test_custom_weights_change_pick() {
        // a: fast but inconsistent; b: slower but steady.
        let results = vec![
            producer("a", "1", 100.0, 10.0, Some(60)),
            producer("b", "1", 80.0, 10.0, Some(20)),
        ];
        let mut config = ScoringConfig::default();
        let default_set = recommend_for(TestType::Producer, &results, &config).unwrap();
        assert_eq!(picked(&default_set.max_throughput_pick), "producer_a.log");

        config.set_weights(ProfileName::MaxThroughput, ScoreWeights::new(0.1, 0.1, 0.8));
        let custom = recommend_for(TestType::Producer, &results, &config).unwrap();
        assert_eq!(picked(&custom.max_throughput_pick), "producer_b.log");
    }

    #[test]
    fn test_consistency_score_clamps() {
        assert_eq!(consistency_score(10.0, Some(10.0)), Some(100.0));
        assert_eq!(consistency_score(10.0, Some(1000.0)), Some(0.0));
        assert_eq!(consistency_score(10.0, Some(5.0)), Some(100.0));
        assert_eq!(consistency_score(0.0, Some(5.0)), None);
        assert_eq!(consistency_score(10.0, None), None);
    }
}
