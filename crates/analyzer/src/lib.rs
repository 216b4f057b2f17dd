use crate::error::AnalyzerError;
use analytics::{Aggregation, BinStatistic, HitGroup, HitStudy, OutcomeProfile, run_hit_study};
use configuration::{HitStudyConfig, ScoreWeights, ScoringConfig};
use core_types::{BinIndex, Observation, SymbolOutcome};
use serde::Serialize;
use std::cmp::Ordering;

pub mod error;

/// Anything that carries an outcome profile can be scored.
pub trait Scored {
    fn outcome(&self) -> Option<&OutcomeProfile>;
}

impl Scored for BinStatistic {
    fn outcome(&self) -> Option<&OutcomeProfile> {
        self.outcome.as_ref()
    }
}

impl Scored for HitGroup {
    fn outcome(&self) -> Option<&OutcomeProfile> {
        Some(&self.outcome)
    }
}

/// A bin together with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBin {
    pub bin: BinIndex,
    pub score: f64,
    pub statistic: BinStatistic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHitGroup {
    pub hits: usize,
    pub score: f64,
    pub group: HitGroup,
}

/// Hit groups in score order, with the study's count of symbols lacking an outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHitStudy {
    pub groups: Vec<RankedHitGroup>,
    pub unmatched: usize,
}

/// Weighted score of a return profile:
/// `(w_gain * gain - w_loss * loss + w_hit * 100 * hit_probability) / (w_gain + w_loss + w_hit)`.
///
/// The hit probability is scaled to percent so that all three terms share a unit.
/// Returns `Ok(None)` for a subject without observations.
pub fn composite_score(
    subject: &impl Scored,
    weights: &ScoreWeights,
) -> Result<Option<f64>, AnalyzerError> {
    check_weights(weights)?;
    Ok(subject.outcome().map(|outcome| weighted(outcome, weights)))
}

fn check_weights(weights: &ScoreWeights) -> Result<(), AnalyzerError> {
    weights
        .validate()
        .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))
}

fn weighted(outcome: &OutcomeProfile, w: &ScoreWeights) -> f64 {
    let numerator = w.expected_gain * outcome.expected_gain - w.expected_loss * outcome.expected_loss
        + w.hit_probability * 100.0 * outcome.hit_probability;
    numerator / w.sum()
}

/// Scores and ranks bins or hit groups with one validated set of weights.
pub struct Analyzer {
    weights: ScoreWeights,
}

impl Analyzer {
    pub fn new(config: &ScoringConfig) -> Result<Self, AnalyzerError> {
        check_weights(&config.weights)?;
        Ok(Self {
            weights: config.weights,
        })
    }

    pub fn score(&self, subject: &impl Scored) -> Option<f64> {
        subject.outcome().map(|outcome| weighted(outcome, &self.weights))
    }

    /// Scores every populated bin, best first. Empty bins have no score and are left out.
    /// Equal scores keep ascending bin order.
    pub fn rank_bins(&self, aggregation: &Aggregation) -> Vec<RankedBin> {
        let mut ranked: Vec<RankedBin> = aggregation
            .bins
            .values()
            .filter_map(|stat| {
                self.score(stat).map(|score| RankedBin {
                    bin: stat.bin,
                    score,
                    statistic: stat.clone(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| by_score_desc(a.score, b.score).then(a.bin.cmp(&b.bin)));
        tracing::debug!(
            ranked = ranked.len(),
            populated = aggregation.bins.len(),
            "Bins ranked."
        );
        ranked
    }

    pub fn rank_hit_groups(&self, study: &HitStudy) -> Vec<RankedHitGroup> {
        let mut ranked: Vec<RankedHitGroup> = study
            .groups
            .iter()
            .filter_map(|group| {
                self.score(group).map(|score| RankedHitGroup {
                    hits: group.hits,
                    score,
                    group: group.clone(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| by_score_desc(a.score, b.score).then(b.hits.cmp(&a.hits)));
        ranked
    }

    /// Runs the hit-count study and ranks its groups.
    pub fn run_hit_study(
        &self,
        observations: &[Observation],
        outcomes: &[SymbolOutcome],
        config: &HitStudyConfig,
    ) -> Result<RankedHitStudy, AnalyzerError> {
        let study = run_hit_study(observations, outcomes, config)?;
        Ok(RankedHitStudy {
            groups: self.rank_hit_groups(&study),
            unmatched: study.unmatched,
        })
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::{Aggregator, BinningScheme};
    use core_types::{Metric, ReportMonth};

    fn weights(gain: f64, loss: f64, hit: f64) -> ScoreWeights {
        ScoreWeights {
            expected_gain: gain,
            expected_loss: loss,
            hit_probability: hit,
        }
    }

    fn stat_with(outcome: OutcomeProfile) -> BinStatistic {
        let mut stat = BinStatistic::empty(&BinningScheme::default(), BinIndex(0));
        stat.count = 1;
        stat.outcome = Some(outcome);
        stat
    }

    #[test]
    fn score_follows_the_weighted_formula() {
        let stat = stat_with(OutcomeProfile {
            expected_gain: 30.0,
            expected_loss: 10.0,
            hit_probability: 0.4,
        });
        let score = composite_score(&stat, &weights(1.0, 1.0, 2.0)).unwrap().unwrap();
        // (30 - 10 + 2 * 40) / 4
        assert!((score - 25.0).abs() < 1e-12);
    }

    #[test]
    fn score_never_falls_as_hit_probability_rises() {
        let w = weights(0.5, 1.5, 1.0);
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=20 {
            let stat = stat_with(OutcomeProfile {
                expected_gain: 12.0,
                expected_loss: 7.0,
                hit_probability: step as f64 / 20.0,
            });
            let score = composite_score(&stat, &w).unwrap().unwrap();
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn empty_bin_has_no_score() {
        let stat = BinStatistic::empty(&BinningScheme::default(), BinIndex(-2));
        assert_eq!(composite_score(&stat, &weights(1.0, 1.0, 1.0)), Ok(None));
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let stat = BinStatistic::empty(&BinningScheme::default(), BinIndex(0));
        for w in [
            weights(-1.0, 1.0, 1.0),
            weights(0.0, 0.0, 0.0),
            weights(f64::NAN, 1.0, 1.0),
            weights(1.0, f64::INFINITY, 1.0),
            weights(1e308, 1e308, 1e308),
        ] {
            assert!(matches!(
                composite_score(&stat, &w),
                Err(AnalyzerError::InvalidConfig(_))
            ));
            assert!(Analyzer::new(&ScoringConfig { weights: w }).is_err());
        }
    }

    #[test]
    fn bins_rank_best_first() {
        let obs = |symbol: &str, ret: f64| {
            Observation::new(
                symbol,
                ReportMonth::new(2024, 1).unwrap(),
                Some(10.0),
                None,
                Some(ret),
            )
        };
        let data = vec![obs("A", -45.0), obs("B", -5.0), obs("C", 150.0), obs("D", 50.0)];
        let aggregation = Aggregator::new(BinningScheme::default(), 0.0, 20.0)
            .unwrap()
            .aggregate(&data, Metric::Yoy);

        let analyzer = Analyzer::new(&ScoringConfig {
            weights: weights(1.0, 1.0, 1.0),
        })
        .unwrap();
        let order: Vec<i64> = analyzer
            .rank_bins(&aggregation)
            .iter()
            .map(|r| r.bin.0)
            .collect();
        assert_eq!(order, vec![1, 0, -1, -5]);
    }

    #[test]
    fn hit_study_errors_pass_through() {
        let analyzer = Analyzer::new(&ScoringConfig {
            weights: weights(1.0, 1.0, 1.0),
        })
        .unwrap();
        let config = HitStudyConfig {
            low: 50.0,
            high: 10.0,
            ..HitStudyConfig::default()
        };
        assert!(matches!(
            analyzer.run_hit_study(&[], &[], &config),
            Err(AnalyzerError::Analytics(_))
        ));
    }

    #[test]
    fn hit_groups_rank_by_score() {
        let obs = |symbol: &str, month: u32| {
            Observation::new(
                symbol,
                ReportMonth::new(2024, month).unwrap(),
                Some(150.0),
                None,
                None,
            )
        };
        let outcome = |symbol: &str, ret: f64| SymbolOutcome {
            symbol: symbol.to_string(),
            return_pct: ret,
        };
        let observations = vec![obs("A", 1), obs("A", 2), obs("B", 1)];
        let outcomes = vec![outcome("A", -10.0), outcome("B", 80.0)];

        let analyzer = Analyzer::new(&ScoringConfig {
            weights: weights(1.0, 1.0, 1.0),
        })
        .unwrap();
        let ranked = analyzer
            .run_hit_study(&observations, &outcomes, &HitStudyConfig::default())
            .unwrap();
        let hits: Vec<usize> = ranked.groups.iter().map(|r| r.hits).collect();
        assert_eq!(hits, vec![1, 2]);
        assert!((ranked.groups[0].score - 60.0).abs() < 1e-12);
        assert_eq!(ranked.unmatched, 0);
    }
}
