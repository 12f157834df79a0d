//! Composite precinct scoring
//!
//! ```text
//! eligible    = youth_share >= youth_share_min AND dem_margin >= dem_margin_floor
//! youth_norm  = max(0, (youth_share - youth_share_min) / (1 - youth_share_min))
//! margin_norm = max(0, (dem_margin - dem_margin_floor) / (1 - dem_margin_floor))
//! score       = clamp(w_youth * youth_norm + w_margin * margin_norm, 0, 1)
//! tier        = label of the highest score_min <= score
//! ```
//!
//! Everything here is pure; the orchestrator handles persistence.

use crate::db::precincts::{ScoreUpdate, ScoringInput};
use crate::models::ScoringReport;
use crate::normalize::coerce::round4;
use yvp_common::config::{ScoreWeights, TierThreshold};
use yvp_common::PipelineConfig;

/// Scoring parameters with the tier table sorted high → low
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParams {
    pub youth_share_min: f64,
    pub dem_margin_floor: f64,
    pub weights: ScoreWeights,
    tiers_desc: Vec<TierThreshold>,
}

impl ScoringParams {
    pub fn new(
        youth_share_min: f64,
        dem_margin_floor: f64,
        weights: ScoreWeights,
        mut tiers: Vec<TierThreshold>,
    ) -> Self {
        tiers.sort_by(|a, b| b.score_min.total_cmp(&a.score_min));
        Self {
            youth_share_min,
            dem_margin_floor,
            weights,
            tiers_desc: tiers,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.scoring.youth_share_min,
            config.scoring.dem_margin_floor,
            config.scoring.weights,
            config.scoring.tiers.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Rounded to 4 decimals, within [0, 1]
    pub score: f64,
    pub tier: String,
}

/// `(value - floor) / (1 - floor)`, clipped at zero; a degenerate denominator yields 0
fn normalized_term(value: f64, floor: f64) -> f64 {
    let denominator = 1.0 - floor;
    if !(denominator > 0.0) {
        return 0.0;
    }
    ((value - floor) / denominator).max(0.0)
}

/// Label of the highest threshold not above `score`
pub fn tier_for(score: f64, params: &ScoringParams) -> Option<&str> {
    params
        .tiers_desc
        .iter()
        .find(|t| score >= t.score_min)
        .map(|t| t.label.as_str())
}

/// Score one precinct; `None` when it is not eligible
pub fn score_precinct(
    youth_share: Option<f64>,
    dem_margin: Option<f64>,
    params: &ScoringParams,
) -> Option<ScoreOutcome> {
    let (youth_share, dem_margin) = (youth_share?, dem_margin?);
    if youth_share < params.youth_share_min || dem_margin < params.dem_margin_floor {
        return None;
    }

    let youth_norm = normalized_term(youth_share, params.youth_share_min);
    let margin_norm = normalized_term(dem_margin, params.dem_margin_floor);
    let raw = params.weights.youth_share * youth_norm + params.weights.dem_margin * margin_norm;
    let score = round4(raw.clamp(0.0, 1.0));

    let tier = tier_for(score, params)?;
    Some(ScoreOutcome {
        score,
        tier: tier.to_string(),
    })
}

/// Score every precinct, producing one update per precinct
///
/// Ineligible precincts get an explicit null update so that a precinct leaving
/// eligibility loses its previous score.
pub fn score_all(inputs: &[ScoringInput], params: &ScoringParams) -> (Vec<ScoreUpdate>, ScoringReport) {
    let mut report = ScoringReport::default();

    let updates = inputs
        .iter()
        .map(|input| match score_precinct(input.youth_share, input.dem_margin, params) {
            Some(outcome) => {
                report.scored += 1;
                *report.by_tier.entry(outcome.tier.clone()).or_insert(0) += 1;
                ScoreUpdate {
                    precinct_key: input.precinct_key.clone(),
                    score: Some(outcome.score),
                    tier: Some(outcome.tier),
                }
            }
            None => {
                if input.score.is_some() {
                    report.reset += 1;
                }
                ScoreUpdate {
                    precinct_key: input.precinct_key.clone(),
                    score: None,
                    tier: None,
                }
            }
        })
        .collect();

    (updates, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScoringParams {
        ScoringParams::from_config(&PipelineConfig::default())
    }

    #[test]
    fn test_exactly_at_floors_scores_zero_low() {
        let outcome = score_precinct(Some(0.15), Some(-0.10), &params()).unwrap();
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.tier, "low");
    }

    #[test]
    fn test_maximum_inputs_score_one_priority() {
        let outcome = score_precinct(Some(1.0), Some(1.0), &params()).unwrap();
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.tier, "priority");
    }

    #[test]
    fn test_ineligible_precincts_have_no_score() {
        let p = params();
        assert!(score_precinct(None, Some(0.5), &p).is_none());
        assert!(score_precinct(Some(0.5), None, &p).is_none());
        assert!(score_precinct(Some(0.149), Some(0.5), &p).is_none());
        assert!(score_precinct(Some(0.5), Some(-0.1001), &p).is_none());
    }

    #[test]
    fn test_mid_range_score_and_tier() {
        // youth_norm = 0.35/0.85, margin_norm = 0.3/1.1
        let outcome = score_precinct(Some(0.50), Some(0.20), &params()).unwrap();
        let expected = round4(0.6 * (0.35 / 0.85) + 0.4 * (0.3 / 1.1));
        assert_eq!(outcome.score, expected);
        assert_eq!(outcome.tier, "watchlist");
    }

    #[test]
    fn test_tier_boundaries_inclusive() {
        let p = params();
        assert_eq!(tier_for(0.70, &p), Some("priority"));
        assert_eq!(tier_for(0.6999, &p), Some("target"));
        assert_eq!(tier_for(0.30, &p), Some("watchlist"));
        assert_eq!(tier_for(0.0, &p), Some("low"));
    }

    #[test]
    fn test_degenerate_floor_yields_zero_term() {
        let p = ScoringParams::new(
            1.0,
            -0.10,
            ScoreWeights { youth_share: 0.6, dem_margin: 0.4 },
            PipelineConfig::default().scoring.tiers,
        );
        let outcome = score_precinct(Some(1.0), Some(1.0), &p).unwrap();
        assert_eq!(outcome.score, 0.4);
    }

    #[test]
    fn test_score_all_counts_resets() {
        let inputs = vec![
            ScoringInput {
                precinct_key: "A".to_string(),
                youth_share: Some(0.4),
                dem_margin: Some(0.3),
                score: None,
            },
            ScoringInput {
                precinct_key: "B".to_string(),
                youth_share: Some(0.05),
                dem_margin: Some(0.3),
                score: Some(0.61),
            },
        ];
        let (updates, report) = score_all(&inputs, &params());

        assert_eq!(updates.len(), 2);
        assert!(updates[0].score.is_some() && updates[0].tier.is_some());
        assert!(updates[1].score.is_none() && updates[1].tier.is_none());
        assert_eq!(report.scored, 1);
        assert_eq!(report.reset, 1);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let p = params();
        let first = score_precinct(Some(0.3137), Some(0.0421), &p);
        let second = score_precinct(Some(0.3137), Some(0.0421), &p);
        assert_eq!(first, second);
    }
}
