//! Rule-based advisory text derived from a risk assessment.
//!
//! Pure and stateless: the same assessment and thresholds always produce
//! the same ordered advice. An empty result is valid and means no concerns
//! were detected.

use crate::config::RiskConfig;
use crate::core::risk::{RiskAssessment, RiskTier};

/// Derive ordered advisory strings from an assessment.
pub fn recommend(assessment: &RiskAssessment, config: &RiskConfig) -> Vec<String> {
    let mut advice = Vec::new();

    if assessment.hypo_event_count > 0 {
        advice.push(format!(
            "Recorded {} low-glucose reading(s) in the last 7 days. Keep \
             fast-acting carbohydrates on hand and review the episodes with \
             your care team.",
            assessment.hypo_event_count
        ));
    }

    if assessment.hyper_event_count > 0 {
        advice.push(format!(
            "Recorded {} high-glucose reading(s) in the last 7 days. Consider \
             monitoring more closely after meals.",
            assessment.hyper_event_count
        ));
    }

    if assessment.variability > config.variability_threshold {
        advice.push(
            "Glucose levels are varying widely. Keeping meal times, portions \
             and dosing consistent can reduce swings."
                .to_string(),
        );
    }

    // Mean-based advice only applies when the window had readings at all
    if assessment.hypo_event_count > 0
        || assessment.hyper_event_count > 0
        || assessment.mean_glucose_7d > 0.0
    {
        if assessment.mean_glucose_7d > config.target_mean_max {
            advice.push(
                "The 7-day average is elevated. Consider reviewing your meal \
                 plan with your clinician."
                    .to_string(),
            );
        } else if assessment.mean_glucose_7d > 0.0
            && assessment.mean_glucose_7d < config.target_mean_min
        {
            advice.push(
                "The 7-day average is low. Talk to your clinician about \
                 adjusting your medication."
                    .to_string(),
            );
        }
    }

    if assessment.risk_tier == RiskTier::High {
        advice.push(
            "Overall short-term risk is high. Contact your care team to \
             review the recent readings soon."
                .to_string(),
        );
    }

    advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assessment() -> RiskAssessment {
        RiskAssessment {
            user_id: 1,
            computed_at: Utc::now(),
            mean_glucose_7d: 105.0,
            variability: 12.0,
            hypo_event_count: 0,
            hyper_event_count: 0,
            trend_slope: 0.0,
            risk_score: 0.0,
            risk_tier: RiskTier::Low,
        }
    }

    #[test]
    fn test_low_risk_without_events_yields_no_advice() {
        let advice = recommend(&assessment(), &RiskConfig::default());
        assert!(advice.is_empty());
    }

    #[test]
    fn test_hypo_events_trigger_hypo_advice_first() {
        let mut a = assessment();
        a.hypo_event_count = 3;

        let advice = recommend(&a, &RiskConfig::default());
        assert!(!advice.is_empty());
        assert!(advice[0].contains("3 low-glucose"));
    }

    #[test]
    fn test_high_tier_appends_urgent_advice_last() {
        let mut a = assessment();
        a.hypo_event_count = 2;
        a.hyper_event_count = 4;
        a.risk_tier = RiskTier::High;

        let advice = recommend(&a, &RiskConfig::default());
        assert!(advice.len() >= 3);
        assert!(advice.last().unwrap().contains("risk is high"));
    }

    #[test]
    fn test_elevated_mean_triggers_plan_review() {
        let mut a = assessment();
        a.mean_glucose_7d = 165.0;
        a.hyper_event_count = 1;

        let advice = recommend(&a, &RiskConfig::default());
        assert!(advice.iter().any(|line| line.contains("average is elevated")));
    }

    #[test]
    fn test_same_input_same_output() {
        let mut a = assessment();
        a.variability = 45.0;

        let config = RiskConfig::default();
        assert_eq!(recommend(&a, &config), recommend(&a, &config));
    }
}
