//! Domain types for glucose readings.
//!
//! A reading is identified by `(user_id, timestamp)` and is immutable once
//! stored; the engine never deletes readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contextual label for when a reading was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentOfDay {
    Fasting,
    AfterBreakfast,
    AfterLunch,
    AfterDinner,
    BeforeSleep,
    Other,
}

impl MomentOfDay {
    /// Categorical index used as a model feature.
    pub fn encoded(&self) -> f64 {
        match self {
            MomentOfDay::Fasting => 0.0,
            MomentOfDay::AfterBreakfast => 1.0,
            MomentOfDay::AfterLunch => 2.0,
            MomentOfDay::AfterDinner => 3.0,
            MomentOfDay::BeforeSleep => 4.0,
            MomentOfDay::Other => 5.0,
        }
    }
}

/// A single blood-glucose measurement synced from a patient device or app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// Patient identifier
    pub user_id: i64,
    /// Glucose level in mg/dL
    pub glucose_level: f64,
    /// When the measurement was taken (second precision)
    pub timestamp: DateTime<Utc>,
    /// Context of the measurement
    pub moment_of_day: MomentOfDay,
}

impl GlucoseReading {
    pub fn new(
        user_id: i64,
        glucose_level: f64,
        timestamp: DateTime<Utc>,
        moment_of_day: MomentOfDay,
    ) -> Self {
        Self {
            user_id,
            glucose_level,
            timestamp,
            moment_of_day,
        }
    }

    /// Whether another reading refers to the same measurement slot.
    pub fn same_key(&self, other: &GlucoseReading) -> bool {
        self.user_id == other.user_id && self.timestamp == other.timestamp
    }

    /// Whether another reading is a field-for-field duplicate.
    pub fn same_value(&self, other: &GlucoseReading) -> bool {
        self.same_key(other)
            && self.glucose_level == other.glucose_level
            && self.moment_of_day == other.moment_of_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_moment_encoding_is_distinct() {
        let moments = [
            MomentOfDay::Fasting,
            MomentOfDay::AfterBreakfast,
            MomentOfDay::AfterLunch,
            MomentOfDay::AfterDinner,
            MomentOfDay::BeforeSleep,
            MomentOfDay::Other,
        ];
        for (i, a) in moments.iter().enumerate() {
            for b in moments.iter().skip(i + 1) {
                assert_ne!(a.encoded(), b.encoded());
            }
        }
    }

    #[test]
    fn test_moment_serde_snake_case() {
        let json = serde_json::to_string(&MomentOfDay::AfterBreakfast).unwrap();
        assert_eq!(json, "\"after_breakfast\"");

        let parsed: MomentOfDay = serde_json::from_str("\"before_sleep\"").unwrap();
        assert_eq!(parsed, MomentOfDay::BeforeSleep);

        // Unrecognized labels are rejected at the boundary
        assert!(serde_json::from_str::<MomentOfDay>("\"midnight_snack\"").is_err());
    }

    #[test]
    fn test_same_key_ignores_value() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let a = GlucoseReading::new(1, 110.0, ts, MomentOfDay::Fasting);
        let b = GlucoseReading::new(1, 135.0, ts, MomentOfDay::AfterBreakfast);

        assert!(a.same_key(&b));
        assert!(!a.same_value(&b));
        assert!(a.same_value(&a.clone()));
    }
}
