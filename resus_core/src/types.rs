//! Core domain types for the pediatric emergency decision core.
//!
//! This module defines the fundamental types used throughout the system:
//! - Weight estimates, measurement inputs, and confidence grading
//! - Patient context shared across an assessment session
//! - Assessment answers (closed tagged union, one variant per question)
//! - Critical actions fired by the trigger evaluator
//! - Active interventions and their lifecycle statuses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Weight Types
// ============================================================================

/// Confidence grade attached to a weight estimate
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Method used to derive a weight estimate, in resolution priority order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightMethod {
    Actual,
    LengthTable,
    AgeFormulaPrimary,
    AgeFormulaSecondary,
    Muac,
    ParentEstimate,
    Default,
}

/// A resolved weight estimate
///
/// Immutable once produced. When better data arrives (e.g. an actual
/// measured weight), the session replaces the estimate rather than
/// mutating it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightEstimate {
    /// Estimated weight in kilograms, always strictly positive
    pub weight_kg: f64,
    pub method: WeightMethod,
    pub confidence: Confidence,
    /// Human-readable note on where the estimate came from
    pub source: String,
}

/// Partial measurement record fed into the weight resolution engine
///
/// Every field is optional; the engine degrades confidence rather than
/// failing when inputs are missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WeightInputs {
    pub actual_weight_kg: Option<f64>,
    pub length_cm: Option<f64>,
    pub age_years: Option<u32>,
    pub age_months: Option<u32>,
    pub muac_cm: Option<f64>,
    pub parent_estimate_kg: Option<f64>,
}

/// Advisory classification from the weight-for-age plausibility check
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightForAge {
    TooLow,
    TooHigh,
    Plausible,
}

// ============================================================================
// Patient Context
// ============================================================================

/// Glucose measurement unit
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseUnit {
    MmolL,
    MgDl,
}

impl GlucoseUnit {
    /// Convert a value in this unit to mmol/L (18 mg/dL per mmol/L)
    pub fn to_mmol_l(&self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MmolL => value,
            GlucoseUnit::MgDl => value / 18.0,
        }
    }
}

impl Default for GlucoseUnit {
    fn default() -> Self {
        GlucoseUnit::MmolL
    }
}

/// Age band used for clinical branching (ventilation rates, compression
/// technique)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    /// Under 1 year
    Infant,
    /// 1 through 8 years
    Child,
    /// Over 8 years
    OlderChild,
}

/// Session-scoped patient context threaded through every calculation
///
/// Owned by the assessment session. The weight estimate may be replaced
/// mid-session (e.g. an actual weight is obtained after a length-based
/// estimate); the replacement is a plain field swap in single-threaded
/// session code and is visible to every subsequent dose calculation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientContext {
    pub age_years: Option<u32>,
    pub age_months: Option<u32>,
    pub resolved_weight: WeightEstimate,
    pub glucose_unit: GlucoseUnit,
}

impl PatientContext {
    /// Replace the current weight estimate with a better one
    ///
    /// The previous estimate is superseded, not mutated.
    pub fn replace_weight(&mut self, estimate: WeightEstimate) {
        tracing::info!(
            "Weight estimate replaced: {:.1} kg ({:?}) -> {:.1} kg ({:?})",
            self.resolved_weight.weight_kg,
            self.resolved_weight.method,
            estimate.weight_kg,
            estimate.method
        );
        self.resolved_weight = estimate;
    }

    /// Total age in months, when any age input is present
    pub fn age_in_months(&self) -> Option<u32> {
        match (self.age_years, self.age_months) {
            (None, None) => None,
            (years, months) => Some(years.unwrap_or(0) * 12 + months.unwrap_or(0)),
        }
    }

    /// Age band for clinical branching
    ///
    /// An unknown age is treated as `Child`, the middle band.
    pub fn age_band(&self) -> AgeBand {
        match self.age_in_months() {
            Some(m) if m < 12 => AgeBand::Infant,
            Some(m) if m <= 8 * 12 => AgeBand::Child,
            Some(_) => AgeBand::OlderChild,
            None => AgeBand::Child,
        }
    }
}

// ============================================================================
// Assessment Answers
// ============================================================================

/// Capillary refill observation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapRefill {
    Normal,
    /// Refill over 3 seconds (cold shock)
    Prolonged,
    /// Immediate flush (warm shock)
    Flash,
}

/// One answered clinical question
///
/// A closed tagged union: each question has exactly one variant with a
/// validated payload shape. Evaluation of one answer never depends on any
/// other answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "question", rename_all = "snake_case")]
pub enum AssessmentAnswer {
    Breathing { present: bool },
    Pulse { present: bool },
    Glucose { value: f64, unit: GlucoseUnit },
    CapillaryRefill { refill: CapRefill },
}

// ============================================================================
// Critical Actions
// ============================================================================

/// Clinical priority of an action or intervention
///
/// Variant order doubles as the presentation sort order: `Critical` sorts
/// before `Urgent` sorts before `Routine`.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Urgent,
    Routine,
}

/// A fired clinical trigger
///
/// Stateless and disposable: evidence that a condition fired, carrying
/// everything needed to display the mandated action and to instantiate a
/// tracked intervention. Not itself a tracked object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CriticalAction {
    /// Trigger identifier (e.g. "apnea", "hypoglycemia")
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub instruction: String,
    /// Pre-computed dose string, when the action has one
    pub dose: Option<String>,
    pub route: Option<String>,
    pub rationale: String,
    pub reassess_after_seconds: u32,
    pub timer_seconds: Option<u32>,
    /// Template used to instantiate a tracked intervention
    pub intervention_template_id: String,
}

// ============================================================================
// Active Interventions
// ============================================================================

/// Lifecycle status of a tracked intervention
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    InProgress,
    /// Presentational: the timer has expired and a human must confirm
    /// the next step. Only ever written by the external tick.
    NeedsReassessment,
    Completed,
    Escalated,
    Failed,
}

impl InterventionStatus {
    /// Terminal statuses end the instance; an escalation spawns a new
    /// instance rather than reviving this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InterventionStatus::Completed
                | InterventionStatus::Escalated
                | InterventionStatus::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// A tracked, independently timed unit of ongoing clinical work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveIntervention {
    pub id: Uuid,
    pub template_id: String,
    pub title: String,
    pub priority: Severity,
    pub status: InterventionStatus,
    pub created_at: DateTime<Utc>,
    /// Set on start; reset when a reassessment confirms the intervention
    /// is ongoing (new timer cycle)
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub timer_duration_seconds: Option<u32>,
    pub reassess_after_seconds: u32,
    pub escalation_action: Option<String>,
    /// 1-based instance number for repeatable interventions
    pub bolus_number: Option<u32>,
    /// Running cumulative volume across instances of this template
    pub volume_given_ml: Option<f64>,
    /// Advisory cumulative ceiling; never blocks creation
    pub max_volume_ml: Option<f64>,
    /// Timer cycle count; starts at 1, bumped on each reassess-confirm
    pub cycle: u32,
    /// Creation sequence number, used as the stable tiebreaker when
    /// sorting by priority
    pub seq: u64,
}

impl ActiveIntervention {
    /// Remaining timer seconds at `now`
    ///
    /// Always a pure function of `now - started_at`, never stored as a
    /// decrementing counter, so arbitrarily long gaps between observations
    /// are harmless. `None` when the intervention is untimed or not yet
    /// started.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        let duration = self.timer_duration_seconds? as i64;
        let started = self.started_at?;
        let elapsed = (now - started).num_seconds().max(0);
        Some(duration.saturating_sub(elapsed).max(0) as u64)
    }

    /// Derived expiry flag: the timer has run out
    ///
    /// Expiry never forces a status change by itself; the external tick
    /// surfaces it as `NeedsReassessment` and a caller confirms the
    /// transition out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(now) == Some(0)
    }

    /// Whether the running cumulative volume exceeds the advisory ceiling
    pub fn over_ceiling(&self) -> bool {
        match (self.volume_given_ml, self.max_volume_ml) {
            (Some(given), Some(max)) => given > max,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_glucose_unit_conversion() {
        assert_eq!(GlucoseUnit::MmolL.to_mmol_l(3.0), 3.0);
        assert_eq!(GlucoseUnit::MgDl.to_mmol_l(54.0), 3.0);
        assert_eq!(GlucoseUnit::MgDl.to_mmol_l(90.0), 5.0);
    }

    #[test]
    fn test_severity_sort_order() {
        let mut severities = vec![Severity::Routine, Severity::Critical, Severity::Urgent];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Urgent, Severity::Routine]
        );
    }

    #[test]
    fn test_age_band_boundaries() {
        let mut ctx = test_context();

        ctx.age_years = Some(0);
        ctx.age_months = Some(11);
        assert_eq!(ctx.age_band(), AgeBand::Infant);

        ctx.age_months = Some(12);
        assert_eq!(ctx.age_band(), AgeBand::Child);

        ctx.age_years = Some(8);
        ctx.age_months = Some(0);
        assert_eq!(ctx.age_band(), AgeBand::Child);

        ctx.age_years = Some(9);
        assert_eq!(ctx.age_band(), AgeBand::OlderChild);

        ctx.age_years = None;
        ctx.age_months = None;
        assert_eq!(ctx.age_band(), AgeBand::Child);
    }

    #[test]
    fn test_replace_weight_supersedes() {
        let mut ctx = test_context();
        assert_eq!(ctx.resolved_weight.method, WeightMethod::LengthTable);

        ctx.replace_weight(WeightEstimate {
            weight_kg: 15.2,
            method: WeightMethod::Actual,
            confidence: Confidence::High,
            source: "measured weight".into(),
        });

        assert_eq!(ctx.resolved_weight.weight_kg, 15.2);
        assert_eq!(ctx.resolved_weight.method, WeightMethod::Actual);
    }

    #[test]
    fn test_remaining_is_pure_and_never_negative() {
        let start = Utc::now();
        let intervention = ActiveIntervention {
            id: Uuid::new_v4(),
            template_id: "ventilation_bvm".into(),
            title: "Bag-valve-mask ventilation".into(),
            priority: Severity::Critical,
            status: InterventionStatus::InProgress,
            created_at: start,
            started_at: Some(start),
            ended_at: None,
            timer_duration_seconds: Some(120),
            reassess_after_seconds: 120,
            escalation_action: None,
            bolus_number: None,
            volume_given_ml: None,
            max_volume_ml: None,
            cycle: 1,
            seq: 0,
        };

        assert_eq!(intervention.remaining_seconds(start), Some(120));
        assert_eq!(
            intervention.remaining_seconds(start + Duration::seconds(45)),
            Some(75)
        );
        assert_eq!(
            intervention.remaining_seconds(start + Duration::seconds(120)),
            Some(0)
        );
        // Arbitrarily far in the future, still exactly zero
        assert_eq!(
            intervention.remaining_seconds(start + Duration::days(3)),
            Some(0)
        );
        assert!(intervention.is_expired(start + Duration::seconds(120)));
        assert!(!intervention.is_expired(start + Duration::seconds(119)));
    }

    #[test]
    fn test_answer_serde_tagging() {
        let answer = AssessmentAnswer::Glucose {
            value: 2.0,
            unit: GlucoseUnit::MmolL,
        };
        let json = serde_json::to_string(&answer).unwrap();
        assert!(json.contains("\"question\":\"glucose\""));

        let parsed: AssessmentAnswer = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, answer);
    }

    fn test_context() -> PatientContext {
        PatientContext {
            age_years: Some(2),
            age_months: Some(0),
            resolved_weight: WeightEstimate {
                weight_kg: 12.0,
                method: WeightMethod::LengthTable,
                confidence: Confidence::High,
                source: "length 88 cm, zone 5".into(),
            },
            glucose_unit: GlucoseUnit::MmolL,
        }
    }
}
