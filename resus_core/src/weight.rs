//! Weight resolution engine.
//!
//! Turns a partial measurement record into a single best weight estimate
//! with a confidence grade, by strict priority:
//!
//! 1. Actual measured weight
//! 2. Length-table lookup (46-145 cm, 9 contiguous zones)
//! 3. Age formula (primary)
//! 4. Age formula (secondary, regional variant) - comparison only,
//!    never selected automatically
//! 5. MUAC-based estimate
//! 6. Parent/caregiver estimate
//! 7. Default fallback (10 kg)
//!
//! Resolution never fails: missing or inapplicable inputs degrade
//! confidence instead of raising errors.

use crate::types::{Confidence, WeightEstimate, WeightForAge, WeightInputs, WeightMethod};
use once_cell::sync::Lazy;

/// Default weight when no inputs exist at all
const DEFAULT_WEIGHT_KG: f64 = 10.0;

/// MUAC below this marks severe malnutrition; estimates are downgraded
const MUAC_SEVERE_MALNUTRITION_CM: f64 = 11.5;

// ============================================================================
// Length Table
// ============================================================================

/// One zone of the length-based estimation table
///
/// Zones are contiguous and non-overlapping over integer centimetres:
/// `zone[i+1].min_length_cm == zone[i].max_length_cm + 1`.
#[derive(Clone, Debug)]
pub struct LengthZone {
    pub zone: u8,
    pub min_length_cm: u32,
    pub max_length_cm: u32,
    pub weight_kg: f64,
    pub tube_size_mm: f64,
    pub tube_depth_cm: f64,
}

impl LengthZone {
    /// Defibrillation energy at 2 J/kg, nearest whole joule
    pub fn defib_energy_j(&self) -> u32 {
        (self.weight_kg * 2.0).round() as u32
    }

    /// Epinephrine dose at 0.01 mg/kg
    pub fn epinephrine_mg(&self) -> f64 {
        round2(self.weight_kg * 0.01)
    }

    /// Fluid bolus at 20 mL/kg, nearest whole millilitre
    pub fn fluid_bolus_ml(&self) -> u32 {
        (self.weight_kg * 20.0).round() as u32
    }
}

/// Cached length table - built once and reused across all resolutions
static LENGTH_TABLE: Lazy<Vec<LengthZone>> = Lazy::new(build_length_table);

fn build_length_table() -> Vec<LengthZone> {
    let rows: &[(u8, u32, u32, f64, f64, f64)] = &[
        // zone, min cm, max cm, weight kg, tube mm, tube depth cm
        (1, 46, 55, 4.0, 3.5, 9.0),
        (2, 56, 65, 6.0, 3.5, 10.0),
        (3, 66, 75, 8.0, 4.0, 11.0),
        (4, 76, 85, 10.0, 4.5, 12.0),
        (5, 86, 95, 12.0, 5.0, 13.0),
        (6, 96, 107, 14.0, 5.5, 14.0),
        (7, 108, 121, 18.0, 6.0, 15.0),
        (8, 122, 134, 24.0, 6.5, 16.5),
        (9, 135, 145, 32.0, 7.0, 18.0),
    ];

    rows.iter()
        .map(
            |&(zone, min_length_cm, max_length_cm, weight_kg, tube_size_mm, tube_depth_cm)| {
                LengthZone {
                    zone,
                    min_length_cm,
                    max_length_cm,
                    weight_kg,
                    tube_size_mm,
                    tube_depth_cm,
                }
            },
        )
        .collect()
}

/// Get a reference to the cached length table
pub fn length_table() -> &'static [LengthZone] {
    &LENGTH_TABLE
}

/// Find the zone covering a measured length, if any
///
/// A length outside the covered range is "method inapplicable", not an
/// error; the resolution chain falls through to the next method.
pub fn lookup_length_zone(length_cm: f64) -> Option<&'static LengthZone> {
    if !length_cm.is_finite() {
        return None;
    }
    LENGTH_TABLE.iter().find(|z| {
        length_cm >= z.min_length_cm as f64 && length_cm <= z.max_length_cm as f64
    })
}

/// Validate the length table invariants
///
/// Returns a list of human-readable problems; empty means valid. Checked
/// by tests against the built-in table and available to anyone supplying
/// a replacement table.
pub fn validate_length_table(zones: &[LengthZone]) -> Vec<String> {
    let mut errors = Vec::new();

    if zones.is_empty() {
        errors.push("Length table is empty".to_string());
        return errors;
    }

    for zone in zones {
        if zone.min_length_cm > zone.max_length_cm {
            errors.push(format!(
                "Zone {}: min length {} > max length {}",
                zone.zone, zone.min_length_cm, zone.max_length_cm
            ));
        }
        if zone.weight_kg <= 0.0 {
            errors.push(format!("Zone {}: non-positive weight", zone.zone));
        }
    }

    for pair in zones.windows(2) {
        if pair[1].min_length_cm != pair[0].max_length_cm + 1 {
            errors.push(format!(
                "Zones {} and {} are not contiguous ({}..{} then {}..{})",
                pair[0].zone,
                pair[1].zone,
                pair[0].min_length_cm,
                pair[0].max_length_cm,
                pair[1].min_length_cm,
                pair[1].max_length_cm
            ));
        }
        if pair[1].weight_kg <= pair[0].weight_kg {
            errors.push(format!(
                "Zone weights not strictly increasing between zones {} and {}",
                pair[0].zone, pair[1].zone
            ));
        }
    }

    errors
}

// ============================================================================
// Age Formulas
// ============================================================================

/// Primary age-based weight formula, piecewise by age
///
/// - Under 1 year: 3.5 kg base plus 0.7 kg/month for months 0-6 and
///   0.5 kg/month after that (Medium confidence)
/// - 1-10 years: `(age + 4) * 2` (Medium)
/// - 11-14 years: `age * 3` (Low)
/// - Over 14 years: inapplicable
pub fn age_formula_primary(age_years: u32, age_months: u32) -> Option<(f64, Confidence)> {
    let total_months = age_years * 12 + age_months;

    if total_months < 12 {
        let m = total_months as f64;
        let weight = 3.5 + 0.7 * m.min(6.0) + 0.5 * (m - 6.0).max(0.0);
        return Some((round1(weight), Confidence::Medium));
    }

    let years = total_months / 12;
    match years {
        1..=10 => Some((((years + 4) * 2) as f64, Confidence::Medium)),
        11..=14 => Some(((years * 3) as f64, Confidence::Low)),
        _ => None,
    }
}

/// Secondary age-based weight formula (regional variant)
///
/// Same infant rule as the primary; ages 1-10 use `3 * age + 7`. Offered
/// only for side-by-side comparison and never selected automatically ahead
/// of the primary formula.
pub fn age_formula_secondary(age_years: u32, age_months: u32) -> Option<f64> {
    let total_months = age_years * 12 + age_months;

    if total_months < 12 {
        return age_formula_primary(age_years, age_months).map(|(w, _)| w);
    }

    let years = total_months / 12;
    match years {
        1..=10 => Some((3 * years + 7) as f64),
        _ => None,
    }
}

/// Side-by-side formula comparison for display
#[derive(Clone, Debug)]
pub struct FormulaComparison {
    pub primary_kg: f64,
    pub secondary_kg: Option<f64>,
}

/// Compute both age formulas for side-by-side display
pub fn age_formula_comparison(age_years: u32, age_months: u32) -> Option<FormulaComparison> {
    let (primary_kg, _) = age_formula_primary(age_years, age_months)?;
    Some(FormulaComparison {
        primary_kg,
        secondary_kg: age_formula_secondary(age_years, age_months),
    })
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a partial measurement record to a single best weight estimate
///
/// Strict priority chain; always returns a usable estimate.
pub fn resolve(inputs: &WeightInputs) -> WeightEstimate {
    // 1. Actual measured weight wins regardless of any other field
    if let Some(actual) = inputs.actual_weight_kg {
        if actual > 0.0 {
            return estimate(
                round1(actual),
                WeightMethod::Actual,
                Confidence::High,
                "measured weight".to_string(),
            );
        }
        tracing::warn!("Ignoring non-positive actual weight {}", actual);
    }

    // 2. Length-table lookup
    if let Some(length) = inputs.length_cm {
        if let Some(zone) = lookup_length_zone(length) {
            return estimate(
                zone.weight_kg,
                WeightMethod::LengthTable,
                Confidence::High,
                format!("length {:.0} cm, zone {}", length, zone.zone),
            );
        }
        tracing::debug!(
            "Length {:.0} cm outside table range, falling through",
            length
        );
    }

    let age = match (inputs.age_years, inputs.age_months) {
        (None, None) => None,
        (years, months) => Some((years.unwrap_or(0), months.unwrap_or(0))),
    };

    // 3. Age formula (primary)
    if let Some((years, months)) = age {
        if let Some((weight, confidence)) = age_formula_primary(years, months) {
            return estimate(
                weight,
                WeightMethod::AgeFormulaPrimary,
                confidence,
                format!("age formula, {}y {}m", years, months),
            );
        }
        tracing::debug!("Age {}y {}m outside formula range", years, months);
    }

    // 5. MUAC-based estimate (only reached when no length-table match)
    if let (Some(muac), Some(length)) = (inputs.muac_cm, inputs.length_cm) {
        if muac > 0.0 && length > 0.0 {
            let weight = round1(muac * muac * length / 1000.0);
            let confidence = if muac < MUAC_SEVERE_MALNUTRITION_CM {
                tracing::warn!(
                    "MUAC {:.1} cm below severe malnutrition threshold, downgrading confidence",
                    muac
                );
                Confidence::Low
            } else {
                Confidence::Medium
            };
            return estimate(
                weight,
                WeightMethod::Muac,
                confidence,
                format!("MUAC {:.1} cm, length {:.0} cm", muac, length),
            );
        }
    }

    // 6. Parent/caregiver estimate
    if let Some(parent) = inputs.parent_estimate_kg {
        if parent > 0.0 {
            return estimate(
                round1(parent),
                WeightMethod::ParentEstimate,
                Confidence::Low,
                "caregiver estimate".to_string(),
            );
        }
    }

    // 7. Default fallback
    tracing::warn!("No usable weight inputs, using default fallback");
    estimate(
        DEFAULT_WEIGHT_KG,
        WeightMethod::Default,
        Confidence::Low,
        "default fallback".to_string(),
    )
}

fn estimate(
    weight_kg: f64,
    method: WeightMethod,
    confidence: Confidence,
    source: String,
) -> WeightEstimate {
    tracing::info!(
        "Resolved weight {:.1} kg via {:?} ({:?} confidence)",
        weight_kg,
        method,
        confidence
    );
    WeightEstimate {
        weight_kg,
        method,
        confidence,
        source,
    }
}

// ============================================================================
// Weight-for-Age Plausibility
// ============================================================================

/// Plausible weight range for an age band, in months of age
struct AgeWeightBand {
    max_age_months: u32,
    min_kg: f64,
    max_kg: f64,
}

const AGE_WEIGHT_BANDS: &[AgeWeightBand] = &[
    AgeWeightBand { max_age_months: 12, min_kg: 2.0, max_kg: 12.0 },
    AgeWeightBand { max_age_months: 36, min_kg: 7.0, max_kg: 18.0 },
    AgeWeightBand { max_age_months: 72, min_kg: 10.0, max_kg: 28.0 },
    AgeWeightBand { max_age_months: 120, min_kg: 14.0, max_kg: 45.0 },
    AgeWeightBand { max_age_months: 180, min_kg: 20.0, max_kg: 75.0 },
];

/// Advisory check of a resolved weight against an age-banded plausible range
///
/// Never blocks: callers surface the classification as a warning. Ages past
/// the table are always `Plausible`.
pub fn validate_weight_for_age(weight_kg: f64, age_years: u32, age_months: u32) -> WeightForAge {
    let total_months = age_years * 12 + age_months;

    let band = AGE_WEIGHT_BANDS
        .iter()
        .find(|b| total_months < b.max_age_months);

    match band {
        Some(b) if weight_kg < b.min_kg => {
            tracing::warn!(
                "Weight {:.1} kg below plausible range for age {}m (min {:.1} kg)",
                weight_kg,
                total_months,
                b.min_kg
            );
            WeightForAge::TooLow
        }
        Some(b) if weight_kg > b.max_kg => {
            tracing::warn!(
                "Weight {:.1} kg above plausible range for age {}m (max {:.1} kg)",
                weight_kg,
                total_months,
                b.max_kg
            );
            WeightForAge::TooHigh
        }
        _ => WeightForAge::Plausible,
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
