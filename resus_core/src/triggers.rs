//! Critical trigger evaluator.
//!
//! One pure predicate per clinical question. Evaluation of one answer
//! never depends on, or blocks, evaluation of any other: multiple
//! independent triggers (apnea, hypoglycemia, shock) can all be active
//! simultaneously from different answers in the same session.
//!
//! Threshold table:
//!
//! | Trigger        | Condition                          | Severity |
//! |----------------|------------------------------------|----------|
//! | Apnea          | breathing = no                     | critical |
//! | Pulselessness  | pulse = no                         | critical |
//! | Hypoglycemia   | glucose < 3.0 mmol/L               | critical |
//! | Shock          | capillary refill prolonged or flash| critical |

use crate::catalog::{get_default_templates, InterventionTemplate};
use crate::dosing;
use crate::error::{Error, Result};
use crate::types::{
    AgeBand, AssessmentAnswer, CapRefill, CriticalAction, PatientContext, Severity,
};

/// Hypoglycemia threshold in mmol/L; values are converted before comparison
pub const HYPOGLYCEMIA_THRESHOLD_MMOL_L: f64 = 3.0;

/// Evaluate one answered question against the trigger table
///
/// Returns zero or one `CriticalAction`; never blocks subsequent
/// questions. Doses are computed from the session's current resolved
/// weight, so a replaced weight estimate is reflected immediately.
pub fn evaluate(
    answer: &AssessmentAnswer,
    ctx: &PatientContext,
) -> Result<Option<CriticalAction>> {
    let action = match answer {
        AssessmentAnswer::Breathing { present: false } => Some(apnea_action(ctx)?),
        AssessmentAnswer::Pulse { present: false } => Some(pulselessness_action(ctx)?),
        AssessmentAnswer::Glucose { value, unit } => {
            let mmol = unit.to_mmol_l(*value);
            if mmol < HYPOGLYCEMIA_THRESHOLD_MMOL_L {
                Some(hypoglycemia_action(ctx, mmol)?)
            } else {
                None
            }
        }
        AssessmentAnswer::CapillaryRefill { refill } => match refill {
            CapRefill::Prolonged | CapRefill::Flash => Some(shock_action(ctx, *refill)?),
            CapRefill::Normal => None,
        },
        _ => None,
    };

    if let Some(ref action) = action {
        tracing::info!(
            "Trigger fired: {} ({:?}) -> template {}",
            action.id,
            action.severity,
            action.intervention_template_id
        );
    }

    Ok(action)
}

fn template(id: &str) -> Result<&'static InterventionTemplate> {
    // The catalog is fixed and validated; the four trigger templates are
    // required members.
    get_default_templates().get(id).ok_or_else(|| {
        Error::TemplateValidation(format!("built-in template '{}' missing from catalog", id))
    })
}

fn apnea_action(ctx: &PatientContext) -> Result<CriticalAction> {
    let rate = match ctx.age_band() {
        AgeBand::Infant => "30 breaths/min",
        AgeBand::Child => "20 breaths/min",
        AgeBand::OlderChild => "12 breaths/min",
    };
    let template = template("ventilation_bvm")?;

    Ok(CriticalAction {
        id: "apnea".into(),
        severity: Severity::Critical,
        title: "Apnea: no spontaneous breathing".into(),
        instruction: format!(
            "Open the airway and ventilate with bag-valve-mask at {}",
            rate
        ),
        dose: None,
        route: None,
        rationale: "Absent breathing leads to hypoxic cardiac arrest within minutes".into(),
        reassess_after_seconds: template.reassess_after_seconds,
        timer_seconds: template.timer_seconds,
        intervention_template_id: template.id.clone(),
    })
}

fn pulselessness_action(ctx: &PatientContext) -> Result<CriticalAction> {
    let technique = match ctx.age_band() {
        AgeBand::Infant => "two-finger technique (two thumbs with two rescuers)",
        AgeBand::Child => "heel of one hand",
        AgeBand::OlderChild => "two hands, adult technique",
    };
    let template = template("cpr_compressions")?;

    Ok(CriticalAction {
        id: "pulselessness".into(),
        severity: Severity::Critical,
        title: "Pulseless: cardiac arrest".into(),
        instruction: format!(
            "Start chest compressions at 100-120/min using the {}",
            technique
        ),
        dose: None,
        route: None,
        rationale: "No palpable pulse means no cardiac output; compressions must start now"
            .into(),
        reassess_after_seconds: template.reassess_after_seconds,
        timer_seconds: template.timer_seconds,
        intervention_template_id: template.id.clone(),
    })
}

fn hypoglycemia_action(ctx: &PatientContext, mmol: f64) -> Result<CriticalAction> {
    let weight = ctx.resolved_weight.weight_kg;
    if weight <= 0.0 {
        return Err(Error::InvalidInput(
            "hypoglycemia dose requires a positive resolved weight".into(),
        ));
    }
    let dose = dosing::dextrose_10_ml(weight)?;
    let template = template("dextrose_bolus")?;

    Ok(CriticalAction {
        id: "hypoglycemia".into(),
        severity: Severity::Critical,
        title: format!("Hypoglycemia: glucose {:.1} mmol/L", mmol),
        instruction: format!("Give {} of 10% dextrose IV/IO over 5 minutes", dose),
        dose: Some(dose.to_string()),
        route: Some("IV/IO".into()),
        rationale: "Glucose below 3.0 mmol/L impairs cerebral function and must be corrected"
            .into(),
        reassess_after_seconds: template.reassess_after_seconds,
        timer_seconds: template.timer_seconds,
        intervention_template_id: template.id.clone(),
    })
}

fn shock_action(ctx: &PatientContext, refill: CapRefill) -> Result<CriticalAction> {
    let weight = ctx.resolved_weight.weight_kg;
    if weight <= 0.0 {
        return Err(Error::InvalidInput(
            "shock bolus requires a positive resolved weight".into(),
        ));
    }
    let dose = dosing::fluid_bolus_ml(weight)?;
    let template = template("fluid_bolus")?;

    let (title, rationale) = match refill {
        CapRefill::Flash => (
            "Shock: flash capillary refill (warm shock)",
            "Immediate flush suggests distributive shock with poor perfusion",
        ),
        _ => (
            "Shock: prolonged capillary refill",
            "Refill over 3 seconds indicates compensated shock; perfusion must be restored",
        ),
    };

    Ok(CriticalAction {
        id: "shock".into(),
        severity: Severity::Critical,
        title: title.into(),
        instruction: format!("Give {} isotonic crystalloid IV/IO, reassess perfusion", dose),
        dose: Some(dose.to_string()),
        route: Some("IV/IO".into()),
        rationale: rationale.into(),
        reassess_after_seconds: template.reassess_after_seconds,
        timer_seconds: template.timer_seconds,
        intervention_template_id: template.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, GlucoseUnit, WeightEstimate, WeightMethod};

    fn ctx(weight_kg: f64, age_years: Option<u32>, age_months: Option<u32>) -> PatientContext {
        PatientContext {
            age_years,
            age_months,
            resolved_weight: WeightEstimate {
                weight_kg,
                method: WeightMethod::Actual,
                confidence: Confidence::High,
                source: "measured weight".into(),
            },
            glucose_unit: GlucoseUnit::MmolL,
        }
    }

    #[test]
    fn test_hypoglycemia_scenario_12kg() {
        let answer = AssessmentAnswer::Glucose {
            value: 2.0,
            unit: GlucoseUnit::MmolL,
        };
        let action = evaluate(&answer, &ctx(12.0, Some(2), None)).unwrap().unwrap();

        assert_eq!(action.id, "hypoglycemia");
        assert_eq!(action.severity, Severity::Critical);
        assert_eq!(action.dose.as_deref(), Some("24 mL"));
        assert_eq!(action.intervention_template_id, "dextrose_bolus");
    }

    #[test]
    fn test_glucose_at_threshold_does_not_fire() {
        let answer = AssessmentAnswer::Glucose {
            value: 3.0,
            unit: GlucoseUnit::MmolL,
        };
        assert!(evaluate(&answer, &ctx(12.0, Some(2), None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_glucose_mg_dl_converts_before_comparison() {
        // 50 mg/dL = 2.78 mmol/L, fires
        let low = AssessmentAnswer::Glucose {
            value: 50.0,
            unit: GlucoseUnit::MgDl,
        };
        assert!(evaluate(&low, &ctx(12.0, Some(2), None)).unwrap().is_some());

        // 90 mg/dL = 5.0 mmol/L, does not
        let normal = AssessmentAnswer::Glucose {
            value: 90.0,
            unit: GlucoseUnit::MgDl,
        };
        assert!(evaluate(&normal, &ctx(12.0, Some(2), None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_shock_scenario_15kg() {
        let answer = AssessmentAnswer::CapillaryRefill {
            refill: CapRefill::Prolonged,
        };
        let action = evaluate(&answer, &ctx(15.0, Some(3), None)).unwrap().unwrap();

        assert_eq!(action.id, "shock");
        assert_eq!(action.dose.as_deref(), Some("300 mL"));
        assert_eq!(action.intervention_template_id, "fluid_bolus");
    }

    #[test]
    fn test_flash_refill_also_fires_shock() {
        let answer = AssessmentAnswer::CapillaryRefill {
            refill: CapRefill::Flash,
        };
        let action = evaluate(&answer, &ctx(15.0, Some(3), None)).unwrap().unwrap();
        assert_eq!(action.id, "shock");
        assert!(action.title.contains("warm shock"));
    }

    #[test]
    fn test_normal_refill_does_not_fire() {
        let answer = AssessmentAnswer::CapillaryRefill {
            refill: CapRefill::Normal,
        };
        assert!(evaluate(&answer, &ctx(15.0, Some(3), None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_apnea_age_band_branching() {
        let answer = AssessmentAnswer::Breathing { present: false };

        let infant = evaluate(&answer, &ctx(5.0, Some(0), Some(4)))
            .unwrap()
            .unwrap();
        assert!(infant.instruction.contains("30 breaths/min"));

        let older = evaluate(&answer, &ctx(30.0, Some(11), None))
            .unwrap()
            .unwrap();
        assert!(older.instruction.contains("12 breaths/min"));
    }

    #[test]
    fn test_pulselessness_compression_technique_by_age() {
        let answer = AssessmentAnswer::Pulse { present: false };

        let infant = evaluate(&answer, &ctx(5.0, Some(0), Some(6)))
            .unwrap()
            .unwrap();
        assert!(infant.instruction.contains("two-finger"));

        let child = evaluate(&answer, &ctx(18.0, Some(5), None))
            .unwrap()
            .unwrap();
        assert!(child.instruction.contains("one hand"));

        let older = evaluate(&answer, &ctx(35.0, Some(10), None))
            .unwrap()
            .unwrap();
        assert!(older.instruction.contains("two hands"));
    }

    #[test]
    fn test_breathing_present_is_quiet() {
        let answer = AssessmentAnswer::Breathing { present: true };
        assert!(evaluate(&answer, &ctx(12.0, Some(2), None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_trigger_template_lookup_is_fallible() {
        for id in [
            "ventilation_bvm",
            "cpr_compressions",
            "dextrose_bolus",
            "fluid_bolus",
        ] {
            assert!(template(id).is_ok());
        }
        assert!(matches!(
            template("no_such_template"),
            Err(Error::TemplateValidation(_))
        ));
    }

    #[test]
    fn test_independent_triggers_fire_from_same_session() {
        let ctx = ctx(12.0, Some(2), None);
        let answers = [
            AssessmentAnswer::Breathing { present: false },
            AssessmentAnswer::Glucose {
                value: 2.0,
                unit: GlucoseUnit::MmolL,
            },
            AssessmentAnswer::CapillaryRefill {
                refill: CapRefill::Prolonged,
            },
        ];

        let fired: Vec<_> = answers
            .iter()
            .map(|a| evaluate(a, &ctx).unwrap())
            .flatten()
            .collect();

        assert_eq!(fired.len(), 3);
        let ids: Vec<_> = fired.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["apnea", "hypoglycemia", "shock"]);
    }

    #[test]
    fn test_replaced_weight_is_visible_to_next_dose() {
        let mut ctx = ctx(12.0, Some(2), None);
        let answer = AssessmentAnswer::Glucose {
            value: 2.0,
            unit: GlucoseUnit::MmolL,
        };

        let before = evaluate(&answer, &ctx).unwrap().unwrap();
        assert_eq!(before.dose.as_deref(), Some("24 mL"));

        ctx.replace_weight(WeightEstimate {
            weight_kg: 15.0,
            method: WeightMethod::Actual,
            confidence: Confidence::High,
            source: "measured weight".into(),
        });

        let after = evaluate(&answer, &ctx).unwrap().unwrap();
        assert_eq!(after.dose.as_deref(), Some("30 mL"));
    }
}
