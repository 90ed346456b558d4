//! Built-in catalog of intervention templates.
//!
//! The clinical protocols are a fixed, enumerable set, not user-authored:
//! every tracked intervention is instantiated from one of these templates.

use crate::error::{Error, Result};
use crate::types::Severity;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Broad kind of intervention, used for grouping in handover views
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Ventilation,
    Airway,
    Compressions,
    Medication,
    Fluids,
    Circulatory,
    Monitoring,
}

/// Template from which tracked interventions are instantiated
#[derive(Clone, Debug)]
pub struct InterventionTemplate {
    pub id: String,
    pub title: String,
    pub kind: InterventionKind,
    pub priority: Severity,
    /// Countdown until a reassessment prompt surfaces; untimed when None
    pub timer_seconds: Option<u32>,
    pub reassess_after_seconds: u32,
    /// What to do if this intervention fails
    pub escalation_action: Option<String>,
    /// Template spawned as a new instance on escalation
    pub escalation_template_id: Option<String>,
    /// Repeatable interventions track a cumulative volume across instances
    pub repeatable: bool,
    /// Advisory cumulative ceiling in mL/kg for repeatable interventions
    pub max_cumulative_ml_per_kg: Option<f64>,
}

/// The complete template catalog
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    pub templates: HashMap<String, InterventionTemplate>,
}

impl TemplateCatalog {
    pub fn get(&self, id: &str) -> Option<&InterventionTemplate> {
        self.templates.get(id)
    }

    /// Validate catalog invariants
    ///
    /// Returns human-readable errors; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, template) in &self.templates {
            if id != &template.id {
                errors.push(format!(
                    "Template key '{}' doesn't match id '{}'",
                    id, template.id
                ));
            }
            if template.title.is_empty() {
                errors.push(format!("Template '{}' has empty title", id));
            }
            if template.reassess_after_seconds == 0 {
                errors.push(format!("Template '{}' has zero reassess interval", id));
            }
            if let Some(timer) = template.timer_seconds {
                if timer == 0 {
                    errors.push(format!("Template '{}' has zero timer", id));
                }
            }
            if template.repeatable && template.max_cumulative_ml_per_kg.is_none() {
                errors.push(format!(
                    "Repeatable template '{}' has no cumulative ceiling",
                    id
                ));
            }
            if let Some(ref escalation) = template.escalation_template_id {
                if !self.templates.contains_key(escalation) {
                    errors.push(format!(
                        "Template '{}' escalates to non-existent template '{}'",
                        id, escalation
                    ));
                }
                if template.escalation_action.is_none() {
                    errors.push(format!(
                        "Template '{}' has an escalation template but no escalation action text",
                        id
                    ));
                }
            }
        }

        // Every trigger in the evaluator must have its template
        for required in [
            "ventilation_bvm",
            "cpr_compressions",
            "dextrose_bolus",
            "fluid_bolus",
        ] {
            if !self.templates.contains_key(required) {
                errors.push(format!("Missing required template '{}'", required));
            }
        }

        errors
    }

    /// Validate as a startup check, collapsing all problems into one error
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::TemplateValidation(errors.join("; ")))
        }
    }
}

/// Cached default catalog - built once and reused across all sessions
static DEFAULT_TEMPLATES: Lazy<TemplateCatalog> = Lazy::new(build_default_templates);

/// Get a reference to the cached default template catalog
pub fn get_default_templates() -> &'static TemplateCatalog {
    &DEFAULT_TEMPLATES
}

/// Builds the default template catalog
///
/// Prefer `get_default_templates()` outside of tests.
pub fn build_default_templates() -> TemplateCatalog {
    let mut templates = HashMap::new();

    templates.insert(
        "ventilation_bvm".into(),
        InterventionTemplate {
            id: "ventilation_bvm".into(),
            title: "Bag-valve-mask ventilation".into(),
            kind: InterventionKind::Ventilation,
            priority: Severity::Critical,
            timer_seconds: Some(120),
            reassess_after_seconds: 120,
            escalation_action: Some("Prepare for advanced airway placement".into()),
            escalation_template_id: Some("advanced_airway".into()),
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "advanced_airway".into(),
        InterventionTemplate {
            id: "advanced_airway".into(),
            title: "Advanced airway placement".into(),
            kind: InterventionKind::Airway,
            priority: Severity::Critical,
            timer_seconds: None,
            reassess_after_seconds: 300,
            escalation_action: None,
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "cpr_compressions".into(),
        InterventionTemplate {
            id: "cpr_compressions".into(),
            title: "Chest compressions".into(),
            kind: InterventionKind::Compressions,
            priority: Severity::Critical,
            // Rhythm check every two minutes
            timer_seconds: Some(120),
            reassess_after_seconds: 120,
            escalation_action: Some("Give epinephrine and continue compressions".into()),
            escalation_template_id: Some("epinephrine_iv".into()),
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "epinephrine_iv".into(),
        InterventionTemplate {
            id: "epinephrine_iv".into(),
            title: "Epinephrine IV/IO".into(),
            kind: InterventionKind::Medication,
            priority: Severity::Critical,
            // Repeat dosing window
            timer_seconds: Some(180),
            reassess_after_seconds: 180,
            escalation_action: Some("Consider amiodarone for refractory rhythm".into()),
            escalation_template_id: Some("amiodarone_iv".into()),
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "amiodarone_iv".into(),
        InterventionTemplate {
            id: "amiodarone_iv".into(),
            title: "Amiodarone IV/IO".into(),
            kind: InterventionKind::Medication,
            priority: Severity::Critical,
            timer_seconds: None,
            reassess_after_seconds: 300,
            escalation_action: None,
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "dextrose_bolus".into(),
        InterventionTemplate {
            id: "dextrose_bolus".into(),
            title: "10% dextrose bolus".into(),
            kind: InterventionKind::Medication,
            priority: Severity::Critical,
            // Recheck glucose in fifteen minutes
            timer_seconds: Some(900),
            reassess_after_seconds: 900,
            escalation_action: Some("Start continuous dextrose infusion and recheck".into()),
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "fluid_bolus".into(),
        InterventionTemplate {
            id: "fluid_bolus".into(),
            title: "Crystalloid fluid bolus".into(),
            kind: InterventionKind::Fluids,
            priority: Severity::Critical,
            timer_seconds: Some(600),
            reassess_after_seconds: 600,
            escalation_action: Some("Start inotrope support; consider blood products".into()),
            escalation_template_id: Some("inotrope_support".into()),
            repeatable: true,
            max_cumulative_ml_per_kg: Some(60.0),
        },
    );

    templates.insert(
        "inotrope_support".into(),
        InterventionTemplate {
            id: "inotrope_support".into(),
            title: "Inotrope support".into(),
            kind: InterventionKind::Circulatory,
            priority: Severity::Critical,
            timer_seconds: None,
            reassess_after_seconds: 600,
            escalation_action: None,
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "maintenance_fluids".into(),
        InterventionTemplate {
            id: "maintenance_fluids".into(),
            title: "Maintenance fluid infusion".into(),
            kind: InterventionKind::Fluids,
            priority: Severity::Urgent,
            timer_seconds: Some(3600),
            reassess_after_seconds: 3600,
            escalation_action: None,
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    templates.insert(
        "vitals_monitoring".into(),
        InterventionTemplate {
            id: "vitals_monitoring".into(),
            title: "Ongoing vitals monitoring".into(),
            kind: InterventionKind::Monitoring,
            priority: Severity::Routine,
            timer_seconds: Some(300),
            reassess_after_seconds: 300,
            escalation_action: None,
            escalation_template_id: None,
            repeatable: false,
            max_cumulative_ml_per_kg: None,
        },
    );

    TemplateCatalog { templates }
}
