mod report;

use chrono::Duration;
use clap::{Parser, Subcommand};
use resus_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "resus")]
#[command(about = "Pediatric emergency decision support", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a best weight estimate from partial measurements
    Weight {
        /// Actual measured weight in kg
        #[arg(long)]
        actual_kg: Option<f64>,

        /// Measured length in cm
        #[arg(long)]
        length_cm: Option<f64>,

        #[arg(long)]
        age_years: Option<u32>,

        #[arg(long)]
        age_months: Option<u32>,

        /// Mid-upper-arm circumference in cm
        #[arg(long)]
        muac_cm: Option<f64>,

        /// Caregiver's weight estimate in kg
        #[arg(long)]
        parent_kg: Option<f64>,
    },

    /// Evaluate assessment answers against the critical trigger table
    Assess {
        #[arg(long)]
        actual_kg: Option<f64>,

        #[arg(long)]
        length_cm: Option<f64>,

        #[arg(long)]
        age_years: Option<u32>,

        #[arg(long)]
        age_months: Option<u32>,

        /// Is the patient breathing? (yes/no)
        #[arg(long)]
        breathing: Option<String>,

        /// Is a pulse palpable? (yes/no)
        #[arg(long)]
        pulse: Option<String>,

        /// Blood glucose value
        #[arg(long)]
        glucose: Option<f64>,

        /// Glucose unit (mmol or mgdl)
        #[arg(long, default_value = "mmol")]
        glucose_unit: String,

        /// Capillary refill (normal/prolonged/flash)
        #[arg(long)]
        cap_refill: Option<String>,

        /// Skip audit logging
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a scripted resuscitation scenario end to end
    Simulate,
}

fn main() -> Result<()> {
    resus_core::logging::init();

    let cli = Cli::parse();

    // Refuse to run with a broken built-in catalog
    get_default_templates().ensure_valid()?;

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Weight {
            actual_kg,
            length_cm,
            age_years,
            age_months,
            muac_cm,
            parent_kg,
        } => cmd_weight(WeightInputs {
            actual_weight_kg: actual_kg,
            length_cm,
            age_years,
            age_months,
            muac_cm,
            parent_estimate_kg: parent_kg,
        }),
        Commands::Assess {
            actual_kg,
            length_cm,
            age_years,
            age_months,
            breathing,
            pulse,
            glucose,
            glucose_unit,
            cap_refill,
            dry_run,
        } => {
            let inputs = WeightInputs {
                actual_weight_kg: actual_kg,
                length_cm,
                age_years,
                age_months,
                muac_cm: None,
                parent_estimate_kg: None,
            };
            let answers = collect_answers(breathing, pulse, glucose, &glucose_unit, cap_refill);
            cmd_assess(data_dir, inputs, age_years, age_months, answers, dry_run)
        }
        Commands::Simulate => cmd_simulate(data_dir, &config),
    }
}

fn cmd_weight(inputs: WeightInputs) -> Result<()> {
    let estimate = weight::resolve(&inputs);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  WEIGHT ESTIMATE");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Weight:     {:.1} kg", estimate.weight_kg);
    println!("  Method:     {:?}", estimate.method);
    println!("  Confidence: {:?}", estimate.confidence);
    println!("  Source:     {}", estimate.source);

    if let Some(length) = inputs.length_cm {
        if let Some(zone) = lookup_length_zone(length) {
            println!();
            println!("  Zone {} equipment:", zone.zone);
            println!("    Tube:        {:.1} mm at {:.1} cm depth", zone.tube_size_mm, zone.tube_depth_cm);
            println!("    Defib:       {} J", zone.defib_energy_j());
            println!("    Epinephrine: {:.2} mg", zone.epinephrine_mg());
            println!("    Fluid bolus: {} mL", zone.fluid_bolus_ml());
        }
    }

    if let (Some(years), months) = (inputs.age_years, inputs.age_months) {
        if let Some(comparison) = age_formula_comparison(years, months.unwrap_or(0)) {
            println!();
            println!("  Formula comparison (display only):");
            println!("    Primary:   {:.1} kg", comparison.primary_kg);
            if let Some(secondary) = comparison.secondary_kg {
                println!("    Secondary: {:.1} kg", secondary);
            }
        }

        let check =
            validate_weight_for_age(estimate.weight_kg, years, months.unwrap_or(0));
        if check != WeightForAge::Plausible {
            println!();
            println!("  ⚠ Advisory: weight looks {:?} for age", check);
        }
    }

    println!();
    Ok(())
}

fn collect_answers(
    breathing: Option<String>,
    pulse: Option<String>,
    glucose: Option<f64>,
    glucose_unit: &str,
    cap_refill: Option<String>,
) -> Vec<AssessmentAnswer> {
    let mut answers = Vec::new();

    if let Some(value) = breathing.as_deref().and_then(parse_yes_no) {
        answers.push(AssessmentAnswer::Breathing { present: value });
    }
    if let Some(value) = pulse.as_deref().and_then(parse_yes_no) {
        answers.push(AssessmentAnswer::Pulse { present: value });
    }
    if let Some(value) = glucose {
        let unit = match glucose_unit.to_lowercase().as_str() {
            "mgdl" | "mg_dl" | "mg/dl" => GlucoseUnit::MgDl,
            _ => GlucoseUnit::MmolL,
        };
        answers.push(AssessmentAnswer::Glucose { value, unit });
    }
    if let Some(refill) = cap_refill.as_deref().and_then(parse_cap_refill) {
        answers.push(AssessmentAnswer::CapillaryRefill { refill });
    }

    answers
}

fn parse_yes_no(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        other => {
            eprintln!("Unknown yes/no answer: {}. Skipping question.", other);
            None
        }
    }
}

fn parse_cap_refill(value: &str) -> Option<CapRefill> {
    match value.to_lowercase().as_str() {
        "normal" => Some(CapRefill::Normal),
        "prolonged" => Some(CapRefill::Prolonged),
        "flash" => Some(CapRefill::Flash),
        other => {
            eprintln!("Unknown capillary refill: {}. Skipping question.", other);
            None
        }
    }
}

fn cmd_assess(
    data_dir: PathBuf,
    inputs: WeightInputs,
    age_years: Option<u32>,
    age_months: Option<u32>,
    answers: Vec<AssessmentAnswer>,
    dry_run: bool,
) -> Result<()> {
    let estimate = weight::resolve(&inputs);
    let ctx = PatientContext {
        age_years,
        age_months,
        resolved_weight: estimate.clone(),
        glucose_unit: GlucoseUnit::MmolL,
    };

    let mut sink = JsonlSink::new(data_dir.join("audit").join("assessment.jsonl"));
    if !dry_run {
        sink.append(&AuditEvent::WeightResolved {
            at: chrono::Utc::now(),
            estimate: estimate.clone(),
        })?;
    }

    println!(
        "\nUsing weight {:.1} kg ({:?}, {:?} confidence)",
        estimate.weight_kg, estimate.method, estimate.confidence
    );

    let mut fired = 0;
    for answer in &answers {
        if let Some(action) = triggers::evaluate(answer, &ctx)? {
            fired += 1;
            display_action(&action);
            if !dry_run {
                sink.append(&AuditEvent::TriggerFired {
                    at: chrono::Utc::now(),
                    action: action.clone(),
                })?;
            }
        }
    }

    if fired == 0 {
        println!("\nNo critical triggers fired.");
    } else {
        println!("\n{} critical trigger(s) fired.", fired);
    }
    if dry_run {
        println!("[Dry run - not writing audit log]");
    }

    Ok(())
}

fn display_action(action: &CriticalAction) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {:?} ACTION: {}", action.severity, action.id);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", action.title);
    println!("  → {}", action.instruction);
    if let Some(ref dose) = action.dose {
        println!("  → Dose: {}", dose);
    }
    if let Some(ref route) = action.route {
        println!("  → Route: {}", route);
    }
    println!("  Rationale: {}", action.rationale);
    println!(
        "  Reassess after {} seconds (template: {})",
        action.reassess_after_seconds, action.intervention_template_id
    );
}

/// Scripted end-to-end scenario on a manual clock
///
/// Exercises the full flow: weight resolution, trigger evaluation,
/// intervention tracking through expiry, reassessment, escalation, and
/// handover export.
fn cmd_simulate(data_dir: PathBuf, config: &Config) -> Result<()> {
    let clock = ManualClock::new(chrono::Utc::now());
    let mut tracker = InterventionTracker::new(clock.clone());
    let mut sink = JsonlSink::new(data_dir.join("audit").join("simulation.jsonl"));

    // Intake: 100 cm length, 2 years old
    let inputs = WeightInputs {
        length_cm: Some(100.0),
        age_years: Some(2),
        ..Default::default()
    };
    let estimate = weight::resolve(&inputs);
    let ctx = PatientContext {
        age_years: Some(2),
        age_months: None,
        resolved_weight: estimate.clone(),
        glucose_unit: GlucoseUnit::MmolL,
    };
    sink.append(&AuditEvent::WeightResolved {
        at: clock.now(),
        estimate: estimate.clone(),
    })?;
    println!(
        "Patient: 2y, {:.1} kg ({:?})",
        estimate.weight_kg, estimate.method
    );

    // Assessment fires three independent triggers
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

    let weight_kg = ctx.resolved_weight.weight_kg;
    let mut started = Vec::new();
    for answer in &answers {
        if let Some(action) = triggers::evaluate(answer, &ctx)? {
            println!("Trigger fired: {} -> {}", action.id, action.title);
            tracker.record_trigger(&action);
            sink.append(&AuditEvent::TriggerFired {
                at: clock.now(),
                action: action.clone(),
            })?;

            let id = tracker.admit(&action, weight_kg)?;
            sink.append(&AuditEvent::InterventionCreated {
                at: clock.now(),
                id,
                template_id: action.intervention_template_id.clone(),
            })?;
            tracker.start(id)?;
            started.push((id, action.intervention_template_id));
        }
    }

    println!("\nActive interventions (priority order):");
    for intervention in tracker.active() {
        println!(
            "  [{:?}] {} ({})",
            intervention.priority, intervention.title, intervention.template_id
        );
    }

    // Advance past the ventilation timer, tick, and observe the prompt
    let step = Duration::seconds(config.simulation.tick_seconds.max(1) as i64);
    let mut elapsed = Duration::zero();
    while elapsed < Duration::seconds(121) {
        clock.advance(step);
        elapsed = elapsed + step;
        tracker.tick();
    }

    let due: Vec<_> = tracker
        .active()
        .iter()
        .filter(|i| i.status == InterventionStatus::NeedsReassessment)
        .map(|i| (i.id, i.title.clone()))
        .collect();
    for (id, title) in &due {
        println!("Reassessment due: {}", title);
        // Confirm ongoing; the timer restarts for a new cycle
        tracker.reassess(*id)?;
        sink.append(&AuditEvent::StatusChanged {
            at: clock.now(),
            id: *id,
            from: InterventionStatus::NeedsReassessment,
            to: InterventionStatus::InProgress,
            reason: Some("confirmed ongoing".into()),
        })?;
    }

    // Second fluid bolus: cumulative volume tracking
    let second_bolus = tracker.start_template("fluid_bolus", weight_kg)?;
    if let Some(record) = tracker.get(second_bolus) {
        println!(
            "Second bolus: cumulative {:.0} mL of {:.0} mL ceiling",
            record.volume_given_ml.unwrap_or(0.0),
            record.max_volume_ml.unwrap_or(0.0)
        );
    }

    // Dextrose rechecked and completed; first bolus fails to improve
    // perfusion and is escalated
    for (id, template_id) in &started {
        match template_id.as_str() {
            "dextrose_bolus" => {
                tracker.complete(*id)?;
                sink.append(&AuditEvent::StatusChanged {
                    at: clock.now(),
                    id: *id,
                    from: InterventionStatus::InProgress,
                    to: InterventionStatus::Completed,
                    reason: Some("glucose normalized".into()),
                })?;
            }
            "fluid_bolus" => {
                let follow_up = tracker.escalate(*id, "perfusion not improving")?;
                sink.append(&AuditEvent::StatusChanged {
                    at: clock.now(),
                    id: *id,
                    from: InterventionStatus::InProgress,
                    to: InterventionStatus::Escalated,
                    reason: Some("perfusion not improving".into()),
                })?;
                if let Some(new_id) = follow_up {
                    println!("Escalation spawned follow-up intervention");
                    tracker.start(new_id)?;
                }
            }
            _ => {}
        }
    }

    let counts = tracker.counts();
    println!(
        "\nCounts: {} active, {} completed, {} escalated, {} failed ({} total)",
        counts.active,
        counts.completed,
        counts.escalated,
        counts.failed,
        counts.total()
    );

    // Handover export
    let snapshot = tracker.snapshot();
    let handover_path = data_dir.join("handover.csv");
    report::write_handover_csv(&handover_path, &snapshot)?;
    println!("✓ Handover exported: {}", handover_path.display());
    println!(
        "  {} fired action(s), {} intervention record(s)",
        snapshot.fired_actions.len(),
        snapshot.interventions.len()
    );

    Ok(())
}
