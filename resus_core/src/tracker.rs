//! Active intervention state machine.
//!
//! Tracks many independently timed, escalating interventions in parallel.
//! Every transition is synchronous and immediate, triggered either by the
//! periodic external tick or by an explicit caller operation; nothing here
//! blocks, suspends, or locks.
//!
//! ```text
//! pending --(start)--> in_progress
//! in_progress --(tick observes expiry)--> needs_reassessment
//! needs_reassessment --(reassess)--> in_progress (new cycle)
//! needs_reassessment --(complete)--> completed
//! needs_reassessment --(escalate)--> escalated
//! in_progress --(complete)--> completed
//! in_progress --(escalate)--> escalated
//! any non-terminal --(cancel)--> failed
//! ```
//!
//! Terminal records are archived, never deleted. An escalation spawns a
//! new instance with a new id; it never mutates the old record into
//! something else. Repeating the same terminal operation is an idempotent
//! no-op; a conflicting operation on a terminal record is an
//! `InvalidState` error. In no case does an operation on one intervention
//! touch any other.

use crate::catalog::{get_default_templates, InterventionTemplate};
use crate::clock::{Clock, SystemClock};
use crate::dosing;
use crate::error::{Error, Result};
use crate::types::{ActiveIntervention, CriticalAction, InterventionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Aggregate intervention counts, derivable by simple filtering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InterventionCounts {
    pub active: usize,
    pub completed: usize,
    pub escalated: usize,
    pub failed: usize,
}

impl InterventionCounts {
    /// Total instances ever created
    pub fn total(&self) -> usize {
        self.active + self.completed + self.escalated + self.failed
    }
}

/// A fired trigger recorded for handover
#[derive(Clone, Debug, Serialize)]
pub struct FiredAction {
    pub fired_at: DateTime<Utc>,
    pub action: CriticalAction,
}

/// Read-only handover snapshot
///
/// Everything an external summary generator needs; the core does no
/// formatting itself.
#[derive(Clone, Debug, Serialize)]
pub struct HandoverSnapshot {
    pub generated_at: DateTime<Utc>,
    pub fired_actions: Vec<FiredAction>,
    pub interventions: Vec<ActiveIntervention>,
}

enum Slot {
    Active(usize),
    Archived(usize),
}

/// In-memory tracker for the parallel intervention lifecycle
pub struct InterventionTracker<C: Clock = SystemClock> {
    clock: C,
    active: Vec<ActiveIntervention>,
    archived: Vec<ActiveIntervention>,
    fired: Vec<FiredAction>,
    next_seq: u64,
}

impl<C: Clock> InterventionTracker<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            active: Vec::new(),
            archived: Vec::new(),
            fired: Vec::new(),
            next_seq: 0,
        }
    }

    /// Record a fired trigger for the handover snapshot
    pub fn record_trigger(&mut self, action: &CriticalAction) {
        self.fired.push(FiredAction {
            fired_at: self.clock.now(),
            action: action.clone(),
        });
    }

    /// Instantiate a pending intervention from a fired action's template
    ///
    /// `weight_kg` feeds the cumulative volume bookkeeping for repeatable
    /// interventions and must be the session's current resolved weight.
    pub fn admit(&mut self, action: &CriticalAction, weight_kg: f64) -> Result<Uuid> {
        let template = self.lookup_template(&action.intervention_template_id)?;
        Ok(self.instantiate(template, Some(weight_kg))?)
    }

    /// Admit and immediately start an intervention from a template id
    ///
    /// Matches the UI write surface: `start(templateId)`.
    pub fn start_template(&mut self, template_id: &str, weight_kg: f64) -> Result<Uuid> {
        let template = self.lookup_template(template_id)?;
        let id = self.instantiate(template, Some(weight_kg))?;
        self.start(id)?;
        Ok(id)
    }

    fn lookup_template(&self, template_id: &str) -> Result<&'static InterventionTemplate> {
        get_default_templates().get(template_id).ok_or_else(|| {
            Error::InvalidInput(format!("unknown intervention template '{}'", template_id))
        })
    }

    fn instantiate(
        &mut self,
        template: &InterventionTemplate,
        weight_kg: Option<f64>,
    ) -> Result<Uuid> {
        let (bolus_number, volume_given_ml, max_volume_ml) = if template.repeatable {
            self.bolus_bookkeeping(template, weight_kg)?
        } else {
            (None, None, None)
        };

        let now = self.clock.now();
        let intervention = ActiveIntervention {
            id: Uuid::new_v4(),
            template_id: template.id.clone(),
            title: template.title.clone(),
            priority: template.priority,
            status: InterventionStatus::Pending,
            created_at: now,
            started_at: None,
            ended_at: None,
            timer_duration_seconds: template.timer_seconds,
            reassess_after_seconds: template.reassess_after_seconds,
            escalation_action: template.escalation_action.clone(),
            bolus_number,
            volume_given_ml,
            max_volume_ml,
            cycle: 1,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        tracing::info!(
            "Admitted intervention {} ({}) as pending",
            intervention.id,
            intervention.template_id
        );
        let id = intervention.id;
        self.active.push(intervention);
        Ok(id)
    }

    /// Running cumulative volume across instances of a repeatable template
    ///
    /// The new instance's cumulative is the largest volume recorded by a
    /// prior non-failed instance plus its own bolus at the current weight,
    /// so a mid-session weight replacement only changes volumes given from
    /// then on. Cancelled instances gave no fluid and contribute neither to
    /// the cumulative nor to the bolus number.
    ///
    /// The ceiling is advisory: exceeding it logs a warning and is surfaced
    /// via `over_ceiling()`, but creation is never blocked.
    fn bolus_bookkeeping(
        &self,
        template: &InterventionTemplate,
        weight_kg: Option<f64>,
    ) -> Result<(Option<u32>, Option<f64>, Option<f64>)> {
        let Some(weight) = weight_kg else {
            tracing::warn!(
                "Repeatable template {} admitted without a weight; skipping volume tracking",
                template.id
            );
            return Ok((None, None, None));
        };

        let per_instance = dosing::fluid_bolus_ml(weight)?.value;
        let prior: Vec<_> = self
            .active
            .iter()
            .chain(self.archived.iter())
            .filter(|i| {
                i.template_id == template.id && i.status != InterventionStatus::Failed
            })
            .collect();

        let bolus_number = prior.len() as u32 + 1;
        let prior_volume = prior
            .iter()
            .filter_map(|i| i.volume_given_ml)
            .fold(0.0, f64::max);
        let cumulative = prior_volume + per_instance;
        let ceiling = template.max_cumulative_ml_per_kg.map(|c| c * weight);

        if let Some(max) = ceiling {
            if cumulative > max {
                tracing::warn!(
                    "Cumulative {} volume {:.0} mL exceeds advisory ceiling {:.0} mL",
                    template.id,
                    cumulative,
                    max
                );
            }
        }

        Ok((Some(bolus_number), Some(cumulative), ceiling))
    }

    /// pending -> in_progress; starts the timer cycle
    pub fn start(&mut self, id: Uuid) -> Result<()> {
        let now = self.clock.now();
        match self.slot(id)? {
            Slot::Active(idx) => {
                let intervention = &mut self.active[idx];
                match intervention.status {
                    InterventionStatus::Pending => {
                        intervention.status = InterventionStatus::InProgress;
                        intervention.started_at = Some(now);
                        tracing::info!("Started intervention {}", id);
                        Ok(())
                    }
                    // Repeated start is harmless
                    InterventionStatus::InProgress => Ok(()),
                    status => Err(Error::InvalidState {
                        id,
                        status,
                        operation: "start",
                    }),
                }
            }
            Slot::Archived(idx) => Err(Error::InvalidState {
                id,
                status: self.archived[idx].status,
                operation: "start",
            }),
        }
    }

    /// in_progress or needs_reassessment -> completed
    pub fn complete(&mut self, id: Uuid) -> Result<()> {
        match self.slot(id)? {
            Slot::Active(idx) => match self.active[idx].status {
                InterventionStatus::InProgress | InterventionStatus::NeedsReassessment => {
                    self.archive(idx, InterventionStatus::Completed);
                    Ok(())
                }
                status => Err(Error::InvalidState {
                    id,
                    status,
                    operation: "complete",
                }),
            },
            Slot::Archived(idx) => match self.archived[idx].status {
                // Second complete is a safe no-op
                InterventionStatus::Completed => Ok(()),
                status => Err(Error::InvalidState {
                    id,
                    status,
                    operation: "complete",
                }),
            },
        }
    }

    /// in_progress or needs_reassessment -> escalated
    ///
    /// When the template defines an escalation template, a *new* pending
    /// instance is spawned and its id returned; the escalated record is
    /// archived untouched.
    pub fn escalate(&mut self, id: Uuid, reason: &str) -> Result<Option<Uuid>> {
        let follow_up_template = match self.slot(id)? {
            Slot::Active(idx) => match self.active[idx].status {
                InterventionStatus::InProgress | InterventionStatus::NeedsReassessment => {
                    tracing::warn!("Escalating intervention {}: {}", id, reason);
                    let template_id = self.active[idx].template_id.clone();
                    self.archive(idx, InterventionStatus::Escalated);
                    get_default_templates()
                        .get(&template_id)
                        .and_then(|t| t.escalation_template_id.clone())
                }
                status => {
                    return Err(Error::InvalidState {
                        id,
                        status,
                        operation: "escalate",
                    })
                }
            },
            Slot::Archived(idx) => match self.archived[idx].status {
                // Repeated escalate is a no-op and spawns nothing further
                InterventionStatus::Escalated => return Ok(None),
                status => {
                    return Err(Error::InvalidState {
                        id,
                        status,
                        operation: "escalate",
                    })
                }
            },
        };

        match follow_up_template {
            Some(template_id) => {
                let template = self.lookup_template(&template_id)?;
                let new_id = self.instantiate(template, None)?;
                tracing::info!("Escalation spawned follow-up intervention {}", new_id);
                Ok(Some(new_id))
            }
            None => Ok(None),
        }
    }

    /// any non-terminal -> failed
    pub fn cancel(&mut self, id: Uuid) -> Result<()> {
        match self.slot(id)? {
            Slot::Active(idx) => {
                tracing::info!("Cancelled intervention {}", id);
                self.archive(idx, InterventionStatus::Failed);
                Ok(())
            }
            Slot::Archived(idx) => match self.archived[idx].status {
                // Second cancel is a safe no-op
                InterventionStatus::Failed => Ok(()),
                status => Err(Error::InvalidState {
                    id,
                    status,
                    operation: "cancel",
                }),
            },
        }
    }

    /// needs_reassessment -> in_progress, starting a fresh timer cycle
    ///
    /// Confirms the intervention is ongoing. Calling it on an intervention
    /// that is still in progress is a harmless no-op (double confirmation).
    pub fn reassess(&mut self, id: Uuid) -> Result<()> {
        let now = self.clock.now();
        match self.slot(id)? {
            Slot::Active(idx) => {
                let intervention = &mut self.active[idx];
                match intervention.status {
                    InterventionStatus::NeedsReassessment => {
                        intervention.status = InterventionStatus::InProgress;
                        intervention.started_at = Some(now);
                        intervention.cycle += 1;
                        tracing::info!(
                            "Intervention {} confirmed ongoing, cycle {}",
                            id,
                            intervention.cycle
                        );
                        Ok(())
                    }
                    InterventionStatus::InProgress => Ok(()),
                    status => Err(Error::InvalidState {
                        id,
                        status,
                        operation: "reassess",
                    }),
                }
            }
            Slot::Archived(idx) => Err(Error::InvalidState {
                id,
                status: self.archived[idx].status,
                operation: "reassess",
            }),
        }
    }

    /// Periodic derived-state recomputation, the only background activity
    ///
    /// Flips expired in-progress interventions to `needs_reassessment`.
    /// Idempotent and order-independent: running it twice with the same
    /// clock reading produces identical state, and no intervention's
    /// update depends on another's. It never completes, escalates, or
    /// cancels anything; a human (or explicit automation hook) confirms
    /// every transition out of `needs_reassessment`.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        for intervention in &mut self.active {
            if intervention.status == InterventionStatus::InProgress
                && intervention.is_expired(now)
            {
                intervention.status = InterventionStatus::NeedsReassessment;
                tracing::info!(
                    "Intervention {} timer expired, awaiting reassessment",
                    intervention.id
                );
            }
        }
    }

    /// Active interventions sorted by priority, stable on ties by creation
    /// order
    pub fn active(&self) -> Vec<&ActiveIntervention> {
        let mut interventions: Vec<_> = self.active.iter().collect();
        interventions.sort_by_key(|i| (i.priority, i.seq));
        interventions
    }

    /// Terminal records, in archival order
    pub fn archived(&self) -> &[ActiveIntervention] {
        &self.archived
    }

    pub fn get(&self, id: Uuid) -> Option<&ActiveIntervention> {
        self.active
            .iter()
            .find(|i| i.id == id)
            .or_else(|| self.archived.iter().find(|i| i.id == id))
    }

    pub fn counts(&self) -> InterventionCounts {
        InterventionCounts {
            active: self.active.len(),
            completed: self
                .archived
                .iter()
                .filter(|i| i.status == InterventionStatus::Completed)
                .count(),
            escalated: self
                .archived
                .iter()
                .filter(|i| i.status == InterventionStatus::Escalated)
                .count(),
            failed: self
                .archived
                .iter()
                .filter(|i| i.status == InterventionStatus::Failed)
                .count(),
        }
    }

    /// Read-only snapshot of every fired trigger and every intervention
    /// record, for external summary generation
    pub fn snapshot(&self) -> HandoverSnapshot {
        let mut interventions: Vec<_> =
            self.active().into_iter().cloned().collect();
        interventions.extend(self.archived.iter().cloned());
        HandoverSnapshot {
            generated_at: self.clock.now(),
            fired_actions: self.fired.clone(),
            interventions,
        }
    }

    /// Current clock reading, for callers deriving display state
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn slot(&self, id: Uuid) -> Result<Slot> {
        if let Some(idx) = self.active.iter().position(|i| i.id == id) {
            return Ok(Slot::Active(idx));
        }
        if let Some(idx) = self.archived.iter().position(|i| i.id == id) {
            return Ok(Slot::Archived(idx));
        }
        Err(Error::NotFound(id))
    }

    fn archive(&mut self, active_idx: usize, status: InterventionStatus) {
        let mut intervention = self.active.remove(active_idx);
        intervention.status = status;
        intervention.ended_at = Some(self.clock.now());
        self.archived.push(intervention);
    }
}

impl Default for InterventionTracker<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}
