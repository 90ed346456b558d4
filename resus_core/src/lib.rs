#![forbid(unsafe_code)]

//! Clinical decision core for pediatric emergency assessment.
//!
//! This crate provides:
//! - Weight resolution from partial measurements
//! - Weight-dependent dose, fluid, and energy calculations
//! - Critical trigger evaluation against clinical thresholds
//! - Parallel tracking of independently timed interventions
//!
//! The core never persists data itself and never renders UI; it exposes
//! pure functions and a small in-memory state machine. Data flows strictly
//! upward: measurements -> weight estimate -> doses -> triggers ->
//! intervention tracking.

pub mod audit;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod dosing;
pub mod error;
pub mod logging;
pub mod tracker;
pub mod triggers;
pub mod types;
pub mod weight;

// Re-export commonly used types
pub use audit::{read_events, AuditEvent, AuditSink, JsonlSink};
pub use catalog::{build_default_templates, get_default_templates, InterventionTemplate, TemplateCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dosing::{dose_for, Dose, DoseSpec, DoseUnit};
pub use error::{Error, Result};
pub use tracker::{FiredAction, HandoverSnapshot, InterventionCounts, InterventionTracker};
pub use triggers::evaluate;
pub use types::*;
pub use weight::{
    age_formula_comparison, lookup_length_zone, resolve, validate_weight_for_age, LengthZone,
};
