//! Dose and therapeutic calculation engine.
//!
//! Pure, side-effect-free functions mapping a resolved weight to drug,
//! fluid, and energy doses using fixed per-kilogram coefficients and,
//! where clinically defined, hard maximum caps independent of weight.
//!
//! Rounding is fixed so two resolutions of the same weight always produce
//! bit-identical dose strings: mass doses round to two decimals, volumes
//! and energies to the nearest whole unit.

use crate::error::{Error, Result};
use std::fmt;

/// Unit of a computed dose
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoseUnit {
    Milligrams,
    Millilitres,
    Joules,
}

/// Fixed dosing parameters for one therapeutic action
#[derive(Clone, Copy, Debug)]
pub struct DoseSpec {
    pub name: &'static str,
    /// Coefficient per kilogram of body weight
    pub per_kg: f64,
    pub unit: DoseUnit,
    /// Hard cap independent of weight, applied before rounding
    pub max: Option<f64>,
}

/// A computed dose with its unit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dose {
    pub value: f64,
    pub unit: DoseUnit,
}

impl fmt::Display for Dose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            DoseUnit::Milligrams => write!(f, "{:.2} mg", self.value),
            DoseUnit::Millilitres => write!(f, "{:.0} mL", self.value),
            DoseUnit::Joules => write!(f, "{:.0} J", self.value),
        }
    }
}

/// Epinephrine 1:10,000 IV/IO, 0.01 mg/kg, max 1 mg
pub const EPINEPHRINE_IV: DoseSpec = DoseSpec {
    name: "epinephrine IV/IO",
    per_kg: 0.01,
    unit: DoseUnit::Milligrams,
    max: Some(1.0),
};

/// Amiodarone IV/IO, 5 mg/kg, capped at 300 mg regardless of weight
pub const AMIODARONE_IV: DoseSpec = DoseSpec {
    name: "amiodarone IV/IO",
    per_kg: 5.0,
    unit: DoseUnit::Milligrams,
    max: Some(300.0),
};

/// 10% dextrose bolus, 2 mL/kg
pub const DEXTROSE_10_BOLUS: DoseSpec = DoseSpec {
    name: "10% dextrose bolus",
    per_kg: 2.0,
    unit: DoseUnit::Millilitres,
    max: None,
};

/// Isotonic crystalloid bolus, 20 mL/kg
pub const FLUID_BOLUS: DoseSpec = DoseSpec {
    name: "crystalloid fluid bolus",
    per_kg: 20.0,
    unit: DoseUnit::Millilitres,
    max: None,
};

/// Defibrillation energy, 2 J/kg
pub const DEFIB_ENERGY: DoseSpec = DoseSpec {
    name: "defibrillation energy",
    per_kg: 2.0,
    unit: DoseUnit::Joules,
    max: None,
};

/// Compute a dose for a resolved weight
///
/// A non-positive weight is a caller contract violation: callers must
/// guarantee a positive resolved weight (the resolution engine always
/// produces one) before calling.
pub fn dose_for(weight_kg: f64, spec: &DoseSpec) -> Result<Dose> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} requires a positive weight, got {}",
            spec.name, weight_kg
        )));
    }

    let mut value = weight_kg * spec.per_kg;
    if let Some(max) = spec.max {
        if value > max {
            tracing::debug!(
                "{}: {:.2} exceeds cap, clamping to {:.2}",
                spec.name,
                value,
                max
            );
            value = max;
        }
    }

    let value = match spec.unit {
        DoseUnit::Milligrams => (value * 100.0).round() / 100.0,
        DoseUnit::Millilitres | DoseUnit::Joules => value.round(),
    };

    Ok(Dose {
        value,
        unit: spec.unit,
    })
}

/// Epinephrine dose in mg
pub fn epinephrine_mg(weight_kg: f64) -> Result<Dose> {
    dose_for(weight_kg, &EPINEPHRINE_IV)
}

/// 10% dextrose bolus volume in mL
pub fn dextrose_10_ml(weight_kg: f64) -> Result<Dose> {
    dose_for(weight_kg, &DEXTROSE_10_BOLUS)
}

/// Crystalloid bolus volume in mL
pub fn fluid_bolus_ml(weight_kg: f64) -> Result<Dose> {
    dose_for(weight_kg, &FLUID_BOLUS)
}

/// Defibrillation energy in joules
pub fn defib_energy_j(weight_kg: f64) -> Result<Dose> {
    dose_for(weight_kg, &DEFIB_ENERGY)
}

/// Amiodarone dose in mg
pub fn amiodarone_mg(weight_kg: f64) -> Result<Dose> {
    dose_for(weight_kg, &AMIODARONE_IV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dextrose_scenario_12kg() {
        let dose = dextrose_10_ml(12.0).unwrap();
        assert_eq!(dose.to_string(), "24 mL");
    }

    #[test]
    fn test_fluid_bolus_scenario_15kg() {
        let dose = fluid_bolus_ml(15.0).unwrap();
        assert_eq!(dose.to_string(), "300 mL");
    }

    #[test]
    fn test_epinephrine_two_decimal_mass() {
        assert_eq!(epinephrine_mg(14.0).unwrap().to_string(), "0.14 mg");
        assert_eq!(epinephrine_mg(3.5).unwrap().to_string(), "0.04 mg");
    }

    #[test]
    fn test_epinephrine_capped_at_1mg() {
        // 120 kg * 0.01 = 1.2 mg, clamped
        assert_eq!(epinephrine_mg(120.0).unwrap().to_string(), "1.00 mg");
    }

    #[test]
    fn test_amiodarone_weight_independent_cap() {
        // 40 kg * 5 = 200 mg, under the cap
        assert_eq!(amiodarone_mg(40.0).unwrap().to_string(), "200.00 mg");
        // 70 kg * 5 = 350 mg, capped at 300
        assert_eq!(amiodarone_mg(70.0).unwrap().to_string(), "300.00 mg");
        assert_eq!(amiodarone_mg(200.0).unwrap().to_string(), "300.00 mg");
    }

    #[test]
    fn test_defib_energy_whole_joules() {
        assert_eq!(defib_energy_j(14.0).unwrap().to_string(), "28 J");
        assert_eq!(defib_energy_j(6.3).unwrap().to_string(), "13 J");
    }

    #[test]
    fn test_non_positive_weight_is_contract_violation() {
        for weight in [0.0, -3.0, f64::NAN] {
            let result = dose_for(weight, &FLUID_BOLUS);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_same_weight_same_string() {
        let a = dose_for(13.7, &EPINEPHRINE_IV).unwrap().to_string();
        let b = dose_for(13.7, &EPINEPHRINE_IV).unwrap().to_string();
        assert_eq!(a, b);
    }
}
