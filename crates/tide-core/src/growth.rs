//! Growth model: maps prior weight, temperature, and coefficients to the next
//! day's weight.
//!
//! The default law is the cube-root thermal growth coefficient (TGC) form:
//!
//! ```text
//! W2^(1/3) = W1^(1/3) + tgc × max(T − T_base, 0) × Δt
//! ```
//!
//! With `Δt = 1` day. The increment is continuous and non-decreasing in `T`
//! for a fixed prior weight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Coefficients for one named growth curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthCoefficients {
    /// Thermal growth coefficient in g^(1/3) per °C-day.
    pub tgc: f64,
    /// Temperature at or below which no growth occurs.
    #[serde(default)]
    pub base_temperature_c: f64,
}

impl Default for GrowthCoefficients {
    fn default() -> Self {
        Self {
            tgc: 0.0025,
            base_temperature_c: 0.0,
        }
    }
}

/// A daily growth law.
pub trait GrowthModel: Send + Sync {
    /// Weight after one day of growth at `temperature_c`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataGap` when `temperature_c` is `None`, and
    /// `CoreError::Validation` for a non-positive or non-finite prior weight.
    fn daily_increment(
        &self,
        prior_weight_g: f64,
        temperature_c: Option<f64>,
        coefficients: &GrowthCoefficients,
        day: NaiveDate,
    ) -> Result<f64, CoreError>;
}

/// Cube-root TGC growth law.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeRootTgc;

impl CubeRootTgc {
    /// Closed-form weight after `days` at a constant temperature.
    #[must_use]
    pub fn project_weight(
        initial_weight_g: f64,
        temperature_c: f64,
        days: u32,
        coefficients: &GrowthCoefficients,
    ) -> f64 {
        let degree_days = effective_temperature(temperature_c, coefficients) * f64::from(days);
        (initial_weight_g.cbrt() + coefficients.tgc * degree_days).powi(3)
    }
}

impl GrowthModel for CubeRootTgc {
    fn daily_increment(
        &self,
        prior_weight_g: f64,
        temperature_c: Option<f64>,
        coefficients: &GrowthCoefficients,
        day: NaiveDate,
    ) -> Result<f64, CoreError> {
        let Some(temperature_c) = temperature_c else {
            return Err(CoreError::DataGap {
                input: "temperature".into(),
                day,
            });
        };
        if !prior_weight_g.is_finite() || prior_weight_g <= 0.0 {
            return Err(CoreError::Validation(format!(
                "prior weight must be positive, got {prior_weight_g}"
            )));
        }
        let step = coefficients.tgc * effective_temperature(temperature_c, coefficients);
        Ok((prior_weight_g.cbrt() + step).powi(3))
    }
}

fn effective_temperature(temperature_c: f64, coefficients: &GrowthCoefficients) -> f64 {
    (temperature_c - coefficients.base_temperature_c).max(0.0)
}
