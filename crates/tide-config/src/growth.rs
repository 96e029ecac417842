//! Growth model configuration: named coefficient sets and temperature fallbacks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tide_core::growth::GrowthCoefficients;

use crate::ConfigError;

fn default_set_name() -> String {
    String::from("default")
}

/// Used when neither a measured reading nor a profile point exists for a day.
const fn default_temperature_c() -> f64 {
    10.0
}

fn default_sets() -> BTreeMap<String, GrowthCoefficients> {
    BTreeMap::from([(default_set_name(), GrowthCoefficients::default())])
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrowthConfig {
    /// Coefficient set used for cohorts that do not name one.
    #[serde(default = "default_set_name")]
    pub default_coefficient_set: String,

    /// Last-resort temperature in °C.
    #[serde(default = "default_temperature_c")]
    pub default_temperature_c: f64,

    #[serde(default = "default_sets")]
    pub coefficient_sets: BTreeMap<String, GrowthCoefficients>,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            default_coefficient_set: default_set_name(),
            default_temperature_c: default_temperature_c(),
            coefficient_sets: default_sets(),
        }
    }
}

impl GrowthConfig {
    /// Resolve a coefficient set by name, falling back to the default set name.
    ///
    /// Returns the resolved name together with its coefficients.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownCoefficientSet` if the name is not defined.
    pub fn coefficients<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a GrowthCoefficients), ConfigError> {
        let name = name.unwrap_or(&self.default_coefficient_set);
        self.coefficient_sets
            .get(name)
            .map(|c| (name, c))
            .ok_or_else(|| ConfigError::UnknownCoefficientSet {
                name: name.to_string(),
            })
    }
}
