//! Limiting factors for growth and turnover.
//!
//! All growth-limiting factors are dimensionless and lie in [0, 1]. The
//! respiration temperature effect and the turnover water factor are
//! multipliers on rates and may exceed 1. Heat and cold damage carry a
//! recovery memory across days in [`ExtremeTemperatureMemory`].
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{divide, PastureError};

/// Below this water demand [mm] the plant is considered unstressed.
const MIN_WATER_DEMAND: f64 = 1e-4;

/// CO2 concentrations closer than this to the reference have no effect [ppm].
const CO2_TOLERANCE: f64 = 0.01;

/// Cap on the relative increase of maintenance respiration above optimum.
const MAX_RESPIRATION_T_RATIO: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum PhotosynthesisPathway {
    #[default]
    C3,
    C4,
}

impl FromStr for PhotosynthesisPathway {
    type Err = PastureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "C3" => Ok(Self::C3),
            "C4" => Ok(Self::C4),
            _ => Err(PastureError::UnknownMethod {
                kind: "photosynthesis pathway",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PhotosynthesisPathway {
    type Error = PastureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Cardinal temperatures of the growth response [oC].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureCurve {
    pub t_min: f64,
    pub t_opt: f64,
    pub t_max: f64,
    /// Curvature of the bell.
    pub q: f64,
}

impl Default for TemperatureCurve {
    fn default() -> Self {
        Self {
            t_min: 2.0,
            t_opt: 20.0,
            t_max: 32.0,
            q: 1.75,
        }
    }
}

fn bell(t: f64, curve: &TemperatureCurve) -> f64 {
    let t_top = curve.t_opt + (curve.t_opt - curve.t_min) / curve.q;
    let val1 = (t - curve.t_min).powf(curve.q) * (t_top - t);
    let val2 = (curve.t_opt - curve.t_min).powf(curve.q) * (t_top - curve.t_opt);
    divide(val1, val2, 0.0).clamp(0.0, 1.0)
}

/// Growth temperature factor.
///
/// C3 species respond with an asymmetric bell that is zero outside
/// (t_min, t_max). C4 species plateau at 1 above the optimum.
pub fn temperature_factor(t: f64, pathway: PhotosynthesisPathway, curve: &TemperatureCurve) -> f64 {
    match pathway {
        PhotosynthesisPathway::C3 => {
            if t > curve.t_min && t < curve.t_max {
                bell(t, curve)
            } else {
                0.0
            }
        }
        PhotosynthesisPathway::C4 => {
            if t > curve.t_min {
                bell(t.min(curve.t_opt), curve)
            } else {
                0.0
            }
        }
    }
}

/// Temperature multiplier on maintenance respiration.
pub fn respiration_temperature_effect(
    t: f64,
    pathway: PhotosynthesisPathway,
    curve: &TemperatureCurve,
) -> f64 {
    if t <= 0.0 {
        0.0
    } else if t < curve.t_opt {
        temperature_factor(t, pathway, curve)
    } else {
        (t / curve.t_opt).min(MAX_RESPIRATION_T_RATIO)
            * temperature_factor(curve.t_opt, pathway, curve)
    }
}

/// Temperature factor for tissue turnover: linear from `t_min` to `t_opt`.
pub fn turnover_temperature_factor(t: f64, t_min: f64, t_opt: f64) -> f64 {
    if t <= t_min {
        0.0
    } else if t <= t_opt {
        divide(t - t_min, t_opt - t_min, 1.0)
    } else {
        1.0
    }
}

/// Thresholds of one extreme-temperature response [oC].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeTemperature {
    /// Temperature at which damage starts.
    pub onset: f64,
    /// Temperature at which photosynthesis stops.
    pub full: f64,
    /// Degree-days needed for full recovery.
    pub recovery_sum: f64,
    /// Reference temperature for accumulating recovery degree-days.
    pub reference: f64,
}

impl ExtremeTemperature {
    pub fn heat_default() -> Self {
        Self {
            onset: 28.0,
            full: 35.0,
            recovery_sum: 30.0,
            reference: 25.0,
        }
    }

    pub fn cold_default() -> Self {
        Self {
            onset: 0.0,
            full: -3.0,
            recovery_sum: 20.0,
            reference: 0.0,
        }
    }
}

/// Carry-over state of heat and cold damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeTemperatureMemory {
    pub heat_effect: f64,
    pub heat_accum: f64,
    pub cold_effect: f64,
    pub cold_accum: f64,
}

impl Default for ExtremeTemperatureMemory {
    fn default() -> Self {
        Self {
            heat_effect: 1.0,
            heat_accum: 0.0,
            cold_effect: 1.0,
            cold_accum: 0.0,
        }
    }
}

/// One step of a damage-and-recovery memory. Returns (factor, effect, accum).
fn extreme_step(effect: f64, accum: f64, recovery_dd: f64, new_factor: f64, sum: f64) -> (f64, f64, f64) {
    let mut effect = effect;
    let mut accum = accum;
    let mut factor = 1.0;
    if effect < 1.0 {
        accum += recovery_dd.max(0.0);
        if accum < sum {
            factor = effect + (1.0 - effect) * accum / sum;
        } else {
            effect = 1.0;
            accum = 0.0;
        }
    }
    if new_factor < 1.0 {
        effect = factor * new_factor;
        accum = 0.0;
        factor = effect;
    }
    (factor.clamp(0.0, 1.0), effect, accum)
}

impl ExtremeTemperatureMemory {
    /// Heat stress factor for today, updating the memory.
    pub fn heat_stress(&mut self, max_t: f64, mean_t: f64, heat: &ExtremeTemperature) -> f64 {
        let today = if max_t > heat.full {
            0.0
        } else if max_t > heat.onset {
            divide(heat.full - max_t, heat.full - heat.onset, 0.0)
        } else {
            1.0
        };
        let (factor, effect, accum) = extreme_step(
            self.heat_effect,
            self.heat_accum,
            heat.reference - mean_t,
            today,
            heat.recovery_sum,
        );
        self.heat_effect = effect;
        self.heat_accum = accum;
        factor
    }

    /// Cold stress factor for today, updating the memory.
    pub fn cold_stress(&mut self, min_t: f64, mean_t: f64, cold: &ExtremeTemperature) -> f64 {
        let today = if min_t < cold.full {
            0.0
        } else if min_t < cold.onset {
            divide(min_t - cold.full, cold.onset - cold.full, 0.0)
        } else {
            1.0
        };
        let (factor, effect, accum) = extreme_step(
            self.cold_effect,
            self.cold_accum,
            mean_t - cold.reference,
            today,
            cold.recovery_sum,
        );
        self.cold_effect = effect;
        self.cold_accum = accum;
        factor
    }
}

/// Ratio of water taken up to water demanded, clamped to [0, 1].
pub fn water_deficit_factor(uptake: f64, demand: f64) -> f64 {
    if demand <= MIN_WATER_DEMAND {
        1.0
    } else {
        (uptake / demand).clamp(0.0, 1.0)
    }
}

/// Reduction from water held above field capacity in the rooted profile.
///
/// Each slice is per layer: water, drained upper limit and saturation are
/// amounts [mm] and `rooted_fraction` is the fraction of the layer with roots.
pub fn water_logging_factor(
    water: &[f64],
    dul: &[f64],
    sat: &[f64],
    rooted_fraction: &[f64],
    coefficient: f64,
) -> f64 {
    let mut sw = 0.0;
    let mut sw_dul = 0.0;
    let mut sw_sat = 0.0;
    for (((&w, &d), &s), &f) in water.iter().zip(dul).zip(sat).zip(rooted_fraction) {
        sw += w * f;
        sw_dul += d * f;
        sw_sat += s * f;
    }
    let excess = divide((sw - sw_dul).max(0.0), sw_sat - sw_dul, 0.0);
    (1.0 - coefficient * excess).clamp(0.0, 1.0)
}

/// Multiplier on leaf turnover under drought, between 1 and `factor_max`.
pub fn turnover_water_factor(glf_water: f64, glf_water_opt: f64, factor_max: f64) -> f64 {
    if glf_water >= glf_water_opt {
        return 1.0;
    }
    let deficit = divide(glf_water_opt - glf_water, glf_water_opt, 0.0);
    (1.0 + (factor_max - 1.0) * deficit).clamp(1.0, factor_max.max(1.0))
}

/// CO2 response of photosynthesis; above 1 when CO2 exceeds the reference.
pub fn co2_effect_on_photosynthesis(co2: f64, reference: f64, coefficient: f64) -> f64 {
    if (co2 - reference).abs() < CO2_TOLERANCE {
        return 1.0;
    }
    (co2 / (coefficient + co2)) * ((reference + coefficient) / reference)
}

/// Decline of optimum N concentration under elevated CO2.
pub fn co2_effect_on_n_demand(co2: f64, reference: f64, offset: f64, minimum: f64, exponent: f64) -> f64 {
    if (co2 - reference).abs() < CO2_TOLERANCE {
        return 1.0;
    }
    let term_k = (offset - reference).abs().powf(exponent);
    let term_c = (co2 - reference).abs().powf(exponent);
    (minimum + (1.0 - minimum) * divide(term_k, term_k + term_c, 1.0)).clamp(0.0, 1.0)
}

/// Effect of leaf N status on maximum photosynthesis rate.
pub fn n_effect_on_photosynthesis(leaf_n_conc: f64, n_opt: f64, n_min: f64, co2_n_factor: f64) -> f64 {
    let target = n_opt * co2_n_factor;
    if leaf_n_conc >= target {
        1.0
    } else if leaf_n_conc <= n_min {
        0.0
    } else {
        divide(leaf_n_conc - n_min, target - n_min, 1.0).clamp(0.0, 1.0)
    }
}
