//! Available water and mineral N per layer, and the uptake drawn from them.
//!
//! Uptake is supply-proportional: when the soil can meet the demand, every
//! layer gives up the same fraction of what it has available, so shortfalls
//! are spread over the profile rather than concentrated in the first layers.
//! With an external arbitrator the uptake arrays are taken as given and only
//! checked.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::layer::SoilZone;
use super::roots::{root_length_density, RootState};
use crate::error::{check_balance, divide, PastureError, Result};

/// Largest allowed gap between a reported uptake total and its layers.
pub const UPTAKE_TOLERANCE: f64 = 1e-4;

/// Slack allowed when comparing uptake with availability.
const BOUND_SLACK: f64 = 1e-9;

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => [$($text:literal),+]),+ $(,)? }) => {
        impl FromStr for $name {
            type Err = PastureError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($($text)|+ => Ok(Self::$variant),)+
                    _ => Err(PastureError::UnknownMethod {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = PastureError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum WaterUptakeMethod {
    /// Extractable water times the KL rate.
    #[default]
    Default,
    /// Extractable water scaled by root density, conductivity and wetness.
    Alternative,
}

string_enum!(WaterUptakeMethod, "water uptake method", {
    Default => ["default", "no"],
    Alternative => ["alternative", "yes"],
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum NitrogenUptakeMethod {
    /// All mineral N in the rooted soil, scaled by KNO3/KNH4.
    #[default]
    Default,
    /// Mineral N coupled to the fraction of available water taken up.
    Alternative,
}

string_enum!(NitrogenUptakeMethod, "nitrogen uptake method", {
    Default => ["default", "no"],
    Alternative => ["alternative", "yes"],
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum UptakeSource {
    /// The plant computes its own availability and uptake.
    #[default]
    Calculate,
    /// An arbitrator across plants supplies the finished uptake.
    External,
}

string_enum!(UptakeSource, "uptake source", {
    Calculate => ["calculate", "species"],
    External => ["external", "arbitrator"],
});

/// Uptake options and coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UptakeParams {
    pub water_method: WaterUptakeMethod,
    pub nitrogen_method: NitrogenUptakeMethod,
    pub source: UptakeSource,
    /// Fraction of NO3 available to roots (default method).
    pub kno3: f64,
    /// Fraction of NH4 available to roots (default method).
    pub knh4: f64,
    /// Availability of NO3 (coupled method).
    pub ku_no3: f64,
    /// Availability of NH4 (coupled method).
    pub ku_nh4: f64,
    /// Root length density giving 90% access to water [cm/cm3].
    pub reference_rld: f64,
    /// Conductivity giving 90% supply of water [mm/d].
    pub reference_ksat: f64,
}

impl Default for UptakeParams {
    fn default() -> Self {
        Self {
            water_method: WaterUptakeMethod::Default,
            nitrogen_method: NitrogenUptakeMethod::Default,
            source: UptakeSource::Calculate,
            kno3: 1.0,
            knh4: 1.0,
            ku_no3: 0.95,
            ku_nh4: 0.5,
            reference_rld: 2.0,
            reference_ksat: 1000.0,
        }
    }
}

/// Resources available to the plant in one zone, per layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneAvailability {
    pub water: Vec<f64>,
    pub no3: Vec<f64>,
    pub nh4: Vec<f64>,
}

/// Resources taken up from one zone, per layer (positive amounts).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneUptake {
    /// Water [mm].
    pub water: Vec<f64>,
    /// Nitrate [kg N/ha].
    pub no3: Vec<f64>,
    /// Ammonium [kg N/ha].
    pub nh4: Vec<f64>,
}

impl ZoneUptake {
    pub fn zeros(n_layers: usize) -> Self {
        Self {
            water: vec![0.0; n_layers],
            no3: vec![0.0; n_layers],
            nh4: vec![0.0; n_layers],
        }
    }

    pub fn total_water(&self) -> f64 {
        self.water.iter().sum()
    }

    pub fn total_nitrogen(&self) -> f64 {
        self.no3.iter().sum::<f64>() + self.nh4.iter().sum::<f64>()
    }

    /// Soil water change per layer (negative of the amount removed).
    pub fn water_deltas(&self) -> Vec<f64> {
        self.water.iter().map(|w| -w).collect()
    }

    pub fn no3_deltas(&self) -> Vec<f64> {
        self.no3.iter().map(|n| -n).collect()
    }

    pub fn nh4_deltas(&self) -> Vec<f64> {
        self.nh4.iter().map(|n| -n).collect()
    }
}

/// Water a layer can supply today [mm].
pub fn available_water(
    zone: &SoilZone,
    layer: usize,
    exploration: f64,
    rld: f64,
    params: &UptakeParams,
) -> f64 {
    let soil = &zone.layers[layer];
    let potential = soil.extractable_water() * exploration;
    match params.water_method {
        WaterUptakeMethod::Default => potential * soil.kl,
        WaterUptakeMethod::Alternative => {
            let fac_rld = 1.0 - 10f64.powf(-divide(rld, params.reference_rld, 0.0));
            let fac_cond = 1.0 - 10f64.powf(-divide(soil.ksat, params.reference_ksat, 0.0));
            let wetness = divide(soil.extractable_water(), soil.dul_mm() - soil.ll_mm(), 0.0);
            let fac_water = 1.0 - 10f64.powf(-wetness);
            potential * fac_rld * fac_cond * fac_water
        }
    }
}

/// Mineral N a layer can supply today, (NO3, NH4) [kg N/ha].
///
/// `water_taken` is the water already taken from the layer today, used by
/// the coupled method.
pub fn available_nitrogen(
    zone: &SoilZone,
    layer: usize,
    exploration: f64,
    water_taken: f64,
    params: &UptakeParams,
) -> (f64, f64) {
    let soil = &zone.layers[layer];
    match params.nitrogen_method {
        NitrogenUptakeMethod::Default => (
            soil.no3 * params.kno3 * exploration,
            soil.nh4 * params.knh4 * exploration,
        ),
        NitrogenUptakeMethod::Alternative => {
            let taken = divide(water_taken, soil.extractable_water(), 0.0).clamp(0.0, 1.0);
            (
                soil.no3 * params.ku_no3 * exploration * taken,
                soil.nh4 * params.ku_nh4 * exploration * taken,
            )
        }
    }
}

/// Water available in every layer of every zone.
pub fn water_availability(
    zones: &[SoilZone],
    roots: &RootState,
    root_dm: f64,
    specific_root_length: f64,
    params: &UptakeParams,
) -> Result<Vec<Vec<f64>>> {
    roots.check_topology(zones)?;
    Ok(zones
        .iter()
        .zip(&roots.zones)
        .map(|(zone, zr)| {
            let rld = root_length_density(
                root_dm * zr.share,
                specific_root_length,
                &zr.fraction,
                &zone.thicknesses(),
            );
            (0..zone.n_layers())
                .map(|i| {
                    if i > zr.frontier {
                        0.0
                    } else {
                        available_water(zone, i, zr.exploration[i], rld[i], params)
                    }
                })
                .collect()
        })
        .collect())
}

/// NO3 and NH4 available in every layer of every zone.
pub fn nitrogen_availability(
    zones: &[SoilZone],
    roots: &RootState,
    water_taken: &[Vec<f64>],
    params: &UptakeParams,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    roots.check_topology(zones)?;
    check_shape("water uptake", zones, water_taken)?;
    let mut no3 = Vec::with_capacity(zones.len());
    let mut nh4 = Vec::with_capacity(zones.len());
    for ((zone, zr), taken) in zones.iter().zip(&roots.zones).zip(water_taken) {
        let (a, b): (Vec<f64>, Vec<f64>) = (0..zone.n_layers())
            .map(|i| {
                if i > zr.frontier {
                    (0.0, 0.0)
                } else {
                    available_nitrogen(zone, i, zr.exploration[i], taken[i], params)
                }
            })
            .unzip();
        no3.push(a);
        nh4.push(b);
    }
    Ok((no3, nh4))
}

pub fn total(values: &[Vec<f64>]) -> f64 {
    values.iter().flatten().sum()
}

/// Spread `demand` over all layers in proportion to what each can supply.
///
/// Takes everything available when demand exceeds supply.
pub fn supply_proportional(demand: f64, available: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let fraction = divide(demand.max(0.0), total(available), 0.0).min(1.0);
    available
        .iter()
        .map(|zone| zone.iter().map(|a| a * fraction).collect())
        .collect()
}

/// Water uptake for a plant-level demand, checked against the total taken.
pub fn take_water(demand: f64, available: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let uptake = supply_proportional(demand, available);
    let expected = demand.max(0.0).min(total(available));
    check_balance("water uptake", expected, total(&uptake), UPTAKE_TOLERANCE)?;
    Ok(uptake)
}

/// Mineral N uptake for a soil N demand; NO3 and NH4 share one fraction.
pub fn take_nitrogen(
    demand: f64,
    no3_available: &[Vec<f64>],
    nh4_available: &[Vec<f64>],
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    let supply = total(no3_available) + total(nh4_available);
    let fraction = divide(demand.max(0.0), supply, 0.0).min(1.0);
    let scale = |values: &[Vec<f64>]| -> Vec<Vec<f64>> {
        values
            .iter()
            .map(|zone| zone.iter().map(|a| a * fraction).collect())
            .collect()
    };
    let no3 = scale(no3_available);
    let nh4 = scale(nh4_available);
    let expected = demand.max(0.0).min(supply);
    check_balance("nitrogen uptake", expected, total(&no3) + total(&nh4), UPTAKE_TOLERANCE)?;
    Ok((no3, nh4))
}

fn check_shape(what: &str, zones: &[SoilZone], values: &[Vec<f64>]) -> Result<()> {
    if values.len() != zones.len() {
        return Err(PastureError::LengthMismatch {
            what: format!("{what} zones"),
            expected: zones.len(),
            actual: values.len(),
        });
    }
    for (zone, v) in zones.iter().zip(values) {
        if v.len() != zone.n_layers() {
            return Err(PastureError::LengthMismatch {
                what: format!("{what} layers in zone '{}'", zone.name),
                expected: zone.n_layers(),
                actual: v.len(),
            });
        }
    }
    Ok(())
}

fn check_bound(context: String, taken: f64, available: f64) -> Result<()> {
    if !taken.is_finite() || taken < 0.0 || taken > available + BOUND_SLACK {
        tracing::error!(%context, taken, available, "uptake outside available resource");
        return Err(PastureError::Allocation {
            context,
            requested: taken,
            available,
        });
    }
    Ok(())
}

/// Check an externally supplied uptake against the soil it is drawn from.
pub fn validate_external(zones: &[SoilZone], uptake: &[ZoneUptake]) -> Result<()> {
    let water: Vec<Vec<f64>> = uptake.iter().map(|u| u.water.clone()).collect();
    let no3: Vec<Vec<f64>> = uptake.iter().map(|u| u.no3.clone()).collect();
    let nh4: Vec<Vec<f64>> = uptake.iter().map(|u| u.nh4.clone()).collect();
    check_shape("external water uptake", zones, &water)?;
    check_shape("external NO3 uptake", zones, &no3)?;
    check_shape("external NH4 uptake", zones, &nh4)?;
    for (zone, u) in zones.iter().zip(uptake) {
        for (i, layer) in zone.layers.iter().enumerate() {
            check_bound(format!("water from '{}' layer {i}", zone.name), u.water[i], layer.extractable_water())?;
            check_bound(format!("NO3 from '{}' layer {i}", zone.name), u.no3[i], layer.no3)?;
            check_bound(format!("NH4 from '{}' layer {i}", zone.name), u.nh4[i], layer.nh4)?;
        }
    }
    Ok(())
}

/// Assemble per-zone uptake records and confirm the deltas add up.
pub fn assemble(
    water: Vec<Vec<f64>>,
    no3: Vec<Vec<f64>>,
    nh4: Vec<Vec<f64>>,
    water_total: f64,
    n_total: f64,
) -> Result<Vec<ZoneUptake>> {
    let zones: Vec<ZoneUptake> = water
        .into_iter()
        .zip(no3)
        .zip(nh4)
        .map(|((water, no3), nh4)| ZoneUptake { water, no3, nh4 })
        .collect();
    let water_deltas: f64 = zones.iter().flat_map(|z| z.water_deltas()).sum();
    let n_deltas: f64 = zones
        .iter()
        .map(|z| z.no3_deltas().iter().chain(&z.nh4_deltas()).sum::<f64>())
        .sum();
    check_balance("water deltas", -water_total, water_deltas, UPTAKE_TOLERANCE)?;
    check_balance("nitrogen deltas", -n_total, n_deltas, UPTAKE_TOLERANCE)?;
    Ok(zones)
}
