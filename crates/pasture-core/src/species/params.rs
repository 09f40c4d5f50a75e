/// Pasture species parameters.
///
/// A tree of serde structs, one per process group. Every group has a
/// hand-written `Default` with the calibration of a temperate ryegrass, so a
/// JSON document only needs to list the values it changes.
use serde::{Deserialize, Serialize};

use super::constants::*;
use crate::error::{PastureError, Result};
use crate::soil::{RootDistributionMethod, RootProfile, UptakeParams};
use crate::stress::{ExtremeTemperature, PhotosynthesisPathway, TemperatureCurve};
use crate::tissue::OrganKind;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub species: SpeciesTraits,
    pub initial: InitialValues,
    pub photosynthesis: PhotosynthesisParams,
    pub allocation: AllocationParams,
    pub nitrogen: NitrogenParams,
    pub turnover: TurnoverParams,
    pub removal: RemovalParams,
    pub roots: RootParams,
    pub uptake: UptakeParams,
    pub phenology: PhenologyParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesTraits {
    pub name: String,
    pub family: String,
    pub pathway: PhotosynthesisPathway,
    pub is_legume: bool,
    pub is_annual: bool,
    /// Material label attached to litter handed to the surface residue pool.
    pub litter_type: String,
}

impl Default for SpeciesTraits {
    fn default() -> Self {
        Self {
            name: "ryegrass".to_string(),
            family: "grass".to_string(),
            pathway: PhotosynthesisPathway::C3,
            is_legume: false,
            is_annual: false,
            litter_type: "grass".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialValues {
    /// Shoot DM [kg/ha].
    pub shoot_dm: f64,
    /// Root DM [kg/ha].
    pub root_dm: f64,
    /// Root depth [mm].
    pub root_depth: f64,
    /// Split of shoot DM over leaf 0-3, stem 0-3 and stolon 0-2. Defaults
    /// to the grass or legume split.
    pub dm_fractions: Option<[f64; 11]>,
}

impl Default for InitialValues {
    fn default() -> Self {
        Self {
            shoot_dm: 2000.0,
            root_dm: 500.0,
            root_depth: 750.0,
            dm_fractions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosynthesisParams {
    /// Leaf photosynthesis rate at reference conditions [mg CO2/m2 leaf/s].
    pub reference_rate: f64,
    pub light_extinction: f64,
    /// [m2/kg DM]
    pub specific_leaf_area: f64,
    pub growth_temperature: TemperatureCurve,
    pub heat: ExtremeTemperature,
    pub cold: ExtremeTemperature,
    /// Daily maintenance respiration per unit live C [-].
    pub maintenance_respiration: f64,
    /// Fraction of assimilate spent on growth respiration [-].
    pub growth_respiration: f64,
    /// [ppm]
    pub reference_co2: f64,
    pub co2_photosynthesis_coefficient: f64,
    pub co2_n_offset: f64,
    pub co2_n_minimum: f64,
    pub co2_n_exponent: f64,
}

impl Default for PhotosynthesisParams {
    fn default() -> Self {
        Self {
            reference_rate: 1.0,
            light_extinction: 0.5,
            specific_leaf_area: 20.0,
            growth_temperature: TemperatureCurve::default(),
            heat: ExtremeTemperature::heat_default(),
            cold: ExtremeTemperature::cold_default(),
            maintenance_respiration: 0.03,
            growth_respiration: 0.25,
            reference_co2: 380.0,
            co2_photosynthesis_coefficient: 700.0,
            co2_n_offset: 600.0,
            co2_n_minimum: 0.7,
            co2_n_exponent: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationParams {
    /// Maximum fraction of new growth going to roots [-].
    pub max_root_fraction: f64,
    /// Relative increase of shoot allocation in the high-shoot season [-].
    pub shoot_seasonal_increase: f64,
    /// Day of year starting the high-shoot season.
    pub doy_high_shoot: u32,
    /// Lengths of the increase, plateau and decrease periods [days].
    pub high_shoot_periods: [u32; 3],
    pub frac_to_leaf: f64,
    pub frac_to_stolon: f64,
    /// Fraction of shoot growth to the reproductive organ (annuals, reproductive phase).
    pub frac_to_reproductive: f64,
    /// Structural part of new tissue; the rest is metabolic [-].
    pub structural_fraction: f64,
    /// Target storage reserve as a fraction of young tissue DM [-].
    pub storage_fraction: f64,
    /// Daily fraction of yesterday's reserve returned to the carbon supply.
    pub storage_retranslocation_rate: f64,
    pub water_stress_exponent: f64,
    /// Exponent softening the N limitation of growth [-].
    pub dilution_exponent: f64,
    /// Generic growth limiting factor, for nutrients not simulated [-].
    pub glf_generic: f64,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            max_root_fraction: 0.25,
            shoot_seasonal_increase: 0.8,
            doy_high_shoot: 232,
            high_shoot_periods: [35, 60, 30],
            frac_to_leaf: 0.7,
            frac_to_stolon: 0.0,
            frac_to_reproductive: 0.0,
            structural_fraction: 0.7,
            storage_fraction: 0.0,
            storage_retranslocation_rate: 0.05,
            water_stress_exponent: 1.0,
            dilution_exponent: 0.5,
            glf_generic: 1.0,
        }
    }
}

impl AllocationParams {
    /// Target shoot:root ratio outside the high-shoot season.
    pub fn max_shoot_root_ratio(&self) -> f64 {
        (1.0 - self.max_root_fraction) / self.max_root_fraction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NitrogenParams {
    /// Leaf N concentrations [kg N/kg DM].
    pub leaf_opt: f64,
    pub leaf_max: f64,
    pub leaf_min: f64,
    /// N concentrations of other organs relative to leaves [-].
    pub relative_stem: f64,
    pub relative_stolon: f64,
    pub relative_root: f64,
    pub relative_reproductive: f64,
    /// N concentration of mature and senescing tissue relative to optimum [-].
    pub relative_stage2: f64,
    pub relative_stage3: f64,
    /// Fixation as a fraction of N demand (legumes) [-].
    pub min_fixation: f64,
    pub max_fixation: f64,
    /// Fraction of luxury N in mature tissue that can be remobilised [-].
    pub kappa2: f64,
    /// Fraction of luxury N in senescing tissue that can be remobilised [-].
    pub kappa3: f64,
    /// Fraction of unused remobilised N returned to dead tissue [-].
    pub kappa4: f64,
    /// Fraction of senescing DM remobilised as sugars [-].
    pub kappa_c: f64,
    /// Fraction of protein N remobilised from senescing tissue [-].
    pub fac_cn: f64,
}

impl Default for NitrogenParams {
    fn default() -> Self {
        Self {
            leaf_opt: 0.04,
            leaf_max: 0.05,
            leaf_min: 0.012,
            relative_stem: 0.5,
            relative_stolon: 0.0,
            relative_root: 0.5,
            relative_reproductive: 0.8,
            relative_stage2: 1.0,
            relative_stage3: 1.0,
            min_fixation: 0.0,
            max_fixation: 0.0,
            kappa2: 0.0,
            kappa3: 0.0,
            kappa4: 0.0,
            kappa_c: 0.0,
            fac_cn: 0.0,
        }
    }
}

impl NitrogenParams {
    /// Concentration scale of an organ relative to leaves.
    pub fn relative(&self, kind: OrganKind) -> f64 {
        match kind {
            OrganKind::Leaf => 1.0,
            OrganKind::Stem => self.relative_stem,
            OrganKind::Stolon => self.relative_stolon,
            OrganKind::Root => self.relative_root,
            OrganKind::Reproductive => self.relative_reproductive,
        }
    }

    /// (optimum, maximum, minimum) N concentration of an organ.
    pub fn thresholds(&self, kind: OrganKind) -> (f64, f64, f64) {
        let r = self.relative(kind);
        (self.leaf_opt * r, self.leaf_max * r, self.leaf_min * r)
    }

    /// Relative N level of a live stage, used for initial N and luxury N.
    pub fn stage_level(&self, stage: usize) -> f64 {
        match stage {
            1 => self.relative_stage2,
            2 => self.relative_stage3,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnoverParams {
    /// Daily rate of live tissue ageing [1/day].
    pub live_to_dead: f64,
    /// Daily rate of dead tissue detaching as litter [1/day].
    pub dead_to_litter: f64,
    pub root_senescence: f64,
    /// Multiplier on the rate at which growing tissue matures.
    pub growing_tissue_factor: f64,
    /// Temperature response of turnover [oC].
    pub t_min: f64,
    pub t_opt: f64,
    /// Maximum increase of leaf turnover under drought.
    pub water_factor_max: f64,
    pub glf_water_opt: f64,
    /// Effect of trampling on litter detachment.
    pub stock_parameter: f64,
    pub stocking_rate: f64,
    /// Standing green DM kept back from turnover and removal [kg/ha].
    pub min_green: f64,
    pub min_dead: f64,
    pub waterlogging_coefficient: f64,
}

impl Default for TurnoverParams {
    fn default() -> Self {
        Self {
            live_to_dead: 0.025,
            dead_to_litter: 0.11,
            root_senescence: 0.02,
            growing_tissue_factor: 2.0,
            t_min: 2.0,
            t_opt: 20.0,
            water_factor_max: 2.0,
            glf_water_opt: 0.5,
            stock_parameter: 0.05,
            stocking_rate: 1.0,
            min_green: 300.0,
            min_dead: 0.0,
            waterlogging_coefficient: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalParams {
    pub preference_green: f64,
    pub preference_dead: f64,
    pub digestibility_live: f64,
    pub digestibility_dead: f64,
}

impl Default for RemovalParams {
    fn default() -> Self {
        Self {
            preference_green: 1.0,
            preference_dead: 1.0,
            digestibility_live: 0.6,
            digestibility_dead: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootParams {
    /// [m/g DM]
    pub specific_root_length: f64,
    pub profile: RootProfile,
    /// Share of root mass per soil zone; an even split when absent.
    pub zone_shares: Option<Vec<f64>>,
    /// Root depth at emergence of annuals [mm].
    pub depth_at_emergence: f64,
    /// Root depth reached at anthesis of annuals [mm].
    pub max_depth: f64,
}

impl Default for RootParams {
    fn default() -> Self {
        Self {
            specific_root_length: 75.0,
            profile: RootProfile::default(),
            zone_shares: None,
            depth_at_emergence: 50.0,
            max_depth: 900.0,
        }
    }
}

/// Phenology of annual species. Ignored for perennials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhenologyParams {
    pub doy_emergence: u32,
    pub doy_anthesis: u32,
    /// Days from anthesis to maturity.
    pub days_to_mature: u32,
}

impl Default for PhenologyParams {
    fn default() -> Self {
        Self {
            doy_emergence: 100,
            doy_anthesis: 250,
            days_to_mature: 60,
        }
    }
}

fn check(name: &'static str, value: f64, bounds: Bounds) -> Result<()> {
    if bounds.contains(value) {
        Ok(())
    } else {
        Err(PastureError::InvalidParameter {
            name,
            value,
            min: bounds.min,
            max: bounds.max,
        })
    }
}

fn normalised(fractions: [f64; 11]) -> [f64; 11] {
    let sum: f64 = fractions.iter().sum();
    if sum <= 0.0 {
        return fractions;
    }
    fractions.map(|f| f / sum)
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(PastureError::InvalidConfig(message()))
    }
}

impl Parameters {
    /// Load parameters from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Parameters = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Initial DM split of the shoot, explicit or by family.
    ///
    /// Family defaults are scaled to sum to 1 so the initial shoot holds
    /// exactly `initial.shoot_dm`; explicit fractions are taken as given.
    pub fn dm_fractions(&self) -> [f64; 11] {
        match self.initial.dm_fractions {
            Some(f) => f,
            None if self.species.is_legume => normalised(LEGUME_DM_FRACTIONS),
            None => normalised(GRASS_DM_FRACTIONS),
        }
    }

    /// Check every value against its bounds and the cross-parameter rules.
    pub fn validate(&self) -> Result<()> {
        let init = &self.initial;
        check("initial.shoot_dm", init.shoot_dm, INITIAL_DM_BOUNDS)?;
        check("initial.root_dm", init.root_dm, INITIAL_DM_BOUNDS)?;
        check("initial.root_depth", init.root_depth, ROOT_DEPTH_BOUNDS)?;
        let fractions = self.dm_fractions();
        for &f in &fractions {
            check("initial.dm_fractions", f, FRACTION_BOUNDS)?;
        }
        let sum: f64 = fractions.iter().sum();
        require((sum - 1.0).abs() <= PARTITION_TOLERANCE, || {
            format!("initial DM fractions sum to {sum}, not 1")
        })?;

        let ph = &self.photosynthesis;
        check("photosynthesis.reference_rate", ph.reference_rate, REFERENCE_RATE_BOUNDS)?;
        check("photosynthesis.light_extinction", ph.light_extinction, LIGHT_EXTINCTION_BOUNDS)?;
        check("photosynthesis.specific_leaf_area", ph.specific_leaf_area, SPECIFIC_LEAF_AREA_BOUNDS)?;
        let gt = &ph.growth_temperature;
        check("photosynthesis.growth_temperature.t_min", gt.t_min, TEMPERATURE_BOUNDS)?;
        check("photosynthesis.growth_temperature.t_opt", gt.t_opt, TEMPERATURE_BOUNDS)?;
        check("photosynthesis.growth_temperature.t_max", gt.t_max, TEMPERATURE_BOUNDS)?;
        check("photosynthesis.growth_temperature.q", gt.q, CURVATURE_BOUNDS)?;
        require(gt.t_min < gt.t_opt && gt.t_opt < gt.t_max, || {
            format!(
                "growth temperatures must satisfy t_min < t_opt < t_max, got {} / {} / {}",
                gt.t_min, gt.t_opt, gt.t_max
            )
        })?;
        for (name, extreme) in [("heat", &ph.heat), ("cold", &ph.cold)] {
            check("photosynthesis.extreme.onset", extreme.onset, TEMPERATURE_BOUNDS)?;
            check("photosynthesis.extreme.full", extreme.full, TEMPERATURE_BOUNDS)?;
            check("photosynthesis.extreme.reference", extreme.reference, TEMPERATURE_BOUNDS)?;
            check("photosynthesis.extreme.recovery_sum", extreme.recovery_sum, RECOVERY_SUM_BOUNDS)?;
            let ordered = if name == "heat" {
                extreme.onset < extreme.full
            } else {
                extreme.full < extreme.onset
            };
            require(ordered, || {
                format!("{name} stress onset {} and full {} are in the wrong order", extreme.onset, extreme.full)
            })?;
        }
        check("photosynthesis.maintenance_respiration", ph.maintenance_respiration, RESPIRATION_BOUNDS)?;
        check("photosynthesis.growth_respiration", ph.growth_respiration, RESPIRATION_BOUNDS)?;
        check("photosynthesis.reference_co2", ph.reference_co2, CO2_BOUNDS)?;
        check("photosynthesis.co2_photosynthesis_coefficient", ph.co2_photosynthesis_coefficient, CO2_BOUNDS)?;
        check("photosynthesis.co2_n_offset", ph.co2_n_offset, CO2_BOUNDS)?;
        check("photosynthesis.co2_n_minimum", ph.co2_n_minimum, FRACTION_BOUNDS)?;
        check("photosynthesis.co2_n_exponent", ph.co2_n_exponent, CO2_EXPONENT_BOUNDS)?;

        let al = &self.allocation;
        check("allocation.max_root_fraction", al.max_root_fraction, MAX_ROOT_FRACTION_BOUNDS)?;
        check("allocation.shoot_seasonal_increase", al.shoot_seasonal_increase, SHOOT_INCREASE_BOUNDS)?;
        check("allocation.doy_high_shoot", f64::from(al.doy_high_shoot), DOY_BOUNDS)?;
        for &days in &al.high_shoot_periods {
            check("allocation.high_shoot_periods", f64::from(days), PERIOD_BOUNDS)?;
        }
        check("allocation.frac_to_leaf", al.frac_to_leaf, FRACTION_BOUNDS)?;
        check("allocation.frac_to_stolon", al.frac_to_stolon, FRACTION_BOUNDS)?;
        check("allocation.frac_to_reproductive", al.frac_to_reproductive, FRACTION_BOUNDS)?;
        let shoot_split = al.frac_to_leaf + al.frac_to_stolon + al.frac_to_reproductive;
        require(shoot_split <= 1.0 + PARTITION_TOLERANCE, || {
            format!("leaf, stolon and reproductive fractions sum to {shoot_split}, above 1")
        })?;
        check("allocation.structural_fraction", al.structural_fraction, FRACTION_BOUNDS)?;
        check("allocation.storage_fraction", al.storage_fraction, FRACTION_BOUNDS)?;
        check(
            "allocation.storage_retranslocation_rate",
            al.storage_retranslocation_rate,
            FRACTION_BOUNDS,
        )?;
        check("allocation.water_stress_exponent", al.water_stress_exponent, EXPONENT_BOUNDS)?;
        check("allocation.dilution_exponent", al.dilution_exponent, EXPONENT_BOUNDS)?;
        check("allocation.glf_generic", al.glf_generic, FRACTION_BOUNDS)?;

        let n = &self.nitrogen;
        check("nitrogen.leaf_opt", n.leaf_opt, N_CONC_BOUNDS)?;
        check("nitrogen.leaf_max", n.leaf_max, N_CONC_BOUNDS)?;
        check("nitrogen.leaf_min", n.leaf_min, N_CONC_BOUNDS)?;
        require(n.leaf_min <= n.leaf_opt && n.leaf_opt <= n.leaf_max, || {
            format!(
                "leaf N concentrations must satisfy min <= opt <= max, got {} / {} / {}",
                n.leaf_min, n.leaf_opt, n.leaf_max
            )
        })?;
        check("nitrogen.relative_stem", n.relative_stem, RELATIVE_N_BOUNDS)?;
        check("nitrogen.relative_stolon", n.relative_stolon, RELATIVE_N_BOUNDS)?;
        check("nitrogen.relative_root", n.relative_root, RELATIVE_N_BOUNDS)?;
        check("nitrogen.relative_reproductive", n.relative_reproductive, RELATIVE_N_BOUNDS)?;
        check("nitrogen.relative_stage2", n.relative_stage2, RELATIVE_N_BOUNDS)?;
        check("nitrogen.relative_stage3", n.relative_stage3, RELATIVE_N_BOUNDS)?;
        check("nitrogen.min_fixation", n.min_fixation, FRACTION_BOUNDS)?;
        check("nitrogen.max_fixation", n.max_fixation, FRACTION_BOUNDS)?;
        require(n.min_fixation <= n.max_fixation, || {
            format!("min_fixation {} above max_fixation {}", n.min_fixation, n.max_fixation)
        })?;
        check("nitrogen.kappa2", n.kappa2, FRACTION_BOUNDS)?;
        check("nitrogen.kappa3", n.kappa3, FRACTION_BOUNDS)?;
        check("nitrogen.kappa4", n.kappa4, FRACTION_BOUNDS)?;
        check("nitrogen.kappa_c", n.kappa_c, FRACTION_BOUNDS)?;
        check("nitrogen.fac_cn", n.fac_cn, FRACTION_BOUNDS)?;

        let t = &self.turnover;
        check("turnover.live_to_dead", t.live_to_dead, TURNOVER_RATE_BOUNDS)?;
        check("turnover.dead_to_litter", t.dead_to_litter, TURNOVER_RATE_BOUNDS)?;
        check("turnover.root_senescence", t.root_senescence, TURNOVER_RATE_BOUNDS)?;
        check("turnover.growing_tissue_factor", t.growing_tissue_factor, TURNOVER_FACTOR_BOUNDS)?;
        check("turnover.t_min", t.t_min, TEMPERATURE_BOUNDS)?;
        check("turnover.t_opt", t.t_opt, TEMPERATURE_BOUNDS)?;
        require(t.t_min < t.t_opt, || {
            format!("turnover t_min {} must be below t_opt {}", t.t_min, t.t_opt)
        })?;
        check("turnover.water_factor_max", t.water_factor_max, TURNOVER_FACTOR_BOUNDS)?;
        check("turnover.glf_water_opt", t.glf_water_opt, FRACTION_BOUNDS)?;
        check("turnover.stock_parameter", t.stock_parameter, FRACTION_BOUNDS)?;
        check("turnover.stocking_rate", t.stocking_rate, STOCKING_RATE_BOUNDS)?;
        check("turnover.min_green", t.min_green, MIN_DM_BOUNDS)?;
        check("turnover.min_dead", t.min_dead, MIN_DM_BOUNDS)?;
        check("turnover.waterlogging_coefficient", t.waterlogging_coefficient, FRACTION_BOUNDS)?;

        let r = &self.removal;
        check("removal.preference_green", r.preference_green, PREFERENCE_BOUNDS)?;
        check("removal.preference_dead", r.preference_dead, PREFERENCE_BOUNDS)?;
        check("removal.digestibility_live", r.digestibility_live, FRACTION_BOUNDS)?;
        check("removal.digestibility_dead", r.digestibility_dead, FRACTION_BOUNDS)?;

        let roots = &self.roots;
        check("roots.specific_root_length", roots.specific_root_length, SPECIFIC_ROOT_LENGTH_BOUNDS)?;
        check("roots.depth_at_emergence", roots.depth_at_emergence, ROOT_DEPTH_BOUNDS)?;
        check("roots.max_depth", roots.max_depth, ROOT_DEPTH_BOUNDS)?;
        check("roots.profile.expo_linear_depth", roots.profile.expo_linear_depth, FRACTION_BOUNDS)?;
        check(
            "roots.profile.expo_linear_curvature",
            roots.profile.expo_linear_curvature,
            EXPONENT_BOUNDS,
        )?;
        if roots.profile.method == RootDistributionMethod::UserDefined {
            require(!roots.profile.user_defined.is_empty(), || {
                "user defined root distribution needs per-layer weights".to_string()
            })?;
            require(roots.profile.user_defined.iter().all(|w| w.is_finite() && *w >= 0.0), || {
                "user defined root weights must be non-negative".to_string()
            })?;
        }
        if self.species.is_annual {
            require(roots.depth_at_emergence <= roots.max_depth, || {
                format!(
                    "root depth at emergence {} exceeds maximum {}",
                    roots.depth_at_emergence, roots.max_depth
                )
            })?;
        }

        let u = &self.uptake;
        check("uptake.kno3", u.kno3, UPTAKE_COEFFICIENT_BOUNDS)?;
        check("uptake.knh4", u.knh4, UPTAKE_COEFFICIENT_BOUNDS)?;
        check("uptake.ku_no3", u.ku_no3, UPTAKE_COEFFICIENT_BOUNDS)?;
        check("uptake.ku_nh4", u.ku_nh4, UPTAKE_COEFFICIENT_BOUNDS)?;
        check("uptake.reference_rld", u.reference_rld, UPTAKE_REFERENCE_BOUNDS)?;
        check("uptake.reference_ksat", u.reference_ksat, UPTAKE_REFERENCE_BOUNDS)?;

        let p = &self.phenology;
        check("phenology.doy_emergence", f64::from(p.doy_emergence), DOY_BOUNDS)?;
        check("phenology.doy_anthesis", f64::from(p.doy_anthesis), DOY_BOUNDS)?;
        check("phenology.days_to_mature", f64::from(p.days_to_mature), PERIOD_BOUNDS)?;
        if self.species.is_annual {
            require(p.doy_emergence < p.doy_anthesis, || {
                format!(
                    "emergence day {} must come before anthesis day {}",
                    p.doy_emergence, p.doy_anthesis
                )
            })?;
            require(p.days_to_mature > 0, || "days_to_mature must be positive".to_string())?;
        }

        Ok(())
    }
}
