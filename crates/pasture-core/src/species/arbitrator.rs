//! Carbon supply, partitioning of new growth and the N share of organs.
//!
//! The arbitrator turns the day's gross photosynthesis into potential
//! growth, splits growth between shoot and root, and places the new DM and
//! N in the growing pools. When soil N falls short it draws on the luxury N
//! held in mature and senescing tissue, senescing first.
use super::constants::*;
use super::demand::PlantDemand;
use super::params::{AllocationParams, NitrogenParams, PhotosynthesisParams};
use super::state::{PreviousDayState, State};
use crate::error::{check_balance, divide, PastureError, Result};
use crate::forcing::Weather;
use crate::tissue::{Organ, OrganKind, TissueStage};

/// MJ to J, keeping half of the radiation as PAR.
const PAR_PER_MJ: f64 = 0.5 * 1e6;

/// Ratio of midday to mean irradiance over a sinusoidal day.
const MIDDAY_IRRADIANCE_RATIO: f64 = 1.33333;

/// mg CO2/m2 to kg C/ha.
const CO2_TO_C_PER_HA: f64 = 0.001 * (12.0 / 44.0) * 10.0;

// -- Canopy --

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Canopy {
    pub lai: f64,
    pub cover: f64,
}

/// Green leaf area index and light interception of the sward.
///
/// Stolons count as a fraction of leaf area. In sparse grass swards the
/// stems also intercept some light.
pub fn canopy(organs: &[Organ], is_legume: bool, photosynthesis: &PhotosynthesisParams) -> Canopy {
    let green = |kind: OrganKind| organs[kind.index()].dm_green();
    let sla = photosynthesis.specific_leaf_area;
    let shoot_green: f64 = OrganKind::SHOOT.iter().map(|&k| green(k)).sum();
    let mut lai = (green(OrganKind::Leaf) + STOLON_LEAF_AREA_FACTOR * green(OrganKind::Stolon)) / 10_000.0 * sla;
    if !is_legume && shoot_green < STEM_LAI_THRESHOLD {
        lai += green(OrganKind::Stem) / 10_000.0
            * sla
            * ((STEM_LAI_THRESHOLD - shoot_green) / STEM_LAI_SCALE).sqrt();
    }
    let cover = if lai > 0.0 {
        1.0 - (-photosynthesis.light_extinction * lai).exp()
    } else {
        0.0
    };
    Canopy { lai, cover }
}

// -- Carbon supply --

/// Factors limiting the photosynthesis rate of the day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotosynthesisLimits {
    /// Temperature factor at the mean temperature.
    pub temperature: f64,
    /// Temperature factor at the daytime temperature.
    pub temperature_daytime: f64,
    pub co2: f64,
    pub nitrogen: f64,
    /// Product of heat and cold damage.
    pub extreme: f64,
}

/// Leaf photosynthesis on a non-rectangular hyperbola [mg CO2/m2/s].
fn leaf_rate(irradiance: f64, p_max: f64) -> f64 {
    let alpha_il = PHOTOSYNTHETIC_EFFICIENCY * irradiance;
    let a = alpha_il + p_max;
    let disc = (a * a - 4.0 * PHOTOSYNTHESIS_CURVATURE * alpha_il * p_max).max(0.0);
    (0.5 / PHOTOSYNTHESIS_CURVATURE) * (a - disc.sqrt())
}

/// Gross canopy photosynthesis [kg C/ha/day].
pub fn gross_photosynthesis(
    photosynthesis: &PhotosynthesisParams,
    weather: &Weather,
    canopy: &Canopy,
    limits: &PhotosynthesisLimits,
) -> f64 {
    if canopy.lai <= 0.0 || weather.day_length <= 0.0 {
        return 0.0;
    }
    let k = photosynthesis.light_extinction;
    let ref_rate = photosynthesis.reference_rate * limits.co2 * limits.nitrogen;
    let p_max_early_late = ref_rate * limits.temperature;
    let p_max_midday = ref_rate * limits.temperature_daytime;

    let intercepted = weather
        .intercepted_radiation
        .unwrap_or(weather.radiation * canopy.cover);
    let day_seconds = weather.day_length * 3600.0;
    let par = PAR_PER_MJ * intercepted.max(0.0);
    let il_midday = MIDDAY_IRRADIANCE_RATIO * par * k / day_seconds;
    let il_early_late = 0.5 * il_midday;

    let p_mid = leaf_rate(il_midday, p_max_midday);
    let p_el = leaf_rate(il_early_late, p_max_early_late);
    // mg CO2/m2 leaf/day
    let p_leaf = 0.5 * (p_mid + p_el) * day_seconds;
    let p_canopy = p_leaf * canopy.cover / k;
    p_canopy * CO2_TO_C_PER_HA * limits.extreme
}

/// Carbon budget of the day, in C except for the net potential growth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarbonSupply {
    pub gross: f64,
    pub remobilised: f64,
    pub retranslocated: f64,
    pub maintenance_respiration: f64,
    pub growth_respiration: f64,
    /// Potential growth [kg DM/ha].
    pub potential_dm: f64,
}

pub fn maintenance_respiration(live_dm: f64, coefficient: f64, temperature_effect: f64, n_factor: f64) -> f64 {
    live_dm.max(0.0) * CARBON_FRACTION_IN_DM * coefficient * temperature_effect * n_factor
}

/// Net potential growth from gross photosynthesis and reused carbon.
pub fn carbon_supply(
    gross: f64,
    remobilised: f64,
    retranslocated: f64,
    maintenance: f64,
    growth_respiration_coefficient: f64,
) -> CarbonSupply {
    let available = (gross + remobilised + retranslocated - maintenance).max(0.0);
    let growth_respiration = growth_respiration_coefficient * available;
    CarbonSupply {
        gross,
        remobilised,
        retranslocated,
        maintenance_respiration: maintenance,
        growth_respiration,
        potential_dm: (available - growth_respiration) / CARBON_FRACTION_IN_DM,
    }
}

/// Move a share of yesterday's storage reserve back into the carbon supply.
///
/// The reserve is drawn from the growing and mature pools in proportion to
/// their DM. Returns the DM retranslocated.
pub fn retranslocate_storage(state: &mut State, prev: &PreviousDayState, rate: f64) -> f64 {
    let mut total = 0.0;
    for kind in OrganKind::ALL {
        let reserve = prev.organ(kind).storage;
        let organ = state.organ_mut(kind);
        let young = organ.dm_young();
        let amount = (rate.clamp(0.0, 1.0) * reserve).min(organ.storage).min(young);
        if amount <= 0.0 {
            continue;
        }
        for stage in [TissueStage::Growing, TissueStage::Mature] {
            let pool = organ.pool_mut(stage);
            let share = divide(pool.dm, young, 0.0);
            pool.remove(amount * share, 0.0);
        }
        organ.storage -= amount;
        total += amount;
    }
    total
}

// -- Partitioning --

/// Day-of-year factor on the target shoot:root ratio.
fn seasonal_shoot_factor(day_of_year: u32, allocation: &AllocationParams) -> f64 {
    let [p_increase, p_plateau, p_decrease] = allocation.high_shoot_periods.map(f64::from);
    let doy = f64::from(day_of_year);
    let start = f64::from(allocation.doy_high_shoot);
    let increase_end = start + p_increase;
    let plateau_end = increase_end + p_plateau;
    let decrease_end = plateau_end + p_decrease;
    let inc = allocation.shoot_seasonal_increase;
    if doy > start {
        if doy < increase_end {
            1.0 + inc * divide(doy - start, p_increase, 1.0)
        } else if doy <= plateau_end {
            1.0 + inc
        } else if doy <= decrease_end {
            1.0 + inc * (1.0 - divide(doy - plateau_end, p_decrease, 1.0))
        } else {
            1.0
        }
    } else if decrease_end > 365.0 && doy <= decrease_end - 365.0 {
        1.0 + inc * (1.0 - divide(365.0 + doy - plateau_end, p_decrease, 1.0)).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Fraction of new growth going to the shoot.
///
/// Steers the shoot:root ratio towards a seasonal target; water stress
/// shifts growth to the roots but never below the target itself.
pub fn shoot_fraction(
    day_of_year: u32,
    shoot_green: f64,
    root_dm: f64,
    glf_water: f64,
    allocation: &AllocationParams,
) -> f64 {
    if root_dm <= MIN_ROOT_DM {
        return 1.0;
    }
    let target = seasonal_shoot_factor(day_of_year, allocation) * allocation.max_shoot_root_ratio();
    let present = shoot_green / root_dm;
    let mut ratio = if present > target {
        target
    } else {
        divide(target * target, present, f64::MAX)
    };
    ratio *= glf_water;
    let fraction = if ratio.is_finite() && ratio < f64::MAX {
        ratio / (1.0 + ratio)
    } else {
        1.0
    };
    if divide(fraction, 1.0 - fraction, f64::INFINITY) < target {
        target / (1.0 + target)
    } else {
        fraction
    }
}

/// Share of new growth per organ; sums to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionFractions([f64; N_ORGANS]);

impl PartitionFractions {
    pub fn new(fractions: [f64; N_ORGANS]) -> Self {
        Self(fractions)
    }

    pub fn get(&self, kind: OrganKind) -> f64 {
        self.0[kind.index()]
    }

    pub fn shoot(&self) -> f64 {
        OrganKind::SHOOT.iter().map(|&k| self.get(k)).sum()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Split new growth between organs.
///
/// Reproductive organs only take growth while `reproductive_active`.
pub fn partition(
    shoot_fraction: f64,
    allocation: &AllocationParams,
    reproductive_active: bool,
) -> Result<PartitionFractions> {
    let fs = shoot_fraction.clamp(0.0, 1.0);
    let repro = if reproductive_active {
        allocation.frac_to_reproductive
    } else {
        0.0
    };
    let mut f = [0.0; N_ORGANS];
    f[OrganKind::Leaf.index()] = fs * allocation.frac_to_leaf;
    f[OrganKind::Stolon.index()] = fs * allocation.frac_to_stolon;
    f[OrganKind::Reproductive.index()] = fs * repro;
    f[OrganKind::Stem.index()] = (fs * (1.0 - allocation.frac_to_leaf - allocation.frac_to_stolon - repro)).max(0.0);
    f[OrganKind::Root.index()] = 1.0 - fs;
    let fractions = PartitionFractions(f);
    check_balance("growth partition", 1.0, fractions.sum(), PARTITION_TOLERANCE)?;
    Ok(fractions)
}

/// Share of new N per organ, weighted by DM fraction and maximum N content.
pub fn n_shares(fractions: &PartitionFractions, prev: &PreviousDayState) -> Result<[f64; N_ORGANS]> {
    let weights = OrganKind::ALL.map(|k| fractions.get(k) * prev.organ(k).n_max);
    let total: f64 = weights.iter().sum();
    let shares = if total > 0.0 {
        weights.map(|w| w / total)
    } else {
        OrganKind::ALL.map(|k| fractions.get(k))
    };
    check_balance("N partition", 1.0, shares.iter().sum(), PARTITION_TOLERANCE)?;
    Ok(shares)
}

// -- Luxury N --

/// N above the optimum held in mature and senescing shoot tissue, usable
/// when soil N runs short [kg N/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LuxuryN {
    pub mature: f64,
    pub senescing: f64,
}

fn stage_luxury(organ: &Organ, stage: TissueStage, nitrogen: &NitrogenParams) -> f64 {
    let pool = organ.pool(stage);
    let level = organ.n_opt * nitrogen.stage_level(stage.index());
    let kappa = match stage {
        TissueStage::Mature => nitrogen.kappa2,
        TissueStage::Senescing => nitrogen.kappa3,
        _ => 0.0,
    };
    (pool.n_conc() - level).max(0.0) * pool.dm * kappa
}

pub fn luxury_n(prev: &PreviousDayState, nitrogen: &NitrogenParams) -> LuxuryN {
    let sum = |stage| {
        OrganKind::SHOOT
            .iter()
            .map(|&k| stage_luxury(prev.organ(k), stage, nitrogen))
            .sum()
    };
    LuxuryN {
        mature: sum(TissueStage::Mature),
        senescing: sum(TissueStage::Senescing),
    }
}

/// Luxury N taken today to close the gap to the optimum N demand.
pub fn luxury_remobilisation(n_demand_opt: f64, n_supplied: f64, luxury: &LuxuryN) -> Result<LuxuryN> {
    let missing = n_demand_opt - n_supplied;
    if missing <= CONSERVATION_TOLERANCE {
        return Ok(LuxuryN::default());
    }
    let senescing = missing.min(luxury.senescing);
    let mature = (missing - senescing).min(luxury.mature);
    for (taken, cap, context) in [
        (senescing, luxury.senescing, "luxury N of senescing tissue"),
        (mature, luxury.mature, "luxury N of mature tissue"),
    ] {
        if taken > cap + ALLOCATION_SLACK {
            tracing::error!(context, taken, cap, "luxury N remobilisation above supply");
            return Err(PastureError::Allocation {
                context: context.to_string(),
                requested: taken,
                available: cap,
            });
        }
    }
    Ok(LuxuryN { mature, senescing })
}

/// Remove remobilised luxury N from the tissues that held it.
pub fn withdraw_luxury(state: &mut State, prev: &PreviousDayState, taken: &LuxuryN, nitrogen: &NitrogenParams) {
    for (stage, amount) in [
        (TissueStage::Mature, taken.mature),
        (TissueStage::Senescing, taken.senescing),
    ] {
        if amount <= 0.0 {
            continue;
        }
        let sources = OrganKind::SHOOT.map(|k| stage_luxury(prev.organ(k), stage, nitrogen));
        let total: f64 = sources.iter().sum();
        for (kind, source) in OrganKind::SHOOT.iter().zip(sources) {
            let pool = state.organ_mut(*kind).pool_mut(stage);
            let n = (amount * divide(source, total, 0.0)).min(pool.n);
            pool.remove(0.0, n);
        }
    }
}

// -- Allocation --

/// DM and N placed in each organ today [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Allocation {
    pub growth: [f64; N_ORGANS],
    pub storage: [f64; N_ORGANS],
    pub n: [f64; N_ORGANS],
}

impl Allocation {
    pub fn dm(&self) -> f64 {
        self.growth.iter().sum::<f64>() + self.storage.iter().sum::<f64>()
    }

    pub fn storage_dm(&self) -> f64 {
        self.storage.iter().sum()
    }

    pub fn n_total(&self) -> f64 {
        self.n.iter().sum()
    }
}

fn check_bound(organ: OrganKind, what: &str, allocated: f64, bound: f64) -> Result<()> {
    if !allocated.is_finite() || allocated < -ALLOCATION_SLACK || allocated > bound + ALLOCATION_SLACK {
        tracing::error!(organ = organ.name(), what, allocated, bound, "allocation above demand");
        return Err(PastureError::Allocation {
            context: format!("{what} of {}", organ.name()),
            requested: allocated,
            available: bound,
        });
    }
    Ok(())
}

/// Place the day's growth and new N in the growing pools.
///
/// `actual` is split by `fractions`; carbon left over when growth is limited
/// below `surplus_from` fills storage demand in proportion to each organ's
/// demand. New N is split by `shares`.
pub fn allocate(
    state: &mut State,
    demand: &PlantDemand,
    fractions: &PartitionFractions,
    actual: f64,
    surplus: f64,
    new_n: f64,
    shares: &[f64; N_ORGANS],
) -> Result<Allocation> {
    let storage_demand = demand.storage();
    let storage_supply = surplus.max(0.0).min(storage_demand);
    let mut allocation = Allocation::default();
    for kind in OrganKind::ALL {
        let i = kind.index();
        let organ_demand = demand.organ(kind);
        let growth = actual.max(0.0) * fractions.get(kind);
        let storage = storage_supply * divide(organ_demand.storage, storage_demand, 0.0);
        let n = new_n.max(0.0) * shares[i];
        check_bound(kind, "growth", growth, organ_demand.growth())?;
        check_bound(kind, "storage", storage, organ_demand.storage)?;

        let organ = state.organ_mut(kind);
        organ.pool_mut(TissueStage::Growing).add(growth + storage, n);
        organ.storage += storage;
        allocation.growth[i] = growth;
        allocation.storage[i] = storage;
        allocation.n[i] = n;
    }
    check_balance("new growth DM", actual.max(0.0) + storage_supply, allocation.dm(), CONSERVATION_TOLERANCE)?;
    check_balance("new growth N", new_n.max(0.0), allocation.n_total(), CONSERVATION_TOLERANCE)?;
    Ok(allocation)
}

/// Hand back remobilised N that new growth did not use.
///
/// A `kappa4` share returns to dead leaf and stem in proportion to their
/// N; the rest, or all of it when there is no dead tissue, goes to litter.
/// Returns the N sent to litter.
pub fn return_unused_n(state: &mut State, prev: &PreviousDayState, unused: f64, kappa4: f64) -> f64 {
    if unused <= 0.0 {
        return 0.0;
    }
    let targets = [OrganKind::Leaf, OrganKind::Stem];
    let dead_n: f64 = targets.iter().map(|&k| prev.pool(k, TissueStage::Dead).n).sum();
    let to_dead = if dead_n > 0.0 { unused * kappa4 } else { 0.0 };
    for kind in targets {
        let share = divide(prev.pool(kind, TissueStage::Dead).n, dead_n, 0.0);
        state.organ_mut(kind).pool_mut(TissueStage::Dead).add(0.0, to_dead * share);
    }
    unused - to_dead
}

/// Growth limiting factor for N.
pub fn n_limitation(n_supplied: f64, n_demand_opt: f64) -> f64 {
    if n_demand_opt <= 0.0 {
        1.0
    } else {
        (n_supplied / n_demand_opt).clamp(0.0, 1.0)
    }
}

/// Actual growth once N and other limits are applied.
pub fn actual_growth(water_limited: f64, glf_n: f64, allocation: &AllocationParams) -> f64 {
    water_limited * glf_n.powf(allocation.dilution_exponent).min(allocation.glf_generic)
}

/// Live DM of shoot and roots, the basis of maintenance respiration.
pub fn live_dm(prev: &PreviousDayState) -> f64 {
    prev.dm_shoot_green() + prev.organ(OrganKind::Root).dm_green()
}
