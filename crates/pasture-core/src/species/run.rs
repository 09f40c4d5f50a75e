/// Pasture species orchestration.
///
/// - `step()`: advance the plant one day against a soil snapshot
/// - `run()`: step over a weather series, updating the soil between days
/// - `DailyCycleDriver`: owns plant, soil and collaborators, and carries the
///   lifecycle events (sowing, kill, removal, end of crop)
///
/// A day runs in a fixed order: phenology and roots, stress factors, carbon
/// supply, water uptake, partitioning and demand, N supply, allocation,
/// turnover. Every transfer of the day is computed against the snapshot
/// taken at its start, and the new state is returned only once the day's
/// DM and N balances close.
use super::arbitrator::{
    self, actual_growth, allocate, canopy, carbon_supply, gross_photosynthesis, luxury_n, luxury_remobilisation,
    maintenance_respiration, n_limitation, n_shares, partition, retranslocate_storage, return_unused_n,
    shoot_fraction, withdraw_luxury, PhotosynthesisLimits,
};
use super::collaborators::{Collaborators, NewCrop, NoCollaborators};
use super::constants::{CARBON_FRACTION_IN_DM, DAILY_BALANCE_TOLERANCE};
use super::demand::{n_fixation, plant_demand, soil_n_demand};
use super::fluxes::{DailyOutputs, DailyOutputsSeries, DailyReport, LitterFlux, RootResidue};
use super::params::Parameters;
use super::phenology::{self, PhenoStage};
use super::removal::{self, RemovalSpec, Removed, TissueGroup};
use super::state::{Remobilised, State};
use super::turnover::{self, age_tissues, senescing_shoot, throttle, turnover_rates, CropRemains};
use crate::error::{check_balance, PastureError, Result};
use crate::forcing::{Weather, WeatherSeries};
use crate::soil::uptake::{self, UPTAKE_TOLERANCE};
use crate::soil::{validate_zones, RootState, SoilLayer, SoilZone, UptakeSource, ZoneUptake};
use crate::stress::{
    co2_effect_on_n_demand, co2_effect_on_photosynthesis, n_effect_on_photosynthesis, respiration_temperature_effect,
    temperature_factor, water_deficit_factor, water_logging_factor,
};
use crate::tissue::OrganKind;
use crate::traits::DailyModel;

/// Water deficit factor above which the soil is checked for waterlogging.
const WATERLOGGING_CHECK: f64 = 0.999;

/// Uptake of the day per zone and layer (positive amounts).
struct SoilUptake {
    water: Vec<Vec<f64>>,
    no3: Vec<Vec<f64>>,
    nh4: Vec<Vec<f64>>,
}

fn split_external(external: &[ZoneUptake]) -> SoilUptake {
    SoilUptake {
        water: external.iter().map(|u| u.water.clone()).collect(),
        no3: external.iter().map(|u| u.no3.clone()).collect(),
        nh4: external.iter().map(|u| u.nh4.clone()).collect(),
    }
}

/// Fail when an external uptake exceeds what the plant asked for.
fn check_external_total(what: &'static str, taken: f64, demand: f64) -> Result<()> {
    if taken > demand + UPTAKE_TOLERANCE {
        tracing::error!(what, taken, demand, "external uptake above demand");
        return Err(PastureError::Allocation {
            context: format!("external {what} uptake"),
            requested: taken,
            available: demand,
        });
    }
    if taken > demand {
        tracing::warn!(what, taken, demand, "external uptake above demand within tolerance");
    }
    Ok(())
}

fn waterlogging(zones: &[SoilZone], roots: &RootState, coefficient: f64) -> f64 {
    zones
        .iter()
        .zip(&roots.zones)
        .map(|(zone, zr)| {
            let water: Vec<f64> = zone.layers.iter().map(SoilLayer::water_mm).collect();
            let dul: Vec<f64> = zone.layers.iter().map(SoilLayer::dul_mm).collect();
            let sat: Vec<f64> = zone.layers.iter().map(SoilLayer::sat_mm).collect();
            zr.share * water_logging_factor(&water, &dul, &sat, &zr.exploration, coefficient)
        })
        .sum()
}

fn record_pools(outputs: &mut DailyOutputs, state: &State) {
    outputs.dm_total = state.dm_total();
    outputs.dm_shoot_green = state.dm_shoot_green();
    outputs.dm_shoot_dead = state.dm_shoot_dead();
    outputs.dm_root = state.dm_root();
    outputs.n_total = state.n_total();
    outputs.n_shoot = state.n_shoot();
    outputs.storage_dm = state.storage_total();
    outputs.root_depth = state.root_depth;
}

fn zero_layers(zones: &[SoilZone]) -> Vec<Vec<f64>> {
    zones.iter().map(|z| vec![0.0; z.n_layers()]).collect()
}

/// Report of a day on which nothing happens.
fn idle_report(state: &State, params: &Parameters, zones: &[SoilZone]) -> DailyReport {
    let mut outputs = DailyOutputs::default();
    record_pools(&mut outputs, state);
    DailyReport {
        outputs,
        uptake: zones.iter().map(|z| ZoneUptake::zeros(z.n_layers())).collect(),
        litter: LitterFlux {
            material_type: params.species.litter_type.clone(),
            ..LitterFlux::default()
        },
        root_residue: RootResidue {
            dm: zero_layers(zones),
            n: zero_layers(zones),
        },
    }
}

/// Advance the plant one day.
///
/// `zones` is the soil as it stands at the start of the day. `external` is
/// the finished uptake handed over by an arbitrator and is required when
/// the uptake source is external. The input state is never modified; a
/// plant whose crop has ended returns unchanged with zero fluxes.
pub fn step(
    state: &State,
    params: &Parameters,
    weather: &Weather,
    zones: &[SoilZone],
    external: Option<&[ZoneUptake]>,
) -> Result<(State, DailyReport)> {
    weather.validate()?;
    if !state.is_alive {
        return Ok((state.clone(), idle_report(state, params, zones)));
    }
    let day = weather.day_of_year;
    let prev = state.snapshot();
    let mut next = state.clone();
    let ph = &params.photosynthesis;
    let alloc = &params.allocation;
    let nitrogen = &params.nitrogen;
    let pathway = params.species.pathway;

    // 1. Phenology and roots
    if params.species.is_annual {
        next.phenology = phenology::advance(&state.phenology, day, &params.phenology);
        next.root_depth = phenology::root_depth(&next.phenology, &params.phenology, &params.roots);
    }
    let growing = next.phenology.is_growing();
    let roots = RootState::new(
        zones,
        next.root_depth,
        params.roots.zone_shares.as_deref(),
        &params.roots.profile,
    )?;

    // 2. Stress factors
    let t_mean = weather.mean_t();
    let glf_temperature = temperature_factor(t_mean, pathway, &ph.growth_temperature);
    let glf_temperature_day = temperature_factor(weather.daytime_t(), pathway, &ph.growth_temperature);
    let glf_co2 = co2_effect_on_photosynthesis(weather.co2, ph.reference_co2, ph.co2_photosynthesis_coefficient);
    let co2_n = co2_effect_on_n_demand(
        weather.co2,
        ph.reference_co2,
        ph.co2_n_offset,
        ph.co2_n_minimum,
        ph.co2_n_exponent,
    );
    let leaf = prev.organ(OrganKind::Leaf);
    let glf_n_photosynthesis = n_effect_on_photosynthesis(leaf.n_conc_green(), leaf.n_opt, leaf.n_min, co2_n);
    let glf_heat = next.temperature_memory.heat_stress(weather.max_t, t_mean, &ph.heat);
    let glf_cold = next.temperature_memory.cold_stress(weather.min_t, t_mean, &ph.cold);

    // 3. Carbon supply
    let cover = canopy(prev.organs(), params.species.is_legume, ph);
    let retranslocated = if growing {
        retranslocate_storage(&mut next, &prev, alloc.storage_retranslocation_rate)
    } else {
        0.0
    };
    let gross = if growing {
        let limits = PhotosynthesisLimits {
            temperature: glf_temperature,
            temperature_daytime: glf_temperature_day,
            co2: glf_co2,
            nitrogen: glf_n_photosynthesis,
            extreme: glf_heat * glf_cold,
        };
        gross_photosynthesis(ph, weather, &cover, &limits)
    } else {
        0.0
    };
    let maintenance = maintenance_respiration(
        arbitrator::live_dm(&prev),
        ph.maintenance_respiration,
        respiration_temperature_effect(t_mean, pathway, &ph.growth_temperature),
        glf_n_photosynthesis,
    );
    let supply = carbon_supply(
        gross,
        prev.remobilised().carbon,
        retranslocated * CARBON_FRACTION_IN_DM,
        maintenance,
        ph.growth_respiration,
    );
    let reduction = if params.species.is_annual {
        phenology::growth_reduction(&next.phenology, &params.phenology)
    } else {
        1.0
    };
    let potential = if growing && cover.lai > 0.0 {
        supply.potential_dm * reduction
    } else {
        0.0
    };

    // 4. Water uptake
    let water_demand = weather.water_demand.max(0.0);
    let external = match params.uptake.source {
        UptakeSource::Calculate => None,
        UptakeSource::External => {
            let given = external.ok_or(PastureError::MissingInput {
                what: "external uptake",
                day,
            })?;
            roots.check_topology(zones)?;
            uptake::validate_external(zones, given)?;
            Some(split_external(given))
        }
    };
    let water_uptake = match &external {
        Some(given) => {
            check_external_total("water", uptake::total(&given.water), water_demand)?;
            given.water.clone()
        }
        None => {
            let available = uptake::water_availability(
                zones,
                &roots,
                prev.dm_root(),
                params.roots.specific_root_length,
                &params.uptake,
            )?;
            uptake::take_water(water_demand, &available)?
        }
    };
    let water_taken = uptake::total(&water_uptake);
    let mut glf_water = water_deficit_factor(water_taken, water_demand);
    if glf_water > WATERLOGGING_CHECK {
        glf_water *= waterlogging(zones, &roots, params.turnover.waterlogging_coefficient);
    }
    let water_limited = potential * glf_water.powf(alloc.water_stress_exponent);

    // 5. Partitioning and demand
    let fraction_shoot = shoot_fraction(day, prev.dm_shoot_green(), prev.dm_root(), glf_water, alloc);
    let reproductive_active = params.species.is_annual && next.phenology.stage == PhenoStage::Reproductive;
    let fractions = partition(fraction_shoot, alloc, reproductive_active)?;
    let demand = plant_demand(&prev, water_limited, &fractions, alloc, co2_n, growing)?;
    let n_optimum = demand.n_optimum();
    let n_luxury = demand.n_luxury();

    // 6. Nitrogen supply: fixation, reallocation, soil, then luxury N
    let (no3_uptake, nh4_uptake, budget) = match &external {
        Some(given) => {
            let soil_n = uptake::total(&given.no3) + uptake::total(&given.nh4);
            let fixation = n_fixation(params.species.is_legume, nitrogen, n_luxury, soil_n);
            let budget = soil_n_demand(n_luxury, fixation, prev.remobilised().nitrogen)?;
            check_external_total("nitrogen", soil_n, budget.soil_demand)?;
            (given.no3.clone(), given.nh4.clone(), budget)
        }
        None => {
            let (no3_available, nh4_available) =
                uptake::nitrogen_availability(zones, &roots, &water_uptake, &params.uptake)?;
            let soil_available = uptake::total(&no3_available) + uptake::total(&nh4_available);
            let fixation = n_fixation(params.species.is_legume, nitrogen, n_luxury, soil_available);
            let budget = soil_n_demand(n_luxury, fixation, prev.remobilised().nitrogen)?;
            if budget.soil_demand > soil_available {
                tracing::warn!(
                    demand = budget.soil_demand,
                    available = soil_available,
                    "soil N supply below demand"
                );
            }
            let (no3, nh4) = uptake::take_nitrogen(budget.soil_demand, &no3_available, &nh4_available)?;
            (no3, nh4, budget)
        }
    };
    let soil_n_uptake = uptake::total(&no3_uptake) + uptake::total(&nh4_uptake);
    let mut new_n = budget.fixation + budget.reallocated + soil_n_uptake;
    let mut luxury_used = 0.0;
    if new_n < n_optimum {
        let taken = luxury_remobilisation(n_optimum, new_n, &luxury_n(&prev, nitrogen))?;
        let before = next.n_total();
        withdraw_luxury(&mut next, &prev, &taken, nitrogen);
        luxury_used = before - next.n_total();
        new_n += luxury_used;
    }

    // 7. Allocation
    let glf_n = n_limitation(new_n, n_optimum);
    let growth = actual_growth(water_limited, glf_n, alloc);
    let shares = n_shares(&fractions, &prev)?;
    let allocation = allocate(
        &mut next,
        &demand,
        &fractions,
        growth,
        water_limited - growth,
        new_n,
        &shares,
    )?;
    let unused_n = budget.remobilised_left;
    let unused_to_litter = return_unused_n(&mut next, &prev, unused_n, nitrogen.kappa4);

    // 8. Turnover
    let shoot_growth: f64 = OrganKind::SHOOT
        .iter()
        .map(|k| allocation.growth[k.index()] + allocation.storage[k.index()])
        .sum();
    let rates = throttle(
        turnover_rates(t_mean, glf_water, &next.phenology, params).with_defoliation(state.defoliated_fraction),
        prev.dm_shoot_green(),
        shoot_growth,
        senescing_shoot(&prev),
        prev.dm_root(),
        params.turnover.min_green,
    );
    let outcome = age_tissues(&mut next, &prev, &rates, params);
    next.remobilised = Remobilised {
        carbon: outcome.remobilised_carbon(),
        nitrogen: outcome.remobilised_n,
    };
    next.defoliated_fraction = 0.0;
    next.validate()?;

    // 9. Balances
    let dm_before = state.dm_total();
    let dm_expected = dm_before + allocation.dm()
        - retranslocated
        - outcome.litter_dm
        - outcome.residue_dm
        - outcome.remobilised_dm;
    check_balance(
        "daily DM",
        dm_expected,
        next.dm_total(),
        DAILY_BALANCE_TOLERANCE * dm_before.max(1.0),
    )?;
    let n_before = state.n_total();
    let n_expected = n_before - luxury_used + allocation.n_total() + (unused_n - unused_to_litter)
        - outcome.litter_n
        - outcome.residue_n
        - outcome.remobilised_n;
    check_balance(
        "daily N",
        n_expected,
        next.n_total(),
        DAILY_BALANCE_TOLERANCE * n_before.max(1.0),
    )?;

    // 10. Report
    let uptake = uptake::assemble(water_uptake, no3_uptake, nh4_uptake, water_taken, soil_n_uptake)?;
    let litter = LitterFlux {
        material_type: params.species.litter_type.clone(),
        dm: outcome.litter_dm,
        n: outcome.litter_n + unused_to_litter,
    };
    let root_residue = RootResidue {
        dm: roots.distribute(outcome.residue_dm),
        n: roots.distribute(outcome.residue_n),
    };
    let mut outputs = DailyOutputs {
        lai: cover.lai,
        cover: cover.cover,
        gross_photosynthesis: gross,
        maintenance_respiration: supply.maintenance_respiration,
        growth_respiration: supply.growth_respiration,
        c_remobilised: next.remobilised.carbon,
        dm_retranslocated: retranslocated,
        potential_growth: potential,
        water_limited_growth: water_limited,
        actual_growth: growth,
        shoot_fraction: fractions.shoot(),
        glf_temperature,
        glf_water,
        glf_nitrogen: glf_n,
        glf_heat,
        glf_cold,
        glf_co2,
        water_demand,
        water_uptake: water_taken,
        n_demand_optimum: n_optimum,
        n_demand_luxury: n_luxury,
        n_fixation: budget.fixation,
        n_remobilised: budget.reallocated,
        n_luxury_remobilised: luxury_used,
        n_soil_uptake: soil_n_uptake,
        senesced_dm: outcome.senesced_dm,
        litter_dm: litter.dm,
        litter_n: litter.n,
        root_residue_dm: outcome.residue_dm,
        root_residue_n: outcome.residue_n,
        ..DailyOutputs::default()
    };
    record_pools(&mut outputs, &next);
    tracing::debug!(
        day,
        gross,
        growth,
        litter = litter.dm,
        root_residue = outcome.residue_dm,
        "day complete"
    );

    Ok((
        next,
        DailyReport {
            outputs,
            uptake,
            litter,
            root_residue,
        },
    ))
}

/// Take the day's uptake out of the soil.
pub fn apply_uptake(zones: &mut [SoilZone], uptake: &[ZoneUptake]) -> Result<()> {
    if zones.len() != uptake.len() {
        return Err(PastureError::LengthMismatch {
            what: "uptake zones".to_string(),
            expected: zones.len(),
            actual: uptake.len(),
        });
    }
    for (zone, u) in zones.iter_mut().zip(uptake) {
        zone.apply_water_uptake(&u.water)?;
        zone.apply_nitrogen_uptake(&u.no3, &u.nh4)?;
    }
    Ok(())
}

/// The pasture species as a daily model over its soil zones.
pub struct Pasture;

impl DailyModel for Pasture {
    type Params = Parameters;
    type State = State;
    type Forcing = Weather;
    type Environment = Vec<SoilZone>;
    type Report = DailyReport;
    type Series = DailyOutputsSeries;

    fn initialize_state(params: &Parameters, env: &Vec<SoilZone>) -> Result<State> {
        params.validate()?;
        validate_zones(env, env.len())?;
        RootState::new(
            env,
            params.initial.root_depth,
            params.roots.zone_shares.as_deref(),
            &params.roots.profile,
        )?;
        Ok(State::initialize(params))
    }

    fn step(state: &State, params: &Parameters, forcing: &Weather, env: &Vec<SoilZone>) -> Result<(State, DailyReport)> {
        step(state, params, forcing, env, None)
    }

    fn update_environment(env: &mut Vec<SoilZone>, report: &DailyReport) -> Result<()> {
        apply_uptake(env, &report.uptake)
    }
}

/// Run the pasture over a weather series.
///
/// The plant computes its own uptake and the soil loses it between days.
/// Returns the daily outputs, the final state and the final soil.
pub fn run(
    params: &Parameters,
    weather: &WeatherSeries,
    zones: &[SoilZone],
    initial_state: Option<&State>,
) -> Result<(DailyOutputsSeries, State, Vec<SoilZone>)> {
    if params.uptake.source == UptakeSource::External {
        return Err(PastureError::InvalidConfig(
            "a series run computes its own uptake; use the driver for external uptake".to_string(),
        ));
    }
    let forcing: Vec<Weather> = weather.iter().collect();
    let env = zones.to_vec();
    if initial_state.is_some() {
        params.validate()?;
        validate_zones(&env, env.len())?;
    }
    Pasture::run(params, &forcing, &env, initial_state)
}

/// Drives one plant through its days and lifecycle events.
///
/// Owns the plant state, the soil zones it roots into and the collaborators
/// that receive its exchanges. Soil zones lose the plant's uptake after
/// every day unless an external arbitrator supplies the uptake, in which
/// case the arbitrator owns the soil update.
#[derive(Debug, Clone)]
pub struct DailyCycleDriver<C: Collaborators = NoCollaborators> {
    params: Parameters,
    state: State,
    zones: Vec<SoilZone>,
    collaborators: C,
    sown: bool,
    harvested: Removed,
    last_growth: f64,
}

impl<C: Collaborators> DailyCycleDriver<C> {
    /// Validate the configuration and initialise the plant.
    pub fn new(params: Parameters, zones: Vec<SoilZone>, collaborators: C) -> Result<Self> {
        let state = Pasture::initialize_state(&params, &zones)?;
        Ok(Self {
            params,
            state,
            zones,
            collaborators,
            sown: false,
            harvested: Removed::default(),
            last_growth: 0.0,
        })
    }

    /// Replace the plant state, e.g. with one restored from a flat array.
    pub fn with_state(mut self, state: State) -> Result<Self> {
        state.validate()?;
        self.state = state;
        Ok(self)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn zones(&self) -> &[SoilZone] {
        &self.zones
    }

    /// Soil zones, for a soil model updating them between days.
    pub fn zones_mut(&mut self) -> &mut [SoilZone] {
        &mut self.zones
    }

    pub fn collaborators(&self) -> &C {
        &self.collaborators
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive
    }

    /// Announce the new crop. Only the first call has an effect.
    pub fn sow(&mut self) {
        if self.sown {
            return;
        }
        let event = NewCrop {
            name: self.params.species.name.clone(),
            family: self.params.species.family.clone(),
        };
        tracing::info!(name = %event.name, family = %event.family, "new crop sown");
        self.collaborators.new_crop(&event);
        self.sown = true;
    }

    /// Simulate one day and hand its exchanges to the soil and collaborators.
    ///
    /// On error the plant and the soil keep their state from before the day.
    pub fn advance_day(&mut self, weather: &Weather, external: Option<&[ZoneUptake]>) -> Result<DailyReport> {
        self.sow();
        let (next, mut report) = step(&self.state, &self.params, weather, &self.zones, external)?;
        report.outputs.harvested_dm = self.harvested.dm;
        report.outputs.harvested_n = self.harvested.n;
        if self.params.uptake.source == UptakeSource::Calculate {
            apply_uptake(&mut self.zones, &report.uptake)?;
        }
        self.harvested = Removed::default();
        self.last_growth = report.outputs.actual_growth;
        self.state = next;
        self.publish(&report);
        Ok(report)
    }

    fn publish(&mut self, report: &DailyReport) {
        for (zone, u) in self.zones.iter().zip(&report.uptake) {
            self.collaborators.water_changed(&zone.name, &u.water_deltas());
            self.collaborators
                .nitrogen_changed(&zone.name, &u.no3_deltas(), &u.nh4_deltas());
        }
        if !report.litter.is_empty() {
            self.collaborators.surface_organic_matter(&report.litter);
        }
        if report.root_residue.total_dm() > 0.0 {
            for ((zone, dm), n) in self
                .zones
                .iter()
                .zip(&report.root_residue.dm)
                .zip(&report.root_residue.n)
            {
                self.collaborators.fresh_organic_matter(&zone.name, dm, n);
            }
        }
    }

    /// Simulate every day of a weather series.
    pub fn run(&mut self, weather: &WeatherSeries) -> Result<DailyOutputsSeries> {
        let mut outputs = DailyOutputsSeries::with_capacity(weather.len());
        for day in weather.iter() {
            let report = self.advance_day(&day, None)?;
            outputs.push(&report.outputs);
        }
        Ok(outputs)
    }

    fn require_alive(&self, operation: &'static str) -> Result<()> {
        if self.state.is_alive {
            Ok(())
        } else {
            Err(PastureError::PlantNotAlive(operation))
        }
    }

    /// Move a fraction of all live tissue to the dead pools.
    pub fn kill(&mut self, fraction: f64) -> Result<f64> {
        self.require_alive("kill")?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(PastureError::InvalidConfig(format!(
                "kill fraction {fraction} outside [0, 1]"
            )));
        }
        Ok(turnover::kill(&mut self.state, fraction))
    }

    /// End the crop, handing shoots to surface residue and roots to the soil.
    pub fn end_crop(&mut self) -> Result<CropRemains> {
        self.require_alive("end crop")?;
        let roots = RootState::new(
            &self.zones,
            self.state.root_depth,
            self.params.roots.zone_shares.as_deref(),
            &self.params.roots.profile,
        )?;
        let remains = turnover::end_crop(&mut self.state);
        let litter = LitterFlux {
            material_type: self.params.species.litter_type.clone(),
            dm: remains.shoot_dm,
            n: remains.shoot_n,
        };
        if !litter.is_empty() {
            self.collaborators.surface_organic_matter(&litter);
        }
        let dm = roots.distribute(remains.root_dm);
        let n = roots.distribute(remains.root_n);
        for ((zone, dm), n) in self.zones.iter().zip(&dm).zip(&n) {
            self.collaborators.fresh_organic_matter(&zone.name, dm, n);
        }
        Ok(remains)
    }

    /// Harvest or graze standing herbage.
    ///
    /// The removal shows in the outputs of the next simulated day.
    pub fn remove(&mut self, spec: RemovalSpec) -> Result<Removed> {
        let removed = removal::remove(&mut self.state, spec, self.last_growth, &self.params)?;
        self.record_removal(&removed);
        Ok(removed)
    }

    /// Remove a fraction of the green or dead tissue of one organ.
    pub fn remove_fraction(&mut self, kind: OrganKind, group: TissueGroup, fraction: f64) -> Result<Removed> {
        let removed = removal::remove_fraction(&mut self.state, kind, group, fraction)?;
        self.record_removal(&removed);
        Ok(removed)
    }

    fn record_removal(&mut self, removed: &Removed) {
        self.harvested.dm += removed.dm;
        self.harvested.n += removed.n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::layer::tests::loam;
    use crate::species::collaborators::Recorder;
    use crate::tissue::TissueStage;
    use crate::traits::ModelState;
    use approx::assert_relative_eq;

    fn spring_day(day_of_year: u32) -> Weather {
        Weather {
            day_of_year,
            max_t: 20.0,
            min_t: 8.0,
            radiation: 15.0,
            co2: 380.0,
            day_length: 13.0,
            water_demand: 3.0,
            intercepted_radiation: None,
        }
    }

    fn frosty_day(day_of_year: u32) -> Weather {
        Weather {
            max_t: 1.0,
            min_t: -5.0,
            ..spring_day(day_of_year)
        }
    }

    fn paddock() -> Vec<SoilZone> {
        vec![SoilZone::new(
            "paddock",
            vec![loam(100.0), loam(200.0), loam(300.0), loam(400.0)],
        )]
    }

    fn spring_series(n: usize) -> WeatherSeries {
        let warm: Vec<f64> = (0..n).map(|i| 16.0 + 6.0 * ((i as f64) / 9.0).sin()).collect();
        let cool: Vec<f64> = warm.iter().map(|t| t - 11.0).collect();
        WeatherSeries::new(
            250,
            warm,
            cool,
            vec![14.0; n],
            vec![380.0; n],
            vec![12.5; n],
            vec![3.5; n],
        )
        .unwrap()
    }

    fn driver() -> DailyCycleDriver<Recorder> {
        DailyCycleDriver::new(Parameters::default(), paddock(), Recorder::default()).unwrap()
    }

    // -- Single day --

    #[test]
    fn growing_day_produces_growth() {
        let params = Parameters::default();
        let state = State::initialize(&params);
        let (next, report) = step(&state, &params, &spring_day(280), &paddock(), None).unwrap();
        let o = &report.outputs;
        assert!(o.gross_photosynthesis > 0.0);
        assert!(o.actual_growth > 0.0);
        assert!(o.actual_growth <= o.water_limited_growth + 1e-12);
        assert!(o.water_limited_growth <= o.potential_growth + 1e-12);
        assert!(o.water_uptake > 0.0 && o.water_uptake <= 3.0 + 1e-9);
        assert_relative_eq!(o.dm_total, next.dm_total(), epsilon = 1e-9);
        assert_eq!(report.litter.material_type, "grass");
    }

    #[test]
    fn step_leaves_input_state_untouched() {
        let params = Parameters::default();
        let state = State::initialize(&params);
        let before = state.clone();
        step(&state, &params, &spring_day(280), &paddock(), None).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn frozen_day_changes_no_live_tissue() {
        let params = Parameters::default();
        let state = State::initialize(&params);
        let (next, report) = step(&state, &params, &frosty_day(180), &paddock(), None).unwrap();
        assert_eq!(report.outputs.potential_growth, 0.0);
        assert_eq!(report.outputs.actual_growth, 0.0);
        for kind in OrganKind::ALL {
            assert_relative_eq!(
                next.organ(kind).dm_green(),
                state.organ(kind).dm_green(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn missing_weather_is_rejected() {
        let params = Parameters::default();
        let state = State::initialize(&params);
        let mut weather = spring_day(280);
        weather.radiation = f64::NAN;
        assert!(matches!(
            step(&state, &params, &weather, &paddock(), None),
            Err(PastureError::MissingInput { what: "radiation", .. })
        ));
    }

    #[test]
    fn uptake_stays_within_availability() {
        let params = Parameters::default();
        let state = State::initialize(&params);
        let zones = paddock();
        let roots = RootState::new(&zones, state.root_depth, None, &params.roots.profile).unwrap();
        let available =
            uptake::water_availability(&zones, &roots, state.dm_root(), params.roots.specific_root_length, &params.uptake)
                .unwrap();
        let (_, report) = step(&state, &params, &spring_day(280), &zones, None).unwrap();
        for (z, zone) in report.uptake.iter().enumerate() {
            for (l, &w) in zone.water.iter().enumerate() {
                assert!(w >= 0.0);
                assert!(w <= available[z][l] + 1e-9);
            }
            for (l, &n) in zone.no3.iter().enumerate() {
                assert!(n <= zones[z].layers[l].no3 + 1e-9);
            }
        }
    }

    // -- Multi-day properties --

    #[test]
    fn season_conserves_mass_and_keeps_bounds() {
        let params = Parameters::default();
        let weather = spring_series(120);
        let mut state = State::initialize(&params);
        let mut zones = paddock();
        for day in weather.iter() {
            let (next, report) = step(&state, &params, &day, &zones, None).unwrap();
            let o = &report.outputs;
            let expected = state.dm_total() + o.actual_growth
                - o.dm_retranslocated
                - o.litter_dm
                - o.root_residue_dm
                - o.c_remobilised / CARBON_FRACTION_IN_DM;
            assert_relative_eq!(next.dm_total(), expected, max_relative = 1e-6);
            for organ in &next.organs {
                for pool in &organ.pools {
                    assert!(pool.dm >= 0.0 && pool.n >= 0.0);
                }
            }
            for f in [o.glf_temperature, o.glf_water, o.glf_nitrogen, o.glf_heat, o.glf_cold] {
                assert!((0.0..=1.0).contains(&f), "limiting factor {f}");
            }
            apply_uptake(&mut zones, &report.uptake).unwrap();
            state = next;
        }
        assert!(state.dm_total() > 0.0);
    }

    #[test]
    fn series_run_matches_day_count() {
        let params = Parameters::default();
        let weather = spring_series(30);
        let (outputs, state, zones) = run(&params, &weather, &paddock(), None).unwrap();
        assert_eq!(outputs.len(), 30);
        assert_eq!(outputs.column("actual_growth").map(<[f64]>::len), Some(30));
        assert!(state.is_alive);
        let water_before: f64 = paddock()[0].layers.iter().map(SoilLayer::water_mm).sum();
        let water_after: f64 = zones[0].layers.iter().map(SoilLayer::water_mm).sum();
        let taken: f64 = outputs.column("water_uptake").unwrap().iter().sum();
        assert_relative_eq!(water_before - water_after, taken, epsilon = 1e-6);
    }

    #[test]
    fn annual_stays_dormant_before_emergence() {
        let mut params = Parameters::default();
        params.species.is_annual = true;
        let state = State::initialize(&params);
        let (next, report) = step(&state, &params, &spring_day(20), &paddock(), None).unwrap();
        assert_eq!(next.phenology.stage, PhenoStage::Dormant);
        assert_eq!(report.outputs.actual_growth, 0.0);
        assert_eq!(report.outputs.gross_photosynthesis, 0.0);
    }

    // -- External uptake --

    #[test]
    fn external_uptake_is_required_and_checked() {
        let mut params = Parameters::default();
        params.uptake.source = UptakeSource::External;
        let state = State::initialize(&params);
        let zones = paddock();
        assert!(matches!(
            step(&state, &params, &spring_day(280), &zones, None),
            Err(PastureError::MissingInput { what: "external uptake", .. })
        ));

        let mut given = vec![ZoneUptake::zeros(4)];
        given[0].water = vec![1.0, 1.0, 0.5, 0.0];
        let (_, report) = step(&state, &params, &spring_day(280), &zones, Some(&given)).unwrap();
        assert_relative_eq!(report.outputs.water_uptake, 2.5, epsilon = 1e-12);
        assert_relative_eq!(report.outputs.glf_water, 2.5 / 3.0, epsilon = 1e-12);
        assert_eq!(report.uptake[0].water, given[0].water);

        given[0].water = vec![3.0, 1.0, 0.0, 0.0];
        assert!(matches!(
            step(&state, &params, &spring_day(280), &zones, Some(&given)),
            Err(PastureError::Allocation { .. })
        ));
    }

    // -- Driver lifecycle --

    #[test]
    fn new_crop_is_announced_once() {
        let mut d = driver();
        d.advance_day(&spring_day(280), None).unwrap();
        d.advance_day(&spring_day(281), None).unwrap();
        assert_eq!(d.collaborators().new_crops.len(), 1);
        assert_eq!(d.collaborators().new_crops[0].name, "ryegrass");
        assert_eq!(d.collaborators().water.len(), 2);
    }

    #[test]
    fn driver_takes_water_from_soil() {
        let mut d = driver();
        let before: f64 = d.zones()[0].layers.iter().map(SoilLayer::water_mm).sum();
        let report = d.advance_day(&spring_day(280), None).unwrap();
        let after: f64 = d.zones()[0].layers.iter().map(SoilLayer::water_mm).sum();
        assert_relative_eq!(before - after, report.outputs.water_uptake, epsilon = 1e-9);
        assert_relative_eq!(d.collaborators().water_removed(), report.outputs.water_uptake, epsilon = 1e-9);
        let reported: f64 = report.uptake.iter().map(ZoneUptake::total_water).sum();
        assert_relative_eq!(reported, report.outputs.water_uptake, epsilon = 1e-9);
    }

    #[test]
    fn restored_state_continues_on_dried_soil() {
        let mut d = driver();
        d.advance_day(&spring_day(280), None).unwrap();
        let saved = d.state().to_vec();
        let restored = State::from_array(&saved, d.params()).unwrap();
        let mut d = DailyCycleDriver::new(Parameters::default(), paddock(), Recorder::default())
            .unwrap()
            .with_state(restored)
            .unwrap();
        assert_relative_eq!(d.state().dm_total(), State::from_array(&saved, d.params()).unwrap().dm_total());
        for layer in &mut d.zones_mut()[0].layers {
            layer.sw = layer.ll;
        }
        let report = d.advance_day(&spring_day(281), None).unwrap();
        assert_eq!(report.outputs.water_uptake, 0.0);
    }

    #[test]
    fn harvest_shows_in_next_day_outputs() {
        let mut d = driver();
        let removed = d.remove(RemovalSpec::SetRemoveAmount(400.0)).unwrap();
        assert_relative_eq!(removed.dm, 400.0, epsilon = 1e-6);
        let report = d.advance_day(&spring_day(280), None).unwrap();
        assert_relative_eq!(report.outputs.harvested_dm, 400.0, epsilon = 1e-6);
        assert!(report.outputs.harvested_n > 0.0);
        let report = d.advance_day(&spring_day(281), None).unwrap();
        assert_eq!(report.outputs.harvested_dm, 0.0);
    }

    #[test]
    fn kill_moves_live_tissue_to_dead() {
        let mut d = driver();
        let green = d.state().dm_shoot_green() + d.state().organ(OrganKind::Root).dm_green();
        let total = d.state().dm_total();
        let killed = d.kill(1.0).unwrap();
        assert_relative_eq!(killed, green, epsilon = 1e-9);
        assert_eq!(d.state().dm_shoot_green(), 0.0);
        assert_relative_eq!(d.state().dm_total(), total, epsilon = 1e-9);
        assert!(d.kill(1.5).is_err());
    }

    #[test]
    fn end_crop_hands_over_everything_and_stops() {
        let mut d = driver();
        d.advance_day(&spring_day(280), None).unwrap();
        let total = d.state().dm_total();
        let remains = d.end_crop().unwrap();
        assert_relative_eq!(remains.shoot_dm + remains.root_dm, total, epsilon = 1e-9);
        assert_eq!(d.state().dm_total(), 0.0);
        assert!(!d.is_alive());
        let rec = d.collaborators();
        assert_relative_eq!(rec.litter.last().map(|l| l.dm).unwrap_or(0.0), remains.shoot_dm, epsilon = 1e-9);

        let report = d.advance_day(&spring_day(281), None).unwrap();
        assert_eq!(report.outputs.actual_growth, 0.0);
        assert_eq!(report.outputs.water_uptake, 0.0);
        assert_eq!(report.root_residue.total_dm(), 0.0);
        assert!(matches!(d.end_crop(), Err(PastureError::PlantNotAlive(_))));
        assert!(matches!(d.kill(0.5), Err(PastureError::PlantNotAlive(_))));
        assert!(matches!(
            d.remove(RemovalSpec::SetRemoveAmount(10.0)),
            Err(PastureError::PlantNotAlive(_))
        ));
    }

    #[test]
    fn driver_rejects_bad_configuration() {
        let mut params = Parameters::default();
        params.photosynthesis.light_extinction = 5.0;
        assert!(matches!(
            DailyCycleDriver::new(params, paddock(), NoCollaborators),
            Err(PastureError::InvalidParameter { .. })
        ));
        let mut zones = paddock();
        zones[0].layers.clear();
        assert!(DailyCycleDriver::new(Parameters::default(), zones, NoCollaborators).is_err());
    }

    #[test]
    fn driver_series_run() {
        let mut d = driver();
        let outputs = d.run(&spring_series(20)).unwrap();
        assert_eq!(outputs.len(), 20);
        let residue: f64 = outputs.column("root_residue_dm").unwrap().iter().sum();
        assert_relative_eq!(d.collaborators().residue_dm(), residue, epsilon = 1e-9);
        assert!(d.state().organ(OrganKind::Leaf).pool(TissueStage::Growing).dm > 0.0);
    }

    // -- Long runs under less common configurations --

    fn poor_paddock() -> Vec<SoilZone> {
        let poor = |thickness| SoilLayer {
            no3: 0.5,
            nh4: 0.1,
            ..loam(thickness)
        };
        vec![SoilZone::new(
            "paddock",
            vec![poor(100.0), poor(200.0), poor(300.0), poor(400.0)],
        )]
    }

    fn clover() -> Parameters {
        let mut params = Parameters::default();
        params.species.is_legume = true;
        params.allocation.frac_to_leaf = 0.6;
        params.allocation.frac_to_stolon = 0.25;
        params.nitrogen.min_fixation = 0.2;
        params.nitrogen.max_fixation = 0.6;
        params
    }

    fn with_luxury_n(mut params: Parameters) -> Parameters {
        params.nitrogen.kappa2 = 0.3;
        params.nitrogen.kappa3 = 0.2;
        params.nitrogen.kappa4 = 0.1;
        params
    }

    fn soil_mineral_n(zones: &[SoilZone]) -> f64 {
        zones.iter().flat_map(|z| &z.layers).map(|l| l.no3 + l.nh4).sum()
    }

    /// Advance one day and check the plant DM and soil N against the reported fluxes.
    fn balanced_day<C: Collaborators>(d: &mut DailyCycleDriver<C>, weather: &Weather) -> DailyOutputs {
        let dm_before = d.state().dm_total();
        let soil_n_before = soil_mineral_n(d.zones());
        let report = d.advance_day(weather, None).unwrap();
        let o = report.outputs;
        let expected = dm_before + o.actual_growth
            - o.dm_retranslocated
            - o.litter_dm
            - o.root_residue_dm
            - o.c_remobilised / CARBON_FRACTION_IN_DM;
        assert_relative_eq!(d.state().dm_total(), expected, max_relative = 1e-6);
        assert_relative_eq!(soil_n_before - soil_mineral_n(d.zones()), o.n_soil_uptake, epsilon = 1e-9);
        for organ in &d.state().organs {
            for pool in &organ.pools {
                assert!(pool.dm >= 0.0 && pool.n >= 0.0);
            }
        }
        o
    }

    #[test]
    fn default_legume_starts_with_stolons() {
        let mut params = Parameters::default();
        params.species.is_legume = true;
        let mut d = DailyCycleDriver::new(params.clone(), paddock(), Recorder::default()).unwrap();
        assert_relative_eq!(d.state().dm_shoot(), params.initial.shoot_dm, epsilon = 1e-9);
        assert!(d.state().organ(OrganKind::Stolon).dm_total() > 0.0);
        for day in 280..310 {
            balanced_day(&mut d, &spring_day(day));
        }
        assert!(d.is_alive());
    }

    #[test]
    fn grazed_legume_fixes_nitrogen_on_poor_soil() {
        let mut d = DailyCycleDriver::new(with_luxury_n(clover()), poor_paddock(), Recorder::default()).unwrap();
        let mut fixed = 0.0;
        let mut litter = 0.0;
        let mut grazed = 0.0;
        for i in 0..120 {
            if i % 21 == 20 {
                grazed += d.remove(RemovalSpec::SetRemoveAmount(150.0)).unwrap().dm;
            }
            let o = balanced_day(&mut d, &spring_day(200 + i));
            fixed += o.n_fixation;
            litter += o.litter_dm;
        }
        assert!(fixed > 0.0);
        assert!(grazed > 0.0);
        assert!(litter > 0.0);
        assert_relative_eq!(d.collaborators().litter_dm(), litter, epsilon = 1e-9);
        assert!(d.state().organ(OrganKind::Stolon).dm_total() > 0.0);
        assert!(d.is_alive());
    }

    #[test]
    fn nitrogen_starved_grass_draws_on_luxury_n() {
        let mut d =
            DailyCycleDriver::new(with_luxury_n(Parameters::default()), poor_paddock(), Recorder::default()).unwrap();
        let mut lowest_glf_n = 1.0_f64;
        for day in 200..260 {
            let o = balanced_day(&mut d, &spring_day(day));
            assert!(o.n_luxury_remobilised >= 0.0);
            lowest_glf_n = lowest_glf_n.min(o.glf_nitrogen);
        }
        assert!(lowest_glf_n < 1.0, "growth never limited by N");
    }

    #[test]
    fn killed_sward_sheds_standing_dead_as_litter() {
        let mut d = driver();
        d.kill(1.0).unwrap();
        let dead = d.state().dm_shoot_dead();
        let mut shed = 0.0;
        for day in 100..130 {
            let o = balanced_day(&mut d, &spring_day(day));
            assert_eq!(o.senesced_dm, 0.0);
            shed += o.litter_dm;
        }
        assert!(shed > 0.0);
        assert!(d.state().dm_shoot_dead() < dead);
        assert_relative_eq!(d.collaborators().litter_dm(), shed, epsilon = 1e-9);
    }
}
