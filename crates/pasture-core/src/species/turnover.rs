//! Daily ageing of tissue, and the forced transitions of kill and end crop.
//!
//! Live tissue moves one stage per transfer: growing to mature, mature to
//! senescing, senescing to dead (or straight to litter for stolons), dead
//! to litter. Roots senesce straight into soil residue. Every transfer is a
//! rate on yesterday's pool, capped by what the pool holds today.
//!
//! Senescing tissue gives up part of its sugar and protein on the way out;
//! that DM leaves the plant and returns as carbon the next day, together
//! with the N it carried above the minimum concentration.
use super::constants::{CARBON_FRACTION_IN_DM, CN_RATIO_PROTEIN};
use super::params::{NitrogenParams, Parameters};
use super::phenology::{self, PhenologyState};
use super::state::{PreviousDayState, State};
use crate::stress::{turnover_temperature_factor, turnover_water_factor};
use crate::tissue::{Organ, OrganKind, TissuePool, TissueStage, TurnoverPath};

/// Daily turnover rates [1/day].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnoverRates {
    /// Ageing of live shoot tissue.
    pub live: f64,
    /// Ageing of stolons, raised by defoliation.
    pub stolon: f64,
    /// Detachment of standing dead tissue.
    pub dead: f64,
    /// Senescence of roots.
    pub root: f64,
}

impl TurnoverRates {
    /// Stolon rate for a sward that lost `defoliated` of its shoot.
    pub fn with_defoliation(mut self, defoliated: f64) -> Self {
        let d = defoliated.clamp(0.0, 1.0);
        self.stolon = (self.live + d * (1.0 - self.live)).clamp(0.0, 1.0);
        self
    }
}

/// Turnover rates before the minimum green throttle.
///
/// Nothing turns over on a day too cold for live tissue to age.
pub fn turnover_rates(t_mean: f64, glf_water: f64, phenology: &PhenologyState, params: &Parameters) -> TurnoverRates {
    let t = &params.turnover;
    let temperature = turnover_temperature_factor(t_mean, t.t_min, t.t_opt);
    let water = turnover_water_factor(glf_water, t.glf_water_opt, t.water_factor_max);
    let mut live = t.live_to_dead * temperature * water;
    if live <= 0.0 {
        return TurnoverRates::default();
    }
    let dead = t.dead_to_litter * glf_water.powi(3) * params.removal.digestibility_dead / CARBON_FRACTION_IN_DM
        + t.stock_parameter * t.stocking_rate;
    let mut root = t.root_senescence * temperature * (2.0 - glf_water);
    if params.species.is_annual {
        let (gamma, root_factor) = phenology::annual_turnover(phenology, &params.phenology, live);
        live = gamma;
        root *= root_factor;
    }
    let live = live.clamp(0.0, 1.0);
    TurnoverRates {
        live,
        stolon: live,
        dead: dead.clamp(0.0, 1.0),
        root: root.clamp(0.0, 1.0),
    }
}

/// Slow turnover so the standing green does not drop below `min_green`.
///
/// When today's green plus growth is already under the minimum no live
/// tissue turns over, though standing dead still detaches. Otherwise the
/// live rate is cut to exactly what keeps the minimum and the dead and root
/// rates are scaled by the same ratio. The stolon rate, defoliation
/// included, never exceeds the throttled live rate. Roots stop senescing
/// below half the minimum.
pub fn throttle(
    rates: TurnoverRates,
    shoot_green: f64,
    shoot_growth: f64,
    senescing: f64,
    root_dm: f64,
    min_green: f64,
) -> TurnoverRates {
    let mut r = rates;
    let standing = shoot_green + shoot_growth;
    if standing - r.live * senescing < min_green {
        if standing < min_green {
            r.live = 0.0;
            r.stolon = 0.0;
            r.root = 0.0;
        } else if senescing > 0.0 {
            let adjusted = ((standing - min_green) / senescing).clamp(0.0, r.live);
            let ratio = if r.live > 0.0 { adjusted / r.live } else { 1.0 };
            r.dead *= ratio;
            r.root *= ratio;
            r.live = adjusted;
            r.stolon = adjusted;
        }
        tracing::warn!(standing, min_green, live = r.live, "turnover throttled at minimum green");
    }
    if root_dm < 0.5 * min_green {
        r.root = 0.0;
    }
    r
}

/// DM and N leaving the plant by turnover [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnoverOutcome {
    /// Live DM that became standing dead.
    pub senesced_dm: f64,
    pub litter_dm: f64,
    pub litter_n: f64,
    pub residue_dm: f64,
    pub residue_n: f64,
    /// Sugar and protein DM withdrawn from senescing tissue.
    pub remobilised_dm: f64,
    pub remobilised_n: f64,
}

impl TurnoverOutcome {
    /// Remobilised carbon [kg C/ha].
    pub fn remobilised_carbon(&self) -> f64 {
        self.remobilised_dm * CARBON_FRACTION_IN_DM
    }

    fn absorb(&mut self, other: TurnoverOutcome) {
        self.senesced_dm += other.senesced_dm;
        self.litter_dm += other.litter_dm;
        self.litter_n += other.litter_n;
        self.residue_dm += other.residue_dm;
        self.residue_n += other.residue_n;
        self.remobilised_dm += other.remobilised_dm;
        self.remobilised_n += other.remobilised_n;
    }
}

/// Transfer out of a pool: `rate` times yesterday's content, capped by today's.
fn outflow(prev: &TissuePool, now: &TissuePool, rate: f64) -> (f64, f64) {
    let dm = (rate.clamp(0.0, 1.0) * prev.dm).min(now.dm).max(0.0);
    let n = (dm * prev.n_conc()).min(now.n).max(0.0);
    (dm, n)
}

/// Sugar plus protein DM withdrawn from `dm` of senescing tissue.
///
/// Never more than the tissue itself.
fn withdrawn_dm(dm: f64, n_conc: f64, n_min: f64, nitrogen: &NitrogenParams) -> f64 {
    let sugar = dm * nitrogen.kappa_c;
    let protein = dm * (n_conc - n_min).max(0.0) * CN_RATIO_PROTEIN * nitrogen.fac_cn;
    (sugar + protein).min(dm)
}

fn graduated(organ: &mut Organ, prev: &Organ, rates: &TurnoverRates, growing_factor: f64, nitrogen: &NitrogenParams) -> TurnoverOutcome {
    let p = &prev.pools;
    let (d01, n01) = outflow(&p[0], &organ.pools[0], growing_factor * rates.live);
    let (d12, n12) = outflow(&p[1], &organ.pools[1], rates.live);
    let (d23, n23) = outflow(&p[2], &organ.pools[2], rates.live);
    let (d3l, n3l) = outflow(&p[3], &organ.pools[3], rates.dead);

    let remobilised_dm = withdrawn_dm(d23, p[2].n_conc(), organ.n_min, nitrogen);
    let net = d23 - remobilised_dm;
    let n_to_dead = (net * organ.n_min).min(n23);

    organ.pools[0].remove(d01, n01);
    organ.pools[1].add(d01 - d12, n01 - n12);
    organ.pools[2].add(d12 - d23, n12 - n23);
    organ.pools[3].add(net - d3l, n_to_dead - n3l);
    TurnoverOutcome {
        senesced_dm: net,
        litter_dm: d3l,
        litter_n: n3l,
        remobilised_dm,
        remobilised_n: n23 - n_to_dead,
        ..TurnoverOutcome::default()
    }
}

fn stolon_bypass(organ: &mut Organ, prev: &Organ, rates: &TurnoverRates, growing_factor: f64, nitrogen: &NitrogenParams) -> TurnoverOutcome {
    let p = &prev.pools;
    let (d01, n01) = outflow(&p[0], &organ.pools[0], growing_factor * rates.stolon);
    let (d12, n12) = outflow(&p[1], &organ.pools[1], rates.stolon);
    let (d2l, n2l) = outflow(&p[2], &organ.pools[2], rates.stolon);

    let conc = p[2].n_conc();
    let remobilised_dm = withdrawn_dm(d2l, conc, organ.n_min, nitrogen);
    let net = d2l - remobilised_dm;
    let litter_n = (0.5 * (conc + organ.n_min) * net).min(n2l);

    organ.pools[0].remove(d01, n01);
    organ.pools[1].add(d01 - d12, n01 - n12);
    organ.pools[2].add(d12 - d2l, n12 - n2l);
    let (dead_dm, dead_n) = organ.pools[3].take_all();
    TurnoverOutcome {
        litter_dm: net + dead_dm,
        litter_n: litter_n + dead_n,
        remobilised_dm,
        remobilised_n: n2l - litter_n,
        ..TurnoverOutcome::default()
    }
}

fn root_direct(organ: &mut Organ, prev: &Organ, rates: &TurnoverRates, nitrogen: &NitrogenParams) -> TurnoverOutcome {
    let p = &prev.pools;
    let (dr, nr) = outflow(&p[0], &organ.pools[0], rates.root);
    let conc = p[0].n_conc();
    let remobilised_dm = withdrawn_dm(dr, conc, organ.n_min, nitrogen);
    let net = dr - remobilised_dm;
    let remobilised_n = (0.5 * (conc - organ.n_min).max(0.0) * net).min(nr);

    organ.pools[0].remove(dr, nr);
    let mut residue_dm = net;
    let mut residue_n = nr - remobilised_n;
    for pool in &mut organ.pools[1..] {
        let (dm, n) = pool.take_all();
        residue_dm += dm;
        residue_n += n;
    }
    TurnoverOutcome {
        residue_dm,
        residue_n,
        remobilised_dm,
        remobilised_n,
        ..TurnoverOutcome::default()
    }
}

/// Age every organ of the plant by one day.
///
/// `state` holds today's pools after growth; `prev` the start-of-day
/// snapshot the rates apply to.
pub fn age_tissues(state: &mut State, prev: &PreviousDayState, rates: &TurnoverRates, params: &Parameters) -> TurnoverOutcome {
    let mut outcome = TurnoverOutcome::default();
    let growing_factor = params.turnover.growing_tissue_factor;
    for kind in OrganKind::ALL {
        let before = prev.organ(kind);
        let organ = state.organ_mut(kind);
        let moved = match kind.turnover_path() {
            TurnoverPath::Graduated => graduated(organ, before, rates, growing_factor, &params.nitrogen),
            TurnoverPath::StolonBypass => stolon_bypass(organ, before, rates, growing_factor, &params.nitrogen),
            TurnoverPath::RootDirect => root_direct(organ, before, rates, &params.nitrogen),
        };
        organ.bound_storage();
        outcome.absorb(moved);
    }
    outcome
}

/// Kill a fraction of all live tissue, moving it to the dead pools.
///
/// Returns the DM killed.
pub fn kill(state: &mut State, fraction: f64) -> f64 {
    let killed: f64 = state.organs.iter_mut().map(|o| o.kill(fraction)).sum();
    tracing::info!(fraction, killed, "plant tissue killed");
    killed
}

/// Everything the plant held when the crop ended [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropRemains {
    pub shoot_dm: f64,
    pub shoot_n: f64,
    pub root_dm: f64,
    pub root_n: f64,
}

/// End the crop: empty every pool and mark the plant dead.
///
/// Shoots go to surface litter and roots to soil residue; the caller
/// hands them to the collaborators.
pub fn end_crop(state: &mut State) -> CropRemains {
    let mut remains = CropRemains::default();
    for organ in &mut state.organs {
        let (dm, n) = organ.take_all();
        if organ.kind.is_rooted() {
            remains.root_dm += dm;
            remains.root_n += n;
        } else {
            remains.shoot_dm += dm;
            remains.shoot_n += n;
        }
    }
    state.remobilised = Default::default();
    state.is_alive = false;
    tracing::info!(shoot_dm = remains.shoot_dm, root_dm = remains.root_dm, "crop ended");
    remains
}

/// Senescing shoot DM at the start of the day, the pool the throttle protects.
pub fn senescing_shoot(prev: &PreviousDayState) -> f64 {
    prev.shoot_stage_dm(TissueStage::Senescing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn leaf(pools: [(f64, f64); 4]) -> Organ {
        let mut organ = Organ::new(OrganKind::Leaf, 0.04, 0.05, 0.012);
        for (i, (dm, n)) in pools.into_iter().enumerate() {
            organ.pools[i] = TissuePool::new(dm, n);
        }
        organ
    }

    fn rates(live: f64, dead: f64, root: f64) -> TurnoverRates {
        TurnoverRates {
            live,
            stolon: live,
            dead,
            root,
        }
    }

    // -- Rates --

    #[test]
    fn cold_days_stop_turnover() {
        let params = Parameters::default();
        let r = turnover_rates(1.0, 1.0, &PhenologyState::perennial(), &params);
        assert_eq!(r, TurnoverRates::default());
    }

    #[test]
    fn rates_at_optimum_temperature() {
        let params = Parameters::default();
        let r = turnover_rates(25.0, 1.0, &PhenologyState::perennial(), &params);
        assert_relative_eq!(r.live, 0.025, epsilon = 1e-12);
        assert_relative_eq!(r.dead, 0.11 * 0.2 / 0.4 + 0.05, epsilon = 1e-12);
        assert_relative_eq!(r.root, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn drought_speeds_leaf_turnover() {
        let params = Parameters::default();
        let r = turnover_rates(25.0, 0.25, &PhenologyState::perennial(), &params);
        assert_relative_eq!(r.live, 0.025 * 1.5, epsilon = 1e-12);
        assert_relative_eq!(r.root, 0.02 * 1.75, epsilon = 1e-12);
    }

    #[test]
    fn defoliation_raises_stolon_rate() {
        let r = rates(0.1, 0.1, 0.02).with_defoliation(0.5);
        assert_relative_eq!(r.stolon, 0.55, epsilon = 1e-12);
    }

    // -- Throttle --

    #[test]
    fn throttle_keeps_minimum_green() {
        // 350 standing, 200 senescing at rate 0.5 would leave 250 against a floor of 300
        let r = throttle(rates(0.5, 0.2, 0.04), 330.0, 20.0, 200.0, 500.0, 300.0);
        assert_relative_eq!(r.live, 0.25, epsilon = 1e-12);
        assert_relative_eq!(r.dead, 0.1, epsilon = 1e-12);
        assert_relative_eq!(r.root, 0.02, epsilon = 1e-12);
        assert_relative_eq!(350.0 - r.live * 200.0, 300.0, epsilon = 1e-10);
    }

    #[test]
    fn throttle_stops_live_turnover_below_minimum() {
        let r = throttle(rates(0.5, 0.2, 0.04), 250.0, 20.0, 200.0, 500.0, 300.0);
        assert_eq!(r, rates(0.0, 0.2, 0.0));
    }

    #[test]
    fn throttle_overrides_defoliated_stolon_rate() {
        let raw = rates(0.5, 0.2, 0.04).with_defoliation(0.4);
        assert_relative_eq!(raw.stolon, 0.7, epsilon = 1e-12);
        let r = throttle(raw, 250.0, 20.0, 200.0, 500.0, 300.0);
        assert_eq!(r.stolon, 0.0);
        let r = throttle(raw, 330.0, 20.0, 200.0, 500.0, 300.0);
        assert_relative_eq!(r.stolon, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn throttle_leaves_healthy_sward_alone() {
        let r = throttle(rates(0.05, 0.2, 0.04), 2000.0, 20.0, 500.0, 500.0, 300.0);
        assert_eq!(r, rates(0.05, 0.2, 0.04));
    }

    #[test]
    fn small_roots_stop_senescing() {
        let r = throttle(rates(0.05, 0.2, 0.04), 2000.0, 20.0, 500.0, 100.0, 300.0);
        assert_eq!(r.root, 0.0);
    }

    // -- Graduated path --

    #[test]
    fn graduated_moves_one_stage_per_day() {
        let nitrogen = NitrogenParams::default();
        let prev = leaf([(100.0, 4.0), (200.0, 8.0), (100.0, 4.0), (50.0, 0.6)]);
        let mut organ = prev.clone();
        let out = graduated(&mut organ, &prev, &rates(0.1, 0.2, 0.0), 2.0, &nitrogen);
        assert_relative_eq!(organ.pools[0].dm, 80.0, epsilon = 1e-10);
        assert_relative_eq!(organ.pools[1].dm, 200.0, epsilon = 1e-10);
        assert_relative_eq!(organ.pools[2].dm, 110.0, epsilon = 1e-10);
        assert_relative_eq!(organ.pools[3].dm, 50.0, epsilon = 1e-10);
        assert_relative_eq!(out.litter_dm, 10.0, epsilon = 1e-10);
        // senescing at 0.04 arrives dead at 0.012, the rest is remobilised
        assert_relative_eq!(out.remobilised_n, 10.0 * (0.04 - 0.012), epsilon = 1e-10);
        assert_relative_eq!(
            prev.n_total() - organ.n_total(),
            out.litter_n + out.remobilised_n,
            epsilon = 1e-10
        );
    }

    #[test]
    fn sugar_and_protein_leave_senescing_tissue() {
        let nitrogen = NitrogenParams {
            kappa_c: 0.1,
            fac_cn: 0.5,
            ..NitrogenParams::default()
        };
        let prev = leaf([(0.0, 0.0), (0.0, 0.0), (100.0, 4.0), (0.0, 0.0)]);
        let mut organ = prev.clone();
        let out = graduated(&mut organ, &prev, &rates(0.1, 0.0, 0.0), 1.0, &nitrogen);
        // sugar 1.0, protein 10 * 0.028 * 3.5 * 0.5
        let withdrawn = 1.0 + 10.0 * 0.028 * 3.5 * 0.5;
        assert_relative_eq!(out.remobilised_dm, withdrawn, epsilon = 1e-10);
        assert_relative_eq!(organ.pools[3].dm, 10.0 - withdrawn, epsilon = 1e-10);
        assert_relative_eq!(
            prev.dm_total() - organ.dm_total(),
            out.remobilised_dm,
            epsilon = 1e-10
        );
    }

    #[test]
    fn withdrawal_never_exceeds_moving_tissue() {
        let nitrogen = NitrogenParams {
            kappa_c: 0.9,
            fac_cn: 1.0,
            ..NitrogenParams::default()
        };
        assert_relative_eq!(withdrawn_dm(10.0, 0.05, 0.01, &nitrogen), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn outflow_capped_by_current_pool() {
        let prev = TissuePool::new(100.0, 4.0);
        let now = TissuePool::new(5.0, 0.1);
        let (dm, n) = outflow(&prev, &now, 0.5);
        assert_eq!(dm, 5.0);
        assert_eq!(n, 0.1);
    }

    // -- Stolons and roots --

    #[test]
    fn stolons_skip_the_dead_pool() {
        let nitrogen = NitrogenParams::default();
        let mut prev = Organ::new(OrganKind::Stolon, 0.02, 0.025, 0.006);
        prev.pools[2] = TissuePool::new(100.0, 2.0);
        prev.pools[3] = TissuePool::new(5.0, 0.03);
        let mut organ = prev.clone();
        let out = stolon_bypass(&mut organ, &prev, &rates(0.1, 0.0, 0.0), 1.0, &nitrogen);
        assert_eq!(organ.pools[3].dm, 0.0);
        assert_relative_eq!(out.litter_dm, 15.0, epsilon = 1e-10);
        assert_relative_eq!(out.litter_n, 0.5 * (0.02 + 0.006) * 10.0 + 0.03, epsilon = 1e-10);
        assert_relative_eq!(out.remobilised_n, 0.5 * (0.02 - 0.006) * 10.0, epsilon = 1e-10);
    }

    #[test]
    fn roots_senesce_to_residue() {
        let nitrogen = NitrogenParams::default();
        let mut prev = Organ::new(OrganKind::Root, 0.02, 0.025, 0.006);
        prev.pools[0] = TissuePool::new(500.0, 10.0);
        prev.pools[3] = TissuePool::new(20.0, 0.12);
        let mut organ = prev.clone();
        let out = root_direct(&mut organ, &prev, &rates(0.0, 0.0, 0.02), &nitrogen);
        assert_relative_eq!(organ.dm_total(), 490.0, epsilon = 1e-10);
        assert_relative_eq!(out.residue_dm, 30.0, epsilon = 1e-10);
        assert_relative_eq!(out.remobilised_n, 0.5 * 0.014 * 10.0, epsilon = 1e-10);
        assert_relative_eq!(out.residue_n + out.remobilised_n, 0.2 + 0.12, epsilon = 1e-10);
    }

    // -- Whole plant --

    #[test]
    fn ageing_conserves_mass() {
        let params = Parameters::default();
        let mut state = State::initialize(&params);
        let prev = state.snapshot();
        let dm = state.dm_total();
        let n = state.n_total();
        let out = age_tissues(&mut state, &prev, &rates(0.05, 0.1, 0.02), &params);
        assert!(out.litter_dm > 0.0);
        assert!(out.residue_dm > 0.0);
        assert_relative_eq!(
            dm - state.dm_total(),
            out.litter_dm + out.residue_dm + out.remobilised_dm,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            n - state.n_total(),
            out.litter_n + out.residue_n + out.remobilised_n,
            epsilon = 1e-9
        );
        assert!(state.validate().is_ok());
    }

    #[test]
    fn kill_everything_keeps_mass() {
        let params = Parameters::default();
        let mut state = State::initialize(&params);
        let dm = state.dm_total();
        let live = state.dm_shoot_green() + state.organ(OrganKind::Root).dm_green();
        let killed = kill(&mut state, 1.0);
        assert_relative_eq!(killed, live, epsilon = 1e-9);
        assert_eq!(state.dm_shoot_green(), 0.0);
        assert_relative_eq!(state.dm_total(), dm, epsilon = 1e-9);
    }

    #[test]
    fn end_crop_empties_the_plant() {
        let params = Parameters::default();
        let mut state = State::initialize(&params);
        let remains = end_crop(&mut state);
        assert_relative_eq!(remains.shoot_dm, 2000.0, epsilon = 1e-9);
        assert_relative_eq!(remains.root_dm, 500.0, epsilon = 1e-9);
        assert_eq!(state.dm_total(), 0.0);
        assert!(!state.is_alive);
    }
}
