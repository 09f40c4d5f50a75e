/// Pasture species state.
///
/// Everything carried from one day to the next:
/// - `organs`: leaf, stem, stolon, root and reproductive organs, each with
///   four tissue pools and a storage reserve
/// - `remobilised`: C and N released by yesterday's senescence, usable today
/// - `temperature_memory`: heat and cold damage still recovering
/// - `phenology`: stage and day counters (annuals)
/// - `root_depth`: current root front [mm]
/// - `defoliated_fraction`: share of shoot removed since the last day
/// - `is_alive`: false once the crop has ended
use super::constants::{DM_FRACTION_SLOTS, N_ORGANS, STATE_SIZE};
use super::params::Parameters;
use super::phenology::{self, PhenoStage, PhenologyState};
use crate::error::{PastureError, Result};
use crate::stress::ExtremeTemperatureMemory;
use crate::tissue::{Organ, OrganKind, TissuePool, TissueStage, N_STAGES};
use crate::traits::ModelState;

/// C and N freed by senescence, available to the next day's growth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Remobilised {
    /// [kg C/ha]
    pub carbon: f64,
    /// [kg N/ha]
    pub nitrogen: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub organs: [Organ; N_ORGANS],
    pub remobilised: Remobilised,
    pub temperature_memory: ExtremeTemperatureMemory,
    pub phenology: PhenologyState,
    pub root_depth: f64,
    pub defoliated_fraction: f64,
    pub is_alive: bool,
}

fn build_organs(params: &Parameters) -> [Organ; N_ORGANS] {
    OrganKind::ALL.map(|kind| {
        let (opt, max, min) = params.nitrogen.thresholds(kind);
        Organ::new(kind, opt, max, min)
    })
}

impl State {
    /// Create the initial state from parameters.
    ///
    /// Shoot DM is split over the leaf, stem and stolon stages by the
    /// initial DM fractions; roots hold all their DM in the growing stage.
    /// Live tissue starts at its stage N level, dead tissue at minimum N.
    pub fn initialize(params: &Parameters) -> Self {
        let mut organs = build_organs(params);
        let fractions = params.dm_fractions();
        for (&(kind, stage), &fraction) in DM_FRACTION_SLOTS.iter().zip(&fractions) {
            let organ = &mut organs[kind.index()];
            let dm = params.initial.shoot_dm * fraction;
            let conc = initial_n_conc(organ, stage, params);
            organ.pools[stage] = TissuePool::new(dm, dm * conc);
        }
        let root = &mut organs[OrganKind::Root.index()];
        let root_dm = params.initial.root_dm;
        root.pools[0] = TissuePool::new(root_dm, root_dm * root.n_opt);

        let (phen, root_depth) = if params.species.is_annual {
            let phen = PhenologyState::default();
            (phen, phenology::root_depth(&phen, &params.phenology, &params.roots))
        } else {
            (PhenologyState::perennial(), params.initial.root_depth)
        };

        Self {
            organs,
            remobilised: Remobilised::default(),
            temperature_memory: ExtremeTemperatureMemory::default(),
            phenology: phen,
            root_depth,
            defoliated_fraction: 0.0,
            is_alive: true,
        }
    }

    /// Rebuild a state from its flat array representation.
    pub fn from_array(arr: &[f64], params: &Parameters) -> Result<Self> {
        let mut state = Self::initialize(params);
        state.load_slice(arr)?;
        Ok(state)
    }

    pub fn organ(&self, kind: OrganKind) -> &Organ {
        &self.organs[kind.index()]
    }

    pub fn organ_mut(&mut self, kind: OrganKind) -> &mut Organ {
        &mut self.organs[kind.index()]
    }

    pub fn snapshot(&self) -> PreviousDayState {
        PreviousDayState {
            organs: self.organs.clone(),
            remobilised: self.remobilised,
        }
    }

    pub fn dm_total(&self) -> f64 {
        self.organs.iter().map(Organ::dm_total).sum()
    }

    pub fn n_total(&self) -> f64 {
        self.organs.iter().map(Organ::n_total).sum()
    }

    pub fn dm_shoot_green(&self) -> f64 {
        shoot_sum(&self.organs, Organ::dm_green)
    }

    pub fn dm_shoot_dead(&self) -> f64 {
        shoot_sum(&self.organs, Organ::dm_dead)
    }

    pub fn dm_shoot(&self) -> f64 {
        shoot_sum(&self.organs, Organ::dm_total)
    }

    pub fn n_shoot(&self) -> f64 {
        shoot_sum(&self.organs, Organ::n_total)
    }

    pub fn dm_root(&self) -> f64 {
        self.organ(OrganKind::Root).dm_total()
    }

    pub fn storage_total(&self) -> f64 {
        self.organs.iter().map(|o| o.storage).sum()
    }

    /// Fail on any negative or non-finite pool.
    pub fn validate(&self) -> Result<()> {
        self.organs.iter().try_for_each(Organ::validate)
    }
}

fn initial_n_conc(organ: &Organ, stage: usize, params: &Parameters) -> f64 {
    if stage == TissueStage::Dead.index() {
        organ.n_min
    } else {
        organ.n_opt * params.nitrogen.stage_level(stage)
    }
}

fn shoot_sum(organs: &[Organ; N_ORGANS], f: fn(&Organ) -> f64) -> f64 {
    OrganKind::SHOOT.iter().map(|k| f(&organs[k.index()])).sum()
}

/// Immutable copy of the organ pools taken at the start of a day.
///
/// All of the day's turnover and remobilisation is computed against this
/// snapshot, never against pools already changed by that day's growth.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousDayState {
    organs: [Organ; N_ORGANS],
    remobilised: Remobilised,
}

impl PreviousDayState {
    pub fn organ(&self, kind: OrganKind) -> &Organ {
        &self.organs[kind.index()]
    }

    pub fn pool(&self, kind: OrganKind, stage: TissueStage) -> &TissuePool {
        self.organ(kind).pool(stage)
    }

    pub fn organs(&self) -> &[Organ; N_ORGANS] {
        &self.organs
    }

    pub fn remobilised(&self) -> Remobilised {
        self.remobilised
    }

    pub fn dm_root(&self) -> f64 {
        self.organ(OrganKind::Root).dm_total()
    }

    pub fn dm_shoot_green(&self) -> f64 {
        shoot_sum(&self.organs, Organ::dm_green)
    }

    pub fn dm_shoot(&self) -> f64 {
        shoot_sum(&self.organs, Organ::dm_total)
    }

    /// Sum of one stage's DM over the shoot organs.
    pub fn shoot_stage_dm(&self, stage: TissueStage) -> f64 {
        OrganKind::SHOOT
            .iter()
            .map(|&k| self.pool(k, stage).dm)
            .sum()
    }
}

impl ModelState for State {
    fn to_vec(&self) -> Vec<f64> {
        let mut arr = Vec::with_capacity(STATE_SIZE);
        for organ in &self.organs {
            for pool in &organ.pools {
                arr.push(pool.dm);
                arr.push(pool.n);
            }
        }
        arr.extend(self.organs.iter().map(|o| o.storage));
        arr.push(self.remobilised.carbon);
        arr.push(self.remobilised.nitrogen);
        let m = &self.temperature_memory;
        arr.extend([m.heat_effect, m.heat_accum, m.cold_effect, m.cold_accum]);
        arr.push(f64::from(self.phenology.stage.index()));
        arr.push(f64::from(self.phenology.days_since_emergence));
        arr.push(f64::from(self.phenology.days_since_anthesis));
        arr.push(self.root_depth);
        arr.push(self.defoliated_fraction);
        arr.push(if self.is_alive { 1.0 } else { 0.0 });
        arr
    }

    fn load_slice(&mut self, arr: &[f64]) -> Result<()> {
        if arr.len() != STATE_SIZE {
            return Err(PastureError::LengthMismatch {
                what: "state array".to_string(),
                expected: STATE_SIZE,
                actual: arr.len(),
            });
        }
        if arr.iter().any(|v| !v.is_finite()) {
            return Err(PastureError::InvalidConfig(
                "state array contains non-finite values".to_string(),
            ));
        }
        let mut i = 0;
        for organ in &mut self.organs {
            for stage in 0..N_STAGES {
                organ.pools[stage] = TissuePool::new(arr[i], arr[i + 1]);
                i += 2;
            }
        }
        for organ in &mut self.organs {
            organ.storage = arr[i];
            i += 1;
        }
        self.remobilised = Remobilised {
            carbon: arr[i],
            nitrogen: arr[i + 1],
        };
        i += 2;
        self.temperature_memory = ExtremeTemperatureMemory {
            heat_effect: arr[i],
            heat_accum: arr[i + 1],
            cold_effect: arr[i + 2],
            cold_accum: arr[i + 3],
        };
        i += 4;
        let stage = PhenoStage::from_index(arr[i].round() as u32).ok_or_else(|| {
            PastureError::InvalidConfig(format!("unknown phenological stage {}", arr[i]))
        })?;
        self.phenology = PhenologyState {
            stage,
            days_since_emergence: arr[i + 1].max(0.0).round() as u32,
            days_since_anthesis: arr[i + 2].max(0.0).round() as u32,
        };
        i += 3;
        self.root_depth = arr[i];
        self.defoliated_fraction = arr[i + 1];
        self.is_alive = arr[i + 2] > 0.5;
        self.validate()
    }

    fn array_len(&self) -> usize {
        STATE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -- Initialization --

    #[test]
    fn initial_dm_matches_parameters() {
        let p = Parameters::default();
        let s = State::initialize(&p);
        assert_relative_eq!(s.dm_shoot(), 2000.0, epsilon = 1e-9);
        assert_relative_eq!(s.dm_root(), 500.0, epsilon = 1e-12);
        assert_relative_eq!(s.dm_total(), 2500.0, epsilon = 1e-9);
        assert_relative_eq!(s.organ(OrganKind::Leaf).pools[0].dm, 300.0, epsilon = 1e-9);
        assert_eq!(s.organ(OrganKind::Stolon).dm_total(), 0.0);
        assert_eq!(s.organ(OrganKind::Reproductive).dm_total(), 0.0);
    }

    #[test]
    fn initial_n_follows_stage_levels() {
        let p = Parameters::default();
        let s = State::initialize(&p);
        let leaf = s.organ(OrganKind::Leaf);
        assert_relative_eq!(leaf.pools[0].n_conc(), 0.04, epsilon = 1e-12);
        assert_relative_eq!(leaf.pools[3].n_conc(), 0.012, epsilon = 1e-12);
        let root = s.organ(OrganKind::Root);
        assert_relative_eq!(root.pools[0].n_conc(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn perennial_keeps_initial_root_depth() {
        let s = State::initialize(&Parameters::default());
        assert_eq!(s.root_depth, 750.0);
        assert_eq!(s.phenology.stage, PhenoStage::Vegetative);
    }

    #[test]
    fn annual_starts_dormant_and_shallow() {
        let mut p = Parameters::default();
        p.species.is_annual = true;
        let s = State::initialize(&p);
        assert_eq!(s.phenology.stage, PhenoStage::Dormant);
        assert_eq!(s.root_depth, 50.0);
    }

    // -- Snapshot --

    #[test]
    fn snapshot_is_independent_of_later_changes() {
        let mut s = State::initialize(&Parameters::default());
        let prev = s.snapshot();
        s.organ_mut(OrganKind::Leaf).pools[0].add(100.0, 4.0);
        assert_relative_eq!(prev.pool(OrganKind::Leaf, TissueStage::Growing).dm, 300.0, epsilon = 1e-9);
        assert_relative_eq!(prev.dm_shoot(), 2000.0, epsilon = 1e-9);
    }

    // -- Flat array --

    #[test]
    fn flat_array_roundtrip() {
        let p = Parameters::default();
        let mut s = State::initialize(&p);
        s.remobilised = Remobilised {
            carbon: 1.5,
            nitrogen: 0.3,
        };
        s.temperature_memory.heat_effect = 0.6;
        s.organ_mut(OrganKind::Stem).storage = 12.0;
        let arr = s.to_vec();
        assert_eq!(arr.len(), STATE_SIZE);
        assert_eq!(s.array_len(), STATE_SIZE);
        let back = State::from_array(&arr, &p).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn flat_array_wrong_length() {
        let p = Parameters::default();
        assert!(matches!(
            State::from_array(&[0.0; 3], &p),
            Err(PastureError::LengthMismatch { expected: STATE_SIZE, actual: 3, .. })
        ));
    }

    #[test]
    fn flat_array_rejects_negative_pool() {
        let p = Parameters::default();
        let mut arr = State::initialize(&p).to_vec();
        arr[0] = -1.0;
        assert!(matches!(
            State::from_array(&arr, &p),
            Err(PastureError::NegativePool { organ: "leaf", stage: 0, .. })
        ));
    }
}
