/// Per-organ DM and N demand, N fixation and the soil N demand.
///
/// Demand is set from the water-limited growth of the day and the
/// partition fractions, so it must be computed after the stress factors.
use super::arbitrator::PartitionFractions;
use super::constants::{CONSERVATION_TOLERANCE, N_ORGANS};
use super::params::{AllocationParams, NitrogenParams};
use super::state::PreviousDayState;
use crate::error::{divide, PastureError, Result};
use crate::tissue::{Organ, OrganKind, OrganPhase};

/// Below this ratio of soil supply to demand, legumes fix more.
const FIXATION_STRESS_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganDemand {
    pub kind: OrganKind,
    /// Structural DM [kg/ha].
    pub structural: f64,
    /// Metabolic DM [kg/ha].
    pub metabolic: f64,
    /// Non-structural reserve DM [kg/ha].
    pub storage: f64,
    /// N for new tissue at optimum concentration [kg/ha].
    pub n_optimum: f64,
    /// N for new tissue at maximum concentration [kg/ha].
    pub n_luxury: f64,
}

impl OrganDemand {
    pub fn none(kind: OrganKind) -> Self {
        Self {
            kind,
            structural: 0.0,
            metabolic: 0.0,
            storage: 0.0,
            n_optimum: 0.0,
            n_luxury: 0.0,
        }
    }

    /// DM demand for new tissue, excluding storage.
    pub fn growth(&self) -> f64 {
        self.structural + self.metabolic
    }

    pub fn dm(&self) -> f64 {
        self.growth() + self.storage
    }
}

/// Demand of every organ of the plant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantDemand {
    pub organs: [OrganDemand; N_ORGANS],
}

impl PlantDemand {
    pub fn organ(&self, kind: OrganKind) -> &OrganDemand {
        &self.organs[kind.index()]
    }

    pub fn growth(&self) -> f64 {
        self.organs.iter().map(OrganDemand::growth).sum()
    }

    pub fn storage(&self) -> f64 {
        self.organs.iter().map(|d| d.storage).sum()
    }

    pub fn n_optimum(&self) -> f64 {
        self.organs.iter().map(|d| d.n_optimum).sum()
    }

    pub fn n_luxury(&self) -> f64 {
        self.organs.iter().map(|d| d.n_luxury).sum()
    }
}

/// Demand of one organ for its share of the day's growth.
///
/// `organ` is the organ as it stood at the start of the day. Structural and
/// metabolic demand exist only while the organ is growing or mature; storage
/// demand tops the reserve up to `storage_fraction` of the young tissue plus
/// the incoming growth, and is zero once the organ senesces.
pub fn organ_demand(
    organ: &Organ,
    growth: f64,
    fraction: f64,
    allocation: &AllocationParams,
    co2_n_factor: f64,
    plant_growing: bool,
) -> Result<OrganDemand> {
    let kind = organ.kind;
    let phase = organ.phase(plant_growing);
    let mut demand = OrganDemand::none(kind);
    if kind.computes_demand(phase) {
        let total = growth * fraction;
        if total < 0.0 || !total.is_finite() {
            tracing::error!(organ = kind.name(), value = total, "negative DM demand");
            return Err(PastureError::NegativeDemand {
                organ: kind.name(),
                value: total,
            });
        }
        demand.structural = total * allocation.structural_fraction;
        demand.metabolic = total * (1.0 - allocation.structural_fraction);
        demand.n_optimum = total * organ.n_opt * co2_n_factor;
        demand.n_luxury = total * organ.n_max;
    }
    if !matches!(phase, OrganPhase::Senescing | OrganPhase::Dead) {
        let functional = (organ.dm_young() - organ.storage).max(0.0);
        let target = allocation.storage_fraction * (demand.growth() + functional);
        demand.storage = (target - organ.storage).max(0.0);
    }
    Ok(demand)
}

/// Demand of all organs for a day with water-limited growth `growth`.
pub fn plant_demand(
    prev: &PreviousDayState,
    growth: f64,
    fractions: &PartitionFractions,
    allocation: &AllocationParams,
    co2_n_factor: f64,
    plant_growing: bool,
) -> Result<PlantDemand> {
    let mut organs = OrganKind::ALL.map(OrganDemand::none);
    for kind in OrganKind::ALL {
        organs[kind.index()] = organ_demand(
            prev.organ(kind),
            growth,
            fractions.get(kind),
            allocation,
            co2_n_factor,
            plant_growing,
        )?;
    }
    Ok(PlantDemand { organs })
}

/// N fixed from the atmosphere [kg/ha].
///
/// Legumes fix `min_fixation` of their luxury demand, rising towards
/// `max_fixation` as the soil becomes unable to cover the rest.
pub fn n_fixation(is_legume: bool, nitrogen: &NitrogenParams, n_luxury: f64, soil_available: f64) -> f64 {
    if !is_legume || n_luxury <= 0.0 {
        return 0.0;
    }
    let initial = nitrogen.min_fixation * n_luxury;
    let supply_ratio = if n_luxury > soil_available + initial {
        divide(soil_available, n_luxury - initial, 1.0)
    } else {
        1.0
    };
    let fraction = if supply_ratio < FIXATION_STRESS_THRESHOLD {
        nitrogen.max_fixation - (nitrogen.max_fixation - nitrogen.min_fixation) * supply_ratio
    } else {
        nitrogen.min_fixation
    };
    fraction.max(0.0) * n_luxury
}

/// Draw-down of the day's N demand: fixation first, then N reallocated from
/// yesterday's senescence, then the soil.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NitrogenBudget {
    pub fixation: f64,
    /// Remobilised N used for new growth.
    pub reallocated: f64,
    /// Remobilised N left over after new growth.
    pub remobilised_left: f64,
    pub soil_demand: f64,
}

pub fn soil_n_demand(demand: f64, fixation: f64, remobilised: f64) -> Result<NitrogenBudget> {
    if demand < 0.0 || !demand.is_finite() {
        tracing::error!(value = demand, "negative plant N demand");
        return Err(PastureError::NegativeDemand {
            organ: "plant",
            value: demand,
        });
    }
    let remobilised = remobilised.max(0.0);
    let budget = if fixation - demand > -CONSERVATION_TOLERANCE {
        NitrogenBudget {
            fixation: demand,
            reallocated: 0.0,
            remobilised_left: remobilised,
            soil_demand: 0.0,
        }
    } else if fixation + remobilised - demand > -CONSERVATION_TOLERANCE {
        let reallocated = (demand - fixation).clamp(0.0, remobilised);
        NitrogenBudget {
            fixation,
            reallocated,
            remobilised_left: remobilised - reallocated,
            soil_demand: 0.0,
        }
    } else {
        NitrogenBudget {
            fixation,
            reallocated: remobilised,
            remobilised_left: 0.0,
            soil_demand: demand - fixation - remobilised,
        }
    };
    Ok(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::params::Parameters;
    use crate::species::state::State;
    use crate::tissue::TissuePool;
    use approx::assert_relative_eq;

    fn leaf(dm: [f64; 4]) -> Organ {
        let mut organ = Organ::new(OrganKind::Leaf, 0.04, 0.05, 0.012);
        for (i, &d) in dm.iter().enumerate() {
            organ.pools[i] = TissuePool::new(d, d * 0.04);
        }
        organ
    }

    fn allocation() -> AllocationParams {
        AllocationParams {
            structural_fraction: 0.6,
            storage_fraction: 0.1,
            ..AllocationParams::default()
        }
    }

    // -- Organ demand --

    #[test]
    fn structural_and_metabolic_split() {
        let d = organ_demand(&leaf([100.0, 50.0, 0.0, 0.0]), 50.0, 0.4, &allocation(), 1.0, true).unwrap();
        assert_relative_eq!(d.structural, 12.0, epsilon = 1e-10);
        assert_relative_eq!(d.metabolic, 8.0, epsilon = 1e-10);
        assert_relative_eq!(d.n_optimum, 20.0 * 0.04, epsilon = 1e-12);
        assert_relative_eq!(d.n_luxury, 20.0 * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn storage_tops_up_reserve() {
        let mut organ = leaf([100.0, 50.0, 0.0, 0.0]);
        organ.storage = 5.0;
        let d = organ_demand(&organ, 50.0, 0.4, &allocation(), 1.0, true).unwrap();
        // 0.1 * (20 + 145) - 5
        assert_relative_eq!(d.storage, 11.5, epsilon = 1e-10);
    }

    #[test]
    fn elevated_co2_lowers_only_optimum_demand() {
        let d = organ_demand(&leaf([100.0, 50.0, 0.0, 0.0]), 50.0, 0.4, &allocation(), 0.8, true).unwrap();
        assert_relative_eq!(d.n_optimum, 20.0 * 0.04 * 0.8, epsilon = 1e-12);
        assert_relative_eq!(d.n_luxury, 20.0 * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn senescing_organ_has_no_demand() {
        let d = organ_demand(&leaf([100.0, 50.0, 20.0, 0.0]), 50.0, 0.4, &allocation(), 1.0, false).unwrap();
        assert_eq!(d.dm(), 0.0);
        assert_eq!(d.n_luxury, 0.0);
    }

    #[test]
    fn negative_demand_is_fatal() {
        let err = organ_demand(&leaf([100.0, 50.0, 0.0, 0.0]), -5.0, 0.4, &allocation(), 1.0, true).unwrap_err();
        assert!(matches!(err, PastureError::NegativeDemand { organ: "leaf", .. }));
    }

    #[test]
    fn plant_demand_sums_organs() {
        let params = Parameters::default();
        let prev = State::initialize(&params).snapshot();
        let fractions = PartitionFractions::new([0.6, 0.15, 0.0, 0.25, 0.0]);
        let d = plant_demand(&prev, 40.0, &fractions, &params.allocation, 1.0, true).unwrap();
        assert_relative_eq!(d.growth(), 40.0, epsilon = 1e-10);
        let expected = 40.0 * (0.6 * 0.04 + 0.15 * 0.02 + 0.25 * 0.02);
        assert_relative_eq!(d.n_optimum(), expected, epsilon = 1e-10);
        assert_eq!(d.storage(), 0.0);
    }

    // -- Fixation --

    #[test]
    fn grasses_do_not_fix() {
        let n = NitrogenParams {
            min_fixation: 0.2,
            max_fixation: 0.6,
            ..NitrogenParams::default()
        };
        assert_eq!(n_fixation(false, &n, 10.0, 0.0), 0.0);
    }

    #[test]
    fn legume_fixation_rises_when_soil_is_short() {
        let n = NitrogenParams {
            min_fixation: 0.2,
            max_fixation: 0.6,
            ..NitrogenParams::default()
        };
        // plenty of soil N: minimum fixation
        assert_relative_eq!(n_fixation(true, &n, 10.0, 100.0), 2.0, epsilon = 1e-12);
        // no soil N: maximum fixation
        assert_relative_eq!(n_fixation(true, &n, 10.0, 0.0), 6.0, epsilon = 1e-12);
        // soil covers half of what fixation leaves
        assert_relative_eq!(n_fixation(true, &n, 10.0, 4.0), (0.6 - 0.4 * 0.5) * 10.0, epsilon = 1e-12);
    }

    // -- Soil N demand --

    #[test]
    fn soil_demand_after_fixation_and_remobilisation() {
        let b = soil_n_demand(10.0, 3.0, 2.0).unwrap();
        assert_eq!(b.soil_demand, 5.0);
        assert_eq!(b.reallocated, 2.0);
        assert_eq!(b.remobilised_left, 0.0);
    }

    #[test]
    fn remobilised_n_covers_the_rest() {
        let b = soil_n_demand(10.0, 3.0, 9.0).unwrap();
        assert_eq!(b.soil_demand, 0.0);
        assert_relative_eq!(b.reallocated, 7.0, epsilon = 1e-12);
        assert_relative_eq!(b.remobilised_left, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn fixation_alone_is_capped_at_demand() {
        let b = soil_n_demand(4.0, 5.0, 1.0).unwrap();
        assert_eq!(b.fixation, 4.0);
        assert_eq!(b.reallocated, 0.0);
        assert_eq!(b.remobilised_left, 1.0);
    }

    #[test]
    fn negative_plant_demand_is_fatal() {
        assert!(matches!(
            soil_n_demand(-1.0, 0.0, 0.0),
            Err(PastureError::NegativeDemand { organ: "plant", .. })
        ));
    }
}
