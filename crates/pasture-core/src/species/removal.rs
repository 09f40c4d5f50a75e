//! Harvest and grazing of standing shoot.
//!
//! Removal takes green and dead material in proportion to what is removable
//! above the minimum standing amounts, weighted by preference. Every stage
//! of a standing organ loses the same fraction of its DM and N.
use std::str::FromStr;

use super::constants::{
    CARBON_FRACTION_IN_DM, CN_RATIO_CELL_WALL, CN_RATIO_PROTEIN, PROTEIN_DIGESTIBILITY, SUGAR_DIGESTIBILITY,
};
use super::params::Parameters;
use super::state::State;
use crate::error::{check_balance, divide, PastureError, Result};
use crate::tissue::{OrganKind, TissueStage};

/// Tolerance of the removed DM against the amount asked for [kg/ha].
const REMOVAL_TOLERANCE: f64 = 1e-5;

/// How much of the standing shoot to take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalSpec {
    /// Remove everything above a residual standing amount [kg/ha].
    SetResidueAmount(f64),
    /// Remove a given amount [kg/ha].
    SetRemoveAmount(f64),
}

impl RemovalSpec {
    /// Parse a method name such as "residue" or "remove" with its amount.
    pub fn parse(method: &str, amount: f64) -> Result<Self> {
        let method = RemovalMethod::from_str(method)?;
        Ok(match method {
            RemovalMethod::Residue => RemovalSpec::SetResidueAmount(amount),
            RemovalMethod::Remove => RemovalSpec::SetRemoveAmount(amount),
        })
    }
}

enum RemovalMethod {
    Residue,
    Remove,
}

impl FromStr for RemovalMethod {
    type Err = PastureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "setresidueamount" | "residue" => Ok(RemovalMethod::Residue),
            "setremoveamount" | "remove" => Ok(RemovalMethod::Remove),
            _ => Err(PastureError::UnknownMethod {
                kind: "removal method",
                value: s.to_string(),
            }),
        }
    }
}

/// Live or dead part of an organ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TissueGroup {
    Green,
    Dead,
}

impl TissueGroup {
    fn stages(self) -> &'static [TissueStage] {
        match self {
            TissueGroup::Green => &TissueStage::LIVE,
            TissueGroup::Dead => &[TissueStage::Dead],
        }
    }
}

/// What a removal took from the plant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Removed {
    pub dm: f64,
    pub n: f64,
    /// Digestibility of the removed herbage [0-1].
    pub digestibility: f64,
}

fn standing(state: &State, group: TissueGroup) -> f64 {
    OrganKind::SHOOT
        .iter()
        .filter(|k| k.is_standing())
        .map(|&k| {
            let organ = state.organ(k);
            match group {
                TissueGroup::Green => organ.dm_green(),
                TissueGroup::Dead => organ.dm_dead(),
            }
        })
        .sum()
}

/// Standing DM that can be removed above the minimum amounts [kg/ha].
pub fn harvestable(state: &State, params: &Parameters) -> (f64, f64) {
    let green = (standing(state, TissueGroup::Green) - params.turnover.min_green).max(0.0);
    let dead = (standing(state, TissueGroup::Dead) - params.turnover.min_dead).max(0.0);
    (green, dead)
}

/// Digestibility of the standing herbage.
///
/// Live tissue is split into sugar, protein and cell wall from its C:N
/// ratio; `recent_growth` is the sugar-rich new tissue of the last day.
/// Dead tissue holds protein and cell wall only.
pub fn herbage_digestibility(state: &State, recent_growth: f64, params: &Parameters) -> f64 {
    let standing_total: f64 = [OrganKind::Leaf, OrganKind::Stem]
        .iter()
        .map(|&k| state.organ(k).dm_total())
        .sum();
    if standing_total <= 0.0 {
        return 0.0;
    }
    let wall_ratio = CN_RATIO_CELL_WALL / CN_RATIO_PROTEIN;
    let green_dm = state.dm_shoot_green();
    let green_n: f64 = OrganKind::SHOOT.iter().map(|&k| state.organ(k).n_green()).sum();
    let sugar = 0.5 * divide(recent_growth, green_dm, 0.0);

    let live = if green_dm > 0.0 && green_n > 0.0 {
        let cn = green_dm * CARBON_FRACTION_IN_DM / green_n;
        let protein = (CN_RATIO_CELL_WALL / cn - (1.0 - sugar)) / (wall_ratio - 1.0);
        let wall = 1.0 - sugar - protein;
        SUGAR_DIGESTIBILITY * sugar + PROTEIN_DIGESTIBILITY * protein + params.removal.digestibility_live * wall
    } else {
        0.0
    };

    let dead_dm: f64 = [OrganKind::Leaf, OrganKind::Stem]
        .iter()
        .map(|&k| state.organ(k).dm_dead())
        .sum();
    let dead_n: f64 = [OrganKind::Leaf, OrganKind::Stem]
        .iter()
        .map(|&k| state.organ(k).pool(TissueStage::Dead).n)
        .sum();
    let dead = if dead_dm > 0.0 && dead_n > 0.0 {
        let cn = dead_dm * CARBON_FRACTION_IN_DM / dead_n;
        let protein = (CN_RATIO_CELL_WALL / cn - 1.0) / (wall_ratio - 1.0);
        PROTEIN_DIGESTIBILITY * protein + params.removal.digestibility_dead * (1.0 - protein)
    } else {
        0.0
    };

    let dead_fraction = divide(dead_dm, standing_total, 0.0);
    ((1.0 - dead_fraction) * live + dead_fraction * dead).clamp(0.0, 1.0)
}

/// Remove standing herbage.
///
/// The plant's remobilised C and N shrink with its green shoot. The share
/// of shoot removed is stored on the state, where it raises the next day's
/// stolon turnover.
pub fn remove(state: &mut State, spec: RemovalSpec, recent_growth: f64, params: &Parameters) -> Result<Removed> {
    if !state.is_alive {
        return Err(PastureError::PlantNotAlive("removal"));
    }
    let (green_avail, dead_avail) = harvestable(state, params);
    let harvestable_total = green_avail + dead_avail;
    let standing_green = standing(state, TissueGroup::Green);
    let standing_dead = standing(state, TissueGroup::Dead);
    let required = match spec {
        RemovalSpec::SetResidueAmount(residue) => (standing_green + standing_dead - residue).max(0.0),
        RemovalSpec::SetRemoveAmount(amount) => amount.max(0.0),
    };
    let amount = required.min(harvestable_total);
    if amount <= 0.0 || harvestable_total <= 0.0 {
        return Ok(Removed::default());
    }

    let r = &params.removal;
    let pref_green = r.preference_green + r.preference_dead * amount / harvestable_total;
    let pref_dead = r.preference_dead + r.preference_green * amount / harvestable_total;
    let weights = green_avail * pref_green + dead_avail * pref_dead;
    let green_removed = amount * divide(green_avail * pref_green, weights, 0.0);
    let dead_removed = amount * divide(dead_avail * pref_dead, weights, 0.0);
    let green_fraction = divide(green_removed, standing_green, 0.0).clamp(0.0, 1.0);
    let dead_fraction = divide(dead_removed, standing_dead, 0.0).clamp(0.0, 1.0);

    let digestibility = herbage_digestibility(state, recent_growth, params);
    let shoot_before = state.dm_shoot();
    let mut removed = Removed {
        digestibility,
        ..Removed::default()
    };
    for kind in OrganKind::SHOOT.into_iter().filter(|k| k.is_standing()) {
        let (dm, n) = remove_group(state, kind, TissueGroup::Green, green_fraction);
        removed.dm += dm;
        removed.n += n;
        let (dm, n) = remove_group(state, kind, TissueGroup::Dead, dead_fraction);
        removed.dm += dm;
        removed.n += n;
    }
    state.remobilised.carbon *= 1.0 - green_fraction;
    state.remobilised.nitrogen *= 1.0 - green_fraction;
    state.defoliated_fraction = divide(removed.dm, shoot_before, 0.0).clamp(0.0, 1.0);
    check_balance("herbage removal", amount, removed.dm, REMOVAL_TOLERANCE)?;
    tracing::info!(dm = removed.dm, n = removed.n, digestibility, "herbage removed");
    Ok(removed)
}

fn remove_group(state: &mut State, kind: OrganKind, group: TissueGroup, fraction: f64) -> (f64, f64) {
    let organ = state.organ_mut(kind);
    let mut out = (0.0, 0.0);
    for &stage in group.stages() {
        let (dm, n) = organ.pool_mut(stage).remove_fraction(fraction);
        out.0 += dm;
        out.1 += n;
    }
    if group == TissueGroup::Green {
        organ.storage *= 1.0 - fraction.clamp(0.0, 1.0);
    }
    out
}

/// Remove a fraction of the green or dead part of one organ.
pub fn remove_fraction(state: &mut State, kind: OrganKind, group: TissueGroup, fraction: f64) -> Result<Removed> {
    if !state.is_alive {
        return Err(PastureError::PlantNotAlive("removal"));
    }
    if !(0.0..=1.0).contains(&fraction) {
        return Err(PastureError::InvalidConfig(format!(
            "removal fraction {fraction} outside [0, 1]"
        )));
    }
    let shoot_before = state.dm_shoot();
    let (dm, n) = remove_group(state, kind, group, fraction);
    if !kind.is_rooted() {
        state.defoliated_fraction = (state.defoliated_fraction + divide(dm, shoot_before, 0.0)).clamp(0.0, 1.0);
    }
    tracing::info!(organ = kind.name(), dm, n, "tissue removed");
    Ok(Removed {
        dm,
        n,
        digestibility: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setup() -> (State, Parameters) {
        let params = Parameters::default();
        (State::initialize(&params), params)
    }

    // -- Amounts --

    #[test]
    fn harvestable_respects_minimum_green() {
        let (state, params) = setup();
        let (green, dead) = harvestable(&state, &params);
        // standing green 1800 (leaf and stem), dead 200
        assert_relative_eq!(green, 1500.0, epsilon = 1e-9);
        assert_relative_eq!(dead, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn remove_amount_is_exact() {
        let (mut state, params) = setup();
        let before = state.dm_total();
        let removed = remove(&mut state, RemovalSpec::SetRemoveAmount(500.0), 0.0, &params).unwrap();
        assert_relative_eq!(removed.dm, 500.0, epsilon = 1e-6);
        assert_relative_eq!(before - state.dm_total(), 500.0, epsilon = 1e-6);
        assert_relative_eq!(state.defoliated_fraction, 0.25, epsilon = 1e-9);
        assert!(removed.n > 0.0);
    }

    #[test]
    fn residue_amount_capped_by_harvestable() {
        let (mut state, params) = setup();
        let removed = remove(&mut state, RemovalSpec::SetResidueAmount(0.0), 0.0, &params).unwrap();
        assert_relative_eq!(removed.dm, 1700.0, epsilon = 1e-6);
        assert_relative_eq!(standing(&state, TissueGroup::Green), 300.0, epsilon = 1e-6);
    }

    #[test]
    fn nothing_removable_is_a_no_op() {
        let (mut state, mut params) = setup();
        params.turnover.min_green = 5000.0;
        params.turnover.min_dead = 5000.0;
        let before = state.clone();
        let removed = remove(&mut state, RemovalSpec::SetRemoveAmount(100.0), 0.0, &params).unwrap();
        assert_eq!(removed, Removed::default());
        assert_eq!(state, before);
    }

    #[test]
    fn dead_plant_cannot_be_grazed() {
        let (mut state, params) = setup();
        state.is_alive = false;
        assert!(matches!(
            remove(&mut state, RemovalSpec::SetRemoveAmount(10.0), 0.0, &params),
            Err(PastureError::PlantNotAlive(_))
        ));
    }

    #[test]
    fn method_names() {
        assert_eq!(
            RemovalSpec::parse("SetResidueAmount", 1200.0).unwrap(),
            RemovalSpec::SetResidueAmount(1200.0)
        );
        assert!(matches!(
            RemovalSpec::parse("mow", 1.0),
            Err(PastureError::UnknownMethod { .. })
        ));
    }

    // -- Fractions --

    #[test]
    fn remove_fraction_of_dead_leaves() {
        let (mut state, _) = setup();
        let dead = state.organ(OrganKind::Leaf).dm_dead();
        let removed = remove_fraction(&mut state, OrganKind::Leaf, TissueGroup::Dead, 0.5).unwrap();
        assert_relative_eq!(removed.dm, 0.5 * dead, epsilon = 1e-9);
        assert_relative_eq!(state.organ(OrganKind::Leaf).dm_dead(), 0.5 * dead, epsilon = 1e-9);
        assert!(remove_fraction(&mut state, OrganKind::Leaf, TissueGroup::Dead, 1.5).is_err());
    }

    // -- Digestibility --

    #[test]
    fn digestibility_is_a_fraction() {
        let (state, params) = setup();
        let d = herbage_digestibility(&state, 50.0, &params);
        assert!(d > 0.0 && d <= 1.0, "digestibility {d}");
        let fresh = herbage_digestibility(&state, 200.0, &params);
        assert!(fresh > d);
    }

    #[test]
    fn dead_herbage_digestibility_from_protein_share() {
        let (mut state, params) = setup();
        for kind in [OrganKind::Leaf, OrganKind::Stem] {
            state.organ_mut(kind).kill(1.0);
        }
        let dead_dm = state.organ(OrganKind::Leaf).dm_dead() + state.organ(OrganKind::Stem).dm_dead();
        let dead_n = state.organ(OrganKind::Leaf).pool(TissueStage::Dead).n
            + state.organ(OrganKind::Stem).pool(TissueStage::Dead).n;
        let cn = dead_dm * CARBON_FRACTION_IN_DM / dead_n;
        let protein = (CN_RATIO_CELL_WALL / cn - 1.0) / (CN_RATIO_CELL_WALL / CN_RATIO_PROTEIN - 1.0);
        let expected = PROTEIN_DIGESTIBILITY * protein + params.removal.digestibility_dead * (1.0 - protein);
        let d = herbage_digestibility(&state, 0.0, &params);
        assert_relative_eq!(d, expected.clamp(0.0, 1.0), epsilon = 1e-12);
        assert!(d > params.removal.digestibility_dead);
    }
}
