/// Phenology of annual species and the root depth that follows it.
///
/// Perennials stay vegetative for their whole life and keep their root depth.
use super::constants::ESTABLISHMENT_DAYS;
use super::params::{PhenologyParams, RootParams};
use crate::error::divide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhenoStage {
    /// Before emergence or after maturity; no growth.
    #[default]
    Dormant = 0,
    Vegetative = 1,
    Reproductive = 2,
}

impl PhenoStage {
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Stage from its index in the flat state array.
    pub fn from_index(i: u32) -> Option<Self> {
        match i {
            0 => Some(PhenoStage::Dormant),
            1 => Some(PhenoStage::Vegetative),
            2 => Some(PhenoStage::Reproductive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhenologyState {
    pub stage: PhenoStage,
    pub days_since_emergence: u32,
    pub days_since_anthesis: u32,
}

impl PhenologyState {
    pub fn perennial() -> Self {
        Self {
            stage: PhenoStage::Vegetative,
            days_since_emergence: 0,
            days_since_anthesis: 0,
        }
    }

    pub fn is_growing(&self) -> bool {
        self.stage != PhenoStage::Dormant
    }
}

/// Move an annual one day forward.
///
/// Emergence happens on the first day inside [emergence, anthesis), anthesis
/// on the first vegetative day at or past the anthesis date, and the plant
/// goes dormant again `days_to_mature` days later.
pub fn advance(state: &PhenologyState, day_of_year: u32, params: &PhenologyParams) -> PhenologyState {
    let mut next = *state;
    match state.stage {
        PhenoStage::Dormant => {
            if day_of_year >= params.doy_emergence && day_of_year < params.doy_anthesis {
                next = PhenologyState {
                    stage: PhenoStage::Vegetative,
                    days_since_emergence: 0,
                    days_since_anthesis: 0,
                };
            }
        }
        PhenoStage::Vegetative => {
            next.days_since_emergence += 1;
            if day_of_year >= params.doy_anthesis {
                next.stage = PhenoStage::Reproductive;
                next.days_since_anthesis = 0;
            }
        }
        PhenoStage::Reproductive => {
            next.days_since_anthesis += 1;
            if next.days_since_anthesis >= params.days_to_mature {
                next = PhenologyState::default();
            }
        }
    }
    next
}

/// Reduction of potential growth for annuals [0-1].
pub fn growth_reduction(state: &PhenologyState, params: &PhenologyParams) -> f64 {
    match state.stage {
        PhenoStage::Dormant => 0.0,
        PhenoStage::Vegetative if state.days_since_emergence < ESTABLISHMENT_DAYS => {
            0.5 + 0.5 * f64::from(state.days_since_emergence) / f64::from(ESTABLISHMENT_DAYS)
        }
        PhenoStage::Vegetative => 1.0,
        PhenoStage::Reproductive => (1.0
            - divide(
                f64::from(state.days_since_anthesis),
                f64::from(params.days_to_mature),
                1.0,
            ))
        .clamp(0.0, 1.0),
    }
}

/// Days from emergence to anthesis.
pub fn vegetative_days(params: &PhenologyParams) -> u32 {
    params.doy_anthesis.saturating_sub(params.doy_emergence)
}

/// Root depth of an annual [mm], growing linearly from emergence to anthesis.
pub fn root_depth(state: &PhenologyState, phenology: &PhenologyParams, roots: &RootParams) -> f64 {
    let span = roots.max_depth - roots.depth_at_emergence;
    match state.stage {
        PhenoStage::Dormant => roots.depth_at_emergence,
        PhenoStage::Vegetative => {
            let progress = divide(
                f64::from(state.days_since_emergence),
                f64::from(vegetative_days(phenology)),
                1.0,
            )
            .min(1.0);
            roots.depth_at_emergence + span * progress
        }
        PhenoStage::Reproductive => roots.max_depth,
    }
}

/// Scaling of the live turnover rates of annuals with their development.
///
/// Returns the adjusted shoot rate for `gamma` and the factor on root
/// senescence. Young plants age slowly; ripening plants age fast.
pub fn annual_turnover(state: &PhenologyState, params: &PhenologyParams, gamma: f64) -> (f64, f64) {
    match state.stage {
        PhenoStage::Vegetative => {
            let f = divide(
                f64::from(state.days_since_emergence),
                f64::from(vegetative_days(params)),
                1.0,
            );
            (gamma * f, f)
        }
        PhenoStage::Reproductive => {
            let progress = divide(
                f64::from(state.days_since_anthesis),
                f64::from(params.days_to_mature),
                1.0,
            );
            (1.0 - (1.0 - gamma) * (1.0 - progress * progress), 1.0)
        }
        PhenoStage::Dormant => (gamma, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> PhenologyParams {
        PhenologyParams {
            doy_emergence: 100,
            doy_anthesis: 200,
            days_to_mature: 50,
        }
    }

    fn run_to(doy_end: u32) -> PhenologyState {
        let p = params();
        let mut s = PhenologyState::default();
        for doy in 1..=doy_end {
            s = advance(&s, doy, &p);
        }
        s
    }

    // -- Stage transitions --

    #[test]
    fn dormant_before_emergence() {
        assert_eq!(run_to(99).stage, PhenoStage::Dormant);
    }

    #[test]
    fn emerges_on_emergence_day() {
        let s = run_to(100);
        assert_eq!(s.stage, PhenoStage::Vegetative);
        assert_eq!(s.days_since_emergence, 0);
        assert_eq!(run_to(130).days_since_emergence, 30);
    }

    #[test]
    fn flowers_on_anthesis_day() {
        let s = run_to(200);
        assert_eq!(s.stage, PhenoStage::Reproductive);
        assert_eq!(s.days_since_anthesis, 0);
    }

    #[test]
    fn matures_after_days_to_mature() {
        assert_eq!(run_to(249).stage, PhenoStage::Reproductive);
        assert_eq!(run_to(250).stage, PhenoStage::Dormant);
        assert_eq!(run_to(300), PhenologyState::default());
    }

    #[test]
    fn stage_index_roundtrip() {
        for stage in [PhenoStage::Dormant, PhenoStage::Vegetative, PhenoStage::Reproductive] {
            assert_eq!(PhenoStage::from_index(stage.index()), Some(stage));
        }
        assert_eq!(PhenoStage::from_index(3), None);
    }

    // -- Growth reduction --

    #[test]
    fn reduction_ramps_up_after_emergence() {
        let p = params();
        let s = PhenologyState {
            stage: PhenoStage::Vegetative,
            days_since_emergence: 30,
            days_since_anthesis: 0,
        };
        assert_relative_eq!(growth_reduction(&s, &p), 0.75, epsilon = 1e-12);
        let later = PhenologyState {
            days_since_emergence: 80,
            ..s
        };
        assert_eq!(growth_reduction(&later, &p), 1.0);
    }

    #[test]
    fn reduction_declines_to_maturity() {
        let p = params();
        let s = PhenologyState {
            stage: PhenoStage::Reproductive,
            days_since_emergence: 100,
            days_since_anthesis: 10,
        };
        assert_relative_eq!(growth_reduction(&s, &p), 0.8, epsilon = 1e-12);
        assert_eq!(growth_reduction(&PhenologyState::default(), &p), 0.0);
    }

    // -- Root depth --

    #[test]
    fn root_depth_grows_linearly() {
        let p = params();
        let roots = RootParams::default();
        let s = PhenologyState {
            stage: PhenoStage::Vegetative,
            days_since_emergence: 50,
            days_since_anthesis: 0,
        };
        assert_relative_eq!(root_depth(&s, &p, &roots), 50.0 + 850.0 * 0.5, epsilon = 1e-10);
        assert_eq!(root_depth(&PhenologyState::default(), &p, &roots), 50.0);
        let flowering = PhenologyState {
            stage: PhenoStage::Reproductive,
            ..s
        };
        assert_eq!(root_depth(&flowering, &p, &roots), 900.0);
    }

    // -- Turnover --

    #[test]
    fn reproductive_turnover_accelerates() {
        let p = params();
        let s = PhenologyState {
            stage: PhenoStage::Reproductive,
            days_since_emergence: 100,
            days_since_anthesis: 25,
        };
        let (gamma, _) = annual_turnover(&s, &p, 0.1);
        assert_relative_eq!(gamma, 1.0 - 0.9 * 0.75, epsilon = 1e-12);
    }
}
