/// Pasture species numerical constants and parameter bounds.
///
/// Fixed physiological values shared by every species, plus the calibration
/// ranges checked when parameters are loaded.
use crate::tissue::{N_STAGES, OrganKind};

// -- Composition --

/// Carbon content of plant dry matter [kg C/kg DM].
pub const CARBON_FRACTION_IN_DM: f64 = 0.4;

/// C:N ratio of protein, used to convert remobilised N into DM.
pub const CN_RATIO_PROTEIN: f64 = 3.5;

// -- Photosynthesis --

/// Photosynthetic efficiency [mg CO2/J].
pub const PHOTOSYNTHETIC_EFFICIENCY: f64 = 0.01;

/// Curvature of the non-rectangular light response.
pub const PHOTOSYNTHESIS_CURVATURE: f64 = 0.8;

/// Stolon area counted as leaf area, relative to leaves.
pub const STOLON_LEAF_AREA_FACTOR: f64 = 0.3;

/// Below this shoot green DM [kg/ha] stems of non-legumes contribute to LAI.
pub const STEM_LAI_THRESHOLD: f64 = 1000.0;

/// Scale of the shoot DM deficit below the threshold in the stem LAI term
/// [kg/ha].
pub const STEM_LAI_SCALE: f64 = 10_000.0;

/// Cell-wall C:N ratio, used to split DM into digestible fractions.
pub const CN_RATIO_CELL_WALL: f64 = 100.0;

/// Digestibility of sugars [-].
pub const SUGAR_DIGESTIBILITY: f64 = 1.0;

/// Digestibility of protein [-].
pub const PROTEIN_DIGESTIBILITY: f64 = 1.0;

// -- Tolerances --

/// Tolerance on fractions that must sum to one.
pub const PARTITION_TOLERANCE: f64 = 1e-4;

/// Tolerance on allocated versus consumed supply [kg/ha].
pub const CONSERVATION_TOLERANCE: f64 = 1e-4;

/// Slack allowed when an allocation is compared with its bound.
pub const ALLOCATION_SLACK: f64 = 1e-9;

/// Relative tolerance of the daily organ DM balance.
pub const DAILY_BALANCE_TOLERANCE: f64 = 1e-6;

/// Root DM below this [kg/ha] disables shoot:root targeting.
pub const MIN_ROOT_DM: f64 = 1e-5;

// -- Annual phenology --

/// Days after emergence over which growth ramps up to full rate.
pub const ESTABLISHMENT_DAYS: u32 = 60;

// -- Initial DM fractions --

/// Fractions of initial shoot DM per organ and stage, in the order leaf
/// 0-3, stem 0-3, stolon 0-2.
pub const GRASS_DM_FRACTIONS: [f64; 11] = [
    0.15, 0.25, 0.25, 0.05, 0.05, 0.10, 0.10, 0.05, 0.0, 0.0, 0.0,
];

pub const LEGUME_DM_FRACTIONS: [f64; 11] = [
    0.20, 0.25, 0.25, 0.00, 0.02, 0.04, 0.04, 0.00, 0.06, 0.12, 0.12,
];

/// Organs and stages addressed by the initial DM fractions.
pub const DM_FRACTION_SLOTS: [(OrganKind, usize); 11] = [
    (OrganKind::Leaf, 0),
    (OrganKind::Leaf, 1),
    (OrganKind::Leaf, 2),
    (OrganKind::Leaf, 3),
    (OrganKind::Stem, 0),
    (OrganKind::Stem, 1),
    (OrganKind::Stem, 2),
    (OrganKind::Stem, 3),
    (OrganKind::Stolon, 0),
    (OrganKind::Stolon, 1),
    (OrganKind::Stolon, 2),
];

// -- Model contract constants --

/// Number of organs held by every plant.
pub const N_ORGANS: usize = 5;

/// Elements of the flat state array.
///
/// Layout: organ pools (dm, n) by organ then stage, organ storage,
/// remobilised C and N, heat/cold memory, phenology, root depth,
/// defoliated fraction, alive flag.
pub const STATE_SIZE: usize = N_ORGANS * N_STAGES * 2 + N_ORGANS + 2 + 4 + 3 + 1 + 1 + 1;

// -- Parameter bounds --

/// Parameter bounds for calibration: (min, max).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Any value in [0, 1].
pub const FRACTION_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };

/// Initial shoot or root DM [kg/ha].
pub const INITIAL_DM_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 50_000.0,
};

/// Root depth [mm].
pub const ROOT_DEPTH_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 10_000.0,
};

/// Reference photosynthesis rate [mg CO2/m2 leaf/s].
pub const REFERENCE_RATE_BOUNDS: Bounds = Bounds { min: 0.0, max: 5.0 };

/// Light extinction coefficient [-].
pub const LIGHT_EXTINCTION_BOUNDS: Bounds = Bounds { min: 0.1, max: 1.5 };

/// Specific leaf area [m2/kg DM].
pub const SPECIFIC_LEAF_AREA_BOUNDS: Bounds = Bounds {
    min: 1.0,
    max: 100.0,
};

/// Cardinal temperatures [oC].
pub const TEMPERATURE_BOUNDS: Bounds = Bounds {
    min: -30.0,
    max: 60.0,
};

/// Curvature of the growth temperature response [-].
pub const CURVATURE_BOUNDS: Bounds = Bounds { min: 0.1, max: 10.0 };

/// Degree-day sums for recovery from heat or cold [oCd].
pub const RECOVERY_SUM_BOUNDS: Bounds = Bounds {
    min: 1.0,
    max: 500.0,
};

/// Respiration coefficients [-].
pub const RESPIRATION_BOUNDS: Bounds = Bounds { min: 0.0, max: 0.5 };

/// CO2 concentrations [ppm].
pub const CO2_BOUNDS: Bounds = Bounds {
    min: 100.0,
    max: 2000.0,
};

/// CO2 response exponent [-].
pub const CO2_EXPONENT_BOUNDS: Bounds = Bounds { min: 0.1, max: 5.0 };

/// Maximum fraction of new growth to roots [-].
pub const MAX_ROOT_FRACTION_BOUNDS: Bounds = Bounds {
    min: 0.01,
    max: 0.99,
};

/// Relative seasonal increase in shoot allocation [-].
pub const SHOOT_INCREASE_BOUNDS: Bounds = Bounds { min: 0.0, max: 5.0 };

/// Day of year [-].
pub const DOY_BOUNDS: Bounds = Bounds {
    min: 1.0,
    max: 366.0,
};

/// Length of a phenological period [days].
pub const PERIOD_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 365.0,
};

/// Growth limiting exponents [-].
pub const EXPONENT_BOUNDS: Bounds = Bounds { min: 0.0, max: 5.0 };

/// Tissue N concentrations [kg N/kg DM].
pub const N_CONC_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 0.2,
};

/// N concentration relative to leaves, or to optimum [-].
pub const RELATIVE_N_BOUNDS: Bounds = Bounds { min: 0.0, max: 2.0 };

/// Daily turnover rates [1/day].
pub const TURNOVER_RATE_BOUNDS: Bounds = FRACTION_BOUNDS;

/// Multiplier on turnover of growing tissue [-].
pub const TURNOVER_FACTOR_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 10.0,
};

/// Stocking rate [stock units/ha].
pub const STOCKING_RATE_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 100.0,
};

/// Minimum standing DM [kg/ha].
pub const MIN_DM_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 10_000.0,
};

/// Grazing preference weights [-].
pub const PREFERENCE_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 100.0,
};

/// Specific root length [m/g DM].
pub const SPECIFIC_ROOT_LENGTH_BOUNDS: Bounds = Bounds {
    min: 1.0,
    max: 1000.0,
};

/// Soil N uptake coefficients [-].
pub const UPTAKE_COEFFICIENT_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };

/// Reference root length density [cm/cm3] and conductivity [mm/day].
pub const UPTAKE_REFERENCE_BOUNDS: Bounds = Bounds {
    min: 1e-3,
    max: 1e5,
};
