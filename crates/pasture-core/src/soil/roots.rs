/// Root depth, root frontier and the vertical distribution of root mass.
///
/// Roots can extend into several soil zones; each zone keeps its own depth,
/// frontier, exploration fractions and mass profile. The plant's root mass is
/// split between zones by a fixed share.
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::layer::SoilZone;
use crate::error::{divide, PastureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RootDistributionMethod {
    /// Same root density down to the root depth.
    Homogeneous,
    /// Constant density near the surface, then a power-law decline.
    #[default]
    ExpoLinear,
    /// Fractions supplied per layer.
    UserDefined,
}

impl FromStr for RootDistributionMethod {
    type Err = PastureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "homogeneous" => Ok(Self::Homogeneous),
            "expolinear" => Ok(Self::ExpoLinear),
            "userdefined" | "user_defined" => Ok(Self::UserDefined),
            _ => Err(PastureError::UnknownMethod {
                kind: "root distribution method",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RootDistributionMethod {
    type Error = PastureError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Shape of the root mass profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootProfile {
    pub method: RootDistributionMethod,
    /// Fraction of root depth with constant density (ExpoLinear).
    pub expo_linear_depth: f64,
    /// Exponent of the decline below that depth (ExpoLinear).
    pub expo_linear_curvature: f64,
    /// Per-layer weights (UserDefined).
    pub user_defined: Vec<f64>,
}

impl Default for RootProfile {
    fn default() -> Self {
        Self {
            method: RootDistributionMethod::ExpoLinear,
            expo_linear_depth: 0.12,
            expo_linear_curvature: 3.2,
            user_defined: Vec::new(),
        }
    }
}

/// Fraction of a layer (top at `depth_top`) that roots have reached.
pub fn layer_fraction_with_roots(depth_top: f64, thickness: f64, root_depth: f64) -> f64 {
    divide(root_depth - depth_top, thickness, 0.0).clamp(0.0, 1.0)
}

/// Index of the deepest layer reached by roots.
pub fn root_frontier(thickness: &[f64], root_depth: f64) -> usize {
    let mut top = 0.0;
    let mut frontier = 0;
    for (i, &t) in thickness.iter().enumerate() {
        if top < root_depth {
            frontier = i;
        } else {
            break;
        }
        top += t;
    }
    frontier
}

/// Rooted fraction of every layer.
pub fn exploration_fractions(thickness: &[f64], root_depth: f64) -> Vec<f64> {
    let mut top = 0.0;
    thickness
        .iter()
        .map(|&t| {
            let f = layer_fraction_with_roots(top, t, root_depth);
            top += t;
            f
        })
        .collect()
}

/// Integral of `(1 - x/d2)^c` from `a` to `b`, both within [0, d2].
fn decline_integral(a: f64, b: f64, d2: f64, c: f64) -> f64 {
    let upper = (1.0 - a / d2).max(0.0).powf(c + 1.0);
    let lower = (1.0 - b / d2).max(0.0).powf(c + 1.0);
    d2 / (c + 1.0) * (upper - lower)
}

/// Fraction of root mass in each layer; sums to 1.
pub fn root_distribution(thickness: &[f64], root_depth: f64, profile: &RootProfile) -> Result<Vec<f64>> {
    let weights: Vec<f64> = match profile.method {
        RootDistributionMethod::Homogeneous => {
            let mut top = 0.0;
            thickness
                .iter()
                .map(|&t| {
                    let w = t * layer_fraction_with_roots(top, t, root_depth);
                    top += t;
                    w
                })
                .collect()
        }
        RootDistributionMethod::ExpoLinear => {
            let d1 = root_depth * profile.expo_linear_depth;
            let d2 = root_depth - d1;
            let c = profile.expo_linear_curvature;
            let mut top = 0.0;
            thickness
                .iter()
                .map(|&t| {
                    let bottom = (top + t).min(root_depth);
                    let mut w = 0.0;
                    if top < root_depth {
                        w += (bottom.min(d1) - top).max(0.0);
                        if d2 > 0.0 && bottom > d1 {
                            let a = (top - d1).max(0.0);
                            let b = bottom - d1;
                            w += decline_integral(a, b, d2, c);
                        }
                    }
                    top += t;
                    w
                })
                .collect()
        }
        RootDistributionMethod::UserDefined => {
            if profile.user_defined.len() != thickness.len() {
                return Err(PastureError::LengthMismatch {
                    what: "user-defined root distribution".to_string(),
                    expected: thickness.len(),
                    actual: profile.user_defined.len(),
                });
            }
            let mut top = 0.0;
            profile
                .user_defined
                .iter()
                .zip(thickness)
                .map(|(&w, &t)| {
                    let f = layer_fraction_with_roots(top, t, root_depth);
                    top += t;
                    w.max(0.0) * f
                })
                .collect()
        }
    };

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PastureError::InvalidConfig(format!(
            "could not calculate root distribution for root depth {root_depth} mm"
        )));
    }
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Root length density per layer [cm/cm3].
///
/// `root_dm` in kg/ha, `specific_root_length` in m/g, thickness in mm.
pub fn root_length_density(
    root_dm: f64,
    specific_root_length: f64,
    fraction: &[f64],
    thickness: &[f64],
) -> Vec<f64> {
    // kg/ha * m/g -> mm root per mm2 ground is 1e-4, and 1 mm/mm3 is 100 cm/cm3.
    let length = root_dm * specific_root_length * 1e-4;
    fraction
        .iter()
        .zip(thickness)
        .map(|(&f, &t)| 100.0 * divide(length * f, t, 0.0))
        .collect()
}

/// Roots of the plant in one soil zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRoots {
    pub root_depth: f64,
    pub frontier: usize,
    /// Rooted fraction of each layer.
    pub exploration: Vec<f64>,
    /// Fraction of this zone's root mass in each layer.
    pub fraction: Vec<f64>,
    /// Share of the plant's root mass in this zone.
    pub share: f64,
}

impl ZoneRoots {
    pub fn new(zone: &SoilZone, root_depth: f64, share: f64, profile: &RootProfile) -> Result<Self> {
        let mut roots = Self {
            root_depth: 0.0,
            frontier: 0,
            exploration: Vec::new(),
            fraction: Vec::new(),
            share,
        };
        roots.set_depth(zone, root_depth, profile)?;
        Ok(roots)
    }

    /// Move the root front and recompute frontier, exploration and profile.
    pub fn set_depth(&mut self, zone: &SoilZone, root_depth: f64, profile: &RootProfile) -> Result<()> {
        let thickness = zone.thicknesses();
        let depth = root_depth.clamp(0.0, zone.depth());
        self.root_depth = depth;
        self.frontier = root_frontier(&thickness, depth);
        self.exploration = exploration_fractions(&thickness, depth);
        self.fraction = root_distribution(&thickness, depth, profile)?;
        Ok(())
    }

    pub fn n_layers(&self) -> usize {
        self.fraction.len()
    }
}

/// Root state of the plant across all zones it roots into.
#[derive(Debug, Clone, PartialEq)]
pub struct RootState {
    pub zones: SmallVec<[ZoneRoots; 2]>,
}

impl RootState {
    /// Build roots for every zone. `shares` defaults to an even split.
    pub fn new(
        zones: &[SoilZone],
        root_depth: f64,
        shares: Option<&[f64]>,
        profile: &RootProfile,
    ) -> Result<Self> {
        if zones.is_empty() {
            return Err(PastureError::InvalidConfig("plant has no soil zone".to_string()));
        }
        let even = vec![1.0 / zones.len() as f64; zones.len()];
        let shares = shares.unwrap_or(&even);
        if shares.len() != zones.len() {
            return Err(PastureError::LengthMismatch {
                what: "root zone shares".to_string(),
                expected: zones.len(),
                actual: shares.len(),
            });
        }
        let total: f64 = shares.iter().sum();
        if (total - 1.0).abs() > 1e-6 || shares.iter().any(|&s| s < 0.0) {
            return Err(PastureError::InvalidConfig(format!(
                "root zone shares must be non-negative and sum to 1, got {total}"
            )));
        }
        let zones = zones
            .iter()
            .zip(shares)
            .map(|(zone, &share)| ZoneRoots::new(zone, root_depth, share, profile))
            .collect::<Result<SmallVec<[ZoneRoots; 2]>>>()?;
        Ok(Self { zones })
    }

    pub fn n_zones(&self) -> usize {
        self.zones.len()
    }

    /// Deepest root front over all zones [mm].
    pub fn max_depth(&self) -> f64 {
        self.zones.iter().map(|z| z.root_depth).fold(0.0, f64::max)
    }

    pub fn set_depth(&mut self, zones: &[SoilZone], root_depth: f64, profile: &RootProfile) -> Result<()> {
        self.check_topology(zones)?;
        for (roots, zone) in self.zones.iter_mut().zip(zones) {
            roots.set_depth(zone, root_depth, profile)?;
        }
        Ok(())
    }

    /// Fail if `zones` does not match the zone and layer layout of the roots.
    pub fn check_topology(&self, zones: &[SoilZone]) -> Result<()> {
        if zones.len() != self.zones.len() {
            return Err(PastureError::LengthMismatch {
                what: "soil zones".to_string(),
                expected: self.zones.len(),
                actual: zones.len(),
            });
        }
        for (roots, zone) in self.zones.iter().zip(zones) {
            if roots.n_layers() != zone.n_layers() {
                return Err(PastureError::LengthMismatch {
                    what: format!("layers in zone '{}'", zone.name),
                    expected: roots.n_layers(),
                    actual: zone.n_layers(),
                });
            }
        }
        Ok(())
    }

    /// Split an amount by zone share and root mass profile.
    pub fn distribute(&self, amount: f64) -> Vec<Vec<f64>> {
        self.zones
            .iter()
            .map(|z| z.fraction.iter().map(|f| amount * z.share * f).collect())
            .collect()
    }
}
