/// Daily outputs of the pasture species.
///
/// `DailyOutputs` holds the scalar figures of one day; the derive generates
/// the columnar `DailyOutputsSeries`. `DailyReport` adds the per-layer
/// exchanges with the soil and the residue handed to organic matter.
use pasture_macros::DailyOutputs;

use crate::soil::ZoneUptake;
use crate::traits::SeriesOps;

/// Scalar outputs of one simulated day.
#[derive(Debug, Clone, Copy, Default, PartialEq, DailyOutputs)]
pub struct DailyOutputs {
    // Pools after the day [kg/ha]
    pub dm_total: f64,
    pub dm_shoot_green: f64,
    pub dm_shoot_dead: f64,
    pub dm_root: f64,
    pub n_total: f64,
    pub n_shoot: f64,
    pub storage_dm: f64,

    // Canopy
    pub lai: f64,
    pub cover: f64,

    // Carbon [kg C/ha] and growth [kg DM/ha]
    pub gross_photosynthesis: f64,
    pub maintenance_respiration: f64,
    pub growth_respiration: f64,
    pub c_remobilised: f64,
    pub dm_retranslocated: f64,
    pub potential_growth: f64,
    pub water_limited_growth: f64,
    pub actual_growth: f64,
    pub shoot_fraction: f64,

    // Limiting factors [0-1]
    pub glf_temperature: f64,
    pub glf_water: f64,
    pub glf_nitrogen: f64,
    pub glf_heat: f64,
    pub glf_cold: f64,
    pub glf_co2: f64,

    // Water [mm]
    pub water_demand: f64,
    pub water_uptake: f64,

    // Nitrogen [kg N/ha]
    pub n_demand_optimum: f64,
    pub n_demand_luxury: f64,
    pub n_fixation: f64,
    pub n_remobilised: f64,
    pub n_luxury_remobilised: f64,
    pub n_soil_uptake: f64,

    // Turnover and removal [kg/ha]
    pub senesced_dm: f64,
    pub litter_dm: f64,
    pub litter_n: f64,
    pub root_residue_dm: f64,
    pub root_residue_n: f64,
    pub harvested_dm: f64,
    pub harvested_n: f64,

    /// [mm]
    pub root_depth: f64,
}

/// Dead shoot handed to the surface residue pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LitterFlux {
    pub material_type: String,
    pub dm: f64,
    pub n: f64,
}

impl LitterFlux {
    pub fn is_empty(&self) -> bool {
        self.dm <= 0.0 && self.n <= 0.0
    }
}

/// Dead roots handed to fresh organic matter, per zone and layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootResidue {
    pub dm: Vec<Vec<f64>>,
    pub n: Vec<Vec<f64>>,
}

impl RootResidue {
    pub fn total_dm(&self) -> f64 {
        self.dm.iter().flatten().sum()
    }

    pub fn total_n(&self) -> f64 {
        self.n.iter().flatten().sum()
    }
}

/// Everything one day produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyReport {
    pub outputs: DailyOutputs,
    /// Uptake per zone and layer; the soil receives its negative.
    pub uptake: Vec<ZoneUptake>,
    pub litter: LitterFlux,
    pub root_residue: RootResidue,
}

impl SeriesOps<DailyReport> for DailyOutputsSeries {
    fn with_capacity(n: usize) -> Self {
        DailyOutputsSeries::with_capacity(n)
    }

    fn push(&mut self, report: &DailyReport) {
        DailyOutputsSeries::push(self, &report.outputs);
    }

    fn len(&self) -> usize {
        DailyOutputsSeries::len(self)
    }

    fn is_empty(&self) -> bool {
        DailyOutputsSeries::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_collects_report_outputs() {
        let report = DailyReport {
            outputs: DailyOutputs {
                actual_growth: 42.0,
                litter_dm: 3.0,
                ..DailyOutputs::default()
            },
            ..DailyReport::default()
        };
        let mut series = <DailyOutputsSeries as SeriesOps<DailyReport>>::with_capacity(2);
        SeriesOps::push(&mut series, &report);
        SeriesOps::push(&mut series, &report);
        assert_eq!(SeriesOps::<DailyReport>::len(&series), 2);
        assert_eq!(series.column("actual_growth"), Some(&[42.0, 42.0][..]));
        assert_eq!(series.columns().len(), DailyOutputs::field_names().len());
    }

    #[test]
    fn residue_totals() {
        let residue = RootResidue {
            dm: vec![vec![1.0, 2.0], vec![0.5]],
            n: vec![vec![0.02, 0.04], vec![0.01]],
        };
        assert_eq!(residue.total_dm(), 3.5);
        assert!((residue.total_n() - 0.07).abs() < 1e-12);
        assert!(LitterFlux::default().is_empty());
    }
}
