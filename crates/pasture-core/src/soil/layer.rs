/// Soil layers and zones.
///
/// Water contents and limits are volumetric [mm/mm]; thickness is in mm and
/// mineral N in kg N/ha. Values are a read-only snapshot for the day.
use crate::error::{PastureError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilLayer {
    /// Layer thickness [mm].
    pub thickness: f64,
    /// Volumetric water content [mm/mm].
    pub sw: f64,
    /// Crop lower limit [mm/mm].
    pub ll: f64,
    /// Drained upper limit (field capacity) [mm/mm].
    pub dul: f64,
    /// Saturation [mm/mm].
    pub sat: f64,
    /// Fraction of available water extractable per day [/d].
    pub kl: f64,
    /// Saturated hydraulic conductivity [mm/d].
    pub ksat: f64,
    /// Nitrate [kg N/ha].
    pub no3: f64,
    /// Ammonium [kg N/ha].
    pub nh4: f64,
}

impl SoilLayer {
    pub fn water_mm(&self) -> f64 {
        self.sw * self.thickness
    }

    pub fn ll_mm(&self) -> f64 {
        self.ll * self.thickness
    }

    pub fn dul_mm(&self) -> f64 {
        self.dul * self.thickness
    }

    pub fn sat_mm(&self) -> f64 {
        self.sat * self.thickness
    }

    /// Water above the crop lower limit [mm].
    pub fn extractable_water(&self) -> f64 {
        (self.water_mm() - self.ll_mm()).max(0.0)
    }

    fn validate(&self, zone: &str, index: usize) -> Result<()> {
        let values = [
            self.thickness,
            self.sw,
            self.ll,
            self.dul,
            self.sat,
            self.kl,
            self.ksat,
            self.no3,
            self.nh4,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PastureError::InvalidConfig(format!(
                "zone '{zone}' layer {index}: soil values must be finite and non-negative"
            )));
        }
        if self.thickness <= 0.0 {
            return Err(PastureError::InvalidConfig(format!(
                "zone '{zone}' layer {index}: thickness must be positive"
            )));
        }
        if !(self.ll <= self.dul && self.dul < self.sat && self.sat <= 1.0) {
            return Err(PastureError::InvalidConfig(format!(
                "zone '{zone}' layer {index}: limits must satisfy ll <= dul < sat <= 1"
            )));
        }
        if self.kl > 1.0 {
            return Err(PastureError::InvalidConfig(format!(
                "zone '{zone}' layer {index}: kl = {} exceeds 1",
                self.kl
            )));
        }
        Ok(())
    }
}

/// An ordered soil profile the plant can root into.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilZone {
    pub name: String,
    pub layers: Vec<SoilLayer>,
}

impl SoilZone {
    pub fn new(name: impl Into<String>, layers: Vec<SoilLayer>) -> Self {
        Self {
            name: name.into(),
            layers,
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn thicknesses(&self) -> Vec<f64> {
        self.layers.iter().map(|l| l.thickness).collect()
    }

    /// Profile depth [mm].
    pub fn depth(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(PastureError::InvalidConfig(format!(
                "zone '{}' has no layers",
                self.name
            )));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            layer.validate(&self.name, i)?;
        }
        Ok(())
    }

    /// Remove water taken up [mm per layer].
    pub fn apply_water_uptake(&mut self, uptake: &[f64]) -> Result<()> {
        self.check_len("water uptake", uptake.len())?;
        for (layer, &u) in self.layers.iter_mut().zip(uptake) {
            layer.sw = ((layer.water_mm() - u) / layer.thickness).max(0.0);
        }
        Ok(())
    }

    /// Remove mineral N taken up [kg N/ha per layer].
    pub fn apply_nitrogen_uptake(&mut self, no3: &[f64], nh4: &[f64]) -> Result<()> {
        self.check_len("NO3 uptake", no3.len())?;
        self.check_len("NH4 uptake", nh4.len())?;
        for ((layer, &a), &b) in self.layers.iter_mut().zip(no3).zip(nh4) {
            layer.no3 = (layer.no3 - a).max(0.0);
            layer.nh4 = (layer.nh4 - b).max(0.0);
        }
        Ok(())
    }

    fn check_len(&self, what: &str, actual: usize) -> Result<()> {
        if actual != self.layers.len() {
            return Err(PastureError::LengthMismatch {
                what: format!("{what} for zone '{}'", self.name),
                expected: self.layers.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// Check that every zone is valid and that `expected` zones are present.
pub fn validate_zones(zones: &[SoilZone], expected: usize) -> Result<()> {
    if zones.len() != expected {
        return Err(PastureError::LengthMismatch {
            what: "soil zones".to_string(),
            expected,
            actual: zones.len(),
        });
    }
    zones.iter().try_for_each(SoilZone::validate)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn loam(thickness: f64) -> SoilLayer {
        SoilLayer {
            thickness,
            sw: 0.30,
            ll: 0.10,
            dul: 0.35,
            sat: 0.45,
            kl: 0.06,
            ksat: 500.0,
            no3: 20.0,
            nh4: 5.0,
        }
    }

    #[test]
    fn layer_amounts() {
        let layer = loam(200.0);
        assert_relative_eq!(layer.water_mm(), 60.0, epsilon = 1e-10);
        assert_relative_eq!(layer.ll_mm(), 20.0, epsilon = 1e-10);
        assert_relative_eq!(layer.extractable_water(), 40.0, epsilon = 1e-10);
        assert_relative_eq!(layer.sat_mm(), 90.0, epsilon = 1e-10);
    }

    #[test]
    fn zone_depth_and_validation() {
        let zone = SoilZone::new("paddock", vec![loam(100.0), loam(200.0), loam(300.0)]);
        assert_relative_eq!(zone.depth(), 600.0, epsilon = 1e-10);
        assert!(zone.validate().is_ok());
    }

    #[test]
    fn invalid_limits_rejected() {
        let mut layer = loam(100.0);
        layer.dul = 0.5;
        let zone = SoilZone::new("bad", vec![layer]);
        assert!(matches!(zone.validate(), Err(PastureError::InvalidConfig(_))));
    }

    #[test]
    fn zone_count_mismatch_is_fatal() {
        let zones = vec![SoilZone::new("a", vec![loam(100.0)])];
        assert!(matches!(
            validate_zones(&zones, 2),
            Err(PastureError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn apply_uptake_updates_contents() {
        let mut zone = SoilZone::new("paddock", vec![loam(100.0), loam(100.0)]);
        zone.apply_water_uptake(&[5.0, 0.0]).unwrap();
        assert_relative_eq!(zone.layers[0].water_mm(), 25.0, epsilon = 1e-10);
        zone.apply_nitrogen_uptake(&[2.0, 0.0], &[1.0, 0.5]).unwrap();
        assert_relative_eq!(zone.layers[0].no3, 18.0, epsilon = 1e-10);
        assert_relative_eq!(zone.layers[1].nh4, 4.5, epsilon = 1e-10);
        assert!(zone.apply_water_uptake(&[1.0]).is_err());
    }
}
