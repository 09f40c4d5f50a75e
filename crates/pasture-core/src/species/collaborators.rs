/// Sinks outside the plant that receive its daily exchanges.
///
/// The soil takes water and mineral N deltas, the surface residue pool takes
/// litter and fresh organic matter takes root residue. Every method has a
/// no-op default so an implementor only overrides what it models.
use super::fluxes::LitterFlux;

/// Announced once when the plant becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCrop {
    pub name: String,
    pub family: String,
}

pub trait Collaborators {
    fn new_crop(&mut self, _event: &NewCrop) {}

    /// Water change per layer of one zone [mm], negative for uptake.
    fn water_changed(&mut self, _zone: &str, _deltas: &[f64]) {}

    /// Nitrate and ammonium change per layer of one zone [kg N/ha].
    fn nitrogen_changed(&mut self, _zone: &str, _no3: &[f64], _nh4: &[f64]) {}

    fn surface_organic_matter(&mut self, _litter: &LitterFlux) {}

    /// Root residue per layer of one zone [kg/ha].
    fn fresh_organic_matter(&mut self, _zone: &str, _dm: &[f64], _n: &[f64]) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollaborators;

impl Collaborators for NoCollaborators {}

/// Per-zone, per-layer values sent to one sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDeltas {
    pub zone: String,
    pub values: Vec<f64>,
}

/// Keeps every call for inspection.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub new_crops: Vec<NewCrop>,
    pub water: Vec<LayerDeltas>,
    pub no3: Vec<LayerDeltas>,
    pub nh4: Vec<LayerDeltas>,
    pub litter: Vec<LitterFlux>,
    pub residue_dm: Vec<LayerDeltas>,
    pub residue_n: Vec<LayerDeltas>,
}

fn record(into: &mut Vec<LayerDeltas>, zone: &str, values: &[f64]) {
    into.push(LayerDeltas {
        zone: zone.to_string(),
        values: values.to_vec(),
    });
}

impl Recorder {
    pub fn litter_dm(&self) -> f64 {
        self.litter.iter().map(|l| l.dm).sum()
    }

    pub fn residue_dm(&self) -> f64 {
        self.residue_dm.iter().flat_map(|d| d.values.iter()).sum()
    }

    pub fn water_removed(&self) -> f64 {
        -self.water.iter().flat_map(|d| d.values.iter()).sum::<f64>()
    }
}

impl Collaborators for Recorder {
    fn new_crop(&mut self, event: &NewCrop) {
        self.new_crops.push(event.clone());
    }

    fn water_changed(&mut self, zone: &str, deltas: &[f64]) {
        record(&mut self.water, zone, deltas);
    }

    fn nitrogen_changed(&mut self, zone: &str, no3: &[f64], nh4: &[f64]) {
        record(&mut self.no3, zone, no3);
        record(&mut self.nh4, zone, nh4);
    }

    fn surface_organic_matter(&mut self, litter: &LitterFlux) {
        self.litter.push(litter.clone());
    }

    fn fresh_organic_matter(&mut self, zone: &str, dm: &[f64], n: &[f64]) {
        record(&mut self.residue_dm, zone, dm);
        record(&mut self.residue_n, zone, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_totals() {
        let mut rec = Recorder::default();
        rec.water_changed("a", &[-1.0, -2.0]);
        rec.water_changed("b", &[-0.5]);
        rec.fresh_organic_matter("a", &[3.0, 1.0], &[0.1, 0.02]);
        rec.surface_organic_matter(&LitterFlux {
            material_type: "grass".to_string(),
            dm: 4.0,
            n: 0.1,
        });
        assert_eq!(rec.water_removed(), 3.5);
        assert_eq!(rec.residue_dm(), 4.0);
        assert_eq!(rec.litter_dm(), 4.0);
        assert_eq!(rec.water[1].zone, "b");
    }

    #[test]
    fn no_collaborators_accepts_everything() {
        let mut sink = NoCollaborators;
        sink.new_crop(&NewCrop {
            name: "ryegrass".to_string(),
            family: "grass".to_string(),
        });
        sink.water_changed("a", &[-1.0]);
    }
}
