//! Soil layers and zones as seen by the plant, root distribution, and the
//! water and mineral N uptake from them.
pub mod layer;
pub mod roots;
pub mod uptake;

pub use layer::{validate_zones, SoilLayer, SoilZone};
pub use roots::{RootDistributionMethod, RootProfile, RootState, ZoneRoots};
pub use uptake::{
    NitrogenUptakeMethod, UptakeParams, UptakeSource, WaterUptakeMethod, ZoneAvailability, ZoneUptake,
};
