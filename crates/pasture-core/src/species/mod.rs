/// Pasture species: a perennial or annual grass or legume.
///
/// Five organs with age-staged tissue pools, driven one day at a time by
/// carbon and nitrogen supply, organ demand and tissue turnover.
pub mod arbitrator;
pub mod collaborators;
pub mod constants;
pub mod demand;
pub mod fluxes;
pub mod params;
pub mod phenology;
pub mod removal;
pub mod run;
pub mod state;
pub mod turnover;
