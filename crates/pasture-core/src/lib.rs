//! Daily physiology of a pasture species: staged tissue pools, stress
//! factors, root-zone uptake, demand, arbitration and turnover.
pub mod error;
pub mod forcing;
pub mod soil;
pub mod species;
pub mod stress;
pub mod tissue;
pub mod traits;

pub use error::{PastureError, Result};
