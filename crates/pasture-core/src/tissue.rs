//! Age-staged tissue pools and the organs built from them.
//!
//! Every organ holds exactly four pools (growing, mature, senescing, dead).
//! Behaviour that differs between organ kinds is expressed through the
//! small set of strategy methods on [`OrganKind`].
use serde::{Deserialize, Serialize};

use crate::error::{divide, PastureError, Result};

/// Number of tissue stages per organ.
pub const N_STAGES: usize = 4;

/// Values below this magnitude are treated as zero after a pool update.
const ROUNDING_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TissueStage {
    Growing = 0,
    Mature = 1,
    Senescing = 2,
    Dead = 3,
}

impl TissueStage {
    pub const ALL: [TissueStage; N_STAGES] = [
        TissueStage::Growing,
        TissueStage::Mature,
        TissueStage::Senescing,
        TissueStage::Dead,
    ];

    pub const LIVE: [TissueStage; 3] = [
        TissueStage::Growing,
        TissueStage::Mature,
        TissueStage::Senescing,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Dry matter and nitrogen held by one tissue stage [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TissuePool {
    pub dm: f64,
    pub n: f64,
    /// Phosphorus is carried but not simulated.
    pub p: Option<f64>,
}

fn snap(x: f64) -> f64 {
    if x.abs() < ROUNDING_FLOOR {
        0.0
    } else {
        x
    }
}

impl TissuePool {
    pub fn new(dm: f64, n: f64) -> Self {
        Self { dm, n, p: None }
    }

    /// N concentration [kg N/kg DM]; 0 for an empty pool.
    pub fn n_conc(&self) -> f64 {
        divide(self.n, self.dm, 0.0)
    }

    pub fn add(&mut self, dm: f64, n: f64) {
        self.dm = snap(self.dm + dm);
        self.n = snap(self.n + n);
    }

    pub fn remove(&mut self, dm: f64, n: f64) {
        self.dm = snap(self.dm - dm);
        self.n = snap(self.n - n);
    }

    /// Remove a fraction of the pool, returning the (dm, n) removed.
    pub fn remove_fraction(&mut self, fraction: f64) -> (f64, f64) {
        let f = fraction.clamp(0.0, 1.0);
        let dm = self.dm * f;
        let n = self.n * f;
        self.remove(dm, n);
        (dm, n)
    }

    /// Empty the pool, returning everything it held.
    pub fn take_all(&mut self) -> (f64, f64) {
        let out = (self.dm, self.n);
        self.dm = 0.0;
        self.n = 0.0;
        out
    }

    pub fn is_valid(&self) -> bool {
        self.dm >= 0.0 && self.n >= 0.0 && self.dm.is_finite() && self.n.is_finite()
    }
}

/// The path tissue follows when it ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnoverPath {
    /// Growing -> mature -> senescing -> dead -> litter.
    Graduated,
    /// Growing -> mature -> senescing -> litter; stolons never stand dead.
    StolonBypass,
    /// Growing -> soil residue; roots senesce directly.
    RootDirect,
}

/// Growth phase of an organ, used to gate demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganPhase {
    Growing,
    Mature,
    Senescing,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganKind {
    Leaf,
    Stem,
    Stolon,
    Root,
    Reproductive,
}

impl OrganKind {
    pub const ALL: [OrganKind; 5] = [
        OrganKind::Leaf,
        OrganKind::Stem,
        OrganKind::Stolon,
        OrganKind::Root,
        OrganKind::Reproductive,
    ];

    pub const SHOOT: [OrganKind; 4] = [
        OrganKind::Leaf,
        OrganKind::Stem,
        OrganKind::Stolon,
        OrganKind::Reproductive,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            OrganKind::Leaf => "leaf",
            OrganKind::Stem => "stem",
            OrganKind::Stolon => "stolon",
            OrganKind::Root => "root",
            OrganKind::Reproductive => "reproductive",
        }
    }

    pub fn is_rooted(self) -> bool {
        self == OrganKind::Root
    }

    /// Standing above-ground parts that can be grazed or harvested.
    pub fn is_standing(self) -> bool {
        matches!(
            self,
            OrganKind::Leaf | OrganKind::Stem | OrganKind::Reproductive
        )
    }

    pub fn turnover_path(self) -> TurnoverPath {
        match self {
            OrganKind::Stolon => TurnoverPath::StolonBypass,
            OrganKind::Root => TurnoverPath::RootDirect,
            _ => TurnoverPath::Graduated,
        }
    }

    /// Whether an organ in `phase` asks for structural and metabolic DM.
    pub fn computes_demand(self, phase: OrganPhase) -> bool {
        matches!(phase, OrganPhase::Growing | OrganPhase::Mature)
    }

    /// Live stages that actually hold tissue for this organ kind.
    pub fn live_stages(self) -> &'static [TissueStage] {
        match self.turnover_path() {
            TurnoverPath::RootDirect => &[TissueStage::Growing],
            _ => &TissueStage::LIVE,
        }
    }
}

/// An organ: four tissue pools plus a non-structural storage reserve.
///
/// The reserve is part of the DM in the growing and mature pools and is
/// tracked separately so it can be retranslocated.
#[derive(Debug, Clone, PartialEq)]
pub struct Organ {
    pub kind: OrganKind,
    pub pools: [TissuePool; N_STAGES],
    pub storage: f64,
    /// Optimum N concentration of new tissue [kg N/kg DM].
    pub n_opt: f64,
    /// Maximum (luxury) N concentration [kg N/kg DM].
    pub n_max: f64,
    /// Minimum N concentration, held by senesced tissue [kg N/kg DM].
    pub n_min: f64,
}

impl Organ {
    pub fn new(kind: OrganKind, n_opt: f64, n_max: f64, n_min: f64) -> Self {
        Self {
            kind,
            pools: [TissuePool::default(); N_STAGES],
            storage: 0.0,
            n_opt,
            n_max,
            n_min,
        }
    }

    pub fn pool(&self, stage: TissueStage) -> &TissuePool {
        &self.pools[stage.index()]
    }

    pub fn pool_mut(&mut self, stage: TissueStage) -> &mut TissuePool {
        &mut self.pools[stage.index()]
    }

    pub fn dm_total(&self) -> f64 {
        self.pools.iter().map(|p| p.dm).sum()
    }

    pub fn dm_green(&self) -> f64 {
        self.pools[..3].iter().map(|p| p.dm).sum()
    }

    pub fn dm_dead(&self) -> f64 {
        self.pools[3].dm
    }

    pub fn n_total(&self) -> f64 {
        self.pools.iter().map(|p| p.n).sum()
    }

    pub fn n_green(&self) -> f64 {
        self.pools[..3].iter().map(|p| p.n).sum()
    }

    pub fn n_conc_total(&self) -> f64 {
        divide(self.n_total(), self.dm_total(), 0.0)
    }

    pub fn n_conc_green(&self) -> f64 {
        divide(self.n_green(), self.dm_green(), 0.0)
    }

    /// DM in the non-senescing live pools, the only source of retranslocation.
    pub fn dm_young(&self) -> f64 {
        self.pools[0].dm + self.pools[1].dm
    }

    pub fn phase(&self, plant_growing: bool) -> OrganPhase {
        let green = self.dm_green();
        if !plant_growing {
            return if green > 0.0 {
                OrganPhase::Senescing
            } else {
                OrganPhase::Dead
            };
        }
        if self.pools[0].dm >= self.pools[1].dm {
            OrganPhase::Growing
        } else {
            OrganPhase::Mature
        }
    }

    /// Forced jump of a fraction of every live stage straight to dead tissue.
    ///
    /// Returns the DM moved.
    pub fn kill(&mut self, fraction: f64) -> f64 {
        let f = fraction.clamp(0.0, 1.0);
        let mut moved_dm = 0.0;
        let mut moved_n = 0.0;
        for stage in TissueStage::LIVE {
            let (dm, n) = self.pools[stage.index()].remove_fraction(f);
            moved_dm += dm;
            moved_n += n;
        }
        self.pools[TissueStage::Dead.index()].add(moved_dm, moved_n);
        self.storage *= 1.0 - f;
        moved_dm
    }

    /// Empty every pool, returning total (dm, n).
    pub fn take_all(&mut self) -> (f64, f64) {
        let mut out = (0.0, 0.0);
        for pool in &mut self.pools {
            let (dm, n) = pool.take_all();
            out.0 += dm;
            out.1 += n;
        }
        self.storage = 0.0;
        out
    }

    /// Keep the storage reserve within the young tissue that carries it.
    pub fn bound_storage(&mut self) {
        self.storage = self.storage.clamp(0.0, self.dm_young());
    }

    pub fn validate(&self) -> Result<()> {
        for (stage, pool) in self.pools.iter().enumerate() {
            if !pool.is_valid() {
                tracing::error!(organ = self.kind.name(), stage, dm = pool.dm, n = pool.n, "invalid tissue pool");
                return Err(PastureError::NegativePool {
                    organ: self.kind.name(),
                    stage,
                    dm: pool.dm,
                    n: pool.n,
                });
            }
        }
        Ok(())
    }
}
