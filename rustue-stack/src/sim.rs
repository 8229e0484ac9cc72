//! Simulated collaborators
//!
//! Stand-ins for the PHY/RF hardware path and the user-plane gateway, used
//! by the `rustue` binary and the test suite. The simulated PHY sleeps in
//! its blocking calls the way real hardware I/O would, which is exactly
//! what the background worker pool exists to absorb.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;

use crate::gw::GwInterface;
use crate::phy::{CellSearchResult, FoundCell, PhyInterface};

/// Behavior knobs for [`SimPhy`].
#[derive(Debug, Clone)]
pub struct SimPhyConfig {
    /// Cell the search sweep finds, if any
    pub cell: Option<FoundCell>,
    /// How long a search sweep blocks
    pub search_delay: Duration,
    /// How long a cell selection blocks
    pub select_delay: Duration,
    /// Whether cell selection succeeds
    pub select_ok: bool,
}

impl Default for SimPhyConfig {
    fn default() -> Self {
        Self {
            cell: Some(FoundCell {
                earfcn: 3350,
                pci: 1,
                rsrp_dbm: -90,
            }),
            search_delay: Duration::from_millis(50),
            select_delay: Duration::from_millis(10),
            select_ok: true,
        }
    }
}

/// Simulated PHY/RF collaborator.
pub struct SimPhy {
    config: SimPhyConfig,
    searches: AtomicU64,
    selects: AtomicU64,
    crnti: AtomicU32,
}

impl SimPhy {
    pub fn new(config: SimPhyConfig) -> Self {
        Self {
            config,
            searches: AtomicU64::new(0),
            selects: AtomicU64::new(0),
            crnti: AtomicU32::new(0),
        }
    }

    /// Number of search sweeps performed.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Number of selections performed.
    pub fn selects(&self) -> u64 {
        self.selects.load(Ordering::Relaxed)
    }

    /// Last C-RNTI installed (0 if none).
    pub fn crnti(&self) -> u16 {
        self.crnti.load(Ordering::Relaxed) as u16
    }
}

impl Default for SimPhy {
    fn default() -> Self {
        Self::new(SimPhyConfig::default())
    }
}

impl PhyInterface for SimPhy {
    fn cell_search(&self) -> CellSearchResult {
        std::thread::sleep(self.config.search_delay);
        self.searches.fetch_add(1, Ordering::Relaxed);
        match self.config.cell {
            Some(cell) => CellSearchResult::CellFound(cell),
            None => CellSearchResult::NoCell,
        }
    }

    fn cell_select(&self, _cell: &FoundCell) -> bool {
        std::thread::sleep(self.config.select_delay);
        self.selects.fetch_add(1, Ordering::Relaxed);
        self.config.select_ok
    }

    fn configure_prach_params(&self) -> bool {
        true
    }

    fn set_crnti(&self, rnti: u16) {
        self.crnti.store(u32::from(rnti), Ordering::Relaxed);
    }
}

/// Gateway that records every downlink delivery.
#[derive(Default)]
pub struct LoopbackGw {
    received: Mutex<Vec<(u32, Bytes)>>,
}

impl LoopbackGw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of downlink SDUs delivered so far.
    pub fn received_count(&self) -> usize {
        self.lock().len()
    }

    /// Takes everything delivered so far.
    pub fn take_received(&self) -> Vec<(u32, Bytes)> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u32, Bytes)>> {
        self.received.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GwInterface for LoopbackGw {
    fn deliver_downlink(&self, lcid: u32, sdu: Bytes) {
        self.lock().push((lcid, sdu));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_phy_finds_configured_cell() {
        let phy = SimPhy::new(SimPhyConfig {
            search_delay: Duration::from_millis(1),
            ..SimPhyConfig::default()
        });

        match phy.cell_search() {
            CellSearchResult::CellFound(cell) => assert_eq!(cell.earfcn, 3350),
            CellSearchResult::NoCell => panic!("expected a cell"),
        }
        assert_eq!(phy.searches(), 1);
    }

    #[test]
    fn test_sim_phy_empty_sweep() {
        let phy = SimPhy::new(SimPhyConfig {
            cell: None,
            search_delay: Duration::from_millis(1),
            ..SimPhyConfig::default()
        });
        assert_eq!(phy.cell_search(), CellSearchResult::NoCell);
    }

    #[test]
    fn test_loopback_gw_records() {
        let gw = LoopbackGw::new();
        gw.deliver_downlink(3, Bytes::from_static(&[1, 2]));
        assert_eq!(gw.received_count(), 1);
        let received = gw.take_received();
        assert_eq!(received[0].0, 3);
        assert_eq!(gw.received_count(), 0);
    }
}
