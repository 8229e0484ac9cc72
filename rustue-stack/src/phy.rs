//! PHY/RF collaborator boundary
//!
//! The physical layer lives outside this crate: it owns sample acquisition,
//! synchronization search and hardware control. The stack only sees this
//! narrow contract. All methods may block for hardware-scale durations and
//! are therefore only ever invoked from background worker threads.

/// A cell located by a search sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundCell {
    /// E-UTRA absolute radio frequency channel number
    pub earfcn: u32,
    /// Physical cell identity
    pub pci: u16,
    /// Reference signal received power in dBm
    pub rsrp_dbm: i32,
}

impl std::fmt::Display for FoundCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "earfcn={} pci={} rsrp={}dBm",
            self.earfcn, self.pci, self.rsrp_dbm
        )
    }
}

/// Outcome of a cell search sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSearchResult {
    /// A cell was found and measured
    CellFound(FoundCell),
    /// The sweep finished without finding any cell
    NoCell,
}

/// Operations the stack requests from the PHY/RF collaborator.
///
/// Implementations must be thread-safe: calls arrive from the background
/// worker threads, and `set_crnti` additionally from RA-completion handling.
pub trait PhyInterface: Send + Sync {
    /// Sweeps configured frequencies for a cell. Blocking.
    fn cell_search(&self) -> CellSearchResult;

    /// Tunes to and camps on the given cell. Blocking.
    /// Returns whether the selection succeeded.
    fn cell_select(&self, cell: &FoundCell) -> bool;

    /// Reconfigures random-access parameters from the current cell's
    /// system information. Blocking. Returns whether it succeeded.
    fn configure_prach_params(&self) -> bool;

    /// Installs the C-RNTI assigned during random access.
    fn set_crnti(&self, rnti: u16);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_cell_display() {
        let cell = FoundCell {
            earfcn: 3350,
            pci: 101,
            rsrp_dbm: -95,
        };
        assert_eq!(format!("{cell}"), "earfcn=3350 pci=101 rsrp=-95dBm");
    }
}
