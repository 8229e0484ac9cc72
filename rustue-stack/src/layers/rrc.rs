//! RRC layer shell
//!
//! Tracks the radio resource control state machine across sync
//! notifications and the cell search / cell selection procedures whose
//! blocking parts run as background jobs. Completions are applied here, on
//! the consumer thread, via the continuations those jobs post back.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rustue_common::Tti;
use tracing::{debug, info, warn};

use crate::metrics::RrcMetricsShared;
use crate::phy::{CellSearchResult, FoundCell};

/// RRC connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[repr(u8)]
pub enum RrcState {
    /// No serving cell
    Idle = 0,
    /// Cell search sweep in progress
    CellSearch = 1,
    /// Selecting/tuning to a found cell
    CellSelection = 2,
    /// Camped on a cell, no connection
    Camped = 3,
    /// Connected to the serving cell
    Connected = 4,
}

impl RrcState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => RrcState::CellSearch,
            2 => RrcState::CellSelection,
            3 => RrcState::Camped,
            4 => RrcState::Connected,
            _ => RrcState::Idle,
        }
    }
}

impl std::fmt::Display for RrcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RrcState::Idle => write!(f, "IDLE"),
            RrcState::CellSearch => write!(f, "CELL-SEARCH"),
            RrcState::CellSelection => write!(f, "CELL-SELECTION"),
            RrcState::Camped => write!(f, "CAMPED"),
            RrcState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// RRC layer state owned by the stack core.
pub struct RrcLayer {
    state: RrcState,
    serving_cell: Option<FoundCell>,
    metrics: Arc<RrcMetricsShared>,
}

impl RrcLayer {
    pub fn new(metrics: Arc<RrcMetricsShared>) -> Self {
        Self {
            state: RrcState::Idle,
            serving_cell: None,
            metrics,
        }
    }

    pub fn state(&self) -> RrcState {
        self.state
    }

    pub fn serving_cell(&self) -> Option<FoundCell> {
        self.serving_cell
    }

    fn set_state(&mut self, state: RrcState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "RRC state change");
            self.state = state;
            self.metrics.state.store(state as u8, Ordering::Relaxed);
        }
    }

    /// Per-TTI hook. Connection supervision keys off this; the shell
    /// records its slot in the tick order.
    pub fn run_tti(&mut self, tti: Tti) {
        self.metrics.ttis.fetch_add(1, Ordering::Relaxed);
        self.metrics.last_tti.store(tti.value(), Ordering::Relaxed);
    }

    /// Notes that a cell search sweep has been requested.
    /// Returns false if the layer is not in a state to search.
    pub fn begin_cell_search(&mut self) -> bool {
        if self.state != RrcState::Idle {
            return false;
        }
        self.metrics.cell_searches.fetch_add(1, Ordering::Relaxed);
        self.set_state(RrcState::CellSearch);
        true
    }

    /// Applies a finished cell search. Returns the cell to select, if any.
    pub fn cell_search_completed(&mut self, result: CellSearchResult) -> Option<FoundCell> {
        if self.state != RrcState::CellSearch {
            warn!(state = %self.state, "unexpected cell search completion");
            return None;
        }
        match result {
            CellSearchResult::CellFound(cell) => {
                info!(%cell, "cell found");
                self.metrics.cells_found.fetch_add(1, Ordering::Relaxed);
                self.set_state(RrcState::CellSelection);
                Some(cell)
            }
            CellSearchResult::NoCell => {
                info!("cell search found no cell");
                self.set_state(RrcState::Idle);
                None
            }
        }
    }

    /// Applies a finished cell selection. Returns true once camped.
    pub fn cell_select_completed(&mut self, cell: FoundCell, ok: bool) -> bool {
        if self.state != RrcState::CellSelection {
            warn!(state = %self.state, "unexpected cell selection completion");
            return false;
        }
        if ok {
            info!(%cell, "camped on cell");
            self.serving_cell = Some(cell);
            self.set_state(RrcState::Camped);
            true
        } else {
            warn!(%cell, "cell selection failed");
            self.set_state(RrcState::Idle);
            false
        }
    }

    /// Sync acquired on the serving cell. Returns true when this completes
    /// connection establishment.
    pub fn notify_in_sync(&mut self) -> bool {
        match self.state {
            RrcState::Camped => {
                info!("connection established");
                self.metrics
                    .connection_establishments
                    .fetch_add(1, Ordering::Relaxed);
                self.set_state(RrcState::Connected);
                true
            }
            _ => false,
        }
    }

    /// Sync lost. Returns true when an established connection was lost.
    pub fn notify_out_of_sync(&mut self) -> bool {
        match self.state {
            RrcState::Connected => {
                warn!("radio link lost");
                self.metrics
                    .connection_losses
                    .fetch_add(1, Ordering::Relaxed);
                self.serving_cell = None;
                self.set_state(RrcState::Idle);
                true
            }
            RrcState::Camped => {
                self.serving_cell = None;
                self.set_state(RrcState::Idle);
                false
            }
            _ => false,
        }
    }

    /// Local connection release (detach without network involvement).
    pub fn local_release(&mut self) {
        if self.state == RrcState::Connected {
            self.set_state(RrcState::Camped);
        }
    }

    /// Teardown.
    pub fn stop(&mut self) {
        self.serving_cell = None;
        self.set_state(RrcState::Idle);
        info!("RRC stopped");
    }
}
