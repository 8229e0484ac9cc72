//! Background radio procedures
//!
//! Cell search, cell selection, PRACH reconfiguration and random-access
//! completion all block on the PHY for hardware-scale durations, so they
//! run as worker-pool jobs. Each job does its PHY work and posts a
//! continuation onto the background queue; the continuation applies the
//! result to the layers on the consumer thread. No job touches layer state
//! itself.
//!
//! Overlap control is the caller's job: RRC does not request a new search
//! or selection until the previous one's continuation has run.

use std::sync::Arc;

use crate::multiqueue::{QueueId, QueueProducers};
use crate::phy::{FoundCell, PhyInterface};
use crate::task::StackTask;
use crate::workers::WorkerHandle;

/// Shared launcher for PHY-bound background procedures.
#[derive(Clone)]
pub struct RadioProcedures {
    workers: WorkerHandle,
    queues: QueueProducers<StackTask>,
    background_queue: QueueId,
    phy: Arc<dyn PhyInterface>,
}

impl RadioProcedures {
    pub(crate) fn new(
        workers: WorkerHandle,
        queues: QueueProducers<StackTask>,
        background_queue: QueueId,
        phy: Arc<dyn PhyInterface>,
    ) -> Self {
        Self {
            workers,
            queues,
            background_queue,
            phy,
        }
    }

    fn post(queues: &QueueProducers<StackTask>, queue: QueueId, task: StackTask) {
        // must-deliver: a lost completion would wedge the requesting layer
        queues.push(queue, task);
    }

    /// Sweeps for a cell; RRC gets the outcome either way.
    pub(crate) fn start_cell_search(&self) {
        let phy = Arc::clone(&self.phy);
        let queues = self.queues.clone();
        let queue = self.background_queue;
        self.workers.submit(Box::new(move || {
            let result = phy.cell_search();
            Self::post(
                &queues,
                queue,
                Box::new(move |core| core.cell_search_completed(result)),
            );
        }));
    }

    /// Tunes to the given cell; RRC gets the outcome either way.
    pub(crate) fn start_cell_select(&self, cell: FoundCell) {
        let phy = Arc::clone(&self.phy);
        let queues = self.queues.clone();
        let queue = self.background_queue;
        self.workers.submit(Box::new(move || {
            let ok = phy.cell_select(&cell);
            Self::post(
                &queues,
                queue,
                Box::new(move |core| core.cell_select_completed(cell, ok)),
            );
        }));
    }

    /// Reconfigures random-access parameters; MAC is notified on the
    /// consumer thread once the hardware work is done.
    pub(crate) fn start_prach_configuration(&self) {
        let phy = Arc::clone(&self.phy);
        let queues = self.queues.clone();
        let queue = self.background_queue;
        self.workers.submit(Box::new(move || {
            let ok = phy.configure_prach_params();
            Self::post(
                &queues,
                queue,
                Box::new(move |core| core.prach_config_completed(ok)),
            );
        }));
    }

    /// Installs the assigned C-RNTI in the PHY, then lets MAC move its RA
    /// procedure back to idle via the continuation.
    pub(crate) fn wait_ra_completion(&self, rnti: u16) {
        let phy = Arc::clone(&self.phy);
        let queues = self.queues.clone();
        let queue = self.background_queue;
        self.workers.submit(Box::new(move || {
            phy.set_crnti(rnti);
            Self::post(&queues, queue, Box::new(|core| core.ra_completed()));
        }));
    }
}
