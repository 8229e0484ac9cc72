//! RLC layer shell
//!
//! Per-logical-channel uplink queues between PDCP and the MAC transmission
//! opportunity. Queue depths are published as atomics so non-consumer
//! threads can watch signalling drain (the switch-off path waits on SRB1).

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::layers::LCID_SRB1;
use crate::metrics::RlcMetricsShared;

/// RLC layer state owned by the stack core.
pub struct RlcLayer {
    tx_queues: BTreeMap<u32, VecDeque<Bytes>>,
    metrics: Arc<RlcMetricsShared>,
}

impl RlcLayer {
    pub fn new(metrics: Arc<RlcMetricsShared>) -> Self {
        Self {
            tx_queues: BTreeMap::new(),
            metrics,
        }
    }

    /// Queues one uplink SDU on the given logical channel.
    pub fn write_sdu(&mut self, lcid: u32, sdu: Bytes) {
        self.metrics.tx_sdus.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .tx_bytes
            .fetch_add(sdu.len() as u64, Ordering::Relaxed);
        self.metrics.tx_pending.fetch_add(1, Ordering::Relaxed);
        if lcid == LCID_SRB1 {
            self.metrics.srb1_pending.fetch_add(1, Ordering::Relaxed);
        }
        self.tx_queues.entry(lcid).or_default().push_back(sdu);
    }

    /// True if the channel has queued uplink data.
    pub fn has_data(&self, lcid: u32) -> bool {
        self.tx_queues.get(&lcid).is_some_and(|q| !q.is_empty())
    }

    /// Takes everything queued for transmission, lowest LCID first
    /// (signalling bearers drain before data bearers).
    pub fn pull_pending(&mut self) -> Vec<(u32, Bytes)> {
        let mut out = Vec::new();
        for (&lcid, queue) in &mut self.tx_queues {
            while let Some(sdu) = queue.pop_front() {
                self.metrics.tx_pending.fetch_sub(1, Ordering::Relaxed);
                if lcid == LCID_SRB1 {
                    self.metrics.srb1_pending.fetch_sub(1, Ordering::Relaxed);
                }
                out.push((lcid, sdu));
            }
        }
        out
    }

    /// Counts one reassembled downlink PDU on its way up to PDCP.
    pub fn handle_rx_pdu(&mut self, lcid: u32, pdu: &Bytes) {
        self.metrics.rx_pdus.fetch_add(1, Ordering::Relaxed);
        debug!(lcid, len = pdu.len(), "RLC rx PDU");
    }

    /// Teardown: drops queued SDUs and resets published depths.
    pub fn stop(&mut self) {
        let dropped: usize = self.tx_queues.values().map(VecDeque::len).sum();
        if dropped > 0 {
            debug!(dropped, "RLC tx queues cleared on stop");
        }
        self.tx_queues.clear();
        self.metrics.tx_pending.store(0, Ordering::Relaxed);
        self.metrics.srb1_pending.store(0, Ordering::Relaxed);
        info!("RLC stopped");
    }
}
