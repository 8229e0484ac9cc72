//! MAC layer shell
//!
//! Owns the downlink PDU buffer filled by the lower-MAC context and drained
//! on the consumer thread, runs the per-TTI transmission opportunity over
//! RLC, and applies random-access / PHY-reconfiguration completions posted
//! back by background procedures.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rustue_common::logging::{log_pdu, Direction};
use rustue_common::Tti;
use tracing::{debug, info};

use crate::layers::rlc::RlcLayer;
use crate::metrics::MacMetricsShared;
use crate::pcap::PcapSink;

/// Thread-safe handle to the MAC downlink buffer.
///
/// The lower-MAC context pushes received PDUs here and then requests
/// `process_pdus` on the stack; the buffer is the only MAC structure
/// touched off the consumer thread.
#[derive(Clone, Default)]
pub struct MacPduQueue {
    pdus: Arc<Mutex<VecDeque<(u32, Bytes)>>>,
}

impl MacPduQueue {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers one received PDU for deferred handling.
    pub fn push_pdu(&self, lcid: u32, pdu: Bytes) {
        self.lock().push_back((lcid, pdu));
    }

    /// Number of buffered PDUs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no PDUs are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take_all(&self) -> Vec<(u32, Bytes)> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(u32, Bytes)>> {
        self.pdus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// MAC layer state owned by the stack core.
pub struct MacLayer {
    rx_buffer: MacPduQueue,
    metrics: Arc<MacMetricsShared>,
    pcap: Option<Box<dyn PcapSink>>,
    hex_limit: usize,
}

impl MacLayer {
    pub fn new(rx_buffer: MacPduQueue, metrics: Arc<MacMetricsShared>, hex_limit: usize) -> Self {
        Self {
            rx_buffer,
            metrics,
            pcap: None,
            hex_limit,
        }
    }

    /// Attaches a capture sink; every PDU in either direction is recorded.
    pub fn start_pcap(&mut self, sink: Box<dyn PcapSink>) {
        self.pcap = Some(sink);
    }

    /// Per-TTI hook: serves the transmission opportunity by pulling queued
    /// uplink SDUs out of RLC.
    pub fn run_tti(&mut self, tti: Tti, rlc: &mut RlcLayer) {
        self.metrics.ttis.fetch_add(1, Ordering::Relaxed);
        self.metrics.last_tti.store(tti.value(), Ordering::Relaxed);

        for (lcid, pdu) in rlc.pull_pending() {
            log_pdu("MAC", Direction::Tx, lcid, &pdu, self.hex_limit);
            self.metrics.tx_pdus.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .tx_bytes
                .fetch_add(pdu.len() as u64, Ordering::Relaxed);
            if let Some(pcap) = self.pcap.as_mut() {
                pcap.write_pdu(&pdu);
            }
        }
    }

    /// Drains the downlink buffer. The caller routes each PDU upward.
    pub fn take_pending(&mut self) -> Vec<(u32, Bytes)> {
        let pdus = self.rx_buffer.take_all();
        for (lcid, pdu) in &pdus {
            log_pdu("MAC", Direction::Rx, *lcid, pdu, self.hex_limit);
            self.metrics.rx_pdus.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .rx_bytes
                .fetch_add(pdu.len() as u64, Ordering::Relaxed);
            if let Some(pcap) = self.pcap.as_mut() {
                pcap.write_pdu(pdu);
            }
        }
        pdus
    }

    /// Applied when the random-access procedure finishes; the C-RNTI has
    /// already been installed in the PHY by the background job.
    pub fn notify_ra_completed(&mut self) {
        self.metrics.ra_completions.fetch_add(1, Ordering::Relaxed);
        debug!("random access completed, RA proc back to idle");
    }

    /// Applied when the background PHY reconfiguration finishes.
    pub fn notify_phy_config_completed(&mut self) {
        self.metrics
            .phy_config_completions
            .fetch_add(1, Ordering::Relaxed);
        debug!("PRACH configuration applied");
    }

    /// Teardown: closes the capture sink and discards buffered PDUs.
    pub fn stop(&mut self) {
        let discarded = self.rx_buffer.take_all().len();
        if discarded > 0 {
            debug!(discarded, "MAC rx buffer cleared on stop");
        }
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.close();
        }
        info!("MAC stopped");
    }
}
