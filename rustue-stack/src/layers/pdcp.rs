//! PDCP layer shell
//!
//! Routes uplink SDUs down toward RLC and delivers reassembled downlink
//! traffic to the gateway collaborator.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use rustue_common::logging::{log_pdu, Direction};
use tracing::info;

use crate::gw::GwInterface;
use crate::layers::rlc::RlcLayer;
use crate::metrics::PdcpMetricsShared;

/// PDCP layer state owned by the stack core.
pub struct PdcpLayer {
    gw: Arc<dyn GwInterface>,
    metrics: Arc<PdcpMetricsShared>,
    hex_limit: usize,
}

impl PdcpLayer {
    pub fn new(gw: Arc<dyn GwInterface>, metrics: Arc<PdcpMetricsShared>, hex_limit: usize) -> Self {
        Self {
            gw,
            metrics,
            hex_limit,
        }
    }

    /// Accepts one uplink SDU and hands it to RLC.
    pub fn write_sdu(&mut self, rlc: &mut RlcLayer, lcid: u32, sdu: Bytes) {
        log_pdu("PDCP", Direction::Tx, lcid, &sdu, self.hex_limit);
        self.metrics.tx_sdus.fetch_add(1, Ordering::Relaxed);
        rlc.write_sdu(lcid, sdu);
    }

    /// Accepts one downlink PDU from RLC and delivers it to the gateway.
    pub fn handle_rx_pdu(&mut self, lcid: u32, pdu: Bytes) {
        log_pdu("PDCP", Direction::Rx, lcid, &pdu, self.hex_limit);
        self.metrics.rx_pdus.fetch_add(1, Ordering::Relaxed);
        self.gw.deliver_downlink(lcid, pdu);
    }

    /// Teardown.
    pub fn stop(&mut self) {
        info!("PDCP stopped");
    }
}
