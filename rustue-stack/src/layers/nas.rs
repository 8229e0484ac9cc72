//! NAS layer shell
//!
//! EPS mobility management: the attach/detach state machine the executor
//! drives on behalf of the service. Attach is guarded by T3410; an expired
//! attach schedules a retry after the T3411 cool-down. Both timers live in
//! the stack's timer service so their expiry is serialized with everything
//! else (3GPP TS 24.301 §10.2).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::metrics::NasMetricsShared;
use crate::pcap::PcapSink;
use crate::timers::TimerId;

/// Attach procedure guard timer, 15 s at the 1 ms tick cadence.
pub const T3410_TICKS: u32 = 15_000;

/// Attach retry cool-down, 10 s at the 1 ms tick cadence.
pub const T3411_TICKS: u32 = 10_000;

/// EPS mobility management protocol discriminator.
const EMM_PD: u8 = 0x07;
const MSG_ATTACH_REQUEST: u8 = 0x41;
const MSG_ATTACH_COMPLETE: u8 = 0x43;
const MSG_DETACH_REQUEST: u8 = 0x45;

/// EMM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[repr(u8)]
pub enum EmmState {
    /// Not attached
    Deregistered = 0,
    /// Attach procedure running
    RegisteredInitiated = 1,
    /// Attached to the network
    Registered = 2,
}

impl EmmState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => EmmState::RegisteredInitiated,
            2 => EmmState::Registered,
            _ => EmmState::Deregistered,
        }
    }
}

impl std::fmt::Display for EmmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmmState::Deregistered => write!(f, "EMM-DEREGISTERED"),
            EmmState::RegisteredInitiated => write!(f, "EMM-REGISTERED-INITIATED"),
            EmmState::Registered => write!(f, "EMM-REGISTERED"),
        }
    }
}

/// NAS layer state owned by the stack core.
pub struct NasLayer {
    emm: EmmState,
    imsi: String,
    t3410: Option<TimerId>,
    t3411: Option<TimerId>,
    metrics: Arc<NasMetricsShared>,
    pcap: Option<Box<dyn PcapSink>>,
}

impl NasLayer {
    pub fn new(imsi: String, metrics: Arc<NasMetricsShared>) -> Self {
        Self {
            emm: EmmState::Deregistered,
            imsi,
            t3410: None,
            t3411: None,
            metrics,
            pcap: None,
        }
    }

    /// Attaches a capture sink; every emitted NAS message is recorded.
    pub fn start_pcap(&mut self, sink: Box<dyn PcapSink>) {
        self.pcap = Some(sink);
    }

    pub fn emm_state(&self) -> EmmState {
        self.emm
    }

    fn set_state(&mut self, state: EmmState) {
        if self.emm != state {
            debug!(from = %self.emm, to = %state, "EMM state change");
            self.emm = state;
            self.metrics.emm_state.store(state as u8, Ordering::Relaxed);
        }
    }

    fn emit(&mut self, msg_type: u8) -> Bytes {
        let pdu = Bytes::from(vec![EMM_PD, msg_type]);
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.write_pdu(&pdu);
        }
        pdu
    }

    /// Per-TTI hook. Periodic EMM supervision keys off this; the shell
    /// records its slot in the tick order.
    pub fn run_tti(&mut self, tti: rustue_common::Tti) {
        self.metrics.ttis.fetch_add(1, Ordering::Relaxed);
        self.metrics.last_tti.store(tti.value(), Ordering::Relaxed);
    }

    /// Starts an attach procedure. Returns the attach request PDU when a
    /// new procedure begins; `None` if one is running or already attached.
    pub fn start_attach_request(&mut self) -> Option<Bytes> {
        if self.emm != EmmState::Deregistered {
            debug!(state = %self.emm, "attach request ignored");
            return None;
        }
        info!(imsi = %self.imsi, "starting attach");
        self.metrics.attach_attempts.fetch_add(1, Ordering::Relaxed);
        self.set_state(EmmState::RegisteredInitiated);
        Some(self.emit(MSG_ATTACH_REQUEST))
    }

    /// Applied when the RRC connection is up. Completes a running attach
    /// and returns the attach complete PDU to transmit.
    pub fn rrc_established(&mut self) -> Option<Bytes> {
        if self.emm != EmmState::RegisteredInitiated {
            return None;
        }
        info!(imsi = %self.imsi, "attach complete");
        self.metrics
            .attach_completions
            .fetch_add(1, Ordering::Relaxed);
        self.set_state(EmmState::Registered);
        Some(self.emit(MSG_ATTACH_COMPLETE))
    }

    /// Applied on T3410 expiry. Returns true when a running attach was
    /// abandoned (the caller schedules the T3411 retry).
    pub fn attach_timeout(&mut self) -> bool {
        self.t3410 = None;
        if self.emm != EmmState::RegisteredInitiated {
            return false;
        }
        warn!("T3410 expired, attach abandoned");
        self.metrics.attach_timeouts.fetch_add(1, Ordering::Relaxed);
        self.set_state(EmmState::Deregistered);
        true
    }

    /// Performs a detach. Returns the detach request PDU when there was
    /// anything to detach.
    pub fn detach_request(&mut self, switch_off: bool) -> Option<Bytes> {
        if self.emm == EmmState::Deregistered {
            return None;
        }
        info!(switch_off, "detaching");
        self.metrics.detaches.fetch_add(1, Ordering::Relaxed);
        self.set_state(EmmState::Deregistered);
        Some(self.emit(MSG_DETACH_REQUEST))
    }

    /// RRC connection went away. EMM registration survives into idle mode;
    /// only the signalling connection is gone.
    pub fn connection_lost(&mut self) {
        if self.emm == EmmState::Registered {
            debug!("signalling connection lost, staying registered");
        }
    }

    pub fn set_t3410(&mut self, id: Option<TimerId>) {
        self.t3410 = id;
    }

    pub fn take_t3410(&mut self) -> Option<TimerId> {
        self.t3410.take()
    }

    pub fn set_t3411(&mut self, id: Option<TimerId>) {
        self.t3411 = id;
    }

    pub fn take_t3411(&mut self) -> Option<TimerId> {
        self.t3411.take()
    }

    /// Teardown: closes the capture sink.
    pub fn stop(&mut self) {
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.close();
        }
        info!("NAS stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nas() -> (NasLayer, Arc<NasMetricsShared>) {
        let metrics = Arc::new(NasMetricsShared::default());
        (
            NasLayer::new("001010123456789".into(), Arc::clone(&metrics)),
            metrics,
        )
    }

    #[test]
    fn test_attach_lifecycle() {
        let (mut nas, metrics) = nas();

        let request = nas.start_attach_request().unwrap();
        assert_eq!(&request[..], &[0x07, 0x41]);
        assert_eq!(nas.emm_state(), EmmState::RegisteredInitiated);

        // second attach while one is running is ignored
        assert!(nas.start_attach_request().is_none());

        let complete = nas.rrc_established().unwrap();
        assert_eq!(&complete[..], &[0x07, 0x43]);
        assert_eq!(nas.emm_state(), EmmState::Registered);

        let snap = metrics.snapshot();
        assert_eq!(snap.attach_attempts, 1);
        assert_eq!(snap.attach_completions, 1);
    }

    #[test]
    fn test_attach_timeout_only_while_initiated() {
        let (mut nas, metrics) = nas();

        assert!(!nas.attach_timeout());

        nas.start_attach_request();
        assert!(nas.attach_timeout());
        assert_eq!(nas.emm_state(), EmmState::Deregistered);
        assert_eq!(metrics.snapshot().attach_timeouts, 1);
    }

    #[test]
    fn test_detach_from_registered() {
        let (mut nas, metrics) = nas();

        nas.start_attach_request();
        nas.rrc_established();

        let detach = nas.detach_request(true).unwrap();
        assert_eq!(&detach[..], &[0x07, 0x45]);
        assert_eq!(nas.emm_state(), EmmState::Deregistered);
        assert_eq!(metrics.snapshot().detaches, 1);

        // nothing left to detach
        assert!(nas.detach_request(false).is_none());
    }

    #[test]
    fn test_connection_loss_keeps_registration() {
        let (mut nas, _metrics) = nas();

        nas.start_attach_request();
        nas.rrc_established();
        nas.connection_lost();

        assert_eq!(nas.emm_state(), EmmState::Registered);
    }

    #[test]
    fn test_rrc_established_without_attach_is_noop() {
        let (mut nas, _metrics) = nas();
        assert!(nas.rrc_established().is_none());
    }
}
