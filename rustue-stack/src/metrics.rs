//! Published counters and metric snapshots
//!
//! Every layer owns a shared counter block it updates from the consumer
//! thread; any thread may take a snapshot at any time. Snapshots read
//! already-published atomics and never touch layer state, which is what
//! makes the pull-based `metrics()` entry point safe off the consumer
//! thread.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::layers::nas::EmmState;
use crate::layers::rrc::RrcState;

/// MAC counter block.
#[derive(Debug, Default)]
pub struct MacMetricsShared {
    pub(crate) ttis: AtomicU64,
    pub(crate) last_tti: AtomicU32,
    pub(crate) rx_pdus: AtomicU64,
    pub(crate) rx_bytes: AtomicU64,
    pub(crate) tx_pdus: AtomicU64,
    pub(crate) tx_bytes: AtomicU64,
    pub(crate) ra_completions: AtomicU64,
    pub(crate) phy_config_completions: AtomicU64,
}

/// MAC metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MacMetrics {
    /// TTIs processed
    pub ttis: u64,
    /// Most recent TTI seen
    pub last_tti: u32,
    /// Downlink PDUs handled
    pub rx_pdus: u64,
    /// Downlink bytes handled
    pub rx_bytes: u64,
    /// Uplink PDUs transmitted
    pub tx_pdus: u64,
    /// Uplink bytes transmitted
    pub tx_bytes: u64,
    /// Random-access completions applied
    pub ra_completions: u64,
    /// PHY reconfiguration completions applied
    pub phy_config_completions: u64,
}

impl MacMetricsShared {
    pub(crate) fn snapshot(&self) -> MacMetrics {
        MacMetrics {
            ttis: self.ttis.load(Ordering::Relaxed),
            last_tti: self.last_tti.load(Ordering::Relaxed),
            rx_pdus: self.rx_pdus.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_pdus: self.tx_pdus.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            ra_completions: self.ra_completions.load(Ordering::Relaxed),
            phy_config_completions: self.phy_config_completions.load(Ordering::Relaxed),
        }
    }
}

/// RLC counter block. `tx_pending`/`srb1_pending` track currently queued
/// uplink SDUs so non-consumer threads can watch queues drain.
#[derive(Debug, Default)]
pub struct RlcMetricsShared {
    pub(crate) tx_sdus: AtomicU64,
    pub(crate) tx_bytes: AtomicU64,
    pub(crate) rx_pdus: AtomicU64,
    pub(crate) tx_pending: AtomicU64,
    pub(crate) srb1_pending: AtomicU64,
}

/// RLC metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RlcMetrics {
    /// Uplink SDUs accepted
    pub tx_sdus: u64,
    /// Uplink bytes accepted
    pub tx_bytes: u64,
    /// Downlink PDUs handled
    pub rx_pdus: u64,
    /// Uplink SDUs queued and not yet transmitted
    pub tx_pending: u64,
    /// Queued SDUs on SRB1
    pub srb1_pending: u64,
}

impl RlcMetricsShared {
    pub(crate) fn snapshot(&self) -> RlcMetrics {
        RlcMetrics {
            tx_sdus: self.tx_sdus.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_pdus: self.rx_pdus.load(Ordering::Relaxed),
            tx_pending: self.tx_pending.load(Ordering::Relaxed),
            srb1_pending: self.srb1_pending.load(Ordering::Relaxed),
        }
    }
}

/// PDCP counter block.
#[derive(Debug, Default)]
pub struct PdcpMetricsShared {
    pub(crate) tx_sdus: AtomicU64,
    pub(crate) rx_pdus: AtomicU64,
}

/// PDCP metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PdcpMetrics {
    /// Uplink SDUs routed toward RLC
    pub tx_sdus: u64,
    /// Downlink PDUs delivered toward the gateway
    pub rx_pdus: u64,
}

impl PdcpMetricsShared {
    pub(crate) fn snapshot(&self) -> PdcpMetrics {
        PdcpMetrics {
            tx_sdus: self.tx_sdus.load(Ordering::Relaxed),
            rx_pdus: self.rx_pdus.load(Ordering::Relaxed),
        }
    }
}

/// RRC counter block.
#[derive(Debug, Default)]
pub struct RrcMetricsShared {
    pub(crate) state: AtomicU8,
    pub(crate) ttis: AtomicU64,
    pub(crate) last_tti: AtomicU32,
    pub(crate) cell_searches: AtomicU64,
    pub(crate) cells_found: AtomicU64,
    pub(crate) connection_establishments: AtomicU64,
    pub(crate) connection_losses: AtomicU64,
}

/// RRC metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RrcMetrics {
    /// Current RRC state
    pub state: RrcState,
    /// TTIs processed
    pub ttis: u64,
    /// Most recent TTI seen
    pub last_tti: u32,
    /// Cell searches requested
    pub cell_searches: u64,
    /// Searches that located a cell
    pub cells_found: u64,
    /// Connections established
    pub connection_establishments: u64,
    /// Connections lost
    pub connection_losses: u64,
}

impl RrcMetricsShared {
    pub(crate) fn snapshot(&self) -> RrcMetrics {
        RrcMetrics {
            state: RrcState::from_u8(self.state.load(Ordering::Relaxed)),
            ttis: self.ttis.load(Ordering::Relaxed),
            last_tti: self.last_tti.load(Ordering::Relaxed),
            cell_searches: self.cell_searches.load(Ordering::Relaxed),
            cells_found: self.cells_found.load(Ordering::Relaxed),
            connection_establishments: self.connection_establishments.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
        }
    }
}

/// NAS counter block.
#[derive(Debug, Default)]
pub struct NasMetricsShared {
    pub(crate) emm_state: AtomicU8,
    pub(crate) ttis: AtomicU64,
    pub(crate) last_tti: AtomicU32,
    pub(crate) attach_attempts: AtomicU64,
    pub(crate) attach_completions: AtomicU64,
    pub(crate) attach_timeouts: AtomicU64,
    pub(crate) detaches: AtomicU64,
}

/// NAS metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NasMetrics {
    /// Current EMM state
    pub emm_state: EmmState,
    /// TTIs processed
    pub ttis: u64,
    /// Most recent TTI seen
    pub last_tti: u32,
    /// Attach procedures started
    pub attach_attempts: u64,
    /// Attach procedures completed
    pub attach_completions: u64,
    /// Attach procedures abandoned on timer expiry
    pub attach_timeouts: u64,
    /// Detach procedures performed
    pub detaches: u64,
}

impl NasMetricsShared {
    pub(crate) fn snapshot(&self) -> NasMetrics {
        NasMetrics {
            emm_state: EmmState::from_u8(self.emm_state.load(Ordering::Relaxed)),
            ttis: self.ttis.load(Ordering::Relaxed),
            last_tti: self.last_tti.load(Ordering::Relaxed),
            attach_attempts: self.attach_attempts.load(Ordering::Relaxed),
            attach_completions: self.attach_completions.load(Ordering::Relaxed),
            attach_timeouts: self.attach_timeouts.load(Ordering::Relaxed),
            detaches: self.detaches.load(Ordering::Relaxed),
        }
    }
}

/// Scheduler counter block: tick processing statistics and backpressure
/// diagnostics published by the executor itself.
#[derive(Debug, Default)]
pub struct SchedMetricsShared {
    pub(crate) tti_summaries: AtomicU64,
    pub(crate) last_min_us: AtomicU64,
    pub(crate) last_avg_us: AtomicU64,
    pub(crate) last_max_us: AtomicU64,
    pub(crate) slow_ttis: AtomicU64,
    pub(crate) dropped_gw_sdus: AtomicU64,
    pub(crate) sync_queue_warnings: AtomicU64,
}

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchedMetrics {
    /// Completed latency windows (one summary each)
    pub tti_summaries: u64,
    /// Minimum TTI processing time in the last window (µs)
    pub last_min_us: u64,
    /// Average TTI processing time in the last window (µs)
    pub last_avg_us: u64,
    /// Maximum TTI processing time in the last window (µs)
    pub last_max_us: u64,
    /// TTIs that exceeded the warning threshold
    pub slow_ttis: u64,
    /// Loss-tolerant gateway SDUs dropped on a full queue
    pub dropped_gw_sdus: u64,
    /// Times the sync queue backlog exceeded its threshold
    pub sync_queue_warnings: u64,
}

impl SchedMetricsShared {
    pub(crate) fn snapshot(&self) -> SchedMetrics {
        SchedMetrics {
            tti_summaries: self.tti_summaries.load(Ordering::Relaxed),
            last_min_us: self.last_min_us.load(Ordering::Relaxed),
            last_avg_us: self.last_avg_us.load(Ordering::Relaxed),
            last_max_us: self.last_max_us.load(Ordering::Relaxed),
            slow_ttis: self.slow_ttis.load(Ordering::Relaxed),
            dropped_gw_sdus: self.dropped_gw_sdus.load(Ordering::Relaxed),
            sync_queue_warnings: self.sync_queue_warnings.load(Ordering::Relaxed),
        }
    }
}

/// The full set of shared counter blocks, created once at init and handed
/// out to the layers and the executor.
#[derive(Debug, Default)]
pub(crate) struct MetricsHandles {
    pub(crate) mac: std::sync::Arc<MacMetricsShared>,
    pub(crate) rlc: std::sync::Arc<RlcMetricsShared>,
    pub(crate) pdcp: std::sync::Arc<PdcpMetricsShared>,
    pub(crate) rrc: std::sync::Arc<RrcMetricsShared>,
    pub(crate) nas: std::sync::Arc<NasMetricsShared>,
    pub(crate) sched: std::sync::Arc<SchedMetricsShared>,
}

impl MetricsHandles {
    pub(crate) fn snapshot(&self) -> StackMetrics {
        StackMetrics {
            mac: self.mac.snapshot(),
            rlc: self.rlc.snapshot(),
            pdcp: self.pdcp.snapshot(),
            rrc: self.rrc.snapshot(),
            nas: self.nas.snapshot(),
            sched: self.sched.snapshot(),
        }
    }
}

/// Aggregate snapshot of every layer's published counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StackMetrics {
    /// MAC layer
    pub mac: MacMetrics,
    /// RLC layer
    pub rlc: RlcMetrics,
    /// PDCP layer
    pub pdcp: PdcpMetrics,
    /// RRC layer
    pub rrc: RrcMetrics,
    /// NAS layer
    pub nas: NasMetrics,
    /// Executor/scheduler
    pub sched: SchedMetrics,
}

impl StackMetrics {
    /// True when the stack has reached its fully attached state:
    /// EMM registered and RRC connected.
    pub fn is_registered(&self) -> bool {
        self.nas.emm_state == EmmState::Registered && self.rrc.state == RrcState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_published_counters() {
        let mac = MacMetricsShared::default();
        mac.ttis.fetch_add(5, Ordering::Relaxed);
        mac.last_tti.store(4, Ordering::Relaxed);

        let snap = mac.snapshot();
        assert_eq!(snap.ttis, 5);
        assert_eq!(snap.last_tti, 4);
    }

    #[test]
    fn test_is_registered_requires_both_layers() {
        let rrc = RrcMetricsShared::default();
        let nas = NasMetricsShared::default();
        let metrics = StackMetrics {
            mac: MacMetricsShared::default().snapshot(),
            rlc: RlcMetricsShared::default().snapshot(),
            pdcp: PdcpMetricsShared::default().snapshot(),
            rrc: rrc.snapshot(),
            nas: nas.snapshot(),
            sched: SchedMetricsShared::default().snapshot(),
        };
        assert!(!metrics.is_registered());

        rrc.state.store(RrcState::Connected as u8, Ordering::Relaxed);
        nas.emm_state.store(EmmState::Registered as u8, Ordering::Relaxed);
        let metrics = StackMetrics {
            rrc: rrc.snapshot(),
            nas: nas.snapshot(),
            ..metrics
        };
        assert!(metrics.is_registered());
    }
}
