//! Stack executor
//!
//! Owns the single consumer thread that serializes every protocol-layer
//! mutation. External producers (radio sync, gateway, lower MAC, background
//! workers) only ever enqueue tasks; the consumer pops them one at a time
//! and runs each with exclusive access to [`StackCore`]. No layer carries a
//! lock, and none needs one: the queue-plus-single-consumer shape is the
//! whole concurrency story.
//!
//! Lifecycle: `init` wires the layers and starts the thread, `stop` pushes
//! a terminating task so teardown happens in order with everything queued
//! before it, then joins. Tasks still queued behind the terminating task
//! are discarded; layer teardown has already run by then and cooperative
//! tasks check the running flag anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use rustue_common::config::{SimConfig, StackConfig};
use rustue_common::{Error, Tti};

use crate::gw::GwInterface;
use crate::layers::mac::{MacLayer, MacPduQueue};
use crate::layers::nas::{NasLayer, T3410_TICKS, T3411_TICKS};
use crate::layers::pdcp::PdcpLayer;
use crate::layers::rlc::RlcLayer;
use crate::layers::rrc::{RrcLayer, RrcState};
use crate::layers::usim::{SoftUsim, Usim};
use crate::layers::LCID_SRB1;
use crate::metrics::{MetricsHandles, StackMetrics};
use crate::multiqueue::{QueueConsumer, QueueId, QueueProducers, TaskMultiqueue};
use crate::pcap::FileSink;
use crate::phy::{CellSearchResult, FoundCell, PhyInterface};
use crate::procedures::RadioProcedures;
use crate::task::StackTask;
use crate::timers::TimerManager;
use crate::workers::WorkerPool;

/// Number of TTI durations accumulated before a min/avg/max summary is
/// emitted and the window resets.
pub const TTI_STAT_PERIOD: usize = 1000;

/// How long switch-off waits for the detach to leave on SRB1
/// (TS 24.301 §5.5.2.2).
const DETACH_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
struct QueueIds {
    ue: QueueId,
    sync: QueueId,
    gw: QueueId,
    mac: QueueId,
    background: QueueId,
}

/// Everything the consumer thread mutates: the protocol layers, the rolling
/// latency window and the lifecycle flag. Constructed on the controlling
/// thread during `init`, then moved into the consumer thread; afterwards
/// only tasks (which receive `&mut StackCore`) can touch it.
pub struct StackCore {
    running: Arc<AtomicBool>,
    sim: SimConfig,
    tti_stats: bool,
    tti_warn_threshold: Duration,
    sync_queue_warn_threshold: usize,
    queues: QueueProducers<StackTask>,
    qids: QueueIds,
    timers: Arc<TimerManager<StackCore>>,
    procedures: RadioProcedures,
    usim: Box<dyn Usim>,
    mac: MacLayer,
    rlc: RlcLayer,
    pdcp: PdcpLayer,
    rrc: RrcLayer,
    nas: NasLayer,
    metrics: MetricsHandles,
    proc_time: Vec<Duration>,
}

impl StackCore {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Per-TTI orchestration
    // ------------------------------------------------------------------

    /// One radio tick: layer hooks in fixed order (MAC before RRC before
    /// NAS), then exactly one timer step. The fixed order is a contract the
    /// layers depend on.
    pub(crate) fn run_tti_impl(&mut self, tti: Tti) {
        let start = Instant::now();

        self.mac.run_tti(tti, &mut self.rlc);
        self.rrc.run_tti(tti);
        self.nas.run_tti(tti);
        let fired = self.timers.step();
        for callback in fired {
            callback(self);
        }

        if self.tti_stats {
            self.calc_tti_stats(start.elapsed());
        }

        // diagnostic only: the radio pushing ticks faster than we drain them
        let depth = self.queues.size(self.qids.sync);
        if depth > self.sync_queue_warn_threshold {
            warn!(sync_queue_len = depth, "detected slow task processing");
            self.metrics
                .sched
                .sync_queue_warnings
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    fn calc_tti_stats(&mut self, duration: Duration) {
        let duration_us = duration.as_micros() as u64;
        if duration > self.tti_warn_threshold {
            warn!(proc_time_us = duration_us, "long TTI processing time");
            self.metrics.sched.slow_ttis.fetch_add(1, Ordering::Relaxed);
        }

        self.proc_time.push(duration);
        if self.proc_time.len() == TTI_STAT_PERIOD {
            let mut min_us = u64::MAX;
            let mut max_us = 0u64;
            let mut sum_us = 0u64;
            for d in &self.proc_time {
                let us = d.as_micros() as u64;
                min_us = min_us.min(us);
                max_us = max_us.max(us);
                sum_us += us;
            }
            let avg_us = sum_us / self.proc_time.len() as u64;
            info!(min_us, avg_us, max_us, "TTI proc_time (min,avg,max)");

            let sched = &self.metrics.sched;
            sched.last_min_us.store(min_us, Ordering::Relaxed);
            sched.last_avg_us.store(avg_us, Ordering::Relaxed);
            sched.last_max_us.store(max_us, Ordering::Relaxed);
            sched.tti_summaries.fetch_add(1, Ordering::Relaxed);

            self.proc_time.clear();
        }
    }

    // ------------------------------------------------------------------
    // Sync and data paths
    // ------------------------------------------------------------------

    pub(crate) fn in_sync_impl(&mut self) {
        if self.rrc.notify_in_sync() {
            self.attach_ready();
        }
    }

    pub(crate) fn out_of_sync_impl(&mut self) {
        if self.rrc.notify_out_of_sync() {
            self.nas.connection_lost();
        }
    }

    pub(crate) fn write_sdu_impl(&mut self, lcid: u32, sdu: Bytes) {
        self.pdcp.write_sdu(&mut self.rlc, lcid, sdu);
    }

    pub(crate) fn process_pdus_impl(&mut self) {
        for (lcid, pdu) in self.mac.take_pending() {
            self.rlc.handle_rx_pdu(lcid, &pdu);
            self.pdcp.handle_rx_pdu(lcid, pdu);
        }
    }

    // ------------------------------------------------------------------
    // Service state (attach/detach, airplane-mode simulation)
    // ------------------------------------------------------------------

    pub(crate) fn switch_on_impl(&mut self) {
        self.start_attach();

        if self.sim.airplane_t_on_ms > 0 {
            self.timers
                .defer(self.sim.airplane_t_on_ms, |core| core.disable_data_impl());
        }
    }

    fn start_attach(&mut self) {
        let Some(request) = self.nas.start_attach_request() else {
            return;
        };
        self.pdcp.write_sdu(&mut self.rlc, LCID_SRB1, request);
        self.arm_t3410();

        match self.rrc.state() {
            RrcState::Idle => {
                if self.rrc.begin_cell_search() {
                    self.procedures.start_cell_search();
                }
            }
            // already connected: the attach completes right away
            RrcState::Connected => self.attach_ready(),
            // camped: waiting for the sync notification; searching or
            // selecting: the running procedure's continuation carries on
            _ => {}
        }
    }

    fn attach_ready(&mut self) {
        if let Some(complete) = self.nas.rrc_established() {
            self.cancel_t3410();
            self.pdcp.write_sdu(&mut self.rlc, LCID_SRB1, complete);
        }
    }

    pub(crate) fn detach_impl(&mut self, switch_off: bool) {
        self.cancel_t3410();
        if let Some(id) = self.nas.take_t3411() {
            self.timers.cancel(id);
        }
        if let Some(request) = self.nas.detach_request(switch_off) {
            self.pdcp.write_sdu(&mut self.rlc, LCID_SRB1, request);
        }
        self.rrc.local_release();
    }

    pub(crate) fn enable_data_impl(&mut self) {
        info!("airplane mode off");
        self.switch_on_impl();
    }

    pub(crate) fn disable_data_impl(&mut self) {
        info!("airplane mode on");
        self.detach_impl(false);

        if self.sim.airplane_t_off_ms > 0 {
            self.timers
                .defer(self.sim.airplane_t_off_ms, |core| core.enable_data_impl());
        }
    }

    // ------------------------------------------------------------------
    // NAS guard timers
    // ------------------------------------------------------------------

    fn arm_t3410(&mut self) {
        let id = self.timers.defer(T3410_TICKS, |core| core.t3410_expired());
        self.nas.set_t3410(Some(id));
    }

    fn cancel_t3410(&mut self) {
        if let Some(id) = self.nas.take_t3410() {
            self.timers.cancel(id);
        }
    }

    fn t3410_expired(&mut self) {
        if self.nas.attach_timeout() {
            let id = self.timers.defer(T3411_TICKS, |core| core.t3411_expired());
            self.nas.set_t3411(Some(id));
        }
    }

    fn t3411_expired(&mut self) {
        self.nas.set_t3411(None);
        info!("T3411 expired, retrying attach");
        self.start_attach();
    }

    // ------------------------------------------------------------------
    // Background procedure continuations
    // ------------------------------------------------------------------

    pub(crate) fn cell_search_completed(&mut self, result: CellSearchResult) {
        if let Some(cell) = self.rrc.cell_search_completed(result) {
            self.procedures.start_cell_select(cell);
        }
        // no cell: stay idle, T3410/T3411 drive the retry
    }

    pub(crate) fn cell_select_completed(&mut self, cell: FoundCell, ok: bool) {
        if self.rrc.cell_select_completed(cell, ok) {
            self.procedures.start_prach_configuration();
        }
    }

    pub(crate) fn prach_config_completed(&mut self, ok: bool) {
        if ok {
            self.mac.notify_phy_config_completed();
        } else {
            warn!("PRACH configuration failed");
        }
    }

    pub(crate) fn ra_completed(&mut self) {
        self.mac.notify_ra_completed();
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Runs on the consumer thread, in order with every task queued before
    /// it. Flips the lifecycle flag so the drain loop exits afterwards.
    fn stop_impl(&mut self) {
        info!("stopping stack");
        self.running.store(false, Ordering::SeqCst);

        self.usim.stop();
        self.nas.stop();
        self.rrc.stop();

        self.rlc.stop();
        self.pdcp.stop();
        self.mac.stop();
    }
}

/// The LTE UE protocol stack.
///
/// `init` builds and starts it; the remaining methods are the producer
/// entry points, each a thin task-construction-plus-push wrapper that runs
/// later on the consumer thread. All entry points are no-ops once the
/// stack has stopped.
pub struct UeStack {
    running: Arc<AtomicBool>,
    queues: QueueProducers<StackTask>,
    qids: QueueIds,
    procedures: RadioProcedures,
    pool: WorkerPool,
    consumer: Option<JoinHandle<()>>,
    metrics: MetricsHandles,
    mac_rx: MacPduQueue,
}

impl UeStack {
    /// Wires the layers together, attaches capture sinks, and starts the
    /// consumer thread and worker pool.
    ///
    /// The identity module initializes first: a bad credential aborts
    /// before any thread exists, so a failed `init` leaks nothing.
    pub fn init(
        config: StackConfig,
        phy: Arc<dyn PhyInterface>,
        gw: Arc<dyn GwInterface>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let usim = SoftUsim::init(&config.usim)?;

        let mac_pcap = if config.pcap.enable {
            Some(FileSink::create(&config.pcap.filename)?)
        } else {
            None
        };
        let nas_pcap = if config.pcap.nas_enable {
            Some(FileSink::create(&config.pcap.nas_filename)?)
        } else {
            None
        };

        let mut multiqueue = TaskMultiqueue::new(config.scheduler.queue_capacity);
        let qids = QueueIds {
            ue: multiqueue.add_queue(),
            sync: multiqueue.add_queue(),
            gw: multiqueue.add_queue(),
            mac: multiqueue.add_queue(),
            background: multiqueue.add_queue(),
        };
        let (producers, consumer_half) = multiqueue.into_parts();

        let pool = WorkerPool::start(config.scheduler.worker_threads)?;
        let timers = Arc::new(TimerManager::new());
        let metrics = MetricsHandles::default();
        let mac_rx = MacPduQueue::new();
        let running = Arc::new(AtomicBool::new(true));

        let procedures = RadioProcedures::new(
            pool.handle(),
            producers.clone(),
            qids.background,
            Arc::clone(&phy),
        );

        let hex_limit = config.log.hex_limit;
        let mut mac = MacLayer::new(mac_rx.clone(), Arc::clone(&metrics.mac), hex_limit);
        if let Some(sink) = mac_pcap {
            mac.start_pcap(Box::new(sink));
        }
        let rlc = RlcLayer::new(Arc::clone(&metrics.rlc));
        let pdcp = PdcpLayer::new(gw, Arc::clone(&metrics.pdcp), hex_limit);
        let rrc = RrcLayer::new(Arc::clone(&metrics.rrc));
        let mut nas = NasLayer::new(usim.imsi().to_string(), Arc::clone(&metrics.nas));
        if let Some(sink) = nas_pcap {
            nas.start_pcap(Box::new(sink));
        }

        let core = StackCore {
            running: Arc::clone(&running),
            sim: config.sim.clone(),
            tti_stats: config.scheduler.tti_stats,
            tti_warn_threshold: Duration::from_micros(config.scheduler.tti_warn_threshold_us),
            sync_queue_warn_threshold: config.scheduler.sync_queue_warn_threshold,
            queues: producers.clone(),
            qids,
            timers,
            procedures: procedures.clone(),
            usim: Box::new(usim),
            mac,
            rlc,
            pdcp,
            rrc,
            nas,
            metrics: MetricsHandles {
                mac: Arc::clone(&metrics.mac),
                rlc: Arc::clone(&metrics.rlc),
                pdcp: Arc::clone(&metrics.pdcp),
                rrc: Arc::clone(&metrics.rrc),
                nas: Arc::clone(&metrics.nas),
                sched: Arc::clone(&metrics.sched),
            },
            proc_time: Vec::with_capacity(TTI_STAT_PERIOD),
        };

        let consumer = std::thread::Builder::new()
            .name("stack".into())
            .spawn(move || Self::consumer_loop(core, consumer_half))?;

        info!(
            workers = config.scheduler.worker_threads,
            queue_capacity = config.scheduler.queue_capacity,
            "stack running"
        );

        Ok(Self {
            running,
            queues: producers,
            qids,
            procedures,
            pool,
            consumer: Some(consumer),
            metrics,
            mac_rx,
        })
    }

    fn consumer_loop(mut core: StackCore, mut queues: QueueConsumer<StackTask>) {
        let runtime = match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "failed to build consumer runtime");
                core.running.store(false, Ordering::SeqCst);
                return;
            }
        };

        runtime.block_on(async {
            while core.is_running() {
                match queues.wait_pop().await {
                    Some(task) => task(&mut core),
                    None => break,
                }
            }
        });
        debug!("consumer thread exiting");
    }

    /// True until the terminating task has run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle to the MAC downlink buffer for the lower-MAC context.
    /// Buffer PDUs here, then request [`UeStack::process_pdus`].
    pub fn mac_pdu_queue(&self) -> MacPduQueue {
        self.mac_rx.clone()
    }

    // ------------------------------------------------------------------
    // Sync interface (radio timing source)
    // ------------------------------------------------------------------

    /// Radio reports synchronization acquired. Must-deliver.
    pub fn in_sync(&self) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.sync, Box::new(|core| core.in_sync_impl()));
    }

    /// Radio reports synchronization lost. Must-deliver.
    pub fn out_of_sync(&self) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.sync, Box::new(|core| core.out_of_sync_impl()));
    }

    /// Radio signals one TTI. Must-deliver; blocks the radio thread if the
    /// sync queue is full rather than ever dropping a tick.
    pub fn run_tti(&self, tti: Tti) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.sync, Box::new(move |core| core.run_tti_impl(tti)));
    }

    // ------------------------------------------------------------------
    // Gateway interface (application data)
    // ------------------------------------------------------------------

    /// Accepts one uplink SDU for the given logical channel.
    ///
    /// With `blocking = false` a full queue drops the SDU (warn + counter)
    /// and the caller is never stalled; with `blocking = true` the caller
    /// waits for space.
    pub fn write_sdu(&self, lcid: u32, sdu: Bytes, blocking: bool) {
        if !self.is_running() {
            return;
        }
        let task: StackTask = Box::new(move |core| core.write_sdu_impl(lcid, sdu));
        if blocking {
            self.queues.push(self.qids.gw, task);
        } else if !self.queues.try_push(self.qids.gw, task) {
            warn!(lcid, "gateway SDU discarded, queue full");
            self.metrics
                .sched
                .dropped_gw_sdus
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // Lower-MAC interface
    // ------------------------------------------------------------------

    /// Requests deferred handling of PDUs buffered via
    /// [`UeStack::mac_pdu_queue`].
    pub fn process_pdus(&self) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.mac, Box::new(|core| core.process_pdus_impl()));
    }

    /// Random access finished with the given C-RNTI: install it in the PHY
    /// off-thread, then let MAC settle via the continuation.
    pub fn wait_ra_completion(&self, rnti: u16) {
        if !self.is_running() {
            return;
        }
        self.procedures.wait_ra_completion(rnti);
    }

    // ------------------------------------------------------------------
    // Service control
    // ------------------------------------------------------------------

    /// Switches the service on: starts the attach procedure and, when
    /// configured, arms the airplane-mode simulation.
    /// Returns false if the stack is not running.
    pub fn switch_on(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.queues
            .push(self.qids.ue, Box::new(|core| core.switch_on_impl()));
        true
    }

    /// Switches the service off: detaches with the switch-off flag and
    /// waits up to 5 s for the detach to leave on SRB1 (the radio must
    /// keep ticking for it to drain). Returns whether it was sent.
    pub fn switch_off(&self) -> bool {
        if !self.is_running() {
            return false;
        }

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.queues.push(
            self.qids.ue,
            Box::new(move |core| {
                core.detach_impl(true);
                let _ = done_tx.send(());
            }),
        );

        let deadline = Instant::now() + DETACH_DRAIN_TIMEOUT;
        if done_rx.blocking_recv().is_err() {
            return false;
        }
        while self.metrics.rlc.snapshot().srb1_pending > 0 {
            if Instant::now() >= deadline {
                warn!("detach couldn't be sent before timeout");
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Re-enables the data service (attach).
    pub fn enable_data(&self) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.ue, Box::new(|core| core.enable_data_impl()));
    }

    /// Disables the data service (detach, scheduled re-attach when the
    /// airplane-mode simulation is configured).
    pub fn disable_data(&self) {
        if !self.is_running() {
            return;
        }
        self.queues
            .push(self.qids.ue, Box::new(|core| core.disable_data_impl()));
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    /// Snapshot of every layer's published counters. Reads atomics only;
    /// callable from any thread, never touches layer state.
    pub fn metrics(&self) -> StackMetrics {
        self.metrics.snapshot()
    }

    /// Stops the stack: the terminating task tears the layers down in
    /// order with everything queued before it, then the consumer thread
    /// and the worker pool are joined. Reentrant; later calls are no-ops.
    pub fn stop(&mut self) {
        if let Some(handle) = self.consumer.take() {
            if self.is_running() {
                self.queues
                    .push(self.qids.ue, Box::new(|core| core.stop_impl()));
            }
            if handle.join().is_err() {
                error!("consumer thread panicked");
            }
        }
        self.pool.stop();
    }
}

impl Drop for UeStack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{LoopbackGw, SimPhy, SimPhyConfig};
    use std::sync::Mutex;
    use std::thread::ThreadId;

    fn test_config() -> StackConfig {
        StackConfig::default()
    }

    fn start_stack(config: StackConfig) -> (UeStack, Arc<SimPhy>, Arc<LoopbackGw>) {
        let phy = Arc::new(SimPhy::default());
        let gw = Arc::new(LoopbackGw::new());
        let stack = UeStack::init(
            config,
            Arc::clone(&phy) as Arc<dyn PhyInterface>,
            Arc::clone(&gw) as Arc<dyn GwInterface>,
        )
        .unwrap();
        (stack, phy, gw)
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        check()
    }

    #[test]
    fn test_init_fails_on_bad_imsi() {
        let mut config = test_config();
        config.usim.imsi = "not-an-imsi".into();

        let phy = Arc::new(SimPhy::default());
        let gw = Arc::new(LoopbackGw::new());
        let result = UeStack::init(config, phy, gw);
        assert!(matches!(result, Err(Error::Identity(_))));
    }

    #[test]
    fn test_ticks_drive_layer_hooks_in_tti_order() {
        let (mut stack, _phy, _gw) = start_stack(test_config());

        for tti in 0..50u32 {
            stack.run_tti(Tti::new(tti));
        }

        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().mac.ttis == 50
        }));
        let metrics = stack.metrics();
        assert_eq!(metrics.mac.ttis, 50);
        assert_eq!(metrics.rrc.ttis, 50);
        assert_eq!(metrics.nas.ttis, 50);
        assert_eq!(metrics.mac.last_tti, 49);
        assert_eq!(metrics.rrc.last_tti, 49);
        assert_eq!(metrics.nas.last_tti, 49);

        stack.stop();
    }

    #[test]
    fn test_all_tasks_run_on_one_consumer_thread() {
        let (mut stack, _phy, _gw) = start_stack(test_config());

        let seen: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));
        let queues = [
            stack.qids.ue,
            stack.qids.sync,
            stack.qids.gw,
            stack.qids.mac,
            stack.qids.background,
        ];
        for queue in queues {
            let seen = Arc::clone(&seen);
            stack.queues.push(
                queue,
                Box::new(move |_core| {
                    seen.lock().unwrap().push(std::thread::current().id());
                }),
            );
        }
        // a continuation posted from a foreign thread lands on the same
        // consumer, exactly like worker-pool completions do
        {
            let seen = Arc::clone(&seen);
            let producers = stack.queues.clone();
            let background = stack.qids.background;
            std::thread::spawn(move || {
                producers.push(
                    background,
                    Box::new(move |_core| {
                        seen.lock().unwrap().push(std::thread::current().id());
                    }),
                );
            })
            .join()
            .unwrap();
        }

        assert!(wait_until(Duration::from_secs(2), || {
            seen.lock().unwrap().len() == 6
        }));
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|id| *id == seen[0]));
        assert_ne!(seen[0], std::thread::current().id());

        drop(seen);
        stack.stop();
    }

    #[test]
    fn test_latency_window_emits_summary_every_1000_ticks() {
        let (mut stack, _phy, _gw) = start_stack(test_config());

        for tti in 0..1000u32 {
            stack.run_tti(Tti::new(tti));
        }
        assert!(wait_until(Duration::from_secs(5), || {
            stack.metrics().sched.tti_summaries == 1
        }));

        let sched = stack.metrics().sched;
        assert!(sched.last_min_us <= sched.last_avg_us);
        assert!(sched.last_avg_us <= sched.last_max_us);

        for tti in 1000..2000u32 {
            stack.run_tti(Tti::new(tti));
        }
        assert!(wait_until(Duration::from_secs(5), || {
            stack.metrics().sched.tti_summaries == 2
        }));

        stack.stop();
    }

    #[test]
    fn test_background_continuation_applies_within_deadline() {
        // SimPhy sleeps 50 ms in cell_search; the continuation must land
        // on the consumer thread well within 200 ms
        let (mut stack, _phy, _gw) = start_stack(test_config());

        assert!(stack.switch_on());
        assert!(wait_until(Duration::from_millis(200), || {
            stack.metrics().rrc.cells_found == 1
        }));

        stack.stop();
    }

    #[test]
    fn test_attach_completes_after_sync() {
        let (mut stack, phy, _gw) = start_stack(test_config());

        stack.switch_on();
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().rrc.state == RrcState::Camped
        }));
        assert_eq!(phy.selects(), 1);

        stack.in_sync();
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().is_registered()
        }));

        let metrics = stack.metrics();
        assert_eq!(metrics.nas.attach_attempts, 1);
        assert_eq!(metrics.nas.attach_completions, 1);
        assert_eq!(metrics.rrc.cell_searches, 1);

        stack.stop();
    }

    #[test]
    fn test_ra_completion_reaches_mac_via_continuation() {
        let (mut stack, phy, _gw) = start_stack(test_config());

        stack.wait_ra_completion(0x4601);
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().mac.ra_completions == 1
        }));
        assert_eq!(phy.crnti(), 0x4601);

        stack.stop();
    }

    #[test]
    fn test_uplink_and_downlink_data_paths() {
        let (mut stack, _phy, gw) = start_stack(test_config());

        // uplink: gateway SDU reaches RLC, then MAC transmits it on a tick
        stack.write_sdu(3, Bytes::from_static(&[1, 2, 3]), true);
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().rlc.tx_sdus == 1
        }));
        stack.run_tti(Tti::new(0));
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().mac.tx_pdus == 1
        }));

        // downlink: buffered lower-MAC PDU climbs to the gateway
        stack.mac_pdu_queue().push_pdu(3, Bytes::from_static(&[9, 8]));
        stack.process_pdus();
        assert!(wait_until(Duration::from_secs(2), || gw.received_count() == 1));

        let metrics = stack.metrics();
        assert_eq!(metrics.mac.rx_pdus, 1);
        assert_eq!(metrics.pdcp.rx_pdus, 1);

        stack.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_entries_become_noops() {
        let (mut stack, _phy, _gw) = start_stack(test_config());

        stack.stop();
        stack.stop();

        assert!(!stack.is_running());
        assert!(!stack.switch_on());
        stack.run_tti(Tti::new(0));
        stack.in_sync();
        stack.write_sdu(3, Bytes::from_static(&[1]), false);
        assert_eq!(stack.metrics().mac.ttis, 0);
    }

    #[test]
    fn test_no_cell_found_leaves_rrc_idle() {
        let phy = Arc::new(SimPhy::new(SimPhyConfig {
            cell: None,
            search_delay: Duration::from_millis(5),
            ..SimPhyConfig::default()
        }));
        let gw = Arc::new(LoopbackGw::new());
        let mut stack = UeStack::init(test_config(), Arc::clone(&phy) as _, gw).unwrap();

        stack.switch_on();
        assert!(wait_until(Duration::from_secs(2), || phy.searches() == 1));
        assert!(wait_until(Duration::from_secs(2), || {
            stack.metrics().rrc.state == RrcState::Idle
        }));
        // the attach stays pending until its guard timer would fire
        assert_eq!(stack.metrics().nas.attach_completions, 0);

        stack.stop();
    }
}
