//! rustue stack library
//!
//! The control-plane executor of an LTE UE protocol stack. Many producers
//! (radio sync, application data, lower MAC, background workers) feed task
//! queues; one consumer thread drains them and is the only thread that ever
//! mutates the protocol layers (MAC, RLC, PDCP, RRC, NAS). Long blocking
//! radio procedures run on a small worker pool and post their results back
//! as continuation tasks.
//!
//! # Architecture
//!
//! - [`task`] - the deferred work primitive
//! - [`multiqueue`] - named FIFO queues multiplexed to the single consumer
//! - [`timers`] - one-shot deferred callbacks stepped once per TTI
//! - [`workers`] - the background worker pool for blocking PHY operations
//! - [`executor`] - the stack lifecycle, tick orchestration and entry points
//! - [`layers`] - the protocol layer shells the executor drives
//! - [`phy`], [`gw`], [`pcap`] - collaborator boundaries
//! - [`sim`] - simulated collaborators for the binary and tests

pub mod executor;
pub mod gw;
pub mod layers;
pub mod metrics;
pub mod multiqueue;
pub mod pcap;
pub mod phy;
pub mod procedures;
pub mod sim;
pub mod task;
pub mod timers;
pub mod workers;

// Re-export the surface most users need
pub use executor::{StackCore, UeStack, TTI_STAT_PERIOD};
pub use gw::GwInterface;
pub use layers::mac::MacPduQueue;
pub use layers::nas::EmmState;
pub use layers::rrc::RrcState;
pub use layers::{LCID_DRB1, LCID_SRB1};
pub use metrics::StackMetrics;
pub use multiqueue::{QueueConsumer, QueueId, QueueProducers, TaskMultiqueue};
pub use pcap::PcapSink;
pub use phy::{CellSearchResult, FoundCell, PhyInterface};
pub use sim::{LoopbackGw, SimPhy, SimPhyConfig};
pub use task::{BackgroundJob, StackTask, TaskMessage};
pub use timers::{TimerId, TimerManager};
pub use workers::{WorkerHandle, WorkerPool};

pub use rustue_common::{Error, StackConfig, Tti};
