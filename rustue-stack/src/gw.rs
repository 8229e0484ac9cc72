//! Gateway (application data) collaborator boundary
//!
//! The gateway owns the user-plane endpoint (e.g. a TUN device). Uplink
//! traffic enters the stack through the executor's `write_sdu` entry point;
//! downlink traffic leaves through this trait once it has climbed
//! MAC → RLC → PDCP on the consumer thread.

use bytes::Bytes;

/// Downlink delivery surface of the gateway collaborator.
///
/// Called from the consumer thread; implementations that hand the payload
/// to another thread must do their own queueing.
pub trait GwInterface: Send + Sync {
    /// Delivers one downlink SDU for the given logical channel.
    fn deliver_downlink(&self, lcid: u32, sdu: Bytes);
}
