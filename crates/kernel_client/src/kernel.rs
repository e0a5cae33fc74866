//! Kernel message transport.

use nbdash_protocol::KernelMessage;
use serde_json::Value;

use crate::session::SessionError;

/// Client side of the kernel's comms.
pub trait CommManager {
    /// Open the client side of a comm the kernel announced.
    fn connect_to_comm(&mut self, target_name: &str, comm_id: &str);

    /// Hand a `comm_msg` payload to a connected comm.
    fn deliver(&mut self, comm_id: &str, data: &Value);

    /// The kernel closed a connected comm.
    fn close_comm(&mut self, _comm_id: &str) {}
}

/// Connection to a running kernel's channels. The websocket transport
/// lives with the embedder.
pub trait KernelChannel {
    /// Send `code` as an `execute_request` and feed every reply to
    /// `on_message` until the kernel goes idle for it. The callback gets
    /// the channel's comm side so comms opened mid-execution can be
    /// connected before their first message arrives.
    fn execute(
        &mut self,
        code: &str,
        on_message: &mut dyn FnMut(KernelMessage, &mut dyn CommManager),
    ) -> Result<(), SessionError>;
}
