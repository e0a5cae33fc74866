//! Comm channels opened by the kernel.

use std::collections::BTreeMap;

use nbdash_kernel_client::CommManager;
use nbdash_protocol::{CommMsg, CommOpen};

/// Comms the page is connected to, by comm id. Connections are kept until
/// the kernel closes them.
#[derive(Debug, Clone, Default)]
pub struct CommRegistry {
    open: BTreeMap<String, String>,
}

impl CommRegistry {
    /// Connect the client side of a comm the kernel opened. A comm id seen
    /// before is not connected twice.
    pub fn on_comm_open(&mut self, comms: &mut dyn CommManager, open: &CommOpen) -> bool {
        if self.open.contains_key(&open.comm_id) {
            log::debug!("comm {} already connected", open.comm_id);
            return false;
        }
        comms.connect_to_comm(&open.target_name, &open.comm_id);
        self.open.insert(open.comm_id.clone(), open.target_name.clone());
        log::debug!("connected comm {} ({})", open.comm_id, open.target_name);
        true
    }

    /// Deliver a message to its comm. Returns false for comms never
    /// connected (or already closed).
    pub fn on_comm_msg(&mut self, comms: &mut dyn CommManager, msg: &CommMsg) -> bool {
        if !self.open.contains_key(&msg.comm_id) {
            return false;
        }
        comms.deliver(&msg.comm_id, &msg.data);
        true
    }

    pub fn on_comm_close(&mut self, comms: &mut dyn CommManager, msg: &CommMsg) -> bool {
        if self.open.remove(&msg.comm_id).is_none() {
            return false;
        }
        comms.close_comm(&msg.comm_id);
        log::debug!("comm {} closed", msg.comm_id);
        true
    }

    pub fn target(&self, comm_id: &str) -> Option<&str> {
        self.open.get(comm_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Log(Vec<String>);

    impl CommManager for Log {
        fn connect_to_comm(&mut self, target_name: &str, comm_id: &str) {
            self.0.push(format!("connect {target_name} {comm_id}"));
        }
        fn deliver(&mut self, comm_id: &str, data: &Value) {
            self.0.push(format!("msg {comm_id} {data}"));
        }
        fn close_comm(&mut self, comm_id: &str) {
            self.0.push(format!("close {comm_id}"));
        }
    }

    fn open(id: &str) -> CommOpen {
        CommOpen { comm_id: id.into(), target_name: "jupyter.widget".into(), data: Value::Null, target_module: None }
    }

    fn msg(id: &str) -> CommMsg {
        CommMsg { comm_id: id.into(), data: json!(1) }
    }

    #[test]
    fn test_messages_only_reach_connected_comms() {
        let mut registry = CommRegistry::default();
        let mut log = Log::default();

        assert!(!registry.on_comm_msg(&mut log, &msg("w1")));
        assert!(registry.on_comm_open(&mut log, &open("w1")));
        assert!(!registry.on_comm_open(&mut log, &open("w1")));
        assert!(registry.on_comm_msg(&mut log, &msg("w1")));
        assert!(registry.on_comm_close(&mut log, &msg("w1")));
        assert!(!registry.on_comm_msg(&mut log, &msg("w1")));
        assert!(registry.is_empty());

        assert_eq!(log.0, vec!["connect jupyter.widget w1", "msg w1 1", "close w1"]);
    }
}
