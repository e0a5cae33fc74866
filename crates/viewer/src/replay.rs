//! Execution replay.
//!
//! Every executable block is sent to the kernel in document order. Replies
//! are routed by kind: output messages to the block's output area, status
//! to the busy indicator, comm traffic to the comm registry as it arrives.
//! Anything else is dropped.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nbdash_kernel_client::{CommManager, KernelChannel, SessionError};
use nbdash_protocol::{IoPub, KernelMessage};
use serde_json::Value;

use crate::busy::BusyIndicator;
use crate::comms::CommRegistry;
use crate::page::PageParams;

/// Renders the outputs of one page block.
pub trait OutputSink {
    fn consume(&mut self, block: usize, msg: &IoPub);
}

/// nbformat outputs of one block, built from the message stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputArea {
    outputs: Vec<Value>,
    clear_pending: bool,
}

impl OutputArea {
    pub fn consume(&mut self, msg: &IoPub) {
        if let IoPub::ClearOutput(clear) = msg {
            if clear.wait {
                self.clear_pending = true;
            } else {
                self.outputs.clear();
            }
            return;
        }
        if std::mem::take(&mut self.clear_pending) {
            self.outputs.clear();
        }
        if let IoPub::Stream(stream) = msg {
            // Consecutive chunks of one stream render as one block of text.
            if let Some(last) = self.outputs.last_mut() {
                let same_stream = last.get("output_type").and_then(Value::as_str) == Some("stream")
                    && last.get("name").and_then(Value::as_str) == Some(stream.name.as_str());
                if same_stream {
                    let text = last.get("text").and_then(Value::as_str).unwrap_or("");
                    let merged = format!("{text}{}", stream.text);
                    last["text"] = Value::from(merged);
                    return;
                }
            }
        }
        if let Some(output) = msg.to_output() {
            self.outputs.push(output);
        }
    }

    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }
}

/// Output areas for every block that produced something.
#[derive(Debug, Clone, Default)]
pub struct RecordedOutputs {
    areas: BTreeMap<usize, OutputArea>,
}

impl RecordedOutputs {
    pub fn area(&self, block: usize) -> Option<&OutputArea> {
        self.areas.get(&block)
    }

    pub fn areas(&self) -> impl Iterator<Item = (usize, &OutputArea)> {
        self.areas.iter().map(|(i, a)| (*i, a))
    }
}

impl OutputSink for RecordedOutputs {
    fn consume(&mut self, block: usize, msg: &IoPub) {
        self.areas.entry(block).or_default().consume(msg);
    }
}

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub executed: usize,
    pub outputs: usize,
    /// `comm_msg` messages handed to a connected comm.
    pub comm_messages: usize,
    pub dropped: usize,
}

/// Kernel-side state of a viewer page.
pub struct KernelRuntime<C: KernelChannel> {
    channel: C,
    busy: BusyIndicator,
    comms: CommRegistry,
}

impl<C: KernelChannel> KernelRuntime<C> {
    pub fn new(channel: C, busy_window: Duration) -> Self {
        Self {
            channel,
            busy: BusyIndicator::new(busy_window),
            comms: CommRegistry::default(),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    pub fn comms(&self) -> &CommRegistry {
        &self.comms
    }

    /// Settle the busy indicator; see [`BusyIndicator::tick`].
    pub fn tick(&mut self, now: Instant) -> Option<bool> {
        self.busy.tick(now)
    }

    /// Run every executable block of `page` in notebook order, routing
    /// replies into `sink`. Stops at the first block the channel fails to
    /// execute.
    pub fn execute_all(&mut self, page: &PageParams, sink: &mut dyn OutputSink) -> Result<ReplaySummary, SessionError> {
        let mut summary = ReplaySummary::default();
        for (index, block) in page.executable_blocks() {
            let mut router = Router {
                block: index,
                busy: &mut self.busy,
                comms: &mut self.comms,
                sink: &mut *sink,
                summary: &mut summary,
            };
            self.channel.execute(&block.source, &mut |msg: KernelMessage, manager: &mut dyn CommManager| {
                router.route(&msg, manager)
            })?;
            summary.executed += 1;
        }
        log::info!(
            "replayed {} blocks ({} outputs, {} comm messages, {} messages dropped)",
            summary.executed,
            summary.outputs,
            summary.comm_messages,
            summary.dropped
        );
        Ok(summary)
    }
}

/// Routes the replies to one block.
struct Router<'a> {
    block: usize,
    busy: &'a mut BusyIndicator,
    comms: &'a mut CommRegistry,
    sink: &'a mut dyn OutputSink,
    summary: &'a mut ReplaySummary,
}

impl Router<'_> {
    fn route(&mut self, msg: &KernelMessage, manager: &mut dyn CommManager) {
        let block = self.block;
        if let Some(status) = msg.status() {
            self.busy.status_changed(status, Instant::now());
            return;
        }
        if let Some(open) = msg.comm_open() {
            self.comms.on_comm_open(manager, &open);
            return;
        }
        if let Some(comm) = msg.comm_msg() {
            if self.comms.on_comm_msg(manager, &comm) {
                self.summary.comm_messages += 1;
            } else {
                log::debug!("dropping message for unknown comm {}", comm.comm_id);
                self.summary.dropped += 1;
            }
            return;
        }
        if let Some(close) = msg.comm_close() {
            if !self.comms.on_comm_close(manager, &close) {
                self.summary.dropped += 1;
            }
            return;
        }
        match msg.iopub() {
            Ok(Some(output)) => {
                self.sink.consume(block, &output);
                self.summary.outputs += 1;
            }
            Ok(None) => {
                log::debug!("dropping {} message for block {block}", msg.msg_type());
                self.summary.dropped += 1;
            }
            Err(e) => {
                log::debug!("dropping malformed {} message for block {block}: {e}", msg.msg_type());
                self.summary.dropped += 1;
            }
        }
    }
}
