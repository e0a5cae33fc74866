//! Wire types for the standalone dashboard viewer.
//!
//! Two protocols meet here:
//!
//! - the container provisioning endpoint (`POST {base}/api/spawn/`), which
//!   hands out a notebook server for the viewer to run code against;
//! - the notebook server's REST API and kernel messaging protocol
//!   (sessions, kernels, IOPub messages).
//!
//! Only the fields the viewer reads or writes are modelled. Everything is
//! plain JSON through serde.
//!
//! # Usage
//!
//! ```ignore
//! use nbdash_protocol::{IoPub, KernelMessage};
//!
//! let msg: KernelMessage = serde_json::from_str(&frame)?;
//! if let Some(output) = msg.iopub()? {
//!     render(output);
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kernel messaging protocol version sent in headers.
pub const PROTOCOL_VERSION: &str = "5.0";

// =============================================================================
// Container provisioning
// =============================================================================

/// Status the provisioning endpoint reports when it has no free containers.
pub const SPAWN_STATUS_FULL: &str = "full";

/// Form body (`image_name=...`) of `POST {base}/api/spawn/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub image_name: String,
}

/// Response of the spawn endpoint. Older servers return a relative `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SpawnResponse {
    pub fn is_full(&self) -> bool {
        self.status.as_deref() == Some(SPAWN_STATUS_FULL)
    }
}

// =============================================================================
// Notebook server REST API
// =============================================================================

/// Kernel reference inside session bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpecRef {
    pub name: String,
}

/// Body of `POST {base}/api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreate {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub kernel: KernelSpecRef,
}

impl SessionCreate {
    /// A notebook session for `path` running `kernel_name`.
    pub fn notebook(path: &str, kernel_name: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            path: path.to_string(),
            name,
            kind: "notebook".to_string(),
            kernel: KernelSpecRef { name: kernel_name.to_string() },
        }
    }
}

/// Body of `POST {base}/api/kernels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelCreate {
    pub name: String,
}

/// A running kernel as listed by `GET {base}/api/kernels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// A session as returned by `POST {base}/api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub path: String,
    pub kernel: KernelInfo,
}

// =============================================================================
// Kernel messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_id: String,
    pub msg_type: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl MessageHeader {
    pub fn new(msg_type: &str, session: &str) -> Self {
        Self {
            msg_id: uuid::Uuid::new_v4().to_string(),
            msg_type: msg_type.to_string(),
            session: session.to_string(),
            username: "nbdash".to_string(),
            date: None,
            version: default_version(),
        }
    }
}

/// One message on a kernel channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMessage {
    pub header: MessageHeader,
    /// Empty object when the message has no parent.
    #[serde(default)]
    pub parent_header: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl KernelMessage {
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    /// `msg_id` of the request this message answers.
    pub fn parent_msg_id(&self) -> Option<&str> {
        self.parent_header.get("msg_id")?.as_str()
    }

    /// `execute_request` on the shell channel.
    pub fn execute_request(session: &str, code: &str) -> Self {
        let request = ExecuteRequest::new(code);
        Self {
            header: MessageHeader::new("execute_request", session),
            parent_header: Value::Object(Map::new()),
            metadata: Map::new(),
            content: serde_json::to_value(request).unwrap_or(Value::Null),
            channel: Some("shell".to_string()),
        }
    }

    /// The output-carrying IOPub content of this message, or `None` for any
    /// other kind.
    pub fn iopub(&self) -> Result<Option<IoPub>, serde_json::Error> {
        IoPub::parse(self.msg_type(), &self.content)
    }

    /// Kernel status carried by a `status` message.
    pub fn status(&self) -> Option<KernelStatus> {
        if self.msg_type() != "status" {
            return None;
        }
        let state = self.content.get("execution_state")?.as_str()?;
        Some(KernelStatus::parse(state))
    }

    /// Comm announced by a `comm_open` message.
    pub fn comm_open(&self) -> Option<CommOpen> {
        if self.msg_type() != "comm_open" {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }

    /// Payload of a `comm_msg` message.
    pub fn comm_msg(&self) -> Option<CommMsg> {
        if self.msg_type() != "comm_msg" {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }

    /// Comm closed by a `comm_close` message.
    pub fn comm_close(&self) -> Option<CommMsg> {
        if self.msg_type() != "comm_close" {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    pub user_expressions: Map<String, Value>,
    pub allow_stdin: bool,
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            silent: false,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: false,
            stop_on_error: true,
        }
    }
}

/// Kernel execution state from `status` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelStatus {
    Starting,
    Idle,
    Busy,
    Restarting,
    Dead,
    Unknown,
}

impl KernelStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "starting" => KernelStatus::Starting,
            "idle" => KernelStatus::Idle,
            "busy" => KernelStatus::Busy,
            "restarting" => KernelStatus::Restarting,
            "dead" => KernelStatus::Dead,
            _ => KernelStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KernelStatus::Starting => "starting",
            KernelStatus::Idle => "idle",
            KernelStatus::Busy => "busy",
            KernelStatus::Restarting => "restarting",
            KernelStatus::Dead => "dead",
            KernelStatus::Unknown => "unknown",
        }
    }

    pub fn is_busy(self) -> bool {
        self == KernelStatus::Busy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommOpen {
    pub comm_id: String,
    pub target_name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_module: Option<String>,
}

/// Content of `comm_msg` and `comm_close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommMsg {
    pub comm_id: String,
    #[serde(default)]
    pub data: Value,
}

// =============================================================================
// IOPub output messages
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOutput {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContent {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    #[serde(default)]
    pub execution_count: Option<u64>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// The IOPub message kinds an output area renders.
#[derive(Debug, Clone, PartialEq)]
pub enum IoPub {
    ClearOutput(ClearOutput),
    Stream(StreamContent),
    DisplayData(DisplayData),
    ExecuteResult(ExecuteResult),
    Error(ErrorContent),
}

impl IoPub {
    /// `msg_type` values this enum covers.
    pub const KINDS: [&'static str; 5] = ["clear_output", "stream", "display_data", "execute_result", "error"];

    /// Decode `content` for `msg_type`. Unrecognized kinds are `Ok(None)`.
    pub fn parse(msg_type: &str, content: &Value) -> Result<Option<Self>, serde_json::Error> {
        let parsed = match msg_type {
            "clear_output" => IoPub::ClearOutput(serde_json::from_value(content.clone())?),
            "stream" => IoPub::Stream(serde_json::from_value(content.clone())?),
            "display_data" => IoPub::DisplayData(serde_json::from_value(content.clone())?),
            "execute_result" => IoPub::ExecuteResult(serde_json::from_value(content.clone())?),
            "error" => IoPub::Error(serde_json::from_value(content.clone())?),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IoPub::ClearOutput(_) => "clear_output",
            IoPub::Stream(_) => "stream",
            IoPub::DisplayData(_) => "display_data",
            IoPub::ExecuteResult(_) => "execute_result",
            IoPub::Error(_) => "error",
        }
    }

    /// The nbformat output object for this message. `clear_output` has none.
    pub fn to_output(&self) -> Option<Value> {
        let mut out = Map::new();
        out.insert("output_type".into(), Value::from(self.kind()));
        match self {
            IoPub::ClearOutput(_) => return None,
            IoPub::Stream(s) => {
                out.insert("name".into(), Value::from(s.name.clone()));
                out.insert("text".into(), Value::from(s.text.clone()));
            }
            IoPub::DisplayData(d) => {
                out.insert("data".into(), Value::Object(d.data.clone()));
                out.insert("metadata".into(), Value::Object(d.metadata.clone()));
            }
            IoPub::ExecuteResult(r) => {
                out.insert("execution_count".into(), r.execution_count.map_or(Value::Null, Value::from));
                out.insert("data".into(), Value::Object(r.data.clone()));
                out.insert("metadata".into(), Value::Object(r.metadata.clone()));
            }
            IoPub::Error(e) => {
                out.insert("ename".into(), Value::from(e.ename.clone()));
                out.insert("evalue".into(), Value::from(e.evalue.clone()));
                out.insert("traceback".into(), Value::from(e.traceback.clone()));
            }
        }
        Some(Value::Object(out))
    }
}
