//! Kernel start on a notebook server.

use std::time::Duration;

use nbdash_protocol::{KernelCreate, KernelInfo, SessionCreate, SessionInfo};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::urls::{normalize_base, ws_url};

/// Error type for notebook server calls.
#[derive(Debug)]
pub enum SessionError {
    /// Network/connection error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// Failed to parse response
    Parse(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Network(msg) => write!(f, "Network error: {}", msg),
            SessionError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            SessionError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

/// Which endpoint produced the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartedVia {
    Session,
    Kernel,
}

/// A running kernel the viewer executes code on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSession {
    pub kernel_id: String,
    pub kernel_name: String,
    pub session_id: Option<String>,
    pub base_url: String,
    pub ws_url: String,
    pub via: StartedVia,
}

impl KernelSession {
    /// Websocket endpoint of the kernel's channels.
    pub fn channels_url(&self) -> String {
        let mut url = format!("{}api/kernels/{}/channels", self.ws_url, self.kernel_id);
        if let Some(session) = &self.session_id {
            url.push_str("?session_id=");
            url.push_str(session);
        }
        url
    }
}

/// Notebook server REST client (blocking).
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl SessionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("nbdash/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a kernel for `notebook_path`. Servers without the sessions
    /// API get a bare kernel instead.
    pub fn start_session(&self, kernel_name: &str, notebook_path: &str) -> Result<KernelSession, SessionError> {
        let body = SessionCreate::notebook(notebook_path, kernel_name);
        match self.post_json::<_, SessionInfo>("api/sessions", &body) {
            Ok(session) => {
                log::info!("started session {} (kernel {})", session.id, session.kernel.id);
                Ok(self.kernel_session(session.kernel, Some(session.id), StartedVia::Session))
            }
            Err(e) => {
                log::warn!("session start failed ({}), starting kernel directly", e);
                self.start_kernel(kernel_name)
            }
        }
    }

    /// `POST api/kernels`.
    pub fn start_kernel(&self, kernel_name: &str) -> Result<KernelSession, SessionError> {
        let body = KernelCreate { name: kernel_name.to_string() };
        let kernel: KernelInfo = self.post_json("api/kernels", &body)?;
        log::info!("started kernel {}", kernel.id);
        Ok(self.kernel_session(kernel, None, StartedVia::Kernel))
    }

    /// `GET api/kernels`.
    pub fn list_kernels(&self) -> Result<Vec<KernelInfo>, SessionError> {
        let url = format!("{}api/kernels", self.base_url);
        let response = self.http.get(&url)
            .send()
            .map_err(|e| SessionError::Network(e.to_string()))?;
        Self::read_json(response)
    }

    fn kernel_session(&self, kernel: KernelInfo, session_id: Option<String>, via: StartedVia) -> KernelSession {
        KernelSession {
            kernel_id: kernel.id,
            kernel_name: kernel.name,
            session_id,
            base_url: self.base_url.clone(),
            ws_url: ws_url(&self.base_url),
            via,
        }
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, SessionError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url)
            .json(body)
            .send()
            .map_err(|e| SessionError::Network(e.to_string()))?;
        Self::read_json(response)
    }

    fn read_json<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T, SessionError> {
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SessionError::Http(status, body));
        }
        response.json().map_err(|e| SessionError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_url() {
        let session = KernelSession {
            kernel_id: "k1".into(),
            kernel_name: "python3".into(),
            session_id: Some("s1".into()),
            base_url: "https://c1/user/x/".into(),
            ws_url: "wss://c1/user/x/".into(),
            via: StartedVia::Session,
        };
        assert_eq!(session.channels_url(), "wss://c1/user/x/api/kernels/k1/channels?session_id=s1");

        let bare = KernelSession { session_id: None, via: StartedVia::Kernel, ..session };
        assert_eq!(bare.channels_url(), "wss://c1/user/x/api/kernels/k1/channels");
    }
}
