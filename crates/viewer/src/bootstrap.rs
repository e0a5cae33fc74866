//! Kernel acquisition for the viewer page.

use std::time::Duration;

use nbdash_kernel_client::{
    acquire_container, normalize_base, Container, ContainerCache, KernelSession, ProvisionClient,
    ProvisionError, SessionClient, SessionError,
};

use crate::page::PageParams;

pub const DEFAULT_IMAGE_NAME: &str = "jupyter/notebook";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ViewerError {
    /// No notebook or provisioning server configured
    MissingBaseUrl,
    Provision(ProvisionError),
    Session(SessionError),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::MissingBaseUrl => write!(f, "no kernel server URL configured"),
            ViewerError::Provision(e) => write!(f, "Could not get a kernel container: {}", e),
            ViewerError::Session(e) => write!(f, "Could not start a kernel: {}", e),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<ProvisionError> for ViewerError {
    fn from(e: ProvisionError) -> Self {
        ViewerError::Provision(e)
    }
}

impl From<SessionError> for ViewerError {
    fn from(e: SessionError) -> Self {
        ViewerError::Session(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerOptions {
    pub base_url: Option<String>,
    /// `base_url` is a provisioning server rather than a notebook server.
    pub tmpnb_mode: bool,
    pub kernel_name: String,
    pub image_name: String,
    pub notebook_path: String,
    pub request_timeout: Duration,
}

impl ViewerOptions {
    pub fn from_page(page: &PageParams) -> Self {
        Self {
            base_url: page.thebe_url.clone(),
            tmpnb_mode: page.tmpnb_mode,
            kernel_name: page.kernel_name.clone(),
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            notebook_path: page.notebook_path.clone(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A kernel ready to replay the page.
#[derive(Debug, Clone)]
pub struct Connection {
    /// The container used, in tmpnb mode.
    pub container: Option<Container>,
    pub session: KernelSession,
}

/// Find a notebook server (reusing or provisioning a container in tmpnb
/// mode) and start a kernel on it.
pub fn connect(opts: &ViewerOptions, cache: &mut dyn ContainerCache) -> Result<Connection, ViewerError> {
    let base = opts
        .base_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or(ViewerError::MissingBaseUrl)?;

    let (server, container) = if opts.tmpnb_mode {
        let provisioner = ProvisionClient::new(base, opts.request_timeout);
        let container = acquire_container(&provisioner, cache, &opts.image_name)?;
        (container.base_url.clone(), Some(container))
    } else {
        (normalize_base(base), None)
    };

    let sessions = SessionClient::new(&server, opts.request_timeout);
    let session = sessions.start_session(&opts.kernel_name, &opts.notebook_path)?;
    Ok(Connection { container, session })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbdash_kernel_client::MemoryCache;

    #[test]
    fn test_missing_base_url() {
        let page = PageParams::from_json("{}").unwrap();
        let opts = ViewerOptions::from_page(&page);
        let err = connect(&opts, &mut MemoryCache::default()).unwrap_err();
        assert!(matches!(err, ViewerError::MissingBaseUrl));
    }
}
