//! Kernel server client for the standalone dashboard viewer.
//!
//! Finds a notebook server to run code on (reusing a previously spawned
//! container when it still answers, spawning a new one otherwise) and
//! starts a kernel session on it.
//!
//! Blocking reqwest client, no Tokio runtime. The kernel websocket itself is
//! the embedder's; it plugs in through [`KernelChannel`].

mod cache;
mod kernel;
mod provision;
mod session;
mod urls;

pub use cache::{
    cache_file_path, CachedContainer, ContainerCache, FileCache, MemoryCache, CONTAINER_CACHE_KEY,
};
pub use kernel::{CommManager, KernelChannel};
pub use provision::{acquire_container, Container, ContainerSource, Probe, ProvisionClient, ProvisionError};
pub use session::{KernelSession, SessionClient, SessionError, StartedVia};
pub use urls::{normalize_base, resolve_spawn_url, ws_url};
