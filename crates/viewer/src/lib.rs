//! Standalone dashboard viewer.
//!
//! Lays out a converted dashboard as a static grid (or one row or cell of
//! it), gets a kernel, and replays the code blocks to fill in outputs.

pub mod bootstrap;
pub mod busy;
pub mod comms;
pub mod page;
pub mod query;
pub mod render;
pub mod replay;

pub use bootstrap::{connect, Connection, ViewerError, ViewerOptions};
pub use busy::BusyIndicator;
pub use comms::CommRegistry;
pub use page::{ConvertOptions, PageBlock, PageParams};
pub use query::PageQuery;
pub use render::{flex_basis, PageHost, PageView};
pub use replay::{KernelRuntime, OutputArea, OutputSink, RecordedOutputs, ReplaySummary};
