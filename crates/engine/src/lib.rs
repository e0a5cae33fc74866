//! Notebook dashboards: metadata, layouts and the mode controller.
//!
//! The host editor (page, cells, widgets) is reached through
//! [`host::DashboardHost`]; everything else lives here.

pub mod cell;
pub mod cell_id;
pub mod compat;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod gridstack;
pub mod help;
pub mod host;
pub mod layout;
pub mod metadata;
pub mod notebook;

#[cfg(test)]
pub mod harness;

pub use cell::{Cell, CellKind};
pub use cell_id::CellId;
pub use controller::{DashboardController, EntryTicket, MenuAction, MenuItem};
pub use error::DashboardError;
pub use host::{CellSlot, DashboardHost, NullHost};
pub use layout::{DashboardLayout, GridLayout, LayoutOptions, LayoutState, ReportLayout, ShowAllOptions};
pub use metadata::{ActionState, DashboardView, GridPlacement, GridRecord, GridSettings, ReportRecord};
pub use notebook::Notebook;
