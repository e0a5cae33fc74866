//! The host editor as seen from the dashboard.
//!
//! Layouts and the mode controller never touch the DOM directly; they tell
//! the host where each cell goes and which page-level state to apply.

use crate::cell_id::CellId;
use crate::help::HelpOverlay;
use crate::metadata::GridPlacement;

/// Where a bound cell is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSlot {
    Grid(GridPlacement),
    /// Position in the report flow (0-based).
    Report(usize),
}

pub trait DashboardHost {
    /// Toggle a class on the document body.
    fn set_body_class(&mut self, class: &str, enabled: bool);

    /// Set an attribute on the document body (empty string clears it).
    fn set_body_attr(&mut self, name: &str, value: &str);

    /// Show a cell in the dashboard at `slot`, or move it there.
    fn bind_cell(&mut self, cell: CellId, slot: CellSlot);

    /// Remove a cell from the dashboard (hidden, or the dashboard is going away).
    fn unbind_cell(&mut self, cell: CellId);

    fn mount_help(&mut self, overlay: &HelpOverlay);

    fn unmount_help(&mut self, overlay_id: u64);

    /// Tell every piece of rich content (widgets) that its box may have changed.
    fn notify_resize_all(&mut self);

    /// Tell one cell's rich content that its box changed.
    fn notify_cell_resize(&mut self, cell: CellId) {
        let _ = cell;
        self.notify_resize_all();
    }
}

/// Host that ignores everything. Used for headless layout computation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl DashboardHost for NullHost {
    fn set_body_class(&mut self, _class: &str, _enabled: bool) {}
    fn set_body_attr(&mut self, _name: &str, _value: &str) {}
    fn bind_cell(&mut self, _cell: CellId, _slot: CellSlot) {}
    fn unbind_cell(&mut self, _cell: CellId) {}
    fn mount_help(&mut self, _overlay: &HelpOverlay) {}
    fn unmount_help(&mut self, _overlay_id: u64) {}
    fn notify_resize_all(&mut self) {}
}
