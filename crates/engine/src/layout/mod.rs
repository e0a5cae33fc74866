//! Dashboard layouts.
//!
//! A layout owns the on-screen state of one dashboard instance: which cells
//! are bound where, whether the user may rearrange them, and the writes
//! back into the notebook metadata. The two variants (grid and report)
//! share the [`DashboardLayout`] capability set so the mode controller can
//! drive either without knowing which one it holds.
//!
//! Lifecycle: `create` → (`set_interactive` ⇄) → `destroy`. Every method on
//! a destroyed instance is a no-op.

pub mod grid;
pub mod report;

use std::time::{Duration, Instant};

use crate::cell_id::CellId;
use crate::error::DashboardError;
use crate::help::HelpText;
use crate::host::DashboardHost;
use crate::metadata::{DashboardView, GridSettings};
use crate::notebook::Notebook;

pub use grid::GridLayout;
pub use report::ReportLayout;

/// Default per-cell write coalescing window for drag and resize events.
pub const DEFAULT_LAYOUT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Column count, cell height unit (px) and margin (px).
    pub grid: GridSettings,
    /// Coalescing window for per-cell layout writes.
    pub debounce: Duration,
    /// Render without drag/resize support at all (standalone viewer).
    pub static_grid: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            grid: GridSettings::default(),
            debounce: DEFAULT_LAYOUT_DEBOUNCE,
            static_grid: false,
        }
    }
}

impl LayoutOptions {
    pub fn with_grid(grid: GridSettings) -> Self {
        Self { grid, ..Self::default() }
    }
}

/// Options for `show_all_cells`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShowAllOptions {
    /// Force every cell to this column width, stacked in one column.
    /// Only the grid layout honours it.
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Created,
    Interactive,
    Static,
    Destroyed,
}

/// Completion callback for `set_interactive`, run once content has been
/// told to reflow.
pub type Completion<'a> = &'a mut dyn FnMut(&mut dyn DashboardHost);

pub trait DashboardLayout {
    fn view(&self) -> DashboardView;

    fn state(&self) -> LayoutState;

    fn is_destroyed(&self) -> bool {
        self.state() == LayoutState::Destroyed
    }

    fn help_text(&self) -> Option<HelpText> {
        help_text_for(self.view())
    }

    /// Enable or disable user rearrangement.
    fn set_interactive(&mut self, host: &mut dyn DashboardHost, enable: bool, complete: Option<Completion<'_>>);

    fn show_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, opts: ShowAllOptions);

    fn hide_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost);

    /// Show one cell. Returns false if it was already shown, and
    /// [`DashboardError::Destroyed`] once the instance is destroyed.
    fn show_cell(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError>;

    /// Hide one cell. Returns false if it was already hidden, and
    /// [`DashboardError::Destroyed`] once the instance is destroyed.
    fn hide_cell(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError>;

    /// Tell contained rich content its box changed. Geometry is untouched.
    fn on_resize(&mut self, host: &mut dyn DashboardHost);

    /// Write out coalesced layout changes whose window has elapsed.
    /// Returns the number of records written.
    fn flush(&mut self, _nb: &mut Notebook, _now: Instant) -> usize {
        0
    }

    /// Column count for a stacked "show all", if the layout has columns.
    fn num_cols(&self) -> Option<u32> {
        None
    }

    /// Ask the controller to return to notebook mode.
    fn request_exit(&mut self);

    fn take_exit_request(&mut self) -> bool;

    /// Release all layout state and unbind every cell. Pending writes are
    /// flushed first. Idempotent.
    fn destroy(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost);

    fn as_grid_mut(&mut self) -> Option<&mut GridLayout> {
        None
    }

    fn as_report_mut(&mut self) -> Option<&mut ReportLayout> {
        None
    }
}

/// Help text of a view, available before an instance exists.
pub fn help_text_for(view: DashboardView) -> Option<HelpText> {
    match view {
        DashboardView::Grid => Some(grid::HELP),
        DashboardView::Report => Some(report::HELP),
    }
}

/// Instantiate the layout for `view`.
pub fn create_layout(
    view: DashboardView,
    nb: &mut Notebook,
    host: &mut dyn DashboardHost,
    opts: LayoutOptions,
) -> Box<dyn DashboardLayout> {
    match view {
        DashboardView::Grid => Box::new(GridLayout::create(nb, host, opts)),
        DashboardView::Report => Box::new(ReportLayout::create(nb, host, opts)),
    }
}
