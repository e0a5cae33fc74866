//! Grid layout: cells placed on a fixed-column grid.
//!
//! Stored placements are reproduced exactly (and trusted even when two of
//! them overlap). Visible cells without a usable placement are packed
//! first-fit after all stored ones are in, and their new placement is
//! written back immediately. Drag and resize results are written back
//! through a per-cell debounce.

use std::time::Instant;

use crate::cell::{Cell, CellKind};
use crate::cell_id::CellId;
use crate::debounce::Debouncer;
use crate::error::DashboardError;
use crate::gridstack::GridStack;
use crate::help::HelpText;
use crate::host::{CellSlot, DashboardHost};
use crate::layout::{Completion, DashboardLayout, LayoutOptions, LayoutState, ShowAllOptions};
use crate::metadata::{self, DashboardView, GridPlacement, GridRecord, GridSettings, MAX_CELL_HEIGHT};
use crate::notebook::Notebook;

pub const HELP: HelpText = HelpText {
    snippet: Some("Drag, resize and hide cells to arrange your dashboard grid."),
    details: &[
        "Drag a cell by its handle to move it.",
        "Drag the lower-right corner of a cell to resize it.",
        "Hide removes a cell from the dashboard. Show All brings every cell back.",
    ],
};

/// Rendered text line height used by the size heuristic (px).
const LINE_HEIGHT_PX: u32 = 20;
/// Source line length (chars) that warrants the full grid width.
const FULL_WIDTH_CHARS: u64 = 80;
/// Minimum height (rows) of a packed cell.
const MIN_PACKED_HEIGHT: u32 = 2;
/// Line counts above this are treated as this for sizing.
const MAX_SIZED_LINES: usize = 1000;

/// A CSS rule the host installs for the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: &'static str,
    pub rules: String,
}

/// Size a cell gets when it has no stored one: markdown spans the grid,
/// code is as wide as its longest line needs (at least a third of the
/// grid), and height covers the source plus output lines.
pub fn default_size(cell: &Cell, grid: &GridSettings) -> (u32, u32) {
    let max = grid.max_columns.max(1);
    let cell_height = grid.default_cell_height.max(1);

    let width = match cell.kind {
        CellKind::Code => {
            let wanted = (cell.longest_line() as u64 * u64::from(max)).div_ceil(FULL_WIDTH_CHARS);
            let wanted = u32::try_from(wanted).unwrap_or(max);
            wanted.clamp((max / 3).max(1), max)
        }
        CellKind::Markdown | CellKind::Raw => max,
    };

    let mut lines = cell.line_count();
    if cell.kind == CellKind::Code {
        lines += cell.output_line_count();
    }
    let px = lines.min(MAX_SIZED_LINES) as u32 * LINE_HEIGHT_PX;
    let height = px.div_ceil(cell_height).max(MIN_PACKED_HEIGHT);
    (width, height)
}

pub struct GridLayout {
    state: LayoutState,
    opts: LayoutOptions,
    stack: GridStack,
    writes: Debouncer<CellId, GridPlacement>,
    exit_requested: bool,
}

impl GridLayout {
    /// Render the grid for every visible cell.
    pub fn create(nb: &mut Notebook, host: &mut dyn DashboardHost, opts: LayoutOptions) -> Self {
        let mut layout = Self {
            state: LayoutState::Created,
            opts,
            stack: GridStack::new(opts.grid.max_columns),
            writes: Debouncer::new(opts.debounce),
            exit_requested: false,
        };
        metadata::set_active_view(nb, DashboardView::Grid);

        let columns = layout.stack.columns();
        let mut unplaced = Vec::new();
        for cell in nb.cells() {
            let record = metadata::grid_record(nb, cell.id()).unwrap_or_default();
            if record.hidden {
                continue;
            }
            match record.placement().filter(|p| p.fits(columns)) {
                Some(p) => {
                    layout.stack.add_widget(cell.id(), p);
                }
                None => unplaced.push((cell.id(), record)),
            }
        }
        for (id, mut record) in unplaced {
            let p = layout.pack(nb, id, &record);
            record.set_placement(p);
            write_record(nb, id, &record);
        }

        for node in layout.stack.nodes() {
            host.bind_cell(node.id, CellSlot::Grid(node.placement));
        }
        if opts.static_grid {
            layout.stack.set_static(true);
            layout.state = LayoutState::Static;
        }
        log::info!("grid dashboard created ({} cells, {} columns)", layout.stack.len(), columns);
        layout
    }

    /// First-fit placement using the stored size, or the default size.
    fn pack(&mut self, nb: &Notebook, id: CellId, record: &GridRecord) -> GridPlacement {
        let (default_w, default_h) = nb
            .cell(id)
            .map(|c| default_size(c, &self.opts.grid))
            .unwrap_or((1, 1));
        let width = record.width.filter(|&w| w >= 1).unwrap_or(default_w);
        let height = record.height.filter(|&h| h >= 1).unwrap_or(default_h);
        self.stack.add_auto(id, width, height)
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.opts
    }

    pub fn stack(&self) -> &GridStack {
        &self.stack
    }

    pub fn placement(&self, id: CellId) -> Option<GridPlacement> {
        self.stack.node(id).map(|n| n.placement)
    }

    /// Current placements in render order.
    pub fn placements(&self) -> Vec<(CellId, GridPlacement)> {
        self.stack.nodes().iter().map(|n| (n.id, n.placement)).collect()
    }

    pub fn is_interactive(&self) -> bool {
        self.state == LayoutState::Interactive
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Stylesheet rules derived from the cell margin.
    pub fn stylesheet_rules(&self) -> Vec<StyleRule> {
        let half = self.opts.grid.cell_margin / 2;
        vec![StyleRule {
            selector: "#dashboard-container .grid-stack-item.rendered_html",
            rules: format!("padding: {}px {}px;", half, half + 6),
        }]
    }

    /// A drag finished with the cell's top-left at (`row`, `col`).
    pub fn drag_stop(
        &mut self,
        host: &mut dyn DashboardHost,
        id: CellId,
        row: u32,
        col: u32,
        now: Instant,
    ) -> Result<bool, DashboardError> {
        if !self.accepts_edits("drag", id)? {
            return Ok(false);
        }
        let current = self.placement(id).ok_or(DashboardError::UnknownCell(id))?;
        let requested = GridPlacement { row, col, ..current };
        Ok(self.apply_update(host, id, requested, now))
    }

    /// A resize finished with the cell at `width`×`height`.
    pub fn resize_stop(
        &mut self,
        host: &mut dyn DashboardHost,
        id: CellId,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Result<bool, DashboardError> {
        if !self.accepts_edits("resize", id)? {
            return Ok(false);
        }
        let current = self.placement(id).ok_or(DashboardError::UnknownCell(id))?;
        let requested = GridPlacement { width, height, ..current };
        let changed = self.apply_update(host, id, requested, now);
        if changed {
            host.notify_cell_resize(id);
        }
        Ok(changed)
    }

    fn accepts_edits(&self, what: &str, id: CellId) -> Result<bool, DashboardError> {
        match self.state {
            LayoutState::Interactive => Ok(true),
            LayoutState::Destroyed => Err(DashboardError::Destroyed),
            state => {
                log::debug!("ignoring {what} of {id} while grid is {state:?}");
                Ok(false)
            }
        }
    }

    fn apply_update(&mut self, host: &mut dyn DashboardHost, id: CellId, requested: GridPlacement, now: Instant) -> bool {
        let changed = self.stack.update(id, requested);
        for node in &changed {
            self.writes.schedule(node.id, node.placement, now);
            host.bind_cell(node.id, CellSlot::Grid(node.placement));
        }
        !changed.is_empty()
    }

    /// Place a cell that is not on the grid yet and persist it as visible.
    fn place_shown(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) {
        let mut record = metadata::grid_record(nb, id).unwrap_or_default();
        let columns = self.stack.columns();
        let p = match record.placement().filter(|p| p.fits(columns)) {
            Some(p) => self.stack.add_widget(id, p),
            None => self.pack(nb, id, &record),
        };
        record.hidden = false;
        record.set_placement(p);
        write_record(nb, id, &record);
        host.bind_cell(id, CellSlot::Grid(p));
    }

    /// Take a cell off the grid and persist it as hidden, keeping its
    /// latest placement.
    fn remove_hidden(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) {
        let latest = self
            .writes
            .cancel(id)
            .or_else(|| self.placement(id));
        self.stack.remove_widget(id);
        let mut record = metadata::grid_record(nb, id).unwrap_or_default();
        if let Some(p) = latest {
            record.set_placement(p);
        }
        record.hidden = true;
        write_record(nb, id, &record);
        host.unbind_cell(id);
    }

    /// Stack every cell at column 0 with `width`, keeping vertical order:
    /// cells already on the grid by (row, col), then the rest in notebook
    /// order.
    fn stack_all(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, width: u32) {
        let width = width.clamp(1, self.stack.columns());
        let position = |id: CellId| nb.position(id).unwrap_or(usize::MAX);

        let mut on_grid: Vec<(u32, u32, usize, CellId)> = self
            .stack
            .nodes()
            .iter()
            .map(|n| (n.placement.row, n.placement.col, position(n.id), n.id))
            .collect();
        on_grid.sort();
        let mut order: Vec<CellId> = on_grid.into_iter().map(|(.., id)| id).collect();
        for id in nb.cell_ids() {
            if self.stack.node(id).is_none() {
                order.push(id);
            }
        }

        let previous = self.stack.remove_all();
        let mut cursor = 0;
        for id in order {
            let mut record = metadata::grid_record(nb, id).unwrap_or_default();
            let height = previous
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.placement.height)
                .or(record.height.filter(|&h| h >= 1))
                .or_else(|| nb.cell(id).map(|c| default_size(c, &self.opts.grid).1))
                .unwrap_or(1)
                .clamp(1, MAX_CELL_HEIGHT);
            let p = GridPlacement::new(cursor, 0, width, height);
            cursor = cursor.saturating_add(height);
            self.stack.add_widget(id, p);
            self.writes.cancel(id);
            record.hidden = false;
            record.set_placement(p);
            write_record(nb, id, &record);
            host.bind_cell(id, CellSlot::Grid(p));
        }
    }
}

fn write_record(nb: &mut Notebook, id: CellId, record: &GridRecord) {
    if let Err(e) = metadata::set_grid_record(nb, id, record) {
        // The host removed the cell; its layout no longer matters.
        log::debug!("dropping grid write for {id}: {e}");
    }
}

impl DashboardLayout for GridLayout {
    fn view(&self) -> DashboardView {
        DashboardView::Grid
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_interactive(&mut self, host: &mut dyn DashboardHost, enable: bool, complete: Option<Completion<'_>>) {
        if self.is_destroyed() {
            log::debug!("set_interactive on destroyed grid ignored");
            return;
        }
        let enable = enable && !self.opts.static_grid;
        self.stack.set_static(!enable);
        self.state = if enable { LayoutState::Interactive } else { LayoutState::Static };
        self.on_resize(host);
        if let Some(complete) = complete {
            complete(host);
        }
    }

    fn show_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, opts: ShowAllOptions) {
        if self.is_destroyed() {
            return;
        }
        match opts.width {
            Some(width) => self.stack_all(nb, host, width),
            None => {
                for id in nb.cell_ids() {
                    if self.stack.node(id).is_none() {
                        self.place_shown(nb, host, id);
                    }
                }
            }
        }
        self.on_resize(host);
    }

    fn hide_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            return;
        }
        let ids: Vec<CellId> = self.stack.nodes().iter().map(|n| n.id).collect();
        for id in ids {
            self.remove_hidden(nb, host, id);
        }
    }

    fn show_cell(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError> {
        if self.is_destroyed() {
            return Err(DashboardError::Destroyed);
        }
        if nb.cell(id).is_none() {
            return Err(DashboardError::UnknownCell(id));
        }
        if self.stack.node(id).is_some() {
            return Ok(false);
        }
        self.place_shown(nb, host, id);
        host.notify_cell_resize(id);
        Ok(true)
    }

    fn hide_cell(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError> {
        if self.is_destroyed() {
            return Err(DashboardError::Destroyed);
        }
        if nb.cell(id).is_none() {
            return Err(DashboardError::UnknownCell(id));
        }
        if self.stack.node(id).is_none() {
            return Ok(false);
        }
        self.remove_hidden(nb, host, id);
        Ok(true)
    }

    fn on_resize(&mut self, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            return;
        }
        for node in self.stack.nodes() {
            host.notify_cell_resize(node.id);
        }
    }

    fn flush(&mut self, nb: &mut Notebook, now: Instant) -> usize {
        let due = self.writes.take_due(now);
        for (id, p) in &due {
            let mut record = metadata::grid_record(nb, *id).unwrap_or_default();
            record.set_placement(*p);
            write_record(nb, *id, &record);
        }
        if !due.is_empty() {
            log::debug!("flushed {} grid layout writes", due.len());
        }
        due.len()
    }

    fn num_cols(&self) -> Option<u32> {
        Some(self.stack.columns())
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn take_exit_request(&mut self) -> bool {
        std::mem::take(&mut self.exit_requested)
    }

    fn destroy(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            log::warn!("grid dashboard destroyed twice; ignoring");
            return;
        }
        for (id, p) in self.writes.drain() {
            let mut record = metadata::grid_record(nb, id).unwrap_or_default();
            record.set_placement(p);
            write_record(nb, id, &record);
        }
        for node in self.stack.remove_all() {
            host.unbind_cell(node.id);
        }
        self.state = LayoutState::Destroyed;
        log::info!("grid dashboard destroyed");
    }

    fn as_grid_mut(&mut self) -> Option<&mut GridLayout> {
        Some(self)
    }
}
