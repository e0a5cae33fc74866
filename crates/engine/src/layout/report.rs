//! Report layout: visible cells in one flowing column, ordered by their
//! stored `order`.
//!
//! Orders may have gaps. Reordering renumbers every visible cell to
//! 0..n-1; hidden cells that carry an order keep their relative order
//! after the visible ones so orders stay unique across the notebook.

use std::time::Instant;

use crate::cell_id::CellId;
use crate::error::DashboardError;
use crate::help::HelpText;
use crate::host::{CellSlot, DashboardHost};
use crate::layout::{Completion, DashboardLayout, LayoutOptions, LayoutState, ShowAllOptions};
use crate::metadata::{self, DashboardView, ReportRecord};
use crate::notebook::Notebook;

pub const HELP: HelpText = HelpText {
    snippet: Some("Drag cells to reorder your report and hide the ones readers do not need."),
    details: &[
        "Drag a cell by its handle to move it up or down the report.",
        "Hide removes a cell from the report. Show All brings every cell back.",
    ],
};

pub struct ReportLayout {
    state: LayoutState,
    arrangement: Vec<CellId>,
    exit_requested: bool,
}

/// Sort key: stored order, then notebook position. Cells without an order
/// sort last.
fn flow_key(nb: &Notebook, id: CellId) -> (u32, usize) {
    let order = metadata::report_record(nb, id)
        .and_then(|r| r.order)
        .unwrap_or(u32::MAX);
    (order, nb.position(id).unwrap_or(usize::MAX))
}

/// One past the largest order stored on any cell.
fn next_order(nb: &Notebook) -> u32 {
    nb.cells()
        .iter()
        .filter_map(|c| metadata::report_record(nb, c.id()).and_then(|r| r.order))
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

fn has_duplicate_orders(nb: &Notebook) -> bool {
    let mut seen = rustc_hash::FxHashSet::default();
    nb.cells()
        .iter()
        .filter_map(|c| metadata::report_record(nb, c.id()).and_then(|r| r.order))
        .any(|order| !seen.insert(order))
}

fn write_record(nb: &mut Notebook, id: CellId, record: &ReportRecord) {
    if let Err(e) = metadata::set_report_record(nb, id, record) {
        log::debug!("dropping report write for {id}: {e}");
    }
}

impl ReportLayout {
    /// Render every visible cell in flow order. Visible cells without an
    /// order get the next free orders, in notebook order. Repeated stored
    /// orders are renumbered densely, ties broken by notebook position.
    pub fn create(nb: &mut Notebook, host: &mut dyn DashboardHost, _opts: LayoutOptions) -> Self {
        metadata::set_active_view(nb, DashboardView::Report);

        let mut arrangement: Vec<CellId> = nb
            .cells()
            .iter()
            .map(|c| c.id())
            .filter(|&id| !metadata::is_hidden(nb, id, DashboardView::Report))
            .collect();
        arrangement.sort_by_key(|&id| flow_key(nb, id));

        let mut next = next_order(nb);
        for &id in &arrangement {
            let mut record = metadata::report_record(nb, id).unwrap_or_default();
            if record.order.is_none() {
                record.order = Some(next);
                next = next.saturating_add(1);
                write_record(nb, id, &record);
            }
        }

        let layout = Self {
            state: LayoutState::Created,
            arrangement,
            exit_requested: false,
        };
        if has_duplicate_orders(nb) {
            log::warn!("report orders repeat; renumbering");
            layout.renumber(nb);
        }
        layout.bind_all(host);
        log::info!("report dashboard created ({} cells)", layout.arrangement.len());
        layout
    }

    /// Visible cells in flow order.
    pub fn arrangement(&self) -> &[CellId] {
        &self.arrangement
    }

    fn bind_all(&self, host: &mut dyn DashboardHost) {
        for (pos, &id) in self.arrangement.iter().enumerate() {
            host.bind_cell(id, CellSlot::Report(pos));
        }
    }

    /// A drop moved `id` to `to_index` in the flow. Renumbers and persists
    /// every order. Returns false when the arrangement did not change.
    pub fn move_cell(
        &mut self,
        nb: &mut Notebook,
        host: &mut dyn DashboardHost,
        id: CellId,
        to_index: usize,
    ) -> Result<bool, DashboardError> {
        match self.state {
            LayoutState::Interactive => {}
            LayoutState::Destroyed => return Err(DashboardError::Destroyed),
            state => {
                log::debug!("ignoring reorder of {id} while report is {state:?}");
                return Ok(false);
            }
        }
        if nb.cell(id).is_none() {
            return Err(DashboardError::UnknownCell(id));
        }
        let Some(from) = self.arrangement.iter().position(|&c| c == id) else {
            return Ok(false);
        };
        let to = to_index.min(self.arrangement.len() - 1);
        if from == to {
            return Ok(false);
        }
        let moved = self.arrangement.remove(from);
        self.arrangement.insert(to, moved);
        self.renumber(nb);
        self.bind_all(host);
        Ok(true)
    }

    /// Dense 0..n-1 for the visible flow, then hidden cells that hold an
    /// order, shifted past it.
    fn renumber(&self, nb: &mut Notebook) {
        let mut hidden: Vec<CellId> = nb
            .cells()
            .iter()
            .map(|c| c.id())
            .filter(|id| !self.arrangement.contains(id))
            .filter(|&id| metadata::report_record(nb, id).is_some_and(|r| r.order.is_some()))
            .collect();
        hidden.sort_by_key(|&id| flow_key(nb, id));

        let sequence: Vec<CellId> = self.arrangement.iter().copied().chain(hidden).collect();
        for (order, id) in sequence.into_iter().enumerate() {
            let mut record = metadata::report_record(nb, id).unwrap_or_default();
            record.order = Some(order as u32);
            write_record(nb, id, &record);
        }
    }

    /// Mark a cell visible and put it into the flow at its order.
    fn insert_shown(&mut self, nb: &mut Notebook, id: CellId) {
        let mut record = metadata::report_record(nb, id).unwrap_or_default();
        record.hidden = false;
        if record.order.is_none() {
            record.order = Some(next_order(nb));
        }
        write_record(nb, id, &record);
        self.arrangement.push(id);
    }

    fn remove_hidden(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, id: CellId) {
        self.arrangement.retain(|&c| c != id);
        let mut record = metadata::report_record(nb, id).unwrap_or_default();
        record.hidden = true;
        write_record(nb, id, &record);
        host.unbind_cell(id);
    }
}

impl DashboardLayout for ReportLayout {
    fn view(&self) -> DashboardView {
        DashboardView::Report
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_interactive(&mut self, host: &mut dyn DashboardHost, enable: bool, complete: Option<Completion<'_>>) {
        if self.is_destroyed() {
            log::debug!("set_interactive on destroyed report ignored");
            return;
        }
        self.state = if enable { LayoutState::Interactive } else { LayoutState::Static };
        self.on_resize(host);
        if let Some(complete) = complete {
            complete(host);
        }
    }

    fn show_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost, _opts: ShowAllOptions) {
        if self.is_destroyed() {
            return;
        }
        for id in nb.cell_ids() {
            if !self.arrangement.contains(&id) {
                self.insert_shown(nb, id);
            }
        }
        let nb_ref: &Notebook = nb;
        self.arrangement.sort_by_key(|&id| flow_key(nb_ref, id));
        self.bind_all(host);
        self.on_resize(host);
    }

    fn hide_all_cells(&mut self, nb: &mut Notebook, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            return;
        }
        for id in self.arrangement.clone() {
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
        if self.arrangement.contains(&id) {
            return Ok(false);
        }
        self.insert_shown(nb, id);
        let nb_ref: &Notebook = nb;
        self.arrangement.sort_by_key(|&c| flow_key(nb_ref, c));
        self.bind_all(host);
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
        if !self.arrangement.contains(&id) {
            return Ok(false);
        }
        self.remove_hidden(nb, host, id);
        self.bind_all(host);
        Ok(true)
    }

    fn on_resize(&mut self, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            return;
        }
        for &id in &self.arrangement {
            host.notify_cell_resize(id);
        }
    }

    fn flush(&mut self, _nb: &mut Notebook, _now: Instant) -> usize {
        // Report writes are never deferred.
        0
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn take_exit_request(&mut self) -> bool {
        std::mem::take(&mut self.exit_requested)
    }

    fn destroy(&mut self, _nb: &mut Notebook, host: &mut dyn DashboardHost) {
        if self.is_destroyed() {
            log::warn!("report dashboard destroyed twice; ignoring");
            return;
        }
        for id in self.arrangement.drain(..) {
            host.unbind_cell(id);
        }
        self.state = LayoutState::Destroyed;
        log::info!("report dashboard destroyed");
    }

    fn as_report_mut(&mut self) -> Option<&mut ReportLayout> {
        Some(self)
    }
}
