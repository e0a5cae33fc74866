//! Test harness for layout and controller tests.
//!
//! `RecordingHost` stands in for the editor page: it keeps the bound cells,
//! body class/attribute state and mounted help overlays so tests can assert
//! on what a dashboard did to the page without a DOM.

use std::collections::{BTreeMap, BTreeSet};

use crate::cell::CellKind;
use crate::cell_id::CellId;
use crate::help::HelpOverlay;
use crate::host::{CellSlot, DashboardHost};
use crate::notebook::Notebook;

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub body_classes: BTreeSet<String>,
    pub body_attrs: BTreeMap<String, String>,
    pub bound: BTreeMap<CellId, CellSlot>,
    pub help: Vec<HelpOverlay>,
    pub cell_resizes: Vec<CellId>,
    pub resize_all: usize,
}

impl RecordingHost {
    pub fn has_class(&self, class: &str) -> bool {
        self.body_classes.contains(class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.body_attrs.get(name).map(String::as_str)
    }

    /// Report positions of bound cells, in flow order.
    pub fn report_flow(&self) -> Vec<CellId> {
        let mut flow: Vec<(usize, CellId)> = self
            .bound
            .iter()
            .filter_map(|(id, slot)| match slot {
                CellSlot::Report(pos) => Some((*pos, *id)),
                CellSlot::Grid(_) => None,
            })
            .collect();
        flow.sort();
        flow.into_iter().map(|(_, id)| id).collect()
    }
}

impl DashboardHost for RecordingHost {
    fn set_body_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.body_classes.insert(class.to_string());
        } else {
            self.body_classes.remove(class);
        }
    }

    fn set_body_attr(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.body_attrs.remove(name);
        } else {
            self.body_attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn bind_cell(&mut self, cell: CellId, slot: CellSlot) {
        self.bound.insert(cell, slot);
    }

    fn unbind_cell(&mut self, cell: CellId) {
        self.bound.remove(&cell);
    }

    fn mount_help(&mut self, overlay: &HelpOverlay) {
        self.help.push(overlay.clone());
    }

    fn unmount_help(&mut self, overlay_id: u64) {
        self.help.retain(|h| h.id() != overlay_id);
    }

    fn notify_resize_all(&mut self) {
        self.resize_all += 1;
    }

    fn notify_cell_resize(&mut self, cell: CellId) {
        self.cell_resizes.push(cell);
    }
}

/// Notebook with `n` one-line code cells.
pub fn notebook_with(n: usize) -> (Notebook, Vec<CellId>) {
    let mut nb = Notebook::new();
    let ids = (0..n)
        .map(|i| nb.push_cell(CellKind::Code, format!("cell {i}")))
        .collect();
    (nb, ids)
}
