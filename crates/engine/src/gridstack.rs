//! Fixed-column grid packing.
//!
//! Same model as the gridstack JavaScript library the dashboard layouts were
//! designed around: widgets occupy integer boxes on a grid of `columns`
//! columns and unbounded rows, new widgets go to the first free slot
//! scanning left-to-right then top-to-bottom, and moving or resizing a
//! widget pushes the widgets it lands on downward.
//!
//! Widgets added with an explicit box are trusted; the grid does not
//! resolve overlaps between them.

use crate::cell_id::CellId;
use crate::metadata::{GridPlacement, MAX_CELL_HEIGHT, MAX_GRID_ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridNode {
    pub id: CellId,
    pub placement: GridPlacement,
}

#[derive(Debug, Clone)]
pub struct GridStack {
    columns: u32,
    /// Insertion order; later nodes draw on top of earlier ones.
    nodes: Vec<GridNode>,
    static_grid: bool,
}

impl GridStack {
    pub fn new(columns: u32) -> Self {
        Self {
            columns: columns.max(1),
            nodes: Vec::new(),
            static_grid: false,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn is_static(&self) -> bool {
        self.static_grid
    }

    pub fn set_static(&mut self, static_grid: bool) {
        self.static_grid = static_grid;
    }

    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: CellId) -> Option<&GridNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: CellId) -> Option<&mut GridNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Number of rows in use.
    pub fn height(&self) -> u32 {
        self.nodes.iter().map(|n| n.placement.bottom()).max().unwrap_or(0)
    }

    /// Topmost widget covering a grid square (last added wins on overlap).
    pub fn node_at(&self, row: u32, col: u32) -> Option<CellId> {
        self.nodes
            .iter()
            .rev()
            .find(|n| n.placement.contains(row, col))
            .map(|n| n.id)
    }

    pub fn is_area_empty(&self, area: &GridPlacement, ignore: Option<CellId>) -> bool {
        !self
            .nodes
            .iter()
            .any(|n| Some(n.id) != ignore && n.placement.overlaps(area))
    }

    /// First free slot for a `width`×`height` box.
    pub fn find_free_space(&self, width: u32, height: u32) -> GridPlacement {
        let width = width.clamp(1, self.columns);
        let height = height.clamp(1, MAX_CELL_HEIGHT);
        // Every row at or below `height()` is empty, so the scan terminates.
        for row in 0..=self.height() {
            for col in 0..=(self.columns - width) {
                let candidate = GridPlacement::new(row, col, width, height);
                if self.is_area_empty(&candidate, None) {
                    return candidate;
                }
            }
        }
        GridPlacement::new(self.height(), 0, width, height)
    }

    /// Add a widget at an explicit box. Replaces any existing node with the
    /// same id.
    pub fn add_widget(&mut self, id: CellId, placement: GridPlacement) -> GridPlacement {
        self.remove_widget(id);
        self.nodes.push(GridNode { id, placement });
        placement
    }

    /// Add a widget at the first free slot.
    pub fn add_auto(&mut self, id: CellId, width: u32, height: u32) -> GridPlacement {
        self.remove_widget(id);
        let placement = self.find_free_space(width, height);
        self.nodes.push(GridNode { id, placement });
        placement
    }

    pub fn remove_widget(&mut self, id: CellId) -> Option<GridNode> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        Some(self.nodes.remove(index))
    }

    pub fn remove_all(&mut self) -> Vec<GridNode> {
        std::mem::take(&mut self.nodes)
    }

    /// Clamp a requested box into the grid's columns and row limit.
    pub fn clamp(&self, p: GridPlacement) -> GridPlacement {
        let width = p.width.clamp(1, self.columns);
        let height = p.height.clamp(1, MAX_CELL_HEIGHT);
        GridPlacement {
            row: p.row.min(MAX_GRID_ROWS - height),
            col: p.col.min(self.columns - width),
            width,
            height,
        }
    }

    /// Move and/or resize a widget. Widgets overlapping its new box are
    /// pushed down below it, transitively. Returns every node whose box
    /// changed, the updated widget first; empty if `id` is unknown or the
    /// box did not change.
    pub fn update(&mut self, id: CellId, requested: GridPlacement) -> Vec<GridNode> {
        let target = self.clamp(requested);
        let Some(node) = self.node_mut(id) else {
            return Vec::new();
        };
        if node.placement == target {
            return Vec::new();
        }
        node.placement = target;

        let mut changed = vec![id];
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(mover) = queue.pop_front() {
            let Some(mover_box) = self.node(mover).map(|n| n.placement) else {
                continue;
            };
            for other in self.nodes.iter_mut() {
                if other.id == mover || other.id == id || !other.placement.overlaps(&mover_box) {
                    continue;
                }
                // Strictly downward, so the cascade terminates.
                other.placement.row = mover_box.bottom();
                if !changed.contains(&other.id) {
                    changed.push(other.id);
                }
                queue.push_back(other.id);
            }
        }

        changed
            .into_iter()
            .filter_map(|cid| self.node(cid).copied())
            .collect()
    }
}
