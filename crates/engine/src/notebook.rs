use serde_json::{Map, Value};

use crate::cell::{Cell, CellKind};
use crate::cell_id::CellId;
use crate::error::DashboardError;

/// An ordered collection of cells plus the notebook-level metadata tree.
///
/// The notebook-level metadata is the host's metadata object; the dashboard
/// metadata store (see [`crate::metadata`]) stages its state inside it and
/// never keeps a separate copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    cells: Vec<Cell>,
    metadata: Map<String, Value>,
    /// Top-level nbformat fields other than `cells` and `metadata`.
    extra: Map<String, Value>,
    /// Next ID to assign to a new cell. Monotonically increasing, never reused.
    next_cell_id: u32,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    pub fn new() -> Self {
        let mut extra = Map::new();
        extra.insert("nbformat".into(), Value::from(4));
        extra.insert("nbformat_minor".into(), Value::from(2));
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            extra,
            next_cell_id: 0,
        }
    }

    /// Parse an `.ipynb` document.
    pub fn from_ipynb(text: &str) -> Result<Self, DashboardError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DashboardError> {
        let Value::Object(mut obj) = value else {
            return Err(DashboardError::InvalidNotebook("top level is not an object".into()));
        };

        let raw_cells = match obj.remove("cells") {
            Some(Value::Array(cells)) => cells,
            Some(_) => return Err(DashboardError::InvalidNotebook("`cells` is not an array".into())),
            None => Vec::new(),
        };
        let metadata = match obj.remove("metadata") {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };

        let mut notebook = Self {
            cells: Vec::with_capacity(raw_cells.len()),
            metadata,
            extra: obj,
            next_cell_id: 0,
        };
        for raw in raw_cells {
            let id = notebook.allocate_id();
            notebook.cells.push(Cell::from_json(id, raw)?);
        }
        Ok(notebook)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        obj.insert(
            "cells".into(),
            Value::Array(self.cells.iter().map(Cell::to_json).collect()),
        );
        obj.insert("metadata".into(), Value::Object(self.metadata.clone()));
        Value::Object(obj)
    }

    /// Serialize to `.ipynb` text.
    pub fn to_ipynb(&self) -> Result<String, DashboardError> {
        let mut text = serde_json::to_string_pretty(&self.to_value())?;
        text.push('\n');
        Ok(text)
    }

    fn allocate_id(&mut self) -> CellId {
        let id = CellId::from_raw(self.next_cell_id);
        self.next_cell_id += 1;
        id
    }

    /// Append a new cell and return its id.
    pub fn push_cell(&mut self, kind: CellKind, source: impl Into<String>) -> CellId {
        let id = self.allocate_id();
        self.cells.push(Cell::new(id, kind, source));
        id
    }

    /// Insert a new cell at `index` (clamped to the end).
    pub fn insert_cell(&mut self, index: usize, kind: CellKind, source: impl Into<String>) -> CellId {
        let id = self.allocate_id();
        let index = index.min(self.cells.len());
        self.cells.insert(index, Cell::new(id, kind, source));
        id
    }

    /// Remove a cell. Its dashboard records go with it.
    pub fn remove_cell(&mut self, id: CellId) -> Option<Cell> {
        let index = self.position(id)?;
        Some(self.cells.remove(index))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.iter().map(Cell::id).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id() == id)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.id() == id)
    }

    /// Index of the cell in notebook order.
    pub fn position(&self, id: CellId) -> Option<usize> {
        self.cells.iter().position(|c| c.id() == id)
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "cells": [
                {"cell_type": "markdown", "metadata": {}, "source": ["# Title"]},
                {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [], "source": ["1 + 1"]}
            ],
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4,
            "nbformat_minor": 0
        })
    }

    #[test]
    fn test_roundtrip_preserves_document() {
        let nb = Notebook::from_value(sample()).unwrap();
        assert_eq!(nb.len(), 2);
        assert_eq!(nb.to_value(), sample());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut nb = Notebook::from_value(sample()).unwrap();
        let last = nb.cell_ids()[1];
        nb.remove_cell(last).unwrap();
        let fresh = nb.push_cell(CellKind::Code, "x");
        assert_ne!(fresh, last);
        assert_eq!(fresh.raw(), 2);
    }

    #[test]
    fn test_insert_and_position() {
        let mut nb = Notebook::new();
        let a = nb.push_cell(CellKind::Code, "a");
        let b = nb.insert_cell(0, CellKind::Markdown, "b");
        let c = nb.insert_cell(99, CellKind::Code, "c");
        assert_eq!(nb.cell_ids(), vec![b, a, c]);
        assert_eq!(nb.position(c), Some(2));
        assert!(nb.cell(CellId::from_raw(42)).is_none());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(Notebook::from_ipynb("[1, 2]").is_err());
        assert!(Notebook::from_ipynb("{\"cells\": 3}").is_err());
        assert!(Notebook::from_ipynb("not json").is_err());
    }
}
