//! Dashboard metadata store.
//!
//! Typed access to the dashboard namespace inside the notebook's metadata
//! tree (`extensions.jupyter_dashboards`) and inside each cell's metadata.
//! Writes land directly in the host-owned maps, so they are visible to the
//! next read immediately; persisting the document is the host's job.
//!
//! The namespace is created lazily on the first write. Reads never create it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cell_id::CellId;
use crate::error::DashboardError;
use crate::notebook::Notebook;

/// Key under which extension metadata lives.
pub const EXTENSIONS_KEY: &str = "extensions";
/// Dashboard namespace key inside `extensions`.
pub const NAMESPACE: &str = "jupyter_dashboards";
/// Current metadata schema version.
pub const METADATA_VERSION: u64 = 1;

pub const KEY_VERSION: &str = "version";
pub const KEY_ACTIVE_VIEW: &str = "activeView";
pub const KEY_VIEWS: &str = "views";

/// The two dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DashboardView {
    #[serde(rename = "grid_default")]
    Grid,
    #[serde(rename = "report_default")]
    Report,
}

impl DashboardView {
    pub const ALL: [DashboardView; 2] = [DashboardView::Grid, DashboardView::Report];

    /// Key of this view inside `views`.
    pub fn key(self) -> &'static str {
        match self {
            DashboardView::Grid => "grid_default",
            DashboardView::Report => "report_default",
        }
    }

    /// Layout type name (`grid` / `report`).
    pub fn type_name(self) -> &'static str {
        match self {
            DashboardView::Grid => "grid",
            DashboardView::Report => "report",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "grid_default" => Some(DashboardView::Grid),
            "report_default" => Some(DashboardView::Report),
            _ => None,
        }
    }

    /// Accepts either a view key or a layout type name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_key(s).or(match s {
            "grid" => Some(DashboardView::Grid),
            "report" => Some(DashboardView::Report),
            _ => None,
        })
    }
}

impl std::fmt::Display for DashboardView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Dashboard action states.
///
/// `Grid` and `Report` are the edit family; `Preview` renders the active
/// view without layout controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    Notebook,
    Grid,
    Report,
    Preview,
}

impl ActionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionState::Notebook => "notebook",
            ActionState::Grid => "grid",
            ActionState::Report => "report",
            ActionState::Preview => "preview",
        }
    }

    pub fn is_dashboard(self) -> bool {
        !matches!(self, ActionState::Notebook)
    }

    pub fn is_edit(self) -> bool {
        matches!(self, ActionState::Grid | ActionState::Report)
    }

    /// The view an edit state selects explicitly.
    pub fn view(self) -> Option<DashboardView> {
        match self {
            ActionState::Grid => Some(DashboardView::Grid),
            ActionState::Report => Some(DashboardView::Report),
            _ => None,
        }
    }
}

impl From<DashboardView> for ActionState {
    fn from(view: DashboardView) -> Self {
        match view {
            DashboardView::Grid => ActionState::Grid,
            DashboardView::Report => ActionState::Report,
        }
    }
}

/// Where a metadata key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Notebook,
    Cell(CellId),
}

/// Rows a stored placement may reach. Boxes reaching further down are
/// treated as unplaced and repacked.
pub const MAX_GRID_ROWS: u32 = 1 << 16;

/// Tallest box the grid packs, stacks or resizes a cell to.
pub const MAX_CELL_HEIGHT: u32 = 1 << 10;

/// Box of a cell on the grid, in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPlacement {
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
}

impl GridPlacement {
    pub fn new(row: u32, col: u32, width: u32, height: u32) -> Self {
        Self { row, col, width, height }
    }

    /// First row below the box.
    pub fn bottom(&self) -> u32 {
        self.row.saturating_add(self.height)
    }

    /// First column right of the box.
    pub fn right(&self) -> u32 {
        self.col.saturating_add(self.width)
    }

    pub fn overlaps(&self, other: &GridPlacement) -> bool {
        self.col < other.right()
            && other.col < self.right()
            && self.row < other.bottom()
            && other.row < self.bottom()
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.row && row < self.bottom() && col >= self.col && col < self.right()
    }

    /// Well-formed on a grid with `max_columns` columns and at most
    /// [`MAX_GRID_ROWS`] rows.
    pub fn fits(&self, max_columns: u32) -> bool {
        self.width >= 1
            && self.height >= 1
            && self.col.checked_add(self.width).is_some_and(|right| right <= max_columns)
            && self.row.checked_add(self.height).is_some_and(|bottom| bottom <= MAX_GRID_ROWS)
    }
}

/// Per-cell grid view record. Position fields are absent until the cell is
/// first placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridRecord {
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl GridRecord {
    pub fn placed(placement: GridPlacement) -> Self {
        let mut record = Self::default();
        record.set_placement(placement);
        record
    }

    /// Stored placement, if all four coordinates are present.
    pub fn placement(&self) -> Option<GridPlacement> {
        Some(GridPlacement {
            row: self.row?,
            col: self.col?,
            width: self.width?,
            height: self.height?,
        })
    }

    pub fn set_placement(&mut self, p: GridPlacement) {
        self.row = Some(p.row);
        self.col = Some(p.col);
        self.width = Some(p.width);
        self.height = Some(p.height);
    }
}

/// Per-cell report view record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportRecord {
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

/// Notebook-level grid properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridSettings {
    pub max_columns: u32,
    pub cell_margin: u32,
    pub default_cell_height: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            max_columns: 12,
            cell_margin: 10,
            default_cell_height: 20,
        }
    }
}

// ── Raw store ───────────────────────────────────────────────────────

fn namespace(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    map.get(EXTENSIONS_KEY)?.get(NAMESPACE)?.as_object()
}

/// The namespace object, created (or replaced, if a non-object is in the
/// way) on demand.
fn namespace_mut(map: &mut Map<String, Value>) -> &mut Map<String, Value> {
    let ext = object_entry(map, EXTENSIONS_KEY);
    object_entry(ext, NAMESPACE)
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        log::warn!("replacing non-object metadata at `{key}`");
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(obj) => obj,
        _ => unreachable!("slot was just made an object"),
    }
}

fn scope_map(nb: &Notebook, scope: Scope) -> Result<&Map<String, Value>, DashboardError> {
    match scope {
        Scope::Notebook => Ok(nb.metadata()),
        Scope::Cell(id) => nb
            .cell(id)
            .map(|c| c.metadata())
            .ok_or(DashboardError::UnknownCell(id)),
    }
}

fn scope_map_mut(nb: &mut Notebook, scope: Scope) -> Result<&mut Map<String, Value>, DashboardError> {
    match scope {
        Scope::Notebook => Ok(nb.metadata_mut()),
        Scope::Cell(id) => nb
            .cell_mut(id)
            .map(|c| c.metadata_mut())
            .ok_or(DashboardError::UnknownCell(id)),
    }
}

/// Read a key from the dashboard namespace of `scope`.
pub fn get(nb: &Notebook, scope: Scope, key: &str) -> Option<Value> {
    let map = scope_map(nb, scope).ok()?;
    namespace(map)?.get(key).cloned()
}

/// Write a key into the dashboard namespace of `scope`.
pub fn set(nb: &mut Notebook, scope: Scope, key: &str, value: Value) -> Result<(), DashboardError> {
    let map = scope_map_mut(nb, scope)?;
    namespace_mut(map).insert(key.to_string(), value);
    Ok(())
}

/// Visit every cell's metadata map in notebook order.
pub fn for_each_cell(nb: &mut Notebook, mut visitor: impl FnMut(CellId, &mut Map<String, Value>)) {
    for cell in nb.cells_mut() {
        let id = cell.id();
        visitor(id, cell.metadata_mut());
    }
}

fn view_entry(nb: &Notebook, scope: Scope, view: DashboardView) -> Option<Value> {
    get(nb, scope, KEY_VIEWS)?.get(view.key()).cloned()
}

fn set_view_entry(nb: &mut Notebook, scope: Scope, view: DashboardView, value: Value) -> Result<(), DashboardError> {
    let map = scope_map_mut(nb, scope)?;
    let views = object_entry(namespace_mut(map), KEY_VIEWS);
    views.insert(view.key().to_string(), value);
    Ok(())
}

// ── Typed accessors ─────────────────────────────────────────────────

/// True once the notebook carries the current-schema namespace.
pub fn is_initialized(nb: &Notebook) -> bool {
    namespace(nb.metadata()).is_some_and(|ns| ns.contains_key(KEY_VERSION))
}

/// Create the notebook-level namespace with version and view descriptors.
/// Existing values are kept.
pub fn initialize(nb: &mut Notebook) {
    let ns = namespace_mut(nb.metadata_mut());
    ns.entry(KEY_VERSION.to_string())
        .or_insert_with(|| Value::from(METADATA_VERSION));
    let views = object_entry(ns, KEY_VIEWS);
    for view in DashboardView::ALL {
        let entry = object_entry(views, view.key());
        entry
            .entry("name".to_string())
            .or_insert_with(|| Value::from(view.type_name()));
        entry
            .entry("type".to_string())
            .or_insert_with(|| Value::from(view.type_name()));
        if view == DashboardView::Grid {
            let defaults = GridSettings::default();
            entry
                .entry("maxColumns".to_string())
                .or_insert_with(|| Value::from(defaults.max_columns));
            entry
                .entry("cellMargin".to_string())
                .or_insert_with(|| Value::from(defaults.cell_margin));
            entry
                .entry("defaultCellHeight".to_string())
                .or_insert_with(|| Value::from(defaults.default_cell_height));
        }
    }
}

pub fn active_view(nb: &Notebook) -> Option<DashboardView> {
    get(nb, Scope::Notebook, KEY_ACTIVE_VIEW)?
        .as_str()
        .and_then(DashboardView::from_key)
}

pub fn set_active_view(nb: &mut Notebook, view: DashboardView) {
    initialize(nb);
    let ns = namespace_mut(nb.metadata_mut());
    ns.insert(KEY_ACTIVE_VIEW.to_string(), Value::from(view.key()));
}

pub fn grid_settings(nb: &Notebook) -> GridSettings {
    view_entry(nb, Scope::Notebook, DashboardView::Grid)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn set_grid_settings(nb: &mut Notebook, settings: GridSettings) {
    initialize(nb);
    let ns = namespace_mut(nb.metadata_mut());
    let entry = object_entry(object_entry(ns, KEY_VIEWS), DashboardView::Grid.key());
    entry.insert("maxColumns".into(), Value::from(settings.max_columns));
    entry.insert("cellMargin".into(), Value::from(settings.cell_margin));
    entry.insert("defaultCellHeight".into(), Value::from(settings.default_cell_height));
}

fn decode<T: serde::de::DeserializeOwned>(id: CellId, view: DashboardView, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            log::debug!("ignoring malformed {view} record on {id}: {e}");
            None
        }
    }
}

/// Stored grid record, if the cell has a well-formed one.
pub fn grid_record(nb: &Notebook, id: CellId) -> Option<GridRecord> {
    let value = view_entry(nb, Scope::Cell(id), DashboardView::Grid)?;
    decode(id, DashboardView::Grid, value)
}

pub fn set_grid_record(nb: &mut Notebook, id: CellId, record: &GridRecord) -> Result<(), DashboardError> {
    let value = serde_json::to_value(record)?;
    set_view_entry(nb, Scope::Cell(id), DashboardView::Grid, value)
}

pub fn report_record(nb: &Notebook, id: CellId) -> Option<ReportRecord> {
    let value = view_entry(nb, Scope::Cell(id), DashboardView::Report)?;
    decode(id, DashboardView::Report, value)
}

pub fn set_report_record(nb: &mut Notebook, id: CellId, record: &ReportRecord) -> Result<(), DashboardError> {
    let value = serde_json::to_value(record)?;
    set_view_entry(nb, Scope::Cell(id), DashboardView::Report, value)
}

/// Hidden flag of a cell in `view` (cells without a record are visible).
pub fn is_hidden(nb: &Notebook, id: CellId, view: DashboardView) -> bool {
    match view {
        DashboardView::Grid => grid_record(nb, id).is_some_and(|r| r.hidden),
        DashboardView::Report => report_record(nb, id).is_some_and(|r| r.hidden),
    }
}
