//! Legacy metadata migration.
//!
//! Notebooks authored with the first dashboard release keep their state
//! under `urth.dashboard`, at notebook level and on each cell:
//!
//! ```text
//! notebook: {"urth": {"dashboard": {"layout": "grid", "maxColumns": 12, ...}}}
//! cell:     {"urth": {"dashboard": {"hidden": true, "layout": {"row": 0, "col": 0, "width": 4, "height": 2}}}}
//! ```
//!
//! [`migrate`] rewrites that into the current namespace and removes every
//! `urth` key. Malformed legacy values never abort the migration: a bad
//! `hidden` means visible, a bad `layout` degrades to an unpositioned 1×1
//! record that the grid packs on next entry, and a box wider than the grid
//! is pulled inside its columns.

use serde_json::{Map, Value};

use crate::cell_id::CellId;
use crate::metadata::{self, DashboardView, GridPlacement, GridRecord, GridSettings, ReportRecord};
use crate::notebook::Notebook;

/// Legacy top-level key.
pub const LEGACY_KEY: &str = "urth";
const LEGACY_DASHBOARD_KEY: &str = "dashboard";

/// Legacy notebook-level dashboard properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyNotebook {
    pub layout: Option<DashboardView>,
    pub max_columns: Option<u32>,
    pub cell_margin: Option<u32>,
    pub default_cell_height: Option<u32>,
}

/// A legacy value that may or may not have parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Legacy<T> {
    Absent,
    Valid(T),
    Malformed(Value),
}

/// Legacy per-cell dashboard properties.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCell {
    pub hidden: Legacy<bool>,
    pub layout: Legacy<GridPlacement>,
}

/// Metadata schema detected on a notebook.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// No dashboard metadata at all.
    Empty,
    /// Pre-namespace `urth.dashboard` keys are present.
    Legacy {
        notebook: Option<LegacyNotebook>,
        cells: Vec<(CellId, LegacyCell)>,
    },
    /// Current namespace, no legacy keys.
    Current,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: bool,
    pub cells_migrated: usize,
    /// Cells whose legacy values were replaced with defaults or clamped
    /// into the grid.
    pub defaults_substituted: Vec<CellId>,
}

/// True iff a legacy key is present on the notebook or any cell.
pub fn needs_migration(nb: &Notebook) -> bool {
    nb.metadata().contains_key(LEGACY_KEY)
        || nb.cells().iter().any(|c| c.metadata().contains_key(LEGACY_KEY))
}

pub fn detect(nb: &Notebook) -> Schema {
    if needs_migration(nb) {
        let notebook = legacy_dashboard(nb.metadata()).map(parse_legacy_notebook);
        let cells = nb
            .cells()
            .iter()
            .filter_map(|c| legacy_dashboard(c.metadata()).map(|d| (c.id(), parse_legacy_cell(d))))
            .collect();
        Schema::Legacy { notebook, cells }
    } else if metadata::is_initialized(nb) {
        Schema::Current
    } else {
        Schema::Empty
    }
}

fn legacy_dashboard(map: &Map<String, Value>) -> Option<&Value> {
    map.get(LEGACY_KEY)?.get(LEGACY_DASHBOARD_KEY)
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    value?.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn parse_legacy_notebook(value: &Value) -> LegacyNotebook {
    LegacyNotebook {
        layout: value
            .get("layout")
            .and_then(Value::as_str)
            .and_then(DashboardView::parse),
        max_columns: as_u32(value.get("maxColumns")).filter(|&n| n > 0),
        cell_margin: as_u32(value.get("cellMargin")),
        default_cell_height: as_u32(value.get("defaultCellHeight")).filter(|&n| n > 0),
    }
}

fn parse_legacy_cell(value: &Value) -> LegacyCell {
    let hidden = match value.get("hidden") {
        None | Some(Value::Null) => Legacy::Absent,
        Some(Value::Bool(b)) => Legacy::Valid(*b),
        Some(other) => Legacy::Malformed(other.clone()),
    };
    let layout = match value.get("layout") {
        None | Some(Value::Null) => Legacy::Absent,
        Some(raw) => {
            let parsed = (|| {
                let p = GridPlacement {
                    row: as_u32(raw.get("row"))?,
                    col: as_u32(raw.get("col"))?,
                    width: as_u32(raw.get("width"))?,
                    height: as_u32(raw.get("height"))?,
                };
                (p.width >= 1 && p.height >= 1).then_some(p)
            })();
            match parsed {
                Some(p) => Legacy::Valid(p),
                None => Legacy::Malformed(raw.clone()),
            }
        }
    };
    LegacyCell { hidden, layout }
}

/// Rewrite legacy metadata into the current schema.
///
/// A no-op (returning `migrated: false`) when no legacy key is present, so
/// running it again on migrated metadata leaves it untouched. Current-schema
/// records that already exist are never overwritten.
pub fn migrate(nb: &mut Notebook) -> MigrationReport {
    let Schema::Legacy { notebook, cells } = detect(nb) else {
        return MigrationReport::default();
    };

    let mut report = MigrationReport {
        migrated: true,
        ..MigrationReport::default()
    };

    metadata::initialize(nb);
    if let Some(legacy) = notebook {
        if metadata::active_view(nb).is_none() {
            if let Some(view) = legacy.layout {
                metadata::set_active_view(nb, view);
            }
        }
        let current = metadata::grid_settings(nb);
        let defaults = GridSettings::default();
        // Only carry legacy values over settings still at their defaults.
        let merged = GridSettings {
            max_columns: pick(current.max_columns, defaults.max_columns, legacy.max_columns),
            cell_margin: pick(current.cell_margin, defaults.cell_margin, legacy.cell_margin),
            default_cell_height: pick(
                current.default_cell_height,
                defaults.default_cell_height,
                legacy.default_cell_height,
            ),
        };
        metadata::set_grid_settings(nb, merged);
    }
    nb.metadata_mut().remove(LEGACY_KEY);

    let columns = metadata::grid_settings(nb).max_columns.max(1);
    for (id, legacy) in cells {
        let (grid, report_hidden, substituted) = convert_cell(id, &legacy, columns);
        if metadata::grid_record(nb, id).is_none() {
            write_grid(nb, id, &grid);
        }
        if metadata::report_record(nb, id).is_none() {
            write_report(nb, id, &ReportRecord { hidden: report_hidden, order: None });
        }
        if substituted {
            report.defaults_substituted.push(id);
        }
        report.cells_migrated += 1;
    }
    metadata::for_each_cell(nb, |_, meta| {
        meta.remove(LEGACY_KEY);
    });

    log::info!(
        "migrated legacy dashboard metadata ({} cells, {} with defaults)",
        report.cells_migrated,
        report.defaults_substituted.len()
    );
    report
}

fn pick(current: u32, default: u32, legacy: Option<u32>) -> u32 {
    match legacy {
        Some(v) if current == default => v,
        _ => current,
    }
}

fn write_grid(nb: &mut Notebook, id: CellId, record: &GridRecord) {
    if let Err(e) = metadata::set_grid_record(nb, id, record) {
        log::warn!("dropping migrated grid record for {id}: {e}");
    }
}

fn write_report(nb: &mut Notebook, id: CellId, record: &ReportRecord) {
    if let Err(e) = metadata::set_report_record(nb, id, record) {
        log::warn!("dropping migrated report record for {id}: {e}");
    }
}

/// Pull a legacy box inside `columns`: the width is capped at the column
/// count and the column shifted left until the box ends at the edge.
fn clamp_to_columns(p: GridPlacement, columns: u32) -> GridPlacement {
    let width = p.width.min(columns);
    GridPlacement {
        width,
        col: p.col.min(columns - width),
        ..p
    }
}

fn convert_cell(id: CellId, legacy: &LegacyCell, columns: u32) -> (GridRecord, bool, bool) {
    let mut substituted = false;
    let hidden = match &legacy.hidden {
        Legacy::Valid(b) => *b,
        Legacy::Absent => false,
        Legacy::Malformed(raw) => {
            log::warn!("{id}: legacy `hidden` is not a boolean ({raw}), showing cell");
            substituted = true;
            false
        }
    };
    let mut grid = GridRecord { hidden, ..GridRecord::default() };
    match &legacy.layout {
        Legacy::Valid(p) if p.right() > columns => {
            let clamped = clamp_to_columns(*p, columns);
            log::warn!(
                "{id}: legacy layout spans columns {}..{} of {columns}, moved to {}..{}",
                p.col,
                p.right(),
                clamped.col,
                clamped.right()
            );
            substituted = true;
            grid.set_placement(clamped);
        }
        Legacy::Valid(p) => grid.set_placement(*p),
        Legacy::Absent => {}
        Legacy::Malformed(raw) => {
            log::warn!("{id}: legacy `layout` is malformed ({raw}), using a 1x1 cell");
            substituted = true;
            grid.width = Some(1);
            grid.height = Some(1);
        }
    }
    (grid, hidden, substituted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellKind;
    use serde_json::json;

    fn legacy_notebook() -> (Notebook, CellId, CellId, CellId) {
        let mut nb = Notebook::new();
        nb.metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": "report", "maxColumns": 8, "cellMargin": 5, "defaultCellHeight": 40}}),
        );
        let placed = nb.push_cell(CellKind::Code, "a");
        nb.cell_mut(placed).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": {"row": 1, "col": 2, "width": 3, "height": 4}}}),
        );
        let hidden = nb.push_cell(CellKind::Code, "b");
        nb.cell_mut(hidden).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": "grid", "hidden": true}}),
        );
        let plain = nb.push_cell(CellKind::Markdown, "c");
        (nb, placed, hidden, plain)
    }

    #[test]
    fn test_detects_legacy_keys() {
        let (nb, placed, hidden, _) = legacy_notebook();
        assert!(needs_migration(&nb));
        match detect(&nb) {
            Schema::Legacy { notebook, cells } => {
                assert_eq!(notebook.unwrap().layout, Some(DashboardView::Report));
                assert_eq!(cells.len(), 2);
                assert_eq!(cells[0].0, placed);
                assert_eq!(cells[1].0, hidden);
                assert!(matches!(cells[1].1.layout, Legacy::Malformed(_)));
            }
            other => panic!("expected legacy schema, got {other:?}"),
        }
    }

    #[test]
    fn test_migrates_placement_and_settings() {
        let (mut nb, placed, _, plain) = legacy_notebook();
        let report = migrate(&mut nb);
        assert!(report.migrated);
        assert_eq!(report.cells_migrated, 2);

        let record = metadata::grid_record(&nb, placed).unwrap();
        assert_eq!(record.placement(), Some(GridPlacement::new(1, 2, 3, 4)));
        assert!(!record.hidden);
        assert_eq!(metadata::active_view(&nb), Some(DashboardView::Report));
        let settings = metadata::grid_settings(&nb);
        assert_eq!(settings.max_columns, 8);
        assert_eq!(settings.cell_margin, 5);
        assert_eq!(settings.default_cell_height, 40);
        assert!(metadata::grid_record(&nb, plain).is_none());
    }

    #[test]
    fn test_legacy_hidden_survives_malformed_layout() {
        let (mut nb, _, hidden, _) = legacy_notebook();
        let report = migrate(&mut nb);

        let record = metadata::grid_record(&nb, hidden).unwrap();
        assert!(record.hidden);
        assert_eq!(record.width, Some(1));
        assert_eq!(record.height, Some(1));
        assert!(record.placement().is_none());
        assert!(metadata::report_record(&nb, hidden).unwrap().hidden);
        assert_eq!(report.defaults_substituted, vec![hidden]);
    }

    #[test]
    fn test_no_legacy_keys_remain() {
        let (mut nb, ..) = legacy_notebook();
        migrate(&mut nb);
        assert!(!needs_migration(&nb));
        assert!(!nb.metadata().contains_key("urth"));
        assert!(nb.cells().iter().all(|c| !c.metadata().contains_key("urth")));
        assert_eq!(detect(&nb), Schema::Current);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let (mut nb, ..) = legacy_notebook();
        migrate(&mut nb);
        let once = nb.clone();
        let second = migrate(&mut nb);
        assert!(!second.migrated);
        assert_eq!(nb, once);
    }

    #[test]
    fn test_malformed_hidden_means_visible() {
        let mut nb = Notebook::new();
        let id = nb.push_cell(CellKind::Code, "x");
        nb.cell_mut(id).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"hidden": "yes", "layout": {"row": 0, "col": 0, "width": 0, "height": 2}}}),
        );
        let report = migrate(&mut nb);
        let record = metadata::grid_record(&nb, id).unwrap();
        assert!(!record.hidden);
        assert_eq!((record.width, record.height), (Some(1), Some(1)));
        assert_eq!(report.defaults_substituted, vec![id]);
    }

    #[test]
    fn test_layout_wider_than_legacy_columns_is_pulled_in() {
        let mut nb = Notebook::new();
        nb.metadata_mut().insert("urth".into(), json!({"dashboard": {"maxColumns": 6}}));
        let wide = nb.push_cell(CellKind::Code, "x");
        nb.cell_mut(wide).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": {"row": 3, "col": 4, "width": 5, "height": 2}}}),
        );
        let huge = nb.push_cell(CellKind::Code, "y");
        nb.cell_mut(huge).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": {"row": 0, "col": 2, "width": 40, "height": 1}}}),
        );

        let report = migrate(&mut nb);
        let wide_record = metadata::grid_record(&nb, wide).unwrap();
        assert_eq!(wide_record.placement(), Some(GridPlacement::new(3, 1, 5, 2)));
        let huge_record = metadata::grid_record(&nb, huge).unwrap();
        assert_eq!(huge_record.placement(), Some(GridPlacement::new(0, 0, 6, 1)));
        assert!(huge_record.placement().unwrap().fits(6));
        assert_eq!(report.defaults_substituted, vec![wide, huge]);
    }

    #[test]
    fn test_existing_current_records_are_kept() {
        let mut nb = Notebook::new();
        let id = nb.push_cell(CellKind::Code, "x");
        let current = GridRecord::placed(GridPlacement::new(5, 0, 2, 2));
        metadata::set_grid_record(&mut nb, id, &current).unwrap();
        nb.cell_mut(id).unwrap().metadata_mut().insert(
            "urth".into(),
            json!({"dashboard": {"layout": {"row": 0, "col": 0, "width": 4, "height": 4}}}),
        );
        migrate(&mut nb);
        assert_eq!(metadata::grid_record(&nb, id), Some(current));
    }

    #[test]
    fn test_empty_schema() {
        let mut nb = Notebook::new();
        nb.push_cell(CellKind::Code, "x");
        assert_eq!(detect(&nb), Schema::Empty);
        assert!(!migrate(&mut nb).migrated);
        assert!(nb.metadata().is_empty());
    }
}
