//! Standalone page parameters.
//!
//! The converter bakes a notebook into a flat list of blocks, in notebook
//! order, with the grid boxes of the visible ones. Hidden code cells stay
//! in the list without a box: they are run on load but never shown. The
//! viewer never sees the notebook metadata again; it rebuilds an in-memory
//! notebook from these parameters to lay them out.

use std::collections::BTreeMap;

use nbdash_engine::layout::{GridLayout, LayoutOptions};
use nbdash_engine::metadata::{self, GridPlacement, GridRecord, GridSettings};
use nbdash_engine::{compat, CellId, CellKind, Notebook, NullHost};
use serde::{Deserialize, Serialize};

pub const DEFAULT_KERNEL_NAME: &str = "python3";

fn default_kernel_name() -> String {
    DEFAULT_KERNEL_NAME.to_string()
}

/// One rendered cell of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBlock {
    pub kind: CellKind,
    pub source: String,
    /// Grid box; `None` for a hidden cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<GridPlacement>,
    /// Code to run against the kernel when the page loads.
    #[serde(default)]
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// Notebook server, or provisioning server in tmpnb mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thebe_url: Option<String>,
    #[serde(default)]
    pub tmpnb_mode: bool,
    #[serde(default = "default_kernel_name")]
    pub kernel_name: String,
    #[serde(default)]
    pub notebook_path: String,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub blocks: Vec<PageBlock>,
}

/// Converter inputs that do not come from the notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    pub thebe_url: Option<String>,
    pub tmpnb_mode: bool,
    /// Overrides the notebook's kernelspec.
    pub kernel_name: Option<String>,
    /// Used when the notebook has no kernelspec.
    pub fallback_kernel_name: Option<String>,
    pub notebook_path: String,
}

impl PageParams {
    /// Bake `nb` into page parameters: every visible cell with its grid
    /// box plus every hidden code cell, in notebook order. Code blocks are
    /// executable, markdown and raw are static content. `nb` is left
    /// untouched.
    pub fn convert(nb: &Notebook, opts: ConvertOptions) -> Self {
        let mut work = nb.clone();
        let report = compat::migrate(&mut work);
        if report.migrated {
            log::info!("converter migrated legacy metadata on a copy");
        }

        let grid = metadata::grid_settings(&work);
        let layout = GridLayout::create(
            &mut work,
            &mut NullHost,
            LayoutOptions { static_grid: true, ..LayoutOptions::with_grid(grid) },
        );

        let placed: BTreeMap<CellId, GridPlacement> = layout.placements().into_iter().collect();
        let blocks = work
            .cells()
            .iter()
            .filter_map(|cell| {
                let placement = placed.get(&cell.id()).copied();
                let executable = cell.kind == CellKind::Code;
                // Hidden static content has nothing left to do on the page.
                if placement.is_none() && !executable {
                    return None;
                }
                Some(PageBlock { kind: cell.kind, source: cell.source.clone(), placement, executable })
            })
            .collect();

        let kernel_name = opts
            .kernel_name
            .or_else(|| kernelspec_name(nb))
            .or(opts.fallback_kernel_name)
            .unwrap_or_else(default_kernel_name);

        Self {
            thebe_url: opts.thebe_url,
            tmpnb_mode: opts.tmpnb_mode,
            kernel_name,
            notebook_path: opts.notebook_path,
            grid,
            blocks,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Blocks to run on load, in notebook order, hidden ones included.
    pub fn executable_blocks(&self) -> impl Iterator<Item = (usize, &PageBlock)> {
        self.blocks.iter().enumerate().filter(|(_, b)| b.executable)
    }

    /// In-memory notebook holding one cell per block, with the block's
    /// placement as its stored grid record (hidden when it has none). Ids
    /// are returned in block order.
    pub fn to_notebook(&self) -> (Notebook, Vec<CellId>) {
        let mut nb = Notebook::new();
        metadata::set_grid_settings(&mut nb, self.grid);
        let mut ids = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let id = nb.push_cell(block.kind, block.source.clone());
            let record = match block.placement {
                Some(p) => GridRecord::placed(p),
                None => GridRecord { hidden: true, ..GridRecord::default() },
            };
            if let Err(e) = metadata::set_grid_record(&mut nb, id, &record) {
                log::warn!("block {id} has no cell: {e}");
            }
            ids.push(id);
        }
        (nb, ids)
    }
}

fn kernelspec_name(nb: &Notebook) -> Option<String> {
    nb.metadata()
        .get("kernelspec")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notebook {
        let mut nb = Notebook::new();
        let title = nb.push_cell(CellKind::Markdown, "# Title");
        let hidden = nb.push_cell(CellKind::Code, "import os");
        let chart = nb.push_cell(CellKind::Code, "plot()");
        let table = nb.push_cell(CellKind::Code, "table()");
        metadata::set_grid_record(&mut nb, title, &GridRecord::placed(GridPlacement::new(0, 0, 12, 2))).unwrap();
        metadata::set_grid_record(&mut nb, hidden, &GridRecord { hidden: true, ..GridRecord::default() }).unwrap();
        metadata::set_grid_record(&mut nb, chart, &GridRecord::placed(GridPlacement::new(2, 6, 6, 4))).unwrap();
        metadata::set_grid_record(&mut nb, table, &GridRecord::placed(GridPlacement::new(2, 0, 6, 4))).unwrap();
        nb
    }

    #[test]
    fn test_convert_keeps_notebook_order_and_hidden_code() {
        let nb = sample();
        let params = PageParams::convert(&nb, ConvertOptions::default());

        let sources: Vec<&str> = params.blocks.iter().map(|b| b.source.as_str()).collect();
        assert_eq!(sources, vec!["# Title", "import os", "plot()", "table()"]);
        assert!(!params.blocks[0].executable);
        assert!(params.blocks[1].executable);
        assert_eq!(params.blocks[1].placement, None);
        assert_eq!(params.blocks[2].placement, Some(GridPlacement::new(2, 6, 6, 4)));
        assert_eq!(params.kernel_name, "python3");
        assert_eq!(params.grid, GridSettings::default());
    }

    #[test]
    fn test_hidden_setup_runs_first_and_definitions_precede_uses() {
        let mut nb = Notebook::new();
        let import = nb.push_cell(CellKind::Code, "import pandas as pd");
        let define = nb.push_cell(CellKind::Code, "df = pd.DataFrame()");
        let show = nb.push_cell(CellKind::Code, "df");
        let notes = nb.push_cell(CellKind::Markdown, "scratch notes");
        metadata::set_grid_record(&mut nb, import, &GridRecord { hidden: true, ..GridRecord::default() }).unwrap();
        metadata::set_grid_record(&mut nb, define, &GridRecord::placed(GridPlacement::new(4, 0, 12, 2))).unwrap();
        metadata::set_grid_record(&mut nb, show, &GridRecord::placed(GridPlacement::new(0, 0, 12, 4))).unwrap();
        metadata::set_grid_record(&mut nb, notes, &GridRecord { hidden: true, ..GridRecord::default() }).unwrap();

        let params = PageParams::convert(&nb, ConvertOptions::default());
        let run: Vec<&str> = params.executable_blocks().map(|(_, b)| b.source.as_str()).collect();
        assert_eq!(run, vec!["import pandas as pd", "df = pd.DataFrame()", "df"]);
        assert!(params.blocks.iter().all(|b| b.source != "scratch notes"));
    }

    #[test]
    fn test_convert_leaves_notebook_untouched() {
        let nb = sample();
        let before = nb.clone();
        PageParams::convert(&nb, ConvertOptions::default());
        assert_eq!(nb, before);
    }

    #[test]
    fn test_convert_uses_kernelspec() {
        let mut nb = sample();
        nb.metadata_mut().insert("kernelspec".into(), serde_json::json!({"name": "ir"}));
        assert_eq!(PageParams::convert(&nb, ConvertOptions::default()).kernel_name, "ir");

        let forced = ConvertOptions { kernel_name: Some("julia".into()), ..ConvertOptions::default() };
        assert_eq!(PageParams::convert(&nb, forced).kernel_name, "julia");
    }

    #[test]
    fn test_json_defaults() {
        let params = PageParams::from_json(r#"{"blocks": []}"#).unwrap();
        assert_eq!(params.kernel_name, "python3");
        assert!(!params.tmpnb_mode);
        assert!(params.thebe_url.is_none());
    }

    #[test]
    fn test_to_notebook_stores_placements() {
        let params = PageParams::convert(&sample(), ConvertOptions::default());
        let (nb, ids) = params.to_notebook();
        assert_eq!(ids.len(), 4);
        for (id, block) in ids.iter().zip(&params.blocks) {
            let record = metadata::grid_record(&nb, *id).unwrap();
            assert_eq!(record.placement(), block.placement);
            assert_eq!(record.hidden, block.placement.is_none());
        }
    }
}
