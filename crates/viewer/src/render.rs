//! Page layout: the static grid, or a single row or cell of it.

use nbdash_engine::layout::grid::StyleRule;
use nbdash_engine::layout::{DashboardLayout, GridLayout, LayoutOptions};
use nbdash_engine::metadata::GridPlacement;
use nbdash_engine::{CellId, DashboardHost, Notebook};

use crate::page::PageParams;
use crate::query::PageQuery;

pub const GRID_VIEW_CLASS: &str = "grid-view";
pub const SHOW_ROW_CLASS: &str = "show-row-only";
pub const SINGLE_CELL_CLASS: &str = "single-cell";

/// The viewer page as the layout sees it.
pub trait PageHost: DashboardHost {
    fn install_styles(&mut self, rules: &[StyleRule]);

    /// CSS `flex` shorthand for a cell in full-row mode.
    fn set_cell_flex(&mut self, cell: CellId, flex: &str);

    /// Make the laid-out dashboard visible.
    fn reveal(&mut self);
}

/// Flex value giving a cell a basis equal to its grid width.
pub fn flex_basis(width: u32) -> String {
    format!("{width} 0 {width}px")
}

/// A laid-out viewer page. The grid is static: nothing on it can be
/// dragged or resized.
pub struct PageView {
    notebook: Notebook,
    blocks: Vec<CellId>,
    grid: GridLayout,
    query: PageQuery,
}

impl PageView {
    pub fn render<H: PageHost>(params: &PageParams, query: PageQuery, host: &mut H) -> Self {
        let (mut notebook, blocks) = params.to_notebook();
        let opts = LayoutOptions { static_grid: true, ..LayoutOptions::with_grid(params.grid) };
        let mut grid = GridLayout::create(&mut notebook, host, opts);

        match query.row {
            None => {
                host.set_body_class(GRID_VIEW_CLASS, true);
                host.install_styles(&grid.stylesheet_rules());
            }
            Some(row) => {
                host.set_body_class(SHOW_ROW_CLASS, true);
                if query.col.is_some() {
                    host.set_body_class(SINGLE_CELL_CLASS, true);
                }
                for &id in &blocks {
                    let Some(p) = grid.placement(id) else { continue };
                    let keep = p.row == row && query.col.map_or(true, |col| p.col == col);
                    if !keep {
                        if let Err(e) = grid.hide_cell(&mut notebook, host, id) {
                            log::warn!("could not hide block {id}: {e}");
                        }
                    } else if query.col.is_none() {
                        host.set_cell_flex(id, &flex_basis(p.width));
                    }
                }
                log::info!("showing {} cells of row {row}", grid.stack().len());
            }
        }

        host.reveal();
        Self { notebook, blocks, grid, query }
    }

    pub fn query(&self) -> PageQuery {
        self.query
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn layout(&self) -> &GridLayout {
        &self.grid
    }

    pub fn is_interactive(&self) -> bool {
        self.grid.is_interactive()
    }

    /// Cell standing for block `index`.
    pub fn cell_of(&self, index: usize) -> Option<CellId> {
        self.blocks.get(index).copied()
    }

    /// Indices of the blocks on screen, with their boxes, top-left first.
    pub fn visible_blocks(&self) -> Vec<(usize, GridPlacement)> {
        let mut shown: Vec<(usize, GridPlacement)> = self
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(i, id)| self.grid.placement(*id).map(|p| (i, p)))
            .collect();
        shown.sort_by_key(|(i, p)| (p.row, p.col, *i));
        shown
    }

    /// Window resized: rich outputs re-measure.
    pub fn on_resize(&mut self, host: &mut dyn DashboardHost) {
        self.grid.on_resize(host);
    }
}
