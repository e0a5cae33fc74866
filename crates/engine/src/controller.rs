//! Dashboard mode controller.
//!
//! Owns the notebook, the current action state, the single live dashboard
//! instance and the single help overlay. Every transition goes through
//! here; nothing else creates or destroys a layout.
//!
//! Entering is two-phase so an embedder can load layout resources
//! asynchronously between the phases: `request_enter` hands out a ticket,
//! `finish_enter` acts on it. A ticket is stale once a newer request or an
//! exit has happened, and a stale ticket does nothing.

use std::time::Instant;

use crate::cell_id::CellId;
use crate::compat::{self, MigrationReport};
use crate::error::DashboardError;
use crate::help::HelpOverlay;
use crate::host::DashboardHost;
use crate::layout::{self, Completion, DashboardLayout, LayoutOptions, ShowAllOptions};
use crate::metadata::{self, ActionState, DashboardView};
use crate::notebook::Notebook;

/// Body class present while any dashboard state is active.
pub const BODY_CLASS: &str = "jupyter-dashboard";
/// Body attribute naming the active layout type.
pub const LAYOUT_ATTR: &str = "data-dashboard-layout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    Notebook,
    Grid,
    Report,
    Preview,
    ShowAll,
    ShowAllStacked,
    HideAll,
}

/// A menu or toolbar entry for the host to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub action: MenuAction,
    pub label: &'static str,
    /// State the entry switches to, for mode entries.
    pub selects: Option<ActionState>,
}

const MENU: &[MenuItem] = &[
    MenuItem { action: MenuAction::Notebook, label: "Notebook", selects: Some(ActionState::Notebook) },
    MenuItem { action: MenuAction::Grid, label: "Layout as Grid", selects: Some(ActionState::Grid) },
    MenuItem { action: MenuAction::Report, label: "Layout as Report", selects: Some(ActionState::Report) },
    MenuItem { action: MenuAction::Preview, label: "Preview", selects: Some(ActionState::Preview) },
    MenuItem { action: MenuAction::ShowAll, label: "Show All Cells", selects: None },
    MenuItem { action: MenuAction::ShowAllStacked, label: "Show All Cells Stacked", selects: None },
    MenuItem { action: MenuAction::HideAll, label: "Hide All Cells", selects: None },
];

/// Handle for a pending dashboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTicket {
    generation: u64,
    target: ActionState,
}

impl EntryTicket {
    pub fn target(&self) -> ActionState {
        self.target
    }
}

pub struct DashboardController {
    notebook: Notebook,
    state: ActionState,
    options: LayoutOptions,
    dashboard: Option<Box<dyn DashboardLayout>>,
    help: Option<HelpOverlay>,
    next_help_id: u64,
    generation: u64,
    migration_checked: bool,
    last_migration: Option<MigrationReport>,
}

impl DashboardController {
    pub fn new(notebook: Notebook) -> Self {
        Self::with_options(notebook, LayoutOptions::default())
    }

    /// `options.grid` is only the fallback; notebook-level grid settings
    /// win when present.
    pub fn with_options(notebook: Notebook, options: LayoutOptions) -> Self {
        Self {
            notebook,
            state: ActionState::Notebook,
            options,
            dashboard: None,
            help: None,
            next_help_id: 0,
            generation: 0,
            migration_checked: false,
            last_migration: None,
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn notebook_mut(&mut self) -> &mut Notebook {
        &mut self.notebook
    }

    pub fn into_notebook(self) -> Notebook {
        self.notebook
    }

    pub fn dashboard(&self) -> Option<&dyn DashboardLayout> {
        self.dashboard.as_deref()
    }

    /// The live dashboard together with the notebook it writes to, for
    /// forwarding drag, resize and reorder events.
    pub fn dashboard_parts_mut(&mut self) -> Option<(&mut dyn DashboardLayout, &mut Notebook)> {
        let dashboard: &mut dyn DashboardLayout = self.dashboard.as_deref_mut()?;
        Some((dashboard, &mut self.notebook))
    }

    pub fn help(&self) -> Option<&HelpOverlay> {
        self.help.as_ref()
    }

    /// Migration outcome of this session, once entry has checked for it.
    pub fn migration(&self) -> Option<&MigrationReport> {
        self.last_migration.as_ref()
    }

    /// Number of dashboard instances not yet destroyed (0 or 1).
    pub fn live_instances(&self) -> usize {
        self.dashboard.iter().filter(|d| !d.is_destroyed()).count()
    }

    pub fn menu_items(&self) -> &'static [MenuItem] {
        MENU
    }

    /// Toolbar buttons: the four mode entries.
    pub fn toolbar_items(&self) -> Vec<MenuItem> {
        MENU.iter().filter(|m| m.selects.is_some()).copied().collect()
    }

    /// Start entering `target`. The body class goes on immediately so the
    /// page restyles while layout resources load.
    pub fn request_enter(&mut self, host: &mut dyn DashboardHost, target: ActionState) -> EntryTicket {
        self.generation += 1;
        if target.is_dashboard() {
            host.set_body_class(BODY_CLASS, true);
        }
        EntryTicket { generation: self.generation, target }
    }

    /// Complete an entry. Returns false for a stale ticket.
    pub fn finish_enter(&mut self, host: &mut dyn DashboardHost, ticket: EntryTicket) -> bool {
        if ticket.generation != self.generation {
            log::debug!("discarding stale entry into {}", ticket.target.as_str());
            return false;
        }
        if !ticket.target.is_dashboard() {
            self.exit_dashboard_mode(host);
            return true;
        }

        self.migrate_once();

        let view = ticket
            .target
            .view()
            .or_else(|| metadata::active_view(&self.notebook))
            .unwrap_or(DashboardView::Grid);

        if let Some(mut old) = self.dashboard.take() {
            old.destroy(&mut self.notebook, host);
        }
        if let Some(old) = self.help.take() {
            host.unmount_help(old.id());
        }

        let overlay = HelpOverlay::build(self.next_help_id, layout::help_text_for(view));
        self.next_help_id += 1;
        host.mount_help(&overlay);
        self.help = Some(overlay);

        let mut opts = self.options;
        if metadata::is_initialized(&self.notebook) {
            opts.grid = metadata::grid_settings(&self.notebook);
        } else {
            metadata::set_grid_settings(&mut self.notebook, opts.grid);
        }
        let mut dashboard = layout::create_layout(view, &mut self.notebook, host, opts);
        let reflow: Completion<'_> = &mut |h: &mut dyn DashboardHost| h.notify_resize_all();
        dashboard.set_interactive(host, ticket.target != ActionState::Preview, Some(reflow));
        self.dashboard = Some(dashboard);

        host.set_body_class(BODY_CLASS, true);
        host.set_body_attr(LAYOUT_ATTR, view.type_name());
        self.state = ticket.target;
        log::info!("entered dashboard {} ({view})", ticket.target.as_str());
        true
    }

    fn migrate_once(&mut self) {
        if self.migration_checked {
            return;
        }
        self.migration_checked = true;
        if compat::needs_migration(&self.notebook) {
            self.last_migration = Some(compat::migrate(&mut self.notebook));
        } else {
            self.last_migration = Some(MigrationReport::default());
        }
    }

    /// Enter `target` in one step.
    pub fn enter_dashboard_mode(&mut self, host: &mut dyn DashboardHost, target: ActionState) {
        let ticket = self.request_enter(host, target);
        self.finish_enter(host, ticket);
    }

    /// Leave any dashboard state. Also invalidates pending entries.
    pub fn exit_dashboard_mode(&mut self, host: &mut dyn DashboardHost) {
        self.generation += 1;
        host.set_body_class(BODY_CLASS, false);
        host.set_body_attr(LAYOUT_ATTR, "");
        if let Some(mut dashboard) = self.dashboard.take() {
            dashboard.destroy(&mut self.notebook, host);
        }
        host.notify_resize_all();
        if let Some(overlay) = self.help.take() {
            host.unmount_help(overlay.id());
        }
        if self.state != ActionState::Notebook {
            log::info!("left dashboard {}", self.state.as_str());
        }
        self.state = ActionState::Notebook;
    }

    pub fn switch_to(&mut self, host: &mut dyn DashboardHost, state: ActionState) {
        if state.is_dashboard() {
            self.enter_dashboard_mode(host, state);
        } else {
            self.exit_dashboard_mode(host);
        }
    }

    pub fn switch_to_notebook(&mut self, host: &mut dyn DashboardHost) {
        self.switch_to(host, ActionState::Notebook);
    }

    pub fn switch_to_grid(&mut self, host: &mut dyn DashboardHost) {
        self.switch_to(host, ActionState::Grid);
    }

    pub fn switch_to_report(&mut self, host: &mut dyn DashboardHost) {
        self.switch_to(host, ActionState::Report);
    }

    pub fn switch_to_preview(&mut self, host: &mut dyn DashboardHost) {
        self.switch_to(host, ActionState::Preview);
    }

    /// Run a menu or toolbar action.
    pub fn trigger(&mut self, host: &mut dyn DashboardHost, action: MenuAction) -> Result<(), DashboardError> {
        match action {
            MenuAction::Notebook => self.switch_to_notebook(host),
            MenuAction::Grid => self.switch_to_grid(host),
            MenuAction::Report => self.switch_to_report(host),
            MenuAction::Preview => self.switch_to_preview(host),
            MenuAction::ShowAll => self.show_all(host)?,
            MenuAction::ShowAllStacked => self.show_all_stacked(host)?,
            MenuAction::HideAll => self.hide_all(host)?,
        }
        Ok(())
    }

    fn live(&mut self) -> Result<(&mut dyn DashboardLayout, &mut Notebook), DashboardError> {
        let dashboard: &mut dyn DashboardLayout = match self.dashboard.as_deref_mut() {
            Some(d) if !d.is_destroyed() => d,
            _ => return Err(DashboardError::NotCreated),
        };
        Ok((dashboard, &mut self.notebook))
    }

    pub fn show_all(&mut self, host: &mut dyn DashboardHost) -> Result<(), DashboardError> {
        let (dashboard, nb) = self.live()?;
        dashboard.show_all_cells(nb, host, ShowAllOptions::default());
        Ok(())
    }

    /// Show every cell stacked one per row at the full column count.
    pub fn show_all_stacked(&mut self, host: &mut dyn DashboardHost) -> Result<(), DashboardError> {
        let (dashboard, nb) = self.live()?;
        let width = dashboard.num_cols();
        dashboard.show_all_cells(nb, host, ShowAllOptions { width });
        Ok(())
    }

    pub fn hide_all(&mut self, host: &mut dyn DashboardHost) -> Result<(), DashboardError> {
        let (dashboard, nb) = self.live()?;
        dashboard.hide_all_cells(nb, host);
        Ok(())
    }

    pub fn show_cell(&mut self, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError> {
        let (dashboard, nb) = self.live()?;
        dashboard.show_cell(nb, host, id)
    }

    pub fn hide_cell(&mut self, host: &mut dyn DashboardHost, id: CellId) -> Result<bool, DashboardError> {
        let (dashboard, nb) = self.live()?;
        dashboard.hide_cell(nb, host, id)
    }

    /// The page was resized.
    pub fn on_resize(&mut self, host: &mut dyn DashboardHost) {
        if let Some(dashboard) = self.dashboard.as_deref_mut() {
            dashboard.on_resize(host);
        }
    }

    /// Timer callback: write out due layout changes and honour a layout's
    /// exit request. Returns the number of records written.
    pub fn tick(&mut self, host: &mut dyn DashboardHost, now: Instant) -> usize {
        let Some(dashboard) = self.dashboard.as_deref_mut() else {
            return 0;
        };
        let written = dashboard.flush(&mut self.notebook, now);
        if dashboard.take_exit_request() {
            self.switch_to_notebook(host);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{notebook_with, RecordingHost};
    use crate::host::CellSlot;
    use crate::layout::LayoutState;
    use crate::metadata::GridRecord;
    use serde_json::json;
    use std::time::Duration;

    fn controller(n: usize) -> (DashboardController, Vec<CellId>) {
        let (nb, ids) = notebook_with(n);
        (DashboardController::new(nb), ids)
    }

    #[test]
    fn test_first_entry_defaults_to_grid() {
        let (mut ctl, ids) = controller(2);
        let mut host = RecordingHost::default();
        ctl.switch_to_preview(&mut host);

        assert_eq!(ctl.state(), ActionState::Preview);
        assert_eq!(ctl.dashboard().map(|d| d.view()), Some(DashboardView::Grid));
        assert_eq!(ctl.dashboard().map(|d| d.state()), Some(LayoutState::Static));
        assert!(host.has_class(BODY_CLASS));
        assert_eq!(host.attr(LAYOUT_ATTR), Some("grid"));
        assert!(matches!(host.bound.get(&ids[0]), Some(CellSlot::Grid(_))));
    }

    #[test]
    fn test_edit_entry_is_interactive_and_mounts_help() {
        let (mut ctl, _) = controller(1);
        let mut host = RecordingHost::default();
        ctl.switch_to_report(&mut host);

        assert_eq!(ctl.dashboard().map(|d| d.state()), Some(LayoutState::Interactive));
        assert_eq!(host.help.len(), 1);
        assert_eq!(host.help[0].snippet, layout::report::HELP.snippet.unwrap_or_default());
        assert_eq!(host.resize_all, 1);
    }

    #[test]
    fn test_preview_uses_stored_active_view() {
        let (mut ctl, _) = controller(1);
        let mut host = RecordingHost::default();
        ctl.switch_to_report(&mut host);
        ctl.switch_to_notebook(&mut host);
        ctl.switch_to_preview(&mut host);
        assert_eq!(ctl.dashboard().map(|d| d.view()), Some(DashboardView::Report));
        assert_eq!(host.attr(LAYOUT_ATTR), Some("report"));
    }

    #[test]
    fn test_switch_replaces_instance_and_help() {
        let (mut ctl, ids) = controller(2);
        let mut host = RecordingHost::default();
        ctl.switch_to_grid(&mut host);
        let first_help = host.help[0].id();
        ctl.switch_to_report(&mut host);

        assert_eq!(ctl.live_instances(), 1);
        assert_eq!(host.help.len(), 1);
        assert_ne!(host.help[0].id(), first_help);
        assert_eq!(host.report_flow(), ids);
        assert!(host.bound.values().all(|s| matches!(s, CellSlot::Report(_))));
    }

    #[test]
    fn test_exit_restores_notebook_view() {
        let (mut ctl, _) = controller(2);
        let mut host = RecordingHost::default();
        ctl.switch_to_grid(&mut host);
        ctl.switch_to_notebook(&mut host);

        assert_eq!(ctl.state(), ActionState::Notebook);
        assert_eq!(ctl.live_instances(), 0);
        assert!(host.help.is_empty());
        assert!(host.bound.is_empty());
        assert!(!host.has_class(BODY_CLASS));
        assert_eq!(host.attr(LAYOUT_ATTR), None);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let (mut ctl, _) = controller(1);
        let mut host = RecordingHost::default();
        let slow = ctl.request_enter(&mut host, ActionState::Grid);
        let fast = ctl.request_enter(&mut host, ActionState::Report);

        assert!(ctl.finish_enter(&mut host, fast));
        assert!(!ctl.finish_enter(&mut host, slow));
        assert_eq!(ctl.state(), ActionState::Report);
        assert_eq!(ctl.live_instances(), 1);
    }

    #[test]
    fn test_exit_invalidates_pending_entry() {
        let (mut ctl, _) = controller(1);
        let mut host = RecordingHost::default();
        let ticket = ctl.request_enter(&mut host, ActionState::Grid);
        assert!(host.has_class(BODY_CLASS));
        ctl.switch_to_notebook(&mut host);

        assert!(!ctl.finish_enter(&mut host, ticket));
        assert_eq!(ctl.live_instances(), 0);
        assert!(!host.has_class(BODY_CLASS));
    }

    #[test]
    fn test_entry_migrates_legacy_metadata_once() {
        let (mut nb, ids) = notebook_with(1);
        nb.cell_mut(ids[0])
            .unwrap()
            .metadata_mut()
            .insert("urth".into(), json!({"dashboard": {"hidden": true}}));
        let mut ctl = DashboardController::new(nb);
        let mut host = RecordingHost::default();
        ctl.switch_to_grid(&mut host);

        assert!(ctl.migration().is_some_and(|m| m.migrated));
        assert!(!compat::needs_migration(ctl.notebook()));
        assert!(host.bound.is_empty());
    }

    #[test]
    fn test_forwarding_without_dashboard_fails() {
        let (mut ctl, _) = controller(1);
        let mut host = RecordingHost::default();
        assert!(matches!(ctl.show_all(&mut host), Err(DashboardError::NotCreated)));
        assert!(matches!(ctl.trigger(&mut host, MenuAction::HideAll), Err(DashboardError::NotCreated)));
    }

    #[test]
    fn test_show_all_stacked_uses_column_count() {
        let (mut ctl, ids) = controller(3);
        let mut host = RecordingHost::default();
        ctl.switch_to_grid(&mut host);
        ctl.trigger(&mut host, MenuAction::ShowAllStacked).unwrap();

        for id in ids {
            let record = metadata::grid_record(ctl.notebook(), id).unwrap();
            assert_eq!(record.width, Some(12));
            assert_eq!(record.col, Some(0));
        }
    }

    #[test]
    fn test_tick_flushes_and_honours_exit_request() {
        let (mut nb, ids) = notebook_with(1);
        metadata::set_grid_record(&mut nb, ids[0], &GridRecord::placed(metadata::GridPlacement::new(0, 0, 4, 2)))
            .unwrap();
        let mut ctl = DashboardController::new(nb);
        let mut host = RecordingHost::default();
        ctl.switch_to_grid(&mut host);

        let t0 = Instant::now();
        {
            let (dashboard, _) = ctl.dashboard_parts_mut().unwrap();
            let grid = dashboard.as_grid_mut().unwrap();
            grid.drag_stop(&mut host, ids[0], 3, 3, t0).unwrap();
            grid.request_exit();
        }
        assert_eq!(ctl.tick(&mut host, t0 + Duration::from_secs(1)), 1);
        assert_eq!(ctl.state(), ActionState::Notebook);
        assert_eq!(
            metadata::grid_record(ctl.notebook(), ids[0]).unwrap().row,
            Some(3)
        );
    }

    #[test]
    fn test_toolbar_lists_mode_entries() {
        let (ctl, _) = controller(0);
        let actions: Vec<_> = ctl.toolbar_items().iter().map(|m| m.action).collect();
        assert_eq!(
            actions,
            vec![MenuAction::Notebook, MenuAction::Grid, MenuAction::Report, MenuAction::Preview]
        );
        assert_eq!(ctl.menu_items().len(), 7);
    }
}
