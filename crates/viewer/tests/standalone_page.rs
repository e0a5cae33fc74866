// A converted dashboard opened in the viewer: layout, kernel, replay.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use nbdash_engine::help::HelpOverlay;
use nbdash_engine::layout::grid::StyleRule;
use nbdash_engine::metadata::{self, GridPlacement, GridRecord};
use nbdash_engine::{CellId, CellKind, CellSlot, DashboardHost, Notebook};
use nbdash_kernel_client::{CommManager, KernelChannel, MemoryCache, SessionError, StartedVia};
use nbdash_protocol::KernelMessage;
use nbdash_viewer::render::{SHOW_ROW_CLASS, SINGLE_CELL_CLASS};
use nbdash_viewer::{
    connect, ConvertOptions, KernelRuntime, PageParams, PageQuery, PageView, RecordedOutputs,
    ViewerOptions,
};
use serde_json::json;

#[derive(Default)]
struct Browser {
    classes: Vec<String>,
    bound: BTreeMap<CellId, GridPlacement>,
    revealed: bool,
}

impl DashboardHost for Browser {
    fn set_body_class(&mut self, class: &str, enabled: bool) {
        self.classes.retain(|c| c != class);
        if enabled {
            self.classes.push(class.to_string());
        }
    }
    fn set_body_attr(&mut self, _name: &str, _value: &str) {}
    fn bind_cell(&mut self, cell: CellId, slot: CellSlot) {
        if let CellSlot::Grid(p) = slot {
            self.bound.insert(cell, p);
        }
    }
    fn unbind_cell(&mut self, cell: CellId) {
        self.bound.remove(&cell);
    }
    fn mount_help(&mut self, _overlay: &HelpOverlay) {}
    fn unmount_help(&mut self, _overlay_id: u64) {}
    fn notify_resize_all(&mut self) {}
}

impl nbdash_viewer::PageHost for Browser {
    fn install_styles(&mut self, _rules: &[StyleRule]) {}
    fn set_cell_flex(&mut self, _cell: CellId, _flex: &str) {}
    fn reveal(&mut self) {
        self.revealed = true;
    }
}

/// Three rows; row 2 holds cells starting at columns 0, 1 and 5.
fn dashboard() -> Notebook {
    let mut nb = Notebook::new();
    let boxes = [
        (CellKind::Markdown, "# Report", GridPlacement::new(0, 0, 12, 2)),
        (CellKind::Code, "a()", GridPlacement::new(2, 0, 1, 3)),
        (CellKind::Code, "b()", GridPlacement::new(2, 1, 4, 3)),
        (CellKind::Code, "c()", GridPlacement::new(2, 5, 7, 3)),
        (CellKind::Code, "d()", GridPlacement::new(5, 1, 4, 2)),
    ];
    for (kind, source, p) in boxes {
        let id = nb.push_cell(kind, source);
        metadata::set_grid_record(&mut nb, id, &GridRecord::placed(p)).unwrap();
    }
    nb
}

#[test]
fn row_and_col_query_shows_single_cell_non_interactively() {
    let params = PageParams::convert(&dashboard(), ConvertOptions::default());
    let query = PageQuery::from_url("http://viewer.example.org/dashboards/report?row=2&col=1").unwrap();

    let mut browser = Browser::default();
    let view = PageView::render(&params, query, &mut browser);

    let visible = view.visible_blocks();
    assert_eq!(visible.len(), 1);
    let (index, placement) = visible[0];
    assert_eq!(params.blocks[index].source, "b()");
    assert_eq!(placement, GridPlacement::new(2, 1, 4, 3));
    assert_eq!(browser.bound.len(), 1);
    assert!(!view.is_interactive());
    assert!(browser.classes.contains(&SHOW_ROW_CLASS.to_string()));
    assert!(browser.classes.contains(&SINGLE_CELL_CLASS.to_string()));
    assert!(browser.revealed);
}

#[test]
fn row_query_shows_whole_row() {
    let params = PageParams::convert(&dashboard(), ConvertOptions::default());
    let mut browser = Browser::default();
    let view = PageView::render(&params, PageQuery::parse("row=2"), &mut browser);

    let sources: Vec<&str> = view
        .visible_blocks()
        .into_iter()
        .map(|(i, _)| params.blocks[i].source.as_str())
        .collect();
    assert_eq!(sources, vec!["a()", "b()", "c()"]);
}

/// Comm side of the scripted kernel: records every call in order.
#[derive(Default)]
struct CommLog {
    events: Vec<String>,
}

impl CommManager for CommLog {
    fn connect_to_comm(&mut self, target_name: &str, comm_id: &str) {
        self.events.push(format!("connect {target_name} {comm_id}"));
    }

    fn deliver(&mut self, comm_id: &str, data: &serde_json::Value) {
        self.events.push(format!("deliver {comm_id} {data}"));
    }
}

/// Kernel that answers each execute with a fixed script.
#[derive(Default)]
struct ScriptedKernel {
    executed: Vec<String>,
    comms: CommLog,
}

fn message(msg_type: &str, content: serde_json::Value) -> KernelMessage {
    serde_json::from_value(json!({
        "header": {"msg_id": format!("m-{msg_type}"), "msg_type": msg_type},
        "parent_header": {"msg_id": "req"},
        "content": content,
        "channel": "iopub"
    }))
    .unwrap()
}

impl KernelChannel for ScriptedKernel {
    fn execute(
        &mut self,
        code: &str,
        on_message: &mut dyn FnMut(KernelMessage, &mut dyn CommManager),
    ) -> Result<(), SessionError> {
        self.executed.push(code.to_string());
        on_message(message("status", json!({"execution_state": "busy"})), &mut self.comms);
        on_message(message("execute_input", json!({"code": code, "execution_count": 1})), &mut self.comms);
        on_message(message("stream", json!({"name": "stdout", "text": format!("ran {code}\n")})), &mut self.comms);
        if code == "c()" {
            // The widget's first state update follows its open in the same execution.
            on_message(message("comm_open", json!({"comm_id": "w1", "target_name": "jupyter.widget", "data": {}})), &mut self.comms);
            on_message(message("comm_msg", json!({"comm_id": "w1", "data": {"method": "update"}})), &mut self.comms);
            on_message(message("comm_msg", json!({"comm_id": "w9", "data": {}})), &mut self.comms);
            on_message(message("display_data", json!({"data": {"text/plain": "<widget>"}, "metadata": {}})), &mut self.comms);
        }
        on_message(message("status", json!({"execution_state": "idle"})), &mut self.comms);
        Ok(())
    }
}

#[test]
fn replay_routes_known_kinds_and_drops_the_rest() {
    let params = PageParams::convert(&dashboard(), ConvertOptions::default());
    let mut runtime = KernelRuntime::new(ScriptedKernel::default(), Duration::from_millis(500));
    let mut outputs = RecordedOutputs::default();

    let summary = runtime.execute_all(&params, &mut outputs).unwrap();

    // Markdown is static content; the four code blocks run in order.
    assert_eq!(runtime.channel().executed, vec!["a()", "b()", "c()", "d()"]);
    assert_eq!(summary.executed, 4);
    assert_eq!(summary.outputs, 5);
    assert_eq!(summary.comm_messages, 1);
    // Four execute_input echoes and the message for a comm never opened.
    assert_eq!(summary.dropped, 5);

    let c_block = params.blocks.iter().position(|b| b.source == "c()").unwrap();
    let area = outputs.area(c_block).unwrap();
    assert_eq!(area.outputs().len(), 2);
    assert_eq!(area.outputs()[0]["text"], "ran c()\n");
    assert_eq!(area.outputs()[1]["output_type"], "display_data");
    assert!(outputs.area(0).is_none());

    assert_eq!(
        runtime.channel().comms.events,
        vec![
            "connect jupyter.widget w1".to_string(),
            r#"deliver w1 {"method":"update"}"#.to_string(),
        ]
    );
    assert_eq!(runtime.comms().target("w1"), Some("jupyter.widget"));

    // The last status was idle.
    assert_eq!(runtime.tick(Instant::now() + Duration::from_secs(1)), Some(false));
    assert!(!runtime.busy().is_shown());
}

#[test]
fn replay_runs_hidden_setup_in_notebook_order() {
    let mut nb = Notebook::new();
    let import = nb.push_cell(CellKind::Code, "import pandas as pd");
    let define = nb.push_cell(CellKind::Code, "df = pd.DataFrame()");
    let show = nb.push_cell(CellKind::Code, "df");
    metadata::set_grid_record(&mut nb, import, &GridRecord { hidden: true, ..GridRecord::default() }).unwrap();
    // The definition sits below its use on the dashboard.
    metadata::set_grid_record(&mut nb, define, &GridRecord::placed(GridPlacement::new(4, 0, 12, 2))).unwrap();
    metadata::set_grid_record(&mut nb, show, &GridRecord::placed(GridPlacement::new(0, 0, 12, 4))).unwrap();

    let params = PageParams::convert(&nb, ConvertOptions::default());
    let mut runtime = KernelRuntime::new(ScriptedKernel::default(), Duration::from_millis(500));
    runtime.execute_all(&params, &mut RecordedOutputs::default()).unwrap();
    assert_eq!(runtime.channel().executed, vec!["import pandas as pd", "df = pd.DataFrame()", "df"]);

    let mut browser = Browser::default();
    let view = PageView::render(&params, PageQuery::default(), &mut browser);
    let shown: Vec<&str> = view
        .visible_blocks()
        .into_iter()
        .map(|(i, _)| params.blocks[i].source.as_str())
        .collect();
    assert_eq!(shown, vec!["df", "df = pd.DataFrame()"]);
    assert_eq!(browser.bound.len(), 2);
}

#[test]
fn tmpnb_page_spawns_container_and_starts_session() {
    let server = MockServer::start();
    let spawn = server.mock(|when, then| {
        when.method(POST).path("/api/spawn/");
        then.status(200).json_body(json!({"url": "/user/v1/"}));
    });
    let session = server.mock(|when, then| {
        when.method(POST).path("/user/v1/api/sessions");
        then.status(201).json_body(json!({
            "id": "s-9",
            "path": "dashboards/report",
            "kernel": {"id": "k-9", "name": "python3"}
        }));
    });

    let mut params = PageParams::convert(&dashboard(), ConvertOptions::default());
    params.thebe_url = Some(server.base_url());
    params.tmpnb_mode = true;
    params.notebook_path = "dashboards/report".into();

    let mut cache = MemoryCache::default();
    let conn = connect(&ViewerOptions::from_page(&params), &mut cache).unwrap();

    spawn.assert();
    session.assert();
    assert_eq!(conn.session.kernel_id, "k-9");
    assert_eq!(conn.session.via, StartedVia::Session);
    assert!(conn.container.is_some());
    assert_eq!(
        nbdash_kernel_client::ContainerCache::load(&cache).map(|c| c.url),
        Some(format!("{}/user/v1/", server.base_url()))
    );
}
