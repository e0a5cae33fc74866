// `nbdash view`: lay out page parameters the way the viewer page would,
// optionally acquiring a kernel, and print the resulting plan.

use std::collections::BTreeMap;
use std::path::PathBuf;

use nbdash_config::Settings;
use nbdash_engine::help::HelpOverlay;
use nbdash_engine::layout::grid::StyleRule;
use nbdash_engine::{CellId, CellKind, CellSlot, DashboardHost};
use nbdash_kernel_client::{ContainerCache, ContainerSource, FileCache, MemoryCache};
use nbdash_viewer::{connect, Connection, PageHost, PageParams, PageQuery, PageView, ViewerOptions};
use serde::Serialize;

use crate::exit_codes::{viewer_exit_code, EXIT_PAGE_PARSE};
use crate::{read_text, to_json, write_output, CliError};

pub struct ViewArgs {
    pub page: PathBuf,
    pub query: Option<String>,
    pub base_url: Option<String>,
    pub tmpnb: bool,
    pub cache: Option<PathBuf>,
    pub offline: bool,
}

/// Records what the page would show.
#[derive(Default)]
struct PlanHost {
    body_classes: Vec<String>,
    flex: BTreeMap<CellId, String>,
    styles: Vec<StyleRule>,
}

impl DashboardHost for PlanHost {
    fn set_body_class(&mut self, class: &str, enabled: bool) {
        self.body_classes.retain(|c| c != class);
        if enabled {
            self.body_classes.push(class.to_string());
        }
    }
    fn set_body_attr(&mut self, _name: &str, _value: &str) {}
    fn bind_cell(&mut self, _cell: CellId, _slot: CellSlot) {}
    fn unbind_cell(&mut self, _cell: CellId) {}
    fn mount_help(&mut self, _overlay: &HelpOverlay) {}
    fn unmount_help(&mut self, _overlay_id: u64) {}
    fn notify_resize_all(&mut self) {}
}

impl PageHost for PlanHost {
    fn install_styles(&mut self, rules: &[StyleRule]) {
        self.styles.extend_from_slice(rules);
    }
    fn set_cell_flex(&mut self, cell: CellId, flex: &str) {
        self.flex.insert(cell, flex.to_string());
    }
    fn reveal(&mut self) {}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockPlan {
    index: usize,
    kind: CellKind,
    row: u32,
    col: u32,
    width: u32,
    height: u32,
    executable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    flex: Option<String>,
}

#[derive(Serialize)]
struct StylePlan {
    selector: &'static str,
    rules: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KernelPlan {
    kernel_id: String,
    kernel_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    channels_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<String>,
    container_reused: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewPlan {
    mode: &'static str,
    interactive: bool,
    body_classes: Vec<String>,
    styles: Vec<StylePlan>,
    blocks: Vec<BlockPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kernel: Option<KernelPlan>,
}

pub fn cmd_view(settings: &Settings, args: ViewArgs) -> Result<(), CliError> {
    let text = read_text(&args.page)?;
    let params = PageParams::from_json(&text)
        .map_err(|e| CliError::new(EXIT_PAGE_PARSE, format!("{}: {}", args.page.display(), e)))?;
    let query = PageQuery::parse(args.query.as_deref().unwrap_or(""));

    let mut host = PlanHost::default();
    let view = PageView::render(&params, query, &mut host);

    let blocks = view
        .visible_blocks()
        .into_iter()
        .map(|(index, p)| BlockPlan {
            index,
            kind: params.blocks[index].kind,
            row: p.row,
            col: p.col,
            width: p.width,
            height: p.height,
            executable: params.blocks[index].executable,
            flex: view.cell_of(index).and_then(|id| host.flex.get(&id).cloned()),
        })
        .collect();

    let mode = match (query.row, query.col) {
        (None, _) => "grid",
        (Some(_), None) => "row",
        (Some(_), Some(_)) => "cell",
    };

    let kernel = if args.offline {
        None
    } else {
        Some(start_kernel(settings, &params, &args)?)
    };

    let plan = ViewPlan {
        mode,
        interactive: view.is_interactive(),
        body_classes: host.body_classes,
        styles: host
            .styles
            .into_iter()
            .map(|r| StylePlan { selector: r.selector, rules: r.rules })
            .collect(),
        blocks,
        kernel,
    };
    write_output(None, &to_json(&plan)?)
}

fn start_kernel(settings: &Settings, params: &PageParams, args: &ViewArgs) -> Result<KernelPlan, CliError> {
    let mut opts = ViewerOptions::from_page(params);
    opts.base_url = args
        .base_url
        .clone()
        .or(opts.base_url)
        .or_else(|| settings.thebe_url.clone());
    opts.tmpnb_mode = args.tmpnb || opts.tmpnb_mode || settings.tmpnb_mode;
    opts.image_name = settings.image_name.clone();
    opts.request_timeout = settings.request_timeout();

    let mut cache: Box<dyn ContainerCache> = match args.cache.clone().map(FileCache::new).or_else(FileCache::default_location) {
        Some(file) => Box::new(file),
        None => {
            log::warn!("no config directory; container will not be remembered");
            Box::new(MemoryCache::default())
        }
    };

    let Connection { container, session } = connect(&opts, cache.as_mut()).map_err(|e| {
        let err = CliError::new(viewer_exit_code(&e), e.to_string());
        match e {
            nbdash_viewer::ViewerError::MissingBaseUrl => {
                err.with_hint("pass --base-url, set viewer.thebeUrl, or use --offline")
            }
            _ => err,
        }
    })?;

    Ok(KernelPlan {
        channels_url: session.channels_url(),
        kernel_id: session.kernel_id,
        kernel_name: session.kernel_name,
        session_id: session.session_id,
        container_reused: container.as_ref().is_some_and(|c| c.source == ContainerSource::Reused),
        container: container.map(|c| c.base_url),
    })
}
