// nbdash CLI - notebook dashboards from the command line

mod exit_codes;
mod view;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use nbdash_config::Settings;
use nbdash_engine::compat;
use nbdash_engine::layout::{DashboardLayout, LayoutOptions};
use nbdash_engine::metadata::{self, DashboardView, GridSettings};
use nbdash_engine::{ActionState, DashboardController, Notebook, NullHost};
use nbdash_viewer::{ConvertOptions, PageParams};
use serde::Serialize;

use exit_codes::{
    EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE,
    EXIT_NOTEBOOK_IO, EXIT_NOTEBOOK_PARSE, EXIT_MIGRATION_NEEDED,
    EXIT_SETTINGS_WRITE,
};

#[derive(Parser)]
#[command(name = "nbdash")]
#[command(about = "Notebook dashboards: migrate, lay out, convert and view")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: ~/.config/nbdash/settings.json)
    #[arg(long, global = true, env = "NBDASH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite legacy dashboard metadata into the current schema
    #[command(after_help = "\
Examples:
  nbdash migrate sales.ipynb
  nbdash migrate sales.ipynb -o sales-migrated.ipynb
  nbdash migrate sales.ipynb --check")]
    Migrate {
        /// Notebook file
        notebook: PathBuf,

        /// Write the result here instead of in place (- for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Only report whether migration is needed (exit 5 if it is)
        #[arg(long)]
        check: bool,

        /// Print the migration report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the dashboard layout of a notebook as JSON
    #[command(after_help = "\
Examples:
  nbdash layout sales.ipynb
  nbdash layout sales.ipynb --view report
  nbdash layout sales.ipynb --stacked --write")]
    Layout {
        /// Notebook file
        notebook: PathBuf,

        /// View to lay out (default: the notebook's active view)
        #[arg(long, value_enum)]
        view: Option<ViewArg>,

        /// Show every cell stacked at full width (grid only)
        #[arg(long)]
        stacked: bool,

        /// Column count for notebooks without grid settings
        #[arg(long)]
        max_columns: Option<u32>,

        /// Save the computed layout back into the notebook
        #[arg(long)]
        write: bool,
    },

    /// Bake a notebook into standalone viewer page parameters
    #[command(after_help = "\
Examples:
  nbdash convert sales.ipynb -o sales.page.json
  nbdash convert sales.ipynb --base-url https://tmpnb.example.org --tmpnb")]
    Convert {
        /// Notebook file
        notebook: PathBuf,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Notebook server, or provisioning server with --tmpnb
        #[arg(long)]
        base_url: Option<String>,

        /// Spawn containers from a tmpnb provisioning server
        #[arg(long)]
        tmpnb: bool,

        /// Kernel to start (default: the notebook's kernelspec)
        #[arg(long)]
        kernel: Option<String>,

        /// Path reported to the notebook server (default: file name)
        #[arg(long)]
        notebook_path: Option<String>,
    },

    /// Lay out converted page parameters and start a kernel for them
    #[command(after_help = "\
Examples:
  nbdash view sales.page.json --offline
  nbdash view sales.page.json --query '?row=2&col=1' --offline
  nbdash view sales.page.json --base-url http://localhost:8888")]
    View {
        /// Page parameters file (from `nbdash convert`)
        page: PathBuf,

        /// Page query string, e.g. '?row=2' or 'row=2&col=1'
        #[arg(long)]
        query: Option<String>,

        /// Notebook server, or provisioning server with --tmpnb
        #[arg(long)]
        base_url: Option<String>,

        /// Spawn containers from a tmpnb provisioning server
        #[arg(long)]
        tmpnb: bool,

        /// Container cache file (default: ~/.config/nbdash/container.json)
        #[arg(long, env = "NBDASH_CONTAINER_CACHE", value_name = "PATH")]
        cache: Option<PathBuf>,

        /// Lay out only; do not contact any server
        #[arg(long)]
        offline: bool,
    },

    /// Print effective settings
    Settings {
        /// Write a commented default settings file if none exists
        #[arg(long)]
        init: bool,

        /// Print the settings file path only
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Grid,
    Report,
}

impl From<ViewArg> for DashboardView {
    fn from(v: ViewArg) -> Self {
        match v {
            ViewArg::Grid => DashboardView::Grid,
            ViewArg::Report => DashboardView::Report,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  nbdash-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings_path = cli.config.clone().unwrap_or_else(Settings::config_path);

    let result = match cli.command {
        None => {
            eprintln!("Usage: nbdash <command> [options]");
            eprintln!("       nbdash --help for more information");
            Ok(())
        }
        Some(Commands::Migrate { notebook, output, check, json }) => {
            cmd_migrate(notebook, output, check, json)
        }
        Some(Commands::Layout { notebook, view, stacked, max_columns, write }) => {
            let settings = Settings::load_from(&settings_path);
            cmd_layout(&settings, notebook, view, stacked, max_columns, write)
        }
        Some(Commands::Convert { notebook, output, base_url, tmpnb, kernel, notebook_path }) => {
            let settings = Settings::load_from(&settings_path);
            cmd_convert(&settings, notebook, output, base_url, tmpnb, kernel, notebook_path)
        }
        Some(Commands::View { page, query, base_url, tmpnb, cache, offline }) => {
            let settings = Settings::load_from(&settings_path);
            view::cmd_view(&settings, view::ViewArgs { page, query, base_url, tmpnb, cache, offline })
        }
        Some(Commands::Settings { init, path }) => cmd_settings(&settings_path, init, path),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_NOTEBOOK_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_NOTEBOOK_PARSE, msg)
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// file helpers
// ============================================================================

pub(crate) fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| {
        let message = format!("cannot read {}: {}", path.display(), e);
        if e.kind() == io::ErrorKind::NotFound {
            CliError::args(message)
        } else {
            CliError::io(message)
        }
    })
}

fn read_notebook(path: &Path) -> Result<Notebook, CliError> {
    let text = read_text(path)?;
    Notebook::from_ipynb(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))
}

/// Write `text` to `path`, or stdout for `None` / `-`.
pub(crate) fn write_output(path: Option<&Path>, text: &str) -> Result<(), CliError> {
    match path {
        Some(p) if p != Path::new("-") => fs::write(p, text)
            .map_err(|e| CliError::io(format!("cannot write {}: {}", p.display(), e))),
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text).map_err(|e| CliError::io(e.to_string()))
        }
    }
}

fn save_notebook(nb: &Notebook, path: &Path) -> Result<(), CliError> {
    let text = nb.to_ipynb().map_err(|e| CliError::other(e.to_string()))?;
    write_output(Some(path), &text)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::other(e.to_string()))
}

// ============================================================================
// migrate
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrateOutput {
    migrated: bool,
    cells_migrated: usize,
    /// Cell indexes whose legacy values were replaced with defaults.
    defaults_substituted: Vec<usize>,
}

fn cmd_migrate(notebook: PathBuf, output: Option<PathBuf>, check: bool, json: bool) -> Result<(), CliError> {
    let mut nb = read_notebook(&notebook)?;

    if check {
        if compat::needs_migration(&nb) {
            return Err(CliError::new(
                EXIT_MIGRATION_NEEDED,
                format!("{} has legacy dashboard metadata", notebook.display()),
            ).with_hint(format!("run: nbdash migrate {}", notebook.display())));
        }
        if !json {
            eprintln!("{}: up to date", notebook.display());
        }
        return Ok(());
    }

    let report = compat::migrate(&mut nb);
    let target = output.unwrap_or_else(|| notebook.clone());
    let to_stdout = target == Path::new("-");
    if report.migrated || to_stdout {
        save_notebook(&nb, &target)?;
    }

    let summary = MigrateOutput {
        migrated: report.migrated,
        cells_migrated: report.cells_migrated,
        defaults_substituted: report
            .defaults_substituted
            .iter()
            .filter_map(|id| nb.position(*id))
            .collect(),
    };
    if json {
        let text = to_json(&summary)?;
        if to_stdout {
            eprintln!("{}", text);
        } else {
            write_output(None, &text)?;
        }
    } else if report.migrated {
        eprintln!(
            "{}: migrated {} cells ({} with defaults)",
            notebook.display(),
            summary.cells_migrated,
            summary.defaults_substituted.len()
        );
    } else {
        eprintln!("{}: nothing to migrate", notebook.display());
    }
    Ok(())
}

// ============================================================================
// layout
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GridCellOutput {
    index: usize,
    row: u32,
    col: u32,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportCellOutput {
    index: usize,
    order: Option<u32>,
}

#[derive(Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
enum LayoutOutput {
    #[serde(rename_all = "camelCase")]
    Grid { max_columns: u32, cells: Vec<GridCellOutput> },
    Report { cells: Vec<ReportCellOutput> },
}

fn cmd_layout(
    settings: &Settings,
    notebook: PathBuf,
    view: Option<ViewArg>,
    stacked: bool,
    max_columns: Option<u32>,
    write: bool,
) -> Result<(), CliError> {
    if max_columns == Some(0) {
        return Err(CliError::args("--max-columns must be at least 1"));
    }
    let nb = read_notebook(&notebook)?;
    let options = LayoutOptions {
        grid: GridSettings {
            max_columns: max_columns.unwrap_or(settings.max_columns),
            cell_margin: settings.cell_margin,
            default_cell_height: settings.cell_height,
        },
        debounce: settings.layout_debounce(),
        static_grid: false,
    };

    let mut host = NullHost;
    let mut ctl = DashboardController::with_options(nb, options);
    let target = view.map(|v| ActionState::from(DashboardView::from(v))).unwrap_or(ActionState::Preview);
    ctl.enter_dashboard_mode(&mut host, target);
    if stacked {
        if ctl.dashboard().map(|d| d.view()) != Some(DashboardView::Grid) {
            return Err(CliError::args("--stacked applies to the grid view only")
                .with_hint("add --view grid"));
        }
        ctl.show_all_stacked(&mut host).map_err(|e| CliError::other(e.to_string()))?;
    }

    let output = {
        let Some((dashboard, nb)) = ctl.dashboard_parts_mut() else {
            return Err(CliError::other("dashboard was not created"));
        };
        layout_output(dashboard, nb)?
    };
    write_output(None, &to_json(&output)?)?;

    if write {
        ctl.switch_to_notebook(&mut host);
        save_notebook(ctl.notebook(), &notebook)?;
    }
    Ok(())
}

fn layout_output(dashboard: &mut dyn DashboardLayout, nb: &Notebook) -> Result<LayoutOutput, CliError> {
    if let Some(grid) = dashboard.as_grid_mut() {
        let mut cells: Vec<GridCellOutput> = grid
            .placements()
            .into_iter()
            .filter_map(|(id, p)| {
                Some(GridCellOutput {
                    index: nb.position(id)?,
                    row: p.row,
                    col: p.col,
                    width: p.width,
                    height: p.height,
                })
            })
            .collect();
        cells.sort_by_key(|c| (c.row, c.col, c.index));
        return Ok(LayoutOutput::Grid { max_columns: grid.stack().columns(), cells });
    }
    if let Some(report) = dashboard.as_report_mut() {
        let cells = report
            .arrangement()
            .iter()
            .filter_map(|id| {
                Some(ReportCellOutput {
                    index: nb.position(*id)?,
                    order: metadata::report_record(nb, *id).and_then(|r| r.order),
                })
            })
            .collect();
        return Ok(LayoutOutput::Report { cells });
    }
    Err(CliError::other("unknown dashboard layout"))
}

// ============================================================================
// convert
// ============================================================================

fn cmd_convert(
    settings: &Settings,
    notebook: PathBuf,
    output: Option<PathBuf>,
    base_url: Option<String>,
    tmpnb: bool,
    kernel: Option<String>,
    notebook_path: Option<String>,
) -> Result<(), CliError> {
    let nb = read_notebook(&notebook)?;
    let notebook_path = notebook_path.unwrap_or_else(|| {
        notebook
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let opts = ConvertOptions {
        thebe_url: base_url.or_else(|| settings.thebe_url.clone()),
        tmpnb_mode: tmpnb || settings.tmpnb_mode,
        kernel_name: kernel,
        fallback_kernel_name: Some(settings.kernel_name.clone()),
        notebook_path,
    };
    let params = PageParams::convert(&nb, opts);
    let text = params.to_json().map_err(|e| CliError::other(e.to_string()))?;
    write_output(output.as_deref(), &text)?;
    if output.as_deref().is_some_and(|p| p != Path::new("-")) {
        eprintln!("{}: {} blocks", notebook.display(), params.blocks.len());
    }
    Ok(())
}

// ============================================================================
// settings
// ============================================================================

fn cmd_settings(path: &Path, init: bool, path_only: bool) -> Result<(), CliError> {
    if path_only {
        return write_output(None, &path.display().to_string());
    }
    if init {
        let written = Settings::write_default_file(path)
            .map_err(|e| CliError::new(EXIT_SETTINGS_WRITE, format!("cannot write {}: {}", path.display(), e)))?;
        if written {
            eprintln!("wrote {}", path.display());
        } else {
            eprintln!("{} already exists", path.display());
        }
        return Ok(());
    }
    let settings = Settings::load_from(path);
    write_output(None, &to_json(&settings)?)
}
