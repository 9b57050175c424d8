use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use bookdash::app::{AggregateOptions, App};
use bookdash::catalog::OpenLibraryHttpClient;
use bookdash::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use bookdash::domain::{PageSize, RowField, SortDirection};
use bookdash::error::DashError;
use bookdash::export::{self, EXPORT_MIME, Quoting};
use bookdash::output::{ExportReport, JsonOutput, OutputMode, RowsReport, StderrProgress};
use bookdash::store::ViewStore;
use bookdash::tui::Tui;

#[derive(Parser)]
#[command(name = "bookdash")]
#[command(about = "Open Library book and author dashboard with sorting, search, editing and CSV export")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    subject: Option<String>,

    #[arg(long, global = true)]
    limit: Option<usize>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Aggregate once and print one page of rows as JSON")]
    Rows(RowsArgs),
    #[command(about = "Aggregate once and write every row to books.csv")]
    Export(ExportArgs),
}

#[derive(Args)]
struct RowsArgs {
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum, default_value_t = RowField::Title)]
    sort: RowField,

    #[arg(long)]
    desc: bool,

    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    out: Option<Utf8PathBuf>,

    #[arg(long, value_enum)]
    quoting: Option<Quoting>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DashError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DashError) -> u8 {
    match error {
        DashError::ConfigRead(_)
        | DashError::ConfigParse(_)
        | DashError::InvalidConfig(_)
        | DashError::InvalidPageSize(_) => 2,
        DashError::CatalogHttp(_)
        | DashError::CatalogStatus { .. }
        | DashError::CatalogPayload(_)
        | DashError::WorksListUnavailable { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    let export_overrides = match &cli.command {
        Some(Commands::Export(args)) => (args.out.clone(), args.quoting),
        _ => (None, None),
    };
    config.apply(ConfigOverrides {
        subject: cli.subject,
        limit: cli.limit,
        export_directory: export_overrides.0,
        quoting: export_overrides.1,
    })?;
    tracing::debug!(
        schema_version = config.schema_version,
        subject = %config.subject,
        limit = config.limit,
        "configuration resolved"
    );

    let catalog = OpenLibraryHttpClient::new(&config.base_url, config.timeout)?;
    let app = App::new(catalog, AggregateOptions::from(&config));

    match cli.command {
        Some(Commands::Rows(args)) => run_rows(args, &app, &config, output_mode),
        Some(Commands::Export(_)) => run_export(&app, &config, output_mode),
        None => {
            if matches!(output_mode, OutputMode::NonInteractive) {
                return Err(miette::Report::msg(
                    "the dashboard is interactive (try `bookdash rows --help`)",
                ));
            }
            let mut tui = Tui::new(&config);
            tui.run(Arc::new(app))
        }
    }
}

fn run_rows(
    args: RowsArgs,
    app: &App<OpenLibraryHttpClient>,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let page_size = match args.page_size {
        Some(value) => PageSize::try_from(value)?,
        None => config.rows_per_page,
    };

    let result = aggregate(app, output_mode)?;
    let mut store = ViewStore::new(page_size, config.collation);
    let subject = result.subject;
    let fetched_at = result.fetched_at;
    let failures = result.failures;
    store.replace_rows(result.rows);
    if let Some(search) = args.search {
        store.set_search_text(search);
    }
    let direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    store.request_sort(args.sort);
    if store.query().sort_direction != direction {
        store.request_sort(args.sort);
    }
    store.goto_page(args.page.saturating_sub(1));

    let report = RowsReport {
        subject,
        fetched_at,
        sort_key: store.query().sort_key,
        sort_direction: store.query().sort_direction,
        search_text: store.query().search_text.clone(),
        page: store.pagination().page_index + 1,
        page_count: store.page_count(),
        page_size,
        total_rows: store.rows().len(),
        visible_rows: store.visible_rows().len(),
        rows: store
            .page_rows()
            .into_iter()
            .map(|(_, row)| row.clone())
            .collect(),
        failures,
    };
    JsonOutput::print_rows(&report).into_diagnostic()?;
    Ok(())
}

fn run_export(
    app: &App<OpenLibraryHttpClient>,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let result = aggregate(app, output_mode)?;
    let path = export::write_csv(&result.rows, &config.export_directory, &config.export)?;
    let report = ExportReport {
        subject: result.subject,
        path: path.to_string(),
        mime: EXPORT_MIME,
        rows: result.rows.len(),
        failures: result.failures.len(),
    };
    JsonOutput::print_export(&report).into_diagnostic()?;
    Ok(())
}

fn aggregate(
    app: &App<OpenLibraryHttpClient>,
    output_mode: OutputMode,
) -> Result<bookdash::app::AggregateResult, DashError> {
    match output_mode {
        OutputMode::Interactive => app.aggregate(&StderrProgress),
        OutputMode::NonInteractive => app.aggregate(&JsonOutput),
    }
}
