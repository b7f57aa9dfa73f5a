//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::cache_adapter::CachedDataPort;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_chart_adapter::HtmlChartAdapter;
use crate::adapters::json_chart_adapter::JsonChartAdapter;
use crate::domain::cleaner::InvalidRecordPolicy;
use crate::domain::config_validation::{
    build_cache_settings, build_chart_options, build_fetch_policy, data_source, validate_config,
    DataSource,
};
use crate::domain::error::ChartError;
use crate::domain::fetcher::{DataFetcher, SharedDataPort};
use crate::domain::indicator::{parse_windows, WindowMode};
use crate::domain::pipeline::{build_chart, prepare, ChartOptions, ChartRequest};
use crate::ports::config_port::ConfigPort;
use crate::ports::render_port::RenderPort;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser, Debug)]
#[command(
    name = "pricechart",
    version,
    about = "Daily price charts with moving averages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected html or json)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Where the data comes from and which series to build.
#[derive(Args, Debug, Clone)]
pub struct SeriesArgs {
    /// Ticker symbol
    #[arg(long, default_value = "AAPL")]
    pub symbol: String,
    /// First session to include (YYYY-MM-DD)
    #[arg(long, default_value = "2020-01-01")]
    pub start: NaiveDate,
    /// Last session to include (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory of {SYMBOL}.csv files; overrides [data] dir
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Moving-average windows, e.g. "50,200"
    #[arg(long)]
    pub ma: Option<String>,
    /// strict or partial
    #[arg(long)]
    pub mode: Option<WindowMode>,
    /// Warn about invalid rows instead of failing the request
    #[arg(long)]
    pub allow_invalid: bool,
    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,
}

impl SeriesArgs {
    /// Arguments for `symbol` over `[start, end]` with every other setting
    /// left to the config file.
    pub fn new(symbol: &str, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
            config: None,
            data_dir: None,
            ma: None,
            mode: None,
            allow_invalid: false,
            no_cache: false,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a price chart with moving averages and volume
    Chart {
        #[command(flatten)]
        series: SeriesArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// html or json; overrides [chart] format
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Print the computed moving averages as CSV
    Indicators {
        #[command(flatten)]
        series: SeriesArgs,
    },
    /// List symbols available from the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Validate a configuration file and print the effective options
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Chart {
            series,
            output,
            format,
        } => run_chart(&series, output.as_deref(), format),
        Command::Indicators { series } => run_indicators(&series, io::stdout().lock()),
        Command::ListSymbols { config, data_dir } => {
            run_list_symbols(config.as_deref(), data_dir.as_deref())
        }
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads the config file, or an empty configuration when none is given so
/// every key falls back to its default.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, ChartError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            FileConfigAdapter::from_file(path)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `[logging] level`.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &dyn ConfigPort) {
    let level = config
        .get_string("logging", "level")
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Builds the configured market-data port, wrapped in the response cache
/// unless disabled by config or `use_cache`.
pub fn build_data_port(
    config: &dyn ConfigPort,
    data_dir: Option<&Path>,
    use_cache: bool,
) -> Result<SharedDataPort, ChartError> {
    let port: SharedDataPort = match data_source(config)? {
        DataSource::Csv => {
            let dir = data_dir
                .map(Path::to_path_buf)
                .or_else(|| config.get_string("data", "dir").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
            Arc::new(CsvAdapter::new(dir))
        }
        DataSource::Sqlite => open_sqlite(config)?,
    };

    let cache = build_cache_settings(config)?;
    if use_cache && cache.enabled {
        Ok(Arc::new(CachedDataPort::new(port, cache.ttl)))
    } else {
        Ok(port)
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<SharedDataPort, ChartError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<SharedDataPort, ChartError> {
    Err(ChartError::config_invalid(
        "data",
        "source",
        "sqlite support is not compiled in (enable the sqlite feature)",
    ))
}

/// Config-file options with command-line overrides applied.
pub fn resolve_options(
    config: &dyn ConfigPort,
    args: &SeriesArgs,
) -> Result<ChartOptions, ChartError> {
    let mut options = build_chart_options(config)?;
    if let Some(ma) = &args.ma {
        options.windows = parse_windows(ma)?;
    }
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if args.allow_invalid {
        options.record_policy = InvalidRecordPolicy::Warn;
    }
    Ok(options)
}

pub fn resolve_format(
    config: &dyn ConfigPort,
    flag: Option<OutputFormat>,
) -> Result<OutputFormat, ChartError> {
    if let Some(format) = flag {
        return Ok(format);
    }
    match config.get_string("chart", "format") {
        Some(text) => text
            .parse()
            .map_err(|reason: String| ChartError::config_invalid("chart", "format", reason)),
        None => Ok(OutputFormat::default()),
    }
}

fn renderer(format: OutputFormat) -> Box<dyn RenderPort> {
    match format {
        OutputFormat::Html => Box::new(HtmlChartAdapter::new()),
        OutputFormat::Json => Box::new(JsonChartAdapter::new()),
    }
}

struct Session {
    fetcher: DataFetcher,
    request: ChartRequest,
    options: ChartOptions,
    config: FileConfigAdapter,
}

fn open_session(args: &SeriesArgs) -> Result<Session, ChartError> {
    let config = load_config(args.config.as_deref())?;
    init_logging(&config);
    validate_config(&config)?;

    let end = args
        .end
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let request = ChartRequest::new(&args.symbol, args.start, end)?;

    let options = resolve_options(&config, args)?;
    let policy = build_fetch_policy(&config)?;
    let port = build_data_port(&config, args.data_dir.as_deref(), !args.no_cache)?;

    Ok(Session {
        fetcher: DataFetcher::new(port, policy),
        request,
        options,
        config,
    })
}

/// Builds the chart and writes it; returns the path written.
pub fn execute_chart(
    args: &SeriesArgs,
    output: Option<&Path>,
    format: Option<OutputFormat>,
) -> Result<PathBuf, ChartError> {
    let session = open_session(args)?;
    let format = resolve_format(&session.config, format)?;
    let request = &session.request;

    eprintln!(
        "Building {} chart from {} to {}",
        request.symbol, request.start, request.end
    );
    let chart = build_chart(&session.fetcher, request, &session.options)?;

    let renderer = renderer(format);
    let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}_chart.{}",
            request.symbol.to_lowercase(),
            renderer.extension()
        ))
    });
    renderer.render(&chart, &path)?;
    Ok(path)
}

fn run_chart(
    args: &SeriesArgs,
    output: Option<&Path>,
    format: Option<OutputFormat>,
) -> Result<(), ChartError> {
    let path = execute_chart(args, output, format)?;
    eprintln!("Chart written to {}", path.display());
    Ok(())
}

/// Writes `date,close,<MA label>...` rows; undefined averages are blank.
pub fn run_indicators<W: Write>(args: &SeriesArgs, out: W) -> Result<(), ChartError> {
    let session = open_session(args)?;
    let prepared = prepare(&session.fetcher, &session.request, &session.options)?;

    let stdout_error = |e: &dyn fmt::Display| ChartError::Output {
        path: "<stdout>".to_string(),
        reason: e.to_string(),
    };

    let mut wtr = csv::Writer::from_writer(out);
    let mut header = vec!["date".to_string(), "close".to_string()];
    header.extend(prepared.indicators.iter().map(|ind| ind.label()));
    wtr.write_record(&header).map_err(|e| stdout_error(&e))?;

    for (i, record) in prepared.series.records().iter().enumerate() {
        let mut row = vec![record.date.to_string(), record.close.to_string()];
        row.extend(prepared.indicators.iter().map(|ind| {
            ind.values[i]
                .value
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&row).map_err(|e| stdout_error(&e))?;
    }
    wtr.flush().map_err(|e| stdout_error(&e))?;
    Ok(())
}

fn run_list_symbols(config: Option<&Path>, data_dir: Option<&Path>) -> Result<(), ChartError> {
    let config = load_config(config)?;
    init_logging(&config);
    let port = build_data_port(&config, data_dir, false)?;

    let symbols = port.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ChartError> {
    let config = load_config(Some(config_path))?;
    init_logging(&config);
    validate_config(&config)?;

    let source = data_source(&config)?;
    let options = build_chart_options(&config)?;
    let policy = build_fetch_policy(&config)?;
    let cache = build_cache_settings(&config)?;
    let format = resolve_format(&config, None)?;

    println!("source          = {:?}", source);
    println!(
        "windows         = {}",
        options
            .windows
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",")
    );
    println!("mode            = {}", options.mode);
    println!("invalid_records = {}", options.record_policy);
    println!("format          = {}", format);
    println!("timeout         = {} s", policy.timeout.as_secs());
    println!("max_retries     = {}", policy.max_retries);
    if cache.enabled {
        println!("cache           = {} s TTL", cache.ttl.as_secs());
    } else {
        println!("cache           = disabled");
    }
    println!("background      = {}", options.layout.background_color);
    println!("legend          = {}", options.layout.legend_position);

    eprintln!("\nConfiguration is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ini: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(ini).unwrap()
    }

    #[test]
    fn cli_parses_chart_defaults() {
        let cli = Cli::try_parse_from(["pricechart", "chart"]).unwrap();
        match cli.command {
            Command::Chart {
                series,
                output,
                format,
            } => {
                assert_eq!(series.symbol, "AAPL");
                assert_eq!(series.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
                assert!(series.end.is_none());
                assert!(output.is_none());
                assert!(format.is_none());
            }
            other => panic!("expected chart, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "pricechart",
            "chart",
            "--symbol",
            "msft",
            "--start",
            "2023-01-01",
            "--end",
            "2023-06-30",
            "--ma",
            "20,50",
            "--mode",
            "partial",
            "--format",
            "json",
            "--allow-invalid",
        ])
        .unwrap();
        match cli.command {
            Command::Chart { series, format, .. } => {
                assert_eq!(series.symbol, "msft");
                assert_eq!(series.end, NaiveDate::from_ymd_opt(2023, 6, 30));
                assert_eq!(series.ma.as_deref(), Some("20,50"));
                assert_eq!(series.mode, Some(WindowMode::Partial));
                assert_eq!(format, Some(OutputFormat::Json));
                assert!(series.allow_invalid);
            }
            other => panic!("expected chart, got {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["pricechart", "chart", "--start", "2023-13-01"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cfg = config("[chart]\nwindows = 10\nmode = strict\n");
        let mut args = SeriesArgs::new("AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None);
        args.ma = Some("5, 15".into());
        args.mode = Some(WindowMode::Partial);
        args.allow_invalid = true;

        let options = resolve_options(&cfg, &args).unwrap();
        assert_eq!(options.windows, vec![5, 15]);
        assert_eq!(options.mode, WindowMode::Partial);
        assert_eq!(options.record_policy, InvalidRecordPolicy::Warn);
    }

    #[test]
    fn config_applies_without_flags() {
        let cfg = config("[chart]\nwindows = 10\nmode = partial\n");
        let args = SeriesArgs::new("AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None);
        let options = resolve_options(&cfg, &args).unwrap();
        assert_eq!(options.windows, vec![10]);
        assert_eq!(options.mode, WindowMode::Partial);
    }

    #[test]
    fn format_resolution() {
        assert_eq!(resolve_format(&config(""), None).unwrap(), OutputFormat::Html);
        assert_eq!(
            resolve_format(&config("[chart]\nformat = json\n"), None).unwrap(),
            OutputFormat::Json
        );
        assert_eq!(
            resolve_format(&config("[chart]\nformat = json\n"), Some(OutputFormat::Html)).unwrap(),
            OutputFormat::Html
        );
        assert!(resolve_format(&config("[chart]\nformat = png\n"), None).is_err());
    }

    #[test]
    fn cache_wraps_port_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("AAA.csv");
        let header = "date,open,high,low,close,volume\n";
        let day1 = "2024-01-02,1,2,0.5,1.5,10\n";
        let day2 = "2024-01-03,1,2,0.5,1.5,10\n";
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        // Rows appended after the first fetch are only seen without a cache.
        let rows_after_append = |ini: &str, use_cache: bool| {
            std::fs::write(&file, format!("{header}{day1}")).unwrap();
            let port = build_data_port(&config(ini), Some(dir.path()), use_cache).unwrap();
            assert_eq!(port.fetch_ohlcv("AAA", start, end).unwrap().len(), 1);
            std::fs::write(&file, format!("{header}{day1}{day2}")).unwrap();
            port.fetch_ohlcv("AAA", start, end).unwrap().len()
        };

        assert_eq!(rows_after_append("[cache]\nenabled = true\n", true), 1);
        assert_eq!(rows_after_append("[cache]\nenabled = false\n", true), 2);
        assert_eq!(rows_after_append("[cache]\nenabled = true\n", false), 2);
    }
}
