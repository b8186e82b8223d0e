use pagedecay::analyzer::{self, PageSeries};
use pagedecay::cli::{Cli, Commands, ConfigAction, ThresholdArgs};
use pagedecay::config::{Config, ConfigValidator};
use pagedecay::error::{DecayError, Result};
use pagedecay::ingest;
use pagedecay::report::{self, DecaySummary, ReportFormat};
use pagedecay::storage::DecayStore;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            input,
            profile,
            limit,
            since_lookback,
            format,
            output,
            persist,
            overrides,
        } => {
            let opts = AnalyzeOptions {
                input,
                limit,
                since_lookback,
                format,
                output,
                persist,
            };
            cmd_analyze(cli.config, profile, &overrides, opts)?;
        }
        Commands::Import { file } => {
            cmd_import(cli.config, &file)?;
        }
        Commands::Show { page_id, overrides } => {
            cmd_show(cli.config, &page_id, &overrides)?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Recommend {
            input,
            profile,
            top,
        } => {
            cmd_recommend(cli.config, input, profile, top)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "pagedecay=debug"
    } else {
        "pagedecay=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct AnalyzeOptions {
    input: Option<PathBuf>,
    limit: Option<usize>,
    since_lookback: bool,
    format: String,
    output: Option<PathBuf>,
    persist: bool,
}

fn cmd_analyze(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    overrides: &ThresholdArgs,
    opts: AnalyzeOptions,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;
    overrides.apply(&mut config.thresholds);
    ConfigValidator::validate(&config)?;

    let format = ReportFormat::parse(&opts.format)
        .ok_or_else(|| DecayError::InvalidInput(format!("Unknown format: {}", opts.format)))?;

    let since = if opts.since_lookback {
        let since = ingest::lookback_start(config.thresholds.lookback_days);
        tracing::info!("Restricting snapshots to {} onward", since);
        Some(since)
    } else {
        None
    };

    let store = if opts.persist || opts.input.is_none() {
        Some(open_store(&config)?)
    } else {
        None
    };

    let pages = match (&opts.input, &store) {
        (Some(path), _) => {
            let mut pages = ingest::read_series_file(path)?;
            if let Some(since) = since {
                ingest::retain_since(&mut pages, since);
            }
            if let Some(store) = &store {
                store.import_series(&pages)?;
            }
            pages
        }
        (None, Some(store)) => {
            let limit = opts.limit.unwrap_or(config.analysis.max_pages);
            store.load_series(limit, since)?
        }
        (None, None) => Vec::new(),
    };

    let results = analyzer::analyze(&pages, &config.thresholds);
    let summary = DecaySummary::new(pages.len(), &results);
    let rendered = report::render(&results, &summary, format)?;
    write_output(opts.output.as_deref(), &rendered)?;

    if let Some(store) = &store {
        if opts.persist {
            let run = store.persist_run(&pages, &results)?;
            eprintln!(
                "✓ Run {} recorded: {} flagged, {} cleared",
                run.run_id, run.pages_decaying, run.pages_cleared
            );
        }
    }

    Ok(())
}

fn cmd_import(config_path: Option<PathBuf>, file: &Path) -> Result<()> {
    let config = load_config(config_path, None)?;
    let pages = ingest::read_series_file(file)?;
    let store = open_store(&config)?;
    let stats = store.import_series(&pages)?;

    println!(
        "✓ Imported {} pages ({} snapshots)",
        stats.pages, stats.snapshots
    );
    Ok(())
}

fn cmd_show(config_path: Option<PathBuf>, page_id: &str, overrides: &ThresholdArgs) -> Result<()> {
    let mut config = load_config(config_path, None)?;
    overrides.apply(&mut config.thresholds);
    ConfigValidator::validate(&config)?;

    let store = open_store(&config)?;
    let page = store.load_page(page_id)?;

    println!("{} ({} snapshots)", page.url, page.snapshots.len());
    match analyzer::evaluate_page(&page, &config.thresholds) {
        Some(result) => {
            let json = serde_json::to_string_pretty(&result).map_err(|e| DecayError::Json {
                source: e,
                context: "Failed to serialize decay result".to_string(),
            })?;
            println!("{}", json);
        }
        None => println!("Not decaying (or not enough history to evaluate)"),
    }

    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, None)?;
    let store = open_store(&config)?;
    let stats = store.stats()?;

    println!("pagedecay Status");
    println!("================");
    println!("\nStore: {}", store.base_path().display());
    println!(
        "Pages: {}  Snapshots: {}  Decaying: {}  Runs: {}",
        stats.page_count, stats.snapshot_count, stats.decaying_count, stats.run_count
    );

    let flagged = store.decaying_pages()?;
    if !flagged.is_empty() {
        println!("\nDecaying pages:");
        for state in flagged.iter().take(20) {
            let since = state
                .detected_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  [{}] {} (since {})", state.severity, state.url, since);
        }
    }

    let runs = store.recent_runs(5)?;
    if !runs.is_empty() {
        println!("\nRecent runs:");
        for run in runs {
            println!(
                "  {} - {} analyzed, {} decaying, {} cleared",
                run.ran_at.format("%Y-%m-%d %H:%M:%S"),
                run.pages_analyzed,
                run.pages_decaying,
                run.pages_cleared
            );
        }
    }

    Ok(())
}

fn cmd_recommend(
    config_path: Option<PathBuf>,
    input: Option<PathBuf>,
    profile: Option<String>,
    top: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path, profile)?;

    let pages: Vec<PageSeries> = match input {
        Some(path) => ingest::read_series_file(&path)?,
        None => open_store(&config)?.load_series(config.analysis.max_pages, None)?,
    };

    let results = analyzer::analyze(&pages, &config.thresholds);
    let top = top.unwrap_or(config.analysis.top_recommendations);
    let inputs = report::recommendation_inputs(&results, top);

    let json = serde_json::to_string_pretty(&inputs).map_err(|e| DecayError::Json {
        source: e,
        context: "Failed to serialize recommendation input".to_string(),
    })?;
    println!("{}", json);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DecayError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    Config::load_or_default(&path, profile.as_deref())
}

fn open_store(config: &Config) -> Result<DecayStore> {
    let data_dir = expand_path(&config.storage.data_dir)?;
    DecayStore::open(data_dir)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content).map_err(|e| DecayError::Io {
                source: e,
                context: format!("Failed to write report: {}", path.display()),
            })?;
            eprintln!("✓ Report written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DecayError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DecayError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
