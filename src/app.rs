use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::Instant;
use tracing::Level;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::output::{self, OutputFormat, LOAD_ERROR_MESSAGE};
use crate::query::{FilterState, DEFAULT_QUERY_LIMIT};
use crate::runner::{Catalog, Options, PageSnapshot, DEFAULT_BASE_URL};
use crate::sorter::SortKey;

#[derive(Clone, Debug)]
struct RunConfig {
    options: Options,
    filters: FilterState,
    page: usize,
    all_pages: bool,
    output_format: OutputFormat,
    no_color: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn loading_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Loading books...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let output_format_raw = args
        .output_format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw)
        .ok_or_else(|| format!("invalid output_format '{output_format_raw}'"))?;

    let sort = match args.sort.or(cfg.sort) {
        Some(raw) => raw
            .parse::<SortKey>()
            .map_err(|e| format!("invalid sort '{raw}': {e}"))?,
        None => SortKey::default(),
    };

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(10);
    let limit = match args.limit.or(cfg.limit).unwrap_or(DEFAULT_QUERY_LIMIT) {
        0 => None,
        n => Some(n),
    };
    let rate = args.rate.or(cfg.rate).unwrap_or(0);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());

    let grades = if args.grades.is_empty() {
        cfg.grades.unwrap_or_default()
    } else {
        args.grades
    };
    let literature_type = args
        .literature_type
        .or(cfg.literature_type)
        .unwrap_or_default();
    let lexile_min = args
        .lexile_min
        .or_else(|| cfg.lexile_min.map(|v| v.to_string()))
        .unwrap_or_default();
    let lexile_max = args
        .lexile_max
        .or_else(|| cfg.lexile_max.map(|v| v.to_string()))
        .unwrap_or_default();
    let filters = FilterState::from_raw(&grades, &literature_type, &lexile_min, &lexile_max)?;
    if let (Some(min), Some(max)) = (filters.lexile_min, filters.lexile_max) {
        if min > max {
            return Err(format!(
                "invalid lexile range, minimum {min} is above maximum {max}"
            ));
        }
    }

    Ok(RunConfig {
        options: Options {
            base_url,
            timeout_seconds,
            proxy,
            limit,
            rate,
            sort,
        },
        filters,
        page: args.page.unwrap_or(1),
        all_pages: args.all_pages,
        output_format,
        no_color,
    })
}

fn latest_frame(frame: &Mutex<Option<PageSnapshot>>) -> Option<PageSnapshot> {
    frame
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn print_frame(frame: &Mutex<Option<PageSnapshot>>, format: OutputFormat) -> Result<(), String> {
    let Some(page) = latest_frame(frame) else {
        return Ok(());
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output::render(&page, format))
        .map_err(|e| format!("failed to write output: {e}"))?;
    stdout
        .flush()
        .map_err(|e| format!("failed to write output: {e}"))
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    // The render callback keeps the most recent page; the terminal shows it
    // after each action.
    let frame: Arc<Mutex<Option<PageSnapshot>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&frame);
    let catalog = Catalog::new(run.options.clone(), move |view| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.to_snapshot());
    })
    .map_err(|e| format!("failed to set up catalog: {e}"))?;

    let spinner = (run.output_format == OutputFormat::Text).then(loading_spinner);
    let now = Instant::now();
    let loaded = catalog.load(run.filters.clone()).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    if let Err(e) = loaded {
        if e.is_network() {
            return Err(format!("{LOAD_ERROR_MESSAGE} ({e})"));
        }
        return Err(e.to_string());
    }

    if run.all_pages {
        print_frame(&frame, run.output_format)?;
        let total = catalog.snapshot().total_pages;
        for page in 2..=total {
            catalog.go_to_page(page);
            if run.output_format == OutputFormat::Text {
                println!("{}", "-".repeat(40).dimmed());
            }
            print_frame(&frame, run.output_format)?;
        }
    } else {
        if run.page > 1 && !catalog.go_to_page(run.page) {
            let total = catalog.snapshot().total_pages;
            eprintln!(
                "{} page {} is out of range (1-{}), showing page 1",
                "::".bold().yellow(),
                run.page,
                total.max(1)
            );
        }
        print_frame(&frame, run.output_format)?;
    }

    if run.output_format == OutputFormat::Text {
        eprintln!();
        eprintln!(
            ":: Completed :: loaded in {}ms ::",
            now.elapsed().as_millis()
        );
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_logging(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));

    if args.init_config {
        let path = user_config_path
            .or_else(config::default_config_path)
            .ok_or_else(|| "could not determine a config path, use --config".to_string())?;
        if config::ensure_default_config_file(&path)? {
            println!(":: wrote default config to {}", path.display());
        } else {
            println!(":: config already exists at {}", path.display());
        }
        return Ok(());
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
