use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use shelfscan_core::data::{Database, PriceBand, ProductListing, ProductQuery, StoreCounts};
use shelfscan_core::harvest::{
    HarvestEvent, HarvestOptions, HarvestProgressCallback, execute_harvest,
};
use shelfscan_core::report::{
    HarvestSummary, ReportFormat, generate_json_summary, generate_text_summary, save_report,
};
use shelfscan_scanner::{CatalogClient, ClientConfig};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::DEFAULT_DB_PATH;

/// Structured logs go to stderr so stdout stays free for progress and reports.
/// `RUST_LOG` takes precedence over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_directives = if verbose {
        "warn,shelfscan=debug,shelfscan_core=debug,shelfscan_scanner=debug"
    } else {
        "warn,shelfscan=info,shelfscan_core=info,shelfscan_scanner=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

// Argument helpers

/// Expand `~` and environment variables in a user-supplied database path
pub fn expand_db_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

pub fn db_path_from_args(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_PATH);
    expand_db_path(raw)
}

/// Build the storefront client settings from harvest flags. Anything not
/// given keeps its built-in default.
pub fn client_config_from_args(args: &ArgMatches) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(base_url) = args.get_one::<String>("base-url") {
        config.base_url = base_url.clone();
    }
    if let Some(api_url) = args.get_one::<String>("api-url") {
        config.api_url = api_url.clone();
    }
    if let Some(city_id) = args.get_one::<String>("city-id") {
        config.city_id = city_id.clone();
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.timeout_secs = *timeout;
    }
    config.csrf_token = args.get_one::<String>("csrf-token").cloned();
    config.csrf_cookie = args.get_one::<String>("csrf-cookie").cloned();
    config
}

pub fn harvest_options_from_args(args: &ArgMatches) -> HarvestOptions {
    let mut options = HarvestOptions::default();
    if let Some(level) = args.get_one::<u8>("max-menu-level") {
        options.max_menu_level = *level;
    }
    options
}

pub fn product_query_from_args(args: &ArgMatches) -> ProductQuery {
    let mut query = ProductQuery::default();
    query.category = args
        .get_one::<String>("category")
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(band) = args
        .get_one::<String>("price")
        .and_then(|p| PriceBand::from_str(p))
    {
        query.price = band;
    }
    if let Some(limit) = args.get_one::<u32>("limit") {
        query.limit = *limit as usize;
    }
    query
}

// Database helpers

/// What `prepare_database` found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Recreated,
    AlreadyPresent,
}

/// Create the database file and its tables. With `force`, an existing file is
/// deleted first; without it, the existing file is kept and its schema checked.
pub fn prepare_database(path: &Path, force: bool) -> Result<InitOutcome> {
    let existed = Database::exists(path);
    if existed && force {
        Database::drop(path)
            .with_context(|| format!("Failed to delete existing database {}", path.display()))?;
    }

    open_database(path)?;

    Ok(match (existed, force) {
        (false, _) => InitOutcome::Created,
        (true, true) => InitOutcome::Recreated,
        (true, false) => InitOutcome::AlreadyPresent,
    })
}

/// Open the database, creating the file, its directory and the tables when missing
pub fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Database::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Open a database that a previous `init` or `harvest` must have created
pub fn open_existing_database(path: &Path) -> Result<Database> {
    if !Database::exists(path) {
        bail!(
            "No database at {}. Run `shelfscan init` or `shelfscan harvest` first",
            path.display()
        );
    }
    open_database(path)
}

// Output helpers

pub fn render_summary(summary: &HarvestSummary, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_summary(summary)),
        ReportFormat::Json => {
            generate_json_summary(summary).context("Failed to serialise harvest summary")
        }
    }
}

/// One product of the browse query, as a block of plain lines
pub fn format_listing(listing: &ProductListing) -> String {
    let mut out = format!(
        "{} [{}]\n  Price: {:.2}\n  Category: {}\n",
        listing.title, listing.id, listing.price, listing.category_title
    );
    if let Some(ref url) = listing.product_url {
        out.push_str(&format!("  URL: {}\n", url));
    }
    if let Some(ref image) = listing.image_url {
        out.push_str(&format!("  Image: {}\n", image));
    }
    out
}

pub fn format_counts(counts: &StoreCounts) -> String {
    format!(
        "  Categories: {}\n  Products: {}\n  Product-category links: {}\n",
        counts.categories, counts.products, counts.relations
    )
}

/// Progress line for a harvest event
pub fn format_event(event: &HarvestEvent) -> String {
    match event {
        HarvestEvent::CategoryStarted { is_leaf: true, .. } => {
            format!("{} {}", "→".blue(), event)
        }
        HarvestEvent::CategoryStarted { .. } => format!("{} {}", "·".dimmed(), event),
        HarvestEvent::CategoryHarvested { .. } => {
            format!("  {} {}", "✓".green().bold(), event)
        }
        HarvestEvent::CategorySkipped { .. } | HarvestEvent::ProductSkipped { .. } => {
            format!("  {} {}", "⚠".yellow(), event.to_string().yellow())
        }
        HarvestEvent::ProductAlreadyPresent { .. } => {
            format!("  {} {}", "•".dimmed(), event.to_string().dimmed())
        }
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Progress callback that prints each event above the spinner. A hidden
/// spinner (stdout is not a terminal) drops `println`, so the line goes to
/// `out` directly instead.
pub fn spinner_callback<W>(spinner: ProgressBar, out: W) -> HarvestProgressCallback
where
    W: Write + Send + 'static,
{
    let out = Mutex::new(out);
    Arc::new(move |event: HarvestEvent| {
        if let HarvestEvent::CategoryStarted { ref title, .. } = event {
            spinner.set_message(title.clone());
        }
        let line = format_event(&event);
        if spinner.is_hidden() {
            if let Ok(mut out) = out.lock() {
                writeln!(out, "{}", line).ok();
            }
        } else {
            spinner.println(line);
        }
    })
}

// Command handlers

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let db_path = match args.get_one::<String>("PATH") {
        Some(path) => expand_db_path(path),
        None => db_path_from_args(args),
    };
    let force = args.get_flag("force");

    print_divider();
    println!("{}", "  SHELFSCAN INITIALIZATION".bright_white().bold());
    print_divider();
    println!();
    println!(
        "{} Target: {}",
        "→".blue(),
        db_path.display().to_string().bright_white()
    );

    match prepare_database(&db_path, force)? {
        InitOutcome::Created => {
            println!("{} Database created", "✓".green().bold());
        }
        InitOutcome::Recreated => {
            println!(
                "{} Existing database deleted and recreated (force mode)",
                "✓".green().bold()
            );
        }
        InitOutcome::AlreadyPresent => {
            println!(
                "{} Database already exists; tables checked, rows kept. Use --force to start over.",
                "ℹ".blue()
            );
        }
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    Ok(())
}

pub async fn handle_harvest(args: &ArgMatches, quiet: bool) -> Result<()> {
    let db_path = db_path_from_args(args);
    let config = client_config_from_args(args);
    let options = harvest_options_from_args(args);
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = args.get_one::<PathBuf>("output");

    let db = open_database(&db_path)?;
    if args.get_flag("reset") {
        db.clear().context("Failed to clear the database")?;
        info!("Cleared existing rows from {}", db_path.display());
    }

    let client = CatalogClient::new(config).context("Invalid storefront configuration")?;

    if !quiet {
        println!(
            "\n{} Harvesting {}",
            "→".blue(),
            client.config().base_url.bright_white()
        );
        println!("Database: {}", db_path.display());
        println!("Menu depth: {}\n", options.max_menu_level);
    }

    let spinner = (!quiet).then(progress_spinner);
    let progress = spinner
        .clone()
        .map(|spinner| spinner_callback(spinner, io::stdout()));
    let result = execute_harvest(&client, &db, &options, progress).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let summary = result.context("Harvest failed")?;

    if !quiet {
        println!("\n{} Harvest complete!\n", "✓".green().bold());
    }

    let report = render_summary(&summary, format)?;
    match output {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            println!(
                "{} Summary saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}

pub fn handle_products(args: &ArgMatches) -> Result<()> {
    let db = open_existing_database(&db_path_from_args(args))?;
    let query = product_query_from_args(args);
    let listings = db
        .search_products(&query)
        .context("Failed to query products")?;

    if args.get_flag("json") {
        let json = serde_json::to_string_pretty(&listings).context("Failed to serialise products")?;
        println!("{}", json);
        return Ok(());
    }

    if listings.is_empty() {
        println!("{} No products match", "ℹ".blue());
        return Ok(());
    }
    for listing in &listings {
        print!("{}", format_listing(listing));
    }
    Ok(())
}

pub fn handle_stats(args: &ArgMatches) -> Result<()> {
    let db_path = db_path_from_args(args);
    let db = open_existing_database(&db_path)?;
    let counts = db.counts().context("Failed to count rows")?;

    println!("{} {}", "#".bright_blue(), db_path.display().to_string().bright_white());
    print!("{}", format_counts(&counts));
    Ok(())
}
