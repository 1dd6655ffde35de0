use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Parser;

mod aggregate;
mod config;
mod db;
mod github;
mod ingest;
mod models;
pub mod observability;
mod secrets;

#[cfg(test)]
mod tests;

use aggregate::MetricsFilter;
use config::HubConfig;
use db::{DateRange, DbPool};
use github::MetricsClient;

/// CLI arguments for the Trajan metrics hub
#[derive(Parser, Debug)]
#[command(version, about = "Trajan usage-metrics hub", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./trajan.toml if it exists,
    /// otherwise built-in defaults are used)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Fetch and store snapshots for every configured organization
    Import,
    /// Run the periodic auto-import loop until interrupted
    Watch,
    /// Print aggregated daily metrics for a date range
    Report {
        #[command(flatten)]
        query: QueryArgs,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the per-language rollup for a date range
    Langs {
        #[command(flatten)]
        query: QueryArgs,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the editor/model/language filter values observed in a range
    Filters {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print the per-date acceptance-rate series (overall and per-org)
    Rates {
        #[command(flatten)]
        query: QueryArgs,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List organizations present in the store
    Orgs,
    /// Write a consistent copy of the database (SQLite VACUUM INTO)
    Backup {
        /// Target file; must not exist
        #[arg(short, long)]
        output: String,
    },
    /// Replace the database file with a previous backup
    Restore {
        /// Backup file to restore from
        #[arg(short, long)]
        input: String,
        /// Overwrite an existing database file
        #[arg(long)]
        force: bool,
    },
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ./trajan.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Date-range and filter selection shared by the reporting commands.
#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Start date (inclusive); defaults to the earliest stored snapshot
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End date (inclusive); defaults to the latest stored snapshot
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Restrict to these organizations (repeatable); default is all
    #[arg(long = "org")]
    orgs: Vec<String>,

    /// Keep only these editors (repeatable); default is no restriction
    #[arg(long = "editor")]
    editors: Vec<String>,

    /// Keep only these models (repeatable); default is no restriction
    #[arg(long = "model")]
    models: Vec<String>,

    /// Keep only these languages (repeatable); default is no restriction
    #[arg(long = "language")]
    languages: Vec<String>,
}

impl QueryArgs {
    fn filter(&self) -> MetricsFilter {
        MetricsFilter::new(
            self.editors.iter().cloned(),
            self.models.iter().cloned(),
            self.languages.iter().cloned(),
        )
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = load_config(args.config.as_deref());
    observability::init_tracing(&config.observability);

    match args.command {
        Command::Import => run_import(&config).await,
        Command::Watch => run_watch(&config).await,
        Command::Report { query, json } => run_report(&config, &query, json).await,
        Command::Langs { query, json } => run_langs(&config, &query, json).await,
        Command::Filters { query } => run_filters(&config, &query).await,
        Command::Rates { query, json } => run_rates(&config, &query, json).await,
        Command::Orgs => run_orgs(&config).await,
        Command::Backup { output } => run_backup(&config, &output).await,
        Command::Restore { input, force } => run_restore(&config, &input, force),
        Command::Init { output, force } => run_init(output, force),
    }
}

/// Load configuration from an explicit path, from ./trajan.toml when
/// present, or fall back to built-in defaults.
fn load_config(path: Option<&str>) -> HubConfig {
    let result = match path {
        Some(path) => HubConfig::from_file(path),
        None if Path::new("trajan.toml").exists() => HubConfig::from_file("trajan.toml"),
        None => Ok(HubConfig::default()),
    };

    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn open_db(config: &HubConfig) -> DbPool {
    let db = match DbPool::from_config(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database '{}': {e}", config.database.path);
            std::process::exit(1);
        }
    };

    if config.database.run_migrations
        && let Err(e) = db.run_migrations().await
    {
        eprintln!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    if let Err(e) = db.health_check().await {
        eprintln!("Database health check failed: {e}");
        std::process::exit(1);
    }

    db
}

async fn run_import(config: &HubConfig) {
    let db = open_db(config).await;
    let secrets = secrets::from_config(&config.secrets);
    let client = MetricsClient::from_config(&config.github);
    let snapshots = db.snapshots();

    match ingest::run_import(&config.github, secrets.as_ref(), &client, snapshots.as_ref()).await {
        Ok(report) => {
            println!(
                "Imported {} snapshot(s), skipped {} already present",
                report.inserted, report.skipped
            );
            for failure in &report.failures {
                eprintln!("  {}: {}", failure.org, failure.error);
            }
            if let Ok(total) = snapshots.count().await {
                println!("Store now holds {total} snapshot(s)");
            }
            if !report.is_clean() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("Import failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_watch(config: &HubConfig) {
    if !config.scheduler.enabled {
        eprintln!("Error: scheduler is disabled; set scheduler.enabled = true in the config");
        std::process::exit(1);
    }

    let db = open_db(config).await;
    let secrets = secrets::from_config(&config.secrets);
    let client = MetricsClient::from_config(&config.github);

    tokio::select! {
        result = ingest::scheduler::run_scheduler_loop(config, secrets.as_ref(), &client, &db) => {
            if let Err(e) = result {
                eprintln!("Scheduler stopped: {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down scheduler");
        }
    }
}

/// Resolve the effective date range: explicit bounds win, otherwise the
/// stored min/max stand in.
async fn resolve_range(db: &DbPool, query: &QueryArgs) -> Option<DateRange> {
    let bounds = match db.snapshots().date_bounds().await {
        Ok(bounds) => bounds,
        Err(e) => {
            eprintln!("Failed to query date bounds: {e}");
            std::process::exit(1);
        }
    };

    match (query.from, query.to, bounds) {
        (Some(from), Some(to), _) => Some(DateRange::new(from, to)),
        (from, to, Some((min, max))) => {
            Some(DateRange::new(from.unwrap_or(min), to.unwrap_or(max)))
        }
        (_, _, None) => None,
    }
}

async fn load_records(db: &DbPool, query: &QueryArgs) -> Vec<models::SnapshotRecord> {
    let Some(range) = resolve_range(db, query).await else {
        println!("No snapshots stored yet; run `trajan import` first.");
        std::process::exit(0);
    };

    match db.snapshots().query_range(range, &query.orgs).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Failed to load snapshots: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_report(config: &HubConfig, query: &QueryArgs, json: bool) {
    let db = open_db(config).await;
    let records = load_records(&db, query).await;
    let filter = query.filter();

    let rows = aggregate::daily_rows(&records, &filter);
    if rows.is_empty() {
        println!("No data available for the selected filters.");
        return;
    }

    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let totals = aggregate::daily_totals(&rows);
    let averages = aggregate::weekday_user_averages(&totals);

    println!("{:<12} {:<20} {:>8} {:>8} {:>9} {:>10} {:>9} {:>7}",
        "date", "org", "active", "engaged", "inactive", "suggested", "accepted", "rate%");
    for row in &rows {
        println!(
            "{:<12} {:<20} {:>8} {:>8} {:>9} {:>10} {:>9} {:>7.1}",
            row.date.to_string(), row.org, row.active, row.engaged, row.inactive,
            row.suggested, row.accepted, row.acceptance_rate
        );
    }

    println!();
    println!(
        "Weekday averages: {:.2} active, {:.2} engaged, {:.2} inactive",
        averages.active, averages.engaged, averages.inactive
    );
    let suggested: i64 = rows.iter().map(|r| r.suggested).sum();
    let accepted: i64 = rows.iter().map(|r| r.accepted).sum();
    println!(
        "Totals: {suggested} suggested, {accepted} accepted ({:.2}% overall acceptance)",
        aggregate::overall_acceptance_rate(&rows)
    );
}

async fn run_langs(config: &HubConfig, query: &QueryArgs, json: bool) {
    let db = open_db(config).await;
    let records = load_records(&db, query).await;
    let filter = query.filter();

    let rollup = aggregate::language_rollup(&records, &filter);
    if rollup.is_empty() {
        println!("No code metrics available for the selected filters.");
        return;
    }

    if json {
        match serde_json::to_string_pretty(&rollup) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize rollup: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("{:<24} {:>10} {:>9} {:>7}", "language", "suggested", "accepted", "rate%");
    for stat in &rollup {
        println!(
            "{:<24} {:>10} {:>9} {:>7.1}",
            stat.language, stat.suggested, stat.accepted, stat.acceptance_rate
        );
    }
}

async fn run_filters(config: &HubConfig, query: &QueryArgs) {
    let db = open_db(config).await;
    let records = load_records(&db, query).await;

    // Vocabulary is filter-independent: it lists what could be selected
    let vocabulary = aggregate::filter_vocabulary(&records);
    println!("editors:   {}", vocabulary.editors.join(", "));
    println!("models:    {}", vocabulary.models.join(", "));
    println!("languages: {}", vocabulary.languages.join(", "));
}

async fn run_rates(config: &HubConfig, query: &QueryArgs, json: bool) {
    let db = open_db(config).await;
    let records = load_records(&db, query).await;
    let filter = query.filter();

    let rows = aggregate::daily_rows(&records, &filter);
    let series = aggregate::acceptance_rate_series(&rows);
    if series.is_empty() {
        println!("No data available for the selected filters.");
        return;
    }

    if json {
        match serde_json::to_string_pretty(&series) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize series: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("{:<12} {:<20} {:>7}", "date", "org", "rate%");
    for point in &series {
        println!(
            "{:<12} {:<20} {:>7.1}",
            point.date.to_string(),
            point.org.as_deref().unwrap_or("(overall)"),
            point.acceptance_rate
        );
    }
}

async fn run_orgs(config: &HubConfig) {
    let db = open_db(config).await;
    match db.snapshots().distinct_orgs().await {
        Ok(orgs) if orgs.is_empty() => println!("No organizations stored yet."),
        Ok(orgs) => {
            for org in orgs {
                println!("{org}");
            }
        }
        Err(e) => {
            eprintln!("Failed to list organizations: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_backup(config: &HubConfig, output: &str) {
    if Path::new(output).exists() {
        eprintln!("Backup target already exists: {output}");
        std::process::exit(1);
    }

    let db = open_db(config).await;
    match db.backup_to(output).await {
        Ok(()) => println!("Database backed up to {output}"),
        Err(e) => {
            eprintln!("Backup failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Restore never opens a pool: the database file is replaced wholesale,
/// along with any stale WAL sidecar files.
fn run_restore(config: &HubConfig, input: &str, force: bool) {
    let target = PathBuf::from(&config.database.path);

    if !Path::new(input).exists() {
        eprintln!("Backup file not found: {input}");
        std::process::exit(1);
    }
    if target.exists() && !force {
        eprintln!(
            "Database already exists: {}\nUse --force to overwrite.",
            target.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = std::fs::copy(input, &target) {
        eprintln!("Restore failed: {e}");
        std::process::exit(1);
    }
    for suffix in ["-wal", "-shm"] {
        let sidecar = PathBuf::from(format!("{}{suffix}", target.display()));
        if sidecar.exists() {
            let _ = std::fs::remove_file(sidecar);
        }
    }

    println!("Database restored from {input}");
}

fn run_init(output: Option<String>, force: bool) {
    let path = PathBuf::from(output.unwrap_or_else(|| "trajan.toml".to_string()));

    if path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            path.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&path, default_config_toml()) {
        eprintln!("Failed to write {}: {e}", path.display());
        std::process::exit(1);
    }

    println!("Created {}", path.display());
}

/// Default configuration for zero-config startup.
fn default_config_toml() -> &'static str {
    r#"# Trajan usage-metrics hub configuration

[database]
path = "trajan.db"

[github]
# Organizations to import Copilot metrics for
orgs = []
# Environment variable holding the bearer token
token_secret = "GHCP_TOKEN"

[scheduler]
# Enable `trajan watch` to import once per day
enabled = false
interval_hours = 24

[observability.logging]
level = "info"
format = "compact"
"#
}
