use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod config;
mod db;
mod error;
mod models;
mod report;
mod window;

use crate::config::{Overrides, PercentSummary, Settings};
use crate::db::ProductivityQuery;
use crate::models::ReportingWindow;

#[derive(Parser)]
#[command(name = "productivity-report")]
#[command(
    about = "Monthly provider productivity workbook from the clinical scheduling database",
    long_about = None
)]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to ./productivity.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Compute the window as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    /// SQL Server host, `HOST,PORT` or `HOST\INSTANCE`
    #[arg(long, env = "PRODUCTIVITY_SERVER", global = true)]
    server: Option<String>,

    #[arg(long, env = "PRODUCTIVITY_DATABASE", global = true)]
    database: Option<String>,

    /// Output workbook path
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    percent_summary: Option<PercentSummary>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the database and write the workbook (default)
    Report,
    /// Print the reporting window
    Window,
    /// Print the query and its bound parameters without connecting
    Sql,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let window = cli
        .as_of
        .map(ReportingWindow::for_date)
        .unwrap_or_else(ReportingWindow::current);

    match cli.command {
        Some(Commands::Window) => {
            println!("{} - {}", window.begin_mdy(), window.end_mdy());
            if window.is_empty() {
                println!("Window is empty: the latest Friday precedes the first of the month.");
            }
        }
        Some(Commands::Sql) => {
            let settings = load_settings(&cli)?;
            settings.validate_query()?;
            let query = ProductivityQuery::build(&window, &settings.query);
            println!("{}", query.sql.trim());
            for (index, value) in query.params.iter().enumerate() {
                println!("-- @P{} = '{}'", index + 1, value);
            }
        }
        Some(Commands::Report) | None => {
            let settings = load_settings(&cli)?;
            run_report(&settings, window).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(Overrides {
        server: cli.server.clone(),
        database: cli.database.clone(),
        output: cli.out.clone(),
        percent_summary: cli.percent_summary,
    });
    Ok(settings)
}

async fn run_report(settings: &Settings, window: ReportingWindow) -> anyhow::Result<()> {
    settings.validate_query()?;
    let (server, database) = settings.connection_target()?;

    info!(begin = %window.begin, end = %window.end, "reporting window");
    if window.is_empty() {
        warn!("latest Friday precedes the first of the month; the report will have no rows");
    }

    let query = ProductivityQuery::build(&window, &settings.query);
    let client = db::connect(&settings.database, server, database)
        .await
        .context("could not open database connection")?;
    let visits = db::fetch_productivity(client, &query)
        .await
        .context("could not retrieve productivity data")?;

    let details = aggregate::prepare_details(visits)?;
    let summaries = aggregate::summarize_by_location(&details, settings.report.percent_summary);
    info!(
        providers = details.len(),
        locations = summaries.len(),
        "aggregated productivity"
    );

    let cells = report::plan_sheet(&settings.report.title, &window, &details, &summaries);
    report::write_workbook(&settings.report.output, &cells)?;
    println!("Report written to {}.", settings.report.output.display());

    Ok(())
}
