mod archive;
mod db;
mod dedup;
mod error;
mod fetch;
mod geocode;
mod parser;
mod pipeline;
mod record;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::archive::Wayback;
use crate::error::ScrapeError;
use crate::fetch::{HttpClient, PageFetcher};
use crate::geocode::{GeocodeProvider, GoogleGeocoder};
use crate::pipeline::Pipeline;
use crate::record::Field;
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "vic_convictions",
    about = "Victorian food safety convictions register scraper"
)]
struct Cli {
    /// SQLite database (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Skip Wayback Machine archival (same as DISABLE_WAYBACK_MACHINE=true)
    #[arg(long, global = true)]
    no_archive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape new convictions, geocode them and save (default)
    Run,
    /// Print the register index without saving anything
    Index,
    /// Geocode a single address
    Geocode {
        address: String,
    },
    /// Show stored record counts
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = run(cli);
    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let code = e
                .downcast_ref::<ScrapeError>()
                .map_or(1, ScrapeError::exit_code);
            if code != 1 {
                tracing::error!("Exiting!");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(path) = cli.database {
        settings.database_path = path;
    }
    if cli.no_archive {
        settings.disable_wayback_machine = true;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let conn = db::connect(&settings.database_path)?;
            let fetcher = PageFetcher::new(client(&settings)?, archive(&settings)?);
            let geocoder = geocoder(&settings)?;
            let stats = Pipeline::new(fetcher, geocoder, &conn, &settings.register_url).run()?;
            println!(
                "Existing: {} | Listed: {} | New: {} | Saved: {} ({} geocoded)",
                stats.existing, stats.listed, stats.new, stats.saved, stats.geocoded
            );
            Ok(())
        }
        Commands::Index => {
            let fetcher = PageFetcher::new(client(&settings)?, archive(&settings)?);
            let entries = parser::index::list_index(&fetcher, &settings.register_url)?;
            let stored = if settings.database_path.exists() {
                let conn = db::connect(&settings.database_path)?;
                db::existing_links(&conn)?
            } else {
                Default::default()
            };

            for (i, e) in entries.iter().enumerate() {
                let marker = if stored.contains(&e.link) { "stored" } else { "new" };
                let name = e
                    .summary
                    .get(&Field::TradingName)
                    .map(String::as_str)
                    .unwrap_or("-");
                println!("{:>3} | {:<6} | {:<32} | {}", i + 1, marker, name, e.link);
            }
            println!("\n{} records listed", entries.len());
            Ok(())
        }
        Commands::Geocode { address } => {
            let coords = geocoder(&settings)?
                .lookup(&address)
                .with_context(|| format!("Failed to geocode '{}'", address))?;
            println!("{},{}", coords.lat, coords.lng);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.database_path)?;
            let s = db::get_stats(&conn)?;
            println!("Records:   {}", s.total);
            println!("Geocoded:  {}", s.geocoded);
            println!("No coords: {}", s.without_location);
            Ok(())
        }
    }
}

/// Client for the register pages. The CA bundle and TLS version apply here
/// only.
fn client(settings: &Settings) -> Result<HttpClient> {
    let bundle = settings.ca_bundle();
    let http = HttpClient::new(bundle.map(PathBuf::as_path), &settings.ssl_version)
        .map_err(ScrapeError::from)
        .context("Failed to set up HTTP client")?;
    if let Some(path) = http.ca_bundle() {
        tracing::info!("Trusting extra roots from {} for the register", path.display());
    }
    Ok(http)
}

fn unpinned_client() -> Result<HttpClient> {
    HttpClient::unpinned()
        .map_err(ScrapeError::from)
        .context("Failed to set up HTTP client")
}

fn archive(settings: &Settings) -> Result<Option<Wayback>> {
    if !settings.archive_enabled() {
        return Ok(None);
    }
    Ok(Some(Wayback::new(&settings.archive_url, unpinned_client()?)))
}

fn geocoder(settings: &Settings) -> Result<GoogleGeocoder<HttpClient>> {
    Ok(GoogleGeocoder::new(
        unpinned_client()?,
        settings.api_key().map(str::to_string),
    ))
}
