use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db;
use crate::dedup::filter_new;
use crate::error::{FetchError, GeocodeError, ScrapeError};
use crate::fetch::Fetch;
use crate::geocode::{GeocodeProvider, Geocoder};
use crate::parser::{detail, index};
use crate::record::ConvictionRecord;

/// Counts from one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub existing: usize,
    pub listed: usize,
    pub new: usize,
    pub saved: usize,
    pub geocoded: usize,
}

/// Everything one run needs, owned for the duration of the run.
pub struct Pipeline<'c, F, P> {
    fetcher: F,
    geocoder: Geocoder<P>,
    conn: &'c Connection,
    register_url: String,
}

impl<'c, F: Fetch, P: GeocodeProvider> Pipeline<'c, F, P> {
    pub fn new(fetcher: F, provider: P, conn: &'c Connection, register_url: &str) -> Self {
        Pipeline {
            fetcher,
            geocoder: Geocoder::new(provider),
            conn,
            register_url: register_url.to_string(),
        }
    }

    /// Index, dedupe, scrape, geocode, save. Nothing is written unless every
    /// detail page scraped cleanly.
    pub fn run(&mut self) -> Result<RunStats, ScrapeError> {
        let persisted = db::existing_links(self.conn)?;
        info!(
            "There are {} existing records that have been scraped",
            persisted.len()
        );

        let entries = index::list_index(&self.fetcher, &self.register_url)?;
        let listed = entries.len();
        let fresh = filter_new(entries, &persisted);
        info!(
            "There are {} records we haven't seen before at {}",
            fresh.len(),
            self.register_url
        );

        let mut stats = RunStats {
            existing: persisted.len(),
            listed,
            new: fresh.len(),
            ..RunStats::default()
        };
        if fresh.is_empty() {
            info!("Done");
            return Ok(stats);
        }

        let pb = ProgressBar::new(fresh.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut records: Vec<ConvictionRecord> = Vec::with_capacity(fresh.len());
        for entry in fresh {
            let mut record = match detail::scrape(&self.fetcher, entry) {
                Ok(r) => r,
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            };
            match self.geocoder.geocode(&mut record) {
                Ok(_) => stats.geocoded += 1,
                // a broken trust store is not a per-address problem
                Err(GeocodeError::Transport(e @ FetchError::Tls { .. })) => {
                    pb.abandon();
                    return Err(e.into());
                }
                Err(e) => warn!("Saving {} without coordinates: {}", record.link, e),
            }
            records.push(record);
            pb.inc(1);
        }
        pb.finish_and_clear();

        stats.saved = db::save_records(self.conn, &records)?;
        info!(
            "Saved {} records ({} geocoded, {} addresses looked up)",
            stats.saved,
            stats.geocoded,
            self.geocoder.cached()
        );
        info!("Done");
        Ok(stats)
    }
}
