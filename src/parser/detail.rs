use scraper::ElementRef;
use tracing::debug;

use super::fields::build_record_fields;
use super::selector;
use crate::error::ScrapeError;
use crate::fetch::{Fetch, Page};
use crate::record::{ConvictionRecord, IndexEntry};

/// Fetch the entry's detail page and merge its fields over the listing
/// summary.
pub fn scrape<F: Fetch + ?Sized>(
    fetcher: &F,
    entry: IndexEntry,
) -> Result<ConvictionRecord, ScrapeError> {
    debug!("Extracting {}", entry.link);
    let page = fetcher.fetch(&entry.link)?;
    let mut record = ConvictionRecord::from_entry(entry);
    extract_detail(&page, &mut record)?;
    Ok(record)
}

pub fn extract_detail(page: &Page, record: &mut ConvictionRecord) -> Result<(), ScrapeError> {
    let dl = page
        .html
        .select(&selector("div#main div dl"))
        .next()
        .ok_or_else(|| ScrapeError::Layout {
            url: page.url.clone(),
            what: "no definition list on detail page".to_string(),
        })?;

    // Text nodes between <dt>/<dd> are dropped; what is left alternates
    // label, value.
    let nodes: Vec<ElementRef<'_>> = dl.children().filter_map(ElementRef::wrap).collect();
    let pairs = nodes
        .chunks(2)
        .map(|pair| (pair[0], pair.get(1).copied()));

    let fields = build_record_fields(pairs)?;
    record.merge(fields);
    Ok(())
}
