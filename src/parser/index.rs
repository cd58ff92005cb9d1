use scraper::ElementRef;
use tracing::info;
use url::Url;

use super::{element_text, selector};
use crate::error::ScrapeError;
use crate::fetch::{Fetch, Page};
use crate::record::{Field, IndexEntry};

/// Fetch the register listing and return one entry per conviction, in page
/// order.
pub fn list_index<F: Fetch + ?Sized>(
    fetcher: &F,
    register_url: &str,
) -> Result<Vec<IndexEntry>, ScrapeError> {
    let page = fetcher.fetch(register_url)?;
    let entries = extract_entries(&page)?;
    info!("There are {} records at {}", entries.len(), register_url);
    Ok(entries)
}

pub fn extract_entries(page: &Page) -> Result<Vec<IndexEntry>, ScrapeError> {
    let base = Url::parse(&page.url).ok();
    page.html
        .select(&selector("div.listing-container ol li"))
        .map(|item| extract_entry(item, base.as_ref(), &page.url))
        .collect()
}

fn extract_entry(
    item: ElementRef<'_>,
    base: Option<&Url>,
    page_url: &str,
) -> Result<IndexEntry, ScrapeError> {
    let href = item
        .select(&selector("a[href]"))
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| ScrapeError::Layout {
            url: page_url.to_string(),
            what: "listing item without a link".to_string(),
        })?;

    let link = match base.and_then(|b| b.join(href.trim()).ok()) {
        Some(abs) => abs.to_string(),
        None => href.trim().to_string(),
    };

    let mut entry = IndexEntry::new(link);
    if let Some(h3) = item.select(&selector("h3")).next() {
        put(&mut entry, Field::TradingName, element_text(h3));
    }

    // "party | address | council"
    let summary: String = item
        .select(&selector("div.content em"))
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    let mut parts = summary.split('|').map(str::trim);
    for field in [
        Field::ConvictedPersonsOrCompany,
        Field::Address,
        Field::ProsecutionBroughtBy,
    ] {
        if let Some(part) = parts.next() {
            put(&mut entry, field, part.to_string());
        }
    }

    Ok(entry)
}

fn put(entry: &mut IndexEntry, field: Field, value: String) {
    if !value.is_empty() {
        entry.summary.insert(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FixtureFetcher;
    use crate::settings::REGISTER_URL;

    #[test]
    fn listing_yields_links_in_document_order() {
        let fetcher = FixtureFetcher::default().with_fixture(REGISTER_URL, "listing");
        let entries = list_index(&fetcher, REGISTER_URL).unwrap();
        let links: Vec<&str> = entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://www2.health.vic.gov.au/about/convictions-register/ghost-kitchen",
                "https://www2.health.vic.gov.au/about/convictions-register/harbour-bakery",
                "https://www2.health.vic.gov.au/about/convictions-register/sunrise-takeaway",
            ]
        );
        assert!(entries.iter().all(|e| Url::parse(&e.link).is_ok()));
    }

    #[test]
    fn listing_summary_fields() {
        let fetcher = FixtureFetcher::default().with_fixture(REGISTER_URL, "listing");
        let entries = list_index(&fetcher, REGISTER_URL).unwrap();
        let first = &entries[0];
        assert_eq!(first.summary[&Field::TradingName], "Ghost Kitchen");
        assert_eq!(first.summary[&Field::ConvictedPersonsOrCompany], "Ghost Kitchen Pty Ltd");
        assert_eq!(first.summary[&Field::Address], "12 Smith Street Fitzroy 3065");
        assert_eq!(first.summary[&Field::ProsecutionBroughtBy], "Yarra City Council");

        // no summary line
        assert_eq!(entries[2].summary.len(), 1);
    }

    #[test]
    fn empty_listing_is_empty() {
        let fetcher = FixtureFetcher::default().with(REGISTER_URL, "<html><body></body></html>");
        assert!(list_index(&fetcher, REGISTER_URL).unwrap().is_empty());
    }

    #[test]
    fn item_without_link_is_layout_error() {
        let fetcher = FixtureFetcher::default().with(
            REGISTER_URL,
            "<div class=\"listing-container\"><ol><li><h3>Nameless</h3></li></ol></div>",
        );
        let err = list_index(&fetcher, REGISTER_URL).unwrap_err();
        assert!(matches!(err, ScrapeError::Layout { .. }));
    }
}
