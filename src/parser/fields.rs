use std::collections::BTreeMap;

use scraper::ElementRef;
use tracing::warn;

use super::{element_text, scrub};
use crate::error::UnknownFieldError;
use crate::record::Field;

/// Detail page labels, exactly as the register prints them.
pub const MAPPINGS: [(&str, Field); 12] = [
    ("Conviction number:", Field::ConvictionNumber),
    ("Trade name of food business:", Field::TradingName),
    ("Company name (if applicable):", Field::CompanyName),
    ("Address of premises where offence(s) occurred:", Field::Address),
    ("Name of convicted person(s) or company:", Field::ConvictedPersonsOrCompany),
    ("Relationship of convicted person(s) to the business:", Field::RelationshipOfPerson),
    ("Date of conviction:", Field::ConvictionDate),
    ("Court decision:", Field::CourtDecision),
    ("Sentence and/or order imposed:", Field::SentenceImposed),
    ("Prosecution brought by or for:", Field::ProsecutionBroughtBy),
    ("Description of offense(s):", Field::Description),
    ("Court:", Field::Court),
];

pub fn resolve(label: &str) -> Result<Field, UnknownFieldError> {
    MAPPINGS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, field)| *field)
        .ok_or_else(|| UnknownFieldError {
            label: label.to_string(),
        })
}

/// Turn (label, value) element pairs into field values.
///
/// A `None` value means the field is blank on the page. The first unknown
/// label aborts the whole record.
pub fn build_record_fields<'a, I>(
    pairs: I,
) -> Result<BTreeMap<Field, Option<String>>, UnknownFieldError>
where
    I: IntoIterator<Item = (ElementRef<'a>, Option<ElementRef<'a>>)>,
{
    let mut fields = BTreeMap::new();
    for (label, value) in pairs {
        let field = resolve(&element_text(label))?;
        let text = value.and_then(|v| value_text(field, v));
        fields.insert(field, text);
    }
    Ok(fields)
}

fn value_text(field: Field, value: ElementRef<'_>) -> Option<String> {
    let text = match field {
        Field::Description => description_markdown(value),
        _ => element_text(value),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn description_markdown(value: ElementRef<'_>) -> String {
    match htmd::convert(&value.inner_html()) {
        Ok(md) => md.trim().to_string(),
        Err(e) => {
            warn!("Markdown conversion failed, keeping plain text: {}", e);
            scrub(&value.text().collect::<String>())
        }
    }
}
