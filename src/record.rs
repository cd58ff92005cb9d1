use std::collections::BTreeMap;

/// Canonical text fields a conviction record may carry.
///
/// `link`, `lat` and `lng` are not listed here: the link is the record's
/// identity and the coordinates live in [`Coordinates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    ConvictionNumber,
    TradingName,
    CompanyName,
    Address,
    ConvictedPersonsOrCompany,
    RelationshipOfPerson,
    ConvictionDate,
    CourtDecision,
    SentenceImposed,
    ProsecutionBroughtBy,
    Description,
    Court,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::ConvictionNumber,
        Field::TradingName,
        Field::CompanyName,
        Field::Address,
        Field::ConvictedPersonsOrCompany,
        Field::RelationshipOfPerson,
        Field::ConvictionDate,
        Field::CourtDecision,
        Field::SentenceImposed,
        Field::ProsecutionBroughtBy,
        Field::Description,
        Field::Court,
    ];

    /// Column name used in storage.
    pub fn column(self) -> &'static str {
        match self {
            Field::ConvictionNumber => "conviction_number",
            Field::TradingName => "trading_name",
            Field::CompanyName => "company_name",
            Field::Address => "address",
            Field::ConvictedPersonsOrCompany => "convicted_persons_or_company",
            Field::RelationshipOfPerson => "relationship_of_person",
            Field::ConvictionDate => "conviction_date",
            Field::CourtDecision => "court_decision",
            Field::SentenceImposed => "sentence_imposed",
            Field::ProsecutionBroughtBy => "prosecution_brought_by",
            Field::Description => "description",
            Field::Court => "court",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One listing item: the detail page link plus whatever summary fields the
/// listing showed inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub link: String,
    pub summary: BTreeMap<Field, String>,
}

impl IndexEntry {
    pub fn new(link: impl Into<String>) -> Self {
        IndexEntry {
            link: link.into(),
            summary: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvictionRecord {
    pub link: String,
    pub fields: BTreeMap<Field, String>,
    pub location: Option<Coordinates>,
}

impl ConvictionRecord {
    pub fn from_entry(entry: IndexEntry) -> Self {
        ConvictionRecord {
            link: entry.link,
            fields: entry.summary,
            location: None,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Merge freshly scraped fields; incoming values win.
    pub fn merge(&mut self, fields: BTreeMap<Field, Option<String>>) {
        for (field, value) in fields {
            match value {
                Some(v) => {
                    self.fields.insert(field, v);
                }
                None => {
                    self.fields.remove(&field);
                }
            }
        }
    }
}
