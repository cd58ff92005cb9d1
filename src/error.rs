use thiserror::Error;

pub const EXIT_TLS: u8 = 2;
pub const EXIT_ARCHIVE: u8 = 3;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("TLS failure fetching {url}: {reason}")]
    Tls { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid transport configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("archive refused to save {url} (HTTP {status})")]
    Status { url: String, status: u16 },
}

/// A label on a detail page that is not in the field table.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown field for '{label}'")]
pub struct UnknownFieldError {
    pub label: String,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("record {0} has no address")]
    MissingAddress(String),

    #[error("geocoding request failed: {0}")]
    Transport(#[from] FetchError),

    #[error("no results for '{0}'")]
    NotFound(String),

    #[error("geocoder returned {status}: {message}")]
    Provider { status: String, message: String },

    #[error("could not decode geocoder response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error("unexpected page layout at {url}: {what}")]
    Layout { url: String, what: String },

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ScrapeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ScrapeError::Fetch(FetchError::Tls { .. }) => EXIT_TLS,
            ScrapeError::Archive(_) => EXIT_ARCHIVE,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let tls = ScrapeError::Fetch(FetchError::Tls {
            url: "https://example.org".into(),
            reason: "invalid peer certificate".into(),
        });
        let archive = ScrapeError::Archive(ArchiveError::Status {
            url: "https://example.org".into(),
            status: 523,
        });
        let field = ScrapeError::UnknownField(UnknownFieldError {
            label: "Mystery:".into(),
        });
        assert_eq!(tls.exit_code(), EXIT_TLS);
        assert_eq!(archive.exit_code(), EXIT_ARCHIVE);
        assert_eq!(field.exit_code(), 1);
        assert_eq!(field.to_string(), "unknown field for 'Mystery:'");
    }
}
