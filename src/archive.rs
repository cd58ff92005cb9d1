use tracing::{debug, error};

use crate::error::ArchiveError;
use crate::fetch::HttpGet;

/// Wayback Machine "save page now" endpoint, with its own HTTP client.
pub struct Wayback {
    base: String,
    http: Box<dyn HttpGet>,
}

impl Wayback {
    pub fn new(base: &str, http: impl HttpGet + 'static) -> Self {
        Wayback {
            base: base.trim_end_matches('/').to_string(),
            http: Box::new(http),
        }
    }

    pub fn save_url(&self, url: &str) -> String {
        format!("{}/save/{}", self.base, url)
    }

    /// Ask the archive to snapshot `url`. Any failure is an error.
    pub fn save(&self, url: &str) -> Result<(), ArchiveError> {
        let save_url = self.save_url(url);
        debug!("Archiving {}", url);

        let response = self.http.get(&save_url).map_err(|source| {
            error!("Could not archive {} via {}: {}", url, save_url, source);
            ArchiveError::Request {
                url: url.to_string(),
                source,
            }
        })?;

        if !response.is_success() {
            error!(
                "Archive returned HTTP {} when saving {}",
                response.status, url
            );
            return Err(ArchiveError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(())
    }
}
