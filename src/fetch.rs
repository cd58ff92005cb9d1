use std::error::Error as _;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use reqwest::tls::Version;
use reqwest::Certificate;
use scraper::Html;
use tracing::{debug, error};

use crate::archive::Wayback;
use crate::error::{FetchError, ScrapeError};

pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A plain blocking GET.
pub trait HttpGet {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// A fetched HTML page, ready for selector queries.
pub struct Page {
    pub url: String,
    pub html: Html,
}

/// Fetch a page by URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Page, ScrapeError>;
}

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    ca_bundle: Option<PathBuf>,
}

impl HttpClient {
    /// Client for the register site: pinned to `ssl_version`, trusting the
    /// roots in `ca_bundle` on top of the built-in ones.
    pub fn new(ca_bundle: Option<&Path>, ssl_version: &str) -> Result<Self, FetchError> {
        let version = parse_tls_version(ssl_version)?;
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .min_tls_version(version)
            .max_tls_version(version);

        if let Some(path) = ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                FetchError::Config(format!("cannot read CA bundle {}: {}", path.display(), e))
            })?;
            let certs = Certificate::from_pem_bundle(&pem)?;
            debug!("Loaded {} root certificates", certs.len());
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(HttpClient {
            client: builder.build()?,
            ca_bundle: ca_bundle.map(Path::to_path_buf),
        })
    }

    /// Client for third-party services (archive, geocoder): built-in roots
    /// only, no version pin.
    pub fn unpinned() -> Result<Self, FetchError> {
        Ok(HttpClient {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            ca_bundle: None,
        })
    }

    pub fn ca_bundle(&self) -> Option<&Path> {
        self.ca_bundle.as_deref()
    }
}

impl HttpGet for HttpClient {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self.client.get(url).send().map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| classify(url, e))?;
        Ok(HttpResponse { status, body })
    }
}

pub fn parse_tls_version(raw: &str) -> Result<Version, FetchError> {
    let normalized: String = raw
        .to_ascii_uppercase()
        .chars()
        .filter(|c| !matches!(c, '_' | '.' | 'V' | ' '))
        .collect();
    match normalized.as_str() {
        "TLS1" | "TLS10" => Ok(Version::TLS_1_0),
        "TLS11" => Ok(Version::TLS_1_1),
        "TLS12" => Ok(Version::TLS_1_2),
        "TLS13" => Ok(Version::TLS_1_3),
        _ => Err(FetchError::Config(format!("unsupported SSL_VERSION '{}'", raw))),
    }
}

/// Split TLS failures from other transport errors. The URL is stripped first
/// so a host or query containing "ssl" cannot match.
fn classify(url: &str, err: reqwest::Error) -> FetchError {
    let err = err.without_url();
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }

    if looks_like_tls_failure(&reason) {
        FetchError::Tls {
            url: url.to_string(),
            reason,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason,
        }
    }
}

fn looks_like_tls_failure(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    ["certificate", "handshake", "tls", "ssl", "unknownissuer"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Page fetcher with the optional archival side-call. The archive carries its
/// own client, so `http` is only ever used for the target pages.
pub struct PageFetcher<H> {
    http: H,
    archive: Option<Wayback>,
}

impl<H: HttpGet> PageFetcher<H> {
    pub fn new(http: H, archive: Option<Wayback>) -> Self {
        PageFetcher { http, archive }
    }
}

impl<H: HttpGet> Fetch for PageFetcher<H> {
    fn fetch(&self, url: &str) -> Result<Page, ScrapeError> {
        if let Some(archive) = &self.archive {
            archive.save(url)?;
        }

        let response = self.http.get(url).inspect_err(|e| {
            if let FetchError::Tls { .. } = e {
                log_tls_guidance(url, e);
            }
        })?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            }
            .into());
        }

        Ok(Page {
            url: url.to_string(),
            html: Html::parse_document(&response.body),
        })
    }
}

pub(crate) fn log_tls_guidance(url: &str, err: &FetchError) {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    error!("There was an SSL error when performing a HTTP GET to {}", url);
    error!("The error was: {}", err);
    error!("There's a good chance there's a problem with the certificate bundle.");
    error!(
        "Find out what the problem could be at: https://www.ssllabs.com/ssltest/analyze.html?d={}",
        host
    );
}


#[cfg(test)]
mod tests {
    use super::testing::FakeHttp;
    use super::*;

    const TARGET: &str = "https://www2.health.vic.gov.au/about/convictions-register";

    #[test]
    fn archival_disabled_issues_one_get() {
        let http = FakeHttp::default().with(TARGET, 200, "<html><body>ok</body></html>");
        let fetcher = PageFetcher::new(http, None);
        let page = fetcher.fetch(TARGET).unwrap();
        assert_eq!(page.url, TARGET);
        assert_eq!(*fetcher.http.requests.borrow(), vec![TARGET.to_string()]);
    }

    #[test]
    fn archival_enabled_saves_before_fetching() {
        let save = format!("https://web.archive.org/save/{}", TARGET);
        let pages = FakeHttp::default().with(TARGET, 200, "<html></html>");
        let archive_http = FakeHttp::default().with(&save, 200, "");
        let archived = archive_http.requests.clone();
        let fetcher = PageFetcher::new(
            pages,
            Some(Wayback::new("https://web.archive.org", archive_http)),
        );
        fetcher.fetch(TARGET).unwrap();
        assert_eq!(*archived.borrow(), vec![save]);
        // the register client never sees the archive request
        assert_eq!(*fetcher.http.requests.borrow(), vec![TARGET.to_string()]);
    }

    #[test]
    fn archival_failure_is_fatal() {
        let save = format!("https://web.archive.org/save/{}", TARGET);
        let pages = FakeHttp::default().with(TARGET, 200, "<html></html>");
        let archive_http = FakeHttp::default().with(&save, 520, "");
        let fetcher = PageFetcher::new(
            pages,
            Some(Wayback::new("https://web.archive.org", archive_http)),
        );
        let err = fetcher.fetch(TARGET).err().unwrap();
        assert!(matches!(err, ScrapeError::Archive(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_ARCHIVE);
        assert!(fetcher.http.requests.borrow().is_empty());
    }

    #[test]
    fn tls_failure_on_target_exits_with_2() {
        let http = FakeHttp::default().with_untrusted(TARGET);
        let fetcher = PageFetcher::new(http, None);
        let err = fetcher.fetch(TARGET).err().unwrap();
        assert!(matches!(err, ScrapeError::Fetch(FetchError::Tls { .. })));
        assert_eq!(err.exit_code(), crate::error::EXIT_TLS);
        assert_eq!(fetcher.http.requests.borrow().len(), 1);
    }

    #[test]
    fn non_success_status_is_an_error() {
        let http = FakeHttp::default().with(TARGET, 404, "not found");
        let fetcher = PageFetcher::new(http, None);
        let err = fetcher.fetch(TARGET).err().unwrap();
        assert!(matches!(
            err,
            ScrapeError::Fetch(FetchError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn tls_versions() {
        assert_eq!(parse_tls_version("TLSv1_2").unwrap(), Version::TLS_1_2);
        assert_eq!(parse_tls_version("tlsv1.3").unwrap(), Version::TLS_1_3);
        assert_eq!(parse_tls_version("TLSv1").unwrap(), Version::TLS_1_0);
        assert!(parse_tls_version("SSLv3").is_err());
    }

    #[test]
    fn tls_failures_are_recognised() {
        assert!(looks_like_tls_failure(
            "error sending request: client error (Connect): invalid peer certificate: UnknownIssuer"
        ));
        assert!(!looks_like_tls_failure(
            "error sending request: dns error: failed to lookup address"
        ));
    }

    #[test]
    fn ssl_in_the_host_name_is_not_a_tls_failure() {
        // .invalid never resolves, so this is a DNS failure
        let url = "http://ssl.tls.invalid/?q=Tlsx";
        let err = Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(url)
            .send()
            .unwrap_err();
        assert!(matches!(classify(url, err), FetchError::Transport { .. }));
    }

    #[test]
    fn bundle_roots_are_added_to_built_in_ones() {
        let bundle = Path::new("tests/fixtures/root_ca.pem");
        let pinned = HttpClient::new(Some(bundle), "TLSv1_2").unwrap();
        assert_eq!(pinned.ca_bundle(), Some(bundle));
        assert!(HttpClient::unpinned().unwrap().ca_bundle().is_none());
    }
}
