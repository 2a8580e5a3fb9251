//! Tile locator rendering and single-attempt HTTP retrieval.
//!
//! One fetch per cycle, bounded by the configured timeout. There is no
//! in-process retry: a failed cycle recovers on the next scheduled one.

use std::time::Duration;

use skywatch::{AcquisitionIndex, ConfigError, FetchError};

/// Placeholders a locator template may interpolate.
const PLACEHOLDERS: [&str; 5] = ["year", "month", "day", "hour", "minute"];

/// A URL template parameterized by acquisition-index components, e.g.
/// `https://radar.example/tiles/{year}{month}{day}{hour}{minute}.png`.
/// Configurable so the daemon outlives any single provider's URL scheme.
#[derive(Debug, Clone)]
pub struct LocatorTemplate {
    template: String,
}

impl LocatorTemplate {
    /// Parse and validate a template. Unknown or unbalanced placeholders are
    /// rejected here so a bad template fails at startup, not mid-run.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let mut rest = template;
        let mut seen = 0usize;
        while let Some(open) = rest.find('{') {
            if rest[..open].contains('}') {
                return Err(ConfigError::MalformedTemplate("stray '}'".to_string()));
            }
            let tail = &rest[open + 1..];
            let Some(close) = tail.find('}') else {
                return Err(ConfigError::MalformedTemplate("unbalanced '{'".to_string()));
            };
            let name = &tail[..close];
            if !PLACEHOLDERS.contains(&name) {
                return Err(ConfigError::MalformedTemplate(format!(
                    "unknown placeholder {{{name}}}"
                )));
            }
            seen += 1;
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(ConfigError::MalformedTemplate("stray '}'".to_string()));
        }
        if seen == 0 {
            return Err(ConfigError::MalformedTemplate(
                "template interpolates none of {year}/{month}/{day}/{hour}/{minute}".to_string(),
            ));
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Interpolate the index into a fully-qualified locator.
    pub fn render(&self, index: &AcquisitionIndex) -> String {
        self.template
            .replace("{year}", &index.year())
            .replace("{month}", &index.month())
            .replace("{day}", &index.day())
            .replace("{hour}", &index.hour())
            .replace("{minute}", &index.minute())
    }
}

/// Retrieves one tile per cycle and validates the payload.
#[derive(Clone)]
pub struct TileFetcher {
    client: reqwest::Client,
    template: LocatorTemplate,
}

impl TileFetcher {
    pub fn new(template: LocatorTemplate, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("skywatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, template }
    }

    /// The locator this fetcher would request for `index`.
    pub fn locator(&self, index: &AcquisitionIndex) -> String {
        self.template.render(index)
    }

    /// Fetch the tile for `index`.
    ///
    /// Any transport failure or non-2xx response is `Unavailable`; a timeout
    /// is `Timeout`; an apparent success with an empty body is
    /// `NotYetPublished`: upstream has not materialized this index yet and
    /// nothing may be written to storage.
    pub async fn fetch(&self, index: &AcquisitionIndex) -> Result<Vec<u8>, FetchError> {
        let url = self.template.render(index);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable {
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
            });
        }

        let body = resp.bytes().await.map_err(classify_transport)?;
        if body.is_empty() {
            return Err(FetchError::NotYetPublished);
        }
        Ok(body.to_vec())
    }
}

fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unavailable {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}
