// Station status HTTP client
//
// One bounded GET per station against `{base}/station/info?deviceId=…`.
// The response body is returned untouched as a JSON value; shape
// normalization is the caller's job, since the payload varies by
// firmware and API revision.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Public map API endpoint the stations are looked up against.
pub const DEFAULT_BASE_URL: &str = "https://mc.chargepoint.com/map-prod/v3";

/// Maximum number of body characters carried in error messages.
const BODY_PREVIEW_LEN: usize = 200;

/// Raw HTTP client for the station info endpoint.
///
/// Performs exactly one request per call and never retries; a failed
/// lookup is picked up again by the next scheduled poll.
pub struct StationClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl StationClient {
    /// Create a new station client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. [`DEFAULT_BASE_URL`].
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a station client with a pre-built `reqwest::Client`.
    ///
    /// The client's own timeout applies; `timeout` is only used to
    /// label [`Error::Timeout`].
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    /// Build the lookup URL for one station. The id is percent-encoded
    /// into the query string.
    pub fn station_url(&self, id: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/station/info"))?;
        url.query_pairs_mut().append_pair("deviceId", id);
        Ok(url)
    }

    /// Fetch the live status document for one station.
    pub async fn fetch_station(&self, id: &str) -> Result<Value, Error> {
        if id.trim().is_empty() {
            return Err(Error::InvalidStationId);
        }

        let url = self.station_url(id)?;
        debug!(station_id = id, "GET {}", url);

        let resp = self.http.get(url).send().await.map_err(|e| self.map_transport(e))?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await.map_err(|e| self.map_transport(e))?;
        trace!(station_id = id, bytes = body.len(), "station response received");

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Truncate a body to at most [`BODY_PREVIEW_LEN`] characters.
fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> StationClient {
        StationClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Duration::from_secs(15),
        )
    }

    #[test]
    fn station_url_appends_path_and_query() {
        let url = client(DEFAULT_BASE_URL).station_url("ABC123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mc.chargepoint.com/map-prod/v3/station/info?deviceId=ABC123"
        );
    }

    #[test]
    fn station_url_tolerates_trailing_slash() {
        let url = client("http://localhost:8080/api/").station_url("1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/station/info?deviceId=1");
    }

    #[test]
    fn station_url_encodes_id() {
        let url = client(DEFAULT_BASE_URL).station_url("a&b=c/d").unwrap();
        assert_eq!(url.query(), Some("deviceId=a%26b%3Dc%2Fd"));
        let (_, value) = url.query_pairs().next().unwrap();
        assert_eq!(value, "a&b=c/d");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), BODY_PREVIEW_LEN);
        assert_eq!(preview("short"), "short");
    }
}
