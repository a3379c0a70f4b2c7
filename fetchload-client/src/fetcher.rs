use crate::error::{FetchError, Result};
use crate::result::FetchResult;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("fetchload/", env!("CARGO_PKG_VERSION"));

/// Issues the single request of a load run.
///
/// Configuration is collected with the `with_*` builders; the underlying
/// `reqwest::Client` is only built when [`Fetcher::fetch`] runs, so a bad
/// header surfaces as an error instead of a panic.
pub struct Fetcher {
    method: Method,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            query: Vec::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_client(&self) -> Result<Client> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Client(format!("invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                FetchError::Client(format!("invalid value for header '{}': {}", name, e))
            })?;
            default_headers.append(header_name, header_value);
        }

        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))
    }

    /// Perform the request and read the whole body.
    ///
    /// Any non-2xx status is returned as [`FetchError::HttpStatus`] without
    /// reading the body.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }

        let client = self.build_client()?;

        info!("Requesting {} {}", self.method, parsed);
        let mut request = client.request(self.method.clone(), parsed.clone());
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let response_time = start.elapsed();

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            debug!("{} answered {} after {:?}", final_url, status, response_time);
            return Err(FetchError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();

        let body = response.bytes().await?;

        let mut result = FetchResult::new(final_url);
        result.status_code = status.as_u16();
        result.content_type = content_type;
        result.content_length = content_length;
        result.response_time = response_time;
        result.body = body.to_vec();

        debug!(
            "Received {} bytes ({}) in {:?}",
            result.body.len(),
            result.content_type.as_deref().unwrap_or("no content-type"),
            result.response_time
        );

        Ok(result)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
