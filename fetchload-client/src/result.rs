use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A successful (2xx) response, body fully read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time: Duration,
    pub body: Vec<u8>,
}

impl FetchResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            content_length: None,
            response_time: Duration::from_secs(0),
            body: Vec::new(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }
}
