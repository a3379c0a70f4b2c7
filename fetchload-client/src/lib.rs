pub mod error;
pub mod fetcher;
pub mod result;

pub use fetcher::{DEFAULT_TIMEOUT_SECS, Fetcher};
pub use error::FetchError;
pub use result::FetchResult;

pub use reqwest::Method;
