// src/feed/types.rs
use thiserror::Error;

/// One board as returned by the fetch collaborator. Consumed immediately by
/// [`crate::transform::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedResult {
    pub location_name: Option<String>,
    pub generated_at: Option<String>,
    pub services: Vec<RawService>,
}

/// A calling point reference (origin or destination).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLocation {
    pub tiploc: Option<String>,
    pub location_name: Option<String>,
}

/// One service entry, kept as the raw text the feed sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawService {
    pub train_id: Option<String>,
    pub uid: Option<String>,
    pub operator: Option<String>,
    pub operator_code: Option<String>,
    pub origin: Option<RawLocation>,
    pub destination: Option<RawLocation>,
    pub platform: Option<String>,
    pub platform_is_hidden: bool,
    pub sta: Option<String>,
    pub eta: Option<String>,
    pub std: Option<String>,
    pub etd: Option<String>,
    /// Vehicle count.
    pub length: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("feed returned SOAP fault {code}: {message}")]
    Fault { code: String, message: String },
    #[error("malformed feed response: {0}")]
    Malformed(String),
}

impl From<quick_xml::Error> for FetchError {
    fn from(e: quick_xml::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

/// Fetch collaborator: `fetch(tiploc, window, rows) -> board`.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(
        &self,
        tiploc: &str,
        window_minutes: u32,
        max_rows: u32,
    ) -> Result<RawFeedResult, FetchError>;

    fn name(&self) -> &'static str;
}
