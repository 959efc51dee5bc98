//! Short artist biographies, fetched from the public encyclopedia's
//! page-summary endpoint. No HTML scraping, no caching; the upstream is
//! treated as untrusted and slow.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SUMMARY_ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BioError {
    #[error("Request to the encyclopedia failed")]
    Request(#[from] reqwest::Error),
    #[error("No encyclopedia page found for {0:?}")]
    PageNotFound(String),
    #[error("The encyclopedia replied with status {0}")]
    UpstreamStatus(StatusCode),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ArtistBio {
    pub artist: String,
    pub bio: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct SummaryResponse {
    title: String,
    #[serde(default)]
    extract: String,
}

#[derive(Clone, Debug)]
pub struct BioClient {
    http: reqwest::Client,
}

impl BioClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("atelier/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http })
    }

    fn summary_url(artist: &str) -> String {
        // Encyclopedia page titles use underscores for spaces.
        let page = artist.trim().replace(' ', "_");
        format!("{SUMMARY_ENDPOINT}/{}", urlencoding::encode(&page))
    }

    pub async fn fetch_bio(&self, artist: &str) -> Result<ArtistBio, BioError> {
        let response = self.http.get(Self::summary_url(artist)).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(BioError::PageNotFound(artist.to_owned())),
            status => return Err(BioError::UpstreamStatus(status)),
        }

        let summary: SummaryResponse = response.json().await?;
        Ok(ArtistBio {
            artist: summary.title,
            bio: summary.extract,
        })
    }
}
