//! TMDb catalog client and disc-label normalization
//!
//! The pipeline talks to the catalog through the [`Catalog`] trait so tests
//! and offline runs can substitute a stub.

use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// TMDb API base URL
pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

/// Request timeout for catalog calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum candidates returned from a search
const MAX_SEARCH_RESULTS: usize = 10;

/// A movie search candidate
#[derive(Debug, Clone, PartialEq)]
pub struct MovieMatch {
    pub catalog_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub overview: String,
    pub poster_ref: Option<String>,
    pub popularity: f64,
}

/// Detailed movie information
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetails {
    pub catalog_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub overview: String,
    pub poster_ref: Option<String>,
    pub popularity: f64,
}

/// External catalog capability
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search for movies matching a query, optionally filtered by year.
    async fn search_movie(&self, query: &str, year: Option<i32>) -> Result<Vec<MovieMatch>>;

    /// Fetch details for one catalog entry.
    async fn movie_details(&self, catalog_id: i64) -> Result<Option<MovieDetails>>;
}

/// Clean a raw disc label for catalog searching.
///
/// Strips disc-number markers, format tags, region and rating markers,
/// edition markers and filler words, then normalizes separators and case.
/// Letters inside words are always preserved.
pub fn clean_disc_label(label: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            // Disc-number markers
            r"(?i)_*DISC[_ ]*\d+",
            r"(?i)_*DVD\d+",
            r"(?i)^DVD_",
            r"(?i)_DVD$",
            r"(?i)_DVD_",
            r"(?i)(?:^|[_ ])D\d+(?:[_ ]|$)",
            // Format tags
            r"(?i)_*WIDESCREEN",
            r"(?i)_*FULLSCREEN",
            r"(?i)(?:^|[_ ])WS(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])FS(?:[_ ]|$)",
            r"(?i)_*16X9",
            r"(?i)_*4X3",
            r"(?i)_*ANAMORPHIC",
            r"(?i)(?:^|[_ ])PS(?:[_ ]|$)",
            // Region and rating markers
            r"(?i)(?:^|[_ ])NTSC(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])PAL(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])R[1-6](?:[_ ]|$)",
            r"(?i)(?:^|[_ ])RATED(?:_*(?:G|PG_*13|PG|R|NC_*17))?(?:[_ ]|$)",
            // Edition markers
            r"(?i)_*SPECIAL_*EDITION",
            r"(?i)_*COLLECTORS_*EDITION",
            r"(?i)_*DIRECTORS_*CUT",
            r"(?i)(?:^|[_ ])SE(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])DC(?:[_ ]|$)",
            r"(?i)_*UNRATED",
            r"(?i)_*EXTENDED",
            r"(?i)_*THEATRICAL",
            r"(?i)_*REMASTERED",
            // Filler
            r"(?i)(?:^|[_ ])MOVIE(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])FEATURE(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])MAIN[_ ]*TITLE(?:[_ ]|$)",
            r"(?i)(?:^|[_ ])US_*DES(?:[_ ]|$)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("label pattern must compile"))
        .collect()
    });

    let mut cleaned = label.to_string();
    for pattern in patterns {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned = cleaned.replace('_', " ");

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// TMDb-backed catalog implementation
pub struct TmdbClient {
    http: reqwest::Client,
    api_token: String,
}

impl TmdbClient {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_token: api_token.into(),
        }
    }

    /// Whether a bearer token was supplied. Without one every call fails
    /// with a catalog error and the identifier routes jobs to review.
    pub fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: i64,
    #[serde(default)]
    title: String,
    release_date: Option<String>,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    #[serde(default)]
    popularity: f64,
}

#[derive(Deserialize)]
struct DetailsResponse {
    id: i64,
    #[serde(default)]
    title: String,
    release_date: Option<String>,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    #[serde(default)]
    popularity: f64,
}

fn extract_year(date: Option<&str>) -> Option<i32> {
    let date = date?;
    if date.len() < 4 {
        return None;
    }
    date[..4].parse().ok()
}

#[async_trait]
impl Catalog for TmdbClient {
    async fn search_movie(&self, query: &str, year: Option<i32>) -> Result<Vec<MovieMatch>> {
        if !self.is_configured() {
            return Err(Error::Catalog("catalog token not configured".to_string()));
        }

        let mut params: Vec<(&str, String)> = vec![("query", query.to_string())];
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }

        debug!(query, ?year, "Searching catalog for movies");

        let response = self
            .http
            .get(format!("{TMDB_API_BASE}/search/movie"))
            .bearer_auth(&self.api_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::Catalog(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Catalog(format!("bad search response: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .map(|entry| MovieMatch {
                catalog_id: entry.id,
                title: entry.title,
                year: extract_year(entry.release_date.as_deref()),
                overview: entry.overview,
                poster_ref: entry.poster_path,
                popularity: entry.popularity,
            })
            .collect())
    }

    async fn movie_details(&self, catalog_id: i64) -> Result<Option<MovieDetails>> {
        if !self.is_configured() {
            return Err(Error::Catalog("catalog token not configured".to_string()));
        }

        let response = self
            .http
            .get(format!("{TMDB_API_BASE}/movie/{catalog_id}"))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::Catalog(format!("details request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "details returned {}",
                response.status()
            )));
        }

        let body: DetailsResponse = response
            .json()
            .await
            .map_err(|e| Error::Catalog(format!("bad details response: {e}")))?;

        Ok(Some(MovieDetails {
            catalog_id: body.id,
            title: body.title,
            year: extract_year(body.release_date.as_deref()),
            overview: body.overview,
            poster_ref: body.poster_path,
            popularity: body.popularity,
        }))
    }
}
