#![forbid(unsafe_code)]

//! Thin blocking client for the three YouTube Data API v3 endpoints the
//! ingester reads: `videoCategories`, `videos?chart=mostPopular` and
//! `channels`.
//!
//! Payload structs only carry the fields we store. Everything is defaulted so
//! one odd item degrades that item instead of failing the whole page.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::IngestConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListResponse {
    #[serde(default)]
    pub items: Vec<CategoryItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryItem {
    pub id: String,
    pub snippet: CategorySnippet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySnippet {
    pub title: String,
}

/// One page of the trending chart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    pub statistics: VideoStatistics,
    pub content_details: ContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSnippet {
    pub published_at: String,
    pub channel_id: String,
    pub title: String,
    pub category_id: String,
    pub tags: Vec<String>,
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// Prefers the `high` rendition, then the smaller ones.
    pub fn best_url(&self) -> Option<&str> {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|thumb| thumb.url.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
}

/// Counts arrive as decimal strings and any of them may be hidden.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDetails {
    pub duration: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelItem {
    pub id: String,
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelStatistics {
    pub subscriber_count: Option<String>,
    pub video_count: Option<String>,
}

/// Parameters for one `videos.list?chart=mostPopular` call.
#[derive(Debug, Clone, Copy)]
pub struct TrendingPageRequest<'a> {
    pub region_code: &'a str,
    pub page_size: u32,
    pub page_token: Option<&'a str>,
}

/// The read surface the ingester needs. Implemented by [`YouTubeClient`] and
/// by in-memory fakes in tests.
pub trait VideoApi {
    fn video_categories(&self, region_code: &str) -> Result<CategoryListResponse>;
    fn most_popular(&self, request: TrendingPageRequest<'_>) -> Result<VideoListResponse>;
    fn channel(&self, channel_id: &str) -> Result<ChannelListResponse>;
}

pub struct YouTubeClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(&config.api_base_url, &config.api_key, config.timeout)
    }

    fn redact_key(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.api_key, "<redacted>")
        }
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(endpoint, ?query, "calling YouTube API");

        let mut request = self.agent.get(&url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        request = request.query("key", &self.api_key);

        match request.call() {
            Ok(response) => response
                .into_json::<T>()
                .with_context(|| format!("decoding {endpoint} response")),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!(
                    "{endpoint} returned HTTP {code}: {}",
                    self.redact_key(body.trim())
                )
            }
            // Transport's Display embeds the request URL, and with it the key.
            Err(ureq::Error::Transport(transport)) => {
                let detail = match transport.message() {
                    Some(message) => format!("{}: {message}", transport.kind()),
                    None => transport.kind().to_string(),
                };
                Err(anyhow!(
                    "{endpoint} request failed: {}",
                    self.redact_key(&detail)
                ))
            }
        }
    }
}

impl VideoApi for YouTubeClient {
    fn video_categories(&self, region_code: &str) -> Result<CategoryListResponse> {
        self.get_json(
            "videoCategories",
            &[("part", "snippet"), ("regionCode", region_code)],
        )
    }

    fn most_popular(&self, request: TrendingPageRequest<'_>) -> Result<VideoListResponse> {
        let page_size = request.page_size.to_string();
        let mut query = vec![
            ("part", "snippet,statistics,contentDetails"),
            ("chart", "mostPopular"),
            ("regionCode", request.region_code),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = request.page_token {
            query.push(("pageToken", token));
        }
        self.get_json("videos", &query)
    }

    fn channel(&self, channel_id: &str) -> Result<ChannelListResponse> {
        self.get_json("channels", &[("part", "statistics"), ("id", channel_id)])
    }
}
