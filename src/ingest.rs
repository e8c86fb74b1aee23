#![forbid(unsafe_code)]

//! The ingestion pass: walk the trending chart page by page, enrich every
//! item with its channel's statistics and hand each finished row to a sink.
//!
//! Failures stay local. An item with a bad duration or publish time is
//! skipped before its channel is looked up. A bad channel lookup zeroes that
//! row's channel counts, a failed insert skips the row, and a failed page
//! fetch ends the pass because there is no token to continue from.

use anyhow::{Result, anyhow};
use tracing::{error, info, warn};

use crate::categories::CategoryMap;
use crate::record::{ChannelStats, ItemTiming, VideoRecord, parse_count};
use crate::store::RecordSink;
use crate::youtube::{TrendingPageRequest, VideoApi};

/// Knobs for one pass. Mirrors the relevant part of
/// [`IngestConfig`](crate::config::IngestConfig).
#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub region_code: String,
    pub page_size: u32,
    pub target_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    PagesExhausted,
    PageFetchFailed,
}

/// Summary of what one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub pages_fetched: u32,
    pub stored: u32,
    pub skipped_items: u32,
    pub channel_lookup_failures: u32,
    pub insert_failures: u32,
    pub stop_reason: StopReason,
}

/// Looks up subscriber and upload counts for one channel. An empty result is
/// treated as a failure so the caller can log it.
pub fn fetch_channel_stats(api: &impl VideoApi, channel_id: &str) -> Result<ChannelStats> {
    let response = api.channel(channel_id)?;
    let channel = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("channel {channel_id} not found"))?;
    Ok(ChannelStats {
        subscriber_count: parse_count(channel.statistics.subscriber_count.as_deref()),
        video_count: parse_count(channel.statistics.video_count.as_deref()),
    })
}

/// Runs one pass until `plan.target_count` rows are stored or the chart runs
/// out of pages.
pub async fn ingest_trending(
    api: &impl VideoApi,
    sink: &impl RecordSink,
    categories: &CategoryMap,
    plan: &IngestPlan,
) -> IngestReport {
    let mut report = IngestReport {
        pages_fetched: 0,
        stored: 0,
        skipped_items: 0,
        channel_lookup_failures: 0,
        insert_failures: 0,
        stop_reason: StopReason::PagesExhausted,
    };
    let mut page_token: Option<String> = None;

    loop {
        if report.stored >= plan.target_count {
            report.stop_reason = StopReason::TargetReached;
            break;
        }

        info!(
            page_token = page_token.as_deref().unwrap_or("<first>"),
            stored = report.stored,
            "fetching trending page"
        );
        let page = match api.most_popular(TrendingPageRequest {
            region_code: &plan.region_code,
            page_size: plan.page_size,
            page_token: page_token.as_deref(),
        }) {
            Ok(page) => page,
            Err(err) => {
                error!("error fetching trending page: {err:#}");
                report.stop_reason = StopReason::PageFetchFailed;
                break;
            }
        };
        report.pages_fetched += 1;

        for item in &page.items {
            if report.stored >= plan.target_count {
                break;
            }

            let timing = match ItemTiming::parse(item) {
                Ok(timing) => timing,
                Err(err) => {
                    warn!("skipping item: {err:#}");
                    report.skipped_items += 1;
                    continue;
                }
            };

            let channel = match fetch_channel_stats(api, &item.snippet.channel_id) {
                Ok(stats) => stats,
                Err(err) => {
                    warn!(
                        channel_id = %item.snippet.channel_id,
                        "error fetching channel data: {err:#}"
                    );
                    report.channel_lookup_failures += 1;
                    ChannelStats::default()
                }
            };

            let record = VideoRecord::from_item(item, categories, timing, channel);

            match sink.insert(&record).await {
                Ok(()) => {
                    report.stored += 1;
                    info!(
                        number = report.stored,
                        video_length = %record.video_length,
                        "stored video {:?}",
                        record.title
                    );
                }
                Err(err) => {
                    error!("database insertion error: {err:#}");
                    report.insert_failures += 1;
                }
            }
        }

        info!(next_page_token = ?page.next_page_token, "page done");
        match page.next_page_token {
            Some(token) if report.stored < plan.target_count => page_token = Some(token),
            _ => {
                report.stop_reason = if report.stored >= plan.target_count {
                    StopReason::TargetReached
                } else {
                    StopReason::PagesExhausted
                };
                break;
            }
        }
    }

    report
}
