#![forbid(unsafe_code)]

//! Row model for the `youtube_videos` table and the pure helpers that turn a
//! trending-chart item into one.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::Serialize;

use crate::categories::CategoryMap;
use crate::youtube::VideoItem;

/// Strict publish timestamp layout used by the Data API.
pub const PUBLISHED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One row in `youtube_videos`. Counts are never null; anything the API hides
/// is stored as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    pub title: String,
    pub category_name: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub published_at: String,
    pub thumbnail_url: String,
    pub tags: String,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub is_weekend: bool,
    pub video_length: String,
}

/// Subscriber and upload counts of the channel that owns a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscriber_count: i64,
    pub video_count: i64,
}

/// The parts of an item that can be rejected, checked before any channel
/// lookup is spent on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTiming {
    pub length_seconds: u64,
    pub is_weekend: bool,
}

impl ItemTiming {
    pub fn parse(item: &VideoItem) -> Result<Self> {
        let length_seconds = parse_iso8601_duration(&item.content_details.duration)
            .with_context(|| format!("video {} has a bad duration", item.id))?;
        let published = parse_published_at(&item.snippet.published_at)
            .with_context(|| format!("video {} has a bad publish time", item.id))?;
        Ok(Self {
            length_seconds,
            is_weekend: is_weekend(&published),
        })
    }
}

impl VideoRecord {
    /// Builds a row from a chart item whose timing already parsed.
    pub fn from_item(
        item: &VideoItem,
        categories: &CategoryMap,
        timing: ItemTiming,
        channel: ChannelStats,
    ) -> Self {
        let snippet = &item.snippet;
        Self {
            title: snippet.title.clone(),
            category_name: categories.name_for(&snippet.category_id).to_string(),
            view_count: parse_count(item.statistics.view_count.as_deref()),
            like_count: parse_count(item.statistics.like_count.as_deref()),
            comment_count: parse_count(item.statistics.comment_count.as_deref()),
            published_at: snippet.published_at.clone(),
            thumbnail_url: snippet.thumbnails.best_url().unwrap_or_default().to_string(),
            tags: snippet.tags.join(","),
            subscriber_count: channel.subscriber_count,
            video_count: channel.video_count,
            is_weekend: timing.is_weekend,
            video_length: format_hms(timing.length_seconds),
        }
    }
}

/// Parses API counters, which are decimal strings. Missing or garbled values
/// count as zero.
pub fn parse_count(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Converts an ISO 8601 duration such as `PT2H8M11S` or `P1DT30M` into whole
/// seconds.
///
/// Weeks and days are accepted; years and months are rejected because their
/// length depends on the calendar. Fractional seconds are truncated.
pub fn parse_iso8601_duration(raw: &str) -> Result<u64> {
    let text = raw.trim();
    let Some(body) = text.strip_prefix('P') else {
        bail!("duration {raw:?} does not start with 'P'");
    };
    if body.is_empty() || body == "T" {
        bail!("duration {raw:?} has no components");
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' | '.' | ',' => number.push(ch),
            'T' => {
                if in_time || !number.is_empty() {
                    bail!("duration {raw:?} has a misplaced 'T'");
                }
                in_time = true;
            }
            unit => {
                if number.is_empty() {
                    bail!("duration {raw:?} has '{unit}' without a value");
                }
                let multiplier = match (in_time, unit) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    (false, 'Y') | (false, 'M') => {
                        bail!("duration {raw:?} uses calendar units")
                    }
                    _ => bail!("duration {raw:?} has unexpected designator '{unit}'"),
                };
                let value = if unit == 'S' {
                    let whole = match number.split(['.', ',']).next() {
                        Some(whole) if !whole.is_empty() => whole,
                        _ => "0",
                    };
                    whole
                        .parse::<u64>()
                        .with_context(|| format!("duration {raw:?} has a bad seconds value"))?
                } else {
                    number
                        .parse::<u64>()
                        .with_context(|| format!("duration {raw:?} has a bad '{unit}' value"))?
                };
                total = value
                    .checked_mul(multiplier)
                    .and_then(|part| total.checked_add(part))
                    .with_context(|| format!("duration {raw:?} overflows"))?;
                number.clear();
                saw_component = true;
            }
        }
    }

    if !number.is_empty() {
        bail!("duration {raw:?} ends with a dangling number");
    }
    if !saw_component {
        bail!("duration {raw:?} has no components");
    }
    Ok(total)
}

/// Formats seconds as `H:MM:SS`. Hours are not padded and are not wrapped
/// into days.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

pub fn parse_published_at(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, PUBLISHED_AT_FORMAT)
        .with_context(|| format!("publish time {raw:?} is not in {PUBLISHED_AT_FORMAT} form"))
}

pub fn is_weekend(datetime: &NaiveDateTime) -> bool {
    matches!(datetime.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn sample_item() -> VideoItem {
        serde_json::from_value(json!({
            "id": "vid1",
            "snippet": {
                "title": "Trending clip",
                "categoryId": "10",
                "channelId": "UC123",
                "publishedAt": "2024-01-06T12:00:00Z",
                "tags": ["music", "live"],
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/default.jpg"},
                    "high": {"url": "https://i.ytimg.com/hq.jpg"}
                }
            },
            "statistics": {"viewCount": "1000", "likeCount": "50", "commentCount": "7"},
            "contentDetails": {"duration": "PT2H8M11S"}
        }))
        .unwrap()
    }

    fn music_categories() -> CategoryMap {
        CategoryMap::from(HashMap::from([("10".to_string(), "Music".to_string())]))
    }

    #[test]
    fn formats_hours_without_padding() {
        assert_eq!(format_hms(parse_iso8601_duration("PT2H8M11S").unwrap()), "2:08:11");
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(59), "0:00:59");
        assert_eq!(format_hms(3_600), "1:00:00");
        assert_eq!(format_hms(90_000), "25:00:00");
    }

    #[test]
    fn parses_common_youtube_durations() {
        assert_eq!(parse_iso8601_duration("PT4M13S").unwrap(), 253);
        assert_eq!(parse_iso8601_duration("PT45S").unwrap(), 45);
        assert_eq!(parse_iso8601_duration("PT1H").unwrap(), 3_600);
        assert_eq!(parse_iso8601_duration("P0D").unwrap(), 0);
        assert_eq!(parse_iso8601_duration("P1DT2H").unwrap(), 93_600);
        assert_eq!(parse_iso8601_duration("P1W").unwrap(), 604_800);
        assert_eq!(parse_iso8601_duration("PT1M30.75S").unwrap(), 90);
    }

    #[test]
    fn rejects_malformed_durations() {
        for raw in ["", "PT", "P", "2H", "PT5", "PTM", "P1Y", "P2M", "PT1X", "P1H"] {
            assert!(parse_iso8601_duration(raw).is_err(), "{raw:?} should fail");
        }
    }

    #[test]
    fn weekend_flag_follows_weekday() {
        let saturday = parse_published_at("2024-01-06T12:00:00Z").unwrap();
        let sunday = parse_published_at("2024-01-07T23:59:59Z").unwrap();
        let monday = parse_published_at("2024-01-08T12:00:00Z").unwrap();
        let friday = parse_published_at("2024-01-05T00:00:00Z").unwrap();
        assert!(is_weekend(&saturday));
        assert!(is_weekend(&sunday));
        assert!(!is_weekend(&monday));
        assert!(!is_weekend(&friday));
    }

    #[test]
    fn publish_time_parsing_is_strict() {
        assert!(parse_published_at("2024-01-06T12:00:00.123Z").is_err());
        assert!(parse_published_at("2024-01-06T12:00:00+00:00").is_err());
        assert!(parse_published_at("2024-01-06").is_err());
    }

    #[test]
    fn counts_default_to_zero() {
        assert_eq!(parse_count(None), 0);
        assert_eq!(parse_count(Some("")), 0);
        assert_eq!(parse_count(Some("n/a")), 0);
        assert_eq!(parse_count(Some(" 42 ")), 42);
    }

    #[test]
    fn builds_full_record() {
        let channel = ChannelStats {
            subscriber_count: 9_000,
            video_count: 120,
        };
        let item = sample_item();
        let timing = ItemTiming::parse(&item).unwrap();
        let record = VideoRecord::from_item(&item, &music_categories(), timing, channel);
        assert_eq!(
            record,
            VideoRecord {
                title: "Trending clip".into(),
                category_name: "Music".into(),
                view_count: 1_000,
                like_count: 50,
                comment_count: 7,
                published_at: "2024-01-06T12:00:00Z".into(),
                thumbnail_url: "https://i.ytimg.com/hq.jpg".into(),
                tags: "music,live".into(),
                subscriber_count: 9_000,
                video_count: 120,
                is_weekend: true,
                video_length: "2:08:11".into(),
            }
        );
    }

    #[test]
    fn missing_statistics_and_unknown_category_use_defaults() {
        let mut item = sample_item();
        item.statistics = Default::default();
        item.snippet.category_id = "999".into();
        item.snippet.tags.clear();
        let timing = ItemTiming::parse(&item).unwrap();
        let record =
            VideoRecord::from_item(&item, &music_categories(), timing, ChannelStats::default());
        assert_eq!(record.category_name, "Unknown");
        assert_eq!(record.view_count, 0);
        assert_eq!(record.like_count, 0);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.subscriber_count, 0);
        assert_eq!(record.video_count, 0);
        assert_eq!(record.tags, "");
    }

    #[test]
    fn bad_duration_names_the_video() {
        let mut item = sample_item();
        item.content_details.duration = "soon".into();
        let err = ItemTiming::parse(&item).unwrap_err();
        assert!(err.to_string().contains("vid1"));
    }

    #[test]
    fn bad_publish_time_is_rejected_before_building() {
        let mut item = sample_item();
        item.snippet.published_at = "2024-01-06 12:00".into();
        let err = ItemTiming::parse(&item).unwrap_err();
        assert!(err.to_string().contains("bad publish time"));
    }

    #[test]
    fn timing_carries_length_and_weekend() {
        let timing = ItemTiming::parse(&sample_item()).unwrap();
        assert_eq!(
            timing,
            ItemTiming {
                length_seconds: 7_691,
                is_weekend: true,
            }
        );
    }
}
