#![forbid(unsafe_code)]

//! Fetches the YouTube trending chart for one region, enriches every video
//! with its channel's statistics and appends the rows to `youtube_videos`.

pub mod categories;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod record;
pub mod store;
pub mod youtube;
