#![forbid(unsafe_code)]

use std::collections::HashMap;

use tracing::{error, info};

use crate::youtube::VideoApi;

pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Category id to display title, resolved once per run.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    names: HashMap<String, String>,
}

impl CategoryMap {
    pub fn name_for(&self, category_id: &str) -> &str {
        self.names
            .get(category_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<HashMap<String, String>> for CategoryMap {
    fn from(names: HashMap<String, String>) -> Self {
        Self { names }
    }
}

/// Fetches the region's category list. A failed call is logged and yields an
/// empty map, so every later lookup falls back to [`UNKNOWN_CATEGORY`].
pub fn resolve_categories(api: &impl VideoApi, region_code: &str) -> CategoryMap {
    match api.video_categories(region_code) {
        Ok(response) => {
            let names: HashMap<String, String> = response
                .items
                .into_iter()
                .filter(|item| !item.id.is_empty())
                .map(|item| (item.id, item.snippet.title))
                .collect();
            info!(region = region_code, count = names.len(), "resolved video categories");
            CategoryMap::from(names)
        }
        Err(err) => {
            error!(region = region_code, "error fetching video categories: {err:#}");
            CategoryMap::default()
        }
    }
}
