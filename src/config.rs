#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_REGION: &str = "VN";
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_TARGET_COUNT: u32 = 200;
pub const DEFAULT_DB_PATH: &str = "trending.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound the Data API accepts for `maxResults`.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Everything a single ingestion pass needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub region_code: String,
    pub page_size: u32,
    pub target_count: u32,
    pub db_path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub region_code: Option<String>,
    pub page_size: Option<u32>,
    pub target_count: Option<u32>,
    pub db_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub env_path: Option<PathBuf>,
}

/// Merges CLI overrides, process environment and the `.env` file, in that
/// order of precedence, on top of the compiled-in defaults.
pub fn resolve_ingest_config(overrides: ConfigOverrides) -> Result<IngestConfig> {
    resolve_ingest_config_with_env(overrides, env_var_string)
}

/// Same as [`resolve_ingest_config`] with the process environment replaced by
/// `env_lookup`.
pub fn resolve_ingest_config_with_env(
    overrides: ConfigOverrides,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<IngestConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_ingest_config(&file_vars, env_lookup, overrides)
}

fn build_ingest_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<IngestConfig> {
    let api_key = non_blank(overrides.api_key)
        .or_else(|| lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set"))?;
    let api_base_url = non_blank(overrides.api_base_url)
        .or_else(|| lookup_value("YOUTUBE_API_BASE_URL", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string();
    let region_code = non_blank(overrides.region_code)
        .or_else(|| lookup_value("YOUTUBE_REGION", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
        .to_ascii_uppercase();
    let page_size = match overrides.page_size {
        Some(value) => value,
        None => lookup_parsed("YOUTUBE_PAGE_SIZE", file_vars, &env_lookup)?
            .unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let target_count = match overrides.target_count {
        Some(value) => value,
        None => lookup_parsed("YOUTUBE_TARGET_COUNT", file_vars, &env_lookup)?
            .unwrap_or(DEFAULT_TARGET_COUNT),
    };
    let db_path = overrides
        .db_path
        .or_else(|| lookup_value("TRENDING_DB_PATH", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let timeout_secs = match overrides.timeout_secs {
        Some(value) => value,
        None => lookup_parsed("YOUTUBE_TIMEOUT_SECS", file_vars, &env_lookup)?
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        bail!("page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}");
    }
    if target_count == 0 {
        bail!("target count must be greater than zero");
    }
    if timeout_secs == 0 {
        bail!("HTTP timeout must be at least one second");
    }

    Ok(IngestConfig {
        api_key,
        api_base_url,
        region_code,
        page_size,
        target_count,
        db_path,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

fn lookup_parsed<T>(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup_value(key, file_vars, env_lookup)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {raw:?}"))
        })
        .transpose()
}

/// Reads `KEY=value` pairs from a dotenv file. These sit below the process
/// environment and CLI overrides; a missing file yields no settings.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> Result<IngestConfig> {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path())?;
        build_ingest_config(&vars, |_| None, ConfigOverrides::default())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = config_from("YOUTUBE_API_KEY=\"abc\"\n").unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.region_code, DEFAULT_REGION);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.target_count, DEFAULT_TARGET_COUNT);
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = config_from("YOUTUBE_REGION=US\n").unwrap_err();
        assert!(err.to_string().contains("YOUTUBE_API_KEY"));
    }

    #[test]
    fn reads_every_setting_from_file() {
        let config = config_from(
            "YOUTUBE_API_KEY=k\nYOUTUBE_REGION=us\nYOUTUBE_PAGE_SIZE=25\nYOUTUBE_TARGET_COUNT=75\n\
             TRENDING_DB_PATH=/tmp/x.db\nYOUTUBE_API_BASE_URL=http://localhost:9000/v3/\n\
             YOUTUBE_TIMEOUT_SECS=5\n",
        )
        .unwrap();
        assert_eq!(config.region_code, "US");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.target_count, 75);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.api_base_url, "http://localhost:9000/v3");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn env_wins_over_file_and_overrides_win_over_env() {
        let vars = read_env_file(
            make_config("YOUTUBE_API_KEY=file\nYOUTUBE_REGION=DE\nYOUTUBE_PAGE_SIZE=10\n").path(),
        )
        .unwrap();
        let config = build_ingest_config(
            &vars,
            |key| match key {
                "YOUTUBE_API_KEY" => Some("env".to_string()),
                "YOUTUBE_REGION" => Some("FR".to_string()),
                _ => None,
            },
            ConfigOverrides {
                region_code: Some("jp".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.api_key, "env");
        assert_eq!(config.region_code, "JP");
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn blank_override_falls_back_to_file() {
        let vars = read_env_file(make_config("YOUTUBE_API_KEY=file\n").path()).unwrap();
        let config = build_ingest_config(
            &vars,
            |_| None,
            ConfigOverrides {
                api_key: Some("   ".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.api_key, "file");
    }

    #[test]
    fn rejects_page_size_above_api_limit() {
        let err = config_from("YOUTUBE_API_KEY=k\nYOUTUBE_PAGE_SIZE=51\n").unwrap_err();
        assert!(err.to_string().contains("page size"));
    }

    #[test]
    fn rejects_zero_target() {
        let err = config_from("YOUTUBE_API_KEY=k\nYOUTUBE_TARGET_COUNT=0\n").unwrap_err();
        assert!(err.to_string().contains("target count"));
    }

    #[test]
    fn rejects_unparsable_number() {
        let err = config_from("YOUTUBE_API_KEY=k\nYOUTUBE_TARGET_COUNT=lots\n").unwrap_err();
        assert!(err.to_string().contains("YOUTUBE_TARGET_COUNT"));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export YOUTUBE_API_KEY="secret"
            YOUTUBE_REGION='GB'
            TRENDING_DB_PATH =  "/data/trending.db"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("YOUTUBE_API_KEY").unwrap(), "secret");
        assert_eq!(vars.get("YOUTUBE_REGION").unwrap(), "GB");
        assert_eq!(vars.get("TRENDING_DB_PATH").unwrap(), "/data/trending.db");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn absent_env_file_leaves_only_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_ingest_config_with_env(
            ConfigOverrides {
                api_key: Some("cli-key".into()),
                env_path: Some(dir.path().join("missing.env")),
                ..ConfigOverrides::default()
            },
            |_| None,
        )
        .unwrap();
        assert_eq!(config.api_key, "cli-key");
        assert_eq!(config.region_code, DEFAULT_REGION);
        assert_eq!(config.target_count, DEFAULT_TARGET_COUNT);
    }
}
