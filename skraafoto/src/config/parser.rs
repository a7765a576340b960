//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory").and_then(non_empty) {
            config.cache.directory = expand_tilde(&v);
        }
    }

    // [crop] section
    if let Some(section) = ini.section(Some("crop")) {
        if let Some(v) = section.get("sizes") {
            let sizes = v
                .split(',')
                .map(|s| s.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| {
                    invalid("crop", "sizes", v, "expected comma-separated pixel sizes")
                })?;
            if sizes.is_empty() || sizes.contains(&0) {
                return Err(invalid("crop", "sizes", v, "sizes must be positive"));
            }
            config.crop.sizes = sizes;
        }
        if let Some(v) = section.get("quality") {
            let quality: u8 = parse_value("crop", "quality", v, "must be between 1 and 100")?;
            if !(1..=100).contains(&quality) {
                return Err(invalid("crop", "quality", v, "must be between 1 and 100"));
            }
            config.crop.quality = quality;
        }
        if let Some(v) = section.get("summary") {
            config.crop.summary = parse_bool("crop", "summary", v)?;
        }
        if let Some(v) = section.get("summary_size") {
            let size: u32 = parse_value("crop", "summary_size", v, "must be a positive integer")?;
            if size == 0 {
                return Err(invalid("crop", "summary_size", v, "must be a positive integer"));
            }
            config.crop.summary_size = size;
        }
    }

    // [concurrency] section
    if let Some(section) = ini.section(Some("concurrency")) {
        if let Some(v) = section.get("max_concurrent_requests") {
            let n: usize = parse_value(
                "concurrency",
                "max_concurrent_requests",
                v,
                "must be a positive integer",
            )?;
            if n == 0 {
                return Err(invalid(
                    "concurrency",
                    "max_concurrent_requests",
                    v,
                    "must be a positive integer",
                ));
            }
            config.concurrency.max_concurrent_requests = n;
        }
        if let Some(v) = section.get("limit_per_host") {
            let n: usize =
                parse_value("concurrency", "limit_per_host", v, "must be a positive integer")?;
            if n == 0 {
                return Err(invalid(
                    "concurrency",
                    "limit_per_host",
                    v,
                    "must be a positive integer",
                ));
            }
            config.concurrency.limit_per_host = n;
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(v) = section.get("limit") {
            let limit: u32 = parse_value("retry", "limit", v, "must be a positive integer")?;
            if limit == 0 {
                return Err(invalid("retry", "limit", v, "must be a positive integer"));
            }
            config.retry.limit = limit;
        }
        if let Some(v) = section.get("delay") {
            let secs: f64 = parse_value("retry", "delay", v, "must be a number of seconds")?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(invalid("retry", "delay", v, "must be a number of seconds"));
            }
            config.retry.delay = Duration::from_secs_f64(secs);
        }
        if let Some(v) = section.get("max_delay") {
            let secs: f64 =
                parse_value("retry", "max_delay", v, "must be a positive number of seconds")?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(invalid(
                    "retry",
                    "max_delay",
                    v,
                    "must be a positive number of seconds",
                ));
            }
            config.retry.max_delay = Some(Duration::from_secs_f64(secs));
        }
    }

    // [run] section
    if let Some(section) = ini.section(Some("run")) {
        if let Some(v) = section.get("collection").and_then(non_empty) {
            config.run.collection = v;
        }
        if let Some(v) = section.get("threshold") {
            let threshold: f64 =
                parse_value("run", "threshold", v, "must be a percentage between 0 and 100")?;
            if !(0.0..=100.0).contains(&threshold) {
                return Err(invalid(
                    "run",
                    "threshold",
                    v,
                    "must be a percentage between 0 and 100",
                ));
            }
            config.run.threshold = threshold;
        }
        if let Some(v) = section.get("recovery_file").and_then(non_empty) {
            config.run.recovery_file = expand_tilde(&v);
        }
        if let Some(v) = section.get("summary_file").and_then(non_empty) {
            config.run.summary_file = expand_tilde(&v);
        }
    }

    // [elevation] section
    if let Some(section) = ini.section(Some("elevation")) {
        if let Some(v) = section.get("zero_is_nodata") {
            config.elevation.zero_is_nodata = parse_bool("elevation", "zero_is_nodata", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("level").and_then(non_empty) {
            let level = v.to_lowercase();
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level.as_str()) {
                return Err(invalid(
                    "logging",
                    "level",
                    &v,
                    "must be one of: trace, debug, info, warn, error",
                ));
            }
            config.logging.level = level;
        }
        if let Some(v) = section.get("directory").and_then(non_empty) {
            config.logging.directory = expand_tilde(&v);
        }
        if let Some(v) = section.get("file").and_then(non_empty) {
            config.logging.file = v;
        }
    }

    // [api] section
    if let Some(section) = ini.section(Some("api")) {
        if let Some(v) = section.get("search_url").and_then(non_empty) {
            config.api.search_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = section.get("token") {
            config.api.token = non_empty(v);
        }
        if let Some(v) = section.get("elevation_url").and_then(non_empty) {
            config.api.elevation_url = v;
        }
        if let Some(v) = section.get("username") {
            config.api.username = non_empty(v);
        }
        if let Some(v) = section.get("password") {
            config.api.password = non_empty(v);
        }
    }

    Ok(config)
}

/// Overlay secrets from the environment.
///
/// `lookup` maps a variable name to its value; non-empty values win over the file.
pub(super) fn apply_env_overrides<F>(config: &mut ConfigFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(super::ENV_API_TOKEN).as_deref().and_then(non_empty) {
        config.api.token = Some(v);
    }
    if let Some(v) = lookup(super::ENV_DHM_USERNAME).as_deref().and_then(non_empty) {
        config.api.username = Some(v);
    }
    if let Some(v) = lookup(super::ENV_DHM_PASSWORD).as_deref().and_then(non_empty) {
        config.api.password = Some(v);
    }
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.crop.sizes, vec![256, 512, 1024]);
        assert_eq!(config.retry.limit, 3);
        assert!(config.crop.summary);
    }

    #[test]
    fn test_parse_all_sections() {
        let config = parse(
            r#"
[cache]
directory = /tmp/crops

[crop]
sizes = 128, 640
quality = 90
summary = false
summary_size = 200

[concurrency]
max_concurrent_requests = 4
limit_per_host = 2

[retry]
limit = 5
delay = 0.5

[run]
collection = skraafotos2021
threshold = 25
recovery_file = retry.txt

[elevation]
zero_is_nodata = false

[logging]
level = DEBUG
file = run.log

[api]
search_url = https://example.test/stac/
token = abc
username = user
password = secret
"#,
        )
        .unwrap();

        assert_eq!(config.cache.directory, PathBuf::from("/tmp/crops"));
        assert_eq!(config.crop.sizes, vec![128, 640]);
        assert_eq!(config.crop.quality, 90);
        assert!(!config.crop.summary);
        assert_eq!(config.crop.summary_size, 200);
        assert_eq!(config.concurrency.max_concurrent_requests, 4);
        assert_eq!(config.concurrency.limit_per_host, 2);
        assert_eq!(config.retry.limit, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(500));
        assert_eq!(config.run.collection, "skraafotos2021");
        assert_eq!(config.run.threshold, 25.0);
        assert_eq!(config.run.recovery_file, PathBuf::from("retry.txt"));
        assert!(!config.elevation.zero_is_nodata);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "run.log");
        assert_eq!(config.api.search_url, "https://example.test/stac");
        assert_eq!(config.api.token.as_deref(), Some("abc"));
        assert_eq!(config.api.username.as_deref(), Some("user"));
        assert_eq!(config.api.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_crop_sizes_names_section_and_key() {
        let err = parse("[crop]\nsizes = 256, big\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "crop");
                assert_eq!(key, "sizes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(parse("[crop]\nsizes = 0\n").is_err());
        assert!(parse("[concurrency]\nmax_concurrent_requests = 0\n").is_err());
        assert!(parse("[retry]\nlimit = 0\n").is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(parse("[crop]\nquality = 0\n").is_err());
        assert!(parse("[crop]\nquality = 101\n").is_err());
        assert!(parse("[run]\nthreshold = 150\n").is_err());
        assert!(parse("[retry]\ndelay = -1\n").is_err());
        assert!(parse("[retry]\nmax_delay = 0\n").is_err());
        assert!(parse("[logging]\nlevel = loud\n").is_err());
        assert!(parse("[elevation]\nzero_is_nodata = maybe\n").is_err());
    }

    #[test]
    fn test_retry_max_delay_optional() {
        assert!(parse("").unwrap().retry.max_delay.is_none());
        let config = parse("[retry]\nmax_delay = 30\n").unwrap();
        assert_eq!(config.retry.max_delay, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_blank_token_is_none() {
        let config = parse("[api]\ntoken = \n").unwrap();
        assert!(config.api.token.is_none());
    }

    #[test]
    fn test_env_overrides_secrets() {
        let mut config = parse("[api]\ntoken = from-file\n").unwrap();
        apply_env_overrides(&mut config, |key| match key {
            "SKRAAFOTO_API_TOKEN" => Some("from-env".to_string()),
            "SKRAAFOTO_DHM_USERNAME" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.api.token.as_deref(), Some("from-env"));
        assert!(config.api.username.is_none());
        assert!(config.api.password.is_none());
    }

    #[test]
    fn test_expand_tilde_plain_path() {
        assert_eq!(expand_tilde("cache"), PathBuf::from("cache"));
    }
}
