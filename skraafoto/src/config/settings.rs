//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! Defaults live next to the struct they belong to.

use std::path::PathBuf;
use std::time::Duration;

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "image_cache";
/// Default crop edge lengths in pixels.
pub const DEFAULT_CROP_SIZES: [u32; 3] = [256, 512, 1024];
/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
/// Default edge length of each crop in the summary composite.
pub const DEFAULT_SUMMARY_SIZE: u32 = 256;
/// Default number of coordinates processed at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
/// Default cap on open connections per remote host.
pub const DEFAULT_LIMIT_PER_HOST: usize = 5;
/// Default total attempt budget per remote call.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Default base delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Default failure-rate percentage that aborts the run.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 50.0;
/// Default image collection searched.
pub const DEFAULT_COLLECTION: &str = "skraafotos2023";
/// Default recovery file name.
pub const DEFAULT_RECOVERY_FILE: &str = "failed_coordinates.txt";
/// Default summary log file name.
pub const DEFAULT_SUMMARY_FILE: &str = "summary_log.log";
/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "detailed_log.log";
/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default catalogue base URL.
pub const DEFAULT_SEARCH_URL: &str = "https://api.dataforsyningen.dk/rest/skraafoto_api/v1.0";
/// Default terrain elevation endpoint.
pub const DEFAULT_ELEVATION_URL: &str = "https://services.datafordeler.dk/DHMTerraen/DHMKoter/1.0.0/GEOREST/HentKoter";

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Cache settings
    pub cache: CacheSettings,
    /// Crop and summary image settings
    pub crop: CropSettings,
    /// Concurrency limits
    pub concurrency: ConcurrencySettings,
    /// Retry budget and delay
    pub retry: RetrySettings,
    /// Run-level settings: collection, breaker threshold, output files
    pub run: RunSettings,
    /// Elevation validity rules
    pub elevation: ElevationSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// Remote API endpoints and credentials
    pub api: ApiSettings,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Root directory; one subdirectory per coordinate
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

/// Crop configuration.
#[derive(Debug, Clone)]
pub struct CropSettings {
    /// Crop edge lengths in pixels, in output index order
    pub sizes: Vec<u32>,
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Whether a summary composite is written per coordinate
    pub summary: bool,
    /// Edge length each crop is resized to in the summary
    pub summary_size: u32,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_CROP_SIZES.to_vec(),
            quality: DEFAULT_JPEG_QUALITY,
            summary: true,
            summary_size: DEFAULT_SUMMARY_SIZE,
        }
    }
}

/// Concurrency configuration.
#[derive(Debug, Clone)]
pub struct ConcurrencySettings {
    /// Coordinates in flight at once
    pub max_concurrent_requests: usize,
    /// Open connections per remote host
    pub limit_per_host: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            limit_per_host: DEFAULT_LIMIT_PER_HOST,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Total attempts per remote call, including the first
    pub limit: u32,
    /// Base delay; doubled on each retry
    pub delay: Duration,
    /// Optional cap on a single delay; uncapped when unset
    pub max_delay: Option<Duration>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            delay: DEFAULT_RETRY_DELAY,
            max_delay: None,
        }
    }
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Image collection id
    pub collection: String,
    /// Failure-rate percentage at which the run aborts
    pub threshold: f64,
    /// File receiving failed coordinates
    pub recovery_file: PathBuf,
    /// Human-readable run summary
    pub summary_file: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            threshold: DEFAULT_THRESHOLD_PERCENT,
            recovery_file: PathBuf::from(DEFAULT_RECOVERY_FILE),
            summary_file: PathBuf::from(DEFAULT_SUMMARY_FILE),
        }
    }
}

/// Elevation configuration.
#[derive(Debug, Clone)]
pub struct ElevationSettings {
    /// Treat an elevation of exactly 0.0 as missing data
    pub zero_is_nodata: bool,
}

impl Default for ElevationSettings {
    fn default() -> Self {
        Self {
            zero_is_nodata: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Filter directive, e.g. "info" or "skraafoto=debug"
    pub level: String,
    /// Directory for the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: PathBuf::from("."),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Remote API configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Catalogue base URL; `/search` is appended
    pub search_url: String,
    /// Catalogue access token
    pub token: Option<String>,
    /// Terrain elevation endpoint
    pub elevation_url: String,
    /// Elevation service user name
    pub username: Option<String>,
    /// Elevation service password
    pub password: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            token: None,
            elevation_url: DEFAULT_ELEVATION_URL.to_string(),
            username: None,
            password: None,
        }
    }
}
