use std::{
    borrow::Cow,
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use once_cell::sync::Lazy;
use serde::{de, Deserialize, Deserializer};
use tracing_subscriber::EnvFilter;

use crate::error;

/// The default configuration file path
pub(crate) static DEFAULT_PATH: Lazy<PathBuf> =
    Lazy::new(|| [env!("CARGO_PKG_NAME"), "config.toml"].iter().collect());

#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    pub(crate) database: DatabaseConfig,
    #[serde(default)]
    pub(crate) search: SearchConfig,
    #[serde(default)]
    pub(crate) observability: ObservabilityConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DatabaseBackend {
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            #[cfg(feature = "sqlite")]
            DatabaseBackend::Sqlite => write!(f, "SQLite"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct DatabaseConfig {
    pub(crate) backend: DatabaseBackend,
    pub(crate) path: PathBuf,
    #[serde(default = "default_db_cache_capacity_mb")]
    pub(crate) cache_capacity_mb: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct SearchConfig {
    /// Whether the dashboard search index is available
    ///
    /// While disabled, recorded datasource sets can't be trusted, so
    /// thumbnails without any datasources are treated as stale.
    pub(crate) enable: bool,

    /// Number of hits returned when a query doesn't specify a limit
    pub(crate) default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable: true,
            default_limit: 1000,
        }
    }
}

#[derive(Copy, Clone, Default, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormat {
    /// Use the [`tracing_subscriber::fmt::format::Pretty`] formatter
    Pretty,
    /// Use the [`tracing_subscriber::fmt::format::Full`] formatter
    #[default]
    Full,
    /// Use the [`tracing_subscriber::fmt::format::Compact`] formatter
    Compact,
    /// Use the [`tracing_subscriber::fmt::format::Json`] formatter
    Json,
}

/// An [`EnvFilter`] directive string that is known to parse
///
/// [`EnvFilter`] doesn't implement [`Clone`], so the validated source text is
/// kept around and turned into a filter when the subscriber is built.
#[derive(Clone, Debug)]
pub(crate) struct LogFilter(String);

impl FromStr for LogFilter {
    type Err = <EnvFilter as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnvFilter::from_str(s)?;
        Ok(Self(s.to_owned()))
    }
}

impl From<&LogFilter> for EnvFilter {
    fn from(other: &LogFilter) -> Self {
        EnvFilter::from_str(&other.0)
            .expect("log filter syntax should have been validated already")
    }
}

impl<'de> Deserialize<'de> for LogFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct LogConfig {
    pub(crate) filter: LogFilter,
    pub(crate) colors: bool,
    pub(crate) format: LogFormat,
    pub(crate) timestamp: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            colors: true,
            format: LogFormat::default(),
            timestamp: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ObservabilityConfig {
    /// Logging to stderr
    pub(crate) logs: LogConfig,
}

fn default_db_cache_capacity_mb() -> f64 {
    300.0
}

fn default_log_filter() -> LogFilter {
    "info".parse().expect("hardcoded log filter should be valid")
}

/// Search default locations for a configuration file
///
/// If one isn't found, the list of tried paths is returned.
fn search() -> Result<PathBuf, error::ConfigSearch> {
    use error::ConfigSearch as Error;

    xdg::BaseDirectories::new()?
        .find_config_file(&*DEFAULT_PATH)
        .ok_or(Error::NotFound)
}

/// Load the configuration from the given path or XDG Base Directories
pub(crate) async fn load<P>(path: Option<P>) -> Result<Config, error::Config>
where
    P: AsRef<Path>,
{
    use error::Config as Error;

    let path = match path.as_ref().map(AsRef::as_ref) {
        Some(x) => Cow::Borrowed(x),
        None => Cow::Owned(search()?),
    };

    let path = path.as_ref();

    toml::from_str(
        &tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Read(e, path.to_owned()))?,
    )
    .map_err(|e| Error::Parse(e, path.to_owned()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{load, Config, DatabaseBackend, LogFormat};

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            backend = "sqlite"
            path = "/var/lib/dashthumbs"
            "#,
        )
        .expect("minimal config should parse");

        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.path, Path::new("/var/lib/dashthumbs"));
        assert!(config.search.enable, "search is enabled by default");
        assert_eq!(config.search.default_limit, 1000);
        assert_eq!(config.observability.logs.format, LogFormat::Full);
    }

    #[test]
    fn invalid_log_filter_is_rejected() {
        let result = toml::from_str::<Config>(
            r#"
            [database]
            backend = "sqlite"
            path = "/tmp/db"

            [observability.logs]
            filter = "dashthumbs=loud"
            "#,
        );

        assert!(result.is_err(), "bad filter syntax should fail to parse");
    }

    #[tokio::test]
    async fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let path = dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
            [database]
            backend = "sqlite"
            path = "/tmp/db"

            [search]
            enable = false

            [observability.logs]
            format = "json"
            "#,
        )
        .await
        .expect("should write config");

        let config = load(Some(&path)).await.expect("config should load");

        assert!(!config.search.enable, "search was disabled explicitly");
        assert_eq!(config.observability.logs.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let missing = dir.path().join("nope.toml");

        let error = load(Some(&missing)).await.expect_err("file is missing");

        assert!(
            matches!(&error, crate::error::Config::Read(_, p) if *p == missing),
            "unexpected error: {error:?}"
        );
    }
}
