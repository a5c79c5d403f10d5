//! Error handling facilities

use std::{fmt, iter, path::PathBuf};

use thiserror::Error;

use crate::service::thumbnails::ThumbnailMeta;

/// Formats an [`Error`][0] and its [`source`][1]s with a separator
///
/// [0]: std::error::Error
/// [1]: std::error::Error::source
pub(crate) struct DisplayWithSources<'a> {
    /// The error (and its sources) to write
    pub(crate) error: &'a dyn std::error::Error,

    /// Separator to write between the original error and subsequent sources
    pub(crate) infix: &'static str,
}

impl fmt::Display for DisplayWithSources<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();

        source
            .into_iter()
            .chain(iter::from_fn(|| {
                source = source.and_then(std::error::Error::source);
                source
            }))
            .try_for_each(|source| write!(f, "{}{source}", self.infix))
    }
}

/// Top-level errors
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Main {
    #[error(transparent)]
    Config(#[from] Config),

    #[error("failed to initialize observability")]
    Observability(#[from] Observability),

    #[error("failed to load or create the database")]
    Database(#[source] Database),

    #[error("command failed")]
    Command(#[source] Command),
}

/// Configuration errors
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Config {
    #[error("failed to find configuration file")]
    Search(#[from] ConfigSearch),

    #[error("failed to read configuration file {1:?}")]
    Read(#[source] std::io::Error, PathBuf),

    #[error("failed to parse configuration file {1:?}")]
    Parse(#[source] toml::de::Error, PathBuf),
}

/// Errors that can occur while searching for a config file
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum ConfigSearch {
    #[error("XDG Base Directory error")]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error("no relevant configuration files found in XDG Base Directories")]
    NotFound,
}

/// Observability initialization errors
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Observability {
    #[error("invalid log filter syntax")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install global default tracing subscriber")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Errors raised by the storage engine
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Database {
    #[cfg(feature = "sqlite")]
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create the database directory {1:?}")]
    CreateDirectory(#[source] std::io::Error, PathBuf),

    #[error("failed to (de)serialize a stored record")]
    Json(#[from] serde_json::Error),

    #[error("corrupt database: {0}")]
    Corrupt(&'static str),
}

/// Errors returned by the thumbnail repository
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Thumbnail {
    #[error("relative paths are not supported: {0:?}")]
    RelativePath(PathBuf),

    #[error("failed to read thumbnail file {1:?}")]
    ReadFile(#[source] std::io::Error, PathBuf),

    #[error("thumbnail store failure")]
    Store {
        /// The dashboard the failing operation was addressed to, if any
        dashboard_uid: Option<String>,
        #[source]
        source: Database,
    },

    #[error("no thumbnail found for {0}")]
    NotFound(ThumbnailMeta),
}

/// Errors returned by the dashboard registry
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Dashboard {
    #[error("dashboard UIDs must not be empty")]
    EmptyUid,

    #[error("no dashboard with UID {0:?}")]
    NotFound(String),

    #[error("dashboard store failure")]
    Store(#[from] Database),
}

/// Errors returned by dashboard search
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Search {
    #[error("search is disabled")]
    Disabled,

    #[error("dashboard store failure")]
    Store(#[from] Database),
}

/// Errors from running a command line subcommand
// Missing docs are allowed here since that kind of information should be
// encoded in the error messages themselves anyway.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub(crate) enum Command {
    #[error(transparent)]
    Thumbnail(#[from] Thumbnail),

    #[error(transparent)]
    Dashboard(#[from] Dashboard),

    #[error(transparent)]
    Search(#[from] Search),

    #[error("failed to resolve path {1:?}")]
    ResolvePath(#[source] std::io::Error, PathBuf),

    #[error("failed to write image to {1:?}")]
    WriteImage(#[source] std::io::Error, PathBuf),

    #[error("failed to serialize command output")]
    Output(#[from] serde_json::Error),
}
