//! Integration with `clap`

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::service::thumbnails::{Theme, ThumbnailKind, ThumbnailState};

/// Command line arguments
#[derive(Parser)]
#[clap(about, version = crate::version())]
pub(crate) struct Args {
    /// Path to the configuration file
    ///
    /// When omitted, `dashthumbs/config.toml` is searched for in the XDG
    /// configuration directories.
    #[clap(long, short, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Treat the dashboard search index as unavailable
    ///
    /// Searches fail, and thumbnails without recorded datasources are
    /// reported as stale.
    #[clap(long, global = true)]
    pub(crate) without_search: bool,

    #[clap(subcommand)]
    pub(crate) command: Command,
}

/// Address of a thumbnail
#[derive(ClapArgs, Debug)]
pub(crate) struct ThumbnailTarget {
    /// UID of the dashboard the thumbnail belongs to
    #[clap(long)]
    pub(crate) dashboard: String,

    #[clap(long, default_value_t = Theme::Dark)]
    pub(crate) theme: Theme,

    #[clap(long, default_value_t = ThumbnailKind::Thumb)]
    pub(crate) kind: ThumbnailKind,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Store a rendered image as a dashboard's thumbnail
    Upload {
        #[clap(flatten)]
        target: ThumbnailTarget,

        /// Version of the dashboard the image was rendered from
        #[clap(
            long,
            allow_negative_numbers = true,
            required_unless_present = "manual",
            conflicts_with = "manual"
        )]
        version: Option<i64>,

        /// Record the image as uploaded by a user, exempt from refreshes
        #[clap(long)]
        manual: bool,

        /// UID of a datasource used by the dashboard, may be repeated
        #[clap(long = "datasource")]
        datasources: Vec<String>,

        /// Image file; `.webp` files are stored as WebP, anything else as PNG
        file: PathBuf,
    },

    /// Print a thumbnail's metadata
    Get {
        #[clap(flatten)]
        target: ThumbnailTarget,

        /// Also write the image to this file
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Change a thumbnail's state without touching its image
    SetState {
        #[clap(flatten)]
        target: ThumbnailTarget,

        state: ThumbnailState,
    },

    /// List dashboards whose thumbnail is missing or outdated
    Stale {
        #[clap(long, default_value_t = Theme::Dark)]
        theme: Theme,

        #[clap(long, default_value_t = ThumbnailKind::Thumb)]
        kind: ThumbnailKind,
    },

    /// Print whether any thumbnail has been stored
    Exists,

    /// Register a dashboard or record a new version of it
    Dashboard {
        #[clap(long)]
        uid: String,

        #[clap(long)]
        title: String,

        #[clap(long)]
        version: i64,

        /// May be repeated
        #[clap(long = "tag")]
        tags: Vec<String>,

        /// Register a folder instead of a dashboard
        #[clap(long)]
        folder: bool,
    },

    /// Star a dashboard on behalf of a user
    Star {
        #[clap(long)]
        user: String,

        #[clap(long)]
        dashboard: String,
    },

    /// Remove a user's star from a dashboard
    Unstar {
        #[clap(long)]
        user: String,

        #[clap(long)]
        dashboard: String,
    },

    /// Search registered dashboards
    Search {
        /// Case-insensitive substring of the title
        #[clap(long, default_value = "")]
        title: String,

        #[clap(long)]
        tag: Option<String>,

        /// User whose stars are reported
        #[clap(long)]
        user: Option<String>,

        /// Only return dashboards starred by `--user`
        #[clap(long, requires = "user")]
        starred: bool,

        /// Maximum number of hits, 0 for the configured default
        #[clap(long, default_value_t = 0)]
        limit: usize,
    },

    /// Print the tag cloud of all dashboards
    Tags {
        /// Maximum number of tags, 0 for all of them
        #[clap(long, default_value_t = 0)]
        limit: usize,
    },
}

/// Parse command line arguments into structured data
pub(crate) fn parse() -> Args {
    Args::parse()
}
