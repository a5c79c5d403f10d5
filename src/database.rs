//! Persistent storage for thumbnails and the dashboard registry

pub(crate) mod abstraction;
mod key_value;

use std::{fs, sync::Arc};

use abstraction::{KeyValueDatabaseEngine, KvTree};
use tracing::info;

use crate::{
    config::{DatabaseBackend, DatabaseConfig},
    error, utils,
};

type Result<T, E = error::Database> = std::result::Result<T, E>;

/// Key under which the identifier counter lives in the `global` tree
const COUNTER: &[u8] = b"c";

pub(crate) struct KeyValueDatabase {
    db: Arc<dyn KeyValueDatabaseEngine>,

    pub(super) global: Arc<dyn KvTree>,

    /// `DashboardUid + Theme + Kind` -> `ThumbnailId`
    pub(super) addr_thumbnailid: Arc<dyn KvTree>,
    /// `ThumbnailId` -> `json(Thumbnail) + 0xFF + Image`
    pub(super) thumbnailid_thumbnail: Arc<dyn KvTree>,

    /// `DashboardUid` -> `json(Dashboard)`
    pub(super) dashboarduid_dashboard: Arc<dyn KvTree>,
    /// `UserId + DashboardUid` -> ()
    pub(super) userid_dashboarduid_star: Arc<dyn KvTree>,

    /// Serializes thumbnail writes so that looking up or allocating an
    /// identifier and writing the record happen together
    pub(super) thumbnail_write_lock: std::sync::Mutex<()>,
}

impl KeyValueDatabase {
    /// Load an existing database or create a new one.
    pub(crate) fn load_or_create(config: &DatabaseConfig) -> Result<Self> {
        fs::create_dir_all(&config.path).map_err(|e| {
            error::Database::CreateDirectory(e, config.path.clone())
        })?;

        let builder: Arc<dyn KeyValueDatabaseEngine> = match config.backend {
            #[cfg(feature = "sqlite")]
            DatabaseBackend::Sqlite => {
                Arc::new(Arc::<abstraction::sqlite::Engine>::open(config)?)
            }
        };

        let db = Self {
            global: builder.open_tree("global")?,
            addr_thumbnailid: builder.open_tree("addr_thumbnailid")?,
            thumbnailid_thumbnail: builder.open_tree("thumbnailid_thumbnail")?,
            dashboarduid_dashboard: builder
                .open_tree("dashboarduid_dashboard")?,
            userid_dashboarduid_star: builder
                .open_tree("userid_dashboarduid_star")?,
            thumbnail_write_lock: std::sync::Mutex::new(()),
            db: builder,
        };

        info!(
            backend = %config.backend,
            path = %config.path.display(),
            "Loaded database",
        );

        Ok(db)
    }

    /// Hands out the next identifier, starting at 1
    pub(super) fn next_count(&self) -> Result<u64> {
        utils::u64_from_bytes(&self.global.increment(COUNTER)?)
            .map_err(|_| error::Database::Corrupt("invalid counter in global"))
    }

    /// Makes sure everything written so far is durable
    pub(crate) fn flush(&self) -> Result<()> {
        self.db.flush()
    }
}
