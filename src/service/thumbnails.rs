use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, error};

use super::search::IndexStatus;
use crate::{error, utils};

mod data;

pub(crate) use data::Data;

type Result<T, E = error::Thumbnail> = std::result::Result<T, E>;

/// Dashboard version recorded for images uploaded by a user
///
/// Saving with this version records the thumbnail as
/// [`ThumbnailState::ManuallyUploaded`].
pub(crate) const MANUAL_UPLOAD_DASHBOARD_VERSION: i64 = -1;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Theme {
    Light,
    Dark,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ThumbnailKind {
    /// Small preview shown in dashboard listings
    Thumb,
    /// Full-size render of the dashboard
    Full,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum ThumbnailState {
    /// A render has been scheduled but hasn't produced an image yet
    Pending,
    UpToDate,
    Stale,
    /// Supplied by a user, never refreshed automatically
    ManuallyUploaded,
}

/// Address of a thumbnail
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct ThumbnailMeta {
    pub(crate) dashboard_uid: String,
    pub(crate) theme: Theme,
    pub(crate) kind: ThumbnailKind,
}

impl ThumbnailMeta {
    pub(crate) fn new(
        dashboard_uid: String,
        theme: Theme,
        kind: ThumbnailKind,
    ) -> Self {
        Self {
            dashboard_uid,
            theme,
            kind,
        }
    }
}

impl fmt::Display for ThumbnailMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dashboard_uid, self.theme, self.kind)
    }
}

/// A stored thumbnail
///
/// The image is not part of the serialized form; stores keep it next to the
/// metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Thumbnail {
    pub(crate) id: u64,
    #[serde(flatten)]
    pub(crate) meta: ThumbnailMeta,
    #[serde(skip)]
    pub(crate) image: Vec<u8>,
    pub(crate) mime_type: String,
    pub(crate) dashboard_version: i64,
    pub(crate) datasource_uids: Vec<String>,
    pub(crate) state: ThumbnailState,
    /// Milliseconds since the Unix epoch of the last save or state change
    pub(crate) updated: u64,
}

#[derive(Debug)]
pub(crate) struct SaveThumbnailCommand {
    pub(crate) meta: ThumbnailMeta,
    pub(crate) image: Vec<u8>,
    pub(crate) mime_type: String,
    pub(crate) dashboard_version: i64,
    pub(crate) datasource_uids: Vec<String>,
}

impl SaveThumbnailCommand {
    /// The state a thumbnail is in right after this command is applied
    pub(crate) fn initial_state(&self) -> ThumbnailState {
        if self.dashboard_version == MANUAL_UPLOAD_DASHBOARD_VERSION {
            ThumbnailState::ManuallyUploaded
        } else {
            ThumbnailState::UpToDate
        }
    }
}

#[derive(Debug)]
pub(crate) struct UpdateThumbnailStateCommand {
    pub(crate) meta: ThumbnailMeta,
    pub(crate) state: ThumbnailState,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FindDashboardsWithStaleThumbnailsCommand {
    pub(crate) theme: Theme,
    pub(crate) kind: ThumbnailKind,
    pub(crate) include_manually_uploaded_thumbnails: bool,
    pub(crate) include_thumbnails_with_empty_datasource_uids: bool,
}

impl FindDashboardsWithStaleThumbnailsCommand {
    /// Whether a dashboard at `dashboard_version` needs a new render, given
    /// its current thumbnail for this command's theme and kind
    pub(crate) fn needs_refresh(
        &self,
        dashboard_version: i64,
        thumbnail: Option<&Thumbnail>,
    ) -> bool {
        let Some(thumbnail) = thumbnail else {
            return true;
        };

        let manually_uploaded = thumbnail.state
            == ThumbnailState::ManuallyUploaded
            || thumbnail.dashboard_version == MANUAL_UPLOAD_DASHBOARD_VERSION;
        if manually_uploaded && !self.include_manually_uploaded_thumbnails {
            return false;
        }

        thumbnail.dashboard_version != dashboard_version
            || thumbnail.state == ThumbnailState::Stale
            || (self.include_thumbnails_with_empty_datasource_uids
                && thumbnail.datasource_uids.is_empty())
    }
}

/// A dashboard whose thumbnail is missing or outdated
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct DashboardWithStaleThumbnail {
    pub(crate) uid: String,
    pub(crate) slug: String,
    pub(crate) version: i64,
}

/// Guess the MIME type of a rendered image from its file name
pub(crate) fn mime_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Persists thumbnails and finds dashboards that need new ones
pub(crate) struct Service {
    db: Arc<dyn Data>,
    search: Arc<dyn IndexStatus>,
}

impl Service {
    pub(crate) fn new(db: Arc<dyn Data>, search: Arc<dyn IndexStatus>) -> Self {
        Self {
            db,
            search,
        }
    }

    /// Saves the image at `path` as the thumbnail addressed by `meta`.
    ///
    /// Returns the thumbnail's identifier.
    #[tracing::instrument(skip(self, datasource_uids))]
    pub(crate) async fn save_from_file(
        &self,
        path: &Path,
        meta: ThumbnailMeta,
        dashboard_version: i64,
        datasource_uids: Vec<String>,
    ) -> Result<u64> {
        // The path never comes from a client directly. It points at a
        // temporary file written by the upload handler or by the renderer.
        if !path.is_absolute() {
            error!(
                dashboard_uid = %meta.dashboard_uid,
                path = %path.display(),
                "Received relative path",
            );
            return Err(error::Thumbnail::RelativePath(path.to_owned()));
        }

        // The MIME type follows the name as given, cleaning only affects
        // which file is read
        let mime_type = mime_type(&path.to_string_lossy());

        let read_path: PathBuf = utils::clean_path(path);
        let content = tokio::fs::read(&read_path).await.map_err(|e| {
            error!(
                dashboard_uid = %meta.dashboard_uid,
                path = %read_path.display(),
                error = %e,
                "Error reading file",
            );
            error::Thumbnail::ReadFile(e, read_path.clone())
        })?;

        self.save_from_bytes(
            content,
            mime_type,
            meta,
            dashboard_version,
            datasource_uids,
        )
    }

    /// Saves `content` as the thumbnail addressed by `meta`.
    ///
    /// Every save goes through here. An existing thumbnail at the same
    /// address is replaced and keeps its identifier.
    #[tracing::instrument(skip(self, content, datasource_uids))]
    pub(crate) fn save_from_bytes(
        &self,
        content: Vec<u8>,
        mime_type: &str,
        meta: ThumbnailMeta,
        dashboard_version: i64,
        datasource_uids: Vec<String>,
    ) -> Result<u64> {
        let command = SaveThumbnailCommand {
            meta,
            image: content,
            mime_type: mime_type.to_owned(),
            dashboard_version,
            datasource_uids,
        };
        let dashboard_uid = command.meta.dashboard_uid.clone();

        let thumbnail = self.db.save_thumbnail(command).map_err(|e| {
            error!(
                %dashboard_uid,
                error = %e,
                "Error saving thumbnail to the database",
            );
            error::Thumbnail::Store {
                dashboard_uid: Some(dashboard_uid.clone()),
                source: e,
            }
        })?;

        debug!(%dashboard_uid, id = thumbnail.id, "Saved thumbnail");

        Ok(thumbnail.id)
    }

    /// Changes the state of a thumbnail without touching its image
    #[tracing::instrument(skip(self))]
    pub(crate) fn update_thumbnail_state(
        &self,
        state: ThumbnailState,
        meta: ThumbnailMeta,
    ) -> Result<()> {
        let command = UpdateThumbnailStateCommand {
            meta,
            state,
        };

        match self.db.update_thumbnail_state(&command) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(meta = %command.meta, "No thumbnail to update");
                Err(error::Thumbnail::NotFound(command.meta))
            }
            Err(e) => {
                error!(
                    dashboard_uid = %command.meta.dashboard_uid,
                    error = %e,
                    "Error updating thumbnail state",
                );
                Err(error::Thumbnail::Store {
                    dashboard_uid: Some(command.meta.dashboard_uid),
                    source: e,
                })
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn get_thumbnail(
        &self,
        meta: ThumbnailMeta,
    ) -> Result<Thumbnail> {
        match self.db.get_thumbnail(&meta) {
            Ok(Some(thumbnail)) => Ok(thumbnail),
            Ok(None) => Err(error::Thumbnail::NotFound(meta)),
            Err(e) => {
                error!(
                    dashboard_uid = %meta.dashboard_uid,
                    error = %e,
                    "Error loading thumbnail",
                );
                Err(error::Thumbnail::Store {
                    dashboard_uid: Some(meta.dashboard_uid),
                    source: e,
                })
            }
        }
    }

    /// Lists dashboards whose thumbnail of the given theme and kind is
    /// missing or outdated.
    ///
    /// Manually uploaded thumbnails are never listed. Thumbnails without any
    /// recorded datasources are listed only while search is disabled, since
    /// the datasource set can't be computed then.
    #[tracing::instrument(skip(self))]
    pub(crate) fn find_dashboards_with_stale_thumbnails(
        &self,
        theme: Theme,
        kind: ThumbnailKind,
    ) -> Result<Vec<DashboardWithStaleThumbnail>> {
        let command = FindDashboardsWithStaleThumbnailsCommand {
            theme,
            kind,
            include_manually_uploaded_thumbnails: false,
            include_thumbnails_with_empty_datasource_uids: self
                .search
                .is_disabled(),
        };

        self.db.find_dashboards_with_stale_thumbnails(&command).map_err(|e| {
            error!(%theme, %kind, error = %e, "Error finding stale thumbnails");
            error::Thumbnail::Store {
                dashboard_uid: None,
                source: e,
            }
        })
    }

    /// Whether at least one thumbnail has been saved
    #[tracing::instrument(skip(self))]
    pub(crate) fn do_thumbnails_exist(&self) -> Result<bool> {
        let count = self.db.thumbnail_count().map_err(|e| {
            error!(error = %e, "Error finding thumbnails");
            error::Thumbnail::Store {
                dashboard_uid: None,
                source: e,
            }
        })?;

        Ok(count > 0)
    }
}
