use super::{
    DashboardWithStaleThumbnail, FindDashboardsWithStaleThumbnailsCommand,
    SaveThumbnailCommand, Thumbnail, ThumbnailMeta,
    UpdateThumbnailStateCommand,
};
use crate::error;

type Result<T> = std::result::Result<T, error::Database>;

pub(crate) trait Data: Send + Sync {
    /// Inserts or replaces the thumbnail at the command's address
    ///
    /// A replaced thumbnail keeps its identifier. Identifiers are never zero.
    fn save_thumbnail(
        &self,
        command: SaveThumbnailCommand,
    ) -> Result<Thumbnail>;

    /// Returns `false` if there is no thumbnail at the command's address
    fn update_thumbnail_state(
        &self,
        command: &UpdateThumbnailStateCommand,
    ) -> Result<bool>;

    fn get_thumbnail(&self, meta: &ThumbnailMeta) -> Result<Option<Thumbnail>>;

    /// Dashboards, ordered by UID, for which
    /// [`FindDashboardsWithStaleThumbnailsCommand::needs_refresh`] holds
    fn find_dashboards_with_stale_thumbnails(
        &self,
        command: &FindDashboardsWithStaleThumbnailsCommand,
    ) -> Result<Vec<DashboardWithStaleThumbnail>>;

    fn thumbnail_count(&self) -> Result<u64>;
}
