use std::collections::HashSet;

use super::Dashboard;
use crate::error;

type Result<T> = std::result::Result<T, error::Database>;

pub(crate) trait Data: Send + Sync {
    /// Inserts or replaces the dashboard with the same UID
    fn upsert_dashboard(&self, dashboard: &Dashboard) -> Result<()>;

    fn get_dashboard(&self, uid: &str) -> Result<Option<Dashboard>>;

    /// All registered dashboards, ordered by UID
    fn all_dashboards(&self) -> Result<Vec<Dashboard>>;

    fn set_starred(
        &self,
        user_id: &str,
        uid: &str,
        starred: bool,
    ) -> Result<()>;

    /// UIDs of the dashboards starred by `user_id`
    fn starred_dashboards(&self, user_id: &str) -> Result<HashSet<String>>;
}
