use std::collections::HashSet;

use crate::{
    database::KeyValueDatabase,
    error,
    service::{self, dashboards::Dashboard},
};

type Result<T> = std::result::Result<T, error::Database>;

/// `UserId + 0xFF`, the prefix of every star of that user
fn star_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = user_id.as_bytes().to_vec();
    prefix.push(0xFF);
    prefix
}

impl KeyValueDatabase {
    /// All registered dashboards, ordered by UID
    pub(super) fn dashboards(&self) -> Result<Vec<Dashboard>> {
        self.dashboarduid_dashboard
            .iter()?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }
}

impl service::dashboards::Data for KeyValueDatabase {
    fn upsert_dashboard(&self, dashboard: &Dashboard) -> Result<()> {
        self.dashboarduid_dashboard
            .insert(dashboard.uid.as_bytes(), &serde_json::to_vec(dashboard)?)
    }

    fn get_dashboard(&self, uid: &str) -> Result<Option<Dashboard>> {
        self.dashboarduid_dashboard
            .get(uid.as_bytes())?
            .map(|value| Ok(serde_json::from_slice(&value)?))
            .transpose()
    }

    fn all_dashboards(&self) -> Result<Vec<Dashboard>> {
        self.dashboards()
    }

    #[tracing::instrument(skip(self))]
    fn set_starred(
        &self,
        user_id: &str,
        uid: &str,
        starred: bool,
    ) -> Result<()> {
        let mut key = star_prefix(user_id);
        key.extend_from_slice(uid.as_bytes());

        if starred {
            self.userid_dashboarduid_star.insert(&key, &[])
        } else {
            self.userid_dashboarduid_star.remove(&key)
        }
    }

    fn starred_dashboards(&self, user_id: &str) -> Result<HashSet<String>> {
        let prefix = star_prefix(user_id);

        self.userid_dashboarduid_star
            .scan_prefix(&prefix)?
            .into_iter()
            .map(|(key, _)| {
                String::from_utf8(key[prefix.len()..].to_vec()).map_err(|_| {
                    error::Database::Corrupt("invalid dashboard uid in star")
                })
            })
            .collect()
    }
}
