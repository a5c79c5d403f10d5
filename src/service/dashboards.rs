use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error, utils};

mod data;

pub(crate) use data::Data;

type Result<T, E = error::Dashboard> = std::result::Result<T, E>;

/// What the thumbnail and search services need to know about a dashboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Dashboard {
    pub(crate) uid: String,
    pub(crate) title: String,
    pub(crate) slug: String,
    /// Content version, bumped by every saved edit
    pub(crate) version: i64,
    pub(crate) tags: Vec<String>,
    pub(crate) is_folder: bool,
}

pub(crate) struct Service {
    db: Arc<dyn Data>,
}

impl Service {
    pub(crate) fn new(db: Arc<dyn Data>) -> Self {
        Self {
            db,
        }
    }

    /// Registers a dashboard or records a new version of it
    #[tracing::instrument(skip(self))]
    pub(crate) fn upsert(
        &self,
        uid: String,
        title: String,
        version: i64,
        tags: Vec<String>,
        is_folder: bool,
    ) -> Result<Dashboard> {
        if uid.is_empty() {
            return Err(error::Dashboard::EmptyUid);
        }

        let dashboard = Dashboard {
            slug: utils::slugify(&title),
            uid,
            title,
            version,
            tags,
            is_folder,
        };

        self.db.upsert_dashboard(&dashboard)?;
        info!(uid = %dashboard.uid, version, "Dashboard registered");

        Ok(dashboard)
    }

    pub(crate) fn get(&self, uid: &str) -> Result<Option<Dashboard>> {
        Ok(self.db.get_dashboard(uid)?)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn star(&self, user_id: &str, uid: &str) -> Result<()> {
        if self.get(uid)?.is_none() {
            return Err(error::Dashboard::NotFound(uid.to_owned()));
        }

        self.db.set_starred(user_id, uid, true)?;
        debug!("Dashboard starred");

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn unstar(&self, user_id: &str, uid: &str) -> Result<()> {
        self.db.set_starred(user_id, uid, false)?;
        debug!("Dashboard unstarred");

        Ok(())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::Arc;

    use super::Service;
    use crate::{
        config::{DatabaseBackend, DatabaseConfig},
        database::KeyValueDatabase,
        error,
    };

    fn service(dir: &tempfile::TempDir) -> Service {
        let db = KeyValueDatabase::load_or_create(&DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            path: dir.path().to_owned(),
            cache_capacity_mb: 8.0,
        })
        .expect("database should open");

        Service::new(Arc::new(db))
    }

    #[test]
    fn upsert_derives_slug_and_replaces() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let service = service(&dir);

        let first = service
            .upsert(
                "abc".to_owned(),
                "CPU & Memory (prod)".to_owned(),
                1,
                vec!["prod".to_owned()],
                false,
            )
            .expect("upsert should succeed");
        assert_eq!(first.slug, "cpu-memory-prod");

        service
            .upsert("abc".to_owned(), "CPU".to_owned(), 2, Vec::new(), false)
            .expect("upsert should succeed");

        let stored = service
            .get("abc")
            .expect("get should succeed")
            .expect("dashboard should exist");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.slug, "cpu");
        assert!(stored.tags.is_empty());
    }

    #[test]
    fn empty_uid_is_rejected() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let service = service(&dir);

        let error = service
            .upsert(String::new(), "Title".to_owned(), 1, Vec::new(), false)
            .expect_err("empty UIDs are invalid");
        assert!(
            matches!(error, error::Dashboard::EmptyUid),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn starring_unknown_dashboard_fails() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let service = service(&dir);

        let error =
            service.star("alice", "nope").expect_err("dashboard is unknown");
        assert!(
            matches!(&error, error::Dashboard::NotFound(uid) if uid == "nope"),
            "unexpected error: {error:?}"
        );

        service
            .upsert("abc".to_owned(), "A".to_owned(), 1, Vec::new(), false)
            .expect("upsert should succeed");
        service.star("alice", "abc").expect("star should succeed");
        service.unstar("alice", "abc").expect("unstar should succeed");
    }
}
