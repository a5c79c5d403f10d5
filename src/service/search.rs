use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tracing::info;

use super::dashboards;
use crate::{config::SearchConfig, error};

type Result<T, E = error::Search> = std::result::Result<T, E>;

/// Reports whether dashboard indexing is currently available
pub(crate) trait IndexStatus: Send + Sync {
    fn is_disabled(&self) -> bool;
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SearchDashboardsQuery {
    /// Case-insensitive substring of the title, empty matches everything
    pub(crate) title: String,
    pub(crate) tag: Option<String>,
    pub(crate) user_id: Option<String>,
    /// Maximum number of hits, 0 uses the configured default
    pub(crate) limit: usize,
    /// Only return dashboards starred by `user_id`
    pub(crate) is_starred: bool,
    /// Only return the tag cloud of the matching dashboards
    pub(crate) tags_only: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct GetDashboardTagsQuery {
    /// Maximum number of tags, 0 returns all of them
    pub(crate) limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResult {
    pub(crate) dashboards: Vec<DashboardSearchHit>,
    pub(crate) tags: Vec<DashboardTagCloudItem>,
    pub(crate) tags_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DashboardSearchHit {
    pub(crate) uid: String,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) tags: Vec<String>,
    pub(crate) url: String,
    pub(crate) is_starred: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct DashboardTagCloudItem {
    pub(crate) term: String,
    pub(crate) count: usize,
}

/// Counts tag occurrences, ordered by term
fn tag_cloud<'a, I>(tags: I) -> Vec<DashboardTagCloudItem>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts = BTreeMap::<&str, usize>::new();
    for tag in tags.into_iter().flatten() {
        *counts.entry(tag).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(term, count)| DashboardTagCloudItem {
            term: term.to_owned(),
            count,
        })
        .collect()
}

pub(crate) struct Service {
    db: Arc<dyn dashboards::Data>,
    disabled: AtomicBool,
    default_limit: usize,
}

impl Service {
    pub(crate) fn new(
        db: Arc<dyn dashboards::Data>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            db,
            disabled: AtomicBool::new(!config.enable),
            default_limit: config.default_limit,
        }
    }

    pub(crate) fn set_disabled(&self, disabled: bool) {
        if self.disabled.swap(disabled, Ordering::Relaxed) != disabled {
            info!(disabled, "Search availability changed");
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn search_dashboards(
        &self,
        query: &SearchDashboardsQuery,
    ) -> Result<SearchResult> {
        if self.is_disabled() {
            return Err(error::Search::Disabled);
        }

        let starred = match &query.user_id {
            Some(user_id) => self.db.starred_dashboards(user_id)?,
            None => HashSet::new(),
        };
        let title = query.title.to_lowercase();

        let mut hits = self
            .db
            .all_dashboards()?
            .into_iter()
            .filter(|d| !d.is_folder)
            .filter(|d| d.title.to_lowercase().contains(&title))
            .filter(|d| query.tag.as_ref().map_or(true, |t| d.tags.contains(t)))
            .filter(|d| !query.is_starred || starred.contains(&d.uid))
            .map(|d| DashboardSearchHit {
                url: format!("/d/{}/{}", d.uid, d.slug),
                is_starred: starred.contains(&d.uid),
                uid: d.uid,
                title: d.title,
                slug: d.slug,
                tags: d.tags,
            })
            .collect::<Vec<_>>();

        hits.sort_by(|a, b| {
            a.title.cmp(&b.title).then_with(|| a.uid.cmp(&b.uid))
        });
        hits.truncate(if query.limit == 0 {
            self.default_limit
        } else {
            query.limit
        });

        let tags = tag_cloud(hits.iter().map(|h| h.tags.as_slice()));
        if query.tags_only {
            hits.clear();
        }

        Ok(SearchResult {
            dashboards: hits,
            tags,
            tags_only: query.tags_only,
        })
    }

    /// Tag cloud over every dashboard that isn't a folder
    #[tracing::instrument(skip(self))]
    pub(crate) fn dashboard_tags(
        &self,
        query: &GetDashboardTagsQuery,
    ) -> Result<Vec<DashboardTagCloudItem>> {
        if self.is_disabled() {
            return Err(error::Search::Disabled);
        }

        let dashboards = self.db.all_dashboards()?;
        let mut tags = tag_cloud(
            dashboards
                .iter()
                .filter(|d| !d.is_folder)
                .map(|d| d.tags.as_slice()),
        );

        if query.limit != 0 {
            tags.truncate(query.limit);
        }

        Ok(tags)
    }
}

impl IndexStatus for Service {
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashSet},
        sync::{Arc, Mutex},
    };

    use super::{
        DashboardTagCloudItem, GetDashboardTagsQuery, IndexStatus,
        SearchDashboardsQuery, Service,
    };
    use crate::{
        config::SearchConfig,
        error,
        service::dashboards::{self, Dashboard},
        utils,
    };

    #[derive(Default)]
    struct MemoryDashboards {
        dashboards: Mutex<BTreeMap<String, Dashboard>>,
        stars: Mutex<HashSet<(String, String)>>,
    }

    impl dashboards::Data for MemoryDashboards {
        fn upsert_dashboard(
            &self,
            dashboard: &Dashboard,
        ) -> Result<(), error::Database> {
            self.dashboards
                .lock()
                .expect("lock should not be poisoned")
                .insert(dashboard.uid.clone(), dashboard.clone());
            Ok(())
        }

        fn get_dashboard(
            &self,
            uid: &str,
        ) -> Result<Option<Dashboard>, error::Database> {
            Ok(self
                .dashboards
                .lock()
                .expect("lock should not be poisoned")
                .get(uid)
                .cloned())
        }

        fn all_dashboards(&self) -> Result<Vec<Dashboard>, error::Database> {
            Ok(self
                .dashboards
                .lock()
                .expect("lock should not be poisoned")
                .values()
                .cloned()
                .collect())
        }

        fn set_starred(
            &self,
            user_id: &str,
            uid: &str,
            starred: bool,
        ) -> Result<(), error::Database> {
            let mut stars =
                self.stars.lock().expect("lock should not be poisoned");
            let key = (user_id.to_owned(), uid.to_owned());
            if starred {
                stars.insert(key);
            } else {
                stars.remove(&key);
            }
            Ok(())
        }

        fn starred_dashboards(
            &self,
            user_id: &str,
        ) -> Result<HashSet<String>, error::Database> {
            Ok(self
                .stars
                .lock()
                .expect("lock should not be poisoned")
                .iter()
                .filter(|(user, _)| user == user_id)
                .map(|(_, uid)| uid.clone())
                .collect())
        }
    }

    fn dashboard(uid: &str, title: &str, tags: &[&str]) -> Dashboard {
        Dashboard {
            uid: uid.to_owned(),
            title: title.to_owned(),
            slug: utils::slugify(title),
            version: 1,
            tags: tags.iter().map(|&t| t.to_owned()).collect(),
            is_folder: false,
        }
    }

    fn service() -> (Service, Arc<MemoryDashboards>) {
        let db = Arc::new(MemoryDashboards::default());
        for d in [
            dashboard("b", "Billing", &["prod", "money"]),
            dashboard("a", "API Latency", &["prod"]),
            dashboard("c", "api errors", &["staging"]),
            Dashboard {
                is_folder: true,
                ..dashboard("f", "API folder", &["prod"])
            },
        ] {
            dashboards::Data::upsert_dashboard(&*db, &d)
                .expect("insert should succeed");
        }

        let service = Service::new(
            db.clone(),
            &SearchConfig {
                enable: true,
                default_limit: 2,
            },
        );

        (service, db)
    }

    fn uids(service: &Service, query: &SearchDashboardsQuery) -> Vec<String> {
        service
            .search_dashboards(query)
            .expect("search should succeed")
            .dashboards
            .into_iter()
            .map(|hit| hit.uid)
            .collect()
    }

    #[test]
    fn title_search_is_case_insensitive_and_skips_folders() {
        let (service, _) = service();

        let query = SearchDashboardsQuery {
            title: "API".to_owned(),
            ..Default::default()
        };

        assert_eq!(uids(&service, &query), ["a", "c"]);
    }

    #[test]
    fn hits_are_sorted_and_limited() {
        let (service, _) = service();

        assert_eq!(
            uids(&service, &SearchDashboardsQuery::default()),
            ["a", "b"]
        );

        let query = SearchDashboardsQuery {
            limit: 10,
            ..Default::default()
        };
        assert_eq!(uids(&service, &query), ["a", "b", "c"]);
    }

    #[test]
    fn tag_and_star_filters() {
        let (service, db) = service();
        dashboards::Data::set_starred(&*db, "alice", "b", true)
            .expect("star should succeed");

        let query = SearchDashboardsQuery {
            tag: Some("prod".to_owned()),
            user_id: Some("alice".to_owned()),
            limit: 10,
            ..Default::default()
        };
        let result = service.search_dashboards(&query).expect("search works");
        assert_eq!(result.dashboards.len(), 2);
        assert!(!result.dashboards[0].is_starred, "API Latency isn't starred");
        assert!(result.dashboards[1].is_starred, "Billing is starred");
        assert_eq!(result.dashboards[1].url, "/d/b/billing");
        assert_eq!(
            result.tags,
            [
                DashboardTagCloudItem {
                    term: "money".to_owned(),
                    count: 1,
                },
                DashboardTagCloudItem {
                    term: "prod".to_owned(),
                    count: 2,
                },
            ]
        );

        let query = SearchDashboardsQuery {
            is_starred: true,
            ..query
        };
        assert_eq!(uids(&service, &query), ["b"]);

        let query = SearchDashboardsQuery {
            user_id: None,
            ..query
        };
        assert!(uids(&service, &query).is_empty(), "nobody to have starred");
    }

    #[test]
    fn tags_only_returns_no_hits() {
        let (service, _) = service();

        let result = service
            .search_dashboards(&SearchDashboardsQuery {
                tags_only: true,
                limit: 10,
                ..Default::default()
            })
            .expect("search should succeed");

        assert!(result.tags_only, "flag is echoed back");
        assert!(result.dashboards.is_empty(), "no hits with tags_only");
        assert_eq!(result.tags.len(), 3);
    }

    #[test]
    fn dashboard_tags_cover_everything_but_folders() {
        let (service, _) = service();

        let tags = service
            .dashboard_tags(&GetDashboardTagsQuery::default())
            .expect("tags should load");
        let terms: Vec<_> =
            tags.iter().map(|t| (t.term.as_str(), t.count)).collect();
        assert_eq!(terms, [("money", 1), ("prod", 2), ("staging", 1)]);

        let tags = service
            .dashboard_tags(&GetDashboardTagsQuery {
                limit: 1,
            })
            .expect("tags should load");
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn disabled_search_refuses_queries() {
        let (service, _) = service();
        assert!(!service.is_disabled(), "enabled by configuration");

        service.set_disabled(true);
        assert!(service.is_disabled(), "disabled at runtime");

        assert!(
            matches!(
                service.search_dashboards(&SearchDashboardsQuery::default()),
                Err(error::Search::Disabled)
            ),
            "search should be refused"
        );
        assert!(
            matches!(
                service.dashboard_tags(&GetDashboardTagsQuery::default()),
                Err(error::Search::Disabled)
            ),
            "tags should be refused"
        );

        service.set_disabled(false);
        assert!(!service.is_disabled(), "enabled again");
    }
}
