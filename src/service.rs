use std::sync::Arc;

use crate::Config;

pub(crate) mod dashboards;
pub(crate) mod search;
pub(crate) mod thumbnails;

pub(crate) struct Services {
    pub(crate) dashboards: dashboards::Service,
    pub(crate) search: Arc<search::Service>,
    pub(crate) thumbnails: thumbnails::Service,
}

impl Services {
    pub(crate) fn build<D>(db: Arc<D>, config: &Config) -> Self
    where
        D: dashboards::Data + thumbnails::Data + 'static,
    {
        let search = Arc::new(search::Service::new(db.clone(), &config.search));

        Self {
            dashboards: dashboards::Service::new(db.clone()),
            thumbnails: thumbnails::Service::new(db, search.clone()),
            search,
        }
    }
}
