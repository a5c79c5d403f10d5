use crate::{
    database::KeyValueDatabase,
    error,
    service::{
        self,
        thumbnails::{
            DashboardWithStaleThumbnail,
            FindDashboardsWithStaleThumbnailsCommand, SaveThumbnailCommand,
            Thumbnail, ThumbnailMeta, UpdateThumbnailStateCommand,
        },
    },
    utils,
};

type Result<T> = std::result::Result<T, error::Database>;

/// `DashboardUid + 0xFF + Theme + 0xFF + Kind`
fn address_key(meta: &ThumbnailMeta) -> Vec<u8> {
    let mut key = meta.dashboard_uid.as_bytes().to_vec();
    key.push(0xFF);
    key.extend_from_slice(meta.theme.to_string().as_bytes());
    key.push(0xFF);
    key.extend_from_slice(meta.kind.to_string().as_bytes());
    key
}

fn encode(thumbnail: &Thumbnail) -> Result<Vec<u8>> {
    // JSON is UTF-8 and never contains 0xFF
    let mut value = serde_json::to_vec(thumbnail)?;
    value.push(0xFF);
    value.extend_from_slice(&thumbnail.image);
    Ok(value)
}

fn decode(value: &[u8], with_image: bool) -> Result<Thumbnail> {
    let split = value.iter().position(|&b| b == 0xFF).ok_or(
        error::Database::Corrupt("thumbnail record without separator"),
    )?;

    let mut thumbnail: Thumbnail = serde_json::from_slice(&value[..split])?;
    if with_image {
        thumbnail.image = value[split + 1..].to_vec();
    }

    Ok(thumbnail)
}

impl KeyValueDatabase {
    fn thumbnail_id(&self, meta: &ThumbnailMeta) -> Result<Option<u64>> {
        self.addr_thumbnailid
            .get(&address_key(meta))?
            .map(|bytes| {
                utils::u64_from_bytes(&bytes).map_err(|_| {
                    error::Database::Corrupt("invalid thumbnail id")
                })
            })
            .transpose()
    }

    fn load_thumbnail(
        &self,
        meta: &ThumbnailMeta,
        with_image: bool,
    ) -> Result<Option<Thumbnail>> {
        let Some(id) = self.thumbnail_id(meta)? else {
            return Ok(None);
        };

        self.thumbnailid_thumbnail
            .get(&id.to_be_bytes())?
            .map(|value| decode(&value, with_image))
            .transpose()
    }
}

impl service::thumbnails::Data for KeyValueDatabase {
    #[tracing::instrument(skip(self, command), fields(meta = %command.meta))]
    fn save_thumbnail(
        &self,
        command: SaveThumbnailCommand,
    ) -> Result<Thumbnail> {
        let _guard = self
            .thumbnail_write_lock
            .lock()
            .expect("lock should not be poisoned");

        let key = address_key(&command.meta);
        let (id, is_new) = match self.thumbnail_id(&command.meta)? {
            Some(id) => (id, false),
            None => (self.next_count()?, true),
        };

        let thumbnail = Thumbnail {
            id,
            state: command.initial_state(),
            updated: utils::millis_since_unix_epoch(),
            meta: command.meta,
            image: command.image,
            mime_type: command.mime_type,
            dashboard_version: command.dashboard_version,
            datasource_uids: command.datasource_uids,
        };

        // The record goes in before the address so readers never see an
        // address without a record
        self.thumbnailid_thumbnail
            .insert(&id.to_be_bytes(), &encode(&thumbnail)?)?;
        if is_new {
            self.addr_thumbnailid.insert(&key, &id.to_be_bytes())?;
        }

        Ok(thumbnail)
    }

    #[tracing::instrument(skip(self, command), fields(meta = %command.meta))]
    fn update_thumbnail_state(
        &self,
        command: &UpdateThumbnailStateCommand,
    ) -> Result<bool> {
        let _guard = self
            .thumbnail_write_lock
            .lock()
            .expect("lock should not be poisoned");

        let Some(mut thumbnail) = self.load_thumbnail(&command.meta, true)?
        else {
            return Ok(false);
        };

        thumbnail.state = command.state;
        thumbnail.updated = utils::millis_since_unix_epoch();
        self.thumbnailid_thumbnail
            .insert(&thumbnail.id.to_be_bytes(), &encode(&thumbnail)?)?;

        Ok(true)
    }

    fn get_thumbnail(&self, meta: &ThumbnailMeta) -> Result<Option<Thumbnail>> {
        self.load_thumbnail(meta, true)
    }

    #[tracing::instrument(skip(self))]
    fn find_dashboards_with_stale_thumbnails(
        &self,
        command: &FindDashboardsWithStaleThumbnailsCommand,
    ) -> Result<Vec<DashboardWithStaleThumbnail>> {
        let mut stale = Vec::new();

        for dashboard in self.dashboards()? {
            if dashboard.is_folder {
                continue;
            }

            let meta = ThumbnailMeta::new(
                dashboard.uid.clone(),
                command.theme,
                command.kind,
            );
            let thumbnail = self.load_thumbnail(&meta, false)?;

            if command.needs_refresh(dashboard.version, thumbnail.as_ref()) {
                stale.push(DashboardWithStaleThumbnail {
                    uid: dashboard.uid,
                    slug: dashboard.slug,
                    version: dashboard.version,
                });
            }
        }

        Ok(stale)
    }

    fn thumbnail_count(&self) -> Result<u64> {
        self.addr_thumbnailid.count()
    }
}
